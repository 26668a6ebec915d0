use crate::scraper::ScrapeError;
use rand::Rng;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONNECTION, REFERER};
use std::time::Duration;
use tracing::warn;

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const MAX_ATTEMPTS: u32 = 3;
const BACKOFF_SECS: u64 = 2;
const JITTER_MAX_MILLIS: u64 = 1000;

/// Blocking page access, seam for tests. Collector, extractor and checker
/// only ever talk to the site through this.
pub trait PageFetcher {
    /// Fetch a page body. Retried internally; an error means all attempts
    /// failed or the final response was non-2xx.
    fn get(&self, url: &str) -> Result<String, ScrapeError>;

    /// Lightweight existence probe. Returns the HTTP status code.
    fn head(&self, url: &str) -> Result<u16, ScrapeError>;
}

pub struct HttpFetcher {
    client: Client,
    probe_client: Client,
}

impl HttpFetcher {
    pub fn new(request_timeout: Duration, probe_timeout: Duration) -> Result<Self, ScrapeError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(browser_headers())
            .timeout(request_timeout)
            .build()
            .map_err(|e| ScrapeError::Network(e.to_string()))?;

        // Separate client so the probe gets its short timeout and no
        // redirect following.
        let probe_client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(browser_headers())
            .timeout(probe_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| ScrapeError::Network(e.to_string()))?;

        Ok(Self {
            client,
            probe_client,
        })
    }
}

fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
    headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert(
        REFERER,
        HeaderValue::from_static("https://www.autoscout24.be/fr/lst"),
    );
    headers
}

impl PageFetcher for HttpFetcher {
    fn get(&self, url: &str) -> Result<String, ScrapeError> {
        let mut last_err = None;

        for attempt in 1..=MAX_ATTEMPTS {
            match self.try_get(url) {
                Ok(body) => return Ok(body),
                Err(e) => {
                    warn!("attempt {attempt}/{MAX_ATTEMPTS} failed for {url}: {e}");
                    last_err = Some(e);
                    if attempt < MAX_ATTEMPTS {
                        let jitter = rand::thread_rng().gen_range(0..=JITTER_MAX_MILLIS);
                        std::thread::sleep(
                            Duration::from_secs(BACKOFF_SECS) + Duration::from_millis(jitter),
                        );
                    }
                }
            }
        }

        Err(last_err.unwrap_or_else(|| ScrapeError::Network("retry loop exhausted".into())))
    }

    fn head(&self, url: &str) -> Result<u16, ScrapeError> {
        let resp = self
            .probe_client
            .head(url)
            .send()
            .map_err(|e| ScrapeError::Network(e.to_string()))?;
        Ok(resp.status().as_u16())
    }
}

impl HttpFetcher {
    fn try_get(&self, url: &str) -> Result<String, ScrapeError> {
        let resp = self
            .client
            .get(url)
            .send()
            .map_err(|e| ScrapeError::Network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ScrapeError::Network(format!("HTTP {status} for {url}")));
        }

        resp.text().map_err(|e| ScrapeError::Network(e.to_string()))
    }
}
