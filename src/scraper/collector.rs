//! Index-page pagination: walks the search result pages, harvests detail
//! URLs and stops once it is only seeing listings it already knows, since
//! the source orders results by recency.

use crate::config::ScrapeConfig;
use crate::scraper::fetch::PageFetcher;
use crate::scraper::ScrapeError;
use scraper::{Html, Selector};
use std::collections::HashSet;
use tracing::{info, warn};
use url::Url;

// Fixed search filter: private sellers, Belgium, newest first.
const BASE_PARAMS: &[(&str, &str)] = &[
    ("atype", "C"),
    ("custtype", "P"),
    ("cy", "B"),
    ("damaged_listing", "exclude"),
    ("desc", "1"),
    ("powertype", "kw"),
    ("sort", "age"),
    ("source", "homepage_search-mask"),
    ("ustate", "N,U"),
];

/// Fraction of already-known URLs above which a page counts as "seen".
const KNOWN_PAGE_THRESHOLD: f64 = 0.7;
/// Consecutive "seen" pages before the walk stops.
const KNOWN_PAGE_STREAK: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    MaxPagesReached,
    NoMoreResults,
    KnownListings,
    PageError(String),
}

#[derive(Debug)]
pub struct CollectOutcome {
    pub new_urls: Vec<String>,
    pub pages_processed: u32,
    pub urls_found: usize,
    pub known_seen: usize,
    pub stop_reason: StopReason,
}

pub struct ListingCollector<'a, F: PageFetcher> {
    fetcher: &'a F,
    config: &'a ScrapeConfig,
    known_urls: HashSet<String>,
}

impl<'a, F: PageFetcher> ListingCollector<'a, F> {
    pub fn new(fetcher: &'a F, config: &'a ScrapeConfig, known_urls: HashSet<String>) -> Self {
        Self {
            fetcher,
            config,
            known_urls,
        }
    }

    /// Walk pages 1..=max_pages collecting URLs not seen before.
    pub fn collect(&self) -> Result<CollectOutcome, ScrapeError> {
        let base = Url::parse(&self.config.base_url)
            .map_err(|e| ScrapeError::Config(format!("bad base url: {e}")))?;

        let mut outcome = CollectOutcome {
            new_urls: Vec::new(),
            pages_processed: 0,
            urls_found: 0,
            known_seen: 0,
            stop_reason: StopReason::MaxPagesReached,
        };
        let mut collected: HashSet<String> = HashSet::new();
        let mut known_streak = 0u32;

        for page in 1..=self.config.max_pages {
            let page_url = self.index_page_url(&base, page);
            info!("📄 processing page {page}/{}", self.config.max_pages);

            let html = match self.fetcher.get(&page_url) {
                Ok(html) => html,
                Err(e) => {
                    warn!("page {page} failed: {e}");
                    outcome.stop_reason = StopReason::PageError(e.to_string());
                    break;
                }
            };

            outcome.pages_processed = page;
            let urls = parse_index_page(&html, &base)?;
            if urls.is_empty() {
                info!("no listings on page {page}, stopping");
                outcome.stop_reason = StopReason::NoMoreResults;
                break;
            }

            outcome.urls_found += urls.len();
            let known_count = urls
                .iter()
                .filter(|url| self.known_urls.contains(*url))
                .count();
            outcome.known_seen += known_count;
            info!(
                "page {page}: {} urls, {} already known",
                urls.len(),
                known_count
            );

            if known_count as f64 > urls.len() as f64 * KNOWN_PAGE_THRESHOLD {
                known_streak += 1;
                if known_streak >= KNOWN_PAGE_STREAK {
                    info!("{known_streak} consecutive mostly-known pages, stopping");
                    outcome.stop_reason = StopReason::KnownListings;
                    break;
                }
            } else {
                known_streak = 0;
            }

            for url in urls {
                if !self.known_urls.contains(&url) && collected.insert(url.clone()) {
                    outcome.new_urls.push(url);
                }
            }

            if page < self.config.max_pages {
                std::thread::sleep(self.config.request_delay);
            }
        }

        info!(
            "✅ collection done: {} new urls over {} pages ({:?})",
            outcome.new_urls.len(),
            outcome.pages_processed,
            outcome.stop_reason
        );
        Ok(outcome)
    }

    fn index_page_url(&self, base: &Url, page: u32) -> String {
        let mut url = base.clone();
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in BASE_PARAMS {
                pairs.append_pair(key, value);
            }
            pairs.append_pair("page", &page.to_string());
        }
        url.to_string()
    }
}

/// Pull detail-page URLs out of one result page, deduplicated within the
/// page but order-preserving.
pub fn parse_index_page(html: &str, base: &Url) -> Result<Vec<String>, ScrapeError> {
    let document = Html::parse_document(html);
    let article_selector = Selector::parse("article.cldt-summary-full-item")
        .map_err(|e| ScrapeError::HtmlParse(e.to_string()))?;
    let link_selector = Selector::parse("a.ListItem_title__ndA4s")
        .map_err(|e| ScrapeError::HtmlParse(e.to_string()))?;

    let mut seen = HashSet::new();
    let mut urls = Vec::new();

    for article in document.select(&article_selector) {
        let Some(link) = article.select(&link_selector).next() else {
            continue;
        };
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let absolute = if href.starts_with('/') {
            match base.join(href) {
                Ok(joined) => joined.to_string(),
                Err(_) => continue,
            }
        } else {
            href.to_string()
        };
        if seen.insert(absolute.clone()) {
            urls.push(absolute);
        }
    }

    Ok(urls)
}
