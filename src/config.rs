// config.rs
use std::time::Duration;

/// Tunables for the collection + extraction phase.
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    pub base_url: String,
    pub max_pages: u32,
    /// Fixed delay between network calls (index pages and detail pages).
    pub request_delay: Duration,
    pub request_timeout: Duration,
    /// Dedup window when preloading known URLs.
    pub dedup_lookback_days: i64,
    pub dedup_url_cap: u32,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.autoscout24.be/fr/lst".to_string(),
            max_pages: 20,
            request_delay: Duration::from_millis(1500),
            request_timeout: Duration::from_secs(30),
            dedup_lookback_days: 30,
            dedup_url_cap: 500,
        }
    }
}

/// Tunables for the periodic re-check sweeps.
#[derive(Debug, Clone)]
pub struct CheckConfig {
    pub linked_interval: chrono::Duration,
    pub unlinked_interval: chrono::Duration,
    pub linked_batch_size: u32,
    pub unlinked_batch_size: u32,
    /// Short timeout for the existence probe.
    pub probe_timeout: Duration,
    /// Same magnitude as the primary scrape delay.
    pub request_delay: Duration,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            linked_interval: chrono::Duration::hours(6),
            unlinked_interval: chrono::Duration::days(7),
            linked_batch_size: 10,
            unlinked_batch_size: 5,
            probe_timeout: Duration::from_secs(5),
            request_delay: Duration::from_millis(1500),
        }
    }
}

/// Telegram credentials, validated at process start.
#[derive(Debug, Clone)]
pub struct NotifyConfig {
    pub bot_token: String,
    pub chat_id: String,
}

impl NotifyConfig {
    pub fn from_env() -> Option<Self> {
        let bot_token = std::env::var("TELEGRAM_BOT_TOKEN").ok()?;
        let chat_id = std::env::var("TELEGRAM_USER_ID").ok()?;
        Some(Self { bot_token, chat_id })
    }
}
