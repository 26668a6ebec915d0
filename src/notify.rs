//! Telegram delivery for run reports. Send failures are logged and
//! swallowed; a broken bot never takes the run down.

use crate::checker::CheckStats;
use crate::config::NotifyConfig;
use crate::scraper::ScrapeError;
use reqwest::blocking::Client;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Debug, Default)]
pub struct RunReport {
    pub pages_processed: u32,
    pub cars_found: usize,
    pub cars_new: usize,
    pub cars_linked: u32,
    pub cars_duplicate: usize,
    pub detail_pages_fetched: usize,
    pub errors: usize,
    pub duration_secs: i64,
    pub finished_at: String,
}

pub struct TelegramNotifier {
    config: Option<NotifyConfig>,
    client: Client,
}

impl TelegramNotifier {
    /// Credentials come from the environment. Missing credentials degrade
    /// to log-only mode rather than failing startup.
    pub fn from_env() -> Result<Self, ScrapeError> {
        let config = NotifyConfig::from_env();
        if config.is_none() {
            warn!("telegram credentials not set, reports will only be logged");
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ScrapeError::Network(e.to_string()))?;
        Ok(Self { config, client })
    }

    pub fn send_message(&self, message: &str) -> bool {
        let Some(config) = &self.config else {
            info!("telegram message (not sent): {message}");
            return false;
        };

        let url = format!(
            "https://api.telegram.org/bot{}/sendMessage",
            config.bot_token
        );
        let result = self
            .client
            .post(&url)
            .form(&[
                ("chat_id", config.chat_id.as_str()),
                ("text", message),
                ("parse_mode", "HTML"),
            ])
            .send();

        match result {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                error!("telegram send failed: HTTP {}", resp.status());
                false
            }
            Err(e) => {
                error!("telegram send failed: {e}");
                info!("telegram message (not sent): {message}");
                false
            }
        }
    }

    pub fn send_run_report(&self, report: &RunReport) -> bool {
        let minutes = report.duration_secs / 60;
        let seconds = report.duration_secs % 60;
        let message = format!(
            "🏆 <b>SCRAPING COMPLETED</b>\n\
             ─────────────────────\n\
             📄 Pages processed: {}\n\
             🚗 Cars found: {}\n\
             ✅ New cars: {}\n\
             🔗 Linked to users: {}\n\
             🔄 Duplicates: {}\n\
             📥 Detail pages fetched: {}\n\
             ❌ Errors: {}\n\
             ⏱️ Duration: {minutes}min {seconds}s\n\
             🗓️ Finished: {}",
            report.pages_processed,
            report.cars_found,
            report.cars_new,
            report.cars_linked,
            report.cars_duplicate,
            report.detail_pages_fetched,
            report.errors,
            report.finished_at,
        );
        self.send_message(&message)
    }

    pub fn send_maintenance_report(&self, linked: &CheckStats, unlinked: &CheckStats) -> bool {
        if linked.checked + unlinked.checked == 0 {
            info!("no listings needed checking, skipping maintenance report");
            return true;
        }

        let message = format!(
            "🔧 <b>MAINTENANCE CHECK COMPLETED</b>\n\
             ─────────────────────\n\
             🔗 <b>Linked listings (6h check):</b>\n\
             \u{20}  ✅ Checked: {}\n\
             \u{20}  🗑️ Deleted: {}\n\
             \u{20}  💰 Price changes: {}\n\
             \u{20}  ❌ Errors: {}\n\
             \n\
             📊 <b>Unlinked listings (7d check):</b>\n\
             \u{20}  ✅ Checked: {}\n\
             \u{20}  🗑️ Deleted: {}\n\
             \u{20}  💰 Price changes: {}\n\
             \u{20}  ❌ Errors: {}",
            linked.checked,
            linked.deleted,
            linked.price_changes,
            linked.errors,
            unlinked.checked,
            unlinked.deleted,
            unlinked.price_changes,
            unlinked.errors,
        );
        self.send_message(&message)
    }

    pub fn send_error_report(&self, error: &str) -> bool {
        self.send_message(&format!("❌ <b>SCRAPING FAILED</b>\n\nError: {error}"))
    }
}
