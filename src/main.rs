use crate::checker::ListingChecker;
use crate::config::{CheckConfig, ScrapeConfig};
use crate::db::connection::{init_db, Database};
use crate::db::{listings, runs};
use crate::domain::Listing;
use crate::notify::{RunReport, TelegramNotifier};
use crate::processor::DataProcessor;
use crate::scraper::collector::ListingCollector;
use crate::scraper::extract;
use crate::scraper::fetch::{HttpFetcher, PageFetcher};
use chrono::Utc;
use std::collections::HashSet;
use tracing::{error, info, warn};

mod checker;
mod config;
mod db;
mod domain;
mod errors;
mod matcher;
mod notify;
mod processor;
mod scraper;

#[cfg(test)]
mod tests;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let db_path = std::env::var("CARSCOUT_DB").unwrap_or_else(|_| "carscout.sqlite3".to_string());
    let db = Database::new(db_path);
    if let Err(e) = init_db(&db) {
        error!("database initialization failed: {e}");
        std::process::exit(1);
    }

    let notifier = match TelegramNotifier::from_env() {
        Ok(notifier) => notifier,
        Err(e) => {
            error!("notifier setup failed: {e}");
            std::process::exit(1);
        }
    };

    // One top-level catch: anything that escapes the orchestration below
    // is fatal to the run, reported, and exits non-zero.
    if let Err(e) = run(&db, &notifier) {
        error!("critical error in orchestration: {e}");
        notifier.send_error_report(&e.to_string());
        std::process::exit(1);
    }
}

fn run(db: &Database, notifier: &TelegramNotifier) -> Result<(), Box<dyn std::error::Error>> {
    let started = Utc::now();
    let scrape_cfg = ScrapeConfig::default();
    let check_cfg = CheckConfig::default();
    let fetcher = HttpFetcher::new(scrape_cfg.request_timeout, check_cfg.probe_timeout)?;

    let run_row = runs::start_run(db, started.timestamp())?;
    let run_tag = started.format("%Y%m%d_%H%M%S").to_string();

    // Step 1: freshness sweeps over stored listings. Failures here are
    // logged but never take the scrape down.
    run_maintenance(db, &fetcher, check_cfg, run_tag, notifier);

    // Steps 2-6: collect, extract, process, store, link.
    match scrape_and_store(db, &fetcher, &scrape_cfg) {
        Ok(mut report) => {
            runs::end_run(
                db,
                run_row,
                Utc::now().timestamp(),
                report.pages_processed,
                report.cars_found,
                true,
                None,
            )?;
            report.duration_secs = (Utc::now() - started).num_seconds();
            report.finished_at = Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();
            if !notifier.send_run_report(&report) {
                error!("failed to send final report");
            }
            Ok(())
        }
        Err(e) => {
            let _ = runs::end_run(
                db,
                run_row,
                Utc::now().timestamp(),
                0,
                0,
                false,
                Some(e.to_string()),
            );
            Err(e)
        }
    }
}

fn run_maintenance(
    db: &Database,
    fetcher: &HttpFetcher,
    config: CheckConfig,
    run_tag: String,
    notifier: &TelegramNotifier,
) {
    info!("starting maintenance checks");
    let checker = ListingChecker::new(db, fetcher, config, run_tag);

    let linked = match checker.check_linked() {
        Ok(stats) => stats,
        Err(e) => {
            error!("linked listings check failed: {e}");
            return;
        }
    };
    let unlinked = match checker.check_unlinked() {
        Ok(stats) => stats,
        Err(e) => {
            error!("unlinked listings check failed: {e}");
            return;
        }
    };

    if !notifier.send_maintenance_report(&linked, &unlinked) {
        error!("failed to send maintenance report");
    }
}

fn scrape_and_store(
    db: &Database,
    fetcher: &HttpFetcher,
    config: &ScrapeConfig,
) -> Result<RunReport, Box<dyn std::error::Error>> {
    // known URLs for dedup, one consistent lookback window
    let known: HashSet<String> =
        listings::recent_urls(db, config.dedup_lookback_days, config.dedup_url_cap)?
            .into_iter()
            .collect();
    info!("loaded {} known urls for dedup", known.len());

    // URL collection across index pages
    let collector = ListingCollector::new(fetcher, config, known);
    let collected = collector.collect()?;
    info!(
        "{} candidate urls seen, {} already known",
        collected.urls_found, collected.known_seen
    );

    // detail extraction, one URL at a time
    let total = collected.new_urls.len();
    let mut drafts = Vec::new();
    let mut errors = 0usize;
    for (i, url) in collected.new_urls.iter().enumerate() {
        info!("detail {}/{total}: {url}", i + 1);
        match fetcher
            .get(url)
            .and_then(|html| extract::extract_listing(&html, url))
        {
            Ok(draft) => drafts.push(draft),
            Err(e) => {
                warn!("skipping {url}: {e}");
                errors += 1;
            }
        }
        if i + 1 < total {
            std::thread::sleep(config.request_delay);
        }
    }

    // normalization + zipcode mapping
    let mut processor = DataProcessor::new(db);
    let processed = processor.process_batch(drafts);

    // batch insert with per-row fallback
    let inserted = listings::insert_batch(db, &processed)?;
    for failure in &inserted.failures {
        warn!("failed to store listing {}: {}", failure.id, failure.reason);
    }
    let duplicates = inserted
        .failures
        .iter()
        .filter(|f| f.reason == "duplicate url")
        .count();

    // only successfully stored listings get linked
    let failed_ids: HashSet<&str> = inserted.failures.iter().map(|f| f.id.as_str()).collect();
    let stored: Vec<Listing> = processed
        .iter()
        .filter(|listing| !failed_ids.contains(listing.id.as_str()))
        .cloned()
        .collect();
    let linked = matcher::link_new_listings(db, &stored)?;

    Ok(RunReport {
        pages_processed: collected.pages_processed,
        cars_found: total,
        cars_new: inserted.stored,
        cars_linked: linked,
        cars_duplicate: duplicates,
        detail_pages_fetched: total,
        errors,
        duration_secs: 0,
        finished_at: String::new(),
    })
}
