//! Periodic freshness sweeps over stored listings. Two classes run with
//! different intervals and batch sizes: listings some user follows, and
//! the rest. The candidate sets may overlap; both paths are idempotent.
//!
//! Per listing: a HEAD probe decides existence; a live listing gets a
//! full re-fetch and the price cascade re-run. Transitions write state,
//! trash links and queue notifications. An item failure never aborts the
//! batch.

use crate::config::CheckConfig;
use crate::db::connection::Database;
use crate::db::listings::DueListing;
use crate::db::{links, listings, notifications};
use crate::domain::{PriceChange, SOURCE_SITE};
use crate::errors::StoreError;
use crate::scraper::extract;
use crate::scraper::fetch::PageFetcher;
use chrono::Utc;
use serde_json::json;
use tracing::{error, info, warn};

#[derive(Debug, Default, Clone, Copy)]
pub struct CheckStats {
    pub checked: u32,
    pub deleted: u32,
    pub price_changes: u32,
    pub errors: u32,
}

pub struct ListingChecker<'a, F: PageFetcher> {
    db: &'a Database,
    fetcher: &'a F,
    config: CheckConfig,
    run_id: String,
}

impl<'a, F: PageFetcher> ListingChecker<'a, F> {
    pub fn new(db: &'a Database, fetcher: &'a F, config: CheckConfig, run_id: String) -> Self {
        Self {
            db,
            fetcher,
            config,
            run_id,
        }
    }

    /// Listings followed by at least one user, every 6 hours by default.
    pub fn check_linked(&self) -> Result<CheckStats, StoreError> {
        let cutoff = Utc::now() - self.config.linked_interval;
        let due = listings::due_for_check(self.db, cutoff, self.config.linked_batch_size, true)?;
        Ok(self.check_batch(due, "linked"))
    }

    /// Everything else, weekly by default.
    pub fn check_unlinked(&self) -> Result<CheckStats, StoreError> {
        let cutoff = Utc::now() - self.config.unlinked_interval;
        let due = listings::due_for_check(self.db, cutoff, self.config.unlinked_batch_size, false)?;
        Ok(self.check_batch(due, "unlinked"))
    }

    fn check_batch(&self, due: Vec<DueListing>, label: &str) -> CheckStats {
        let mut stats = CheckStats::default();
        if due.is_empty() {
            return stats;
        }

        info!("checking {} {label} listings", due.len());
        let total = due.len();

        for (i, listing) in due.iter().enumerate() {
            if let Err(e) = self.check_one(listing, &mut stats) {
                error!("error checking listing {}: {e}", listing.id);
                stats.errors += 1;
            }
            stats.checked += 1;

            if i + 1 < total {
                std::thread::sleep(self.config.request_delay);
            }
        }

        info!(
            "{label} check done: {} checked, {} deleted, {} price changes, {} errors",
            stats.checked, stats.deleted, stats.price_changes, stats.errors
        );
        stats
    }

    fn check_one(&self, listing: &DueListing, stats: &mut CheckStats) -> Result<(), StoreError> {
        let now = Utc::now();

        if !self.still_exists(&listing.url) {
            self.handle_deleted(listing, now)?;
            stats.deleted += 1;
            return Ok(());
        }

        let current_price = match self.fetcher.get(&listing.url) {
            Ok(html) => extract::extract_price(&html).map(|euros| euros * 100),
            Err(e) => {
                warn!("price re-check fetch failed for {}: {e}", listing.url);
                None
            }
        };

        if let Some(new_price) = current_price {
            if Some(new_price) != listing.price {
                self.handle_price_change(listing, new_price, now)?;
                stats.price_changes += 1;
                return Ok(());
            }
        }

        listings::touch_checked(self.db, &listing.id, now)
    }

    fn still_exists(&self, url: &str) -> bool {
        match self.fetcher.head(url) {
            Ok(status) => (200..400).contains(&status),
            Err(e) => {
                warn!("existence probe failed for {url}: {e}");
                false
            }
        }
    }

    fn handle_deleted(
        &self,
        listing: &DueListing,
        now: chrono::DateTime<Utc>,
    ) -> Result<(), StoreError> {
        info!("listing {} gone from source", listing.id);

        let affected = links::user_ids_for_listing(self.db, &listing.id)?;
        listings::mark_deleted(self.db, &listing.id, now)?;
        links::trash_for_listing(self.db, &listing.id, now)?;

        for user_id in &affected {
            notifications::insert(
                self.db,
                user_id,
                notifications::TYPE_LISTING_DELETED,
                "Annonce supprimée",
                "Une annonce que vous suivez a été supprimée du site source.",
                &json!({ "listing_id": listing.id }),
                now,
            )?;
        }
        Ok(())
    }

    fn handle_price_change(
        &self,
        listing: &DueListing,
        new_price: i64,
        now: chrono::DateTime<Utc>,
    ) -> Result<(), StoreError> {
        info!(
            "price change for listing {}: {:?} -> {new_price}",
            listing.id, listing.price
        );

        let entry = PriceChange {
            timestamp: now,
            old_price: listing.price,
            new_price,
            source: SOURCE_SITE.to_string(),
            run_id: self.run_id.clone(),
        };
        listings::apply_price_change(self.db, &listing.id, new_price, &entry)?;

        // Notification amounts are displayed in whole euros.
        let old_euros = listing.price.unwrap_or(0) / 100;
        let new_euros = new_price / 100;
        let message = format!(
            "Le prix d'une annonce que vous suivez a changé: {old_euros}€ → {new_euros}€"
        );

        for user_id in links::user_ids_for_listing(self.db, &listing.id)? {
            notifications::insert(
                self.db,
                &user_id,
                notifications::TYPE_PRICE_CHANGED,
                "Prix modifié",
                &message,
                &json!({
                    "listing_id": listing.id,
                    "old_price": listing.price,
                    "new_price": new_price,
                }),
                now,
            )?;
        }
        Ok(())
    }
}
