use crate::db::connection::{init_db, Database};
use crate::domain::Listing;
use crate::scraper::fetch::PageFetcher;
use crate::scraper::ScrapeError;
use chrono::{DateTime, Utc};
use rusqlite::params;
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// Fresh throwaway database using the production schema.
pub fn make_db(tag: &str) -> Database {
    let path = std::env::temp_dir().join(format!(
        "{tag}_{}.sqlite",
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ));
    let db = Database::new(path.to_string_lossy().into_owned());
    init_db(&db).expect("Failed to initialize test DB");
    db
}

/// Canned-response fetcher so pipeline pieces run without a network.
#[derive(Default)]
pub struct StubFetcher {
    pub pages: HashMap<String, String>,
    pub head_status: HashMap<String, u16>,
    pub default_head: u16,
}

impl PageFetcher for StubFetcher {
    fn get(&self, url: &str) -> Result<String, ScrapeError> {
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| ScrapeError::Network(format!("no stub page for {url}")))
    }

    fn head(&self, url: &str) -> Result<u16, ScrapeError> {
        Ok(*self.head_status.get(url).unwrap_or(&self.default_head))
    }
}

pub fn make_listing(id: &str, price_cents: Option<i64>) -> Listing {
    let mut listing = Listing::new(
        id.to_string(),
        format!("https://www.autoscout24.be/fr/offres/test/{id}"),
    );
    listing.brand = Some("BMW".to_string());
    listing.model = Some("318d".to_string());
    listing.price = price_cents;
    listing.estimated_price = price_cents;
    listing
}

pub fn insert_user(db: &Database, id: &str, price_min: Option<i64>, price_max: Option<i64>) {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO users (id, price_min, price_max) VALUES (?1, ?2, ?3)",
            params![id, price_min, price_max],
        )
        .unwrap();
        Ok(())
    })
    .unwrap();
}

pub fn insert_zipcode(db: &Database, id: i64, zipcode: &str, city: &str) {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO zipcodes (id, zipcode, city) VALUES (?1, ?2, ?3)",
            params![id, zipcode, city],
        )
        .unwrap();
        Ok(())
    })
    .unwrap();
}

pub fn set_updated_at(db: &Database, listing_id: &str, when: DateTime<Utc>) {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE listings SET updated_at = ?1 WHERE id = ?2",
            params![when, listing_id],
        )
        .unwrap();
        Ok(())
    })
    .unwrap();
}

pub fn link_status(db: &Database, user_id: &str, listing_id: &str) -> String {
    db.with_conn(|conn| {
        let status: String = conn
            .query_row(
                "SELECT status FROM user_listings WHERE user_id = ?1 AND listing_id = ?2",
                params![user_id, listing_id],
                |row| row.get(0),
            )
            .unwrap();
        Ok(status)
    })
    .unwrap()
}

pub fn notification_count(db: &Database, user_id: &str, notification_type: &str) -> i64 {
    db.with_conn(|conn| {
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND type = ?2",
                params![user_id, notification_type],
                |row| row.get(0),
            )
            .unwrap();
        Ok(count)
    })
    .unwrap()
}
