use crate::db::connection::Database;
use crate::domain::{FuelType, Listing, PriceChange, Transmission};
use crate::errors::StoreError;
use chrono::{DateTime, Duration, Utc};
use rusqlite::types::ToSql;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::warn;

const LISTING_COLUMNS: &str = r#"id, url, source_site, brand, model, year, mileage, price,
    estimated_price, fuel_type, transmission, description, seller_name, seller_phone,
    seller_email, image_url, location, source_zipcode_id, "exists", price_history,
    date_added, created_at, updated_at"#;

const COLUMN_COUNT: usize = 23;

#[derive(Debug)]
pub struct InsertFailure {
    pub id: String,
    pub reason: String,
}

#[derive(Debug)]
pub struct InsertOutcome {
    pub stored: usize,
    pub failures: Vec<InsertFailure>,
}

/// A stored listing row as selected for a re-check sweep.
#[derive(Debug, Clone)]
pub struct DueListing {
    pub id: String,
    pub url: String,
    pub price: Option<i64>,
}

/// URLs stored within the lookback window, newest first, capped. Used to
/// preload the collector's dedup set.
pub fn recent_urls(db: &Database, days: i64, limit: u32) -> Result<Vec<String>, StoreError> {
    let threshold = Utc::now() - Duration::days(days);
    db.with_conn(|conn| {
        let mut stmt = conn
            .prepare("SELECT url FROM listings WHERE created_at >= ?1 ORDER BY created_at DESC LIMIT ?2")
            .map_err(|e| StoreError::DbError(e.to_string()))?;
        let rows = stmt
            .query_map(params![threshold, limit], |row| row.get::<_, String>(0))
            .map_err(|e| StoreError::DbError(e.to_string()))?;

        let mut urls = Vec::new();
        for row in rows {
            urls.push(row.map_err(|e| StoreError::DbError(e.to_string()))?);
        }
        Ok(urls)
    })
}

/// Batch insert with fallback: one multi-row INSERT first; if that fails,
/// each row is inserted individually behind a duplicate-URL pre-check and
/// failures are captured per row instead of aborting the lot.
pub fn insert_batch(db: &Database, listings: &[Listing]) -> Result<InsertOutcome, StoreError> {
    if listings.is_empty() {
        return Ok(InsertOutcome {
            stored: 0,
            failures: Vec::new(),
        });
    }

    db.with_conn(|conn| match insert_all(conn, listings) {
        Ok(()) => Ok(InsertOutcome {
            stored: listings.len(),
            failures: Vec::new(),
        }),
        Err(e) => {
            warn!("batch insert failed ({e}), falling back to per-row inserts");
            let mut stored = 0;
            let mut failures = Vec::new();
            for listing in listings {
                match insert_one_checked(conn, listing) {
                    Ok(true) => stored += 1,
                    Ok(false) => failures.push(InsertFailure {
                        id: listing.id.clone(),
                        reason: "duplicate url".to_string(),
                    }),
                    Err(e) => failures.push(InsertFailure {
                        id: listing.id.clone(),
                        reason: e.to_string(),
                    }),
                }
            }
            Ok(InsertOutcome { stored, failures })
        }
    })
}

fn insert_all(conn: &mut Connection, listings: &[Listing]) -> Result<(), StoreError> {
    let tx = conn
        .transaction()
        .map_err(|e| StoreError::DbError(e.to_string()))?;

    let row_placeholder = format!("({})", vec!["?"; COLUMN_COUNT].join(", "));
    let placeholders = vec![row_placeholder; listings.len()].join(", ");
    let sql = format!("INSERT INTO listings ({LISTING_COLUMNS}) VALUES {placeholders}");

    let mut values: Vec<Box<dyn ToSql>> = Vec::with_capacity(listings.len() * COLUMN_COUNT);
    for listing in listings {
        values.extend(listing_values(listing)?);
    }
    let refs: Vec<&dyn ToSql> = values.iter().map(|v| v.as_ref()).collect();

    tx.execute(&sql, refs.as_slice())
        .map_err(|e| StoreError::DbError(e.to_string()))?;
    tx.commit().map_err(|e| StoreError::DbError(e.to_string()))
}

/// Per-row fallback path. Ok(false) means the URL already exists.
fn insert_one_checked(conn: &Connection, listing: &Listing) -> Result<bool, StoreError> {
    let existing: Option<String> = conn
        .query_row(
            "SELECT id FROM listings WHERE url = ?1",
            params![listing.url],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| StoreError::DbError(e.to_string()))?;
    if existing.is_some() {
        return Ok(false);
    }

    let row_placeholder = format!("({})", vec!["?"; COLUMN_COUNT].join(", "));
    let sql = format!("INSERT INTO listings ({LISTING_COLUMNS}) VALUES {row_placeholder}");
    let values = listing_values(listing)?;
    let refs: Vec<&dyn ToSql> = values.iter().map(|v| v.as_ref()).collect();

    conn.execute(&sql, refs.as_slice())
        .map_err(|e| StoreError::DbError(e.to_string()))?;
    Ok(true)
}

fn listing_values(listing: &Listing) -> Result<Vec<Box<dyn ToSql>>, StoreError> {
    let image_json = serde_json::to_string(&listing.image_url)
        .map_err(|e| StoreError::BadData(e.to_string()))?;
    let history_json = serde_json::to_string(&listing.price_history)
        .map_err(|e| StoreError::BadData(e.to_string()))?;

    Ok(vec![
        Box::new(listing.id.clone()),
        Box::new(listing.url.clone()),
        Box::new(listing.source_site.clone()),
        Box::new(listing.brand.clone()),
        Box::new(listing.model.clone()),
        Box::new(listing.year),
        Box::new(listing.mileage),
        Box::new(listing.price),
        Box::new(listing.estimated_price),
        Box::new(listing.fuel_type.as_str()),
        Box::new(listing.transmission.as_str()),
        Box::new(listing.description.clone()),
        Box::new(listing.seller_name.clone()),
        Box::new(listing.seller_phone.clone()),
        Box::new(listing.seller_email.clone()),
        Box::new(image_json),
        Box::new(listing.location.clone()),
        Box::new(listing.source_zipcode_id),
        Box::new(listing.exists),
        Box::new(history_json),
        Box::new(listing.date_added),
        Box::new(listing.created_at),
        Box::new(listing.updated_at),
    ])
}

/// Listings due for a freshness check: still existing, not touched since
/// the cutoff, oldest first. `linked_only` restricts to listings some user
/// is linked to.
pub fn due_for_check(
    db: &Database,
    cutoff: DateTime<Utc>,
    limit: u32,
    linked_only: bool,
) -> Result<Vec<DueListing>, StoreError> {
    let linked_clause = if linked_only {
        "AND id IN (SELECT listing_id FROM user_listings)"
    } else {
        ""
    };
    let sql = format!(
        r#"SELECT id, url, price FROM listings
           WHERE "exists" = 1 AND updated_at < ?1 {linked_clause}
           ORDER BY updated_at ASC LIMIT ?2"#
    );

    db.with_conn(|conn| {
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| StoreError::DbError(e.to_string()))?;
        let rows = stmt
            .query_map(params![cutoff, limit], |row| {
                Ok(DueListing {
                    id: row.get(0)?,
                    url: row.get(1)?,
                    price: row.get(2)?,
                })
            })
            .map_err(|e| StoreError::DbError(e.to_string()))?;

        let mut due = Vec::new();
        for row in rows {
            due.push(row.map_err(|e| StoreError::DbError(e.to_string()))?);
        }
        Ok(due)
    })
}

/// The listing disappeared from the source. The row stays, flagged.
pub fn mark_deleted(db: &Database, id: &str, now: DateTime<Utc>) -> Result<(), StoreError> {
    db.with_conn(|conn| {
        conn.execute(
            r#"UPDATE listings SET "exists" = 0, updated_at = ?1 WHERE id = ?2"#,
            params![now, id],
        )
        .map_err(|e| StoreError::DbError(e.to_string()))?;
        Ok(())
    })
}

/// Append one entry to the price history and move the stored price.
pub fn apply_price_change(
    db: &Database,
    id: &str,
    new_price: i64,
    entry: &PriceChange,
) -> Result<(), StoreError> {
    db.with_conn(|conn| {
        let history_json: String = conn
            .query_row(
                "SELECT price_history FROM listings WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .map_err(|e| StoreError::DbError(e.to_string()))?;

        let mut history: Vec<PriceChange> =
            serde_json::from_str(&history_json).unwrap_or_default();
        history.push(entry.clone());
        let updated_json =
            serde_json::to_string(&history).map_err(|e| StoreError::BadData(e.to_string()))?;

        conn.execute(
            "UPDATE listings SET price = ?1, price_history = ?2, updated_at = ?3 WHERE id = ?4",
            params![new_price, updated_json, entry.timestamp, id],
        )
        .map_err(|e| StoreError::DbError(e.to_string()))?;
        Ok(())
    })
}

/// Advance updated_at after a check, whatever its outcome was.
pub fn touch_checked(db: &Database, id: &str, now: DateTime<Utc>) -> Result<(), StoreError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE listings SET updated_at = ?1 WHERE id = ?2",
            params![now, id],
        )
        .map_err(|e| StoreError::DbError(e.to_string()))?;
        Ok(())
    })
}

pub fn get(db: &Database, id: &str) -> Result<Option<Listing>, StoreError> {
    let sql = format!("SELECT {LISTING_COLUMNS} FROM listings WHERE id = ?1");
    db.with_conn(|conn| {
        conn.query_row(&sql, params![id], row_to_listing)
            .optional()
            .map_err(|e| StoreError::DbError(e.to_string()))
    })
}

fn row_to_listing(row: &Row<'_>) -> rusqlite::Result<Listing> {
    let image_json: String = row.get(15)?;
    let history_json: String = row.get(19)?;
    let fuel: String = row.get(9)?;
    let transmission: String = row.get(10)?;

    Ok(Listing {
        id: row.get(0)?,
        url: row.get(1)?,
        source_site: row.get(2)?,
        brand: row.get(3)?,
        model: row.get(4)?,
        year: row.get(5)?,
        mileage: row.get(6)?,
        price: row.get(7)?,
        estimated_price: row.get(8)?,
        fuel_type: FuelType::from_db(&fuel),
        transmission: Transmission::from_db(&transmission),
        description: row.get(11)?,
        seller_name: row.get(12)?,
        seller_phone: row.get(13)?,
        seller_email: row.get(14)?,
        image_url: serde_json::from_str(&image_json).unwrap_or_default(),
        location: row.get(16)?,
        source_zipcode_id: row.get(17)?,
        exists: row.get(18)?,
        price_history: serde_json::from_str(&history_json).unwrap_or_default(),
        date_added: row.get(20)?,
        created_at: row.get(21)?,
        updated_at: row.get(22)?,
    })
}
