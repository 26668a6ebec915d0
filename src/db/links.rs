use crate::db::connection::Database;
use crate::errors::StoreError;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

pub const STATUS_NEW: &str = "new";
pub const STATUS_TRASHED: &str = "trashed";

pub fn exists(db: &Database, user_id: &str, listing_id: &str) -> Result<bool, StoreError> {
    db.with_conn(|conn| {
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM user_listings WHERE user_id = ?1 AND listing_id = ?2",
                params![user_id, listing_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| StoreError::DbError(e.to_string()))?;
        Ok(found.is_some())
    })
}

pub fn create(
    db: &Database,
    user_id: &str,
    listing_id: &str,
    now: DateTime<Utc>,
) -> Result<(), StoreError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO user_listings (user_id, listing_id, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![user_id, listing_id, STATUS_NEW, now],
        )
        .map_err(|e| StoreError::DbError(e.to_string()))?;
        Ok(())
    })
}

/// Users currently linked to a listing, whatever the link status.
pub fn user_ids_for_listing(db: &Database, listing_id: &str) -> Result<Vec<String>, StoreError> {
    db.with_conn(|conn| {
        let mut stmt = conn
            .prepare("SELECT user_id FROM user_listings WHERE listing_id = ?1")
            .map_err(|e| StoreError::DbError(e.to_string()))?;
        let rows = stmt
            .query_map(params![listing_id], |row| row.get::<_, String>(0))
            .map_err(|e| StoreError::DbError(e.to_string()))?;

        let mut users = Vec::new();
        for row in rows {
            users.push(row.map_err(|e| StoreError::DbError(e.to_string()))?);
        }
        Ok(users)
    })
}

/// Move every link for a deleted listing to the trashed status. Returns
/// the number of links affected.
pub fn trash_for_listing(
    db: &Database,
    listing_id: &str,
    now: DateTime<Utc>,
) -> Result<usize, StoreError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE user_listings SET status = ?1, updated_at = ?2 WHERE listing_id = ?3",
            params![STATUS_TRASHED, now, listing_id],
        )
        .map_err(|e| StoreError::DbError(e.to_string()))
    })
}
