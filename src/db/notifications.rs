use crate::db::connection::Database;
use crate::errors::StoreError;
use chrono::{DateTime, Utc};
use rusqlite::params;
use serde_json::Value;

pub const TYPE_LISTING_DELETED: &str = "listing_deleted";
pub const TYPE_PRICE_CHANGED: &str = "price_changed";

pub fn insert(
    db: &Database,
    user_id: &str,
    notification_type: &str,
    title: &str,
    message: &str,
    data: &Value,
    now: DateTime<Utc>,
) -> Result<(), StoreError> {
    let data_json = serde_json::to_string(data).map_err(|e| StoreError::BadData(e.to_string()))?;
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO notifications (user_id, type, title, message, data, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![user_id, notification_type, title, message, data_json, now],
        )
        .map_err(|e| StoreError::DbError(e.to_string()))?;
        Ok(())
    })
}
