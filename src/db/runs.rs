use crate::db::connection::Database;
use crate::errors::StoreError;
use rusqlite::params;

pub fn start_run(db: &Database, now: i64) -> Result<i64, StoreError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO scrape_runs (started_at, success) VALUES (?1, 0)",
            params![now],
        )
        .map_err(|e| StoreError::DbError(e.to_string()))?;
        Ok(conn.last_insert_rowid())
    })
}

pub fn end_run(
    db: &Database,
    run_id: i64,
    now: i64,
    pages: u32,
    listings_seen: usize,
    success: bool,
    error: Option<String>,
) -> Result<(), StoreError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE scrape_runs SET finished_at = ?1, pages_fetched = ?2, listings_seen = ?3,
             success = ?4, error_message = ?5 WHERE id = ?6",
            params![now, pages, listings_seen, success, error, run_id],
        )
        .map_err(|e| StoreError::DbError(e.to_string()))?;
        Ok(())
    })
}
