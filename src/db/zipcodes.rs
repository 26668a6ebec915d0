use crate::db::connection::Database;
use crate::errors::StoreError;
use rusqlite::{params, OptionalExtension};

pub fn id_for(db: &Database, zipcode: &str) -> Result<Option<i64>, StoreError> {
    db.with_conn(|conn| {
        conn.query_row(
            "SELECT id FROM zipcodes WHERE zipcode = ?1",
            params![zipcode],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| StoreError::DbError(e.to_string()))
    })
}
