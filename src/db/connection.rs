use rusqlite::Connection;
use std::cell::RefCell;

use crate::errors::StoreError;

const SCHEMA_SQL: &str = include_str!("../../sql/schema.sql");

// Thread-local connection slot: the run is sequential, so each thread
// lazily opens one connection to the configured path and keeps it.
thread_local! {
    static DB_CONN: RefCell<Option<Connection>> = const { RefCell::new(None) };
}

#[derive(Clone)]
pub struct Database {
    path: String,
}

impl Database {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    /// Provides a mutable connection to the closure.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StoreError>,
    {
        DB_CONN
            .try_with(|cell| {
                let mut slot = cell.borrow_mut();
                if slot.is_none() {
                    let conn = Connection::open(&self.path)
                        .map_err(|e| StoreError::DbError(format!("open db failed: {e}")))?;
                    conn.pragma_update(None, "foreign_keys", "ON")
                        .map_err(|e| StoreError::DbError(e.to_string()))?;
                    *slot = Some(conn);
                }
                let conn = match slot.as_mut() {
                    Some(conn) => conn,
                    None => return Err(StoreError::InternalError),
                };
                f(conn)
            })
            .map_err(|_| StoreError::InternalError)?
    }
}

/// Apply the embedded schema. Idempotent; every statement is
/// CREATE ... IF NOT EXISTS.
pub fn init_db(db: &Database) -> Result<(), StoreError> {
    db.with_conn(|conn| {
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| StoreError::DbError(format!("failed to apply schema: {e}")))
    })
}
