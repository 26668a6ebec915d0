// errors.rs
use std::fmt;

/// Errors originating from the persistence layer (SQLite access,
/// schema bootstrap, row decoding).
#[derive(Debug)]
pub enum StoreError {
    DbError(String),
    BadData(String),
    InternalError,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::DbError(msg) => write!(f, "Database Error: {msg}"),
            StoreError::BadData(msg) => write!(f, "Bad Data: {msg}"),
            StoreError::InternalError => write!(f, "Internal Error"),
        }
    }
}

impl std::error::Error for StoreError {}
