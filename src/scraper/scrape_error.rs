use std::error::Error;
use std::fmt;

#[derive(Debug)]
pub enum ScrapeError {
    Network(String),
    Config(String),
    HtmlParse(String),
    JsonParse(String),
    UnexpectedShape(String),
    /// Page fetched fine but did not survive the validation gate.
    Rejected(String),
    Store(String),
}

impl fmt::Display for ScrapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScrapeError::Network(msg) => write!(f, "Network error: {msg}"),
            ScrapeError::Config(msg) => write!(f, "Config error: {msg}"),
            ScrapeError::HtmlParse(msg) => write!(f, "HTML parse error: {msg}"),
            ScrapeError::JsonParse(msg) => write!(f, "JSON parse error: {msg}"),
            ScrapeError::UnexpectedShape(msg) => write!(f, "Unexpected data shape: {msg}"),
            ScrapeError::Rejected(msg) => write!(f, "Listing rejected: {msg}"),
            ScrapeError::Store(msg) => write!(f, "Store error: {msg}"),
        }
    }
}

impl Error for ScrapeError {}

impl From<crate::errors::StoreError> for ScrapeError {
    fn from(e: crate::errors::StoreError) -> Self {
        ScrapeError::Store(e.to_string())
    }
}
