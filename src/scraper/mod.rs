pub mod collector;
pub mod extract;
pub mod fetch;
pub mod models;
pub mod normalize;
mod scrape_error;

pub use scrape_error::ScrapeError;
