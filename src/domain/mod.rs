mod listing;
mod preferences;

pub use listing::{FuelType, Listing, PriceChange, Transmission, SOURCE_SITE};
pub use preferences::UserPreference;
