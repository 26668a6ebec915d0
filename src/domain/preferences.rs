/// A user's saved search, read from the users table. Lifecycle is owned
/// by the app that writes it; this side only matches against it.
#[derive(Debug, Clone, Default)]
pub struct UserPreference {
    pub id: String,

    // Ranges are in the listing's native units: whole euros for price,
    // km for mileage. Cent conversion happens at match time.
    pub price_min: Option<i64>,
    pub price_max: Option<i64>,
    pub mileage_min: Option<i64>,
    pub mileage_max: Option<i64>,
    pub year_min: Option<i32>,
    pub year_max: Option<i32>,

    // Empty list = no restriction.
    pub brands: Vec<String>,
    pub fuel_types: Vec<String>,
    pub transmissions: Vec<String>,
}
