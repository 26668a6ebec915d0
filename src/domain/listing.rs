use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const SOURCE_SITE: &str = "autoscout24";

/// Canonical fuel types. Raw site values are folded into these by the
/// normalizer; anything unrecognized stays Unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FuelType {
    Gasoline,
    Diesel,
    Electric,
    Hybrid,
    Other,
    Unknown,
}

impl FuelType {
    pub const ALL: [FuelType; 6] = [
        FuelType::Gasoline,
        FuelType::Diesel,
        FuelType::Electric,
        FuelType::Hybrid,
        FuelType::Other,
        FuelType::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FuelType::Gasoline => "Gasoline",
            FuelType::Diesel => "Diesel",
            FuelType::Electric => "Electric",
            FuelType::Hybrid => "Hybrid",
            FuelType::Other => "Other",
            FuelType::Unknown => "Unknown",
        }
    }

    pub fn from_db(s: &str) -> FuelType {
        FuelType::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .unwrap_or(FuelType::Unknown)
    }
}

impl fmt::Display for FuelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transmission {
    Manual,
    Automatic,
    SemiAutomatic,
    Unknown,
}

impl Transmission {
    pub const ALL: [Transmission; 4] = [
        Transmission::Manual,
        Transmission::Automatic,
        Transmission::SemiAutomatic,
        Transmission::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Transmission::Manual => "Manual",
            Transmission::Automatic => "Automatic",
            Transmission::SemiAutomatic => "Semi-automatic",
            Transmission::Unknown => "Unknown",
        }
    }

    pub fn from_db(s: &str) -> Transmission {
        Transmission::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .unwrap_or(Transmission::Unknown)
    }
}

impl fmt::Display for Transmission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the append-only price history kept per listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceChange {
    pub timestamp: DateTime<Utc>,
    pub old_price: Option<i64>,
    pub new_price: i64,
    pub source: String,
    pub run_id: String,
}

/// One scraped vehicle-for-sale record, as persisted.
///
/// Prices are integer cents. `year` is January 1st of the calendar year.
/// `exists` stays true until a re-check finds the source page gone.
#[derive(Debug, Clone)]
pub struct Listing {
    pub id: String,
    pub url: String,
    pub source_site: String,

    pub brand: Option<String>,
    pub model: Option<String>,
    pub year: Option<NaiveDate>,
    pub mileage: Option<i64>,
    pub price: Option<i64>,
    pub estimated_price: Option<i64>,

    pub fuel_type: FuelType,
    pub transmission: Transmission,

    pub description: Option<String>,
    pub seller_name: Option<String>,
    pub seller_phone: Option<String>,
    pub seller_email: Option<String>,

    pub image_url: Vec<String>,
    pub location: Option<String>,
    pub source_zipcode_id: Option<i64>,

    pub exists: bool,
    pub price_history: Vec<PriceChange>,

    pub date_added: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Listing {
    pub fn new(id: String, url: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            url,
            source_site: SOURCE_SITE.to_string(),
            brand: None,
            model: None,
            year: None,
            mileage: None,
            price: None,
            estimated_price: None,
            fuel_type: FuelType::Unknown,
            transmission: Transmission::Unknown,
            description: None,
            seller_name: None,
            seller_phone: None,
            seller_email: None,
            image_url: Vec::new(),
            location: None,
            source_zipcode_id: None,
            exists: true,
            price_history: Vec::new(),
            date_added: now.date_naive(),
            created_at: now,
            updated_at: now,
        }
    }
}
