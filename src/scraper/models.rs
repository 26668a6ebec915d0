use serde::Deserialize;
use serde_json::Value;

// A detail page is mined in several passes (JSON-LD, embedded state,
// regex fallbacks). Each pass produces a partial draft; merging only ever
// fills fields that are still empty, so the earliest strategy to find a
// value wins.

/// Extraction draft for one detail page. Prices are still whole euros
/// here; the processor converts to cents when it builds the stored record.
#[derive(Debug, Default, Clone)]
pub struct RawListing {
    pub id: Option<String>,
    pub url: String,
    pub source_site: Option<String>,

    pub title: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub year: Option<String>,
    pub mileage: Option<i64>,
    pub price: Option<i64>,
    pub estimated_price: Option<i64>,

    pub fuel_type: Option<String>,
    pub transmission: Option<String>,

    pub description: Option<String>,
    pub seller_name: Option<String>,
    pub seller_phone: Option<String>,
    pub seller_email: Option<String>,

    pub image_url: Vec<String>,
    pub location: Option<String>,
}

impl RawListing {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            ..Default::default()
        }
    }

    /// Fill-only merge: a field already populated by an earlier strategy
    /// is never overwritten by a later one.
    pub fn fill_from(&mut self, other: RawListing) {
        fill(&mut self.id, other.id);
        fill(&mut self.source_site, other.source_site);
        fill(&mut self.title, other.title);
        fill(&mut self.brand, other.brand);
        fill(&mut self.model, other.model);
        fill(&mut self.year, other.year);
        fill(&mut self.mileage, other.mileage);
        fill(&mut self.price, other.price);
        fill(&mut self.estimated_price, other.estimated_price);
        fill(&mut self.fuel_type, other.fuel_type);
        fill(&mut self.transmission, other.transmission);
        fill(&mut self.description, other.description);
        fill(&mut self.seller_name, other.seller_name);
        fill(&mut self.seller_phone, other.seller_phone);
        fill(&mut self.seller_email, other.seller_email);
        if self.image_url.is_empty() {
            self.image_url = other.image_url;
        }
        fill(&mut self.location, other.location);
    }

    /// Count of the "meaningful" fields used by the validation gate.
    pub fn meaningful_field_count(&self) -> usize {
        [
            self.brand.is_some(),
            self.model.is_some(),
            self.price.is_some(),
            self.description.is_some(),
        ]
        .iter()
        .filter(|present| **present)
        .count()
    }
}

fn fill<T>(slot: &mut Option<T>, value: Option<T>) {
    if slot.is_none() {
        *slot = value;
    }
}

// ---------------------------------------------------------------------
// Embedded "listingDetails" payload. The site serializes it with camelCase
// keys; everything is optional because the shape drifts.
// ---------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ListingDetails {
    pub vehicle: Option<VehicleDetails>,
    pub location: Option<LocationDetails>,
    pub description: Option<String>,
    pub images: Option<Value>,
    pub seller: Option<SellerDetails>,
    pub prices: Option<PriceDetails>,
}

#[derive(Debug, Deserialize)]
pub struct VehicleDetails {
    pub make: Option<String>,
    pub model: Option<String>,
    #[serde(rename = "firstRegistrationDateRaw")]
    pub first_registration_date_raw: Option<String>,
    #[serde(rename = "mileageInKmRaw")]
    pub mileage_in_km_raw: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct LocationDetails {
    pub zip: Option<String>,
    pub city: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SellerDetails {
    #[serde(rename = "contactName")]
    pub contact_name: Option<String>,
    pub phones: Option<Vec<Phone>>,
}

#[derive(Debug, Deserialize)]
pub struct Phone {
    #[serde(rename = "formattedNumber")]
    pub formatted_number: Option<String>,
    #[serde(rename = "callTo")]
    pub call_to: Option<String>,
}

impl Phone {
    pub fn best_number(&self) -> Option<String> {
        self.formatted_number
            .clone()
            .or_else(|| self.call_to.clone())
    }
}

#[derive(Debug, Deserialize)]
pub struct PriceDetails {
    pub public: Option<PublicPrice>,
}

#[derive(Debug, Deserialize)]
pub struct PublicPrice {
    #[serde(rename = "priceRaw")]
    pub price_raw: Option<i64>,
    #[serde(rename = "evaluationRanges")]
    pub evaluation_ranges: Option<Vec<EvaluationRange>>,
}

/// A valuation bracket. Category 1 is the bracket the site presents as
/// the fair-price estimate; its upper bound is taken as estimated_price.
#[derive(Debug, Deserialize)]
pub struct EvaluationRange {
    pub category: Option<i64>,
    pub maximum: Option<i64>,
}

pub fn estimated_price_from_ranges(ranges: &[EvaluationRange]) -> Option<i64> {
    ranges
        .iter()
        .find(|r| r.category == Some(1))
        .and_then(|r| r.maximum)
        .filter(|max| *max > 0)
}

// ---------------------------------------------------------------------
// JSON-LD "offers": a single offer object or a list of them.
// ---------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Offers {
    One(Offer),
    Many(Vec<Offer>),
}

#[derive(Debug, Deserialize)]
pub struct Offer {
    pub price: Option<Value>,
}

impl Offers {
    /// First offer with a parseable positive price.
    pub fn first_price(&self) -> Option<i64> {
        let scan = |offer: &Offer| {
            offer
                .price
                .as_ref()
                .and_then(crate::scraper::normalize::parse_numeric)
        };
        match self {
            Offers::One(offer) => scan(offer),
            Offers::Many(offers) => offers.iter().find_map(scan),
        }
    }
}
