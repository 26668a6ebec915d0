//! Pre-upload processing: turns extraction drafts into storable records.
//! Normalizes enum fields, converts euro prices to cents, resolves the
//! location's zipcode against the zipcodes table (cached per processor
//! instance), and coerces bad numerics to None.

use crate::db::connection::Database;
use crate::db::zipcodes;
use crate::domain::{FuelType, Listing, Transmission};
use crate::scraper::models::RawListing;
use crate::scraper::normalize::{
    extract_zipcode, normalize_brand, normalize_fuel_type, normalize_transmission, parse_year,
};
use crate::scraper::ScrapeError;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{info, warn};

pub struct DataProcessor<'a> {
    db: &'a Database,
    zipcode_cache: HashMap<String, Option<i64>>,
}

impl<'a> DataProcessor<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self {
            db,
            zipcode_cache: HashMap::new(),
        }
    }

    /// Process a batch of drafts. A draft that fails is logged and
    /// skipped; the rest of the batch continues.
    pub fn process_batch(&mut self, raw_listings: Vec<RawListing>) -> Vec<Listing> {
        let total = raw_listings.len();
        let mut processed = Vec::with_capacity(total);

        for raw in raw_listings {
            let id = raw.id.clone().unwrap_or_else(|| "unknown".to_string());
            match self.build_listing(raw) {
                Ok(listing) => processed.push(listing),
                Err(e) => warn!("skipping listing {id}: {e}"),
            }
        }

        info!("processed {}/{} listings", processed.len(), total);
        processed
    }

    fn build_listing(&mut self, raw: RawListing) -> Result<Listing, ScrapeError> {
        let id = raw
            .id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ScrapeError::Rejected("missing id".to_string()))?
            .to_string();
        if raw.url.is_empty() {
            return Err(ScrapeError::Rejected("missing url".to_string()));
        }

        let mut listing = Listing::new(id, raw.url.clone());

        listing.brand = raw
            .brand
            .as_deref()
            .map(normalize_brand)
            .filter(|b| !b.is_empty());
        listing.model = non_empty(raw.model);

        listing.year = raw
            .year
            .as_deref()
            .and_then(|y| parse_year(&Value::String(y.to_string())));
        listing.mileage = raw.mileage.filter(|m| *m > 0);

        // Extraction yields whole euros; everything downstream is cents.
        listing.price = raw.price.filter(|p| *p > 0).map(|p| p * 100);
        listing.estimated_price = raw
            .estimated_price
            .filter(|p| *p > 0)
            .map(|p| p * 100)
            .or(listing.price);

        listing.fuel_type = raw
            .fuel_type
            .as_deref()
            .map(normalize_fuel_type)
            .unwrap_or(FuelType::Unknown);
        listing.transmission = raw
            .transmission
            .as_deref()
            .map(normalize_transmission)
            .unwrap_or(Transmission::Unknown);

        listing.description = non_empty(raw.description);
        listing.seller_name = non_empty(raw.seller_name);
        listing.seller_phone = non_empty(raw.seller_phone);
        listing.seller_email = non_empty(raw.seller_email);
        listing.image_url = raw.image_url;
        listing.location = non_empty(raw.location);

        listing.source_zipcode_id = listing
            .location
            .as_deref()
            .and_then(extract_zipcode)
            .and_then(|zip| self.zipcode_id(&zip));

        Ok(listing)
    }

    fn zipcode_id(&mut self, zipcode: &str) -> Option<i64> {
        if let Some(cached) = self.zipcode_cache.get(zipcode) {
            return *cached;
        }
        let resolved = match zipcodes::id_for(self.db, zipcode) {
            Ok(id) => id,
            Err(e) => {
                warn!("zipcode lookup failed for {zipcode}: {e}");
                None
            }
        };
        self.zipcode_cache.insert(zipcode.to_string(), resolved);
        resolved
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
