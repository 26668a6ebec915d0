//! Links freshly stored listings to the users whose saved search they
//! satisfy. One link per (user, listing) pair, ever.

use crate::db::connection::Database;
use crate::db::{links, users};
use crate::domain::{Listing, UserPreference};
use crate::errors::StoreError;
use chrono::{Datelike, Utc};
use std::collections::HashSet;
use tracing::info;

const DEFAULT_PRICE_MIN: i64 = 0;
const DEFAULT_PRICE_MAX: i64 = 1_000_000;
const DEFAULT_MILEAGE_MIN: i64 = 0;
const DEFAULT_MILEAGE_MAX: i64 = 200_000;

/// All conditions must hold. Preference price bounds are whole euros and
/// listing prices are cents, so bounds are scaled by 100 here and nowhere
/// else.
pub fn matches_preferences(
    listing: &Listing,
    pref: &UserPreference,
    zip_prefs: &HashSet<i64>,
) -> bool {
    let price_min_cents = pref.price_min.unwrap_or(DEFAULT_PRICE_MIN) * 100;
    let price_max_cents = pref.price_max.unwrap_or(DEFAULT_PRICE_MAX) * 100;
    let price = listing.price.unwrap_or(0);
    if price < price_min_cents || price > price_max_cents {
        return false;
    }

    let mileage_min = pref.mileage_min.unwrap_or(DEFAULT_MILEAGE_MIN);
    let mileage_max = pref.mileage_max.unwrap_or(DEFAULT_MILEAGE_MAX);
    let mileage = listing.mileage.unwrap_or(0);
    if mileage < mileage_min || mileage > mileage_max {
        return false;
    }

    if let Some(year) = listing.year.map(|date| date.year()) {
        if let Some(year_min) = pref.year_min {
            if year < year_min {
                return false;
            }
        }
        if let Some(year_max) = pref.year_max {
            if year > year_max {
                return false;
            }
        }
    }

    // Zipcode check only applies when both sides have data.
    if !zip_prefs.is_empty() {
        if let Some(zipcode_id) = listing.source_zipcode_id {
            if !zip_prefs.contains(&zipcode_id) {
                return false;
            }
        }
    }

    if !pref.brands.is_empty() {
        let Some(brand) = &listing.brand else {
            return false;
        };
        if !pref.brands.iter().any(|b| b.eq_ignore_ascii_case(brand)) {
            return false;
        }
    }

    if !pref.fuel_types.is_empty()
        && !pref
            .fuel_types
            .iter()
            .any(|f| f.eq_ignore_ascii_case(listing.fuel_type.as_str()))
    {
        return false;
    }

    if !pref.transmissions.is_empty()
        && !pref
            .transmissions
            .iter()
            .any(|t| t.eq_ignore_ascii_case(listing.transmission.as_str()))
    {
        return false;
    }

    true
}

/// Create links for every (user, listing) pair that matches and is not
/// already linked. Returns the number of links created; zero matches is
/// a normal outcome.
pub fn link_new_listings(db: &Database, listings: &[Listing]) -> Result<u32, StoreError> {
    let prefs = users::all_preferences(db)?;
    if prefs.is_empty() {
        info!("no users with preferences, nothing to link");
        return Ok(0);
    }
    let zip_prefs = users::zipcode_prefs(db)?;
    let no_zips = HashSet::new();

    let now = Utc::now();
    let mut linked = 0u32;

    for listing in listings {
        for pref in &prefs {
            let zips = zip_prefs.get(&pref.id).unwrap_or(&no_zips);
            if matches_preferences(listing, pref, zips)
                && !links::exists(db, &pref.id, &listing.id)?
            {
                links::create(db, &pref.id, &listing.id, now)?;
                linked += 1;
            }
        }
    }

    info!("created {linked} user-listing links");
    Ok(linked)
}
