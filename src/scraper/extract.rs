//! Detail-page extraction: an ordered cascade of strategies over one
//! fetched page. Strategy order is JSON-LD blocks, listing id from the
//! URL, embedded state JSON, then regex fallbacks over the raw HTML.
//! Merging is fill-only, so whichever strategy finds a field first wins.

use crate::domain::SOURCE_SITE;
use crate::scraper::models::{
    estimated_price_from_ranges, EvaluationRange, ListingDetails, Offers, Phone, RawListing,
};
use crate::scraper::normalize::{clean_description, parse_image_urls, parse_numeric};
use crate::scraper::ScrapeError;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;
use tracing::debug;

// Listing id shapes, most specific URL form first.
static ID_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"/([a-f0-9-]+)(?:\?|$)").unwrap(),
        Regex::new(r"offres/[^/]+/([a-f0-9-]+)").unwrap(),
        Regex::new(r"([a-f0-9]{8}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{12})").unwrap(),
    ]
});

static REG_DATE_RAW_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""firstRegistrationDateRaw":\s*"(\d{4})-\d{2}-\d{2}""#).unwrap());
static REG_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""firstRegistrationDate":\s*"(\d{2})/(\d{4})""#).unwrap());
static MILEAGE_RAW_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""mileageInKmRaw":\s*(\d+)"#).unwrap());
static MILEAGE_TEXT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""mileageInKm":\s*"([^"]+)""#).unwrap());
static LOCATION_OBJ_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""location":\s*\{([^}]+)\}"#).unwrap());
static ZIP_FIELD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#""zip":\s*"([^"]+)""#).unwrap());
static CITY_FIELD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#""city":\s*"([^"]+)""#).unwrap());
static PHONES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#""phones":\s*(\[[^\]]*\])"#).unwrap());
static EVAL_RANGES_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""evaluationRanges":\s*(\[[^\]]*\])"#).unwrap());
static IMAGES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#""images":\s*(\[[^\]]*\])"#).unwrap());
static MODEL_FIELD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#""model":\s*"([^"]*)""#).unwrap());
static DESC_FIELD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""description":\s*"([^"]*)""#).unwrap());
static PRICE_RAW_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#""priceRaw":\s*(\d+)"#).unwrap());
static EURO_PRICE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{1,3}(?:[.,]\d{3})*)\s*€").unwrap());

static FUEL_JSON_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)"fuel_?[tT]ype":\s*"([^"]+)""#).unwrap());
static TRANSMISSION_PHRASE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)boîte\s+manuelle|boite\s+manuelle|boîte\s+automatique|boite\s+automatique|semi-automatique|semi-automatic|manuelle|automatique|manual|automatic")
        .unwrap()
});
static TRANSMISSION_JSON_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)"(?:transmission|vehicleTransmission|gearBox)":\s*"([^"]+)""#).unwrap()
});

// Site-specific description fragments, most structured first.
static DESC_HTML_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r#"(?is)<div[^>]*class="[^"]*description[^"]*"[^>]*>(.*?)</div>"#).unwrap(),
        Regex::new(r#"(?is)<p[^>]*class="[^"]*description[^"]*"[^>]*>(.*?)</p>"#).unwrap(),
        Regex::new(r"(?is)<br /><ul><li>(.*?)</ul>").unwrap(),
    ]
});

// Phrases that start a new line in the re-flowed free text.
const DESC_BREAK_PHRASES: &[&str] = &[
    "Controle technique",
    "Contrôle technique",
    "Entretien des",
    "Remplacement des",
    "Parfait état",
    "Note :",
    "Frais de mise",
    "Climatisation automatique",
];

static LOCATION_TEXT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r#""location":\s*"([^"]+)""#).unwrap(),
        Regex::new(r#""address":\s*"([^"]+)""#).unwrap(),
    ]
});
static BE_ZIP_CITY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"BE-(\d{4})\s+([A-Za-zÀ-ÿ][A-Za-zÀ-ÿ-]{2,})").unwrap());
static ZIP_CITY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{4})\s+([A-Za-zÀ-ÿ][A-Za-zÀ-ÿ-]{2,})").unwrap());
static BARE_ZIP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{4})\b").unwrap());

/// Run the full cascade over one detail page. Rejection (validation gate)
/// is non-fatal to the run: the caller logs and skips the URL.
pub fn extract_listing(html: &str, url: &str) -> Result<RawListing, ScrapeError> {
    let mut draft = RawListing::new(url);
    draft.source_site = Some(SOURCE_SITE.to_string());

    // 1. structured metadata blocks
    draft.fill_from(extract_json_ld(html)?);

    // 2. listing id from the URL
    draft.id = listing_id_from_url(url);

    // 3. embedded state payloads
    draft.fill_from(extract_embedded(html));

    // 4. regex fallbacks for whatever is still missing
    apply_html_fallbacks(html, &mut draft);

    // 5. validation gate
    match &draft.id {
        Some(id) if !id.is_empty() => {}
        _ => return Err(ScrapeError::Rejected(format!("no listing id in {url}"))),
    }
    if draft.meaningful_field_count() < 2 {
        return Err(ScrapeError::Rejected(format!(
            "only {} of brand/model/price/description present for {url}",
            draft.meaningful_field_count()
        )));
    }

    Ok(draft)
}

/// Derive the site-scoped listing id from the URL. First matching shape wins.
pub fn listing_id_from_url(url: &str) -> Option<String> {
    ID_PATTERNS
        .iter()
        .find_map(|re| re.captures(url).map(|caps| caps[1].to_string()))
        .filter(|id| !id.is_empty())
}

/// Price-only cascade, shared with the re-check sweep. Returns whole euros.
pub fn extract_price(html: &str) -> Option<i64> {
    // structured data first
    if let Ok(partial) = extract_json_ld(html) {
        if partial.price.is_some() {
            return partial.price;
        }
    }

    // embedded state
    if let Some(caps) = PRICE_RAW_RE.captures(html) {
        if let Ok(price) = caps[1].parse::<i64>() {
            if price > 0 {
                return Some(price);
            }
        }
    }

    // visible price in the markup
    EURO_PRICE_RE.captures(html).and_then(|caps| {
        let cleaned = caps[1].replace(['.', ','], "");
        cleaned.parse::<i64>().ok().filter(|p| *p > 0)
    })
}

// ---------------------------------------------------------------------
// Strategy 1: JSON-LD
// ---------------------------------------------------------------------

fn extract_json_ld(html: &str) -> Result<RawListing, ScrapeError> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(r#"script[type="application/ld+json"]"#)
        .map_err(|e| ScrapeError::HtmlParse(e.to_string()))?;

    let mut partial = RawListing::default();

    for element in document.select(&selector) {
        let text: String = element.text().collect();
        // malformed fragments are skipped, never fatal to the page
        let data: Value = match serde_json::from_str(&text) {
            Ok(v) => v,
            Err(e) => {
                debug!("skipping malformed JSON-LD fragment: {e}");
                continue;
            }
        };

        let type_tag = data.get("@type").and_then(Value::as_str);
        let is_vehicle = type_tag == Some("Car")
            || (type_tag == Some("Product")
                && (data.get("brand").is_some()
                    || data.get("model").is_some()
                    || data.get("vehicleEngine").is_some()));

        if is_vehicle {
            partial.fill_from(vehicle_info(&data));
        }

        if partial.price.is_none() {
            if let Some(price) = data.get("price") {
                partial.price = parse_numeric(price);
            }
        }
        if partial.price.is_none() {
            if let Some(offers) = data.get("offers") {
                partial.price = serde_json::from_value::<Offers>(offers.clone())
                    .ok()
                    .and_then(|o| o.first_price());
            }
        }

        if data.get("phones").is_some()
            || data.get("contactPoint").is_some()
            || data.get("seller").is_some()
        {
            partial.fill_from(contact_info(&data));
        }

        if partial.image_url.is_empty() {
            if let Some(image) = data.get("image") {
                partial.image_url = parse_image_urls(image);
            }
        }

        if partial.title.is_none() {
            partial.title = data
                .get("name")
                .and_then(Value::as_str)
                .map(str::to_string);
        }
    }

    Ok(partial)
}

fn vehicle_info(data: &Value) -> RawListing {
    let mut part = RawListing::default();

    // brand shows up as a plain string or as {"name": ...}
    let brand_value = data.get("manufacturer").or_else(|| data.get("brand"));
    part.brand = brand_value.and_then(|b| match b {
        Value::String(s) => Some(s.clone()),
        Value::Object(obj) => obj.get("name").and_then(Value::as_str).map(String::from),
        _ => None,
    });

    part.model = data.get("model").and_then(Value::as_str).map(String::from);

    part.year = data
        .get("productionDate")
        .or_else(|| data.get("dateVehicleFirstRegistered"))
        .and_then(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        });

    part.mileage = ["mileage", "odometer", "kilometers"]
        .iter()
        .find_map(|field| data.get(*field).and_then(parse_numeric));

    part.fuel_type = match data.get("vehicleEngine") {
        Some(Value::Array(engines)) => engines
            .iter()
            .find_map(|e| e.get("fuelType").and_then(Value::as_str))
            .map(String::from),
        Some(Value::Object(engine)) => engine
            .get("fuelType")
            .and_then(Value::as_str)
            .map(String::from),
        _ => None,
    };

    part.transmission = ["transmission", "gearBox", "vehicleTransmission"]
        .iter()
        .find_map(|field| data.get(*field).and_then(Value::as_str))
        .map(String::from);

    part.description = data
        .get("description")
        .and_then(Value::as_str)
        .map(clean_description)
        .filter(|d| !d.is_empty());

    part
}

fn contact_info(data: &Value) -> RawListing {
    let mut part = RawListing::default();

    if let Some(phones) = data.get("phones").and_then(Value::as_array) {
        if let Some(phone) = phones.first() {
            part.seller_phone = phone
                .get("formattedNumber")
                .or_else(|| phone.get("number"))
                .and_then(Value::as_str)
                .map(String::from);
            part.seller_name = phone
                .get("phoneType")
                .and_then(Value::as_str)
                .map(String::from);
        }
    }

    if let Some(contact) = data.get("contactPoint") {
        if part.seller_phone.is_none() {
            part.seller_phone = contact
                .get("telephone")
                .and_then(Value::as_str)
                .map(String::from);
        }
        if part.seller_name.is_none() {
            part.seller_name = contact
                .get("name")
                .and_then(Value::as_str)
                .map(String::from);
        }
        part.seller_email = contact
            .get("email")
            .and_then(Value::as_str)
            .map(String::from);
    }

    if let Some(seller) = data.get("seller").filter(|s| s.is_object()) {
        if part.seller_name.is_none() {
            part.seller_name = seller
                .get("name")
                .and_then(Value::as_str)
                .map(String::from);
        }
        if part.seller_email.is_none() {
            part.seller_email = seller
                .get("email")
                .and_then(Value::as_str)
                .map(String::from);
        }
    }

    part
}

// ---------------------------------------------------------------------
// Strategy 3: embedded state JSON
// ---------------------------------------------------------------------

fn extract_embedded(html: &str) -> RawListing {
    let mut partial = RawListing::default();

    if let Some(json) = embedded_object_after(html, "window.__INITIAL_STATE__") {
        if let Ok(state) = serde_json::from_str::<Value>(&json) {
            partial.fill_from(from_initial_state(&state));
        }
    }

    if let Some(json) = embedded_object_after(html, "\"listingDetails\"") {
        if let Ok(details) = serde_json::from_str::<ListingDetails>(&json) {
            partial.fill_from(from_listing_details(details));
        }
    }

    // targeted single-field probes for anything the payloads didn't cover
    if partial.year.is_none() {
        partial.year = REG_DATE_RAW_RE
            .captures(html)
            .map(|caps| caps[1].to_string())
            .or_else(|| REG_DATE_RE.captures(html).map(|caps| caps[2].to_string()));
    }

    if partial.mileage.is_none() {
        partial.mileage = MILEAGE_RAW_RE
            .captures(html)
            .and_then(|caps| caps[1].parse::<i64>().ok())
            .filter(|m| *m > 0)
            .or_else(|| {
                MILEAGE_TEXT_RE
                    .captures(html)
                    .and_then(|caps| parse_numeric(&Value::String(caps[1].to_string())))
            });
    }

    if partial.location.is_none() {
        partial.location = LOCATION_OBJ_RE.captures(html).and_then(|caps| {
            let body = &caps[1];
            let zip = ZIP_FIELD_RE.captures(body).map(|c| c[1].to_string());
            let city = CITY_FIELD_RE.captures(body).map(|c| c[1].to_string());
            combine_location(zip, city)
        });
    }

    if partial.seller_phone.is_none() {
        partial.seller_phone = PHONES_RE.captures(html).and_then(|caps| {
            serde_json::from_str::<Vec<Phone>>(&caps[1])
                .ok()
                .and_then(|phones| phones.first().and_then(Phone::best_number))
        });
    }

    if partial.estimated_price.is_none() {
        partial.estimated_price = EVAL_RANGES_RE.captures(html).and_then(|caps| {
            serde_json::from_str::<Vec<EvaluationRange>>(&caps[1])
                .ok()
                .and_then(|ranges| estimated_price_from_ranges(&ranges))
        });
    }

    if partial.image_url.is_empty() {
        if let Some(caps) = IMAGES_RE.captures(html) {
            if let Ok(images) = serde_json::from_str::<Value>(&caps[1]) {
                partial.image_url = parse_image_urls(&images);
            }
        }
    }

    if partial.model.is_none() {
        partial.model = MODEL_FIELD_RE
            .captures(html)
            .map(|caps| caps[1].to_string())
            .filter(|m| !m.is_empty());
    }

    if partial.description.is_none() {
        partial.description = DESC_FIELD_RE
            .captures(html)
            .map(|caps| clean_description(&caps[1]))
            .filter(|d| !d.is_empty());
    }

    partial
}

fn from_initial_state(state: &Value) -> RawListing {
    let mut part = RawListing::default();

    // the payload nests the record as listing.listing
    let listing = &state["listing"]["listing"];
    if !listing.is_object() {
        return part;
    }

    part.description = listing
        .get("description")
        .and_then(Value::as_str)
        .map(clean_description)
        .filter(|d| !d.is_empty());

    part.model = listing
        .get("model")
        .and_then(Value::as_str)
        .map(String::from)
        .or_else(|| {
            // "name" is only trusted as a model when it looks like one
            listing
                .get("name")
                .and_then(Value::as_str)
                .filter(|name| looks_like_model(name))
                .map(String::from)
        });

    if let Some(images) = listing.get("images") {
        part.image_url = parse_image_urls(images);
    }

    part.seller_phone = listing
        .get("phones")
        .and_then(Value::as_array)
        .and_then(|phones| phones.first())
        .and_then(|phone| {
            phone
                .get("formattedNumber")
                .or_else(|| phone.get("callTo"))
                .and_then(Value::as_str)
        })
        .map(String::from);

    part.estimated_price = listing["prices"]["public"]["evaluationRanges"]
        .as_array()
        .and_then(|ranges| {
            ranges
                .iter()
                .find(|r| r.get("category").and_then(Value::as_i64) == Some(1))
                .and_then(|r| r.get("maximum").and_then(Value::as_i64))
                .filter(|max| *max > 0)
        });

    part
}

fn from_listing_details(details: ListingDetails) -> RawListing {
    let mut part = RawListing::default();

    if let Some(vehicle) = details.vehicle {
        part.year = vehicle
            .first_registration_date_raw
            .as_deref()
            .and_then(four_digit_year);
        part.mileage = vehicle.mileage_in_km_raw.filter(|m| *m > 0);
        part.model = vehicle.model;
        part.brand = vehicle.make;
    }

    if let Some(location) = details.location {
        part.location = combine_location(location.zip, location.city);
    }

    part.description = details
        .description
        .as_deref()
        .map(clean_description)
        .filter(|d| !d.is_empty());

    if let Some(images) = details.images {
        part.image_url = parse_image_urls(&images);
    }

    if let Some(seller) = details.seller {
        part.seller_name = seller.contact_name;
        part.seller_phone = seller
            .phones
            .and_then(|phones| phones.first().and_then(Phone::best_number));
    }

    if let Some(public) = details.prices.and_then(|p| p.public) {
        part.price = public.price_raw.filter(|p| *p > 0);
        part.estimated_price = public
            .evaluation_ranges
            .as_deref()
            .and_then(estimated_price_from_ranges);
    }

    part
}

fn four_digit_year(date: &str) -> Option<String> {
    static YEAR_ANYWHERE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{4})").unwrap());
    YEAR_ANYWHERE_RE
        .captures(date)
        .map(|caps| caps[1].to_string())
}

fn looks_like_model(name: &str) -> bool {
    let lower = name.to_lowercase();
    name.chars().any(|c| c.is_ascii_digit())
        || ["classe", "class", "serie", "série"]
            .iter()
            .any(|word| lower.split_whitespace().any(|w| w == *word))
}

fn combine_location(zip: Option<String>, city: Option<String>) -> Option<String> {
    match (
        zip.filter(|z| !z.is_empty()),
        city.filter(|c| !c.is_empty()),
    ) {
        (Some(zip), Some(city)) => Some(format!("{zip} {city}")),
        (Some(zip), None) => Some(zip),
        (None, Some(city)) => Some(city),
        (None, None) => None,
    }
}

/// Locate the first balanced JSON object following `marker`. Quote- and
/// escape-aware so braces inside strings don't end the scan early.
fn embedded_object_after(html: &str, marker: &str) -> Option<String> {
    let start = html.find(marker)? + marker.len();
    let rest = &html[start..];
    let open = rest.find('{')?;
    let body = &rest[open..];

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in body.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(body[..=i].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

// ---------------------------------------------------------------------
// Strategy 4: regex fallbacks over raw HTML
// ---------------------------------------------------------------------

fn apply_html_fallbacks(html: &str, draft: &mut RawListing) {
    if draft.fuel_type.is_none() {
        draft.fuel_type = fuel_from_html(html);
    }
    if draft.transmission.is_none() {
        draft.transmission = transmission_from_html(html);
    }
    if draft.description.is_none() {
        draft.description = description_from_html(html);
    }
    if draft.location.is_none() {
        draft.location = location_from_html(html);
    }
}

fn fuel_from_html(html: &str) -> Option<String> {
    if let Some(caps) = FUEL_JSON_RE.captures(html) {
        let value = caps[1].trim();
        if !value.is_empty() {
            return Some(value.to_string());
        }
    }

    let lower = html.to_lowercase();
    if lower.contains("diesel") {
        Some("Diesel".to_string())
    } else if lower.contains("essence") || lower.contains("gasoline") {
        Some("Gasoline".to_string())
    } else if lower.contains("electric") || lower.contains("électrique") {
        Some("Electric".to_string())
    } else if lower.contains("hybrid") || lower.contains("hybride") {
        Some("Hybrid".to_string())
    } else {
        None
    }
}

fn transmission_from_html(html: &str) -> Option<String> {
    if let Some(m) = TRANSMISSION_PHRASE_RE.find(html) {
        return Some(m.as_str().to_string());
    }
    TRANSMISSION_JSON_RE
        .captures(html)
        .map(|caps| caps[1].trim().to_string())
        .filter(|t| !t.is_empty())
}

fn description_from_html(html: &str) -> Option<String> {
    for pattern in DESC_HTML_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(html) {
            let text = reflow_description(&clean_description(&caps[1]));
            if text.len() > 50 {
                return Some(text);
            }
        }
    }

    // plain JSON description fields as last resort
    if let Some(caps) = DESC_FIELD_RE.captures(html) {
        let text = clean_description(&caps[1]);
        if text.len() > 50 {
            return Some(text);
        }
    }

    None
}

/// The free-text blobs lose their line structure when tags are stripped;
/// put breaks back in front of phrases that start a new topic.
fn reflow_description(text: &str) -> String {
    let mut out = text.to_string();
    for phrase in DESC_BREAK_PHRASES {
        out = out.replace(phrase, &format!("\n{phrase}"));
    }
    let mut collapsed = String::with_capacity(out.len());
    let mut prev_blank = false;
    for line in out.lines() {
        let blank = line.trim().is_empty();
        if blank && prev_blank {
            continue;
        }
        if !collapsed.is_empty() {
            collapsed.push('\n');
        }
        collapsed.push_str(line.trim_end());
        prev_blank = blank;
    }
    collapsed.trim().to_string()
}

fn location_from_html(html: &str) -> Option<String> {
    for pattern in LOCATION_TEXT_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(html) {
            let value = caps[1].trim();
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }

    if let Some(caps) = BE_ZIP_CITY_RE.captures(html) {
        return Some(format!("{} {}", &caps[1], &caps[2]));
    }
    if let Some(caps) = ZIP_CITY_RE.captures(html) {
        return Some(format!("{} {}", &caps[1], &caps[2]));
    }

    BARE_ZIP_RE.captures(html).map(|caps| caps[1].to_string())
}
