//! Raw-value cleanup: folds the site's many spellings of fuel, gearbox and
//! brand into the canonical forms, and parses the loosely typed numeric
//! fields that show up as strings, floats or ints depending on which page
//! blob they came from.

use crate::domain::{FuelType, Transmission};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

// French site, so the alias tables carry both French and English spellings
// plus the single-letter codes the search filters use. The single-letter
// entries ("d", "e", ...) are a known precision risk on free-text input.
const FUEL_ALIASES: &[(&str, FuelType)] = &[
    ("essence", FuelType::Gasoline),
    ("gasoline", FuelType::Gasoline),
    ("petrol", FuelType::Gasoline),
    ("benzine", FuelType::Gasoline),
    ("b", FuelType::Gasoline),
    ("diesel", FuelType::Diesel),
    ("d", FuelType::Diesel),
    ("electric", FuelType::Electric),
    ("électrique", FuelType::Electric),
    ("electrique", FuelType::Electric),
    ("elektro", FuelType::Electric),
    ("e", FuelType::Electric),
    ("hybrid", FuelType::Hybrid),
    ("hybride", FuelType::Hybrid),
    ("h", FuelType::Hybrid),
    ("lpg", FuelType::Other),
    ("gpl", FuelType::Other),
    ("l", FuelType::Other),
    ("cng", FuelType::Other),
    ("gnc", FuelType::Other),
    ("c", FuelType::Other),
    ("gas", FuelType::Other),
];

const TRANSMISSION_ALIASES: &[(&str, Transmission)] = &[
    ("manual", Transmission::Manual),
    ("manuelle", Transmission::Manual),
    ("boîte manuelle", Transmission::Manual),
    ("boite manuelle", Transmission::Manual),
    ("automatic", Transmission::Automatic),
    ("automatique", Transmission::Automatic),
    ("boîte automatique", Transmission::Automatic),
    ("boite automatique", Transmission::Automatic),
    ("semi-automatic", Transmission::SemiAutomatic),
    ("semi-automatique", Transmission::SemiAutomatic),
    ("semi", Transmission::SemiAutomatic),
];

const BRAND_ALIASES: &[(&str, &str)] = &[
    ("vw", "Volkswagen"),
    ("bmw", "BMW"),
    ("mercedes", "Mercedes-Benz"),
    ("merc", "Mercedes-Benz"),
    ("alfa", "Alfa Romeo"),
    ("range", "Land Rover"),
    ("mini", "Mini"),
];

pub const KNOWN_BRANDS: &[&str] = &[
    "Audi",
    "BMW",
    "Citroen",
    "Cupra",
    "Dacia",
    "Fiat",
    "Ford",
    "Honda",
    "Hyundai",
    "Jaguar",
    "Jeep",
    "Kia",
    "Land Rover",
    "Lexus",
    "Mazda",
    "Mercedes-Benz",
    "MG",
    "Mini",
    "Mitsubishi",
    "Nissan",
    "Opel",
    "Peugeot",
    "Polestar",
    "Porsche",
    "Renault",
    "Rover",
    "Seat",
    "Skoda",
    "Smart",
    "Subaru",
    "Suzuki",
    "Tesla",
    "Toyota",
    "Volkswagen",
    "Volvo",
];

static DIGIT_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").unwrap());
static ZIPCODE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{4})\b").unwrap());
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());
static BLANK_LINES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n\s*\n+").unwrap());
static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{4})-\d{2}-\d{2}").unwrap());

const IMAGE_EXTENSIONS: &[&str] = &[".webp", ".jpg", ".jpeg", ".png"];

/// Alias table first, then case-insensitive match against the canonical
/// set, else Unknown.
pub fn normalize_fuel_type(raw: &str) -> FuelType {
    let value = raw.trim().to_lowercase();
    if value.is_empty() {
        return FuelType::Unknown;
    }
    for (alias, fuel) in FUEL_ALIASES {
        if value == *alias {
            return *fuel;
        }
    }
    FuelType::ALL
        .into_iter()
        .find(|f| f.as_str().to_lowercase() == value)
        .unwrap_or(FuelType::Unknown)
}

pub fn normalize_transmission(raw: &str) -> Transmission {
    let value = raw.trim().to_lowercase();
    if value.is_empty() {
        return Transmission::Unknown;
    }
    for (alias, transmission) in TRANSMISSION_ALIASES {
        if value == *alias {
            return *transmission;
        }
    }
    Transmission::ALL
        .into_iter()
        .find(|t| t.as_str().to_lowercase() == value)
        .unwrap_or(Transmission::Unknown)
}

/// Brand is open-world: aliases and the known-brand set fix the casing,
/// anything else passes through title-cased rather than becoming Unknown.
pub fn normalize_brand(raw: &str) -> String {
    let brand = title_case(raw.trim());
    if brand.is_empty() {
        return brand;
    }
    let lower = brand.to_lowercase();
    for (alias, canonical) in BRAND_ALIASES {
        if lower == *alias {
            return (*canonical).to_string();
        }
    }
    if let Some(known) = KNOWN_BRANDS
        .iter()
        .find(|b| b.eq_ignore_ascii_case(&brand))
    {
        return (*known).to_string();
    }
    brand
}

/// Accepts "2018", "2018-03-01", or a bare integer; anything else (or a
/// year outside [1900, 2100]) is None. Returns January 1st of the year.
pub fn parse_year(raw: &Value) -> Option<NaiveDate> {
    let year = match raw {
        Value::Number(n) => n.as_i64()?,
        Value::String(s) => {
            let s = s.trim();
            if s.len() == 4 && s.chars().all(|c| c.is_ascii_digit()) {
                s.parse::<i64>().ok()?
            } else if let Some(caps) = YEAR_RE.captures(s) {
                caps[1].parse::<i64>().ok()?
            } else {
                return None;
            }
        }
        _ => return None,
    };
    if !(1900..=2100).contains(&year) {
        return None;
    }
    NaiveDate::from_ymd_opt(year as i32, 1, 1)
}

/// Ints pass through, floats are truncated, strings have their digit runs
/// concatenated ("25 000 €" -> 25000, "239 833 km" -> 239833). Zero and
/// negative results collapse to None.
pub fn parse_numeric(raw: &Value) -> Option<i64> {
    let parsed = match raw {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?,
        Value::String(s) => {
            let digits: String = DIGIT_RUN_RE
                .find_iter(s)
                .map(|m| m.as_str())
                .collect::<Vec<_>>()
                .concat();
            if digits.is_empty() {
                return None;
            }
            digits.parse::<i64>().ok()?
        }
        _ => return None,
    };
    if parsed > 0 {
        Some(parsed)
    } else {
        None
    }
}

/// Accepts a single URL string, a list of strings, or a list of
/// `{"url": ...}` objects. Keeps only entries carrying an image file
/// extension, deduplicated in first-seen order.
pub fn parse_image_urls(raw: &Value) -> Vec<String> {
    let candidates: Vec<String> = match raw {
        Value::String(s) => vec![s.clone()],
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Object(obj) => obj.get("url").and_then(|u| u.as_str()).map(String::from),
                _ => None,
            })
            .collect(),
        _ => return Vec::new(),
    };

    let mut seen = std::collections::HashSet::new();
    candidates
        .into_iter()
        .filter(|url| {
            let lower = url.to_lowercase();
            IMAGE_EXTENSIONS.iter().any(|ext| lower.contains(ext))
        })
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

/// Belgian zipcodes are 4 digits.
pub fn extract_zipcode(location: &str) -> Option<String> {
    ZIPCODE_RE
        .captures(location)
        .map(|caps| caps[1].to_string())
}

/// Title-case with a fresh capital after any non-letter, so
/// "mercedes-benz" -> "Mercedes-Benz" and "alfa romeo" -> "Alfa Romeo".
pub fn title_case(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut at_word_start = true;
    for c in raw.chars() {
        if c.is_alphabetic() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out
}

/// Strips markup out of a description blob: escaped/literal `<br>`
/// variants become newlines, remaining tags are dropped, entities decoded,
/// runs of blank lines collapsed.
pub fn clean_description(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }

    let text = raw
        .replace("\\u003cbr /\\u003e", "\n")
        .replace("<br />", "\n")
        .replace("<br/>", "\n")
        .replace("<br>", "\n")
        .replace("</li><li>", "\n• ")
        .replace("<li>", "• ")
        .replace("</li>", "");

    let text = TAG_RE.replace_all(&text, "");
    let text = unescape_entities(&text);
    let text = BLANK_LINES_RE.replace_all(&text, "\n\n");

    let lines: Vec<&str> = text.lines().map(|l| l.trim_end()).collect();
    lines.join("\n").trim().to_string()
}

fn unescape_entities(text: &str) -> String {
    text.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&nbsp;", " ")
        .replace('\u{00a0}', " ")
}
