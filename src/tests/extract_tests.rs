use crate::scraper::extract::{extract_listing, extract_price, listing_id_from_url};
use crate::scraper::ScrapeError;

const DETAIL_URL: &str =
    "https://www.autoscout24.be/fr/offres/bmw-318d/1a2b3c4d-5e6f-7081-92a3-b4c5d6e7f809";

fn json_ld_page() -> String {
    r#"<html><head>
<script type="application/ld+json">
{"@type":"Car","manufacturer":"bmw","model":"318d","productionDate":"2018-03-01",
 "mileage":120000,"vehicleEngine":[{"fuelType":"Diesel"}],"transmission":"Manual",
 "description":"Entretien complet chez le concessionnaire. Non fumeur.",
 "offers":{"price":"15000"},
 "image":["https://img.test/a.jpg","https://img.test/a.jpg","https://img.test/b.png","https://img.test/notes.txt"]}
</script>
</head><body></body></html>"#
        .to_string()
}

#[test]
fn json_ld_page_populates_the_draft() {
    let draft = extract_listing(&json_ld_page(), DETAIL_URL).unwrap();

    assert_eq!(
        draft.id.as_deref(),
        Some("1a2b3c4d-5e6f-7081-92a3-b4c5d6e7f809")
    );
    assert_eq!(draft.brand.as_deref(), Some("bmw"));
    assert_eq!(draft.model.as_deref(), Some("318d"));
    assert_eq!(draft.year.as_deref(), Some("2018-03-01"));
    assert_eq!(draft.mileage, Some(120000));
    assert_eq!(draft.price, Some(15000));
    assert_eq!(draft.fuel_type.as_deref(), Some("Diesel"));
    assert_eq!(draft.transmission.as_deref(), Some("Manual"));
    assert_eq!(
        draft.image_url,
        vec!["https://img.test/a.jpg", "https://img.test/b.png"]
    );
}

#[test]
fn embedded_listing_details_fill_a_bare_page() {
    let html = r#"<html><body><script>
var data = {"page":{"listingDetails": {
  "vehicle": {"firstRegistrationDateRaw": "2017-06-01", "mileageInKmRaw": 98000,
              "model": "Focus", "make": "Ford"},
  "location": {"zip": "4000", "city": "Liège"},
  "description": "Belle voiture de premiere main, carnet complet.",
  "prices": {"public": {"priceRaw": 9500,
      "evaluationRanges": [{"category": 2, "maximum": 11000},
                           {"category": 1, "maximum": 10400}]}}
}}};
</script></body></html>"#;

    let draft = extract_listing(html, DETAIL_URL).unwrap();

    assert_eq!(draft.brand.as_deref(), Some("Ford"));
    assert_eq!(draft.model.as_deref(), Some("Focus"));
    assert_eq!(draft.year.as_deref(), Some("2017"));
    assert_eq!(draft.mileage, Some(98000));
    assert_eq!(draft.price, Some(9500));
    // category 1 bracket's maximum is the estimate
    assert_eq!(draft.estimated_price, Some(10400));
    assert_eq!(draft.location.as_deref(), Some("4000 Liège"));
}

#[test]
fn earlier_strategies_are_never_overwritten() {
    // JSON-LD carries price and model; the embedded payload disagrees.
    let html = r#"<html><head>
<script type="application/ld+json">
{"@type":"Product","brand":"BMW","model":"318d","offers":[{"price":"15000"}],
 "description":"Vendue avec controle technique et carpass en ordre."}
</script></head><body><script>
var data = {"listingDetails": {
  "vehicle": {"model": "520i"},
  "prices": {"public": {"priceRaw": 13999}}
}};
</script></body></html>"#;

    let draft = extract_listing(html, DETAIL_URL).unwrap();

    assert_eq!(draft.model.as_deref(), Some("318d"));
    assert_eq!(draft.price, Some(15000));
}

#[test]
fn html_keyword_fallbacks_cover_missing_enum_fields() {
    let html = r#"<html><body>
<script type="application/ld+json">
{"@type":"Car","brand":"Renault","model":"Clio","offers":{"price":"8000"}}
</script>
<div>Tres belle Clio, boite manuelle, moteur diesel.</div>
</body></html>"#;

    let draft = extract_listing(html, DETAIL_URL).unwrap();

    assert_eq!(draft.fuel_type.as_deref(), Some("Diesel"));
    assert_eq!(draft.transmission.as_deref(), Some("boite manuelle"));
}

#[test]
fn gate_rejects_pages_without_meaningful_data() {
    let html = "<html><body><p>rien ici</p></body></html>";
    let err = extract_listing(html, DETAIL_URL).unwrap_err();
    assert!(matches!(err, ScrapeError::Rejected(_)));
}

#[test]
fn gate_rejects_urls_without_an_id() {
    let err = extract_listing(&json_ld_page(), "https://example.com/something").unwrap_err();
    assert!(matches!(err, ScrapeError::Rejected(_)));
}

#[test]
fn malformed_json_ld_fragments_are_skipped() {
    let html = r#"<html><head>
<script type="application/ld+json">{not valid json</script>
<script type="application/ld+json">
{"@type":"Car","brand":"Audi","model":"A4","offers":{"price":"12000"}}
</script></head><body></body></html>"#;

    let draft = extract_listing(html, DETAIL_URL).unwrap();
    assert_eq!(draft.brand.as_deref(), Some("Audi"));
    assert_eq!(draft.price, Some(12000));
}

#[test]
fn listing_id_shapes_in_order() {
    assert_eq!(
        listing_id_from_url(DETAIL_URL).as_deref(),
        Some("1a2b3c4d-5e6f-7081-92a3-b4c5d6e7f809")
    );
    assert_eq!(
        listing_id_from_url("https://site.test/offres/mercedes/abc123def?source=home").as_deref(),
        Some("abc123def")
    );
    assert_eq!(
        listing_id_from_url(
            "https://site.test/annonce?uuid=1a2b3c4d-5e6f-7081-92a3-b4c5d6e7f809&x=1"
        )
        .as_deref(),
        Some("1a2b3c4d-5e6f-7081-92a3-b4c5d6e7f809")
    );
    assert_eq!(listing_id_from_url("https://example.com/something"), None);
}

#[test]
fn price_cascade_prefers_structured_data() {
    let json_ld = r#"<html><head><script type="application/ld+json">
{"@type":"Car","brand":"BMW","offers":{"price":"15000"}}
</script></head><body>{"priceRaw": 13999} 12.000 €</body></html>"#;
    assert_eq!(extract_price(json_ld), Some(15000));

    let embedded = r#"<html><body><script>{"priceRaw": 13500}</script></body></html>"#;
    assert_eq!(extract_price(embedded), Some(13500));

    let markup_only = "<html><body><span>12.500 €</span></body></html>";
    assert_eq!(extract_price(markup_only), Some(12500));

    assert_eq!(extract_price("<html><body>rien</body></html>"), None);
}
