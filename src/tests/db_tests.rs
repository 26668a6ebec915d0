use crate::db::listings;
use crate::domain::{FuelType, Transmission};
use crate::tests::utils::{make_db, make_listing};
use chrono::{Duration as ChronoDuration, NaiveDate, Utc};

#[test]
fn batch_insert_stores_everything_on_the_happy_path() {
    let db = make_db("db_batch_ok");
    let batch = vec![
        make_listing("car-1", Some(1_000_000)),
        make_listing("car-2", Some(1_200_000)),
    ];

    let outcome = listings::insert_batch(&db, &batch).unwrap();

    assert_eq!(outcome.stored, 2);
    assert!(outcome.failures.is_empty());
    assert!(listings::get(&db, "car-1").unwrap().is_some());
    assert!(listings::get(&db, "car-2").unwrap().is_some());
}

#[test]
fn batch_failure_falls_back_to_per_row_inserts() {
    let db = make_db("db_batch_fallback");

    // pre-existing row whose URL collides with one batch member
    let existing = make_listing("car-1", Some(1_000_000));
    listings::insert_batch(&db, std::slice::from_ref(&existing)).unwrap();

    let batch = vec![
        make_listing("car-1", Some(1_000_000)), // duplicate url
        make_listing("car-2", Some(1_200_000)),
        make_listing("car-3", Some(1_300_000)),
    ];
    let n = batch.len();

    let outcome = listings::insert_batch(&db, &batch).unwrap();

    assert_eq!(outcome.stored, 2);
    assert_eq!(outcome.failures.len(), n - outcome.stored);
    assert_eq!(outcome.failures[0].id, "car-1");
    assert_eq!(outcome.failures[0].reason, "duplicate url");
    assert!(listings::get(&db, "car-2").unwrap().is_some());
    assert!(listings::get(&db, "car-3").unwrap().is_some());
}

#[test]
fn per_row_errors_are_captured_not_fatal() {
    let db = make_db("db_row_errors");

    let existing = make_listing("car-1", Some(1_000_000));
    listings::insert_batch(&db, std::slice::from_ref(&existing)).unwrap();

    // same id as the stored row but a different URL: passes the duplicate
    // pre-check, then hits the primary-key constraint
    let mut id_clash = make_listing("car-1", Some(1_000_000));
    id_clash.url = "https://www.autoscout24.be/fr/offres/test/other".to_string();

    let batch = vec![id_clash, make_listing("car-4", Some(1_400_000))];
    let outcome = listings::insert_batch(&db, &batch).unwrap();

    assert_eq!(outcome.stored, 1);
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].id, "car-1");
    assert_ne!(outcome.failures[0].reason, "duplicate url");
    assert!(listings::get(&db, "car-4").unwrap().is_some());
}

#[test]
fn listings_round_trip_through_the_store() {
    let db = make_db("db_roundtrip");

    let mut listing = make_listing("car-1", Some(1_550_000));
    listing.year = NaiveDate::from_ymd_opt(2019, 1, 1);
    listing.mileage = Some(88_000);
    listing.fuel_type = FuelType::Hybrid;
    listing.transmission = Transmission::SemiAutomatic;
    listing.image_url = vec!["https://img.test/a.jpg".to_string()];
    listing.location = Some("4000 Liège".to_string());

    listings::insert_batch(&db, std::slice::from_ref(&listing)).unwrap();
    let stored = listings::get(&db, "car-1").unwrap().unwrap();

    assert_eq!(stored.url, listing.url);
    assert_eq!(stored.year, listing.year);
    assert_eq!(stored.mileage, Some(88_000));
    assert_eq!(stored.price, Some(1_550_000));
    assert_eq!(stored.fuel_type, FuelType::Hybrid);
    assert_eq!(stored.transmission, Transmission::SemiAutomatic);
    assert_eq!(stored.image_url, vec!["https://img.test/a.jpg"]);
    assert_eq!(stored.location.as_deref(), Some("4000 Liège"));
    assert!(stored.exists);
    assert!(stored.price_history.is_empty());
}

#[test]
fn recent_urls_respects_window_and_cap() {
    let db = make_db("db_recent");

    for i in 0..4 {
        let listing = make_listing(&format!("car-{i}"), Some(1_000_000));
        listings::insert_batch(&db, &[listing]).unwrap();
    }
    // push one listing outside the lookback window
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE listings SET created_at = ?1 WHERE id = 'car-0'",
            rusqlite::params![Utc::now() - ChronoDuration::days(60)],
        )
        .unwrap();
        Ok(())
    })
    .unwrap();

    let urls = listings::recent_urls(&db, 30, 500).unwrap();
    assert_eq!(urls.len(), 3);
    assert!(!urls.iter().any(|u| u.ends_with("car-0")));

    let capped = listings::recent_urls(&db, 30, 2).unwrap();
    assert_eq!(capped.len(), 2);
}
