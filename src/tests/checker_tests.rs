use crate::checker::ListingChecker;
use crate::config::CheckConfig;
use crate::db::{links, listings};
use crate::tests::utils::{
    insert_user, link_status, make_db, make_listing, notification_count, set_updated_at,
    StubFetcher,
};
use chrono::{Duration as ChronoDuration, Utc};
use std::time::Duration;

fn test_config() -> CheckConfig {
    CheckConfig {
        request_delay: Duration::ZERO,
        ..CheckConfig::default()
    }
}

/// Stored listing linked to two users, last checked two days ago.
fn seed_linked_listing(db: &crate::db::connection::Database, id: &str) -> String {
    insert_user(db, "user-a", None, None);
    insert_user(db, "user-b", None, None);

    let listing = make_listing(id, Some(1_500_000));
    let url = listing.url.clone();
    listings::insert_batch(db, &[listing]).unwrap();
    links::create(db, "user-a", id, Utc::now()).unwrap();
    links::create(db, "user-b", id, Utc::now()).unwrap();
    set_updated_at(db, id, Utc::now() - ChronoDuration::days(2));
    url
}

#[test]
fn deleted_listing_trashes_links_and_notifies_each_user() {
    let db = make_db("checker_deleted");
    let url = seed_linked_listing(&db, "car-1");

    let fetcher = StubFetcher {
        head_status: [(url, 404u16)].into_iter().collect(),
        default_head: 200,
        ..StubFetcher::default()
    };
    let checker = ListingChecker::new(&db, &fetcher, test_config(), "run-1".to_string());

    let stats = checker.check_linked().unwrap();

    assert_eq!(stats.checked, 1);
    assert_eq!(stats.deleted, 1);
    assert_eq!(stats.errors, 0);

    let stored = listings::get(&db, "car-1").unwrap().unwrap();
    assert!(!stored.exists);
    assert_eq!(link_status(&db, "user-a", "car-1"), "trashed");
    assert_eq!(link_status(&db, "user-b", "car-1"), "trashed");
    assert_eq!(notification_count(&db, "user-a", "listing_deleted"), 1);
    assert_eq!(notification_count(&db, "user-b", "listing_deleted"), 1);
}

#[test]
fn price_change_appends_history_and_notifies() {
    let db = make_db("checker_price");
    let url = seed_linked_listing(&db, "car-1");
    let before = listings::get(&db, "car-1").unwrap().unwrap();

    // page now shows 16 000 € instead of the stored 15 000 €
    let page = r#"<html><body><script>{"priceRaw": 16000}</script></body></html>"#;
    let fetcher = StubFetcher {
        pages: [(url, page.to_string())].into_iter().collect(),
        default_head: 200,
        ..StubFetcher::default()
    };
    let checker = ListingChecker::new(&db, &fetcher, test_config(), "run-1".to_string());

    let stats = checker.check_linked().unwrap();

    assert_eq!(stats.price_changes, 1);
    assert_eq!(stats.deleted, 0);

    let stored = listings::get(&db, "car-1").unwrap().unwrap();
    assert_eq!(stored.price, Some(1_600_000));
    assert_eq!(stored.price_history.len(), 1);
    let entry = &stored.price_history[0];
    assert_eq!(entry.old_price, Some(1_500_000));
    assert_eq!(entry.new_price, 1_600_000);
    assert_eq!(entry.run_id, "run-1");
    assert!(stored.updated_at > before.updated_at);

    assert_eq!(notification_count(&db, "user-a", "price_changed"), 1);
    assert_eq!(notification_count(&db, "user-b", "price_changed"), 1);
}

#[test]
fn unchanged_listing_still_advances_updated_at() {
    let db = make_db("checker_touch");
    let url = seed_linked_listing(&db, "car-1");
    let before = listings::get(&db, "car-1").unwrap().unwrap();

    let page = r#"<html><body><script>{"priceRaw": 15000}</script></body></html>"#;
    let fetcher = StubFetcher {
        pages: [(url, page.to_string())].into_iter().collect(),
        default_head: 200,
        ..StubFetcher::default()
    };
    let checker = ListingChecker::new(&db, &fetcher, test_config(), "run-1".to_string());

    let stats = checker.check_linked().unwrap();

    assert_eq!(stats.checked, 1);
    assert_eq!(stats.price_changes, 0);
    assert_eq!(stats.deleted, 0);

    let stored = listings::get(&db, "car-1").unwrap().unwrap();
    assert_eq!(stored.price, Some(1_500_000));
    assert!(stored.price_history.is_empty());
    assert!(stored.updated_at > before.updated_at);
}

#[test]
fn fresh_listings_are_not_selected() {
    let db = make_db("checker_fresh");
    insert_user(&db, "user-a", None, None);
    let listing = make_listing("car-1", Some(1_500_000));
    listings::insert_batch(&db, &[listing]).unwrap();
    links::create(&db, "user-a", "car-1", Utc::now()).unwrap();
    // updated_at is now, inside the 6h interval

    let fetcher = StubFetcher {
        default_head: 404,
        ..StubFetcher::default()
    };
    let checker = ListingChecker::new(&db, &fetcher, test_config(), "run-1".to_string());

    let stats = checker.check_linked().unwrap();
    assert_eq!(stats.checked, 0);

    let stored = listings::get(&db, "car-1").unwrap().unwrap();
    assert!(stored.exists);
}

#[test]
fn unlinked_sweep_picks_up_unlinked_listings() {
    let db = make_db("checker_unlinked");
    let listing = make_listing("car-9", Some(1_200_000));
    let url = listing.url.clone();
    listings::insert_batch(&db, &[listing]).unwrap();
    set_updated_at(&db, "car-9", Utc::now() - ChronoDuration::days(10));

    let fetcher = StubFetcher {
        head_status: [(url, 410u16)].into_iter().collect(),
        default_head: 200,
        ..StubFetcher::default()
    };
    let checker = ListingChecker::new(&db, &fetcher, test_config(), "run-1".to_string());

    // not in the linked sweep
    let linked_stats = checker.check_linked().unwrap();
    assert_eq!(linked_stats.checked, 0);

    // but the weekly sweep finds and deletes it, with no notifications
    let stats = checker.check_unlinked().unwrap();
    assert_eq!(stats.checked, 1);
    assert_eq!(stats.deleted, 1);

    let stored = listings::get(&db, "car-9").unwrap().unwrap();
    assert!(!stored.exists);
}

#[test]
fn probe_failure_counts_as_gone() {
    // an erroring HEAD (no stub entry would be a get() error; head errors
    // come from the fetcher itself) is treated as "listing gone"
    struct FailingProbe;
    impl crate::scraper::fetch::PageFetcher for FailingProbe {
        fn get(&self, _url: &str) -> Result<String, crate::scraper::ScrapeError> {
            Err(crate::scraper::ScrapeError::Network("down".to_string()))
        }
        fn head(&self, _url: &str) -> Result<u16, crate::scraper::ScrapeError> {
            Err(crate::scraper::ScrapeError::Network("timeout".to_string()))
        }
    }

    let db = make_db("checker_probe_fail");
    seed_linked_listing(&db, "car-1");

    let checker = ListingChecker::new(&db, &FailingProbe, test_config(), "run-1".to_string());
    let stats = checker.check_linked().unwrap();

    assert_eq!(stats.deleted, 1);
    let stored = listings::get(&db, "car-1").unwrap().unwrap();
    assert!(!stored.exists);
}

#[test]
fn batch_size_caps_a_sweep() {
    let db = make_db("checker_batch");
    for i in 0..8 {
        let listing = make_listing(&format!("car-{i}"), Some(1_000_000));
        listings::insert_batch(&db, &[listing]).unwrap();
        set_updated_at(&db, &format!("car-{i}"), Utc::now() - ChronoDuration::days(10));
    }

    let fetcher = StubFetcher {
        default_head: 404,
        ..StubFetcher::default()
    };
    let config = CheckConfig {
        unlinked_batch_size: 5,
        request_delay: Duration::ZERO,
        ..CheckConfig::default()
    };
    let checker = ListingChecker::new(&db, &fetcher, config, "run-1".to_string());

    let stats = checker.check_unlinked().unwrap();
    assert_eq!(stats.checked, 5);
    assert_eq!(stats.deleted, 5);
}
