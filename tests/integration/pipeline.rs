//! Full pipeline: request building, retry, filtering, sweeping, storage
//! and valuation, all against `MockSource`.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use appraiser::appraiser::Appraiser;
use appraiser::config::AppConfig;
use appraiser::engine::PriceError;
use appraiser::market::TransportError;
use appraiser::storage::{self, JsonFileStore};
use appraiser::types::{ItemRecord, NoPriceReason, PriceResult, Rarity, SuspectFlag};
use appraiser::valuation::ValuationError;

use crate::mock_source::{listing, listings, status, trusted_listings, MockSource};

fn appraiser(source: Arc<MockSource>) -> Appraiser {
    Appraiser::from_config(&AppConfig::default(), source)
}

fn temp_store() -> JsonFileStore {
    let mut p = std::env::temp_dir();
    p.push(format!("appraiser_it_prices_{}.json", uuid::Uuid::new_v4()));
    JsonFileStore::new(p)
}

// ---------------------------------------------------------------------------
// Single-variant pricing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_untrusted_seller_dropped_and_small_set_skips_outliers() {
    let source = Arc::new(MockSource::new().script(
        0,
        vec![listings(vec![
            listing(dec!(5), 90.0, 10, "Foo bundle"),
            listing(dec!(100), 90.0, 10, "Foo bundle"),
            listing(dec!(110), 40.0, 1, "Foo bundle"),
        ])],
    ));
    let app = appraiser(source.clone());

    let result = app.fetch_single_price("Foo", Rarity::Og, "default", None).await.unwrap();
    assert_eq!(result, PriceResult::found(dec!(5), 2));
    assert_eq!(source.call_count(), 1);
}

#[tokio::test]
async fn test_cheap_outlier_rejected_against_median() {
    let source = Arc::new(MockSource::new().script(
        0,
        vec![listings(vec![
            listing(dec!(5), 90.0, 10, "Foo bundle"),
            listing(dec!(100), 90.0, 10, "Foo bundle"),
            listing(dec!(110), 40.0, 1, "Foo bundle"),
            listing(dec!(120), 95.0, 20, "Foo bundle"),
        ])],
    ));
    let app = appraiser(source);

    let result = app.fetch_single_price("Foo", Rarity::Og, "default", None).await.unwrap();
    assert_eq!(result, PriceResult::found(dec!(100), 2));
}

#[tokio::test]
async fn test_og_requests_carry_price_floor() {
    let source = Arc::new(MockSource::new());
    let app = appraiser(source.clone());

    app.fetch_single_price("Foo", Rarity::Og, "gold", None).await.unwrap();
    app.fetch_single_price("Foo", Rarity::Secret, "gold", None).await.unwrap();

    let requests = source.requests();
    assert_eq!(requests[0].request.min_price, Some(dec!(300)));
    assert_eq!(requests[0].request.attribute_id, 1);
    assert_eq!(requests[1].request.min_price, None);
}

#[tokio::test]
async fn test_absent_reasons() {
    let source = Arc::new(
        MockSource::new()
            .always(1, listings(vec![listing(dec!(10), 10.0, 0, "Foo")]))
            .always(2, listings(vec![])),
    );
    let app = appraiser(source);

    let untrusted = app.fetch_single_price("Foo", Rarity::Og, "gold", None).await.unwrap();
    assert_eq!(untrusted.reason(), Some(NoPriceReason::NoTrustedSellers));

    let empty = app.fetch_single_price("Foo", Rarity::Og, "diamond", None).await.unwrap();
    assert_eq!(empty.reason(), Some(NoPriceReason::NoListings));
    assert_eq!(empty.listing_count(), 0);
}

#[tokio::test]
async fn test_unknown_mutation_sends_nothing() {
    let source = Arc::new(MockSource::new());
    let app = appraiser(source.clone());

    let err = app.fetch_single_price("Foo", Rarity::Og, "Plaid", None).await.unwrap_err();
    assert_eq!(err, PriceError::UnknownMutation("plaid".into()));
    assert_eq!(source.call_count(), 0);
}

// ---------------------------------------------------------------------------
// Retry behaviour
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_rate_limit_backoff_is_linear() {
    let source = Arc::new(MockSource::new().script(
        0,
        vec![
            status(429),
            status(429),
            listings(trusted_listings("Foo", dec!(40), 3)),
        ],
    ));
    let app = appraiser(source.clone());

    let start = Instant::now();
    let result = app.fetch_single_price("Foo", Rarity::Secret, "default", None).await.unwrap();
    assert_eq!(start.elapsed(), Duration::from_secs(6));
    assert_eq!(result.price(), Some(dec!(40)));

    let at: Vec<Duration> = source.requests().iter().map(|r| r.at - start).collect();
    assert_eq!(at, vec![Duration::ZERO, Duration::from_secs(2), Duration::from_secs(6)]);
}

#[tokio::test(start_paused = true)]
async fn test_persistent_rate_limit_gives_up() {
    let source = Arc::new(MockSource::with_default(status(429)));
    let app = appraiser(source.clone());

    let err = app.fetch_single_price("Foo", Rarity::Og, "default", None).await.unwrap_err();
    assert_eq!(err, PriceError::RateLimited { attempts: 3 });
    assert_eq!(source.call_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_not_found_is_retried_then_succeeds() {
    let source = Arc::new(MockSource::new().script(
        0,
        vec![status(404), listings(trusted_listings("Foo", dec!(7), 1))],
    ));
    let app = appraiser(source.clone());

    let result = app.fetch_single_price("Foo", Rarity::Og, "default", None).await.unwrap();
    assert_eq!(result, PriceResult::found(dec!(7), 1));
    assert_eq!(source.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_transport_failures_surface_as_fetch_error() {
    let source = Arc::new(MockSource::with_default(Err(TransportError::Timeout)));
    let app = appraiser(source.clone());

    let err = app.fetch_single_price("Foo", Rarity::Og, "default", None).await.unwrap_err();
    assert!(matches!(err, PriceError::FetchError(_)));
    assert_eq!(source.call_count(), 3);
}

#[tokio::test]
async fn test_server_error_fails_immediately() {
    let source = Arc::new(MockSource::with_default(status(503)));
    let app = appraiser(source.clone());

    let err = app.fetch_single_price("Foo", Rarity::Og, "default", None).await.unwrap_err();
    assert_eq!(err, PriceError::HttpError(503));
    assert_eq!(source.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_cuts_backoff_short() {
    let source = Arc::new(MockSource::with_default(status(429)));
    let app = appraiser(source.clone());

    let deadline = Instant::now() + Duration::from_secs(3);
    let err = app
        .fetch_single_price("Foo", Rarity::Og, "default", Some(deadline))
        .await
        .unwrap_err();
    assert_eq!(err, PriceError::DeadlineExceeded);
    assert_eq!(source.call_count(), 2);
}

// ---------------------------------------------------------------------------
// Sweeps
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_full_sweep_in_catalog_order_with_pacing() {
    let source = Arc::new(MockSource::with_default(listings(trusted_listings(
        "Foo",
        dec!(20),
        20,
    ))));
    let app = appraiser(source.clone());

    let report = app.sweep_item("Foo", Rarity::Secret, None).await.unwrap();

    let ids: Vec<u32> = source.requests().iter().map(|r| r.request.attribute_id).collect();
    assert_eq!(ids, (0..10).collect::<Vec<u32>>());

    let requests = source.requests();
    for pair in requests.windows(2) {
        assert!(pair[1].at - pair[0].at >= Duration::from_millis(500));
    }

    assert_eq!(report.entries.len(), 10);
    assert_eq!(report.entries[0].mutation, "default");
    assert_eq!(report.entries[9].mutation, "rainbow");
    assert_eq!(report.suspect_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_sweep_flags_suspicious_prices() {
    let source = Arc::new(
        MockSource::with_default(listings(trusted_listings("Foo", dec!(10), 20)))
            .always(1, listings(trusted_listings("Foo", dec!(900), 20)))
            .always(2, listings(trusted_listings("Foo", dec!(12), 2))),
    );
    let app = appraiser(source);

    let report = app.sweep_item("Foo", Rarity::Secret, None).await.unwrap();

    let gold = report.entry("gold").unwrap();
    assert_eq!(gold.price, dec!(900));
    assert!(matches!(gold.suspect[..], [SuspectFlag::FarAboveDefault { .. }]));

    let diamond = report.entry("diamond").unwrap();
    assert_eq!(
        diamond.suspect,
        vec![SuspectFlag::LowListingCount { count: 2, minimum: 10 }]
    );
    assert_eq!(report.suspect_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_sweep_without_default_price_has_no_baseline() {
    let source = Arc::new(
        MockSource::with_default(listings(trusted_listings("Foo", dec!(10), 20)))
            .always(0, listings(vec![])),
    );
    let app = appraiser(source);

    let report = app.sweep_item("Foo", Rarity::Og, None).await.unwrap();
    assert!(report.entry("default").is_none());
    assert_eq!(report.skipped[0].mutation, "default");
    assert!(report
        .entries
        .iter()
        .all(|e| e.suspect.contains(&SuspectFlag::NoBaseline)));
}

#[tokio::test]
async fn test_subset_sweep_with_unknown_key_sends_nothing() {
    let source = Arc::new(MockSource::new());
    let app = appraiser(source.clone());

    let err = app
        .orchestrator()
        .sweep_item_mutations("Foo", Rarity::Og, &["gold", "plaid"], None)
        .await
        .unwrap_err();
    assert!(err.aborts_sweep());
    assert_eq!(source.call_count(), 0);
}

// ---------------------------------------------------------------------------
// Refresh into storage
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_refresh_stores_tables_for_active_items() {
    let source = Arc::new(MockSource::with_default(listings(trusted_listings(
        "Foo",
        dec!(15),
        20,
    ))));
    let app = appraiser(source.clone());
    let store = temp_store();

    let items = vec![
        ItemRecord { name: "Foo".into(), rarity: Rarity::Og, active: true },
        ItemRecord { name: "Foo Bar".into(), rarity: Rarity::Secret, active: false },
    ];
    let reports = app.orchestrator().refresh(&items, &store).await;
    assert_eq!(reports.len(), 1);
    assert_eq!(source.call_count(), 10);

    let table = store.get("foo", Rarity::Og).await.unwrap().unwrap();
    assert_eq!(table.prices.len(), 10);
    assert_eq!(table.prices["gold"].price(), Some(dec!(15)));
    assert!(store.get("Foo Bar", Rarity::Secret).await.unwrap().is_none());

    let reloaded = storage::load_tables(store.path()).await.unwrap();
    assert_eq!(reloaded.len(), 1);
    let _ = tokio::fs::remove_file(store.path()).await;
}

// ---------------------------------------------------------------------------
// Valuation
// ---------------------------------------------------------------------------

#[test]
fn test_compose_and_convert() {
    let app = appraiser(Arc::new(MockSource::new()));

    assert_eq!(app.compose_value(dec!(1000), &["strawberry", "sombrero"]), Ok(dec!(1400)));
    assert_eq!(app.compose_value(dec!(1000), &["unheard-of"]), Ok(dec!(1000)));
    assert_eq!(app.compose_value(Decimal::ZERO, &["strawberry"]), Ok(Decimal::ZERO));

    assert_eq!(app.convert_to_presentation_units(dec!(137)), Ok(dec!(13700)));
    assert_eq!(app.convert_to_presentation_units(dec!(1.26)), Ok(dec!(150)));
}

#[test]
fn test_mutation_multiplier_then_traits() {
    let app = appraiser(Arc::new(MockSource::new()));

    let base = app.composer().apply_mutation(dec!(100), "Gold").unwrap();
    assert_eq!(base, dec!(125));
    assert_eq!(app.compose_value(base, &["strawberry"]), Ok(dec!(188)));

    let err = app.composer().apply_mutation(dec!(100), "plaid").unwrap_err();
    assert_eq!(err, ValuationError::UnknownMutation("plaid".into()));
}
