//! Integration tests for the subscription rebalancer's switch protocol.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use spreadcast::app::EngineState;
use spreadcast::domain::{
    ExpiryDate, MarketSnapshot, OptionCatalog, OptionContract, OptionRight, Quote,
};
use spreadcast::feed::QuoteType;
use spreadcast::rebalance::{self, Rebalancer, SwitchError, SwitchOutcome};
use spreadcast::testkit::MockFeed;

const NEAR: &str = "2026/08/19";
const FAR: &str = "2026/09/16";

fn date(s: &str) -> ExpiryDate {
    s.parse().unwrap()
}

/// Catalog with calls and puts at strikes 100..=400 for two expiries. Codes
/// are prefixed by the expiry tag so tests can tell which date a derived
/// strategy was built from.
fn catalog() -> OptionCatalog {
    let mut contracts = Vec::new();
    for (tag, expiry) in [("A", NEAR), ("B", FAR)] {
        for strike in [100, 200, 300, 400] {
            for (r, right) in [("C", OptionRight::Call), ("P", OptionRight::Put)] {
                contracts.push(OptionContract::new(
                    format!("{tag}{r}{strike}"),
                    Decimal::from(strike),
                    right,
                    date(expiry),
                ));
            }
        }
    }
    let mut products = HashMap::new();
    products.insert("TXO".to_string(), contracts);
    OptionCatalog::from_products(products)
}

/// Snapshot whose future quote is fresher, so the reference price is 250.
fn snapshot() -> MarketSnapshot {
    let quote = |code: &str, price: Decimal, secs: i64| Quote {
        code: code.into(),
        price,
        volume: 0,
        time: Utc.timestamp_opt(secs, 0).unwrap(),
    };
    MarketSnapshot {
        index: quote("TSE001", dec!(240), 100),
        future: quote("TXFR1", dec!(250), 200),
    }
}

fn fixture() -> (Arc<MockFeed>, Arc<EngineState>, Rebalancer) {
    let feed = Arc::new(MockFeed::new().with_catalog(catalog()));
    let state = Arc::new(EngineState::new(snapshot()));
    let rebalancer = Rebalancer::new(feed.clone(), state.clone(), "TXO");
    (feed, state, rebalancer)
}

#[tokio::test]
async fn initial_switch_selects_earliest_date() {
    let (feed, state, rebalancer) = fixture();

    let outcome = rebalancer.switch(None).await.unwrap();
    assert_eq!(outcome, SwitchOutcome::Switched);

    let sub = state.subscription();
    assert_eq!(sub.active_date, Some(date(NEAR)));
    assert_eq!(sub.available_dates, vec![date(NEAR), date(FAR)]);

    // Reference 250: call window keeps (300, 400), put window keeps (200, 100).
    let codes: Vec<&str> = sub.contracts.iter().map(|c| c.code()).collect();
    assert_eq!(codes, vec!["AC300", "AC400", "AP200", "AP100"]);

    assert_eq!(sub.strategies.len(), 2);
    assert_eq!(sub.strategies[0].side, OptionRight::Call);
    assert_eq!(sub.strategies[0].short_desc, "Sell 300");
    assert_eq!(sub.strategies[1].side, OptionRight::Put);
    assert_eq!(sub.strategies[1].short_desc, "Sell 200");

    // One bid/ask subscription per selected contract, nothing torn down.
    assert_eq!(feed.subscribe_count(), 4);
    assert_eq!(feed.unsubscribe_count(), 0);
    assert!(feed
        .subscribed()
        .iter()
        .all(|s| s.quote_type == QuoteType::BidAsk));
}

#[tokio::test]
async fn switch_to_other_date_replaces_whole_set() {
    let (feed, state, rebalancer) = fixture();
    rebalancer.switch(None).await.unwrap();
    feed.clear_calls();

    let outcome = rebalancer.switch(Some(date(FAR))).await.unwrap();
    assert_eq!(outcome, SwitchOutcome::Switched);

    // Old set torn down before the new one is subscribed.
    assert_eq!(feed.unsubscribe_count(), 4);
    assert_eq!(feed.subscribe_count(), 4);

    let sub = state.subscription();
    assert_eq!(sub.active_date, Some(date(FAR)));
    assert!(sub.contracts.iter().all(|c| c.code().starts_with('B')));
    assert!(sub
        .strategies
        .iter()
        .all(|s| s.short_code.starts_with('B') && s.long_code.starts_with('B')));
}

#[tokio::test]
async fn redundant_switches_make_no_feed_calls() {
    let (feed, state, rebalancer) = fixture();
    rebalancer.switch(None).await.unwrap();
    feed.clear_calls();

    // Same explicit date.
    let outcome = rebalancer.switch(Some(date(NEAR))).await.unwrap();
    assert_eq!(outcome, SwitchOutcome::Noop);

    // Unspecified target while already on the earliest available date.
    let outcome = rebalancer.switch(None).await.unwrap();
    assert_eq!(outcome, SwitchOutcome::Noop);

    assert_eq!(feed.subscribe_count(), 0);
    assert_eq!(feed.unsubscribe_count(), 0);
    assert_eq!(feed.catalog_count(), 0);
    assert_eq!(state.subscription().active_date, Some(date(NEAR)));
}

#[tokio::test]
async fn catalog_failure_aborts_and_preserves_published_state() {
    let feed = Arc::new(
        MockFeed::new()
            .with_catalog(catalog())
            .with_catalog_results(vec![Ok(catalog()), Err("boom".into())]),
    );
    let state = Arc::new(EngineState::new(snapshot()));
    let rebalancer = Rebalancer::new(feed.clone(), state.clone(), "TXO");

    rebalancer.switch(None).await.unwrap();
    let before = state.subscription();
    feed.clear_calls();

    let err = rebalancer.switch(Some(date(FAR))).await.unwrap_err();
    assert!(matches!(err, SwitchError::Catalog(_)));

    // Published state untouched; the accepted inconsistency window is that
    // the old subscriptions were already torn down.
    assert_eq!(state.subscription(), before);
    assert_eq!(feed.unsubscribe_count(), 4);
    assert_eq!(feed.subscribe_count(), 0);

    // Retrying the whole switch succeeds once the catalog is back.
    let outcome = rebalancer.switch(Some(date(FAR))).await.unwrap();
    assert_eq!(outcome, SwitchOutcome::Switched);
    assert_eq!(state.subscription().active_date, Some(date(FAR)));
}

#[tokio::test]
async fn individual_subscribe_failures_are_skipped() {
    let (feed, state, rebalancer) = fixture();
    feed.fail_subscribe("AC300");

    let outcome = rebalancer.switch(None).await.unwrap();
    assert_eq!(outcome, SwitchOutcome::Switched);

    // The batch continues past the failure and the switch still publishes.
    assert_eq!(feed.subscribe_count(), 3);
    assert_eq!(state.subscription().contracts.len(), 4);
}

#[tokio::test]
async fn unknown_delivery_date_yields_empty_selection() {
    let (feed, state, rebalancer) = fixture();

    let outcome = rebalancer.switch(Some(date("2027/01/20"))).await.unwrap();
    assert_eq!(outcome, SwitchOutcome::Switched);

    let sub = state.subscription();
    assert_eq!(sub.active_date, Some(date("2027/01/20")));
    assert!(sub.contracts.is_empty());
    assert!(sub.strategies.is_empty());
    assert_eq!(feed.subscribe_count(), 0);
}

#[tokio::test]
async fn readers_never_observe_mixed_state() {
    let (feed, state, rebalancer) = fixture();
    *feed.catalog_delay.lock() = Some(Duration::from_millis(1));
    rebalancer.switch(None).await.unwrap();

    let writer = tokio::spawn(async move {
        for _ in 0..20 {
            rebalancer.switch(Some(date(FAR))).await.unwrap();
            rebalancer.switch(Some(date(NEAR))).await.unwrap();
        }
    });

    // Strategies and contracts must always match the published active date,
    // no matter when the read lands relative to a switch.
    for _ in 0..2000 {
        let sub = state.subscription();
        if let Some(active) = sub.active_date {
            let tag = if active == date(NEAR) { 'A' } else { 'B' };
            assert!(sub.contracts.iter().all(|c| c.delivery_date() == active));
            assert!(sub.strategies.iter().all(|s| s.short_code.starts_with(tag)));
        }
        tokio::task::yield_now().await;
    }

    writer.await.unwrap();
}

#[tokio::test]
async fn queued_requests_for_same_target_collapse() {
    let (feed, state, rebalancer) = fixture();
    let (handle, _task) = rebalance::spawn(rebalancer);

    handle.switch(None).await.unwrap();
    feed.clear_calls();
    *feed.catalog_delay.lock() = Some(Duration::from_millis(50));

    let (first, second, third) = tokio::join!(
        handle.switch(Some(date(FAR))),
        handle.switch(Some(date(FAR))),
        handle.switch(Some(date(FAR)))
    );

    // All three resolve, but the feed saw a single switch: concurrent
    // requests either collapsed into the first or no-opped after it.
    assert!(first.is_ok() && second.is_ok() && third.is_ok());
    assert_eq!(feed.catalog_count(), 1);
    assert!([first, second, third]
        .iter()
        .any(|r| *r == Ok(SwitchOutcome::Switched)));
    assert_eq!(state.subscription().active_date, Some(date(FAR)));
}
