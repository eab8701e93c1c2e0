//! Integration tests for the ingest bridge and engine loop.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use rust_decimal_macros::dec;

use spreadcast::app::EngineState;
use spreadcast::domain::{MarketEvent, MarketSnapshot};
use spreadcast::feed::{FeedSink, RawBidAsk, RawTick};
use spreadcast::hub::BroadcastHub;
use spreadcast::ingest::{run_engine_loop, IngestBridge, InstrumentFilter};
use spreadcast::testkit::RecordingViewer;

fn filter() -> InstrumentFilter {
    InstrumentFilter {
        index_topic: "I/TSE/001".into(),
        index_code: "TSE001".into(),
        future_prefix: "TXF".into(),
        future_code: "TXFR1".into(),
    }
}

fn tick(code: &str, price: f64, volume: i64, secs: i64) -> RawTick {
    RawTick {
        code: code.into(),
        price,
        volume,
        time: Utc.timestamp_opt(secs, 0).unwrap(),
    }
}

#[tokio::test]
async fn index_events_filter_on_topic_and_relabel() {
    let (bridge, mut rx) = IngestBridge::new(filter());

    bridge.on_index_quote("I/OTC/101", tick("I/OTC/101", 100.0, 1, 0));
    bridge.on_index_quote("I/TSE/001", tick("I/TSE/001", 23000.5, 42, 0));
    drop(bridge);

    let event = rx.recv().await.unwrap();
    match event {
        MarketEvent::Index(quote) => {
            assert_eq!(quote.code, "TSE001");
            assert_eq!(quote.price, dec!(23000.5));
            assert_eq!(quote.volume, 42);
        }
        other => panic!("unexpected event: {other:?}"),
    }
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn future_events_filter_on_code_prefix() {
    let (bridge, mut rx) = IngestBridge::new(filter());

    bridge.on_tick(tick("MXFH6", 23010.0, 1, 0));
    bridge.on_tick(tick("TXFH6", 23012.0, 3, 0));
    drop(bridge);

    match rx.recv().await.unwrap() {
        MarketEvent::Future(quote) => {
            assert_eq!(quote.code, "TXFR1");
            assert_eq!(quote.price, dec!(23012));
        }
        other => panic!("unexpected event: {other:?}"),
    }
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn malformed_ticks_are_dropped() {
    let (bridge, mut rx) = IngestBridge::new(filter());

    bridge.on_index_quote("I/TSE/001", tick("I/TSE/001", f64::NAN, 1, 0));
    bridge.on_index_quote("I/TSE/001", tick("I/TSE/001", f64::INFINITY, 1, 0));
    bridge.on_index_quote("I/TSE/001", tick("I/TSE/001", 23000.0, -5, 0));
    bridge.on_index_quote("I/TSE/001", tick("I/TSE/001", 23001.0, 5, 0));
    drop(bridge);

    match rx.recv().await.unwrap() {
        MarketEvent::Index(quote) => assert_eq!(quote.price, dec!(23001)),
        other => panic!("unexpected event: {other:?}"),
    }
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn bidask_accepts_any_code_and_zeroes_empty_levels() {
    let (bridge, mut rx) = IngestBridge::new(filter());

    bridge.on_bidask(RawBidAsk {
        code: "TXO23000C08".into(),
        bid_prices: vec![101.5, 101.0],
        ask_prices: vec![],
        bid_volumes: vec![7, 3],
        ask_volumes: vec![],
        time: Utc.timestamp_opt(0, 0).unwrap(),
    });
    drop(bridge);

    match rx.recv().await.unwrap() {
        MarketEvent::BidAsk(quote) => {
            assert_eq!(quote.code, "TXO23000C08");
            assert_eq!(quote.bid, dec!(101.5));
            assert_eq!(quote.bid_vol, 7);
            assert_eq!(quote.ask, dec!(0));
            assert_eq!(quote.ask_vol, 0);
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn snapshot_keeps_the_last_fed_quote_per_instrument() {
    let (bridge, rx) = IngestBridge::new(filter());
    let state = Arc::new(EngineState::new(MarketSnapshot::placeholder(
        "TSE001", "TXFR1",
    )));
    let hub = Arc::new(BroadcastHub::new(Duration::from_millis(50)));

    // Future updates interleaved with index updates; timestamps are not
    // monotonic — arrival order must win.
    bridge.on_tick(tick("TXFH6", 23010.0, 1, 300));
    bridge.on_index_quote("I/TSE/001", tick("I/TSE/001", 23000.0, 9, 100));
    bridge.on_tick(tick("TXFH6", 23020.0, 2, 200));
    bridge.on_index_quote("I/TSE/001", tick("I/TSE/001", 23001.0, 10, 50));
    bridge.on_tick(tick("TXFH6", 23030.0, 3, 100));
    drop(bridge);

    run_engine_loop(rx, Arc::clone(&state), hub).await;

    let snapshot = state.snapshot();
    assert_eq!(snapshot.future.price, dec!(23030));
    assert_eq!(snapshot.future.volume, 3);
    assert_eq!(snapshot.index.price, dec!(23001));
}

#[tokio::test]
async fn engine_loop_broadcasts_frames_in_ingestion_order() {
    let (bridge, rx) = IngestBridge::new(filter());
    let state = Arc::new(EngineState::new(MarketSnapshot::placeholder(
        "TSE001", "TXFR1",
    )));
    let hub = Arc::new(BroadcastHub::new(Duration::from_millis(50)));
    let viewer = RecordingViewer::new();
    hub.register(viewer.clone());

    bridge.on_index_quote("I/TSE/001", tick("I/TSE/001", 23000.0, 1, 0));
    bridge.on_bidask(RawBidAsk {
        code: "TXO23000C08".into(),
        bid_prices: vec![100.0],
        ask_prices: vec![101.0],
        bid_volumes: vec![1],
        ask_volumes: vec![1],
        time: Utc.timestamp_opt(0, 0).unwrap(),
    });
    drop(bridge);

    run_engine_loop(rx, state, hub).await;

    let frames = viewer.frames();
    assert_eq!(frames.len(), 2);
    assert!(frames[0].contains("\"type\":\"index\""));
    assert!(frames[1].contains("\"type\":\"bidask\""));
}
