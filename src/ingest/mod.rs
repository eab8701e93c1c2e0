//! Cross-context ingestion bridge and the engine event loop.
//!
//! Feed callbacks fire on threads the feed owns. The [`IngestBridge`]
//! implements the feed's callback trait, filters and normalizes each
//! payload, and hands it over an mpsc channel to the engine loop, the
//! single coordination context that owns the quote snapshot and drives the
//! broadcast hub. Per-instrument arrival order is preserved by the channel;
//! ordering across instruments is not guaranteed and not required.
//!
//! If the engine loop is not running (startup race, shutdown) events are
//! dropped with a warning; there is no unbounded buffer behind a dead
//! consumer.

use std::sync::Arc;

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::app::EngineState;
use crate::domain::{BidAsk, MarketEvent, Quote};
use crate::feed::{FeedSink, RawBidAsk, RawTick, SystemEvent};
use crate::hub::BroadcastHub;
use crate::server::Frame;

/// Instrument-matching rules applied before normalization.
#[derive(Debug, Clone)]
pub struct InstrumentFilter {
    /// Feed topic identifying the benchmark index.
    pub index_topic: String,
    /// Display code stamped on outbound index frames.
    pub index_code: String,
    /// Code prefix of the near-month future family.
    pub future_prefix: String,
    /// Display code stamped on outbound future frames.
    pub future_code: String,
}

/// Thread-safe handoff from feed callbacks into the engine loop.
#[derive(Clone)]
pub struct IngestBridge {
    tx: mpsc::UnboundedSender<MarketEvent>,
    filter: InstrumentFilter,
}

impl IngestBridge {
    /// Create the bridge and the receiving end for the engine loop.
    #[must_use]
    pub fn new(filter: InstrumentFilter) -> (Self, mpsc::UnboundedReceiver<MarketEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx, filter }, rx)
    }

    fn submit(&self, event: MarketEvent) {
        if self.tx.send(event).is_err() {
            warn!("engine loop not running; dropping feed event");
        }
    }

    /// Normalize a raw tick, labeling it with `code`.
    ///
    /// Malformed payloads (non-finite price, negative volume) are dropped
    /// with a warning so one bad event never affects distribution of the
    /// rest.
    fn normalize(&self, tick: RawTick, code: &str) -> Option<Quote> {
        let Some(price) = Decimal::from_f64(tick.price) else {
            warn!(code, price = tick.price, "dropping tick with non-finite price");
            return None;
        };
        if tick.volume < 0 {
            warn!(code, volume = tick.volume, "dropping tick with negative volume");
            return None;
        }
        Some(Quote {
            code: code.to_string(),
            price,
            volume: tick.volume,
            time: tick.time,
        })
    }
}

fn best_level(prices: &[f64], volumes: &[i64]) -> (Decimal, i64) {
    let price = prices
        .first()
        .and_then(|p| Decimal::from_f64(*p))
        .unwrap_or(Decimal::ZERO);
    let volume = volumes.first().copied().unwrap_or(0).max(0);
    (price, volume)
}

impl FeedSink for IngestBridge {
    fn on_index_quote(&self, topic: &str, tick: RawTick) {
        if topic != self.filter.index_topic {
            return;
        }
        let code = self.filter.index_code.clone();
        if let Some(quote) = self.normalize(tick, &code) {
            self.submit(MarketEvent::Index(quote));
        }
    }

    fn on_tick(&self, tick: RawTick) {
        if !tick.code.starts_with(&self.filter.future_prefix) {
            return;
        }
        let code = self.filter.future_code.clone();
        if let Some(quote) = self.normalize(tick, &code) {
            self.submit(MarketEvent::Future(quote));
        }
    }

    fn on_bidask(&self, bidask: RawBidAsk) {
        // No code filter: only currently-subscribed contracts produce these.
        let (bid, bid_vol) = best_level(&bidask.bid_prices, &bidask.bid_volumes);
        let (ask, ask_vol) = best_level(&bidask.ask_prices, &bidask.ask_volumes);
        self.submit(MarketEvent::BidAsk(BidAsk {
            code: bidask.code,
            bid,
            ask,
            bid_vol,
            ask_vol,
            time: bidask.time,
        }));
    }

    fn on_system_event(&self, event: SystemEvent) {
        info!(
            resp_code = event.resp_code,
            event_code = event.event_code,
            info = %event.info,
            event = %event.event,
            "feed system event"
        );
    }
}

/// The engine loop: drains normalized events in order, maintains the
/// index/future snapshot, and fans each frame out to viewers.
///
/// Exits when every bridge clone has been dropped.
pub async fn run_engine_loop(
    mut rx: mpsc::UnboundedReceiver<MarketEvent>,
    state: Arc<EngineState>,
    hub: Arc<BroadcastHub>,
) {
    while let Some(event) = rx.recv().await {
        match &event {
            MarketEvent::Index(quote) => state.set_index(quote.clone()),
            MarketEvent::Future(quote) => state.set_future(quote.clone()),
            MarketEvent::BidAsk(_) => {}
        }

        match serde_json::to_string(&Frame::from_event(&event)) {
            Ok(text) => hub.broadcast(&text).await,
            Err(e) => warn!(error = %e, "failed to serialize frame"),
        }
    }
    debug!("ingest channel closed; engine loop exiting");
}
