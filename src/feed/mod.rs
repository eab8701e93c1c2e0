//! Feed collaborator trait definitions.
//!
//! These traits define the interface any brokerage/market-data feed must
//! provide: session lifecycle, typed catalog and snapshot queries,
//! per-contract subscribe/unsubscribe, and push-callback registration.
//!
//! Callbacks on [`FeedSink`] may fire on execution contexts owned by the
//! feed (native I/O threads); implementations of the sink must confine
//! themselves to thread-safe handoff and never touch engine state directly.

#[cfg(feature = "sim")]
pub mod sim;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{MarketSnapshot, OptionCatalog};
use crate::error::Result;

/// Raw tick payload as delivered by the feed, before normalization.
///
/// Prices arrive as `f64` straight off the wire; the ingest bridge converts
/// them to `Decimal` and drops non-finite values.
#[derive(Debug, Clone)]
pub struct RawTick {
    pub code: String,
    pub price: f64,
    pub volume: i64,
    pub time: DateTime<Utc>,
}

/// Raw top-of-book payload. Level arrays may be empty when the book has no
/// resting orders on a side.
#[derive(Debug, Clone)]
pub struct RawBidAsk {
    pub code: String,
    pub bid_prices: Vec<f64>,
    pub ask_prices: Vec<f64>,
    pub bid_volumes: Vec<i64>,
    pub ask_volumes: Vec<i64>,
    pub time: DateTime<Utc>,
}

/// Feed session event (connection status, resubscription notices, ...).
#[derive(Debug, Clone)]
pub struct SystemEvent {
    pub resp_code: i32,
    pub event_code: i32,
    pub info: String,
    pub event: String,
}

/// Which quote stream to (un)subscribe for an instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteType {
    Tick,
    BidAsk,
}

/// One instrument subscription: code plus quote stream selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub code: String,
    pub quote_type: QuoteType,
}

impl Subscription {
    pub fn tick(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            quote_type: QuoteType::Tick,
        }
    }

    pub fn bid_ask(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            quote_type: QuoteType::BidAsk,
        }
    }
}

/// Feed quota usage, logged at startup and shutdown.
#[derive(Debug, Clone, Copy)]
pub struct FeedUsage {
    pub connections: u32,
    pub remaining_bytes: u64,
}

/// Receiver for feed push callbacks.
///
/// Implementations must be cheap and non-blocking: callbacks run on the
/// feed's own threads.
pub trait FeedSink: Send + Sync {
    /// Exchange-level quote callback carrying the publisher topic. The
    /// benchmark index arrives here.
    fn on_index_quote(&self, topic: &str, tick: RawTick);

    /// Futures tick callback.
    fn on_tick(&self, tick: RawTick);

    /// Option top-of-book callback.
    fn on_bidask(&self, bidask: RawBidAsk);

    /// Feed session events.
    fn on_system_event(&self, event: SystemEvent);
}

/// A brokerage/market-data feed.
#[async_trait]
pub trait FeedClient: Send + Sync {
    /// Establish the feed session. Required before any other call; failure
    /// here aborts startup.
    async fn login(&self) -> Result<()>;

    /// Tear down the feed session. Implicitly unsubscribes everything.
    async fn logout(&self) -> Result<()>;

    /// Typed option catalog for products whose code-name starts with
    /// `product_prefix`.
    async fn option_catalog(&self, product_prefix: &str) -> Result<OptionCatalog>;

    /// Point-in-time index and near-month future snapshot.
    async fn market_snapshot(&self) -> Result<MarketSnapshot>;

    async fn subscribe(&self, subscription: &Subscription) -> Result<()>;

    async fn unsubscribe(&self, subscription: &Subscription) -> Result<()>;

    /// Current quota usage.
    async fn usage(&self) -> Result<FeedUsage>;

    /// Register the callback receiver. Later calls replace earlier ones.
    fn attach_sink(&self, sink: Arc<dyn FeedSink>);

    /// Feed name for logging.
    fn feed_name(&self) -> &'static str;
}
