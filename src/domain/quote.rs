//! Normalized quote events.
//!
//! The ingest bridge turns raw feed callbacks into these types. The engine
//! retains only the latest [`Quote`] per tracked instrument (index, future);
//! [`BidAsk`] quotes are forwarded to viewers and never stored.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Latest trade/level snapshot for a single instrument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    pub code: String,
    pub price: Decimal,
    pub volume: i64,
    pub time: DateTime<Utc>,
}

/// Top-of-book bid/ask for one subscribed option contract.
///
/// An empty best level on either side normalizes to zero price and volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BidAsk {
    pub code: String,
    pub bid: Decimal,
    pub ask: Decimal,
    pub bid_vol: i64,
    pub ask_vol: i64,
    pub time: DateTime<Utc>,
}

/// A normalized market event flowing from the ingest bridge to the engine loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarketEvent {
    Index(Quote),
    Future(Quote),
    BidAsk(BidAsk),
}

impl MarketEvent {
    /// Instrument code the event refers to.
    #[must_use]
    pub fn code(&self) -> &str {
        match self {
            MarketEvent::Index(q) | MarketEvent::Future(q) => &q.code,
            MarketEvent::BidAsk(b) => &b.code,
        }
    }
}
