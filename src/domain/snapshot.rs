//! Last-known index and near-month future snapshot.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::quote::Quote;

/// The latest known [`Quote`] for the benchmark index and the near-month
/// future.
///
/// Updated in place whenever a new event for either instrument arrives
/// (arrival order, not timestamp order; the feed guarantees per-instrument
/// ordering). Sent once to each viewer at connection time and after every
/// expiry switch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketSnapshot {
    pub index: Quote,
    pub future: Quote,
}

impl MarketSnapshot {
    /// Zero-value placeholder used when the startup snapshot query fails.
    ///
    /// Keeps the service usable: viewers see zero prices until the first
    /// live tick replaces them.
    #[must_use]
    pub fn placeholder(index_code: impl Into<String>, future_code: impl Into<String>) -> Self {
        let zero = |code: String| Quote {
            code,
            price: Decimal::ZERO,
            volume: 0,
            time: DateTime::<Utc>::UNIX_EPOCH,
        };
        Self {
            index: zero(index_code.into()),
            future: zero(future_code.into()),
        }
    }
}
