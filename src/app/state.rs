//! Shared engine state.

use parking_lot::RwLock;

use crate::domain::{MarketSnapshot, Quote};
use crate::rebalance::SubscriptionState;

/// State shared between the engine loop, the rebalancer, and viewer
/// handlers.
///
/// The quote snapshot is written only by the engine loop; the subscription
/// state is written only by the rebalancer, wholesale, so readers can never
/// observe strategies computed for one expiry alongside another expiry's
/// `active_date`.
pub struct EngineState {
    snapshot: RwLock<MarketSnapshot>,
    subscription: RwLock<SubscriptionState>,
}

impl EngineState {
    #[must_use]
    pub fn new(snapshot: MarketSnapshot) -> Self {
        Self {
            snapshot: RwLock::new(snapshot),
            subscription: RwLock::new(SubscriptionState::idle()),
        }
    }

    /// Latest index/future snapshot.
    #[must_use]
    pub fn snapshot(&self) -> MarketSnapshot {
        self.snapshot.read().clone()
    }

    /// Replace the latest index quote. Arrival order wins; the feed
    /// guarantees per-instrument ordering.
    pub fn set_index(&self, quote: Quote) {
        self.snapshot.write().index = quote;
    }

    /// Replace the latest future quote.
    pub fn set_future(&self, quote: Quote) {
        self.snapshot.write().future = quote;
    }

    /// Current subscription state (cloned under the read lock, so the view
    /// is internally consistent).
    #[must_use]
    pub fn subscription(&self) -> SubscriptionState {
        self.subscription.read().clone()
    }

    /// Atomically publish a new subscription state. Called only by the
    /// rebalancer.
    pub fn publish(&self, state: SubscriptionState) {
        *self.subscription.write() = state;
    }
}
