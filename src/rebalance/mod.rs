//! Subscription rebalancing: atomic expiry switches.
//!
//! The [`Rebalancer`] cycles the engine between `Active(date)` states for
//! the process lifetime: unsubscribe the old contract set, refetch the
//! catalog, reselect the strike windows, subscribe the new set, and publish
//! the whole [`SubscriptionState`] in one atomic write so viewers never see
//! strategies computed for one expiry alongside another expiry's active
//! date.
//!
//! Switch requests are processed by a dedicated task, one at a time;
//! requests arriving while one is in flight queue behind it, and
//! consecutive queued requests for the same target collapse into a single
//! switch.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::app::EngineState;
use crate::domain::{
    build_strategies, reference_price, select_chain, ChainSelection, ExpiryDate, OptionContract,
    Strategy,
};
use crate::feed::{FeedClient, Subscription};

/// The one process-wide subscription snapshot.
///
/// `contracts` and `strategies` always correspond to `active_date`;
/// `available_dates` is ascending and non-empty once a catalog has been
/// fetched. `active_date == None` is the idle state before the first switch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubscriptionState {
    pub active_date: Option<ExpiryDate>,
    pub contracts: Vec<OptionContract>,
    pub strategies: Vec<Strategy>,
    pub available_dates: Vec<ExpiryDate>,
}

impl SubscriptionState {
    #[must_use]
    pub fn idle() -> Self {
        Self::default()
    }
}

/// Outcome of a switch request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchOutcome {
    /// The subscription set was replaced and published.
    Switched,
    /// The request was redundant; no feed calls were made.
    Noop,
}

/// Switch failures. Cloneable so one outcome can answer collapsed requests.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SwitchError {
    #[error("catalog query failed: {0}")]
    Catalog(String),

    #[error("no open delivery dates in catalog")]
    NoOpenDates,

    #[error("rebalancer stopped")]
    Stopped,
}

pub type SwitchResult = Result<SwitchOutcome, SwitchError>;

/// Drives the switch protocol against the feed collaborator.
pub struct Rebalancer {
    feed: Arc<dyn FeedClient>,
    state: Arc<EngineState>,
    product_prefix: String,
}

impl Rebalancer {
    #[must_use]
    pub fn new(
        feed: Arc<dyn FeedClient>,
        state: Arc<EngineState>,
        product_prefix: impl Into<String>,
    ) -> Self {
        Self {
            feed,
            state,
            product_prefix: product_prefix.into(),
        }
    }

    /// Switch the live subscription set to `target` (or the earliest
    /// available expiry when `None`).
    ///
    /// Redundant requests (the active date, or an unspecified target while
    /// the active date is already the earliest available) return
    /// [`SwitchOutcome::Noop`] without any feed calls.
    ///
    /// A catalog failure aborts the switch and leaves the previously
    /// published state intact. The old subscriptions are already torn down
    /// at that point; this narrow inconsistency window is accepted and
    /// resolved by retrying the whole switch, never by a partial fallback.
    pub async fn switch(&self, target: Option<ExpiryDate>) -> SwitchResult {
        let current = self.state.subscription();
        let redundant = match target {
            Some(date) => current.active_date == Some(date),
            None => {
                current.active_date.is_some()
                    && current.active_date == current.available_dates.first().copied()
            }
        };
        if redundant {
            return Ok(SwitchOutcome::Noop);
        }

        // Tear down the old set first; individual failures are logged and
        // skipped so one bad contract cannot wedge the switch.
        if !current.contracts.is_empty() {
            info!(count = current.contracts.len(), "unsubscribing old contracts");
            for contract in &current.contracts {
                let subscription = Subscription::bid_ask(contract.code());
                if let Err(e) = self.feed.unsubscribe(&subscription).await {
                    warn!(code = contract.code(), error = %e, "unsubscribe failed; skipping");
                }
            }
        }

        let catalog = self
            .feed
            .option_catalog(&self.product_prefix)
            .await
            .map_err(|e| SwitchError::Catalog(e.to_string()))?;
        let available_dates = catalog.available_dates();

        let date = match target {
            Some(date) => date,
            None => catalog.earliest_date().ok_or(SwitchError::NoOpenDates)?,
        };

        let reference = reference_price(&self.state.snapshot());
        let selection = match catalog.product_for_date(date) {
            Some(product) => select_chain(catalog.contracts(product), date, reference),
            None => {
                warn!(date = %date, "no product lists the requested delivery date");
                ChainSelection::default()
            }
        };
        let strategies = build_strategies(&selection);
        let contracts = selection.combined();

        info!(
            date = %date,
            reference = %reference,
            contracts = contracts.len(),
            strategies = strategies.len(),
            "subscribing new contracts"
        );
        for contract in &contracts {
            let subscription = Subscription::bid_ask(contract.code());
            if let Err(e) = self.feed.subscribe(&subscription).await {
                warn!(code = contract.code(), error = %e, "subscribe failed; skipping");
            }
        }

        self.state.publish(SubscriptionState {
            active_date: Some(date),
            contracts,
            strategies,
            available_dates,
        });

        Ok(SwitchOutcome::Switched)
    }
}

struct SwitchRequest {
    target: Option<ExpiryDate>,
    reply: oneshot::Sender<SwitchResult>,
}

/// Cloneable handle for submitting switch requests to the rebalance task.
#[derive(Clone)]
pub struct RebalanceHandle {
    tx: mpsc::UnboundedSender<SwitchRequest>,
}

impl RebalanceHandle {
    /// Request a switch and wait for it (and any switches queued ahead of
    /// it) to complete.
    pub async fn switch(&self, target: Option<ExpiryDate>) -> SwitchResult {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(SwitchRequest { target, reply })
            .map_err(|_| SwitchError::Stopped)?;
        rx.await.map_err(|_| SwitchError::Stopped)?
    }
}

/// Spawn the rebalance task. Dropping every handle stops it.
#[must_use]
pub fn spawn(rebalancer: Rebalancer) -> (RebalanceHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(run(rebalancer, rx));
    (RebalanceHandle { tx }, task)
}

async fn run(rebalancer: Rebalancer, mut rx: mpsc::UnboundedReceiver<SwitchRequest>) {
    // Carried over when draining the queue hits a different target.
    let mut pending: Option<SwitchRequest> = None;

    loop {
        let head = match pending.take() {
            Some(request) => request,
            None => match rx.recv().await {
                Some(request) => request,
                None => break,
            },
        };

        // Collapse consecutive queued requests for the same target.
        let target = head.target;
        let mut replies = vec![head.reply];
        while let Ok(next) = rx.try_recv() {
            if next.target == target {
                replies.push(next.reply);
            } else {
                pending = Some(next);
                break;
            }
        }

        let outcome = rebalancer.switch(target).await;
        if let Err(ref e) = outcome {
            warn!(error = %e, "switch aborted; previous subscription state kept");
        }
        for reply in replies {
            let _ = reply.send(outcome.clone());
        }
    }
}
