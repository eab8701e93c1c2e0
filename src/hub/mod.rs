//! Viewer registry and broadcast fan-out.
//!
//! The hub owns the set of connected viewers and delivers each outbound
//! frame to all of them concurrently, each delivery bounded by a fixed
//! timeout. A viewer whose delivery times out or errors is unregistered as
//! part of the same broadcast: delivery failures are routine (viewers
//! disconnect constantly), so the hub heals itself without an explicit
//! cleanup pass and never surfaces an error to the caller.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::future::join_all;
use tracing::{debug, warn};

use crate::error::Result;

/// Opaque handle for one connected viewer. No identity across reconnects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewerId(u64);

impl fmt::Display for ViewerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "viewer-{}", self.0)
    }
}

/// Outbound half of one viewer connection.
///
/// `send_text` must complete promptly for a healthy viewer; the hub wraps
/// every call in its delivery timeout, so implementations are free to block
/// on transport backpressure.
#[async_trait]
pub trait ViewerSink: Send + Sync {
    async fn send_text(&self, text: &str) -> Result<()>;
}

/// Registry of connected viewers with concurrent, timeout-bounded fan-out.
pub struct BroadcastHub {
    viewers: DashMap<ViewerId, Arc<dyn ViewerSink>>,
    next_id: AtomicU64,
    send_timeout: Duration,
}

impl BroadcastHub {
    #[must_use]
    pub fn new(send_timeout: Duration) -> Self {
        Self {
            viewers: DashMap::new(),
            next_id: AtomicU64::new(0),
            send_timeout,
        }
    }

    /// Add a viewer to the active set and return its handle.
    ///
    /// Registering a sink that is already present returns the existing
    /// handle instead of adding a duplicate.
    pub fn register(&self, sink: Arc<dyn ViewerSink>) -> ViewerId {
        if let Some(existing) = self
            .viewers
            .iter()
            .find(|entry| Arc::ptr_eq(entry.value(), &sink))
        {
            return *existing.key();
        }

        let id = ViewerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.viewers.insert(id, sink);
        debug!(viewer = %id, viewers = self.viewers.len(), "viewer registered");
        id
    }

    /// Remove a viewer from the active set. Idempotent.
    pub fn unregister(&self, id: ViewerId) {
        if self.viewers.remove(&id).is_some() {
            debug!(viewer = %id, viewers = self.viewers.len(), "viewer unregistered");
        }
    }

    #[must_use]
    pub fn viewer_count(&self) -> usize {
        self.viewers.len()
    }

    /// Deliver `message` to every registered viewer.
    ///
    /// All deliveries run concurrently, each bounded by the hub's send
    /// timeout, so one stalled viewer can neither delay the others nor hold
    /// up the caller beyond timeout plus bookkeeping. Viewers that time out
    /// or error are unregistered here. Never returns an error; a no-op on an
    /// empty registry.
    pub async fn broadcast(&self, message: &str) {
        if self.viewers.is_empty() {
            return;
        }

        let targets: Vec<(ViewerId, Arc<dyn ViewerSink>)> = self
            .viewers
            .iter()
            .map(|entry| (*entry.key(), Arc::clone(entry.value())))
            .collect();

        let deliveries = targets.into_iter().map(|(id, sink)| async move {
            match tokio::time::timeout(self.send_timeout, sink.send_text(message)).await {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some((id, e.to_string())),
                Err(_) => Some((id, "delivery timed out".to_string())),
            }
        });

        for (id, reason) in join_all(deliveries).await.into_iter().flatten() {
            warn!(viewer = %id, reason = %reason, "dropping viewer after failed delivery");
            self.unregister(id);
        }
    }
}
