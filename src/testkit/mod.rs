//! Scripted mocks for integration tests.
//!
//! - [`MockFeed`] — Pre-loaded catalog/snapshot results with call counters
//!   and recorded subscriptions. Best for: rebalancer switch protocol,
//!   failure handling.
//! - [`RecordingViewer`] — Captures every delivered frame.
//! - [`NeverAckViewer`] — Delivery pends forever; trips the hub timeout.
//! - [`FailingViewer`] — Delivery errors immediately.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};

use crate::domain::{MarketSnapshot, OptionCatalog};
use crate::error::{Error, FeedError, Result};
use crate::feed::{FeedClient, FeedSink, FeedUsage, Subscription};
use crate::hub::ViewerSink;

// ---------------------------------------------------------------------------
// MockFeed
// ---------------------------------------------------------------------------

/// A mock [`FeedClient`] with a scripted catalog-result queue.
///
/// Each `option_catalog` call pops the next queued result; when the queue is
/// exhausted the default catalog is returned. Subscribe/unsubscribe calls
/// are recorded and counted; codes added via [`fail_subscribe`] error
/// instead.
#[derive(Default)]
pub struct MockFeed {
    default_catalog: Mutex<OptionCatalog>,
    catalog_results: Mutex<VecDeque<std::result::Result<OptionCatalog, String>>>,
    snapshot: Mutex<Option<MarketSnapshot>>,
    subscribes: Mutex<Vec<Subscription>>,
    unsubscribes: Mutex<Vec<Subscription>>,
    failing_codes: Mutex<Vec<String>>,
    catalog_count: AtomicU32,
    login_count: AtomicU32,
    logout_count: AtomicU32,
    sink: RwLock<Option<Arc<dyn FeedSink>>>,
    /// Delay applied inside `option_catalog`, for tests that need a wide
    /// in-flight window.
    pub catalog_delay: Mutex<Option<std::time::Duration>>,
}

impl MockFeed {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_catalog(self, catalog: OptionCatalog) -> Self {
        *self.default_catalog.lock() = catalog;
        self
    }

    /// Queue catalog results consumed before the default catalog.
    #[must_use]
    pub fn with_catalog_results(
        self,
        results: Vec<std::result::Result<OptionCatalog, String>>,
    ) -> Self {
        *self.catalog_results.lock() = results.into();
        self
    }

    #[must_use]
    pub fn with_snapshot(self, snapshot: MarketSnapshot) -> Self {
        *self.snapshot.lock() = Some(snapshot);
        self
    }

    /// Make subscribe calls for `code` fail.
    pub fn fail_subscribe(&self, code: impl Into<String>) {
        self.failing_codes.lock().push(code.into());
    }

    pub fn subscribed(&self) -> Vec<Subscription> {
        self.subscribes.lock().clone()
    }

    pub fn unsubscribed(&self) -> Vec<Subscription> {
        self.unsubscribes.lock().clone()
    }

    pub fn subscribe_count(&self) -> usize {
        self.subscribes.lock().len()
    }

    pub fn unsubscribe_count(&self) -> usize {
        self.unsubscribes.lock().len()
    }

    pub fn catalog_count(&self) -> u32 {
        self.catalog_count.load(Ordering::SeqCst)
    }

    pub fn login_count(&self) -> u32 {
        self.login_count.load(Ordering::SeqCst)
    }

    pub fn logout_count(&self) -> u32 {
        self.logout_count.load(Ordering::SeqCst)
    }

    pub fn clear_calls(&self) {
        self.subscribes.lock().clear();
        self.unsubscribes.lock().clear();
        self.catalog_count.store(0, Ordering::SeqCst);
    }

    /// The sink attached by the engine, for pushing scripted events.
    pub fn sink(&self) -> Option<Arc<dyn FeedSink>> {
        self.sink.read().clone()
    }
}

#[async_trait]
impl FeedClient for MockFeed {
    async fn login(&self) -> Result<()> {
        self.login_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn logout(&self) -> Result<()> {
        self.logout_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn option_catalog(&self, _product_prefix: &str) -> Result<OptionCatalog> {
        self.catalog_count.fetch_add(1, Ordering::SeqCst);
        let delay = *self.catalog_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match self.catalog_results.lock().pop_front() {
            Some(Ok(catalog)) => Ok(catalog),
            Some(Err(reason)) => Err(FeedError::Catalog(reason).into()),
            None => Ok(self.default_catalog.lock().clone()),
        }
    }

    async fn market_snapshot(&self) -> Result<MarketSnapshot> {
        self.snapshot
            .lock()
            .clone()
            .ok_or_else(|| Error::Feed(FeedError::Snapshot("no snapshot scripted".into())))
    }

    async fn subscribe(&self, subscription: &Subscription) -> Result<()> {
        if self.failing_codes.lock().contains(&subscription.code) {
            return Err(FeedError::Subscribe {
                code: subscription.code.clone(),
                reason: "scripted failure".into(),
            }
            .into());
        }
        self.subscribes.lock().push(subscription.clone());
        Ok(())
    }

    async fn unsubscribe(&self, subscription: &Subscription) -> Result<()> {
        self.unsubscribes.lock().push(subscription.clone());
        Ok(())
    }

    async fn usage(&self) -> Result<FeedUsage> {
        Ok(FeedUsage {
            connections: 1,
            remaining_bytes: 0,
        })
    }

    fn attach_sink(&self, sink: Arc<dyn FeedSink>) {
        *self.sink.write() = Some(sink);
    }

    fn feed_name(&self) -> &'static str {
        "mock"
    }
}

// ---------------------------------------------------------------------------
// Viewer sinks
// ---------------------------------------------------------------------------

/// A viewer sink that records every delivered frame.
#[derive(Default)]
pub struct RecordingViewer {
    frames: Mutex<Vec<String>>,
}

impl RecordingViewer {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn frames(&self) -> Vec<String> {
        self.frames.lock().clone()
    }

    pub fn frame_count(&self) -> usize {
        self.frames.lock().len()
    }
}

#[async_trait]
impl ViewerSink for RecordingViewer {
    async fn send_text(&self, text: &str) -> Result<()> {
        self.frames.lock().push(text.to_string());
        Ok(())
    }
}

/// A viewer sink that never acknowledges delivery.
#[derive(Default)]
pub struct NeverAckViewer;

impl NeverAckViewer {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self)
    }
}

#[async_trait]
impl ViewerSink for NeverAckViewer {
    async fn send_text(&self, _text: &str) -> Result<()> {
        std::future::pending().await
    }
}

/// A viewer sink whose deliveries error immediately.
#[derive(Default)]
pub struct FailingViewer;

impl FailingViewer {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self)
    }
}

#[async_trait]
impl ViewerSink for FailingViewer {
    async fn send_text(&self, _text: &str) -> Result<()> {
        Err(Error::Connection("scripted transport failure".into()))
    }
}
