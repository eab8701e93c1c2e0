//! Application wiring and lifecycle.
//!
//! Startup order matters: the feed login is a precondition for everything
//! else and aborts the process on failure. The snapshot query is not: it
//! falls back to a zero-value placeholder so the service stays usable and
//! the first live ticks repair the numbers.

mod state;

pub use state::EngineState;

use std::sync::Arc;

use tokio::signal;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{FeedError, Result};
use crate::feed::{FeedClient, Subscription};
use crate::hub::BroadcastHub;
use crate::ingest::{run_engine_loop, IngestBridge};
use crate::rebalance::{self, Rebalancer};
use crate::server::{self, ServerContext};

/// Main application orchestrator.
pub struct App;

impl App {
    /// Run until shutdown is requested (ctrl-c) or a fatal error occurs.
    pub async fn run(config: Config) -> Result<()> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(async move {
            if let Err(e) = signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for shutdown signal");
            }
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        });
        Self::run_with_shutdown(config, shutdown_rx).await
    }

    /// Run with an externally controlled shutdown signal.
    pub async fn run_with_shutdown(
        config: Config,
        shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        let feed = build_feed(&config)?;
        info!(feed = feed.feed_name(), "logging in to feed");
        feed.login().await?;
        log_usage(feed.as_ref(), "startup").await;

        let snapshot = match feed.market_snapshot().await {
            Ok(mut snapshot) => {
                // Label with the same display codes the live ticks carry.
                snapshot.index.code = config.instruments.index_code.clone();
                snapshot.future.code = config.instruments.future_code.clone();
                snapshot
            }
            Err(e) => {
                warn!(error = %e, "snapshot query failed; starting with placeholder");
                crate::domain::MarketSnapshot::placeholder(
                    &config.instruments.index_code,
                    &config.instruments.future_code,
                )
            }
        };
        info!(
            index = %snapshot.index.price,
            future = %snapshot.future.price,
            "initial snapshot"
        );

        let state = Arc::new(EngineState::new(snapshot));
        let hub = Arc::new(BroadcastHub::new(config.server.send_timeout()));

        let (bridge, events) = IngestBridge::new(config.instruments.filter());
        feed.attach_sink(Arc::new(bridge));
        let engine = tokio::spawn(run_engine_loop(events, Arc::clone(&state), Arc::clone(&hub)));

        for subscription in [
            Subscription::tick(&config.instruments.index_topic),
            Subscription::tick(&config.instruments.future_code),
        ] {
            if let Err(e) = feed.subscribe(&subscription).await {
                warn!(code = %subscription.code, error = %e, "benchmark subscribe failed");
            }
        }

        let rebalancer = Rebalancer::new(
            Arc::clone(&feed),
            Arc::clone(&state),
            config.instruments.option_product.clone(),
        );
        let (rebalance, rebalance_task) = rebalance::spawn(rebalancer);

        let ctx = Arc::new(ServerContext {
            state,
            hub,
            rebalance,
            static_page: config.server.static_page.clone().into(),
            shutdown,
        });
        server::serve(ctx, &config.server.bind).await?;

        info!("viewer server stopped; shutting down");
        engine.abort();
        rebalance_task.abort();
        log_usage(feed.as_ref(), "shutdown").await;
        match tokio::time::timeout(config.server.shutdown_timeout(), feed.logout()).await {
            Ok(Ok(())) => info!("feed logout complete"),
            Ok(Err(e)) => warn!(error = %e, "feed logout failed"),
            Err(_) => warn!("feed logout timed out"),
        }
        Ok(())
    }
}

fn build_feed(config: &Config) -> Result<Arc<dyn FeedClient>> {
    match config.feed.driver.as_str() {
        #[cfg(feature = "sim")]
        "sim" => {
            let sim = &config.feed.sim;
            Ok(Arc::new(crate::feed::sim::SimFeed::new(
                crate::feed::sim::SimFeedParams {
                    index_topic: config.instruments.index_topic.clone(),
                    future_code: config.instruments.future_code.clone(),
                    option_product: config.instruments.option_product.clone(),
                    base_price: sim.base_price,
                    tick_interval: std::time::Duration::from_millis(sim.tick_interval_ms),
                    expiry_count: sim.expiry_count,
                },
            )))
        }
        other => Err(FeedError::UnknownDriver(other.to_string()).into()),
    }
}

async fn log_usage(feed: &dyn FeedClient, phase: &str) {
    match feed.usage().await {
        Ok(usage) => info!(
            phase,
            connections = usage.connections,
            remaining_kb = usage.remaining_bytes / 1024,
            "feed usage"
        ),
        Err(e) => warn!(phase, error = %e, "feed usage query failed"),
    }
}

