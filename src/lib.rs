//! Spreadcast - real-time index option quote distribution.
//!
//! A websocket server that fans live derivative-market quotes (benchmark
//! index, near-month future, and a dynamically selected option ladder) out
//! to any number of concurrent viewers, and rebalances the watched option
//! contracts as the underlying price and the selected expiry change.
//!
//! # Architecture
//!
//! Market events are produced by a feed collaborator on its own threads,
//! cross into the engine through the ingest bridge's channel, and fan out
//! to viewers from the broadcast hub; a slow viewer times out and is
//! dropped without stalling the rest. Expiry switches run through the
//! rebalancer, which replaces the whole subscription state atomically so
//! viewers never observe a mix of old and new contracts.
//!
//! # Modules
//!
//! - [`config`] - Configuration loading from TOML files
//! - [`domain`] - Feed-agnostic types: quotes, contracts, strike selection,
//!   vertical-spread strategies
//! - [`error`] - Error types for the crate
//! - [`feed`] - Trait definitions for feed implementations, plus the
//!   built-in `sim` driver
//! - [`hub`] - Viewer registry and timeout-bounded broadcast fan-out
//! - [`ingest`] - Cross-context bridge from feed callbacks into the engine
//! - [`rebalance`] - The expiry-switch state machine
//! - [`server`] - Viewer-facing websocket endpoints and wire frames
//! - [`app`] - Application orchestration
//!
//! # Features
//!
//! - `sim` (default) - Synthetic feed driver for running without brokerage
//!   credentials
//! - `testkit` - Scripted mocks for integration tests

pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod feed;
pub mod hub;
pub mod ingest;
pub mod rebalance;
pub mod server;

#[cfg(feature = "testkit")]
pub mod testkit;
