//! Simulated feed driver.
//!
//! Generates a synthetic option catalog and random-walk ticks so the server
//! can run end-to-end without brokerage credentials. Selected with
//! `feed.driver = "sim"` in the config.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Datelike, Utc};
use parking_lot::{Mutex, RwLock};
use rand::{rngs::StdRng, Rng, SeedableRng};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use tokio::task::JoinHandle;
use tracing::info;

use crate::domain::{
    ExpiryDate, MarketSnapshot, OptionCatalog, OptionContract, OptionRight, Quote,
};
use crate::error::Result;

use super::{FeedClient, FeedSink, FeedUsage, QuoteType, RawBidAsk, RawTick, Subscription};

/// Everything the simulator needs to know about the instruments it fakes.
#[derive(Debug, Clone)]
pub struct SimFeedParams {
    /// Topic published for benchmark index quotes.
    pub index_topic: String,
    /// Code stamped on simulated future ticks; must match the engine's
    /// configured future family prefix.
    pub future_code: String,
    /// Product code-name of the generated option catalog.
    pub option_product: String,
    /// Starting index level for the random walk.
    pub base_price: f64,
    /// Delay between simulated tick rounds.
    pub tick_interval: Duration,
    /// How many monthly expiries to list.
    pub expiry_count: u32,
}

/// Strike ladder half-width around the base price.
const STRIKE_RANGE: i64 = 2400;
/// Strike spacing.
const STRIKE_STEP: i64 = 100;

struct Inner {
    params: SimFeedParams,
    sink: RwLock<Option<Arc<dyn FeedSink>>>,
    /// Codes with an active tick subscription.
    ticks: Mutex<HashSet<String>>,
    /// Option codes with an active bid/ask subscription.
    bidask: Mutex<HashSet<String>>,
    /// Strike per option code, for plausible premium simulation.
    strikes: Mutex<HashMap<String, f64>>,
    price: Mutex<f64>,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

/// A [`FeedClient`] backed by random-walk simulation.
pub struct SimFeed {
    inner: Arc<Inner>,
}

impl SimFeed {
    #[must_use]
    pub fn new(params: SimFeedParams) -> Self {
        let base = params.base_price;
        Self {
            inner: Arc::new(Inner {
                params,
                sink: RwLock::new(None),
                ticks: Mutex::new(HashSet::new()),
                bidask: Mutex::new(HashSet::new()),
                strikes: Mutex::new(HashMap::new()),
                price: Mutex::new(base),
                ticker: Mutex::new(None),
            }),
        }
    }

    fn generate_catalog(inner: &Inner) -> OptionCatalog {
        let today = Utc::now().date_naive();
        let base = (inner.params.base_price as i64) / STRIKE_STEP * STRIKE_STEP;

        let mut contracts = Vec::new();
        let mut strikes = inner.strikes.lock();
        for month in 0..inner.params.expiry_count {
            let expiry = ExpiryDate::new(today + chrono::Days::new(7 + 30 * u64::from(month)));
            for strike in ((base - STRIKE_RANGE)..=(base + STRIKE_RANGE)).step_by(STRIKE_STEP as usize)
            {
                for right in [OptionRight::Call, OptionRight::Put] {
                    let tag = match right {
                        OptionRight::Call => 'C',
                        OptionRight::Put => 'P',
                    };
                    let code = format!(
                        "{}{}{}{:02}",
                        inner.params.option_product,
                        strike,
                        tag,
                        expiry.date().month()
                    );
                    strikes.insert(code.clone(), strike as f64);
                    contracts.push(OptionContract::new(
                        code,
                        Decimal::from(strike),
                        right,
                        expiry,
                    ));
                }
            }
        }

        let mut products = HashMap::new();
        products.insert(inner.params.option_product.clone(), contracts);
        OptionCatalog::from_products(products)
    }

    fn quote(code: &str, price: f64, volume: i64) -> Quote {
        Quote {
            code: code.to_string(),
            price: Decimal::from_f64(price).unwrap_or(Decimal::ZERO),
            volume,
            time: Utc::now(),
        }
    }

    fn tick_round(inner: &Arc<Inner>, rng: &mut StdRng, volume: &mut i64) {
        let price = {
            let mut price = inner.price.lock();
            *price += rng.gen_range(-5.0..5.0);
            *price
        };
        *volume += rng.gen_range(1..50);

        let Some(sink) = inner.sink.read().clone() else {
            return;
        };

        let ticks = inner.ticks.lock().clone();
        if ticks.contains(&inner.params.index_topic) {
            sink.on_index_quote(
                &inner.params.index_topic,
                RawTick {
                    code: inner.params.index_topic.clone(),
                    price,
                    volume: *volume,
                    time: Utc::now(),
                },
            );
        }
        if ticks.contains(&inner.params.future_code) {
            sink.on_tick(RawTick {
                code: inner.params.future_code.clone(),
                price: price + rng.gen_range(-15.0..15.0),
                volume: rng.gen_range(1..10),
                time: Utc::now(),
            });
        }

        let codes = inner.bidask.lock().clone();
        let strikes = inner.strikes.lock().clone();
        for code in codes {
            let strike = strikes.get(&code).copied().unwrap_or(price);
            let premium = ((2000.0 - (price - strike).abs()) / 20.0).max(1.0);
            let bid = (premium + rng.gen_range(-2.0..2.0)).max(0.5);
            sink.on_bidask(RawBidAsk {
                code,
                bid_prices: vec![bid],
                ask_prices: vec![bid + 1.0],
                bid_volumes: vec![rng.gen_range(1..30)],
                ask_volumes: vec![rng.gen_range(1..30)],
                time: Utc::now(),
            });
        }
    }
}

#[async_trait]
impl FeedClient for SimFeed {
    async fn login(&self) -> Result<()> {
        let inner = Arc::clone(&self.inner);
        let interval = inner.params.tick_interval;
        info!(interval_ms = interval.as_millis() as u64, "sim feed session started");

        let handle = tokio::spawn(async move {
            let mut rng = StdRng::from_entropy();
            let mut volume: i64 = 0;
            loop {
                tokio::time::sleep(interval).await;
                Self::tick_round(&inner, &mut rng, &mut volume);
            }
        });
        *self.inner.ticker.lock() = Some(handle);
        Ok(())
    }

    async fn logout(&self) -> Result<()> {
        if let Some(handle) = self.inner.ticker.lock().take() {
            handle.abort();
        }
        info!("sim feed session closed");
        Ok(())
    }

    async fn option_catalog(&self, product_prefix: &str) -> Result<OptionCatalog> {
        if !self.inner.params.option_product.starts_with(product_prefix) {
            return Ok(OptionCatalog::default());
        }
        Ok(Self::generate_catalog(&self.inner))
    }

    async fn market_snapshot(&self) -> Result<MarketSnapshot> {
        let price = *self.inner.price.lock();
        Ok(MarketSnapshot {
            index: Self::quote(&self.inner.params.index_topic, price, 0),
            future: Self::quote(&self.inner.params.future_code, price + 12.0, 0),
        })
    }

    async fn subscribe(&self, subscription: &Subscription) -> Result<()> {
        match subscription.quote_type {
            QuoteType::Tick => self.inner.ticks.lock().insert(subscription.code.clone()),
            QuoteType::BidAsk => self.inner.bidask.lock().insert(subscription.code.clone()),
        };
        Ok(())
    }

    async fn unsubscribe(&self, subscription: &Subscription) -> Result<()> {
        match subscription.quote_type {
            QuoteType::Tick => self.inner.ticks.lock().remove(&subscription.code),
            QuoteType::BidAsk => self.inner.bidask.lock().remove(&subscription.code),
        };
        Ok(())
    }

    async fn usage(&self) -> Result<FeedUsage> {
        Ok(FeedUsage {
            connections: 1,
            remaining_bytes: 512 * 1024 * 1024,
        })
    }

    fn attach_sink(&self, sink: Arc<dyn FeedSink>) {
        *self.inner.sink.write() = Some(sink);
    }

    fn feed_name(&self) -> &'static str {
        "sim"
    }
}
