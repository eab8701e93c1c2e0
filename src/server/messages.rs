//! Wire frames exchanged with viewers.
//!
//! Every frame is an independent, self-describing JSON text message tagged
//! by `type`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{BidAsk, ExpiryDate, MarketEvent, Quote, Strategy};
use crate::rebalance::SubscriptionState;

/// Outbound frame to a viewer.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    /// Watch-list configuration; sent to a viewer after a subscription
    /// switch completes. `current_date` is `null` only before the first
    /// switch.
    Config {
        strategies: Vec<Strategy>,
        available_dates: Vec<ExpiryDate>,
        current_date: Option<ExpiryDate>,
    },
    Index {
        code: String,
        price: Decimal,
        volume: i64,
        time: String,
    },
    Future {
        code: String,
        price: Decimal,
        volume: i64,
        time: String,
    },
    Bidask {
        code: String,
        bid: Decimal,
        ask: Decimal,
        bid_vol: i64,
        ask_vol: i64,
        time: String,
    },
}

fn format_time(time: DateTime<Utc>) -> String {
    time.format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}

impl Frame {
    #[must_use]
    pub fn config(subscription: &SubscriptionState) -> Self {
        Frame::Config {
            strategies: subscription.strategies.clone(),
            available_dates: subscription.available_dates.clone(),
            current_date: subscription.active_date,
        }
    }

    #[must_use]
    pub fn index(quote: &Quote) -> Self {
        Frame::Index {
            code: quote.code.clone(),
            price: quote.price,
            volume: quote.volume,
            time: format_time(quote.time),
        }
    }

    #[must_use]
    pub fn future(quote: &Quote) -> Self {
        Frame::Future {
            code: quote.code.clone(),
            price: quote.price,
            volume: quote.volume,
            time: format_time(quote.time),
        }
    }

    #[must_use]
    pub fn bidask(quote: &BidAsk) -> Self {
        Frame::Bidask {
            code: quote.code.clone(),
            bid: quote.bid,
            ask: quote.ask,
            bid_vol: quote.bid_vol,
            ask_vol: quote.ask_vol,
            time: format_time(quote.time),
        }
    }

    #[must_use]
    pub fn from_event(event: &MarketEvent) -> Self {
        match event {
            MarketEvent::Index(q) => Frame::index(q),
            MarketEvent::Future(q) => Frame::future(q),
            MarketEvent::BidAsk(b) => Frame::bidask(b),
        }
    }
}

/// Inbound message from a viewer. Unknown types are ignored.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Switch the watched expiry. An empty `date` selects the earliest
    /// available one.
    ChangeDate { date: String },

    #[serde(other)]
    Unknown,
}
