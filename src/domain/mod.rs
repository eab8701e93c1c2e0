//! Feed-agnostic domain types and the contract-selection logic.

mod contract;
mod quote;
mod selection;
mod snapshot;
mod strategy;

pub use contract::{ExpiryDate, OptionCatalog, OptionContract, OptionRight};
pub use quote::{BidAsk, MarketEvent, Quote};
pub use selection::{reference_price, select_chain, ChainSelection};
pub use snapshot::MarketSnapshot;
pub use strategy::{build_strategies, Strategy};
