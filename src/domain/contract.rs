//! Option contract and catalog types.
//!
//! - [`OptionContract`] - One listed option, sourced read-only from the feed catalog
//! - [`OptionCatalog`] - Typed lookup from product code-name to its contracts
//! - [`ExpiryDate`] - Delivery date newtype with the feed's `YYYY/MM/DD` format

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Call or put side of an option contract.
///
/// Also labels the side of a derived [`Strategy`](super::Strategy).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptionRight {
    Call,
    Put,
}

impl fmt::Display for OptionRight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionRight::Call => write!(f, "Call"),
            OptionRight::Put => write!(f, "Put"),
        }
    }
}

/// A delivery (settlement) date identifying one monthly option/future series.
///
/// Wraps a [`NaiveDate`] so comparisons are structured rather than textual,
/// while displaying and serializing in the feed's `YYYY/MM/DD` format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExpiryDate(NaiveDate);

/// Wire/display format used by the feed catalog.
const DATE_FORMAT: &str = "%Y/%m/%d";

impl ExpiryDate {
    pub const fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    #[must_use]
    pub const fn date(&self) -> NaiveDate {
        self.0
    }
}

impl FromStr for ExpiryDate {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDate::parse_from_str(s, DATE_FORMAT).map(Self)
    }
}

impl fmt::Display for ExpiryDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DATE_FORMAT))
    }
}

impl Serialize for ExpiryDate {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ExpiryDate {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A single listed option contract.
///
/// Sourced from the feed's contract catalog and never mutated by this engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionContract {
    code: String,
    strike_price: Decimal,
    option_right: OptionRight,
    delivery_date: ExpiryDate,
}

impl OptionContract {
    pub fn new(
        code: impl Into<String>,
        strike_price: Decimal,
        option_right: OptionRight,
        delivery_date: ExpiryDate,
    ) -> Self {
        Self {
            code: code.into(),
            strike_price,
            option_right,
            delivery_date,
        }
    }

    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    #[must_use]
    pub const fn strike_price(&self) -> Decimal {
        self.strike_price
    }

    #[must_use]
    pub const fn option_right(&self) -> OptionRight {
        self.option_right
    }

    #[must_use]
    pub const fn delivery_date(&self) -> ExpiryDate {
        self.delivery_date
    }
}

/// Typed option-contract catalog keyed by product code-name.
///
/// Replaces reflective attribute scanning with an explicit query surface:
/// the feed adapter builds the full `product -> contracts` map once, and the
/// rebalancer asks for open delivery dates and per-date contract lists.
///
/// A delivery date maps to the product that lists it; when several products
/// list the same date the last one inserted wins, matching the feed's own
/// catalog enumeration order.
#[derive(Debug, Clone, Default)]
pub struct OptionCatalog {
    products: HashMap<String, Vec<OptionContract>>,
    date_index: BTreeMap<ExpiryDate, String>,
}

impl OptionCatalog {
    /// Build a catalog from the feed's product map.
    #[must_use]
    pub fn from_products(products: HashMap<String, Vec<OptionContract>>) -> Self {
        let mut date_index = BTreeMap::new();
        let mut names: Vec<&String> = products.keys().collect();
        names.sort();
        for name in names {
            for contract in &products[name] {
                date_index.insert(contract.delivery_date(), name.clone());
            }
        }
        Self {
            products,
            date_index,
        }
    }

    /// All open delivery dates, ascending.
    #[must_use]
    pub fn available_dates(&self) -> Vec<ExpiryDate> {
        self.date_index.keys().copied().collect()
    }

    /// Earliest open delivery date, if any.
    #[must_use]
    pub fn earliest_date(&self) -> Option<ExpiryDate> {
        self.date_index.keys().next().copied()
    }

    /// The product code-name listing the given delivery date.
    #[must_use]
    pub fn product_for_date(&self, date: ExpiryDate) -> Option<&str> {
        self.date_index.get(&date).map(String::as_str)
    }

    /// Contracts listed under the given product code-name.
    ///
    /// Returns an empty slice for an unknown product; the caller decides
    /// whether that warrants a warning.
    #[must_use]
    pub fn contracts(&self, product: &str) -> &[OptionContract] {
        self.products.get(product).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.date_index.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(s: &str) -> ExpiryDate {
        s.parse().unwrap()
    }

    #[test]
    fn expiry_date_round_trips_feed_format() {
        let d = date("2026/08/19");
        assert_eq!(d.to_string(), "2026/08/19");
        assert_eq!(serde_json::to_string(&d).unwrap(), "\"2026/08/19\"");
    }

    #[test]
    fn expiry_date_orders_structurally() {
        assert!(date("2026/09/16") > date("2026/08/19"));
    }

    #[test]
    fn catalog_dates_sorted_and_deduped() {
        let mut products = HashMap::new();
        products.insert(
            "TXO".to_string(),
            vec![
                OptionContract::new("A", dec!(100), OptionRight::Call, date("2026/09/16")),
                OptionContract::new("B", dec!(100), OptionRight::Put, date("2026/08/19")),
                OptionContract::new("C", dec!(200), OptionRight::Call, date("2026/08/19")),
            ],
        );
        let catalog = OptionCatalog::from_products(products);

        assert_eq!(
            catalog.available_dates(),
            vec![date("2026/08/19"), date("2026/09/16")]
        );
        assert_eq!(catalog.earliest_date(), Some(date("2026/08/19")));
        assert_eq!(catalog.product_for_date(date("2026/08/19")), Some("TXO"));
        assert_eq!(catalog.contracts("TXO").len(), 3);
        assert!(catalog.contracts("TX2").is_empty());
    }
}
