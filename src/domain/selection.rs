//! Strike-window selection around a reference price.
//!
//! Pure and synchronous. Given one delivery date's contracts and a reference
//! price, keeps a bounded window of strikes on each side:
//!
//! - calls in `(reference - 200, reference + 2000)`, ascending by strike
//! - puts in `(reference - 2000, reference + 200)`, descending by strike
//!
//! The windows are asymmetric: realistic trading interest sits far
//! out-of-the-money in the direction away from the spot price. Both lists
//! start at the strike closest to at-the-money, which is what the adjacent
//! pairing in [`build_strategies`](super::build_strategies) relies on.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::contract::{ExpiryDate, OptionContract, OptionRight};
use super::snapshot::MarketSnapshot;

/// Window span on the near (at-the-money) side of the reference price.
const NEAR_SPAN: Decimal = dec!(200);
/// Window span on the far (out-of-the-money) side of the reference price.
const FAR_SPAN: Decimal = dec!(2000);

/// Contracts selected for one delivery date, already windowed and sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainSelection {
    /// Ascending by strike; first element is closest to at-the-money.
    pub calls: Vec<OptionContract>,
    /// Descending by strike; first element is closest to at-the-money.
    pub puts: Vec<OptionContract>,
}

impl ChainSelection {
    /// All selected contracts, calls first, in selection order.
    #[must_use]
    pub fn combined(&self) -> Vec<OptionContract> {
        self.calls.iter().chain(&self.puts).cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.calls.len() + self.puts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty() && self.puts.is_empty()
    }
}

/// Select the call and put windows for `delivery_date` from one product's
/// contract list.
///
/// Both window bounds are exclusive. Empty windows are valid and yield no
/// contracts for that side.
#[must_use]
pub fn select_chain(
    contracts: &[OptionContract],
    delivery_date: ExpiryDate,
    reference: Decimal,
) -> ChainSelection {
    let mut calls: Vec<OptionContract> = contracts
        .iter()
        .filter(|c| {
            c.delivery_date() == delivery_date
                && c.option_right() == OptionRight::Call
                && c.strike_price() > reference - NEAR_SPAN
                && c.strike_price() < reference + FAR_SPAN
        })
        .cloned()
        .collect();
    calls.sort_by(|a, b| a.strike_price().cmp(&b.strike_price()));

    let mut puts: Vec<OptionContract> = contracts
        .iter()
        .filter(|c| {
            c.delivery_date() == delivery_date
                && c.option_right() == OptionRight::Put
                && c.strike_price() > reference - FAR_SPAN
                && c.strike_price() < reference + NEAR_SPAN
        })
        .cloned()
        .collect();
    puts.sort_by(|a, b| b.strike_price().cmp(&a.strike_price()));

    ChainSelection { calls, puts }
}

/// Reference price for window selection: the more recently updated of the
/// index and future quotes, tie-broken toward the future.
///
/// Instants are compared structurally, never as formatted strings.
#[must_use]
pub fn reference_price(snapshot: &MarketSnapshot) -> Decimal {
    if snapshot.future.time >= snapshot.index.time {
        snapshot.future.price
    } else {
        snapshot.index.price
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Quote;
    use chrono::{TimeZone, Utc};

    fn date(s: &str) -> ExpiryDate {
        s.parse().unwrap()
    }

    fn contract(code: &str, strike: Decimal, right: OptionRight, d: &str) -> OptionContract {
        OptionContract::new(code, strike, right, date(d))
    }

    fn chain(strikes: &[i64], right: OptionRight, d: &str) -> Vec<OptionContract> {
        strikes
            .iter()
            .map(|s| {
                contract(
                    &format!("{right:?}{s}"),
                    Decimal::from(*s),
                    right,
                    d,
                )
            })
            .collect()
    }

    #[test]
    fn call_window_bounds_are_exclusive() {
        // Strikes at reference-300, -100, +100, +1900, +2100 around 10000.
        let contracts = chain(
            &[9700, 9900, 10100, 11900, 12100],
            OptionRight::Call,
            "2026/08/19",
        );
        let selected = select_chain(&contracts, date("2026/08/19"), dec!(10000));

        let strikes: Vec<Decimal> = selected.calls.iter().map(|c| c.strike_price()).collect();
        assert_eq!(strikes, vec![dec!(9900), dec!(10100), dec!(11900)]);
        assert!(selected.puts.is_empty());
    }

    #[test]
    fn put_window_is_mirrored_and_descending() {
        let contracts = chain(
            &[7900, 8100, 9900, 10100, 10300],
            OptionRight::Put,
            "2026/08/19",
        );
        let selected = select_chain(&contracts, date("2026/08/19"), dec!(10000));

        let strikes: Vec<Decimal> = selected.puts.iter().map(|c| c.strike_price()).collect();
        assert_eq!(strikes, vec![dec!(10100), dec!(9900), dec!(8100)]);
    }

    #[test]
    fn other_delivery_dates_are_excluded() {
        let mut contracts = chain(&[10100], OptionRight::Call, "2026/08/19");
        contracts.extend(chain(&[10200], OptionRight::Call, "2026/09/16"));

        let selected = select_chain(&contracts, date("2026/08/19"), dec!(10000));
        assert_eq!(selected.calls.len(), 1);
        assert_eq!(selected.calls[0].strike_price(), dec!(10100));
    }

    #[test]
    fn empty_windows_are_valid() {
        let contracts = chain(&[5000], OptionRight::Call, "2026/08/19");
        let selected = select_chain(&contracts, date("2026/08/19"), dec!(10000));
        assert!(selected.is_empty());
    }

    fn quote(code: &str, price: Decimal, secs: i64) -> Quote {
        Quote {
            code: code.into(),
            price,
            volume: 0,
            time: Utc.timestamp_opt(secs, 0).unwrap(),
        }
    }

    #[test]
    fn reference_price_prefers_fresher_quote() {
        let snapshot = MarketSnapshot {
            index: quote("IDX", dec!(10000), 200),
            future: quote("FUT", dec!(10050), 100),
        };
        assert_eq!(reference_price(&snapshot), dec!(10000));

        let snapshot = MarketSnapshot {
            index: quote("IDX", dec!(10000), 100),
            future: quote("FUT", dec!(10050), 200),
        };
        assert_eq!(reference_price(&snapshot), dec!(10050));
    }

    #[test]
    fn reference_price_ties_toward_future() {
        let snapshot = MarketSnapshot {
            index: quote("IDX", dec!(10000), 100),
            future: quote("FUT", dec!(10050), 100),
        };
        assert_eq!(reference_price(&snapshot), dec!(10050));
    }
}
