//! Vertical-spread strategy pairing.

use serde::Serialize;

use super::contract::{OptionContract, OptionRight};
use super::selection::ChainSelection;

/// A tradable vertical spread: a short leg at the strike closer to
/// at-the-money paired with a long leg one strike further out, same side and
/// expiry.
///
/// Derived and ephemeral: the full list is rebuilt on every expiry switch,
/// never patched in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Strategy {
    pub side: OptionRight,
    pub short_code: String,
    pub short_desc: String,
    pub long_code: String,
    pub long_desc: String,
}

impl Strategy {
    fn pair(side: OptionRight, short: &OptionContract, long: &OptionContract) -> Self {
        Self {
            side,
            short_code: short.code().to_string(),
            short_desc: format!("Sell {}", short.strike_price()),
            long_code: long.code().to_string(),
            long_desc: format!("Buy {}", long.strike_price()),
        }
    }
}

/// Pair adjacent contracts within each selected window into vertical spreads.
///
/// For a window of K contracts this yields K-1 spreads, each pairing index i
/// (short) with i+1 (long) in window order; K <= 1 yields none. Call-side
/// spreads come first, then put-side; that concatenation is the externally
/// observed order.
#[must_use]
pub fn build_strategies(selection: &ChainSelection) -> Vec<Strategy> {
    let pair_side = |side: OptionRight, contracts: &[OptionContract]| {
        contracts
            .windows(2)
            .map(|pair| Strategy::pair(side, &pair[0], &pair[1]))
            .collect::<Vec<_>>()
    };

    let mut strategies = pair_side(OptionRight::Call, &selection.calls);
    strategies.extend(pair_side(OptionRight::Put, &selection.puts));
    strategies
}
