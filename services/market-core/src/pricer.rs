//! Implied probability pricing
//!
//! Each option's weight tracks its post-trade current price; the implied
//! probability of an option is its weight over the sum of weights across the
//! market. Computed on demand, never stored.

use rust_decimal::Decimal;
use types::ids::OptionId;
use types::market::MarketOption;

/// Normalized implied probabilities for a market's options.
///
/// Falls back to a uniform distribution if all weights are zero.
pub fn implied_probabilities(options: &[MarketOption]) -> Vec<(OptionId, Decimal)> {
    if options.is_empty() {
        return Vec::new();
    }

    let total: Decimal = options.iter().map(|o| o.weight).sum();
    if total.is_zero() {
        let uniform = Decimal::ONE / Decimal::from(options.len() as u64);
        return options.iter().map(|o| (o.id, uniform)).collect();
    }

    options.iter().map(|o| (o.id, o.weight / total)).collect()
}
