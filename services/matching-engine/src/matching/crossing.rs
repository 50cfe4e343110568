//! Crossing detection
//!
//! A match occurs while the best bid price is at or above the best ask price.

use types::numeric::Price;
use types::order::Side;

/// Check if a bid and ask can match at the given prices.
pub fn can_match(bid_price: Price, ask_price: Price) -> bool {
    bid_price >= ask_price
}

/// Check if an incoming order crosses a resting order's price.
pub fn incoming_can_match(incoming_side: Side, incoming_price: Price, resting_price: Price) -> bool {
    match incoming_side {
        Side::Buy => incoming_price >= resting_price,
        Side::Sell => incoming_price <= resting_price,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn price(s: &str) -> Price {
        Price::from_str(s).unwrap()
    }

    #[test]
    fn test_can_match_crossing() {
        assert!(can_match(price("0.55"), price("0.54")));
        assert!(can_match(price("0.54"), price("0.54")));
        assert!(!can_match(price("0.53"), price("0.54")));
    }

    #[test]
    fn test_incoming_buy_crosses_down() {
        assert!(incoming_can_match(Side::Buy, price("0.55"), price("0.54")));
        assert!(!incoming_can_match(Side::Buy, price("0.53"), price("0.54")));
    }

    #[test]
    fn test_incoming_sell_crosses_up() {
        assert!(incoming_can_match(Side::Sell, price("0.44"), price("0.46")));
        assert!(!incoming_can_match(Side::Sell, price("0.47"), price("0.46")));
    }
}
