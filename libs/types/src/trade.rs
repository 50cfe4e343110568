//! Trade types
//!
//! A trade is the atomic exchange between a resting maker order and an
//! incoming taker order; it always executes at the maker's price.

use crate::ids::{MarketId, OptionId, OrderId, TradeId, UserId};
use crate::numeric::{Price, Quantity};
use crate::order::Side;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// An executed match between two orders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: TradeId,
    pub market_id: MarketId,
    pub option_id: OptionId,

    pub maker_order_id: OrderId,
    pub taker_order_id: OrderId,
    pub maker_user_id: UserId,
    pub taker_user_id: UserId,

    /// Side from the taker's perspective
    pub taker_side: Side,
    /// Execution price (the maker's resting price)
    pub price: Price,
    pub quantity: Quantity,

    pub executed_at: i64, // Unix nanos
}

impl Trade {
    /// Create a new trade record.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        market_id: MarketId,
        option_id: OptionId,
        maker_order_id: OrderId,
        taker_order_id: OrderId,
        maker_user_id: UserId,
        taker_user_id: UserId,
        taker_side: Side,
        price: Price,
        quantity: Quantity,
        executed_at: i64,
    ) -> Self {
        Self {
            id: TradeId::new(),
            market_id,
            option_id,
            maker_order_id,
            taker_order_id,
            maker_user_id,
            taker_user_id,
            taker_side,
            price,
            quantity,
            executed_at,
        }
    }

    /// Cash value of the trade (price × quantity).
    pub fn value(&self) -> Decimal {
        self.price.as_decimal() * self.quantity.as_decimal()
    }

    /// Buyer of the traded shares.
    pub fn buyer(&self) -> UserId {
        match self.taker_side {
            Side::Buy => self.taker_user_id,
            Side::Sell => self.maker_user_id,
        }
    }

    /// Seller of the traded shares.
    pub fn seller(&self) -> UserId {
        match self.taker_side {
            Side::Buy => self.maker_user_id,
            Side::Sell => self.taker_user_id,
        }
    }

    /// No order ever matches another from the same user.
    pub fn validate_no_self_trade(&self) -> bool {
        self.maker_user_id != self.taker_user_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_trade(taker_side: Side) -> Trade {
        Trade::new(
            MarketId::new(),
            OptionId::new(),
            OrderId::new(),
            OrderId::new(),
            UserId::new(),
            UserId::new(),
            taker_side,
            Price::from_str("0.54").unwrap(),
            Quantity::from_u64(10),
            1_708_123_456_789_000_000,
        )
    }

    #[test]
    fn test_trade_value() {
        let trade = sample_trade(Side::Buy);
        assert_eq!(trade.value(), Decimal::from_str_exact("5.4").unwrap());
    }

    #[test]
    fn test_buyer_seller_by_taker_side() {
        let trade = sample_trade(Side::Buy);
        assert_eq!(trade.buyer(), trade.taker_user_id);
        assert_eq!(trade.seller(), trade.maker_user_id);

        let trade = sample_trade(Side::Sell);
        assert_eq!(trade.buyer(), trade.maker_user_id);
        assert_eq!(trade.seller(), trade.taker_user_id);
    }

    #[test]
    fn test_self_trade_validation() {
        let mut trade = sample_trade(Side::Buy);
        assert!(trade.validate_no_self_trade());
        trade.taker_user_id = trade.maker_user_id;
        assert!(!trade.validate_no_self_trade());
    }
}
