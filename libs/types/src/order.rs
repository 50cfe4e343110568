//! Order lifecycle types
//!
//! Status transitions only move forward: open → partially_filled → filled,
//! or any open state → cancelled/expired.

use crate::ids::{MarketId, OptionId, OrderId, UserId};
use crate::numeric::{Price, Quantity};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order side (buyer or seller)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Buy order (bid)
    Buy,
    /// Sell order (ask)
    Sell,
}

impl Side {
    /// Get the opposite side
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

/// Supported order types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    /// Crosses the best opposing price immediately; remainder is cancelled
    Market,
    /// Rests at its limit price
    Limit,
    /// Held until current price crosses the trigger, then becomes a limit
    Stop,
    /// Stop with a trigger level that ratchets with favorable price moves
    Trailing,
}

impl OrderType {
    /// Conditional orders are held outside the active book until triggered.
    pub fn is_conditional(&self) -> bool {
        matches!(self, OrderType::Stop | OrderType::Trailing)
    }
}

/// Order status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Accepted, no fills yet
    Open,
    /// Partially matched
    PartiallyFilled,
    /// Completely matched (terminal)
    Filled,
    /// Cancelled by user or system (terminal)
    Cancelled,
    /// Expiry deadline reached (terminal)
    Expired,
}

impl OrderStatus {
    /// Check if status is terminal (no further transitions possible)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Cancelled | OrderStatus::Expired
        )
    }
}

/// Raw submission parameters, as received from the API layer.
///
/// Price and quantity arrive as plain decimals so validation failures
/// (non-positive values, missing limit price) can be rejected before any
/// book state is touched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderParams {
    pub user_id: UserId,
    pub market_id: MarketId,
    pub option_id: OptionId,
    pub side: Side,
    pub order_type: OrderType,
    /// Limit price; ignored for market orders
    pub price: Option<Decimal>,
    pub quantity: Decimal,
    /// Stop trigger level (stop orders)
    pub trigger_price: Option<Decimal>,
    /// Trailing distance from the best seen price (trailing orders)
    pub trailing_offset: Option<Decimal>,
    /// Unix nanos after which the order is treated as cancelled
    pub expires_at: Option<i64>,
}

/// A validated, accepted order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub market_id: MarketId,
    pub option_id: OptionId,
    pub side: Side,
    pub order_type: OrderType,
    /// Effective limit price (sentinel for market orders)
    pub price: Price,
    pub quantity: Quantity,
    pub filled_quantity: Quantity,
    pub status: OrderStatus,
    pub trigger_price: Option<Price>,
    pub trailing_offset: Option<Decimal>,
    pub expires_at: Option<i64>,
    pub created_at: i64, // Unix nanos
    pub updated_at: i64, // Unix nanos
}

impl Order {
    /// Create a new open order.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_id: UserId,
        market_id: MarketId,
        option_id: OptionId,
        side: Side,
        order_type: OrderType,
        price: Price,
        quantity: Quantity,
        timestamp: i64,
    ) -> Self {
        Self {
            id: OrderId::new(),
            user_id,
            market_id,
            option_id,
            side,
            order_type,
            price,
            quantity,
            filled_quantity: Quantity::zero(),
            status: OrderStatus::Open,
            trigger_price: None,
            trailing_offset: None,
            expires_at: None,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Unfilled quantity.
    pub fn remaining(&self) -> Quantity {
        self.quantity.saturating_sub(self.filled_quantity)
    }

    /// Check quantity invariant: 0 ≤ filled ≤ total
    pub fn check_invariant(&self) -> bool {
        self.filled_quantity <= self.quantity
    }

    /// Check if order is completely filled
    pub fn is_filled(&self) -> bool {
        self.filled_quantity == self.quantity
    }

    /// Check if order has any fills
    pub fn has_fills(&self) -> bool {
        !self.filled_quantity.is_zero()
    }

    /// True while the order can still match or be cancelled.
    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }

    /// True once the expiry deadline has passed.
    pub fn is_expired(&self, now: i64) -> bool {
        matches!(self.expires_at, Some(deadline) if deadline <= now)
    }

    /// Record a fill and advance the status.
    ///
    /// # Panics
    /// Panics if the fill would exceed total quantity.
    pub fn add_fill(&mut self, fill_quantity: Quantity, timestamp: i64) {
        let new_filled = self.filled_quantity + fill_quantity;
        assert!(
            new_filled <= self.quantity,
            "fill would exceed order quantity"
        );

        self.filled_quantity = new_filled;
        if self.is_filled() {
            self.status = OrderStatus::Filled;
        } else if self.has_fills() {
            self.status = OrderStatus::PartiallyFilled;
        }
        self.updated_at = timestamp;
    }

    /// Mark the order cancelled. Caller must have checked it is not terminal.
    pub fn cancel(&mut self, timestamp: i64) {
        assert!(!self.status.is_terminal(), "cannot cancel terminal order");
        self.status = OrderStatus::Cancelled;
        self.updated_at = timestamp;
    }

    /// Mark the order expired. Caller must have checked it is not terminal.
    pub fn expire(&mut self, timestamp: i64) {
        assert!(!self.status.is_terminal(), "cannot expire terminal order");
        self.status = OrderStatus::Expired;
        self.updated_at = timestamp;
    }
}
