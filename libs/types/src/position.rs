//! Position tracking with average-cost accounting
//!
//! A position's quantity is signed (positive = long). Same-direction fills
//! blend the average entry price as a quantity-weighted mean; reducing fills
//! realize P&L against the average and leave it unchanged; a sign flip
//! re-bases the average from the excess at the fill price.

use crate::ids::{MarketId, OptionId, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A user's holding in one market option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub user_id: UserId,
    pub market_id: MarketId,
    pub option_id: OptionId,
    /// Signed share count (positive = long)
    pub quantity: Decimal,
    /// Shares locked by open sell orders
    pub reserved: Decimal,
    pub average_entry_price: Decimal,
    pub realized_pnl: Decimal,
    pub updated_at: i64,
}

impl Position {
    /// Create an empty position.
    pub fn new(user_id: UserId, market_id: MarketId, option_id: OptionId, timestamp: i64) -> Self {
        Self {
            user_id,
            market_id,
            option_id,
            quantity: Decimal::ZERO,
            reserved: Decimal::ZERO,
            average_entry_price: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
            updated_at: timestamp,
        }
    }

    /// Shares available to reserve for new sell orders.
    pub fn sellable(&self) -> Decimal {
        (self.quantity - self.reserved).max(Decimal::ZERO)
    }

    /// Reserve shares for an open sell order.
    ///
    /// # Panics
    /// Panics if the reservation exceeds sellable shares.
    pub fn reserve(&mut self, quantity: Decimal) {
        assert!(quantity >= Decimal::ZERO, "reservation must be non-negative");
        assert!(quantity <= self.sellable(), "insufficient sellable shares");
        self.reserved += quantity;
    }

    /// Release reserved shares (cancel/expiry of a sell order).
    ///
    /// # Panics
    /// Panics if more is released than is reserved.
    pub fn release(&mut self, quantity: Decimal) {
        assert!(quantity >= Decimal::ZERO, "release must be non-negative");
        assert!(quantity <= self.reserved, "release exceeds reservation");
        self.reserved -= quantity;
    }

    /// Apply a signed fill and return the P&L realized by it.
    ///
    /// `delta` is positive for a buy, negative for a sell. `price` is the
    /// trade price.
    pub fn apply_fill(&mut self, delta: Decimal, price: Decimal, timestamp: i64) -> Decimal {
        let realized = if self.quantity.is_zero() {
            self.average_entry_price = price;
            self.quantity = delta;
            Decimal::ZERO
        } else if self.quantity.is_sign_positive() == delta.is_sign_positive() {
            // Same direction: quantity-weighted mean of old and new cost.
            let old_cost = self.average_entry_price * self.quantity.abs();
            let add_cost = price * delta.abs();
            let new_qty = self.quantity + delta;
            self.average_entry_price = (old_cost + add_cost) / new_qty.abs();
            self.quantity = new_qty;
            Decimal::ZERO
        } else {
            // Opposite direction: realize against the average first.
            let closing = delta.abs().min(self.quantity.abs());
            let direction = if self.quantity.is_sign_positive() {
                Decimal::ONE
            } else {
                -Decimal::ONE
            };
            let pnl = (price - self.average_entry_price) * closing * direction;
            self.realized_pnl += pnl;

            let new_qty = self.quantity + delta;
            if new_qty.is_zero() {
                self.quantity = Decimal::ZERO;
            } else if new_qty.is_sign_positive() != self.quantity.is_sign_positive() {
                // Flipped: the excess establishes a new basis.
                self.average_entry_price = price;
                self.quantity = new_qty;
            } else {
                // Reduced but not flipped: average unchanged.
                self.quantity = new_qty;
            }
            pnl
        };

        self.updated_at = timestamp;
        realized
    }

    /// A position that reached zero quantity with nothing reserved.
    pub fn is_flat(&self) -> bool {
        self.quantity.is_zero() && self.reserved.is_zero()
    }
}
