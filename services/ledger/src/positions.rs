//! Position ledger
//!
//! Per-(user, market, option) holdings with average-cost accounting. Sell
//! orders reserve shares at submission; a fill consumes the seller's
//! reservation and applies signed deltas to both sides under one lock.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use rust_decimal::Decimal;
use types::errors::PositionError;
use types::ids::{MarketId, OptionId, UserId};
use types::position::Position;
use types::trade::Trade;

type PositionKey = (UserId, MarketId, OptionId);

/// Realized P&L produced by settling one trade.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradeSettlement {
    pub buyer_realized: Decimal,
    pub seller_realized: Decimal,
}

/// Thread-safe share ledger.
#[derive(Debug, Default)]
pub struct PositionLedger {
    inner: Mutex<HashMap<PositionKey, Position>>,
}

impl PositionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, HashMap<PositionKey, Position>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add shares at a given basis price (provisioning for bots and seeds).
    pub fn grant_shares(
        &self,
        user_id: UserId,
        market_id: MarketId,
        option_id: OptionId,
        quantity: Decimal,
        basis_price: Decimal,
        now: i64,
    ) {
        let mut state = self.state();
        state
            .entry((user_id, market_id, option_id))
            .or_insert_with(|| Position::new(user_id, market_id, option_id, now))
            .apply_fill(quantity, basis_price, now);
    }

    /// Shares the user can still commit to sell orders.
    pub fn sellable(&self, user_id: UserId, market_id: MarketId, option_id: OptionId) -> Decimal {
        self.state()
            .get(&(user_id, market_id, option_id))
            .map(|p| p.sellable())
            .unwrap_or(Decimal::ZERO)
    }

    /// Reserve shares for a new sell order.
    pub fn reserve(
        &self,
        user_id: UserId,
        market_id: MarketId,
        option_id: OptionId,
        quantity: Decimal,
    ) -> Result<(), PositionError> {
        let mut state = self.state();
        let position = state
            .get_mut(&(user_id, market_id, option_id))
            .ok_or(PositionError::NotFound { user_id, option_id })?;

        if quantity > position.sellable() {
            return Err(PositionError::InsufficientShares {
                required: quantity.to_string(),
                sellable: position.sellable().to_string(),
            });
        }
        position.reserve(quantity);
        Ok(())
    }

    /// Release reserved shares (cancel/expiry of a sell order).
    pub fn release(
        &self,
        user_id: UserId,
        market_id: MarketId,
        option_id: OptionId,
        quantity: Decimal,
    ) -> Result<(), PositionError> {
        if quantity.is_zero() {
            return Ok(());
        }
        let mut state = self.state();
        let position = state
            .get_mut(&(user_id, market_id, option_id))
            .ok_or(PositionError::NotFound { user_id, option_id })?;

        if quantity > position.reserved {
            return Err(PositionError::InsufficientShares {
                required: quantity.to_string(),
                sellable: position.reserved.to_string(),
            });
        }
        position.release(quantity);
        Ok(())
    }

    /// Apply one trade to both sides.
    ///
    /// The seller's reservation is consumed before their quantity drops, so
    /// the reserved ≤ quantity invariant holds throughout. Returns the P&L
    /// realized on each side.
    pub fn apply_trade(&self, trade: &Trade) -> Result<TradeSettlement, PositionError> {
        let quantity = trade.quantity.as_decimal();
        let price = trade.price.as_decimal();
        let buyer = trade.buyer();
        let seller = trade.seller();
        let mut state = self.state();

        {
            let seller_pos = state
                .get(&(seller, trade.market_id, trade.option_id))
                .ok_or(PositionError::NotFound {
                    user_id: seller,
                    option_id: trade.option_id,
                })?;
            if quantity > seller_pos.reserved {
                return Err(PositionError::InsufficientShares {
                    required: quantity.to_string(),
                    sellable: seller_pos.reserved.to_string(),
                });
            }
        }

        let seller_realized = match state.get_mut(&(seller, trade.market_id, trade.option_id)) {
            Some(position) => {
                position.release(quantity);
                position.apply_fill(-quantity, price, trade.executed_at)
            }
            None => Decimal::ZERO,
        };

        let buyer_realized = state
            .entry((buyer, trade.market_id, trade.option_id))
            .or_insert_with(|| Position::new(buyer, trade.market_id, trade.option_id, trade.executed_at))
            .apply_fill(quantity, price, trade.executed_at);

        Ok(TradeSettlement {
            buyer_realized,
            seller_realized,
        })
    }

    pub fn position(
        &self,
        user_id: UserId,
        market_id: MarketId,
        option_id: OptionId,
    ) -> Option<Position> {
        self.state().get(&(user_id, market_id, option_id)).cloned()
    }

    /// All non-flat positions held by one user.
    pub fn positions_for(&self, user_id: UserId) -> Vec<Position> {
        let mut positions: Vec<Position> = self
            .state()
            .values()
            .filter(|p| p.user_id == user_id && !p.is_flat())
            .cloned()
            .collect();
        positions.sort_by_key(|p| p.updated_at);
        positions
    }

    /// Net shares outstanding in one option. Conserved by trades; only
    /// grants move it.
    pub fn total_shares(&self, market_id: MarketId, option_id: OptionId) -> Decimal {
        self.state()
            .values()
            .filter(|p| p.market_id == market_id && p.option_id == option_id)
            .map(|p| p.quantity)
            .sum()
    }
}
