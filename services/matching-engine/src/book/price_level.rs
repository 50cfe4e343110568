//! Price level with FIFO queue
//!
//! A price level contains all resting orders at one price point, in strict
//! submission order so time priority holds within the level.

use std::collections::VecDeque;
use types::ids::{OrderId, UserId};
use types::numeric::Quantity;

/// Entry in the price level queue
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelEntry {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub remaining: Quantity,
}

/// Orders resting at a single price, FIFO ordered.
#[derive(Debug, Clone, Default)]
pub struct PriceLevel {
    orders: VecDeque<LevelEntry>,
}

impl PriceLevel {
    /// Create a new empty price level
    pub fn new() -> Self {
        Self {
            orders: VecDeque::new(),
        }
    }

    /// Append an order at the back of the queue (time priority)
    pub fn insert(&mut self, order_id: OrderId, user_id: UserId, remaining: Quantity) {
        self.orders.push_back(LevelEntry {
            order_id,
            user_id,
            remaining,
        });
    }

    /// Remove an order by id, returning its remaining quantity.
    pub fn remove(&mut self, order_id: &OrderId) -> Option<Quantity> {
        let position = self.orders.iter().position(|e| &e.order_id == order_id)?;
        self.orders.remove(position).map(|e| e.remaining)
    }

    /// Iterate entries in FIFO order.
    pub fn entries(&self) -> impl Iterator<Item = &LevelEntry> {
        self.orders.iter()
    }

    /// Mutable FIFO iteration, used by the match loop to skip self-trade
    /// candidates while filling the rest.
    pub fn entries_mut(&mut self) -> impl Iterator<Item = &mut LevelEntry> {
        self.orders.iter_mut()
    }

    /// Drop entries whose remaining quantity reached zero.
    pub fn purge_filled(&mut self) {
        self.orders.retain(|e| !e.remaining.is_zero());
    }

    /// Total quantity resting at this level.
    pub fn total_quantity(&self) -> Quantity {
        self.orders
            .iter()
            .fold(Quantity::zero(), |acc, e| acc + e.remaining)
    }

    /// Check if the price level is empty
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Number of orders at this level
    pub fn order_count(&self) -> usize {
        self.orders.len()
    }
}
