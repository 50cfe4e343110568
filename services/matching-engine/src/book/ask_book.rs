//! Ask (sell-side) book
//!
//! Sell orders sorted by price ascending (best ask first); FIFO within a
//! level.

use std::collections::BTreeMap;
use types::ids::{OrderId, UserId};
use types::numeric::{Price, Quantity};

use super::price_level::PriceLevel;

/// Ask side of an option book.
#[derive(Debug, Clone, Default)]
pub struct AskBook {
    levels: BTreeMap<Price, PriceLevel>,
}

impl AskBook {
    /// Create a new empty ask book
    pub fn new() -> Self {
        Self {
            levels: BTreeMap::new(),
        }
    }

    /// Insert a resting order.
    pub fn insert(&mut self, order_id: OrderId, user_id: UserId, price: Price, remaining: Quantity) {
        self.levels
            .entry(price)
            .or_insert_with(PriceLevel::new)
            .insert(order_id, user_id, remaining);
    }

    /// Remove an order; empty levels are dropped.
    pub fn remove(&mut self, order_id: &OrderId, price: Price) -> Option<Quantity> {
        let level = self.levels.get_mut(&price)?;
        let removed = level.remove(order_id)?;
        if level.is_empty() {
            self.levels.remove(&price);
        }
        Some(removed)
    }

    /// Best (lowest) ask price.
    pub fn best_price(&self) -> Option<Price> {
        self.levels.keys().next().copied()
    }

    /// Prices in matching priority order (ascending).
    pub fn prices_in_priority(&self) -> Vec<Price> {
        self.levels.keys().copied().collect()
    }

    /// Mutable level access for the match loop.
    pub fn level_mut(&mut self, price: Price) -> Option<&mut PriceLevel> {
        self.levels.get_mut(&price)
    }

    /// Drop a level once the match loop has emptied it.
    pub fn drop_level_if_empty(&mut self, price: Price) {
        if self.levels.get(&price).is_some_and(|l| l.is_empty()) {
            self.levels.remove(&price);
        }
    }

    /// Top-N aggregated levels, best first.
    pub fn depth_snapshot(&self, depth: usize) -> Vec<(Price, Quantity)> {
        self.levels
            .iter()
            .take(depth)
            .map(|(price, level)| (*price, level.total_quantity()))
            .collect()
    }

    /// Check if the ask book is empty
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Number of price levels
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn price(s: &str) -> Price {
        Price::from_str(s).unwrap()
    }

    #[test]
    fn test_best_price_is_lowest() {
        let mut book = AskBook::new();
        let user = UserId::new();
        book.insert(OrderId::new(), user, price("0.56"), Quantity::from_u64(1));
        book.insert(OrderId::new(), user, price("0.54"), Quantity::from_u64(2));
        book.insert(OrderId::new(), user, price("0.58"), Quantity::from_u64(3));

        assert_eq!(book.best_price(), Some(price("0.54")));
        assert_eq!(
            book.prices_in_priority(),
            vec![price("0.54"), price("0.56"), price("0.58")]
        );
    }

    #[test]
    fn test_depth_snapshot_ascending() {
        let mut book = AskBook::new();
        let user = UserId::new();
        for p in ["0.58", "0.57", "0.56", "0.55", "0.54"] {
            book.insert(OrderId::new(), user, price(p), Quantity::from_u64(10));
        }

        let depth = book.depth_snapshot(3);
        assert_eq!(depth.len(), 3);
        assert_eq!(depth[0].0, price("0.54"));
        assert_eq!(depth[2].0, price("0.56"));
    }

    #[test]
    fn test_remove_drops_empty_level() {
        let mut book = AskBook::new();
        let user = UserId::new();
        let id = OrderId::new();
        book.insert(id, user, price("0.54"), Quantity::from_u64(4));

        assert_eq!(book.remove(&id, price("0.54")), Some(Quantity::from_u64(4)));
        assert!(book.is_empty());
    }
}
