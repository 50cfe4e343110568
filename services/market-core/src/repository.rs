//! Persistence port
//!
//! Async repository trait the hosting process implements over its store of
//! choice. The core flushes writes fire-and-forget after each transaction;
//! a failed write is logged and never rolls the transaction back.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use thiserror::Error;
use types::ids::{MarketId, OptionId, OrderId};
use types::order::Order;
use types::position::Position;
use types::trade::Trade;
use types::wallet::WalletTransaction;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RepositoryError {
    #[error("Storage failure: {0}")]
    Storage(String),
}

/// Durable store for orders, trades, positions, and wallet movements.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn save_order(&self, order: &Order) -> Result<(), RepositoryError>;
    async fn save_trade(&self, trade: &Trade) -> Result<(), RepositoryError>;
    async fn save_position(&self, position: &Position) -> Result<(), RepositoryError>;
    async fn save_wallet_transaction(
        &self,
        transaction: &WalletTransaction,
    ) -> Result<(), RepositoryError>;

    /// Open (non-terminal) orders for one option, oldest first.
    async fn find_open_orders(
        &self,
        market_id: MarketId,
        option_id: OptionId,
    ) -> Result<Vec<Order>, RepositoryError>;
}

#[derive(Debug, Default)]
struct MemoryStore {
    orders: HashMap<OrderId, Order>,
    trades: Vec<Trade>,
    positions: Vec<Position>,
    wallet_transactions: Vec<WalletTransaction>,
}

/// In-memory repository for tests and standalone simulation runs.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    store: Mutex<MemoryStore>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn store(&self) -> std::sync::MutexGuard<'_, MemoryStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn order_count(&self) -> usize {
        self.store().orders.len()
    }

    pub fn trade_count(&self) -> usize {
        self.store().trades.len()
    }
}

#[async_trait]
impl OrderRepository for MemoryRepository {
    async fn save_order(&self, order: &Order) -> Result<(), RepositoryError> {
        self.store().orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn save_trade(&self, trade: &Trade) -> Result<(), RepositoryError> {
        self.store().trades.push(trade.clone());
        Ok(())
    }

    async fn save_position(&self, position: &Position) -> Result<(), RepositoryError> {
        self.store().positions.push(position.clone());
        Ok(())
    }

    async fn save_wallet_transaction(
        &self,
        transaction: &WalletTransaction,
    ) -> Result<(), RepositoryError> {
        self.store().wallet_transactions.push(transaction.clone());
        Ok(())
    }

    async fn find_open_orders(
        &self,
        market_id: MarketId,
        option_id: OptionId,
    ) -> Result<Vec<Order>, RepositoryError> {
        let mut orders: Vec<Order> = self
            .store()
            .orders
            .values()
            .filter(|o| o.market_id == market_id && o.option_id == option_id && o.is_active())
            .cloned()
            .collect();
        orders.sort_by_key(|o| o.created_at);
        Ok(orders)
    }
}
