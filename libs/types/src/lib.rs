//! Types library for the prediction-market core
//!
//! This library provides all core type definitions shared across the market
//! services, ensuring type safety and deterministic decimal behavior.
//!
//! # Modules
//! - `ids`: Unique identifiers (OrderId, TradeId, UserId, MarketId, OptionId)
//! - `numeric`: Fixed-point decimal types (Price, Quantity)
//! - `order`: Order lifecycle types
//! - `trade`: Trade types
//! - `position`: Position tracking with average-cost accounting
//! - `wallet`: Wallet and transaction-log types
//! - `market`: Market and market-option types
//! - `sentiment`: Sentiment scale and market events
//! - `errors`: Error taxonomy

pub mod errors;
pub mod ids;
pub mod market;
pub mod numeric;
pub mod order;
pub mod position;
pub mod sentiment;
pub mod trade;
pub mod wallet;

/// Library version constant
pub const LIB_VERSION: &str = "1.0.0";

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::errors::*;
    pub use crate::ids::*;
    pub use crate::market::*;
    pub use crate::numeric::*;
    pub use crate::order::*;
    pub use crate::position::*;
    pub use crate::sentiment::*;
    pub use crate::trade::*;
    pub use crate::wallet::*;
}
