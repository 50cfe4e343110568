//! Error taxonomy for the prediction-market core
//!
//! Validation and resource errors are rejected synchronously before any book
//! mutation; not-found conditions surface as errors at the command boundary
//! and are logged, never panicked on.

use crate::ids::{MarketId, OptionId, OrderId, UserId};
use thiserror::Error;

/// Top-level core error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    #[error("Wallet error: {0}")]
    Wallet(#[from] WalletError),

    #[error("Position error: {0}")]
    Position(#[from] PositionError),

    #[error("Market error: {0}")]
    Market(#[from] MarketError),
}

/// Order validation and lifecycle errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OrderError {
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    #[error("Missing price for {order_type} order")]
    MissingPrice { order_type: String },

    #[error("Missing trigger for {order_type} order")]
    MissingTrigger { order_type: String },

    #[error("Order not found: {order_id}")]
    NotFound { order_id: OrderId },
}

/// Wallet resource errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WalletError {
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: String, available: String },

    #[error("Wallet not found for user {user_id}")]
    NotFound { user_id: UserId },
}

/// Position resource errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PositionError {
    #[error("Insufficient shares: required {required}, sellable {sellable}")]
    InsufficientShares { required: String, sellable: String },

    #[error("No position for user {user_id} in option {option_id}")]
    NotFound { user_id: UserId, option_id: OptionId },
}

/// Market lookup and state errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MarketError {
    #[error("Market not found: {market_id}")]
    NotFound { market_id: MarketId },

    #[error("Option not found: {option_id}")]
    OptionNotFound { option_id: OptionId },

    #[error("Market {market_id} is halted pending investigation")]
    Halted { market_id: MarketId },
}
