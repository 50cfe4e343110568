//! Market and market-option types
//!
//! A market is a set of binary-outcome options. Each option carries its own
//! order book; its current price only ever changes through real trades.

use crate::ids::{MarketId, OptionId};
use crate::numeric::Price;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One tradable outcome of a market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketOption {
    pub id: OptionId,
    pub market_id: MarketId,
    pub name: String,
    pub initial_price: Price,
    pub current_price: Price,
    pub last_price: Price,
    /// Lower bound for the clamped trade price
    pub min_price: Price,
    /// Upper bound for the clamped trade price (also the market-buy sentinel)
    pub max_price: Price,
    /// Implied-probability weight, refreshed after each trade
    pub weight: Decimal,
}

impl MarketOption {
    /// Create an option priced at `initial_price` within `[min, max]`.
    pub fn new(
        market_id: MarketId,
        name: impl Into<String>,
        initial_price: Price,
        min_price: Price,
        max_price: Price,
    ) -> Self {
        Self {
            id: OptionId::new(),
            market_id,
            name: name.into(),
            initial_price,
            current_price: initial_price,
            last_price: initial_price,
            min_price,
            max_price,
            weight: initial_price.as_decimal(),
        }
    }

    /// Record a trade price: last ← current, current ← clamp(price).
    pub fn record_trade(&mut self, price: Price) {
        self.last_price = self.current_price;
        self.current_price = price.clamp_to(self.min_price, self.max_price);
        self.weight = self.current_price.as_decimal();
    }
}

/// A prediction market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Market {
    pub id: MarketId,
    pub name: String,
    pub description: String,
    pub option_ids: Vec<OptionId>,
    pub created_at: i64,
}

impl Market {
    /// Create a market shell; options are attached by the core.
    pub fn new(name: impl Into<String>, description: impl Into<String>, created_at: i64) -> Self {
        Self {
            id: MarketId::new(),
            name: name.into(),
            description: description.into(),
            option_ids: Vec::new(),
            created_at,
        }
    }
}
