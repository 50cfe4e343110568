//! Sentiment scale and externally registered market events
//!
//! Each market carries a discrete sentiment level on a 5-point scale,
//! linearly mapped to a target price in [0.1, 0.9].

use crate::ids::MarketId;
use crate::numeric::Price;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Directional bias for a market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentimentLevel {
    StronglyNegative,
    Negative,
    Neutral,
    Positive,
    StronglyPositive,
}

impl SentimentLevel {
    /// Numeric score in [-2, 2].
    pub fn score(&self) -> i8 {
        match self {
            SentimentLevel::StronglyNegative => -2,
            SentimentLevel::Negative => -1,
            SentimentLevel::Neutral => 0,
            SentimentLevel::Positive => 1,
            SentimentLevel::StronglyPositive => 2,
        }
    }

    /// Clamp a continuous score to the scale and round to the nearest level.
    pub fn from_score(score: f64) -> Self {
        let rounded = score.clamp(-2.0, 2.0).round() as i8;
        match rounded {
            -2 => SentimentLevel::StronglyNegative,
            -1 => SentimentLevel::Negative,
            0 => SentimentLevel::Neutral,
            1 => SentimentLevel::Positive,
            _ => SentimentLevel::StronglyPositive,
        }
    }

    /// Target price: 0.1 + ((level + 2) / 4) × 0.8.
    pub fn target_price(&self) -> Price {
        let step = Decimal::from(self.score() as i64 + 2);
        let value = Decimal::new(1, 1) + step * Decimal::new(2, 1);
        // value is in [0.1, 0.9], so the fallback is unreachable
        Price::try_new(value).unwrap_or_else(|| Price::from_u64(1))
    }
}

/// An externally registered event nudging a market's sentiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketEvent {
    pub id: Uuid,
    pub market_id: MarketId,
    pub description: String,
    /// Signed sentiment impact, in level units
    pub impact: f64,
    pub occurred_at: i64,
}

impl MarketEvent {
    /// Create a new market event.
    pub fn new(market_id: MarketId, description: impl Into<String>, impact: f64, occurred_at: i64) -> Self {
        Self {
            id: Uuid::now_v7(),
            market_id,
            description: description.into(),
            impact,
            occurred_at,
        }
    }
}
