//! Synthetic liquidity subsystem
//!
//! Seeded bot pools quote and trade against the market core so human
//! participants always face a populated book. A per-market sentiment score
//! steers bursts of directional flow; prices still only move through real
//! trades.

pub mod engine;
pub mod manager;
pub mod sentiment;
pub mod strategy;

pub use engine::{LiquidityConfig, LiquidityEngine};
pub use manager::{BotConfig, LiquidityBotManager};
pub use sentiment::{SentimentEngine, SentimentShift};
pub use strategy::Strategy;
