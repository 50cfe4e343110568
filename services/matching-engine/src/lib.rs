//! Price-time priority matching engine
//!
//! One `OrderBook` per (market, option) pair. The engine is purely
//! single-threaded over its own state; callers serialize access per pair
//! and handle settlement, reservations, and event publication.

pub mod book;
pub mod engine;
pub mod matching;

pub use engine::{BookSnapshot, OrderBook, SubmitOutcome};
pub use matching::fill::Fill;
