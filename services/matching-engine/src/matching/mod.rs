//! Matching logic
//!
//! Crossing predicate and the level fill loop.

pub mod crossing;
pub mod fill;
