//! Cash and share ledgers
//!
//! `WalletLedger` tracks user cash with buy-side reservations;
//! `PositionLedger` tracks per-option holdings with sell-side reservations
//! and average-cost P&L. Both are internally locked; callers compose them
//! into one settlement sequence per trade.

pub mod positions;
pub mod wallets;

pub use positions::{PositionLedger, TradeSettlement};
pub use wallets::WalletLedger;
