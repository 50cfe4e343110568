//! Level fill loop
//!
//! Fills FIFO entries at one price level against an incoming taker,
//! skipping entries owned by the taker (self-trade prevention continues to
//! the next candidate, never aborts the match).

use crate::book::PriceLevel;
use types::ids::{OrderId, UserId};
use types::numeric::{Price, Quantity};

/// One maker fill produced by the match loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fill {
    pub maker_order_id: OrderId,
    pub maker_user_id: UserId,
    /// Execution price (the maker's level price)
    pub price: Price,
    pub quantity: Quantity,
}

/// Fill as much of `remaining` as the level allows.
///
/// Entries owned by `taker_user` are left untouched in place. Exhausted
/// entries are purged before returning.
pub fn fill_level(
    level: &mut PriceLevel,
    taker_user: UserId,
    price: Price,
    remaining: &mut Quantity,
    fills: &mut Vec<Fill>,
) {
    for entry in level.entries_mut() {
        if remaining.is_zero() {
            break;
        }
        if entry.user_id == taker_user {
            continue;
        }

        let quantity = (*remaining).min(entry.remaining);
        fills.push(Fill {
            maker_order_id: entry.order_id,
            maker_user_id: entry.user_id,
            price,
            quantity,
        });

        entry.remaining = entry.remaining.saturating_sub(quantity);
        *remaining = remaining.saturating_sub(quantity);
    }

    level.purge_filled();
}
