//! Broadcast event payloads
//!
//! Everything the core emits lands on `market:<id>`: order lifecycle,
//! trades, and price moves alike. The `match:<id>` family is reserved for
//! live match-state feeds on sports-linked markets and carries nothing
//! from this crate. Payloads serialize as tagged JSON objects.

use serde::{Deserialize, Serialize};
use types::ids::{MarketId, OptionId, OrderId};
use types::numeric::{Price, Quantity};
use types::order::Order;
use types::trade::Trade;

/// Topic carrying price and book updates for one market.
pub fn market_topic(market_id: MarketId) -> String {
    format!("market:{market_id}")
}

/// Topic carrying live match-state updates for a sports-linked market.
pub fn match_topic(market_id: MarketId) -> String {
    format!("match:{market_id}")
}

/// Everything the core pushes to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum BroadcastEvent {
    /// An order was accepted (post-match state)
    OrderAccepted { order: Order },

    /// A trade executed between two orders
    TradeExecuted { trade: Trade },

    /// An order left the book before completion
    OrderCancelled {
        order_id: OrderId,
        market_id: MarketId,
        option_id: OptionId,
        remaining: Quantity,
    },

    /// An order passed its expiry deadline and left the book
    OrderExpired {
        order_id: OrderId,
        market_id: MarketId,
        option_id: OptionId,
        remaining: Quantity,
    },

    /// An option's recorded price moved
    PriceChanged {
        market_id: MarketId,
        option_id: OptionId,
        last_price: Price,
        current_price: Price,
    },
}

impl BroadcastEvent {
    /// Topic this event belongs on.
    pub fn topic(&self) -> String {
        match self {
            BroadcastEvent::OrderAccepted { order } => market_topic(order.market_id),
            BroadcastEvent::TradeExecuted { trade } => market_topic(trade.market_id),
            BroadcastEvent::OrderCancelled { market_id, .. }
            | BroadcastEvent::OrderExpired { market_id, .. }
            | BroadcastEvent::PriceChanged { market_id, .. } => market_topic(*market_id),
        }
    }
}
