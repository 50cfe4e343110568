//! Unique identifier types for market entities
//!
//! All IDs use UUID v7 for time-sortable ordering, enabling efficient
//! chronological queries and replay of order flow.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Create a new identifier with the current timestamp
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Create from an existing UUID
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the inner UUID
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id! {
    /// Unique identifier for an order
    OrderId
}

uuid_id! {
    /// Unique identifier for a trade
    TradeId
}

uuid_id! {
    /// Unique identifier for a user (real or synthetic bot)
    UserId
}

uuid_id! {
    /// Unique identifier for a market
    MarketId
}

uuid_id! {
    /// Unique identifier for a market option (one binary outcome)
    OptionId
}

uuid_id! {
    /// Unique identifier for a wallet transaction record
    TransactionId
}
