//! Prediction-market core
//!
//! Composes the matching engine and ledgers behind a single command
//! surface: market initialization, order submission and cancellation,
//! depth views, funding, and implied-probability pricing. Persistence and
//! broadcast go out through the `OrderRepository` and `Publisher` ports.

pub mod core;
pub mod events;
pub mod pricer;
pub mod publisher;
pub mod repository;

pub use crate::core::{BookLevel, BookView, CoreConfig, MarketCore};
pub use events::BroadcastEvent;
pub use publisher::{NullPublisher, Publisher, RecordingPublisher};
pub use repository::{MemoryRepository, OrderRepository, RepositoryError};
