//! Publisher port
//!
//! The core pushes events out through this trait; the hosting process
//! decides the transport. Publishing never blocks a transaction and never
//! fails at the call site.

use std::sync::{Mutex, PoisonError};

use crate::events::BroadcastEvent;

/// Outbound event sink.
pub trait Publisher: Send + Sync {
    fn publish(&self, topic: &str, event: &BroadcastEvent);
}

/// Discards every event.
#[derive(Debug, Default)]
pub struct NullPublisher;

impl Publisher for NullPublisher {
    fn publish(&self, _topic: &str, _event: &BroadcastEvent) {}
}

/// Captures events in memory; used by tests to assert on the stream.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<(String, BroadcastEvent)>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(String, BroadcastEvent)> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Publisher for RecordingPublisher {
    fn publish(&self, topic: &str, event: &BroadcastEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((topic.to_string(), event.clone()));
    }
}
