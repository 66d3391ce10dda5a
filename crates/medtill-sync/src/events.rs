//! # Drain Events
//!
//! What the drainer tells the host application (UI badge, notification).

use serde::Serialize;
use std::sync::Mutex;

/// Something that happened while draining the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DrainEvent {
    /// A queued intent reached the server.
    EntryCommitted {
        idempotency_key: String,
        drawer_id: String,
        sale_id: String,
        /// The server had already committed this key.
        replayed: bool,
    },
    /// A queued intent needs manual reconciliation.
    EntryDeadLettered {
        idempotency_key: String,
        drawer_id: String,
        error: String,
    },
    /// One drain pass ended.
    DrainFinished {
        committed: u64,
        dead_lettered: u64,
        remaining: u64,
    },
}

/// Receives drain events (implemented by the host application).
pub trait DrainEventEmitter: Send + Sync {
    fn emit(&self, event: DrainEvent);
}

/// No-op event emitter.
pub struct NoOpEmitter;

impl DrainEventEmitter for NoOpEmitter {
    fn emit(&self, _event: DrainEvent) {}
}

/// Emitter that keeps every event, for tests and diagnostics.
#[derive(Debug, Default)]
pub struct RecordingEmitter {
    events: Mutex<Vec<DrainEvent>>,
}

impl RecordingEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events emitted so far, oldest first.
    pub fn events(&self) -> Vec<DrainEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl DrainEventEmitter for RecordingEmitter {
    fn emit(&self, event: DrainEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}
