//! # medtill-sync: Offline Sale Queue for MedTill
//!
//! Lets a register keep ringing up sales while the server is unreachable,
//! and replays them exactly once when it comes back.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Register Client Architecture                        │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                RegisterClient (built from QueueConfig)           │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │         ┌─────────────────────┼─────────────────────┐                  │
//! │         ▼                     ▼                     ▼                   │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │  SaleGateway   │  │  QueueDrainer  │  │  QueueWorker           │    │
//! │  │                │  │                │  │                        │    │
//! │  │ Commit now, or │  │ Replays queue  │  │ Interval + reconnect   │    │
//! │  │ queue with key │  │ per drawer,    │  │ trigger, graceful      │    │
//! │  │                │  │ bounded retry  │  │ shutdown               │    │
//! │  └───────┬────────┘  └───────┬────────┘  └────────────────────────┘    │
//! │          │                   │                                          │
//! │          ▼                   ▼                                          │
//! │  ┌────────────────────────────────────┐  ┌────────────────────────┐    │
//! │  │  SaleSubmitter (HTTP / local)      │  │  sync_queue (SQLite)   │    │
//! │  │  ConnectivityProbe                 │  │  survives restarts     │    │
//! │  └────────────────────────────────────┘  └────────────────────────┘    │
//! │                                                                         │
//! │  DRAIN EVENTS (to the host app via DrainEventEmitter):                 │
//! │  • EntryCommitted    • EntryDeadLettered    • DrainFinished            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`config`] - Queue configuration (device ID, server URL, retry policy)
//! - [`error`] - Sync error types
//! - [`intent`] - Sale intents and the two submission outcomes
//! - [`submitter`] - Commit seam: HTTP and in-process
//! - [`probe`] - Connectivity probes
//! - [`gateway`] - Commit-or-queue entry point
//! - [`drainer`] - Queue replay with backoff and dead-lettering
//! - [`worker`] - Background drain task
//! - [`events`] - Drain events
//! - [`client`] - Wiring for a register
//!
//! ## Usage
//!
//! ```rust,ignore
//! use medtill_sync::{QueueConfig, RegisterClientBuilder, SaleIntent, Submission};
//!
//! let config = QueueConfig::load_or_default(None);
//! let client = RegisterClientBuilder::new(config).build().await?;
//! let worker = client.spawn_worker();
//!
//! match client.submit(SaleIntent::new(drawer_id, session_id, cart, tender)).await? {
//!     Submission::Committed(sale) => print_receipt(&sale),
//!     Submission::Queued(receipt) => show_pending_badge(&receipt),
//! }
//!
//! // OS reported the network is back
//! worker.trigger_drain()?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod client;
pub mod config;
pub mod drainer;
pub mod error;
pub mod events;
pub mod gateway;
pub mod intent;
pub mod probe;
pub mod submitter;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use client::{RegisterClient, RegisterClientBuilder};
pub use config::QueueConfig;
pub use drainer::{DrainReport, QueueDrainer, RetryPolicy};
pub use error::{SyncError, SyncResult};
pub use events::{DrainEvent, DrainEventEmitter, NoOpEmitter, RecordingEmitter};
pub use gateway::SaleGateway;
pub use intent::{QueueReason, QueuedReceipt, SaleIntent, Submission};
pub use probe::{ConnectivityProbe, HttpProbe, ManualProbe};
pub use submitter::{HttpSaleSubmitter, LocalSubmitter, SaleSubmitter, IDEMPOTENCY_KEY_HEADER};
pub use worker::{QueueWorker, QueueWorkerHandle};
