//! # Queue Drainer
//!
//! Replays queued sale intents once the server is reachable again.
//!
//! ## Drain Pass
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  for drawer in pending_drawers()          (oldest head entry first)    │
//! │     while entry = next_pending_for_drawer(drawer)                       │
//! │        │                                                                │
//! │        ├─ probe offline ──────────► stop pass (attempts untouched)      │
//! │        │                                                                │
//! │        └─ commit(intent) with its idempotency key                       │
//! │              ├─ Ok(sale) ─────────► committed                           │
//! │              ├─ deterministic ────► dead_letter                         │
//! │              └─ retryable ────────► attempts += 1                       │
//! │                    ├─ attempts < max ─► sleep(backoff), retry SAME entry│
//! │                    └─ attempts = max ─► dead_letter                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Ordering
//! Entries of one drawer replay strictly by queue `seq`. While an entry is
//! being retried, nothing behind it in the same drawer is attempted.
//! Drawers do not wait on each other's order beyond running one at a time.

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use medtill_core::SyncQueueEntry;
use medtill_db::SyncQueueRepository;

use crate::error::SyncResult;
use crate::events::{DrainEvent, DrainEventEmitter, NoOpEmitter};
use crate::intent::SaleIntent;
use crate::probe::ConnectivityProbe;
use crate::submitter::SaleSubmitter;

// =============================================================================
// Retry Policy
// =============================================================================

/// Bounded retry for transient failures.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Attempts (across drain passes) before an entry is dead-lettered.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Creates the exponential backoff for one entry.
    fn create_backoff(&self) -> ExponentialBackoff {
        let mut backoff = ExponentialBackoff {
            initial_interval: self.initial_backoff,
            max_interval: self.max_backoff,
            multiplier: self.multiplier,
            randomization_factor: 0.0,
            max_elapsed_time: None, // attempts bound the retries, not time
            ..Default::default()
        };
        backoff.reset();
        backoff
    }
}

// =============================================================================
// Drain Report
// =============================================================================

/// Totals of one drain pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrainReport {
    pub committed: u64,
    pub dead_lettered: u64,
    /// Pending entries left after the pass.
    pub remaining: u64,
    /// The pass ended early because the server went away.
    pub stopped_offline: bool,
}

enum EntryOutcome {
    Committed,
    DeadLettered,
    Offline,
}

// =============================================================================
// Queue Drainer
// =============================================================================

/// Replays the local queue through a submitter.
pub struct QueueDrainer {
    queue: SyncQueueRepository,
    submitter: Arc<dyn SaleSubmitter>,
    probe: Arc<dyn ConnectivityProbe>,
    policy: RetryPolicy,
    emitter: Arc<dyn DrainEventEmitter>,
}

impl QueueDrainer {
    pub fn new(
        queue: SyncQueueRepository,
        submitter: Arc<dyn SaleSubmitter>,
        probe: Arc<dyn ConnectivityProbe>,
        policy: RetryPolicy,
    ) -> Self {
        QueueDrainer {
            queue,
            submitter,
            probe,
            policy,
            emitter: Arc::new(NoOpEmitter),
        }
    }

    /// Sets the event emitter.
    pub fn with_emitter(mut self, emitter: Arc<dyn DrainEventEmitter>) -> Self {
        self.emitter = emitter;
        self
    }

    /// The queue this drainer reads.
    pub fn queue(&self) -> &SyncQueueRepository {
        &self.queue
    }

    /// Runs one drain pass.
    pub async fn drain(&self) -> SyncResult<DrainReport> {
        let mut report = DrainReport::default();

        if !self.probe.is_online().await {
            debug!("Offline, skipping drain");
            report.stopped_offline = true;
            report.remaining = self.queue.counts().await?.pending as u64;
            return Ok(report);
        }

        'drawers: for drawer_id in self.queue.pending_drawers().await? {
            while let Some(entry) = self.queue.next_pending_for_drawer(&drawer_id).await? {
                match self.replay_entry(&entry).await? {
                    EntryOutcome::Committed => report.committed += 1,
                    EntryOutcome::DeadLettered => report.dead_lettered += 1,
                    EntryOutcome::Offline => {
                        info!(drawer_id = %drawer_id, "Connectivity lost, stopping drain");
                        report.stopped_offline = true;
                        break 'drawers;
                    }
                }
            }
        }

        report.remaining = self.queue.counts().await?.pending as u64;

        if report.committed > 0 || report.dead_lettered > 0 {
            info!(
                committed = report.committed,
                dead_lettered = report.dead_lettered,
                remaining = report.remaining,
                "Drain pass finished"
            );
        }
        self.emitter.emit(DrainEvent::DrainFinished {
            committed: report.committed,
            dead_lettered: report.dead_lettered,
            remaining: report.remaining,
        });

        Ok(report)
    }

    /// Replays one entry until it leaves the pending state or the
    /// server becomes unreachable.
    async fn replay_entry(&self, entry: &SyncQueueEntry) -> SyncResult<EntryOutcome> {
        let key = entry.idempotency_key.as_str();

        let intent: SaleIntent = match serde_json::from_str(&entry.payload) {
            Ok(intent) => intent,
            Err(e) => {
                let reason = format!("Unreadable queue payload: {}", e);
                return self.dead_letter(entry, &reason).await;
            }
        };

        let mut backoff = self.policy.create_backoff();

        loop {
            if !self.probe.is_online().await {
                return Ok(EntryOutcome::Offline);
            }

            match self.submitter.commit(&intent).await {
                Ok(sale) => {
                    self.queue.mark_committed(key, &sale.sale.id).await?;
                    info!(
                        idempotency_key = %key,
                        sale_id = %sale.sale.id,
                        replayed = sale.replayed,
                        "Queued sale committed"
                    );
                    self.emitter.emit(DrainEvent::EntryCommitted {
                        idempotency_key: key.to_string(),
                        drawer_id: entry.drawer_id.clone(),
                        sale_id: sale.sale.id,
                        replayed: sale.replayed,
                    });
                    return Ok(EntryOutcome::Committed);
                }
                Err(e) if e.is_retryable() => {
                    let attempts = self.queue.record_attempt(key, &e.to_string()).await?;
                    if attempts >= i64::from(self.policy.max_attempts) {
                        let reason = format!("Retries exhausted after {} attempts: {}", attempts, e);
                        return self.dead_letter(entry, &reason).await;
                    }

                    let delay = backoff.next_backoff().unwrap_or(self.policy.max_backoff);
                    warn!(
                        idempotency_key = %key,
                        attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Replay failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    return self.dead_letter(entry, &e.to_string()).await;
                }
            }
        }
    }

    async fn dead_letter(&self, entry: &SyncQueueEntry, reason: &str) -> SyncResult<EntryOutcome> {
        self.queue
            .mark_dead_letter(&entry.idempotency_key, reason)
            .await?;
        error!(
            idempotency_key = %entry.idempotency_key,
            drawer_id = %entry.drawer_id,
            session_id = %entry.session_id,
            reason = %reason,
            "Queued sale moved to dead letter"
        );
        self.emitter.emit(DrainEvent::EntryDeadLettered {
            idempotency_key: entry.idempotency_key.clone(),
            drawer_id: entry.drawer_id.clone(),
            error: reason.to_string(),
        });
        Ok(EntryOutcome::DeadLettered)
    }
}
