//! # Sale Gateway
//!
//! Commit-or-queue entry point used by the register UI.
//!
//! ## Decision Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  submit(intent)                                                         │
//! │     │                                                                   │
//! │     ├─ preflight fails ───────────────────────────► Err (never queued)  │
//! │     │                                                                   │
//! │     ├─ probe offline ─────────────────────────────► Queued(Offline)     │
//! │     │                                                                   │
//! │     ├─ drawer has pending entries ────────────────► Queued(Backlog)     │
//! │     │                                                                   │
//! │     └─ submitter.commit(intent)                                         │
//! │           ├─ Ok(sale) ────────────────────────────► Committed(sale)     │
//! │           ├─ retryable error (timeout, 503) ──────► Queued(Uncertain)   │
//! │           └─ deterministic error ─────────────────► Err                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A queued intent keeps its idempotency key, so if the uncertain attempt
//! did land, the replay returns that sale instead of creating a second.
//!
//! Sale numbers follow ring-up order per drawer: while a drawer has pending
//! entries, new sales of that drawer queue behind them and the drainer
//! commits them in `seq` order.

use std::sync::Arc;
use tracing::{debug, info, warn};

use medtill_core::CommittedSale;
use medtill_db::SyncQueueRepository;

use crate::error::SyncResult;
use crate::intent::{QueueReason, QueuedReceipt, SaleIntent, Submission};
use crate::probe::ConnectivityProbe;
use crate::submitter::SaleSubmitter;

/// Submits sales, falling back to the durable local queue.
#[derive(Clone)]
pub struct SaleGateway {
    submitter: Arc<dyn SaleSubmitter>,
    probe: Arc<dyn ConnectivityProbe>,
    queue: SyncQueueRepository,
}

impl SaleGateway {
    pub fn new(
        submitter: Arc<dyn SaleSubmitter>,
        probe: Arc<dyn ConnectivityProbe>,
        queue: SyncQueueRepository,
    ) -> Self {
        SaleGateway {
            submitter,
            probe,
            queue,
        }
    }

    /// Commits the intent now, or queues it for replay.
    pub async fn submit(&self, intent: SaleIntent) -> SyncResult<Submission> {
        intent.preflight()?;

        if !self.probe.is_online().await {
            return self.enqueue(&intent, QueueReason::Offline).await;
        }

        if let Some(head) = self.queue.next_pending_for_drawer(&intent.drawer_id).await? {
            debug!(
                drawer_id = %intent.drawer_id,
                head_seq = head.seq,
                "Drawer has a backlog, queuing behind it"
            );
            return self.enqueue(&intent, QueueReason::Backlog).await;
        }

        match self.submitter.commit(&intent).await {
            Ok(sale) => Ok(Submission::Committed(sale)),
            Err(e) if e.is_retryable() => {
                warn!(
                    idempotency_key = %intent.idempotency_key,
                    error = %e,
                    "Sale outcome uncertain, queuing for replay"
                );
                self.enqueue(&intent, QueueReason::Uncertain).await
            }
            Err(e) => Err(e),
        }
    }

    /// Writes the intent to the local queue.
    pub async fn enqueue(
        &self,
        intent: &SaleIntent,
        reason: QueueReason,
    ) -> SyncResult<Submission> {
        let payload = serde_json::to_string(intent)?;
        let entry = self
            .queue
            .enqueue(
                &intent.idempotency_key,
                &intent.drawer_id,
                &intent.session_id,
                &payload,
            )
            .await?;

        info!(
            idempotency_key = %entry.idempotency_key,
            drawer_id = %entry.drawer_id,
            seq = entry.seq,
            ?reason,
            "Sale queued"
        );

        Ok(Submission::Queued(QueuedReceipt {
            idempotency_key: entry.idempotency_key,
            drawer_id: entry.drawer_id,
            session_id: entry.session_id,
            seq: entry.seq,
            reason,
            queued_at: entry.created_at,
        }))
    }

    /// Resolves an uncertain outcome by asking the server for the sale
    /// committed under `idempotency_key`. `None` means it has none yet.
    pub async fn lookup(&self, idempotency_key: &str) -> SyncResult<Option<CommittedSale>> {
        self.submitter.find_by_key(idempotency_key).await
    }
}
