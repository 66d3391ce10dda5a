//! # Register Client
//!
//! Wires the queue pieces together for a register: local queue database,
//! HTTP submitter, health probe, gateway and background worker.

use std::sync::Arc;
use tracing::info;

use medtill_core::{CommittedSale, SyncQueueEntry};
use medtill_db::{Database, DbConfig, QueueCounts};

use crate::config::QueueConfig;
use crate::drainer::{DrainReport, QueueDrainer};
use crate::error::{SyncError, SyncResult};
use crate::events::{DrainEventEmitter, NoOpEmitter};
use crate::gateway::SaleGateway;
use crate::intent::{SaleIntent, Submission};
use crate::probe::{ConnectivityProbe, HttpProbe, ManualProbe};
use crate::submitter::{HttpSaleSubmitter, SaleSubmitter};
use crate::worker::{QueueWorker, QueueWorkerHandle};

/// Everything a register needs to sell through connectivity loss.
pub struct RegisterClient {
    db: Database,
    gateway: SaleGateway,
    drainer: Arc<QueueDrainer>,
    config: QueueConfig,
}

impl RegisterClient {
    /// Submits a sale: committed now or queued for replay.
    pub async fn submit(&self, intent: SaleIntent) -> SyncResult<Submission> {
        self.gateway.submit(intent).await
    }

    /// Resolves an uncertain outcome by idempotency key.
    pub async fn lookup(&self, idempotency_key: &str) -> SyncResult<Option<CommittedSale>> {
        self.gateway.lookup(idempotency_key).await
    }

    /// Runs one drain pass in the caller's task.
    pub async fn drain_now(&self) -> SyncResult<DrainReport> {
        self.drainer.drain().await
    }

    /// Spawns the background worker.
    pub fn spawn_worker(&self) -> QueueWorkerHandle {
        let (worker, handle) = QueueWorker::new(self.drainer.clone(), self.config.drain_interval());
        tokio::spawn(
            worker
                .retain_committed_days(self.config.queue.retain_committed_days)
                .run(),
        );
        handle
    }

    pub async fn pending(&self) -> SyncResult<Vec<SyncQueueEntry>> {
        Ok(self.db.queue().pending().await?)
    }

    /// Entries awaiting manual reconciliation.
    pub async fn dead_letters(&self) -> SyncResult<Vec<SyncQueueEntry>> {
        Ok(self.db.queue().dead_letters().await?)
    }

    pub async fn counts(&self) -> SyncResult<QueueCounts> {
        Ok(self.db.queue().counts().await?)
    }

    /// Puts a dead-lettered entry back in line with a fresh attempt budget.
    pub async fn requeue_dead_letter(&self, idempotency_key: &str) -> SyncResult<SyncQueueEntry> {
        Ok(self.db.queue().requeue_dead_letter(idempotency_key).await?)
    }

    /// Removes committed entries older than `older_than_days`.
    pub async fn discard_committed(&self, older_than_days: u32) -> SyncResult<u64> {
        Ok(self.db.queue().discard_committed(older_than_days).await?)
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Closes the local queue database.
    pub async fn close(&self) {
        self.db.close().await;
    }
}

// =============================================================================
// Builder Pattern
// =============================================================================

/// Builder for creating a RegisterClient with options.
pub struct RegisterClientBuilder {
    config: QueueConfig,
    db: Option<Database>,
    submitter: Option<Arc<dyn SaleSubmitter>>,
    probe: Option<Arc<dyn ConnectivityProbe>>,
    emitter: Option<Arc<dyn DrainEventEmitter>>,
}

impl RegisterClientBuilder {
    /// Creates a new builder with the given config.
    pub fn new(config: QueueConfig) -> Self {
        RegisterClientBuilder {
            config,
            db: None,
            submitter: None,
            probe: None,
            emitter: None,
        }
    }

    /// Uses an already open queue database instead of the configured path.
    pub fn with_database(mut self, db: Database) -> Self {
        self.db = Some(db);
        self
    }

    /// Replaces the HTTP submitter.
    pub fn with_submitter(mut self, submitter: Arc<dyn SaleSubmitter>) -> Self {
        self.submitter = Some(submitter);
        self
    }

    /// Replaces the HTTP health probe.
    pub fn with_probe(mut self, probe: Arc<dyn ConnectivityProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Sets the event emitter.
    pub fn with_emitter(mut self, emitter: Arc<dyn DrainEventEmitter>) -> Self {
        self.emitter = Some(emitter);
        self
    }

    /// Builds the client, opening the queue database if needed.
    pub async fn build(self) -> SyncResult<RegisterClient> {
        self.config.validate()?;

        let db = match self.db {
            Some(db) => db,
            None => {
                let path = self.config.database_path().ok_or_else(|| {
                    SyncError::InvalidConfig("No queue database path available".into())
                })?;
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                Database::new(DbConfig::new(path).max_connections(2)).await?
            }
        };

        let submitter: Arc<dyn SaleSubmitter> = match (self.submitter, self.config.server_url()) {
            (Some(submitter), _) => submitter,
            (None, Some(url)) => Arc::new(HttpSaleSubmitter::new(url, self.config.request_timeout())?),
            (None, None) => {
                return Err(SyncError::InvalidConfig(
                    "server.url is required without a custom submitter".into(),
                ))
            }
        };

        let probe: Arc<dyn ConnectivityProbe> = match (self.probe, self.config.server_url()) {
            (Some(probe), _) => probe,
            (None, Some(url)) => Arc::new(HttpProbe::new(url, self.config.probe_timeout())?),
            (None, None) => Arc::new(ManualProbe::new(true)),
        };

        let emitter = self.emitter.unwrap_or_else(|| Arc::new(NoOpEmitter));

        let gateway = SaleGateway::new(submitter.clone(), probe.clone(), db.queue());
        let drainer = Arc::new(
            QueueDrainer::new(db.queue(), submitter, probe, self.config.retry_policy())
                .with_emitter(emitter),
        );

        info!(device_id = %self.config.device_id(), "Register client ready");

        Ok(RegisterClient {
            db,
            gateway,
            drainer,
            config: self.config,
        })
    }
}
