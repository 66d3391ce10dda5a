//! # Queue Worker
//!
//! Background task that drains the queue on an interval and whenever the
//! host reports that connectivity came back.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  QueueWorker::run                                                      │
//! │     loop select! {                                                     │
//! │        interval.tick()        ──► drain()                              │
//! │        reconnect_rx.recv()    ──► drain()                              │
//! │        shutdown_rx.recv()     ──► break                                │
//! │     }                                                                  │
//! │                                                                         │
//! │  Drains never overlap: the loop awaits each pass before selecting      │
//! │  again, so the queue is replayed by one task at a time.                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::drainer::QueueDrainer;
use crate::error::{SyncError, SyncResult};

/// Drains the queue in the background.
pub struct QueueWorker {
    drainer: Arc<QueueDrainer>,
    interval: Duration,
    /// Committed entries older than this many days are discarded after
    /// each pass. `None` keeps them.
    retain_committed_days: Option<u32>,
    reconnect_rx: mpsc::Receiver<()>,
    shutdown_rx: mpsc::Receiver<()>,
}

/// Handle for controlling the queue worker.
#[derive(Clone)]
pub struct QueueWorkerHandle {
    reconnect_tx: mpsc::Sender<()>,
    shutdown_tx: mpsc::Sender<()>,
}

impl QueueWorkerHandle {
    /// Requests a drain now (e.g. the OS reported the network is back).
    ///
    /// Triggers that arrive while a drain is queued are coalesced.
    pub fn trigger_drain(&self) -> SyncResult<()> {
        match self.reconnect_tx.try_send(()) {
            Ok(()) | Err(mpsc::error::TrySendError::Full(())) => Ok(()),
            Err(mpsc::error::TrySendError::Closed(())) => {
                Err(SyncError::ChannelError("Queue worker stopped".into()))
            }
        }
    }

    /// Triggers graceful shutdown. A drain in progress finishes first.
    pub async fn shutdown(&self) -> SyncResult<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| SyncError::ChannelError("Shutdown channel closed".into()))
    }
}

impl QueueWorker {
    /// Creates a new worker and returns its handle.
    pub fn new(drainer: Arc<QueueDrainer>, interval: Duration) -> (Self, QueueWorkerHandle) {
        let (reconnect_tx, reconnect_rx) = mpsc::channel(1);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let worker = QueueWorker {
            drainer,
            interval,
            retain_committed_days: None,
            reconnect_rx,
            shutdown_rx,
        };

        (
            worker,
            QueueWorkerHandle {
                reconnect_tx,
                shutdown_tx,
            },
        )
    }

    /// Enables cleanup of committed entries older than `days`.
    pub fn retain_committed_days(mut self, days: u32) -> Self {
        self.retain_committed_days = Some(days);
        self
    }

    /// Runs the worker loop.
    ///
    /// This should be spawned as a background task.
    pub async fn run(mut self) {
        info!(interval_secs = self.interval.as_secs(), "Queue worker starting");

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.drain_once().await;
                }

                Some(()) = self.reconnect_rx.recv() => {
                    debug!("Reconnect trigger received");
                    self.drain_once().await;
                }

                _ = self.shutdown_rx.recv() => {
                    info!("Queue worker shutting down");
                    break;
                }
            }
        }

        info!("Queue worker stopped");
    }

    async fn drain_once(&self) {
        if let Err(e) = self.drainer.drain().await {
            error!(error = %e, retryable = e.is_retryable(), "Queue drain failed");
            return;
        }

        if let Some(days) = self.retain_committed_days {
            match self.drainer.queue().discard_committed(days).await {
                Ok(0) => {}
                Ok(n) => debug!(discarded = n, "Discarded old committed entries"),
                Err(e) => error!(error = %e, "Failed to discard committed entries"),
            }
        }
    }
}
