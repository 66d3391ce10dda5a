//! # Sync Queue Repository
//!
//! Durable client-side buffer of sale intents that could not be confirmed
//! by the server.
//!
//! ## Entry Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  enqueue(key, drawer, session, payload)                                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  PENDING ── record_attempt() ──► PENDING (attempts + 1, last_error)    │
//! │     │                                                                   │
//! │     ├── mark_committed(sale_id) ──► COMMITTED ── discard_committed()   │
//! │     │                                                                   │
//! │     └── mark_dead_letter(error) ──► DEAD_LETTER                        │
//! │                                        │                               │
//! │                 requeue_dead_letter() ─┘ (back to PENDING, attempts 0) │
//! │                                                                         │
//! │  Ordering: `seq` is the local insertion order. Entries of one drawer   │
//! │  drain strictly by seq; drawers are independent of each other.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The table lives in the client's own SQLite file, so entries survive a
//! process restart.

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use medtill_core::validation::validate_idempotency_key;
use medtill_core::{CoreError, QueueState, SyncQueueEntry};

/// Entry counts by state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueCounts {
    pub pending: i64,
    pub committed: i64,
    pub dead_letter: i64,
}

/// Repository for sync queue operations.
#[derive(Debug, Clone)]
pub struct SyncQueueRepository {
    pool: SqlitePool,
}

impl SyncQueueRepository {
    /// Creates a new SyncQueueRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SyncQueueRepository { pool }
    }

    /// Adds a sale intent to the queue.
    ///
    /// Enqueuing a key that is already queued is a no-op returning the
    /// existing entry, so a caller that retries its own enqueue never
    /// creates a second intent.
    pub async fn enqueue(
        &self,
        idempotency_key: &str,
        drawer_id: &str,
        session_id: &str,
        payload: &str,
    ) -> DbResult<SyncQueueEntry> {
        validate_idempotency_key(idempotency_key).map_err(CoreError::from)?;

        debug!(
            idempotency_key = %idempotency_key,
            drawer_id = %drawer_id,
            session_id = %session_id,
            "Queuing sale intent"
        );

        sqlx::query(
            r#"
            INSERT INTO sync_queue (
                idempotency_key, drawer_id, session_id, payload,
                state, attempts, created_at
            ) VALUES (?1, ?2, ?3, ?4, 'pending', 0, ?5)
            ON CONFLICT (idempotency_key) DO NOTHING
            "#,
        )
        .bind(idempotency_key)
        .bind(drawer_id)
        .bind(session_id)
        .bind(payload)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        self.get(idempotency_key)
            .await?
            .ok_or_else(|| DbError::not_found("Queue entry", idempotency_key))
    }

    /// Gets an entry by idempotency key.
    pub async fn get(&self, idempotency_key: &str) -> DbResult<Option<SyncQueueEntry>> {
        let entry = sqlx::query_as::<_, SyncQueueEntry>(
            "SELECT * FROM sync_queue WHERE idempotency_key = ?1",
        )
        .bind(idempotency_key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entry)
    }

    /// All pending entries, oldest first.
    pub async fn pending(&self) -> DbResult<Vec<SyncQueueEntry>> {
        self.by_state(QueueState::Pending).await
    }

    /// All dead-lettered entries, oldest first.
    pub async fn dead_letters(&self) -> DbResult<Vec<SyncQueueEntry>> {
        self.by_state(QueueState::DeadLetter).await
    }

    /// Drawers with pending entries, ordered by their oldest pending entry.
    pub async fn pending_drawers(&self) -> DbResult<Vec<String>> {
        let drawers: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT drawer_id
            FROM sync_queue
            WHERE state = 'pending'
            GROUP BY drawer_id
            ORDER BY MIN(seq)
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(drawers)
    }

    /// The oldest pending entry of a drawer: the only one that may be
    /// attempted next for that drawer.
    pub async fn next_pending_for_drawer(&self, drawer_id: &str) -> DbResult<Option<SyncQueueEntry>> {
        let entry = sqlx::query_as::<_, SyncQueueEntry>(
            r#"
            SELECT *
            FROM sync_queue
            WHERE drawer_id = ?1 AND state = 'pending'
            ORDER BY seq ASC
            LIMIT 1
            "#,
        )
        .bind(drawer_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entry)
    }

    /// Records a failed attempt and returns the new attempt count.
    pub async fn record_attempt(&self, idempotency_key: &str, error: &str) -> DbResult<i64> {
        let attempts: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE sync_queue SET
                attempts = attempts + 1,
                last_error = ?2,
                attempted_at = ?3
            WHERE idempotency_key = ?1 AND state = 'pending'
            RETURNING attempts
            "#,
        )
        .bind(idempotency_key)
        .bind(error)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        attempts.ok_or_else(|| DbError::not_found("Pending queue entry", idempotency_key))
    }

    /// Marks an entry as confirmed by the server.
    pub async fn mark_committed(&self, idempotency_key: &str, sale_id: &str) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE sync_queue SET
                state = 'committed',
                committed_sale_id = ?2,
                last_error = NULL,
                attempted_at = ?3
            WHERE idempotency_key = ?1 AND state = 'pending'
            "#,
        )
        .bind(idempotency_key)
        .bind(sale_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Pending queue entry", idempotency_key));
        }

        debug!(idempotency_key = %idempotency_key, sale_id = %sale_id, "Queue entry committed");
        Ok(())
    }

    /// Moves an entry to the dead-letter state for manual reconciliation.
    pub async fn mark_dead_letter(&self, idempotency_key: &str, error: &str) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE sync_queue SET
                state = 'dead_letter',
                last_error = ?2,
                attempted_at = ?3
            WHERE idempotency_key = ?1 AND state = 'pending'
            "#,
        )
        .bind(idempotency_key)
        .bind(error)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Pending queue entry", idempotency_key));
        }

        warn!(idempotency_key = %idempotency_key, error = %error, "Queue entry dead-lettered");
        Ok(())
    }

    /// Puts a dead-lettered entry back in line with a fresh attempt budget.
    ///
    /// The entry keeps its original `seq`, so it drains ahead of anything
    /// queued for the same drawer after it.
    pub async fn requeue_dead_letter(&self, idempotency_key: &str) -> DbResult<SyncQueueEntry> {
        let entry = sqlx::query_as::<_, SyncQueueEntry>(
            r#"
            UPDATE sync_queue SET
                state = 'pending',
                attempts = 0
            WHERE idempotency_key = ?1 AND state = 'dead_letter'
            RETURNING *
            "#,
        )
        .bind(idempotency_key)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Dead-letter entry", idempotency_key))?;

        info!(idempotency_key = %idempotency_key, "Dead-letter entry requeued");
        Ok(entry)
    }

    /// Entry counts by state.
    pub async fn counts(&self) -> DbResult<QueueCounts> {
        let rows: Vec<(QueueState, i64)> =
            sqlx::query_as("SELECT state, COUNT(*) FROM sync_queue GROUP BY state")
                .fetch_all(&self.pool)
                .await?;

        let mut counts = QueueCounts::default();
        for (state, n) in rows {
            match state {
                QueueState::Pending => counts.pending = n,
                QueueState::Committed => counts.committed = n,
                QueueState::DeadLetter => counts.dead_letter = n,
            }
        }

        Ok(counts)
    }

    /// Deletes committed entries created more than `older_than_days` ago.
    ///
    /// Pending and dead-lettered entries are never deleted.
    pub async fn discard_committed(&self, older_than_days: u32) -> DbResult<u64> {
        let cutoff = Utc::now() - Duration::days(i64::from(older_than_days));

        let result = sqlx::query(
            r#"
            DELETE FROM sync_queue
            WHERE state = 'committed'
              AND created_at < ?1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn by_state(&self, state: QueueState) -> DbResult<Vec<SyncQueueEntry>> {
        let entries = sqlx::query_as::<_, SyncQueueEntry>(
            "SELECT * FROM sync_queue WHERE state = ?1 ORDER BY seq ASC",
        )
        .bind(state)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    async fn repo() -> SyncQueueRepository {
        Database::new(DbConfig::in_memory()).await.unwrap().queue()
    }

    #[tokio::test]
    async fn test_enqueue_is_idempotent() {
        let queue = repo().await;
        let first = queue.enqueue("k-1", "d-1", "s-1", "{}").await.unwrap();
        let again = queue.enqueue("k-1", "d-1", "s-1", "{\"other\":1}").await.unwrap();

        assert_eq!(first.seq, again.seq);
        assert_eq!(again.payload, "{}");
        assert_eq!(first.state, QueueState::Pending);
        assert_eq!(queue.pending().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_per_drawer_order() {
        let queue = repo().await;
        queue.enqueue("a-1", "d-a", "s", "{}").await.unwrap();
        queue.enqueue("b-1", "d-b", "s", "{}").await.unwrap();
        queue.enqueue("a-2", "d-a", "s", "{}").await.unwrap();

        assert_eq!(queue.pending_drawers().await.unwrap(), vec!["d-a", "d-b"]);
        let next = queue.next_pending_for_drawer("d-a").await.unwrap().unwrap();
        assert_eq!(next.idempotency_key, "a-1");

        queue.mark_committed("a-1", "sale-1").await.unwrap();
        let next = queue.next_pending_for_drawer("d-a").await.unwrap().unwrap();
        assert_eq!(next.idempotency_key, "a-2");
    }

    #[tokio::test]
    async fn test_attempts_and_dead_letter() {
        let queue = repo().await;
        queue.enqueue("k-1", "d-1", "s-1", "{}").await.unwrap();

        assert_eq!(queue.record_attempt("k-1", "timeout").await.unwrap(), 1);
        assert_eq!(queue.record_attempt("k-1", "timeout").await.unwrap(), 2);

        queue.mark_dead_letter("k-1", "session closed").await.unwrap();
        let dead = queue.dead_letters().await.unwrap();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].last_error.as_deref(), Some("session closed"));
        assert_eq!(dead[0].attempts, 2);

        // Only pending entries can be touched by the drainer
        assert!(queue.record_attempt("k-1", "x").await.is_err());
        assert!(queue.mark_committed("k-1", "sale").await.is_err());

        let requeued = queue.requeue_dead_letter("k-1").await.unwrap();
        assert_eq!(requeued.state, QueueState::Pending);
        assert_eq!(requeued.attempts, 0);
        assert!(queue.requeue_dead_letter("k-1").await.is_err());
    }

    #[tokio::test]
    async fn test_counts_and_discard() {
        let queue = repo().await;
        queue.enqueue("k-1", "d", "s", "{}").await.unwrap();
        queue.enqueue("k-2", "d", "s", "{}").await.unwrap();
        queue.enqueue("k-3", "d", "s", "{}").await.unwrap();
        queue.mark_committed("k-1", "sale-1").await.unwrap();
        queue.mark_dead_letter("k-2", "boom").await.unwrap();

        assert_eq!(
            queue.counts().await.unwrap(),
            QueueCounts {
                pending: 1,
                committed: 1,
                dead_letter: 1
            }
        );

        // Nothing is old enough yet
        assert_eq!(queue.discard_committed(1).await.unwrap(), 0);

        sqlx::query("UPDATE sync_queue SET created_at = ?1 WHERE idempotency_key = 'k-1'")
            .bind(Utc::now() - Duration::days(10))
            .execute(&queue.pool)
            .await
            .unwrap();
        assert_eq!(queue.discard_committed(7).await.unwrap(), 1);
        assert_eq!(queue.counts().await.unwrap().committed, 0);
        assert_eq!(queue.counts().await.unwrap().dead_letter, 1);
    }

    #[tokio::test]
    async fn test_entries_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.db");

        let db = Database::new(DbConfig::new(&path)).await.unwrap();
        db.queue().enqueue("k-1", "d", "s", "{\"n\":1}").await.unwrap();
        db.close().await;

        let db = Database::new(DbConfig::new(&path)).await.unwrap();
        let pending = db.queue().pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].payload, "{\"n\":1}");
    }
}
