//! # Session Repository
//!
//! Shift lifecycle for a drawer: open, sell, close.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   start() ──► OPEN ──── close(counted) ────► CLOSED (terminal)          │
//! │                 │                               │                       │
//! │                 │ commit() admitted             │ commit() rejected     │
//! │                 │                               │ (session closed)      │
//! │                                                                         │
//! │  Exclusivity: partial unique index                                     │
//! │    sessions(drawer_id) WHERE status = 'open'                           │
//! │  Two concurrent start() calls race on the index; one insert wins,      │
//! │  the other fails with DrawerBusy.                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Commit vs Close
//! Both `close()` here and the sale commit open their transaction with a
//! guarded `UPDATE sessions ... WHERE status = 'open'`. SQLite admits one
//! writer at a time, so whichever lands first decides the outcome for the
//! other: a sale committed first is counted by close, and a close landed
//! first makes the commit fail with `SessionClosed`.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::sale::load_session_sales;
use medtill_core::reconciliation::{build_report, expected_cash};
use medtill_core::validation::{validate_non_negative_cents, validate_notes};
use medtill_core::{CoreError, ReconciliationReport, Session, SessionStatus};

/// Default page size for [`SessionRepository::list`].
pub const DEFAULT_LIST_LIMIT: i64 = 50;
/// Largest page size accepted by [`SessionRepository::list`].
pub const MAX_LIST_LIMIT: i64 = 500;

/// Filters for listing sessions.
#[derive(Debug, Clone, Default)]
pub struct SessionFilter {
    pub drawer_id: Option<String>,
    pub status: Option<SessionStatus>,
    pub limit: Option<i64>,
}

/// Result of closing a session.
#[derive(Debug, Clone)]
pub struct CloseOutcome {
    pub session: Session,
    pub report: ReconciliationReport,
}

/// Repository for session database operations.
#[derive(Debug, Clone)]
pub struct SessionRepository {
    pool: SqlitePool,
}

impl SessionRepository {
    /// Creates a new SessionRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SessionRepository { pool }
    }

    /// Opens a shift on a drawer.
    ///
    /// ## Opening Balance
    /// When `opening_balance_cents` is `None` the float carries forward
    /// from the counted cash of the drawer's last closed session, or 0 for
    /// a drawer that was never closed.
    ///
    /// ## Atomicity
    /// The drawer lookup, carry-forward and insert are one statement. The
    /// one-open-session rule is the partial unique index, so there is no
    /// window between checking and inserting.
    ///
    /// ## Errors
    /// - `ValidationError` for a negative balance or oversized notes
    /// - `DrawerNotFound` for an unknown drawer
    /// - `DrawerBusy` when the drawer already has an open session
    pub async fn start(
        &self,
        drawer_id: &str,
        opening_balance_cents: Option<i64>,
        notes: Option<&str>,
    ) -> DbResult<Session> {
        if let Some(balance) = opening_balance_cents {
            validate_non_negative_cents("opening_balance", balance).map_err(CoreError::from)?;
        }
        validate_notes(notes).map_err(CoreError::from)?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        debug!(drawer_id = %drawer_id, "Starting session");

        let result = sqlx::query_as::<_, Session>(
            r#"
            INSERT INTO sessions (
                id, drawer_id, status, opening_balance_cents, sale_count, opened_at, notes
            )
            SELECT
                ?1,
                d.id,
                'open',
                COALESCE(
                    ?2,
                    (SELECT p.counted_cash_cents
                     FROM sessions p
                     WHERE p.drawer_id = d.id
                       AND p.status = 'closed'
                       AND p.counted_cash_cents IS NOT NULL
                     ORDER BY p.rowid DESC
                     LIMIT 1),
                    0
                ),
                0,
                ?3,
                ?4
            FROM drawers d
            WHERE d.id = ?5
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(opening_balance_cents)
        .bind(now)
        .bind(notes)
        .bind(drawer_id)
        .fetch_optional(&self.pool)
        .await;

        match result {
            Ok(Some(session)) => {
                info!(
                    session_id = %session.id,
                    drawer_id = %drawer_id,
                    opening_balance = session.opening_balance_cents,
                    "Shift opened"
                );
                Ok(session)
            }
            Ok(None) => Err(CoreError::DrawerNotFound(drawer_id.to_string()).into()),
            Err(e) => {
                let err = DbError::from(e);
                if err.is_unique_on("sessions.drawer_id") {
                    warn!(drawer_id = %drawer_id, "Start rejected: drawer busy");
                    return Err(CoreError::DrawerBusy {
                        drawer_id: drawer_id.to_string(),
                    }
                    .into());
                }
                Err(err)
            }
        }
    }

    /// Closes a shift and reconciles the drawer.
    ///
    /// ```text
    /// expected = opening + Σ(cash − change)    (re-scanned from sale rows)
    /// variance = counted − expected
    /// ```
    ///
    /// ## Errors
    /// - `ValidationError` for negative counted cash
    /// - `SessionNotFound` / `SessionClosed`
    pub async fn close(
        &self,
        session_id: &str,
        counted_cash_cents: i64,
        notes: Option<&str>,
    ) -> DbResult<CloseOutcome> {
        validate_non_negative_cents("counted_cash", counted_cash_cents).map_err(CoreError::from)?;
        validate_notes(notes).map_err(CoreError::from)?;

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        // Guarded write first: takes the write lock and flips the status
        let closed = sqlx::query(
            r#"
            UPDATE sessions SET
                status = 'closed',
                closed_at = ?2,
                counted_cash_cents = ?3,
                notes = COALESCE(?4, notes)
            WHERE id = ?1 AND status = 'open'
            "#,
        )
        .bind(session_id)
        .bind(now)
        .bind(counted_cash_cents)
        .bind(notes)
        .execute(&mut *tx)
        .await?;

        if closed.rows_affected() == 0 {
            let err = session_not_open(&mut tx, session_id).await?;
            tx.rollback().await?;
            return Err(err.into());
        }

        let sales = load_session_sales(&mut tx, session_id).await?;
        let session = fetch_session(&mut tx, session_id).await?;

        let expected = expected_cash(session.opening_balance(), sales.iter().map(|(_, p)| p));
        let variance = counted_cash_cents - expected.cents();

        let session = sqlx::query_as::<_, Session>(
            r#"
            UPDATE sessions SET
                expected_cash_cents = ?2,
                variance_cents = ?3
            WHERE id = ?1
            RETURNING *
            "#,
        )
        .bind(session_id)
        .bind(expected.cents())
        .bind(variance)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            session_id = %session_id,
            transactions = sales.len(),
            expected_cash = expected.cents(),
            counted_cash = counted_cash_cents,
            variance = variance,
            "Shift closed"
        );

        let report = build_report(&session, &sales);
        Ok(CloseOutcome { session, report })
    }

    /// Gets a session by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Session>> {
        let session = sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(session)
    }

    /// Gets a session by ID, failing with `SessionNotFound` when missing.
    pub async fn get(&self, id: &str) -> DbResult<Session> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| CoreError::SessionNotFound(id.to_string()).into())
    }

    /// The open session for a drawer, if any.
    pub async fn current_for_drawer(&self, drawer_id: &str) -> DbResult<Option<Session>> {
        let session = sqlx::query_as::<_, Session>(
            "SELECT * FROM sessions WHERE drawer_id = ?1 AND status = 'open'",
        )
        .bind(drawer_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    /// Lists sessions, newest first.
    pub async fn list(&self, filter: &SessionFilter) -> DbResult<Vec<Session>> {
        let limit = filter
            .limit
            .unwrap_or(DEFAULT_LIST_LIMIT)
            .clamp(1, MAX_LIST_LIMIT);

        debug!(
            drawer_id = ?filter.drawer_id,
            status = ?filter.status,
            limit = limit,
            "Listing sessions"
        );

        let sessions = sqlx::query_as::<_, Session>(
            r#"
            SELECT *
            FROM sessions
            WHERE (?1 IS NULL OR drawer_id = ?1)
              AND (?2 IS NULL OR status = ?2)
            ORDER BY opened_at DESC, rowid DESC
            LIMIT ?3
            "#,
        )
        .bind(filter.drawer_id.as_deref())
        .bind(filter.status.map(|s| s.as_str()))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(sessions)
    }

    /// Builds the reconciliation report for a session.
    ///
    /// Reads the session and its sales in one transaction so the figures
    /// come from a single snapshot. For an open session this is a mid-shift
    /// report without counted cash or variance.
    pub async fn report(&self, session_id: &str) -> DbResult<ReconciliationReport> {
        let mut tx = self.pool.begin().await?;

        let session = fetch_session(&mut tx, session_id).await?;
        let sales = load_session_sales(&mut tx, session_id).await?;

        tx.commit().await?;

        Ok(build_report(&session, &sales))
    }
}

/// Fetches a session inside an open transaction.
async fn fetch_session(conn: &mut SqliteConnection, session_id: &str) -> DbResult<Session> {
    sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE id = ?1")
        .bind(session_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| CoreError::SessionNotFound(session_id.to_string()).into())
}

/// Explains why a guarded `WHERE status = 'open'` write touched no row.
pub(crate) async fn session_not_open(
    conn: &mut SqliteConnection,
    session_id: &str,
) -> DbResult<CoreError> {
    let status: Option<SessionStatus> =
        sqlx::query_scalar("SELECT status FROM sessions WHERE id = ?1")
            .bind(session_id)
            .fetch_optional(&mut *conn)
            .await?;

    Ok(match status {
        Some(_) => CoreError::SessionClosed {
            session_id: session_id.to_string(),
        },
        None => CoreError::SessionNotFound(session_id.to_string()),
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
