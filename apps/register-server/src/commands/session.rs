//! # Session Commands
//!
//! Shift lifecycle: start, close, list and the reconciliation report.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ApiError;
use crate::state::AppState;
use medtill_core::{ReconciliationReport, Session, SessionStatus};
use medtill_db::SessionFilter;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionRequest {
    pub drawer_id: String,
    /// Absent: carry forward the last counted cash of this drawer.
    #[serde(default)]
    pub opening_balance_cents: Option<i64>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseSessionRequest {
    pub counted_cash_cents: i64,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Query string parameters (snake_case).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListSessionsQuery {
    pub drawer_id: Option<String>,
    pub status: Option<SessionStatus>,
    pub limit: Option<i64>,
}

impl From<ListSessionsQuery> for SessionFilter {
    fn from(query: ListSessionsQuery) -> Self {
        SessionFilter {
            drawer_id: query.drawer_id,
            status: query.status,
            limit: query.limit,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseSessionResponse {
    pub session: Session,
    pub report: ReconciliationReport,
}

pub async fn start_session(
    state: &AppState,
    request: StartSessionRequest,
) -> Result<Session, ApiError> {
    debug!(drawer_id = %request.drawer_id, "start_session command");

    Ok(state
        .db()
        .sessions()
        .start(
            &request.drawer_id,
            request.opening_balance_cents,
            request.notes.as_deref(),
        )
        .await?)
}

/// Closes a shift and returns the final report with variance.
pub async fn close_session(
    state: &AppState,
    session_id: &str,
    request: CloseSessionRequest,
) -> Result<CloseSessionResponse, ApiError> {
    debug!(session_id = %session_id, "close_session command");

    let outcome = state
        .db()
        .sessions()
        .close(session_id, request.counted_cash_cents, request.notes.as_deref())
        .await?;

    Ok(CloseSessionResponse {
        session: outcome.session,
        report: outcome.report,
    })
}

pub async fn get_session(state: &AppState, session_id: &str) -> Result<Session, ApiError> {
    Ok(state.db().sessions().get(session_id).await?)
}

pub async fn list_sessions(
    state: &AppState,
    query: ListSessionsQuery,
) -> Result<Vec<Session>, ApiError> {
    Ok(state.db().sessions().list(&query.into()).await?)
}

/// Mid-shift snapshot for an open session, final figures for a closed one.
pub async fn session_report(
    state: &AppState,
    session_id: &str,
) -> Result<ReconciliationReport, ApiError> {
    Ok(state.db().sessions().report(session_id).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use medtill_db::{Database, DbConfig};

    async fn state_with_drawer() -> (AppState, String) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let drawer = db.drawers().create("clinic-1", "Main").await.unwrap();
        (AppState::new(db, 16), drawer.id)
    }

    fn start(drawer_id: &str, opening: Option<i64>) -> StartSessionRequest {
        StartSessionRequest {
            drawer_id: drawer_id.to_string(),
            opening_balance_cents: opening,
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_second_start_is_conflict() {
        let (state, drawer_id) = state_with_drawer().await;
        start_session(&state, start(&drawer_id, Some(5000))).await.unwrap();

        let err = start_session(&state, start(&drawer_id, Some(0)))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Conflict);
    }

    #[tokio::test]
    async fn test_close_carries_counted_cash_forward() {
        let (state, drawer_id) = state_with_drawer().await;
        let session = start_session(&state, start(&drawer_id, Some(5000))).await.unwrap();

        let closed = close_session(
            &state,
            &session.id,
            CloseSessionRequest {
                counted_cash_cents: 4900,
                notes: Some("short one coin".into()),
            },
        )
        .await
        .unwrap();
        assert_eq!(closed.session.status, SessionStatus::Closed);
        assert_eq!(closed.report.expected_cash_cents, 5000);
        assert_eq!(closed.report.variance_cents, Some(-100));

        let next = start_session(&state, start(&drawer_id, None)).await.unwrap();
        assert_eq!(next.opening_balance_cents, 4900);
    }

    #[tokio::test]
    async fn test_close_twice_and_unknown_session() {
        let (state, drawer_id) = state_with_drawer().await;
        let session = start_session(&state, start(&drawer_id, Some(0))).await.unwrap();
        let request = CloseSessionRequest {
            counted_cash_cents: 0,
            notes: None,
        };

        close_session(&state, &session.id, request.clone()).await.unwrap();
        let err = close_session(&state, &session.id, request).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Conflict);

        let err = get_session(&state, "no-such-session").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_list_filters_by_status() {
        let (state, drawer_id) = state_with_drawer().await;
        let first = start_session(&state, start(&drawer_id, Some(0))).await.unwrap();
        close_session(
            &state,
            &first.id,
            CloseSessionRequest {
                counted_cash_cents: 0,
                notes: None,
            },
        )
        .await
        .unwrap();
        start_session(&state, start(&drawer_id, None)).await.unwrap();

        let open = list_sessions(
            &state,
            ListSessionsQuery {
                status: Some(SessionStatus::Open),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(open.len(), 1);
        assert_ne!(open[0].id, first.id);

        let all = list_sessions(&state, ListSessionsQuery::default()).await.unwrap();
        assert_eq!(all.len(), 2);
    }
}
