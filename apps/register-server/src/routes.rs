//! # HTTP Routes
//!
//! | Method | Path | Command |
//! |--------|------|---------|
//! | `GET`  | `/health` | database reachable |
//! | `POST` | `/drawers` | [`drawer::create_drawer`] |
//! | `GET`  | `/drawers?owner_id=` | [`drawer::list_drawers`] |
//! | `POST` | `/sessions` | [`session::start_session`] |
//! | `GET`  | `/sessions?drawer_id=&status=&limit=` | [`session::list_sessions`] |
//! | `GET`  | `/sessions/{id}` | [`session::get_session`] |
//! | `POST` | `/sessions/{id}/sales` | [`sale::commit_sale`] (201, or 200 on replay) |
//! | `GET`  | `/sessions/{id}/sales` | [`sale::list_session_sales`] |
//! | `POST` | `/sessions/{id}/close` | [`session::close_session`] |
//! | `GET`  | `/sessions/{id}/report` | [`session::session_report`] |
//! | `GET`  | `/sales/{id}` | [`sale::get_sale`] |
//! | `GET`  | `/sales/by-key/{key}` | [`sale::find_sale_by_key`] |
//!
//! Handlers only extract and respond; all behavior lives in
//! [`crate::commands`].

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

use crate::commands::{drawer, sale, session};
use crate::error::ApiError;
use crate::state::AppState;

/// Header carrying the client's idempotency key for a sale commit.
pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

/// Builds the register API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        // Drawers
        .route("/drawers", get(list_drawers).post(create_drawer))
        // Sessions
        .route("/sessions", get(list_sessions).post(start_session))
        .route("/sessions/{id}", get(get_session))
        .route("/sessions/{id}/sales", get(list_session_sales).post(commit_sale))
        .route("/sessions/{id}/close", post(close_session))
        .route("/sessions/{id}/report", get(session_report))
        // Sales
        .route("/sales/{id}", get(get_sale))
        .route("/sales/by-key/{key}", get(find_sale_by_key))
        .with_state(state)
}

// ─── Health ──────────────────────────────────────────────────────────────────

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    if state.db().health_check().await {
        (StatusCode::OK, Json(json!({ "status": "ok" })))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "unavailable" })),
        )
    }
}

// ─── Drawers ─────────────────────────────────────────────────────────────────

async fn create_drawer(
    State(state): State<AppState>,
    body: Result<Json<drawer::CreateDrawerRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = body?;
    let created = drawer::create_drawer(&state, body).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn list_drawers(
    State(state): State<AppState>,
    query: Result<Query<drawer::ListDrawersQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) = query?;
    Ok(Json(drawer::list_drawers(&state, query).await?))
}

// ─── Sessions ────────────────────────────────────────────────────────────────

async fn start_session(
    State(state): State<AppState>,
    body: Result<Json<session::StartSessionRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = body?;
    let started = session::start_session(&state, body).await?;
    Ok((StatusCode::CREATED, Json(started)))
}

async fn list_sessions(
    State(state): State<AppState>,
    query: Result<Query<session::ListSessionsQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) = query?;
    Ok(Json(session::list_sessions(&state, query).await?))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(session::get_session(&state, &id).await?))
}

async fn close_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<session::CloseSessionRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = body?;
    Ok(Json(session::close_session(&state, &id, body).await?))
}

async fn session_report(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(session::session_report(&state, &id).await?))
}

// ─── Sales ───────────────────────────────────────────────────────────────────

async fn commit_sale(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Result<Json<sale::CommitSaleBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = body?;
    let header_key = match headers.get(IDEMPOTENCY_KEY_HEADER) {
        Some(value) => Some(
            value
                .to_str()
                .map_err(|_| ApiError::validation("Idempotency-Key must be visible ASCII"))?
                .to_string(),
        ),
        None => None,
    };

    let committed = sale::commit_sale(&state, &id, body, header_key).await?;
    let status = if committed.replayed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(committed)))
}

async fn list_session_sales(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(sale::list_session_sales(&state, &id).await?))
}

async fn get_sale(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(sale::get_sale(&state, &id).await?))
}

async fn find_sale_by_key(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(sale::find_sale_by_key(&state, &key).await?))
}
