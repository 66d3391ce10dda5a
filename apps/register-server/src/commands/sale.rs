//! # Sale Commands
//!
//! ## Idempotency
//! ```text
//! POST /sessions/{id}/sales
//!   Idempotency-Key: k1          ─┐
//!   { ..., "idempotencyKey": k1 } ─┴─► must agree when both are sent
//!
//! first commit with k1   ──► 201, replayed = false, broadcast
//! any later commit, k1   ──► 200, replayed = true, original sale, no broadcast
//! ```

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::state::AppState;
use medtill_core::{Cart, CommittedSale, Tender};
use medtill_db::CommitRequest;

/// Body of a commit request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitSaleBody {
    pub cart: Cart,
    pub tender: Tender,
    #[serde(default)]
    pub customer_ref: Option<String>,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

/// Picks the idempotency key from the header and the body.
fn resolve_key(header: Option<String>, body: Option<String>) -> Result<Option<String>, ApiError> {
    match (header, body) {
        (Some(h), Some(b)) if h != b => Err(ApiError::validation(
            "Idempotency-Key header does not match idempotencyKey in body",
        )),
        (Some(h), _) => Ok(Some(h)),
        (None, b) => Ok(b),
    }
}

/// Commits a sale against an open session.
///
/// Newly committed sales are announced on the sale channel.
pub async fn commit_sale(
    state: &AppState,
    session_id: &str,
    body: CommitSaleBody,
    header_key: Option<String>,
) -> Result<CommittedSale, ApiError> {
    let idempotency_key = resolve_key(header_key, body.idempotency_key)?;

    debug!(
        session_id = %session_id,
        idempotency_key = ?idempotency_key,
        lines = body.cart.lines.len(),
        "commit_sale command"
    );

    let request = CommitRequest {
        session_id: session_id.to_string(),
        cart: body.cart,
        tender: body.tender,
        customer_ref: body.customer_ref,
        idempotency_key,
    };

    let committed = state.db().sales().commit(&request).await.map_err(|e| {
        warn!(session_id = %session_id, error = %e, "Sale commit failed");
        ApiError::from(e)
    })?;

    if !committed.replayed {
        state.announce(&committed);
    }

    Ok(committed)
}

pub async fn get_sale(state: &AppState, sale_id: &str) -> Result<CommittedSale, ApiError> {
    Ok(state.db().sales().get_sale(sale_id).await?)
}

/// Resolves a submission whose outcome the client never saw.
pub async fn find_sale_by_key(state: &AppState, key: &str) -> Result<CommittedSale, ApiError> {
    state
        .db()
        .sales()
        .find_by_idempotency_key(key)
        .await?
        .ok_or_else(|| ApiError::not_found("Sale", key))
}

/// Sales of a session in commit order.
pub async fn list_session_sales(
    state: &AppState,
    session_id: &str,
) -> Result<Vec<CommittedSale>, ApiError> {
    // Distinguish an unknown session from one without sales
    state.db().sessions().get(session_id).await?;
    Ok(state.db().sales().list_for_session(session_id).await?)
}
