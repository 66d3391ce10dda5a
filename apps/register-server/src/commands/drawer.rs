//! # Drawer Commands

use serde::Deserialize;
use tracing::debug;

use crate::error::ApiError;
use crate::state::AppState;
use medtill_core::{Drawer, DrawerSummary};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDrawerRequest {
    pub owner_id: String,
    pub name: String,
}

/// Query string parameters (snake_case).
#[derive(Debug, Clone, Deserialize)]
pub struct ListDrawersQuery {
    pub owner_id: String,
}

pub async fn create_drawer(
    state: &AppState,
    request: CreateDrawerRequest,
) -> Result<Drawer, ApiError> {
    debug!(owner_id = %request.owner_id, "create_drawer command");

    Ok(state
        .db()
        .drawers()
        .create(&request.owner_id, &request.name)
        .await?)
}

/// Drawers of one owner, each with its open session if any.
pub async fn list_drawers(
    state: &AppState,
    query: ListDrawersQuery,
) -> Result<Vec<DrawerSummary>, ApiError> {
    Ok(state.db().drawers().list(&query.owner_id).await?)
}
