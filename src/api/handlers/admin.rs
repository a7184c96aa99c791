use axum::extract::State;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

use crate::api::response::{ApiError, JSend};
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct PurgeResponse {
    pub scores_deleted: u64,
    pub accounts_deleted: u64,
    pub sessions_deleted: u64,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn health() -> Json<JSend<HealthResponse>> {
    JSend::success(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn admin_purge(
    State(state): State<Arc<AppState>>,
) -> Result<Json<JSend<PurgeResponse>>, ApiError> {
    let stats = state
        .db
        .purge_all()
        .map_err(|e| ApiError::internal(e.to_string()))?;
    let live = state.sessions.clear().await;

    tracing::warn!(
        scores = stats.scores,
        accounts = stats.accounts,
        sessions = stats.sessions,
        live_sessions = live,
        "Purged all data"
    );

    Ok(JSend::success(PurgeResponse {
        scores_deleted: stats.scores,
        accounts_deleted: stats.accounts,
        sessions_deleted: stats.sessions,
    }))
}
