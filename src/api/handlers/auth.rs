use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::CurrentClient;
use crate::api::response::{ApiError, AppJson, JSend};
use crate::identity::{Identity, Session};
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub secret: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub user: Identity,
}

impl From<Session> for SessionResponse {
    fn from(session: Session) -> Self {
        Self {
            token: session.token,
            user: session.identity,
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn sign_up(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<Credentials>,
) -> Result<Json<JSend<SessionResponse>>, ApiError> {
    let (session, _) = state
        .sessions
        .sign_up(&req.email, &req.secret)
        .await?;

    tracing::debug!(user_id = %session.identity.user_id, "Signed up");
    Ok(JSend::success(session.into()))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<Credentials>,
) -> Result<Json<JSend<SessionResponse>>, ApiError> {
    let (session, _) = state
        .sessions
        .login(&req.email, &req.secret)
        .await?;

    Ok(JSend::success(session.into()))
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    client: CurrentClient,
) -> Json<JSend<()>> {
    state.sessions.logout(&client.token).await;
    JSend::success(())
}
