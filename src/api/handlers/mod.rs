mod admin;
mod auth;
mod blobs;
mod catalog;

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts};

use crate::api::response::ApiError;
use crate::registry::ClientSession;
use crate::AppState;

pub use admin::{admin_purge, health};
pub use auth::{login, logout, sign_up};
pub use blobs::serve_blob;
pub use catalog::{
    clear_preview, delete_score, get_catalog, load_catalog, record_page_count, select_preview,
    upload_score,
};

/// The signed-in client named by the request's bearer token.
pub struct CurrentClient {
    pub token: String,
    pub session: Arc<ClientSession>,
}

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentClient {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, ApiError> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::unauthorized("Missing bearer token"))?
            .to_string();

        let session = state.sessions.resume(&token).await?;
        Ok(CurrentClient { token, session })
    }
}
