use axum::extract::{Multipart, Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::CurrentClient;
use crate::api::response::{ApiError, AppJson, AppQuery, JSend, Pagination};
use crate::catalog::{is_previewable, CatalogSnapshot, PendingFile, PendingUpload, Preview, Scope};
use crate::identity::Identity;
use crate::storage::models::{DeleteOutcome, RecordKey, ScoreRecord};
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ScoreResponse {
    pub owner_id: String,
    pub name: String,
    pub tag: String,
    pub is_public: bool,
    pub url: String,
    pub mime_type: String,
    pub byte_size: u64,
    pub uploaded_at: String,
    pub can_delete: bool,
    pub previewable: bool,
}

#[derive(Debug, Serialize)]
pub struct CatalogResponse {
    pub user: Option<Identity>,
    pub scope: Scope,
    pub filter: String,
    pub items: Vec<ScoreResponse>,
    pub pagination: Pagination,
    pub preview: Option<Preview>,
    pub alert: Option<String>,
    pub revision: u64,
}

#[derive(Debug, Deserialize)]
pub struct ViewParams {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

fn default_limit() -> u32 {
    50
}

#[derive(Debug, Default, Deserialize)]
pub struct LoadRequest {
    #[serde(default)]
    pub scope: Option<Scope>,
    #[serde(default)]
    pub filter: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub deleted: bool,
}

#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    pub owner_id: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct PageCountRequest {
    pub url: String,
    pub page_count: u32,
}

#[derive(Debug, Serialize)]
pub struct PageCountResponse {
    pub applied: bool,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn get_catalog(
    client: CurrentClient,
    AppQuery(params): AppQuery<ViewParams>,
) -> Result<Json<JSend<CatalogResponse>>, ApiError> {
    if params.limit == 0 {
        return Err(ApiError::bad_request("limit must be greater than 0"));
    }
    let snapshot = client.session.catalog.snapshot();
    Ok(JSend::success(catalog_to_response(
        snapshot,
        params.offset,
        params.limit,
    )))
}

/// Apply the filter and/or scope from the body, then load.
pub async fn load_catalog(
    client: CurrentClient,
    AppJson(req): AppJson<LoadRequest>,
) -> Result<Json<JSend<CatalogResponse>>, ApiError> {
    let catalog = &client.session.catalog;
    if let Some(filter) = req.filter {
        catalog.set_filter(filter);
    }

    let outcome = match req.scope {
        Some(scope) => catalog.set_scope(scope).await,
        None => catalog.reload().await,
    };
    if let Err(e) = outcome {
        catalog.raise_alert(e.to_string());
        return Err(e.into());
    }

    let snapshot = catalog.snapshot();
    let total = snapshot.records.len() as u32;
    Ok(JSend::success(catalog_to_response(snapshot, 0, total.max(1))))
}

/// Each request carries its own file, tag and visibility. Missing fields
/// default to an empty tag and a private record.
pub async fn upload_score(
    State(state): State<Arc<AppState>>,
    client: CurrentClient,
    mut multipart: Multipart,
) -> Result<Json<JSend<ScoreResponse>>, ApiError> {
    let mut pending = PendingUpload::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart data: {e}")))?
    {
        let field_name = field.name().unwrap_or("").to_string();

        match field_name.as_str() {
            "file" => {
                let file_name = field
                    .file_name()
                    .map(|s| s.to_string())
                    .ok_or_else(|| ApiError::bad_request("file field must carry a file name"))?;

                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Failed to read file: {e}")))?;

                if data.len() as u64 > state.config.max_upload_size {
                    return Err(ApiError::payload_too_large(format!(
                        "File exceeds maximum upload size of {} bytes",
                        state.config.max_upload_size
                    )));
                }

                pending.file = Some(PendingFile {
                    name: file_name,
                    data,
                });
            }
            "tag" => {
                pending.tag = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Invalid tag: {e}")))?;
            }
            "is_public" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Invalid is_public: {e}")))?;
                pending.is_public = parse_flag(&text).ok_or_else(|| {
                    ApiError::bad_request(format!("is_public must be a boolean, got '{text}'"))
                })?;
            }
            _ => {
                // Ignore unknown fields
            }
        }
    }

    if pending.file.is_none() {
        return Err(ApiError::bad_request("file field is required"));
    }

    let catalog = &client.session.catalog;
    let user = catalog
        .current_user()
        .ok_or_else(|| ApiError::unauthorized("Not signed in"))?;
    let record = catalog
        .upload_pending(pending)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Not signed in"))?;

    Ok(JSend::success(score_to_response(&record, &user.user_id)))
}

pub async fn delete_score(
    client: CurrentClient,
    Path(name): Path<String>,
) -> Result<Json<JSend<DeleteResponse>>, ApiError> {
    let outcome = client.session.catalog.delete(&name).await?;

    Ok(JSend::success(DeleteResponse {
        deleted: outcome == DeleteOutcome::Deleted,
    }))
}

pub async fn select_preview(
    client: CurrentClient,
    AppJson(req): AppJson<PreviewRequest>,
) -> Result<Json<JSend<Preview>>, ApiError> {
    let preview = client
        .session
        .catalog
        .select_preview(&RecordKey::new(req.owner_id, req.name))?;

    Ok(JSend::success(preview))
}

pub async fn record_page_count(
    client: CurrentClient,
    AppJson(req): AppJson<PageCountRequest>,
) -> Json<JSend<PageCountResponse>> {
    let applied = client
        .session
        .catalog
        .record_page_count(&req.url, req.page_count);

    JSend::success(PageCountResponse { applied })
}

pub async fn clear_preview(client: CurrentClient) -> Json<JSend<()>> {
    client.session.catalog.clear_preview();
    JSend::success(())
}

// ============================================================================
// Helpers
// ============================================================================

fn parse_flag(text: &str) -> Option<bool> {
    match text.trim() {
        "true" | "1" | "on" => Some(true),
        "false" | "0" | "" => Some(false),
        _ => None,
    }
}

fn score_to_response(score: &ScoreRecord, viewer_id: &str) -> ScoreResponse {
    ScoreResponse {
        owner_id: score.owner_id.clone(),
        name: score.name.clone(),
        tag: score.tag.clone(),
        is_public: score.is_public,
        url: score.url.clone(),
        mime_type: score.mime_type.clone(),
        byte_size: score.byte_size,
        uploaded_at: score.uploaded_at.to_rfc3339(),
        can_delete: score.owner_id == viewer_id,
        previewable: is_previewable(&score.name),
    }
}

fn catalog_to_response(snapshot: CatalogSnapshot, offset: u32, limit: u32) -> CatalogResponse {
    let viewer_id = snapshot
        .user
        .as_ref()
        .map(|u| u.user_id.clone())
        .unwrap_or_default();
    let total = snapshot.records.len() as u64;
    let items = snapshot
        .records
        .iter()
        .skip(offset as usize)
        .take(limit as usize)
        .map(|score| score_to_response(score, &viewer_id))
        .collect();

    CatalogResponse {
        user: snapshot.user,
        scope: snapshot.scope,
        filter: snapshot.filter,
        items,
        pagination: Pagination {
            limit,
            offset,
            total,
        },
        preview: snapshot.preview,
        alert: snapshot.alert,
        revision: snapshot.revision,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("true"), Some(true));
        assert_eq!(parse_flag(" on "), Some(true));
        assert_eq!(parse_flag(""), Some(false));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("yes please"), None);
    }
}
