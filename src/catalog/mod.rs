//! The catalog view-model: one client's view of the score collection.
//!
//! A [`CatalogSession`] holds the signed-in identity, the last loaded listing,
//! the pending upload and filter edits, and the preview selection. Every
//! mutation goes out to a collaborator ([`RecordStore`], [`ObjectStore`]) and
//! then replaces local state. The state lock is never held across a
//! collaborator call, so operations from the same client may overlap; loads
//! carry a ticket so a slow, older response cannot overwrite a newer one.

pub mod preview;
mod session;

pub use preview::{is_previewable, Preview};
pub use session::SessionManager;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;

use crate::identity::Identity;
use crate::object_store::{ObjectStore, ObjectStoreError};
use crate::storage::models::{DeleteOutcome, RecordKey, ScoreQuery, ScoreRecord};
use crate::storage::{DatabaseError, RecordStore};
use preview::PreviewSlot;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Not signed in")]
    NotSignedIn,
    #[error("Invalid file name: {0:?}")]
    InvalidName(String),
    #[error("Transfer failed: {0}")]
    Transfer(#[from] ObjectStoreError),
    #[error("Query failed: {0}")]
    Query(#[from] DatabaseError),
    #[error("{0} belongs to another user")]
    Forbidden(String),
    #[error("{0} cannot be previewed")]
    NotPreviewable(String),
    #[error("{0} is not in the current catalog view")]
    UnknownRecord(String),
}

/// Query breadth: the caller's own records, or every owner's.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    #[default]
    Mine,
    All,
}

/// A file picked for upload but not yet sent.
#[derive(Debug, Clone)]
pub struct PendingFile {
    pub name: String,
    pub data: Bytes,
}

#[derive(Debug, Clone, Default)]
pub struct PendingUpload {
    pub file: Option<PendingFile>,
    pub tag: String,
    pub is_public: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The view now holds this many records.
    Applied(usize),
    /// A newer load, or a sign-out, overtook this one; the view was left alone.
    Superseded,
}

/// Point-in-time copy of the view for rendering.
#[derive(Debug, Clone)]
pub struct CatalogSnapshot {
    pub user: Option<Identity>,
    pub scope: Scope,
    pub filter: String,
    pub records: Vec<ScoreRecord>,
    pub preview: Option<Preview>,
    pub alert: Option<String>,
    pub revision: u64,
}

#[derive(Default)]
struct ViewState {
    user: Option<Identity>,
    records: Vec<ScoreRecord>,
    scope: Scope,
    filter: String,
    pending: PendingUpload,
    preview: PreviewSlot,
    alert: Option<String>,
    issued_loads: u64,
    applied_load: u64,
    revision: u64,
}

/// A file name must be usable as the last segment of a blob path.
pub fn validate_file_name(name: &str) -> Result<(), CatalogError> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0']);
    if invalid {
        return Err(CatalogError::InvalidName(name.to_string()));
    }
    Ok(())
}

pub struct CatalogSession {
    records: Arc<dyn RecordStore>,
    blobs: Arc<dyn ObjectStore>,
    enforce_visibility: bool,
    state: Mutex<ViewState>,
    revisions: watch::Sender<u64>,
}

impl CatalogSession {
    pub fn new(records: Arc<dyn RecordStore>, blobs: Arc<dyn ObjectStore>) -> Self {
        let (revisions, _) = watch::channel(0);
        Self {
            records,
            blobs,
            enforce_visibility: false,
            state: Mutex::new(ViewState::default()),
            revisions,
        }
    }

    /// Limit `all`-scope loads to public records plus the caller's own.
    pub fn with_visibility_enforced(mut self, enforce: bool) -> Self {
        self.enforce_visibility = enforce;
        self
    }

    fn state(&self) -> MutexGuard<'_, ViewState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &mut ViewState) {
        state.revision += 1;
        self.revisions.send_replace(state.revision);
    }

    /// Revision counter bumped on every visible change.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.revisions.subscribe()
    }

    pub fn snapshot(&self) -> CatalogSnapshot {
        let state = self.state();
        CatalogSnapshot {
            user: state.user.clone(),
            scope: state.scope,
            filter: state.filter.clone(),
            records: state.records.clone(),
            preview: state.preview.current().cloned(),
            alert: state.alert.clone(),
            revision: state.revision,
        }
    }

    pub fn current_user(&self) -> Option<Identity> {
        self.state().user.clone()
    }

    // ========================================================================
    // Session
    // ========================================================================

    /// Swap the signed-in identity. Switching to a different user (or to none)
    /// drops everything that belonged to the previous one.
    pub fn replace_user(&self, user: Option<Identity>) {
        let mut state = self.state();
        if state.user == user {
            return;
        }
        // In-flight loads for the previous user are discarded by the ticket check.
        let (issued_loads, scope, revision) = (state.issued_loads, state.scope, state.revision);
        *state = ViewState {
            user,
            scope,
            issued_loads,
            applied_load: issued_loads,
            revision,
            ..Default::default()
        };
        self.publish(&mut state);
    }

    /// Record a failure the user should be told about.
    pub fn raise_alert(&self, message: impl Into<String>) {
        let mut state = self.state();
        state.alert = Some(message.into());
        self.publish(&mut state);
    }

    pub fn dismiss_alert(&self) {
        let mut state = self.state();
        if state.alert.take().is_some() {
            self.publish(&mut state);
        }
    }

    // ========================================================================
    // Pending edits
    // ========================================================================

    pub fn select_file(&self, name: impl Into<String>, data: Bytes) {
        self.state().pending.file = Some(PendingFile {
            name: name.into(),
            data,
        });
    }

    pub fn set_tag(&self, tag: impl Into<String>) {
        self.state().pending.tag = tag.into();
    }

    pub fn set_public(&self, is_public: bool) {
        self.state().pending.is_public = is_public;
    }

    pub fn pending(&self) -> PendingUpload {
        self.state().pending.clone()
    }

    /// Change the held tag filter. Takes effect on the next load.
    pub fn set_filter(&self, filter: impl Into<String>) {
        self.state().filter = filter.into();
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Upload the pending file. Silently does nothing without a signed-in
    /// user or a selected file. Any failing step aborts the rest; a blob
    /// written before a later failure is left in place, and so are the
    /// pending edits.
    pub async fn upload(&self) -> Result<Option<ScoreRecord>, CatalogError> {
        let pending = self.pending();
        let Some(record) = self.store_upload(pending).await? else {
            return Ok(None);
        };
        self.state().pending = PendingUpload::default();
        self.reload().await?;
        Ok(Some(record))
    }

    /// Upload a self-contained request without reading or touching the
    /// pending edits. Fields the caller left unset keep their defaults
    /// (empty tag, private).
    pub async fn upload_pending(
        &self,
        pending: PendingUpload,
    ) -> Result<Option<ScoreRecord>, CatalogError> {
        let Some(record) = self.store_upload(pending).await? else {
            return Ok(None);
        };
        self.reload().await?;
        Ok(Some(record))
    }

    async fn store_upload(
        &self,
        pending: PendingUpload,
    ) -> Result<Option<ScoreRecord>, CatalogError> {
        let (Some(user), Some(file)) = (self.current_user(), pending.file) else {
            return Ok(None);
        };
        validate_file_name(&file.name)?;

        let key = RecordKey::new(&user.user_id, &file.name);
        let blob_key = key.blob_key();
        let byte_size = file.data.len() as u64;

        self.blobs.put(&blob_key, file.data).await?;
        let url = self.blobs.retrieval_url(&blob_key).await?;

        let record = ScoreRecord {
            owner_id: key.owner_id.clone(),
            name: key.name.clone(),
            tag: pending.tag,
            is_public: pending.is_public,
            url,
            mime_type: mime_guess::from_path(&key.name)
                .first_or_octet_stream()
                .to_string(),
            byte_size,
            uploaded_at: Utc::now(),
        };
        self.records.upsert_document(&record).await?;

        tracing::debug!(key = %key, byte_size, "Uploaded score");
        Ok(Some(record))
    }

    /// Query the store under `scope` and the held tag filter, then replace
    /// the view with the result.
    pub async fn load(&self, scope: Scope) -> Result<LoadOutcome, CatalogError> {
        let (ticket, user, filter) = {
            let mut state = self.state();
            let user = state.user.clone().ok_or(CatalogError::NotSignedIn)?;
            state.issued_loads += 1;
            (state.issued_loads, user, state.filter.clone())
        };

        let query = ScoreQuery {
            owner_id: (scope == Scope::Mine).then(|| user.user_id.clone()),
            tag_contains: (!filter.is_empty()).then_some(filter),
            visible_to: (self.enforce_visibility && scope == Scope::All)
                .then(|| user.user_id.clone()),
        };
        let records = self.records.query_documents(&query).await?;

        let mut state = self.state();
        let same_user = state.user.as_ref().map(|u| &u.user_id) == Some(&user.user_id);
        if ticket <= state.applied_load || !same_user {
            tracing::debug!(ticket, "Discarding superseded catalog load");
            return Ok(LoadOutcome::Superseded);
        }

        state.applied_load = ticket;
        state.records = records;
        let count = state.records.len();
        self.publish(&mut state);
        Ok(LoadOutcome::Applied(count))
    }

    /// Load again under the held scope.
    pub async fn reload(&self) -> Result<LoadOutcome, CatalogError> {
        let scope = self.state().scope;
        self.load(scope).await
    }

    /// Switch scope and load under it.
    pub async fn set_scope(&self, scope: Scope) -> Result<LoadOutcome, CatalogError> {
        self.state().scope = scope;
        self.load(scope).await
    }

    /// Delete the caller's record called `name`. The store refuses if the
    /// record belongs to someone else. Only the entry with the matching
    /// owner and name leaves the view.
    pub async fn delete(&self, name: &str) -> Result<DeleteOutcome, CatalogError> {
        let user = self.current_user().ok_or(CatalogError::NotSignedIn)?;
        validate_file_name(name)?;
        let key = RecordKey::new(&user.user_id, name);

        let outcome = self
            .records
            .delete_document(&key, &user.user_id)
            .await?;
        if outcome == DeleteOutcome::NotOwner {
            tracing::warn!(key = %key, user_id = %user.user_id, "Refused delete of foreign record");
            return Err(CatalogError::Forbidden(key.to_string()));
        }

        {
            let mut state = self.state();
            state.records.retain(|r| r.key() != key);
            if state.preview.is_showing(&key) {
                state.preview.clear();
            }
            self.publish(&mut state);
        }

        if outcome == DeleteOutcome::Deleted {
            if let Err(e) = self.blobs.delete(&key.blob_key()).await {
                tracing::warn!(key = %key, error = %e, "Failed to delete score blob");
            }
            tracing::debug!(key = %key, "Deleted score");
        }
        Ok(outcome)
    }

    // ========================================================================
    // Preview
    // ========================================================================

    /// Preview a record from the current view.
    pub fn select_preview(&self, key: &RecordKey) -> Result<Preview, CatalogError> {
        if !is_previewable(&key.name) {
            return Err(CatalogError::NotPreviewable(key.name.clone()));
        }
        let mut state = self.state();
        let url = state
            .records
            .iter()
            .find(|r| &r.key() == key)
            .map(|r| r.url.clone())
            .ok_or_else(|| CatalogError::UnknownRecord(key.to_string()))?;

        state.preview.select(key.clone(), url);
        let preview = state.preview.current().cloned();
        self.publish(&mut state);
        preview.ok_or_else(|| CatalogError::UnknownRecord(key.to_string()))
    }

    /// The renderer decoded `url` and found `pages` pages.
    pub fn record_page_count(&self, url: &str, pages: u32) -> bool {
        let mut state = self.state();
        let applied = state.preview.record_page_count(url, pages);
        if applied {
            self.publish(&mut state);
        }
        applied
    }

    pub fn clear_preview(&self) {
        let mut state = self.state();
        state.preview.clear();
        self.publish(&mut state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_file_name() {
        assert!(validate_file_name("song.pdf").is_ok());
        assert!(validate_file_name("Autumn Leaves (Bb).pdf").is_ok());
        assert!(validate_file_name("").is_err());
        assert!(validate_file_name("..").is_err());
        assert!(validate_file_name("a/b.pdf").is_err());
        assert!(validate_file_name("a\\b.pdf").is_err());
    }
}
