//! score-shelf - a sheet-music catalog
//!
//! Users upload, tag, browse and preview their scores. This crate provides:
//! - A per-client catalog view-model synchronised with a remote record store
//! - Email/secret accounts with bearer sessions
//! - Swappable blob storage backends (local filesystem, GCS)
//! - redb embedded database for score metadata, accounts and sessions
//! - REST API with multipart upload support

pub mod api;
pub mod catalog;
pub mod config;
pub mod identity;
pub mod object_store;
pub mod registry;
pub mod storage;
#[cfg(test)]
pub mod testutil;

use std::sync::Arc;

use config::Config;
use registry::SessionRegistry;
use storage::Database;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub object_store: Arc<dyn object_store::ObjectStore>,
    pub sessions: SessionRegistry,
}
