//! Shared test helpers for score-shelf unit tests.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::{AccountConfig, Config, NodeConfig, StorageConfig};
use crate::identity::AccountDirectory;
use crate::object_store::LocalStore;
use crate::registry::SessionRegistry;
use crate::storage::Database;
use crate::AppState;

/// Create a test AppState with a temporary database and local object store.
pub fn test_state(temp_dir: &tempfile::TempDir) -> Arc<AppState> {
    let data_dir = temp_dir.path().join("data");
    let files_dir = temp_dir.path().join("files");

    let config = Config {
        node: NodeConfig {
            bind_address: "127.0.0.1:0".to_string(),
            data_dir: data_dir.to_string_lossy().to_string(),
            public_base_url: "http://localhost:8080".to_string(),
        },
        storage: StorageConfig::default(),
        accounts: AccountConfig {
            min_secret_length: 6,
            pbkdf2_iterations: 1_000,
        },
        enforce_visibility: false,
        test_mode: true,
        max_upload_size: 10 * 1024 * 1024, // 10MB for tests
        session_idle_ttl: std::time::Duration::from_secs(60),
    };

    let db = Database::open(&data_dir).expect("Failed to open test database");
    let object_store: Arc<dyn crate::object_store::ObjectStore> = Arc::new(
        LocalStore::new(&files_dir, &config.node.public_base_url)
            .expect("Failed to create test object store"),
    );
    let identity = Arc::new(AccountDirectory::new(db.clone(), config.accounts.clone()));

    let sessions = SessionRegistry::new(
        identity,
        Arc::new(db.clone()),
        Arc::clone(&object_store),
        config.enforce_visibility,
        CancellationToken::new(),
    );

    Arc::new(AppState {
        config,
        db,
        object_store,
        sessions,
    })
}
