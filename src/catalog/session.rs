use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{CatalogSession, Scope};
use crate::identity::Identity;

/// Follows one client's session-change notifications for as long as it lives.
///
/// Each notification replaces the catalog's user; a sign-in also triggers an
/// unscoped load. Dropping the manager, or cancelling the shutdown token it
/// was spawned with, unsubscribes.
pub struct SessionManager {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl SessionManager {
    pub fn spawn(
        mut changes: watch::Receiver<Option<Identity>>,
        catalog: Arc<CatalogSession>,
        shutdown: &CancellationToken,
    ) -> Self {
        let cancel = shutdown.child_token();
        let stopped = cancel.clone();

        let handle = tokio::spawn(async move {
            let initial = changes.borrow_and_update().clone();
            apply(&catalog, initial).await;

            loop {
                tokio::select! {
                    biased;
                    _ = stopped.cancelled() => break,
                    changed = changes.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let identity = changes.borrow_and_update().clone();
                        apply(&catalog, identity).await;
                    }
                }
            }
            tracing::debug!("Session manager unsubscribed");
        });

        Self {
            cancel,
            handle: Some(handle),
        }
    }

    /// Unsubscribe and wait for the task to finish.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn apply(catalog: &CatalogSession, identity: Option<Identity>) {
    let signed_in = identity.is_some();
    catalog.replace_user(identity);
    if signed_in {
        if let Err(e) = catalog.load(Scope::All).await {
            tracing::warn!(error = %e, "Initial catalog load failed");
            catalog.raise_alert(e.to_string());
        }
    }
}
