//! Live client sessions, keyed by bearer token.
//!
//! Every signed-in client owns an [`AuthClient`], a [`CatalogSession`] and the
//! [`SessionManager`] connecting the two. Entries are created on sign-up or
//! login, recreated lazily from a persisted token after a restart, and
//! dropped on logout or once idle for longer than the configured TTL.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::catalog::{CatalogSession, SessionManager};
use crate::identity::{AuthClient, AuthError, IdentityProvider, Session};
use crate::object_store::ObjectStore;
use crate::storage::RecordStore;

pub struct ClientSession {
    pub auth: AuthClient,
    pub catalog: Arc<CatalogSession>,
    _manager: SessionManager,
}

/// A registered client and when a request last reached it.
struct LiveClient {
    session: Arc<ClientSession>,
    last_seen: Mutex<Instant>,
}

impl LiveClient {
    fn new(session: Arc<ClientSession>) -> Self {
        Self {
            session,
            last_seen: Mutex::new(Instant::now()),
        }
    }

    fn touch(&self) -> Arc<ClientSession> {
        *self.last_seen.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
        Arc::clone(&self.session)
    }

    fn idle_for(&self) -> Duration {
        self.last_seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .elapsed()
    }
}

pub struct SessionRegistry {
    identity: Arc<dyn IdentityProvider>,
    records: Arc<dyn RecordStore>,
    blobs: Arc<dyn ObjectStore>,
    enforce_visibility: bool,
    shutdown: CancellationToken,
    clients: RwLock<HashMap<String, LiveClient>>,
}

impl SessionRegistry {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        records: Arc<dyn RecordStore>,
        blobs: Arc<dyn ObjectStore>,
        enforce_visibility: bool,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            identity,
            records,
            blobs,
            enforce_visibility,
            shutdown,
            clients: RwLock::new(HashMap::new()),
        }
    }

    fn open_client(&self) -> ClientSession {
        let auth = AuthClient::new(Arc::clone(&self.identity));
        let catalog = Arc::new(
            CatalogSession::new(Arc::clone(&self.records), Arc::clone(&self.blobs))
                .with_visibility_enforced(self.enforce_visibility),
        );
        let manager = SessionManager::spawn(auth.subscribe(), Arc::clone(&catalog), &self.shutdown);
        ClientSession {
            auth,
            catalog,
            _manager: manager,
        }
    }

    async fn register(&self, session: &Session, client: ClientSession) -> Arc<ClientSession> {
        // Set the user right away so requests racing the manager's first
        // notification already see a signed-in catalog.
        client
            .catalog
            .replace_user(Some(session.identity.clone()));

        let client = Arc::new(client);
        self.clients
            .write()
            .await
            .insert(session.token.clone(), LiveClient::new(Arc::clone(&client)));
        client
    }

    pub async fn sign_up(
        &self,
        email: &str,
        secret: &str,
    ) -> Result<(Session, Arc<ClientSession>), AuthError> {
        let client = self.open_client();
        let session = client.auth.sign_up(email, secret).await?;
        let client = self.register(&session, client).await;
        Ok((session, client))
    }

    pub async fn login(
        &self,
        email: &str,
        secret: &str,
    ) -> Result<(Session, Arc<ClientSession>), AuthError> {
        let client = self.open_client();
        let session = client.auth.login(email, secret).await?;
        let client = self.register(&session, client).await;
        Ok((session, client))
    }

    /// Find the live session for `token`, restoring it from the identity
    /// provider if this process has not seen it yet.
    pub async fn resume(&self, token: &str) -> Result<Arc<ClientSession>, AuthError> {
        if let Some(client) = self.clients.read().await.get(token) {
            return Ok(client.touch());
        }

        let client = self.open_client();
        let identity = client.auth.restore(token).await?;
        client.catalog.replace_user(Some(identity));

        let mut clients = self.clients.write().await;
        let client = clients
            .entry(token.to_string())
            .or_insert_with(|| LiveClient::new(Arc::new(client)));
        Ok(client.touch())
    }

    /// Sign out. Always succeeds locally.
    pub async fn logout(&self, token: &str) {
        let client = self.clients.write().await.remove(token);
        match client {
            Some(client) => client.session.auth.logout().await,
            None => {
                if let Err(e) = self.identity.logout(token).await {
                    tracing::warn!(error = %e, "Failed to revoke session");
                }
            }
        }
    }

    /// Forget every live session without revoking tokens.
    pub async fn clear(&self) -> usize {
        let mut clients = self.clients.write().await;
        let count = clients.len();
        clients.clear();
        count
    }

    /// Drop clients no request has reached for `max_idle`. Their tokens stay
    /// valid; the next request rebuilds the client through [`Self::resume`].
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let mut clients = self.clients.write().await;
        let before = clients.len();
        clients.retain(|_, client| client.idle_for() < max_idle);
        let evicted = before - clients.len();
        if evicted > 0 {
            tracing::debug!(evicted, remaining = clients.len(), "Evicted idle client sessions");
        }
        evicted
    }

    /// Sweep idle clients every `interval` until shutdown.
    pub async fn run_idle_sweeper(&self, max_idle: Duration, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    self.evict_idle(max_idle).await;
                }
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.clients.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.clients.read().await.is_empty()
    }
}
