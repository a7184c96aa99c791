//! Identity: who is signed in, and notifications when that changes.
//!
//! [`IdentityProvider`] is the account service (sign-up, login, logout,
//! token resolution). [`AuthClient`] is one client's view of it: it remembers
//! the client's token and broadcasts every sign-in/sign-out transition on a
//! `watch` channel that the catalog's session manager subscribes to.

mod directory;

pub use directory::AccountDirectory;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;

use crate::storage::DatabaseError;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid email address: {0}")]
    InvalidEmail(String),
    #[error("Email is already registered: {0}")]
    EmailTaken(String),
    #[error("Secret must be at least {0} characters long")]
    WeakSecret(usize),
    #[error("Invalid email or secret")]
    InvalidCredentials,
    #[error("Session is invalid or has been revoked")]
    InvalidSession,
    #[error("Identity backend error: {0}")]
    Backend(String),
}

impl From<DatabaseError> for AuthError {
    fn from(e: DatabaseError) -> Self {
        AuthError::Backend(e.to_string())
    }
}

/// An authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub user_id: String,
    pub email: String,
}

/// A signed-in session and the bearer token that names it.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub identity: Identity,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Register and sign in. Fails if the email is taken or the secret violates policy.
    async fn create_account(&self, email: &str, secret: &str) -> Result<Session, AuthError>;
    async fn login(&self, email: &str, secret: &str) -> Result<Session, AuthError>;
    async fn logout(&self, token: &str) -> Result<(), AuthError>;
    async fn resolve(&self, token: &str) -> Result<Option<Identity>, AuthError>;
}

/// Per-client handle on an [`IdentityProvider`].
pub struct AuthClient {
    provider: Arc<dyn IdentityProvider>,
    token: Mutex<Option<String>>,
    changes: watch::Sender<Option<Identity>>,
}

impl AuthClient {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        let (changes, _) = watch::channel(None);
        Self {
            provider,
            token: Mutex::new(None),
            changes,
        }
    }

    /// Session-change notifications, starting from the current value.
    pub fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.changes.subscribe()
    }

    pub fn current(&self) -> Option<Identity> {
        self.changes.borrow().clone()
    }

    pub fn token(&self) -> Option<String> {
        self.token.lock().ok().and_then(|t| t.clone())
    }

    pub async fn sign_up(&self, email: &str, secret: &str) -> Result<Session, AuthError> {
        let session = self.provider.create_account(email, secret).await?;
        self.begin(&session);
        Ok(session)
    }

    pub async fn login(&self, email: &str, secret: &str) -> Result<Session, AuthError> {
        let session = self.provider.login(email, secret).await?;
        self.begin(&session);
        Ok(session)
    }

    /// Resume a session from a previously issued token.
    pub async fn restore(&self, token: &str) -> Result<Identity, AuthError> {
        let identity = self
            .provider
            .resolve(token)
            .await?
            .ok_or(AuthError::InvalidSession)?;
        self.begin(&Session {
            token: token.to_string(),
            identity: identity.clone(),
        });
        Ok(identity)
    }

    /// Always succeeds locally; a failed revocation upstream is only logged.
    pub async fn logout(&self) {
        let token = self.token.lock().ok().and_then(|mut t| t.take());
        if let Some(token) = token {
            if let Err(e) = self.provider.logout(&token).await {
                tracing::warn!(error = %e, "Failed to revoke session");
            }
        }
        self.changes.send_replace(None);
    }

    fn begin(&self, session: &Session) {
        if let Ok(mut token) = self.token.lock() {
            *token = Some(session.token.clone());
        }
        self.changes.send_replace(Some(session.identity.clone()));
    }
}
