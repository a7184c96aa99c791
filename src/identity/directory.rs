use std::num::NonZeroU32;

use async_trait::async_trait;
use base64::Engine;
use chrono::Utc;
use ring::rand::{SecureRandom, SystemRandom};
use ring::{digest, pbkdf2};

use super::{AuthError, Identity, IdentityProvider, Session};
use crate::config::AccountConfig;
use crate::storage::models::{AccountRecord, SessionRecord};
use crate::storage::Database;

const SALT_LEN: usize = 16;
const TOKEN_LEN: usize = 32;
const HASH_LEN: usize = digest::SHA256_OUTPUT_LEN;

/// Email/secret accounts and bearer sessions stored in redb.
pub struct AccountDirectory {
    db: Database,
    config: AccountConfig,
    rng: SystemRandom,
}

impl AccountDirectory {
    pub fn new(db: Database, config: AccountConfig) -> Self {
        Self {
            db,
            config,
            rng: SystemRandom::new(),
        }
    }

    fn random_bytes<const N: usize>(&self) -> Result<[u8; N], AuthError> {
        let mut buf = [0u8; N];
        self.rng
            .fill(&mut buf)
            .map_err(|_| AuthError::Backend("system randomness unavailable".to_string()))?;
        Ok(buf)
    }

    fn open_session(&self, identity: Identity) -> Result<Session, AuthError> {
        let token = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .encode(self.random_bytes::<TOKEN_LEN>()?);
        self.db.put_session(
            &token,
            &SessionRecord {
                user_id: identity.user_id.clone(),
                email: identity.email.clone(),
                created_at: Utc::now(),
            },
        )?;
        Ok(Session { token, identity })
    }
}

fn iterations(n: u32) -> NonZeroU32 {
    NonZeroU32::new(n).unwrap_or(NonZeroU32::MIN)
}

/// Trim and lower-case an email, rejecting obviously malformed addresses.
fn normalize_email(email: &str) -> Result<String, AuthError> {
    let email = email.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(email)
    } else {
        Err(AuthError::InvalidEmail(email))
    }
}

#[async_trait]
impl IdentityProvider for AccountDirectory {
    async fn create_account(&self, email: &str, secret: &str) -> Result<Session, AuthError> {
        let email = normalize_email(email)?;
        if secret.chars().count() < self.config.min_secret_length {
            return Err(AuthError::WeakSecret(self.config.min_secret_length));
        }

        let salt = self.random_bytes::<SALT_LEN>()?;
        let mut secret_hash = [0u8; HASH_LEN];
        pbkdf2::derive(
            pbkdf2::PBKDF2_HMAC_SHA256,
            iterations(self.config.pbkdf2_iterations),
            &salt,
            secret.as_bytes(),
            &mut secret_hash,
        );

        let account = AccountRecord {
            user_id: uuid::Uuid::new_v4().to_string(),
            email: email.clone(),
            secret_hash: secret_hash.to_vec(),
            salt: salt.to_vec(),
            iterations: self.config.pbkdf2_iterations,
            created_at: Utc::now(),
        };

        if !self.db.create_account(&account)? {
            return Err(AuthError::EmailTaken(email));
        }

        tracing::info!(user_id = %account.user_id, "Created account");
        self.open_session(Identity {
            user_id: account.user_id,
            email: account.email,
        })
    }

    async fn login(&self, email: &str, secret: &str) -> Result<Session, AuthError> {
        let email = normalize_email(email).map_err(|_| AuthError::InvalidCredentials)?;
        let account = self
            .db
            .get_account(&email)?
            .ok_or(AuthError::InvalidCredentials)?;

        pbkdf2::verify(
            pbkdf2::PBKDF2_HMAC_SHA256,
            iterations(account.iterations),
            &account.salt,
            secret.as_bytes(),
            &account.secret_hash,
        )
        .map_err(|_| AuthError::InvalidCredentials)?;

        tracing::debug!(user_id = %account.user_id, "Signed in");
        self.open_session(Identity {
            user_id: account.user_id,
            email: account.email,
        })
    }

    async fn logout(&self, token: &str) -> Result<(), AuthError> {
        self.db.delete_session(token)?;
        Ok(())
    }

    async fn resolve(&self, token: &str) -> Result<Option<Identity>, AuthError> {
        Ok(self.db.get_session(token)?.map(|s| Identity {
            user_id: s.user_id,
            email: s.email,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory(dir: &tempfile::TempDir) -> AccountDirectory {
        let db = Database::open(dir.path().join("data")).unwrap();
        AccountDirectory::new(
            db,
            AccountConfig {
                min_secret_length: 6,
                pbkdf2_iterations: 1_000,
            },
        )
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email(" User@X.com ").unwrap(), "user@x.com");
        assert!(normalize_email("no-at-sign").is_err());
        assert!(normalize_email("@x.com").is_err());
        assert!(normalize_email("a@b@x.com").is_err());
        assert!(normalize_email("a@localhost").is_err());
        assert!(normalize_email("a b@x.com").is_err());
    }

    #[tokio::test]
    async fn test_sign_up_then_login() {
        let dir = tempfile::tempdir().unwrap();
        let accounts = directory(&dir);

        let created = accounts
            .create_account("user@x.com", "secret123")
            .await
            .unwrap();
        let session = accounts.login("USER@x.com", "secret123").await.unwrap();

        assert_eq!(created.identity, session.identity);
        assert_ne!(created.token, session.token);
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let accounts = directory(&dir);

        accounts
            .create_account("user@x.com", "secret123")
            .await
            .unwrap();
        let err = accounts
            .create_account("user@x.com", "another1")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::EmailTaken(_)));
    }

    #[tokio::test]
    async fn test_weak_secret_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let accounts = directory(&dir);

        let err = accounts.create_account("user@x.com", "123").await.unwrap_err();
        assert!(matches!(err, AuthError::WeakSecret(6)));
    }

    #[tokio::test]
    async fn test_bad_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let accounts = directory(&dir);
        accounts
            .create_account("user@x.com", "secret123")
            .await
            .unwrap();

        assert!(matches!(
            accounts.login("user@x.com", "wrong-secret").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            accounts.login("nobody@x.com", "secret123").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_logout_revokes_token() {
        let dir = tempfile::tempdir().unwrap();
        let accounts = directory(&dir);
        let session = accounts
            .create_account("user@x.com", "secret123")
            .await
            .unwrap();

        assert_eq!(
            accounts.resolve(&session.token).await.unwrap(),
            Some(session.identity.clone())
        );
        accounts.logout(&session.token).await.unwrap();
        assert_eq!(accounts.resolve(&session.token).await.unwrap(), None);
    }
}
