mod gcs;
mod local;

pub use gcs::GcsStore;
pub use local::LocalStore;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Object not found: {0}")]
    NotFound(String),
    #[error("Invalid object key: {0}")]
    InvalidKey(String),
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Abstraction over blob storage backends.
/// Keys are slash-separated paths such as `scores/{owner_id}/{file_name}`.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write a blob, overwriting anything already stored at `key`.
    async fn put(&self, key: &str, data: Bytes) -> Result<(), ObjectStoreError>;
    async fn get(&self, key: &str) -> Result<Bytes, ObjectStoreError>;
    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError>;
    async fn exists(&self, key: &str) -> Result<bool, ObjectStoreError>;
    /// Publicly resolvable URL for a stored blob. Fails with `NotFound` if absent.
    async fn retrieval_url(&self, key: &str) -> Result<String, ObjectStoreError>;
}

/// Reject keys that are empty or could escape the store root.
pub fn validate_key(key: &str) -> Result<(), ObjectStoreError> {
    let bad_segment = key
        .split('/')
        .any(|s| s.is_empty() || s == "." || s == ".." || s.contains('\\') || s.contains('\0'));
    if key.is_empty() || bad_segment {
        return Err(ObjectStoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Percent-encode a key for use in a URL. With `keep_slash` the path
/// structure is preserved, otherwise `/` is encoded as well.
pub(crate) fn encode_key(key: &str, keep_slash: bool) -> String {
    if keep_slash {
        key.split('/')
            .map(urlencoding::encode)
            .collect::<Vec<_>>()
            .join("/")
    } else {
        urlencoding::encode(key).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key() {
        assert!(validate_key("scores/u1/song.pdf").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("scores/../etc/passwd").is_err());
        assert!(validate_key("/scores/u1").is_err());
        assert!(validate_key("scores//song.pdf").is_err());
    }

    #[test]
    fn test_encode_key() {
        assert_eq!(
            encode_key("scores/u1/Autumn Leaves.pdf", true),
            "scores/u1/Autumn%20Leaves.pdf"
        );
        assert_eq!(encode_key("scores/u1/a.pdf", false), "scores%2Fu1%2Fa.pdf");
        assert_eq!(encode_key("악보.pdf", true), "%EC%95%85%EB%B3%B4.pdf");
        assert_eq!(encode_key("scores/u1/a~b (1).pdf", true), "scores/u1/a~b%20%281%29.pdf");
    }
}
