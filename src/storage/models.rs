use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Composite identity of a score record. Two owners may share a file name;
/// one owner re-uploading a name replaces the earlier record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    pub owner_id: String,
    pub name: String,
}

impl RecordKey {
    pub fn new(owner_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            name: name.into(),
        }
    }

    /// Blob path the payload is stored under.
    pub fn blob_key(&self) -> String {
        format!("scores/{}/{}", self.owner_id, self.name)
    }
}

/// Renders the document key, `{owner_id}_{name}`.
impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.owner_id, self.name)
    }
}

/// A sheet-music record stored in redb
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub owner_id: String,
    pub name: String,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub is_public: bool,
    pub url: String,

    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub byte_size: u64,
    pub uploaded_at: DateTime<Utc>,
}

impl ScoreRecord {
    pub fn key(&self) -> RecordKey {
        RecordKey::new(&self.owner_id, &self.name)
    }
}

/// Predicate for `query_documents`. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreQuery {
    /// Only records owned by this identity.
    pub owner_id: Option<String>,
    /// Case-sensitive substring the tag must contain.
    pub tag_contains: Option<String>,
    /// Only records that are public or owned by this identity.
    pub visible_to: Option<String>,
}

impl ScoreQuery {
    pub fn matches(&self, record: &ScoreRecord) -> bool {
        if let Some(ref owner) = self.owner_id {
            if &record.owner_id != owner {
                return false;
            }
        }
        if let Some(ref needle) = self.tag_contains {
            if !needle.is_empty() && !record.tag.contains(needle.as_str()) {
                return false;
            }
        }
        if let Some(ref viewer) = self.visible_to {
            if !record.is_public && &record.owner_id != viewer {
                return false;
            }
        }
        true
    }
}

/// Result of an ownership-checked delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    Missing,
    NotOwner,
}

/// A registered account, keyed by lower-cased email.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountRecord {
    pub user_id: String,
    pub email: String,
    /// PBKDF2-HMAC-SHA256 output
    pub secret_hash: Vec<u8>,
    pub salt: Vec<u8>,
    pub iterations: u32,
    pub created_at: DateTime<Utc>,
}

/// A signed-in session, keyed by its bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub user_id: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(owner: &str, name: &str, tag: &str, is_public: bool) -> ScoreRecord {
        ScoreRecord {
            owner_id: owner.to_string(),
            name: name.to_string(),
            tag: tag.to_string(),
            is_public,
            url: String::new(),
            mime_type: "application/pdf".to_string(),
            byte_size: 0,
            uploaded_at: Utc::now(),
        }
    }

    #[test]
    fn test_record_key_rendering() {
        let key = RecordKey::new("u1", "song.pdf");
        assert_eq!(key.to_string(), "u1_song.pdf");
        assert_eq!(key.blob_key(), "scores/u1/song.pdf");
    }

    #[test]
    fn test_query_tag_filter_is_case_sensitive_substring() {
        let query = ScoreQuery {
            tag_contains: Some("jazz".to_string()),
            ..Default::default()
        };
        assert!(query.matches(&record("u1", "a.pdf", "jazz-ballad", false)));
        assert!(!query.matches(&record("u1", "b.pdf", "Jazz", false)));
        assert!(!query.matches(&record("u1", "c.pdf", "", false)));
    }

    #[test]
    fn test_query_empty_tag_matches_all() {
        let query = ScoreQuery {
            tag_contains: Some(String::new()),
            ..Default::default()
        };
        assert!(query.matches(&record("u1", "c.pdf", "", false)));
    }

    #[test]
    fn test_query_visibility() {
        let query = ScoreQuery {
            visible_to: Some("me".to_string()),
            ..Default::default()
        };
        assert!(query.matches(&record("me", "mine.pdf", "", false)));
        assert!(query.matches(&record("other", "open.pdf", "", true)));
        assert!(!query.matches(&record("other", "hidden.pdf", "", false)));
    }
}
