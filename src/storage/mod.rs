mod accounts;
pub mod db;
pub mod models;
mod scores;
mod tables;

pub use db::{Database, DatabaseError, PurgeStats};
pub use tables::*;

use async_trait::async_trait;

use models::{DeleteOutcome, RecordKey, ScoreQuery, ScoreRecord};

/// Document store holding score metadata, as seen by the catalog.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Replace-by-key: the record's composite key decides which document is written.
    async fn upsert_document(&self, record: &ScoreRecord) -> Result<(), DatabaseError>;
    async fn query_documents(&self, query: &ScoreQuery)
        -> Result<Vec<ScoreRecord>, DatabaseError>;
    /// Delete only if `requester` owns the record.
    async fn delete_document(
        &self,
        key: &RecordKey,
        requester: &str,
    ) -> Result<DeleteOutcome, DatabaseError>;
}

#[async_trait]
impl RecordStore for Database {
    async fn upsert_document(&self, record: &ScoreRecord) -> Result<(), DatabaseError> {
        self.put_score(record)
    }

    async fn query_documents(
        &self,
        query: &ScoreQuery,
    ) -> Result<Vec<ScoreRecord>, DatabaseError> {
        self.query_scores(query)
    }

    async fn delete_document(
        &self,
        key: &RecordKey,
        requester: &str,
    ) -> Result<DeleteOutcome, DatabaseError> {
        self.delete_score(key, requester)
    }
}
