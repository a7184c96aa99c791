use redb::{ReadableTable, WriteTransaction};

use super::db::{Database, DatabaseError};
use super::models::{DeleteOutcome, RecordKey, ScoreQuery, ScoreRecord};
use super::tables::*;

impl Database {
    // ========================================================================
    // Score operations
    // ========================================================================

    /// Store a score record under its composite key, replacing any previous
    /// record with the same key, and maintain the owner index.
    pub fn put_score(&self, score: &ScoreRecord) -> Result<(), DatabaseError> {
        debug_assert!(!score.owner_id.is_empty(), "owner id must not be empty");
        debug_assert!(!score.name.is_empty(), "score name must not be empty");

        let key = score.key().to_string();
        let write_txn = self.begin_write()?;
        {
            let mut table = write_txn.open_table(SCORES)?;
            let data = rmp_serde::to_vec_named(score)?;
            table.insert(key.as_str(), data.as_slice())?;

            let mut owner_table = write_txn.open_table(OWNER_SCORES)?;
            let mut keys: Vec<String> = match owner_table.get(score.owner_id.as_str())? {
                Some(v) => rmp_serde::from_slice(v.value())?,
                None => Vec::new(),
            };

            if !keys.contains(&key) {
                keys.push(key);
                keys.sort();
                let index_data = rmp_serde::to_vec_named(&keys)?;
                owner_table.insert(score.owner_id.as_str(), index_data.as_slice())?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn get_score(&self, key: &RecordKey) -> Result<Option<ScoreRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(SCORES)?;

        match table.get(key.to_string().as_str())? {
            Some(data) => Ok(Some(rmp_serde::from_slice(data.value())?)),
            None => Ok(None),
        }
    }

    /// Get all scores for an owner, ordered by key
    pub fn get_scores_by_owner(&self, owner_id: &str) -> Result<Vec<ScoreRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let owner_table = read_txn.open_table(OWNER_SCORES)?;
        let scores_table = read_txn.open_table(SCORES)?;

        let keys: Vec<String> = match owner_table.get(owner_id)? {
            Some(data) => rmp_serde::from_slice(data.value())?,
            None => return Ok(Vec::new()),
        };

        let mut scores = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(data) = scores_table.get(key.as_str())? {
                scores.push(rmp_serde::from_slice(data.value())?);
            }
        }

        Ok(scores)
    }

    /// Get every score, ordered by key
    pub fn get_all_scores(&self) -> Result<Vec<ScoreRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(SCORES)?;

        let mut scores = Vec::new();
        for result in table.iter()? {
            let (_, value) = result?;
            scores.push(rmp_serde::from_slice(value.value())?);
        }

        Ok(scores)
    }

    /// Evaluate a query. Owner-scoped queries go through the owner index;
    /// the remaining predicates are applied while reading.
    pub fn query_scores(&self, query: &ScoreQuery) -> Result<Vec<ScoreRecord>, DatabaseError> {
        let candidates = match query.owner_id.as_deref() {
            Some(owner_id) => self.get_scores_by_owner(owner_id)?,
            None => self.get_all_scores()?,
        };

        Ok(candidates
            .into_iter()
            .filter(|score| query.matches(score))
            .collect())
    }

    /// Delete a score on behalf of `requester`. The stored owner is checked
    /// inside the write transaction; a mismatch leaves the store untouched.
    pub fn delete_score(
        &self,
        key: &RecordKey,
        requester: &str,
    ) -> Result<DeleteOutcome, DatabaseError> {
        let key_str = key.to_string();
        let write_txn = self.begin_write()?;

        let stored_owner: Option<String> = {
            let table = write_txn.open_table(SCORES)?;
            let result = match table.get(key_str.as_str())? {
                Some(data) => {
                    let score: ScoreRecord = rmp_serde::from_slice(data.value())?;
                    Some(score.owner_id)
                }
                None => None,
            };
            result
        };

        let outcome = match stored_owner {
            None => DeleteOutcome::Missing,
            Some(owner_id) if owner_id != requester => DeleteOutcome::NotOwner,
            Some(owner_id) => {
                {
                    let mut table = write_txn.open_table(SCORES)?;
                    table.remove(key_str.as_str())?;
                }
                remove_from_owner_index(&write_txn, &owner_id, &key_str)?;
                DeleteOutcome::Deleted
            }
        };

        if outcome == DeleteOutcome::Deleted {
            write_txn.commit()?;
        } else {
            write_txn.abort()?;
        }
        Ok(outcome)
    }
}

fn remove_from_owner_index(
    write_txn: &WriteTransaction,
    owner_id: &str,
    key: &str,
) -> Result<(), DatabaseError> {
    let keys: Option<Vec<String>> = {
        let owner_table = write_txn.open_table(OWNER_SCORES)?;
        let result = match owner_table.get(owner_id)? {
            Some(data) => Some(rmp_serde::from_slice(data.value())?),
            None => None,
        };
        result
    };

    if let Some(mut keys) = keys {
        keys.retain(|k| k != key);
        let mut owner_table = write_txn.open_table(OWNER_SCORES)?;
        if keys.is_empty() {
            owner_table.remove(owner_id)?;
        } else {
            let data = rmp_serde::to_vec_named(&keys)?;
            owner_table.insert(owner_id, data.as_slice())?;
        }
    }
    Ok(())
}
