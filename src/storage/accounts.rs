use redb::ReadableTable;

use super::db::{Database, DatabaseError};
use super::models::{AccountRecord, SessionRecord};
use super::tables::*;

impl Database {
    // ========================================================================
    // Account operations
    // ========================================================================

    /// Insert an account unless its email is already registered.
    /// Returns `false` when the email is taken.
    pub fn create_account(&self, account: &AccountRecord) -> Result<bool, DatabaseError> {
        let write_txn = self.begin_write()?;
        let created = {
            let mut table = write_txn.open_table(ACCOUNTS)?;
            if table.get(account.email.as_str())?.is_some() {
                false
            } else {
                let data = rmp_serde::to_vec_named(account)?;
                table.insert(account.email.as_str(), data.as_slice())?;
                true
            }
        };

        if created {
            write_txn.commit()?;
        } else {
            write_txn.abort()?;
        }
        Ok(created)
    }

    pub fn get_account(&self, email: &str) -> Result<Option<AccountRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(ACCOUNTS)?;

        match table.get(email)? {
            Some(data) => Ok(Some(rmp_serde::from_slice(data.value())?)),
            None => Ok(None),
        }
    }

    // ========================================================================
    // Session operations
    // ========================================================================

    pub fn put_session(&self, token: &str, session: &SessionRecord) -> Result<(), DatabaseError> {
        let write_txn = self.begin_write()?;
        {
            let mut table = write_txn.open_table(SESSIONS)?;
            let data = rmp_serde::to_vec_named(session)?;
            table.insert(token, data.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn get_session(&self, token: &str) -> Result<Option<SessionRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(SESSIONS)?;

        match table.get(token)? {
            Some(data) => Ok(Some(rmp_serde::from_slice(data.value())?)),
            None => Ok(None),
        }
    }

    /// Revoke a session. Returns whether it existed.
    pub fn delete_session(&self, token: &str) -> Result<bool, DatabaseError> {
        let write_txn = self.begin_write()?;
        let removed = {
            let mut table = write_txn.open_table(SESSIONS)?;
            let existed = table.remove(token)?.is_some();
            existed
        };
        write_txn.commit()?;
        Ok(removed)
    }
}
