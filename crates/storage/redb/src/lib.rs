//! redb-backed [`StateStore`].
//!
//! All state lives in a single table keyed by the namespaced string key.
//! redb keeps `&str` keys in byte order, which gives prefix iteration for free.

use std::path::Path;

use redb::{Database, ReadableTable, TableDefinition};
use tracing::debug;
use vertex_storage::{DatabaseError, StateStore};

/// Key: namespaced state key. Value: postcard-encoded value.
const STATE_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("state");

/// Persistent state store.
pub struct RedbStateStore {
    db: Database,
}

impl RedbStateStore {
    /// Open or create a state store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, DatabaseError> {
        let db = Database::create(path.as_ref()).map_err(DatabaseError::other)?;

        let write_txn = db.begin_write().map_err(DatabaseError::other)?;
        {
            let _ = write_txn
                .open_table(STATE_TABLE)
                .map_err(DatabaseError::other)?;
        }
        write_txn.commit().map_err(DatabaseError::other)?;

        debug!(path = %path.as_ref().display(), "Opened redb state store");
        Ok(Self { db })
    }
}

impl StateStore for RedbStateStore {
    fn get_raw(&self, key: &str) -> Result<Vec<u8>, DatabaseError> {
        let read_txn = self.db.begin_read().map_err(DatabaseError::other)?;
        let table = read_txn
            .open_table(STATE_TABLE)
            .map_err(DatabaseError::other)?;
        match table.get(key).map_err(DatabaseError::other)? {
            Some(value) => Ok(value.value().to_vec()),
            None => Err(DatabaseError::NotFound),
        }
    }

    fn put_raw(&self, key: &str, value: &[u8]) -> Result<(), DatabaseError> {
        let write_txn = self.db.begin_write().map_err(DatabaseError::other)?;
        {
            let mut table = write_txn
                .open_table(STATE_TABLE)
                .map_err(DatabaseError::other)?;
            table.insert(key, value).map_err(DatabaseError::other)?;
        }
        write_txn.commit().map_err(DatabaseError::other)
    }

    fn delete(&self, key: &str) -> Result<(), DatabaseError> {
        let write_txn = self.db.begin_write().map_err(DatabaseError::other)?;
        {
            let mut table = write_txn
                .open_table(STATE_TABLE)
                .map_err(DatabaseError::other)?;
            table.remove(key).map_err(DatabaseError::other)?;
        }
        write_txn.commit().map_err(DatabaseError::other)
    }

    fn iterate(
        &self,
        prefix: &str,
        callback: &mut dyn FnMut(&str, &[u8]) -> Result<bool, DatabaseError>,
    ) -> Result<(), DatabaseError> {
        // Collect under the read transaction so callbacks are free to write.
        let entries = {
            let read_txn = self.db.begin_read().map_err(DatabaseError::other)?;
            let table = read_txn
                .open_table(STATE_TABLE)
                .map_err(DatabaseError::other)?;

            let mut entries = Vec::new();
            for entry in table.range(prefix..).map_err(DatabaseError::other)? {
                let (key, value) = entry.map_err(DatabaseError::other)?;
                let key = key.value();
                if !key.starts_with(prefix) {
                    break;
                }
                entries.push((key.to_owned(), value.value().to_vec()));
            }
            entries
        };

        for (key, value) in &entries {
            if !callback(key, value)? {
                break;
            }
        }
        Ok(())
    }
}
