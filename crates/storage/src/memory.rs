//! In-memory [`StateStore`] backend.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::{DatabaseError, StateStore};

/// A [`StateStore`] kept in a sorted map. Contents are lost on drop.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl StateStore for MemoryStateStore {
    fn get_raw(&self, key: &str) -> Result<Vec<u8>, DatabaseError> {
        self.entries
            .read()
            .get(key)
            .cloned()
            .ok_or(DatabaseError::NotFound)
    }

    fn put_raw(&self, key: &str, value: &[u8]) -> Result<(), DatabaseError> {
        self.entries.write().insert(key.to_owned(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), DatabaseError> {
        self.entries.write().remove(key);
        Ok(())
    }

    fn iterate(
        &self,
        prefix: &str,
        callback: &mut dyn FnMut(&str, &[u8]) -> Result<bool, DatabaseError>,
    ) -> Result<(), DatabaseError> {
        // Snapshot first so the callback may write to the store.
        let matching: Vec<(String, Vec<u8>)> = self
            .entries
            .read()
            .range(prefix.to_owned()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        for (key, value) in &matching {
            if !callback(key, value)? {
                break;
            }
        }
        Ok(())
    }
}
