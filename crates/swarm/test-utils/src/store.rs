//! State store with injectable write failures.

use parking_lot::Mutex;
use vertex_storage::{DatabaseError, MemoryStateStore, StateStore};

/// [`MemoryStateStore`] that refuses writes to chosen key prefixes.
#[derive(Default)]
pub struct FaultyStateStore {
    inner: MemoryStateStore,
    failing: Mutex<Vec<String>>,
}

impl FaultyStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails every later `put` to a key starting with `prefix`.
    pub fn fail_puts(&self, prefix: impl Into<String>) {
        self.failing.lock().push(prefix.into());
    }

    pub fn heal(&self) {
        self.failing.lock().clear();
    }

    fn check(&self, key: &str) -> Result<(), DatabaseError> {
        if self.failing.lock().iter().any(|prefix| key.starts_with(prefix)) {
            return Err(DatabaseError::Other(format!("injected write failure for {key}")));
        }
        Ok(())
    }
}

impl StateStore for FaultyStateStore {
    fn get_raw(&self, key: &str) -> Result<Vec<u8>, DatabaseError> {
        self.inner.get_raw(key)
    }

    fn put_raw(&self, key: &str, value: &[u8]) -> Result<(), DatabaseError> {
        self.check(key)?;
        self.inner.put_raw(key, value)
    }

    fn delete(&self, key: &str) -> Result<(), DatabaseError> {
        self.inner.delete(key)
    }

    fn iterate(
        &self,
        prefix: &str,
        callback: &mut dyn FnMut(&str, &[u8]) -> Result<bool, DatabaseError>,
    ) -> Result<(), DatabaseError> {
        self.inner.iterate(prefix, callback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use vertex_storage::StateStoreExt;

    #[test]
    fn test_fails_matching_puts_only() {
        let store = FaultyStateStore::new();
        store.fail_puts("swap_history_");

        assert_matches!(store.put("swap_history_x", &1u64), Err(DatabaseError::Other(_)));
        store.put("swap_other", &2u64).unwrap();
        assert_eq!(store.get::<u64>("swap_other").unwrap(), 2);

        store.heal();
        store.put("swap_history_x", &1u64).unwrap();
    }
}
