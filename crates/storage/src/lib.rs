//! Key-value state storage.
//!
//! Settlement state (issued cheques, received cheques, history, address book)
//! lives in a flat string-keyed store. Keys are namespaced by prefix, so a
//! backend only has to support point reads, writes, deletes and ordered
//! prefix iteration. Values are encoded with `postcard` by [`StateStoreExt`].

use std::sync::Arc;

use serde::{Serialize, de::DeserializeOwned};

mod memory;

pub use memory::MemoryStateStore;

/// Shared handle to a state store backend.
pub type SharedStateStore = Arc<dyn StateStore>;

/// Raw byte-level state store.
///
/// Implementations must be safe to share across tasks. Each call is atomic on
/// its own; callers that need multi-key consistency hold their own locks.
#[auto_impl::auto_impl(&, Arc, Box)]
pub trait StateStore: Send + Sync {
    /// Returns the value stored under `key`, or [`DatabaseError::NotFound`].
    fn get_raw(&self, key: &str) -> Result<Vec<u8>, DatabaseError>;

    /// Inserts or overwrites the value under `key`.
    fn put_raw(&self, key: &str, value: &[u8]) -> Result<(), DatabaseError>;

    /// Removes `key`. Deleting a missing key is not an error.
    fn delete(&self, key: &str) -> Result<(), DatabaseError>;

    /// Visits every entry whose key starts with `prefix`, in key order.
    ///
    /// The callback returns `Ok(false)` to stop early.
    fn iterate(
        &self,
        prefix: &str,
        callback: &mut dyn FnMut(&str, &[u8]) -> Result<bool, DatabaseError>,
    ) -> Result<(), DatabaseError>;
}

/// Typed access on top of [`StateStore`].
pub trait StateStoreExt: StateStore {
    /// Reads and decodes the value under `key`.
    fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T, DatabaseError> {
        let raw = self.get_raw(key)?;
        postcard::from_bytes(&raw).map_err(|e| DatabaseError::Decode(e.to_string()))
    }

    /// Like [`get`](Self::get), mapping a missing key to `None`.
    fn get_optional<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, DatabaseError> {
        match self.get(key) {
            Ok(value) => Ok(Some(value)),
            Err(DatabaseError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Encodes and stores `value` under `key`.
    fn put<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), DatabaseError> {
        let raw = postcard::to_allocvec(value).map_err(|e| DatabaseError::Encode(e.to_string()))?;
        self.put_raw(key, &raw)
    }

    /// Decodes every value under `prefix`. Stops early when `callback` returns `Ok(false)`.
    fn iterate_values<T, F>(&self, prefix: &str, mut callback: F) -> Result<(), DatabaseError>
    where
        T: DeserializeOwned,
        F: FnMut(&str, T) -> Result<bool, DatabaseError>,
    {
        self.iterate(prefix, &mut |key, raw| {
            let value =
                postcard::from_bytes(raw).map_err(|e| DatabaseError::Decode(e.to_string()))?;
            callback(key, value)
        })
    }
}

impl<S: StateStore + ?Sized> StateStoreExt for S {}

/// Database error type.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DatabaseError {
    /// The key has no value.
    #[error("not found")]
    NotFound,
    /// A stored value could not be decoded.
    #[error("failed to decode value: {0}")]
    Decode(String),
    /// A value could not be encoded.
    #[error("failed to encode value: {0}")]
    Encode(String),
    /// Backend failure.
    #[error("{0}")]
    Other(String),
}

impl DatabaseError {
    /// Wraps any backend error as [`DatabaseError::Other`].
    pub fn other(error: impl std::fmt::Display) -> Self {
        Self::Other(error.to_string())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}
