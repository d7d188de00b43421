//! Ordered key-value store boundary.
//!
//! The deque only needs single-key reads and writes plus an ordered scan, so
//! any embedded engine that can offer those per named table will do. No
//! multi-key atomicity is assumed.

use std::sync::Arc;

use thiserror::Error;

/// Lazy `(key, value)` sequence in ascending key order.
pub type StoreIter<'a> = Box<dyn Iterator<Item = Result<(String, Vec<u8>), StoreError>> + 'a>;

/// Store operation error.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The underlying engine failed (I/O, connection, driver error).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// An internal lock was poisoned by a panicking writer.
    #[error("store lock poisoned")]
    Poisoned,
}

impl StoreError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }
}

/// Ordered key-value store with independent named tables.
///
/// Implementations must keep keys of one table in ascending byte order for
/// [`OrderedStore::iter`] and must be safe to share across threads.
pub trait OrderedStore: Send + Sync {
    /// Read the value stored under `key`.
    fn get(&self, table: &str, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Write `value` under `key`. Returns whether a previous value existed.
    fn put(&self, table: &str, key: &str, value: &[u8]) -> Result<bool, StoreError>;

    /// Delete `key`. Returns whether a value existed.
    fn remove(&self, table: &str, key: &str) -> Result<bool, StoreError>;

    /// Number of records in `table`.
    fn size(&self, table: &str) -> Result<usize, StoreError>;

    /// Scan `table` in key order.
    fn iter<'a>(&'a self, table: &str) -> StoreIter<'a>;

    /// Remove every record from `table`.
    fn truncate(&self, table: &str) -> Result<(), StoreError>;

    fn contains(&self, table: &str, key: &str) -> Result<bool, StoreError> {
        Ok(self.get(table, key)?.is_some())
    }
}

impl<S> OrderedStore for Arc<S>
where
    S: OrderedStore + ?Sized,
{
    fn get(&self, table: &str, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        (**self).get(table, key)
    }

    fn put(&self, table: &str, key: &str, value: &[u8]) -> Result<bool, StoreError> {
        (**self).put(table, key, value)
    }

    fn remove(&self, table: &str, key: &str) -> Result<bool, StoreError> {
        (**self).remove(table, key)
    }

    fn size(&self, table: &str) -> Result<usize, StoreError> {
        (**self).size(table)
    }

    fn iter<'a>(&'a self, table: &str) -> StoreIter<'a> {
        (**self).iter(table)
    }

    fn truncate(&self, table: &str) -> Result<(), StoreError> {
        (**self).truncate(table)
    }

    fn contains(&self, table: &str, key: &str) -> Result<bool, StoreError> {
        (**self).contains(table, key)
    }
}
