//! In-memory ordered store for tests/dev.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::store::{OrderedStore, StoreError, StoreIter};

/// In-memory ordered store.
///
/// - One `BTreeMap` per table
/// - Scans are lazy: each step re-enters the lock and seeks past the last key
/// - `fail_next` injects `Unavailable` errors for fault tests
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<HashMap<String, BTreeMap<String, Vec<u8>>>>,
    failures: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` operations fail with [`StoreError::Unavailable`].
    pub fn fail_next(&self, count: usize) {
        self.failures.store(count, Ordering::SeqCst);
    }

    fn check_fault(&self) -> Result<(), StoreError> {
        let tripped = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if tripped {
            return Err(StoreError::unavailable("injected failure"));
        }
        Ok(())
    }
}

impl OrderedStore for InMemoryStore {
    fn get(&self, table: &str, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.check_fault()?;
        let tables = self.tables.read().map_err(|_| StoreError::Poisoned)?;
        Ok(tables.get(table).and_then(|t| t.get(key)).cloned())
    }

    fn put(&self, table: &str, key: &str, value: &[u8]) -> Result<bool, StoreError> {
        self.check_fault()?;
        let mut tables = self.tables.write().map_err(|_| StoreError::Poisoned)?;
        let previous = tables
            .entry(table.to_string())
            .or_default()
            .insert(key.to_string(), value.to_vec());
        Ok(previous.is_some())
    }

    fn remove(&self, table: &str, key: &str) -> Result<bool, StoreError> {
        self.check_fault()?;
        let mut tables = self.tables.write().map_err(|_| StoreError::Poisoned)?;
        Ok(tables
            .get_mut(table)
            .and_then(|t| t.remove(key))
            .is_some())
    }

    fn size(&self, table: &str) -> Result<usize, StoreError> {
        self.check_fault()?;
        let tables = self.tables.read().map_err(|_| StoreError::Poisoned)?;
        Ok(tables.get(table).map_or(0, BTreeMap::len))
    }

    fn iter<'a>(&'a self, table: &str) -> StoreIter<'a> {
        Box::new(MemoryScan {
            store: self,
            table: table.to_string(),
            last: None,
            done: false,
        })
    }

    fn truncate(&self, table: &str) -> Result<(), StoreError> {
        self.check_fault()?;
        let mut tables = self.tables.write().map_err(|_| StoreError::Poisoned)?;
        tables.remove(table);
        Ok(())
    }
}

struct MemoryScan<'a> {
    store: &'a InMemoryStore,
    table: String,
    last: Option<String>,
    done: bool,
}

impl MemoryScan<'_> {
    fn step(&mut self) -> Result<Option<(String, Vec<u8>)>, StoreError> {
        self.store.check_fault()?;
        let tables = self.store.tables.read().map_err(|_| StoreError::Poisoned)?;
        let Some(table) = tables.get(&self.table) else {
            return Ok(None);
        };

        let entry = match &self.last {
            None => table.iter().next(),
            Some(last) => table
                .range::<str, _>((Bound::Excluded(last.as_str()), Bound::Unbounded))
                .next(),
        };

        Ok(entry.map(|(k, v)| (k.clone(), v.clone())))
    }
}

impl Iterator for MemoryScan<'_> {
    type Item = Result<(String, Vec<u8>), StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.step() {
            Ok(Some((key, value))) => {
                self.last = Some(key.clone());
                Some(Ok((key, value)))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
