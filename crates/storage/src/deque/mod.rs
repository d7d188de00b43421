//! Durable double-ended queue over an [`OrderedStore`].
//!
//! ## Layout
//!
//! - Data table `<name>`: one record per element, keyed by its [`Position`]
//! - Metadata table `<name>.meta`: the `head` and `tail` positions
//!
//! Elements occupy the contiguous run `head ..= tail` of the circular key
//! space. Pushing at either end allocates the neighbouring slot, so stored
//! keys never move. An empty deque has no recorded boundary.
//!
//! ## Crash safety
//!
//! Every mutation writes (or deletes) the data record first and the boundary
//! metadata second. A crash in between leaves metadata that is off by one
//! slot; [`PositionedDeque::open`] runs the repair protocol (see `repair.rs`)
//! to find the true boundary again.
//!
//! ## Concurrency
//!
//! Mutations take `&mut self`. A deque shared between threads must sit behind
//! a lock, and callers must not interleave an iterator over one handle with
//! pushes/pops on another handle to the same tables.

mod iter;
mod repair;

use thiserror::Error;
use tracing::{debug, info, warn};

use sspr_core::Position;

use crate::store::{OrderedStore, StoreError};

pub use iter::DequeIter;
pub use repair::DequeReport;

const META_HEAD: &str = "head";
const META_TAIL: &str = "tail";

/// Deque operation error.
#[derive(Debug, Clone, Error)]
pub enum DequeError {
    /// A caller-supplied value was rejected (e.g. empty record).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Pop on an empty deque. Expected and recoverable.
    #[error("queue is empty")]
    EmptyQueue,

    /// Every position in the ring is occupied.
    #[error("queue is full ({0} positions in use)")]
    Full(u64),

    /// The backing store failed.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[from] StoreError),

    /// A stored record could not be read as a value. The record is dropped
    /// when it is popped.
    #[error("corrupt record at {position}: {reason}")]
    Corrupt { position: Position, reason: String },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
struct Bounds {
    head: Position,
    tail: Position,
}

impl Bounds {
    fn single(position: Position) -> Self {
        Self {
            head: position,
            tail: position,
        }
    }

    fn len(&self) -> u64 {
        self.head.distance_to(self.tail) + 1
    }
}

/// Double-ended queue of string records persisted in an ordered store.
#[derive(Debug)]
pub struct PositionedDeque<S> {
    store: S,
    name: String,
    meta_table: String,
    bounds: Option<Bounds>,
    /// Slot used by the next insert into an empty deque.
    anchor: Position,
}

impl<S: OrderedStore> PositionedDeque<S> {
    /// Open the deque stored under `name`, repairing its boundary if needed.
    pub fn open(store: S, name: impl Into<String>) -> Result<Self, DequeError> {
        let name = name.into();
        if name.is_empty() {
            return Err(DequeError::InvalidArgument("queue name is empty".to_string()));
        }

        let meta_table = format!("{name}.meta");
        let head = read_meta(&store, &meta_table, META_HEAD)?;
        let tail = read_meta(&store, &meta_table, META_TAIL)?;

        let bounds = match (head, tail) {
            (Some(head), Some(tail)) => Some(Bounds { head, tail }),
            _ => None,
        };

        let mut deque = Self {
            store,
            name,
            meta_table,
            anchor: bounds.map_or(Position::ZERO, |b| b.head),
            bounds,
        };
        deque.repair()?;

        info!(queue = %deque.name, size = deque.size(), "opened positioned deque");
        Ok(deque)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Number of elements, computed from the boundary.
    pub fn size(&self) -> usize {
        self.bounds.map_or(0, |b| b.len() as usize)
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_none()
    }

    /// Position of the oldest element.
    pub fn head(&self) -> Option<Position> {
        self.bounds.map(|b| b.head)
    }

    /// Position of the newest element.
    pub fn tail(&self) -> Option<Position> {
        self.bounds.map(|b| b.tail)
    }

    /// Insert at the front (becomes the oldest element).
    pub fn add_first(&mut self, value: &str) -> Result<Position, DequeError> {
        check_value(value)?;
        let position = match self.bounds {
            None => self.anchor,
            Some(b) => {
                self.check_capacity(b)?;
                b.head.previous()
            }
        };

        self.write_at(position, value)?;
        match self.bounds.as_mut() {
            None => self.bounds = Some(Bounds::single(position)),
            Some(b) => b.head = position,
        }
        self.record_committed_bounds();

        debug!(queue = %self.name, %position, "added first");
        Ok(position)
    }

    /// Insert at the back (becomes the newest element).
    pub fn add_last(&mut self, value: &str) -> Result<Position, DequeError> {
        check_value(value)?;
        let position = match self.bounds {
            None => self.anchor,
            Some(b) => {
                self.check_capacity(b)?;
                b.tail.next()
            }
        };

        self.write_at(position, value)?;
        match self.bounds.as_mut() {
            None => self.bounds = Some(Bounds::single(position)),
            Some(b) => b.tail = position,
        }
        self.record_committed_bounds();

        debug!(queue = %self.name, %position, "added last");
        Ok(position)
    }

    /// Append every value at the back, in order. Stops at the first error.
    pub fn add_all_last<I, V>(&mut self, values: I) -> Result<usize, DequeError>
    where
        I: IntoIterator<Item = V>,
        V: AsRef<str>,
    {
        let mut added = 0;
        for value in values {
            self.add_last(value.as_ref())?;
            added += 1;
        }
        Ok(added)
    }

    /// Remove and return the oldest element.
    pub fn remove_first(&mut self) -> Result<String, DequeError> {
        let b = self.bounds.ok_or(DequeError::EmptyQueue)?;
        let (position, raw) = match self.read_raw(b.head)? {
            Some(raw) => (b.head, raw),
            None => self.reread_after_repair(|b| b.head)?,
        };

        self.store.remove(&self.name, &position.key())?;
        self.bounds = match self.bounds {
            Some(b) if b.head != b.tail => Some(Bounds {
                head: b.head.next(),
                ..b
            }),
            _ => {
                self.anchor = position;
                None
            }
        };
        self.record_committed_bounds();

        debug!(queue = %self.name, %position, "removed first");
        decode(position, raw)
    }

    /// Remove and return the newest element.
    pub fn remove_last(&mut self) -> Result<String, DequeError> {
        let b = self.bounds.ok_or(DequeError::EmptyQueue)?;
        let (position, raw) = match self.read_raw(b.tail)? {
            Some(raw) => (b.tail, raw),
            None => self.reread_after_repair(|b| b.tail)?,
        };

        self.store.remove(&self.name, &position.key())?;
        self.bounds = match self.bounds {
            Some(b) if b.head != b.tail => Some(Bounds {
                tail: b.tail.previous(),
                ..b
            }),
            _ => {
                self.anchor = position;
                None
            }
        };
        self.record_committed_bounds();

        debug!(queue = %self.name, %position, "removed last");
        decode(position, raw)
    }

    /// Remove up to `count` elements from the front, oldest first.
    pub fn remove_first_n(&mut self, count: usize) -> Result<Vec<String>, DequeError> {
        let mut removed = Vec::with_capacity(count.min(self.size()));
        while removed.len() < count && !self.is_empty() {
            removed.push(self.remove_first()?);
        }
        Ok(removed)
    }

    /// Oldest element, if any.
    pub fn peek_first(&mut self) -> Result<Option<String>, DequeError> {
        let Some(b) = self.bounds else {
            return Ok(None);
        };
        match self.read_raw(b.head)? {
            Some(raw) => decode(b.head, raw).map(Some),
            None => {
                let (position, raw) = self.reread_after_repair(|b| b.head)?;
                decode(position, raw).map(Some)
            }
        }
    }

    /// Newest element, if any.
    pub fn peek_last(&mut self) -> Result<Option<String>, DequeError> {
        let Some(b) = self.bounds else {
            return Ok(None);
        };
        match self.read_raw(b.tail)? {
            Some(raw) => decode(b.tail, raw).map(Some),
            None => {
                let (position, raw) = self.reread_after_repair(|b| b.tail)?;
                decode(position, raw).map(Some)
            }
        }
    }

    /// Up to `count` elements from the front, oldest first, without removing them.
    pub fn peek_first_n(&self, count: usize) -> Result<Vec<String>, DequeError> {
        self.iter().take(count).collect()
    }

    /// Oldest-to-newest values.
    pub fn iter(&self) -> DequeIter<'_, S> {
        DequeIter::forward(self)
    }

    /// Newest-to-oldest values.
    pub fn iter_rev(&self) -> DequeIter<'_, S> {
        DequeIter::backward(self)
    }

    /// Remove every element and reset the boundary to position zero.
    pub fn clear(&mut self) -> Result<(), DequeError> {
        self.store.truncate(&self.name)?;
        self.store.truncate(&self.meta_table)?;
        self.bounds = None;
        self.anchor = Position::ZERO;
        info!(queue = %self.name, "cleared positioned deque");
        Ok(())
    }

    fn check_capacity(&self, b: Bounds) -> Result<(), DequeError> {
        if b.len() >= Position::CAPACITY {
            return Err(DequeError::Full(b.len()));
        }
        Ok(())
    }

    fn write_at(&self, position: Position, value: &str) -> Result<(), DequeError> {
        if self.store.put(&self.name, &position.key(), value.as_bytes())? {
            warn!(queue = %self.name, %position, "overwrote an existing record");
        }
        Ok(())
    }

    pub(crate) fn read_raw(&self, position: Position) -> Result<Option<Vec<u8>>, DequeError> {
        Ok(self.store.get(&self.name, &position.key())?)
    }

    pub(crate) fn read_at(&self, position: Position) -> Result<Option<String>, DequeError> {
        self.read_raw(position)?
            .map(|raw| decode(position, raw))
            .transpose()
    }

    /// The boundary record vanished underneath us: repair, then read the new
    /// boundary chosen by `pick`.
    fn reread_after_repair(
        &mut self,
        pick: fn(&Bounds) -> Position,
    ) -> Result<(Position, Vec<u8>), DequeError> {
        warn!(queue = %self.name, "boundary record missing, repairing");
        self.repair()?;
        let b = self.bounds.ok_or(DequeError::EmptyQueue)?;
        let position = pick(&b);
        let raw = self.read_raw(position)?.ok_or_else(|| DequeError::Corrupt {
            position,
            reason: "boundary record missing after repair".to_string(),
        })?;
        Ok((position, raw))
    }

    /// Persist the boundary after the data write that committed an operation.
    ///
    /// The operation has already happened, so a failure here is not reported
    /// to the caller: the stored boundary stays one slot stale, the in-memory
    /// one stays correct, and the next successful write or `repair` on open
    /// brings them back in line.
    fn record_committed_bounds(&self) {
        if let Err(error) = self.persist_bounds() {
            warn!(
                queue = %self.name,
                %error,
                "failed to persist queue boundary, stored metadata is stale"
            );
        }
    }

    fn persist_bounds(&self) -> Result<(), DequeError> {
        match self.bounds {
            Some(b) => {
                self.store
                    .put(&self.meta_table, META_HEAD, b.head.key().as_bytes())?;
                self.store
                    .put(&self.meta_table, META_TAIL, b.tail.key().as_bytes())?;
            }
            None => {
                self.store.remove(&self.meta_table, META_HEAD)?;
                self.store.remove(&self.meta_table, META_TAIL)?;
            }
        }
        Ok(())
    }
}

fn check_value(value: &str) -> Result<(), DequeError> {
    if value.is_empty() {
        return Err(DequeError::InvalidArgument("record value is empty".to_string()));
    }
    Ok(())
}

fn decode(position: Position, raw: Vec<u8>) -> Result<String, DequeError> {
    String::from_utf8(raw).map_err(|e| DequeError::Corrupt {
        position,
        reason: e.to_string(),
    })
}

fn read_meta<S: OrderedStore>(
    store: &S,
    meta_table: &str,
    key: &str,
) -> Result<Option<Position>, DequeError> {
    let Some(raw) = store.get(meta_table, key)? else {
        return Ok(None);
    };

    let parsed = String::from_utf8(raw)
        .map_err(|e| e.to_string())
        .and_then(|s| s.parse::<Position>().map_err(|e| e.to_string()));

    match parsed {
        Ok(position) => Ok(Some(position)),
        Err(error) => {
            warn!(table = meta_table, key, %error, "ignoring unreadable boundary metadata");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;

    use proptest::prelude::*;

    use super::*;
    use crate::memory::InMemoryStore;

    fn open(store: &Arc<InMemoryStore>) -> PositionedDeque<Arc<InMemoryStore>> {
        PositionedDeque::open(store.clone(), "test-queue").unwrap()
    }

    #[test]
    fn remove_last_after_add_first_is_fifo() {
        let store = Arc::new(InMemoryStore::new());
        let mut deque = open(&store);
        deque.add_first("a").unwrap();
        deque.add_first("b").unwrap();
        deque.add_first("c").unwrap();

        assert_eq!(deque.remove_last().unwrap(), "a");
        assert_eq!(deque.remove_last().unwrap(), "b");
        assert_eq!(deque.remove_last().unwrap(), "c");
        assert!(deque.is_empty());
    }

    #[test]
    fn remove_first_after_add_first_is_lifo() {
        let store = Arc::new(InMemoryStore::new());
        let mut deque = open(&store);
        deque.add_first("a").unwrap();
        deque.add_first("b").unwrap();
        deque.add_first("c").unwrap();

        assert_eq!(deque.remove_first().unwrap(), "c");
        assert_eq!(deque.remove_first().unwrap(), "b");
        assert_eq!(deque.remove_first().unwrap(), "a");
    }

    #[test]
    fn size_tracks_bulk_insert_and_drain() {
        let store = Arc::new(InMemoryStore::new());
        let mut deque = open(&store);
        let n = 10_000;

        for i in 0..n {
            deque.add_last(&format!("item-{i}")).unwrap();
            assert_eq!(deque.size(), i + 1);
        }
        assert_eq!(store.size("test-queue").unwrap(), n);

        for i in 0..n {
            let value = if i % 2 == 0 {
                deque.remove_first().unwrap()
            } else {
                deque.remove_last().unwrap()
            };
            assert!(value.starts_with("item-"));
            assert_eq!(deque.size(), n - i - 1);
        }

        assert!(deque.is_empty());
        assert_eq!(store.size("test-queue").unwrap(), 0);
        assert!(matches!(deque.remove_first(), Err(DequeError::EmptyQueue)));
    }

    #[test]
    fn empty_deque_behaviour() {
        let store = Arc::new(InMemoryStore::new());
        let mut deque = open(&store);

        assert_eq!(deque.size(), 0);
        assert_eq!(deque.peek_first().unwrap(), None);
        assert_eq!(deque.peek_last().unwrap(), None);
        assert!(matches!(deque.remove_first(), Err(DequeError::EmptyQueue)));
        assert!(matches!(deque.remove_last(), Err(DequeError::EmptyQueue)));
        assert!(matches!(deque.add_last(""), Err(DequeError::InvalidArgument(_))));
        assert!(matches!(deque.add_first(""), Err(DequeError::InvalidArgument(_))));
        assert_eq!(deque.iter().count(), 0);
    }

    #[test]
    fn peeks_do_not_remove() {
        let store = Arc::new(InMemoryStore::new());
        let mut deque = open(&store);
        deque.add_all_last(["x", "y", "z"]).unwrap();

        assert_eq!(deque.peek_first().unwrap().as_deref(), Some("x"));
        assert_eq!(deque.peek_last().unwrap().as_deref(), Some("z"));
        assert_eq!(deque.peek_first_n(2).unwrap(), vec!["x", "y"]);
        assert_eq!(deque.size(), 3);
    }

    #[test]
    fn keys_do_not_shift_on_pop() {
        let store = Arc::new(InMemoryStore::new());
        let mut deque = open(&store);
        deque.add_all_last(["a", "b", "c"]).unwrap();
        let before = deque.tail().unwrap();

        deque.remove_first().unwrap();

        assert_eq!(deque.tail(), Some(before));
        assert_eq!(deque.head(), Some(Position::ZERO.next()));
    }

    #[test]
    fn add_first_on_fresh_deque_wraps_below_zero() {
        let store = Arc::new(InMemoryStore::new());
        let mut deque = open(&store);
        deque.add_last("b").unwrap();
        let position = deque.add_first("a").unwrap();

        assert_eq!(position, Position::MAX);
        assert_eq!(store.get("test-queue", "ZZZZZZ").unwrap(), Some(b"a".to_vec()));
        assert_eq!(deque.size(), 2);
        assert_eq!(deque.iter().collect::<Result<Vec<_>, _>>().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn survives_reopen() {
        let store = Arc::new(InMemoryStore::new());
        {
            let mut deque = open(&store);
            deque.add_all_last(["one", "two", "three"]).unwrap();
            deque.remove_first().unwrap();
        }

        let mut deque = open(&store);
        assert_eq!(deque.size(), 2);
        assert_eq!(deque.peek_first().unwrap().as_deref(), Some("two"));
        assert_eq!(deque.peek_last().unwrap().as_deref(), Some("three"));
    }

    #[test]
    fn insert_after_drain_continues_from_last_slot() {
        let store = Arc::new(InMemoryStore::new());
        let mut deque = open(&store);
        deque.add_all_last(["a", "b"]).unwrap();
        deque.remove_first_n(5).unwrap();

        let position = deque.add_last("c").unwrap();
        assert_eq!(position, Position::ZERO.next());
    }

    #[test]
    fn clear_resets_to_zero() {
        let store = Arc::new(InMemoryStore::new());
        let mut deque = open(&store);
        deque.add_all_last(["a", "b", "c"]).unwrap();

        deque.clear().unwrap();

        assert!(deque.is_empty());
        assert_eq!(store.size("test-queue").unwrap(), 0);
        assert_eq!(deque.add_last("d").unwrap(), Position::ZERO);

        let reopened = open(&store);
        assert_eq!(reopened.size(), 1);
    }

    #[test]
    fn corrupt_record_is_dropped_on_pop() {
        let store = Arc::new(InMemoryStore::new());
        let mut deque = open(&store);
        deque.add_all_last(["a", "b"]).unwrap();
        store.put("test-queue", "000000", &[0xff, 0xfe]).unwrap();

        assert!(matches!(deque.peek_first(), Err(DequeError::Corrupt { .. })));
        assert!(matches!(deque.remove_first(), Err(DequeError::Corrupt { .. })));
        assert_eq!(deque.remove_first().unwrap(), "b");
    }

    #[test]
    fn storage_failures_surface_as_unavailable() {
        let store = Arc::new(InMemoryStore::new());
        let mut deque = open(&store);
        deque.add_last("a").unwrap();

        store.fail_next(1);
        assert!(matches!(
            deque.add_last("b"),
            Err(DequeError::StorageUnavailable(_))
        ));
        assert_eq!(deque.size(), 1);

        store.fail_next(1);
        assert!(matches!(
            deque.remove_first(),
            Err(DequeError::StorageUnavailable(_))
        ));
        assert_eq!(deque.size(), 1);
        assert_eq!(deque.remove_first().unwrap(), "a");
    }

    /// Delegates to an in-memory store but fails the next `n` metadata writes.
    #[derive(Debug, Default)]
    struct MetaOutage {
        inner: InMemoryStore,
        failing_meta_writes: std::sync::atomic::AtomicUsize,
    }

    impl MetaOutage {
        fn fail_meta_writes(&self, count: usize) {
            self.failing_meta_writes
                .store(count, std::sync::atomic::Ordering::SeqCst);
        }

        fn check(&self, table: &str) -> Result<(), StoreError> {
            use std::sync::atomic::Ordering;
            if !table.ends_with(".meta") {
                return Ok(());
            }
            let tripped = self
                .failing_meta_writes
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if tripped {
                return Err(StoreError::unavailable("metadata table offline"));
            }
            Ok(())
        }
    }

    impl OrderedStore for MetaOutage {
        fn get(&self, table: &str, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
            self.inner.get(table, key)
        }

        fn put(&self, table: &str, key: &str, value: &[u8]) -> Result<bool, StoreError> {
            self.check(table)?;
            self.inner.put(table, key, value)
        }

        fn remove(&self, table: &str, key: &str) -> Result<bool, StoreError> {
            self.check(table)?;
            self.inner.remove(table, key)
        }

        fn size(&self, table: &str) -> Result<usize, StoreError> {
            self.inner.size(table)
        }

        fn iter<'a>(&'a self, table: &str) -> crate::store::StoreIter<'a> {
            self.inner.iter(table)
        }

        fn truncate(&self, table: &str) -> Result<(), StoreError> {
            self.inner.truncate(table)
        }
    }

    #[test]
    fn metadata_failure_after_committed_remove_still_returns_the_value() {
        let store = Arc::new(MetaOutage::default());
        let mut deque = PositionedDeque::open(store.clone(), "test-queue").unwrap();
        deque.add_all_last(["a", "b"]).unwrap();

        store.fail_meta_writes(1);
        assert_eq!(deque.remove_first().unwrap(), "a");
        assert_eq!(deque.size(), 1);
        assert_eq!(deque.remove_first().unwrap(), "b");
        assert!(deque.is_empty());
    }

    #[test]
    fn metadata_failure_after_committed_add_reports_success_once() {
        let store = Arc::new(MetaOutage::default());
        {
            let mut deque = PositionedDeque::open(store.clone(), "test-queue").unwrap();
            deque.add_last("a").unwrap();

            store.fail_meta_writes(1);
            assert_eq!(deque.add_last("b").unwrap(), Position::ZERO.next());
            assert_eq!(deque.size(), 2);
        }

        // The stale tail is corrected on reopen; nothing is duplicated.
        let deque = PositionedDeque::open(store, "test-queue").unwrap();
        let values: Vec<String> = deque.iter().map(Result::unwrap).collect();
        assert_eq!(values, vec!["a", "b"]);
    }

    #[test]
    fn metadata_failure_on_the_first_insert_is_recovered_by_scan() {
        let store = Arc::new(MetaOutage::default());
        {
            let mut deque = PositionedDeque::open(store.clone(), "test-queue").unwrap();
            store.fail_meta_writes(1);
            deque.add_last("only").unwrap();
        }

        let mut deque = PositionedDeque::open(store, "test-queue").unwrap();
        assert_eq!(deque.remove_first().unwrap(), "only");
    }

    #[test]
    fn open_rejects_empty_name() {
        let store = Arc::new(InMemoryStore::new());
        assert!(matches!(
            PositionedDeque::open(store, ""),
            Err(DequeError::InvalidArgument(_))
        ));
    }

    #[derive(Debug, Clone)]
    enum Op {
        AddFirst(u16),
        AddLast(u16),
        RemoveFirst,
        RemoveLast,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            any::<u16>().prop_map(Op::AddFirst),
            any::<u16>().prop_map(Op::AddLast),
            Just(Op::RemoveFirst),
            Just(Op::RemoveLast),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 64,
            ..ProptestConfig::default()
        })]

        /// Property: any interleaving of pushes and pops behaves like `VecDeque`.
        #[test]
        fn matches_vecdeque_model(ops in prop::collection::vec(op(), 1..200)) {
            let store = Arc::new(InMemoryStore::new());
            let mut deque = PositionedDeque::open(store.clone(), "model").unwrap();
            let mut model: VecDeque<String> = VecDeque::new();

            for op in ops {
                match op {
                    Op::AddFirst(v) => {
                        deque.add_first(&v.to_string()).unwrap();
                        model.push_front(v.to_string());
                    }
                    Op::AddLast(v) => {
                        deque.add_last(&v.to_string()).unwrap();
                        model.push_back(v.to_string());
                    }
                    Op::RemoveFirst => match model.pop_front() {
                        Some(expected) => prop_assert_eq!(deque.remove_first().unwrap(), expected),
                        None => prop_assert!(matches!(deque.remove_first(), Err(DequeError::EmptyQueue))),
                    },
                    Op::RemoveLast => match model.pop_back() {
                        Some(expected) => prop_assert_eq!(deque.remove_last().unwrap(), expected),
                        None => prop_assert!(matches!(deque.remove_last(), Err(DequeError::EmptyQueue))),
                    },
                }
                prop_assert_eq!(deque.size(), model.len());
                prop_assert_eq!(store.size("model").unwrap(), model.len());
            }

            let stored: Vec<String> = deque.iter().collect::<Result<_, _>>().unwrap();
            prop_assert_eq!(stored, model.iter().cloned().collect::<Vec<_>>());

            let reopened = PositionedDeque::open(store, "model").unwrap();
            prop_assert_eq!(reopened.size(), model.len());
        }
    }
}
