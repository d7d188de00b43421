use std::iter::FusedIterator;

use tracing::warn;

use sspr_core::Position;

use super::{DequeError, PositionedDeque};
use crate::store::OrderedStore;

/// Lazy, one-shot walk over a deque's values.
///
/// Each step reads one record from the store. Positions with no record
/// (possible after a partial repair) are skipped. A store error ends the walk
/// after being yielded once.
#[derive(Debug)]
pub struct DequeIter<'a, S> {
    deque: &'a PositionedDeque<S>,
    cursor: Position,
    remaining: u64,
    forward: bool,
}

impl<'a, S: OrderedStore> DequeIter<'a, S> {
    pub(super) fn forward(deque: &'a PositionedDeque<S>) -> Self {
        let (cursor, remaining) = deque
            .bounds
            .map_or((Position::ZERO, 0), |b| (b.head, b.len()));
        Self {
            deque,
            cursor,
            remaining,
            forward: true,
        }
    }

    pub(super) fn backward(deque: &'a PositionedDeque<S>) -> Self {
        let (cursor, remaining) = deque
            .bounds
            .map_or((Position::ZERO, 0), |b| (b.tail, b.len()));
        Self {
            deque,
            cursor,
            remaining,
            forward: false,
        }
    }
}

impl<S: OrderedStore> Iterator for DequeIter<'_, S> {
    type Item = Result<String, DequeError>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.remaining > 0 {
            let position = self.cursor;
            self.cursor = if self.forward {
                position.next()
            } else {
                position.previous()
            };
            self.remaining -= 1;

            match self.deque.read_at(position) {
                Ok(Some(value)) => return Some(Ok(value)),
                Ok(None) => {
                    warn!(queue = %self.deque.name, %position, "skipping missing record");
                }
                Err(e) => {
                    self.remaining = 0;
                    return Some(Err(e));
                }
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining as usize))
    }
}

impl<S: OrderedStore> FusedIterator for DequeIter<'_, S> {}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::deque::PositionedDeque;
    use crate::memory::InMemoryStore;
    use crate::store::OrderedStore;

    #[test]
    fn walks_both_directions() {
        let store = Arc::new(InMemoryStore::new());
        let mut deque = PositionedDeque::open(store, "iter").unwrap();
        deque.add_last("b").unwrap();
        deque.add_last("c").unwrap();
        deque.add_first("a").unwrap();

        let forward: Vec<String> = deque.iter().map(Result::unwrap).collect();
        let backward: Vec<String> = deque.iter_rev().map(Result::unwrap).collect();

        assert_eq!(forward, vec!["a", "b", "c"]);
        assert_eq!(backward, vec!["c", "b", "a"]);
    }

    #[test]
    fn iterator_is_one_shot() {
        let store = Arc::new(InMemoryStore::new());
        let mut deque = PositionedDeque::open(store, "iter").unwrap();
        deque.add_all_last(["a", "b"]).unwrap();

        let mut it = deque.iter();
        assert_eq!(it.by_ref().count(), 2);
        assert!(it.next().is_none());
    }

    #[test]
    fn skips_holes_and_stops_on_error() {
        let store = Arc::new(InMemoryStore::new());
        let mut deque = PositionedDeque::open(store.clone(), "iter").unwrap();
        deque.add_all_last(["a", "b", "c"]).unwrap();
        store.remove("iter", "000001").unwrap();

        let values: Vec<String> = deque.iter().map(Result::unwrap).collect();
        assert_eq!(values, vec!["a", "c"]);

        store.fail_next(1);
        let mut it = deque.iter();
        assert!(it.next().unwrap().is_err());
        assert!(it.next().is_none());
    }
}
