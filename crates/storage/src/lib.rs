//! `sspr-storage`: ordered key-value store contract and the positioned deque
//! built on top of it.

pub mod deque;
pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod store;

pub use deque::{DequeError, DequeIter, DequeReport, PositionedDeque};
pub use memory::InMemoryStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
pub use store::{OrderedStore, StoreError, StoreIter};
