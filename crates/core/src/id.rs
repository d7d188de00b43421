//! Work item identifiers.

use core::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::position::encode_base36;

/// Opaque identifier attached to a queued work item.
///
/// Ids avoid collisions in logs; they are not guaranteed unique across
/// processes or restarts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn from_string(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Monotonic id source owned by one processor instance.
#[derive(Debug)]
pub struct IdGenerator {
    next: AtomicU64,
}

impl IdGenerator {
    /// Start at a random point so two processes rarely hand out the same ids.
    pub fn seeded_randomly() -> Self {
        Self::starting_at(u64::from(rand::random::<u32>()))
    }

    pub fn starting_at(seed: u64) -> Self {
        Self {
            next: AtomicU64::new(seed),
        }
    }

    pub fn next_id(&self) -> ItemId {
        let value = self.next.fetch_add(1, Ordering::Relaxed);
        ItemId(encode_base36(value, 1))
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::seeded_randomly()
    }
}
