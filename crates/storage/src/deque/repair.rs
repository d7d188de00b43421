//! Boundary repair.
//!
//! The boundary metadata is written after the data record it describes, so a
//! crash can leave it one slot stale in either direction:
//!
//! - a pop deleted the record but not the metadata: the recorded head (or
//!   tail) points at a missing record, probe inward for the first present one
//! - a push wrote the record but not the metadata: a record sits just outside
//!   the recorded boundary, probe outward while neighbours exist
//!
//! Afterwards the nominal size is reconciled with the store's record count.
//! If they still disagree, or the metadata is gone entirely, the boundary is
//! rebuilt from a full scan: elements form one contiguous arc of the ring, so
//! the largest circular gap between stored positions separates tail from head.

use tracing::{info, warn};

use sspr_core::Position;

use super::{Bounds, DequeError, PositionedDeque};
use crate::store::OrderedStore;

/// Result of a full consistency scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DequeReport {
    /// `distance(head, tail) + 1`, or zero.
    pub nominal_size: usize,
    /// Records actually present in the data table.
    pub stored_records: usize,
    /// Positions inside the boundary with no record (first 64 only).
    pub missing: Vec<Position>,
    /// Records outside the boundary or with keys that are not positions.
    pub stray_records: usize,
}

impl DequeReport {
    pub fn is_consistent(&self) -> bool {
        self.missing.is_empty()
            && self.stray_records == 0
            && self.nominal_size == self.stored_records
    }
}

const MAX_REPORTED_MISSING: usize = 64;

impl<S: OrderedStore> PositionedDeque<S> {
    /// Re-derive the boundary from stored records. Returns whether it changed.
    pub fn repair(&mut self) -> Result<bool, DequeError> {
        let stored = self.store.size(&self.name)?;
        let before = self.bounds;

        let mut bounds = if stored == 0 {
            None
        } else {
            match before {
                Some(b) => self.probe(b, stored)?,
                None => None,
            }
        };

        let nominal = bounds.map_or(0, |b: Bounds| b.len() as usize);
        if stored > 0 && nominal != stored {
            warn!(
                queue = %self.name,
                nominal,
                stored,
                "boundary disagrees with stored records, rebuilding from full scan"
            );
            bounds = self.rebuild_from_scan()?;
        }

        if bounds == before {
            return Ok(false);
        }

        warn!(
            queue = %self.name,
            old_head = ?before.map(|b| b.head.key()),
            old_tail = ?before.map(|b| b.tail.key()),
            new_head = ?bounds.map(|b| b.head.key()),
            new_tail = ?bounds.map(|b| b.tail.key()),
            "corrected queue boundary"
        );
        if let Some(b) = bounds {
            self.anchor = b.head;
        }
        self.bounds = bounds;
        self.persist_bounds()?;
        Ok(true)
    }

    /// Full scan comparing the boundary with the stored records.
    pub fn verify(&self) -> Result<DequeReport, DequeError> {
        let stored_records = self.store.size(&self.name)?;
        let nominal_size = self.size();

        let mut missing = Vec::new();
        let mut present = 0usize;
        if let Some(b) = self.bounds {
            let mut position = b.head;
            for _ in 0..b.len() {
                if self.store.contains(&self.name, &position.key())? {
                    present += 1;
                } else if missing.len() < MAX_REPORTED_MISSING {
                    missing.push(position);
                }
                position = position.next();
            }
        }

        let report = DequeReport {
            nominal_size,
            stored_records,
            missing,
            stray_records: stored_records.saturating_sub(present),
        };
        info!(queue = %self.name, ?report, "verified positioned deque");
        Ok(report)
    }

    /// Steps 2 and 3: fix a stale head/tail by probing. `None` means the
    /// recorded boundary is unusable and a full scan is required.
    fn probe(&self, mut b: Bounds, stored: usize) -> Result<Option<Bounds>, DequeError> {
        let nominal = b.len();
        // A crash leaves at most the head and the tail slot stale. A wider
        // span means garbled metadata, and walking it slot by slot could
        // touch the whole ring.
        if nominal > stored as u64 + 2 {
            warn!(queue = %self.name, nominal, stored, "recorded boundary spans far more slots than records");
            return Ok(None);
        }

        if !self.exists(b.head)? {
            match self.first_present(b.head, nominal, true)? {
                Some(head) => b.head = head,
                None => return Ok(None),
            }
        }

        if !self.exists(b.tail)? {
            let span = b.head.distance_to(b.tail) + 1;
            match self.first_present(b.tail, span, false)? {
                Some(tail) => b.tail = tail,
                None => return Ok(None),
            }
        }

        let mut extended = 0usize;
        while extended < stored && b.len() < Position::CAPACITY {
            let candidate = b.tail.next();
            if !self.exists(candidate)? {
                break;
            }
            b.tail = candidate;
            extended += 1;
        }

        while extended < stored && b.len() < Position::CAPACITY {
            let candidate = b.head.previous();
            if !self.exists(candidate)? {
                break;
            }
            b.head = candidate;
            extended += 1;
        }

        Ok(Some(b))
    }

    /// First position holding a record, starting at `from` and walking at
    /// most `limit` slots in the given direction.
    fn first_present(
        &self,
        from: Position,
        limit: u64,
        forward: bool,
    ) -> Result<Option<Position>, DequeError> {
        let mut position = from;
        for _ in 0..limit {
            if self.exists(position)? {
                return Ok(Some(position));
            }
            position = if forward {
                position.next()
            } else {
                position.previous()
            };
        }
        Ok(None)
    }

    fn exists(&self, position: Position) -> Result<bool, DequeError> {
        Ok(self.store.contains(&self.name, &position.key())?)
    }

    /// Step 4: the boundary is the largest circular gap between stored positions.
    fn rebuild_from_scan(&self) -> Result<Option<Bounds>, DequeError> {
        let mut positions = Vec::new();
        for entry in self.store.iter(&self.name) {
            let (key, _) = entry?;
            match key.parse::<Position>() {
                Ok(position) => positions.push(position),
                Err(error) => {
                    warn!(queue = %self.name, key, %error, "ignoring record with a non-position key")
                }
            }
        }

        if positions.is_empty() {
            return Ok(None);
        }
        positions.sort_by_key(|p| p.value());

        let count = positions.len();
        let mut widest = (0usize, 0u64);
        for i in 0..count {
            let current = positions[i];
            let following = positions[(i + 1) % count];
            let gap = match current.distance_to(following) {
                0 => Position::CAPACITY,
                d => d,
            };
            if gap > widest.1 {
                widest = (i, gap);
            }
        }

        let tail = positions[widest.0];
        let head = positions[(widest.0 + 1) % count];
        let bounds = Bounds { head, tail };

        if bounds.len() as usize != count {
            warn!(
                queue = %self.name,
                nominal = bounds.len(),
                stored = count,
                "stored records are not contiguous"
            );
        }
        Ok(Some(bounds))
    }
}
