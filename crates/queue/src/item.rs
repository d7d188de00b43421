//! Work item and processing contracts.

use core::fmt;

use serde::Serialize;
use serde::de::DeserializeOwned;

/// A unit of work that can be queued durably.
///
/// `TYPE_TAG` is written into every envelope and selects the decoder when the
/// item is read back (see [`CodecRegistry`](crate::CodecRegistry)). Keep it
/// stable across releases.
pub trait WorkItem: Serialize + DeserializeOwned + fmt::Debug + Send + Sync + 'static {
    const TYPE_TAG: &'static str;
}

/// Result of one processing attempt.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ProcessOutcome {
    /// Delivered. The item is removed.
    Success,
    /// Permanent failure. The item is removed and not retried.
    Failed,
    /// Transient failure. The item stays at the head and is retried after
    /// the retry interval.
    Retry,
    /// Nothing went wrong but the item is not actionable yet. Scheduled like
    /// `Retry`, without waiting out the retry interval.
    Noop,
}

impl ProcessOutcome {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessOutcome::Success | ProcessOutcome::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessOutcome::Success => "success",
            ProcessOutcome::Failed => "failed",
            ProcessOutcome::Retry => "retry",
            ProcessOutcome::Noop => "noop",
        }
    }
}

impl fmt::Display for ProcessOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-supplied processing function for one queue.
///
/// Called from the fast-path pool threads and from the drain thread, possibly
/// more than once for the same item.
pub trait ItemProcessor<T: WorkItem>: Send + Sync + 'static {
    fn process(&self, item: &T) -> ProcessOutcome;

    /// Rendering used in log lines only.
    fn debug_representation(&self, item: &T) -> String {
        format!("{item:?}")
    }
}

impl<T, F> ItemProcessor<T> for F
where
    T: WorkItem,
    F: Fn(&T) -> ProcessOutcome + Send + Sync + 'static,
{
    fn process(&self, item: &T) -> ProcessOutcome {
        self(item)
    }
}
