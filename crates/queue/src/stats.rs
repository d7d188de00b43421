//! Runtime counters.

use std::time::Instant;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

/// Point-in-time processor statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProcessorStats {
    pub submitted: u64,
    /// Items completed on a pre-dispatch thread without touching storage.
    pub fast_path_succeeded: u64,
    /// Submissions that found the pool saturated.
    pub fast_path_rejected: u64,
    /// Items written to the durable queue.
    pub enqueued: u64,
    /// Calls to the item processor, on either path.
    pub attempts: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub retried: u64,
    pub noop: u64,
    /// Items dropped for exceeding the retry discard age.
    pub discarded: u64,
    /// Records dropped because they could not be decoded.
    pub corrupt_discarded: u64,
    /// Processor panics.
    pub faults: u64,
    pub submit_timeouts: u64,
    pub queue_size: usize,
    /// Mean enqueue-to-success time.
    pub average_lag_ms: u64,
    pub last_success: Option<DateTime<Utc>>,
    pub uptime_secs: u64,
}

#[derive(Debug)]
pub(crate) struct StatsRecorder {
    started: Instant,
    inner: Mutex<Recorded>,
}

#[derive(Debug, Default)]
struct Recorded {
    stats: ProcessorStats,
    total_lag_ms: u64,
}

impl StatsRecorder {
    pub(crate) fn new() -> Self {
        Self {
            started: Instant::now(),
            inner: Mutex::new(Recorded::default()),
        }
    }

    pub(crate) fn record(&self, update: impl FnOnce(&mut ProcessorStats)) {
        update(&mut self.inner.lock().stats);
    }

    pub(crate) fn success(&self, enqueued_at: DateTime<Utc>, now: DateTime<Utc>) {
        let lag_ms = (now - enqueued_at).num_milliseconds().max(0) as u64;
        let mut inner = self.inner.lock();
        inner.total_lag_ms = inner.total_lag_ms.saturating_add(lag_ms);
        inner.stats.succeeded += 1;
        inner.stats.last_success = Some(now);
    }

    pub(crate) fn snapshot(&self, queue_size: usize) -> ProcessorStats {
        let inner = self.inner.lock();
        let mut stats = inner.stats.clone();
        stats.queue_size = queue_size;
        stats.average_lag_ms = inner.total_lag_ms.checked_div(stats.succeeded).unwrap_or(0);
        stats.uptime_secs = self.started.elapsed().as_secs();
        stats
    }
}
