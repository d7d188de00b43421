//! Drain loop and shared processor state.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

use sspr_core::{IdGenerator, ItemId, Position};
use sspr_storage::{DequeError, OrderedStore, PositionedDeque};

use crate::envelope::WorkItemEnvelope;
use crate::error::ProcessorError;
use crate::item::{ItemProcessor, ProcessOutcome, WorkItem};
use crate::registry::CodecRegistry;
use crate::settings::ProcessorSettings;
use crate::stats::StatsRecorder;

/// Pause before re-attempting an item that returned `Noop`.
pub(crate) const NOOP_PAUSE: Duration = Duration::from_millis(25);

/// Why a drain pass stopped.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Drained {
    Empty,
    /// The head item (or the store) needs another attempt after this pause.
    Paused(Duration),
}

#[derive(Debug, Default)]
struct Signal {
    work_pending: bool,
    shutdown_deadline: Option<Instant>,
    worker_stopped: bool,
}

/// State shared by the public handle, the drain thread and pool threads.
pub(crate) struct Shared<T: WorkItem, S> {
    pub(crate) settings: ProcessorSettings,
    pub(crate) deque: Mutex<PositionedDeque<S>>,
    /// Notified whenever the durable queue shrinks. Paired with `deque`.
    space: Condvar,
    signal: Mutex<Signal>,
    wake: Condvar,
    stopped: Condvar,
    /// Serializes inline drains.
    drain_lock: Mutex<()>,
    /// Inline mode's retry timer.
    retry_at: Mutex<Option<Instant>>,
    processor: Box<dyn ItemProcessor<T>>,
    registry: CodecRegistry<T>,
    pub(crate) ids: IdGenerator,
    pub(crate) stats: StatsRecorder,
}

impl<T: WorkItem, S: OrderedStore + 'static> Shared<T, S> {
    pub(crate) fn new(
        settings: ProcessorSettings,
        deque: PositionedDeque<S>,
        processor: Box<dyn ItemProcessor<T>>,
        registry: CodecRegistry<T>,
    ) -> Self {
        Self {
            settings,
            deque: Mutex::new(deque),
            space: Condvar::new(),
            signal: Mutex::new(Signal::default()),
            wake: Condvar::new(),
            stopped: Condvar::new(),
            drain_lock: Mutex::new(()),
            retry_at: Mutex::new(None),
            processor,
            registry,
            ids: IdGenerator::seeded_randomly(),
            stats: StatsRecorder::new(),
        }
    }

    fn name(&self) -> &str {
        &self.settings.name
    }

    /// Write `envelope` to the tail of the durable queue, waiting up to
    /// `max_submit_wait` for space.
    pub(crate) fn enqueue(&self, envelope: &WorkItemEnvelope) -> Result<Position, ProcessorError> {
        let record = envelope.encode()?;
        let max_depth = self.settings.max_queue_depth;
        let deadline = Instant::now().checked_add(self.settings.max_submit_wait);

        let mut deque = self.deque.lock();
        while deque.size() >= max_depth {
            let timed_out = match deadline {
                Some(deadline) => self.space.wait_until(&mut deque, deadline).timed_out(),
                None => {
                    self.space.wait(&mut deque);
                    false
                }
            };
            if timed_out && deque.size() >= max_depth {
                drop(deque);
                self.stats.record(|s| s.submit_timeouts += 1);
                warn!(
                    queue = %self.name(),
                    item_id = %envelope.id(),
                    max_depth,
                    "queue stayed full, rejecting submission"
                );
                return Err(ProcessorError::QueueSubmitTimeout(
                    self.settings.max_submit_wait,
                ));
            }
        }
        let position = deque.add_last(&record)?;
        drop(deque);

        self.stats.record(|s| s.enqueued += 1);
        debug!(queue = %self.name(), item_id = %envelope.id(), %position, "item enqueued");
        self.notify_work();
        Ok(position)
    }

    pub(crate) fn notify_work(&self) {
        let mut signal = self.signal.lock();
        signal.work_pending = true;
        self.wake.notify_all();
    }

    /// One processing attempt. `None` means the processor panicked.
    fn attempt(&self, item: &T, id: &ItemId) -> Option<ProcessOutcome> {
        self.stats.record(|s| s.attempts += 1);
        debug!(
            queue = %self.name(),
            item_id = %id,
            item = %self.processor.debug_representation(item),
            "processing item"
        );
        match panic::catch_unwind(AssertUnwindSafe(|| self.processor.process(item))) {
            Ok(outcome) => Some(outcome),
            Err(payload) => {
                self.stats.record(|s| s.faults += 1);
                error!(
                    queue = %self.name(),
                    item_id = %id,
                    panic = %panic_message(payload.as_ref()),
                    "item processor panicked, treating as transient"
                );
                None
            }
        }
    }

    /// Body of a pre-dispatch job.
    pub(crate) fn fast_path(&self, item: T, envelope: WorkItemEnvelope) {
        match self.attempt(&item, envelope.id()) {
            Some(ProcessOutcome::Success) => {
                self.stats.record(|s| s.fast_path_succeeded += 1);
                self.stats.success(envelope.enqueued_at(), Utc::now());
                debug!(queue = %self.name(), item_id = %envelope.id(), "delivered on fast path");
            }
            Some(ProcessOutcome::Failed) => {
                self.stats.record(|s| s.failed += 1);
                warn!(queue = %self.name(), item_id = %envelope.id(), "item failed permanently, dropping");
            }
            outcome => {
                self.count_deferral(outcome);
                debug!(
                    queue = %self.name(),
                    item_id = %envelope.id(),
                    outcome = ?outcome,
                    "fast path deferred to durable queue"
                );
                if let Err(error) = self.enqueue(&envelope) {
                    error!(
                        queue = %self.name(),
                        item_id = %envelope.id(),
                        %error,
                        "failed to enqueue deferred item, item lost"
                    );
                }
            }
        }
    }

    fn count_deferral(&self, outcome: Option<ProcessOutcome>) {
        match outcome {
            Some(ProcessOutcome::Noop) => self.stats.record(|s| s.noop += 1),
            Some(ProcessOutcome::Retry) => self.stats.record(|s| s.retried += 1),
            _ => {}
        }
    }

    /// Process items from the head until the queue is empty or the head item
    /// asks to be retried later.
    pub(crate) fn drain(&self) -> Drained {
        let backoff = self.settings.retry_interval.max(NOOP_PAUSE);
        loop {
            if self.shutdown_expired() {
                return Drained::Paused(Duration::ZERO);
            }

            let head = self.deque.lock().peek_first();
            let raw = match head {
                Ok(None) => return Drained::Empty,
                Ok(Some(raw)) => raw,
                Err(DequeError::Corrupt { position, reason }) => {
                    warn!(queue = %self.name(), %position, %reason, "discarding unreadable record");
                    self.stats.record(|s| s.corrupt_discarded += 1);
                    if self.remove_head().is_err() {
                        return Drained::Paused(backoff);
                    }
                    continue;
                }
                Err(error) => {
                    error!(queue = %self.name(), %error, "failed to read queue head");
                    return Drained::Paused(backoff);
                }
            };

            let envelope = match WorkItemEnvelope::decode(&raw) {
                Ok(envelope) => envelope,
                Err(error) => {
                    warn!(queue = %self.name(), %error, "discarding malformed envelope");
                    self.stats.record(|s| s.corrupt_discarded += 1);
                    if self.remove_head().is_err() {
                        return Drained::Paused(backoff);
                    }
                    continue;
                }
            };

            let age = envelope.age(Utc::now()).to_std().unwrap_or_default();
            if age > self.settings.retry_discard_age {
                warn!(
                    queue = %self.name(),
                    item_id = %envelope.id(),
                    age_ms = age.as_millis() as u64,
                    "discarding item older than retry discard age"
                );
                self.stats.record(|s| s.discarded += 1);
                if self.remove_head().is_err() {
                    return Drained::Paused(backoff);
                }
                continue;
            }

            let item = match self.registry.decode(&envelope) {
                Ok(item) => item,
                Err(error) => {
                    warn!(queue = %self.name(), item_id = %envelope.id(), %error, "discarding undecodable item");
                    self.stats.record(|s| s.corrupt_discarded += 1);
                    if self.remove_head().is_err() {
                        return Drained::Paused(backoff);
                    }
                    continue;
                }
            };

            let outcome = self.attempt(&item, envelope.id());
            match outcome {
                Some(ProcessOutcome::Success) => {
                    let removed = self.remove_head();
                    self.stats.success(envelope.enqueued_at(), Utc::now());
                    debug!(queue = %self.name(), item_id = %envelope.id(), "item delivered");
                    if removed.is_err() {
                        // Delivered but still stored; it will be delivered again.
                        return Drained::Paused(backoff);
                    }
                }
                Some(ProcessOutcome::Failed) => {
                    let removed = self.remove_head();
                    self.stats.record(|s| s.failed += 1);
                    warn!(queue = %self.name(), item_id = %envelope.id(), "item failed permanently, dropping");
                    if removed.is_err() {
                        return Drained::Paused(backoff);
                    }
                }
                Some(ProcessOutcome::Retry) | None => {
                    self.count_deferral(outcome);
                    debug!(
                        queue = %self.name(),
                        item_id = %envelope.id(),
                        retry_in_ms = self.settings.retry_interval.as_millis() as u64,
                        "item will be retried"
                    );
                    return Drained::Paused(self.settings.retry_interval);
                }
                Some(ProcessOutcome::Noop) => {
                    self.count_deferral(outcome);
                    return Drained::Paused(NOOP_PAUSE.min(self.settings.retry_interval));
                }
            }
        }
    }

    /// Drop the head record. A record that turns out to be unreadable is
    /// removed all the same.
    fn remove_head(&self) -> Result<(), DequeError> {
        let result = self.deque.lock().remove_first();
        match result {
            Ok(_) | Err(DequeError::Corrupt { .. }) | Err(DequeError::EmptyQueue) => {
                self.space.notify_all();
                Ok(())
            }
            Err(error) => {
                error!(queue = %self.name(), %error, "failed to remove queue head");
                Err(error)
            }
        }
    }

    /// Drain on the caller's thread unless another caller is already draining
    /// or the retry timer has not expired.
    pub(crate) fn drain_inline(&self) {
        let Some(_guard) = self.drain_lock.try_lock() else {
            return;
        };
        {
            let mut retry_at = self.retry_at.lock();
            if retry_at.is_some_and(|at| Instant::now() < at) {
                return;
            }
            *retry_at = None;
        }
        if let Drained::Paused(pause) = self.drain() {
            *self.retry_at.lock() = Instant::now().checked_add(pause);
        }
    }

    /// Final inline drain during `close`, bounded by the shutdown deadline.
    pub(crate) fn drain_until_deadline(&self) {
        let _guard = self.drain_lock.lock();
        while let Drained::Paused(pause) = self.drain() {
            let deadline = self.signal.lock().shutdown_deadline;
            let resume = Instant::now().checked_add(pause);
            match (deadline, resume) {
                (Some(deadline), Some(resume)) if resume < deadline => std::thread::sleep(pause),
                _ => break,
            }
        }
    }

    pub(crate) fn begin_shutdown(&self, deadline: Option<Instant>) {
        let mut signal = self.signal.lock();
        signal.shutdown_deadline = Some(deadline.unwrap_or_else(Instant::now));
        self.wake.notify_all();
        // Wake submitters waiting for space as well.
        drop(signal);
        self.space.notify_all();
    }

    fn shutdown_expired(&self) -> bool {
        self.signal
            .lock()
            .shutdown_deadline
            .is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Wait until the drain thread exits or `deadline` passes.
    pub(crate) fn wait_for_worker(&self, deadline: Option<Instant>) -> bool {
        let mut signal = self.signal.lock();
        while !signal.worker_stopped {
            match deadline {
                Some(deadline) => {
                    if self.stopped.wait_until(&mut signal, deadline).timed_out() {
                        return signal.worker_stopped;
                    }
                }
                None => self.stopped.wait(&mut signal),
            }
        }
        true
    }

    /// Park the drain thread.
    ///
    /// With no timer, wake on new work or shutdown. With a retry timer, only
    /// the timer (capped by the shutdown deadline) ends the wait: new work
    /// queues behind the head item, so waking for it would re-attempt the
    /// head early.
    fn wait_for_work(&self, signal: &mut MutexGuard<'_, Signal>, until: Option<Instant>) {
        loop {
            match until {
                None => {
                    if signal.work_pending {
                        signal.work_pending = false;
                        return;
                    }
                    if signal.shutdown_deadline.is_some() {
                        return;
                    }
                    self.wake.wait(signal);
                }
                Some(until) => {
                    let limit = signal
                        .shutdown_deadline
                        .map_or(until, |deadline| until.min(deadline));
                    if Instant::now() >= limit {
                        return;
                    }
                    self.wake.wait_until(signal, limit);
                }
            }
        }
    }
}

/// Drain thread body.
pub(crate) fn run<T: WorkItem, S: OrderedStore + 'static>(shared: Arc<Shared<T, S>>) {
    info!(queue = %shared.name(), "work queue worker started");
    loop {
        // Everything enqueued so far is visible to this pass.
        shared.signal.lock().work_pending = false;
        let drained = shared.drain();
        let mut signal = shared.signal.lock();
        let until = match (drained, signal.shutdown_deadline) {
            (Drained::Empty, Some(_)) => break,
            (_, Some(deadline)) if Instant::now() >= deadline => break,
            (Drained::Empty, None) => None,
            (Drained::Paused(pause), _) => Instant::now().checked_add(pause),
        };
        shared.wait_for_work(&mut signal, until);
    }

    let remaining = shared.deque.lock().size();
    info!(queue = %shared.name(), remaining, "work queue worker stopped");
    let mut signal = shared.signal.lock();
    signal.worker_stopped = true;
    shared.stopped.notify_all();
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
