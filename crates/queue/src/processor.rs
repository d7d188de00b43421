//! Public processor handle.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use sspr_core::ItemId;
use sspr_storage::{OrderedStore, PositionedDeque};

use crate::envelope::WorkItemEnvelope;
use crate::error::ProcessorError;
use crate::item::{ItemProcessor, WorkItem};
use crate::pool::PreDispatchPool;
use crate::registry::CodecRegistry;
use crate::settings::{DispatchMode, ProcessorSettings};
use crate::stats::ProcessorStats;
use crate::worker::{self, Shared};

/// Extra time allowed for the drain thread to notice the shutdown deadline.
const JOIN_GRACE: Duration = Duration::from_millis(100);

/// Durable, retrying work queue for one item type.
///
/// # Example
///
/// ```no_run
/// use serde::{Deserialize, Serialize};
/// use sspr_queue::{ProcessOutcome, ProcessorSettings, WorkItem, WorkQueueProcessor};
/// use sspr_storage::InMemoryStore;
///
/// #[derive(Debug, Serialize, Deserialize)]
/// struct Mail {
///     to: String,
/// }
///
/// impl WorkItem for Mail {
///     const TYPE_TAG: &'static str = "mail.send";
/// }
///
/// let processor = WorkQueueProcessor::new(
///     InMemoryStore::new(),
///     ProcessorSettings::named("outbound-mail").with_pre_dispatch_threads(2),
///     |mail: &Mail| {
///         println!("sending to {}", mail.to);
///         ProcessOutcome::Success
///     },
/// )?;
///
/// processor.submit(Mail { to: "ops@example.com".into() })?;
/// processor.close();
/// # Ok::<(), sspr_queue::ProcessorError>(())
/// ```
pub struct WorkQueueProcessor<T: WorkItem, S: OrderedStore + 'static> {
    shared: Arc<Shared<T, S>>,
    pool: Mutex<Option<PreDispatchPool>>,
    worker: Mutex<Option<thread::JoinHandle<()>>>,
    closed: AtomicBool,
}

impl<T: WorkItem, S: OrderedStore + 'static> WorkQueueProcessor<T, S> {
    /// Open the queue named by `settings` in `store` and start processing.
    /// Items left over from a previous run are picked up immediately.
    pub fn new<P>(store: S, settings: ProcessorSettings, processor: P) -> Result<Self, ProcessorError>
    where
        P: ItemProcessor<T>,
    {
        Self::with_registry(store, settings, processor, CodecRegistry::new())
    }

    /// Like [`new`](Self::new), decoding stored items with `registry`.
    pub fn with_registry<P>(
        store: S,
        settings: ProcessorSettings,
        processor: P,
        registry: CodecRegistry<T>,
    ) -> Result<Self, ProcessorError>
    where
        P: ItemProcessor<T>,
    {
        settings.validate()?;
        let deque = PositionedDeque::open(store, settings.name.clone())?;
        let backlog = deque.size();
        let mode = settings.dispatch_mode();
        let name = settings.name.clone();

        let shared = Arc::new(Shared::new(settings, deque, Box::new(processor), registry));

        let pool = match mode {
            DispatchMode::PreDispatch(threads) => Some(PreDispatchPool::new(&name, threads)?),
            DispatchMode::QueueOnly | DispatchMode::Inline => None,
        };

        let worker = match mode {
            DispatchMode::Inline => None,
            DispatchMode::PreDispatch(_) | DispatchMode::QueueOnly => {
                let shared = shared.clone();
                let handle = thread::Builder::new()
                    .name(format!("{name}-drain"))
                    .spawn(move || worker::run(shared))
                    .map_err(|e| ProcessorError::Spawn(format!("drain worker: {e}")))?;
                Some(handle)
            }
        };

        info!(queue = %name, ?mode, backlog, "work queue processor started");
        let processor = Self {
            shared,
            pool: Mutex::new(pool),
            worker: Mutex::new(worker),
            closed: AtomicBool::new(false),
        };
        if mode == DispatchMode::Inline && backlog > 0 {
            processor.shared.drain_inline();
        }
        Ok(processor)
    }

    pub fn name(&self) -> &str {
        &self.shared.settings.name
    }

    pub fn settings(&self) -> &ProcessorSettings {
        &self.shared.settings
    }

    /// Accept `item` for delivery.
    ///
    /// Returns once the item is either handed to a pre-dispatch thread or
    /// durably enqueued. Blocks up to `max_submit_wait` while the durable queue
    /// is full. In inline mode the queue is also drained on this thread before
    /// returning.
    pub fn submit(&self, item: T) -> Result<ItemId, ProcessorError> {
        if self.is_closed() {
            return Err(ProcessorError::Closed);
        }

        let shared = &self.shared;
        let envelope = WorkItemEnvelope::wrap(shared.ids.next_id(), &item, Utc::now())?;
        let id = envelope.id().clone();
        shared.stats.record(|s| s.submitted += 1);

        match shared.settings.dispatch_mode() {
            DispatchMode::PreDispatch(_) => {
                let rejected = {
                    let pool = self.pool.lock();
                    match pool.as_ref() {
                        Some(pool) => {
                            let job_shared = shared.clone();
                            let job_envelope = envelope.clone();
                            pool.try_dispatch(Box::new(move || {
                                job_shared.fast_path(item, job_envelope)
                            }))
                            .is_err()
                        }
                        None => true,
                    }
                };
                if rejected {
                    shared.stats.record(|s| s.fast_path_rejected += 1);
                    debug!(queue = %self.name(), item_id = %id, "pre-dispatch pool saturated");
                    shared.enqueue(&envelope)?;
                }
            }
            DispatchMode::QueueOnly => {
                shared.enqueue(&envelope)?;
            }
            DispatchMode::Inline => {
                shared.drain_inline();
                shared.enqueue(&envelope)?;
                shared.drain_inline();
            }
        }
        Ok(id)
    }

    /// Items currently in the durable queue.
    pub fn queue_size(&self) -> usize {
        self.shared.deque.lock().size()
    }

    /// Enqueue time of the item at the head of the durable queue.
    pub fn eldest_item(&self) -> Result<Option<DateTime<Utc>>, ProcessorError> {
        let head = self.shared.deque.lock().peek_first()?;
        head.map(|raw| WorkItemEnvelope::decode(&raw).map(|e| e.enqueued_at()))
            .transpose()
    }

    pub fn stats(&self) -> ProcessorStats {
        self.shared.stats.snapshot(self.queue_size())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Stop accepting work and drain for up to `max_shutdown_wait`.
    ///
    /// Pre-dispatch jobs already accepted get to finish within the same wait;
    /// pool threads still busy at the deadline are detached. Anything still
    /// queued when the wait runs out stays in the store for the next start.
    /// Returns the number of items left behind. Safe to call twice.
    pub fn close(&self) -> usize {
        if self.closed.swap(true, Ordering::SeqCst) {
            return self.queue_size();
        }
        let started = Instant::now();
        let deadline = started.checked_add(self.shared.settings.max_shutdown_wait);
        info!(queue = %self.name(), "closing work queue processor");

        let pool = self.pool.lock().take();
        if let Some(mut pool) = pool {
            pool.shutdown_until(deadline);
        }

        self.shared.begin_shutdown(deadline);
        match self.worker.lock().take() {
            Some(handle) => {
                let join_by = deadline.and_then(|d| d.checked_add(JOIN_GRACE));
                if self.shared.wait_for_worker(join_by) {
                    let _ = handle.join();
                } else {
                    warn!(
                        queue = %self.name(),
                        "drain thread still busy after shutdown wait, detaching"
                    );
                }
            }
            None => self.shared.drain_until_deadline(),
        }

        let remaining = self.queue_size();
        if remaining > 0 {
            warn!(
                queue = %self.name(),
                remaining,
                "work queue closed with items still queued; they will be delivered after restart"
            );
        } else {
            info!(
                queue = %self.name(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "work queue processor closed"
            );
        }
        remaining
    }
}

impl<T: WorkItem, S: OrderedStore + 'static> Drop for WorkQueueProcessor<T, S> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<T: WorkItem, S: OrderedStore + 'static> fmt::Debug for WorkQueueProcessor<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkQueueProcessor")
            .field("name", &self.name())
            .field("item_type", &T::TYPE_TAG)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
