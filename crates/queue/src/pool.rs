//! Bounded pre-dispatch pool.
//!
//! A fixed set of named threads fed by a channel holding at most one job per
//! thread. `try_dispatch` never blocks: when every thread is busy and the
//! channel is full, the job comes back to the caller.

use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::Instant;

use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use tracing::{debug, error, info, warn};

use crate::error::ProcessorError;

pub type Job = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug)]
pub struct PreDispatchPool {
    name: String,
    sender: Option<Sender<Job>>,
    workers: Vec<thread::JoinHandle<()>>,
    /// Index of each worker that has left its job loop.
    finished: Receiver<usize>,
}

impl PreDispatchPool {
    pub fn new(name: &str, threads: usize) -> Result<Self, ProcessorError> {
        let threads = threads.max(1);
        let (sender, receiver) = channel::bounded::<Job>(threads);
        let (finished_tx, finished) = channel::unbounded::<usize>();

        let mut workers = Vec::with_capacity(threads);
        for index in 0..threads {
            let receiver = receiver.clone();
            let finished_tx = finished_tx.clone();
            let pool = name.to_string();
            let worker = thread::Builder::new()
                .name(format!("{name}-pre-{index}"))
                .spawn(move || {
                    for job in receiver.iter() {
                        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                            error!(pool = %pool, worker = index, "pre-dispatch job panicked");
                        }
                    }
                    debug!(pool = %pool, worker = index, "pre-dispatch worker stopped");
                    let _ = finished_tx.send(index);
                })
                .map_err(|e| ProcessorError::Spawn(format!("pre-dispatch worker: {e}")))?;
            workers.push(worker);
        }

        info!(pool = %name, threads, "pre-dispatch pool started");
        Ok(Self {
            name: name.to_string(),
            sender: Some(sender),
            workers,
            finished,
        })
    }

    pub fn threads(&self) -> usize {
        self.workers.len()
    }

    /// Hand `job` to an idle thread, or return it if the pool is saturated or
    /// shut down.
    pub fn try_dispatch(&self, job: Job) -> Result<(), Job> {
        let Some(sender) = &self.sender else {
            return Err(job);
        };
        sender.try_send(job).map_err(|e| match e {
            TrySendError::Full(job) | TrySendError::Disconnected(job) => job,
        })
    }

    /// Stop accepting jobs, run what is already queued, and join the threads.
    pub fn shutdown(&mut self) {
        self.shutdown_until(None);
    }

    /// Like [`shutdown`](Self::shutdown), but stop waiting at `deadline`.
    ///
    /// Threads still running a job at the deadline are detached and finish
    /// on their own. Returns how many were detached.
    pub fn shutdown_until(&mut self, deadline: Option<Instant>) -> usize {
        if self.sender.take().is_none() {
            return 0;
        }

        let mut workers: Vec<Option<thread::JoinHandle<()>>> =
            self.workers.drain(..).map(Some).collect();
        let mut running = workers.len();
        while running > 0 {
            let finished = match deadline {
                Some(deadline) => self.finished.recv_deadline(deadline).ok(),
                None => self.finished.recv().ok(),
            };
            let Some(index) = finished else {
                break;
            };
            if let Some(worker) = workers.get_mut(index).and_then(Option::take) {
                let _ = worker.join();
                running -= 1;
            }
        }

        if running > 0 {
            warn!(
                pool = %self.name,
                busy = running,
                "pre-dispatch threads still busy at shutdown deadline, detaching"
            );
        } else {
            info!(pool = %self.name, "pre-dispatch pool stopped");
        }
        running
    }
}

impl Drop for PreDispatchPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
