//! `sspr-queue`: persistent asynchronous work queue.
//!
//! Callers submit serializable work items; a single background worker drains
//! a [`PositionedDeque`](sspr_storage::PositionedDeque) and hands each item to
//! a caller-supplied [`ItemProcessor`], honouring retry, discard and success
//! outcomes. An optional bounded pool tries new submissions immediately and
//! falls back to the durable queue on overload or retry.
//!
//! ## Delivery guarantees
//!
//! - **At-least-once**: an item is removed only after its outcome is known, so
//!   a crash mid-processing redelivers it after restart
//! - **FIFO from the front**: a retrying head item blocks the durable queue
//!   until it succeeds, fails, or ages out
//! - Processors must be idempotent: a fast-path attempt that partially
//!   succeeded before asking for a retry will be delivered again

pub mod envelope;
pub mod error;
pub mod item;
pub mod pool;
pub mod processor;
pub mod registry;
pub mod settings;
pub mod stats;
mod worker;

pub use envelope::WorkItemEnvelope;
pub use error::ProcessorError;
pub use item::{ItemProcessor, ProcessOutcome, WorkItem};
pub use pool::PreDispatchPool;
pub use processor::WorkQueueProcessor;
pub use registry::CodecRegistry;
pub use settings::{DispatchMode, ProcessorSettings, SettingsError};
pub use stats::ProcessorStats;
