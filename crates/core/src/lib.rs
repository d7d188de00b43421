//! `sspr-core`: primitives shared by the storage and queue layers.
//!
//! This crate contains **pure** building blocks (no storage, no threads).

pub mod error;
pub mod id;
pub mod position;

pub use error::{CoreError, CoreResult};
pub use id::{IdGenerator, ItemId};
pub use position::Position;
