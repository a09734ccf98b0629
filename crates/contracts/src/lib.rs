//! # Contracts
//!
//! Frozen interface contracts shared by every outflow crate: the record model,
//! the sink capability, the failure model and the error taxonomy.
//! Business crates depend on this crate only, never the other way round.
//!
//! ## Failure model
//! - Single-record delivery fails with [`SinkError`]
//! - Batch delivery fails with [`BatchError`], either one [`SinkError`] for the
//!   whole batch or an [`AggregateFailure`] listing every failed record
//! - Sink construction fails with [`ConstructionError`]

mod blueprint;
mod error;
mod failure;
pub mod metric_names;
mod record;
mod sink;

pub use blueprint::*;
pub use error::*;
pub use failure::*;
pub use record::Record;
pub use sink::*;
