//! # Dispatcher
//!
//! Record delivery.
//!
//! Responsibilities:
//! - Concrete sink adapters (queue, HTTP, file, CSV, console, log, null)
//! - Failure isolation around single-record output
//! - Concurrent batch dispatch with per-record failure attribution

pub mod aggregate;
pub mod client;
pub mod dispatch;
pub mod factory;
pub mod metrics;
pub mod sinks;

pub use contracts::{Record, Sink};
pub use self::dispatch::{Delivery, SinkDispatcher};
pub use self::factory::{create_sink, AnySink};
pub use self::metrics::{MetricsSnapshot, SinkMetrics};
pub use self::sinks::{
    ConsoleSink, CsvSink, CsvSinkConfig, FailurePredicate, FileSink, FileSinkConfig, HttpSink,
    HttpSinkConfig, LogSink, NullSink, QueueSink, QueueSinkConfig,
};
