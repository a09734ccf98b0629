//! Sink implementations
//!
//! Network sinks (queue, HTTP) take their client as an injected capability;
//! local sinks (file, CSV, console, log, null) own their handle directly.

mod console;
mod csv;
mod file;
mod http;
mod log;
mod null;
mod queue;

pub use self::console::ConsoleSink;
pub use self::csv::{parse_delimiter, CsvSink, CsvSinkConfig};
pub use self::file::{FileSink, FileSinkConfig};
pub use self::http::{FailurePredicate, HttpSink, HttpSinkConfig, DEFAULT_USER_AGENT};
pub use self::log::LogSink;
pub use self::null::NullSink;
pub use self::queue::{QueueSink, QueueSinkConfig};
