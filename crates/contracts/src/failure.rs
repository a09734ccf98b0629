//! Failure model - per-record failure records and their batch aggregate

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::{Record, SinkError};

/// Structured description of one failed record
///
/// Produced exactly once per failed record and never for a delivered one.
#[derive(Debug, Clone, PartialEq)]
pub struct FailureRecord {
    /// The record as it was handed to the sink
    pub data: Record,
    /// Why delivery failed
    pub error: SinkError,
    /// Captured error chain or backtrace, when one was available
    pub trace: Option<String>,
}

impl FailureRecord {
    pub fn new(data: Record, error: SinkError, trace: Option<String>) -> Self {
        Self { data, error, trace }
    }
}

impl Serialize for FailureRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("FailureRecord", 3)?;
        state.serialize_field("data", &self.data)?;
        state.serialize_field(
            "error",
            &ErrorDescriptor {
                kind: self.error.kind(),
                sink: self.error.sink_name(),
                message: self.error.to_string(),
            },
        )?;
        state.serialize_field("trace", &self.trace)?;
        state.end()
    }
}

#[derive(Serialize)]
struct ErrorDescriptor<'a> {
    kind: &'static str,
    sink: &'a str,
    message: String,
}

/// One or more records of a batch failed
///
/// Failures are ordered by their index in the original batch.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{} of {} records failed in sink '{}'", failures.len(), total, sink_name)]
pub struct AggregateFailure {
    sink_name: String,
    total: usize,
    failures: Vec<FailureRecord>,
}

impl AggregateFailure {
    /// Sink that produced the failures
    pub fn sink_name(&self) -> &str {
        &self.sink_name
    }

    /// Size of the dispatched batch
    pub fn total(&self) -> usize {
        self.total
    }

    /// Records delivered successfully within the same batch
    pub fn succeeded(&self) -> usize {
        self.total - self.failures.len()
    }

    pub fn failures(&self) -> &[FailureRecord] {
        &self.failures
    }

    pub fn into_failures(self) -> Vec<FailureRecord> {
        self.failures
    }

    /// Original records that need retrying
    pub fn failed_records(&self) -> impl Iterator<Item = &Record> {
        self.failures.iter().map(|f| &f.data)
    }
}

/// Collects per-record outcomes of one batch
///
/// Failures may be reported in any order; they are attributed by the index
/// the record had in the batch, not by completion order.
#[derive(Debug)]
pub struct FailureCollector {
    sink_name: String,
    total: usize,
    failures: Vec<(usize, FailureRecord)>,
}

impl FailureCollector {
    /// Start collecting for a batch of `total` records
    pub fn new(sink_name: impl Into<String>, total: usize) -> Self {
        Self {
            sink_name: sink_name.into(),
            total,
            failures: Vec::new(),
        }
    }

    /// Record the failure of the record at `index`
    pub fn fail(&mut self, index: usize, data: Record, error: SinkError, trace: Option<String>) {
        debug_assert!(index < self.total, "index {index} outside batch of {}", self.total);
        debug_assert!(
            self.failures.iter().all(|(i, _)| *i != index),
            "record {index} reported failed twice"
        );
        self.failures
            .push((index, FailureRecord::new(data, error, trace)));
    }

    /// Finish the batch
    ///
    /// Returns the number of delivered records, or the aggregate when any
    /// record failed.
    pub fn finish(mut self) -> Result<usize, AggregateFailure> {
        if self.failures.is_empty() {
            return Ok(self.total);
        }
        self.failures.sort_by_key(|(index, _)| *index);
        Err(AggregateFailure {
            sink_name: self.sink_name,
            total: self.total,
            failures: self.failures.into_iter().map(|(_, f)| f).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn timeout(sink: &str) -> SinkError {
        SinkError::Timeout {
            sink_name: sink.into(),
            timeout_ms: 100,
        }
    }

    #[test]
    fn test_collector_all_delivered() {
        let collector = FailureCollector::new("s", 4);
        assert_eq!(collector.finish(), Ok(4));
    }

    #[test]
    fn test_collector_orders_by_index() {
        let mut collector = FailureCollector::new("s", 6);
        collector.fail(5, Record::from("five"), timeout("s"), None);
        collector.fail(2, Record::from("two"), timeout("s"), Some("trace".into()));

        let aggregate = collector.finish().unwrap_err();
        assert_eq!(aggregate.total(), 6);
        assert_eq!(aggregate.succeeded(), 4);
        let data: Vec<_> = aggregate.failed_records().cloned().collect();
        assert_eq!(data, vec![Record::from("two"), Record::from("five")]);
        assert_eq!(aggregate.to_string(), "2 of 6 records failed in sink 's'");
    }

    #[test]
    fn test_failure_record_serialization() {
        let record = FailureRecord::new(Record::new(json!({"id": 1})), timeout("api"), None);
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["data"], json!({"id": 1}));
        assert_eq!(value["error"]["kind"], "timeout");
        assert_eq!(value["error"]["sink"], "api");
        assert_eq!(value["trace"], serde_json::Value::Null);
    }
}
