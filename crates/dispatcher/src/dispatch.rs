//! SinkDispatcher - failure-isolating wrapper around one sink
//!
//! Single-record failures never escape [`SinkDispatcher::handle`]; they come
//! back as a [`FailureRecord`] the pipeline can quarantine or retry.

use std::backtrace::{Backtrace, BacktraceStatus};
use std::sync::Arc;

use contracts::metric_names::{BATCHES_TOTAL, RECORDS_DELIVERED_TOTAL, RECORDS_FAILED_TOTAL};
use contracts::{BatchError, FailureRecord, Record, Sink, SinkError};
use metrics::counter;
use tracing::{debug, error, instrument, warn};

use crate::metrics::SinkMetrics;

/// Outcome of dispatching one record
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Delivered,
    Failed(FailureRecord),
}

impl Delivery {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered)
    }

    pub fn into_failure(self) -> Option<FailureRecord> {
        match self {
            Self::Delivered => None,
            Self::Failed(failure) => Some(failure),
        }
    }
}

/// Owns a sink and converts its failures into structured records
pub struct SinkDispatcher<S> {
    sink: S,
    metrics: Arc<SinkMetrics>,
}

impl<S: Sink> SinkDispatcher<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            metrics: Arc::new(SinkMetrics::new()),
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Get current metrics
    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    /// Deliver one record
    ///
    /// Never fails: a delivery error is logged and returned as
    /// [`Delivery::Failed`] carrying the original record.
    #[instrument(
        name = "dispatch_handle",
        skip(self, record),
        fields(sink = %self.sink.name())
    )]
    pub async fn handle(&mut self, record: Record) -> Delivery {
        match self.sink.output(&record).await {
            Ok(()) => {
                self.record_delivered(1);
                Delivery::Delivered
            }
            Err(error) => {
                self.log_failure(&error);
                self.record_failed(1);
                Delivery::Failed(FailureRecord::new(record, error, capture_trace()))
            }
        }
    }

    /// Deliver a batch through the sink's `output_many`
    ///
    /// Counters and logs are updated, and the batch error is handed back
    /// unchanged.
    #[instrument(
        name = "dispatch_handle_many",
        skip(self, records),
        fields(sink = %self.sink.name(), count = records.len())
    )]
    pub async fn handle_many(&mut self, records: &[Record]) -> Result<(), BatchError> {
        self.metrics.inc_batch_count();
        counter!(BATCHES_TOTAL, "sink" => self.sink.name().to_string()).increment(1);

        let result = self.sink.output_many(records).await;
        match &result {
            Ok(()) => {
                self.record_delivered(records.len());
                debug!(sink = %self.sink.name(), count = records.len(), "Batch dispatched");
            }
            Err(BatchError::Aggregate(aggregate)) => {
                for failure in aggregate.failures() {
                    self.log_failure(&failure.error);
                }
                self.record_delivered(aggregate.succeeded());
                self.record_failed(aggregate.failures().len());
            }
            Err(BatchError::Sink(error)) => {
                self.log_failure(error);
                self.record_failed(records.len());
            }
        }
        result
    }

    /// Close the wrapped sink
    #[instrument(name = "dispatch_close", skip(self), fields(sink = %self.sink.name()))]
    pub async fn close(&mut self) -> Result<(), SinkError> {
        let result = self.sink.close().await;
        if let Err(error) = &result {
            warn!(
                sink_type = %self.sink.sink_type(),
                sink = %self.sink.name(),
                error = %error,
                "Close failed"
            );
        }
        result
    }

    fn log_failure(&self, error: &SinkError) {
        error!(
            sink_type = %self.sink.sink_type(),
            sink = %self.sink.name(),
            error = %error,
            "Output failed"
        );
    }

    fn record_delivered(&self, count: usize) {
        if count == 0 {
            return;
        }
        self.metrics.add_delivered(count as u64);
        counter!(RECORDS_DELIVERED_TOTAL, "sink" => self.sink.name().to_string())
            .increment(count as u64);
    }

    fn record_failed(&self, count: usize) {
        if count == 0 {
            return;
        }
        self.metrics.add_failed(count as u64);
        counter!(RECORDS_FAILED_TOTAL, "sink" => self.sink.name().to_string())
            .increment(count as u64);
    }
}

/// Backtrace of the failing call, when backtraces are enabled
fn capture_trace() -> Option<String> {
    let backtrace = Backtrace::capture();
    match backtrace.status() {
        BacktraceStatus::Captured => Some(backtrace.to_string()),
        _ => None,
    }
}
