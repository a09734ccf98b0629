//! Prometheus metric names emitted across outflow crates

/// Records delivered (label: sink)
pub const RECORDS_DELIVERED_TOTAL: &str = "outflow_records_delivered_total";
/// Records that produced a failure record (label: sink)
pub const RECORDS_FAILED_TOTAL: &str = "outflow_records_failed_total";
/// `output_many` calls (label: sink)
pub const BATCHES_TOTAL: &str = "outflow_batches_total";
/// Input records read
pub const RECORDS_READ_TOTAL: &str = "outflow_records_read_total";
/// Failure records written to the quarantine file
pub const RECORDS_QUARANTINED_TOTAL: &str = "outflow_records_quarantined_total";
/// Time spent in one dispatch call (labels: sink, mode)
pub const DISPATCH_LATENCY_MS: &str = "outflow_dispatch_latency_ms";
