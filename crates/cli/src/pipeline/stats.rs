//! Pipeline statistics and metrics.

use std::time::Duration;

use observability::RunningStats;

/// Statistics from a pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Sink the records were delivered to
    pub sink_name: String,

    /// Non-empty input lines turned into records
    pub records_read: u64,

    /// Records the sink accepted
    pub records_delivered: u64,

    /// Records that produced a failure record
    pub records_failed: u64,

    /// Failure records written to the quarantine file
    pub records_quarantined: u64,

    /// `output_many` calls (batch mode only)
    pub batches: u64,

    /// Total duration of the pipeline run
    pub duration: Duration,

    /// Input was cut short by a shutdown signal
    pub interrupted: bool,

    /// Per-dispatch latency in milliseconds
    pub dispatch_latency_ms: RunningStats,
}

impl PipelineStats {
    pub fn new(sink_name: impl Into<String>) -> Self {
        Self {
            sink_name: sink_name.into(),
            ..Default::default()
        }
    }

    /// Records handled per second
    pub fn throughput(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            (self.records_delivered + self.records_failed) as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Failure rate as percentage
    pub fn failure_rate(&self) -> f64 {
        let total = self.records_delivered + self.records_failed;
        if total > 0 {
            (self.records_failed as f64 / total as f64) * 100.0
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                    Pipeline Statistics                       ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Sink: {}", self.sink_name);
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Records read: {}", self.records_read);
        println!("   ├─ Throughput: {:.2} records/s", self.throughput());
        if self.interrupted {
            println!("   └─ Stopped by shutdown signal");
        } else {
            println!("   └─ Input exhausted");
        }

        println!("\n📤 Delivery");
        println!("   ├─ Delivered: {}", self.records_delivered);
        println!(
            "   ├─ Failed: {} ({:.2}%)",
            self.records_failed,
            self.failure_rate()
        );
        println!("   ├─ Quarantined: {}", self.records_quarantined);
        println!("   ├─ Batches: {}", self.batches);
        println!("   └─ Dispatch latency (ms): {}", self.dispatch_latency_ms.summary());

        println!();
    }
}
