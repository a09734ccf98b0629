//! Pipeline orchestrator - reads records and feeds them to one sink.

use std::future::Future;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use contracts::{BatchError, DispatchConfig, DispatchMode, FailureRecord, Record, SinkConfig};
use dispatcher::{Sink, SinkDispatcher};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use super::quarantine::Quarantine;
use super::PipelineStats;
use crate::error::CliError;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// The sink records are delivered to
    pub sink: SinkConfig,

    /// Dispatch mode, batch size and quarantine file
    pub dispatch: DispatchConfig,

    /// JSON-lines input (None = stdin)
    pub input: Option<PathBuf>,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a new pipeline with the given configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run the pipeline until the input is exhausted or `shutdown` resolves
    ///
    /// On shutdown, reading stops, the pending batch is still dispatched and
    /// the sink is closed.
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<PipelineStats> {
        let start_time = Instant::now();

        // Initialize Metrics (optional)
        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        let sink = dispatcher::create_sink(&self.config.sink)
            .await
            .with_context(|| format!("Failed to create sink '{}'", self.config.sink.name))?;

        let quarantine = Quarantine::open(self.config.dispatch.quarantine.as_deref()).await?;
        let input = self.open_input().await?;

        info!(
            sink = %self.config.sink.name,
            sink_type = %self.config.sink.sink_type,
            mode = ?self.config.dispatch.mode,
            batch_size = self.config.dispatch.batch_size,
            "Pipeline started"
        );

        let mut delivery = DeliveryLoop::new(sink, quarantine);
        let pumped = delivery
            .pump(input, &self.config.dispatch, shutdown)
            .await;

        // The sink is closed and the quarantine flushed even when reading failed
        let finished = delivery.finish().await;
        pumped?;
        let mut stats = finished?;
        stats.duration = start_time.elapsed();

        Ok(stats)
    }

    async fn open_input(&self) -> Result<Box<dyn AsyncBufRead + Unpin + Send>, CliError> {
        match &self.config.input {
            Some(path) => {
                let file = tokio::fs::File::open(path)
                    .await
                    .map_err(|e| CliError::input(path.display().to_string(), e))?;
                info!(input = %path.display(), "Reading records from file");
                Ok(Box::new(BufReader::new(file)))
            }
            None => {
                info!("Reading records from stdin");
                Ok(Box::new(BufReader::new(tokio::io::stdin())))
            }
        }
    }
}

/// Per-run delivery state: the wrapped sink, the failure destination and counters
struct DeliveryLoop<S: Sink> {
    dispatcher: SinkDispatcher<S>,
    quarantine: Quarantine,
    stats: PipelineStats,
}

impl<S: Sink> DeliveryLoop<S> {
    fn new(sink: S, quarantine: Quarantine) -> Self {
        let stats = PipelineStats::new(sink.name());
        Self {
            dispatcher: SinkDispatcher::new(sink),
            quarantine,
            stats,
        }
    }

    /// Read lines and dispatch them according to `dispatch.mode`
    async fn pump<R>(
        &mut self,
        input: R,
        dispatch: &DispatchConfig,
        shutdown: impl Future<Output = ()>,
    ) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        let mut pending = Vec::with_capacity(dispatch.batch_size);
        tokio::pin!(shutdown);

        loop {
            let line = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    warn!("Received shutdown signal, stopping input");
                    self.stats.interrupted = true;
                    break;
                }
                line = lines.next_line() => line
                    .map_err(|e| CliError::input("records", e))?,
            };
            let Some(line) = line else {
                break;
            };
            if line.trim().is_empty() {
                continue;
            }

            self.stats.records_read += 1;
            observability::record_records_read(1);
            let record = Record::from_line(&line);

            match dispatch.mode {
                DispatchMode::Single => self.dispatch_one(record).await?,
                DispatchMode::Batch => {
                    pending.push(record);
                    if pending.len() >= dispatch.batch_size {
                        self.dispatch_batch(&pending).await?;
                        pending.clear();
                    }
                }
            }
        }

        if !pending.is_empty() {
            self.dispatch_batch(&pending).await?;
        }
        Ok(())
    }

    async fn dispatch_one(&mut self, record: Record) -> Result<()> {
        let started = Instant::now();
        let delivery = self.dispatcher.handle(record).await;
        self.observe_latency("single", started);

        match delivery.into_failure() {
            None => self.stats.records_delivered += 1,
            Some(failure) => {
                self.stats.records_failed += 1;
                self.record_failure(&failure).await?;
            }
        }
        Ok(())
    }

    async fn dispatch_batch(&mut self, records: &[Record]) -> Result<()> {
        let started = Instant::now();
        let result = self.dispatcher.handle_many(records).await;
        self.observe_latency("batch", started);
        self.stats.batches += 1;

        match result {
            Ok(()) => self.stats.records_delivered += records.len() as u64,
            Err(BatchError::Aggregate(aggregate)) => {
                self.stats.records_delivered += aggregate.succeeded() as u64;
                self.stats.records_failed += aggregate.failures().len() as u64;
                for failure in aggregate.failures() {
                    self.record_failure(failure).await?;
                }
            }
            Err(BatchError::Sink(error)) => {
                // No per-record attribution: every record in the batch failed
                self.stats.records_failed += records.len() as u64;
                for record in records {
                    let failure = FailureRecord::new(record.clone(), error.clone(), None);
                    self.record_failure(&failure).await?;
                }
            }
        }
        Ok(())
    }

    async fn record_failure(&mut self, failure: &FailureRecord) -> Result<()> {
        if self.quarantine.write(failure).await? {
            self.stats.records_quarantined += 1;
            observability::record_quarantined(1);
        }
        Ok(())
    }

    fn observe_latency(&mut self, mode: &'static str, started: Instant) {
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.stats.dispatch_latency_ms.push(latency_ms);
        observability::record_dispatch_latency_ms(self.dispatcher.sink().name(), mode, latency_ms);
    }

    /// Close the sink and flush the quarantine file
    async fn finish(mut self) -> Result<PipelineStats> {
        // Close failures are logged by the dispatcher; the run itself succeeded
        if self.dispatcher.close().await.is_ok() {
            debug!(sink = %self.stats.sink_name, "Sink closed");
        }
        self.quarantine.finish().await?;
        Ok(self.stats)
    }
}
