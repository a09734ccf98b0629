//! LogSink - emits records as tracing events

use contracts::{output_sequential, BatchError, Record, Sink, SinkError, SinkState, SinkType};
use tracing::{debug, info, instrument};

/// Sink that logs every record at info level, for debugging pipelines
pub struct LogSink {
    name: String,
    state: SinkState,
}

impl LogSink {
    /// Create a new LogSink with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: SinkState::Ready,
        }
    }
}

impl Sink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn sink_type(&self) -> SinkType {
        SinkType::Log
    }

    #[instrument(name = "log_sink_output", skip(self, record), fields(sink = %self.name))]
    async fn output(&mut self, record: &Record) -> Result<(), SinkError> {
        self.state.ensure_ready(&self.name)?;
        info!(sink = %self.name, record = %record, "Record received");
        Ok(())
    }

    async fn output_many(&mut self, records: &[Record]) -> Result<(), BatchError> {
        output_sequential(self, records).await
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), SinkError> {
        if self.state.close() {
            debug!(sink = %self.name, "LogSink closed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::LogSink;
    use contracts::{Record, Sink, SinkError};

    #[tokio::test]
    async fn test_log_sink_output() {
        let mut sink = LogSink::new("test_log");
        assert!(sink.output(&Record::from("x")).await.is_ok());
        assert!(sink
            .output_many(&[Record::from("a"), Record::from("b")])
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_log_sink_batch_after_close_fails_every_record() {
        let mut sink = LogSink::new("l");
        sink.close().await.unwrap();
        let records = [Record::from("a"), Record::from("b")];
        let err = sink.output_many(&records).await.unwrap_err();
        assert_eq!(err.failed_count(records.len()), 2);
    }

    #[tokio::test]
    async fn test_log_sink_name() {
        let sink = LogSink::new("my_logger");
        assert_eq!(sink.name(), "my_logger");
    }

    #[tokio::test]
    async fn test_log_sink_closed() {
        let mut sink = LogSink::new("l");
        sink.close().await.unwrap();
        let err = sink.output(&Record::from("x")).await.unwrap_err();
        assert!(matches!(err, SinkError::Closed { .. }));
    }
}
