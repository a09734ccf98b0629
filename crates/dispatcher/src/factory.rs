//! Sink factory - builds a sink from its definition

use contracts::{BatchError, ConstructionError, Record, Sink, SinkConfig, SinkError, SinkType};
use tracing::{info, instrument};

use crate::client::{TcpLineConnector, TcpLineProducer};
use crate::sinks::{
    ConsoleSink, CsvSink, FileSink, HttpSink, LogSink, NullSink, QueueSink, QueueSinkConfig,
};

/// Any sink the factory can build, dispatched statically
pub enum AnySink {
    Queue(QueueSink<TcpLineProducer>),
    Http(HttpSink),
    File(FileSink),
    Csv(CsvSink),
    Console(ConsoleSink),
    Log(LogSink),
    Null(NullSink),
}

macro_rules! delegate {
    ($self:ident, $sink:ident => $call:expr) => {
        match $self {
            AnySink::Queue($sink) => $call,
            AnySink::Http($sink) => $call,
            AnySink::File($sink) => $call,
            AnySink::Csv($sink) => $call,
            AnySink::Console($sink) => $call,
            AnySink::Log($sink) => $call,
            AnySink::Null($sink) => $call,
        }
    };
}

impl Sink for AnySink {
    fn name(&self) -> &str {
        delegate!(self, sink => sink.name())
    }

    fn sink_type(&self) -> SinkType {
        delegate!(self, sink => sink.sink_type())
    }

    async fn output(&mut self, record: &Record) -> Result<(), SinkError> {
        delegate!(self, sink => sink.output(record).await)
    }

    async fn output_many(&mut self, records: &[Record]) -> Result<(), BatchError> {
        delegate!(self, sink => sink.output_many(records).await)
    }

    async fn close(&mut self) -> Result<(), SinkError> {
        delegate!(self, sink => sink.close().await)
    }
}

/// Build the sink described by `config`
///
/// Queue sinks connect to their broker here, so an unreachable broker fails
/// construction rather than the first output.
#[instrument(
    name = "create_sink",
    skip(config),
    fields(sink = %config.name, sink_type = %config.sink_type)
)]
pub async fn create_sink(config: &SinkConfig) -> Result<AnySink, ConstructionError> {
    let sink = match config.sink_type {
        SinkType::Queue => {
            let queue_config = QueueSinkConfig::from_params(config)?;
            AnySink::Queue(QueueSink::connect(&config.name, queue_config, &TcpLineConnector).await?)
        }
        SinkType::Http => AnySink::Http(HttpSink::from_params(config)?),
        SinkType::File => AnySink::File(FileSink::from_params(config)?),
        SinkType::Csv => AnySink::Csv(CsvSink::from_params(config)?),
        SinkType::Console => AnySink::Console(ConsoleSink::new(&config.name)),
        SinkType::Log => AnySink::Log(LogSink::new(&config.name)),
        SinkType::Null => AnySink::Null(NullSink::new(&config.name)),
    };

    info!(sink = %config.name, sink_type = %config.sink_type, "Sink created");
    Ok(sink)
}

#[cfg(test)]
mod tests {
    use super::{create_sink, AnySink};
    use contracts::{Record, Sink, SinkConfig, SinkType};
    use std::fs;
    use tempfile::tempdir;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_create_local_sinks() {
        let dir = tempdir().unwrap();
        let txt = dir.path().join("out.txt");
        let csv = dir.path().join("out.csv");

        let configs = [
            SinkConfig::new("f", SinkType::File).with_param("path", txt.to_string_lossy()),
            SinkConfig::new("c", SinkType::Csv).with_param("path", csv.to_string_lossy()),
            SinkConfig::new("o", SinkType::Console),
            SinkConfig::new("l", SinkType::Log),
            SinkConfig::new("n", SinkType::Null),
        ];
        for config in &configs {
            let sink = create_sink(config).await.ok().unwrap();
            assert_eq!(sink.name(), config.name);
            assert_eq!(sink.sink_type(), config.sink_type);
        }
    }

    #[tokio::test]
    async fn test_file_sink_through_any_sink() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let config = SinkConfig::new("f", SinkType::File).with_param("path", path.to_string_lossy());

        let mut sink = create_sink(&config).await.ok().unwrap();
        assert!(matches!(sink, AnySink::File(_)));
        sink.output_many(&[Record::from("a"), Record::from("b")])
            .await
            .unwrap();
        sink.close().await.unwrap();
        sink.close().await.unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "a\nb\n");
    }

    #[tokio::test]
    async fn test_unreachable_broker_fails_construction() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let config = SinkConfig::new("q", SinkType::Queue)
            .with_param("server", format!("tcp://{addr}"))
            .with_param("topic", "events");
        let err = create_sink(&config).await.err().unwrap();
        assert_eq!(err.sink_type, SinkType::Queue);
        assert_eq!(err.sink_name, "q");
    }

    #[tokio::test]
    async fn test_invalid_http_config() {
        let config = SinkConfig::new("h", SinkType::Http)
            .with_param("url", "http://localhost")
            .with_param("timeout_ms", "soon");
        let err = create_sink(&config).await.err().unwrap();
        assert!(err.message.contains("timeout_ms"));
    }
}
