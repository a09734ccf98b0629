//! QueueSink - publishes records to a broker topic through an injected producer

use std::collections::HashMap;

use contracts::{
    BatchError, ConstructionError, Record, Sink, SinkConfig, SinkError, SinkState, SinkType,
};
use tracing::{debug, error, info, instrument};

use crate::client::{QueueConnector, QueueProducer, TcpLineProducer};

/// Configuration for QueueSink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSinkConfig {
    /// Broker address, e.g. `tcp://localhost:9092`
    pub server: String,
    /// Target topic
    pub topic: String,
    /// Extra options handed to the connector
    pub options: HashMap<String, String>,
}

impl QueueSinkConfig {
    pub fn new(server: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            topic: topic.into(),
            options: HashMap::new(),
        }
    }

    /// Create config from a sink definition
    ///
    /// Every param other than `server` and `topic` is passed to the connector.
    pub fn from_params(config: &SinkConfig) -> Result<Self, ConstructionError> {
        let required = |key: &str| {
            config
                .param(key)
                .filter(|v| !v.trim().is_empty())
                .map(str::to_string)
                .ok_or_else(|| {
                    ConstructionError::new(
                        SinkType::Queue,
                        &config.name,
                        format!("missing '{key}' parameter"),
                    )
                })
        };

        let server = required("server")?;
        let topic = required("topic")?;
        if topic.contains(['\t', '\n', '\r']) {
            return Err(ConstructionError::new(
                SinkType::Queue,
                &config.name,
                "'topic' must not contain tabs or newlines",
            ));
        }
        let options = config
            .params
            .iter()
            .filter(|(k, _)| k.as_str() != "server" && k.as_str() != "topic")
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Ok(Self {
            server,
            topic,
            options,
        })
    }
}

/// Sink that publishes each record as one broker message
///
/// Records are encoded with [`Record::to_bytes`]. Batches go out as a single
/// bulk publish, so a batch either lands as a whole or fails as a whole.
pub struct QueueSink<P = TcpLineProducer> {
    name: String,
    config: QueueSinkConfig,
    producer: Option<P>,
    state: SinkState,
}

impl<P> QueueSink<P>
where
    P: QueueProducer + Sync,
{
    /// Create a sink with no producer attached yet
    pub fn new(name: impl Into<String>, config: QueueSinkConfig) -> Self {
        Self {
            name: name.into(),
            config,
            producer: None,
            state: SinkState::Uninitialized,
        }
    }

    /// Create a sink around an existing producer
    pub fn with_producer(name: impl Into<String>, config: QueueSinkConfig, producer: P) -> Self {
        let mut sink = Self::new(name, config);
        sink.attach(producer);
        sink
    }

    /// Connect a producer through `connector` and build a ready sink
    ///
    /// # Errors
    /// Fails fast when the connector cannot create a producer.
    #[instrument(
        name = "queue_sink_connect",
        skip(name, config, connector),
        fields(server = %config.server, topic = %config.topic)
    )]
    pub async fn connect<C>(
        name: impl Into<String>,
        config: QueueSinkConfig,
        connector: &C,
    ) -> Result<Self, ConstructionError>
    where
        C: QueueConnector<Producer = P>,
    {
        let name = name.into();
        let producer = connector
            .connect(&config.server, &config.options)
            .await
            .map_err(|e| {
                error!(sink = %name, error = %e, "Producer creation failed");
                ConstructionError::new(SinkType::Queue, &name, e.to_string())
            })?;

        debug!(sink = %name, "QueueSink connected");
        Ok(Self::with_producer(name, config, producer))
    }

    /// Attach a producer, making the sink ready
    pub fn attach(&mut self, producer: P) {
        self.producer = Some(producer);
        self.state = SinkState::Ready;
    }

    pub fn config(&self) -> &QueueSinkConfig {
        &self.config
    }

    pub fn state(&self) -> SinkState {
        self.state
    }

    fn producer(&self) -> Result<&P, SinkError> {
        self.state.ensure_ready(&self.name)?;
        self.producer.as_ref().ok_or_else(|| SinkError::NotReady {
            sink_name: self.name.clone(),
        })
    }
}

impl<P> Sink for QueueSink<P>
where
    P: QueueProducer + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn sink_type(&self) -> SinkType {
        SinkType::Queue
    }

    #[instrument(
        name = "queue_sink_output",
        skip(self, record),
        fields(sink = %self.name, topic = %self.config.topic)
    )]
    async fn output(&mut self, record: &Record) -> Result<(), SinkError> {
        let producer = self.producer()?;
        let info = producer
            .publish(&self.config.topic, &[record.to_bytes()])
            .await
            .map_err(|e| SinkError::publish(&self.name, e.to_string()))?;

        debug!(
            sink = %self.name,
            messages = info.messages,
            bytes = info.bytes,
            "Record published"
        );
        Ok(())
    }

    #[instrument(
        name = "queue_sink_output_many",
        skip(self, records),
        fields(sink = %self.name, topic = %self.config.topic, count = records.len())
    )]
    async fn output_many(&mut self, records: &[Record]) -> Result<(), BatchError> {
        if records.is_empty() {
            return Ok(());
        }
        let producer = self.producer()?;
        let messages: Vec<_> = records.iter().map(Record::to_bytes).collect();

        let info = producer
            .publish(&self.config.topic, &messages)
            .await
            .map_err(|e| SinkError::publish(&self.name, e.to_string()))?;

        info!(
            sink = %self.name,
            count = info.messages,
            bytes = info.bytes,
            "Batch published"
        );
        Ok(())
    }

    #[instrument(name = "queue_sink_close", skip(self), fields(sink = %self.name))]
    async fn close(&mut self) -> Result<(), SinkError> {
        if !self.state.close() {
            return Ok(());
        }
        if let Some(producer) = self.producer.take() {
            producer
                .shutdown()
                .await
                .map_err(|e| SinkError::publish(&self.name, e.to_string()))?;
        }
        debug!(sink = %self.name, "QueueSink closed");
        Ok(())
    }
}
