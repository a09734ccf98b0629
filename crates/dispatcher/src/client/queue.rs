//! Queue broker capability and a line-framed TCP producer
//!
//! Frames are `topic\tpayload\n`. Payloads must not contain a newline.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use thiserror::Error;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

/// What the broker acknowledged for one publish call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeliveryInfo {
    pub messages: usize,
    pub bytes: usize,
}

/// Broker client failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueClientError {
    #[error("invalid broker address '{0}'")]
    InvalidAddress(String),

    #[error("connect to '{server}' failed: {message}")]
    Connect { server: String, message: String },

    #[error("publish to '{topic}' failed: {message}")]
    Publish { topic: String, message: String },

    #[error("producer is shut down")]
    ShutDown,

    #[error("shutdown failed: {0}")]
    Shutdown(String),
}

/// Producer capability held by the queue sink
///
/// Implementations must be safe to share: the sink may hold one producer for
/// its whole lifetime.
#[trait_variant::make(QueueProducer: Send)]
pub trait LocalQueueProducer {
    /// Publish messages to a topic in a single call
    async fn publish(&self, topic: &str, messages: &[Bytes])
        -> Result<DeliveryInfo, QueueClientError>;

    /// Release the connection
    async fn shutdown(&self) -> Result<(), QueueClientError>;
}

/// Creates producers from a broker address
pub trait QueueConnector {
    type Producer: QueueProducer + Sync;

    fn connect(
        &self,
        server: &str,
        options: &HashMap<String, String>,
    ) -> impl Future<Output = Result<Self::Producer, QueueClientError>> + Send;
}

/// Connector for `tcp://host:port` brokers
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpLineConnector;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

impl QueueConnector for TcpLineConnector {
    type Producer = TcpLineProducer;

    #[instrument(name = "tcp_line_connect", skip(self, options))]
    async fn connect(
        &self,
        server: &str,
        options: &HashMap<String, String>,
    ) -> Result<TcpLineProducer, QueueClientError> {
        let addr = server.strip_prefix("tcp://").unwrap_or(server);
        if addr.is_empty() || !addr.contains(':') {
            return Err(QueueClientError::InvalidAddress(server.to_string()));
        }

        let connect_timeout = options
            .get("connect_timeout_ms")
            .and_then(|ms| ms.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_CONNECT_TIMEOUT);

        let connect_err = |message: String| QueueClientError::Connect {
            server: server.to_string(),
            message,
        };
        let stream = tokio::time::timeout(connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| connect_err(format!("timed out after {}ms", connect_timeout.as_millis())))?
            .map_err(|e| connect_err(e.to_string()))?;
        stream
            .set_nodelay(true)
            .map_err(|e| connect_err(e.to_string()))?;

        debug!(server, "TCP line producer connected");
        Ok(TcpLineProducer {
            stream: Mutex::new(Some(BufWriter::new(stream))),
        })
    }
}

/// Producer writing line frames over one TCP connection
///
/// Writes are serialized by an internal lock.
#[derive(Debug)]
pub struct TcpLineProducer {
    stream: Mutex<Option<BufWriter<TcpStream>>>,
}

impl QueueProducer for TcpLineProducer {
    async fn publish(
        &self,
        topic: &str,
        messages: &[Bytes],
    ) -> Result<DeliveryInfo, QueueClientError> {
        let publish_err = |message: String| QueueClientError::Publish {
            topic: topic.to_string(),
            message,
        };
        if topic.is_empty() || topic.contains(['\t', '\n', '\r']) {
            return Err(publish_err("topic must be non-empty without tabs or newlines".into()));
        }
        if messages.iter().any(|m| m.contains(&b'\n')) {
            return Err(publish_err("message contains a newline".into()));
        }

        let mut guard = self.stream.lock().await;
        let stream = guard.as_mut().ok_or(QueueClientError::ShutDown)?;

        let mut bytes = 0;
        for message in messages {
            stream
                .write_all(topic.as_bytes())
                .await
                .map_err(|e| publish_err(e.to_string()))?;
            stream
                .write_all(b"\t")
                .await
                .map_err(|e| publish_err(e.to_string()))?;
            stream
                .write_all(message)
                .await
                .map_err(|e| publish_err(e.to_string()))?;
            stream
                .write_all(b"\n")
                .await
                .map_err(|e| publish_err(e.to_string()))?;
            bytes += message.len();
        }
        stream.flush().await.map_err(|e| publish_err(e.to_string()))?;

        Ok(DeliveryInfo {
            messages: messages.len(),
            bytes,
        })
    }

    async fn shutdown(&self) -> Result<(), QueueClientError> {
        let mut guard = self.stream.lock().await;
        if let Some(mut stream) = guard.take() {
            stream
                .shutdown()
                .await
                .map_err(|e| QueueClientError::Shutdown(e.to_string()))?;
        }
        Ok(())
    }
}
