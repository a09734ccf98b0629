//! In-process broker for tests and embedding

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;

use super::queue::{DeliveryInfo, QueueClientError, QueueConnector, QueueProducer};

#[derive(Debug, Default)]
struct BrokerState {
    topics: HashMap<String, Vec<Bytes>>,
    publish_calls: usize,
    refuse_connect: Option<String>,
    fail_publish: Option<String>,
}

/// Broker keeping published messages in memory, per topic
///
/// Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct MemoryBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BrokerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Messages published to `topic`, in arrival order
    pub fn messages(&self, topic: &str) -> Vec<Bytes> {
        self.lock().topics.get(topic).cloned().unwrap_or_default()
    }

    /// Number of publish calls received, bulk calls counting once
    pub fn publish_calls(&self) -> usize {
        self.lock().publish_calls
    }

    /// Make every following connect fail
    pub fn refuse_connections(&self, message: impl Into<String>) {
        self.lock().refuse_connect = Some(message.into());
    }

    /// Make every following publish fail
    pub fn fail_publishes(&self, message: impl Into<String>) {
        self.lock().fail_publish = Some(message.into());
    }
}

impl QueueConnector for MemoryBroker {
    type Producer = MemoryProducer;

    async fn connect(
        &self,
        server: &str,
        _options: &HashMap<String, String>,
    ) -> Result<MemoryProducer, QueueClientError> {
        if let Some(message) = self.lock().refuse_connect.clone() {
            return Err(QueueClientError::Connect {
                server: server.to_string(),
                message,
            });
        }
        Ok(MemoryProducer {
            broker: self.clone(),
            shut_down: AtomicBool::new(false),
        })
    }
}

/// Producer attached to a [`MemoryBroker`]
#[derive(Debug)]
pub struct MemoryProducer {
    broker: MemoryBroker,
    shut_down: AtomicBool,
}

impl MemoryProducer {
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }
}

impl QueueProducer for MemoryProducer {
    async fn publish(
        &self,
        topic: &str,
        messages: &[Bytes],
    ) -> Result<DeliveryInfo, QueueClientError> {
        if self.is_shut_down() {
            return Err(QueueClientError::ShutDown);
        }
        let mut state = self.broker.lock();
        state.publish_calls += 1;
        if let Some(message) = state.fail_publish.clone() {
            return Err(QueueClientError::Publish {
                topic: topic.to_string(),
                message,
            });
        }
        state
            .topics
            .entry(topic.to_string())
            .or_default()
            .extend(messages.iter().cloned());

        Ok(DeliveryInfo {
            messages: messages.len(),
            bytes: messages.iter().map(Bytes::len).sum(),
        })
    }

    async fn shutdown(&self) -> Result<(), QueueClientError> {
        self.shut_down.store(true, Ordering::Release);
        Ok(())
    }
}
