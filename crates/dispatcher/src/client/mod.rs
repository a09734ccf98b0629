//! Client capabilities injected into network sinks
//!
//! Sinks depend on these traits only; the concrete implementations here are
//! the defaults the sink factory wires in.

pub mod http;
pub mod memory;
pub mod queue;

pub use self::http::{
    HttpBody, HttpClient, HttpClientError, HttpErrorKind, HttpMethod, HttpRequest, HttpResponse,
    ReqwestClient,
};
pub use self::memory::{MemoryBroker, MemoryProducer};
pub use self::queue::{
    DeliveryInfo, QueueClientError, QueueConnector, QueueProducer, TcpLineConnector,
    TcpLineProducer,
};
