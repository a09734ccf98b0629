//! Layered error definitions
//!
//! Categorized by boundary: config / construction / delivery / batch

use std::fmt;
use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{AggregateFailure, SinkType};

/// Configuration and loader errors
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// A sink could not be initialized
///
/// Fatal for that sink: the pipeline must not proceed with it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to construct {sink_type} sink '{sink_name}': {message}")]
pub struct ConstructionError {
    pub sink_type: SinkType,
    pub sink_name: String,
    pub message: String,
}

impl ConstructionError {
    pub fn new(
        sink_type: SinkType,
        sink_name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            sink_type,
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }
}

/// Response that a sink's failure predicate rejected
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseSummary {
    pub status: u16,
    pub body: String,
}

impl fmt::Display for ResponseSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.body.is_empty() {
            write!(f, "status {}", self.status)
        } else {
            write!(f, "status {}: {}", self.status, self.body)
        }
    }
}

/// Single-record delivery failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    /// Sink holds no client/producer/handle yet
    #[error("sink '{sink_name}' is not ready: no client initialized")]
    NotReady { sink_name: String },

    /// Sink was closed
    #[error("sink '{sink_name}' is closed")]
    Closed { sink_name: String },

    /// Endpoint answered but the failure predicate matched
    #[error("sink '{sink_name}' rejected response: {response}")]
    Rejected {
        sink_name: String,
        response: ResponseSummary,
    },

    /// Connection-level failure talking to the endpoint
    #[error("sink '{sink_name}' transport error: {message}")]
    Transport { sink_name: String, message: String },

    /// Request exceeded the per-request timeout
    #[error("sink '{sink_name}' timed out after {timeout_ms}ms")]
    Timeout { sink_name: String, timeout_ms: u64 },

    /// Broker rejected a publish
    #[error("sink '{sink_name}' publish error: {message}")]
    Publish { sink_name: String, message: String },

    /// Record cannot be rendered in the sink's format
    #[error("sink '{sink_name}' encode error: {message}")]
    Encode { sink_name: String, message: String },

    /// Local I/O failure
    #[error("sink '{sink_name}' io error ({kind:?}): {message}")]
    Io {
        sink_name: String,
        kind: io::ErrorKind,
        message: String,
    },
}

impl SinkError {
    /// Create an I/O error, keeping only kind and message
    pub fn io(sink_name: impl Into<String>, error: &io::Error) -> Self {
        Self::Io {
            sink_name: sink_name.into(),
            kind: error.kind(),
            message: error.to_string(),
        }
    }

    pub fn encode(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Encode {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    pub fn publish(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Publish {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    pub fn transport(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    /// Stable machine-readable variant name
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotReady { .. } => "not_ready",
            Self::Closed { .. } => "closed",
            Self::Rejected { .. } => "rejected",
            Self::Transport { .. } => "transport",
            Self::Timeout { .. } => "timeout",
            Self::Publish { .. } => "publish",
            Self::Encode { .. } => "encode",
            Self::Io { .. } => "io",
        }
    }

    /// Name of the sink that raised the error
    pub fn sink_name(&self) -> &str {
        match self {
            Self::NotReady { sink_name }
            | Self::Closed { sink_name }
            | Self::Rejected { sink_name, .. }
            | Self::Transport { sink_name, .. }
            | Self::Timeout { sink_name, .. }
            | Self::Publish { sink_name, .. }
            | Self::Encode { sink_name, .. }
            | Self::Io { sink_name, .. } => sink_name,
        }
    }
}

/// Batch delivery failure
#[derive(Debug, Clone, Error)]
pub enum BatchError {
    /// Some records failed; each one is listed
    #[error(transparent)]
    Aggregate(#[from] AggregateFailure),

    /// The batch failed as a unit, no per-record attribution
    #[error(transparent)]
    Sink(#[from] SinkError),
}

impl BatchError {
    /// Number of records this error accounts as failed, given the batch size
    pub fn failed_count(&self, batch_len: usize) -> usize {
        match self {
            Self::Aggregate(aggregate) => aggregate.failures().len(),
            Self::Sink(_) => batch_len,
        }
    }
}
