//! PipelineBlueprint - Config Loader output
//!
//! Describes the output stage: how records are dispatched and which sinks exist.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete output-stage blueprint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineBlueprint {
    /// Configuration version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Dispatch settings
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Sink definitions
    pub sinks: Vec<SinkConfig>,
}

impl PipelineBlueprint {
    /// Look up a sink by name
    pub fn sink(&self, name: &str) -> Option<&SinkConfig> {
        self.sinks.iter().find(|s| s.name == name)
    }
}

/// How the pipeline hands records to a sink
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Per-record or batch delivery
    #[serde(default)]
    pub mode: DispatchMode,

    /// Records per `output_many` call in batch mode
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// JSON-lines file receiving failure records
    #[serde(default)]
    pub quarantine: Option<PathBuf>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            mode: DispatchMode::default(),
            batch_size: default_batch_size(),
            quarantine: None,
        }
    }
}

fn default_batch_size() -> usize {
    100
}

/// Dispatch mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// Every record goes through the dispatch wrapper on its own
    #[default]
    Single,
    /// Records are grouped and sent with `output_many`
    Batch,
}

/// Sink output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Sink name
    pub name: String,

    /// Sink type
    pub sink_type: SinkType,

    /// Extra request headers (http only)
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Type-specific parameters
    #[serde(default)]
    pub params: HashMap<String, String>,
}

impl SinkConfig {
    pub fn new(name: impl Into<String>, sink_type: SinkType) -> Self {
        Self {
            name: name.into(),
            sink_type,
            headers: HashMap::new(),
            params: HashMap::new(),
        }
    }

    /// Builder-style parameter setter
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Builder-style header setter
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

/// Sink type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// Message queue producer
    Queue,
    /// HTTP request per record
    Http,
    /// Append-only text file
    File,
    /// Append-only delimited file
    Csv,
    /// Standard output
    Console,
    /// Tracing events
    Log,
    /// Discard everything
    Null,
}

impl SinkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queue => "queue",
            Self::Http => "http",
            Self::File => "file",
            Self::Csv => "csv",
            Self::Console => "console",
            Self::Log => "log",
            Self::Null => "null",
        }
    }

    /// Parameters that must be present for this type
    pub fn required_params(&self) -> &'static [&'static str] {
        match self {
            Self::Queue => &["server", "topic"],
            Self::Http => &["url"],
            Self::File | Self::Csv => &["path"],
            Self::Console | Self::Log | Self::Null => &[],
        }
    }
}

impl fmt::Display for SinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
