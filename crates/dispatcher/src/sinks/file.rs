//! FileSink - appends records to a local file, one line each

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use contracts::{
    BatchError, ConstructionError, Record, Sink, SinkConfig, SinkError, SinkState, SinkType,
};
use tracing::{debug, instrument};

/// Configuration for FileSink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSinkConfig {
    /// Target file, opened in append mode
    pub path: PathBuf,
}

impl FileSinkConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Create config from a sink definition
    pub fn from_params(config: &SinkConfig) -> Result<Self, ConstructionError> {
        required_path(config, SinkType::File).map(Self::new)
    }
}

/// Read the mandatory `path` param
pub(crate) fn required_path(
    config: &SinkConfig,
    sink_type: SinkType,
) -> Result<PathBuf, ConstructionError> {
    config
        .param("path")
        .filter(|p| !p.trim().is_empty())
        .map(PathBuf::from)
        .ok_or_else(|| ConstructionError::new(sink_type, &config.name, "missing 'path' parameter"))
}

/// Open `path` for appending, creating missing parent directories
pub(crate) fn open_append(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Sink that appends newline-terminated records to a file
///
/// The handle stays open for the sink's lifetime and is flushed after every
/// call.
pub struct FileSink {
    name: String,
    config: FileSinkConfig,
    writer: Option<BufWriter<File>>,
    state: SinkState,
}

impl FileSink {
    /// Create a new FileSink, opening its target
    pub fn new(name: impl Into<String>, config: FileSinkConfig) -> Result<Self, ConstructionError> {
        let name = name.into();
        let file = open_append(&config.path).map_err(|e| {
            ConstructionError::new(
                SinkType::File,
                &name,
                format!("cannot open '{}': {e}", config.path.display()),
            )
        })?;

        debug!(sink = %name, path = %config.path.display(), "FileSink opened");
        Ok(Self {
            name,
            config,
            writer: Some(BufWriter::new(file)),
            state: SinkState::Ready,
        })
    }

    /// Create from a sink definition (for factory)
    pub fn from_params(config: &SinkConfig) -> Result<Self, ConstructionError> {
        Self::new(&config.name, FileSinkConfig::from_params(config)?)
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    fn write_flushed(&mut self, payload: &[u8]) -> Result<(), SinkError> {
        self.state.ensure_ready(&self.name)?;
        let writer = self.writer.as_mut().ok_or_else(|| SinkError::NotReady {
            sink_name: self.name.clone(),
        })?;

        writer
            .write_all(payload)
            .map_err(|e| SinkError::io(&self.name, &e))?;
        writer.flush().map_err(|e| SinkError::io(&self.name, &e))
    }
}

impl Sink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn sink_type(&self) -> SinkType {
        SinkType::File
    }

    #[instrument(name = "file_sink_output", skip(self, record), fields(sink = %self.name))]
    async fn output(&mut self, record: &Record) -> Result<(), SinkError> {
        let mut line = record.to_line();
        line.push('\n');
        self.write_flushed(line.as_bytes())
    }

    #[instrument(
        name = "file_sink_output_many",
        skip(self, records),
        fields(sink = %self.name, count = records.len())
    )]
    async fn output_many(&mut self, records: &[Record]) -> Result<(), BatchError> {
        if records.is_empty() {
            return Ok(());
        }
        let mut block = records
            .iter()
            .map(Record::to_line)
            .collect::<Vec<_>>()
            .join("\n");
        block.push('\n');
        self.write_flushed(block.as_bytes())?;
        Ok(())
    }

    #[instrument(name = "file_sink_close", skip(self), fields(sink = %self.name))]
    async fn close(&mut self) -> Result<(), SinkError> {
        if !self.state.close() {
            return Ok(());
        }
        if let Some(mut writer) = self.writer.take() {
            writer.flush().map_err(|e| SinkError::io(&self.name, &e))?;
        }
        debug!(sink = %self.name, "FileSink closed");
        Ok(())
    }
}
