//! CsvSink - appends records as delimited rows

use std::fs::File;
use std::path::PathBuf;

use contracts::{
    BatchError, ConstructionError, Record, Sink, SinkConfig, SinkError, SinkState, SinkType,
};
use tracing::{debug, instrument};

use super::file::{open_append, required_path};

/// Configuration for CsvSink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvSinkConfig {
    pub path: PathBuf,
    /// Field delimiter, a single ASCII byte
    pub delimiter: u8,
}

impl CsvSinkConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            delimiter: b',',
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Create config from a sink definition
    ///
    /// `delimiter` accepts one ASCII character, or `\t` / `tab`.
    pub fn from_params(config: &SinkConfig) -> Result<Self, ConstructionError> {
        let mut parsed = Self::new(required_path(config, SinkType::Csv)?);
        if let Some(delimiter) = config.param("delimiter") {
            parsed.delimiter = parse_delimiter(delimiter).ok_or_else(|| {
                ConstructionError::new(
                    SinkType::Csv,
                    &config.name,
                    format!("delimiter must be a single ASCII character, got '{delimiter}'"),
                )
            })?;
        }
        Ok(parsed)
    }
}

/// Parse a delimiter param into its byte
pub fn parse_delimiter(raw: &str) -> Option<u8> {
    match raw {
        "\\t" | "tab" => Some(b'\t'),
        _ => match raw.as_bytes() {
            [byte] if byte.is_ascii() => Some(*byte),
            _ => None,
        },
    }
}

/// Sink that writes one delimited row per record
///
/// Arrays map to fields element-wise, objects contribute their values, scalars
/// become a single field. Rows may differ in length.
pub struct CsvSink {
    name: String,
    config: CsvSinkConfig,
    writer: Option<csv::Writer<File>>,
    state: SinkState,
}

impl CsvSink {
    pub fn new(name: impl Into<String>, config: CsvSinkConfig) -> Result<Self, ConstructionError> {
        let name = name.into();
        let file = open_append(&config.path).map_err(|e| {
            ConstructionError::new(
                SinkType::Csv,
                &name,
                format!("cannot open '{}': {e}", config.path.display()),
            )
        })?;
        let writer = csv::WriterBuilder::new()
            .delimiter(config.delimiter)
            .has_headers(false)
            .flexible(true)
            .from_writer(file);

        debug!(sink = %name, path = %config.path.display(), "CsvSink opened");
        Ok(Self {
            name,
            config,
            writer: Some(writer),
            state: SinkState::Ready,
        })
    }

    /// Create from a sink definition (for factory)
    pub fn from_params(config: &SinkConfig) -> Result<Self, ConstructionError> {
        Self::new(&config.name, CsvSinkConfig::from_params(config)?)
    }

    pub fn config(&self) -> &CsvSinkConfig {
        &self.config
    }

    fn write_rows<'a>(
        &mut self,
        records: impl IntoIterator<Item = &'a Record>,
    ) -> Result<(), SinkError> {
        self.state.ensure_ready(&self.name)?;
        let writer = self.writer.as_mut().ok_or_else(|| SinkError::NotReady {
            sink_name: self.name.clone(),
        })?;

        for record in records {
            writer
                .write_record(record.to_row())
                .map_err(|e| csv_error(&self.name, &e))?;
        }
        writer.flush().map_err(|e| SinkError::io(&self.name, &e))
    }
}

fn csv_error(sink_name: &str, err: &csv::Error) -> SinkError {
    match err.kind() {
        csv::ErrorKind::Io(io_err) => SinkError::io(sink_name, io_err),
        _ => SinkError::encode(sink_name, err.to_string()),
    }
}

impl Sink for CsvSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn sink_type(&self) -> SinkType {
        SinkType::Csv
    }

    #[instrument(name = "csv_sink_output", skip(self, record), fields(sink = %self.name))]
    async fn output(&mut self, record: &Record) -> Result<(), SinkError> {
        self.write_rows([record])
    }

    #[instrument(
        name = "csv_sink_output_many",
        skip(self, records),
        fields(sink = %self.name, count = records.len())
    )]
    async fn output_many(&mut self, records: &[Record]) -> Result<(), BatchError> {
        if records.is_empty() {
            return Ok(());
        }
        self.write_rows(records)?;
        Ok(())
    }

    #[instrument(name = "csv_sink_close", skip(self), fields(sink = %self.name))]
    async fn close(&mut self) -> Result<(), SinkError> {
        if !self.state.close() {
            return Ok(());
        }
        if let Some(mut writer) = self.writer.take() {
            writer.flush().map_err(|e| SinkError::io(&self.name, &e))?;
        }
        debug!(sink = %self.name, "CsvSink closed");
        Ok(())
    }
}
