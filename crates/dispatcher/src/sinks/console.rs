//! ConsoleSink - prints records to standard output

use std::io::{self, Stdout, Write};

use contracts::{BatchError, Record, Sink, SinkError, SinkState, SinkType};
use tracing::instrument;

/// Sink that writes one line per record to a writer, stdout by default
pub struct ConsoleSink<W = Stdout> {
    name: String,
    writer: W,
    state: SinkState,
}

impl ConsoleSink<Stdout> {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_writer(name, io::stdout())
    }
}

impl<W: Write + Send> ConsoleSink<W> {
    pub fn with_writer(name: impl Into<String>, writer: W) -> Self {
        Self {
            name: name.into(),
            writer,
            state: SinkState::Ready,
        }
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    fn print(&mut self, text: &str) -> Result<(), SinkError> {
        self.state.ensure_ready(&self.name)?;
        writeln!(self.writer, "{text}")
            .and_then(|()| self.writer.flush())
            .map_err(|e| SinkError::io(&self.name, &e))
    }
}

impl<W: Write + Send> Sink for ConsoleSink<W> {
    fn name(&self) -> &str {
        &self.name
    }

    fn sink_type(&self) -> SinkType {
        SinkType::Console
    }

    #[instrument(name = "console_sink_output", skip(self, record), fields(sink = %self.name))]
    async fn output(&mut self, record: &Record) -> Result<(), SinkError> {
        self.print(&record.to_line())
    }

    async fn output_many(&mut self, records: &[Record]) -> Result<(), BatchError> {
        if records.is_empty() {
            return Ok(());
        }
        let block = records
            .iter()
            .map(Record::to_line)
            .collect::<Vec<_>>()
            .join("\n");
        self.print(&block)?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SinkError> {
        if self.state.close() {
            self.writer
                .flush()
                .map_err(|e| SinkError::io(&self.name, &e))?;
        }
        Ok(())
    }
}
