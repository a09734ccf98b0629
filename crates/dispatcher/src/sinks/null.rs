//! NullSink - accepts and discards everything

use contracts::{BatchError, Record, Sink, SinkError, SinkState, SinkType};

pub struct NullSink {
    name: String,
    state: SinkState,
}

impl NullSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: SinkState::Ready,
        }
    }
}

impl Sink for NullSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn sink_type(&self) -> SinkType {
        SinkType::Null
    }

    async fn output(&mut self, _record: &Record) -> Result<(), SinkError> {
        self.state.ensure_ready(&self.name)
    }

    async fn output_many(&mut self, _records: &[Record]) -> Result<(), BatchError> {
        Ok(self.state.ensure_ready(&self.name)?)
    }

    async fn close(&mut self) -> Result<(), SinkError> {
        self.state.close();
        Ok(())
    }
}
