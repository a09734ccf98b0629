//! Sink trait - delivery interface for every output adapter
//!
//! Defines the abstract capability and the lifecycle all sinks follow.

use crate::{BatchError, FailureCollector, Record, SinkError, SinkType};

/// Record output trait
///
/// All sink implementations must implement this trait. Output operations take
/// `&mut self`: one dispatch per sink runs at a time.
#[trait_variant::make(Sink: Send)]
pub trait LocalSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Sink type (used for logging/metrics)
    fn sink_type(&self) -> SinkType;

    /// Deliver a single record
    ///
    /// # Errors
    /// Returns the delivery failure; the record is not retained
    async fn output(&mut self, record: &Record) -> Result<(), SinkError>;

    /// Deliver a batch
    ///
    /// Sinks without a native bulk operation delegate to
    /// [`output_sequential`].
    async fn output_many(&mut self, records: &[Record]) -> Result<(), BatchError>;

    /// Release the underlying client or handle
    ///
    /// Closing an already closed sink is a no-op.
    async fn close(&mut self) -> Result<(), SinkError>;
}

/// Deliver a batch by calling `output` for every record in order
///
/// Every record is attempted; the failures are aggregated by index.
pub async fn output_sequential<S: Sink>(
    sink: &mut S,
    records: &[Record],
) -> Result<(), BatchError> {
    let mut collector = FailureCollector::new(sink.name(), records.len());
    for (index, record) in records.iter().enumerate() {
        if let Err(error) = sink.output(record).await {
            collector.fail(index, record.clone(), error, None);
        }
    }
    collector.finish().map(|_| ()).map_err(BatchError::from)
}

/// Sink lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SinkState {
    /// Constructed, client not yet attached
    #[default]
    Uninitialized,
    /// Accepting output calls
    Ready,
    /// Released; output calls are rejected
    Closed,
}

impl SinkState {
    /// Check that output is allowed in this state
    pub fn ensure_ready(&self, sink_name: &str) -> Result<(), SinkError> {
        match self {
            Self::Ready => Ok(()),
            Self::Uninitialized => Err(SinkError::NotReady {
                sink_name: sink_name.to_string(),
            }),
            Self::Closed => Err(SinkError::Closed {
                sink_name: sink_name.to_string(),
            }),
        }
    }

    /// Move to `Closed`, returning whether this call did the transition
    pub fn close(&mut self) -> bool {
        let was_open = *self != Self::Closed;
        *self = Self::Closed;
        was_open
    }
}

#[cfg(test)]
mod tests {
    use super::{output_sequential, Sink, SinkState};
    use crate::{AggregateFailure, BatchError, Record, SinkError, SinkType};

    /// Sink that rejects records listed by index of arrival
    struct PickySink {
        calls: usize,
        reject: Vec<usize>,
    }

    impl Sink for PickySink {
        fn name(&self) -> &str {
            "picky"
        }

        fn sink_type(&self) -> SinkType {
            SinkType::Null
        }

        async fn output(&mut self, _record: &Record) -> Result<(), SinkError> {
            let call = self.calls;
            self.calls += 1;
            if self.reject.contains(&call) {
                return Err(SinkError::encode("picky", format!("call {call} rejected")));
            }
            Ok(())
        }

        async fn output_many(&mut self, records: &[Record]) -> Result<(), BatchError> {
            output_sequential(self, records).await
        }

        async fn close(&mut self) -> Result<(), SinkError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_sequential_output_visits_every_record() {
        let mut sink = PickySink {
            calls: 0,
            reject: vec![1, 3],
        };
        let records: Vec<Record> = ["a", "b", "c", "d"].into_iter().map(Record::from).collect();

        let err = sink.output_many(&records).await.unwrap_err();
        assert_eq!(sink.calls, 4);

        let aggregate: AggregateFailure = match err {
            BatchError::Aggregate(aggregate) => aggregate,
            other => panic!("expected aggregate, got {other:?}"),
        };
        let failed: Vec<_> = aggregate.failed_records().cloned().collect();
        assert_eq!(failed, vec![Record::from("b"), Record::from("d")]);
        assert_eq!(aggregate.succeeded(), 2);
    }

    #[tokio::test]
    async fn test_sequential_output_empty_batch() {
        let mut sink = PickySink {
            calls: 0,
            reject: vec![0],
        };
        assert!(sink.output_many(&[]).await.is_ok());
        assert_eq!(sink.calls, 0);
    }

    #[test]
    fn test_state_transitions() {
        let mut state = SinkState::default();
        assert!(matches!(
            state.ensure_ready("s"),
            Err(SinkError::NotReady { .. })
        ));

        state = SinkState::Ready;
        assert!(state.ensure_ready("s").is_ok());

        assert!(state.close());
        assert!(!state.close());
        assert!(matches!(state.ensure_ready("s"), Err(SinkError::Closed { .. })));
    }
}
