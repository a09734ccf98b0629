//! Batch aggregator - runs one task per batch record and correlates results
//!
//! Every task is started before any is awaited. Each task carries its own
//! timeout, so a slow record never aborts its siblings. Results are keyed by
//! the record's index in the batch, never by completion order.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use tokio::task::{Id, JoinSet};
use tracing::{debug, warn};

/// How one task ended
#[derive(Debug)]
pub enum TaskOutcome<T> {
    /// Task ran to completion
    Completed(T),
    /// Task exceeded its timeout and was dropped
    TimedOut(Duration),
    /// Task panicked or was cancelled
    Aborted(String),
}

/// Run every `(index, future)` pair concurrently
///
/// Returns one outcome per input, ordered by index.
pub async fn run_indexed<F, T>(
    tasks: Vec<(usize, F)>,
    timeout: Option<Duration>,
) -> Vec<(usize, TaskOutcome<T>)>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let mut set = JoinSet::new();
    let mut index_of: HashMap<Id, usize> = HashMap::with_capacity(tasks.len());

    for (index, task) in tasks {
        let handle = set.spawn(async move {
            match timeout {
                Some(limit) => match tokio::time::timeout(limit, task).await {
                    Ok(value) => TaskOutcome::Completed(value),
                    Err(_) => TaskOutcome::TimedOut(limit),
                },
                None => TaskOutcome::Completed(task.await),
            }
        });
        index_of.insert(handle.id(), index);
    }
    debug!(tasks = index_of.len(), "Batch tasks started");

    let mut outcomes = Vec::with_capacity(index_of.len());
    while let Some(joined) = set.join_next_with_id().await {
        match joined {
            Ok((id, outcome)) => {
                if let Some(index) = index_of.get(&id) {
                    outcomes.push((*index, outcome));
                }
            }
            Err(err) => {
                let id = err.id();
                warn!(error = %err, "Batch task did not complete");
                if let Some(index) = index_of.get(&id) {
                    outcomes.push((*index, TaskOutcome::Aborted(err.to_string())));
                }
            }
        }
    }

    outcomes.sort_by_key(|(index, _)| *index);
    outcomes
}
