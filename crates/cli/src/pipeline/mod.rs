//! Pipeline orchestration module.

mod orchestrator;
mod quarantine;
mod stats;

pub use orchestrator::{Pipeline, PipelineConfig};
pub use stats::PipelineStats;
