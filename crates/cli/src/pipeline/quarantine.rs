//! Destination for failure records.

use std::path::{Path, PathBuf};

use contracts::FailureRecord;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::warn;

use crate::error::CliError;

/// Where failure records end up
pub enum Quarantine {
    /// Appended as JSON lines
    File {
        path: PathBuf,
        writer: BufWriter<tokio::fs::File>,
    },
    /// Emitted as warning events
    Log,
}

impl Quarantine {
    /// Open the quarantine file, or fall back to logging when none is configured
    pub async fn open(path: Option<&Path>) -> Result<Self, CliError> {
        let Some(path) = path else {
            return Ok(Self::Log);
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CliError::quarantine(path, e))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|e| CliError::quarantine(path, e))?;

        Ok(Self::File {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
        })
    }

    /// Record one failure
    ///
    /// Returns `true` when the failure was persisted to the file.
    pub async fn write(&mut self, failure: &FailureRecord) -> Result<bool, CliError> {
        match self {
            Self::File { path, writer } => {
                let mut line = serde_json::to_string(failure)
                    .map_err(|e| CliError::quarantine(path, std::io::Error::other(e)))?;
                line.push('\n');
                writer
                    .write_all(line.as_bytes())
                    .await
                    .map_err(|e| CliError::quarantine(path, e))?;
                Ok(true)
            }
            Self::Log => {
                warn!(
                    sink = failure.error.sink_name(),
                    kind = failure.error.kind(),
                    error = %failure.error,
                    record = %failure.data,
                    trace = ?failure.trace,
                    "Record not delivered"
                );
                Ok(false)
            }
        }
    }

    /// Flush buffered failure records
    pub async fn finish(&mut self) -> Result<(), CliError> {
        if let Self::File { path, writer } = self {
            writer
                .flush()
                .await
                .map_err(|e| CliError::quarantine(path, e))?;
        }
        Ok(())
    }
}
