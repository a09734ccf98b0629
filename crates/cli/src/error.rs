//! Error types for CLI operations.

use std::path::Path;

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Requested sink is not defined
    #[error("Sink '{name}' is not defined (available: {available})")]
    SinkNotFound { name: String, available: String },

    /// Override produced an invalid dispatch setting
    #[error("Invalid dispatch setting: {message}")]
    InvalidOverride { message: String },

    /// Input could not be opened or read
    #[error("Failed to read input {source_name}: {source}")]
    Input {
        source_name: String,
        #[source]
        source: std::io::Error,
    },

    /// Quarantine file could not be written
    #[error("Failed to write quarantine file {path}: {source}")]
    Quarantine {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl CliError {
    pub fn config_not_found(path: &Path) -> Self {
        Self::ConfigNotFound {
            path: path.display().to_string(),
        }
    }

    pub fn sink_not_found<'a>(
        name: impl Into<String>,
        available: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        Self::SinkNotFound {
            name: name.into(),
            available: available.into_iter().collect::<Vec<_>>().join(", "),
        }
    }

    pub fn invalid_override(message: impl Into<String>) -> Self {
        Self::InvalidOverride {
            message: message.into(),
        }
    }

    pub fn input(source_name: impl Into<String>, source: std::io::Error) -> Self {
        Self::Input {
            source_name: source_name.into(),
            source,
        }
    }

    pub fn quarantine(path: &Path, source: std::io::Error) -> Self {
        Self::Quarantine {
            path: path.display().to_string(),
            source,
        }
    }
}
