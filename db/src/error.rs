//! Request-level error taxonomy.

use thiserror::Error;

use crate::config::ConfigError;
use crate::convert::ConversionError;

/// Errors surfaced to callers of the data-access layer.
///
/// Each variant names the layer that failed so user-facing messages can tell
/// a bad settings file from a dead server from a script that errored.
#[derive(Error, Debug)]
pub enum DatasourceError {
    #[error("settings parse error: {0}")]
    Config(#[from] ConfigError),

    #[error("database connect error: {message}")]
    Connection { message: String },

    #[error("query execution error: {message}")]
    Execution { message: String },

    #[error("unable to determine the data type of dataform ({form})")]
    UnsupportedDataform { form: &'static str },

    #[error("ambiguous column selection: table contains {columns} columns")]
    AmbiguousSelection { columns: usize },

    #[error("unable to transform column '{column}': {source}")]
    UnsupportedColumn {
        column: String,
        #[source]
        source: ConversionError,
    },

    #[error("stream error: {message}")]
    Stream { message: String },

    #[error("invalid request json: {0}")]
    Request(#[source] serde_json::Error),
}

impl DatasourceError {
    pub(crate) fn connection(e: impl std::fmt::Display) -> Self {
        Self::Connection {
            message: e.to_string(),
        }
    }

    pub(crate) fn execution(e: impl std::fmt::Display) -> Self {
        Self::Execution {
            message: e.to_string(),
        }
    }

    pub(crate) fn stream(e: impl std::fmt::Display) -> Self {
        Self::Stream {
            message: e.to_string(),
        }
    }

    /// Whether the retry loop should discard the connection and try again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Execution { .. })
    }
}
