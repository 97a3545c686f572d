//! Error types for the logger

use std::time::Duration;

pub type Result<T> = std::result::Result<T, LoggerError>;

#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    /// IO error with context
    #[error("IO error while {operation}: {message}")]
    IoOperation {
        operation: String,
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON conversion error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Unknown severity name
    #[error("Invalid log level: '{0}'")]
    InvalidLevel(String),

    /// Sink error (generic)
    #[error("Sink error ({sink}): {message}")]
    SinkError { sink: String, message: String },

    /// Deferred writer is no longer running
    #[error("Deferred writer stopped")]
    WriterStopped,

    /// Deferred writes were not drained in time
    #[error("Flush timed out after {0:?}")]
    FlushTimeout(Duration),
}

impl LoggerError {
    /// Create an IO operation error with context
    pub fn io_operation(
        operation: impl Into<String>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        LoggerError::IoOperation {
            operation: operation.into(),
            message: message.into(),
            source,
        }
    }

    /// Create a sink error
    pub fn sink(sink: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::SinkError {
            sink: sink.into(),
            message: message.into(),
        }
    }
}
