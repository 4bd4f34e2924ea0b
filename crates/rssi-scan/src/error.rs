//! Error types for the scan pipeline.

use std::path::PathBuf;
use std::time::Duration;

use process_utils::RunError;
use thiserror::Error;

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Crate-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Failed to parse config file {path}: {source}")]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}

/// Failure of a single scan invocation.
///
/// Every variant is recoverable: the scheduler backs off and tries again on
/// the next cycle.
#[derive(Error, Debug)]
pub enum ScanError {
    /// The scan exceeded its time bound; the process was killed.
    #[error("scan timeout after {elapsed:.1?}")]
    Timeout { elapsed: Duration },

    /// The scan command exited with a non-zero status.
    #[error("scan command failed ({code}): {stderr}")]
    Failed { code: i32, stderr: String },

    /// Stop was requested while the scan was running; the process was killed.
    #[error("scan cancelled")]
    Cancelled,

    #[error("failed to start scan command: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("I/O error during scan: {0}")]
    Io(#[source] std::io::Error),

    #[error("narrow scan requires at least one frequency")]
    EmptyFrequencyList,
}

impl From<RunError> for ScanError {
    fn from(err: RunError) -> Self {
        match err {
            RunError::Spawn { source, .. } => Self::Spawn(source),
            RunError::Timeout { elapsed } => Self::Timeout { elapsed },
            RunError::Cancelled => Self::Cancelled,
            RunError::Io(e) => Self::Io(e),
        }
    }
}
