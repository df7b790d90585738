//! Custom error types for the volume agent.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The run emitted no completion record; it is still running or its output
    /// has an unexpected format.
    #[error("no summary line found in backup-exec output")]
    NoSummaryFound,

    #[error("found {count} summary lines in backup-exec output, expected exactly one")]
    MultipleSummariesFound { count: usize },

    #[error("malformed backup-exec output: {0}")]
    MalformedOutput(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("backup-exec did not complete ({cause}); last output line: {last_line:?}")]
    BackupIncomplete {
        cause: Box<AgentError>,
        last_line: String,
    },

    #[error("failed to walk {path}: {source}")]
    Traversal {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("verification marker {path}: {source}")]
    Marker {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid backup id {0:?}: must be a single path component")]
    InvalidBackupId(String),

    #[error("snapshot listing returned {found:?}, expected marker {expected:?}")]
    MarkerMismatch { expected: String, found: String },

    #[error("{kind} {name} not found")]
    RecordNotFound { kind: String, name: String },

    #[error("Host path validation failed: {0}")]
    HostPathInvalid(String),
}

pub type Result<T> = std::result::Result<T, AgentError>;
