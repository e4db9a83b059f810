//! Error types for the anib-rs library.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for ANIb pipeline operations.
pub type Result<T> = std::result::Result<T, AnibError>;

/// Errors that can occur while running the ANIb pipeline.
#[derive(Error, Debug)]
pub enum AnibError {
    /// Input file not found
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// I/O error during file operations
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Input could not be parsed as FASTA
    #[error("Invalid FASTA input {path}: {reason}")]
    FastaParse { path: PathBuf, reason: String },

    /// A required BLAST+ executable could not be located
    #[error("BLAST+ executable not found: {0}")]
    BlastNotFound(String),

    /// External BLAST+ process exited with an error
    #[error("BLAST+ execution failed: {0}")]
    BlastFailed(String),

    /// External process exceeded its time budget and was killed
    #[error("Job timed out after {0} seconds")]
    JobTimeout(u64),

    /// Failed to parse tabular BLAST output
    #[error("Failed to parse BLAST tabular output: {0}")]
    TabParseError(String),

    /// Invalid configuration parameter
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Persistent store operation failed
    #[error("Store error: {0}")]
    StoreError(String),

    /// Failed to write a CSV matrix export
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// The run was cancelled before all jobs resolved
    #[error("Run was cancelled")]
    Cancelled,

    /// Temporary file could not be persisted to its final name
    #[error("Failed to persist temporary file")]
    TempFileError,

    /// UTF-8 conversion error
    #[error("UTF-8 conversion error: {0}")]
    Utf8Error(#[from] std::string::FromUtf8Error),

    /// Generic error with custom message
    #[error("{0}")]
    Other(String),
}

impl From<tempfile::PersistError> for AnibError {
    fn from(_: tempfile::PersistError) -> Self {
        AnibError::TempFileError
    }
}

impl From<serde_json::Error> for AnibError {
    fn from(err: serde_json::Error) -> Self {
        AnibError::StoreError(err.to_string())
    }
}
