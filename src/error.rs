//! Error types for ei
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (bad args, invalid entry, missing workspace)
//! - 3: Input invariant violation (malformed hunk, empty edit set)
//! - 4: Operation failed (io, lock contention, engine transport)

use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the ei CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const INVARIANT_VIOLATION: i32 = 3;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for ei operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("Not an ei workspace: {0} (run `ei init` first)")]
    NotInitialized(PathBuf),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid edit entry: {0}")]
    InvalidEntry(String),

    // Input invariant violations (exit code 3)
    #[error("Hunk out of bounds in {path}: start line {start_line} removing {removed} lines exceeds document of {doc_lines} lines")]
    HunkOutOfBounds {
        path: String,
        start_line: usize,
        removed: usize,
        doc_lines: usize,
    },

    #[error("Empty edit set for {0}")]
    EmptyEditSet(String),

    // Operation failures (exit code 4)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Lock acquisition failed: {0}")]
    LockFailed(PathBuf),

    #[error("Reasoning engine error: {0}")]
    Engine(String),

    #[error("Reasoning engine call timed out after {0}s")]
    EngineTimeout(u64),

    #[error("Arbitration response rejected: {0}")]
    ArbitrationParse(String),

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

impl Error {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            // User errors
            Error::NotInitialized(_)
            | Error::InvalidConfig(_)
            | Error::InvalidArgument(_)
            | Error::InvalidEntry(_) => exit_codes::USER_ERROR,

            // Invariant violations
            Error::HunkOutOfBounds { .. } | Error::EmptyEditSet(_) => {
                exit_codes::INVARIANT_VIOLATION
            }

            // Operation failures
            Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_)
            | Error::Http(_)
            | Error::LockFailed(_)
            | Error::Engine(_)
            | Error::EngineTimeout(_)
            | Error::ArbitrationParse(_)
            | Error::OperationFailed(_) => exit_codes::OPERATION_FAILED,
        }
    }
}

/// Result type alias for ei operations
pub type Result<T> = std::result::Result<T, Error>;

/// Wrapper for displaying errors in JSON format
#[derive(serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&Error> for JsonError {
    fn from(err: &Error) -> Self {
        JsonError {
            error: err.to_string(),
            code: err.exit_code(),
            details: None,
        }
    }
}
