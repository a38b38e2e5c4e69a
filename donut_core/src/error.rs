//! Error types for donut_core.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using donut_core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during repository operations.
///
/// Two tiers: `Io` is the fatal tier (an unrecoverable environment
/// failure the command handler may choose to abort on), everything else
/// is recoverable and reported back to the caller.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error occurred during file operations.
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Repository marker or data directory is missing.
    #[error("Repository at {path} is not initialized (run \"donut init\")")]
    NotInitialized { path: PathBuf },

    /// Repository already has a marker directory.
    #[error("Repository at {path} is already initialized")]
    AlreadyInitialized { path: PathBuf },

    /// No source path was supplied to a check-in.
    #[error("No source path was given")]
    NoSources,

    /// Source path does not exist or cannot be stat-ed.
    #[error("Source path is invalid: {path}")]
    SourceNotFound { path: PathBuf },

    /// Source path is neither a regular file nor a directory.
    #[error("Source path is not a regular file or directory: {path}")]
    UnsupportedFileType { path: PathBuf },

    /// Invalid dataframe name.
    #[error("Invalid dataframe name: {reason}")]
    InvalidDataframe { reason: String },
}

impl Error {
    /// Create a NotInitialized error.
    pub fn not_initialized(path: impl Into<PathBuf>) -> Self {
        Error::NotInitialized { path: path.into() }
    }

    /// Create an AlreadyInitialized error.
    pub fn already_initialized(path: impl Into<PathBuf>) -> Self {
        Error::AlreadyInitialized { path: path.into() }
    }

    /// Create a SourceNotFound error.
    pub fn source_not_found(path: impl Into<PathBuf>) -> Self {
        Error::SourceNotFound { path: path.into() }
    }

    /// Create an UnsupportedFileType error.
    pub fn unsupported_file_type(path: impl Into<PathBuf>) -> Self {
        Error::UnsupportedFileType { path: path.into() }
    }

    /// Create an InvalidDataframe error.
    pub fn invalid_dataframe(reason: impl Into<String>) -> Self {
        Error::InvalidDataframe {
            reason: reason.into(),
        }
    }

    /// Whether this error belongs to the fatal tier.
    ///
    /// The recoverable tier is a user or repository-state problem; the
    /// fatal tier means the environment itself failed mid-operation.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Io { .. })
    }
}

// Additional From implementations for external error types

impl From<ignore::Error> for Error {
    fn from(err: ignore::Error) -> Self {
        // ignore::Error can wrap an io::Error or be a path error
        match err.io_error() {
            Some(io_err) => Error::Io {
                source: std::io::Error::new(io_err.kind(), io_err.to_string()),
            },
            None => Error::Io {
                source: std::io::Error::other(err.to_string()),
            },
        }
    }
}
