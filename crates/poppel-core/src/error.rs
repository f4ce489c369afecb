//! Error handling
//!
//! Every fallible operation returns a [`PoppelError`]. Callers that need to
//! branch on the failure category use [`PoppelError::kind`] rather than
//! matching individual variants.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::node::NodeType;
use crate::state::OpenMode;

/// Coarse error categories callers can branch on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed relative node path
    Path,
    /// Node exists with the wrong type, or a wrong-kind handle was used
    TypeMismatch,
    /// Node or file does not exist
    NotFound,
    /// Node or file already exists
    AlreadyExists,
    /// Operation not permitted by the file's open state or mode
    State,
    /// Malformed array header or metadata document
    Format,
    /// Array file or descriptor version is not supported
    UnsupportedVersion,
    /// Array on disk does not match what the caller expected
    FormatMismatch,
    /// Underlying read/write/remove failure
    Io,
}

/// Errors that can occur during Poppel operations
#[derive(Error, Debug)]
pub enum PoppelError {
    /// Relative node path rejected by validation
    #[error("Invalid node path '{path}': {reason}")]
    InvalidPath { path: String, reason: &'static str },

    /// Node type does not match the requested type
    #[error("Node at '{path}' is a {found}, expected {expected}")]
    TypeMismatch {
        path: PathBuf,
        expected: NodeType,
        found: NodeType,
    },

    /// Node or file does not exist
    #[error("Not found: '{path}'")]
    NotFound { path: PathBuf },

    /// Node or file already exists
    #[error("Already exists: '{path}'")]
    AlreadyExists { path: PathBuf },

    /// File handle has been closed
    #[error("Unable to operate on a closed file")]
    Closed,

    /// File was opened without write access
    #[error("Cannot change data on a file opened in read-only mode")]
    ReadOnly,

    /// Open mode combination is not allowed
    #[error("Invalid open mode {mode}: {reason}")]
    InvalidMode { mode: OpenMode, reason: &'static str },

    /// Array header or metadata document could not be parsed
    #[error("Invalid format{}: {details}", location(.path))]
    Format {
        path: Option<PathBuf>,
        details: String,
    },

    /// Version not supported by this implementation
    #[error("Unsupported {what} version {version}")]
    UnsupportedVersion { what: &'static str, version: String },

    /// Stored array does not have the expected dtype, order or shape
    #[error("Array mismatch: expected {expected}, found {found}")]
    FormatMismatch { expected: String, found: String },

    /// Failed to read file
    #[error("Failed to read '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to write or remove file
    #[error("Failed to write '{path}': {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Generic I/O error on a stream without a known path
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

fn location(path: &Option<PathBuf>) -> String {
    match path {
        Some(path) => format!(" in '{}'", path.display()),
        None => String::new(),
    }
}

impl PoppelError {
    /// The category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            PoppelError::InvalidPath { .. } => ErrorKind::Path,
            PoppelError::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            PoppelError::NotFound { .. } => ErrorKind::NotFound,
            PoppelError::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            PoppelError::Closed | PoppelError::ReadOnly | PoppelError::InvalidMode { .. } => {
                ErrorKind::State
            }
            PoppelError::Format { .. } => ErrorKind::Format,
            PoppelError::UnsupportedVersion { .. } => ErrorKind::UnsupportedVersion,
            PoppelError::FormatMismatch { .. } => ErrorKind::FormatMismatch,
            PoppelError::ReadError { .. } | PoppelError::WriteError { .. } | PoppelError::Io(_) => {
                ErrorKind::Io
            }
        }
    }

    /// Create an error from a failed read, with path context
    ///
    /// Missing files are reported as [`ErrorKind::NotFound`].
    pub fn read(error: io::Error, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match error.kind() {
            io::ErrorKind::NotFound => PoppelError::NotFound { path },
            _ => PoppelError::ReadError {
                path,
                source: error,
            },
        }
    }

    /// Create an error from a failed write, create or remove, with path context
    ///
    /// Occupied targets are reported as [`ErrorKind::AlreadyExists`] and
    /// missing ones as [`ErrorKind::NotFound`].
    pub fn write(error: io::Error, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match error.kind() {
            io::ErrorKind::AlreadyExists => PoppelError::AlreadyExists { path },
            io::ErrorKind::NotFound => PoppelError::NotFound { path },
            _ => PoppelError::WriteError {
                path,
                source: error,
            },
        }
    }

    /// Shorthand for a format error without path context
    pub(crate) fn format(details: impl Into<String>) -> Self {
        PoppelError::Format {
            path: None,
            details: details.into(),
        }
    }

    /// Attach a path to a format error raised by a stream-level function
    pub(crate) fn at_path(self, at: impl Into<PathBuf>) -> Self {
        match self {
            PoppelError::Format { path: None, details } => PoppelError::Format {
                path: Some(at.into()),
                details,
            },
            PoppelError::Io(source) => PoppelError::read(source, at),
            other => other,
        }
    }
}

/// Result type for Poppel operations
pub type Result<T> = std::result::Result<T, PoppelError>;
