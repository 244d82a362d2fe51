//! Error taxonomy for file handles and exit codes for the binary.

use serde::Serialize;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by [`FileHandle`](crate::handle::FileHandle) operations.
#[derive(Debug, Error)]
pub enum FileError {
    /// Nothing exists at the path after the creation attempt.
    #[error("path not found: {0}")]
    PathNotFound(PathBuf),

    /// The path exists but is not a regular file.
    #[error("not a regular file: {0}")]
    NotAFile(PathBuf),

    /// The access mode string is not one of the supported modes.
    #[error("invalid file access mode: '{0}'")]
    InvalidMode(String),

    /// The OS refused to open the file.
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The operation needs an open handle.
    #[error("file is not open: {0}")]
    NotOpen(PathBuf),

    /// Reading from the file failed.
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Writing through the handle failed.
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The grep pattern did not compile.
    #[error("invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// Building the backup archive failed.
    #[error("backup of {path} failed: {source}")]
    Backup {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The platform has no notion of the requested property.
    #[error("{0} is not supported on this platform")]
    UnsupportedPlatform(&'static str),

    /// Any other OS-level failure (stat, permissions, timestamps).
    #[error("I/O error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl FileError {
    /// Path associated with this error, if any.
    #[must_use]
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Self::PathNotFound(p)
            | Self::NotAFile(p)
            | Self::NotOpen(p)
            | Self::Open { path: p, .. }
            | Self::Read { path: p, .. }
            | Self::Write { path: p, .. }
            | Self::Backup { path: p, .. }
            | Self::Io { path: p, .. } => Some(p),
            Self::InvalidMode(_) | Self::InvalidPattern { .. } | Self::UnsupportedPlatform(_) => {
                None
            }
        }
    }
}

/// Convenience alias used throughout the library.
pub type Result<T> = std::result::Result<T, FileError>;

/// Exit codes for the filekeep binary.
///
/// - 0: Success
/// - 1: General error
/// - 2: `grep` ran but nothing matched
/// - 3: `verify` found a digest mismatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    NoMatches = 2,
    DigestMismatch = 3,
}

impl ExitCode {
    /// Get the numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Get the machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "FK000",
            Self::GeneralError => "FK001",
            Self::NoMatches => "FK002",
            Self::DigestMismatch => "FK003",
        }
    }
}
