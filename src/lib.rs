//! filekeep - single-file handles with cached metadata.
//!
//! A [`FileHandle`] wraps one file on the local filesystem: it opens and
//! closes the OS handle, memoizes path-derived facts, detects modification
//! against a cached timestamp, computes MD5/SHA-256 digests block by block,
//! greps lines, and writes compressed backups with an integrity sidecar.
//! Handles created as temporary delete their file when dropped.

pub mod backup;
pub mod classification;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod handle;
pub mod hasher;
pub mod logging;
pub mod mode;
pub mod timestamp;

pub use backup::{verify_backup, BackupReport};
pub use classification::FileClass;
pub use commands::run_app;
pub use error::{FileError, Result};
pub use handle::{FileHandle, HandleOptions};
pub use hasher::{Digest, DigestForm, HashAlgorithm};
pub use mode::AccessMode;
pub use timestamp::format_timestamp;
