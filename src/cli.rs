//! Command-line interface definitions for filekeep.
//!
//! # Example
//!
//! ```bash
//! # Metadata for a file, as JSON
//! filekeep info notes.txt --json
//!
//! # MD5 instead of the configured default algorithm
//! filekeep hash notes.txt --algorithm md5
//!
//! # Lines matching a regular expression
//! filekeep grep 'TODO|FIXME' src/main.rs
//!
//! # Compressed backup with SHA-256 sidecar, then check it
//! filekeep backup notes.txt --dir backups/
//! filekeep verify backups/2026-10-17_153045-123_notes.txt.bak
//! ```

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::hasher::HashAlgorithm;

/// Inspect, hash, search and back up single files.
#[derive(Debug, Parser)]
#[command(name = "filekeep")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Configuration file (TOML)
    #[arg(long, value_name = "FILE", global = true, env = "FILEKEEP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show path-derived facts and metadata
    Info(InfoArgs),
    /// Print a content digest
    Hash(HashArgs),
    /// Print lines matching a regular expression
    Grep(GrepArgs),
    /// Update the modification time, creating the file if missing
    Touch(PathArg),
    /// Write a compressed backup with a SHA-256 sidecar
    Backup(BackupArgs),
    /// Check a backup archive against its sidecar digest
    Verify(VerifyArgs),
}

/// A single file operand.
#[derive(Debug, Args)]
pub struct PathArg {
    /// File to operate on
    #[arg(value_name = "PATH")]
    pub path: PathBuf,
}

#[derive(Debug, Args)]
pub struct InfoArgs {
    /// File to describe
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Emit JSON instead of text
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct HashArgs {
    /// File to hash
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Digest algorithm (defaults to the configured one)
    #[arg(short, long, value_enum)]
    pub algorithm: Option<HashAlgorithm>,

    /// Write raw digest bytes instead of hex
    #[arg(long)]
    pub raw: bool,
}

#[derive(Debug, Args)]
pub struct GrepArgs {
    /// Regular expression, matched anywhere in a line
    #[arg(value_name = "PATTERN")]
    pub pattern: String,

    /// File to search
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Print only the number of matching lines
    #[arg(short, long)]
    pub count: bool,
}

#[derive(Debug, Args)]
pub struct BackupArgs {
    /// File to back up
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Target directory (overrides `backup_dir` from config)
    #[arg(short, long, value_name = "DIR")]
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct VerifyArgs {
    /// Archive produced by `backup`
    #[arg(value_name = "ARCHIVE")]
    pub archive: PathBuf,
}
