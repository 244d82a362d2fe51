//! Command execution for the binary.

use anyhow::{Context, Result};
use bytesize::ByteSize;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::backup::verify_backup;
use crate::classification::FileClass;
use crate::cli::{BackupArgs, Cli, Commands, GrepArgs, HashArgs, InfoArgs, VerifyArgs};
use crate::config::Config;
use crate::error::ExitCode;
use crate::handle::FileHandle;
use crate::hasher::{Digest, DigestForm};
use crate::logging::init_logging;
use crate::mode::AccessMode;

/// Facts printed by `info`.
#[derive(Debug, Serialize)]
pub struct FileInfo {
    pub path: PathBuf,
    pub absolute_path: PathBuf,
    pub basename: String,
    pub directory: PathBuf,
    pub stem: String,
    pub extension: Option<String>,
    pub class: FileClass,
    pub size: u64,
    pub modified: DateTime<Local>,
    pub lines: usize,
    pub owner: Option<String>,
    pub group: Option<String>,
}

impl FileInfo {
    /// Collect the facts for an open or closed handle.
    pub fn collect(file: &mut FileHandle) -> Result<Self> {
        Ok(Self {
            path: file.path().to_path_buf(),
            absolute_path: file.abs_path().to_path_buf(),
            basename: file.basename().to_string(),
            directory: file.dirname().to_path_buf(),
            stem: file.stem().to_string(),
            extension: file.extension().map(str::to_string),
            class: file.class(),
            size: file.size()?,
            modified: DateTime::<Local>::from(file.last_modified()?),
            lines: file.line_count()?,
            owner: file.owner().ok(),
            group: file.group().ok(),
        })
    }
}

/// Run a parsed command line.
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    init_logging(cli.verbose, cli.quiet);
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Info(args) => run_info(&config, args),
        Commands::Hash(args) => run_hash(&config, args),
        Commands::Grep(args) => run_grep(&config, args),
        Commands::Touch(args) => {
            let options = config
                .handle_options()
                .with_mode(AccessMode::APPEND)
                .open_on_create(false);
            let mut file = FileHandle::with_options(&args.path, options)?;
            let stamp = file.touch()?;
            println!("{}", DateTime::<Local>::from(stamp).to_rfc3339());
            Ok(ExitCode::Success)
        }
        Commands::Backup(args) => run_backup(&config, args),
        Commands::Verify(args) => run_verify(args),
    }
}

fn open_closed(config: &Config, path: &Path) -> Result<FileHandle> {
    let options = config.handle_options().open_on_create(false);
    FileHandle::with_options(path, options)
        .with_context(|| format!("Cannot use {}", path.display()))
}

fn run_info(config: &Config, args: InfoArgs) -> Result<ExitCode> {
    let mut file = open_closed(config, &args.path)?;
    let info = FileInfo::collect(&mut file)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(ExitCode::Success);
    }

    println!("path:      {}", info.absolute_path.display());
    println!("class:     {:?}", info.class);
    println!("size:      {} ({} bytes)", ByteSize::b(info.size), info.size);
    println!("modified:  {}", info.modified.to_rfc3339());
    println!("lines:     {}", info.lines);
    if let Some(ext) = &info.extension {
        println!("extension: {ext}");
    }
    if let (Some(owner), Some(group)) = (&info.owner, &info.group) {
        println!("owner:     {owner}:{group}");
    }
    Ok(ExitCode::Success)
}

fn run_hash(config: &Config, args: HashArgs) -> Result<ExitCode> {
    let algorithm = args.algorithm.unwrap_or(config.default_algorithm);
    let form = if args.raw {
        DigestForm::Bytes
    } else {
        DigestForm::Hex
    };

    let mut file = open_closed(config, &args.path)?;
    match file.hash(algorithm, form)? {
        Digest::Hex(hex) => println!("{}  {}", hex, args.path.display()),
        Digest::Bytes(bytes) => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(&bytes)?;
            stdout.flush()?;
        }
    }
    Ok(ExitCode::Success)
}

fn run_grep(config: &Config, args: GrepArgs) -> Result<ExitCode> {
    let file = open_closed(config, &args.path)?;
    let matches = file.grep(&args.pattern)?;

    if args.count {
        println!("{}", matches.len());
    } else {
        for line in &matches {
            println!("{line}");
        }
    }

    Ok(if matches.is_empty() {
        ExitCode::NoMatches
    } else {
        ExitCode::Success
    })
}

fn run_backup(config: &Config, args: BackupArgs) -> Result<ExitCode> {
    let mut file = open_closed(config, &args.path)?;
    let dir = args.dir.as_deref().or(config.backup_dir.as_deref());
    let archive = file.backup(dir)?;
    println!("{}", archive.display());
    Ok(ExitCode::Success)
}

fn run_verify(args: VerifyArgs) -> Result<ExitCode> {
    let report = verify_backup(&args.archive)?;
    if report.is_intact() {
        println!("OK  {}  {}", report.actual, report.entry.display());
        Ok(ExitCode::Success)
    } else {
        log::error!(
            "Digest mismatch for {}: expected {}, got {}",
            report.entry.display(),
            report.expected,
            report.actual
        );
        println!("FAILED  {}", report.entry.display());
        Ok(ExitCode::DigestMismatch)
    }
}
