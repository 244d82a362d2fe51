//! Compressed backups with an integrity sidecar.
//!
//! A backup is a gzip-compressed tar named `{timestamp}_{basename}.bak`
//! holding exactly two entries:
//!
//! * the file itself, under its path relative to the working directory
//!   (its basename when it lives elsewhere);
//! * `{timestamp}.SHA256`, the lowercase hex SHA-256 of the file at backup time.
//!
//! The archive is written under a hidden `.partial` name and renamed into
//! place only once complete. The sidecar is removed whether or not the
//! archive succeeds.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tar::{Archive, Builder};

use crate::error::{FileError, Result};
use crate::handle::FileHandle;
use crate::hasher::{digest_reader, to_hex, HashAlgorithm};
use crate::timestamp::format_timestamp;

/// Extension of the digest sidecar.
pub const SIDECAR_EXTENSION: &str = "SHA256";

/// Extension of backup archives.
pub const ARCHIVE_EXTENSION: &str = "bak";

impl FileHandle {
    /// Back the file up into `directory` (the working directory when `None`).
    ///
    /// The directory is created if needed. Returns the archive path, which is
    /// also remembered as [`backup_file`](FileHandle::backup_file).
    ///
    /// # Errors
    ///
    /// [`FileError::Backup`] if the file cannot be read or any part of the
    /// archive cannot be written. No partial archive is left behind.
    pub fn backup(&mut self, directory: Option<&Path>) -> Result<PathBuf> {
        let timestamp = format_timestamp();
        self.backup_with_timestamp(directory, &timestamp)
    }

    /// [`backup`](Self::backup) with a caller-supplied timestamp.
    pub fn backup_with_timestamp(
        &mut self,
        directory: Option<&Path>,
        timestamp: &str,
    ) -> Result<PathBuf> {
        let dir = directory.map(Path::to_path_buf).unwrap_or_default();
        let backup_err = |source| FileError::Backup {
            path: self.path().to_path_buf(),
            source,
        };

        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(&dir).map_err(backup_err)?;
        }

        let mut source = File::open(self.abs_path()).map_err(backup_err)?;
        let digest = digest_reader(&mut source, HashAlgorithm::Sha256, self.block_size())
            .map_err(backup_err)?;

        let sidecar_name = format!("{timestamp}.{SIDECAR_EXTENSION}");
        let sidecar = dir.join(&sidecar_name);
        let archive_name = format!("{timestamp}_{}.{ARCHIVE_EXTENSION}", self.basename());
        let archive = dir.join(&archive_name);
        let partial = dir.join(format!(".{archive_name}.partial"));

        fs::write(&sidecar, to_hex(&digest)).map_err(backup_err)?;

        let entry_name = self
            .relative_path()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(self.basename()));

        let result = write_archive(
            &partial,
            &[
                (self.abs_path(), entry_name.as_path()),
                (sidecar.as_path(), Path::new(&sidecar_name)),
            ],
        )
        .and_then(|()| fs::rename(&partial, &archive));

        if let Err(e) = fs::remove_file(&sidecar) {
            log::warn!("Could not remove sidecar {}: {}", sidecar.display(), e);
        }
        if let Err(source) = result {
            // May not exist if creation itself failed.
            let _ = fs::remove_file(&partial);
            return Err(backup_err(source));
        }

        log::info!(
            "Backed up {} to {}",
            self.path().display(),
            archive.display()
        );
        self.record_backup(archive.clone());
        Ok(archive)
    }
}

fn write_archive(dest: &Path, entries: &[(&Path, &Path)]) -> io::Result<()> {
    let file = File::create(dest)?;
    let encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
    let mut builder = Builder::new(encoder);
    for (source, name) in entries {
        builder.append_path_with_name(source, name)?;
    }

    let writer = builder.into_inner()?.finish()?;
    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()
}

/// Outcome of [`verify_backup`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupReport {
    /// Archive that was checked.
    pub archive: PathBuf,
    /// Name of the backed-up file inside the archive.
    pub entry: PathBuf,
    /// Digest recorded in the sidecar.
    pub expected: String,
    /// Digest of the archived file content.
    pub actual: String,
}

impl BackupReport {
    /// Whether the archived content still matches its sidecar digest.
    #[must_use]
    pub fn is_intact(&self) -> bool {
        self.expected.eq_ignore_ascii_case(&self.actual)
    }
}

/// Recompute the digest of the file stored in `archive` and compare it with
/// the sidecar stored next to it.
///
/// # Errors
///
/// [`FileError::Backup`] if the archive cannot be read or does not hold
/// exactly one file entry and one sidecar.
pub fn verify_backup(archive: impl AsRef<Path>) -> Result<BackupReport> {
    let archive = archive.as_ref();
    inspect_archive(archive).map_err(|source| FileError::Backup {
        path: archive.to_path_buf(),
        source,
    })
}

fn inspect_archive(path: &Path) -> io::Result<BackupReport> {
    let decoder = GzDecoder::new(BufReader::new(File::open(path)?));
    let mut tar = Archive::new(decoder);

    // Backups are written file first, sidecar second.
    let mut expected = None;
    let mut content = None;
    for entry in tar.entries()? {
        let mut entry = entry?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let name = entry.path()?.into_owned();

        if content.is_none() {
            let raw = digest_reader(&mut entry, HashAlgorithm::Sha256, 64 * 1024)?;
            content = Some((name, to_hex(&raw)));
        } else if expected.is_none() {
            if !is_sidecar_name(&name) {
                return Err(invalid_archive("second entry is not a digest sidecar"));
            }
            let mut digest = String::new();
            entry.read_to_string(&mut digest)?;
            expected = Some(digest.trim().to_string());
        } else {
            return Err(invalid_archive("more than two entries"));
        }
    }

    match (expected, content) {
        (Some(expected), Some((entry, actual))) => Ok(BackupReport {
            archive: path.to_path_buf(),
            entry,
            expected,
            actual,
        }),
        (None, _) => Err(invalid_archive("missing digest sidecar")),
        (_, None) => Err(invalid_archive("missing file entry")),
    }
}

/// A top-level `{timestamp}.SHA256` entry.
fn is_sidecar_name(name: &Path) -> bool {
    name.parent().is_some_and(|p| p.as_os_str().is_empty())
        && name
            .extension()
            .is_some_and(|ext| ext == SIDECAR_EXTENSION)
}

fn invalid_archive(reason: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, reason.to_string())
}
