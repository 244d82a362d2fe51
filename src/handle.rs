//! The [`FileHandle`] entity.
//!
//! A `FileHandle` owns a path, an optional open [`File`], a fixed
//! [`FileClass`] and a handful of cached values derived from the file:
//!
//! - path facts (absolute path, basename, stem, ...) computed once at
//!   construction, since the path never changes;
//! - the modification time observed at construction or the last
//!   [`touch`](FileHandle::touch), used by [`modified`](FileHandle::modified);
//! - digests keyed by algorithm and that modification time, dropped whenever
//!   content is written through the handle.
//!
//! Dropping a handle closes it, and deletes the backing file when the handle
//! was created as temporary.
//!
//! # Example
//!
//! ```no_run
//! use filekeep::handle::{FileHandle, HandleOptions};
//! use filekeep::hasher::{DigestForm, HashAlgorithm};
//! use filekeep::mode::AccessMode;
//!
//! let options = HandleOptions::default().with_mode(AccessMode::WRITE);
//! let mut file = FileHandle::with_options("notes.txt", options)?;
//! file.write(b"hello\n")?;
//! file.close();
//!
//! let digest = file.hash(HashAlgorithm::Sha256, DigestForm::Hex)?;
//! println!("{} {}", digest, file.basename());
//! # Ok::<(), filekeep::error::FileError>(())
//! ```

use std::collections::HashMap;
use std::env;
use std::fs::{self, File, Metadata, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use filetime::FileTime;
use regex::Regex;

use crate::classification::FileClass;
use crate::error::{FileError, Result};
use crate::hasher::{self, Digest, DigestForm, HashAlgorithm, DEFAULT_BLOCK_SIZE};
use crate::mode::AccessMode;

/// Construction options for [`FileHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandleOptions {
    /// Open the file immediately after construction.
    pub open_on_create: bool,
    /// Stored access mode, used by construction and by `open(None)`.
    pub mode: AccessMode,
    /// Delete the backing file when the handle is dropped.
    pub temporary: bool,
    /// Bytes read per digest update.
    pub block_size: usize,
}

impl Default for HandleOptions {
    fn default() -> Self {
        Self {
            open_on_create: true,
            mode: AccessMode::READ,
            temporary: false,
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }
}

impl HandleOptions {
    #[must_use]
    pub fn with_mode(mut self, mode: AccessMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn open_on_create(mut self, open: bool) -> Self {
        self.open_on_create = open;
        self
    }

    #[must_use]
    pub fn temporary(mut self, temporary: bool) -> Self {
        self.temporary = temporary;
        self
    }

    #[must_use]
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }
}

/// Facts derived purely from the path.
#[derive(Debug, Clone)]
struct PathFacts {
    abs_path: PathBuf,
    relative_path: Option<PathBuf>,
    basename: String,
    dirname: PathBuf,
    stem: String,
    extension: Option<String>,
}

impl PathFacts {
    fn resolve(path: &Path) -> Result<Self> {
        let abs_path = std::path::absolute(path).map_err(|source| FileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let relative_path = env::current_dir()
            .ok()
            .and_then(|cwd| abs_path.strip_prefix(cwd).ok().map(Path::to_path_buf))
            .filter(|p| {
                !p.as_os_str().is_empty()
                    && !p.components().any(|c| matches!(c, Component::ParentDir))
            });

        let basename = abs_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| FileError::NotAFile(path.to_path_buf()))?;
        let dirname = abs_path.parent().map(Path::to_path_buf).unwrap_or_default();
        let stem = abs_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| basename.clone());
        let extension = abs_path
            .extension()
            .map(|e| e.to_string_lossy().into_owned());

        Ok(Self {
            abs_path,
            relative_path,
            basename,
            dirname,
            stem,
            extension,
        })
    }
}

#[derive(Debug, Clone)]
struct CachedDigest {
    stamp: SystemTime,
    raw: Vec<u8>,
}

/// A file created during construction; removed on drop unless kept.
struct CreatedFile<'a> {
    path: &'a Path,
    armed: bool,
}

impl<'a> CreatedFile<'a> {
    fn new(path: &'a Path) -> Self {
        Self { path, armed: true }
    }

    fn keep(mut self) {
        self.armed = false;
    }
}

impl Drop for CreatedFile<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match fs::remove_file(self.path) {
            Ok(()) => log::debug!("Removed {} after failed construction", self.path.display()),
            Err(e) => log::warn!("Could not remove {}: {}", self.path.display(), e),
        }
    }
}

/// Wrapper around a single file on the local filesystem.
///
/// Not synchronised: a handle has a single owner, and every mutating
/// operation takes `&mut self`.
#[derive(Debug)]
pub struct FileHandle {
    path: PathBuf,
    facts: PathFacts,
    mode: AccessMode,
    handle: Option<File>,
    class: FileClass,
    cached_stamp: SystemTime,
    digests: HashMap<HashAlgorithm, CachedDigest>,
    line_count: Option<(SystemTime, usize)>,
    block_size: usize,
    backup_file: Option<PathBuf>,
}

impl FileHandle {
    /// Open an existing file for reading.
    ///
    /// # Errors
    ///
    /// See [`FileHandle::with_options`].
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        Self::with_options(path, HandleOptions::default())
    }

    /// Wrap `path`, creating it first when it is missing and the mode is
    /// creation-capable (`w*`, `a*`).
    ///
    /// # Errors
    ///
    /// - [`FileError::PathNotFound`] if nothing exists at `path` afterwards
    /// - [`FileError::NotAFile`] if `path` is a directory or other non-file
    /// - [`FileError::Open`] if opening on create fails
    pub fn with_options(path: impl AsRef<Path>, options: HandleOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let created = if options.mode.creates() && fs::symlink_metadata(&path).is_err() {
            OpenOptions::new()
                .append(true)
                .create(true)
                .open(&path)
                .map_err(|source| FileError::Open {
                    path: path.clone(),
                    source,
                })?;
            log::debug!("Created empty file {}", path.display());
            Some(CreatedFile::new(&path))
        } else {
            None
        };

        let file = Self::wrap_existing(path.clone(), options)?;
        if let Some(created) = created {
            created.keep();
        }
        Ok(file)
    }

    fn wrap_existing(path: PathBuf, options: HandleOptions) -> Result<Self> {
        let metadata = match fs::metadata(&path) {
            Ok(m) => m,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(FileError::PathNotFound(path))
            }
            Err(source) => return Err(FileError::Io { path, source }),
        };
        if !metadata.is_file() {
            return Err(FileError::NotAFile(path));
        }

        let facts = PathFacts::resolve(&path)?;
        let class = FileClass::classify(&facts.basename, options.temporary);

        // Nothing fallible may follow building `Self`: its Drop deletes
        // temporary files.
        let handle = if options.open_on_create {
            let file = options
                .mode
                .open_options()
                .open(&facts.abs_path)
                .map_err(|source| FileError::Open {
                    path: path.clone(),
                    source,
                })?;
            Some(file)
        } else {
            None
        };
        // Taken after opening: a `w` mode open truncates and bumps the mtime.
        let cached_stamp = fs::metadata(&facts.abs_path)
            .and_then(|m| m.modified())
            .map_err(|source| FileError::Io {
                path: path.clone(),
                source,
            })?;

        let file = Self {
            path,
            facts,
            mode: options.mode,
            handle,
            class,
            cached_stamp,
            digests: HashMap::new(),
            line_count: None,
            block_size: options.block_size,
            backup_file: None,
        };

        log::debug!(
            "Constructed {:?} handle for {} (mode {}, open: {})",
            file.class,
            file.path.display(),
            file.mode,
            file.is_open()
        );
        Ok(file)
    }

    // ------------------------------------------------------------------
    // Open / close
    // ------------------------------------------------------------------

    /// Open the file with `mode`, or the stored mode when `None`.
    ///
    /// An already open handle is replaced. The stored mode is left unchanged.
    ///
    /// # Errors
    ///
    /// [`FileError::Open`] wrapping the OS error. The handle stays in its
    /// previous state, so the caller may retry with a different mode.
    pub fn open(&mut self, mode: Option<AccessMode>) -> Result<bool> {
        let mode = mode.unwrap_or(self.mode);
        let file = mode
            .open_options()
            .open(&self.facts.abs_path)
            .map_err(|source| FileError::Open {
                path: self.path.clone(),
                source,
            })?;
        self.handle = Some(file);
        log::trace!("Opened {} with mode {}", self.path.display(), mode);
        Ok(true)
    }

    /// Release the handle. Returns `false` if it was already closed.
    pub fn close(&mut self) -> bool {
        match self.handle.take() {
            Some(file) => {
                drop(file);
                log::trace!("Closed {}", self.path.display());
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    fn live<'a>(handle: &'a mut Option<File>, path: &Path) -> Result<&'a mut File> {
        handle
            .as_mut()
            .ok_or_else(|| FileError::NotOpen(path.to_path_buf()))
    }

    // ------------------------------------------------------------------
    // Reading and writing
    // ------------------------------------------------------------------

    /// Read at most `n` bytes from the current position, or everything up to
    /// end of file when `n` is `None`.
    ///
    /// # Errors
    ///
    /// [`FileError::NotOpen`] when closed, [`FileError::Read`] on OS failure.
    pub fn read(&mut self, n: Option<usize>) -> Result<Vec<u8>> {
        let file = Self::live(&mut self.handle, &self.path)?;
        let mut buf = Vec::new();
        let result = match n {
            Some(n) => file.take(n as u64).read_to_end(&mut buf),
            None => file.read_to_end(&mut buf),
        };
        result.map_err(|source| FileError::Read {
            path: self.path.clone(),
            source,
        })?;
        Ok(buf)
    }

    /// Read the rest of the file as UTF-8 text.
    pub fn read_to_string(&mut self) -> Result<String> {
        let file = Self::live(&mut self.handle, &self.path)?;
        let mut buf = String::new();
        file.read_to_string(&mut buf)
            .map_err(|source| FileError::Read {
                path: self.path.clone(),
                source,
            })?;
        Ok(buf)
    }

    /// All lines of the file, without terminators.
    ///
    /// Works whether or not the handle is open: the path is opened
    /// separately, so neither `is_open()` nor the stream position change.
    pub fn read_lines(&self) -> Result<Vec<String>> {
        let file = File::open(&self.facts.abs_path).map_err(|source| FileError::Open {
            path: self.path.clone(),
            source,
        })?;
        BufReader::new(file)
            .lines()
            .collect::<io::Result<Vec<_>>>()
            .map_err(|source| FileError::Read {
                path: self.path.clone(),
                source,
            })
    }

    /// Write all of `data` through the open handle.
    ///
    /// Cached digests are dropped so the next [`hash`](Self::hash) sees the
    /// new content.
    ///
    /// # Errors
    ///
    /// [`FileError::NotOpen`] when closed, [`FileError::Write`] on OS failure
    /// (including a handle opened read-only).
    pub fn write(&mut self, data: &[u8]) -> Result<usize> {
        let file = Self::live(&mut self.handle, &self.path)?;
        file.write_all(data).map_err(|source| FileError::Write {
            path: self.path.clone(),
            source,
        })?;
        self.invalidate_content();
        Ok(data.len())
    }

    /// Truncate the file to `len` bytes, or empty it when `None`.
    ///
    /// The stream position is not moved.
    pub fn truncate(&mut self, len: Option<u64>) -> Result<()> {
        let file = Self::live(&mut self.handle, &self.path)?;
        file.set_len(len.unwrap_or(0))
            .map_err(|source| FileError::Write {
                path: self.path.clone(),
                source,
            })?;
        self.invalidate_content();
        Ok(())
    }

    /// Move the stream position of the open handle.
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let file = Self::live(&mut self.handle, &self.path)?;
        file.seek(pos).map_err(|source| FileError::Io {
            path: self.path.clone(),
            source,
        })
    }

    /// Seek back to the start of the file.
    pub fn rewind(&mut self) -> Result<()> {
        self.seek(SeekFrom::Start(0)).map(|_| ())
    }

    fn invalidate_content(&mut self) {
        self.digests.clear();
        self.line_count = None;
    }

    // ------------------------------------------------------------------
    // Modification tracking
    // ------------------------------------------------------------------

    fn disk_mtime(&self) -> Result<SystemTime> {
        self.metadata()?
            .modified()
            .map_err(|source| FileError::Io {
                path: self.path.clone(),
                source,
            })
    }

    /// Set access and modification time to now, creating the file if it has
    /// gone missing. Refreshes the cached stamp and returns it.
    pub fn touch(&mut self) -> Result<SystemTime> {
        if self.exists() {
            let now = FileTime::now();
            filetime::set_file_times(&self.facts.abs_path, now, now).map_err(|source| {
                FileError::Io {
                    path: self.path.clone(),
                    source,
                }
            })?;
        } else {
            AccessMode::APPEND
                .open_options()
                .open(&self.facts.abs_path)
                .map_err(|source| FileError::Open {
                    path: self.path.clone(),
                    source,
                })?;
            log::debug!("Touch re-created {}", self.path.display());
        }
        self.cached_stamp = self.disk_mtime()?;
        Ok(self.cached_stamp)
    }

    /// Whether the on-disk modification time is newer than the cached stamp.
    ///
    /// Never refreshes the stamp; only [`touch`](Self::touch) does.
    pub fn modified(&self) -> Result<bool> {
        Ok(self.disk_mtime()? > self.cached_stamp)
    }

    /// Modification time recorded at construction or the last `touch()`.
    #[must_use]
    pub fn cached_modification_time(&self) -> SystemTime {
        self.cached_stamp
    }

    // ------------------------------------------------------------------
    // Hashing
    // ------------------------------------------------------------------

    /// Digest of the file content.
    ///
    /// With an open handle, reading starts at the current stream position;
    /// rewind first for a whole-file digest. A closed handle opens the file
    /// read-only for the duration and stays closed.
    ///
    /// Whole-file results are cached per algorithm for the current cached
    /// stamp. A digest taken from a non-zero stream position covers only the
    /// tail and is never cached. Writes through this handle and `touch()`
    /// force recomputation; external modification alone does not.
    pub fn hash(&mut self, algorithm: HashAlgorithm, form: DigestForm) -> Result<Digest> {
        let whole_file = match self.handle.as_mut() {
            Some(file) => {
                file.stream_position().map_err(|source| FileError::Read {
                    path: self.path.clone(),
                    source,
                })? == 0
            }
            None => true,
        };
        if whole_file {
            if let Some(cached) = self.digests.get(&algorithm) {
                if cached.stamp == self.cached_stamp {
                    return Ok(Digest::render(&cached.raw, form));
                }
            }
        }

        let read_err = |source| FileError::Read {
            path: self.path.clone(),
            source,
        };
        let raw = match self.handle.as_mut() {
            Some(file) => hasher::digest_reader(file, algorithm, self.block_size),
            None => {
                let mut file =
                    File::open(&self.facts.abs_path).map_err(|source| FileError::Open {
                        path: self.path.clone(),
                        source,
                    })?;
                hasher::digest_reader(&mut file, algorithm, self.block_size)
            }
        }
        .map_err(read_err)?;

        log::trace!("Computed {} of {}", algorithm, self.path.display());
        let digest = Digest::render(&raw, form);
        if whole_file {
            self.digests.insert(
                algorithm,
                CachedDigest {
                    stamp: self.cached_stamp,
                    raw,
                },
            );
        }
        Ok(digest)
    }

    pub fn md5(&mut self, form: DigestForm) -> Result<Digest> {
        self.hash(HashAlgorithm::Md5, form)
    }

    pub fn sha256(&mut self, form: DigestForm) -> Result<Digest> {
        self.hash(HashAlgorithm::Sha256, form)
    }

    // ------------------------------------------------------------------
    // Deletion, search, permissions
    // ------------------------------------------------------------------

    /// Close the handle and remove the backing file.
    ///
    /// Failures are soft: a missing file, denied permission or any other
    /// removal error yields `false`.
    pub fn delete(&mut self) -> bool {
        self.close();
        match fs::remove_file(&self.facts.abs_path) {
            Ok(()) => {
                self.invalidate_content();
                log::debug!("Deleted {}", self.path.display());
                true
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!("Nothing to delete at {}", self.path.display());
                false
            }
            Err(e) => {
                log::warn!("Could not delete {}: {}", self.path.display(), e);
                false
            }
        }
    }

    /// Lines matching the regular expression `pattern` anywhere in the line.
    ///
    /// # Errors
    ///
    /// [`FileError::InvalidPattern`] if the pattern does not compile, checked
    /// before the file is read.
    pub fn grep(&self, pattern: &str) -> Result<Vec<String>> {
        let re = Regex::new(pattern).map_err(|source| FileError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(self
            .read_lines()?
            .into_iter()
            .filter(|line| re.is_match(line))
            .collect())
    }

    /// Number of lines, memoized against the on-disk modification time.
    pub fn line_count(&mut self) -> Result<usize> {
        let stamp = self.disk_mtime()?;
        if let Some((cached_at, count)) = self.line_count {
            if cached_at == stamp {
                return Ok(count);
            }
        }
        let count = self.read_lines()?.len();
        self.line_count = Some((stamp, count));
        Ok(count)
    }

    /// Change the stored access mode used by `open(None)`.
    ///
    /// # Errors
    ///
    /// [`FileError::InvalidMode`]; the stored mode is left untouched.
    pub fn set_mode(&mut self, mode: &str) -> Result<AccessMode> {
        self.mode = mode.parse()?;
        Ok(self.mode)
    }

    /// Set OS permission bits.
    ///
    /// On unix `permissions` are the usual mode bits. Elsewhere only the
    /// owner-write bit is honoured, toggling the read-only flag.
    pub fn chmod(&self, permissions: u32) -> Result<()> {
        let io_err = |source| FileError::Io {
            path: self.path.clone(),
            source,
        };

        #[cfg(unix)]
        let perms = {
            use std::os::unix::fs::PermissionsExt;
            fs::Permissions::from_mode(permissions)
        };
        #[cfg(not(unix))]
        let perms = {
            let mut perms = self.metadata()?.permissions();
            perms.set_readonly(permissions & 0o200 == 0);
            perms
        };

        fs::set_permissions(&self.facts.abs_path, perms).map_err(io_err)
    }

    // ------------------------------------------------------------------
    // Path facts and metadata
    // ------------------------------------------------------------------

    /// Path as given at construction.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn abs_path(&self) -> &Path {
        &self.facts.abs_path
    }

    /// Path relative to the working directory at construction, if the file
    /// lives beneath it.
    #[must_use]
    pub fn relative_path(&self) -> Option<&Path> {
        self.facts.relative_path.as_deref()
    }

    /// File name with extension.
    #[must_use]
    pub fn basename(&self) -> &str {
        &self.facts.basename
    }

    /// Directory containing the file (absolute).
    #[must_use]
    pub fn dirname(&self) -> &Path {
        &self.facts.dirname
    }

    /// File name without the final extension.
    #[must_use]
    pub fn stem(&self) -> &str {
        &self.facts.stem
    }

    #[must_use]
    pub fn extension(&self) -> Option<&str> {
        self.facts.extension.as_deref()
    }

    #[must_use]
    pub fn class(&self) -> FileClass {
        self.class
    }

    #[must_use]
    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    #[must_use]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Archive written by the last successful [`backup`](Self::backup).
    #[must_use]
    pub fn backup_file(&self) -> Option<&Path> {
        self.backup_file.as_deref()
    }

    pub(crate) fn record_backup(&mut self, archive: PathBuf) {
        self.backup_file = Some(archive);
    }

    /// Whether a regular file currently exists at the path.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.facts.abs_path.is_file()
    }

    /// Fresh stat snapshot.
    pub fn metadata(&self) -> Result<Metadata> {
        fs::metadata(&self.facts.abs_path).map_err(|source| FileError::Io {
            path: self.path.clone(),
            source,
        })
    }

    /// Size in bytes.
    pub fn size(&self) -> Result<u64> {
        Ok(self.metadata()?.len())
    }

    /// Current on-disk modification time.
    pub fn last_modified(&self) -> Result<SystemTime> {
        self.disk_mtime()
    }

    /// Name of the owning user, or the numeric uid if it has no name.
    #[cfg(unix)]
    pub fn owner(&self) -> Result<String> {
        use nix::unistd::{Uid, User};
        use std::os::unix::fs::MetadataExt;

        let uid = self.metadata()?.uid();
        match User::from_uid(Uid::from_raw(uid)) {
            Ok(Some(user)) => Ok(user.name),
            Ok(None) => Ok(uid.to_string()),
            Err(errno) => Err(FileError::Io {
                path: self.path.clone(),
                source: io::Error::from(errno),
            }),
        }
    }

    /// Name of the owning group, or the numeric gid if it has no name.
    #[cfg(unix)]
    pub fn group(&self) -> Result<String> {
        use nix::unistd::{Gid, Group};
        use std::os::unix::fs::MetadataExt;

        let gid = self.metadata()?.gid();
        match Group::from_gid(Gid::from_raw(gid)) {
            Ok(Some(group)) => Ok(group.name),
            Ok(None) => Ok(gid.to_string()),
            Err(errno) => Err(FileError::Io {
                path: self.path.clone(),
                source: io::Error::from(errno),
            }),
        }
    }

    #[cfg(not(unix))]
    pub fn owner(&self) -> Result<String> {
        Err(FileError::UnsupportedPlatform("file ownership"))
    }

    #[cfg(not(unix))]
    pub fn group(&self) -> Result<String> {
        Err(FileError::UnsupportedPlatform("file group ownership"))
    }
}

impl Drop for FileHandle {
    fn drop(&mut self) {
        self.close();
        if self.class.is_temporary() {
            self.delete();
        }
    }
}
