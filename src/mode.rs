//! File access modes.
//!
//! Modes use the familiar `fopen`-style spelling: a base letter (`r`, `w`, `a`),
//! an optional `b` for binary, and an optional `+` for read/write. `rb+` and
//! `r+b` are both accepted. The binary flag is recorded but has no effect on
//! I/O, which is always byte-oriented.

use std::fmt;
use std::fs::OpenOptions;
use std::str::FromStr;

use crate::error::FileError;

/// Base access kind of a mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessKind {
    Read,
    Write,
    Append,
}

/// A validated file access mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AccessMode {
    kind: AccessKind,
    binary: bool,
    update: bool,
}

impl AccessMode {
    /// `r`
    pub const READ: Self = Self::new(AccessKind::Read, false, false);
    /// `w`
    pub const WRITE: Self = Self::new(AccessKind::Write, false, false);
    /// `a`
    pub const APPEND: Self = Self::new(AccessKind::Append, false, false);

    #[must_use]
    pub const fn new(kind: AccessKind, binary: bool, update: bool) -> Self {
        Self {
            kind,
            binary,
            update,
        }
    }

    #[must_use]
    pub fn kind(self) -> AccessKind {
        self.kind
    }

    #[must_use]
    pub fn is_binary(self) -> bool {
        self.binary
    }

    /// `+` modes allow both reading and writing.
    #[must_use]
    pub fn is_update(self) -> bool {
        self.update
    }

    /// Whether opening with this mode creates a missing file.
    #[must_use]
    pub fn creates(self) -> bool {
        matches!(self.kind, AccessKind::Write | AccessKind::Append)
    }

    #[must_use]
    pub fn readable(self) -> bool {
        self.kind == AccessKind::Read || self.update
    }

    #[must_use]
    pub fn writable(self) -> bool {
        self.kind != AccessKind::Read || self.update
    }

    /// Translate the mode into [`OpenOptions`].
    #[must_use]
    pub fn open_options(self) -> OpenOptions {
        let mut options = OpenOptions::new();
        options.read(self.readable());
        match self.kind {
            AccessKind::Read => {
                options.write(self.update);
            }
            AccessKind::Write => {
                options.write(true).create(true).truncate(true);
            }
            AccessKind::Append => {
                options.append(true).create(true);
            }
        }
        options
    }
}

impl Default for AccessMode {
    fn default() -> Self {
        Self::READ
    }
}

impl FromStr for AccessMode {
    type Err = FileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || FileError::InvalidMode(s.to_string());
        let mut chars = s.chars();
        let kind = match chars.next() {
            Some('r') => AccessKind::Read,
            Some('w') => AccessKind::Write,
            Some('a') => AccessKind::Append,
            _ => return Err(invalid()),
        };

        let mut binary = false;
        let mut update = false;
        for c in chars {
            match c {
                'b' if !binary => binary = true,
                '+' if !update => update = true,
                _ => return Err(invalid()),
            }
        }

        Ok(Self::new(kind, binary, update))
    }
}

impl TryFrom<&str> for AccessMode {
    type Error = FileError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let base = match self.kind {
            AccessKind::Read => "r",
            AccessKind::Write => "w",
            AccessKind::Append => "a",
        };
        write!(
            f,
            "{base}{}{}",
            if self.binary { "b" } else { "" },
            if self.update { "+" } else { "" }
        )
    }
}
