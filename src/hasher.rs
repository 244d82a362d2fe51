//! Block-wise content hashing.
//!
//! # Overview
//! Digests are computed by reading a source in fixed-size blocks until it is
//! exhausted, feeding each block to the selected algorithm. The block size only
//! affects throughput, never the result.

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use std::fmt::{self, Write as _};
use std::io::{self, Read};

/// Bytes read per digest update unless configured otherwise.
pub const DEFAULT_BLOCK_SIZE: usize = 65535;

/// Supported digest algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    Md5,
    Sha256,
}

impl HashAlgorithm {
    /// Length of the raw digest in bytes.
    #[must_use]
    pub fn digest_len(self) -> usize {
        match self {
            Self::Md5 => 16,
            Self::Sha256 => 32,
        }
    }

    /// Length of the lowercase hex rendering.
    #[must_use]
    pub fn hex_len(self) -> usize {
        self.digest_len() * 2
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Md5 => f.write_str("MD5"),
            Self::Sha256 => f.write_str("SHA256"),
        }
    }
}

/// Output form requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DigestForm {
    /// Lowercase hexadecimal string.
    #[default]
    Hex,
    /// Raw digest bytes.
    Bytes,
}

/// A rendered digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Digest {
    Hex(String),
    Bytes(Vec<u8>),
}

impl Digest {
    /// Render raw digest bytes in the requested form.
    #[must_use]
    pub fn render(raw: &[u8], form: DigestForm) -> Self {
        match form {
            DigestForm::Hex => Self::Hex(to_hex(raw)),
            DigestForm::Bytes => Self::Bytes(raw.to_vec()),
        }
    }

    #[must_use]
    pub fn as_hex(&self) -> Option<&str> {
        match self {
            Self::Hex(s) => Some(s),
            Self::Bytes(_) => None,
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Hex(_) => None,
            Self::Bytes(b) => Some(b),
        }
    }

    /// Hex rendering regardless of the stored form.
    #[must_use]
    pub fn to_hex(&self) -> String {
        match self {
            Self::Hex(s) => s.clone(),
            Self::Bytes(b) => to_hex(b),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Hex(s) => s.len(),
            Self::Bytes(b) => b.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Lowercase hex encoding of `bytes`.
#[must_use]
pub fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        // Writing to a String cannot fail.
        let _ = write!(out, "{b:02x}");
    }
    out
}

enum State {
    Md5(md5::Context),
    Sha256(Sha256),
}

impl State {
    fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Md5 => Self::Md5(md5::Context::new()),
            HashAlgorithm::Sha256 => Self::Sha256(Sha256::new()),
        }
    }

    fn update(&mut self, block: &[u8]) {
        match self {
            Self::Md5(ctx) => ctx.consume(block),
            Self::Sha256(h) => h.update(block),
        }
    }

    fn finish(self) -> Vec<u8> {
        match self {
            Self::Md5(ctx) => ctx.compute().0.to_vec(),
            Self::Sha256(h) => h.finalize().to_vec(),
        }
    }
}

/// Hash everything `reader` yields, `block_size` bytes at a time.
///
/// Returns the raw digest bytes. A zero block size is treated as one.
pub fn digest_reader<R: Read>(
    reader: &mut R,
    algorithm: HashAlgorithm,
    block_size: usize,
) -> io::Result<Vec<u8>> {
    let mut state = State::new(algorithm);
    let mut buf = vec![0u8; block_size.max(1)];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        state.update(&buf[..n]);
    }
    Ok(state.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const EMPTY_MD5: &str = "d41d8cd98f00b204e9800998ecf8427e";
    const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    #[test]
    fn test_empty_input() {
        let md5 = digest_reader(&mut Cursor::new(b""), HashAlgorithm::Md5, 16).unwrap();
        assert_eq!(to_hex(&md5), EMPTY_MD5);

        let sha = digest_reader(&mut Cursor::new(b""), HashAlgorithm::Sha256, 16).unwrap();
        assert_eq!(to_hex(&sha), EMPTY_SHA256);
    }

    #[test]
    fn test_known_vector() {
        let sha = digest_reader(&mut Cursor::new(b"abc"), HashAlgorithm::Sha256, 64).unwrap();
        assert_eq!(
            to_hex(&sha),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        let md5 = digest_reader(&mut Cursor::new(b"abc"), HashAlgorithm::Md5, 64).unwrap();
        assert_eq!(to_hex(&md5), "900150983cd24fb0d6963f7d28e17f72");
    }

    #[test]
    fn test_block_size_does_not_change_result() {
        let data = vec![7u8; 10_000];
        let a = digest_reader(&mut Cursor::new(&data), HashAlgorithm::Sha256, 1).unwrap();
        let b = digest_reader(&mut Cursor::new(&data), HashAlgorithm::Sha256, 333).unwrap();
        let c = digest_reader(&mut Cursor::new(&data), HashAlgorithm::Sha256, 0).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);
    }

    #[test]
    fn test_render_forms() {
        let raw = [0xde, 0xad, 0xbe, 0xef];
        assert_eq!(Digest::render(&raw, DigestForm::Hex), Digest::Hex("deadbeef".into()));
        assert_eq!(
            Digest::render(&raw, DigestForm::Bytes).as_bytes(),
            Some(&raw[..])
        );
        assert_eq!(Digest::Bytes(raw.to_vec()).to_hex(), "deadbeef");
    }

    #[test]
    fn test_lengths() {
        assert_eq!(HashAlgorithm::Md5.hex_len(), 32);
        assert_eq!(HashAlgorithm::Sha256.hex_len(), 64);
    }
}
