//! Object model: hashes, modes, tree entries, blobs, trees, and the
//! walker cache index.
//!
//! Identity is SHA-256 throughout. A blob is identified by the hash of its
//! raw content; a tree by the hash of its encoded bytes. The all-zero hash
//! is a sentinel meaning "no tree".

pub mod codec;

use crate::error::HashError;
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Length of a hash in bytes.
pub const HASH_LENGTH: usize = 32;

/// A 32-byte SHA-256 identifier for a blob or tree.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash([u8; HASH_LENGTH]);

impl Hash {
    /// The all-zero sentinel hash ("no tree").
    pub const ZERO: Hash = Hash([0u8; HASH_LENGTH]);

    /// Hash raw bytes with SHA-256.
    pub fn of(data: &[u8]) -> Self {
        let digest = Sha256::digest(data);
        Hash(digest.into())
    }

    pub fn from_bytes(bytes: [u8; HASH_LENGTH]) -> Self {
        Hash(bytes)
    }

    /// Parse the canonical 64-character lowercase hex form.
    pub fn from_hex(s: &str) -> Result<Self, HashError> {
        if s.len() != HASH_LENGTH * 2 {
            return Err(HashError::InvalidLength(s.len()));
        }
        let mut bytes = [0u8; HASH_LENGTH];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Hash(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; HASH_LENGTH] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// Canonical lowercase hex form, 64 characters.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.to_hex())
    }
}

impl FromStr for Hash {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

/// Kind of a tree entry. The discriminant is the on-disk mode byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Mode {
    Regular = 0,
    Executable = 1,
    Directory = 2,
    Symlink = 3,
}

impl Mode {
    /// Decode a mode byte; `None` for out-of-range values.
    pub fn from_byte(b: u8) -> Option<Mode> {
        match b {
            0 => Some(Mode::Regular),
            1 => Some(Mode::Executable),
            2 => Some(Mode::Directory),
            3 => Some(Mode::Symlink),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// True for regular and executable files.
    pub fn is_file(self) -> bool {
        matches!(self, Mode::Regular | Mode::Executable)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Regular => "regular",
            Mode::Executable => "executable",
            Mode::Directory => "directory",
            Mode::Symlink => "symlink",
        }
    }

    /// POSIX-style octal code used by long-form listings.
    pub fn octal_code(self) -> &'static str {
        match self {
            Mode::Regular => "100644",
            Mode::Executable => "100755",
            Mode::Directory => "040000",
            Mode::Symlink => "120000",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row inside a tree: a named reference to a blob or subtree.
///
/// `mtime` is carried for the walker cache only; it is never part of the
/// encoded tree and never influences any hash. Entries decoded from disk
/// have no mtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub name: String,
    pub mode: Mode,
    pub size: i64,
    pub mtime: Option<SystemTime>,
    pub hash: Hash,
}

/// An immutable byte sequence, identified by the hash of its raw content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub content: Vec<u8>,
}

impl Blob {
    pub fn new(content: Vec<u8>) -> Self {
        Blob { content }
    }

    /// Content hash. Excludes name, mode, size, and time by construction.
    pub fn hash(&self) -> Hash {
        Hash::of(&self.content)
    }
}

/// An ordered sequence of entries, sorted by name bytewise-ascending.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tree {
    pub entries: Vec<Entry>,
}

impl Tree {
    pub fn new(entries: Vec<Entry>) -> Self {
        Tree { entries }
    }

    /// True when entries are strictly ascending by name bytes (no duplicates).
    pub fn is_sorted(&self) -> bool {
        self.entries
            .windows(2)
            .all(|w| w[0].name.as_bytes() < w[1].name.as_bytes())
    }
}

/// A path→hash record in the walker cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// Slash-separated path relative to the walk root.
    pub path: String,
    pub size: i64,
    pub mtime: SystemTime,
    pub hash: Hash,
}

impl IndexEntry {
    /// Exact match on path, size, and nanosecond-precision mtime.
    pub fn matches(&self, path: &str, size: i64, mtime: SystemTime) -> bool {
        self.path == path && self.size == size && self.mtime == mtime
    }
}

/// The serialized form of the walker cache.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Index {
    pub entries: Vec<IndexEntry>,
}

/// Split a timestamp into Unix seconds and subsecond nanoseconds, with
/// nanoseconds always in `0..1_000_000_000` (floor semantics before the
/// epoch).
pub(crate) fn unix_parts(t: SystemTime) -> (i64, i32) {
    match t.duration_since(UNIX_EPOCH) {
        Ok(d) => (d.as_secs() as i64, d.subsec_nanos() as i32),
        Err(e) => {
            let d = e.duration();
            if d.subsec_nanos() == 0 {
                (-(d.as_secs() as i64), 0)
            } else {
                (
                    -(d.as_secs() as i64) - 1,
                    (1_000_000_000 - d.subsec_nanos()) as i32,
                )
            }
        }
    }
}

/// Rebuild a timestamp from Unix seconds and subsecond nanoseconds.
pub(crate) fn from_unix_parts(secs: i64, nanos: i32) -> SystemTime {
    if secs >= 0 {
        UNIX_EPOCH + Duration::new(secs as u64, nanos as u32)
    } else {
        UNIX_EPOCH - Duration::from_secs(secs.unsigned_abs()) + Duration::from_nanos(nanos as u64)
    }
}
