//! Error types for the smerkle object model, store, walker, and differ.

use crate::object::Hash;
use std::path::PathBuf;
use thiserror::Error;

/// Errors from parsing a hash out of its hex string form.
#[derive(Debug, Error)]
pub enum HashError {
    #[error("invalid hash length: expected 64 hex characters, got {0}")]
    InvalidLength(usize),

    #[error("invalid hex string: {0}")]
    InvalidHex(#[from] hex::FromHexError),
}

/// Errors from the binary object codec.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("invalid magic: got {got:?}, want {want:?}")]
    BadMagic { got: [u8; 4], want: [u8; 4] },

    #[error("unsupported version: got {got}, max supported {max}")]
    UnsupportedVersion { got: u16, max: u16 },

    #[error("truncated object: short read in {0}")]
    Truncated(&'static str),

    #[error("{what} too large: {len} bytes")]
    TooLarge { what: &'static str, len: usize },

    #[error("invalid mode byte: {0}")]
    InvalidMode(u8),

    #[error("invalid UTF-8 in {0}")]
    InvalidUtf8(&'static str),

    #[error("trailing bytes after object body: {0}")]
    TrailingBytes(usize),
}

/// Errors from compiling a single ignore pattern. Never fatal to parsing:
/// an uncompilable pattern is skipped and the rest of the file is used.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PatternError {
    #[error("empty pattern")]
    Empty,

    #[error("unclosed character class")]
    UnclosedBracket,

    #[error("trailing escape")]
    TrailingEscape,
}

/// Errors from the object store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object not found: {0}")]
    NotFound(Hash),

    #[error("corrupt index: {0}")]
    CorruptIndex(#[source] CodecError),

    #[error("decode object: {0}")]
    Codec(#[from] CodecError),

    #[error("store I/O: {0}")]
    Io(#[from] std::io::Error),
}

/// A recoverable error on a single walked entry. The entry is omitted from
/// its parent tree and the walk continues.
#[derive(Debug, Error)]
#[error("{path}: {source}")]
pub struct EntryError {
    /// Path relative to the walk root, slash-separated.
    pub path: String,
    #[source]
    pub source: std::io::Error,
}

/// Fatal errors that abort a walk.
#[derive(Debug, Error)]
pub enum WalkError {
    #[error("root does not exist: {}", .0.display())]
    RootNotExist(PathBuf),

    #[error("root is not a directory: {}", .0.display())]
    RootNotDirectory(PathBuf),

    #[error("load ignore file {}: {source}", path.display())]
    IgnoreLoad {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("walk cancelled")]
    Cancelled,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("walk I/O: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from diffing two stored trees.
#[derive(Debug, Error)]
pub enum DiffError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("tree {0} has entries out of order")]
    UnorderedTree(Hash),
}

/// Errors from loading settings or initializing logging.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration error: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid log level: {0}")]
    InvalidLogLevel(String),

    #[error("invalid log format: {0}")]
    InvalidLogFormat(String),

    #[error("logging init: {0}")]
    LoggingInit(String),
}

/// Errors surfaced by the command-line layer.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("invalid hash: {0}")]
    Hash(#[from] HashError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Walk(#[from] WalkError),

    #[error(transparent)]
    Diff(#[from] DiffError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("tree not found: {0}")]
    TreeNotFound(Hash),

    #[error("blob not found: {0}")]
    BlobNotFound(Hash),

    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("encode json: {0}")]
    Json(#[from] serde_json::Error),
}
