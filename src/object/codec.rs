//! Versioned binary encoding for blobs, trees, and the cache index.
//!
//! Every object starts with a 4-byte ASCII magic and a 2-byte big-endian
//! version. All integers are big-endian. The encoding is canonical: the same
//! logical value always produces the same bytes, and decoders reject short
//! reads, trailing bytes, and out-of-range fields.

use super::{from_unix_parts, unix_parts, Blob, Entry, Hash, Index, IndexEntry, Mode, Tree};
use super::HASH_LENGTH;
use crate::error::CodecError;
use byteorder::{BigEndian, ReadBytesExt};
use std::io::Read;

pub const MAGIC_BLOB: [u8; 4] = *b"MRKB";
pub const MAGIC_TREE: [u8; 4] = *b"MRKT";
pub const MAGIC_INDEX: [u8; 4] = *b"MRKI";

/// Highest format version this build can decode.
pub const CURRENT_VERSION: u16 = 1;

fn write_header(buf: &mut Vec<u8>, magic: [u8; 4]) {
    buf.extend_from_slice(&magic);
    buf.extend_from_slice(&CURRENT_VERSION.to_be_bytes());
}

fn read_header(r: &mut &[u8], want: [u8; 4]) -> Result<u16, CodecError> {
    let mut magic = [0u8; 4];
    r.read_exact(&mut magic)
        .map_err(|_| CodecError::Truncated("header magic"))?;
    if magic != want {
        return Err(CodecError::BadMagic { got: magic, want });
    }

    let version = r
        .read_u16::<BigEndian>()
        .map_err(|_| CodecError::Truncated("header version"))?;
    if version > CURRENT_VERSION {
        return Err(CodecError::UnsupportedVersion {
            got: version,
            max: CURRENT_VERSION,
        });
    }

    Ok(version)
}

fn ensure_consumed(r: &[u8]) -> Result<(), CodecError> {
    if r.is_empty() {
        Ok(())
    } else {
        Err(CodecError::TrailingBytes(r.len()))
    }
}

fn read_hash(r: &mut &[u8], field: &'static str) -> Result<Hash, CodecError> {
    let mut bytes = [0u8; HASH_LENGTH];
    r.read_exact(&mut bytes)
        .map_err(|_| CodecError::Truncated(field))?;
    Ok(Hash::from_bytes(bytes))
}

fn read_string(r: &mut &[u8], len: usize, field: &'static str) -> Result<String, CodecError> {
    if len > r.len() {
        return Err(CodecError::Truncated(field));
    }
    let data = *r;
    let (head, tail) = data.split_at(len);
    let s = std::str::from_utf8(head).map_err(|_| CodecError::InvalidUtf8(field))?;
    *r = tail;
    Ok(s.to_string())
}

pub fn encode_blob(b: &Blob) -> Result<Vec<u8>, CodecError> {
    let mut buf = Vec::with_capacity(6 + 8 + b.content.len());
    write_header(&mut buf, MAGIC_BLOB);
    buf.extend_from_slice(&(b.content.len() as u64).to_be_bytes());
    buf.extend_from_slice(&b.content);
    Ok(buf)
}

pub fn decode_blob(data: &[u8]) -> Result<Blob, CodecError> {
    let mut r = data;
    let version = read_header(&mut r, MAGIC_BLOB)?;
    match version {
        1 => {
            let blob = decode_blob_v1(&mut r)?;
            ensure_consumed(r)?;
            Ok(blob)
        }
        other => Err(CodecError::UnsupportedVersion {
            got: other,
            max: CURRENT_VERSION,
        }),
    }
}

fn decode_blob_v1(r: &mut &[u8]) -> Result<Blob, CodecError> {
    let length = r
        .read_u64::<BigEndian>()
        .map_err(|_| CodecError::Truncated("content length"))?;
    let length = usize::try_from(length).map_err(|_| CodecError::Truncated("content"))?;
    if length > r.len() {
        return Err(CodecError::Truncated("content"));
    }

    let data = *r;
    let (content, tail) = data.split_at(length);
    *r = tail;
    Ok(Blob::new(content.to_vec()))
}

pub fn encode_tree(t: &Tree) -> Result<Vec<u8>, CodecError> {
    // Validate every length prefix before producing a single byte.
    if t.entries.len() > u32::MAX as usize {
        return Err(CodecError::TooLarge {
            what: "tree entry count",
            len: t.entries.len(),
        });
    }
    for e in &t.entries {
        if e.name.len() > u16::MAX as usize {
            return Err(CodecError::TooLarge {
                what: "tree entry name",
                len: e.name.len(),
            });
        }
    }

    let mut buf = Vec::new();
    write_header(&mut buf, MAGIC_TREE);
    buf.extend_from_slice(&(t.entries.len() as u32).to_be_bytes());
    for e in &t.entries {
        encode_entry(&mut buf, e);
    }
    Ok(buf)
}

fn encode_entry(buf: &mut Vec<u8>, e: &Entry) {
    buf.push(e.mode.as_byte());
    buf.extend_from_slice(&e.size.to_be_bytes());
    buf.extend_from_slice(&(e.name.len() as u16).to_be_bytes());
    buf.extend_from_slice(e.name.as_bytes());
    buf.extend_from_slice(e.hash.as_bytes());
}

pub fn decode_tree(data: &[u8]) -> Result<Tree, CodecError> {
    let mut r = data;
    let version = read_header(&mut r, MAGIC_TREE)?;
    match version {
        1 => {
            let tree = decode_tree_v1(&mut r)?;
            ensure_consumed(r)?;
            Ok(tree)
        }
        other => Err(CodecError::UnsupportedVersion {
            got: other,
            max: CURRENT_VERSION,
        }),
    }
}

fn decode_tree_v1(r: &mut &[u8]) -> Result<Tree, CodecError> {
    let count = r
        .read_u32::<BigEndian>()
        .map_err(|_| CodecError::Truncated("entry count"))?;

    let mut entries = Vec::with_capacity((count as usize).min(1024));
    for _ in 0..count {
        entries.push(decode_entry_v1(r)?);
    }

    Ok(Tree::new(entries))
}

fn decode_entry_v1(r: &mut &[u8]) -> Result<Entry, CodecError> {
    let mode_byte = r.read_u8().map_err(|_| CodecError::Truncated("entry mode"))?;
    let mode = Mode::from_byte(mode_byte).ok_or(CodecError::InvalidMode(mode_byte))?;

    let size = r
        .read_i64::<BigEndian>()
        .map_err(|_| CodecError::Truncated("entry size"))?;

    let name_len = r
        .read_u16::<BigEndian>()
        .map_err(|_| CodecError::Truncated("entry name length"))?;
    let name = read_string(r, name_len as usize, "entry name")?;

    let hash = read_hash(r, "entry hash")?;

    Ok(Entry {
        name,
        mode,
        size,
        mtime: None,
        hash,
    })
}

pub fn encode_index(idx: &Index) -> Result<Vec<u8>, CodecError> {
    if idx.entries.len() > u32::MAX as usize {
        return Err(CodecError::TooLarge {
            what: "index entry count",
            len: idx.entries.len(),
        });
    }
    for e in &idx.entries {
        if e.path.len() > u16::MAX as usize {
            return Err(CodecError::TooLarge {
                what: "index entry path",
                len: e.path.len(),
            });
        }
    }

    let mut buf = Vec::new();
    write_header(&mut buf, MAGIC_INDEX);
    buf.extend_from_slice(&(idx.entries.len() as u32).to_be_bytes());
    for e in &idx.entries {
        encode_index_entry(&mut buf, e);
    }
    Ok(buf)
}

fn encode_index_entry(buf: &mut Vec<u8>, e: &IndexEntry) {
    buf.extend_from_slice(&(e.path.len() as u16).to_be_bytes());
    buf.extend_from_slice(e.path.as_bytes());
    buf.extend_from_slice(&e.size.to_be_bytes());

    let (secs, nanos) = unix_parts(e.mtime);
    buf.extend_from_slice(&secs.to_be_bytes());
    buf.extend_from_slice(&nanos.to_be_bytes());

    buf.extend_from_slice(e.hash.as_bytes());
}

pub fn decode_index(data: &[u8]) -> Result<Index, CodecError> {
    let mut r = data;
    let version = read_header(&mut r, MAGIC_INDEX)?;
    match version {
        1 => {
            let index = decode_index_v1(&mut r)?;
            ensure_consumed(r)?;
            Ok(index)
        }
        other => Err(CodecError::UnsupportedVersion {
            got: other,
            max: CURRENT_VERSION,
        }),
    }
}

fn decode_index_v1(r: &mut &[u8]) -> Result<Index, CodecError> {
    let count = r
        .read_u32::<BigEndian>()
        .map_err(|_| CodecError::Truncated("entry count"))?;

    let mut entries = Vec::with_capacity((count as usize).min(1024));
    for _ in 0..count {
        entries.push(decode_index_entry_v1(r)?);
    }

    Ok(Index { entries })
}

fn decode_index_entry_v1(r: &mut &[u8]) -> Result<IndexEntry, CodecError> {
    let path_len = r
        .read_u16::<BigEndian>()
        .map_err(|_| CodecError::Truncated("index path length"))?;
    let path = read_string(r, path_len as usize, "index path")?;

    let size = r
        .read_i64::<BigEndian>()
        .map_err(|_| CodecError::Truncated("index size"))?;

    let secs = r
        .read_i64::<BigEndian>()
        .map_err(|_| CodecError::Truncated("index mtime seconds"))?;
    let nanos = r
        .read_i32::<BigEndian>()
        .map_err(|_| CodecError::Truncated("index mtime nanoseconds"))?;

    let hash = read_hash(r, "index hash")?;

    Ok(IndexEntry {
        path,
        size,
        mtime: from_unix_parts(secs, nanos),
        hash,
    })
}
