//! Content-addressed object store.
//!
//! Objects live one file per hash under `objects/`, sharded by the first two
//! hex characters. Writes go through a uniquely-named temp file and an atomic
//! rename, so readers never observe partial objects and concurrent writers of
//! the same content race harmlessly. The store also carries the walker's
//! path→hash cache, persisted as the `index` file on flush.

use crate::error::StoreError;
use crate::object::{codec, unix_parts, Blob, Hash, Index, IndexEntry, Tree};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tempfile::NamedTempFile;
use tracing::{debug, warn};
use walkdir::WalkDir;

const OBJECTS_DIR: &str = "objects";
const INDEX_FILE: &str = "index";

/// How `lookup_cache` compares modification times.
///
/// Nanosecond equality is the default. Whole-second comparison exists for
/// filesystems that truncate nanoseconds across remounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MtimeComparison {
    #[default]
    Nanosecond,
    Second,
}

/// Options for opening a store.
#[derive(Debug, Clone, Default)]
pub struct StoreOptions {
    pub mtime_comparison: MtimeComparison,
}

#[derive(Debug, Default)]
struct IndexState {
    entries: HashMap<String, IndexEntry>,
    dirty: bool,
}

/// Handle to an on-disk store. Safe to share across threads; the in-memory
/// cache index is guarded by a readers-writer lock.
#[derive(Debug)]
pub struct Store {
    root: PathBuf,
    state: RwLock<IndexState>,
    mtime_comparison: MtimeComparison,
}

/// Counts reported by [`Store::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub objects: usize,
    pub index_entries: usize,
}

impl Store {
    /// Open (or create) a store rooted at `root` with default options.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        Self::open_with(root, StoreOptions::default())
    }

    /// Open (or create) a store rooted at `root`.
    ///
    /// A missing index file is not an error; a corrupt one is.
    pub fn open_with(root: impl Into<PathBuf>, options: StoreOptions) -> Result<Self, StoreError> {
        let root = root.into();

        create_dir_all_0750(&root.join(OBJECTS_DIR))?;

        let store = Store {
            root,
            state: RwLock::new(IndexState::default()),
            mtime_comparison: options.mtime_comparison,
        };
        store.load_index()?;

        Ok(store)
    }

    fn load_index(&self) -> Result<(), StoreError> {
        let data = match fs::read(self.root.join(INDEX_FILE)) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(StoreError::Io(e)),
        };

        let index = codec::decode_index(&data).map_err(StoreError::CorruptIndex)?;

        let mut state = self.state.write();
        for e in index.entries {
            state.entries.insert(e.path.clone(), e);
        }
        debug!(entries = state.entries.len(), "loaded cache index");

        Ok(())
    }

    fn shard_dir(&self, h: Hash) -> PathBuf {
        self.root.join(OBJECTS_DIR).join(&h.to_hex()[..2])
    }

    fn object_path(&self, h: Hash) -> PathBuf {
        self.shard_dir(h).join(&h.to_hex()[2..])
    }

    /// True iff the object file exists. Non-authoritative under races.
    pub fn has(&self, h: Hash) -> bool {
        self.object_path(h).is_file()
    }

    /// Write raw object bytes atomically: unique temp file in the destination
    /// shard, then rename. An existing destination is overwritten in place,
    /// which is harmless because content is identical for equal hashes.
    pub fn put_object(&self, h: Hash, data: &[u8]) -> Result<(), StoreError> {
        let dir = self.shard_dir(h);
        create_dir_all_0750(&dir)?;

        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(data)?;
        tmp.persist(self.object_path(h))
            .map_err(|e| StoreError::Io(e.error))?;

        Ok(())
    }

    /// Read raw object bytes.
    pub fn get_object(&self, h: Hash) -> Result<Vec<u8>, StoreError> {
        match fs::read(self.object_path(h)) {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StoreError::NotFound(h)),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    /// Store a blob, keyed by the hash of its raw content. Skips the write
    /// when the object is already present.
    pub fn put_blob(&self, b: &Blob) -> Result<Hash, StoreError> {
        let h = b.hash();

        if self.has(h) {
            return Ok(h);
        }

        let data = codec::encode_blob(b)?;
        self.put_object(h, &data)?;

        Ok(h)
    }

    pub fn get_blob(&self, h: Hash) -> Result<Blob, StoreError> {
        let data = self.get_object(h)?;
        Ok(codec::decode_blob(&data)?)
    }

    /// Store a tree, keyed by the hash of its encoded bytes.
    pub fn put_tree(&self, t: &Tree) -> Result<Hash, StoreError> {
        let data = codec::encode_tree(t)?;
        let h = Hash::of(&data);

        if self.has(h) {
            return Ok(h);
        }

        self.put_object(h, &data)?;

        Ok(h)
    }

    pub fn get_tree(&self, h: Hash) -> Result<Tree, StoreError> {
        let data = self.get_object(h)?;
        Ok(codec::decode_tree(&data)?)
    }

    /// Return the cached hash iff an entry exists for exactly this
    /// `(path, size, mtime)` triple. Any mismatch is a miss.
    pub fn lookup_cache(&self, path: &str, size: i64, mtime: SystemTime) -> Option<Hash> {
        let state = self.state.read();
        let e = state.entries.get(path)?;

        let hit = match self.mtime_comparison {
            MtimeComparison::Nanosecond => e.matches(path, size, mtime),
            MtimeComparison::Second => {
                e.path == path && e.size == size && unix_parts(e.mtime).0 == unix_parts(mtime).0
            }
        };

        if hit {
            Some(e.hash)
        } else {
            None
        }
    }

    /// Upsert a cache entry and mark the index dirty.
    pub fn update_cache(&self, path: &str, size: i64, mtime: SystemTime, hash: Hash) {
        let mut state = self.state.write();
        state.entries.insert(
            path.to_string(),
            IndexEntry {
                path: path.to_string(),
                size,
                mtime,
                hash,
            },
        );
        state.dirty = true;
    }

    /// Serialize the index to disk if dirty: temp file (0600) then atomic
    /// rename over `index`. Idempotent.
    pub fn flush(&self) -> Result<(), StoreError> {
        let mut state = self.state.write();

        if !state.dirty {
            return Ok(());
        }

        let index = Index {
            entries: state.entries.values().cloned().collect(),
        };
        let data = codec::encode_index(&index)?;

        let mut tmp = NamedTempFile::new_in(&self.root)?;
        tmp.write_all(&data)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tmp.as_file()
                .set_permissions(fs::Permissions::from_mode(0o600))?;
        }
        tmp.persist(self.root.join(INDEX_FILE))
            .map_err(|e| StoreError::Io(e.error))?;

        state.dirty = false;
        debug!(entries = index.entries.len(), "flushed cache index");

        Ok(())
    }

    /// Flush and release. Equivalent to [`Store::flush`]; exists so callers
    /// can make teardown explicit.
    pub fn close(&self) -> Result<(), StoreError> {
        self.flush()
    }

    /// Count stored objects (walked lazily) and in-memory index entries.
    pub fn stats(&self) -> StoreStats {
        let index_entries = self.state.read().entries.len();

        let objects = WalkDir::new(self.root.join(OBJECTS_DIR))
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .count();

        StoreStats {
            objects,
            index_entries,
        }
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        if self.state.get_mut().dirty {
            if let Err(e) = self.flush() {
                warn!("failed to flush cache index on drop: {}", e);
            }
        }
    }
}

fn create_dir_all_0750(path: &Path) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        fs::DirBuilder::new().recursive(true).mode(0o750).create(path)
    }
    #[cfg(not(unix))]
    {
        fs::create_dir_all(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{Entry, Mode};
    use std::time::{Duration, UNIX_EPOCH};
    use tempfile::TempDir;

    fn open_store(dir: &TempDir) -> Store {
        Store::open(dir.path().join("store")).unwrap()
    }

    #[test]
    fn test_open_creates_objects_dir() {
        let dir = TempDir::new().unwrap();
        let _store = open_store(&dir);
        assert!(dir.path().join("store").join("objects").is_dir());
    }

    #[test]
    fn test_open_twice_is_idempotent() {
        let dir = TempDir::new().unwrap();
        drop(open_store(&dir));
        let _again = open_store(&dir);
    }

    #[test]
    fn test_open_rejects_corrupt_index() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("store");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("index"), b"not an index").unwrap();

        let err = Store::open(&root).unwrap_err();
        assert!(matches!(err, StoreError::CorruptIndex(_)));
    }

    #[test]
    fn test_object_sharded_layout() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let h = Hash::of(b"payload");
        store.put_object(h, b"payload").unwrap();

        let hex = h.to_hex();
        let expected = dir
            .path()
            .join("store")
            .join("objects")
            .join(&hex[..2])
            .join(&hex[2..]);
        assert!(expected.is_file());
    }

    #[test]
    fn test_put_get_object_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let data = b"some object bytes".to_vec();
        let h = Hash::of(&data);
        store.put_object(h, &data).unwrap();

        assert!(store.has(h));
        assert_eq!(store.get_object(h).unwrap(), data);
    }

    #[test]
    fn test_get_missing_object() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let h = Hash::of(b"never stored");
        assert!(!store.has(h));
        let err = store.get_object(h).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(got) if got == h));
    }

    #[test]
    fn test_put_object_overwrites_existing() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let h = Hash::of(b"dup");
        store.put_object(h, b"dup").unwrap();
        store.put_object(h, b"dup").unwrap();
        assert_eq!(store.get_object(h).unwrap(), b"dup");
    }

    #[test]
    fn test_blob_identity_is_content_hash() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let blob = Blob::new(b"hello world".to_vec());
        let h = store.put_blob(&blob).unwrap();

        assert_eq!(h, Hash::of(b"hello world"));
        assert_eq!(store.get_blob(h).unwrap(), blob);
    }

    #[test]
    fn test_put_blob_deduplicates() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let blob = Blob::new(b"same".to_vec());
        let h1 = store.put_blob(&blob).unwrap();
        let h2 = store.put_blob(&blob).unwrap();
        assert_eq!(h1, h2);
        assert_eq!(store.stats().objects, 1);
    }

    #[test]
    fn test_tree_identity_is_encoded_hash() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let tree = Tree::new(vec![Entry {
            name: "a.txt".to_string(),
            mode: Mode::Regular,
            size: 3,
            mtime: None,
            hash: Hash::of(b"abc"),
        }]);

        let h = store.put_tree(&tree).unwrap();
        assert_eq!(h, Hash::of(&codec::encode_tree(&tree).unwrap()));
        assert_eq!(store.get_tree(h).unwrap(), tree);
    }

    #[test]
    fn test_get_tree_on_blob_is_bad_magic() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let h = store.put_blob(&Blob::new(b"blob".to_vec())).unwrap();
        let err = store.get_tree(h).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Codec(crate::error::CodecError::BadMagic { .. })
        ));
    }

    #[test]
    fn test_cache_lookup_exact_triple() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let mtime = UNIX_EPOCH + Duration::new(1_000_000, 500);
        let h = Hash::of(b"cached");
        store.update_cache("src/a.rs", 10, mtime, h);

        assert_eq!(store.lookup_cache("src/a.rs", 10, mtime), Some(h));
        assert_eq!(store.lookup_cache("src/b.rs", 10, mtime), None);
        assert_eq!(store.lookup_cache("src/a.rs", 11, mtime), None);
        assert_eq!(
            store.lookup_cache("src/a.rs", 10, mtime + Duration::from_nanos(1)),
            None
        );
    }

    #[test]
    fn test_cache_second_precision_option() {
        let dir = TempDir::new().unwrap();
        let store = Store::open_with(
            dir.path().join("store"),
            StoreOptions {
                mtime_comparison: MtimeComparison::Second,
            },
        )
        .unwrap();

        let mtime = UNIX_EPOCH + Duration::new(1_000_000, 123);
        let h = Hash::of(b"coarse");
        store.update_cache("a", 1, mtime, h);

        // Same second, different nanoseconds: still a hit.
        assert_eq!(
            store.lookup_cache("a", 1, UNIX_EPOCH + Duration::new(1_000_000, 999)),
            Some(h)
        );
        // Different second: miss.
        assert_eq!(
            store.lookup_cache("a", 1, UNIX_EPOCH + Duration::new(1_000_001, 123)),
            None
        );
    }

    #[test]
    fn test_flush_persists_and_reload() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("store");

        let mtime = UNIX_EPOCH + Duration::new(7, 42);
        let h = Hash::of(b"persisted");
        {
            let store = Store::open(&root).unwrap();
            store.update_cache("keep/me.txt", 5, mtime, h);
            store.flush().unwrap();
        }

        let store = Store::open(&root).unwrap();
        assert_eq!(store.lookup_cache("keep/me.txt", 5, mtime), Some(h));
        assert_eq!(store.stats().index_entries, 1);
    }

    #[test]
    fn test_flush_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        store.update_cache("a", 1, UNIX_EPOCH, Hash::of(b"a"));
        store.flush().unwrap();
        store.flush().unwrap();
        store.close().unwrap();
    }

    #[test]
    fn test_drop_flushes_dirty_index() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("store");

        let mtime = UNIX_EPOCH + Duration::new(9, 9);
        let h = Hash::of(b"dropped");
        {
            let store = Store::open(&root).unwrap();
            store.update_cache("auto", 2, mtime, h);
            // No explicit flush.
        }

        let store = Store::open(&root).unwrap();
        assert_eq!(store.lookup_cache("auto", 2, mtime), Some(h));
    }

    #[cfg(unix)]
    #[test]
    fn test_index_file_mode_is_0600() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let root = dir.path().join("store");
        let store = Store::open(&root).unwrap();
        store.update_cache("a", 1, UNIX_EPOCH, Hash::of(b"a"));
        store.flush().unwrap();

        let mode = fs::metadata(root.join("index")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_stats_counts_objects_and_index() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        store.put_blob(&Blob::new(b"one".to_vec())).unwrap();
        store.put_blob(&Blob::new(b"two".to_vec())).unwrap();
        store.put_tree(&Tree::default()).unwrap();
        store.update_cache("a", 1, UNIX_EPOCH, Hash::of(b"a"));

        let stats = store.stats();
        assert_eq!(stats.objects, 3);
        assert_eq!(stats.index_entries, 1);
    }
}
