//! Concurrent filesystem walker producing Merkle tree hashes.
//!
//! Each directory fans out one task per entry. File reads and hashing pass
//! through a semaphore bounding concurrent I/O; directory recursion does not
//! hold a slot. Per-entry failures (stat, read, unreadable subtree) are
//! collected and the entry omitted from its parent tree; cancellation and
//! store failures abort the whole walk. Entries are sorted by name bytes
//! before the tree is stored, so the root hash is independent of task
//! interleaving and the concurrency setting.

pub mod cancel;

pub use cancel::CancelToken;

use crate::error::{EntryError, WalkError};
use crate::ignore::Ignorer;
use crate::object::{Blob, Entry, Hash, Mode, Tree};
use crate::store::Store;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::fs::Metadata;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info};

/// Ignore file loaded from the walk root when no explicit ignorer is given.
/// The file itself never appears in any tree.
pub const IGNORE_FILE: &str = ".smerkleignore";

/// Options for a walk.
#[derive(Debug, Clone, Default)]
pub struct WalkOptions {
    /// Upper bound on concurrent file reads. 0 means the host CPU count.
    pub concurrency: usize,
    /// Explicit ignorer. When absent, `<root>/.smerkleignore` is loaded if
    /// that file exists.
    pub ignorer: Option<Ignorer>,
}

/// Outcome of a successful walk: the root tree hash plus any per-entry
/// errors that were recovered from along the way.
#[derive(Debug)]
pub struct WalkResult {
    pub root_hash: Hash,
    pub errors: Vec<EntryError>,
}

impl WalkResult {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Default)]
struct ErrorCollector {
    errors: Mutex<Vec<EntryError>>,
}

impl ErrorCollector {
    fn add(&self, path: String, source: io::Error) {
        self.errors.lock().push(EntryError { path, source });
    }

    fn take(&self) -> Vec<EntryError> {
        std::mem::take(&mut *self.errors.lock())
    }
}

struct WalkContext {
    store: Arc<Store>,
    ignorer: Option<Ignorer>,
    errors: ErrorCollector,
    io_slots: Semaphore,
    cancel: CancelToken,
}

/// Walk `root` and return the hash of its Merkle tree.
///
/// Every blob and tree encountered is written through `store`, and the
/// store's path cache is consulted and updated for non-symlink files.
pub async fn walk(
    cancel: &CancelToken,
    root: impl AsRef<Path>,
    store: Arc<Store>,
    options: WalkOptions,
) -> Result<WalkResult, WalkError> {
    let root = root.as_ref().to_path_buf();

    let meta = match tokio::fs::metadata(&root).await {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(WalkError::RootNotExist(root))
        }
        Err(e) => return Err(WalkError::Io(e)),
    };
    if !meta.is_dir() {
        return Err(WalkError::RootNotDirectory(root));
    }

    let ignorer = match options.ignorer {
        Some(ign) => Some(ign),
        None => {
            let path = root.join(IGNORE_FILE);
            if path.is_file() {
                Some(
                    Ignorer::from_file(&path)
                        .map_err(|source| WalkError::IgnoreLoad { path, source })?,
                )
            } else {
                None
            }
        }
    };

    let concurrency = effective_concurrency(options.concurrency);
    debug!(root = %root.display(), concurrency, "starting walk");

    let ctx = Arc::new(WalkContext {
        store,
        ignorer,
        errors: ErrorCollector::default(),
        io_slots: Semaphore::new(concurrency),
        cancel: cancel.clone(),
    });

    let root_hash = walk_dir(ctx.clone(), root, String::new()).await?;

    let errors = ctx.errors.take();
    info!(root_hash = %root_hash, errors = errors.len(), "walk complete");

    Ok(WalkResult { root_hash, errors })
}

fn effective_concurrency(requested: usize) -> usize {
    if requested > 0 {
        requested
    } else {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}

/// Walk a single directory recursively and return its tree hash.
fn walk_dir(
    ctx: Arc<WalkContext>,
    abs: PathBuf,
    rel: String,
) -> BoxFuture<'static, Result<Hash, WalkError>> {
    Box::pin(async move {
        if ctx.cancel.is_cancelled() {
            return Err(WalkError::Cancelled);
        }

        let mut dir = tokio::fs::read_dir(&abs).await?;
        let mut tasks: JoinSet<Result<Option<Entry>, WalkError>> = JoinSet::new();

        loop {
            let dirent = match dir.next_entry().await {
                Ok(Some(de)) => de,
                Ok(None) => break,
                Err(e) => return Err(WalkError::Io(e)),
            };

            let name_os = dirent.file_name();
            let Some(name) = name_os.to_str().map(str::to_string) else {
                ctx.errors.add(
                    join_rel(&rel, &name_os.to_string_lossy()),
                    io::Error::new(io::ErrorKind::InvalidData, "file name is not valid UTF-8"),
                );
                continue;
            };

            if name == IGNORE_FILE {
                continue;
            }

            let rel_path = join_rel(&rel, &name);
            tasks.spawn(process_entry(ctx.clone(), dirent.path(), rel_path, name));
        }

        let mut entries = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            let result = joined.map_err(|e| WalkError::Io(io::Error::other(e)))?;
            match result {
                Ok(Some(entry)) => entries.push(entry),
                Ok(None) => {}
                // Fatal: cancellation or a store failure. Dropping the set
                // aborts the remaining siblings.
                Err(e) => return Err(e),
            }
        }

        entries.sort_by(|a, b| a.name.as_bytes().cmp(b.name.as_bytes()));

        let tree = Tree::new(entries);
        let store = ctx.store.clone();
        let hash = tokio::task::spawn_blocking(move || store.put_tree(&tree))
            .await
            .map_err(|e| WalkError::Io(io::Error::other(e)))??;

        Ok(hash)
    })
}

/// Process one directory entry. `Ok(None)` means the entry was ignored or
/// its error was collected; the entry is omitted from the parent tree.
async fn process_entry(
    ctx: Arc<WalkContext>,
    abs: PathBuf,
    rel: String,
    name: String,
) -> Result<Option<Entry>, WalkError> {
    if ctx.cancel.is_cancelled() {
        return Err(WalkError::Cancelled);
    }

    let meta = match tokio::fs::symlink_metadata(&abs).await {
        Ok(m) => m,
        Err(e) => {
            ctx.errors.add(rel, e);
            return Ok(None);
        }
    };

    let is_dir = meta.is_dir();

    if let Some(ignorer) = &ctx.ignorer {
        if ignorer.matches(&rel, is_dir) {
            return Ok(None);
        }
    }

    if is_dir {
        process_dir_entry(ctx, abs, rel, name, meta).await
    } else {
        process_file_entry(ctx, abs, rel, name, meta).await
    }
}

async fn process_dir_entry(
    ctx: Arc<WalkContext>,
    abs: PathBuf,
    rel: String,
    name: String,
    meta: Metadata,
) -> Result<Option<Entry>, WalkError> {
    match walk_dir(ctx.clone(), abs, rel.clone()).await {
        Ok(hash) => Ok(Some(Entry {
            name,
            mode: Mode::Directory,
            size: 0,
            mtime: meta.modified().ok(),
            hash,
        })),
        Err(WalkError::Io(e)) => {
            ctx.errors.add(rel, e);
            Ok(None)
        }
        Err(fatal) => Err(fatal),
    }
}

async fn process_file_entry(
    ctx: Arc<WalkContext>,
    abs: PathBuf,
    rel: String,
    name: String,
    meta: Metadata,
) -> Result<Option<Entry>, WalkError> {
    match hash_file(&ctx, &abs, &rel, name, &meta).await {
        Ok(entry) => Ok(Some(entry)),
        Err(WalkError::Io(e)) => {
            ctx.errors.add(rel, e);
            Ok(None)
        }
        Err(fatal) => Err(fatal),
    }
}

/// Hash one file or symlink, consulting the store cache for non-symlinks.
async fn hash_file(
    ctx: &Arc<WalkContext>,
    abs: &Path,
    rel: &str,
    name: String,
    meta: &Metadata,
) -> Result<Entry, WalkError> {
    // Bound the number of in-flight read-and-hash operations.
    let _permit = tokio::select! {
        _ = ctx.cancel.cancelled() => return Err(WalkError::Cancelled),
        permit = ctx.io_slots.acquire() => match permit {
            Ok(p) => p,
            // The semaphore is never closed; treat it as cancellation.
            Err(_) => return Err(WalkError::Cancelled),
        },
    };
    if ctx.cancel.is_cancelled() {
        return Err(WalkError::Cancelled);
    }

    let mode = mode_from_metadata(meta);
    let size = meta.len() as i64;
    let mtime = meta.modified()?;

    if mode != Mode::Symlink {
        if let Some(hash) = ctx.store.lookup_cache(rel, size, mtime) {
            return Ok(Entry {
                name,
                mode,
                size,
                mtime: Some(mtime),
                hash,
            });
        }
    }

    let content = read_content(abs, mode).await?;

    let blob = Blob::new(content);
    let store = ctx.store.clone();
    let hash = tokio::task::spawn_blocking(move || store.put_blob(&blob))
        .await
        .map_err(|e| WalkError::Io(io::Error::other(e)))??;

    if mode != Mode::Symlink {
        ctx.store.update_cache(rel, size, mtime, hash);
    }

    Ok(Entry {
        name,
        mode,
        size,
        mtime: Some(mtime),
        hash,
    })
}

/// Read file bytes, or the link target text for symlinks. Symlinks are
/// opaque leaves: the target is never followed, which also keeps walks over
/// ancestor-directory links from looping.
async fn read_content(abs: &Path, mode: Mode) -> Result<Vec<u8>, WalkError> {
    if mode == Mode::Symlink {
        let target = tokio::fs::read_link(abs).await?;
        Ok(target.into_os_string().into_encoded_bytes())
    } else {
        Ok(tokio::fs::read(abs).await?)
    }
}

fn mode_from_metadata(meta: &Metadata) -> Mode {
    if meta.file_type().is_symlink() {
        return Mode::Symlink;
    }
    if meta.is_dir() {
        return Mode::Directory;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if meta.permissions().mode() & 0o111 != 0 {
            return Mode::Executable;
        }
    }
    Mode::Regular
}

/// Join relative paths with forward slashes on every platform.
fn join_rel(rel: &str, name: &str) -> String {
    if rel.is_empty() {
        name.to_string()
    } else {
        format!("{rel}/{name}")
    }
}
