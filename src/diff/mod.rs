//! Tree differ: ordered merge of two stored trees into a labeled change list.
//!
//! Both inputs are tree hashes; the zero hash stands for an empty tree so a
//! first snapshot can be diffed against nothing. Entries are merged with two
//! pointers over the name-sorted lists, descending into subtrees when
//! recursive. Because child hashes are content hashes, a mode-only flip on an
//! otherwise identical file is not reported.

use crate::error::DiffError;
use crate::object::{Entry, Hash, Mode, Tree};
use crate::store::Store;
use std::fmt;

/// Kind of a single change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Entry only in the new tree.
    Added,
    /// Entry only in the old tree.
    Deleted,
    /// Same name, different hash.
    Modified,
    /// File ↔ directory change.
    TypeChange,
}

impl ChangeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeKind::Added => "added",
            ChangeKind::Deleted => "deleted",
            ChangeKind::Modified => "modified",
            ChangeKind::TypeChange => "type_change",
        }
    }

    /// Single-letter code for diff-style lines.
    pub fn code(self) -> char {
        match self {
            ChangeKind::Added => 'A',
            ChangeKind::Deleted => 'D',
            ChangeKind::Modified => 'M',
            ChangeKind::TypeChange => 'T',
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One change between two trees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub kind: ChangeKind,
    /// Full path relative to the diff root.
    pub path: String,
    /// Old-side entry; `None` for additions.
    pub old: Option<Entry>,
    /// New-side entry; `None` for deletions.
    pub new: Option<Entry>,
}

#[derive(Debug, Clone, Copy)]
pub struct DiffOptions {
    pub recursive: bool,
}

impl Default for DiffOptions {
    fn default() -> Self {
        DiffOptions { recursive: true }
    }
}

/// The flat change list produced by a diff.
#[derive(Debug, Default)]
pub struct DiffResult {
    pub changes: Vec<Change>,
}

impl DiffResult {
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    pub fn added(&self) -> Vec<&Change> {
        self.filter_kind(ChangeKind::Added)
    }

    pub fn deleted(&self) -> Vec<&Change> {
        self.filter_kind(ChangeKind::Deleted)
    }

    pub fn modified(&self) -> Vec<&Change> {
        self.filter_kind(ChangeKind::Modified)
    }

    pub fn type_changes(&self) -> Vec<&Change> {
        self.filter_kind(ChangeKind::TypeChange)
    }

    fn filter_kind(&self, kind: ChangeKind) -> Vec<&Change> {
        self.changes.iter().filter(|c| c.kind == kind).collect()
    }
}

/// Diff two stored roots. Either hash may be zero (empty tree).
pub fn diff(
    store: &Store,
    old_hash: Hash,
    new_hash: Hash,
    options: DiffOptions,
) -> Result<DiffResult, DiffError> {
    let mut result = DiffResult::default();
    diff_trees(store, old_hash, new_hash, "", options, &mut result)?;
    Ok(result)
}

fn load_tree(store: &Store, hash: Hash) -> Result<Tree, DiffError> {
    if hash.is_zero() {
        return Ok(Tree::default());
    }
    let tree = store.get_tree(hash)?;
    if !tree.is_sorted() {
        return Err(DiffError::UnorderedTree(hash));
    }
    Ok(tree)
}

fn diff_trees(
    store: &Store,
    old_hash: Hash,
    new_hash: Hash,
    prefix: &str,
    options: DiffOptions,
    result: &mut DiffResult,
) -> Result<(), DiffError> {
    if old_hash == new_hash {
        return Ok(());
    }

    let old_tree = load_tree(store, old_hash)?;
    let new_tree = load_tree(store, new_hash)?;

    let mut i = 0;
    let mut j = 0;

    while i < old_tree.entries.len() || j < new_tree.entries.len() {
        let old_entry = old_tree.entries.get(i);
        let new_entry = new_tree.entries.get(j);

        match (old_entry, new_entry) {
            (None, Some(new_e)) => {
                emit_added(store, prefix, new_e, options, result)?;
                j += 1;
            }
            (Some(old_e), None) => {
                emit_deleted(store, prefix, old_e, options, result)?;
                i += 1;
            }
            (Some(old_e), Some(new_e)) => {
                match old_e.name.as_bytes().cmp(new_e.name.as_bytes()) {
                    std::cmp::Ordering::Less => {
                        emit_deleted(store, prefix, old_e, options, result)?;
                        i += 1;
                    }
                    std::cmp::Ordering::Greater => {
                        emit_added(store, prefix, new_e, options, result)?;
                        j += 1;
                    }
                    std::cmp::Ordering::Equal => {
                        let path = join_path(prefix, &old_e.name);
                        let old_is_dir = old_e.mode == Mode::Directory;
                        let new_is_dir = new_e.mode == Mode::Directory;

                        if old_is_dir != new_is_dir {
                            result.changes.push(Change {
                                kind: ChangeKind::TypeChange,
                                path: path.clone(),
                                old: Some(old_e.clone()),
                                new: Some(new_e.clone()),
                            });
                            if options.recursive && old_is_dir {
                                add_all_entries(
                                    store,
                                    old_e.hash,
                                    &path,
                                    ChangeKind::Deleted,
                                    result,
                                )?;
                            }
                            if options.recursive && new_is_dir {
                                add_all_entries(store, new_e.hash, &path, ChangeKind::Added, result)?;
                            }
                        } else if old_e.hash != new_e.hash {
                            if old_is_dir && options.recursive {
                                diff_trees(store, old_e.hash, new_e.hash, &path, options, result)?;
                            } else {
                                result.changes.push(Change {
                                    kind: ChangeKind::Modified,
                                    path,
                                    old: Some(old_e.clone()),
                                    new: Some(new_e.clone()),
                                });
                            }
                        }

                        i += 1;
                        j += 1;
                    }
                }
            }
            (None, None) => break,
        }
    }

    Ok(())
}

fn emit_added(
    store: &Store,
    prefix: &str,
    entry: &Entry,
    options: DiffOptions,
    result: &mut DiffResult,
) -> Result<(), DiffError> {
    let path = join_path(prefix, &entry.name);
    result.changes.push(Change {
        kind: ChangeKind::Added,
        path: path.clone(),
        old: None,
        new: Some(entry.clone()),
    });
    if options.recursive && entry.mode == Mode::Directory {
        add_all_entries(store, entry.hash, &path, ChangeKind::Added, result)?;
    }
    Ok(())
}

fn emit_deleted(
    store: &Store,
    prefix: &str,
    entry: &Entry,
    options: DiffOptions,
    result: &mut DiffResult,
) -> Result<(), DiffError> {
    let path = join_path(prefix, &entry.name);
    result.changes.push(Change {
        kind: ChangeKind::Deleted,
        path: path.clone(),
        old: Some(entry.clone()),
        new: None,
    });
    if options.recursive && entry.mode == Mode::Directory {
        add_all_entries(store, entry.hash, &path, ChangeKind::Deleted, result)?;
    }
    Ok(())
}

/// Emit every entry reachable from `hash` as `kind`, recursing into
/// subtrees. Used to expand an added or deleted directory.
fn add_all_entries(
    store: &Store,
    hash: Hash,
    prefix: &str,
    kind: ChangeKind,
    result: &mut DiffResult,
) -> Result<(), DiffError> {
    let tree = load_tree(store, hash)?;

    for entry in &tree.entries {
        let path = join_path(prefix, &entry.name);

        let change = match kind {
            ChangeKind::Added => Change {
                kind,
                path: path.clone(),
                old: None,
                new: Some(entry.clone()),
            },
            _ => Change {
                kind,
                path: path.clone(),
                old: Some(entry.clone()),
                new: None,
            },
        };
        result.changes.push(change);

        if entry.mode == Mode::Directory {
            add_all_entries(store, entry.hash, &path, kind, result)?;
        }
    }

    Ok(())
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    }
}
