//! Command execution: thin wrappers over the walker, differ, and store.

use super::{Cli, Commands};
use crate::config::Settings;
use crate::diff::{self, Change, ChangeKind, DiffOptions};
use crate::error::{CliError, StoreError, WalkError};
use crate::ignore::Ignorer;
use crate::object::{Blob, Hash, Mode};
use crate::store::Store;
use crate::walker::{self, CancelToken, WalkOptions};
use base64::prelude::{Engine as _, BASE64_STANDARD};
use serde_json::json;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

#[derive(Clone, Copy)]
struct Output {
    json: bool,
    quiet: bool,
}

/// Execute a parsed command line against the resolved settings.
pub async fn run(cli: Cli, settings: Settings) -> Result<(), CliError> {
    let store_dir = cli.store.clone().unwrap_or_else(|| settings.store.clone());
    let out = Output {
        json: cli.json,
        quiet: cli.quiet,
    };

    match cli.command {
        Commands::Init { path } => run_init(&store_dir, path, out),
        Commands::Hash {
            path,
            concurrency,
            ignore_file,
        } => {
            let concurrency = pick_concurrency(concurrency, settings.concurrency);
            run_hash(&store_dir, path, concurrency, ignore_file, out).await
        }
        Commands::Status {
            path,
            base,
            concurrency,
        } => {
            let concurrency = pick_concurrency(concurrency, settings.concurrency);
            run_status(&store_dir, path, &base, concurrency, out).await
        }
        Commands::Diff {
            old,
            new,
            no_recursive,
            type_filter,
            name_only,
        } => run_diff(&store_dir, &old, &new, no_recursive, type_filter, name_only, out),
        Commands::CatTree {
            hash,
            recursive,
            long,
        } => run_cat_tree(&store_dir, &hash, recursive, long, out),
        Commands::CatBlob { hash } => run_cat_blob(&store_dir, &hash, out),
        Commands::Stats => run_stats(&store_dir, out),
    }
}

fn pick_concurrency(flag: usize, configured: usize) -> usize {
    if flag > 0 {
        flag
    } else {
        configured
    }
}

/// Wire SIGINT to a fresh cancel token so a long walk unwinds cleanly.
fn cancel_on_interrupt() -> CancelToken {
    let cancel = CancelToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling");
            trigger.cancel();
        }
    });
    cancel
}

fn run_init(store_dir: &Path, path: Option<PathBuf>, out: Output) -> Result<(), CliError> {
    let base = path.unwrap_or_else(|| PathBuf::from("."));
    let store_path = if store_dir.is_absolute() {
        store_dir.to_path_buf()
    } else {
        base.join(store_dir)
    };

    let store = Store::open(&store_path)?;
    store.close()?;

    if out.json {
        print_json(&json!({ "store": store_path.display().to_string() }))?;
    } else if !out.quiet {
        println!("Initialized smerkle store at {}", store_path.display());
    }

    Ok(())
}

async fn run_hash(
    store_dir: &Path,
    path: Option<PathBuf>,
    concurrency: usize,
    ignore_file: Option<PathBuf>,
    out: Output,
) -> Result<(), CliError> {
    let store = Arc::new(Store::open(store_dir)?);

    let mut options = WalkOptions {
        concurrency,
        ignorer: None,
    };
    if let Some(file) = ignore_file {
        let ignorer = Ignorer::from_file(&file)
            .map_err(|source| WalkError::IgnoreLoad { path: file, source })?;
        options.ignorer = Some(ignorer);
    }

    let path = path.unwrap_or_else(|| PathBuf::from("."));
    let cancel = cancel_on_interrupt();
    let result = walker::walk(&cancel, &path, Arc::clone(&store), options).await?;
    store.close()?;

    if out.json {
        let mut output = json!({ "hash": result.root_hash.to_hex() });
        if !result.errors.is_empty() {
            let errs: Vec<String> = result.errors.iter().map(|e| e.to_string()).collect();
            output["errors"] = json!(errs);
        }
        print_json(&output)?;
        return Ok(());
    }

    println!("{}", result.root_hash);

    if !out.quiet && !result.errors.is_empty() {
        eprintln!("\nWarnings ({} errors encountered):", result.errors.len());
        for e in &result.errors {
            eprintln!("  {e}");
        }
    }

    Ok(())
}

async fn run_status(
    store_dir: &Path,
    path: Option<PathBuf>,
    base: &str,
    concurrency: usize,
    out: Output,
) -> Result<(), CliError> {
    let base_hash = Hash::from_hex(base)?;

    let store = Arc::new(Store::open(store_dir)?);
    let path = path.unwrap_or_else(|| PathBuf::from("."));
    let cancel = cancel_on_interrupt();
    let result = walker::walk(
        &cancel,
        &path,
        Arc::clone(&store),
        WalkOptions {
            concurrency,
            ignorer: None,
        },
    )
    .await?;
    let current_hash = result.root_hash;

    if current_hash == base_hash {
        store.close()?;
        if out.json {
            print_json(&json!({
                "base_hash": base_hash.to_hex(),
                "current_hash": current_hash.to_hex(),
                "changed": false,
                "changes": [],
            }))?;
        } else if !out.quiet {
            println!("No changes");
        }
        return Ok(());
    }

    let diff_result = diff::diff(&store, base_hash, current_hash, DiffOptions::default())?;
    store.close()?;

    if out.json {
        let changes: Vec<serde_json::Value> = diff_result.changes.iter().map(change_json).collect();
        print_json(&json!({
            "base_hash": base_hash.to_hex(),
            "current_hash": current_hash.to_hex(),
            "changed": !changes.is_empty(),
            "changes": changes,
        }))?;
        return Ok(());
    }

    for c in &diff_result.changes {
        println!("{}\t{}", c.kind.code(), c.path);
    }

    Ok(())
}

fn run_diff(
    store_dir: &Path,
    old: &str,
    new: &str,
    no_recursive: bool,
    type_filter: Option<String>,
    name_only: bool,
    out: Output,
) -> Result<(), CliError> {
    let old_hash = Hash::from_hex(old)?;
    let new_hash = Hash::from_hex(new)?;

    let store = Store::open(store_dir)?;
    let result = diff::diff(
        &store,
        old_hash,
        new_hash,
        DiffOptions {
            recursive: !no_recursive,
        },
    )?;
    store.close()?;

    let changes: Vec<&Change> = match type_filter.as_deref().and_then(parse_change_kind) {
        Some(kind) => result.changes.iter().filter(|c| c.kind == kind).collect(),
        None => result.changes.iter().collect(),
    };

    if out.json {
        let json_changes: Vec<serde_json::Value> =
            changes.iter().map(|c| change_json(c)).collect();
        print_json(&json!({
            "changes": json_changes,
            "count": json_changes.len(),
        }))?;
        return Ok(());
    }

    for c in changes {
        if name_only {
            println!("{}", c.path);
        } else {
            println!("{}\t{}", c.kind.code(), c.path);
        }
    }

    Ok(())
}

fn parse_change_kind(s: &str) -> Option<ChangeKind> {
    match s {
        "added" => Some(ChangeKind::Added),
        "deleted" => Some(ChangeKind::Deleted),
        "modified" => Some(ChangeKind::Modified),
        "type_change" => Some(ChangeKind::TypeChange),
        _ => None,
    }
}

fn change_json(c: &Change) -> serde_json::Value {
    let mut value = json!({
        "type": c.kind.as_str(),
        "path": c.path,
    });
    if let Some(old) = &c.old {
        value["old_hash"] = json!(old.hash.to_hex());
        value["old_mode"] = json!(old.mode.as_str());
    }
    if let Some(new) = &c.new {
        value["new_hash"] = json!(new.hash.to_hex());
        value["new_mode"] = json!(new.mode.as_str());
    }
    value
}

fn run_cat_tree(
    store_dir: &Path,
    hash: &str,
    recursive: bool,
    long: bool,
    out: Output,
) -> Result<(), CliError> {
    let hash = Hash::from_hex(hash)?;
    let store = Store::open(store_dir)?;

    if out.json {
        let entries = tree_json_entries(&store, hash, "", recursive)?;
        print_json(&json!({
            "hash": hash.to_hex(),
            "entries": entries,
        }))?;
        return Ok(());
    }

    cat_tree_text(&store, hash, "", recursive, long)
}

fn get_tree(store: &Store, hash: Hash) -> Result<crate::object::Tree, CliError> {
    match store.get_tree(hash) {
        Ok(tree) => Ok(tree),
        Err(StoreError::NotFound(h)) => Err(CliError::TreeNotFound(h)),
        Err(e) => Err(e.into()),
    }
}

fn tree_json_entries(
    store: &Store,
    hash: Hash,
    prefix: &str,
    recursive: bool,
) -> Result<Vec<serde_json::Value>, CliError> {
    let tree = get_tree(store, hash)?;

    let mut entries = Vec::with_capacity(tree.entries.len());
    for e in &tree.entries {
        let path = join_path(prefix, &e.name);

        let mut value = json!({
            "name": e.name,
            "path": path,
            "mode": e.mode.as_str(),
            "hash": e.hash.to_hex(),
        });
        if e.mode.is_file() {
            value["size"] = json!(e.size);
        }
        if recursive && e.mode == Mode::Directory {
            value["entries"] = json!(tree_json_entries(store, e.hash, &path, recursive)?);
        }

        entries.push(value);
    }

    Ok(entries)
}

fn cat_tree_text(
    store: &Store,
    hash: Hash,
    prefix: &str,
    recursive: bool,
    long: bool,
) -> Result<(), CliError> {
    let tree = get_tree(store, hash)?;

    for e in &tree.entries {
        let path = join_path(prefix, &e.name);

        if long {
            println!("{} {:>10} {} {}", e.mode.octal_code(), e.size, e.hash, path);
        } else {
            println!("{} {} {}", e.mode.octal_code(), e.hash, path);
        }

        if recursive && e.mode == Mode::Directory {
            cat_tree_text(store, e.hash, &path, recursive, long)?;
        }
    }

    Ok(())
}

fn run_cat_blob(store_dir: &Path, hash: &str, out: Output) -> Result<(), CliError> {
    let hash = Hash::from_hex(hash)?;
    let store = Store::open(store_dir)?;

    let blob: Blob = match store.get_blob(hash) {
        Ok(blob) => blob,
        Err(StoreError::NotFound(h)) => return Err(CliError::BlobNotFound(h)),
        Err(e) => return Err(e.into()),
    };

    if out.json {
        let output = match std::str::from_utf8(&blob.content) {
            Ok(text) => json!({
                "hash": hash.to_hex(),
                "size": blob.content.len(),
                "content": text,
                "encoding": "utf8",
            }),
            Err(_) => json!({
                "hash": hash.to_hex(),
                "size": blob.content.len(),
                "content": BASE64_STANDARD.encode(&blob.content),
                "encoding": "base64",
            }),
        };
        print_json(&output)?;
        return Ok(());
    }

    std::io::stdout().write_all(&blob.content)?;
    Ok(())
}

fn run_stats(store_dir: &Path, out: Output) -> Result<(), CliError> {
    let store = Store::open(store_dir)?;
    let stats = store.stats();

    if out.json {
        print_json(&json!({
            "objects": stats.objects,
            "index": stats.index_entries,
        }))?;
        return Ok(());
    }

    println!("Objects: {}", stats.objects);
    println!("Index:   {}", stats.index_entries);

    Ok(())
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    }
}

fn print_json(value: &serde_json::Value) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_change_kind() {
        assert_eq!(parse_change_kind("added"), Some(ChangeKind::Added));
        assert_eq!(parse_change_kind("deleted"), Some(ChangeKind::Deleted));
        assert_eq!(parse_change_kind("modified"), Some(ChangeKind::Modified));
        assert_eq!(parse_change_kind("type_change"), Some(ChangeKind::TypeChange));
        assert_eq!(parse_change_kind("renamed"), None);
    }

    #[test]
    fn test_pick_concurrency() {
        assert_eq!(pick_concurrency(4, 8), 4);
        assert_eq!(pick_concurrency(0, 8), 8);
        assert_eq!(pick_concurrency(0, 0), 0);
    }

    #[test]
    fn test_change_json_shapes() {
        let change = Change {
            kind: ChangeKind::Added,
            path: "new.txt".to_string(),
            old: None,
            new: Some(crate::object::Entry {
                name: "new.txt".to_string(),
                mode: Mode::Regular,
                size: 3,
                mtime: None,
                hash: Hash::of(b"abc"),
            }),
        };

        let value = change_json(&change);
        assert_eq!(value["type"], "added");
        assert_eq!(value["path"], "new.txt");
        assert_eq!(value["new_mode"], "regular");
        assert!(value.get("old_hash").is_none());
    }
}
