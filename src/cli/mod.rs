//! CLI definitions: clap types only, no behavior.

pub mod commands;

pub use commands::run;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// smerkle - Merkle tree based directory hashing tool
#[derive(Parser)]
#[command(name = "smerkle", version)]
#[command(about = "Computes Merkle tree hashes of directories to efficiently detect changes between snapshots")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the smerkle store directory
    #[arg(short = 's', long, global = true)]
    pub store: Option<PathBuf>,

    /// Output in JSON format
    #[arg(short = 'j', long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    /// Enable verbose logging
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, global = true)]
    pub log_level: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new smerkle store
    Init {
        /// Directory to initialize in (defaults to the current directory)
        path: Option<PathBuf>,
    },
    /// Compute the Merkle tree hash of a directory
    Hash {
        /// Directory to hash (defaults to the current directory)
        path: Option<PathBuf>,

        /// Number of concurrent workers (0 = CPU count)
        #[arg(short = 'c', long, default_value_t = 0)]
        concurrency: usize,

        /// Custom ignore file path
        #[arg(short = 'i', long)]
        ignore_file: Option<PathBuf>,
    },
    /// Show changes since a baseline hash
    Status {
        /// Directory to hash (defaults to the current directory)
        path: Option<PathBuf>,

        /// Baseline hash to compare against
        #[arg(short = 'b', long)]
        base: String,

        /// Number of concurrent workers (0 = CPU count)
        #[arg(short = 'c', long, default_value_t = 0)]
        concurrency: usize,
    },
    /// Compare two stored tree hashes
    Diff {
        old: String,
        new: String,

        /// Only compare top-level entries
        #[arg(long)]
        no_recursive: bool,

        /// Filter by change type: added, deleted, modified, type_change
        #[arg(short = 't', long = "type")]
        type_filter: Option<String>,

        /// Only show paths, no change type prefix
        #[arg(long)]
        name_only: bool,
    },
    /// Display tree contents
    CatTree {
        hash: String,

        /// Show subtrees recursively
        #[arg(short = 'r', long)]
        recursive: bool,

        /// Show size and mode details
        #[arg(short = 'l', long)]
        long: bool,
    },
    /// Display blob contents
    CatBlob { hash: String },
    /// Show store statistics
    Stats,
}
