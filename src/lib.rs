//! smerkle: Merkle tree based directory hashing
//!
//! Computes deterministic Merkle tree fingerprints of directory trees and
//! persists every intermediate node in a local content-addressed store, so
//! unchanged trees are recognized without rereading file bytes and any two
//! stored roots can be diffed structurally.

pub mod cli;
pub mod config;
pub mod diff;
pub mod error;
pub mod ignore;
pub mod logging;
pub mod object;
pub mod store;
pub mod walker;
