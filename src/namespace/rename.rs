//! Rename protocol shared by folders and files.
//!
//! The backing store only guarantees single-entity transactions and its
//! uniqueness queries may lag writes, so "rename iff the target is free" cannot
//! be expressed atomically. Instead the coordinator writes the new value in one
//! transaction, re-queries the namespace, and on a detected collision issues a
//! compensating transaction restoring the old value.
//!
//! Under truly concurrent renames both sides may observe no collision, and the
//! compensating write can itself lose. The contract is eventually-consistent
//! best effort, not linearizable. Rollback failures are logged at error level
//! and counted in `RenameStats`; they are never retried here.
//!
//! When the store enforces unique paths itself the coordinator skips the
//! detect/rollback dance and relies on the conditional write.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::RenameMode;
use crate::error::{FsError, FsResult};
use crate::paths;
use crate::storage::{EntityStore, FileQuery, FolderQuery, StoreCapabilities, StoreResult};
use crate::types::EntryKind;

/// An entity found occupying the rename target after the write committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collision {
    pub kind: EntryKind,
    pub path: String,
    pub detail: String,
}

impl Collision {
    pub fn new(kind: EntryKind, path: impl Into<String>, detail: impl Into<String>) -> Self {
        Self { kind, path: path.into(), detail: detail.into() }
    }
}

/// Look for any entity other than `exclude` occupying `path`, either a folder
/// with that exact path or a file whose derived path equals it.
pub fn find_collision(store: &dyn EntityStore, path: &str, exclude: Option<&Uuid>) -> FsResult<Option<Collision>> {
    let other = |id: &Uuid| Some(id) != exclude;
    let folders = store.query_folders(&FolderQuery::PathEq { path: path.to_string(), limit: 2 })?;
    if folders.iter().any(|f| other(&f.id)) {
        return Ok(Some(Collision::new(EntryKind::Folder, path, format!("Folder {} already exists", path))));
    }
    let Some((folder_path, filename)) = paths::split_file_path(path) else { return Ok(None); };
    let parents = store.query_folders(&FolderQuery::PathEq { path: folder_path, limit: usize::MAX })?;
    for parent in parents {
        let files = store.query_files(&FileQuery::Named { folder_id: parent.id, filename: filename.clone(), limit: 2 })?;
        if files.iter().any(|f| other(&f.id)) {
            return Ok(Some(Collision::new(EntryKind::File, path, format!("File {} already exists", path))));
        }
    }
    Ok(None)
}

#[derive(Debug, Default)]
pub struct RenameStats {
    collisions: AtomicU64,
    rollbacks: AtomicU64,
    rollback_failures: AtomicU64,
    descendant_failures: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameStatsSnapshot {
    pub collisions: u64,
    pub rollbacks: u64,
    pub rollback_failures: u64,
    pub descendant_failures: u64,
}

impl RenameStats {
    pub fn snapshot(&self) -> RenameStatsSnapshot {
        RenameStatsSnapshot {
            collisions: self.collisions.load(Ordering::Relaxed),
            rollbacks: self.rollbacks.load(Ordering::Relaxed),
            rollback_failures: self.rollback_failures.load(Ordering::Relaxed),
            descendant_failures: self.descendant_failures.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn record_descendant_failure(&self) {
        self.descendant_failures.fetch_add(1, Ordering::Relaxed);
    }
}

/// Strategy actually in force for a given store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    ConditionalWrite,
    DetectAndCompensate,
}

#[derive(Clone)]
pub struct RenameCoordinator {
    strategy: Strategy,
    stats: Arc<RenameStats>,
}

impl RenameCoordinator {
    pub fn new(mode: RenameMode, caps: StoreCapabilities, stats: Arc<RenameStats>) -> Self {
        let strategy = match (mode, caps.unique_paths) {
            (RenameMode::DetectAndCompensate, _) => Strategy::DetectAndCompensate,
            (RenameMode::Auto, true) | (RenameMode::ConditionalWrite, true) => Strategy::ConditionalWrite,
            (RenameMode::Auto, false) => Strategy::DetectAndCompensate,
            (RenameMode::ConditionalWrite, false) => {
                warn!(target: "docfs::rename", "conditional renames requested but the store does not enforce unique paths; using detect-and-compensate");
                Strategy::DetectAndCompensate
            }
        };
        Self { strategy, stats }
    }

    pub fn strategy(&self) -> Strategy { self.strategy }
    pub fn stats(&self) -> &Arc<RenameStats> { &self.stats }

    /// Run the rename protocol for one entity.
    ///
    /// `write` performs the single-entity transaction setting the given value;
    /// `check` re-queries the namespace after the write and reports a collision.
    /// `subject` names the entity in logs.
    pub fn rename<W, C>(&self, subject: &str, old: &str, new: &str, write: W, check: C) -> FsResult<()>
    where
        W: Fn(&str) -> StoreResult<()>,
        C: FnOnce() -> FsResult<Option<Collision>>,
    {
        if self.strategy == Strategy::ConditionalWrite {
            write(new).map_err(FsError::from)?;
            info!(target: "docfs::rename", "renamed {} '{}' -> '{}' (conditional write)", subject, old, new);
            return Ok(());
        }

        write(new).map_err(FsError::from)?;

        let outcome = check();
        let failure = match outcome {
            Ok(None) => {
                info!(target: "docfs::rename", "renamed {} '{}' -> '{}'", subject, old, new);
                return Ok(());
            }
            Ok(Some(collision)) => {
                self.stats.collisions.fetch_add(1, Ordering::Relaxed);
                warn!(target: "docfs::rename", "{} {} already exists; rolling back {} '{}' -> '{}'", collision.kind, collision.path, subject, new, old);
                FsError::already_exists("already_exists", collision.detail)
            }
            Err(e) => {
                // Uniqueness could not be verified; do not leave the unverified value in place.
                warn!(target: "docfs::rename", "could not verify rename of {} to '{}': {}; rolling back", subject, new, e);
                e
            }
        };

        match write(old) {
            Ok(()) => {
                self.stats.rollbacks.fetch_add(1, Ordering::Relaxed);
                Err(failure)
            }
            Err(rollback_err) => {
                self.stats.rollback_failures.fetch_add(1, Ordering::Relaxed);
                error!(
                    target: "docfs::rename",
                    "CRITICAL: rollback of {} from '{}' to '{}' failed: {}; namespace left inconsistent, manual repair required (original failure: {})",
                    subject, new, old, rollback_err, failure
                );
                Err(FsError::store(
                    "rollback_failed",
                    format!("rename of {} to '{}' collided and rollback to '{}' failed: {}", subject, new, old, rollback_err),
                ))
            }
        }
    }
}
