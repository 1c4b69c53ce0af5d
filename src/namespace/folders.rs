//! Folder lifecycle over the flat document store.
//!
//! Folders are records keyed by their full normalized path. Child listing is
//! a paged range scan over the ordered path index starting just past
//! `parent + "/"`, keeping only direct children and stopping at the first row
//! that no longer carries the prefix.

use std::cmp::Ordering;

use tracing::{debug, error, info, warn};

use crate::config::NamespaceConfig;
use crate::error::{FsError, FsResult};
use crate::namespace::rename::{find_collision, RenameCoordinator, Strategy};
use crate::paths;
use crate::storage::{FileQuery, FolderQuery, SharedStore, StoreError};
use crate::types::{EntryKind, Folder};

/// Deterministic pick among records that share a path: oldest first, id as tiebreak.
fn canonical_order(a: &Folder, b: &Folder) -> Ordering {
    a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id))
}

fn child_prefix(path: &str) -> String {
    if path.ends_with(paths::SEPARATOR) { path.to_string() } else { format!("{}{}", path, paths::SEPARATOR) }
}

#[derive(Clone)]
pub struct FolderRepository {
    store: SharedStore,
    root_path: String,
    scan_batch: usize,
    renamer: RenameCoordinator,
}

impl FolderRepository {
    pub fn new(store: SharedStore, config: &NamespaceConfig, renamer: RenameCoordinator) -> Self {
        Self { store, root_path: paths::normalize(&config.root_path), scan_batch: config.scan_batch.max(1), renamer }
    }

    pub fn root_path(&self) -> &str { &self.root_path }

    pub fn is_root(&self, folder: &Folder) -> bool { folder.path == self.root_path }

    /// All folders recorded at exactly `path`, canonical first.
    fn all_at(&self, path: &str) -> FsResult<Vec<Folder>> {
        let mut hits = self.store.query_folders(&FolderQuery::PathEq { path: path.to_string(), limit: usize::MAX })?;
        hits.sort_by(canonical_order);
        Ok(hits)
    }

    /// Exact-match lookup without the root fallback.
    pub fn find(&self, path: &str) -> FsResult<Option<Folder>> {
        let norm = paths::normalize(path);
        if norm.is_empty() { return Ok(None); }
        Ok(self.all_at(&norm)?.into_iter().next())
    }

    /// Resolve a folder by path. The root is materialized on demand if it is
    /// missing, so a store wiped after startup still has a root.
    pub fn resolve(&self, path: &str) -> FsResult<Folder> {
        let norm = paths::normalize(path);
        if let Some(f) = self.find(&norm)? {
            debug!(target: "docfs::folders", "resolve '{}' -> {}", norm, f.id);
            return Ok(f);
        }
        if norm == self.root_path {
            return self.ensure_root();
        }
        Err(FsError::not_found("folder_not_found", format!("Folder {} does not exist", norm)))
    }

    /// Idempotently create the root folder.
    ///
    /// Two callers racing on an empty plain store can both insert a root; the
    /// re-query afterwards keeps the canonical one and removes empty extras.
    pub fn ensure_root(&self) -> FsResult<Folder> {
        if self.all_at(&self.root_path)?.is_empty() {
            match self.store.insert_folder(&self.root_path) {
                Ok(f) => info!(target: "docfs::folders", "created root folder '{}' ({})", f.path, f.id),
                Err(StoreError::Conflict { .. }) => {
                    debug!(target: "docfs::folders", "root folder '{}' created concurrently", self.root_path);
                }
                Err(e) => return Err(e.into()),
            }
        }
        let mut roots = self.all_at(&self.root_path)?.into_iter();
        let Some(root) = roots.next() else {
            return Err(FsError::internal("root_unavailable", format!("Root folder {} could not be created", self.root_path)));
        };
        for dup in roots {
            // Child folders hang off the path, not the record; only files pin a duplicate.
            if self.has_files(&dup)? {
                warn!(target: "docfs::folders", "duplicate root folder {} holds files; leaving it in place", dup.id);
                continue;
            }
            match self.store.delete_folder(&dup.id) {
                Ok(_) => info!(target: "docfs::folders", "removed duplicate root folder {}", dup.id),
                Err(e) => warn!(target: "docfs::folders", "failed to remove duplicate root folder {}: {}", dup.id, e),
            }
        }
        Ok(root)
    }

    /// Parent of a folder's path; the root marker when there is none.
    pub fn parent_path(&self, folder: &Folder) -> String { paths::parent_path(&folder.path) }

    /// Direct child folders ordered ascending by path.
    pub fn list_child_folders(&self, folder: &Folder) -> FsResult<Vec<Folder>> {
        let prefix = child_prefix(&folder.path);
        let mut out: Vec<Folder> = Vec::new();
        self.scan_prefix(&prefix, |f| {
            let rest = &f.path[prefix.len()..];
            if rest.is_empty() || rest.contains(paths::SEPARATOR) { return; }
            // Duplicate records at one path surface once.
            if out.last().map(|prev| prev.path == f.path).unwrap_or(false) { return; }
            out.push(f);
        })?;
        debug!(target: "docfs::folders", "list '{}': {} child folders", folder.path, out.len());
        Ok(out)
    }

    /// Every folder strictly below `folder`, ascending by path.
    pub fn list_descendants(&self, folder: &Folder) -> FsResult<Vec<Folder>> {
        self.descendants_at(&folder.path)
    }

    fn descendants_at(&self, path: &str) -> FsResult<Vec<Folder>> {
        let prefix = child_prefix(path);
        let mut out = Vec::new();
        self.scan_prefix(&prefix, |f| {
            if f.path.len() > prefix.len() { out.push(f); }
        })?;
        Ok(out)
    }

    /// Page through folders whose path starts with `prefix`, in path order.
    fn scan_prefix(&self, prefix: &str, mut visit: impl FnMut(Folder)) -> FsResult<()> {
        let mut cursor = prefix.to_string();
        loop {
            let page = self.store.query_folders(&FolderQuery::PathAfter { after: cursor.clone(), limit: self.scan_batch })?;
            let Some(last) = page.last() else { return Ok(()); };
            cursor = last.path.clone();
            for f in page {
                if !f.path.starts_with(prefix) { return Ok(()); }
                visit(f);
            }
        }
    }

    fn has_files(&self, folder: &Folder) -> FsResult<bool> {
        let files = self.store.query_files(&FileQuery::InFolder { folder_id: folder.id, after: None, limit: 1 })?;
        Ok(!files.is_empty())
    }

    /// Any file, or any folder below `folder`. Paths are ordered, so the first
    /// row after the prefix decides.
    pub fn has_children(&self, folder: &Folder) -> FsResult<bool> {
        if self.has_files(folder)? { return Ok(true); }
        let prefix = child_prefix(&folder.path);
        let next = self.store.query_folders(&FolderQuery::PathAfter { after: prefix.clone(), limit: 1 })?;
        Ok(next.first().map(|f| f.path.starts_with(&prefix)).unwrap_or(false))
    }

    pub fn create(&self, parent_path: &str, name: &str) -> FsResult<Folder> {
        paths::validate_name(name).map_err(|m| FsError::invalid("invalid_name", m))?;
        let parent = self.resolve(parent_path)?;
        let path = paths::join(&parent.path, name);
        if let Some(c) = find_collision(self.store.as_ref(), &path, None)? {
            return Err(FsError::already_exists("already_exists", c.detail));
        }
        let folder = self.store.insert_folder(&path)?;
        if self.renamer.strategy() == Strategy::DetectAndCompensate {
            if let Some(c) = find_collision(self.store.as_ref(), &path, Some(&folder.id))? {
                // Racing folder creates agree on the canonical record; everyone else backs out.
                let ours = c.kind == EntryKind::Folder && self.all_at(&path)?.first().map(|f| f.id) == Some(folder.id);
                if !ours {
                    warn!(target: "docfs::folders", "concurrent create of '{}' detected; removing {}", path, folder.id);
                    self.store.delete_folder(&folder.id)?;
                    return Err(FsError::already_exists("already_exists", c.detail));
                }
            }
        }
        info!(target: "docfs::folders", "created folder '{}' ({})", folder.path, folder.id);
        Ok(folder)
    }

    /// Rename within the same parent. Descendant folder paths are rewritten
    /// afterwards, one transaction each; files follow their folder by id.
    pub fn rename(&self, folder: &Folder, new_name: &str) -> FsResult<Folder> {
        if self.is_root(folder) {
            return Err(FsError::invalid("root_rename", "The root folder cannot be renamed"));
        }
        paths::validate_name(new_name).map_err(|m| FsError::invalid("invalid_name", m))?;
        let old_path = folder.path.clone();
        let new_path = paths::join(&self.parent_path(folder), new_name);
        if new_path == old_path { return Ok(folder.clone()); }
        if let Some(c) = find_collision(self.store.as_ref(), &new_path, Some(&folder.id))? {
            return Err(FsError::already_exists("already_exists", c.detail));
        }

        let id = folder.id;
        self.renamer.rename(
            "folder",
            &old_path,
            &new_path,
            |value| self.store.update_folder(&id, &mut |f: &mut Folder| f.path = value.to_string()).map(|_| ()),
            || find_collision(self.store.as_ref(), &new_path, Some(&id)),
        )?;

        self.rewrite_descendants(&old_path, &new_path)?;
        self.store
            .get_folder(&id)?
            .ok_or_else(|| FsError::not_found("folder_not_found", format!("Folder {} vanished after rename", new_path)))
    }

    fn rewrite_descendants(&self, old_path: &str, new_path: &str) -> FsResult<()> {
        for d in self.descendants_at(old_path)? {
            let moved_to = format!("{}{}", new_path, &d.path[old_path.len()..]);
            match self.store.update_folder(&d.id, &mut |f: &mut Folder| f.path = moved_to.clone()) {
                Ok(_) => debug!(target: "docfs::folders", "moved descendant '{}' -> '{}'", d.path, moved_to),
                Err(e) => {
                    self.renamer.stats().record_descendant_failure();
                    error!(target: "docfs::folders", "failed to move descendant folder {} '{}' -> '{}': {}", d.id, d.path, moved_to, e);
                }
            }
        }
        Ok(())
    }

    /// Delete an empty, non-root folder.
    pub fn delete(&self, folder: &Folder) -> FsResult<()> {
        if self.is_root(folder) {
            return Err(FsError::invalid("root_delete", "The root folder cannot be deleted"));
        }
        if self.has_children(folder)? {
            return Err(FsError::not_empty("not_empty", format!("Folder {} is not empty", folder.path)));
        }
        if !self.store.delete_folder(&folder.id)? {
            return Err(FsError::not_found("folder_not_found", format!("Folder {} does not exist", folder.path)));
        }
        info!(target: "docfs::folders", "deleted folder '{}' ({})", folder.path, folder.id);
        Ok(())
    }
}
