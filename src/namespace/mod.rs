//!
//! docfs namespace
//! ---------------
//! Hierarchical folder/file namespace over a flat `EntityStore`.
//!
//! - `folders`: folder records keyed by full path, child listing by prefix scan.
//! - `files`: file records keyed by (folder, filename), payload lifecycle.
//! - `rename`: write, re-query, compensate on collision.
//! - `walker`: direct children of a folder, folders before files.
//!
//! `Namespace` is the operation surface the command layer and HTTP adapter
//! call. It holds no mutable state of its own; all coordination lives in the
//! store, so one instance can be shared across threads. Store calls are not
//! cancellable: a caller that times out abandons its wait, and any
//! transaction that already committed stands.

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::NamespaceConfig;
use crate::error::{FsError, FsResult};
use crate::paths;
use crate::storage::{ChunkReader, SharedContentStore, SharedStore};
use crate::types::{ContentRef, DirEntry, EntryInfo, FileEntry, Folder};

pub mod files;
pub mod folders;
pub mod rename;
pub mod walker;

pub use files::FileRepository;
pub use folders::FolderRepository;
pub use rename::{Collision, RenameCoordinator, RenameStats, RenameStatsSnapshot, Strategy};
pub use walker::HierarchyWalker;

pub struct Namespace {
    config: NamespaceConfig,
    content: SharedContentStore,
    folders: FolderRepository,
    files: FileRepository,
    walker: HierarchyWalker,
    stats: Arc<RenameStats>,
}

impl Namespace {
    /// Wire the repositories without touching the store.
    pub fn new(store: SharedStore, content: SharedContentStore, config: NamespaceConfig) -> Self {
        let config = config.normalized();
        let stats = Arc::new(RenameStats::default());
        let renamer = RenameCoordinator::new(config.rename_mode, store.capabilities(), stats.clone());
        let folders = FolderRepository::new(store.clone(), &config, renamer.clone());
        let files = FileRepository::new(store, content.clone(), folders.clone(), &config, renamer);
        let walker = HierarchyWalker::new(folders.clone(), files.clone());
        Self { config, content, folders, files, walker, stats }
    }

    /// Wire the repositories and materialize the root folder.
    pub fn open(store: SharedStore, content: SharedContentStore, config: NamespaceConfig) -> FsResult<Self> {
        let ns = Self::new(store, content, config);
        let root = ns.ensure_root_exists()?;
        info!(target: "startup", "namespace ready: root '{}' ({}), rename mode {:?}", root.path, root.id, ns.config.rename_mode);
        Ok(ns)
    }

    pub fn config(&self) -> &NamespaceConfig { &self.config }
    pub fn root_path(&self) -> &str { self.folders.root_path() }
    pub fn folders(&self) -> &FolderRepository { &self.folders }
    pub fn files(&self) -> &FileRepository { &self.files }

    /// Idempotent; safe to call from every process at startup.
    pub fn ensure_root_exists(&self) -> FsResult<Folder> { self.folders.ensure_root() }

    pub fn resolve(&self, path: &str) -> FsResult<DirEntry> {
        let norm = paths::normalize(path);
        if let Some(folder) = self.folders.find(&norm)? {
            return Ok(DirEntry::Folder(folder));
        }
        if norm == self.root_path() {
            return Ok(DirEntry::Folder(self.folders.ensure_root()?));
        }
        match self.files.resolve(&norm) {
            Ok(entry) => Ok(DirEntry::File(entry)),
            Err(e) if e.is_not_found() => Err(FsError::not_found("not_found", format!("Path {} does not exist", norm))),
            Err(e) => Err(e),
        }
    }

    fn resolve_folder(&self, path: &str) -> FsResult<Folder> {
        match self.resolve(path)? {
            DirEntry::Folder(folder) => Ok(folder),
            DirEntry::File(entry) => Err(FsError::invalid("not_a_folder", format!("{} is a file, not a folder", entry.path()))),
        }
    }

    fn resolve_file(&self, path: &str) -> FsResult<FileEntry> {
        match self.resolve(path)? {
            DirEntry::File(entry) => Ok(entry),
            DirEntry::Folder(folder) => Err(FsError::invalid("is_folder", format!("{} is a folder, not a file", folder.path))),
        }
    }

    pub fn list_children(&self, path: &str) -> FsResult<Vec<DirEntry>> {
        let folder = self.resolve_folder(path)?;
        self.walker.children(&folder)
    }

    pub fn create_folder(&self, parent_path: &str, name: &str) -> FsResult<Folder> {
        self.folders.create(parent_path, name)
    }

    pub fn create_file(&self, parent_path: &str, filename: &str, content_ref: Option<ContentRef>) -> FsResult<FileEntry> {
        self.files.create(parent_path, filename, content_ref)
    }

    /// Store the payload, then create the file pointing at it. A payload whose
    /// file could not be created is released again.
    pub fn upload(&self, parent_path: &str, filename: &str, bytes: &[u8], content_type: Option<&str>) -> FsResult<FileEntry> {
        paths::validate_name(filename).map_err(|m| FsError::invalid("invalid_name", m))?;
        let content = self.content.put(bytes, content_type)?;
        match self.files.create(parent_path, filename, Some(content.clone())) {
            Ok(entry) => {
                info!(target: "docfs::content", "uploaded {} bytes to '{}' as {}", bytes.len(), entry.path(), content);
                Ok(entry)
            }
            Err(e) => {
                if let Err(release) = self.content.delete(&content) {
                    warn!(target: "docfs::content", "orphaned payload {} after rejected upload: {:#}", content, release);
                }
                Err(e)
            }
        }
    }

    /// Rename the entry at `path` within its parent; returns the new path.
    pub fn rename(&self, path: &str, new_name: &str) -> FsResult<String> {
        match self.resolve(path)? {
            DirEntry::Folder(folder) => Ok(self.folders.rename(&folder, new_name)?.path),
            DirEntry::File(entry) => Ok(self.files.rename(&entry, new_name)?.path()),
        }
    }

    pub fn delete(&self, path: &str) -> FsResult<()> {
        match self.resolve(path)? {
            DirEntry::Folder(folder) => self.folders.delete(&folder),
            DirEntry::File(entry) => self.files.delete(&entry),
        }
    }

    pub fn read_content(&self, path: &str) -> FsResult<ChunkReader> {
        let entry = self.resolve_file(path)?;
        self.files.read_content(&entry)
    }

    pub fn info(&self, path: &str) -> FsResult<EntryInfo> {
        let entry = self.resolve(path)?;
        Ok(self.info_of(&entry))
    }

    /// Describe an entry already in hand, without going back to the store.
    pub fn info_of(&self, entry: &DirEntry) -> EntryInfo {
        let mut info = EntryInfo {
            path: entry.path(),
            name: entry.name().to_string(),
            kind: entry.kind(),
            created_at: entry.created_at(),
            modified_at: entry.modified_at(),
            extension: None,
            size: None,
            content_type: None,
            width: None,
            height: None,
        };
        if let DirEntry::File(f) = entry {
            info.extension = f.extension().map(|s| s.to_string());
            info.width = f.file.width;
            info.height = f.file.height;
            if let Some(meta) = self.files.content_info(f) {
                info.size = Some(meta.size);
                info.content_type = meta.content_type;
            }
        }
        info
    }

    pub fn set_dimensions(&self, path: &str, width: u32, height: u32) -> FsResult<FileEntry> {
        let entry = self.resolve_file(path)?;
        self.files.set_dimensions(&entry, width, height)
    }

    pub fn rename_stats(&self) -> RenameStatsSnapshot { self.stats.snapshot() }
}

#[cfg(test)]
mod tests;
