use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use uuid::Uuid;

use super::*;
use crate::config::RenameMode;
use crate::storage::{
    EntityStore, FileQuery, FolderQuery, MemoryContentStore, MemoryStore, StoreCapabilities, StoreError, StoreResult,
    StoreSettings,
};
use crate::types::{File, NewFile};

mod folder_tests;

/// Wraps a `MemoryStore` to imitate an eventually consistent backend: equality
/// queries can be made to miss fresh writes, and updates can be made to fail.
pub(crate) struct LaggyStore {
    inner: MemoryStore,
    /// Number of upcoming equality queries that return nothing.
    blind_queries: AtomicUsize,
    /// Updates allowed to succeed before every further update fails.
    updates_before_failure: AtomicUsize,
    /// Delete the first file of the next non-empty folder listing once it has been read.
    vanish_listed_file: AtomicBool,
}

impl LaggyStore {
    pub(crate) fn new() -> Self {
        Self {
            inner: MemoryStore::new(StoreSettings { persistence: None, ..Default::default() }),
            blind_queries: AtomicUsize::new(0),
            updates_before_failure: AtomicUsize::new(usize::MAX),
            vanish_listed_file: AtomicBool::new(false),
        }
    }

    pub(crate) fn blind_next(&self, n: usize) { self.blind_queries.store(n, Ordering::SeqCst); }

    pub(crate) fn fail_updates_after(&self, n: usize) { self.updates_before_failure.store(n, Ordering::SeqCst); }

    pub(crate) fn vanish_next_listed_file(&self) { self.vanish_listed_file.store(true, Ordering::SeqCst); }

    fn blind(&self) -> bool {
        self.blind_queries.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)).is_ok()
    }

    fn allow_update(&self) -> StoreResult<()> {
        match self.updates_before_failure.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)) {
            Ok(_) => Ok(()),
            Err(_) => Err(StoreError::Backend("injected update failure".into())),
        }
    }
}

impl EntityStore for LaggyStore {
    fn capabilities(&self) -> StoreCapabilities { StoreCapabilities { unique_paths: false } }

    fn insert_folder(&self, path: &str) -> StoreResult<Folder> { self.inner.insert_folder(path) }
    fn get_folder(&self, id: &Uuid) -> StoreResult<Option<Folder>> { self.inner.get_folder(id) }
    fn query_folders(&self, query: &FolderQuery) -> StoreResult<Vec<Folder>> {
        if matches!(query, FolderQuery::PathEq { .. }) && self.blind() {
            return Ok(Vec::new());
        }
        self.inner.query_folders(query)
    }
    fn update_folder(&self, id: &Uuid, apply: &mut dyn FnMut(&mut Folder)) -> StoreResult<Folder> {
        self.allow_update()?;
        self.inner.update_folder(id, apply)
    }
    fn delete_folder(&self, id: &Uuid) -> StoreResult<bool> { self.inner.delete_folder(id) }

    fn insert_file(&self, new: NewFile) -> StoreResult<File> { self.inner.insert_file(new) }
    fn get_file(&self, id: &Uuid) -> StoreResult<Option<File>> { self.inner.get_file(id) }
    fn query_files(&self, query: &FileQuery) -> StoreResult<Vec<File>> {
        if matches!(query, FileQuery::Named { .. }) && self.blind() {
            return Ok(Vec::new());
        }
        let files = self.inner.query_files(query)?;
        if matches!(query, FileQuery::InFolder { .. }) && !files.is_empty() && self.vanish_listed_file.swap(false, Ordering::SeqCst) {
            self.inner.delete_file(&files[0].id)?;
        }
        Ok(files)
    }
    fn update_file(&self, id: &Uuid, apply: &mut dyn FnMut(&mut File)) -> StoreResult<File> {
        self.allow_update()?;
        self.inner.update_file(id, apply)
    }
    fn delete_file(&self, id: &Uuid) -> StoreResult<bool> { self.inner.delete_file(id) }
}

pub(crate) struct Fixture {
    pub ns: Namespace,
    pub content: Arc<MemoryContentStore>,
}

pub(crate) fn fixture_with(store: SharedStore, config: NamespaceConfig) -> Fixture {
    let content = Arc::new(MemoryContentStore::new("test"));
    let ns = Namespace::open(store, content.clone(), config).unwrap();
    Fixture { ns, content }
}

/// Plain store, detect-and-compensate renames, root at "/".
pub(crate) fn fixture() -> Fixture {
    let store = Arc::new(MemoryStore::new(StoreSettings { persistence: None, ..Default::default() }));
    fixture_with(store, NamespaceConfig::default())
}

/// Store that enforces unique paths, conditional-write renames.
pub(crate) fn unique_fixture() -> Fixture {
    let store = Arc::new(MemoryStore::new(StoreSettings { enforce_unique_paths: true, persistence: None, ..Default::default() }));
    fixture_with(store, NamespaceConfig { rename_mode: RenameMode::Auto, ..Default::default() })
}

pub(crate) fn laggy_fixture() -> (Fixture, Arc<LaggyStore>) {
    let store = Arc::new(LaggyStore::new());
    let fx = fixture_with(store.clone(), NamespaceConfig::default());
    (fx, store)
}

pub(crate) fn paths_of(entries: &[DirEntry]) -> Vec<String> {
    entries.iter().map(|e| e.path()).collect()
}
