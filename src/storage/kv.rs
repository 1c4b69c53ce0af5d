use std::collections::{BTreeMap, BTreeSet, HashMap as StdHashMap};
use std::ops::Bound;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::paths;
use crate::storage::keys::Keys;
use crate::storage::{EntityStore, FileQuery, FolderQuery, StoreCapabilities, StoreError, StoreResult};
use crate::types::{File, Folder, NewFile};

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct StoreSettings {
    /// Namespace prefix for document keys.
    pub name: String,
    /// Reject writes that would make two entities share a path. When false the
    /// store behaves like a plain document store and callers must detect
    /// collisions themselves.
    #[serde(default)]
    pub enforce_unique_paths: bool,
    /// Optional persistence settings loaded from `<store dir>/store.json`.
    #[serde(default)]
    pub persistence: Option<PersistenceSettings>,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self { name: "main".to_string(), enforce_unique_paths: false, persistence: Some(PersistenceSettings::default()) }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct PersistenceSettings {
    /// Enable periodic snapshotting of this store to disk
    #[serde(default)]
    pub enabled: bool,
    /// Interval in milliseconds between snapshots
    #[serde(default = "PersistenceSettings::default_interval_ms")]
    pub interval_ms: u64,
}

impl PersistenceSettings {
    fn default_interval_ms() -> u64 { 5_000 }
}

impl Default for PersistenceSettings {
    fn default() -> Self {
        Self { enabled: false, interval_ms: Self::default_interval_ms() }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug)]
enum Document {
    Folder(Folder),
    File(File),
}

#[derive(Serialize, Deserialize)]
struct SnapEntry { key: String, doc: Document }
#[derive(Serialize, Deserialize)]
struct Snapshot { version: u32, created_ms: i64, entries: Vec<SnapEntry> }

#[derive(Default)]
struct Inner {
    ns: String,
    docs: StdHashMap<String, Document>,
    /// path -> folder ids; a plain document store may hold duplicates.
    folder_paths: BTreeMap<String, BTreeSet<Uuid>>,
    /// (folder id, filename) -> file ids
    file_names: BTreeMap<(Uuid, String), BTreeSet<Uuid>>,
}

impl Inner {
    fn folder(&self, id: &Uuid) -> Option<&Folder> {
        match self.docs.get(&Keys::folder(&self.ns, id)) {
            Some(Document::Folder(f)) => Some(f),
            _ => None,
        }
    }

    fn file(&self, id: &Uuid) -> Option<&File> {
        match self.docs.get(&Keys::file(&self.ns, id)) {
            Some(Document::File(f)) => Some(f),
            _ => None,
        }
    }

    fn index(&mut self, doc: &Document) {
        match doc {
            Document::Folder(f) => { self.folder_paths.entry(f.path.clone()).or_default().insert(f.id); }
            Document::File(f) => { self.file_names.entry((f.folder_id, f.filename.clone())).or_default().insert(f.id); }
        }
    }

    fn unindex(&mut self, doc: &Document) {
        match doc {
            Document::Folder(f) => {
                if let Some(ids) = self.folder_paths.get_mut(&f.path) {
                    ids.remove(&f.id);
                    if ids.is_empty() { self.folder_paths.remove(&f.path); }
                }
            }
            Document::File(f) => {
                let k = (f.folder_id, f.filename.clone());
                if let Some(ids) = self.file_names.get_mut(&k) {
                    ids.remove(&f.id);
                    if ids.is_empty() { self.file_names.remove(&k); }
                }
            }
        }
    }

    fn put(&mut self, key: String, doc: Document) {
        if let Some(old) = self.docs.remove(&key) { self.unindex(&old); }
        self.index(&doc);
        self.docs.insert(key, doc);
    }

    fn remove(&mut self, key: &str) -> bool {
        match self.docs.remove(key) {
            Some(old) => { self.unindex(&old); true }
            None => false,
        }
    }

    /// True when some entity other than `except` occupies `path`, as a folder
    /// or as a file's derived path.
    fn path_taken(&self, path: &str, except: Option<&Uuid>) -> bool {
        let other = |ids: &BTreeSet<Uuid>| ids.iter().any(|id| Some(id) != except);
        if self.folder_paths.get(path).map(other).unwrap_or(false) {
            return true;
        }
        let Some((folder_path, filename)) = paths::split_file_path(path) else { return false; };
        let Some(folder_ids) = self.folder_paths.get(&folder_path) else { return false; };
        folder_ids.iter().any(|fid| {
            self.file_names.get(&(*fid, filename.clone())).map(other).unwrap_or(false)
        })
    }

    fn file_path(&self, file: &File) -> StoreResult<String> {
        let folder = self.folder(&file.folder_id).ok_or(StoreError::Missing { kind: "folder", id: file.folder_id })?;
        Ok(paths::join(&folder.path, &file.filename))
    }
}

/// A single named in-memory document store with ordered secondary indexes.
///
/// Single-entity transactions hold the write lock for the duration of the
/// mutation closure, so they are atomic per record. Queries read the indexes
/// directly and therefore never lag; callers still treat them as if they might.
#[derive(Clone)]
pub struct MemoryStore {
    settings: StoreSettings,
    dir: Option<PathBuf>,
    inner: Arc<parking_lot::RwLock<Inner>>,
    /// Guard to ensure we only spawn one persistence thread
    persist_started: Arc<parking_lot::Mutex<bool>>,
}

impl MemoryStore {
    /// Ephemeral store; nothing touches disk.
    pub fn new(settings: StoreSettings) -> Self {
        let inner = Inner { ns: settings.name.clone(), ..Default::default() };
        Self { settings, dir: None, inner: Arc::new(parking_lot::RwLock::new(inner)), persist_started: Arc::new(parking_lot::Mutex::new(false)) }
    }

    /// Store backed by a snapshot under `dir`; loads the snapshot if present and
    /// starts the persistence loop when enabled.
    pub fn open(dir: impl AsRef<Path>, settings: StoreSettings) -> StoreResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        let mut s = Self::new(settings);
        s.dir = Some(dir);
        s.load_snapshot()?;
        s.ensure_persistence_loop();
        Ok(s)
    }

    pub fn settings(&self) -> &StoreSettings { &self.settings }

    fn snapshot_path(&self) -> Option<PathBuf> { self.dir.as_ref().map(|d| d.join("snapshot.bin")) }

    fn ensure_persistence_loop(&self) {
        let mut started = self.persist_started.lock();
        if *started { return; }
        *started = true;
        drop(started);
        let Some(p) = self.settings.persistence.as_ref().filter(|p| p.enabled) else { return; };
        if self.dir.is_none() { return; }
        let interval = p.interval_ms;
        let this = self.clone();
        std::thread::spawn(move || loop {
            std::thread::sleep(std::time::Duration::from_millis(interval));
            if let Err(e) = this.save_snapshot() {
                warn!(target: "docfs::store", "periodic snapshot failed: {}", e);
            }
        });
    }

    /// Write all documents to `<dir>/snapshot.bin` via a temp file and rename.
    /// No-op for ephemeral stores.
    pub fn save_snapshot(&self) -> StoreResult<()> {
        let Some(path) = self.snapshot_path() else { return Ok(()); };
        let now_ms = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as i64).unwrap_or(0);
        let entries: Vec<SnapEntry> = self
            .inner
            .read()
            .docs
            .iter()
            .map(|(k, d)| SnapEntry { key: k.clone(), doc: d.clone() })
            .collect();
        let count = entries.len();
        let snap = Snapshot { version: 1, created_ms: now_ms, entries };
        let bytes = bincode::serialize(&snap).map_err(|e| StoreError::Codec(e.to_string()))?;
        let tmp = path.with_extension("bin.tmp");
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(tmp, &path)?;
        debug!(target: "docfs::store", "snapshot saved: {} documents -> {}", count, path.display());
        Ok(())
    }

    /// Replace in-memory state with the on-disk snapshot, if one exists.
    pub fn load_snapshot(&self) -> StoreResult<()> {
        let Some(path) = self.snapshot_path() else { return Ok(()); };
        if !path.exists() { return Ok(()); }
        let bytes = std::fs::read(&path)?;
        let snap: Snapshot = bincode::deserialize(&bytes).map_err(|e| StoreError::Codec(e.to_string()))?;
        let mut w = self.inner.write();
        w.docs.clear();
        w.folder_paths.clear();
        w.file_names.clear();
        for e in snap.entries.into_iter() {
            w.put(e.key, e.doc);
        }
        debug!(target: "docfs::store", "snapshot loaded: {} documents from {}", w.docs.len(), path.display());
        Ok(())
    }

    pub fn len(&self) -> usize { self.inner.read().docs.len() }
    pub fn is_empty(&self) -> bool { self.len() == 0 }
    /// Return a snapshot of all document keys in this store
    pub fn keys(&self) -> Vec<String> { self.inner.read().docs.keys().cloned().collect() }
    pub fn clear(&self) {
        let mut w = self.inner.write();
        w.docs.clear();
        w.folder_paths.clear();
        w.file_names.clear();
    }
}

impl EntityStore for MemoryStore {
    fn capabilities(&self) -> StoreCapabilities {
        StoreCapabilities { unique_paths: self.settings.enforce_unique_paths }
    }

    fn insert_folder(&self, path: &str) -> StoreResult<Folder> {
        let mut w = self.inner.write();
        if self.settings.enforce_unique_paths && w.path_taken(path, None) {
            return Err(StoreError::Conflict { path: path.to_string() });
        }
        let now = Utc::now();
        let folder = Folder { id: Uuid::new_v4(), path: path.to_string(), created_at: now, modified_at: now };
        let key = Keys::folder(&w.ns, &folder.id);
        w.put(key, Document::Folder(folder.clone()));
        Ok(folder)
    }

    fn get_folder(&self, id: &Uuid) -> StoreResult<Option<Folder>> {
        Ok(self.inner.read().folder(id).cloned())
    }

    fn query_folders(&self, query: &FolderQuery) -> StoreResult<Vec<Folder>> {
        let r = self.inner.read();
        let mut out = Vec::new();
        match query {
            FolderQuery::PathEq { path, limit } => {
                if let Some(ids) = r.folder_paths.get(path) {
                    out.extend(ids.iter().filter_map(|id| r.folder(id)).take(*limit).cloned());
                }
            }
            FolderQuery::PathAfter { after, limit } => {
                let range = r.folder_paths.range::<str, _>((Bound::Excluded(after.as_str()), Bound::Unbounded));
                for (_, ids) in range {
                    if out.len() >= *limit { break; }
                    out.extend(ids.iter().filter_map(|id| r.folder(id)).cloned());
                }
            }
        }
        Ok(out)
    }

    fn update_folder(&self, id: &Uuid, apply: &mut dyn FnMut(&mut Folder)) -> StoreResult<Folder> {
        let mut w = self.inner.write();
        let current = w.folder(id).cloned().ok_or(StoreError::Missing { kind: "folder", id: *id })?;
        let mut next = current.clone();
        apply(&mut next);
        next.id = current.id;
        next.created_at = current.created_at;
        next.modified_at = Utc::now();
        if self.settings.enforce_unique_paths && next.path != current.path && w.path_taken(&next.path, Some(id)) {
            return Err(StoreError::Conflict { path: next.path });
        }
        let key = Keys::folder(&w.ns, id);
        w.put(key, Document::Folder(next.clone()));
        Ok(next)
    }

    fn delete_folder(&self, id: &Uuid) -> StoreResult<bool> {
        let mut w = self.inner.write();
        let key = Keys::folder(&w.ns, id);
        Ok(w.remove(&key))
    }

    fn insert_file(&self, new: NewFile) -> StoreResult<File> {
        let mut w = self.inner.write();
        let now = Utc::now();
        let file = File {
            id: Uuid::new_v4(),
            folder_id: new.folder_id,
            filename: new.filename,
            width: new.width,
            height: new.height,
            content_ref: new.content_ref,
            created_at: now,
            modified_at: now,
        };
        if self.settings.enforce_unique_paths {
            let path = w.file_path(&file)?;
            if w.path_taken(&path, None) {
                return Err(StoreError::Conflict { path });
            }
        }
        let key = Keys::file(&w.ns, &file.id);
        w.put(key, Document::File(file.clone()));
        Ok(file)
    }

    fn get_file(&self, id: &Uuid) -> StoreResult<Option<File>> {
        Ok(self.inner.read().file(id).cloned())
    }

    fn query_files(&self, query: &FileQuery) -> StoreResult<Vec<File>> {
        let r = self.inner.read();
        let mut out = Vec::new();
        match query {
            FileQuery::InFolder { folder_id, after, limit } => {
                let start = match after {
                    Some(a) => Bound::Excluded((*folder_id, a.clone())),
                    None => Bound::Included((*folder_id, String::new())),
                };
                for ((fid, _), ids) in r.file_names.range((start, Bound::Unbounded)) {
                    if fid != folder_id || out.len() >= *limit { break; }
                    out.extend(ids.iter().filter_map(|id| r.file(id)).cloned());
                }
            }
            FileQuery::Named { folder_id, filename, limit } => {
                if let Some(ids) = r.file_names.get(&(*folder_id, filename.clone())) {
                    out.extend(ids.iter().filter_map(|id| r.file(id)).take(*limit).cloned());
                }
            }
        }
        Ok(out)
    }

    fn update_file(&self, id: &Uuid, apply: &mut dyn FnMut(&mut File)) -> StoreResult<File> {
        let mut w = self.inner.write();
        let current = w.file(id).cloned().ok_or(StoreError::Missing { kind: "file", id: *id })?;
        let mut next = current.clone();
        apply(&mut next);
        next.id = current.id;
        next.created_at = current.created_at;
        next.modified_at = Utc::now();
        let moved = next.filename != current.filename || next.folder_id != current.folder_id;
        if self.settings.enforce_unique_paths && moved {
            let path = w.file_path(&next)?;
            if w.path_taken(&path, Some(id)) {
                return Err(StoreError::Conflict { path });
            }
        }
        let key = Keys::file(&w.ns, id);
        w.put(key, Document::File(next.clone()));
        Ok(next)
    }

    fn delete_file(&self, id: &Uuid) -> StoreResult<bool> {
        let mut w = self.inner.write();
        let key = Keys::file(&w.ns, id);
        Ok(w.remove(&key))
    }
}
