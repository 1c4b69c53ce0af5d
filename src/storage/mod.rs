//!
//! docfs storage module
//! --------------------
//! Thin abstraction over the backing document store. The only strong guarantee a
//! backend must offer is the single-entity transaction (`update_folder` /
//! `update_file`); equality and range queries may lag writes on eventually
//! consistent backends.
//!
//! Key responsibilities:
//! - Folder and File records with store-generated ids and timestamps.
//! - Equality queries (`PathEq`, `Named`) and ordered range queries
//!   (`PathAfter`, `InFolder`) that callers page through with a cursor.
//! - Advertising whether the backend can enforce namespace uniqueness itself.
//!
//! Payload bytes never live here; see `content` for the `ContentStore` seam.

use std::sync::Arc;

use uuid::Uuid;

use crate::types::{File, Folder, NewFile};

pub mod content;
pub mod keys;
pub mod kv;

pub use content::{ChunkReader, ContentInfo, ContentStore, DirContentStore, MemoryContentStore, SharedContentStore};
pub use kv::{MemoryStore, PersistenceSettings, StoreSettings};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{kind} {id} does not exist")]
    Missing { kind: &'static str, id: Uuid },
    #[error("path {path} collides with an existing entity")]
    Conflict { path: String },
    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store codec error: {0}")]
    Codec(String),
    #[error("store backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// What a backend guarantees beyond single-entity transactions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCapabilities {
    /// Writes that would make two entities share a namespace path are
    /// rejected with `StoreError::Conflict`.
    pub unique_paths: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FolderQuery {
    /// Folders whose path equals `path` exactly.
    PathEq { path: String, limit: usize },
    /// Folders with path strictly greater than `after`, ascending by path.
    /// A page never splits a group of folders sharing one path, so it may
    /// exceed `limit` by the size of its last group.
    PathAfter { after: String, limit: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileQuery {
    /// Files of a folder ordered by filename, starting strictly after `after`.
    InFolder { folder_id: Uuid, after: Option<String>, limit: usize },
    /// Files of a folder with exactly this filename.
    Named { folder_id: Uuid, filename: String, limit: usize },
}

/// Backing document store. Implementations must be safe to share across threads;
/// all coordination state lives in the store, none in the caller.
pub trait EntityStore: Send + Sync {
    fn capabilities(&self) -> StoreCapabilities;

    fn insert_folder(&self, path: &str) -> StoreResult<Folder>;
    fn get_folder(&self, id: &Uuid) -> StoreResult<Option<Folder>>;
    fn query_folders(&self, query: &FolderQuery) -> StoreResult<Vec<Folder>>;
    /// Single-entity transaction: read, mutate, stamp `modified_at`, persist.
    fn update_folder(&self, id: &Uuid, apply: &mut dyn FnMut(&mut Folder)) -> StoreResult<Folder>;
    fn delete_folder(&self, id: &Uuid) -> StoreResult<bool>;

    fn insert_file(&self, new: NewFile) -> StoreResult<File>;
    fn get_file(&self, id: &Uuid) -> StoreResult<Option<File>>;
    fn query_files(&self, query: &FileQuery) -> StoreResult<Vec<File>>;
    /// Single-entity transaction: read, mutate, stamp `modified_at`, persist.
    fn update_file(&self, id: &Uuid, apply: &mut dyn FnMut(&mut File)) -> StoreResult<File>;
    fn delete_file(&self, id: &Uuid) -> StoreResult<bool>;
}

pub type SharedStore = Arc<dyn EntityStore>;
