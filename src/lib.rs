//!
//! docfs
//! -----
//! Hierarchical folder/file namespace over a flat, eventually-consistent
//! document store.
//!
//! - `paths`: pure path normalization.
//! - `storage`: the `EntityStore` and `ContentStore` seams plus in-process backends.
//! - `namespace`: folder and file repositories, the rename protocol, child listing.
//! - `command`: the closed operation table used by the HTTP adapter.
//! - `server`: Axum adapter.

pub mod command;
pub mod config;
pub mod error;
pub mod namespace;
pub mod paths;
pub mod server;
pub mod storage;
pub mod types;

pub use command::{dispatch, Command, Operation, Outcome, Reply};
pub use config::{NamespaceConfig, RenameMode, ServerConfig};
pub use error::{FsError, FsResult};
pub use namespace::Namespace;
pub use types::{ContentRef, DirEntry, EntryInfo, EntryKind, File, FileEntry, Folder};
