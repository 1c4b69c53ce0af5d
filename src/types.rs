//! Core namespace data contracts (records persisted in the document store)
//! Keep this module purely about types/serde and light helpers.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::paths;

/// Opaque handle to a payload held by a `ContentStore`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentRef(String);

impl ContentRef {
    pub fn new(s: impl Into<String>) -> Self { Self(s.into()) }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for ContentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Folder {
    pub id: Uuid,
    pub path: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl Folder {
    pub fn name(&self) -> &str { paths::base_name(&self.path) }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct File {
    pub id: Uuid,
    /// Owning folder; files follow their folder across renames.
    pub folder_id: Uuid,
    pub filename: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub content_ref: Option<ContentRef>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

/// Fields a caller supplies when creating a file; the store assigns id and timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct NewFile {
    pub folder_id: Uuid,
    pub filename: String,
    pub content_ref: Option<ContentRef>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// A file together with the path of the folder it was resolved through.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileEntry {
    pub folder_path: String,
    pub file: File,
}

impl FileEntry {
    pub fn path(&self) -> String { paths::join(&self.folder_path, &self.file.filename) }
    pub fn name(&self) -> &str { &self.file.filename }
    pub fn extension(&self) -> Option<&str> { paths::extension(&self.file.filename) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Folder,
    File,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::Folder => write!(f, "Folder"),
            EntryKind::File => write!(f, "File"),
        }
    }
}

/// One node of the namespace.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DirEntry {
    Folder(Folder),
    File(FileEntry),
}

impl DirEntry {
    pub fn kind(&self) -> EntryKind {
        match self {
            DirEntry::Folder(_) => EntryKind::Folder,
            DirEntry::File(_) => EntryKind::File,
        }
    }

    pub fn is_folder(&self) -> bool { matches!(self, DirEntry::Folder(_)) }

    pub fn path(&self) -> String {
        match self {
            DirEntry::Folder(d) => d.path.clone(),
            DirEntry::File(f) => f.path(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            DirEntry::Folder(d) => d.name(),
            DirEntry::File(f) => f.name(),
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            DirEntry::Folder(d) => d.created_at,
            DirEntry::File(f) => f.file.created_at,
        }
    }

    pub fn modified_at(&self) -> DateTime<Utc> {
        match self {
            DirEntry::Folder(d) => d.modified_at,
            DirEntry::File(f) => f.file.modified_at,
        }
    }
}

/// Descriptive view of an entry, the shape returned by `info`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntryInfo {
    pub path: String,
    pub name: String,
    pub kind: EntryKind,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    #[serde(default)]
    pub extension: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}
