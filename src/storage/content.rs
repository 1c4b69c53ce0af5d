//! Payload storage seam. The namespace only ever holds an opaque `ContentRef`;
//! bytes live behind a `ContentStore`, read back as a finite chunk sequence.

use std::collections::HashMap;
use std::fmt;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::storage::keys::Keys;
use crate::types::ContentRef;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentInfo {
    pub size: u64,
    #[serde(default)]
    pub content_type: Option<String>,
}

/// External binary-object store. Each payload is owned by exactly one File.
pub trait ContentStore: Send + Sync {
    fn put(&self, bytes: &[u8], content_type: Option<&str>) -> Result<ContentRef>;
    fn stat(&self, content: &ContentRef) -> Result<Option<ContentInfo>>;
    fn open(&self, content: &ContentRef) -> Result<Box<dyn Read + Send>>;
    fn delete(&self, content: &ContentRef) -> Result<()>;
}

pub type SharedContentStore = Arc<dyn ContentStore>;

/// Lazy, finite sequence of byte chunks over an opened payload.
/// Every chunk is `chunk_size` bytes except possibly the last; once exhausted
/// the reader stays exhausted and must be reopened to read again.
pub struct ChunkReader {
    inner: Box<dyn Read + Send>,
    chunk_size: usize,
    done: bool,
}

impl ChunkReader {
    pub fn new(inner: Box<dyn Read + Send>, chunk_size: usize) -> Self {
        Self { inner, chunk_size: chunk_size.max(1), done: false }
    }

    pub fn chunk_size(&self) -> usize { self.chunk_size }

    /// Drain the remaining chunks into one buffer.
    pub fn read_all(self) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        for chunk in self {
            out.extend_from_slice(&chunk?);
        }
        Ok(out)
    }
}

impl fmt::Debug for ChunkReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkReader").field("chunk_size", &self.chunk_size).field("done", &self.done).finish()
    }
}

impl Iterator for ChunkReader {
    type Item = io::Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done { return None; }
        let mut buf = vec![0u8; self.chunk_size];
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
        if filled < buf.len() { self.done = true; }
        if filled == 0 { return None; }
        buf.truncate(filled);
        Some(Ok(buf))
    }
}

#[derive(Clone)]
struct Blob {
    bytes: Arc<[u8]>,
    content_type: Option<String>,
}

/// In-memory payload store keyed by namespaced blob keys.
#[derive(Clone)]
pub struct MemoryContentStore {
    ns: String,
    blobs: Arc<parking_lot::RwLock<HashMap<String, Blob>>>,
}

impl MemoryContentStore {
    pub fn new(ns: impl Into<String>) -> Self {
        Self { ns: ns.into(), blobs: Arc::new(parking_lot::RwLock::new(HashMap::new())) }
    }

    pub fn len(&self) -> usize { self.blobs.read().len() }
    pub fn is_empty(&self) -> bool { self.len() == 0 }
    pub fn contains(&self, content: &ContentRef) -> bool { self.blobs.read().contains_key(content.as_str()) }
}

impl ContentStore for MemoryContentStore {
    fn put(&self, bytes: &[u8], content_type: Option<&str>) -> Result<ContentRef> {
        let key = Keys::blob(&self.ns, &Uuid::new_v4());
        let blob = Blob { bytes: Arc::from(bytes), content_type: content_type.map(|s| s.to_string()) };
        self.blobs.write().insert(key.clone(), blob);
        Ok(ContentRef::new(key))
    }

    fn stat(&self, content: &ContentRef) -> Result<Option<ContentInfo>> {
        Ok(self.blobs.read().get(content.as_str()).map(|b| ContentInfo { size: b.bytes.len() as u64, content_type: b.content_type.clone() }))
    }

    fn open(&self, content: &ContentRef) -> Result<Box<dyn Read + Send>> {
        let Some(blob) = self.blobs.read().get(content.as_str()).cloned() else {
            bail!("content {} not found", content);
        };
        Ok(Box::new(io::Cursor::new(blob.bytes)))
    }

    fn delete(&self, content: &ContentRef) -> Result<()> {
        if self.blobs.write().remove(content.as_str()).is_none() {
            bail!("content {} not found", content);
        }
        Ok(())
    }
}

/// Directory-backed payload store: `<dir>/<uuid>` holds the bytes and
/// `<dir>/<uuid>.json` the `ContentInfo` sidecar.
#[derive(Clone)]
pub struct DirContentStore {
    ns: String,
    dir: PathBuf,
}

impl DirContentStore {
    pub fn open(dir: impl AsRef<Path>, ns: impl Into<String>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir).with_context(|| format!("creating content dir {}", dir.display()))?;
        Ok(Self { ns: ns.into(), dir })
    }

    fn locate(&self, content: &ContentRef) -> Result<(PathBuf, PathBuf)> {
        let id = Keys::id_from(content.as_str(), &Keys::blob_prefix(&self.ns))
            .with_context(|| format!("content ref {} does not belong to store {}", content, self.ns))?;
        let data = self.dir.join(id.to_string());
        let meta = self.dir.join(format!("{}.json", id));
        Ok((data, meta))
    }

    /// Write the payload, then its sidecar. A failed sidecar write removes the
    /// payload again.
    fn write_blob(data: &Path, meta: &Path, bytes: &[u8], info: &ContentInfo) -> Result<()> {
        let tmp = data.with_extension("tmp");
        std::fs::write(&tmp, bytes).with_context(|| format!("writing {}", tmp.display()))?;
        std::fs::rename(&tmp, data).with_context(|| format!("moving {} into place", tmp.display()))?;
        let sidecar = serde_json::to_vec(info)
            .map_err(anyhow::Error::from)
            .and_then(|json| std::fs::write(meta, json).with_context(|| format!("writing {}", meta.display())));
        if let Err(e) = sidecar {
            if let Err(cleanup) = std::fs::remove_file(data) {
                warn!(target: "docfs::content", "orphaned payload {} after sidecar failure: {}", data.display(), cleanup);
            }
            return Err(e);
        }
        Ok(())
    }
}

impl ContentStore for DirContentStore {
    fn put(&self, bytes: &[u8], content_type: Option<&str>) -> Result<ContentRef> {
        let content = ContentRef::new(Keys::blob(&self.ns, &Uuid::new_v4()));
        let (data, meta) = self.locate(&content)?;
        let info = ContentInfo { size: bytes.len() as u64, content_type: content_type.map(|s| s.to_string()) };
        Self::write_blob(&data, &meta, bytes, &info)?;
        Ok(content)
    }

    fn stat(&self, content: &ContentRef) -> Result<Option<ContentInfo>> {
        // Refs minted elsewhere have no payload here.
        let Ok((_, meta)) = self.locate(content) else { return Ok(None); };
        if !meta.exists() { return Ok(None); }
        let info: ContentInfo = serde_json::from_slice(&std::fs::read(&meta)?)?;
        Ok(Some(info))
    }

    fn open(&self, content: &ContentRef) -> Result<Box<dyn Read + Send>> {
        let (data, _) = self.locate(content)?;
        let f = std::fs::File::open(&data).with_context(|| format!("opening content {}", content))?;
        Ok(Box::new(io::BufReader::new(f)))
    }

    fn delete(&self, content: &ContentRef) -> Result<()> {
        let (data, meta) = self.locate(content)?;
        std::fs::remove_file(&data).with_context(|| format!("deleting content {}", content))?;
        match std::fs::remove_file(&meta) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(target: "docfs::content", "stale sidecar {} left for {}: {}", meta.display(), content, e),
        }
        Ok(())
    }
}
