//! File lifecycle. A file's path is derived from its folder's path and its
//! filename, so renaming a file only rewrites `filename` and moving a folder
//! never touches its files.

use tracing::{debug, info, warn};

use crate::config::NamespaceConfig;
use crate::error::{FsError, FsResult};
use crate::namespace::folders::FolderRepository;
use crate::namespace::rename::{find_collision, RenameCoordinator, Strategy};
use crate::paths;
use crate::storage::{ChunkReader, ContentInfo, FileQuery, SharedContentStore, SharedStore};
use crate::types::{ContentRef, File, FileEntry, Folder, NewFile};

#[derive(Clone)]
pub struct FileRepository {
    store: SharedStore,
    content: SharedContentStore,
    folders: FolderRepository,
    renamer: RenameCoordinator,
    read_chunk_size: usize,
    scan_batch: usize,
}

impl FileRepository {
    pub fn new(
        store: SharedStore,
        content: SharedContentStore,
        folders: FolderRepository,
        config: &NamespaceConfig,
        renamer: RenameCoordinator,
    ) -> Self {
        Self {
            store,
            content,
            folders,
            renamer,
            read_chunk_size: config.read_chunk_size.max(1),
            scan_batch: config.scan_batch.max(1),
        }
    }

    fn not_found(path: &str) -> FsError {
        FsError::not_found("file_not_found", format!("File {} does not exist", path))
    }

    /// File named `filename` directly inside `folder`, if any.
    pub fn find_in(&self, folder: &Folder, filename: &str) -> FsResult<Option<File>> {
        let mut hits = self.store.query_files(&FileQuery::Named { folder_id: folder.id, filename: filename.to_string(), limit: usize::MAX })?;
        hits.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(hits.into_iter().next())
    }

    /// Resolve `path` by splitting at the last separator into folder path and filename.
    pub fn resolve(&self, path: &str) -> FsResult<FileEntry> {
        let norm = paths::normalize(path);
        let Some((folder_path, filename)) = paths::split_file_path(&norm) else {
            return Err(Self::not_found(&norm));
        };
        let folder = match self.folders.resolve(&folder_path) {
            Ok(f) => f,
            Err(e) if e.is_not_found() => return Err(Self::not_found(&norm)),
            Err(e) => return Err(e),
        };
        let file = self.find_in(&folder, &filename)?.ok_or_else(|| Self::not_found(&norm))?;
        debug!(target: "docfs::files", "resolve '{}' -> {}", norm, file.id);
        Ok(FileEntry { folder_path: folder.path, file })
    }

    /// Files directly inside `folder`, ordered by filename.
    pub fn list_in_folder(&self, folder: &Folder) -> FsResult<Vec<FileEntry>> {
        let mut out = Vec::new();
        let mut after: Option<String> = None;
        loop {
            let page = self.store.query_files(&FileQuery::InFolder { folder_id: folder.id, after: after.clone(), limit: self.scan_batch })?;
            let Some(last) = page.last() else { break; };
            after = Some(last.filename.clone());
            out.extend(page.into_iter().map(|file| FileEntry { folder_path: folder.path.clone(), file }));
        }
        debug!(target: "docfs::files", "list '{}': {} files", folder.path, out.len());
        Ok(out)
    }

    pub fn create(&self, parent_path: &str, filename: &str, content_ref: Option<ContentRef>) -> FsResult<FileEntry> {
        paths::validate_name(filename).map_err(|m| FsError::invalid("invalid_name", m))?;
        let folder = self.folders.resolve(parent_path)?;
        let path = paths::join(&folder.path, filename);
        if let Some(c) = find_collision(self.store.as_ref(), &path, None)? {
            return Err(FsError::already_exists("already_exists", c.detail));
        }
        let file = self.store.insert_file(NewFile {
            folder_id: folder.id,
            filename: filename.to_string(),
            content_ref,
            width: None,
            height: None,
        })?;
        if self.renamer.strategy() == Strategy::DetectAndCompensate {
            if let Some(c) = find_collision(self.store.as_ref(), &path, Some(&file.id))? {
                let ours = self.find_in(&folder, filename)?.map(|f| f.id) == Some(file.id)
                    && self.folders.find(&path)?.is_none();
                if !ours {
                    warn!(target: "docfs::files", "concurrent create of '{}' detected; removing {}", path, file.id);
                    self.store.delete_file(&file.id)?;
                    return Err(FsError::already_exists("already_exists", c.detail));
                }
            }
        }
        info!(target: "docfs::files", "created file '{}' ({})", path, file.id);
        Ok(FileEntry { folder_path: folder.path, file })
    }

    /// Rename within the same folder.
    pub fn rename(&self, entry: &FileEntry, new_name: &str) -> FsResult<FileEntry> {
        paths::validate_name(new_name).map_err(|m| FsError::invalid("invalid_name", m))?;
        let old_name = entry.file.filename.clone();
        if new_name == old_name { return Ok(entry.clone()); }
        let new_path = paths::join(&entry.folder_path, new_name);
        if let Some(c) = find_collision(self.store.as_ref(), &new_path, Some(&entry.file.id))? {
            return Err(FsError::already_exists("already_exists", c.detail));
        }

        let id = entry.file.id;
        self.renamer.rename(
            "file",
            &old_name,
            new_name,
            |value| self.store.update_file(&id, &mut |f: &mut File| f.filename = value.to_string()).map(|_| ()),
            || find_collision(self.store.as_ref(), &new_path, Some(&id)),
        )?;

        let file = self.store.get_file(&id)?.ok_or_else(|| Self::not_found(&new_path))?;
        Ok(FileEntry { folder_path: entry.folder_path.clone(), file })
    }

    /// Release the payload, then remove the record. A payload that cannot be
    /// released is logged as orphaned and does not block the delete.
    pub fn delete(&self, entry: &FileEntry) -> FsResult<()> {
        if let Some(content) = &entry.file.content_ref {
            if let Err(e) = self.content.delete(content) {
                warn!(target: "docfs::content", "orphaned payload {} of '{}': {:#}", content, entry.path(), e);
            }
        }
        if !self.store.delete_file(&entry.file.id)? {
            return Err(Self::not_found(&entry.path()));
        }
        info!(target: "docfs::files", "deleted file '{}' ({})", entry.path(), entry.file.id);
        Ok(())
    }

    /// Open the payload as a lazy chunk sequence.
    pub fn read_content(&self, entry: &FileEntry) -> FsResult<ChunkReader> {
        let Some(content) = &entry.file.content_ref else {
            return Err(FsError::invalid("no_content", format!("File {} has no content", entry.path())));
        };
        let reader = self.content.open(content)?;
        debug!(target: "docfs::content", "opened {} for '{}'", content, entry.path());
        Ok(ChunkReader::new(reader, self.read_chunk_size))
    }

    /// Size and content type of the payload. A payload the content store
    /// cannot describe reports as unknown rather than failing the caller.
    pub fn content_info(&self, entry: &FileEntry) -> Option<ContentInfo> {
        let content = entry.file.content_ref.as_ref()?;
        match self.content.stat(content) {
            Ok(info) => info,
            Err(e) => {
                warn!(target: "docfs::content", "cannot stat {} of '{}': {:#}", content, entry.path(), e);
                None
            }
        }
    }

    /// Record image dimensions reported by an external transform.
    pub fn set_dimensions(&self, entry: &FileEntry, width: u32, height: u32) -> FsResult<FileEntry> {
        let file = self.store.update_file(&entry.file.id, &mut |f: &mut File| {
            f.width = Some(width);
            f.height = Some(height);
        })?;
        info!(target: "docfs::files", "set dimensions of '{}' to {}x{}", entry.path(), width, height);
        Ok(FileEntry { folder_path: entry.folder_path.clone(), file })
    }
}
