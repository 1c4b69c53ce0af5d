use crate::error::FsResult;
use crate::namespace::files::FileRepository;
use crate::namespace::folders::FolderRepository;
use crate::types::{DirEntry, Folder};

/// Lists the direct children of a folder.
#[derive(Clone)]
pub struct HierarchyWalker {
    folders: FolderRepository,
    files: FileRepository,
}

impl HierarchyWalker {
    pub fn new(folders: FolderRepository, files: FileRepository) -> Self { Self { folders, files } }

    /// Child folders ordered by path, then child files ordered by filename.
    /// The two groups are never interleaved by name.
    pub fn children(&self, folder: &Folder) -> FsResult<Vec<DirEntry>> {
        let mut out: Vec<DirEntry> = self.folders.list_child_folders(folder)?.into_iter().map(DirEntry::Folder).collect();
        out.extend(self.files.list_in_folder(folder)?.into_iter().map(DirEntry::File));
        Ok(out)
    }
}
