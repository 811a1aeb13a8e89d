//! Directory layer
//!
//! A directory is an inode whose content is a serialized table of
//! name to inode-reference entries, with a parent back-reference and a
//! fixed entry capacity chosen at creation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use hal::{BlockDevice, SECTOR_SIZE};

use crate::error::{FilesysError, FsResult};
use crate::inode::{InodeKind, InodeRef};
use crate::volume::Volume;
use crate::ROOT_DIR_SECTOR;

/// Initial entry capacity of a newly created directory
pub const DIR_INITIAL_CAPACITY: u32 = 16;

/// A single name to sector mapping within a directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    /// Entry name
    pub name: String,
    /// Sector of the entry's inode
    pub sector: u64,
    /// Kind recorded for the entry's inode
    pub kind: InodeKind,
}

/// On-disk directory content, serialized into the directory inode's data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct DiskDirectory {
    /// Inumber of the containing directory
    pub(crate) parent: u64,
    /// Maximum number of entries
    pub(crate) capacity: u32,
    /// Entries keyed by name
    pub(crate) entries: BTreeMap<String, DirEntry>,
}

impl DiskDirectory {
    fn new(parent: u64, capacity: u32) -> Self {
        Self {
            parent,
            capacity,
            entries: BTreeMap::new(),
        }
    }
}

/// Open handle on a directory
///
/// Exclusively owned by whichever step currently holds it; closing
/// consumes the handle, so a handle cannot be released twice.
/// Duplication only happens through an explicit reopen.
#[derive(Debug)]
pub struct DirHandle {
    sector: u64,
}

impl DirHandle {
    pub(crate) fn new(sector: u64) -> Self {
        Self { sector }
    }

    /// Inumber of the backing inode
    pub fn inumber(&self) -> u64 {
        self.sector
    }
}

impl<D: BlockDevice> Volume<D> {
    /// Creates directory content at `sector` with the given entry
    /// capacity, recording `parent` as the new directory's back-reference
    ///
    /// On failure everything allocated here is released again; the
    /// caller keeps ownership of `sector` itself.
    pub(crate) fn dir_create(&mut self, sector: u64, capacity: u32, parent: u64) -> FsResult<()> {
        self.inode_create(InodeKind::Directory, sector, SECTOR_SIZE as u64)?;

        if let Err(e) = self.dir_init(sector, capacity, parent) {
            if let Err(error) = self
                .inodes
                .release_data(&mut self.cache, &mut self.free_map, sector)
            {
                tracing::warn!(%error, sector, "could not release directory data after failed create");
            }
            return Err(e);
        }
        Ok(())
    }

    fn dir_init(&mut self, sector: u64, capacity: u32, parent: u64) -> FsResult<()> {
        self.inode_open(sector)?;
        let content = DiskDirectory::new(parent, capacity);
        let written = self.write_directory(sector, &content);
        let closed = self.inode_close(sector);
        written.and(closed)
    }

    /// Opens the directory at `sector`
    pub(crate) fn dir_open(&mut self, sector: u64) -> FsResult<DirHandle> {
        let inode = self.inode_open(sector)?;
        match inode.kind {
            InodeKind::Directory => Ok(DirHandle::new(sector)),
            InodeKind::File => {
                self.inode_close(sector)?;
                Err(FilesysError::PathNotFound(format!(
                    "inode {sector} is not a directory"
                )))
            }
        }
    }

    /// Opens the root directory
    pub(crate) fn dir_open_root(&mut self) -> FsResult<DirHandle> {
        self.dir_open(ROOT_DIR_SECTOR)
    }

    /// Duplicates an open directory handle
    pub(crate) fn dir_reopen(&mut self, dir: &DirHandle) -> FsResult<DirHandle> {
        self.dir_open(dir.inumber())
    }

    /// Closes a directory handle, consuming it
    pub(crate) fn dir_close(&mut self, dir: DirHandle) -> FsResult<()> {
        self.inode_close(dir.inumber())
    }

    /// Looks up `name`, yielding the entry's inode reference if present
    pub(crate) fn dir_lookup(&mut self, dir: &DirHandle, name: &str) -> FsResult<Option<InodeRef>> {
        let content = self.read_directory(dir.inumber())?;
        Ok(content.entries.get(name).map(|entry| InodeRef {
            sector: entry.sector,
            kind: entry.kind,
        }))
    }

    /// Adds a name to sector entry
    pub(crate) fn dir_add(
        &mut self,
        dir: &DirHandle,
        name: &str,
        sector: u64,
        kind: InodeKind,
    ) -> FsResult<()> {
        let mut content = self.read_directory(dir.inumber())?;
        if content.entries.contains_key(name) {
            return Err(FilesysError::DuplicateName(name.to_string()));
        }
        if content.entries.len() as u32 >= content.capacity {
            return Err(FilesysError::AllocationFailure(format!(
                "directory {} is full",
                dir.inumber()
            )));
        }

        content.entries.insert(
            name.to_string(),
            DirEntry {
                name: name.to_string(),
                sector,
                kind,
            },
        );
        self.write_directory(dir.inumber(), &content)
    }

    /// Removes the entry named `name` and marks its inode for removal
    ///
    /// The inode's storage is released when its last handle closes. A
    /// directory entry is only removed while empty.
    pub(crate) fn dir_remove(&mut self, dir: &DirHandle, name: &str) -> FsResult<()> {
        let mut content = self.read_directory(dir.inumber())?;
        let Some(entry) = content.entries.get(name) else {
            return Err(FilesysError::PathNotFound(name.to_string()));
        };

        let target = entry.sector;
        if entry.kind == InodeKind::Directory {
            self.inode_open(target)?;
            let child = self.read_directory(target);
            self.inode_close(target)?;
            if !child?.entries.is_empty() {
                return Err(FilesysError::DirectoryNotEmpty(name.to_string()));
            }
        }

        content.entries.remove(name);
        self.write_directory(dir.inumber(), &content)?;

        self.inode_open(target)?;
        self.inodes.mark_removed(target);
        self.inode_close(target)
    }

    /// Lists the directory's entries
    pub(crate) fn dir_entries(&mut self, dir: &DirHandle) -> FsResult<Vec<DirEntry>> {
        Ok(self
            .read_directory(dir.inumber())?
            .entries
            .into_values()
            .collect())
    }

    /// Inumber of a directory's parent
    pub(crate) fn dir_parent(&mut self, dir: &DirHandle) -> FsResult<u64> {
        Ok(self.read_directory(dir.inumber())?.parent)
    }

    fn read_directory(&mut self, sector: u64) -> FsResult<DiskDirectory> {
        let data = self.inodes.read_data(&mut self.cache, sector)?;
        let json_end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
        serde_json::from_slice(&data[..json_end]).map_err(|e| {
            FilesysError::InvalidVolume(format!("directory {sector} parse failed: {e}"))
        })
    }

    fn write_directory(&mut self, sector: u64, content: &DiskDirectory) -> FsResult<()> {
        let json = serde_json::to_vec(content)
            .map_err(|e| FilesysError::InvalidVolume(format!("directory serialize failed: {e}")))?;
        self.inodes.write_data(&mut self.cache, sector, &json)
    }
}
