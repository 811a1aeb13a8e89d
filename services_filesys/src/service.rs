//! File-system service
//!
//! Owns the volume state and provides bring-up, teardown, and the file
//! handle operations. The path operations themselves live in the
//! operations module.

use tracing::{info, warn};

use hal::{BlockDevice, BoxedBlockDevice, DeviceRegistry, DeviceRole};

use crate::cache::BlockCache;
use crate::directory::{DirHandle, DIR_INITIAL_CAPACITY};
use crate::error::{FilesysError, FsResult};
use crate::free_map::FreeMap;
use crate::inode::{InodeKind, InodeTable};
use crate::volume::Volume;
use crate::ROOT_DIR_SECTOR;

/// Open handle on a file
#[derive(Debug)]
pub struct FileHandle {
    pub(crate) sector: u64,
}

impl FileHandle {
    /// Inumber of the backing inode
    pub fn inumber(&self) -> u64 {
        self.sector
    }
}

/// Handle returned by open; the variant reports the inode's kind
#[derive(Debug)]
pub enum OpenHandle {
    /// The path named a file
    File(FileHandle),
    /// The path named a directory
    Directory(DirHandle),
}

impl OpenHandle {
    /// Kind of the opened inode
    pub fn kind(&self) -> InodeKind {
        match self {
            OpenHandle::File(_) => InodeKind::File,
            OpenHandle::Directory(_) => InodeKind::Directory,
        }
    }

    /// Inumber of the opened inode
    pub fn inumber(&self) -> u64 {
        match self {
            OpenHandle::File(file) => file.inumber(),
            OpenHandle::Directory(dir) => dir.inumber(),
        }
    }
}

/// The file-system service
///
/// One instance per mounted volume. Operations take the calling
/// context's `ExecContext` explicitly.
pub struct FilesysService<D: BlockDevice> {
    pub(crate) volume: Volume<D>,
}

impl FilesysService<BoxedBlockDevice> {
    /// Selects the device registered as the file-system volume and
    /// mounts it
    ///
    /// # Panics
    ///
    /// Panics if no device is registered for `DeviceRole::Filesys`; the
    /// system cannot run without its volume.
    pub fn initialize(devices: &mut DeviceRegistry, format: bool) -> FsResult<Self> {
        let Some(device) = devices.take(DeviceRole::Filesys) else {
            panic!("no file system device found, can't initialize file system");
        };
        Self::mount(device, format)
    }
}

impl<D: BlockDevice> FilesysService<D> {
    /// Mounts a volume on `device`, formatting it first when requested
    ///
    /// Formatting writes an empty free map and creates the root
    /// directory at its fixed sector; the free map is then reopened from
    /// disk either way.
    ///
    /// # Panics
    ///
    /// Panics if root directory creation fails during a format; the
    /// volume would be unusable.
    pub fn mount(device: D, format: bool) -> FsResult<Self> {
        let cache = BlockCache::new(device);
        let total_sectors = cache.sector_count();
        let mut volume = Volume {
            cache,
            free_map: FreeMap::new(total_sectors),
            inodes: InodeTable::new(),
        };

        if format {
            Self::do_format(&mut volume)?;
        }

        volume.free_map = FreeMap::load(&mut volume.cache)?;
        info!(total_sectors, "file system mounted");
        Ok(Self { volume })
    }

    /// Formats the volume: empty free map, fresh root directory
    fn do_format(volume: &mut Volume<D>) -> FsResult<()> {
        info!("formatting file system");
        volume.free_map = FreeMap::create(volume.cache.sector_count());

        if let Err(e) = volume.dir_create(ROOT_DIR_SECTOR, DIR_INITIAL_CAPACITY, ROOT_DIR_SECTOR) {
            panic!("root directory creation failed: {e}");
        }

        volume.free_map.save(&mut volume.cache)
    }

    /// Shuts the service down: writes back the free map, flushes the
    /// cache, and returns the device
    pub fn shutdown(mut self) -> FsResult<D> {
        self.volume.free_map.save(&mut self.volume.cache)?;
        self.volume.cache.flush()?;
        info!("file system shut down");
        Ok(self.volume.cache.into_inner())
    }

    /// Number of free sectors on the volume
    pub fn free_sectors(&self) -> u64 {
        self.volume.free_map.free_count()
    }

    /// Length in bytes of an open file
    pub fn file_length(&self, handle: &FileHandle) -> FsResult<u64> {
        self.volume.inodes.length(handle.sector).ok_or_else(|| {
            FilesysError::InvalidVolume(format!("file inode {} is not open", handle.sector))
        })
    }

    /// Reads from an open file at `offset`; returns the bytes read,
    /// bounded by the file's length
    pub fn file_read_at(
        &mut self,
        handle: &FileHandle,
        offset: u64,
        buffer: &mut [u8],
    ) -> FsResult<usize> {
        self.volume
            .inodes
            .read_data_at(&mut self.volume.cache, handle.sector, offset, buffer)
    }

    /// Writes to an open file at `offset`; returns the bytes written,
    /// bounded by the file's length
    pub fn file_write_at(
        &mut self,
        handle: &FileHandle,
        offset: u64,
        data: &[u8],
    ) -> FsResult<usize> {
        self.volume
            .inodes
            .write_data_at(&mut self.volume.cache, handle.sector, offset, data)
    }

    /// Closes a file handle, consuming it
    pub fn close_file(&mut self, handle: FileHandle) -> FsResult<()> {
        self.volume.inode_close(handle.sector)
    }

    /// Closes a directory handle, consuming it
    pub fn close_dir(&mut self, handle: DirHandle) -> FsResult<()> {
        self.volume.dir_close(handle)
    }

    /// Closes whichever handle open returned
    pub fn close_handle(&mut self, handle: OpenHandle) -> FsResult<()> {
        match handle {
            OpenHandle::File(file) => self.close_file(file),
            OpenHandle::Directory(dir) => self.close_dir(dir),
        }
    }

    pub(crate) fn file_open(&mut self, sector: u64) -> FsResult<FileHandle> {
        let inode = self.volume.inode_open(sector)?;
        match inode.kind {
            InodeKind::File => Ok(FileHandle { sector }),
            InodeKind::Directory => {
                self.volume.inode_close(sector)?;
                Err(FilesysError::PathNotFound(format!(
                    "inode {sector} is not a file"
                )))
            }
        }
    }

    /// Closes a directory handle, downgrading a close failure to a log
    /// line so an unwinding error path keeps its original error
    pub(crate) fn close_quietly(&mut self, dir: DirHandle) {
        if let Err(error) = self.volume.dir_close(dir) {
            warn!(%error, "failed to close directory handle");
        }
    }

    /// Rolls back a created but unlinked inode, keeping the original
    /// failure as the reported error
    pub(crate) fn discard_quietly(&mut self, sector: u64) {
        if let Err(error) = self.volume.discard_inode(sector) {
            warn!(%error, sector, "failed to roll back inode allocation");
        }
    }

    /// Number of inodes currently held open (tests use this to prove
    /// resolution never leaks handles)
    pub fn open_inode_count(&self) -> usize {
        self.volume.inodes.open_count()
    }
}
