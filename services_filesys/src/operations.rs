//! File and directory operations
//!
//! The public operation surface: create, open, remove, mkdir, chdir,
//! plus directory listing and context teardown. Every operation resolves
//! its path, performs the entry or inode mutation, and releases all
//! intermediate handles on success and failure alike. A sector allocated
//! for an operation that then fails is returned to the free map before
//! the failure propagates.

use tracing::debug;

use hal::BlockDevice;

use crate::context::ExecContext;
use crate::directory::{DirEntry, DirHandle, DIR_INITIAL_CAPACITY};
use crate::error::{FilesysError, FsResult};
use crate::inode::InodeKind;
use crate::service::{FilesysService, OpenHandle};

impl<D: BlockDevice> FilesysService<D> {
    /// Creates a file at `path` with `size` bytes of zeroed content
    ///
    /// Fails on "/", on a missing or non-directory intermediate, on a
    /// duplicate name, and when no sector is free.
    pub fn create(&mut self, ctx: &ExecContext, path: &str, size: u64) -> FsResult<()> {
        if path == "/" {
            return Err(FilesysError::RootPathRejected);
        }

        let (dir, leaf) = self.resolve_parent(ctx, path)?;
        let result = self.create_at(&dir, leaf.as_str(), size);
        self.finish(dir, result)
    }

    fn create_at(&mut self, dir: &DirHandle, name: &str, size: u64) -> FsResult<()> {
        let Some(sector) = self.volume.free_map.allocate(1) else {
            return Err(FilesysError::AllocationFailure(
                "no free sectors".to_string(),
            ));
        };

        if let Err(e) = self.volume.inode_create(InodeKind::File, sector, size) {
            self.volume.free_map.release(sector, 1);
            return Err(e);
        }
        if let Err(e) = self.volume.dir_add(dir, name, sector, InodeKind::File) {
            self.discard_quietly(sector);
            return Err(e);
        }

        debug!(name, sector, size, "created file");
        Ok(())
    }

    /// Opens the file or directory at `path`
    ///
    /// "/" opens the root directly. The returned handle's variant
    /// reports the inode's kind.
    pub fn open(&mut self, ctx: &ExecContext, path: &str) -> FsResult<OpenHandle> {
        if path == "/" {
            return Ok(OpenHandle::Directory(self.volume.dir_open_root()?));
        }

        let (dir, leaf) = self.resolve_parent(ctx, path)?;
        let name = leaf.into_string();

        // the containing handle is not needed past the lookup
        let looked_up = self.volume.dir_lookup(&dir, &name);
        let closed = self.volume.dir_close(dir);
        let entry = looked_up?;
        closed?;

        let Some(entry) = entry else {
            return Err(FilesysError::PathNotFound(name));
        };
        match entry.kind {
            InodeKind::File => Ok(OpenHandle::File(self.file_open(entry.sector)?)),
            InodeKind::Directory => Ok(OpenHandle::Directory(self.volume.dir_open(entry.sector)?)),
        }
    }

    /// Removes the entry at `path`
    ///
    /// The backing inode's storage is released once its last handle
    /// closes. Fails on "/" and on a non-empty directory.
    pub fn remove(&mut self, ctx: &ExecContext, path: &str) -> FsResult<()> {
        if path == "/" {
            return Err(FilesysError::RootPathRejected);
        }

        let (dir, leaf) = self.resolve_parent(ctx, path)?;
        let result = self.volume.dir_remove(&dir, leaf.as_str());
        if result.is_ok() {
            debug!(path, "removed entry");
        }
        self.finish(dir, result)
    }

    /// Creates a directory at `path`, parented to its container
    pub fn mkdir(&mut self, ctx: &ExecContext, path: &str) -> FsResult<()> {
        if path == "/" {
            return Err(FilesysError::RootPathRejected);
        }

        let (dir, leaf) = self.resolve_parent(ctx, path)?;
        let result = self.mkdir_at(&dir, leaf.as_str());
        self.finish(dir, result)
    }

    fn mkdir_at(&mut self, dir: &DirHandle, name: &str) -> FsResult<()> {
        let Some(sector) = self.volume.free_map.allocate(1) else {
            return Err(FilesysError::AllocationFailure(
                "no free sectors".to_string(),
            ));
        };

        if let Err(e) = self
            .volume
            .dir_create(sector, DIR_INITIAL_CAPACITY, dir.inumber())
        {
            self.volume.free_map.release(sector, 1);
            return Err(e);
        }
        if let Err(e) = self
            .volume
            .dir_add(dir, name, sector, InodeKind::Directory)
        {
            self.discard_quietly(sector);
            return Err(e);
        }

        debug!(name, sector, "created directory");
        Ok(())
    }

    /// Replaces the context's working directory with the directory at
    /// `path`
    ///
    /// On failure the existing working directory is untouched. On
    /// success the previous handle is closed and the new one installed.
    pub fn chdir(&mut self, ctx: &mut ExecContext, path: &str) -> FsResult<()> {
        let new_dir = if path == "/" {
            self.volume.dir_open_root()?
        } else {
            self.resolve_dir(ctx, path)?
        };

        if let Some(previous) = ctx.working_dir.take() {
            self.close_quietly(previous);
        }
        ctx.working_dir = Some(new_dir);
        Ok(())
    }

    /// Lists the entries of the directory at `path`
    pub fn ls(&mut self, ctx: &ExecContext, path: &str) -> FsResult<Vec<DirEntry>> {
        let dir = if path == "/" {
            self.volume.dir_open_root()?
        } else {
            self.resolve_dir(ctx, path)?
        };

        let entries = self.volume.dir_entries(&dir);
        let closed = self.volume.dir_close(dir);
        let entries = entries?;
        closed?;
        Ok(entries)
    }

    /// Releases the context's working directory, if any
    ///
    /// Call at context teardown; chdir handles every other release.
    pub fn release_context(&mut self, ctx: &mut ExecContext) -> FsResult<()> {
        match ctx.working_dir.take() {
            Some(dir) => self.volume.dir_close(dir),
            None => Ok(()),
        }
    }

    /// Closes `dir` and returns `result`, preferring the operation's
    /// error over a close error
    fn finish(&mut self, dir: DirHandle, result: FsResult<()>) -> FsResult<()> {
        match result {
            Ok(()) => self.volume.dir_close(dir),
            Err(e) => {
                self.close_quietly(dir);
                Err(e)
            }
        }
    }
}
