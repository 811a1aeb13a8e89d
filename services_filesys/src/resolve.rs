//! Path resolution
//!
//! Walks parsed components against the directory tree. Absolute paths
//! start at the root; relative paths start at the context's working
//! directory, or the root when none is set. Full mode consumes every
//! component; retain-leaf mode stops one short and hands the final
//! component back to the caller.
//!
//! Every handle acquired during a resolution is closed on every branch,
//! and components still unconsumed when a walk fails are released by
//! drop. Nothing leaks out of a failed call.

use fs_path::{ParsedPath, PathComponent, PathError};
use hal::BlockDevice;

use crate::context::ExecContext;
use crate::directory::DirHandle;
use crate::error::{FilesysError, FsResult};
use crate::inode::InodeKind;
use crate::service::FilesysService;

impl<D: BlockDevice> FilesysService<D> {
    /// Resolves `path` to a directory handle, consuming every component
    pub(crate) fn resolve_dir(&mut self, ctx: &ExecContext, path: &str) -> FsResult<DirHandle> {
        let (start, parsed) = self.start_and_parse(ctx, path)?;
        self.walk(start, parsed)
    }

    /// Resolves `path` to its containing directory, retaining the final
    /// component for the caller
    pub(crate) fn resolve_parent(
        &mut self,
        ctx: &ExecContext,
        path: &str,
    ) -> FsResult<(DirHandle, PathComponent)> {
        let (start, mut parsed) = self.start_and_parse(ctx, path)?;

        let Some(leaf) = parsed.pop_leaf() else {
            // a bare run of separators names no leaf to operate on
            self.close_quietly(start);
            return Err(PathError::InvalidPath("no final component".to_string()).into());
        };

        let dir = self.walk(start, parsed)?;
        Ok((dir, leaf))
    }

    /// Picks the starting directory and parses the remainder of the path
    fn start_and_parse(
        &mut self,
        ctx: &ExecContext,
        path: &str,
    ) -> FsResult<(DirHandle, ParsedPath)> {
        if path.is_empty() {
            return Err(PathError::InvalidPath("empty path".to_string()).into());
        }

        let (start, remainder) = if let Some(stripped) = path.strip_prefix('/') {
            (self.volume.dir_open_root()?, stripped)
        } else {
            match &ctx.working_dir {
                Some(working_dir) => (self.volume.dir_reopen(working_dir)?, path),
                None => (self.volume.dir_open_root()?, path),
            }
        };

        match ParsedPath::parse(remainder) {
            Ok(parsed) => Ok((start, parsed)),
            Err(e) => {
                self.close_quietly(start);
                Err(e.into())
            }
        }
    }

    /// Walks components from `current`, requiring each to name a
    /// directory
    fn walk(&mut self, mut current: DirHandle, components: ParsedPath) -> FsResult<DirHandle> {
        for component in components {
            let next = match self.open_child(&current, component.as_str()) {
                Ok(handle) => handle,
                Err(e) => {
                    self.close_quietly(current);
                    return Err(e);
                }
            };
            self.close_quietly(current);
            current = next;
        }
        Ok(current)
    }

    /// Opens the child directory named `name`, failing if the entry is
    /// absent or not a directory
    fn open_child(&mut self, dir: &DirHandle, name: &str) -> FsResult<DirHandle> {
        match self.volume.dir_lookup(dir, name)? {
            Some(entry) => match entry.kind {
                InodeKind::Directory => self.volume.dir_open(entry.sector),
                InodeKind::File => Err(FilesysError::PathNotFound(name.to_string())),
            },
            None => Err(FilesysError::PathNotFound(name.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ROOT_DIR_SECTOR;
    use hal::RamDisk;

    fn fresh_service() -> FilesysService<RamDisk> {
        FilesysService::mount(RamDisk::new(128), true).unwrap()
    }

    #[test]
    fn test_resolve_bare_separators_end_at_start_dir() {
        let mut fs = fresh_service();
        let ctx = ExecContext::new();

        // "/" itself is special-cased by callers before resolution; a
        // longer separator run exercises the empty walk
        let dir = fs.resolve_dir(&ctx, "//").unwrap();
        assert_eq!(dir.inumber(), ROOT_DIR_SECTOR);
        fs.close_dir(dir).unwrap();
    }

    #[test]
    fn test_resolve_parent_keeps_leaf() {
        let mut fs = fresh_service();
        let ctx = ExecContext::new();

        let (dir, leaf) = fs.resolve_parent(&ctx, "/notes.txt").unwrap();
        assert_eq!(dir.inumber(), ROOT_DIR_SECTOR);
        assert_eq!(leaf.as_str(), "notes.txt");
        fs.close_dir(dir).unwrap();
    }

    #[test]
    fn test_resolve_parent_walks_intermediates() {
        let mut fs = fresh_service();
        let ctx = ExecContext::new();
        fs.mkdir(&ctx, "/a").unwrap();
        fs.mkdir(&ctx, "/a/b").unwrap();

        let (dir, leaf) = fs.resolve_parent(&ctx, "/a/b/c").unwrap();
        assert_eq!(leaf.as_str(), "c");

        let b = fs.open(&ctx, "/a/b").unwrap();
        assert_eq!(dir.inumber(), b.inumber());
        fs.close_handle(b).unwrap();
        fs.close_dir(dir).unwrap();
    }

    #[test]
    fn test_resolve_through_missing_component() {
        let mut fs = fresh_service();
        let ctx = ExecContext::new();

        let result = fs.resolve_parent(&ctx, "/no/such/leaf");
        assert_eq!(result.err(), Some(FilesysError::PathNotFound("no".to_string())));
    }

    #[test]
    fn test_resolve_through_file_component() {
        let mut fs = fresh_service();
        let ctx = ExecContext::new();
        fs.create(&ctx, "/plain", 0).unwrap();

        let result = fs.resolve_dir(&ctx, "/plain/sub");
        assert_eq!(
            result.err(),
            Some(FilesysError::PathNotFound("plain".to_string()))
        );
    }

    #[test]
    fn test_resolve_parent_of_bare_separators() {
        let mut fs = fresh_service();
        let ctx = ExecContext::new();

        let result = fs.resolve_parent(&ctx, "//");
        assert!(matches!(result, Err(FilesysError::Path(_))));
    }

    #[test]
    fn test_resolve_empty_path() {
        let mut fs = fresh_service();
        let ctx = ExecContext::new();

        let result = fs.resolve_dir(&ctx, "");
        assert!(matches!(
            result,
            Err(FilesysError::Path(PathError::InvalidPath(_)))
        ));
    }

    #[test]
    fn test_resolution_failure_leaves_no_open_inodes() {
        let mut fs = fresh_service();
        let ctx = ExecContext::new();
        fs.mkdir(&ctx, "/a").unwrap();

        let _ = fs.resolve_dir(&ctx, "/a/missing/deeper");
        assert_eq!(fs.open_inode_count(), 0);
    }

    #[test]
    fn test_relative_resolution_uses_working_dir() {
        let mut fs = fresh_service();
        let mut ctx = ExecContext::new();
        fs.mkdir(&ctx, "/a").unwrap();
        fs.mkdir(&ctx, "/a/b").unwrap();
        fs.chdir(&mut ctx, "/a").unwrap();

        let dir = fs.resolve_dir(&ctx, "b").unwrap();
        let absolute = fs.resolve_dir(&ctx, "/a/b").unwrap();
        assert_eq!(dir.inumber(), absolute.inumber());
        fs.close_dir(dir).unwrap();
        fs.close_dir(absolute).unwrap();
        fs.release_context(&mut ctx).unwrap();
    }
}
