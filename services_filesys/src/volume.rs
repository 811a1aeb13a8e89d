//! Shared volume state
//!
//! Groups the cache, free map, and open-inode table so the directory and
//! operation layers can borrow them together.

use hal::BlockDevice;

use crate::cache::BlockCache;
use crate::error::FsResult;
use crate::free_map::FreeMap;
use crate::inode::{InodeKind, InodeRef, InodeTable};

pub(crate) struct Volume<D: BlockDevice> {
    pub(crate) cache: BlockCache<D>,
    pub(crate) free_map: FreeMap,
    pub(crate) inodes: InodeTable,
}

impl<D: BlockDevice> Volume<D> {
    pub(crate) fn inode_create(
        &mut self,
        kind: InodeKind,
        sector: u64,
        length: u64,
    ) -> FsResult<()> {
        self.inodes
            .create(&mut self.cache, &mut self.free_map, kind, sector, length)
    }

    pub(crate) fn inode_open(&mut self, sector: u64) -> FsResult<InodeRef> {
        self.inodes.open(&mut self.cache, sector)
    }

    pub(crate) fn inode_close(&mut self, sector: u64) -> FsResult<()> {
        self.inodes.close(&mut self.free_map, sector)
    }

    /// Rolls back a fully created but never linked inode: releases its
    /// data run and its own sector
    pub(crate) fn discard_inode(&mut self, sector: u64) -> FsResult<()> {
        self.inodes
            .release_data(&mut self.cache, &mut self.free_map, sector)?;
        self.free_map.release(sector, 1);
        Ok(())
    }
}
