//! Inode layer
//!
//! An inode is a typed metadata record living in its own sector, with
//! file or directory content in a contiguous run of data sectors. Open
//! inodes are tracked in a table keyed by sector; removing an inode
//! defers releasing its storage until the last handle closes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use hal::{BlockDevice, SECTOR_SIZE};

use crate::cache::BlockCache;
use crate::error::{FilesysError, FsResult};
use crate::free_map::FreeMap;

/// Kind of data an inode describes, fixed at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InodeKind {
    /// Ordinary file
    File,
    /// Directory
    Directory,
}

/// Reference to an inode: its sector number (the inumber) plus its kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InodeRef {
    /// Sector holding the inode record
    pub sector: u64,
    /// Kind recorded in the inode
    pub kind: InodeKind,
}

/// On-disk inode record, serialized into the inode's own sector
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DiskInode {
    kind: InodeKind,
    /// Content length in bytes
    length: u64,
    /// First sector of the data run
    data_start: u64,
    /// Number of sectors in the data run
    data_sectors: u64,
}

/// An open inode with its reference count
#[derive(Debug)]
struct OpenInode {
    disk: DiskInode,
    open_count: u32,
    removed: bool,
}

/// Table of currently open inodes, keyed by sector
#[derive(Debug, Default)]
pub(crate) struct InodeTable {
    open: BTreeMap<u64, OpenInode>,
}

fn write_record<D: BlockDevice>(
    cache: &mut BlockCache<D>,
    sector: u64,
    record: &DiskInode,
) -> FsResult<()> {
    let json = serde_json::to_vec(record)
        .map_err(|e| FilesysError::InvalidVolume(format!("inode serialize failed: {e}")))?;
    if json.len() > SECTOR_SIZE {
        return Err(FilesysError::AllocationFailure(
            "inode record exceeds one sector".to_string(),
        ));
    }

    let mut buffer = [0u8; SECTOR_SIZE];
    buffer[..json.len()].copy_from_slice(&json);
    cache.write(sector, &buffer)?;
    Ok(())
}

fn read_record<D: BlockDevice>(cache: &mut BlockCache<D>, sector: u64) -> FsResult<DiskInode> {
    let buffer = cache.read(sector)?;
    let json_end = buffer.iter().position(|&b| b == 0).unwrap_or(SECTOR_SIZE);
    serde_json::from_slice(&buffer[..json_end])
        .map_err(|e| FilesysError::InvalidVolume(format!("inode {sector} parse failed: {e}")))
}

impl InodeTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Creates an inode record at `sector` with `length` bytes of
    /// zero-filled content in a freshly allocated contiguous run
    ///
    /// On failure everything allocated here is released again; the
    /// caller keeps ownership of `sector` itself.
    pub(crate) fn create<D: BlockDevice>(
        &mut self,
        cache: &mut BlockCache<D>,
        free_map: &mut FreeMap,
        kind: InodeKind,
        sector: u64,
        length: u64,
    ) -> FsResult<()> {
        let data_sectors = length.div_ceil(SECTOR_SIZE as u64);
        let data_start = if data_sectors > 0 {
            free_map.allocate(data_sectors).ok_or_else(|| {
                FilesysError::AllocationFailure(format!(
                    "no room for {data_sectors} data sectors"
                ))
            })?
        } else {
            0
        };

        let zero = [0u8; SECTOR_SIZE];
        for s in data_start..data_start + data_sectors {
            if let Err(e) = cache.write(s, &zero) {
                free_map.release(data_start, data_sectors);
                return Err(e.into());
            }
        }

        let record = DiskInode {
            kind,
            length,
            data_start,
            data_sectors,
        };
        if let Err(e) = write_record(cache, sector, &record) {
            free_map.release(data_start, data_sectors);
            return Err(e);
        }
        Ok(())
    }

    /// Opens the inode at `sector`, reading its record on first open
    pub(crate) fn open<D: BlockDevice>(
        &mut self,
        cache: &mut BlockCache<D>,
        sector: u64,
    ) -> FsResult<InodeRef> {
        if let Some(open) = self.open.get_mut(&sector) {
            open.open_count += 1;
            return Ok(InodeRef {
                sector,
                kind: open.disk.kind,
            });
        }

        let disk = read_record(cache, sector)?;
        let kind = disk.kind;
        self.open.insert(
            sector,
            OpenInode {
                disk,
                open_count: 1,
                removed: false,
            },
        );
        Ok(InodeRef { sector, kind })
    }

    /// Closes one reference; the last close of a removed inode releases
    /// its data run and its own sector
    pub(crate) fn close(&mut self, free_map: &mut FreeMap, sector: u64) -> FsResult<()> {
        let Some(open) = self.open.get_mut(&sector) else {
            return Err(FilesysError::InvalidVolume(format!(
                "close of inode {sector} that is not open"
            )));
        };

        open.open_count -= 1;
        if open.open_count == 0 {
            if let Some(open) = self.open.remove(&sector) {
                if open.removed {
                    free_map.release(open.disk.data_start, open.disk.data_sectors);
                    free_map.release(sector, 1);
                }
            }
        }
        Ok(())
    }

    /// Marks an open inode for removal once its last handle closes
    pub(crate) fn mark_removed(&mut self, sector: u64) {
        if let Some(open) = self.open.get_mut(&sector) {
            open.removed = true;
        }
    }

    /// True if the inode currently has open handles
    pub(crate) fn is_open(&self, sector: u64) -> bool {
        self.open.contains_key(&sector)
    }

    /// Number of distinct inodes currently open
    pub(crate) fn open_count(&self) -> usize {
        self.open.len()
    }

    /// Content length of an open inode
    pub(crate) fn length(&self, sector: u64) -> Option<u64> {
        self.open.get(&sector).map(|open| open.disk.length)
    }

    /// Reads the full content of an open inode
    pub(crate) fn read_data<D: BlockDevice>(
        &self,
        cache: &mut BlockCache<D>,
        sector: u64,
    ) -> FsResult<Vec<u8>> {
        let open = self.open.get(&sector).ok_or_else(|| {
            FilesysError::InvalidVolume(format!("read of inode {sector} that is not open"))
        })?;

        let mut data = Vec::with_capacity(open.disk.data_sectors as usize * SECTOR_SIZE);
        for s in open.disk.data_start..open.disk.data_start + open.disk.data_sectors {
            data.extend_from_slice(&cache.read(s)?);
        }
        data.truncate(open.disk.length as usize);
        Ok(data)
    }

    /// Overwrites the content of an open inode from offset zero
    ///
    /// Sectors the data reaches are written whole, zero-padded, so any
    /// previous longer content cannot bleed into a later read.
    pub(crate) fn write_data<D: BlockDevice>(
        &self,
        cache: &mut BlockCache<D>,
        sector: u64,
        data: &[u8],
    ) -> FsResult<()> {
        let open = self.open.get(&sector).ok_or_else(|| {
            FilesysError::InvalidVolume(format!("write to inode {sector} that is not open"))
        })?;
        if data.len() as u64 > open.disk.length {
            return Err(FilesysError::AllocationFailure(format!(
                "content of {} bytes exceeds inode capacity {}",
                data.len(),
                open.disk.length
            )));
        }

        for (i, chunk) in data.chunks(SECTOR_SIZE).enumerate() {
            let mut buffer = [0u8; SECTOR_SIZE];
            buffer[..chunk.len()].copy_from_slice(chunk);
            cache.write(open.disk.data_start + i as u64, &buffer)?;
        }
        Ok(())
    }

    /// Reads up to `buffer.len()` bytes at `offset`, bounded by the
    /// inode's length; returns the byte count actually read
    pub(crate) fn read_data_at<D: BlockDevice>(
        &self,
        cache: &mut BlockCache<D>,
        sector: u64,
        offset: u64,
        buffer: &mut [u8],
    ) -> FsResult<usize> {
        let open = self.open.get(&sector).ok_or_else(|| {
            FilesysError::InvalidVolume(format!("read of inode {sector} that is not open"))
        })?;
        if offset >= open.disk.length {
            return Ok(0);
        }

        let end = (offset + buffer.len() as u64).min(open.disk.length);
        let mut copied = 0usize;
        let mut pos = offset;
        while pos < end {
            let data_sector = open.disk.data_start + pos / SECTOR_SIZE as u64;
            let within = (pos % SECTOR_SIZE as u64) as usize;
            let take = ((SECTOR_SIZE - within) as u64).min(end - pos) as usize;
            let block = cache.read(data_sector)?;
            buffer[copied..copied + take].copy_from_slice(&block[within..within + take]);
            copied += take;
            pos += take as u64;
        }
        Ok(copied)
    }

    /// Writes `data` at `offset`, bounded by the inode's length; returns
    /// the byte count actually written
    pub(crate) fn write_data_at<D: BlockDevice>(
        &self,
        cache: &mut BlockCache<D>,
        sector: u64,
        offset: u64,
        data: &[u8],
    ) -> FsResult<usize> {
        let open = self.open.get(&sector).ok_or_else(|| {
            FilesysError::InvalidVolume(format!("write to inode {sector} that is not open"))
        })?;
        if offset >= open.disk.length {
            return Ok(0);
        }

        let end = (offset + data.len() as u64).min(open.disk.length);
        let mut written = 0usize;
        let mut pos = offset;
        while pos < end {
            let data_sector = open.disk.data_start + pos / SECTOR_SIZE as u64;
            let within = (pos % SECTOR_SIZE as u64) as usize;
            let take = ((SECTOR_SIZE - within) as u64).min(end - pos) as usize;

            let mut block = cache.read(data_sector)?;
            block[within..within + take].copy_from_slice(&data[written..written + take]);
            cache.write(data_sector, &block)?;
            written += take;
            pos += take as u64;
        }
        Ok(written)
    }

    /// Releases the data run of an inode that was created but never
    /// linked, after a failed operation
    ///
    /// The inode's own sector stays with the caller.
    pub(crate) fn release_data<D: BlockDevice>(
        &self,
        cache: &mut BlockCache<D>,
        free_map: &mut FreeMap,
        sector: u64,
    ) -> FsResult<()> {
        let record = read_record(cache, sector)?;
        free_map.release(record.data_start, record.data_sectors);
        Ok(())
    }
}
