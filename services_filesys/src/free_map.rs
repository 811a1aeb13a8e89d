//! Free map: the sector allocator
//!
//! Tracks which sectors are in use as a bitmap. The map is persisted at
//! `FREE_MAP_SECTOR` as a JSON record carrying a magic number and a
//! CRC32 checksum, both validated when the volume is opened. The record
//! is written at format time and at shutdown.

use serde::{Deserialize, Serialize};

use hal::{BlockDevice, SECTOR_SIZE};

use crate::cache::BlockCache;
use crate::error::{FilesysError, FsResult};
use crate::{FREE_MAP_SECTOR, ROOT_DIR_SECTOR};

const FREE_MAP_MAGIC: u64 = 0x4652_4545_4D41_5031; // "FREEMAP1"

/// On-disk free map record
#[derive(Debug, Clone, Serialize, Deserialize)]
struct FreeMapRecord {
    /// Magic number for validation
    magic: u64,
    /// Total number of sectors the map covers
    total_sectors: u64,
    /// Usage bitmap, 64 sectors per word, bit set means in use
    words: Vec<u64>,
    /// CRC32 checksum of the record (excluding this field)
    checksum: u32,
}

impl FreeMapRecord {
    /// Create a new record with computed checksum
    fn new(total_sectors: u64, words: Vec<u64>) -> Self {
        let mut record = Self {
            magic: FREE_MAP_MAGIC,
            total_sectors,
            words,
            checksum: 0,
        };
        record.checksum = record.compute_checksum();
        record
    }

    /// Compute CRC32 checksum of the record (excluding checksum field)
    fn compute_checksum(&self) -> u32 {
        let mut temp = self.clone();
        temp.checksum = 0;
        let data = serde_json::to_vec(&temp).unwrap_or_default();
        crc32fast::hash(&data)
    }

    /// Validate checksum
    fn is_valid(&self) -> bool {
        self.compute_checksum() == self.checksum
    }
}

/// In-memory sector usage bitmap
#[derive(Debug)]
pub struct FreeMap {
    total_sectors: u64,
    words: Vec<u64>,
}

impl FreeMap {
    /// Creates a map with every sector free
    pub fn new(total_sectors: u64) -> Self {
        let word_count = total_sectors.div_ceil(64) as usize;
        Self {
            total_sectors,
            words: vec![0; word_count],
        }
    }

    /// Creates the format-time map: empty except for the metadata
    /// sectors the volume itself occupies
    pub fn create(total_sectors: u64) -> Self {
        let mut map = Self::new(total_sectors);
        map.set_used(FREE_MAP_SECTOR);
        map.set_used(ROOT_DIR_SECTOR);
        map
    }

    fn index(sector: u64) -> (usize, u64) {
        ((sector / 64) as usize, 1u64 << (sector % 64))
    }

    fn is_used(&self, sector: u64) -> bool {
        let (word, bit) = Self::index(sector);
        self.words[word] & bit != 0
    }

    fn set_used(&mut self, sector: u64) {
        let (word, bit) = Self::index(sector);
        self.words[word] |= bit;
    }

    fn set_free(&mut self, sector: u64) {
        let (word, bit) = Self::index(sector);
        self.words[word] &= !bit;
    }

    /// Total number of sectors the map covers
    pub fn total_sectors(&self) -> u64 {
        self.total_sectors
    }

    /// Number of sectors currently free
    pub fn free_count(&self) -> u64 {
        let used: u32 = self.words.iter().map(|w| w.count_ones()).sum();
        self.total_sectors - used as u64
    }

    /// Allocates a contiguous run of `count` sectors, first fit
    ///
    /// Returns the first sector of the run, or `None` if no run of that
    /// length is free.
    pub fn allocate(&mut self, count: u64) -> Option<u64> {
        if count == 0 || count > self.total_sectors {
            return None;
        }

        let mut run_start = 0u64;
        let mut run_len = 0u64;
        for sector in 0..self.total_sectors {
            if self.is_used(sector) {
                run_start = sector + 1;
                run_len = 0;
            } else {
                run_len += 1;
                if run_len == count {
                    for s in run_start..run_start + count {
                        self.set_used(s);
                    }
                    return Some(run_start);
                }
            }
        }
        None
    }

    /// Releases a contiguous run of `count` sectors starting at `start`
    pub fn release(&mut self, start: u64, count: u64) {
        for sector in start..start + count {
            debug_assert!(self.is_used(sector));
            self.set_free(sector);
        }
    }

    /// Writes the map to its fixed sector
    pub fn save<D: BlockDevice>(&self, cache: &mut BlockCache<D>) -> FsResult<()> {
        let record = FreeMapRecord::new(self.total_sectors, self.words.clone());
        let json = serde_json::to_vec(&record)
            .map_err(|e| FilesysError::InvalidVolume(format!("free map serialize failed: {e}")))?;
        if json.len() > SECTOR_SIZE {
            return Err(FilesysError::AllocationFailure(
                "free map record exceeds one sector".to_string(),
            ));
        }

        let mut buffer = [0u8; SECTOR_SIZE];
        buffer[..json.len()].copy_from_slice(&json);
        cache.write(FREE_MAP_SECTOR, &buffer)?;
        Ok(())
    }

    /// Reads the map back from its fixed sector, validating magic and
    /// checksum
    pub fn load<D: BlockDevice>(cache: &mut BlockCache<D>) -> FsResult<Self> {
        let buffer = cache.read(FREE_MAP_SECTOR)?;
        let json_end = buffer.iter().position(|&b| b == 0).unwrap_or(SECTOR_SIZE);
        let record: FreeMapRecord = serde_json::from_slice(&buffer[..json_end])
            .map_err(|e| FilesysError::InvalidVolume(format!("free map parse failed: {e}")))?;

        if record.magic != FREE_MAP_MAGIC {
            return Err(FilesysError::InvalidVolume(
                "free map magic mismatch".to_string(),
            ));
        }
        if !record.is_valid() {
            return Err(FilesysError::InvalidVolume(
                "free map checksum mismatch".to_string(),
            ));
        }

        Ok(Self {
            total_sectors: record.total_sectors,
            words: record.words,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hal::RamDisk;

    #[test]
    fn test_create_marks_metadata_sectors() {
        let map = FreeMap::create(64);
        assert!(map.is_used(FREE_MAP_SECTOR));
        assert!(map.is_used(ROOT_DIR_SECTOR));
        assert_eq!(map.free_count(), 62);
    }

    #[test]
    fn test_allocate_is_contiguous_and_distinct() {
        let mut map = FreeMap::create(64);
        let a = map.allocate(1).unwrap();
        let b = map.allocate(1).unwrap();
        let run = map.allocate(4).unwrap();

        assert_ne!(a, b);
        for sector in run..run + 4 {
            assert!(map.is_used(sector));
        }
        assert_eq!(map.free_count(), 62 - 6);
    }

    #[test]
    fn test_allocate_skips_used_runs() {
        let mut map = FreeMap::create(8);
        // free sectors are 2..8; occupy 4 so no run of 3 starts before it
        map.set_used(4);
        let run = map.allocate(3).unwrap();
        assert_eq!(run, 5);
    }

    #[test]
    fn test_allocate_exhaustion() {
        let mut map = FreeMap::create(8);
        assert!(map.allocate(7).is_none());
        assert!(map.allocate(6).is_some());
        assert!(map.allocate(1).is_none());
    }

    #[test]
    fn test_release_returns_sectors() {
        let mut map = FreeMap::create(16);
        let before = map.free_count();
        let run = map.allocate(3).unwrap();
        map.release(run, 3);
        assert_eq!(map.free_count(), before);
    }

    #[test]
    fn test_allocate_zero_fails() {
        let mut map = FreeMap::create(8);
        assert!(map.allocate(0).is_none());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let mut cache = BlockCache::new(RamDisk::new(64));
        let mut map = FreeMap::create(64);
        let run = map.allocate(5).unwrap();
        map.save(&mut cache).unwrap();

        let loaded = FreeMap::load(&mut cache).unwrap();
        assert_eq!(loaded.total_sectors(), 64);
        assert_eq!(loaded.free_count(), map.free_count());
        for sector in run..run + 5 {
            assert!(loaded.is_used(sector));
        }
    }

    #[test]
    fn test_load_rejects_blank_sector() {
        let mut cache = BlockCache::new(RamDisk::new(8));
        let result = FreeMap::load(&mut cache);
        assert!(matches!(result, Err(FilesysError::InvalidVolume(_))));
    }

    #[test]
    fn test_load_rejects_corrupted_record() {
        let mut cache = BlockCache::new(RamDisk::new(64));
        FreeMap::create(64).save(&mut cache).unwrap();

        let mut buffer = cache.read(FREE_MAP_SECTOR).unwrap();
        // flip a byte inside the serialized record
        buffer[40] ^= 0xff;
        cache.write(FREE_MAP_SECTOR, &buffer).unwrap();

        let result = FreeMap::load(&mut cache);
        assert!(matches!(result, Err(FilesysError::InvalidVolume(_))));
    }
}
