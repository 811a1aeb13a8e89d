//! Write-back sector cache
//!
//! All volume I/O goes through the cache. Reads populate it from the
//! device; writes stay dirty in memory until `flush`, which runs at
//! shutdown and whenever a caller wants durability.

use std::collections::{BTreeMap, BTreeSet};

use hal::{BlockDevice, BlockError, SECTOR_SIZE};

/// Sector cache wrapping a block device
pub struct BlockCache<D: BlockDevice> {
    device: D,
    sectors: BTreeMap<u64, [u8; SECTOR_SIZE]>,
    dirty: BTreeSet<u64>,
}

impl<D: BlockDevice> BlockCache<D> {
    /// Creates an empty cache over a device
    pub fn new(device: D) -> Self {
        Self {
            device,
            sectors: BTreeMap::new(),
            dirty: BTreeSet::new(),
        }
    }

    /// Total sectors on the underlying device
    pub fn sector_count(&self) -> u64 {
        self.device.sector_count()
    }

    /// Reads a sector, populating the cache from the device on a miss
    pub fn read(&mut self, sector: u64) -> Result<[u8; SECTOR_SIZE], BlockError> {
        if let Some(data) = self.sectors.get(&sector) {
            return Ok(*data);
        }

        let mut buffer = [0u8; SECTOR_SIZE];
        self.device.read_sector(sector, &mut buffer)?;
        self.sectors.insert(sector, buffer);
        Ok(buffer)
    }

    /// Writes a sector into the cache and marks it dirty
    pub fn write(&mut self, sector: u64, data: &[u8; SECTOR_SIZE]) -> Result<(), BlockError> {
        if sector >= self.device.sector_count() {
            return Err(BlockError::OutOfBounds);
        }
        self.sectors.insert(sector, *data);
        self.dirty.insert(sector);
        Ok(())
    }

    /// Writes every dirty sector to the device and flushes the device
    ///
    /// A sector that fails to write stays dirty.
    pub fn flush(&mut self) -> Result<(), BlockError> {
        let pending: Vec<u64> = self.dirty.iter().copied().collect();
        for sector in pending {
            if let Some(data) = self.sectors.get(&sector) {
                self.device.write_sector(sector, data)?;
            }
            self.dirty.remove(&sector);
        }
        self.device.flush()
    }

    /// Number of sectors waiting to be written back
    pub fn dirty_count(&self) -> usize {
        self.dirty.len()
    }

    /// Consumes the cache, returning the device
    ///
    /// Dirty sectors are discarded; flush first.
    pub fn into_inner(self) -> D {
        self.device
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hal::RamDisk;

    #[test]
    fn test_read_through() {
        let mut disk = RamDisk::new(8);
        let data = [0x5au8; SECTOR_SIZE];
        disk.write_sector(3, &data).unwrap();

        let mut cache = BlockCache::new(disk);
        assert_eq!(cache.read(3).unwrap(), data);
    }

    #[test]
    fn test_write_is_deferred_until_flush() {
        let mut cache = BlockCache::new(RamDisk::new(8));
        let data = [0x17u8; SECTOR_SIZE];
        cache.write(2, &data).unwrap();
        assert_eq!(cache.dirty_count(), 1);

        // visible through the cache before any flush
        assert_eq!(cache.read(2).unwrap(), data);

        cache.flush().unwrap();
        assert_eq!(cache.dirty_count(), 0);

        let mut device = cache.into_inner();
        let mut read_back = [0u8; SECTOR_SIZE];
        device.read_sector(2, &mut read_back).unwrap();
        assert_eq!(read_back, data);
    }

    #[test]
    fn test_unflushed_write_not_on_device() {
        let mut cache = BlockCache::new(RamDisk::new(8));
        cache.write(1, &[0xffu8; SECTOR_SIZE]).unwrap();

        let mut device = cache.into_inner();
        let mut read_back = [0u8; SECTOR_SIZE];
        device.read_sector(1, &mut read_back).unwrap();
        assert_eq!(read_back, [0u8; SECTOR_SIZE]);
    }

    #[test]
    fn test_write_out_of_bounds() {
        let mut cache = BlockCache::new(RamDisk::new(2));
        let result = cache.write(2, &[0u8; SECTOR_SIZE]);
        assert_eq!(result, Err(BlockError::OutOfBounds));
    }

    #[test]
    fn test_flush_idempotent() {
        let mut cache = BlockCache::new(RamDisk::new(4));
        cache.write(0, &[1u8; SECTOR_SIZE]).unwrap();
        cache.flush().unwrap();
        cache.flush().unwrap();
        assert_eq!(cache.dirty_count(), 0);
    }
}
