//! File-backed block device
//!
//! Maps a disk image in the host file system onto the sector API, so a
//! volume survives process restarts during hosted development.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::block_device::{BlockDevice, BlockError, SECTOR_SIZE};

/// Block device backed by a fixed-size disk image file
pub struct FileDisk {
    file: File,
    sector_count: u64,
}

impl FileDisk {
    /// Create a new disk image at `path` with the given number of sectors
    ///
    /// An existing file at `path` is truncated.
    pub fn create(path: &Path, sector_count: u64) -> Result<Self, BlockError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|_| BlockError::NotReady)?;
        file.set_len(sector_count * SECTOR_SIZE as u64)
            .map_err(|_| BlockError::IoError)?;
        Ok(Self { file, sector_count })
    }

    /// Open an existing disk image
    ///
    /// Fails with `BlockError::InvalidSize` if the image length is not a
    /// whole number of sectors.
    pub fn open(path: &Path) -> Result<Self, BlockError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|_| BlockError::NotReady)?;
        let len = file.metadata().map_err(|_| BlockError::IoError)?.len();
        if len % SECTOR_SIZE as u64 != 0 {
            return Err(BlockError::InvalidSize);
        }
        Ok(Self {
            file,
            sector_count: len / SECTOR_SIZE as u64,
        })
    }

    fn seek_to(&mut self, sector: u64) -> Result<(), BlockError> {
        self.file
            .seek(SeekFrom::Start(sector * SECTOR_SIZE as u64))
            .map_err(|_| BlockError::IoError)?;
        Ok(())
    }
}

impl BlockDevice for FileDisk {
    fn sector_count(&self) -> u64 {
        self.sector_count
    }

    fn read_sector(&mut self, sector: u64, buffer: &mut [u8]) -> Result<(), BlockError> {
        if sector >= self.sector_count {
            return Err(BlockError::OutOfBounds);
        }
        if buffer.len() < SECTOR_SIZE {
            return Err(BlockError::InvalidSize);
        }

        self.seek_to(sector)?;
        self.file
            .read_exact(&mut buffer[..SECTOR_SIZE])
            .map_err(|_| BlockError::IoError)?;
        Ok(())
    }

    fn write_sector(&mut self, sector: u64, buffer: &[u8]) -> Result<(), BlockError> {
        if sector >= self.sector_count {
            return Err(BlockError::OutOfBounds);
        }
        if buffer.len() < SECTOR_SIZE {
            return Err(BlockError::InvalidSize);
        }

        self.seek_to(sector)?;
        self.file
            .write_all(&buffer[..SECTOR_SIZE])
            .map_err(|_| BlockError::IoError)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), BlockError> {
        self.file.sync_all().map_err(|_| BlockError::IoError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_read_write() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("test.img");

        let mut disk = FileDisk::create(&image, 8).unwrap();
        assert_eq!(disk.sector_count(), 8);

        let data = [0xabu8; SECTOR_SIZE];
        disk.write_sector(5, &data).unwrap();

        let mut read_back = [0u8; SECTOR_SIZE];
        disk.read_sector(5, &mut read_back).unwrap();
        assert_eq!(read_back, data);
    }

    #[test]
    fn test_persistence_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("persist.img");

        {
            let mut disk = FileDisk::create(&image, 4).unwrap();
            let data = [0x11u8; SECTOR_SIZE];
            disk.write_sector(2, &data).unwrap();
            disk.flush().unwrap();
        }

        let mut reopened = FileDisk::open(&image).unwrap();
        assert_eq!(reopened.sector_count(), 4);

        let mut read_back = [0u8; SECTOR_SIZE];
        reopened.read_sector(2, &mut read_back).unwrap();
        assert_eq!(read_back, [0x11u8; SECTOR_SIZE]);
    }

    #[test]
    fn test_open_rejects_ragged_image() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("ragged.img");
        std::fs::write(&image, vec![0u8; SECTOR_SIZE + 1]).unwrap();

        assert_eq!(FileDisk::open(&image).err(), Some(BlockError::InvalidSize));
    }

    #[test]
    fn test_open_missing_image() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("missing.img");

        assert_eq!(FileDisk::open(&image).err(), Some(BlockError::NotReady));
    }

    #[test]
    fn test_out_of_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("bounds.img");

        let mut disk = FileDisk::create(&image, 2).unwrap();
        let mut buffer = [0u8; SECTOR_SIZE];
        assert_eq!(
            disk.read_sector(2, &mut buffer),
            Err(BlockError::OutOfBounds)
        );
        assert_eq!(disk.write_sector(2, &buffer), Err(BlockError::OutOfBounds));
    }
}
