//! # Hardware Abstraction Layer (HAL)
//!
//! This crate defines the storage hardware abstractions the file system
//! is built on.
//!
//! ## Philosophy
//!
//! **Storage hardware must be fully abstracted and swappable.**
//!
//! No device-specific assumptions should leak into file-system logic.
//! The HAL provides a sector-granular device trait that concrete backends
//! implement, plus a boot-time registry that assigns devices to roles.
//!
//! ## Design Principles
//!
//! 1. **Trait-based**: All sector I/O goes through `BlockDevice`
//! 2. **Testable**: `RamDisk` gives every test a throwaway volume
//! 3. **Hosted-friendly**: `FileDisk` maps a disk image onto a file

pub mod block_device;
pub mod file_disk;
pub mod volume;

pub use block_device::{BlockDevice, BlockError, RamDisk, SECTOR_SIZE};
pub use file_disk::FileDisk;
pub use volume::{BoxedBlockDevice, DeviceRegistry, DeviceRole};
