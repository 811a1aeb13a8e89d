//! # File System Service
//!
//! This crate implements the file-system-operation layer: it resolves
//! slash-delimited path strings against a hierarchical on-disk directory
//! tree and performs the top-level operations (create, open, remove,
//! mkdir, chdir) against that tree.
//!
//! ## Philosophy
//!
//! - **Resolution is the hard part**: every operation reduces to walking
//!   parsed components from the right starting directory
//! - **Handles are single-owner**: a directory handle is held by exactly
//!   one step at a time and closing consumes it
//! - **Failures roll back**: a sector allocated for an operation that
//!   then fails is always returned to the free map
//! - **The working directory is explicit**: relative resolution reads it
//!   from an `ExecContext` passed in by the caller, never from ambient
//!   thread state
//!
//! ## Design
//!
//! - `BlockCache` buffers sector I/O and flushes on shutdown
//! - `FreeMap` allocates contiguous sector runs, persisted at sector 0
//! - Inodes are typed records (`File` or `Directory`) at fixed sectors;
//!   removal is deferred while handles remain open
//! - Directories map bounded names to inode references, with a parent
//!   back-reference
//! - `FilesysService` ties the layers together behind the operation API

pub mod cache;
pub mod context;
pub mod directory;
pub mod error;
pub mod free_map;
pub mod inode;
mod operations;
mod resolve;
pub mod service;
mod volume;

/// Sector holding the persisted free map record.
pub const FREE_MAP_SECTOR: u64 = 0;
/// Sector holding the root directory inode.
pub const ROOT_DIR_SECTOR: u64 = 1;

pub use cache::BlockCache;
pub use context::ExecContext;
pub use directory::{DirEntry, DirHandle, DIR_INITIAL_CAPACITY};
pub use error::{FilesysError, FsResult};
pub use free_map::FreeMap;
pub use inode::{InodeKind, InodeRef};
pub use service::{FileHandle, FilesysService, OpenHandle};
