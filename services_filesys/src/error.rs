//! Error types for the file-system service

use fs_path::PathError;
use hal::BlockError;
use thiserror::Error;

/// Errors that can occur during file-system operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilesysError {
    /// Path parsing error
    #[error("path error: {0}")]
    Path(#[from] PathError),

    /// An intermediate component is missing or not a directory, or the
    /// final target is missing
    #[error("path not found: {0}")]
    PathNotFound(String),

    /// Create, remove, or mkdir attempted directly on "/"
    #[error("operation not allowed on the root directory")]
    RootPathRejected,

    /// No free sector, or an internal allocation limit was hit
    #[error("allocation failure: {0}")]
    AllocationFailure(String),

    /// Directory entry add where the name already exists
    #[error("name already exists: {0}")]
    DuplicateName(String),

    /// Removal of a directory that still has entries
    #[error("directory not empty: {0}")]
    DirectoryNotEmpty(String),

    /// On-disk data failed validation
    #[error("invalid volume data: {0}")]
    InvalidVolume(String),

    /// Block device error
    #[error("block device error: {0}")]
    Device(#[from] BlockError),
}

pub type FsResult<T> = Result<T, FilesysError>;
