//! Error types for storage operations.

use crate::region::RegionId;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Attempted to read beyond the end of a region.
    #[error("read beyond end of region {region}: offset {offset}, len {len}, size {size}")]
    ReadPastEnd {
        /// The region being read.
        region: RegionId,
        /// The requested read offset.
        offset: u64,
        /// The requested read length.
        len: usize,
        /// The current region size.
        size: u64,
    },

    /// The region does not exist (never created, or already deleted).
    #[error("region {region} not found")]
    RegionNotFound {
        /// The missing region.
        region: RegionId,
    },

    /// The region already exists.
    #[error("region {region} already exists")]
    RegionExists {
        /// The duplicate region.
        region: RegionId,
    },

    /// Another process holds the directory lock.
    #[error("log directory {path:?} is locked by another process")]
    Locked {
        /// The locked directory.
        path: PathBuf,
    },
}

impl StorageError {
    /// Returns true if this error reports a missing region.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::RegionNotFound { .. })
    }
}
