//! Storage backend trait definition.

use crate::error::StorageResult;
use crate::region::RegionId;
use std::fmt::Debug;

/// A low-level storage backend holding named byte regions.
///
/// Each region backs exactly one log segment. Backends are **opaque byte
/// stores**: the log core owns the frame format, the backend only moves bytes.
///
/// # Invariants
///
/// - `append` returns the position inside the region where data was written
/// - `read_at` returns exactly the bytes previously written at that position
/// - `size` equals the position the next `append` will write at
/// - After `delete`, every operation on the region fails with
///   [`crate::StorageError::RegionNotFound`]
/// - Backends must be `Send + Sync`; callers share them behind an `Arc`
///
/// # Implementors
///
/// - [`super::InMemoryBackend`] - For testing
/// - [`super::FileBackend`] - For persistent storage
pub trait StorageBackend: Send + Sync + Debug {
    /// Creates a new, empty region.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::RegionExists`] if the region is
    /// already present, or an I/O error.
    fn create(&self, region: RegionId) -> StorageResult<()>;

    /// Appends data to the end of a region.
    ///
    /// Returns the position where the data was written.
    ///
    /// # Errors
    ///
    /// Returns an error if the region does not exist or an I/O error occurs.
    /// A failed append leaves the region size unchanged.
    fn append(&self, region: RegionId, data: &[u8]) -> StorageResult<u64>;

    /// Reads `len` bytes starting at `offset` within a region.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The region does not exist
    /// - The read would extend beyond the current region size
    /// - An I/O error occurs
    fn read_at(&self, region: RegionId, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Returns the current size of a region in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the region does not exist.
    fn size(&self, region: RegionId) -> StorageResult<u64>;

    /// Flushes pending writes of a region to durable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the region does not exist or the flush fails.
    fn flush(&self, region: RegionId) -> StorageResult<()>;

    /// Deletes a region and releases its storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the region does not exist or removal fails.
    fn delete(&self, region: RegionId) -> StorageResult<()>;

    /// Lists every region currently held, in ascending [`RegionId`] order.
    ///
    /// # Errors
    ///
    /// Returns an error if the listing cannot be produced.
    fn list_regions(&self) -> StorageResult<Vec<RegionId>>;
}
