//! In-memory storage backend for testing.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use crate::region::RegionId;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

/// An in-memory storage backend.
///
/// This backend stores every region in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral logs that don't need persistence
///
/// It also exposes a few fault-injection helpers (`corrupt_byte`,
/// `fail_appends`, `fail_deletes`) used by tests of the scanner, the log
/// and the cleaner.
///
/// # Thread Safety
///
/// This backend is thread-safe and can be shared across threads.
///
/// # Example
///
/// ```rust
/// use commitlog_storage::{InMemoryBackend, RegionId, StorageBackend};
///
/// let backend = InMemoryBackend::new();
/// let region = RegionId::initial(0);
/// backend.create(region).unwrap();
/// assert_eq!(backend.append(region, b"test data").unwrap(), 0);
/// assert_eq!(backend.size(region).unwrap(), 9);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    regions: RwLock<BTreeMap<RegionId, Vec<u8>>>,
    fail_appends: AtomicBool,
    fail_deletes: AtomicBool,
}

impl InMemoryBackend {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of a region's bytes, if it exists.
    #[must_use]
    pub fn region_data(&self, region: RegionId) -> Option<Vec<u8>> {
        self.regions.read().get(&region).cloned()
    }

    /// Returns the number of regions currently held.
    #[must_use]
    pub fn region_count(&self) -> usize {
        self.regions.read().len()
    }

    /// Flips every bit of the byte at `position` in a region.
    ///
    /// Used to simulate bit rot in tests.
    ///
    /// # Errors
    ///
    /// Returns an error if the region or position does not exist.
    pub fn corrupt_byte(&self, region: RegionId, position: u64) -> StorageResult<()> {
        let mut regions = self.regions.write();
        let data = regions
            .get_mut(&region)
            .ok_or(StorageError::RegionNotFound { region })?;
        let size = data.len() as u64;
        let byte = data
            .get_mut(position as usize)
            .ok_or(StorageError::ReadPastEnd {
                region,
                offset: position,
                len: 1,
                size,
            })?;
        *byte ^= 0xFF;
        Ok(())
    }

    /// Makes every subsequent `append` fail with an I/O error while `fail` is set.
    pub fn fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }

    /// Makes every subsequent `delete` fail with an I/O error while `fail` is
    /// set. The region is left in place.
    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }
}

impl StorageBackend for InMemoryBackend {
    fn create(&self, region: RegionId) -> StorageResult<()> {
        let mut regions = self.regions.write();
        if regions.contains_key(&region) {
            return Err(StorageError::RegionExists { region });
        }
        regions.insert(region, Vec::new());
        Ok(())
    }

    fn append(&self, region: RegionId, new_data: &[u8]) -> StorageResult<u64> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(StorageError::Io(io::Error::new(
                io::ErrorKind::Other,
                "injected append failure",
            )));
        }

        let mut regions = self.regions.write();
        let data = regions
            .get_mut(&region)
            .ok_or(StorageError::RegionNotFound { region })?;
        let offset = data.len() as u64;
        data.extend_from_slice(new_data);
        Ok(offset)
    }

    fn read_at(&self, region: RegionId, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let regions = self.regions.read();
        let data = regions
            .get(&region)
            .ok_or(StorageError::RegionNotFound { region })?;
        let size = data.len() as u64;
        let start = offset as usize;
        let end = start.saturating_add(len);

        if offset > size || end > data.len() {
            return Err(StorageError::ReadPastEnd {
                region,
                offset,
                len,
                size,
            });
        }

        Ok(data[start..end].to_vec())
    }

    fn size(&self, region: RegionId) -> StorageResult<u64> {
        self.regions
            .read()
            .get(&region)
            .map(|data| data.len() as u64)
            .ok_or(StorageError::RegionNotFound { region })
    }

    fn flush(&self, region: RegionId) -> StorageResult<()> {
        // Nothing is buffered, but the region must still exist
        self.size(region).map(|_| ())
    }

    fn delete(&self, region: RegionId) -> StorageResult<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StorageError::Io(io::Error::new(
                io::ErrorKind::Other,
                "injected delete failure",
            )));
        }

        self.regions
            .write()
            .remove(&region)
            .map(|_| ())
            .ok_or(StorageError::RegionNotFound { region })
    }

    fn list_regions(&self) -> StorageResult<Vec<RegionId>> {
        Ok(self.regions.read().keys().copied().collect())
    }
}
