//! File-based storage backend for persistent storage.
//!
//! Layout of a log directory:
//!
//! ```text
//! <log_dir>/
//! ├─ LOCK                            # Advisory lock for single-writer
//! ├─ 00000000000000000000.0.log      # Region for the segment at offset 0
//! └─ 00000000000000001024.0.log      # Region for the segment at offset 1024
//! ```

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use crate::region::RegionId;
use fs2::FileExt;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const LOCK_FILE: &str = "LOCK";

#[derive(Debug)]
struct RegionFile {
    file: File,
    size: u64,
}

/// A directory-backed storage backend with one file per region.
///
/// Data survives process restarts. Opening the backend takes an exclusive
/// advisory lock on `LOCK` inside the directory, so only one process can
/// write a given log at a time.
///
/// # Durability
///
/// - `append` writes through to the OS
/// - `flush()` calls `File::sync_data()` on the region file
///
/// # Thread Safety
///
/// The region table is guarded by a read/write lock and every region file by
/// its own mutex, so reads of different regions proceed in parallel.
///
/// # Example
///
/// ```no_run
/// use commitlog_storage::{FileBackend, RegionId, StorageBackend};
/// use std::path::Path;
///
/// let backend = FileBackend::open(Path::new("partition-0")).unwrap();
/// let region = RegionId::initial(0);
/// backend.create(region).unwrap();
/// backend.append(region, b"persistent data").unwrap();
/// backend.flush(region).unwrap();
/// ```
#[derive(Debug)]
pub struct FileBackend {
    dir: PathBuf,
    regions: RwLock<BTreeMap<RegionId, Arc<Mutex<RegionFile>>>>,
    _lock_file: File,
}

impl FileBackend {
    /// Opens or creates a log directory.
    ///
    /// Existing region files are attached; files whose names are not region
    /// names are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Locked`] if another process holds the
    /// directory, or an I/O error.
    pub fn open(dir: &Path) -> StorageResult<Self> {
        fs::create_dir_all(dir)?;

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(dir.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(StorageError::Locked {
                path: dir.to_path_buf(),
            });
        }

        let mut regions = BTreeMap::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(region) = name.to_str().and_then(RegionId::from_file_name) else {
                continue;
            };

            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .open(entry.path())?;
            let size = file.metadata()?.len();
            regions.insert(region, Arc::new(Mutex::new(RegionFile { file, size })));
        }

        Ok(Self {
            dir: dir.to_path_buf(),
            regions: RwLock::new(regions),
            _lock_file: lock_file,
        })
    }

    /// Returns the log directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Returns the path of a region's file.
    #[must_use]
    pub fn region_path(&self, region: RegionId) -> PathBuf {
        self.dir.join(region.file_name())
    }

    fn region(&self, region: RegionId) -> StorageResult<Arc<Mutex<RegionFile>>> {
        self.regions
            .read()
            .get(&region)
            .cloned()
            .ok_or(StorageError::RegionNotFound { region })
    }
}

impl StorageBackend for FileBackend {
    fn create(&self, region: RegionId) -> StorageResult<()> {
        let mut regions = self.regions.write();
        if regions.contains_key(&region) {
            return Err(StorageError::RegionExists { region });
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(self.region_path(region))?;
        regions.insert(region, Arc::new(Mutex::new(RegionFile { file, size: 0 })));
        Ok(())
    }

    fn append(&self, region: RegionId, data: &[u8]) -> StorageResult<u64> {
        let handle = self.region(region)?;
        let mut region_file = handle.lock();
        let offset = region_file.size;
        if data.is_empty() {
            return Ok(offset);
        }

        region_file.file.seek(SeekFrom::Start(offset))?;
        if let Err(e) = region_file.file.write_all(data) {
            // Drop whatever part of the write landed so the size stays exact
            region_file.file.set_len(offset)?;
            return Err(e.into());
        }
        region_file.size += data.len() as u64;

        Ok(offset)
    }

    fn read_at(&self, region: RegionId, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let handle = self.region(region)?;
        let mut region_file = handle.lock();
        let size = region_file.size;
        let end = offset.saturating_add(len as u64);

        if offset > size || end > size {
            return Err(StorageError::ReadPastEnd {
                region,
                offset,
                len,
                size,
            });
        }

        if len == 0 {
            return Ok(Vec::new());
        }

        region_file.file.seek(SeekFrom::Start(offset))?;
        let mut buffer = vec![0u8; len];
        region_file.file.read_exact(&mut buffer)?;

        Ok(buffer)
    }

    fn size(&self, region: RegionId) -> StorageResult<u64> {
        Ok(self.region(region)?.lock().size)
    }

    fn flush(&self, region: RegionId) -> StorageResult<()> {
        let handle = self.region(region)?;
        let mut region_file = handle.lock();
        region_file.file.flush()?;
        region_file.file.sync_data()?;
        Ok(())
    }

    fn delete(&self, region: RegionId) -> StorageResult<()> {
        let mut regions = self.regions.write();
        if regions.remove(&region).is_none() {
            return Err(StorageError::RegionNotFound { region });
        }
        fs::remove_file(self.region_path(region))?;
        Ok(())
    }

    fn list_regions(&self) -> StorageResult<Vec<RegionId>> {
        Ok(self.regions.read().keys().copied().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn file_open_creates_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("partition-0");

        let backend = FileBackend::open(&path).unwrap();
        assert!(path.join(LOCK_FILE).exists());
        assert!(backend.list_regions().unwrap().is_empty());
        assert_eq!(backend.path(), path);
    }

    #[test]
    fn file_append_and_read() {
        let dir = tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).unwrap();
        let region = RegionId::initial(0);
        backend.create(region).unwrap();

        assert_eq!(backend.append(region, b"hello").unwrap(), 0);
        assert_eq!(backend.append(region, b" world").unwrap(), 5);
        assert_eq!(backend.size(region).unwrap(), 11);
        assert_eq!(backend.read_at(region, 0, 11).unwrap(), b"hello world");
        assert_eq!(backend.read_at(region, 6, 5).unwrap(), b"world");
    }

    #[test]
    fn file_region_file_name() {
        let dir = tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).unwrap();
        let region = RegionId::new(1024, 2);
        backend.create(region).unwrap();

        assert!(dir.path().join("00000000000000001024.2.log").exists());
    }

    #[test]
    fn file_read_past_end_fails() {
        let dir = tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).unwrap();
        let region = RegionId::initial(0);
        backend.create(region).unwrap();
        backend.append(region, b"hello").unwrap();

        let result = backend.read_at(region, 10, 5);
        assert!(matches!(result, Err(StorageError::ReadPastEnd { .. })));
    }

    #[test]
    fn file_persistence() {
        let dir = tempdir().unwrap();
        let region = RegionId::initial(7);

        {
            let backend = FileBackend::open(dir.path()).unwrap();
            backend.create(region).unwrap();
            backend.append(region, b"persistent data").unwrap();
            backend.flush(region).unwrap();
        }

        {
            let backend = FileBackend::open(dir.path()).unwrap();
            assert_eq!(backend.list_regions().unwrap(), vec![region]);
            assert_eq!(backend.size(region).unwrap(), 15);
            assert_eq!(backend.read_at(region, 0, 15).unwrap(), b"persistent data");
        }
    }

    #[test]
    fn file_ignores_foreign_files() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("notes.txt"), b"hi").unwrap();

        let backend = FileBackend::open(dir.path()).unwrap();
        assert!(backend.list_regions().unwrap().is_empty());
    }

    #[test]
    fn file_delete_removes_file() {
        let dir = tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).unwrap();
        let region = RegionId::initial(0);
        backend.create(region).unwrap();
        backend.append(region, b"x").unwrap();

        backend.delete(region).unwrap();
        assert!(!backend.region_path(region).exists());
        assert!(backend.read_at(region, 0, 1).unwrap_err().is_not_found());
    }

    #[test]
    fn file_create_twice_fails() {
        let dir = tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).unwrap();
        let region = RegionId::initial(0);
        backend.create(region).unwrap();

        assert!(matches!(
            backend.create(region),
            Err(StorageError::RegionExists { .. })
        ));
    }

    #[test]
    fn file_second_open_is_locked() {
        let dir = tempdir().unwrap();
        let _first = FileBackend::open(dir.path()).unwrap();

        let second = FileBackend::open(dir.path());
        assert!(matches!(second, Err(StorageError::Locked { .. })));
    }

    #[test]
    fn file_empty_append() {
        let dir = tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).unwrap();
        let region = RegionId::initial(0);
        backend.create(region).unwrap();
        backend.append(region, b"x").unwrap();

        assert_eq!(backend.append(region, b"").unwrap(), 1);
        assert_eq!(backend.size(region).unwrap(), 1);
    }
}
