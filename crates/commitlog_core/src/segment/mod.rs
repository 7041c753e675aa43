//! Segments: size-bounded, append-only byte regions of record batches.
//!
//! A segment is identified by the offset of its first record and backed by
//! one region of the injected [`StorageBackend`]. Exactly one segment of a
//! log is active (writable); all others are closed.
//!
//! ## Lifecycle
//!
//! ```text
//! Active --close()--> Closed --delete()--> Deleted
//!    \________________delete()________________/
//! ```
//!
//! ## Invariants
//!
//! - `base_offset` never changes
//! - `size` only grows until the segment is deleted
//! - A segment never rejects a write for capacity; the log checks
//!   [`Segment::would_exceed`] and rolls first. The first write into an empty
//!   segment is always accepted, so an oversized batch still makes progress.

mod scanner;

pub use scanner::SegmentScanner;

use crate::error::{CoreError, CoreResult};
use commitlog_storage::{RegionId, StorageBackend};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// Mutability state of a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentState {
    /// Accepts appends.
    Active,
    /// Read-only.
    Closed,
    /// Storage released; reads and writes fail.
    Deleted,
}

#[derive(Debug)]
struct SegmentInner {
    size: u64,
    state: SegmentState,
}

/// An append-only byte region holding serialized record batches.
pub struct Segment {
    backend: Arc<dyn StorageBackend>,
    region: RegionId,
    capacity: u64,
    inner: RwLock<SegmentInner>,
}

impl Segment {
    /// Creates a fresh, empty, writable segment.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot create the region.
    pub fn create(
        backend: Arc<dyn StorageBackend>,
        region: RegionId,
        capacity: u64,
    ) -> CoreResult<Self> {
        backend.create(region)?;
        Ok(Self {
            backend,
            region,
            capacity,
            inner: RwLock::new(SegmentInner {
                size: 0,
                state: SegmentState::Active,
            }),
        })
    }

    /// Attaches to an existing region as a closed segment.
    ///
    /// # Errors
    ///
    /// Returns an error if the region does not exist.
    pub fn open(
        backend: Arc<dyn StorageBackend>,
        region: RegionId,
        capacity: u64,
    ) -> CoreResult<Self> {
        let size = backend.size(region)?;
        Ok(Self {
            backend,
            region,
            capacity,
            inner: RwLock::new(SegmentInner {
                size,
                state: SegmentState::Closed,
            }),
        })
    }

    /// Returns the offset of the first record this segment holds.
    #[must_use]
    pub fn base_offset(&self) -> u64 {
        self.region.base_offset()
    }

    /// Returns the backing region.
    #[must_use]
    pub fn region(&self) -> RegionId {
        self.region
    }

    /// Returns the soft maximum size.
    #[must_use]
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Returns the bytes written so far.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.inner.read().size
    }

    /// Returns whether nothing has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> SegmentState {
        self.inner.read().state
    }

    /// Returns whether the segment no longer accepts appends.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state() != SegmentState::Active
    }

    /// Returns whether appending `len` bytes would push a non-empty segment
    /// past its capacity.
    #[must_use]
    pub fn would_exceed(&self, len: usize) -> bool {
        let size = self.size();
        size > 0 && size.saturating_add(len as u64) > self.capacity
    }

    /// Appends raw bytes at the current write position.
    ///
    /// Returns the position the bytes were written at.
    ///
    /// # Errors
    ///
    /// - [`CoreError::SegmentClosed`] if the segment is closed
    /// - [`CoreError::SegmentDeleted`] if the segment is deleted
    /// - [`CoreError::Storage`] if the backend write fails; the size is
    ///   unchanged in that case
    pub fn append(&self, data: &[u8]) -> CoreResult<u64> {
        let mut inner = self.inner.write();
        match inner.state {
            SegmentState::Active => {}
            SegmentState::Closed => {
                return Err(CoreError::SegmentClosed {
                    base_offset: self.base_offset(),
                })
            }
            SegmentState::Deleted => {
                return Err(CoreError::SegmentDeleted {
                    base_offset: self.base_offset(),
                })
            }
        }

        let position = self.backend.append(self.region, data)?;
        inner.size = position + data.len() as u64;
        Ok(position)
    }

    /// Flushes written bytes to durable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the segment is deleted or the backend fails.
    pub fn flush(&self) -> CoreResult<()> {
        if self.state() == SegmentState::Deleted {
            return Err(CoreError::SegmentDeleted {
                base_offset: self.base_offset(),
            });
        }
        self.backend.flush(self.region)?;
        Ok(())
    }

    /// Marks the segment read-only. Idempotent.
    pub fn close(&self) {
        let mut inner = self.inner.write();
        if inner.state == SegmentState::Active {
            inner.state = SegmentState::Closed;
        }
    }

    /// Makes a closed segment writable again (log recovery).
    pub(crate) fn reactivate(&self) {
        let mut inner = self.inner.write();
        if inner.state == SegmentState::Closed {
            inner.state = SegmentState::Active;
        }
    }

    /// Releases the underlying storage. Idempotent.
    ///
    /// Outstanding readers fail on their next read.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to delete the region; the
    /// segment keeps its previous state in that case.
    pub fn delete(&self) -> CoreResult<()> {
        let mut inner = self.inner.write();
        if inner.state == SegmentState::Deleted {
            return Ok(());
        }
        match self.backend.delete(self.region) {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }
        inner.state = SegmentState::Deleted;
        Ok(())
    }

    /// Returns a byte view from position 0, bounded to the current size.
    ///
    /// Each call yields an independent reader. Bytes appended after the
    /// reader is created are not visible through it.
    #[must_use]
    pub fn reader(&self) -> SegmentReader {
        SegmentReader {
            backend: Arc::clone(&self.backend),
            region: self.region,
            len: self.size(),
        }
    }

    /// Creates the empty segment that will hold a rewrite of this one.
    pub(crate) fn create_successor(&self) -> CoreResult<Segment> {
        Segment::create(
            Arc::clone(&self.backend),
            self.region.next_generation(),
            self.capacity,
        )
    }
}

impl fmt::Debug for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("Segment")
            .field("region", &self.region)
            .field("capacity", &self.capacity)
            .field("size", &inner.size)
            .field("state", &inner.state)
            .finish_non_exhaustive()
    }
}

/// A read-only byte view of a segment, bounded to a fixed length.
#[derive(Debug, Clone)]
pub struct SegmentReader {
    backend: Arc<dyn StorageBackend>,
    region: RegionId,
    len: u64,
}

impl SegmentReader {
    /// Returns the number of readable bytes.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Returns whether the view is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Reads exactly `len` bytes at `position`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::IncompleteFrame`] if the range extends past the
    /// view, or a storage error if the segment was deleted.
    pub fn read_at(&self, position: u64, len: usize) -> CoreResult<Vec<u8>> {
        let available = self.len.saturating_sub(position);
        if (len as u64) > available {
            return Err(CoreError::IncompleteFrame {
                needed: len,
                available: available as usize,
            });
        }
        Ok(self.backend.read_at(self.region, position, len)?)
    }
}
