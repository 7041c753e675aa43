//! Sequential batch scanner over one segment.
//!
//! A scanner reads frames one by one through a [`SegmentReader`], so memory
//! stays proportional to one batch regardless of segment size.
//!
//! ## Termination
//!
//! - **Incomplete frame** (including zero bytes left): the normal end of a
//!   segment. `next_batch` returns `Ok(None)`.
//! - **Corruption** or **storage failure**: fatal for this scan. `next_batch`
//!   returns the error once.
//!
//! Either way the scanner is exhausted afterwards and only returns
//! `Ok(None)`. To restart, create a new scanner.

use super::{Segment, SegmentReader};
use crate::error::{CoreError, CoreResult};
use crate::record::{RecordBatch, BATCH_HEADER_SIZE};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Reading,
    Exhausted,
}

/// A single-use, forward-only reader of record batches.
///
/// # Example
///
/// ```rust
/// use commitlog_core::{Record, RecordBatch, Segment, SegmentScanner};
/// use commitlog_storage::{InMemoryBackend, RegionId};
/// use std::sync::Arc;
///
/// let backend = Arc::new(InMemoryBackend::new());
/// let segment = Segment::create(backend, RegionId::initial(0), 1 << 20)?;
/// segment.append(&RecordBatch::new(0, vec![Record::new("k", "v")]).encode()?)?;
///
/// let mut scanner = SegmentScanner::new(&segment);
/// while let Some(batch) = scanner.next_batch()? {
///     assert_eq!(batch.base_offset(), 0);
/// }
/// # Ok::<(), commitlog_core::CoreError>(())
/// ```
#[derive(Debug)]
pub struct SegmentScanner {
    reader: SegmentReader,
    position: u64,
    /// Lowest base offset the next batch may carry.
    next_offset: u64,
    state: ScanState,
}

impl SegmentScanner {
    /// Creates a scanner positioned at the start of `segment`.
    ///
    /// The scanner sees the bytes written before this call only.
    #[must_use]
    pub fn new(segment: &Segment) -> Self {
        Self {
            reader: segment.reader(),
            position: 0,
            next_offset: segment.base_offset(),
            state: ScanState::Reading,
        }
    }

    /// Returns the byte position of the next frame.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Returns whether the scanner has terminated.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.state == ScanState::Exhausted
    }

    /// Decodes the next batch.
    ///
    /// Returns `Ok(Some(batch))` for a batch, `Ok(None)` at the end of the
    /// segment.
    ///
    /// # Errors
    ///
    /// Returns a corruption error ([`CoreError::ChecksumMismatch`] or
    /// [`CoreError::CorruptRecord`]) or a storage error. The scanner is
    /// exhausted afterwards.
    pub fn next_batch(&mut self) -> CoreResult<Option<RecordBatch>> {
        if self.state == ScanState::Exhausted {
            return Ok(None);
        }

        match self.read_frame() {
            Ok(batch) => Ok(Some(batch)),
            Err(e) if e.is_incomplete() => {
                self.state = ScanState::Exhausted;
                Ok(None)
            }
            Err(e) => {
                self.state = ScanState::Exhausted;
                debug!(position = self.position, error = %e, "segment scan failed");
                Err(e)
            }
        }
    }

    fn read_frame(&mut self) -> CoreResult<RecordBatch> {
        let available = self.reader.len().saturating_sub(self.position) as usize;
        if available < BATCH_HEADER_SIZE {
            return Err(CoreError::IncompleteFrame {
                needed: BATCH_HEADER_SIZE,
                available,
            });
        }

        let header = self.reader.read_at(self.position, BATCH_HEADER_SIZE)?;
        let frame_len = RecordBatch::frame_length(&header).unwrap_or(BATCH_HEADER_SIZE);
        if available < frame_len {
            return Err(CoreError::IncompleteFrame {
                needed: frame_len,
                available,
            });
        }

        let frame = self.reader.read_at(self.position, frame_len)?;
        let batch = RecordBatch::decode(&frame)?;
        if batch.base_offset() < self.next_offset {
            return Err(CoreError::corrupt_record(format!(
                "batch offset {} at position {} is below {}",
                batch.base_offset(),
                self.position,
                self.next_offset
            )));
        }

        self.position += frame_len as u64;
        self.next_offset = batch.next_offset();
        Ok(batch)
    }
}

impl Iterator for SegmentScanner {
    type Item = CoreResult<RecordBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_batch().transpose()
    }
}
