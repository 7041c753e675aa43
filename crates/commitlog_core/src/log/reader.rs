//! Sequential reads across segment boundaries.

use crate::error::CoreResult;
use crate::record::RecordBatch;
use crate::segment::{Segment, SegmentScanner};
use std::collections::VecDeque;
use std::sync::Arc;

/// Iterator over the batches of a log, starting at a given offset.
///
/// Created by [`crate::Log::read_from`]. The reader works on a snapshot of
/// the segment list and on size-bounded segment views, so it never sees a
/// partially written frame. Batches appended after a segment's scan started
/// are not returned.
///
/// The first batch returned is the one containing the requested offset, or
/// the first batch after it if that offset was compacted away. After an
/// error the reader is finished.
#[derive(Debug)]
pub struct LogReader {
    pending: VecDeque<Arc<Segment>>,
    scanner: Option<SegmentScanner>,
    from: u64,
}

impl LogReader {
    pub(crate) fn new(segments: Vec<Arc<Segment>>, from: u64) -> Self {
        Self {
            pending: segments.into(),
            scanner: None,
            from,
        }
    }

    /// Returns the offset the reader was positioned at.
    #[must_use]
    pub fn start_offset(&self) -> u64 {
        self.from
    }
}

impl Iterator for LogReader {
    type Item = CoreResult<RecordBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.scanner.is_none() {
                let segment = self.pending.pop_front()?;
                self.scanner = Some(SegmentScanner::new(&segment));
            }

            match self.scanner.as_mut()?.next_batch() {
                Ok(Some(batch)) if batch.next_offset() <= self.from => {}
                Ok(Some(batch)) => return Some(Ok(batch)),
                Ok(None) => self.scanner = None,
                Err(e) => {
                    self.pending.clear();
                    self.scanner = None;
                    return Some(Err(e));
                }
            }
        }
    }
}
