//! Size-based retention.

use super::{total_size, CleanStats};
use crate::error::CoreResult;
use crate::segment::Segment;
use std::sync::Arc;

/// Drops the oldest segments until the rest fit `max_log_bytes`.
///
/// The newest segment is always kept, even if it alone exceeds the bound.
/// The cleaner only selects; the log deletes the dropped segments when it
/// swaps the result in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteCleaner {
    max_log_bytes: u64,
}

impl DeleteCleaner {
    /// Creates a cleaner for the given bound.
    #[must_use]
    pub const fn new(max_log_bytes: u64) -> Self {
        Self { max_log_bytes }
    }

    /// Returns the byte bound.
    #[must_use]
    pub const fn max_log_bytes(&self) -> u64 {
        self.max_log_bytes
    }

    /// Returns how many of the oldest segments must go.
    #[must_use]
    pub fn evict_count(&self, segments: &[Arc<Segment>]) -> usize {
        let mut total = total_size(segments);
        let mut count = 0;
        for segment in segments.iter().take(segments.len().saturating_sub(1)) {
            if total <= self.max_log_bytes {
                break;
            }
            total -= segment.size();
            count += 1;
        }
        count
    }

    /// Returns the retained suffix of `segments`.
    ///
    /// # Errors
    ///
    /// Never fails; the signature matches the other cleaners.
    pub fn clean(&self, segments: &[Arc<Segment>]) -> CoreResult<Vec<Arc<Segment>>> {
        self.clean_with_stats(segments).map(|(kept, _)| kept)
    }

    /// Like [`DeleteCleaner::clean`], also returning statistics.
    ///
    /// # Errors
    ///
    /// Never fails; the signature matches the other cleaners.
    pub fn clean_with_stats(
        &self,
        segments: &[Arc<Segment>],
    ) -> CoreResult<(Vec<Arc<Segment>>, CleanStats)> {
        let kept = segments[self.evict_count(segments)..].to_vec();
        let stats = CleanStats {
            segments_in: segments.len(),
            segments_out: kept.len(),
            bytes_in: total_size(segments),
            bytes_out: total_size(&kept),
            ..CleanStats::default()
        };
        Ok((kept, stats))
    }
}
