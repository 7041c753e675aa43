//! Log cleaning.
//!
//! A cleaner takes an ordered run of closed segments and produces the
//! segments that should replace them. Two policies exist:
//!
//! - [`DeleteCleaner`] drops the oldest segments until the run fits a byte
//!   bound.
//! - [`CompactCleaner`] rewrites every segment so that only the latest
//!   record per key survives.
//!
//! [`Cleaner`] is the closed set of both behind one `clean` capability. The
//! result is handed to [`crate::Log::replace_segments`].
//!
//! ## Invariants
//!
//! - Cleaning never changes the offset of a surviving record
//! - Output is ordered by base offset and never longer than the input
//! - On error the input segments are untouched and any partial output is
//!   deleted

mod compact;
mod delete;

pub use compact::CompactCleaner;
pub use delete::DeleteCleaner;

use crate::config::{CleanupPolicy, LogConfig};
use crate::error::CoreResult;
use crate::segment::Segment;
use std::sync::Arc;

/// Statistics of one cleaning pass.
///
/// Record counts are only tracked by compaction, which reads every record;
/// the delete policy works on whole segments and leaves them at zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanStats {
    /// Segments handed to the cleaner.
    pub segments_in: usize,
    /// Segments produced.
    pub segments_out: usize,
    /// Records read.
    pub records_in: usize,
    /// Records written.
    pub records_out: usize,
    /// Bytes across the input segments.
    pub bytes_in: u64,
    /// Bytes across the output segments.
    pub bytes_out: u64,
}

impl CleanStats {
    /// Returns the number of records removed.
    #[must_use]
    pub fn records_removed(&self) -> usize {
        self.records_in.saturating_sub(self.records_out)
    }

    /// Returns the bytes reclaimed, or zero if the output grew.
    #[must_use]
    pub fn bytes_saved(&self) -> u64 {
        self.bytes_in.saturating_sub(self.bytes_out)
    }

    /// Returns how many bytes the output exceeds the input by, or zero if it
    /// did not grow.
    ///
    /// Compaction can grow a segment when removed records are smaller than
    /// the batch header each new run of survivors needs.
    #[must_use]
    pub fn bytes_grown(&self) -> u64 {
        self.bytes_out.saturating_sub(self.bytes_in)
    }
}

/// A cleaning strategy.
#[derive(Debug, Clone)]
pub enum Cleaner {
    /// Size-based retention.
    Delete(DeleteCleaner),
    /// Key-based compaction.
    Compact(CompactCleaner),
}

impl Cleaner {
    /// Selects the cleaner named by the configuration's cleanup policy.
    #[must_use]
    pub fn for_policy(config: &LogConfig) -> Self {
        match config.cleanup_policy {
            CleanupPolicy::Delete => Self::Delete(DeleteCleaner::new(config.max_log_bytes)),
            CleanupPolicy::Compact => Self::Compact(CompactCleaner::new()),
        }
    }

    /// Produces the segments that replace `segments`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::CleanAborted`] if the pass fails.
    pub fn clean(&self, segments: &[Arc<Segment>]) -> CoreResult<Vec<Arc<Segment>>> {
        self.clean_with_stats(segments).map(|(cleaned, _)| cleaned)
    }

    /// Like [`Cleaner::clean`], also returning statistics.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::CleanAborted`] if the pass fails.
    pub fn clean_with_stats(
        &self,
        segments: &[Arc<Segment>],
    ) -> CoreResult<(Vec<Arc<Segment>>, CleanStats)> {
        match self {
            Self::Delete(cleaner) => cleaner.clean_with_stats(segments),
            Self::Compact(cleaner) => cleaner.clean_with_stats(segments),
        }
    }
}

impl From<DeleteCleaner> for Cleaner {
    fn from(cleaner: DeleteCleaner) -> Self {
        Self::Delete(cleaner)
    }
}

impl From<CompactCleaner> for Cleaner {
    fn from(cleaner: CompactCleaner) -> Self {
        Self::Compact(cleaner)
    }
}

fn total_size(segments: &[Arc<Segment>]) -> u64 {
    segments.iter().map(|s| s.size()).sum()
}
