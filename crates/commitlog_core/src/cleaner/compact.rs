//! Key-based compaction.
//!
//! ## Algorithm
//!
//! ```text
//! Pass 1: scan every input segment, key -> offset of its latest record
//! Pass 2: for each input segment, write the survivors into a successor
//!         segment (same base offset, next generation)
//! ```
//!
//! A record survives if it has no key, or if its offset is the one recorded
//! for its key in pass 1. Tombstones follow the same rule: a tombstone that
//! is the latest record for its key is kept.
//!
//! Survivors of one input batch may leave gaps in the offset range. Each
//! contiguous run of survivors is written as its own batch so that every
//! record keeps its original offset. Each extra run costs a batch header,
//! so a rewrite can end up larger than its source and its capacity.

use super::{total_size, CleanStats};
use crate::error::{CoreError, CoreResult};
use crate::record::{Record, RecordBatch};
use crate::segment::{Segment, SegmentScanner};
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Key to the offset of its latest record.
type KeyIndex = HashMap<Bytes, u64>;

/// Keeps only the latest record per key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompactCleaner;

impl CompactCleaner {
    /// Creates a compaction cleaner.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Rewrites `segments` keeping only the latest record per key.
    ///
    /// Returns the cleaned segments in base-offset order. A segment whose
    /// records were all superseded produces no output. The inputs are not
    /// modified.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::CleanAborted`] wrapping the first corruption or
    /// storage failure. Any output written so far is deleted.
    pub fn clean(&self, segments: &[Arc<Segment>]) -> CoreResult<Vec<Arc<Segment>>> {
        self.clean_with_stats(segments).map(|(cleaned, _)| cleaned)
    }

    /// Like [`CompactCleaner::clean`], also returning statistics.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::CleanAborted`] wrapping the first failure.
    pub fn clean_with_stats(
        &self,
        segments: &[Arc<Segment>],
    ) -> CoreResult<(Vec<Arc<Segment>>, CleanStats)> {
        let mut stats = CleanStats {
            segments_in: segments.len(),
            bytes_in: total_size(segments),
            ..CleanStats::default()
        };
        if segments.is_empty() {
            return Ok((Vec::new(), stats));
        }

        let latest = build_index(segments).map_err(CoreError::clean_aborted)?;

        let mut cleaned: Vec<Arc<Segment>> = Vec::with_capacity(segments.len());
        for source in segments {
            match rewrite(source, &latest, &mut stats) {
                Ok(Some(segment)) => cleaned.push(Arc::new(segment)),
                Ok(None) => {}
                Err(e) => {
                    discard(&cleaned);
                    return Err(CoreError::clean_aborted(e));
                }
            }
        }

        stats.segments_out = cleaned.len();
        stats.bytes_out = total_size(&cleaned);
        info!(
            segments_in = stats.segments_in,
            segments_out = stats.segments_out,
            records_in = stats.records_in,
            records_out = stats.records_out,
            bytes_saved = stats.bytes_saved(),
            bytes_grown = stats.bytes_grown(),
            keys = latest.len(),
            "compaction finished"
        );
        Ok((cleaned, stats))
    }
}

/// Pass 1: maps every key to the offset of its latest record.
fn build_index(segments: &[Arc<Segment>]) -> CoreResult<KeyIndex> {
    let mut latest = KeyIndex::new();
    for segment in segments {
        for batch in SegmentScanner::new(segment) {
            for (offset, record) in batch?.iter() {
                if let Some(key) = &record.key {
                    latest.insert(key.clone(), offset);
                }
            }
        }
    }
    Ok(latest)
}

/// Pass 2 for one segment. Returns `None` when nothing survives.
fn rewrite(
    source: &Segment,
    latest: &KeyIndex,
    stats: &mut CleanStats,
) -> CoreResult<Option<Segment>> {
    let target = source.create_successor()?;
    if let Err(e) = copy_survivors(source, &target, latest, stats) {
        release(&target);
        return Err(e);
    }

    if target.is_empty() {
        debug!(base_offset = source.base_offset(), "segment fully superseded");
        target.delete()?;
        return Ok(None);
    }
    target.close();
    Ok(Some(target))
}

fn copy_survivors(
    source: &Segment,
    target: &Segment,
    latest: &KeyIndex,
    stats: &mut CleanStats,
) -> CoreResult<()> {
    for batch in SegmentScanner::new(source) {
        let batch = batch?;
        stats.records_in += batch.len();
        for run in surviving_runs(batch, latest) {
            stats.records_out += run.len();
            target.append(&run.encode()?)?;
        }
    }
    Ok(())
}

/// Splits the survivors of `batch` into batches of contiguous offsets.
fn surviving_runs(batch: RecordBatch, latest: &KeyIndex) -> Vec<RecordBatch> {
    let base_offset = batch.base_offset();
    let mut runs: Vec<(u64, Vec<Record>)> = Vec::new();

    for (offset, record) in (base_offset..).zip(batch.into_records()) {
        let keep = match &record.key {
            None => true,
            Some(key) => latest.get(key) == Some(&offset),
        };
        if !keep {
            continue;
        }
        match runs.last_mut() {
            Some((start, records)) if *start + records.len() as u64 == offset => {
                records.push(record);
            }
            _ => runs.push((offset, vec![record])),
        }
    }

    runs.into_iter()
        .map(|(start, records)| RecordBatch::new(start, records))
        .collect()
}

fn release(segment: &Segment) {
    if let Err(e) = segment.delete() {
        warn!(region = %segment.region(), error = %e, "failed to delete partial output");
    }
}

fn discard(segments: &[Arc<Segment>]) {
    for segment in segments {
        release(segment);
    }
}
