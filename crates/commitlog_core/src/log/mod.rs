//! The log manager.
//!
//! A [`Log`] owns an ordered list of segments and the next offset to assign.
//! The newest segment is the only active one; appends go there until it is
//! full, at which point the log rolls to a fresh segment based at the next
//! offset.
//!
//! ```text
//! segments: [ 0 (closed) | 2 (closed) | 4 (active) ]
//!                                          ^ append at next_offset
//! ```
//!
//! ## Invariants
//!
//! - The segment list is never empty and is ordered by base offset
//! - Only the last segment is active
//! - Assigned base offsets are strictly increasing
//! - After an append, the total size is within `max_log_bytes` or only the
//!   active segment remains

mod reader;

pub use reader::LogReader;

use crate::cleaner::{CleanStats, Cleaner, DeleteCleaner};
use crate::config::LogConfig;
use crate::error::{CoreError, CoreResult};
use crate::record::{Record, RecordBatch};
use crate::segment::{Segment, SegmentScanner};
use commitlog_storage::{RegionId, StorageBackend};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

struct LogInner {
    segments: Vec<Arc<Segment>>,
    next_offset: u64,
}

impl LogInner {
    fn active(&self) -> &Arc<Segment> {
        // The list is never empty while the log exists.
        &self.segments[self.segments.len() - 1]
    }
}

/// A segmented, append-only commit log.
pub struct Log {
    backend: Arc<dyn StorageBackend>,
    config: LogConfig,
    inner: RwLock<LogInner>,
}

impl Log {
    /// Creates an empty log with one active segment at offset 0.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the first segment
    /// cannot be created (for example because the backend already holds one).
    pub fn new(backend: Arc<dyn StorageBackend>, config: LogConfig) -> CoreResult<Self> {
        config.validate()?;
        let segment = Segment::create(
            Arc::clone(&backend),
            RegionId::initial(0),
            config.max_segment_bytes,
        )?;
        Ok(Self {
            backend,
            config,
            inner: RwLock::new(LogInner {
                segments: vec![Arc::new(segment)],
                next_offset: 0,
            }),
        })
    }

    /// Opens the log held by `backend`, creating it if the backend is empty.
    ///
    /// Recovery steps:
    /// 1. Where several regions share a base offset, keep the lowest
    ///    generation and delete the rest (leftovers of an interrupted
    ///    compaction).
    /// 2. Scan the newest segment to find the next offset. A torn trailing
    ///    frame ends the scan; new appends then go to a fresh segment so the
    ///    torn bytes are never followed by valid ones.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the backend fails,
    /// or the newest segment holds a corrupt frame.
    pub fn open(backend: Arc<dyn StorageBackend>, config: LogConfig) -> CoreResult<Self> {
        config.validate()?;

        let mut regions = backend.list_regions()?;
        regions.sort_unstable();
        if regions.is_empty() {
            return Self::new(backend, config);
        }

        let mut segments: Vec<Arc<Segment>> = Vec::with_capacity(regions.len());
        let mut stale = 0usize;
        for region in regions {
            if segments.last().map(|s| s.base_offset()) == Some(region.base_offset()) {
                debug!(%region, "deleting stale compaction output");
                backend.delete(region)?;
                stale += 1;
                continue;
            }
            let segment = Segment::open(Arc::clone(&backend), region, config.max_segment_bytes)?;
            segments.push(Arc::new(segment));
        }

        let Some(newest) = segments.last().cloned() else {
            return Self::new(backend, config);
        };
        let mut scanner = SegmentScanner::new(&newest);
        let mut next_offset = newest.base_offset();
        while let Some(batch) = scanner.next_batch()? {
            next_offset = batch.next_offset();
        }

        let torn = scanner.position() < newest.size();
        if torn {
            warn!(
                region = %newest.region(),
                valid_bytes = scanner.position(),
                size = newest.size(),
                "torn frame at end of log"
            );
            if next_offset == newest.base_offset() {
                newest.delete()?;
                segments.pop();
            }
            let fresh = Segment::create(
                Arc::clone(&backend),
                RegionId::initial(next_offset),
                config.max_segment_bytes,
            )?;
            segments.push(Arc::new(fresh));
        } else {
            newest.reactivate();
        }

        info!(
            segments = segments.len(),
            next_offset,
            stale_regions = stale,
            "log recovered"
        );
        Ok(Self {
            backend,
            config,
            inner: RwLock::new(LogInner {
                segments,
                next_offset,
            }),
        })
    }

    /// Appends a batch, assigning it the next offset.
    ///
    /// Returns the base offset assigned to the batch.
    ///
    /// # Errors
    ///
    /// - [`CoreError::EmptyBatch`] if the batch has no records
    /// - an encoding or storage error; the next offset is unchanged in that
    ///   case
    ///
    /// With `sync_on_append`, a flush failure is returned after the batch
    /// has been written and its offsets consumed.
    pub fn append(&self, batch: RecordBatch) -> CoreResult<u64> {
        if batch.is_empty() {
            return Err(CoreError::EmptyBatch);
        }

        let mut inner = self.inner.write();
        let base_offset = inner.next_offset;
        let batch = batch.with_base_offset(base_offset);
        let frame = batch.encode()?;

        if inner.active().would_exceed(frame.len()) {
            self.roll_locked(&mut inner)?;
        }
        let active = Arc::clone(inner.active());
        active.append(&frame)?;
        inner.next_offset = batch.next_offset();

        self.enforce_retention(&mut inner);
        drop(inner);

        if self.config.sync_on_append {
            active.flush()?;
        }
        Ok(base_offset)
    }

    /// Appends records as one batch.
    ///
    /// # Errors
    ///
    /// See [`Log::append`].
    pub fn append_records(&self, records: Vec<Record>) -> CoreResult<u64> {
        self.append(RecordBatch::from_records(records))
    }

    /// Returns a snapshot of every segment, oldest first, including the
    /// active one.
    #[must_use]
    pub fn segments(&self) -> Vec<Arc<Segment>> {
        self.inner.read().segments.clone()
    }

    /// Returns a snapshot of the closed segments, oldest first.
    #[must_use]
    pub fn closed_segments(&self) -> Vec<Arc<Segment>> {
        let inner = self.inner.read();
        inner.segments[..inner.segments.len() - 1].to_vec()
    }

    /// Closes the active segment and starts a new one at the next offset.
    ///
    /// Does nothing while the active segment is empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the new segment cannot be created; the active
    /// segment stays writable in that case.
    pub fn roll(&self) -> CoreResult<()> {
        let mut inner = self.inner.write();
        if inner.active().is_empty() {
            return Ok(());
        }
        self.roll_locked(&mut inner)
    }

    /// Swaps `old`, a prefix of the closed segments, for `new`.
    ///
    /// `new` must be closed segments ordered by base offset, all inside the
    /// offset range `old` covered. Segments of `old` that do not appear in
    /// `new` are deleted after the swap; deletion failures are logged.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidOperation`] and changes nothing if the
    /// arguments break these rules.
    pub fn replace_segments(&self, old: &[Arc<Segment>], new: &[Arc<Segment>]) -> CoreResult<()> {
        let mut inner = self.inner.write();
        Self::check_replacement(&inner.segments, old, new)?;

        inner.segments.splice(..old.len(), new.iter().cloned());
        drop(inner);

        let mut deleted = 0usize;
        for segment in old {
            if !new.iter().any(|n| n.region() == segment.region()) {
                discard(segment);
                deleted += 1;
            }
        }
        debug!(
            replaced = old.len(),
            replacements = new.len(),
            deleted,
            "segments replaced"
        );
        Ok(())
    }

    fn check_replacement(
        current: &[Arc<Segment>],
        old: &[Arc<Segment>],
        new: &[Arc<Segment>],
    ) -> CoreResult<()> {
        if old.is_empty() {
            return if new.is_empty() {
                Ok(())
            } else {
                Err(CoreError::invalid_operation(
                    "cannot insert segments without replacing any",
                ))
            };
        }
        if old.len() >= current.len() {
            return Err(CoreError::invalid_operation(
                "replacement must not include the active segment",
            ));
        }
        let is_prefix = current
            .iter()
            .zip(old)
            .all(|(c, o)| c.region() == o.region());
        if !is_prefix {
            return Err(CoreError::invalid_operation(
                "replaced segments are not a prefix of the log",
            ));
        }

        let start = old[0].base_offset();
        let end = current[old.len()].base_offset();
        let mut previous: Option<u64> = None;
        for segment in new {
            let base = segment.base_offset();
            if base < start || base >= end {
                return Err(CoreError::invalid_operation(format!(
                    "replacement segment {base} is outside [{start}, {end})"
                )));
            }
            if previous.is_some_and(|p| p >= base) {
                return Err(CoreError::invalid_operation(
                    "replacement segments are not ordered",
                ));
            }
            if !segment.is_closed() {
                return Err(CoreError::invalid_operation(format!(
                    "replacement segment {base} is still active"
                )));
            }
            previous = Some(base);
        }
        Ok(())
    }

    /// Cleans the closed segments with `cleaner` and swaps in the result.
    ///
    /// # Errors
    ///
    /// Returns the cleaner's error, or the replacement error if the segment
    /// list changed during the pass (the cleaned output is deleted then).
    pub fn compact(&self, cleaner: &Cleaner) -> CoreResult<CleanStats> {
        let old = self.closed_segments();
        let (new, stats) = cleaner.clean_with_stats(&old)?;

        if let Err(e) = self.replace_segments(&old, &new) {
            for segment in &new {
                if !old.iter().any(|o| o.region() == segment.region()) {
                    discard(segment);
                }
            }
            return Err(e);
        }
        Ok(stats)
    }

    /// Returns a reader starting at the batch that contains `offset`.
    #[must_use]
    pub fn read_from(&self, offset: u64) -> LogReader {
        let segments = self.segments();
        let first = segments
            .iter()
            .rposition(|s| s.base_offset() <= offset)
            .unwrap_or(0);
        LogReader::new(segments[first..].to_vec(), offset)
    }

    /// Returns the offset the next record will receive.
    #[must_use]
    pub fn newest_offset(&self) -> u64 {
        self.inner.read().next_offset
    }

    /// Returns the base offset of the oldest segment.
    #[must_use]
    pub fn oldest_offset(&self) -> u64 {
        self.inner.read().segments[0].base_offset()
    }

    /// Returns the bytes held across all segments.
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.inner.read().segments.iter().map(|s| s.size()).sum()
    }

    /// Returns the number of segments.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.inner.read().segments.len()
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Flushes the active segment.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub fn flush(&self) -> CoreResult<()> {
        let active = Arc::clone(self.inner.read().active());
        active.flush()
    }

    /// Deletes every segment, consuming the log.
    ///
    /// # Errors
    ///
    /// Attempts every segment and returns the first failure.
    pub fn delete(self) -> CoreResult<()> {
        let inner = self.inner.into_inner();
        let mut first_error = None;
        for segment in &inner.segments {
            if let Err(e) = segment.delete() {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn roll_locked(&self, inner: &mut LogInner) -> CoreResult<()> {
        let segment = Segment::create(
            Arc::clone(&self.backend),
            RegionId::initial(inner.next_offset),
            self.config.max_segment_bytes,
        )?;
        let previous = inner.active();
        previous.close();
        debug!(
            closed = previous.base_offset(),
            closed_size = previous.size(),
            base_offset = inner.next_offset,
            "rolled to new segment"
        );
        inner.segments.push(Arc::new(segment));
        Ok(())
    }

    fn enforce_retention(&self, inner: &mut LogInner) {
        let evict = DeleteCleaner::new(self.config.max_log_bytes).evict_count(&inner.segments);
        for segment in inner.segments.drain(..evict) {
            debug!(base_offset = segment.base_offset(), "retention evicted segment");
            discard(&segment);
        }
    }
}

impl fmt::Debug for Log {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("Log")
            .field("config", &self.config)
            .field("segments", &inner.segments.len())
            .field("next_offset", &inner.next_offset)
            .finish_non_exhaustive()
    }
}

/// Best-effort deletion.
fn discard(segment: &Segment) {
    if let Err(e) = segment.delete() {
        warn!(region = %segment.region(), error = %e, "failed to delete segment");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleaner::CompactCleaner;
    use crate::config::CleanupPolicy;
    use crate::segment::SegmentState;
    use commitlog_storage::InMemoryBackend;
    use proptest::prelude::*;

    fn record(key: &str, value: &str) -> Record {
        Record::from_parts(
            Some(key.to_owned().into()),
            Some(value.to_owned().into()),
            0,
        )
    }

    fn frame_size(key: &str, value: &str) -> u64 {
        RecordBatch::new(0, vec![record(key, value)]).encoded_size() as u64
    }

    fn memory_log(config: LogConfig) -> (Arc<InMemoryBackend>, Log) {
        let backend = Arc::new(InMemoryBackend::new());
        let log = Log::new(backend.clone(), config).unwrap();
        (backend, log)
    }

    fn all_offsets(log: &Log) -> Vec<u64> {
        log.read_from(0)
            .flat_map(|b| {
                let b = b.unwrap();
                b.iter().map(|(o, _)| o).collect::<Vec<_>>()
            })
            .collect()
    }

    #[test]
    fn new_log_has_one_empty_segment() {
        let (_, log) = memory_log(LogConfig::default());
        assert_eq!(log.segment_count(), 1);
        assert_eq!(log.newest_offset(), 0);
        assert_eq!(log.oldest_offset(), 0);
        assert_eq!(log.total_bytes(), 0);
        assert!(log.closed_segments().is_empty());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let backend = Arc::new(InMemoryBackend::new());
        let result = Log::new(backend, LogConfig::new().max_segment_bytes(0));
        assert!(matches!(result, Err(CoreError::InvalidConfig { .. })));
    }

    #[test]
    fn append_assigns_running_offsets() {
        let (_, log) = memory_log(LogConfig::default());
        let first = log
            .append_records(vec![record("a", "1"), record("b", "1")])
            .unwrap();
        let second = log.append_records(vec![record("c", "1")]).unwrap();

        assert_eq!(first, 0);
        assert_eq!(second, 2);
        assert_eq!(log.newest_offset(), 3);
        assert_eq!(all_offsets(&log), vec![0, 1, 2]);
    }

    #[test]
    fn empty_batch_is_rejected() {
        let (_, log) = memory_log(LogConfig::default());
        assert!(matches!(
            log.append_records(Vec::new()),
            Err(CoreError::EmptyBatch)
        ));
        assert_eq!(log.newest_offset(), 0);
    }

    #[test]
    fn failed_write_keeps_next_offset() {
        let (backend, log) = memory_log(LogConfig::default());
        log.append_records(vec![record("a", "1")]).unwrap();
        backend.fail_appends(true);

        assert!(log.append_records(vec![record("b", "1")]).is_err());
        assert_eq!(log.newest_offset(), 1);

        backend.fail_appends(false);
        assert_eq!(log.append_records(vec![record("b", "1")]).unwrap(), 1);
        assert_eq!(all_offsets(&log), vec![0, 1]);
    }

    #[test]
    fn rolls_when_segment_is_full() {
        let size = frame_size("k", "v");
        let (_, log) = memory_log(LogConfig::new().max_segment_bytes(size * 2));

        for _ in 0..5 {
            log.append_records(vec![record("k", "v")]).unwrap();
        }

        let segments = log.segments();
        let bases: Vec<_> = segments.iter().map(|s| s.base_offset()).collect();
        assert_eq!(bases, vec![0, 2, 4]);
        assert!(segments[..2].iter().all(|s| s.is_closed()));
        assert!(!segments[2].is_closed());
        assert_eq!(log.closed_segments().len(), 2);
    }

    #[test]
    fn oversized_batch_gets_its_own_segment() {
        let (_, log) = memory_log(LogConfig::new().max_segment_bytes(64));
        log.append_records(vec![record("k", "v")]).unwrap();
        log.append_records(vec![record("k", &"x".repeat(200))])
            .unwrap();

        let segments = log.segments();
        assert_eq!(segments.len(), 2);
        assert!(segments[1].size() > 64);
    }

    #[test]
    fn roll_is_noop_on_empty_segment() {
        let (_, log) = memory_log(LogConfig::default());
        log.roll().unwrap();
        assert_eq!(log.segment_count(), 1);

        log.append_records(vec![record("a", "1")]).unwrap();
        log.roll().unwrap();
        assert_eq!(log.segment_count(), 2);
        assert_eq!(log.segments()[1].base_offset(), 1);
    }

    #[test]
    fn retention_evicts_oldest_segments() {
        let size = frame_size("k", "v");
        let (backend, log) = memory_log(
            LogConfig::new()
                .max_segment_bytes(size)
                .max_log_bytes(size * 3),
        );

        for _ in 0..6 {
            log.append_records(vec![record("k", "v")]).unwrap();
            assert!(log.total_bytes() <= size * 3);
        }
        assert_eq!(log.segment_count(), 3);
        assert_eq!(log.oldest_offset(), 3);
        assert_eq!(backend.region_count(), 3);
        assert_eq!(all_offsets(&log), vec![3, 4, 5]);
    }

    #[test]
    fn retention_delete_failure_does_not_block_append() {
        let size = frame_size("k", "v");
        let (backend, log) = memory_log(
            LogConfig::new()
                .max_segment_bytes(size)
                .max_log_bytes(size * 2),
        );
        log.append_records(vec![record("k", "v")]).unwrap();
        log.append_records(vec![record("k", "v")]).unwrap();
        let oldest = log.segments()[0].clone();

        backend.fail_deletes(true);
        assert_eq!(log.append_records(vec![record("k", "v")]).unwrap(), 2);

        assert_eq!(log.newest_offset(), 3);
        assert_eq!(log.segment_count(), 2);
        assert_eq!(log.oldest_offset(), 1);
        assert!(log.segments().iter().all(|s| s.region() != oldest.region()));
        assert_eq!(all_offsets(&log), vec![1, 2]);
        // The region outlives its failed deletion.
        assert_eq!(backend.region_count(), 3);
        assert_ne!(oldest.state(), SegmentState::Deleted);

        backend.fail_deletes(false);
        oldest.delete().unwrap();
        assert_eq!(backend.region_count(), 2);
    }

    #[test]
    fn read_from_starts_at_containing_batch() {
        let size = frame_size("k", "v");
        let (_, log) = memory_log(LogConfig::new().max_segment_bytes(size * 2));
        log.append_records(vec![record("a", "1"), record("b", "1")])
            .unwrap();
        for _ in 0..4 {
            log.append_records(vec![record("k", "v")]).unwrap();
        }

        let bases: Vec<_> = log.read_from(1).map(|b| b.unwrap().base_offset()).collect();
        assert_eq!(bases, vec![0, 2, 3, 4, 5]);

        let bases: Vec<_> = log.read_from(4).map(|b| b.unwrap().base_offset()).collect();
        assert_eq!(bases, vec![4, 5]);

        assert_eq!(log.read_from(6).count(), 0);
    }

    #[test]
    fn replace_rejects_bad_input() {
        let size = frame_size("k", "v");
        let (_, log) = memory_log(LogConfig::new().max_segment_bytes(size));
        for _ in 0..3 {
            log.append_records(vec![record("k", "v")]).unwrap();
        }
        let segments = log.segments();

        // Not a prefix.
        let err = log.replace_segments(&segments[1..2], &[]).unwrap_err();
        assert!(matches!(err, CoreError::InvalidOperation { .. }));

        // Includes the active segment.
        let err = log.replace_segments(&segments, &[]).unwrap_err();
        assert!(matches!(err, CoreError::InvalidOperation { .. }));

        // Replacement outside the replaced range.
        let err = log
            .replace_segments(&segments[..1], &segments[1..2])
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidOperation { .. }));

        // Insertion without replacement.
        let err = log.replace_segments(&[], &segments[..1]).unwrap_err();
        assert!(matches!(err, CoreError::InvalidOperation { .. }));

        assert_eq!(log.segment_count(), 3);
        assert_eq!(all_offsets(&log), vec![0, 1, 2]);
    }

    #[test]
    fn replace_swaps_and_deletes() {
        let size = frame_size("k", "v");
        let (backend, log) = memory_log(LogConfig::new().max_segment_bytes(size));
        for _ in 0..3 {
            log.append_records(vec![record("k", "v")]).unwrap();
        }
        let closed = log.closed_segments();

        log.replace_segments(&closed, &closed[1..]).unwrap();

        assert_eq!(log.segment_count(), 2);
        assert_eq!(log.oldest_offset(), 1);
        assert_eq!(backend.region_count(), 2);
        assert!(closed[1].is_closed());
        assert_eq!(all_offsets(&log), vec![1, 2]);
    }

    #[test]
    fn compact_keeps_latest_per_key() {
        let size = frame_size("a", "1");
        let (backend, log) = memory_log(
            LogConfig::new()
                .max_segment_bytes(size * 2)
                .cleanup_policy(CleanupPolicy::Compact),
        );
        for (key, value) in [("a", "1"), ("b", "1"), ("a", "2"), ("b", "2"), ("c", "1")] {
            log.append_records(vec![record(key, value)]).unwrap();
        }

        let stats = log.compact(&Cleaner::for_policy(log.config())).unwrap();

        assert_eq!(stats.records_in, 4);
        assert_eq!(stats.records_out, 2);
        assert_eq!(stats.segments_out, 1);
        assert_eq!(all_offsets(&log), vec![2, 3, 4]);
        assert_eq!(log.newest_offset(), 5);
        // One compacted segment plus the active one.
        assert_eq!(backend.region_count(), 2);

        assert_eq!(log.append_records(vec![record("d", "1")]).unwrap(), 5);
    }

    #[test]
    fn compact_with_nothing_closed_is_noop() {
        let (_, log) = memory_log(LogConfig::default());
        log.append_records(vec![record("a", "1")]).unwrap();

        let stats = log.compact(&CompactCleaner::new().into()).unwrap();
        assert_eq!(stats, CleanStats::default());
        assert_eq!(log.segment_count(), 1);
    }

    #[test]
    fn reopen_restores_offsets() {
        let size = frame_size("k", "v");
        let config = LogConfig::new().max_segment_bytes(size * 2);
        let backend = Arc::new(InMemoryBackend::new());
        {
            let log = Log::new(backend.clone(), config.clone()).unwrap();
            for _ in 0..5 {
                log.append_records(vec![record("k", "v")]).unwrap();
            }
        }

        let log = Log::open(backend, config).unwrap();
        assert_eq!(log.segment_count(), 3);
        assert_eq!(log.newest_offset(), 5);
        assert!(!log.segments()[2].is_closed());
        assert_eq!(log.append_records(vec![record("k", "v")]).unwrap(), 5);
        assert_eq!(all_offsets(&log), vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn open_empty_backend_creates_log() {
        let backend = Arc::new(InMemoryBackend::new());
        let log = Log::open(backend.clone(), LogConfig::default()).unwrap();
        assert_eq!(log.segment_count(), 1);
        assert_eq!(backend.region_count(), 1);
    }

    #[test]
    fn reopen_tolerates_torn_tail() {
        let backend = Arc::new(InMemoryBackend::new());
        {
            let log = Log::new(backend.clone(), LogConfig::default()).unwrap();
            log.append_records(vec![record("a", "1")]).unwrap();
        }
        let torn = RecordBatch::new(1, vec![record("b", "1")]).encode().unwrap();
        backend
            .append(RegionId::initial(0), &torn[..torn.len() - 3])
            .unwrap();

        let log = Log::open(backend.clone(), LogConfig::default()).unwrap();
        assert_eq!(log.newest_offset(), 1);
        assert_eq!(log.segment_count(), 2);

        log.append_records(vec![record("c", "1")]).unwrap();
        assert_eq!(all_offsets(&log), vec![0, 1]);
    }

    #[test]
    fn reopen_prefers_lowest_generation() {
        let size = frame_size("k", "v");
        let config = LogConfig::new().max_segment_bytes(size);
        let backend = Arc::new(InMemoryBackend::new());
        {
            let log = Log::new(backend.clone(), config.clone()).unwrap();
            log.append_records(vec![record("k", "v")]).unwrap();
            log.append_records(vec![record("k", "v")]).unwrap();
            // Leftover output of an interrupted compaction.
            backend.create(RegionId::initial(0).next_generation()).unwrap();
        }

        let log = Log::open(backend.clone(), config).unwrap();
        assert_eq!(log.segment_count(), 2);
        assert_eq!(log.segments()[0].region().generation(), 0);
        assert_eq!(backend.region_count(), 2);
        assert_eq!(all_offsets(&log), vec![0, 1]);
    }

    #[test]
    fn delete_releases_every_segment() {
        let size = frame_size("k", "v");
        let (backend, log) = memory_log(LogConfig::new().max_segment_bytes(size));
        for _ in 0..3 {
            log.append_records(vec![record("k", "v")]).unwrap();
        }
        assert_eq!(backend.region_count(), 3);

        log.delete().unwrap();
        assert_eq!(backend.region_count(), 0);
    }

    proptest! {
        #[test]
        fn offsets_are_running_sums(counts in prop::collection::vec(1usize..5, 1..30)) {
            let (_, log) = memory_log(LogConfig::new().max_segment_bytes(128));
            let mut expected = 0u64;
            for count in counts {
                let records = (0..count).map(|i| record(&i.to_string(), "v")).collect();
                prop_assert_eq!(log.append_records(records).unwrap(), expected);
                expected += count as u64;
            }
            prop_assert_eq!(log.newest_offset(), expected);
            prop_assert_eq!(all_offsets(&log), (0..expected).collect::<Vec<_>>());
        }

        #[test]
        fn retention_bound_holds_after_every_append(
            sizes in prop::collection::vec(0usize..64, 1..40),
        ) {
            let max_log_bytes = 400;
            let (_, log) = memory_log(
                LogConfig::new()
                    .max_segment_bytes(100)
                    .max_log_bytes(max_log_bytes),
            );
            for size in sizes {
                log.append_records(vec![record("k", &"x".repeat(size))]).unwrap();
                prop_assert!(log.total_bytes() <= max_log_bytes || log.segment_count() == 1);
                for segment in log.closed_segments() {
                    let batches = SegmentScanner::new(&segment).count();
                    prop_assert!(segment.size() <= 100 || batches == 1);
                }
            }
        }
    }
}
