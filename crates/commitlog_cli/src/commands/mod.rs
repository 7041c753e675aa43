//! CLI command implementations.

pub mod append;
pub mod compact;
pub mod dump;
pub mod inspect;
pub mod verify;

use commitlog_core::{CoreResult, Log, LogConfig, RecordBatch, Segment, SegmentScanner};
use commitlog_storage::{FileBackend, StorageBackend};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Log settings shared by every command.
#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    /// Overrides the default segment size.
    pub max_segment_bytes: Option<u64>,
}

impl LogOptions {
    /// Builds the log configuration.
    pub fn config(&self) -> LogConfig {
        let config = LogConfig::default();
        match self.max_segment_bytes {
            Some(size) => config.max_segment_bytes(size),
            None => config,
        }
    }
}

/// Opens (or creates) the log in `path`.
///
/// This runs recovery, which may delete stale regions or start a fresh
/// segment after a torn tail. Read-only commands use [`LogSnapshot`].
pub fn open_log(path: &Path, options: &LogOptions) -> Result<Log, Box<dyn std::error::Error>> {
    info!("Opening log at {:?}", path);
    let backend = Arc::new(FileBackend::open(path)?);
    Ok(Log::open(backend, options.config())?)
}

/// Opens an existing log directory, failing if it holds no segments.
pub fn open_existing_log(
    path: &Path,
    options: &LogOptions,
) -> Result<Log, Box<dyn std::error::Error>> {
    if !path.is_dir() {
        return Err(format!("No log found at {:?}", path).into());
    }
    open_log(path, options)
}

/// A read-only view of an existing log directory.
///
/// Picks the same region per base offset that recovery keeps (the lowest
/// generation) but never deletes, creates or reactivates anything. Every
/// segment is opened closed.
#[derive(Debug)]
pub struct LogSnapshot {
    /// Segments, oldest first.
    pub segments: Vec<Arc<Segment>>,
    /// Offset the next append would receive.
    pub next_offset: u64,
}

impl LogSnapshot {
    /// Opens the log in `path` without modifying it.
    pub fn open(path: &Path, options: &LogOptions) -> Result<Self, Box<dyn std::error::Error>> {
        if !path.is_dir() {
            return Err(format!("No log found at {:?}", path).into());
        }
        info!("Reading log at {:?}", path);

        let backend: Arc<dyn StorageBackend> = Arc::new(FileBackend::open(path)?);
        let capacity = options.config().max_segment_bytes;
        let mut regions = backend.list_regions()?;
        regions.sort_unstable();

        let mut segments: Vec<Arc<Segment>> = Vec::with_capacity(regions.len());
        for region in regions {
            if segments
                .last()
                .is_some_and(|s| s.base_offset() == region.base_offset())
            {
                continue;
            }
            let segment = Segment::open(Arc::clone(&backend), region, capacity)?;
            segments.push(Arc::new(segment));
        }

        let mut next_offset = 0;
        if let Some(newest) = segments.last() {
            next_offset = newest.base_offset();
            for batch in SegmentScanner::new(newest) {
                match batch {
                    Ok(batch) => next_offset = batch.next_offset(),
                    Err(e) => warn!(
                        region = %newest.region(),
                        error = %e,
                        "newest segment is damaged"
                    ),
                }
            }
        }

        Ok(Self {
            segments,
            next_offset,
        })
    }

    /// Returns the bytes held across all segments.
    pub fn total_bytes(&self) -> u64 {
        self.segments.iter().map(|s| s.size()).sum()
    }

    /// Iterates over batches from the one containing `offset` onwards.
    ///
    /// Stops at the first error.
    pub fn batches_from(
        &self,
        offset: u64,
    ) -> impl Iterator<Item = CoreResult<RecordBatch>> + '_ {
        let first = self
            .segments
            .iter()
            .rposition(|s| s.base_offset() <= offset)
            .unwrap_or(0);
        let mut failed = false;
        self.segments[first..]
            .iter()
            .flat_map(|segment| SegmentScanner::new(segment))
            .take_while(move |batch| {
                let proceed = !failed;
                failed |= batch.is_err();
                proceed
            })
            .filter(move |batch| match batch {
                Ok(batch) => batch.next_offset() > offset,
                Err(_) => true,
            })
    }
}

/// Renders bytes as text, escaping anything that is not valid UTF-8.
pub fn display_bytes(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_owned(),
        Err(_) => bytes.escape_ascii().to_string(),
    }
}
