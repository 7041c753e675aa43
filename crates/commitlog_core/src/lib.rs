//! # Commitlog Core
//!
//! A segmented, append-only commit log with key-based compaction.
//!
//! This crate provides:
//! - The record batch codec (checksummed, big-endian frames)
//! - Segments: size-bounded regions of frames on a [`StorageBackend`]
//! - Segment scanners that treat a torn tail as the end of data
//! - The log manager: offset assignment, rolling, retention, recovery
//! - Cleaners: size-based deletion and latest-record-per-key compaction
//!
//! ## Example
//!
//! ```rust
//! use commitlog_core::{Cleaner, CompactCleaner, Log, LogConfig, Record};
//! use commitlog_storage::InMemoryBackend;
//! use std::sync::Arc;
//!
//! let log = Log::new(Arc::new(InMemoryBackend::new()), LogConfig::default()).unwrap();
//! log.append_records(vec![Record::new("user", "v1")]).unwrap();
//! log.append_records(vec![Record::new("user", "v2")]).unwrap();
//! log.roll().unwrap();
//!
//! let stats = log.compact(&Cleaner::from(CompactCleaner::new())).unwrap();
//! assert_eq!(stats.records_removed(), 1);
//! ```
//!
//! [`StorageBackend`]: commitlog_storage::StorageBackend

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cleaner;
mod config;
mod error;
mod log;
mod record;
mod segment;

pub use cleaner::{CleanStats, Cleaner, CompactCleaner, DeleteCleaner};
pub use config::{CleanupPolicy, LogConfig};
pub use error::{CoreError, CoreResult};
pub use log::{Log, LogReader};
pub use record::{
    Record, RecordBatch, BATCH_HEADER_SIZE, BATCH_OVERHEAD, FORMAT_VERSION, RECORD_OVERHEAD,
};
pub use segment::{Segment, SegmentReader, SegmentScanner, SegmentState};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
