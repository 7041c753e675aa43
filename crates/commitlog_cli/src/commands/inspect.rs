//! Inspect command implementation.

use super::{LogOptions, LogSnapshot};
use commitlog_core::{Segment, SegmentScanner};
use serde::Serialize;
use std::path::Path;

/// Log inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Log directory.
    pub path: String,
    /// Offset the next record will receive.
    pub next_offset: u64,
    /// Total size in bytes.
    pub total_size: u64,
    /// Per-segment statistics, oldest first.
    pub segments: Vec<SegmentStats>,
}

/// Statistics for a single segment.
#[derive(Debug, Serialize)]
pub struct SegmentStats {
    /// Base offset.
    pub base_offset: u64,
    /// Rewrite generation.
    pub generation: u32,
    /// Size in bytes.
    pub size: u64,
    /// Whether this is the newest segment, the one appends continue in.
    pub active: bool,
    /// Number of batches.
    pub batches: usize,
    /// Number of records.
    pub records: usize,
    /// Number of tombstones.
    pub tombstones: usize,
    /// Scan error, if the segment is damaged.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Runs the inspect command.
pub fn run(
    path: &Path,
    options: &LogOptions,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let snapshot = LogSnapshot::open(path, options)?;
    let result = inspect(path, &snapshot);

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

fn inspect(path: &Path, snapshot: &LogSnapshot) -> InspectResult {
    let newest = snapshot.segments.len().saturating_sub(1);
    InspectResult {
        path: path.display().to_string(),
        next_offset: snapshot.next_offset,
        total_size: snapshot.total_bytes(),
        segments: snapshot
            .segments
            .iter()
            .enumerate()
            .map(|(i, s)| segment_stats(s, i == newest))
            .collect(),
    }
}

fn segment_stats(segment: &Segment, active: bool) -> SegmentStats {
    let mut stats = SegmentStats {
        base_offset: segment.base_offset(),
        generation: segment.region().generation(),
        size: segment.size(),
        active,
        batches: 0,
        records: 0,
        tombstones: 0,
        error: None,
    };

    for batch in SegmentScanner::new(segment) {
        match batch {
            Ok(batch) => {
                stats.batches += 1;
                stats.records += batch.len();
                stats.tombstones += batch.records().iter().filter(|r| r.is_tombstone()).count();
            }
            Err(e) => stats.error = Some(e.to_string()),
        }
    }
    stats
}

fn print_text_output(result: &InspectResult) {
    println!("Log: {}", result.path);
    println!("  Next offset: {}", result.next_offset);
    println!("  Total size:  {} bytes", result.total_size);
    println!("  Segments:    {}", result.segments.len());
    println!();
    println!(
        "  {:>20} {:>4} {:>12} {:>8} {:>8} {:>10}",
        "base", "gen", "bytes", "batches", "records", "tombstones"
    );
    for segment in &result.segments {
        println!(
            "  {:>20} {:>4} {:>12} {:>8} {:>8} {:>10}{}",
            segment.base_offset,
            segment.generation,
            segment.size,
            segment.batches,
            segment.records,
            segment.tombstones,
            if segment.active { "  (active)" } else { "" }
        );
        if let Some(error) = &segment.error {
            println!("  {:>20} error: {}", "", error);
        }
    }
}
