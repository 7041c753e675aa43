//! Compact command implementation.

use super::{open_existing_log, LogOptions};
use commitlog_core::{CleanStats, Cleaner, CompactCleaner, Log};
use std::path::Path;
use tracing::info;

/// Runs the compact command.
///
/// The active segment is rolled first so that every record written so far
/// takes part.
pub fn run(
    path: &Path,
    options: &LogOptions,
    dry_run: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let log = open_existing_log(path, options)?;

    println!("Compacting log at {:?}", path);
    if dry_run {
        println!("(dry run - no changes will be made)");
        println!();
        let segments = log.segments();
        let bytes: u64 = segments.iter().map(|s| s.size()).sum();
        println!("  Segments to compact: {}", segments.len());
        println!("  Bytes to scan:       {}", bytes);
        return Ok(());
    }
    println!();

    let stats = compact(&log)?;
    print_stats(&stats);
    println!();
    println!("✓ Compaction complete");
    Ok(())
}

fn compact(log: &Log) -> Result<CleanStats, Box<dyn std::error::Error>> {
    log.roll()?;
    info!(
        "Compacting {} closed segments ({} bytes)",
        log.closed_segments().len(),
        log.total_bytes()
    );
    let stats = log.compact(&Cleaner::from(CompactCleaner::new()))?;
    log.flush()?;
    Ok(stats)
}

fn print_stats(stats: &CleanStats) {
    println!("Compaction Results:");
    println!("  Segments:     {} -> {}", stats.segments_in, stats.segments_out);
    println!("  Records:      {} -> {}", stats.records_in, stats.records_out);
    println!("  Size before:  {} bytes", stats.bytes_in);
    println!("  Size after:   {} bytes", stats.bytes_out);
    if stats.bytes_grown() > 0 {
        println!("  Space grown:  {} bytes", stats.bytes_grown());
        return;
    }
    println!(
        "  Space saved:  {} bytes ({:.1}%)",
        stats.bytes_saved(),
        if stats.bytes_in > 0 {
            (stats.bytes_saved() as f64 / stats.bytes_in as f64) * 100.0
        } else {
            0.0
        }
    );
}
