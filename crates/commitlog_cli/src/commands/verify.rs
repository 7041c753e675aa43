//! Verify command implementation.

use super::LogOptions;
use commitlog_core::{Segment, SegmentScanner};
use commitlog_storage::{FileBackend, StorageBackend};
use std::path::Path;
use std::sync::Arc;

/// Verification result for one segment.
#[derive(Debug)]
pub struct SegmentCheck {
    /// Region name.
    pub region: String,
    /// Number of valid batches.
    pub batches: usize,
    /// Number of valid records.
    pub records: usize,
    /// Bytes after the last valid frame that do not form a whole frame.
    pub trailing_bytes: u64,
    /// Corruption or storage error, if any.
    pub error: Option<String>,
}

/// Verification result.
#[derive(Debug, Default)]
pub struct VerifyResult {
    /// Per-segment results, oldest first.
    pub segments: Vec<SegmentCheck>,
}

impl VerifyResult {
    fn is_ok(&self) -> bool {
        self.segments.iter().all(|s| s.error.is_none())
    }
}

/// Runs the verify command.
///
/// The directory is read without recovery, so nothing is modified.
pub fn run(path: &Path, options: &LogOptions) -> Result<(), Box<dyn std::error::Error>> {
    if !path.is_dir() {
        return Err(format!("No log found at {:?}", path).into());
    }

    println!("Verifying log at {:?}", path);
    println!();

    let result = verify(path, options)?;
    for check in &result.segments {
        print_check(check);
    }

    println!();
    if result.is_ok() {
        println!("✓ Log verification passed");
        Ok(())
    } else {
        println!("✗ Log verification failed");
        Err("Verification failed".into())
    }
}

fn verify(path: &Path, options: &LogOptions) -> Result<VerifyResult, Box<dyn std::error::Error>> {
    let backend: Arc<dyn StorageBackend> = Arc::new(FileBackend::open(path)?);
    let capacity = options.config().max_segment_bytes;
    let mut result = VerifyResult::default();

    for region in backend.list_regions()? {
        let segment = Segment::open(Arc::clone(&backend), region, capacity)?;
        let mut check = SegmentCheck {
            region: region.file_name(),
            batches: 0,
            records: 0,
            trailing_bytes: 0,
            error: None,
        };

        let mut scanner = SegmentScanner::new(&segment);
        loop {
            match scanner.next_batch() {
                Ok(Some(batch)) => {
                    check.batches += 1;
                    check.records += batch.len();
                }
                Ok(None) => {
                    check.trailing_bytes = segment.size() - scanner.position();
                    break;
                }
                Err(e) => {
                    check.error = Some(format!("at byte {}: {}", scanner.position(), e));
                    break;
                }
            }
        }
        result.segments.push(check);
    }

    Ok(result)
}

fn print_check(check: &SegmentCheck) {
    match &check.error {
        None => println!(
            "  ✓ {}: {} batches, {} records",
            check.region, check.batches, check.records
        ),
        Some(error) => println!("  ✗ {}: {}", check.region, error),
    }
    if check.trailing_bytes > 0 {
        println!("    {} trailing bytes of a torn frame", check.trailing_bytes);
    }
}
