//! Append command implementation.

use super::{open_log, LogOptions};
use commitlog_core::{Log, Record};
use std::path::Path;

/// Runs the append command.
///
/// A missing value with a key appends a tombstone.
pub fn run(
    path: &Path,
    options: &LogOptions,
    key: Option<String>,
    value: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let log = open_log(path, options)?;
    let offset = append(&log, key, value)?;
    log.flush()?;

    println!("Appended at offset {}", offset);
    Ok(())
}

fn append(
    log: &Log,
    key: Option<String>,
    value: Option<String>,
) -> Result<u64, Box<dyn std::error::Error>> {
    let record = match (key, value) {
        (Some(key), Some(value)) => Record::new(key, value),
        (Some(key), None) => Record::tombstone(key),
        (None, Some(value)) => Record::unkeyed(value),
        (None, None) => return Err("A key or a value is required".into()),
    };
    Ok(log.append_records(vec![record])?)
}
