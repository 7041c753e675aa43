//! Dump command implementation.

use super::{display_bytes, LogOptions, LogSnapshot};
use serde::Serialize;
use std::path::Path;

/// Record representation for output.
#[derive(Debug, Serialize)]
pub struct RecordInfo {
    /// Offset in the log.
    pub offset: u64,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// Key, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Value; `None` for a tombstone.
    pub value: Option<String>,
}

/// Runs the dump command.
pub fn run(
    path: &Path,
    options: &LogOptions,
    start_offset: u64,
    limit: Option<usize>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let snapshot = LogSnapshot::open(path, options)?;
    let records = read_records(&snapshot, start_offset, limit)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        _ => {
            print_text_output(&records);
        }
    }

    Ok(())
}

fn read_records(
    snapshot: &LogSnapshot,
    start_offset: u64,
    limit: Option<usize>,
) -> Result<Vec<RecordInfo>, Box<dyn std::error::Error>> {
    let limit = limit.unwrap_or(usize::MAX);
    let mut records = Vec::new();

    for batch in snapshot.batches_from(start_offset) {
        let batch = batch?;
        for (offset, record) in batch.iter() {
            if offset < start_offset {
                continue;
            }
            if records.len() >= limit {
                return Ok(records);
            }
            records.push(RecordInfo {
                offset,
                timestamp: record.timestamp,
                key: record.key().map(display_bytes),
                value: record.value().map(display_bytes),
            });
        }
    }

    Ok(records)
}

fn print_text_output(records: &[RecordInfo]) {
    if records.is_empty() {
        println!("No records");
        return;
    }
    for record in records {
        let key = record.key.as_deref().unwrap_or("<none>");
        match &record.value {
            Some(value) => println!(
                "{:>10}  {}  {} = {}",
                record.offset, record.timestamp, key, value
            ),
            None => println!(
                "{:>10}  {}  {} (tombstone)",
                record.offset, record.timestamp, key
            ),
        }
    }
}
