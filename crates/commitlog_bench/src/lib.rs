//! Benchmark utilities.

use commitlog_core::Record;
use rand::Rng;

/// Generate random payload bytes of the specified size.
pub fn random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Generate keyed records drawn from `key_space` distinct keys.
///
/// A small key space means many superseded records, which is the case
/// compaction is meant for.
pub fn generate_records(count: usize, key_space: usize, value_size: usize) -> Vec<Record> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|_| {
            let key = format!("key-{:06}", rng.gen_range(0..key_space.max(1)));
            Record::new(key, random_data(value_size))
        })
        .collect()
}
