//! Record and record batch codec.
//!
//! ## Batch Frame Format
//!
//! All integers are big-endian.
//!
//! ```text
//! | base_offset (8) | batch_length (4) | crc32 (4) | format_version (1) | record_count (4) | record... |
//! ```
//!
//! `batch_length` counts every byte after itself. The CRC-32 covers every
//! byte after the crc field.
//!
//! ## Record Format
//!
//! ```text
//! | timestamp (8) | key_length (4) | key (N) | value_length (4) | value (M) |
//! ```
//!
//! A length of `-1` marks an absent key or value, which is distinct from an
//! empty one.

use crate::error::{CoreError, CoreResult};
use bytes::{Buf, BufMut, Bytes};
use std::time::{SystemTime, UNIX_EPOCH};

/// Current frame format version.
pub const FORMAT_VERSION: u8 = 2;

/// Size of the frame prefix needed to learn a frame's length:
/// base_offset (8) + batch_length (4).
pub const BATCH_HEADER_SIZE: usize = 12;

/// Fixed bytes per batch: header (12) + crc (4) + version (1) + count (4).
pub const BATCH_OVERHEAD: usize = BATCH_HEADER_SIZE + 4 + 1 + 4;

/// Fixed bytes per record: timestamp (8) + key_length (4) + value_length (4).
pub const RECORD_OVERHEAD: usize = 8 + 4 + 4;

/// Position of the first byte covered by the checksum.
const CRC_COVERAGE_START: usize = BATCH_HEADER_SIZE + 4;

/// Length marker for an absent key or value.
const ABSENT: i32 = -1;

/// Milliseconds since the Unix epoch.
fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

/// One logical message.
///
/// Records do not carry their own offset; the enclosing [`RecordBatch`]
/// assigns offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Compaction key. `None` means the record is never compacted away.
    pub key: Option<Bytes>,
    /// Payload. `None` marks a tombstone.
    pub value: Option<Bytes>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl Record {
    /// Creates a keyed record stamped with the current time.
    #[must_use]
    pub fn new(key: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        Self::from_parts(Some(key.into()), Some(value.into()), now_millis())
    }

    /// Creates a record without a key.
    #[must_use]
    pub fn unkeyed(value: impl Into<Bytes>) -> Self {
        Self::from_parts(None, Some(value.into()), now_millis())
    }

    /// Creates a tombstone (keyed record with an absent value).
    #[must_use]
    pub fn tombstone(key: impl Into<Bytes>) -> Self {
        Self::from_parts(Some(key.into()), None, now_millis())
    }

    /// Creates a record from its parts.
    #[must_use]
    pub fn from_parts(key: Option<Bytes>, value: Option<Bytes>, timestamp: i64) -> Self {
        Self {
            key,
            value,
            timestamp,
        }
    }

    /// Replaces the timestamp.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Returns the key bytes, if present.
    #[must_use]
    pub fn key(&self) -> Option<&[u8]> {
        self.key.as_deref()
    }

    /// Returns the value bytes, if present.
    #[must_use]
    pub fn value(&self) -> Option<&[u8]> {
        self.value.as_deref()
    }

    /// Returns whether this record is a tombstone.
    #[must_use]
    pub fn is_tombstone(&self) -> bool {
        self.value.is_none()
    }

    /// Returns the encoded size of this record.
    #[must_use]
    pub fn encoded_size(&self) -> usize {
        RECORD_OVERHEAD
            + self.key.as_ref().map_or(0, Bytes::len)
            + self.value.as_ref().map_or(0, Bytes::len)
    }

    /// Encodes the record to bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TooLarge`] if the key or value does not fit a
    /// 32-bit length.
    pub fn encode(&self) -> CoreResult<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.encoded_size());
        self.encode_into(&mut buf)?;
        Ok(buf)
    }

    /// Decodes a record from exactly `data`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::CorruptRecord`] if the bytes are truncated,
    /// carry an invalid length, or have trailing bytes.
    pub fn decode(data: &[u8]) -> CoreResult<Self> {
        let mut buf = data;
        let record = Self::decode_from(&mut buf)?;
        if buf.has_remaining() {
            return Err(CoreError::corrupt_record(format!(
                "{} trailing bytes after record",
                buf.remaining()
            )));
        }
        Ok(record)
    }

    fn encode_into(&self, buf: &mut Vec<u8>) -> CoreResult<()> {
        buf.put_i64(self.timestamp);
        put_field(buf, self.key.as_ref(), "key")?;
        put_field(buf, self.value.as_ref(), "value")?;
        Ok(())
    }

    fn decode_from(buf: &mut &[u8]) -> CoreResult<Self> {
        if buf.remaining() < 8 {
            return Err(CoreError::corrupt_record("record timestamp truncated"));
        }
        let timestamp = buf.get_i64();
        let key = get_field(buf, "key")?;
        let value = get_field(buf, "value")?;
        Ok(Self {
            key,
            value,
            timestamp,
        })
    }
}

fn put_field(buf: &mut Vec<u8>, field: Option<&Bytes>, what: &'static str) -> CoreResult<()> {
    match field {
        None => buf.put_i32(ABSENT),
        Some(bytes) => {
            let len = i32::try_from(bytes.len()).map_err(|_| CoreError::TooLarge {
                what,
                size: bytes.len(),
            })?;
            buf.put_i32(len);
            buf.put_slice(bytes);
        }
    }
    Ok(())
}

fn get_field(buf: &mut &[u8], what: &str) -> CoreResult<Option<Bytes>> {
    if buf.remaining() < 4 {
        return Err(CoreError::corrupt_record(format!("{what} length truncated")));
    }
    match buf.get_i32() {
        ABSENT => Ok(None),
        len if len < 0 => Err(CoreError::corrupt_record(format!(
            "invalid {what} length {len}"
        ))),
        len => {
            let len = len as usize;
            if buf.remaining() < len {
                return Err(CoreError::corrupt_record(format!(
                    "{what} truncated: need {len} bytes, have {}",
                    buf.remaining()
                )));
            }
            Ok(Some(buf.copy_to_bytes(len)))
        }
    }
}

/// An ordered group of records sharing one contiguous offset range.
///
/// Record `i` has offset `base_offset + i`. A batch is the unit of append and
/// of scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordBatch {
    base_offset: u64,
    records: Vec<Record>,
}

impl RecordBatch {
    /// Creates a batch anchored at `base_offset`.
    #[must_use]
    pub fn new(base_offset: u64, records: Vec<Record>) -> Self {
        Self {
            base_offset,
            records,
        }
    }

    /// Creates a batch whose offset the log assigns on append.
    #[must_use]
    pub fn from_records(records: Vec<Record>) -> Self {
        Self::new(0, records)
    }

    /// Returns the offset of the first record.
    #[must_use]
    pub const fn base_offset(&self) -> u64 {
        self.base_offset
    }

    /// Restamps the batch onto a new base offset.
    #[must_use]
    pub fn with_base_offset(mut self, base_offset: u64) -> Self {
        self.base_offset = base_offset;
        self
    }

    /// Returns the records.
    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Consumes the batch, returning its records.
    #[must_use]
    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    /// Returns the number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns whether the batch has no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns the offset following the last record.
    ///
    /// Saturates at `u64::MAX`; decoding rejects batches that would overflow.
    #[must_use]
    pub fn next_offset(&self) -> u64 {
        self.base_offset.saturating_add(self.records.len() as u64)
    }

    /// Returns the offset of the last record, or `None` for an empty batch.
    #[must_use]
    pub fn last_offset(&self) -> Option<u64> {
        self.next_offset().checked_sub(1).filter(|_| !self.is_empty())
    }

    /// Iterates over `(offset, record)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (u64, &Record)> + '_ {
        (self.base_offset..).zip(self.records.iter())
    }

    /// Returns the encoded frame size, without encoding.
    #[must_use]
    pub fn encoded_size(&self) -> usize {
        BATCH_OVERHEAD + self.records.iter().map(Record::encoded_size).sum::<usize>()
    }

    /// Reads the total frame size from a frame prefix.
    ///
    /// Returns `None` if fewer than [`BATCH_HEADER_SIZE`] bytes are given.
    #[must_use]
    pub fn frame_length(header: &[u8]) -> Option<usize> {
        if header.len() < BATCH_HEADER_SIZE {
            return None;
        }
        let mut len_field = &header[8..BATCH_HEADER_SIZE];
        Some(BATCH_HEADER_SIZE + len_field.get_u32() as usize)
    }

    /// Encodes the batch into one frame.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::EmptyBatch`] for a batch without records and
    /// [`CoreError::TooLarge`] if a length field would overflow.
    pub fn encode(&self) -> CoreResult<Vec<u8>> {
        if self.records.is_empty() {
            return Err(CoreError::EmptyBatch);
        }

        let total = self.encoded_size();
        let batch_length = u32::try_from(total - BATCH_HEADER_SIZE).map_err(|_| {
            CoreError::TooLarge {
                what: "batch",
                size: total,
            }
        })?;
        let count = u32::try_from(self.records.len()).map_err(|_| CoreError::TooLarge {
            what: "batch",
            size: total,
        })?;

        let mut buf = Vec::with_capacity(total);
        buf.put_u64(self.base_offset);
        buf.put_u32(batch_length);
        buf.put_u32(0); // crc, filled in below
        buf.put_u8(FORMAT_VERSION);
        buf.put_u32(count);
        for record in &self.records {
            record.encode_into(&mut buf)?;
        }

        let crc = crc32fast::hash(&buf[CRC_COVERAGE_START..]);
        buf[BATCH_HEADER_SIZE..CRC_COVERAGE_START].copy_from_slice(&crc.to_be_bytes());

        Ok(buf)
    }

    /// Decodes the frame at the start of `data`.
    ///
    /// Bytes after the frame are ignored, so this can be pointed at a
    /// stream of frames; use [`RecordBatch::frame_length`] to step over it.
    ///
    /// # Errors
    ///
    /// - [`CoreError::IncompleteFrame`] if `data` is shorter than the frame
    /// - [`CoreError::ChecksumMismatch`] if the CRC does not match
    /// - [`CoreError::CorruptRecord`] if a checksum-valid frame does not parse
    pub fn decode(data: &[u8]) -> CoreResult<Self> {
        let frame_len = Self::frame_length(data).ok_or(CoreError::IncompleteFrame {
            needed: BATCH_HEADER_SIZE,
            available: data.len(),
        })?;
        if data.len() < frame_len {
            return Err(CoreError::IncompleteFrame {
                needed: frame_len,
                available: data.len(),
            });
        }
        if frame_len < BATCH_OVERHEAD {
            return Err(CoreError::corrupt_record(format!(
                "frame length {frame_len} is below the minimum of {BATCH_OVERHEAD}"
            )));
        }

        let frame = &data[..frame_len];
        let mut header = &frame[..CRC_COVERAGE_START];
        let base_offset = header.get_u64();
        let _batch_length = header.get_u32();
        let expected = header.get_u32();
        let actual = crc32fast::hash(&frame[CRC_COVERAGE_START..]);
        if expected != actual {
            return Err(CoreError::ChecksumMismatch { expected, actual });
        }

        let mut payload = &frame[CRC_COVERAGE_START..];
        let version = payload.get_u8();
        if version == 0 || version > FORMAT_VERSION {
            return Err(CoreError::corrupt_record(format!(
                "unsupported format version {version}"
            )));
        }

        let count = payload.get_u32() as usize;
        if count == 0 {
            return Err(CoreError::corrupt_record("batch declares zero records"));
        }
        if base_offset.checked_add(count as u64).is_none() {
            return Err(CoreError::corrupt_record(format!(
                "{count} records at base offset {base_offset} overflow the offset space"
            )));
        }

        let mut records = Vec::with_capacity(count.min(payload.remaining() / RECORD_OVERHEAD));
        for _ in 0..count {
            records.push(Record::decode_from(&mut payload)?);
        }
        if payload.has_remaining() {
            return Err(CoreError::corrupt_record(format!(
                "{} trailing bytes after {count} records",
                payload.remaining()
            )));
        }

        Ok(Self {
            base_offset,
            records,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Builds a frame around an arbitrary payload with a valid checksum.
    fn raw_frame(base_offset: u64, payload: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.put_u64(base_offset);
        buf.put_u32((4 + payload.len()) as u32);
        buf.put_u32(crc32fast::hash(payload));
        buf.put_slice(payload);
        buf
    }

    fn sample_batch() -> RecordBatch {
        RecordBatch::new(
            7,
            vec![
                Record::from_parts(Some("k".into()), Some("v".into()), 100),
                Record::from_parts(None, Some(Bytes::new()), 101),
                Record::from_parts(Some("gone".into()), None, 102),
            ],
        )
    }

    #[test]
    fn record_roundtrip_variants() {
        let records = [
            Record::from_parts(Some("key".into()), Some("value".into()), 1),
            Record::from_parts(None, Some("value".into()), 2),
            Record::from_parts(Some("key".into()), None, 3),
            Record::from_parts(Some(Bytes::new()), Some(Bytes::new()), 4),
            Record::from_parts(None, None, -5),
        ];

        for record in records {
            let encoded = record.encode().unwrap();
            assert_eq!(encoded.len(), record.encoded_size());
            assert_eq!(Record::decode(&encoded).unwrap(), record);
        }
    }

    #[test]
    fn absent_and_empty_are_distinct() {
        let absent = Record::from_parts(None, None, 0);
        let empty = Record::from_parts(Some(Bytes::new()), Some(Bytes::new()), 0);

        let absent_bytes = absent.encode().unwrap();
        let empty_bytes = empty.encode().unwrap();
        assert_ne!(absent_bytes, empty_bytes);
        assert_eq!(&absent_bytes[8..12], &(-1i32).to_be_bytes());
        assert_eq!(&empty_bytes[8..12], &0i32.to_be_bytes());

        let decoded = Record::decode(&empty_bytes).unwrap();
        assert_eq!(decoded.key(), Some(&b""[..]));
        assert!(!decoded.is_tombstone());
        assert!(Record::decode(&absent_bytes).unwrap().is_tombstone());
    }

    #[test]
    fn record_decode_rejects_trailing_bytes() {
        let mut encoded = Record::unkeyed("v").encode().unwrap();
        encoded.push(0);
        assert!(matches!(
            Record::decode(&encoded),
            Err(CoreError::CorruptRecord { .. })
        ));
    }

    #[test]
    fn record_decode_rejects_truncation() {
        let encoded = Record::new("key", "value").encode().unwrap();
        let result = Record::decode(&encoded[..encoded.len() - 1]);
        assert!(matches!(result, Err(CoreError::CorruptRecord { .. })));
    }

    #[test]
    fn batch_layout_is_exact() {
        let batch = RecordBatch::new(
            0x0102_0304_0506_0708,
            vec![Record::from_parts(Some("ab".into()), Some("xyz".into()), 9)],
        );
        let frame = batch.encode().unwrap();

        assert_eq!(frame.len(), BATCH_OVERHEAD + RECORD_OVERHEAD + 5);
        assert_eq!(&frame[0..8], &0x0102_0304_0506_0708u64.to_be_bytes());
        assert_eq!(
            &frame[8..12],
            &((frame.len() - BATCH_HEADER_SIZE) as u32).to_be_bytes()
        );
        assert_eq!(&frame[12..16], &crc32fast::hash(&frame[16..]).to_be_bytes());
        assert_eq!(frame[16], FORMAT_VERSION);
        assert_eq!(&frame[17..21], &1u32.to_be_bytes());
        assert_eq!(&frame[21..29], &9i64.to_be_bytes());
        assert_eq!(&frame[29..33], &2i32.to_be_bytes());
        assert_eq!(&frame[33..35], b"ab");
        assert_eq!(&frame[35..39], &3i32.to_be_bytes());
        assert_eq!(&frame[39..42], b"xyz");
    }

    #[test]
    fn batch_roundtrip() {
        let batch = sample_batch();
        let frame = batch.encode().unwrap();
        assert_eq!(frame.len(), batch.encoded_size());
        assert_eq!(RecordBatch::frame_length(&frame), Some(frame.len()));
        assert_eq!(RecordBatch::decode(&frame).unwrap(), batch);
    }

    #[test]
    fn batch_offsets() {
        let batch = sample_batch();
        assert_eq!(batch.len(), 3);
        assert_eq!(batch.last_offset(), Some(9));
        assert_eq!(batch.next_offset(), 10);

        let offsets: Vec<u64> = batch.iter().map(|(offset, _)| offset).collect();
        assert_eq!(offsets, vec![7, 8, 9]);

        let empty = RecordBatch::new(5, Vec::new());
        assert_eq!(empty.last_offset(), None);
        assert_eq!(empty.next_offset(), 5);
    }

    #[test]
    fn offsets_past_u64_max_are_corrupt() {
        let mut payload = vec![FORMAT_VERSION];
        payload.put_u32(2);
        payload.extend(Record::unkeyed("a").encode().unwrap());
        payload.extend(Record::unkeyed("b").encode().unwrap());

        let result = RecordBatch::decode(&raw_frame(u64::MAX - 1, &payload));
        assert!(matches!(result, Err(CoreError::CorruptRecord { .. })));

        let last = RecordBatch::decode(&raw_frame(u64::MAX - 2, &payload)).unwrap();
        assert_eq!(last.next_offset(), u64::MAX);
        assert_eq!(last.last_offset(), Some(u64::MAX - 1));
    }

    #[test]
    fn encode_empty_batch_fails() {
        let result = RecordBatch::from_records(Vec::new()).encode();
        assert!(matches!(result, Err(CoreError::EmptyBatch)));
    }

    #[test]
    fn decode_ignores_following_frames() {
        let first = sample_batch();
        let second = RecordBatch::new(10, vec![Record::unkeyed("next")]);
        let mut stream = first.encode().unwrap();
        stream.extend(second.encode().unwrap());

        assert_eq!(RecordBatch::decode(&stream).unwrap(), first);
        let len = RecordBatch::frame_length(&stream).unwrap();
        assert_eq!(RecordBatch::decode(&stream[len..]).unwrap(), second);
    }

    #[test]
    fn short_buffer_is_incomplete() {
        let frame = sample_batch().encode().unwrap();

        let empty = RecordBatch::decode(&[]).unwrap_err();
        assert!(empty.is_incomplete());

        let header_only = RecordBatch::decode(&frame[..5]).unwrap_err();
        assert!(matches!(
            header_only,
            CoreError::IncompleteFrame {
                needed: BATCH_HEADER_SIZE,
                available: 5
            }
        ));

        let cut = RecordBatch::decode(&frame[..frame.len() - 1]).unwrap_err();
        assert!(cut.is_incomplete());
        assert!(!cut.is_corruption());
    }

    #[test]
    fn flipped_payload_byte_is_checksum_mismatch() {
        let mut frame = sample_batch().encode().unwrap();
        let last = frame.len() - 1;
        frame[last] ^= 0xFF;

        assert!(matches!(
            RecordBatch::decode(&frame),
            Err(CoreError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn unsupported_version_is_corrupt() {
        let mut payload = vec![FORMAT_VERSION + 1];
        payload.put_u32(1);
        payload.extend(Record::unkeyed("v").encode().unwrap());

        let result = RecordBatch::decode(&raw_frame(0, &payload));
        assert!(matches!(result, Err(CoreError::CorruptRecord { .. })));
    }

    #[test]
    fn zero_record_count_is_corrupt() {
        let mut payload = vec![FORMAT_VERSION];
        payload.put_u32(0);

        let result = RecordBatch::decode(&raw_frame(0, &payload));
        assert!(matches!(result, Err(CoreError::CorruptRecord { .. })));
    }

    #[test]
    fn negative_length_is_corrupt() {
        let mut payload = vec![FORMAT_VERSION];
        payload.put_u32(1);
        payload.put_i64(0);
        payload.put_i32(-7);
        payload.put_i32(-1);

        let err = RecordBatch::decode(&raw_frame(0, &payload)).unwrap_err();
        assert!(err.is_corruption());
    }

    #[test]
    fn record_count_mismatch_is_corrupt() {
        let mut payload = vec![FORMAT_VERSION];
        payload.put_u32(2);
        payload.extend(Record::unkeyed("only one").encode().unwrap());

        let result = RecordBatch::decode(&raw_frame(0, &payload));
        assert!(matches!(result, Err(CoreError::CorruptRecord { .. })));
    }

    #[test]
    fn undersized_frame_length_is_corrupt() {
        let mut frame = Vec::new();
        frame.put_u64(0);
        frame.put_u32(2);
        frame.put_u16(0);

        let result = RecordBatch::decode(&frame);
        assert!(matches!(result, Err(CoreError::CorruptRecord { .. })));
    }

    fn record_strategy() -> impl Strategy<Value = Record> {
        (
            prop::option::of(prop::collection::vec(any::<u8>(), 0..32)),
            prop::option::of(prop::collection::vec(any::<u8>(), 0..64)),
            any::<i64>(),
        )
            .prop_map(|(key, value, timestamp)| {
                Record::from_parts(key.map(Bytes::from), value.map(Bytes::from), timestamp)
            })
    }

    proptest! {
        #[test]
        fn prop_record_roundtrip(record in record_strategy()) {
            let encoded = record.encode().unwrap();
            prop_assert_eq!(Record::decode(&encoded).unwrap(), record);
        }

        #[test]
        fn prop_batch_roundtrip(
            base_offset in any::<u64>().prop_map(|o| o >> 1),
            records in prop::collection::vec(record_strategy(), 1..16),
        ) {
            let batch = RecordBatch::new(base_offset, records);
            let frame = batch.encode().unwrap();
            prop_assert_eq!(frame.len(), batch.encoded_size());
            prop_assert_eq!(RecordBatch::decode(&frame).unwrap(), batch);
        }
    }
}
