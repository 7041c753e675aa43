//! Error types for the commit log core.

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in commit log operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] commitlog_storage::StorageError),

    /// Fewer bytes are available than the frame declares.
    ///
    /// This is the normal end-of-data condition for a scan, not corruption.
    #[error("incomplete frame: need {needed} bytes, have {available}")]
    IncompleteFrame {
        /// Bytes the frame requires.
        needed: usize,
        /// Bytes actually available.
        available: usize,
    },

    /// Checksum mismatch on a structurally complete frame.
    #[error("checksum mismatch: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Checksum stored in the frame.
        expected: u32,
        /// Checksum computed over the payload.
        actual: u32,
    },

    /// A complete, checksum-valid frame whose contents do not parse.
    #[error("corrupt record: {message}")]
    CorruptRecord {
        /// Description of the corruption.
        message: String,
    },

    /// Append attempted on a closed segment.
    #[error("segment at offset {base_offset} is closed")]
    SegmentClosed {
        /// Base offset of the segment.
        base_offset: u64,
    },

    /// Operation attempted on a deleted segment.
    #[error("segment at offset {base_offset} is deleted")]
    SegmentDeleted {
        /// Base offset of the segment.
        base_offset: u64,
    },

    /// A clean pass failed; the input segments are untouched.
    #[error("clean aborted: {source}")]
    CleanAborted {
        /// The first failure seen during the pass.
        source: Box<CoreError>,
    },

    /// Append of a batch with no records.
    #[error("cannot append an empty batch")]
    EmptyBatch,

    /// A key, value or batch is too large for its length field.
    #[error("{what} of {size} bytes exceeds the frame format limit")]
    TooLarge {
        /// What overflowed (key, value, batch).
        what: &'static str,
        /// The offending size.
        size: usize,
    },

    /// Invalid log configuration.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the problem.
        message: String,
    },

    /// Operation not permitted in the current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why the operation is invalid.
        message: String,
    },
}

impl CoreError {
    /// Creates a corrupt record error.
    pub fn corrupt_record(message: impl Into<String>) -> Self {
        Self::CorruptRecord {
            message: message.into(),
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Wraps an error as the cause of an aborted clean.
    ///
    /// An error that already is `CleanAborted` is returned as is.
    pub fn clean_aborted(source: CoreError) -> Self {
        match source {
            aborted @ Self::CleanAborted { .. } => aborted,
            other => Self::CleanAborted {
                source: Box::new(other),
            },
        }
    }

    /// Returns true for the end-of-data condition.
    #[must_use]
    pub fn is_incomplete(&self) -> bool {
        matches!(self, Self::IncompleteFrame { .. })
    }

    /// Returns true if the error reports damaged data.
    #[must_use]
    pub fn is_corruption(&self) -> bool {
        match self {
            Self::ChecksumMismatch { .. } | Self::CorruptRecord { .. } => true,
            Self::CleanAborted { source } => source.is_corruption(),
            _ => false,
        }
    }
}
