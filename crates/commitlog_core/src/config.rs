//! Log configuration.

use crate::error::{CoreError, CoreResult};

/// How a log reclaims space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CleanupPolicy {
    /// Delete whole segments, oldest first, to respect `max_log_bytes`.
    #[default]
    Delete,
    /// Keep only the latest record per key.
    Compact,
}

/// Capacity policy and tuning for a [`crate::Log`].
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Soft maximum size of a single segment before the log rolls.
    pub max_segment_bytes: u64,

    /// Maximum total size of all segments; oldest segments are evicted to
    /// stay under it. The active segment is never evicted.
    pub max_log_bytes: u64,

    /// Whether to flush the active segment after every append.
    pub sync_on_append: bool,

    /// Default cleaner selected by [`crate::Cleaner::for_policy`].
    pub cleanup_policy: CleanupPolicy,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            max_segment_bytes: 1024 * 1024 * 1024, // 1 GB
            max_log_bytes: u64::MAX,               // unbounded
            sync_on_append: false,
            cleanup_policy: CleanupPolicy::Delete,
        }
    }
}

impl LogConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum segment size.
    #[must_use]
    pub const fn max_segment_bytes(mut self, size: u64) -> Self {
        self.max_segment_bytes = size;
        self
    }

    /// Sets the maximum total log size.
    #[must_use]
    pub const fn max_log_bytes(mut self, size: u64) -> Self {
        self.max_log_bytes = size;
        self
    }

    /// Sets whether to flush after every append.
    #[must_use]
    pub const fn sync_on_append(mut self, value: bool) -> Self {
        self.sync_on_append = value;
        self
    }

    /// Sets the cleanup policy.
    #[must_use]
    pub const fn cleanup_policy(mut self, policy: CleanupPolicy) -> Self {
        self.cleanup_policy = policy;
        self
    }

    /// Checks the configuration for values the log cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] if a size is zero or the log
    /// bound is smaller than a single segment.
    pub fn validate(&self) -> CoreResult<()> {
        if self.max_segment_bytes == 0 {
            return Err(CoreError::invalid_config("max_segment_bytes must be > 0"));
        }
        if self.max_log_bytes == 0 {
            return Err(CoreError::invalid_config("max_log_bytes must be > 0"));
        }
        if self.max_log_bytes < self.max_segment_bytes {
            return Err(CoreError::invalid_config(format!(
                "max_log_bytes ({}) is smaller than max_segment_bytes ({})",
                self.max_log_bytes, self.max_segment_bytes
            )));
        }
        Ok(())
    }
}
