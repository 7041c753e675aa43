//! Region identifiers.

use std::fmt;

/// File extension used for region files.
const REGION_SUFFIX: &str = "log";

/// Identifies one byte region in a backend.
///
/// A region is keyed by the base offset of the segment it backs plus a
/// generation. A compacted rewrite of a segment keeps the base offset and
/// bumps the generation, so the source and its rewrite can coexist until the
/// log swaps them.
///
/// Ordering is by base offset, then generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionId {
    base_offset: u64,
    generation: u32,
}

impl RegionId {
    /// Creates a region identifier.
    #[must_use]
    pub const fn new(base_offset: u64, generation: u32) -> Self {
        Self {
            base_offset,
            generation,
        }
    }

    /// Creates the first-generation region for a base offset.
    #[must_use]
    pub const fn initial(base_offset: u64) -> Self {
        Self::new(base_offset, 0)
    }

    /// Returns the base offset.
    #[must_use]
    pub const fn base_offset(self) -> u64 {
        self.base_offset
    }

    /// Returns the generation.
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }

    /// Returns the region that replaces this one after a rewrite.
    #[must_use]
    pub const fn next_generation(self) -> Self {
        Self::new(self.base_offset, self.generation.wrapping_add(1))
    }

    /// Returns the file name used by [`crate::FileBackend`].
    ///
    /// Format: `{base_offset:020}.{generation}.log`.
    #[must_use]
    pub fn file_name(self) -> String {
        format!("{self}.{REGION_SUFFIX}")
    }

    /// Parses a file name produced by [`RegionId::file_name`].
    ///
    /// Returns `None` for anything else.
    #[must_use]
    pub fn from_file_name(name: &str) -> Option<Self> {
        let stem = name.strip_suffix(REGION_SUFFIX)?.strip_suffix('.')?;
        let (base, generation) = stem.split_once('.')?;
        if base.len() != 20 {
            return None;
        }
        Some(Self::new(base.parse().ok()?, generation.parse().ok()?))
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:020}.{}", self.base_offset, self.generation)
    }
}
