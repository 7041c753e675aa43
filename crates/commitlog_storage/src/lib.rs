//! # Commitlog Storage
//!
//! Storage backend trait and implementations for the commitlog segment store.
//!
//! This crate provides the lowest-level storage abstraction. A backend holds a
//! set of **named byte regions**, one per log segment. Regions are opaque
//! byte stores - the backend does not interpret the frames written into them.
//!
//! ## Design Principles
//!
//! - Regions are append-only byte stores (create, append, read, delete)
//! - No knowledge of record batches, offsets or compaction
//! - Must be `Send + Sync`; every operation takes `&self`
//! - The log core owns all format interpretation
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For testing and ephemeral logs
//! - [`FileBackend`] - One file per region inside a locked directory
//!
//! ## Example
//!
//! ```rust
//! use commitlog_storage::{InMemoryBackend, RegionId, StorageBackend};
//!
//! let backend = InMemoryBackend::new();
//! let region = RegionId::initial(0);
//! backend.create(region).unwrap();
//! let pos = backend.append(region, b"hello world").unwrap();
//! let data = backend.read_at(region, pos, 11).unwrap();
//! assert_eq!(&data, b"hello world");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;
mod region;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
pub use region::RegionId;
