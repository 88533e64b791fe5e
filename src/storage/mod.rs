//! Storage sink abstraction for reading persistence
//!
//! The hub treats the time-series store as an external collaborator: it
//! only ever sees the [`StorageSink`] trait. The in-memory implementation
//! here backs tests and deployments that do not need persistence; the
//! production deployment plugs its own client in behind the same trait.

pub mod error;
pub mod memory;
pub mod sink;

pub use error::{StorageError, StorageResult};
pub use memory::MemorySink;
pub use sink::StorageSink;
