//! DPoS Core Storage Layer
//!
//! This crate provides the storage infrastructure for the DPoS Core
//! scheduler:
//!
//! - **Database**: RocksDB wrapper with column families for committed
//!   rounds, term snapshots, and scheduler metadata
//! - **MemoryBackend**: an in-memory [`StateBackend`] for deterministic
//!   unit testing
//!
//! Both backends implement [`dposcore_core::StateBackend`]; the engine only
//! relies on atomic batch writes for its round-level commits.

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod db;
pub mod memory;

// Re-exports for convenience
pub use db::{cf, Database, DatabaseConfig};
pub use memory::MemoryBackend;

pub use dposcore_core::{StateBackend, StorageError, StorageResult, WriteBatch, WriteOperation};

/// Result type used throughout this crate
pub type Result<T> = StorageResult<T>;
