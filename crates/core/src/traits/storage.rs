//! Storage backend traits for swappable database implementations.
//!
//! This module defines the key-value storage abstraction the scheduler
//! persists committed round state through. Different backends (RocksDB,
//! in-memory) can be used interchangeably; the engine only relies on
//! atomic batch writes for round-level commits.

use thiserror::Error;

/// Errors that can occur during storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The column family does not exist.
    #[error("column family not found: {0}")]
    ColumnFamilyNotFound(String),

    /// A database I/O error occurred.
    #[error("database I/O error: {0}")]
    Io(String),

    /// Data corruption was detected.
    #[error("data corruption: {0}")]
    Corruption(String),

    /// A serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Generic internal error.
    #[error("internal storage error: {0}")]
    Internal(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// A batch of write operations to be applied atomically.
///
/// A round-level commit (e.g. the base round updated with reveals plus the
/// freshly generated next round plus the current-round pointer) is always a
/// single batch: either every write lands or none do.
#[derive(Debug, Default, Clone)]
pub struct WriteBatch {
    /// Operations in this batch.
    pub operations: Vec<WriteOperation>,
}

impl WriteBatch {
    /// Create a new empty write batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a put operation to the batch.
    pub fn put(&mut self, cf: impl Into<String>, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        self.operations.push(WriteOperation::Put {
            cf: cf.into(),
            key: key.into(),
            value: value.into(),
        });
    }

    /// Add a delete operation to the batch.
    pub fn delete(&mut self, cf: impl Into<String>, key: impl Into<Vec<u8>>) {
        self.operations.push(WriteOperation::Delete {
            cf: cf.into(),
            key: key.into(),
        });
    }

    /// Returns true if the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Returns the number of operations in the batch.
    pub fn len(&self) -> usize {
        self.operations.len()
    }
}

/// A single write operation within a batch.
#[derive(Debug, Clone)]
pub enum WriteOperation {
    /// Insert or update a key-value pair.
    Put {
        /// Column family name.
        cf: String,
        /// Key to write.
        key: Vec<u8>,
        /// Value to write.
        value: Vec<u8>,
    },
    /// Delete a key.
    Delete {
        /// Column family name.
        cf: String,
        /// Key to delete.
        key: Vec<u8>,
    },
}

/// Core trait for key-value storage backends.
///
/// Implementations of this trait provide the low-level storage primitives
/// that the scheduler uses for persisting rounds, term snapshots, and
/// metadata.
///
/// # Thread Safety
///
/// All implementations must be thread-safe (`Send + Sync`).
///
/// # Example
///
/// ```ignore
/// use dposcore_core::traits::{StateBackend, WriteBatch};
///
/// fn example(db: &impl StateBackend) {
///     // Single write
///     db.put("metadata", b"key", b"value").unwrap();
///
///     // Read back
///     let value = db.get("metadata", b"key").unwrap();
///     assert_eq!(value, Some(b"value".to_vec()));
///
///     // Batch write
///     let mut batch = WriteBatch::new();
///     batch.put("rounds", b"key1".to_vec(), b"value1".to_vec());
///     batch.put("rounds", b"key2".to_vec(), b"value2".to_vec());
///     db.write_batch(batch).unwrap();
/// }
/// ```
pub trait StateBackend: Send + Sync + 'static {
    /// Get a value by key from a column family.
    ///
    /// Returns `Ok(None)` if the key does not exist.
    fn get(&self, cf: &str, key: &[u8]) -> StorageResult<Option<Vec<u8>>>;

    /// Put a key-value pair into a column family.
    fn put(&self, cf: &str, key: &[u8], value: &[u8]) -> StorageResult<()>;

    /// Delete a key from a column family.
    ///
    /// Returns `Ok(())` even if the key does not exist.
    fn delete(&self, cf: &str, key: &[u8]) -> StorageResult<()>;

    /// Check if a key exists in a column family.
    fn contains(&self, cf: &str, key: &[u8]) -> StorageResult<bool> {
        Ok(self.get(cf, key)?.is_some())
    }

    /// Apply a batch of write operations atomically.
    ///
    /// Either all operations succeed or none do.
    fn write_batch(&self, batch: WriteBatch) -> StorageResult<()>;

    /// Flush any buffered writes to disk.
    fn flush(&self) -> StorageResult<()>;
}
