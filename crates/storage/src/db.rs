//! RocksDB wrapper with column families for scheduler data
//!
//! This module provides a high-level interface to RocksDB with predefined
//! column families for the scheduler's committed state.

use parking_lot::RwLock;
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, MultiThreaded, Options,
    WriteBatchWithTransaction, WriteOptions, DB,
};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use dposcore_core::{StateBackend, StorageError, StorageResult, WriteBatch, WriteOperation};

/// Column family names
pub mod cf {
    /// Rounds column family - stores committed rounds keyed by round number
    pub const ROUNDS: &str = "rounds";
    /// Terms column family - stores miner list snapshots keyed by term number
    pub const TERMS: &str = "terms";
    /// Metadata column family - stores the current round pointer and other
    /// scheduler metadata
    pub const METADATA: &str = "metadata";

    /// All column families
    pub const ALL: &[&str] = &[ROUNDS, TERMS, METADATA];
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Path to the database directory
    pub path: String,
    /// Enable compression (LZ4)
    pub enable_compression: bool,
    /// Maximum number of open files
    pub max_open_files: i32,
    /// Write buffer size in bytes
    pub write_buffer_size: usize,
    /// Enable WAL (Write-Ahead Log)
    pub enable_wal: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: String::from("./data/dposcore"),
            enable_compression: true,
            max_open_files: 256,
            write_buffer_size: 32 * 1024 * 1024, // 32 MB
            enable_wal: true,
        }
    }
}

/// RocksDB wrapper with column families
pub struct Database {
    inner: DBWithThreadMode<MultiThreaded>,
    config: DatabaseConfig,
    /// Lock for coordinating writes
    write_lock: RwLock<()>,
}

impl Database {
    /// Open or create a database at the specified path
    pub fn open(config: DatabaseConfig) -> StorageResult<Self> {
        info!("Opening database at: {}", config.path);

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_max_open_files(config.max_open_files);
        opts.set_write_buffer_size(config.write_buffer_size);

        if config.enable_compression {
            opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        }

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = cf::ALL
            .iter()
            .map(|name| {
                let mut cf_opts = Options::default();
                if config.enable_compression {
                    cf_opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
                }
                ColumnFamilyDescriptor::new(*name, cf_opts)
            })
            .collect();

        let path = Path::new(&config.path);
        let db = DB::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StorageError::Io(e.to_string()))?;

        info!(
            "Database opened with {} column families",
            cf::ALL.len()
        );

        Ok(Self {
            inner: db,
            config,
            write_lock: RwLock::new(()),
        })
    }

    /// Open database with default configuration
    pub fn open_default<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        let config = DatabaseConfig {
            path: path.as_ref().to_string_lossy().to_string(),
            ..Default::default()
        };
        Self::open(config)
    }

    fn cf_handle(&self, name: &str) -> StorageResult<Arc<BoundColumnFamily<'_>>> {
        self.inner
            .cf_handle(name)
            .ok_or_else(|| StorageError::ColumnFamilyNotFound(name.to_string()))
    }

    fn write_opts(&self) -> WriteOptions {
        let mut write_opts = WriteOptions::default();
        if self.config.enable_wal {
            write_opts.set_sync(false);
        } else {
            write_opts.disable_wal(true);
        }
        write_opts
    }
}

impl StateBackend for Database {
    fn get(&self, cf_name: &str, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        let cf = self.cf_handle(cf_name)?;
        self.inner
            .get_cf(&cf, key)
            .map_err(|e| StorageError::Io(e.to_string()))
    }

    fn put(&self, cf_name: &str, key: &[u8], value: &[u8]) -> StorageResult<()> {
        let cf = self.cf_handle(cf_name)?;
        let _guard = self.write_lock.write();
        self.inner
            .put_cf(&cf, key, value)
            .map_err(|e| StorageError::Io(e.to_string()))
    }

    fn delete(&self, cf_name: &str, key: &[u8]) -> StorageResult<()> {
        let cf = self.cf_handle(cf_name)?;
        let _guard = self.write_lock.write();
        self.inner
            .delete_cf(&cf, key)
            .map_err(|e| StorageError::Io(e.to_string()))
    }

    fn write_batch(&self, batch: WriteBatch) -> StorageResult<()> {
        let mut native: WriteBatchWithTransaction<false> = WriteBatchWithTransaction::default();
        for operation in &batch.operations {
            match operation {
                WriteOperation::Put { cf: cf_name, key, value } => {
                    let cf = self.cf_handle(cf_name)?;
                    native.put_cf(&cf, key, value);
                }
                WriteOperation::Delete { cf: cf_name, key } => {
                    let cf = self.cf_handle(cf_name)?;
                    native.delete_cf(&cf, key);
                }
            }
        }

        let _guard = self.write_lock.write();
        self.inner
            .write_opt(native, &self.write_opts())
            .map_err(|e| StorageError::Io(e.to_string()))
    }

    fn flush(&self) -> StorageResult<()> {
        self.inner
            .flush()
            .map_err(|e| StorageError::Io(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_temp() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_default(dir.path()).unwrap();
        (dir, db)
    }

    #[test]
    fn put_get_roundtrip() {
        let (_dir, db) = open_temp();
        db.put(cf::ROUNDS, b"1", b"round-one").unwrap();
        assert_eq!(db.get(cf::ROUNDS, b"1").unwrap(), Some(b"round-one".to_vec()));
        assert_eq!(db.get(cf::ROUNDS, b"2").unwrap(), None);
    }

    #[test]
    fn column_families_are_isolated() {
        let (_dir, db) = open_temp();
        db.put(cf::ROUNDS, b"k", b"a").unwrap();
        db.put(cf::TERMS, b"k", b"b").unwrap();
        assert_eq!(db.get(cf::ROUNDS, b"k").unwrap(), Some(b"a".to_vec()));
        assert_eq!(db.get(cf::TERMS, b"k").unwrap(), Some(b"b".to_vec()));
        assert_eq!(db.get(cf::METADATA, b"k").unwrap(), None);
    }

    #[test]
    fn batch_is_atomic_across_families() {
        let (_dir, db) = open_temp();
        let mut batch = WriteBatch::new();
        batch.put(cf::ROUNDS, b"5".to_vec(), b"round".to_vec());
        batch.put(cf::METADATA, b"current".to_vec(), b"5".to_vec());
        db.write_batch(batch).unwrap();

        assert_eq!(db.get(cf::ROUNDS, b"5").unwrap(), Some(b"round".to_vec()));
        assert_eq!(db.get(cf::METADATA, b"current").unwrap(), Some(b"5".to_vec()));
    }

    #[test]
    fn unknown_column_family_errors() {
        let (_dir, db) = open_temp();
        assert!(matches!(
            db.get("nope", b"k"),
            Err(StorageError::ColumnFamilyNotFound(_))
        ));
    }
}
