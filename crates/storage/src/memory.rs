//! In-memory storage backend.
//!
//! Backs the scheduler with plain maps instead of RocksDB. Behaviour under
//! batch writes matches the on-disk backend (all-or-nothing as observed by
//! readers), which makes it the backend of choice for deterministic unit
//! tests.

use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

use dposcore_core::{StateBackend, StorageError, StorageResult, WriteBatch, WriteOperation};

use crate::db::cf;

type Family = BTreeMap<Vec<u8>, Vec<u8>>;

/// An in-memory [`StateBackend`] with the same column families as the
/// RocksDB backend.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    families: RwLock<HashMap<String, Family>>,
}

impl MemoryBackend {
    /// Creates an empty backend with the scheduler's column families.
    pub fn new() -> Self {
        let mut families = HashMap::new();
        for name in cf::ALL {
            families.insert(name.to_string(), Family::new());
        }
        Self {
            families: RwLock::new(families),
        }
    }

    /// Number of keys currently stored in a column family.
    pub fn len(&self, cf_name: &str) -> usize {
        self.families
            .read()
            .get(cf_name)
            .map(|family| family.len())
            .unwrap_or(0)
    }

    /// Returns true if the column family holds no keys.
    pub fn is_empty(&self, cf_name: &str) -> bool {
        self.len(cf_name) == 0
    }
}

impl StateBackend for MemoryBackend {
    fn get(&self, cf_name: &str, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        let families = self.families.read();
        let family = families
            .get(cf_name)
            .ok_or_else(|| StorageError::ColumnFamilyNotFound(cf_name.to_string()))?;
        Ok(family.get(key).cloned())
    }

    fn put(&self, cf_name: &str, key: &[u8], value: &[u8]) -> StorageResult<()> {
        let mut families = self.families.write();
        let family = families
            .get_mut(cf_name)
            .ok_or_else(|| StorageError::ColumnFamilyNotFound(cf_name.to_string()))?;
        family.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, cf_name: &str, key: &[u8]) -> StorageResult<()> {
        let mut families = self.families.write();
        let family = families
            .get_mut(cf_name)
            .ok_or_else(|| StorageError::ColumnFamilyNotFound(cf_name.to_string()))?;
        family.remove(key);
        Ok(())
    }

    fn write_batch(&self, batch: WriteBatch) -> StorageResult<()> {
        let mut families = self.families.write();

        // Validate every target family before mutating anything, so a bad
        // batch leaves the store untouched
        for operation in &batch.operations {
            let cf_name = match operation {
                WriteOperation::Put { cf, .. } | WriteOperation::Delete { cf, .. } => cf,
            };
            if !families.contains_key(cf_name) {
                return Err(StorageError::ColumnFamilyNotFound(cf_name.clone()));
            }
        }

        for operation in batch.operations {
            match operation {
                WriteOperation::Put { cf, key, value } => {
                    families.get_mut(&cf).map(|family| family.insert(key, value));
                }
                WriteOperation::Delete { cf, key } => {
                    families.get_mut(&cf).map(|family| family.remove(&key));
                }
            }
        }
        Ok(())
    }

    fn flush(&self) -> StorageResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let backend = MemoryBackend::new();
        backend.put(cf::ROUNDS, b"1", b"data").unwrap();
        assert_eq!(backend.get(cf::ROUNDS, b"1").unwrap(), Some(b"data".to_vec()));
        backend.delete(cf::ROUNDS, b"1").unwrap();
        assert_eq!(backend.get(cf::ROUNDS, b"1").unwrap(), None);
    }

    #[test]
    fn bad_batch_has_no_effect() {
        let backend = MemoryBackend::new();
        let mut batch = WriteBatch::new();
        batch.put(cf::ROUNDS, b"1".to_vec(), b"data".to_vec());
        batch.put("bogus", b"2".to_vec(), b"data".to_vec());

        assert!(backend.write_batch(batch).is_err());
        assert!(backend.is_empty(cf::ROUNDS));
    }

    #[test]
    fn batch_applies_in_order() {
        let backend = MemoryBackend::new();
        let mut batch = WriteBatch::new();
        batch.put(cf::METADATA, b"k".to_vec(), b"v1".to_vec());
        batch.delete(cf::METADATA, b"k".to_vec());
        backend.write_batch(batch).unwrap();
        assert_eq!(backend.get(cf::METADATA, b"k").unwrap(), None);
    }
}
