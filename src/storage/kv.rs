//! Key-value persistence behind the ledger
//!
//! The ledger needs three things from storage: point reads, point writes,
//! and an atomic multi-put so a block and the tip pointer land together.
//! The guarded variant of the multi-put compares a key with its expected
//! value inside the same atomic step.

use crate::error::{LedgerError, Result};
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::{Db, Tree};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

const BLOCKS_TREE: &str = "blocks";

pub trait KvStore: Send + Sync {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Writes every pair or none of them.
    fn write_batch(&self, batch: &[(Vec<u8>, Vec<u8>)]) -> Result<()>;

    /// Writes `batch` only if `guard_key` currently holds `expected`
    /// (`None` meaning absent). Comparison and write are one atomic step.
    fn write_batch_if(
        &self,
        guard_key: &[u8],
        expected: Option<&[u8]>,
        batch: &[(Vec<u8>, Vec<u8>)],
    ) -> Result<BatchOutcome>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    Written,
    /// Nothing was written; carries what `guard_key` held instead.
    Conflict(Option<Vec<u8>>),
}

/// Sled-backed store; all ledger keys live in the `blocks` tree.
#[derive(Clone)]
pub struct SledStore {
    db: Db,
    tree: Tree,
    path: PathBuf,
}

impl SledStore {
    pub fn open(path: &Path) -> Result<SledStore> {
        let db = sled::open(path)
            .map_err(|e| LedgerError::Store(format!("Failed to open database: {e}")))?;
        let tree = db
            .open_tree(BLOCKS_TREE)
            .map_err(|e| LedgerError::Store(format!("Failed to open blocks tree: {e}")))?;
        Ok(SledStore {
            db,
            tree,
            path: path.to_path_buf(),
        })
    }

    pub fn get_path(&self) -> &Path {
        &self.path
    }

    pub fn flush(&self) -> Result<()> {
        self.db
            .flush()
            .map_err(|e| LedgerError::Store(format!("Failed to flush database: {e}")))?;
        Ok(())
    }
}

impl KvStore for SledStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let value = self
            .tree
            .get(key)
            .map_err(|e| LedgerError::Store(format!("Failed to read key: {e}")))?;
        Ok(value.map(|v| v.to_vec()))
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.tree
            .insert(key, value)
            .map_err(|e| LedgerError::Store(format!("Failed to write key: {e}")))?;
        Ok(())
    }

    fn write_batch(&self, batch: &[(Vec<u8>, Vec<u8>)]) -> Result<()> {
        self.tree
            .transaction(|tx_db| {
                for (key, value) in batch {
                    tx_db.insert(key.as_slice(), value.as_slice())?;
                }
                Ok(())
            })
            .map_err(|e: sled::transaction::TransactionError| {
                LedgerError::Store(format!("Failed to commit batch: {e}"))
            })?;
        Ok(())
    }

    fn write_batch_if(
        &self,
        guard_key: &[u8],
        expected: Option<&[u8]>,
        batch: &[(Vec<u8>, Vec<u8>)],
    ) -> Result<BatchOutcome> {
        let result = self.tree.transaction(|tx_db| {
            let current = tx_db.get(guard_key)?;
            if current.as_deref() != expected {
                return Err(ConflictableTransactionError::Abort(
                    current.map(|v| v.to_vec()),
                ));
            }
            for (key, value) in batch {
                tx_db.insert(key.as_slice(), value.as_slice())?;
            }
            Ok(())
        });

        match result {
            Ok(()) => Ok(BatchOutcome::Written),
            Err(TransactionError::Abort(found)) => Ok(BatchOutcome::Conflict(found)),
            Err(TransactionError::Storage(e)) => Err(LedgerError::Store(format!(
                "Failed to commit guarded batch: {e}"
            ))),
        }
    }
}

/// Process-local store, mostly for tests.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<HashMap<Vec<u8>, Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    pub fn len(&self) -> Result<usize> {
        let inner = self
            .inner
            .read()
            .map_err(|e| LedgerError::Lock(format!("Memory store poisoned: {e}")))?;
        Ok(inner.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let inner = self
            .inner
            .read()
            .map_err(|e| LedgerError::Lock(format!("Memory store poisoned: {e}")))?;
        Ok(inner.get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let mut inner = self
            .inner
            .write()
            .map_err(|e| LedgerError::Lock(format!("Memory store poisoned: {e}")))?;
        inner.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn write_batch(&self, batch: &[(Vec<u8>, Vec<u8>)]) -> Result<()> {
        // One write guard for the whole batch keeps it atomic to readers
        let mut inner = self
            .inner
            .write()
            .map_err(|e| LedgerError::Lock(format!("Memory store poisoned: {e}")))?;
        for (key, value) in batch {
            inner.insert(key.clone(), value.clone());
        }
        Ok(())
    }

    fn write_batch_if(
        &self,
        guard_key: &[u8],
        expected: Option<&[u8]>,
        batch: &[(Vec<u8>, Vec<u8>)],
    ) -> Result<BatchOutcome> {
        let mut inner = self
            .inner
            .write()
            .map_err(|e| LedgerError::Lock(format!("Memory store poisoned: {e}")))?;
        let current = inner.get(guard_key);
        if current.map(Vec::as_slice) != expected {
            return Ok(BatchOutcome::Conflict(current.cloned()));
        }
        for (key, value) in batch {
            inner.insert(key.clone(), value.clone());
        }
        Ok(BatchOutcome::Written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(store: &dyn KvStore) {
        assert_eq!(store.get(b"missing").unwrap(), None);

        store.put(b"a", b"1").unwrap();
        assert_eq!(store.get(b"a").unwrap(), Some(b"1".to_vec()));

        store
            .write_batch(&[
                (b"a".to_vec(), b"2".to_vec()),
                (b"b".to_vec(), b"3".to_vec()),
            ])
            .unwrap();
        assert_eq!(store.get(b"a").unwrap(), Some(b"2".to_vec()));
        assert_eq!(store.get(b"b").unwrap(), Some(b"3".to_vec()));

        // Guarded batch: absent guard, matching guard, stale guard
        let batch = [(b"tip".to_vec(), b"x".to_vec()), (b"x".to_vec(), b"1".to_vec())];
        assert_eq!(
            store.write_batch_if(b"tip", None, &batch).unwrap(),
            BatchOutcome::Written
        );
        assert_eq!(
            store.write_batch_if(b"tip", None, &batch).unwrap(),
            BatchOutcome::Conflict(Some(b"x".to_vec()))
        );
        let next = [(b"tip".to_vec(), b"y".to_vec())];
        assert_eq!(
            store.write_batch_if(b"tip", Some(b"x"), &next).unwrap(),
            BatchOutcome::Written
        );
        let stale = [(b"tip".to_vec(), b"z".to_vec()), (b"z".to_vec(), b"2".to_vec())];
        assert_eq!(
            store.write_batch_if(b"tip", Some(b"x"), &stale).unwrap(),
            BatchOutcome::Conflict(Some(b"y".to_vec()))
        );
        assert_eq!(store.get(b"tip").unwrap(), Some(b"y".to_vec()));
        assert_eq!(store.get(b"z").unwrap(), None);
    }

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert!(store.is_empty().unwrap());
        exercise(&store);
        assert_eq!(store.len().unwrap(), 4);
    }

    #[test]
    fn test_sled_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledStore::open(&dir.path().join("db")).unwrap();
        exercise(&store);
        store.flush().unwrap();
    }

    #[test]
    fn test_sled_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db");
        {
            let store = SledStore::open(&path).unwrap();
            store.put(b"tip", b"abc").unwrap();
            store.flush().unwrap();
        }
        let store = SledStore::open(&path).unwrap();
        assert_eq!(store.get(b"tip").unwrap(), Some(b"abc".to_vec()));
    }
}
