//! In-memory `KvStore` backend, used for tests and for bootstrapping a
//! fresh epoch before any persistence is wired up.

use crate::error::StorageError;
use crate::kv::{KvStore, Table};
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Default)]
pub struct MemKv {
    tables: RwLock<HashMap<&'static str, HashMap<Vec<u8>, Vec<u8>>>>,
}

impl MemKv {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemKv {
    fn get(&self, table: Table, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self
            .tables
            .read()
            .get(table.name())
            .and_then(|t| t.get(key))
            .cloned())
    }

    fn put(&self, table: Table, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        self.tables
            .write()
            .entry(table.name())
            .or_default()
            .insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, table: Table, key: &[u8]) -> Result<(), StorageError> {
        if let Some(t) = self.tables.write().get_mut(table.name()) {
            t.remove(key);
        }
        Ok(())
    }

    fn iter(&self, table: Table) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError> {
        Ok(self
            .tables
            .read()
            .get(table.name())
            .map(|t| t.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default())
    }

    fn clear(&self, table: Table) -> Result<(), StorageError> {
        self.tables.write().remove(table.name());
        Ok(())
    }
}
