//! Optional rocksdb-backed [`KvStore`], following `merklith-storage`'s
//! `db::Database` column-family pattern: one CF per [`Table`], opened up
//! front, LZ4-compressed by default.

use crate::error::StorageError;
use crate::kv::{KvStore, Table};
use rocksdb::{ColumnFamilyDescriptor, Options, DB};
use std::path::Path;

#[derive(Debug, Clone)]
pub struct RocksConfig {
    pub cache_size_mb: usize,
    pub max_open_files: i32,
}

impl Default for RocksConfig {
    fn default() -> Self {
        Self {
            cache_size_mb: 64,
            max_open_files: 256,
        }
    }
}

pub struct RocksKv {
    db: DB,
}

impl RocksKv {
    pub fn open(path: &Path, config: &RocksConfig) -> Result<Self, StorageError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_max_open_files(config.max_open_files);

        let cache = rocksdb::Cache::new_lru_cache(config.cache_size_mb * 1024 * 1024);
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_block_cache(&cache);
        opts.set_block_based_table_factory(&block_opts);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = Table::all()
            .into_iter()
            .map(|t| {
                let mut cf_opts = Options::default();
                cf_opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
                ColumnFamilyDescriptor::new(t.name(), cf_opts)
            })
            .collect();

        let db = DB::open_cf_descriptors(&opts, path, cf_descriptors)?;
        Ok(Self { db })
    }

    fn cf(&self, table: Table) -> Result<&rocksdb::ColumnFamily, StorageError> {
        self.db
            .cf_handle(table.name())
            .ok_or_else(|| StorageError::UnknownTable(table.name().to_string()))
    }
}

impl KvStore for RocksKv {
    fn get(&self, table: Table, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.db.get_cf(self.cf(table)?, key)?)
    }

    fn put(&self, table: Table, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        self.db.put_cf(self.cf(table)?, key, value)?;
        Ok(())
    }

    fn delete(&self, table: Table, key: &[u8]) -> Result<(), StorageError> {
        self.db.delete_cf(self.cf(table)?, key)?;
        Ok(())
    }

    fn iter(&self, table: Table) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError> {
        let cf = self.cf(table)?;
        let mut out = Vec::new();
        for item in self.db.iterator_cf(cf, rocksdb::IteratorMode::Start) {
            let (k, v) = item?;
            out.push((k.to_vec(), v.to_vec()));
        }
        Ok(out)
    }

    fn clear(&self, table: Table) -> Result<(), StorageError> {
        for (k, _) in self.iter(table)? {
            self.delete(table, &k)?;
        }
        Ok(())
    }
}
