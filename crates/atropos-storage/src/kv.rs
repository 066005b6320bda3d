//! Minimal key/value store abstraction the two persisted stores are built
//! on, grounded in `merklith-storage::db::ColumnFamily`/`Database` and
//! `kvdb.Store`'s per-table interface.

use crate::error::StorageError;

/// One logical table inside the store. `Table::all()` is the set of column
/// families a backend must provision up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    /// Process-lifetime: single row holding `(epoch, validators, lastDecidedFrame)`.
    ProcessMeta,
    /// Per-epoch: root event ids grouped by frame.
    Roots,
    /// Per-epoch: event id -> frame it was confirmed on.
    ConfirmedOn,
    /// Per-epoch: packed `HighestBeforeSeq` rows, keyed by event id.
    HighestBefore,
    /// Per-epoch: packed `LowestAfterSeq` rows, keyed by event id.
    LowestAfter,
    /// Per-epoch: branch allocation bookkeeping (`BranchesInfo`).
    BranchesInfo,
}

impl Table {
    pub fn name(&self) -> &'static str {
        match self {
            Table::ProcessMeta => "process_meta",
            Table::Roots => "roots",
            Table::ConfirmedOn => "confirmed_on",
            Table::HighestBefore => "highest_before",
            Table::LowestAfter => "lowest_after",
            Table::BranchesInfo => "branches_info",
        }
    }

    pub fn all() -> [Table; 6] {
        [
            Table::ProcessMeta,
            Table::Roots,
            Table::ConfirmedOn,
            Table::HighestBefore,
            Table::LowestAfter,
            Table::BranchesInfo,
        ]
    }

    /// Whether this table is dropped when an epoch is sealed: the per-epoch
    /// store is discarded wholesale at epoch boundaries.
    pub fn is_per_epoch(&self) -> bool {
        !matches!(self, Table::ProcessMeta)
    }
}

/// Backend-agnostic byte-oriented key/value store.
pub trait KvStore: Send + Sync {
    fn get(&self, table: Table, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError>;
    fn put(&self, table: Table, key: &[u8], value: &[u8]) -> Result<(), StorageError>;
    fn delete(&self, table: Table, key: &[u8]) -> Result<(), StorageError>;
    /// Iterate all `(key, value)` pairs in a table, e.g. to rebuild caches on bootstrap.
    fn iter(&self, table: Table) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError>;
    /// Drop every row of a per-epoch table; called when sealing an epoch.
    fn clear(&self, table: Table) -> Result<(), StorageError>;
}
