//! Per-epoch store: everything dropped when an epoch is sealed — roots by
//! frame, confirmed-frame lookups, the packed vector-clock rows, and branch
//! bookkeeping. `atropos-consensus` owns the byte encodings of the vector
//! rows and `BranchesInfo`; this crate only offers raw get/set/iterate over
//! the right table, exactly as `vecfc/store_vectors.go`'s `getBytes`/
//! `setBytes` helpers do over a `kvdb.Store`.

use crate::error::StorageError;
use crate::kv::{KvStore, Table};
use atropos_types::{EventId, FrameId};
use std::sync::Arc;

const BRANCHES_INFO_KEY: &[u8] = b"c";

#[derive(Clone)]
pub struct EpochStore {
    kv: Arc<dyn KvStore>,
}

impl EpochStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    fn root_key(frame: FrameId, id: EventId) -> Vec<u8> {
        let mut key = Vec::with_capacity(4 + 32);
        key.extend_from_slice(&frame.value().to_be_bytes());
        key.extend_from_slice(id.as_bytes());
        key
    }

    pub fn add_root(&self, frame: FrameId, id: EventId) -> Result<(), StorageError> {
        self.kv.put(Table::Roots, &Self::root_key(frame, id), &[])
    }

    pub fn roots_at(&self, frame: FrameId) -> Result<Vec<EventId>, StorageError> {
        let prefix = frame.value().to_be_bytes();
        let mut out = Vec::new();
        for (key, _) in self.kv.iter(Table::Roots)? {
            if key.len() == 36 && key[0..4] == prefix {
                out.push(EventId::from_slice(&key[4..36]).map_err(|e| {
                    StorageError::CorruptEncoding {
                        table: Table::Roots.name().to_string(),
                        reason: e.to_string(),
                    }
                })?);
            }
        }
        Ok(out)
    }

    /// All persisted roots grouped by frame, used to rebuild election state
    /// on bootstrap.
    pub fn all_roots(&self) -> Result<Vec<(FrameId, EventId)>, StorageError> {
        let mut out = Vec::new();
        for (key, _) in self.kv.iter(Table::Roots)? {
            if key.len() != 36 {
                continue;
            }
            let frame = FrameId::new(u32::from_be_bytes(key[0..4].try_into().unwrap()));
            let id = EventId::from_slice(&key[4..36]).map_err(|e| StorageError::CorruptEncoding {
                table: Table::Roots.name().to_string(),
                reason: e.to_string(),
            })?;
            out.push((frame, id));
        }
        Ok(out)
    }

    pub fn confirmed_on(&self, id: EventId) -> Result<Option<FrameId>, StorageError> {
        Ok(self
            .kv
            .get(Table::ConfirmedOn, id.as_bytes())?
            .map(|b| FrameId::new(u32::from_le_bytes(b[..4].try_into().unwrap()))))
    }

    pub fn set_confirmed_on(&self, id: EventId, frame: FrameId) -> Result<(), StorageError> {
        self.kv
            .put(Table::ConfirmedOn, id.as_bytes(), &frame.value().to_le_bytes())
    }

    pub fn highest_before_bytes(&self, id: EventId) -> Result<Option<Vec<u8>>, StorageError> {
        self.kv.get(Table::HighestBefore, id.as_bytes())
    }

    pub fn set_highest_before_bytes(&self, id: EventId, bytes: &[u8]) -> Result<(), StorageError> {
        self.kv.put(Table::HighestBefore, id.as_bytes(), bytes)
    }

    pub fn lowest_after_bytes(&self, id: EventId) -> Result<Option<Vec<u8>>, StorageError> {
        self.kv.get(Table::LowestAfter, id.as_bytes())
    }

    pub fn set_lowest_after_bytes(&self, id: EventId, bytes: &[u8]) -> Result<(), StorageError> {
        self.kv.put(Table::LowestAfter, id.as_bytes(), bytes)
    }

    pub fn branches_info_bytes(&self) -> Result<Option<Vec<u8>>, StorageError> {
        self.kv.get(Table::BranchesInfo, BRANCHES_INFO_KEY)
    }

    pub fn set_branches_info_bytes(&self, bytes: &[u8]) -> Result<(), StorageError> {
        self.kv.put(Table::BranchesInfo, BRANCHES_INFO_KEY, bytes)
    }

    /// Drop every per-epoch table; called when sealing an epoch.
    pub fn clear(&self) -> Result<(), StorageError> {
        for table in Table::all() {
            if table.is_per_epoch() {
                self.kv.clear(table)?;
            }
        }
        Ok(())
    }
}
