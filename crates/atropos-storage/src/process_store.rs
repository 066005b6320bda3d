//! Process-lifetime store: survives across epochs. Holds the current epoch,
//! current validator set, and the last frame whose Atropos was decided, so
//! a restart can resume without replaying decided frames (see
//! `atropos-consensus::bootstrap`).

use crate::error::StorageError;
use crate::kv::{KvStore, Table};
use atropos_types::{EpochId, FrameId, ValidatorId, Validators, Weight};
use std::sync::Arc;

const META_KEY: &[u8] = b"meta";

#[derive(Debug, Clone)]
pub struct ProcessMeta {
    pub epoch: EpochId,
    pub validators: Validators,
    pub last_decided_frame: FrameId,
}

fn encode_meta(meta: &ProcessMeta) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&meta.epoch.value().to_le_bytes());
    buf.extend_from_slice(&meta.last_decided_frame.value().to_le_bytes());
    let ids = meta.validators.sorted_ids();
    buf.extend_from_slice(&(ids.len() as u32).to_le_bytes());
    for id in ids {
        let weight = meta
            .validators
            .get(*id)
            .expect("sorted id always present in its own set");
        buf.extend_from_slice(&id.value().to_le_bytes());
        buf.extend_from_slice(&weight.value().to_le_bytes());
    }
    buf
}

fn decode_meta(bytes: &[u8]) -> Result<ProcessMeta, StorageError> {
    let err = || StorageError::CorruptEncoding {
        table: Table::ProcessMeta.name().to_string(),
        reason: "truncated process meta record".to_string(),
    };
    if bytes.len() < 12 {
        return Err(err());
    }
    let epoch = EpochId::new(u32::from_le_bytes(bytes[0..4].try_into().unwrap()));
    let last_decided_frame = FrameId::new(u32::from_le_bytes(bytes[4..8].try_into().unwrap()));
    let count = u32::from_le_bytes(bytes[8..12].try_into().unwrap()) as usize;
    let mut cursor = 12;
    let mut pairs = Vec::with_capacity(count);
    for _ in 0..count {
        if bytes.len() < cursor + 8 {
            return Err(err());
        }
        let id = ValidatorId::new(u32::from_le_bytes(bytes[cursor..cursor + 4].try_into().unwrap()));
        let weight = Weight::new(u32::from_le_bytes(
            bytes[cursor + 4..cursor + 8].try_into().unwrap(),
        ));
        pairs.push((id, weight));
        cursor += 8;
    }
    let validators = Validators::from_pairs(&pairs).map_err(|e| StorageError::CorruptEncoding {
        table: Table::ProcessMeta.name().to_string(),
        reason: e.to_string(),
    })?;
    Ok(ProcessMeta {
        epoch,
        validators,
        last_decided_frame,
    })
}

/// Thin typed wrapper over a [`KvStore`] for the process-lifetime record.
pub struct ProcessStore {
    kv: Arc<dyn KvStore>,
}

impl ProcessStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    pub fn load(&self) -> Result<Option<ProcessMeta>, StorageError> {
        match self.kv.get(Table::ProcessMeta, META_KEY)? {
            Some(bytes) => Ok(Some(decode_meta(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn save(&self, meta: &ProcessMeta) -> Result<(), StorageError> {
        self.kv.put(Table::ProcessMeta, META_KEY, &encode_meta(meta))
    }
}
