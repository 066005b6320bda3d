//! The DAG index (C2): ingests events, maintains `HighestBefore`/`LowestAfter`
//! vector clocks and the branch table, persists through `atropos-storage`'s
//! `EpochStore`. Grounded in `vecengine/vector.go`'s `LowestAfterI`/
//! `HighestBeforeI` contract and `vecfc/index.go`'s `Add`/`GetMergedHighestBefore`.

use std::collections::HashMap;

use atropos_storage::EpochStore;
use atropos_types::{Event, EventId, FrameId, Seq, ValidatorId, ValidatorIdx, Validators};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;

use crate::config::CacheConfig;
use crate::vecidx::branches::BranchesInfo;
use crate::vecidx::vector::{BranchSeq, HighestBeforeSeq, LowestAfterSeq};

/// Looks up a previously ingested event by id; supplied by the caller so
/// this index stays agnostic to how events are stored.
pub trait EventLookup {
    fn get(&self, id: EventId) -> Option<&dyn Event>;
}

#[derive(Clone)]
struct Row {
    highest_before: HighestBeforeSeq,
    lowest_after: LowestAfterSeq,
}

pub struct VectorClockIndex {
    validators: Validators,
    branches: BranchesInfo,
    store: EpochStore,
    rows: Mutex<LruCache<EventId, Row>>,
    dirty: Mutex<HashMap<EventId, ()>>,
    /// Which branch each stored event belongs to, recorded at `add()` time.
    event_branch: Mutex<HashMap<EventId, ValidatorIdx>>,
}

impl VectorClockIndex {
    pub fn new(validators: Validators, store: EpochStore, caches: CacheConfig) -> Self {
        let branches = BranchesInfo::load_or_initial(&store, &validators);
        Self {
            validators,
            branches,
            store,
            rows: Mutex::new(LruCache::new(
                NonZeroUsize::new(caches.highest_before_rows.max(1)).unwrap(),
            )),
            dirty: Mutex::new(HashMap::new()),
            event_branch: Mutex::new(HashMap::new()),
        }
    }

    pub fn reset(&mut self, validators: Validators, store: EpochStore) {
        self.validators = validators;
        self.branches = BranchesInfo::initial(&self.validators);
        self.store = store;
        self.rows.lock().unwrap().clear();
        self.dirty.lock().unwrap().clear();
        self.event_branch.lock().unwrap().clear();
    }

    pub fn branch_of_event(&self, id: EventId) -> Option<ValidatorIdx> {
        self.event_branch.lock().unwrap().get(&id).copied()
    }

    fn load_row(&self, id: EventId) -> Option<Row> {
        if let Some(row) = self.rows.lock().unwrap().get(&id) {
            return Some(row.clone());
        }
        let hb = self.store.highest_before_bytes(id).ok()??;
        let la = self.store.lowest_after_bytes(id).ok()??;
        let row = Row {
            highest_before: HighestBeforeSeq::from_bytes(hb),
            lowest_after: LowestAfterSeq::from_bytes(la),
        };
        Some(row)
    }

    fn cache_row(&self, id: EventId, row: Row) {
        self.rows.lock().unwrap().put(id, row);
        self.dirty.lock().unwrap().insert(id, ());
    }

    /// Step 1: determines `e`'s branch. The branch whose last seq is exactly
    /// `e.seq() - 1` is the one `e`'s self-parent sits on and continues; if
    /// no branch ends there, `e` forks, allocating a fresh branch past `N`.
    fn branch_of(&mut self, e: &dyn Event) -> ValidatorIdx {
        let creator_idx = match self.validators.get_idx(e.creator()) {
            Some(idx) => idx,
            None => return ValidatorIdx::new(0),
        };

        match self.branches.branch_continuing(creator_idx, e.seq()) {
            Some(branch) => {
                self.branches.set_last_seq(branch, e.seq());
                branch
            }
            None => {
                let forked = self.branches.new_branch(creator_idx);
                self.branches.set_last_seq(forked, e.seq());
                forked
            }
        }
    }

    /// Ingest `e`: compute `HighestBefore[e]`, merge parents in, detect new
    /// forks, then DFS-update `LowestAfter` of every causal ancestor.
    pub fn add(&mut self, e: &dyn Event, lookup: &dyn EventLookup) {
        let branch = self.branch_of(e);
        self.event_branch.lock().unwrap().insert(e.id(), branch);
        let num_branches = self.branches.num_branches();

        let mut highest_before = HighestBeforeSeq::with_capacity(num_branches);
        highest_before.init_with_event(branch, e.seq().value());

        for parent_id in e.parents() {
            if *parent_id == e.id() {
                continue;
            }
            if let Some(parent_row) = self.load_row(*parent_id) {
                highest_before.collect_from(&parent_row.highest_before, num_branches);
            }
        }

        self.detect_new_forks(&mut highest_before, branch);

        let mut lowest_after = LowestAfterSeq::with_capacity(num_branches);
        lowest_after.set(branch, e.seq().value());
        self.cache_row(
            e.id(),
            Row {
                highest_before,
                lowest_after,
            },
        );

        self.update_lowest_after(e, branch, lookup);
    }

    /// Step 4: after merging parents, two branches of the same creator with
    /// non-overlapping `[minSeq, seq]` ranges indicate a fork neither branch
    /// had previously observed; mark both fork-detected.
    fn detect_new_forks(&self, highest_before: &mut HighestBeforeSeq, just_set: ValidatorIdx) {
        let creator = self.branches.creator_of_branch(just_set);
        let siblings = self.branches.branches_of(creator);
        if siblings.len() < 2 {
            return;
        }
        let mut ranges: Vec<(ValidatorIdx, BranchSeq)> = Vec::new();
        for &b in siblings {
            let v = highest_before.get(b);
            if !v.is_unset() {
                ranges.push((b, v));
            }
        }
        for i in 0..ranges.len() {
            for j in (i + 1)..ranges.len() {
                let (ba, va) = ranges[i];
                let (bb, vb) = ranges[j];
                if va.is_fork_detected() || vb.is_fork_detected() {
                    continue;
                }
                let disjoint = va.seq < vb.min_seq || vb.seq < va.min_seq;
                if disjoint {
                    highest_before.set_fork_detected(ba);
                    highest_before.set_fork_detected(bb);
                }
            }
        }
    }

    /// Step 5: DFS from `e`'s parents, setting `LowestAfter[a][e.branch]`
    /// for every ancestor not already carrying a lower value.
    fn update_lowest_after(&self, e: &dyn Event, branch: ValidatorIdx, lookup: &dyn EventLookup) {
        let mut stack: Vec<EventId> = e.parents().to_vec();
        let mut visited: HashMap<EventId, ()> = HashMap::new();
        while let Some(id) = stack.pop() {
            if visited.contains_key(&id) {
                continue;
            }
            visited.insert(id, ());
            let Some(mut row) = self.load_row(id) else {
                continue;
            };
            let wrote = row.lowest_after.visit(branch, e.seq().value());
            if !wrote {
                continue;
            }
            if let Some(ancestor) = lookup.get(id) {
                stack.extend(ancestor.parents().iter().copied());
            }
            self.cache_row(id, row);
        }
    }

    pub fn get_highest_before(&self, id: EventId) -> Option<HighestBeforeSeq> {
        self.load_row(id).map(|r| r.highest_before)
    }

    /// Folds every cheating creator's branches into one slot, preserving
    /// fork-detected and the max-seq/min-minSeq merge.
    pub fn get_merged_highest_before(&self, id: EventId) -> Option<HighestBeforeSeq> {
        let row = self.load_row(id)?;
        let n = self.validators.len();
        let mut merged = HighestBeforeSeq::with_capacity(n);
        for creator_idx in 0..n.value() {
            let creator_idx = ValidatorIdx::new(creator_idx);
            let branches = self.branches.branches_of(creator_idx);
            merged.gather_from(creator_idx, &row.highest_before, branches);
        }
        Some(merged)
    }

    pub fn validators(&self) -> &Validators {
        &self.validators
    }

    pub fn branches(&self) -> &BranchesInfo {
        &self.branches
    }

    /// Commits every buffered row to the epoch store.
    pub fn flush(&self) -> Result<(), atropos_storage::StorageError> {
        let dirty: Vec<EventId> = self.dirty.lock().unwrap().keys().copied().collect();
        let mut rows = self.rows.lock().unwrap();
        for id in dirty {
            if let Some(row) = rows.get(&id) {
                self.store.set_highest_before_bytes(id, row.highest_before.as_bytes())?;
                self.store.set_lowest_after_bytes(id, row.lowest_after.as_bytes())?;
            }
        }
        self.store.set_branches_info_bytes(&self.branches.encode())?;
        self.dirty.lock().unwrap().clear();
        Ok(())
    }

    /// Discards buffered writes, rolling the cache back to last `flush()`.
    pub fn drop_not_flushed(&self) {
        self.dirty.lock().unwrap().clear();
        self.rows.lock().unwrap().clear();
    }
}

impl BranchesInfo {
    fn load_or_initial(store: &EpochStore, validators: &Validators) -> BranchesInfo {
        store
            .branches_info_bytes()
            .ok()
            .flatten()
            .and_then(|b| BranchesInfo::decode(&b))
            .unwrap_or_else(|| BranchesInfo::initial(validators))
    }
}
