//! Packed byte-array vector clocks, grounded in `vecfc/vector.go`.
//! Little-endian, fixed-width per branch, auto-growing on write exactly
//! like the source's `append zeros if exceeds size`.

use atropos_types::ValidatorIdx;

/// One branch's `(seq, minSeq)` pair inside a `HighestBeforeSeq` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BranchSeq {
    pub seq: u32,
    pub min_seq: u32,
}

impl BranchSeq {
    /// Sentinel marking a fork observed for this branch: `seq=0,
    /// minSeq=0x7FFFFFFF`. Dominates any real value under max-seq /
    /// min-minSeq merges while remaining distinguishable from "unset"
    /// (`seq=0, minSeq=0`).
    pub const FORK_DETECTED: BranchSeq = BranchSeq {
        seq: 0,
        min_seq: 0x7FFF_FFFF,
    };

    pub fn is_fork_detected(&self) -> bool {
        *self == Self::FORK_DETECTED
    }

    pub fn is_unset(&self) -> bool {
        self.seq == 0 && self.min_seq == 0
    }
}

fn idx(i: ValidatorIdx) -> usize {
    i.value() as usize
}

/// `lowestAfter[b]`: the lowest-sequence event of branch `b` that observes
/// the row's owning event. 4 bytes per branch, little-endian `u32`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LowestAfterSeq(Vec<u8>);

impl LowestAfterSeq {
    pub fn with_capacity(branches: ValidatorIdx) -> Self {
        Self(vec![0u8; idx(branches) * 4])
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn size(&self) -> usize {
        self.0.len() / 4
    }

    pub fn get(&self, i: ValidatorIdx) -> u32 {
        let i = idx(i);
        if i >= self.size() {
            return 0;
        }
        u32::from_le_bytes(self.0[i * 4..i * 4 + 4].try_into().unwrap())
    }

    pub fn set(&mut self, i: ValidatorIdx, seq: u32) {
        let i = idx(i);
        while i >= self.size() {
            self.0.extend_from_slice(&[0u8; 4]);
        }
        self.0[i * 4..i * 4 + 4].copy_from_slice(&seq.to_le_bytes());
    }

    /// Sets `i`'s seq the first time it is visited during the ancestor DFS;
    /// returns whether this call did anything.
    pub fn visit(&mut self, i: ValidatorIdx, seq: u32) -> bool {
        if self.get(i) != 0 {
            return false;
        }
        self.set(i, seq);
        true
    }
}

/// `highestBefore[b]`: the highest-sequence event of branch `b` observed by
/// the row's owning event, plus the lowest seq in the same branch still
/// observed. 8 bytes per branch, little-endian `u32` seq then `u32` minSeq.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HighestBeforeSeq(Vec<u8>);

impl HighestBeforeSeq {
    pub fn with_capacity(branches: ValidatorIdx) -> Self {
        Self(vec![0u8; idx(branches) * 8])
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn size(&self) -> usize {
        self.0.len() / 8
    }

    pub fn get(&self, i: ValidatorIdx) -> BranchSeq {
        let i = idx(i);
        if i >= self.size() {
            return BranchSeq::default();
        }
        let seq = u32::from_le_bytes(self.0[i * 8..i * 8 + 4].try_into().unwrap());
        let min_seq = u32::from_le_bytes(self.0[i * 8 + 4..i * 8 + 8].try_into().unwrap());
        BranchSeq { seq, min_seq }
    }

    pub fn set(&mut self, i: ValidatorIdx, v: BranchSeq) {
        let i = idx(i);
        while i >= self.size() {
            self.0.extend_from_slice(&[0u8; 8]);
        }
        self.0[i * 8..i * 8 + 4].copy_from_slice(&v.seq.to_le_bytes());
        self.0[i * 8 + 4..i * 8 + 8].copy_from_slice(&v.min_seq.to_le_bytes());
    }

    pub fn init_with_event(&mut self, i: ValidatorIdx, seq: u32) {
        self.set(i, BranchSeq { seq, min_seq: seq });
    }

    pub fn is_empty_at(&self, i: ValidatorIdx) -> bool {
        let v = self.get(i);
        !v.is_fork_detected() && v.seq == 0
    }

    pub fn is_fork_detected_at(&self, i: ValidatorIdx) -> bool {
        self.get(i).is_fork_detected()
    }

    pub fn set_fork_detected(&mut self, i: ValidatorIdx) {
        self.set(i, BranchSeq::FORK_DETECTED);
    }

    /// Element-wise merge of `other` into `self`: fork-detected dominates,
    /// else `seq` takes the max and `minSeq` the min of the two (ignoring
    /// an unset `0` on either side).
    pub fn collect_from(&mut self, other: &HighestBeforeSeq, num_branches: ValidatorIdx) {
        for b in 0..num_branches.value() {
            let b = ValidatorIdx::new(b);
            let his = other.get(b);
            if his.seq == 0 && !his.is_fork_detected() {
                continue;
            }
            let mine = self.get(b);
            if mine.is_fork_detected() {
                continue;
            }
            if his.is_fork_detected() {
                self.set_fork_detected(b);
                continue;
            }
            let mut updated = mine;
            if mine.seq == 0 || mine.min_seq > his.min_seq {
                updated.min_seq = his.min_seq;
            }
            if mine.seq < his.seq {
                updated.seq = his.seq;
            }
            self.set(b, updated);
        }
    }

    /// Folds the branches listed in `from` into a single slot `to`, taking
    /// the maximum observed — used to build the merged (per-creator) view
    /// that `getMergedHighestBefore` exposes.
    pub fn gather_from(&mut self, to: ValidatorIdx, other: &HighestBeforeSeq, from: &[ValidatorIdx]) {
        let mut highest = BranchSeq::default();
        for &branch in from {
            let v = other.get(branch);
            if v.is_fork_detected() {
                highest = v;
                break;
            }
            if v.seq > highest.seq {
                highest = v;
            }
        }
        self.set(to, highest);
    }
}
