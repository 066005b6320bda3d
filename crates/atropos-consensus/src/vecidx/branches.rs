//! Fork-branch bookkeeping, grounded in `vecengine/branches_info.go`'s
//! `BranchesInfo{BranchIDLastSeq, BranchIDCreatorIdxs, BranchIDByCreators}`.
//!
//! Each validator starts out as its own single branch (branch id == its
//! validator index). A fork — a creator publishing two events at the same
//! `seq` — allocates a fresh branch id at the end of the table so the two
//! conflicting lineages can be tracked independently without renumbering
//! the dense validator-index space.

use atropos_types::{Seq, ValidatorIdx, Validators};

#[derive(Debug, Clone)]
pub struct BranchesInfo {
    branch_last_seq: Vec<Seq>,
    branch_creator: Vec<ValidatorIdx>,
    branches_of_creator: Vec<Vec<ValidatorIdx>>,
}

impl BranchesInfo {
    /// One branch per validator, matching `newInitialBranchesInfo`.
    pub fn initial(validators: &Validators) -> Self {
        let n = validators.len().value() as usize;
        let branch_creator = (0..n as u32).map(ValidatorIdx::new).collect();
        let branch_last_seq = vec![Seq::new(0); n];
        let branches_of_creator = (0..n as u32).map(|i| vec![ValidatorIdx::new(i)]).collect();
        Self {
            branch_last_seq,
            branch_creator,
            branches_of_creator,
        }
    }

    pub fn num_branches(&self) -> ValidatorIdx {
        ValidatorIdx::new(self.branch_creator.len() as u32)
    }

    pub fn at_least_one_fork(&self, validators_len: ValidatorIdx) -> bool {
        self.branch_creator.len() as u32 > validators_len.value()
    }

    pub fn creator_of_branch(&self, branch: ValidatorIdx) -> ValidatorIdx {
        self.branch_creator[branch.value() as usize]
    }

    pub fn branches_of(&self, creator_idx: ValidatorIdx) -> &[ValidatorIdx] {
        &self.branches_of_creator[creator_idx.value() as usize]
    }

    pub fn last_seq(&self, branch: ValidatorIdx) -> Seq {
        self.branch_last_seq[branch.value() as usize]
    }

    pub fn set_last_seq(&mut self, branch: ValidatorIdx, seq: Seq) {
        self.branch_last_seq[branch.value() as usize] = seq;
    }

    /// Finds the branch of `creator_idx` whose last seq is exactly `seq - 1`,
    /// i.e. the branch a non-forking event with this `seq` would extend.
    /// Returns `None` when every existing branch has already moved past
    /// `seq - 1`, meaning a fresh branch must be allocated.
    pub fn branch_continuing(&self, creator_idx: ValidatorIdx, seq: Seq) -> Option<ValidatorIdx> {
        let prev = Seq::new(seq.value().saturating_sub(1));
        self.branches_of(creator_idx)
            .iter()
            .copied()
            .find(|&b| self.last_seq(b) == prev)
    }

    /// Allocates a new branch id for `creator_idx`, appended past the
    /// current table so existing dense indices never shift.
    pub fn new_branch(&mut self, creator_idx: ValidatorIdx) -> ValidatorIdx {
        let new_id = ValidatorIdx::new(self.branch_creator.len() as u32);
        self.branch_creator.push(creator_idx);
        self.branch_last_seq.push(Seq::new(0));
        self.branches_of_creator[creator_idx.value() as usize].push(new_id);
        new_id
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(self.branch_creator.len() as u32).to_le_bytes());
        for i in 0..self.branch_creator.len() {
            out.extend_from_slice(&self.branch_creator[i].value().to_le_bytes());
            out.extend_from_slice(&self.branch_last_seq[i].value().to_le_bytes());
        }
        out
    }

    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 4 {
            return None;
        }
        let count = u32::from_le_bytes(bytes[0..4].try_into().ok()?) as usize;
        let mut branch_creator = Vec::with_capacity(count);
        let mut branch_last_seq = Vec::with_capacity(count);
        let mut cursor = 4usize;
        for _ in 0..count {
            let creator = u32::from_le_bytes(bytes.get(cursor..cursor + 4)?.try_into().ok()?);
            let seq = u32::from_le_bytes(bytes.get(cursor + 4..cursor + 8)?.try_into().ok()?);
            branch_creator.push(ValidatorIdx::new(creator));
            branch_last_seq.push(Seq::new(seq));
            cursor += 8;
        }
        let mut branches_of_creator: Vec<Vec<ValidatorIdx>> = Vec::new();
        for (branch, &creator) in branch_creator.iter().enumerate() {
            let creator = creator.value() as usize;
            if branches_of_creator.len() <= creator {
                branches_of_creator.resize(creator + 1, Vec::new());
            }
            branches_of_creator[creator].push(ValidatorIdx::new(branch as u32));
        }
        Some(Self {
            branch_last_seq,
            branch_creator,
            branches_of_creator,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atropos_types::ValidatorsBuilder;

    fn validators(n: u32) -> Validators {
        let mut b = ValidatorsBuilder::default();
        for i in 0..n {
            b.set(i.into(), 1u32.into());
        }
        b.build().unwrap()
    }

    #[test]
    fn initial_has_one_branch_per_validator() {
        let info = BranchesInfo::initial(&validators(3));
        assert_eq!(info.num_branches(), ValidatorIdx::new(3));
        assert!(!info.at_least_one_fork(ValidatorIdx::new(3)));
    }

    #[test]
    fn new_branch_extends_table_without_shifting_existing_ids() {
        let mut info = BranchesInfo::initial(&validators(2));
        let forked = info.new_branch(ValidatorIdx::new(0));
        assert_eq!(forked, ValidatorIdx::new(2));
        assert_eq!(info.creator_of_branch(ValidatorIdx::new(0)), ValidatorIdx::new(0));
        assert_eq!(info.creator_of_branch(forked), ValidatorIdx::new(0));
        assert!(info.at_least_one_fork(ValidatorIdx::new(2)));
        assert_eq!(
            info.branches_of(ValidatorIdx::new(0)),
            &[ValidatorIdx::new(0), forked]
        );
    }

    #[test]
    fn branch_continuing_finds_the_extending_branch() {
        let mut info = BranchesInfo::initial(&validators(1));
        info.set_last_seq(ValidatorIdx::new(0), Seq::new(1));
        assert_eq!(
            info.branch_continuing(ValidatorIdx::new(0), Seq::new(2)),
            Some(ValidatorIdx::new(0))
        );
        assert_eq!(info.branch_continuing(ValidatorIdx::new(0), Seq::new(5)), None);
    }

    #[test]
    fn encode_decode_roundtrips() {
        let mut info = BranchesInfo::initial(&validators(2));
        info.set_last_seq(ValidatorIdx::new(0), Seq::new(4));
        let forked = info.new_branch(ValidatorIdx::new(0));
        info.set_last_seq(forked, Seq::new(2));
        let decoded = BranchesInfo::decode(&info.encode()).unwrap();
        assert_eq!(decoded.num_branches(), info.num_branches());
        assert_eq!(decoded.last_seq(forked), Seq::new(2));
        assert_eq!(decoded.branches_of(ValidatorIdx::new(0)), info.branches_of(ValidatorIdx::new(0)));
    }
}
