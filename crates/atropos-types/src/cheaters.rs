use crate::idx::ValidatorId;
use std::collections::HashSet;

/// Validators whose fork was observed in the causal past of a confirmed
/// Atropos, collected while walking the block (C7).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Cheaters(Vec<ValidatorId>);

impl Cheaters {
    pub fn new(ids: Vec<ValidatorId>) -> Self {
        Self(ids)
    }

    pub fn as_slice(&self) -> &[ValidatorId] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn set(&self) -> HashSet<ValidatorId> {
        self.0.iter().copied().collect()
    }
}

impl From<Vec<ValidatorId>> for Cheaters {
    fn from(v: Vec<ValidatorId>) -> Self {
        Self(v)
    }
}

impl IntoIterator for Cheaters {
    type Item = ValidatorId;
    type IntoIter = std::vec::IntoIter<ValidatorId>;
    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
