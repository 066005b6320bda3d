//! Validator set with a dense, deterministically ordered index (C1).
//!
//! Grounded in `ltypes/validators.go`: a read-only, cache-bearing
//! `Validators` built from a mutable `ValidatorsBuilder`, sorted by weight
//! descending then id ascending so the order is reproducible from the raw
//! `(id, weight)` pairs alone.

use crate::error::TypesError;
use crate::idx::{ValidatorId, ValidatorIdx, Weight};
use std::collections::HashMap;

/// Mutable accumulator used by callers (e.g. epoch-rotation logic, which is
/// external to this crate) to assemble a validator set before freezing it.
#[derive(Debug, Default, Clone)]
pub struct ValidatorsBuilder {
    entries: HashMap<ValidatorId, Weight>,
}

impl ValidatorsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a validator's weight. A weight of zero removes the validator.
    pub fn set(&mut self, id: ValidatorId, weight: Weight) -> &mut Self {
        if weight.value() == 0 {
            self.entries.remove(&id);
        } else {
            self.entries.insert(id, weight);
        }
        self
    }

    pub fn build(self) -> Result<Validators, TypesError> {
        Validators::new(self.entries)
    }
}

#[derive(Debug, Clone, Default)]
struct Cache {
    indexes: HashMap<ValidatorId, ValidatorIdx>,
    weights: Vec<Weight>,
    ids: Vec<ValidatorId>,
    total_weight: Weight,
}

/// Read-only, densely indexed validator set. Validators are assigned a
/// stable `ValidatorIdx` in `[0, len)` sorted by descending weight, then
/// ascending id, so that two processes building the set from the same
/// `(id, weight)` pairs always agree on indices.
#[derive(Debug, Clone)]
pub struct Validators {
    values: HashMap<ValidatorId, Weight>,
    cache: Cache,
}

impl Validators {
    fn new(values: HashMap<ValidatorId, Weight>) -> Result<Self, TypesError> {
        if values.is_empty() {
            return Err(TypesError::EmptyValidatorSet);
        }

        let mut sorted: Vec<(ValidatorId, Weight)> = values.iter().map(|(k, v)| (*k, *v)).collect();
        sorted.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        let mut cache = Cache {
            indexes: HashMap::with_capacity(sorted.len()),
            weights: Vec::with_capacity(sorted.len()),
            ids: Vec::with_capacity(sorted.len()),
            total_weight: Weight::new(0),
        };

        for (i, (id, weight)) in sorted.into_iter().enumerate() {
            cache.indexes.insert(id, ValidatorIdx::new(i as u32));
            cache.weights.push(weight);
            cache.ids.push(id);
            cache.total_weight = cache
                .total_weight
                .checked_add(weight)
                .ok_or(TypesError::WeightOverflow)?;
        }

        if cache.total_weight.value() > u32::MAX / 2 {
            return Err(TypesError::WeightOverflow);
        }

        Ok(Self { values, cache })
    }

    /// Build a set where every id carries the same weight, handy for tests.
    pub fn equal_weight(ids: &[ValidatorId], weight: Weight) -> Result<Self, TypesError> {
        let mut b = ValidatorsBuilder::new();
        for id in ids {
            b.set(*id, weight);
        }
        b.build()
    }

    pub fn from_pairs(pairs: &[(ValidatorId, Weight)]) -> Result<Self, TypesError> {
        let mut b = ValidatorsBuilder::new();
        for (id, w) in pairs {
            b.set(*id, *w);
        }
        b.build()
    }

    pub fn len(&self) -> ValidatorIdx {
        ValidatorIdx::new(self.values.len() as u32)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, id: ValidatorId) -> Option<Weight> {
        self.values.get(&id).copied()
    }

    pub fn get_idx(&self, id: ValidatorId) -> Option<ValidatorIdx> {
        self.cache.indexes.get(&id).copied()
    }

    pub fn get_id(&self, idx: ValidatorIdx) -> Option<ValidatorId> {
        self.cache.ids.get(idx.value() as usize).copied()
    }

    pub fn get_weight_by_idx(&self, idx: ValidatorIdx) -> Option<Weight> {
        self.cache.weights.get(idx.value() as usize).copied()
    }

    pub fn exists(&self, id: ValidatorId) -> bool {
        self.values.contains_key(&id)
    }

    /// Sorted ids, same order as [`Validators::sorted_weights`] and indices.
    pub fn sorted_ids(&self) -> &[ValidatorId] {
        &self.cache.ids
    }

    pub fn sorted_weights(&self) -> &[Weight] {
        &self.cache.weights
    }

    pub fn total_weight(&self) -> Weight {
        self.cache.total_weight
    }

    /// `floor(2W/3) + 1`, the minimum weight that cannot be split between
    /// two disjoint, mutually-exclusive quorums.
    pub fn quorum(&self) -> Weight {
        Weight::new(self.cache.total_weight.value() * 2 / 3 + 1)
    }

    /// A fresh per-use weight counter over this validator set.
    pub fn new_counter(&self) -> WeightCounter {
        WeightCounter::new(self)
    }

    /// Mutable copy of the underlying `(id, weight)` pairs, for callers that
    /// want to derive a new validator set (e.g. after an epoch rotation).
    pub fn builder(&self) -> ValidatorsBuilder {
        ValidatorsBuilder {
            entries: self.values.clone(),
        }
    }
}

/// Idempotent per-index weight accumulator: counting the same validator
/// twice (fork detection, duplicate votes) never inflates the sum.
#[derive(Debug, Clone)]
pub struct WeightCounter {
    validators: Validators,
    already: Vec<bool>,
    quorum: Weight,
    sum: Weight,
}

impl WeightCounter {
    fn new(validators: &Validators) -> Self {
        Self {
            validators: validators.clone(),
            already: vec![false; validators.len().value() as usize],
            quorum: validators.quorum(),
            sum: Weight::new(0),
        }
    }

    /// Count a validator by id. Returns `true` the first time this
    /// validator is counted, `false` on any repeat.
    pub fn count(&mut self, id: ValidatorId) -> bool {
        match self.validators.get_idx(id) {
            Some(idx) => self.count_by_idx(idx),
            None => false,
        }
    }

    pub fn count_by_idx(&mut self, idx: ValidatorIdx) -> bool {
        let i = idx.value() as usize;
        if self.already[i] {
            return false;
        }
        self.already[i] = true;
        self.sum += self
            .validators
            .get_weight_by_idx(idx)
            .unwrap_or(Weight::new(0));
        true
    }

    pub fn has_quorum(&self) -> bool {
        self.sum.value() >= self.quorum.value()
    }

    pub fn sum(&self) -> Weight {
        self.sum
    }

    /// Number of distinct validators counted so far (diagnostic).
    pub fn num_counted(&self) -> usize {
        self.already.iter().filter(|&&c| c).count()
    }
}
