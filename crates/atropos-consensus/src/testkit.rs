//! Random DAG generation for tests (test-only). Grounded in
//! `ltypes/tdag/test_common.go`'s `GenNodes`/`ForEachRandFork`: a fixed
//! number of validators, each producing a chain of events that references
//! its own last event plus the other validators' last events, with an
//! optional seeded PRNG so a failing case can be reproduced from its seed.
//! Unlike the Go helper this has no callback hooks — callers read the
//! returned per-validator event lists directly.

#![cfg(test)]

use std::collections::HashMap;

use atropos_types::{BaseEvent, Event, EventId, Lamport, MutableBaseEvent, MutableEvent, Seq, ValidatorId, Validators, ValidatorsBuilder, Weight};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::vecidx::EventLookup;

/// `nodeCount` equal-weight validators named by index, matching `GenNodes`'s
/// role (naming is dropped, there is no event name table to populate here).
pub fn gen_validators(node_count: u32) -> Validators {
    let mut b = ValidatorsBuilder::new();
    for i in 1..=node_count {
        b.set(ValidatorId::new(i), Weight::new(1));
    }
    b.build().expect("node_count must be > 0")
}

/// An in-memory [`EventLookup`] over a flat id-to-event map, shared by every
/// hand-built and generated test DAG in this crate.
#[derive(Default)]
pub struct MapLookup(pub HashMap<EventId, BaseEvent>);

impl MapLookup {
    pub fn insert(&mut self, e: BaseEvent) {
        self.0.insert(e.id(), e);
    }
}

impl EventLookup for MapLookup {
    fn get(&self, id: EventId) -> Option<&dyn Event> {
        self.0.get(&id).map(|e| e as &dyn Event)
    }
}

/// One generated DAG: every validator's events in creation order, plus the
/// same events keyed by id for convenient lookup.
pub struct RandomDag {
    pub by_validator: HashMap<ValidatorId, Vec<BaseEvent>>,
    pub lookup: MapLookup,
}

impl RandomDag {
    /// All events in the order they were generated (validator-round-robin),
    /// handy for feeding straight into an `Orderer`.
    pub fn in_generation_order(&self) -> Vec<BaseEvent> {
        let mut max_len = 0;
        for events in self.by_validator.values() {
            max_len = max_len.max(events.len());
        }
        let mut ids = self.by_validator.keys().copied().collect::<Vec<_>>();
        ids.sort();
        let mut out = Vec::new();
        for round in 0..max_len {
            for &id in &ids {
                if let Some(e) = self.by_validator.get(&id).and_then(|v| v.get(round)) {
                    out.push(e.clone());
                }
            }
        }
        out
    }
}

/// Builds a forkless random DAG across `node_count` validators: `events_per_node`
/// events each, every event referencing its own last event (if any) plus the
/// last event of `parent_count - 1` other, randomly chosen, validators.
/// Mirrors `ForEachRandEvent`/`GenRandEvents` with no cheaters (`forks_count`
/// of zero in Go terms).
pub fn gen_random_dag(node_count: u32, events_per_node: u32, parent_count: usize, seed: u64) -> RandomDag {
    gen_random_dag_with_forks(node_count, events_per_node, parent_count, &[], 0, seed)
}

/// As [`gen_random_dag`], but `cheaters` may occasionally branch from an
/// earlier self-event instead of their latest one, up to `forks_count` times
/// each, producing the equivocating rows `ForklessCause`/fork-detection tests
/// need. The resulting events are not signed and carry no cryptographic
/// proof of the fork; callers only need the branch-worthy history shape.
pub fn gen_random_dag_with_forks(
    node_count: u32,
    events_per_node: u32,
    parent_count: usize,
    cheaters: &[ValidatorId],
    forks_count: u32,
    seed: u64,
) -> RandomDag {
    assert!(parent_count >= 1, "an event always has at least itself to reference");
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut by_validator: HashMap<ValidatorId, Vec<BaseEvent>> = HashMap::new();
    let mut lookup = MapLookup::default();
    let mut forks_used: HashMap<ValidatorId, u32> = HashMap::new();

    let nodes: Vec<ValidatorId> = (1..=node_count).map(ValidatorId::new).collect();

    for i in 0..(node_count as usize * events_per_node as usize) {
        let self_idx = i % node_count as usize;
        let creator = nodes[self_idx];

        let mut others: Vec<ValidatorId> = nodes.iter().copied().filter(|&n| n != creator).collect();
        others.shuffle(&mut rng);
        others.truncate(parent_count.saturating_sub(1));

        let history = by_validator.entry(creator).or_default();
        let is_cheater = cheaters.contains(&creator);
        let used = forks_used.entry(creator).or_insert(0);

        let self_parent: Option<&BaseEvent> = if history.is_empty() {
            None
        } else if is_cheater && *used < forks_count && history.len() > 1 && rng.gen_bool(0.5) {
            *used += 1;
            Some(&history[rng.gen_range(0..history.len() - 1)])
        } else {
            history.last()
        };

        let mut parents = Vec::with_capacity(parent_count);
        let (seq, lamport) = match self_parent {
            Some(p) => {
                parents.push(p.id());
                (Seq::new(p.seq().value() + 1), Lamport::new(p.lamport().value() + 1))
            }
            None => (Seq::new(1), Lamport::new(1)),
        };

        let mut lamport = lamport;
        for other in &others {
            if let Some(last) = by_validator.get(other).and_then(|v| v.last()) {
                parents.push(last.id());
                if lamport.value() <= last.lamport().value() {
                    lamport = Lamport::new(last.lamport().value() + 1);
                }
            }
        }

        let mut b = MutableBaseEvent::default();
        b.set_epoch(0.into());
        b.set_seq(seq);
        b.set_creator(creator);
        b.set_lamport(lamport);
        b.set_parents(parents);
        let content = format!("{}-{}", creator.value(), seq.value());
        let event = b.build(content.as_bytes());

        lookup.insert(event.clone());
        by_validator.entry(creator).or_default().push(event);
    }

    RandomDag { by_validator, lookup }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gen_validators_produces_equal_weight_set() {
        let v = gen_validators(4);
        assert_eq!(v.total_weight().value(), 4);
        assert_eq!(v.sorted_ids().len(), 4);
    }

    #[test]
    fn random_dag_is_reproducible_from_its_seed() {
        let a = gen_random_dag(4, 5, 3, 42);
        let b = gen_random_dag(4, 5, 3, 42);
        let mut ids_a: Vec<EventId> = a.lookup.0.keys().copied().collect();
        let mut ids_b: Vec<EventId> = b.lookup.0.keys().copied().collect();
        ids_a.sort();
        ids_b.sort();
        assert_eq!(ids_a, ids_b);
    }

    #[test]
    fn every_validator_produces_the_requested_event_count() {
        let dag = gen_random_dag(3, 6, 3, 7);
        for id in [ValidatorId::new(1), ValidatorId::new(2), ValidatorId::new(3)] {
            assert_eq!(dag.by_validator.get(&id).map(|v| v.len()).unwrap_or(0), 6);
        }
    }

    #[test]
    fn non_genesis_events_carry_a_self_parent() {
        let dag = gen_random_dag(3, 4, 2, 99);
        for events in dag.by_validator.values() {
            for e in &events[1..] {
                assert!(e.self_parent().is_some());
            }
        }
    }

    #[test]
    fn cheater_history_contains_more_than_one_latest_tip() {
        // With forks_count > 0 and a long enough history, a cheater's events
        // are not required to form a single chain; this only checks the
        // generator runs to completion and still produces full event counts
        // under forking, not the exact fork shape.
        let dag = gen_random_dag_with_forks(3, 8, 3, &[ValidatorId::new(1)], 2, 5);
        assert_eq!(dag.by_validator.get(&ValidatorId::new(1)).map(|v| v.len()).unwrap_or(0), 8);
    }
}
