//! Atropos election (C5). Structural shape — per-frame `vote`/`decided`/
//! `eventMap` maps, `processRoot`'s round-based dispatch, `chooseAtropos`'s
//! sorted-validator-id scan — is grounded in `abft/election_v1/election.go`.
//! The vote arithmetic itself (signed aggregate weights, the `Q = (4W-3S)/4`
//! threshold) is not present in this pack's Go sources, which only ever
//! carry a plain majority/quorum vote; it is implemented directly from the
//! textual description instead, with votes stored as ± the casting root's
//! own weight so a frame-2 direct "yes"/"no" and a later round's aggregated
//! outgoing vote share one representation.
//!
//! Takes the index and forkless-cause predicate by reference on every call
//! rather than storing them, so a driver can own the index, the predicate
//! and this election side by side without a self-referential struct.

use std::collections::{BinaryHeap, HashMap, HashSet};

use atropos_types::{EventId, FrameId, ValidatorId, Validators};

use crate::error::CriticalError;
use crate::forkless_cause::ForklessCause;
use crate::vecidx::VectorClockIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct DeliveryEntry(u32, EventId);

pub struct Election {
    validators: Validators,
    votes: HashMap<FrameId, HashMap<EventId, HashMap<ValidatorId, i64>>>,
    decided: HashMap<FrameId, HashMap<ValidatorId, bool>>,
    event_map: HashMap<FrameId, HashMap<ValidatorId, EventId>>,
    atropos_decided: HashSet<FrameId>,
    delivery_buffer: BinaryHeap<std::cmp::Reverse<DeliveryEntry>>,
    frame_to_deliver: FrameId,
}

impl Election {
    pub fn new(validators: Validators) -> Self {
        Self {
            validators,
            votes: HashMap::new(),
            decided: HashMap::new(),
            event_map: HashMap::new(),
            atropos_decided: HashSet::new(),
            delivery_buffer: BinaryHeap::new(),
            frame_to_deliver: FrameId::ROOT_FRAME,
        }
    }

    /// Reconstructs state for bootstrap, skipping straight to the given
    /// next-undelivered frame (the persisted `lastDecidedFrame + 1`).
    pub fn reset(&mut self, validators: Validators, resume_from: FrameId) {
        self.validators = validators;
        self.votes.clear();
        self.decided.clear();
        self.event_map.clear();
        self.atropos_decided.clear();
        self.delivery_buffer.clear();
        self.frame_to_deliver = resume_from;
    }

    fn weight_of(&self, validator: ValidatorId) -> i64 {
        self.validators
            .get_idx(validator)
            .and_then(|idx| self.validators.get_weight_by_idx(idx))
            .map(|w| w.value() as i64)
            .unwrap_or(0)
    }

    /// Process one observed root and return every Atropos decision now
    /// ready for contiguous delivery.
    pub fn process_root(
        &mut self,
        index: &VectorClockIndex,
        forkless_cause: &ForklessCause,
        frame: FrameId,
        validator: ValidatorId,
        root: EventId,
        roots_at: &dyn Fn(FrameId) -> Vec<(ValidatorId, EventId)>,
    ) -> Result<Vec<(FrameId, EventId)>, CriticalError> {
        self.votes.entry(frame).or_default();
        self.decided.entry(frame).or_default();
        self.event_map.entry(frame).or_default();

        let frames_to_decide: Vec<FrameId> = self.votes.keys().copied().collect();
        for frame_to_decide in frames_to_decide {
            if frame_to_decide.value() >= frame.value() {
                continue;
            }
            let round = frame.value() - frame_to_decide.value();
            if round == 1 {
                self.direct_vote(index, forkless_cause, frame_to_decide, validator, root, &roots_at(frame_to_decide));
            } else {
                self.aggregate_votes(
                    index,
                    forkless_cause,
                    frame_to_decide,
                    validator,
                    root,
                    &roots_at(FrameId::new(frame.value() - 1)),
                );
            }
            self.choose_atropos(frame_to_decide)?;
        }

        Ok(self.drain_deliverable())
    }

    fn direct_vote(
        &mut self,
        index: &VectorClockIndex,
        forkless_cause: &ForklessCause,
        frame_to_decide: FrameId,
        voter: ValidatorId,
        root: EventId,
        candidates: &[(ValidatorId, EventId)],
    ) {
        let voter_weight = self.weight_of(voter);
        for &(candidate_validator, candidate_root) in candidates {
            let yes = forkless_cause.check(index, root, candidate_root);
            let vote = if yes { voter_weight } else { -voter_weight };
            self.votes
                .entry(frame_to_decide)
                .or_default()
                .entry(root)
                .or_default()
                .insert(candidate_validator, vote);
            if yes {
                self.event_map
                    .entry(frame_to_decide)
                    .or_default()
                    .entry(candidate_validator)
                    .or_insert(candidate_root);
            }
        }
    }

    fn aggregate_votes(
        &mut self,
        index: &VectorClockIndex,
        forkless_cause: &ForklessCause,
        frame_to_decide: FrameId,
        voter: ValidatorId,
        voter_root: EventId,
        observed_prev_frame_roots: &[(ValidatorId, EventId)],
    ) {
        let observed: Vec<(ValidatorId, EventId)> = observed_prev_frame_roots
            .iter()
            .copied()
            .filter(|&(_, candidate_id)| forkless_cause.check(index, voter_root, candidate_id))
            .collect();

        let total_weight = self.validators.total_weight().value() as i64;
        let observed_weight: i64 = observed.iter().map(|&(v, _)| self.weight_of(v)).sum();
        let quorum_margin = (4 * total_weight - 3 * observed_weight) as f64 / 4.0;

        let candidates: Vec<ValidatorId> = self.validators.sorted_ids().to_vec();
        for candidate in candidates {
            if self
                .decided
                .get(&frame_to_decide)
                .map(|d| d.contains_key(&candidate))
                .unwrap_or(false)
            {
                continue;
            }
            let aggregate: i64 = observed
                .iter()
                .filter_map(|&(_, obs_root)| {
                    self.votes
                        .get(&frame_to_decide)
                        .and_then(|m| m.get(&obs_root))
                        .and_then(|m| m.get(&candidate))
                        .copied()
                })
                .sum();

            if (aggregate as f64) > quorum_margin {
                self.decided.entry(frame_to_decide).or_default().insert(candidate, true);
            } else if (aggregate as f64) < -quorum_margin {
                self.decided.entry(frame_to_decide).or_default().insert(candidate, false);
            } else {
                let sign: i64 = if aggregate >= 0 { 1 } else { -1 };
                let vote = sign * self.weight_of(voter);
                self.votes
                    .entry(frame_to_decide)
                    .or_default()
                    .entry(voter_root)
                    .or_default()
                    .insert(candidate, vote);
            }
        }
    }

    fn choose_atropos(&mut self, frame_to_decide: FrameId) -> Result<(), CriticalError> {
        if self.atropos_decided.contains(&frame_to_decide) {
            return Ok(());
        }
        let decided = match self.decided.get(&frame_to_decide) {
            Some(d) => d,
            None => return Ok(()),
        };
        for &candidate in self.validators.sorted_ids() {
            match decided.get(&candidate) {
                None => return Ok(()),
                Some(true) => {
                    let atropos_id = self
                        .event_map
                        .get(&frame_to_decide)
                        .and_then(|m| m.get(&candidate))
                        .copied()
                        .expect("a yes-decided candidate must have a recorded root");
                    self.atropos_decided.insert(frame_to_decide);
                    self.delivery_buffer
                        .push(std::cmp::Reverse(DeliveryEntry(frame_to_decide.value(), atropos_id)));
                    self.votes.remove(&frame_to_decide);
                    self.decided.remove(&frame_to_decide);
                    self.event_map.remove(&frame_to_decide);
                    return Ok(());
                }
                Some(false) => continue,
            }
        }
        Err(CriticalError::AllRootsDecidedNo(frame_to_decide))
    }

    fn drain_deliverable(&mut self) -> Vec<(FrameId, EventId)> {
        let mut out = Vec::new();
        while let Some(std::cmp::Reverse(DeliveryEntry(frame, id))) = self.delivery_buffer.peek().copied() {
            if frame != self.frame_to_deliver.value() {
                break;
            }
            self.delivery_buffer.pop();
            out.push((FrameId::new(frame), id));
            self.frame_to_deliver = FrameId::new(frame + 1);
        }
        out
    }
}
