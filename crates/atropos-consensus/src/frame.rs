//! Frame assigner (C4). The production source computes `calcFrameIdx_v1`
//! with a single conditional bump; this carries the literal "while" form so
//! an event can jump several frames in one ingestion when a large enough
//! slice of the DAG has already converged underneath it.
//!
//! Takes the index and forkless-cause predicate by reference on every call
//! rather than storing them, so a driver can own the index, the predicate
//! and this assigner side by side without a self-referential struct.

use atropos_types::{EventId, FrameId, ValidatorId};

use crate::error::ConsensusError;
use crate::forkless_cause::ForklessCause;
use crate::vecidx::VectorClockIndex;

#[derive(Default)]
pub struct FrameAssigner {
    /// `frame -> roots observed at that frame`, used to test the
    /// quorum-of-frame-`f` condition without re-scanning the whole DAG.
    roots_by_frame: std::collections::HashMap<FrameId, Vec<(ValidatorId, EventId)>>,
    permissive_replay: bool,
}

pub struct FrameOutcome {
    pub self_parent_frame: FrameId,
    pub frame: FrameId,
    pub is_root: bool,
}

impl FrameAssigner {
    pub fn new(permissive_replay: bool) -> Self {
        Self {
            roots_by_frame: std::collections::HashMap::new(),
            permissive_replay,
        }
    }

    pub fn reset(&mut self) {
        self.roots_by_frame.clear();
    }

    /// Replaces the per-frame roots table wholesale, for bootstrap: a newly
    /// arriving event's frame computation needs to see the same
    /// quorum-of-roots context a continuously running process would have
    /// accumulated, not an empty one.
    pub fn seed(&mut self, roots_by_frame: std::collections::HashMap<FrameId, Vec<(ValidatorId, EventId)>>) {
        self.roots_by_frame = roots_by_frame;
    }

    pub fn roots_at(&self, frame: FrameId) -> &[(ValidatorId, EventId)] {
        self.roots_by_frame
            .get(&frame)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// An owned copy of every frame's roots so far, for callers (the
    /// orderer) that need to hand a `roots_at` closure to the election
    /// without holding a live borrow of this assigner across the call.
    pub fn snapshot(&self) -> std::collections::HashMap<FrameId, Vec<(ValidatorId, EventId)>> {
        self.roots_by_frame.clone()
    }

    /// Computes `e`'s frame given its parents' frames (already assigned),
    /// and whether it is a root of that frame. Records it in the frame's
    /// root list when it is.
    pub fn compute(
        &mut self,
        index: &VectorClockIndex,
        forkless_cause: &ForklessCause,
        event_id: EventId,
        creator: ValidatorId,
        self_parent_frame: Option<FrameId>,
        parent_frames: &[FrameId],
        declared_frame: Option<FrameId>,
    ) -> Result<FrameOutcome, ConsensusError> {
        let has_self_parent = self_parent_frame.is_some();
        let self_parent_frame = self_parent_frame.unwrap_or(FrameId::new(0));

        let frame = if !has_self_parent {
            FrameId::ROOT_FRAME
        } else {
            let mut frame = self_parent_frame;
            for &pf in parent_frames {
                if pf.value() > frame.value() {
                    frame = pf;
                }
            }
            loop {
                let candidates = self.roots_at(frame);
                if candidates.is_empty() {
                    break;
                }
                let mut counter = index.validators().new_counter();
                for &(validator, root_id) in candidates {
                    if forkless_cause.check(index, event_id, root_id) {
                        counter.count(validator);
                    }
                }
                if counter.has_quorum() {
                    frame = FrameId::new(frame.value() + 1);
                } else {
                    break;
                }
            }
            frame
        };

        if let Some(declared) = declared_frame {
            if declared != frame && !self.permissive_replay {
                return Err(ConsensusError::WrongFrame {
                    event: event_id,
                    declared,
                    computed: frame,
                });
            }
        }

        let is_root = frame.value() > self_parent_frame.value();
        if is_root {
            let already_rooted_this_frame = self
                .roots_by_frame
                .get(&frame)
                .map(|roots| roots.iter().any(|&(c, _)| c == creator))
                .unwrap_or(false);
            if already_rooted_this_frame {
                return Err(ConsensusError::RootProcessedOutOfOrder { frame, validator: creator });
            }
            self.roots_by_frame
                .entry(frame)
                .or_default()
                .push((creator, event_id));
        }

        Ok(FrameOutcome {
            self_parent_frame,
            frame,
            is_root,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use crate::vecidx::EventLookup;
    use atropos_storage::{EpochStore, MemKv};
    use atropos_types::{BaseEvent, Event, Lamport, MutableBaseEvent, MutableEvent, Seq, Validators, ValidatorsBuilder};
    use std::collections::HashMap;
    use std::sync::Arc;

    fn validators() -> Validators {
        let mut b = ValidatorsBuilder::new();
        b.set(ValidatorId::new(1), 1u32.into());
        b.set(ValidatorId::new(2), 1u32.into());
        b.set(ValidatorId::new(3), 1u32.into());
        b.build().unwrap()
    }

    struct Lookup(HashMap<EventId, BaseEvent>);
    impl EventLookup for Lookup {
        fn get(&self, id: EventId) -> Option<&dyn Event> {
            self.0.get(&id).map(|e| e as &dyn Event)
        }
    }

    fn make_event(seq: u32, creator: ValidatorId, parents: Vec<EventId>, content: &[u8]) -> BaseEvent {
        let mut b = MutableBaseEvent::default();
        b.set_epoch(0.into());
        b.set_seq(Seq::new(seq));
        b.set_creator(creator);
        b.set_lamport(Lamport::new(seq));
        b.set_parents(parents);
        b.build(content)
    }

    #[test]
    fn genesis_events_are_roots_of_frame_one() {
        let store = EpochStore::new(Arc::new(MemKv::new()));
        let mut idx = VectorClockIndex::new(validators(), store, CacheConfig::lite());
        let lookup = Lookup(HashMap::new());
        let fc = ForklessCause::new(10, Arc::new(|_| {}));
        let mut assigner = FrameAssigner::new(false);

        let a1 = make_event(1, ValidatorId::new(1), vec![], b"a1");
        idx.add(&a1, &lookup);

        let outcome = assigner
            .compute(&idx, &fc, a1.id(), ValidatorId::new(1), None, &[], None)
            .unwrap();
        assert_eq!(outcome.frame, FrameId::new(1));
        assert!(outcome.is_root);
    }

    #[test]
    fn declared_frame_mismatch_is_rejected_unless_permissive() {
        let store = EpochStore::new(Arc::new(MemKv::new()));
        let mut idx = VectorClockIndex::new(validators(), store, CacheConfig::lite());
        let lookup = Lookup(HashMap::new());
        let fc = ForklessCause::new(10, Arc::new(|_| {}));
        let mut assigner = FrameAssigner::new(false);

        let a1 = make_event(1, ValidatorId::new(1), vec![], b"a1");
        idx.add(&a1, &lookup);

        let err = assigner
            .compute(&idx, &fc, a1.id(), ValidatorId::new(1), None, &[], Some(FrameId::new(5)))
            .unwrap_err();
        assert!(matches!(err, ConsensusError::WrongFrame { .. }));
    }

    /// A second root for a frame a validator has already rooted — as would
    /// happen replaying the same persisted root twice — is rejected rather
    /// than silently recorded as a second candidate.
    #[test]
    fn a_second_root_from_the_same_validator_in_one_frame_is_rejected() {
        let store = EpochStore::new(Arc::new(MemKv::new()));
        let mut idx = VectorClockIndex::new(validators(), store, CacheConfig::lite());
        let lookup = Lookup(HashMap::new());
        let fc = ForklessCause::new(10, Arc::new(|_| {}));
        let mut assigner = FrameAssigner::new(false);

        let a1 = make_event(1, ValidatorId::new(1), vec![], b"a1");
        idx.add(&a1, &lookup);
        assigner
            .compute(&idx, &fc, a1.id(), ValidatorId::new(1), None, &[], None)
            .unwrap();

        let a1_again = make_event(1, ValidatorId::new(1), vec![], b"a1-again");
        idx.add(&a1_again, &lookup);
        let err = assigner
            .compute(&idx, &fc, a1_again.id(), ValidatorId::new(1), None, &[], None)
            .unwrap_err();
        assert!(matches!(err, ConsensusError::RootProcessedOutOfOrder { .. }));
    }
}
