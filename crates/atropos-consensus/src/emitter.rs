//! Block emitter (C7): walks the causal past of a confirmed Atropos,
//! stamping `confirmedOn` and invoking the per-event callback on every
//! ancestor not already part of an earlier block. Grounded in
//! `abft/orderer.go`'s block-confirmation walk (`confirmEvents`); that walk
//! is recursive over a small in-memory DAG there, expressed here with an
//! explicit stack so depth is bounded only by heap size.

use std::collections::HashSet;

use atropos_storage::EpochStore;
use atropos_types::{Block, Cheaters, ConsensusCallbacks, EventId, FrameId, Validators, ValidatorIdx};

use crate::error::CriticalError;
use crate::vecidx::{EventLookup, VectorClockIndex};

pub struct EmitOutcome {
    pub block: Block,
    /// `Some` when the block's `endBlock` callback reports a new validator
    /// set — the epoch is sealed and the caller must reset the engine.
    pub new_validators: Option<Validators>,
}

pub fn emit(
    frame: FrameId,
    atropos: EventId,
    index: &VectorClockIndex,
    epoch_store: &EpochStore,
    lookup: &dyn EventLookup,
    callbacks: &mut ConsensusCallbacks,
) -> Result<EmitOutcome, CriticalError> {
    let cheaters = collect_cheaters(index, atropos)?;
    let block = Block::new(atropos, cheaters);
    let mut block_callbacks = (callbacks.begin_block)(&block);

    let mut stack = vec![atropos];
    let mut pushed: HashSet<EventId> = HashSet::new();
    pushed.insert(atropos);
    while let Some(id) = stack.pop() {
        let already_confirmed = epoch_store
            .confirmed_on(id)
            .map_err(|e| CriticalError::Storage(e.to_string()))?
            .is_some();
        if already_confirmed {
            continue;
        }
        let event = lookup
            .get(id)
            .ok_or_else(|| CriticalError::Storage(format!("confirmed event {id} missing from storage")))?;
        epoch_store
            .set_confirmed_on(id, frame)
            .map_err(|e| CriticalError::Storage(e.to_string()))?;
        (block_callbacks.apply_event)(event);
        for &parent in event.parents() {
            if pushed.insert(parent) {
                stack.push(parent);
            }
        }
    }

    let new_validators = (block_callbacks.end_block)();
    Ok(EmitOutcome { block, new_validators })
}

/// Every creator whose branches merge to a fork-detected slot in the
/// Atropos's merged highest-before view had at least one fork in its
/// causal past.
fn collect_cheaters(index: &VectorClockIndex, atropos: EventId) -> Result<Cheaters, CriticalError> {
    let merged = index
        .get_merged_highest_before(atropos)
        .ok_or_else(|| CriticalError::Storage(format!("atropos {atropos} missing from vector-clock index")))?;

    let mut ids = Vec::new();
    for creator_idx in 0..index.validators().len().value() {
        let creator_idx = ValidatorIdx::new(creator_idx);
        if merged.is_fork_detected_at(creator_idx) {
            if let Some(id) = index.validators().get_id(creator_idx) {
                tracing::warn!(validator = %id, "cheater detected");
                ids.push(id);
            }
        }
    }
    Ok(Cheaters::new(ids))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use atropos_storage::MemKv;
    use atropos_types::{
        ApplyEventFn, BaseEvent, BeginBlockFn, BlockCallbacks, Event, EndBlockFn, Lamport,
        MutableBaseEvent, MutableEvent, Seq, ValidatorId, ValidatorsBuilder,
    };
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn validators() -> Validators {
        let mut b = ValidatorsBuilder::new();
        b.set(ValidatorId::new(1), 1u32.into());
        b.build().unwrap()
    }

    struct Lookup(HashMap<EventId, BaseEvent>);
    impl EventLookup for Lookup {
        fn get(&self, id: EventId) -> Option<&dyn Event> {
            self.0.get(&id).map(|e| e as &dyn Event)
        }
    }

    fn make_event(seq: u32, parents: Vec<EventId>, content: &[u8]) -> BaseEvent {
        let mut b = MutableBaseEvent::default();
        b.set_epoch(0.into());
        b.set_seq(Seq::new(seq));
        b.set_frame(FrameId::new(seq));
        b.set_creator(ValidatorId::new(1));
        b.set_lamport(Lamport::new(seq));
        b.set_parents(parents);
        b.build(content)
    }

    #[test]
    fn walks_the_whole_chain_and_stamps_confirmed_on() {
        let store = EpochStore::new(Arc::new(MemKv::new()));
        let mut idx = VectorClockIndex::new(validators(), store.clone(), CacheConfig::lite());
        let mut lookup = Lookup(HashMap::new());

        let a1 = make_event(1, vec![], b"a1");
        idx.add(&a1, &lookup);
        lookup.0.insert(a1.id(), a1.clone());

        let a2 = make_event(2, vec![a1.id()], b"a2");
        idx.add(&a2, &lookup);
        lookup.0.insert(a2.id(), a2.clone());

        let applied = RefCell::new(Vec::new());
        let begin: BeginBlockFn = Box::new(|_block| {
            let apply: ApplyEventFn = Box::new(|e: &dyn Event| applied.borrow_mut().push(e.id()));
            let end: EndBlockFn = Box::new(|| None);
            BlockCallbacks {
                apply_event: apply,
                end_block: end,
            }
        });
        let mut callbacks = ConsensusCallbacks { begin_block: begin };

        let outcome = emit(FrameId::new(2), a2.id(), &idx, &store, &lookup, &mut callbacks).unwrap();
        assert!(outcome.new_validators.is_none());
        assert_eq!(applied.borrow().len(), 2);
        assert!(store.confirmed_on(a1.id()).unwrap().is_some());
        assert!(store.confirmed_on(a2.id()).unwrap().is_some());
    }

    #[test]
    fn already_confirmed_ancestors_are_not_revisited() {
        let store = EpochStore::new(Arc::new(MemKv::new()));
        let mut idx = VectorClockIndex::new(validators(), store.clone(), CacheConfig::lite());
        let mut lookup = Lookup(HashMap::new());

        let a1 = make_event(1, vec![], b"a1");
        idx.add(&a1, &lookup);
        lookup.0.insert(a1.id(), a1.clone());
        store.set_confirmed_on(a1.id(), FrameId::new(1)).unwrap();

        let a2 = make_event(2, vec![a1.id()], b"a2");
        idx.add(&a2, &lookup);
        lookup.0.insert(a2.id(), a2.clone());

        let applied = RefCell::new(Vec::new());
        let begin: BeginBlockFn = Box::new(|_block| {
            let apply: ApplyEventFn = Box::new(|e: &dyn Event| applied.borrow_mut().push(e.id()));
            let end: EndBlockFn = Box::new(|| None);
            BlockCallbacks {
                apply_event: apply,
                end_block: end,
            }
        });
        let mut callbacks = ConsensusCallbacks { begin_block: begin };

        emit(FrameId::new(2), a2.id(), &idx, &store, &lookup, &mut callbacks).unwrap();
        assert_eq!(applied.borrow().as_slice(), &[a2.id()]);
    }
}
