//! Bootstrap (C8): reconstructs a running [`Orderer`] after a restart from
//! persisted process/epoch state, replaying the election's in-memory vote
//! bookkeeping over already-known roots before resuming live processing.
//! Grounded in `abft/orderer.go`'s `Bootstrap`, which walks the same
//! persisted roots table to rebuild `election` state without re-running
//! frame assignment — the DAG index itself needs no replay, since its rows
//! are loaded lazily from `EpochStore` on demand.

use std::collections::{BTreeMap, HashMap};

use atropos_storage::{EpochStore, ProcessStore};
use atropos_types::{
    ApplyEventFn, BeginBlockFn, Block, BlockCallbacks, ConsensusCallbacks, EndBlockFn, EpochId,
    EventId, FrameId, ValidatorId, Validators,
};

use crate::config::Config;
use crate::error::{CriticalError, CriticalSink};
use crate::orderer::Orderer;
use crate::vecidx::EventLookup;

/// Rebuilds an [`Orderer`] from whatever a previous process left in
/// `process_store`/`epoch_store`, and replays every persisted root through
/// the election so its vote bookkeeping matches a process that never
/// restarted.
///
/// Roots from frames at or below the last decided frame only exist to
/// supply context the later rounds' aggregate votes still read; their
/// blocks were already delivered to the caller before the restart, so they
/// replay through a discarding callback set. A root above the last decided
/// frame replays through `callbacks`, and if that replay completes a
/// decision, its block is both delivered for real and returned here.
pub fn bootstrap(
    genesis_validators: Validators,
    epoch_store: EpochStore,
    process_store: ProcessStore,
    lookup: &dyn EventLookup,
    config: Config,
    critical_sink: CriticalSink,
    callbacks: &mut ConsensusCallbacks,
) -> Result<(Orderer, Vec<Block>), CriticalError> {
    let meta = process_store.load().map_err(|e| CriticalError::Storage(e.to_string()))?;
    let (epoch, validators, last_decided_frame) = match meta {
        Some(m) => (m.epoch, m.validators, m.last_decided_frame),
        None => (EpochId::new(0), genesis_validators, FrameId::new(0)),
    };
    let resume_from = FrameId::new(last_decided_frame.value() + 1);
    tracing::info!(epoch = epoch.value(), resume_from = resume_from.value(), "bootstrapping orderer");

    let mut orderer = Orderer::new(epoch, validators, epoch_store.clone(), process_store, config, critical_sink);
    orderer.set_resume_frame(resume_from);

    let persisted = epoch_store.all_roots().map_err(|e| CriticalError::Storage(e.to_string()))?;
    let mut roots_by_frame: BTreeMap<FrameId, Vec<(ValidatorId, EventId)>> = BTreeMap::new();
    for (frame, id) in persisted {
        let creator = lookup
            .get(id)
            .ok_or_else(|| CriticalError::Storage(format!("root {id} missing from storage during bootstrap")))?
            .creator();
        roots_by_frame.entry(frame).or_default().push((creator, id));
    }

    let snapshot: HashMap<FrameId, Vec<(ValidatorId, EventId)>> =
        roots_by_frame.iter().map(|(f, v)| (*f, v.clone())).collect();
    orderer.seed_frame_roots(snapshot.clone());
    let roots_at = move |f: FrameId| snapshot.get(&f).cloned().unwrap_or_default();

    let mut discard_callbacks = discard_callbacks();
    let mut delivered = Vec::new();
    for (&frame, roots) in &roots_by_frame {
        let replaying_context = frame.value() < resume_from.value();
        for &(creator, root) in roots {
            let cb: &mut ConsensusCallbacks = if replaying_context { &mut discard_callbacks } else { callbacks };
            let new_blocks = orderer.process_replayed_root(frame, creator, root, &roots_at, lookup, cb)?;
            if !replaying_context {
                delivered.extend(new_blocks);
            }
        }
    }

    Ok((orderer, delivered))
}

fn discard_callbacks() -> ConsensusCallbacks<'static> {
    let begin: BeginBlockFn = Box::new(|_block| {
        let apply: ApplyEventFn = Box::new(|_e| {});
        let end: EndBlockFn = Box::new(|| None);
        BlockCallbacks {
            apply_event: apply,
            end_block: end,
        }
    });
    ConsensusCallbacks { begin_block: begin }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atropos_storage::MemKv;
    use atropos_types::{BaseEvent, Event, Lamport, MutableBaseEvent, MutableEvent, Seq, ValidatorsBuilder};
    use std::collections::HashMap as StdHashMap;
    use std::sync::{Arc, Mutex};

    fn validators() -> Validators {
        let mut b = ValidatorsBuilder::new();
        b.set(ValidatorId::new(1), 1u32.into());
        b.set(ValidatorId::new(2), 1u32.into());
        b.set(ValidatorId::new(3), 1u32.into());
        b.build().unwrap()
    }

    struct Lookup(StdHashMap<EventId, BaseEvent>);
    impl EventLookup for Lookup {
        fn get(&self, id: EventId) -> Option<&dyn Event> {
            self.0.get(&id).map(|e| e as &dyn Event)
        }
    }

    fn make_event(seq: u32, frame: u32, creator: ValidatorId, parents: Vec<EventId>, content: &[u8]) -> BaseEvent {
        let mut b = MutableBaseEvent::default();
        b.set_epoch(0.into());
        b.set_seq(Seq::new(seq));
        b.set_frame(FrameId::new(frame));
        b.set_creator(creator);
        b.set_lamport(Lamport::new(seq));
        b.set_parents(parents);
        b.build(content)
    }

    /// A process with no prior `ProcessMeta` bootstraps fresh at epoch 0,
    /// frame 1, with nothing to replay.
    #[test]
    fn a_fresh_store_bootstraps_to_an_empty_orderer() {
        let kv: Arc<dyn atropos_storage::KvStore> = Arc::new(MemKv::new());
        let epoch_store = EpochStore::new(kv.clone());
        let process_store = ProcessStore::new(kv);
        let lookup = Lookup(StdHashMap::new());
        let mut callbacks = discard_callbacks();

        let (orderer, blocks) = bootstrap(
            validators(),
            epoch_store,
            process_store,
            &lookup,
            Config::lite(),
            Arc::new(|_| {}),
            &mut callbacks,
        )
        .unwrap();

        assert!(blocks.is_empty());
        assert_eq!(orderer.epoch(), EpochId::new(0));
    }

    /// A root persisted but not yet decided before the crash replays
    /// through the live callbacks and, once joined by the roots that
    /// complete its decision, delivers the block for real.
    #[test]
    fn an_undecided_root_replays_and_can_still_complete_its_decision() {
        let kv: Arc<dyn atropos_storage::KvStore> = Arc::new(MemKv::new());
        let epoch_store = EpochStore::new(kv.clone());
        let process_store = ProcessStore::new(kv.clone());

        let mut lookup = Lookup(StdHashMap::new());
        let mut setup = discard_callbacks();
        {
            let mut live = Orderer::new(
                EpochId::new(0),
                validators(),
                epoch_store.clone(),
                ProcessStore::new(kv.clone()),
                Config::lite(),
                Arc::new(|_| {}),
            );
            let a1 = make_event(1, 1, ValidatorId::new(1), vec![], b"a1");
            let b1 = make_event(1, 1, ValidatorId::new(2), vec![], b"b1");
            let c1 = make_event(1, 1, ValidatorId::new(3), vec![], b"c1");
            for e in [&a1, &b1, &c1] {
                lookup.0.insert(e.id(), e.clone());
                live.process(e, &lookup, None, &mut setup).unwrap();
            }
            let a2 = make_event(2, 2, ValidatorId::new(1), vec![a1.id(), b1.id(), c1.id()], b"a2");
            let b2 = make_event(2, 2, ValidatorId::new(2), vec![b1.id(), a1.id(), c1.id()], b"b2");
            let c2 = make_event(2, 2, ValidatorId::new(3), vec![c1.id(), a1.id(), b1.id()], b"c2");
            for e in [&a2, &b2, &c2] {
                lookup.0.insert(e.id(), e.clone());
                live.process(e, &lookup, None, &mut setup).unwrap();
            }
            // Process crashes here — a2/b2/c2 are persisted roots of frame 2,
            // but nothing has decided frame 1's Atropos yet.
        }

        let applied = Arc::new(Mutex::new(Vec::new()));
        let applied_in_cb = applied.clone();
        let begin: BeginBlockFn = Box::new(move |_block| {
            let applied_in_cb = applied_in_cb.clone();
            let apply: ApplyEventFn = Box::new(move |e: &dyn Event| applied_in_cb.lock().unwrap().push(e.id()));
            let end: EndBlockFn = Box::new(|| None);
            BlockCallbacks {
                apply_event: apply,
                end_block: end,
            }
        });
        let mut callbacks = ConsensusCallbacks { begin_block: begin };

        let (mut orderer, blocks) = bootstrap(
            validators(),
            epoch_store,
            process_store,
            &lookup,
            Config::lite(),
            Arc::new(|_| {}),
            &mut callbacks,
        )
        .unwrap();
        assert!(blocks.is_empty(), "frame 1 needs a frame-3 root to clear its quorum margin");

        let a1 = lookup.0.values().find(|e| e.seq().value() == 1 && e.creator() == ValidatorId::new(1)).unwrap().clone();
        let a2 = lookup.0.values().find(|e| e.seq().value() == 2 && e.creator() == ValidatorId::new(1)).unwrap().clone();
        let b2 = lookup.0.values().find(|e| e.seq().value() == 2 && e.creator() == ValidatorId::new(2)).unwrap().clone();
        let c2 = lookup.0.values().find(|e| e.seq().value() == 2 && e.creator() == ValidatorId::new(3)).unwrap().clone();

        let d3 = make_event(3, 3, ValidatorId::new(1), vec![a2.id(), b2.id(), c2.id()], b"d3");
        lookup.0.insert(d3.id(), d3.clone());

        let blocks = orderer.process(&d3, &lookup, None, &mut callbacks).unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].atropos, a1.id());
        assert_eq!(applied.lock().unwrap().as_slice(), &[a1.id()]);
    }
}
