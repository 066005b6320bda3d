//! Orderer (C6): the engine's single entry point. Ingests one event, assigns
//! its frame, persists it as a root when it is one, advances the election
//! and hands every newly-decided Atropos to the emitter. Grounded in
//! `abft/orderer.go`'s `Process`, which wires the same four stages together
//! over the Go types this crate's modules stand in for.

use atropos_storage::{EpochStore, ProcessMeta, ProcessStore};
use atropos_types::{Block, ConsensusCallbacks, EpochId, Event, EventId, FrameId, ValidatorId, Validators};

use crate::config::Config;
use crate::election::Election;
use crate::emitter;
use crate::error::{ConsensusError, CriticalError, CriticalSink};
use crate::forkless_cause::ForklessCause;
use crate::frame::FrameAssigner;
use crate::vecidx::{EventLookup, VectorClockIndex};

pub struct Orderer {
    epoch: EpochId,
    index: VectorClockIndex,
    forkless_cause: ForklessCause,
    frame_assigner: FrameAssigner,
    election: Election,
    epoch_store: EpochStore,
    process_store: ProcessStore,
    config: Config,
    critical_sink: CriticalSink,
}

impl Orderer {
    pub fn new(
        epoch: EpochId,
        validators: Validators,
        epoch_store: EpochStore,
        process_store: ProcessStore,
        config: Config,
        critical_sink: CriticalSink,
    ) -> Self {
        let index = VectorClockIndex::new(validators.clone(), epoch_store.clone(), config.caches);
        Self {
            epoch,
            index,
            forkless_cause: ForklessCause::new(config.caches.forkless_cause_pairs, critical_sink.clone()),
            frame_assigner: FrameAssigner::new(config.suppress_frame_panic),
            election: Election::new(validators),
            epoch_store,
            process_store,
            config,
            critical_sink,
        }
    }

    pub fn epoch(&self) -> EpochId {
        self.epoch
    }

    pub fn index(&self) -> &VectorClockIndex {
        &self.index
    }

    /// Reconstruct state for frame `resume_from` under a (possibly new)
    /// validator set, used both at epoch seal and at bootstrap.
    pub fn reset(&mut self, epoch: EpochId, validators: Validators, epoch_store: EpochStore, resume_from: FrameId) {
        self.epoch = epoch;
        self.epoch_store = epoch_store.clone();
        self.index.reset(validators.clone(), epoch_store);
        self.forkless_cause.reset(self.config.caches.forkless_cause_pairs);
        self.frame_assigner.reset();
        self.election.reset(validators, resume_from);
    }

    /// Ingest `e`: index it, assign its frame, persist it as a root if it is
    /// one, advance the election and emit every block it decides. Returns
    /// the blocks emitted by this one event, in delivery order.
    pub fn process(
        &mut self,
        e: &dyn Event,
        lookup: &dyn EventLookup,
        declared_frame: Option<FrameId>,
        callbacks: &mut ConsensusCallbacks,
    ) -> Result<Vec<Block>, ConsensusError> {
        if e.epoch() != self.epoch {
            return Err(ConsensusError::EventEpochMismatch(e.id()));
        }
        if self.index.validators().get_idx(e.creator()).is_none() {
            return Err(ConsensusError::UnknownCreator {
                event: e.id(),
                creator: e.creator(),
            });
        }

        let self_parent_frame = e.self_parent().and_then(|p| lookup.get(p)).map(|p| p.frame());
        let mut parent_frames = Vec::with_capacity(e.parents().len());
        for &parent_id in e.parents() {
            if Some(parent_id) == e.self_parent() {
                continue;
            }
            let parent = lookup.get(parent_id).ok_or(ConsensusError::ParentNotFound(parent_id))?;
            parent_frames.push(parent.frame());
        }

        self.index.add(e, lookup);

        let outcome = match self.frame_assigner.compute(
            &self.index,
            &self.forkless_cause,
            e.id(),
            e.creator(),
            self_parent_frame,
            &parent_frames,
            declared_frame,
        ) {
            Ok(outcome) => outcome,
            Err(err) => {
                self.index.drop_not_flushed();
                return Err(err);
            }
        };

        if let Err(err) = self.index.flush() {
            tracing::error!(event = %e.id(), error = %err, "failed to flush vector-clock rows");
            (self.critical_sink)(CriticalError::Storage(err.to_string()));
        }

        let mut blocks = Vec::new();
        if !outcome.is_root {
            return Ok(blocks);
        }

        tracing::debug!(event = %e.id(), frame = outcome.frame.value(), "root");
        if let Err(err) = self.epoch_store.add_root(outcome.frame, e.id()) {
            tracing::error!(event = %e.id(), error = %err, "failed to persist root");
            (self.critical_sink)(CriticalError::Storage(err.to_string()));
            return Ok(blocks);
        }

        let roots_snapshot = self.frame_assigner.snapshot();
        let roots_at = move |f: FrameId| roots_snapshot.get(&f).cloned().unwrap_or_default();

        let decisions = match self.election.process_root(
            &self.index,
            &self.forkless_cause,
            outcome.frame,
            e.creator(),
            e.id(),
            &roots_at,
        ) {
            Ok(decisions) => decisions,
            Err(crit) => {
                (self.critical_sink)(crit);
                return Ok(blocks);
            }
        };

        match self.emit_decisions(decisions, lookup, callbacks) {
            Ok(mut new_blocks) => blocks.append(&mut new_blocks),
            Err(crit) => (self.critical_sink)(crit),
        }

        Ok(blocks)
    }

    /// Feeds one already-persisted root's votes back into the election
    /// without re-deriving its frame or re-indexing it, for replaying a
    /// process that crashed between deciding a frame and emitting its
    /// block. Unlike [`Orderer::process`], errors are returned rather than
    /// routed to the critical sink: a corrupt replay should fail startup,
    /// not continue silently.
    pub fn process_replayed_root(
        &mut self,
        frame: FrameId,
        creator: ValidatorId,
        root: EventId,
        roots_at: &dyn Fn(FrameId) -> Vec<(ValidatorId, EventId)>,
        lookup: &dyn EventLookup,
        callbacks: &mut ConsensusCallbacks,
    ) -> Result<Vec<Block>, CriticalError> {
        let decisions = self.election.process_root(&self.index, &self.forkless_cause, frame, creator, root, roots_at)?;
        self.emit_decisions(decisions, lookup, callbacks)
    }

    /// Sets the election's next-undelivered frame without touching the
    /// index, the forkless-cause cache or the frame assigner — used by
    /// bootstrap once the index has been reconstructed from persisted rows
    /// and only the election's in-memory vote state needs replaying.
    pub fn set_resume_frame(&mut self, resume_from: FrameId) {
        let validators = self.index.validators().clone();
        self.election.reset(validators, resume_from);
    }

    /// Seeds the frame assigner's per-frame roots table from persisted
    /// roots, so events arriving after bootstrap see the same
    /// quorum-of-roots context a continuously running process would.
    pub fn seed_frame_roots(&mut self, roots_by_frame: std::collections::HashMap<FrameId, Vec<(ValidatorId, EventId)>>) {
        self.frame_assigner.seed(roots_by_frame);
    }

    fn emit_decisions(
        &mut self,
        decisions: Vec<(FrameId, EventId)>,
        lookup: &dyn EventLookup,
        callbacks: &mut ConsensusCallbacks,
    ) -> Result<Vec<Block>, CriticalError> {
        let mut blocks = Vec::new();
        for (frame, atropos) in decisions {
            let outcome = emitter::emit(frame, atropos, &self.index, &self.epoch_store, lookup, callbacks)?;
            tracing::info!(frame = frame.value(), atropos = %atropos, "decided");

            let meta = ProcessMeta {
                epoch: self.epoch,
                validators: self.index.validators().clone(),
                last_decided_frame: frame,
            };
            self.process_store
                .save(&meta)
                .map_err(|e| CriticalError::Storage(e.to_string()))?;

            blocks.push(outcome.block);

            if let Some(new_validators) = outcome.new_validators {
                let sealed_epoch = EpochId::new(self.epoch.value() + 1);
                tracing::info!(epoch = sealed_epoch.value(), "sealing epoch");
                self.epoch_store.clear().map_err(|e| CriticalError::Storage(e.to_string()))?;
                let next_store = self.epoch_store.clone();
                self.reset(sealed_epoch, new_validators, next_store, FrameId::ROOT_FRAME);
                break;
            }
        }
        Ok(blocks)
    }
}
