//! Event trait and a minimal base implementation (grounded in `ltypes/event.go`).
//!
//! `BaseEvent` deliberately carries no payload and no signature; both are
//! left to the caller. It carries exactly the fields the ordering core
//! reads: epoch, per-creator sequence number, frame, creator, Lamport
//! timestamp, parent list and id.

use crate::hash::EventId;
use crate::idx::{EpochId, FrameId, Lamport, Seq, ValidatorId};

/// Read-only view of a DAG event, as required by the ordering core.
pub trait Event {
    fn epoch(&self) -> EpochId;
    fn seq(&self) -> Seq;
    fn frame(&self) -> FrameId;
    fn creator(&self) -> ValidatorId;
    fn lamport(&self) -> Lamport;
    fn parents(&self) -> &[EventId];
    fn id(&self) -> EventId;

    /// The first parent, if any, is always the creator's own previous event.
    fn self_parent(&self) -> Option<EventId> {
        if self.seq().value() <= 1 || self.parents().is_empty() {
            None
        } else {
            Some(self.parents()[0])
        }
    }

    fn is_self_parent(&self, candidate: EventId) -> bool {
        self.self_parent() == Some(candidate)
    }
}

/// Mutable builder view used while assembling an event prior to freezing its id.
pub trait MutableEvent: Event {
    fn set_epoch(&mut self, v: EpochId);
    fn set_seq(&mut self, v: Seq);
    fn set_frame(&mut self, v: FrameId);
    fn set_creator(&mut self, v: ValidatorId);
    fn set_lamport(&mut self, v: Lamport);
    fn set_parents(&mut self, v: Vec<EventId>);
}

/// Minimal concrete event carrying only what the ordering core needs.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BaseEvent {
    epoch: EpochId,
    seq: Seq,
    frame: FrameId,
    creator: ValidatorId,
    parents: Vec<EventId>,
    lamport: Lamport,
    id: EventId,
}

impl BaseEvent {
    pub fn builder() -> MutableBaseEvent {
        MutableBaseEvent::default()
    }
}

impl Event for BaseEvent {
    fn epoch(&self) -> EpochId {
        self.epoch
    }
    fn seq(&self) -> Seq {
        self.seq
    }
    fn frame(&self) -> FrameId {
        self.frame
    }
    fn creator(&self) -> ValidatorId {
        self.creator
    }
    fn lamport(&self) -> Lamport {
        self.lamport
    }
    fn parents(&self) -> &[EventId] {
        &self.parents
    }
    fn id(&self) -> EventId {
        self.id
    }
}

/// Builder for [`BaseEvent`]. Freezing via [`MutableBaseEvent::build`] stamps
/// the id's epoch/lamport prefix the same way `MutableBaseEvent.Build` does.
#[derive(Clone, Debug, Default)]
pub struct MutableBaseEvent {
    inner: BaseEvent,
}

impl Event for MutableBaseEvent {
    fn epoch(&self) -> EpochId {
        self.inner.epoch
    }
    fn seq(&self) -> Seq {
        self.inner.seq
    }
    fn frame(&self) -> FrameId {
        self.inner.frame
    }
    fn creator(&self) -> ValidatorId {
        self.inner.creator
    }
    fn lamport(&self) -> Lamport {
        self.inner.lamport
    }
    fn parents(&self) -> &[EventId] {
        &self.inner.parents
    }
    fn id(&self) -> EventId {
        self.inner.id
    }
}

impl MutableEvent for MutableBaseEvent {
    fn set_epoch(&mut self, v: EpochId) {
        self.inner.epoch = v;
    }
    fn set_seq(&mut self, v: Seq) {
        self.inner.seq = v;
    }
    fn set_frame(&mut self, v: FrameId) {
        self.inner.frame = v;
    }
    fn set_creator(&mut self, v: ValidatorId) {
        self.inner.creator = v;
    }
    fn set_lamport(&mut self, v: Lamport) {
        self.inner.lamport = v;
    }
    fn set_parents(&mut self, v: Vec<EventId>) {
        self.inner.parents = v;
    }
}

impl MutableBaseEvent {
    /// Stamp the id from (epoch, lamport, content-hash) and return the frozen event.
    pub fn build(mut self, content: &[u8]) -> BaseEvent {
        self.inner.id = EventId::build(self.inner.epoch, self.inner.lamport, content);
        self.inner
    }
}
