use atropos_types::{EventId, FrameId, ValidatorId};
use thiserror::Error;

/// Recoverable errors returned from `process`/`build` to the caller. State
/// is never mutated when one of these is returned.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConsensusError {
    #[error("event {event} declares frame {declared} but the engine computed {computed}")]
    WrongFrame {
        event: EventId,
        declared: FrameId,
        computed: FrameId,
    },

    #[error("event {0} belongs to a different epoch than the current one")]
    EventEpochMismatch(EventId),

    #[error("event {event} names unknown creator {creator}")]
    UnknownCreator { event: EventId, creator: ValidatorId },

    #[error("parent {0} of a pending event has not been ingested yet")]
    ParentNotFound(EventId),

    #[error("root for frame {frame} from validator {validator} arrived before its prerequisites")]
    RootProcessedOutOfOrder { frame: FrameId, validator: ValidatorId },
}

/// Fatal conditions, routed to the critical-error sink supplied at
/// construction rather than returned to the caller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CriticalError {
    #[error("all roots of frame {0} decided no — more than 1/3 of weight is Byzantine")]
    AllRootsDecidedNo(FrameId),

    #[error("event {0} is forkless-caused by two branches of the same fork")]
    ForklessCausedByTwoForks(EventId),

    #[error("storage error: {0}")]
    Storage(String),
}

/// Callback invoked with a [`CriticalError`]; typically aborts the process.
/// Kept distinct from [`ConsensusError`]: the two channels separate
/// Byzantine-detection fatals from retryable input errors.
pub type CriticalSink = std::sync::Arc<dyn Fn(CriticalError) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrong_frame_message_names_both_values() {
        let err = ConsensusError::WrongFrame {
            event: EventId::ZERO,
            declared: FrameId::new(3),
            computed: FrameId::new(4),
        };
        let msg = err.to_string();
        assert!(msg.contains("declares frame 3"));
        assert!(msg.contains("computed 4"));
    }
}
