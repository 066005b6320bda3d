use crate::cheaters::Cheaters;
use crate::hash::EventId;

/// One step of the ordered output: the confirmed Atropos event plus the
/// cheaters whose forks were discovered in its causal past.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Block {
    pub atropos: EventId,
    pub cheaters: Cheaters,
}

impl Block {
    pub fn new(atropos: EventId, cheaters: Cheaters) -> Self {
        Self { atropos, cheaters }
    }
}
