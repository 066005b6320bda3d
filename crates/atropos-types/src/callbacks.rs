//! Callback shapes the orderer invokes while delivering a block.
//!
//! Grounded in `ltypes/consensus.go`'s `ConsensusCallbacks`/`BlockCallbacks`,
//! translated from Go function-value fields to boxed closures.

use crate::block::Block;
use crate::event::Event;
use crate::validators::Validators;

/// Invoked once per confirmed event in a block, in a deterministic but
/// otherwise unspecified order. Must not be called twice for the same event.
pub type ApplyEventFn<'a> = Box<dyn FnMut(&dyn Event) + 'a>;

/// Invoked once all events in a block have been delivered. Returning
/// `Some(validators)` seals the epoch with the given validator set for the
/// next one; `None` keeps the current epoch open.
pub type EndBlockFn<'a> = Box<dyn FnMut() -> Option<Validators> + 'a>;

pub struct BlockCallbacks<'a> {
    pub apply_event: ApplyEventFn<'a>,
    pub end_block: EndBlockFn<'a>,
}

/// Invoked once per block, before any event of that block is applied.
pub type BeginBlockFn<'a> = Box<dyn FnMut(&Block) -> BlockCallbacks<'a> + 'a>;

pub struct ConsensusCallbacks<'a> {
    pub begin_block: BeginBlockFn<'a>,
}
