//! Deterministic aBFT ordering core.
//!
//! Wires a DAG indexer, a forkless-cause predicate, a frame assigner, an
//! Atropos election and a block emitter into a single [`Orderer`] entry
//! point, with a [`bootstrap::bootstrap`] path to reconstruct one from
//! persisted storage. Grounded throughout in `abft/orderer.go` and the
//! `vecengine`/`election_v1` packages it wires together.

pub mod bootstrap;
pub mod config;
pub mod election;
pub mod emitter;
pub mod error;
pub mod forkless_cause;
pub mod frame;
pub mod orderer;
#[cfg(test)]
pub mod testkit;
pub mod vecidx;

pub use bootstrap::bootstrap;
pub use config::{CacheConfig, Config};
pub use election::Election;
pub use error::{ConsensusError, CriticalError, CriticalSink};
pub use forkless_cause::ForklessCause;
pub use frame::{FrameAssigner, FrameOutcome};
pub use orderer::Orderer;
pub use vecidx::{EventLookup, VectorClockIndex};
