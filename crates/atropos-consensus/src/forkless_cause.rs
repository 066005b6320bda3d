//! Forkless-cause predicate (C3). The exact `ForklessCause` body is not
//! part of this pack (only its call sites are, e.g. `abft/event_processing.go`),
//! so this follows the quorum-domination condition directly: `a` forklessly
//! causes `b` iff, for a quorum of validators, `a`'s highest-known seq of
//! that validator's branch is at least as deep as `b`'s own, and none of
//! the branches counted is fork-detected in `a`'s view.
//!
//! Takes the index by reference on every call rather than storing it, so a
//! driver can own both the index and this cache side by side without a
//! self-referential struct.

use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::Mutex;

use atropos_types::{EventId, ValidatorId, ValidatorIdx};
use lru::LruCache;

use crate::error::{CriticalError, CriticalSink};
use crate::vecidx::VectorClockIndex;

pub struct ForklessCause {
    cache: Mutex<LruCache<(EventId, EventId), bool>>,
    critical_sink: CriticalSink,
}

impl ForklessCause {
    pub fn new(cache_size: usize, critical_sink: CriticalSink) -> Self {
        Self {
            cache: Mutex::new(LruCache::new(NonZeroUsize::new(cache_size.max(1)).unwrap())),
            critical_sink,
        }
    }

    pub fn reset(&self, cache_size: usize) {
        *self.cache.lock().unwrap() = LruCache::new(NonZeroUsize::new(cache_size.max(1)).unwrap());
    }

    pub fn check(&self, index: &VectorClockIndex, a: EventId, b: EventId) -> bool {
        if let Some(&hit) = self.cache.lock().unwrap().get(&(a, b)) {
            return hit;
        }
        let result = self.compute(index, a, b);
        self.cache.lock().unwrap().put((a, b), result);
        result
    }

    /// Two branches of the same creator both counting toward `a`'s quorum
    /// over `b` means `a` dominates both halves of a fork it hasn't itself
    /// flagged fork-detected yet — reported to the critical sink, the same
    /// branch is still only counted once toward the quorum below.
    fn compute(&self, index: &VectorClockIndex, a: EventId, b: EventId) -> bool {
        let (Some(hb_a), Some(hb_b)) = (index.get_highest_before(a), index.get_highest_before(b)) else {
            return false;
        };

        let mut counter = index.validators().new_counter();
        let mut counted_creators: HashSet<ValidatorId> = HashSet::new();
        let num_branches = index.branches().num_branches();
        for branch in 0..num_branches.value() {
            let branch = ValidatorIdx::new(branch);
            if hb_a.is_fork_detected_at(branch) {
                continue;
            }
            let dominates = hb_b.is_empty_at(branch) || hb_a.get(branch).seq >= hb_b.get(branch).seq;
            if !dominates {
                continue;
            }
            let creator = index.branches().creator_of_branch(branch);
            if let Some(creator_id) = index.validators().get_id(creator) {
                if !counted_creators.insert(creator_id) {
                    (self.critical_sink)(CriticalError::ForklessCausedByTwoForks(b));
                    continue;
                }
                counter.count(creator_id);
                if counter.has_quorum() {
                    return true;
                }
            }
        }
        false
    }
}
