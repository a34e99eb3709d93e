//! Await gates for gated subscriptions
//!
//! A `GateSet` is armed over a set of named gate events. Channels registered
//! as firing sources mark keys fired on invoke; once every key has fired at
//! least once since arming, the set completes and stays complete. This is a
//! completion-counter state machine, not a polling loop: nothing re-checks
//! the set except the suspension points that deliver deferred payloads.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

// The runtime is single-threaded by contract; a threaded embedding would
// swap this shared cell for a lock.
#[derive(Debug)]
struct GateState {
    pending: HashSet<String>,
    armed: usize,
}

/// A shared set of gate events that must all fire before a gated
/// subscription becomes eligible to run
#[derive(Debug, Clone)]
pub struct GateSet {
    inner: Rc<RefCell<GateState>>,
}

impl GateSet {
    /// Arm a gate set over the given keys
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let pending: HashSet<String> = keys.into_iter().map(Into::into).collect();
        let armed = pending.len();
        Self {
            inner: Rc::new(RefCell::new(GateState { pending, armed })),
        }
    }

    /// Record that a gate event fired; repeat firings of the same key are
    /// idempotent. Returns true when this call completed the set.
    pub fn mark_fired(&self, key: &str) -> bool {
        let mut state = self.inner.borrow_mut();
        if state.pending.remove(key) && state.pending.is_empty() {
            tracing::debug!(gates = state.armed, "gate set complete");
            return true;
        }
        false
    }

    /// True once every armed key has fired at least once
    pub fn is_complete(&self) -> bool {
        self.inner.borrow().pending.is_empty()
    }

    /// Number of keys still waiting to fire
    pub fn pending(&self) -> usize {
        self.inner.borrow().pending.len()
    }

    /// Number of keys the set was armed with
    pub fn armed(&self) -> usize {
        self.inner.borrow().armed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completes_only_when_all_fire() {
        let gate = GateSet::new(["e1", "e2"]);
        assert!(!gate.is_complete());

        // Firing one key twice must not satisfy the set
        gate.mark_fired("e1");
        gate.mark_fired("e1");
        assert!(!gate.is_complete());
        assert_eq!(gate.pending(), 1);

        assert!(gate.mark_fired("e2"));
        assert!(gate.is_complete());
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let gate = GateSet::new(["e1"]);
        assert!(!gate.mark_fired("other"));
        assert!(!gate.is_complete());
        gate.mark_fired("e1");
        assert!(gate.is_complete());
    }

    #[test]
    fn test_clones_share_state() {
        let gate = GateSet::new(["e1"]);
        let alias = gate.clone();
        alias.mark_fired("e1");
        assert!(gate.is_complete());
    }

    #[test]
    fn test_empty_set_is_trivially_complete() {
        let gate = GateSet::new(Vec::<String>::new());
        assert!(gate.is_complete());
    }
}
