//! Typed publish/subscribe channels
//!
//! A channel owns its subscriptions and walks them on invoke: root
//! subscriptions first in registration order, then cascaded children via an
//! explicit growable stack. One broken subscriber never stops its siblings;
//! failures are logged at the invoke site and traversal continues.

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::time::{Duration, Instant};

use indexmap::IndexMap;

use skein_types::{TaggedValue, ValueTag};

use crate::gate::GateSet;

// ─────────────────────────────────────────────────────────────────────────────
// Identities
// ─────────────────────────────────────────────────────────────────────────────

/// Stable identity of a subscribing instance
///
/// Owners mint one id, subscribe any number of callbacks under it, and tear
/// everything down with a single `unsubscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(pub uuid::Uuid);

impl SubscriberId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Token returned by `subscribe`, releasing exactly one subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(uuid::Uuid);

impl SubscriptionId {
    fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Subscription
// ─────────────────────────────────────────────────────────────────────────────

/// Callback invoked with each delivered value
pub type SubscriberFn = Box<dyn FnMut(&TaggedValue) -> anyhow::Result<()>>;

/// A single registered listener on a channel
pub struct Subscription {
    owner: SubscriberId,
    callback: SubscriberFn,
    /// When set, this subscription only runs when reached by cascading from
    /// a subscription owned by `parent`, never as a traversal root.
    parent: Option<SubscriberId>,
    /// Subscriber identities this subscription may cascade to after running
    children: Vec<SubscriberId>,
    /// Gate events that must all fire before this subscription is eligible
    gates: Option<GateSet>,
    /// Payloads that arrived while the gate set was incomplete
    deferred: VecDeque<TaggedValue>,
}

impl Subscription {
    /// Create a root subscription for `owner`
    pub fn new(
        owner: SubscriberId,
        callback: impl FnMut(&TaggedValue) -> anyhow::Result<()> + 'static,
    ) -> Self {
        Self {
            owner,
            callback: Box::new(callback),
            parent: None,
            children: Vec::new(),
            gates: None,
            deferred: VecDeque::new(),
        }
    }

    /// Scope this subscription under a parent: it fires only when reached by
    /// cascade from `parent`, never as a root
    pub fn child_of(mut self, parent: SubscriberId) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Add a subscriber identity this subscription cascades to
    pub fn cascades_to(mut self, child: SubscriberId) -> Self {
        self.children.push(child);
        self
    }

    /// Gate this subscription behind an armed `GateSet`
    pub fn gated(mut self, gates: GateSet) -> Self {
        self.gates = Some(gates);
        self
    }

    /// The owner identity
    pub fn owner(&self) -> SubscriberId {
        self.owner
    }

    fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    fn gate_blocked(&self) -> bool {
        self.gates.as_ref().is_some_and(|g| !g.is_complete())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Event Channel
// ─────────────────────────────────────────────────────────────────────────────

/// A many-to-many publish/subscribe endpoint for tagged values
pub struct EventChannel {
    name: String,
    /// Declared payload tag; mismatched invokes are logged, not rejected
    expected: Option<ValueTag>,
    /// Invokes inside this window since the last accepted invoke are dropped
    min_interval: Duration,
    last_invoke: Option<Instant>,
    subscriptions: IndexMap<SubscriptionId, Subscription>,
    /// Gate sets this channel fires a key into on every accepted invoke
    gate_taps: Vec<(GateSet, String)>,
}

impl EventChannel {
    /// Create an untyped channel
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            expected: None,
            min_interval: Duration::ZERO,
            last_invoke: None,
            subscriptions: IndexMap::new(),
            gate_taps: Vec::new(),
        }
    }

    /// Create a channel with a declared payload tag
    pub fn typed(name: impl Into<String>, tag: ValueTag) -> Self {
        let mut channel = Self::new(name);
        channel.expected = Some(tag);
        channel
    }

    /// Set the minimum time between accepted invokes
    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }

    /// The channel name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Register a subscription, returning its release token
    pub fn subscribe(&mut self, subscription: Subscription) -> SubscriptionId {
        let id = SubscriptionId::new();
        self.subscriptions.insert(id, subscription);
        id
    }

    /// Remove every subscription owned by `owner`; a no-op for unknown owners
    pub fn unsubscribe(&mut self, owner: SubscriberId) {
        self.subscriptions.retain(|_, s| s.owner != owner);
    }

    /// Remove a single subscription by token; a no-op for stale tokens
    pub fn remove(&mut self, token: SubscriptionId) {
        self.subscriptions.shift_remove(&token);
    }

    /// Register this channel as the firing source for `key` in `gate`
    pub fn drive_gate(&mut self, gate: &GateSet, key: impl Into<String>) {
        self.gate_taps.push((gate.clone(), key.into()));
    }

    /// Deliver any deferred payloads whose gate sets have since completed
    ///
    /// Flushed payloads take the same cascade walk as live deliveries, so a
    /// gated subscription still reaches its registered children. This is the
    /// cooperative suspension point for gated subscriptions; it also runs
    /// automatically at the start of every accepted invoke.
    pub fn pump(&mut self) {
        let ready: Vec<SubscriptionId> = self
            .subscriptions
            .iter()
            .filter(|(_, s)| !s.deferred.is_empty() && !s.gate_blocked())
            .map(|(id, _)| *id)
            .collect();

        for id in ready {
            let payloads: Vec<TaggedValue> = match self.subscriptions.get_mut(&id) {
                Some(sub) => sub.deferred.drain(..).collect(),
                None => continue,
            };
            for value in payloads {
                self.deliver(vec![id], &value);
            }
        }
    }

    /// Publish a value to all eligible subscribers
    ///
    /// Roots run first in registration order; each subscription that runs
    /// then cascades to the parent-scoped subscriptions of its registered
    /// children. Traversal is iterative over a growable stack with a visited
    /// set, so cyclic cascade wiring terminates instead of looping.
    pub fn invoke(&mut self, value: &TaggedValue) {
        let now = Instant::now();
        if let Some(last) = self.last_invoke {
            if now.duration_since(last) < self.min_interval {
                tracing::debug!(channel = %self.name, "invoke throttled, dropping call");
                return;
            }
        }
        self.last_invoke = Some(now);

        if let Some(expected) = self.expected {
            if value.tag() != expected {
                tracing::debug!(
                    channel = %self.name,
                    expected = ?expected,
                    actual = ?value.tag(),
                    "payload tag differs from channel declaration"
                );
            }
        }

        for (gate, key) in &self.gate_taps {
            gate.mark_fired(key);
        }
        self.pump();

        let roots: Vec<SubscriptionId> = self
            .subscriptions
            .iter()
            .filter(|(_, s)| s.is_root())
            .map(|(id, _)| *id)
            .collect();
        self.deliver(roots, value);
    }

    /// Walk subscriptions from `seeds`: run each one's callback and cascade
    /// to its parent-scoped children over a growable stack with a visited
    /// set, so cyclic cascade wiring terminates
    fn deliver(&mut self, seeds: Vec<SubscriptionId>, value: &TaggedValue) {
        let mut stack: Vec<SubscriptionId> = seeds.into_iter().rev().collect();
        let mut visited: HashSet<SubscriptionId> = HashSet::new();

        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }

            let (owner, children) = {
                let Some(sub) = self.subscriptions.get_mut(&id) else {
                    continue;
                };
                if sub.gate_blocked() {
                    sub.deferred.push_back(value.clone());
                    continue;
                }
                if let Err(e) = (sub.callback)(value) {
                    tracing::warn!(
                        channel = %self.name,
                        owner = %sub.owner,
                        error = %e,
                        "subscriber callback failed"
                    );
                }
                (sub.owner, sub.children.clone())
            };

            // Cascade: a child subscription runs only when its declared
            // parent is the owner we just ran.
            let mut next: Vec<SubscriptionId> = Vec::new();
            for child in &children {
                for (sid, s) in &self.subscriptions {
                    if s.owner == *child && s.parent == Some(owner) {
                        next.push(*sid);
                    }
                }
            }
            for sid in next.into_iter().rev() {
                stack.push(sid);
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
