//! Skein Runtime - Execution engine for node graphs
//!
//! This crate contains the event channels, gate sets, and the graph
//! executor that runs action and event nodes.

pub use skein_types;

mod channel;
mod context;
mod gate;
mod graph;
mod node;

pub use channel::{EventChannel, SubscriberFn, SubscriberId, Subscription, SubscriptionId};
pub use context::{DEFAULT_EXEC, Flow, NodeBehavior, NodeContext, NodeOutput};
pub use gate::GateSet;
pub use graph::Graph;
pub use node::{Connection, Endpoint, Node, NodeId, NodeKind};

use thiserror::Error;

/// Errors surfaced by graph structure edits and node behaviors
///
/// Traversal itself is fail-soft: a behavior `Err` is logged and stops only
/// its own chain link. Structural misuse (unknown nodes or ports, invalid
/// connections) is an error at the call site.
#[derive(Debug, Clone, Error)]
pub enum RuntimeError {
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("port not found: {node}.{port}")]
    PortNotFound { node: NodeId, port: String },

    #[error("cannot connect {0}: output must feed input")]
    DirectionMismatch(String),

    #[error("incompatible port types: {from} -> {to}")]
    TypeMismatch { from: String, to: String },

    #[error("behavior failed: {0}")]
    Behavior(String),
}

impl RuntimeError {
    /// Shorthand for behavior failures built from a message
    pub fn behavior(message: impl Into<String>) -> Self {
        Self::Behavior(message.into())
    }
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;
