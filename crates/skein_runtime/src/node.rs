//! Graph nodes and their per-node caches
//!
//! A node declares its ports up front; the graph rebuilds the node's caches
//! (resolved inputs, upstream sources per input, output values, connected
//! children) whenever the node is dirty. Structural edits only become
//! visible to execution through that rebuild.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use skein_types::{PortDef, TaggedValue};

use crate::context::{NodeBehavior, PassThrough};

// ─────────────────────────────────────────────────────────────────────────────
// Identities
// ─────────────────────────────────────────────────────────────────────────────

/// Unique identifier of a node instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub uuid::Uuid);

impl NodeId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One end of a connection: a node and one of its port names
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub node: NodeId,
    pub port: String,
}

impl Endpoint {
    pub fn new(node: NodeId, port: impl Into<String>) -> Self {
        Self {
            node,
            port: port.into(),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.node, self.port)
    }
}

/// A directed connection from an output port to an input port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub from: Endpoint,
    pub to: Endpoint,
}

// ─────────────────────────────────────────────────────────────────────────────
// Node
// ─────────────────────────────────────────────────────────────────────────────

/// What kind of traversal a node participates in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    /// Imperative control flow: triggered by a caller, chains to the
    /// children of one chosen exec port
    Action,
    /// Reactive announcement: triggered externally, fans out to every
    /// connected child unconditionally
    Event,
}

/// A node in the graph
///
/// Caches are owned here but rebuilt only by the graph; a `dirty` node must
/// not be read or executed until `Graph::update_caches` has run.
pub struct Node {
    id: NodeId,
    name: String,
    kind: NodeKind,
    category: String,
    ports: Vec<PortDef>,
    config: Json,
    auto_propagate: bool,
    pub(crate) behavior: Box<dyn NodeBehavior>,

    pub(crate) dirty: bool,
    /// Resolved value per input port (freshest-wins copy target)
    pub(crate) input_values: IndexMap<String, TaggedValue>,
    /// Upstream sources per input port, in connection registration order
    pub(crate) input_sources: IndexMap<String, Vec<Endpoint>>,
    /// Last produced value per output port
    pub(crate) output_values: IndexMap<String, TaggedValue>,
    /// Control-flow children per exec output port
    pub(crate) action_children: IndexMap<String, Vec<NodeId>>,
    /// Every exec-connected child, for event fan-out
    pub(crate) event_children: Vec<NodeId>,
}

impl Node {
    fn with_kind(kind: NodeKind, name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            id: NodeId::new(),
            name: name.into(),
            kind,
            category: category.into(),
            ports: Vec::new(),
            config: Json::Null,
            auto_propagate: true,
            behavior: Box::new(PassThrough),
            dirty: true,
            input_values: IndexMap::new(),
            input_sources: IndexMap::new(),
            output_values: IndexMap::new(),
            action_children: IndexMap::new(),
            event_children: Vec::new(),
        }
    }

    /// Create an action (control-flow) node
    pub fn action(name: impl Into<String>, category: impl Into<String>) -> Self {
        Self::with_kind(NodeKind::Action, name, category)
    }

    /// Create an event (reactive fan-out) node
    pub fn event(name: impl Into<String>, category: impl Into<String>) -> Self {
        Self::with_kind(NodeKind::Event, name, category)
    }

    /// Declare a port
    pub fn port(mut self, def: PortDef) -> Self {
        self.ports.push(def);
        self
    }

    /// Attach node-specific configuration
    pub fn config(mut self, config: Json) -> Self {
        self.config = config;
        self
    }

    /// Attach the executable behavior
    pub fn behavior(mut self, behavior: impl NodeBehavior + 'static) -> Self {
        self.behavior = Box::new(behavior);
        self
    }

    /// Control whether an action node chains to its children after running
    /// (defaults to true)
    pub fn auto_propagate(mut self, enabled: bool) -> Self {
        self.auto_propagate = enabled;
        self
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn ports(&self) -> &[PortDef] {
        &self.ports
    }

    pub(crate) fn config_json(&self) -> &Json {
        &self.config
    }

    pub(crate) fn propagates(&self) -> bool {
        self.auto_propagate
    }

    /// Get a declared port by name
    ///
    /// Names are only unique per direction (an action node usually carries
    /// both an "exec" input and an "exec" output); this returns the first
    /// declaration. Use `input_port`/`output_port` when direction matters.
    pub fn get_port(&self, name: &str) -> Option<&PortDef> {
        self.ports.iter().find(|p| p.name == name)
    }

    /// Get a declared input port by name
    pub fn input_port(&self, name: &str) -> Option<&PortDef> {
        self.input_ports().find(|p| p.name == name)
    }

    /// Get a declared output port by name
    pub fn output_port(&self, name: &str) -> Option<&PortDef> {
        self.output_ports().find(|p| p.name == name)
    }

    /// All declared input ports
    pub fn input_ports(&self) -> impl Iterator<Item = &PortDef> {
        self.ports.iter().filter(|p| p.is_input())
    }

    /// All declared output ports
    pub fn output_ports(&self) -> impl Iterator<Item = &PortDef> {
        self.ports.iter().filter(|p| p.is_output())
    }

    /// Declared data output ports, in declaration order (positional event
    /// argument binding relies on this order)
    pub fn data_outputs(&self) -> impl Iterator<Item = &PortDef> {
        self.output_ports().filter(|p| p.port_type.is_data())
    }

    /// Declared exec output ports
    pub fn exec_outputs(&self) -> impl Iterator<Item = &PortDef> {
        self.output_ports().filter(|p| p.port_type.is_exec())
    }

    /// The cached value of an output port, if the node has produced one
    pub fn output(&self, name: &str) -> Option<&TaggedValue> {
        self.output_values.get(name)
    }

    /// Whether caches need a rebuild before the next read or run
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Force a cache rebuild on the next access
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("category", &self.category)
            .field("ports", &self.ports.len())
            .field("dirty", &self.dirty)
            .finish()
    }
}
