//! Node execution context and output types
//!
//! Provides the context passed to node behaviors and the output structure a
//! behavior returns: produced port values plus which control-flow port to
//! follow next.

use indexmap::IndexMap;
use serde_json::Value as Json;

use skein_types::{ScriptValue, TaggedValue};

use crate::node::NodeId;
use crate::RuntimeError;

/// Name of the default execution output port
pub const DEFAULT_EXEC: &str = "exec";

// ─────────────────────────────────────────────────────────────────────────────
// Execution Context
// ─────────────────────────────────────────────────────────────────────────────

/// Context passed to node behaviors
///
/// Inputs arrive already resolved: `inputs` holds the freshest connected
/// source per port (or the port default), `all_inputs` holds every connected
/// source in declaration order for fan-in ports.
pub struct NodeContext {
    /// Node instance ID
    pub node_id: NodeId,
    /// Node-specific configuration
    pub config: Json,
    /// Resolved input values (port name -> freshest value)
    pub inputs: IndexMap<String, TaggedValue>,
    /// All connected source values per input port, in declaration order
    pub all_inputs: IndexMap<String, Vec<TaggedValue>>,
}

impl NodeContext {
    /// Get a resolved input, falling back to `default` on a missing port or
    /// a conversion miss
    pub fn input<T: ScriptValue>(&self, name: &str, default: T) -> T {
        self.inputs
            .get(name)
            .and_then(|v| v.try_get::<T>())
            .unwrap_or(default)
    }

    /// Get a resolved input as a raw tagged value
    pub fn input_raw(&self, name: &str) -> Option<&TaggedValue> {
        self.inputs.get(name)
    }

    /// Get every connected source for a fan-in port, in declaration order
    pub fn inputs_all<T: ScriptValue>(&self, name: &str) -> Vec<T> {
        self.all_inputs
            .get(name)
            .map(|values| values.iter().map(|v| v.get::<T>()).collect())
            .unwrap_or_default()
    }

    /// Get a config value
    pub fn config(&self, key: &str) -> Option<&Json> {
        self.config.get(key)
    }

    /// Get config as string
    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.config.get(key).and_then(|v| v.as_str())
    }

    /// Get config as bool
    pub fn config_bool(&self, key: &str) -> Option<bool> {
        self.config.get(key).and_then(|v| v.as_bool())
    }

    /// Get config as f64
    pub fn config_f64(&self, key: &str) -> Option<f64> {
        self.config.get(key).and_then(|v| v.as_f64())
    }

    /// Get config as i64
    pub fn config_i64(&self, key: &str) -> Option<i64> {
        self.config.get(key).and_then(|v| v.as_i64())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Node Output
// ─────────────────────────────────────────────────────────────────────────────

/// Where execution goes after a node runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow {
    /// Follow the named execution output port
    Continue(String),
    /// Stop this chain link
    End,
}

/// Output from one behavior run
pub struct NodeOutput {
    /// Produced values (port name -> value)
    pub values: IndexMap<String, TaggedValue>,
    /// Which exec port to follow, if any
    pub flow: Flow,
}

impl NodeOutput {
    /// Continue through the default "exec" port with no values
    pub fn empty() -> Self {
        Self {
            values: IndexMap::new(),
            flow: Flow::Continue(DEFAULT_EXEC.to_string()),
        }
    }

    /// Continue through the default "exec" port
    pub fn continue_default(values: IndexMap<String, TaggedValue>) -> Self {
        Self {
            values,
            flow: Flow::Continue(DEFAULT_EXEC.to_string()),
        }
    }

    /// Continue through a specific exec port
    pub fn continue_to(port: &str, values: IndexMap<String, TaggedValue>) -> Self {
        Self {
            values,
            flow: Flow::Continue(port.to_string()),
        }
    }

    /// End execution (no further exec flow)
    pub fn end(values: IndexMap<String, TaggedValue>) -> Self {
        Self {
            values,
            flow: Flow::End,
        }
    }

    /// Attach a produced value
    pub fn with(mut self, name: &str, value: impl Into<TaggedValue>) -> Self {
        self.values.insert(name.to_string(), value.into());
        self
    }

    /// Stop instead of continuing
    pub fn ended(mut self) -> Self {
        self.flow = Flow::End;
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Node Behavior
// ─────────────────────────────────────────────────────────────────────────────

/// The executable part of a node
///
/// Behaviors run inside graph traversal; an `Err` is logged at the trigger
/// site and stops only that chain link, never the whole traversal.
pub trait NodeBehavior {
    fn run(&mut self, ctx: &mut NodeContext) -> Result<NodeOutput, RuntimeError>;
}

impl<F> NodeBehavior for F
where
    F: FnMut(&mut NodeContext) -> Result<NodeOutput, RuntimeError>,
{
    fn run(&mut self, ctx: &mut NodeContext) -> Result<NodeOutput, RuntimeError> {
        self(ctx)
    }
}

/// Behavior that produces nothing and continues through the default port
pub(crate) struct PassThrough;

impl NodeBehavior for PassThrough {
    fn run(&mut self, _ctx: &mut NodeContext) -> Result<NodeOutput, RuntimeError> {
        Ok(NodeOutput::empty())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
