//! Graph ownership, cache rebuilds, and traversal
//!
//! The graph owns the node set and the connection list, indexes nodes by
//! category for bulk triggering, and is the only place structural edits
//! become visible to execution: edits mark the touched nodes dirty, and a
//! dirty node's caches rebuild lazily on the next read or run.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use indexmap::IndexMap;

use skein_types::{ScriptValue, TaggedValue};

use crate::channel::{SubscriberId, Subscription};
use crate::context::{Flow, NodeContext, NodeOutput, PassThrough};
use crate::node::{Connection, Endpoint, Node, NodeId, NodeKind};
use crate::{RuntimeError, RuntimeResult};

/// A directed graph of action and event nodes
#[derive(Default)]
pub struct Graph {
    nodes: IndexMap<NodeId, Node>,
    connections: Vec<Connection>,
    by_category: HashMap<String, Vec<NodeId>>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Structure
    // ─────────────────────────────────────────────────────────────────────

    /// Add a node, indexing it by category
    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = node.id();
        self.by_category
            .entry(node.category().to_string())
            .or_default()
            .push(id);
        self.nodes.insert(id, node);
        id
    }

    /// Remove a node and every connection touching it
    pub fn remove_node(&mut self, id: NodeId) -> RuntimeResult<()> {
        let node = self
            .nodes
            .shift_remove(&id)
            .ok_or(RuntimeError::NodeNotFound(id))?;

        if let Some(ids) = self.by_category.get_mut(node.category()) {
            ids.retain(|n| *n != id);
        }

        let mut touched: Vec<NodeId> = Vec::new();
        self.connections.retain(|c| {
            let keep = c.from.node != id && c.to.node != id;
            if !keep {
                touched.push(c.from.node);
                touched.push(c.to.node);
            }
            keep
        });
        for nid in touched {
            if let Some(n) = self.nodes.get_mut(&nid) {
                n.mark_dirty();
            }
        }
        Ok(())
    }

    /// Connect an output port to an input port
    ///
    /// Validates direction and type compatibility; connection registration
    /// order is also the declaration order used for input resolution.
    pub fn connect(
        &mut self,
        from: NodeId,
        from_port: &str,
        to: NodeId,
        to_port: &str,
    ) -> RuntimeResult<()> {
        let src_node = self.nodes.get(&from).ok_or(RuntimeError::NodeNotFound(from))?;
        let dst_node = self.nodes.get(&to).ok_or(RuntimeError::NodeNotFound(to))?;

        // Names are only unique per direction, so resolve the source among
        // outputs and the destination among inputs.
        let src = src_node.output_port(from_port).ok_or_else(|| {
            if src_node.get_port(from_port).is_some() {
                RuntimeError::DirectionMismatch(format!("{from}.{from_port} is not an output"))
            } else {
                RuntimeError::PortNotFound {
                    node: from,
                    port: from_port.to_string(),
                }
            }
        })?;
        let dst = dst_node.input_port(to_port).ok_or_else(|| {
            if dst_node.get_port(to_port).is_some() {
                RuntimeError::DirectionMismatch(format!("{to}.{to_port} is not an input"))
            } else {
                RuntimeError::PortNotFound {
                    node: to,
                    port: to_port.to_string(),
                }
            }
        })?;

        if !src.port_type.is_compatible_with(&dst.port_type) {
            return Err(RuntimeError::TypeMismatch {
                from: format!("{from}.{from_port}"),
                to: format!("{to}.{to_port}"),
            });
        }

        self.connections.push(Connection {
            from: Endpoint::new(from, from_port),
            to: Endpoint::new(to, to_port),
        });
        self.mark_dirty(from);
        self.mark_dirty(to);
        Ok(())
    }

    /// Remove a connection; a no-op when none matches
    pub fn disconnect(&mut self, from: NodeId, from_port: &str, to: NodeId, to_port: &str) {
        let before = self.connections.len();
        self.connections.retain(|c| {
            !(c.from.node == from
                && c.from.port == from_port
                && c.to.node == to
                && c.to.port == to_port)
        });
        if self.connections.len() != before {
            self.mark_dirty(from);
            self.mark_dirty(to);
        }
    }

    /// Get a node by ID
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node IDs declared under a category, in insertion order
    pub fn in_category(&self, category: &str) -> &[NodeId] {
        self.by_category
            .get(category)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Force a cache rebuild on the node's next access
    pub fn mark_dirty(&mut self, id: NodeId) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.mark_dirty();
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Caches
    // ─────────────────────────────────────────────────────────────────────

    /// Rebuild a node's caches from the connection list
    ///
    /// Clears and rebuilds the input sources map, the input/output value
    /// maps (outputs reset to port defaults), and the connected-children
    /// lists. The only place structural edits become visible to execution.
    pub fn update_caches(&mut self, id: NodeId) -> RuntimeResult<()> {
        let node = self.nodes.get(&id).ok_or(RuntimeError::NodeNotFound(id))?;
        let ports: Vec<_> = node.ports().to_vec();

        let mut input_values = IndexMap::new();
        let mut input_sources = IndexMap::new();
        for port in ports.iter().filter(|p| p.is_input() && p.port_type.is_data()) {
            let sources: Vec<Endpoint> = self
                .connections
                .iter()
                .filter(|c| c.to.node == id && c.to.port == port.name)
                .map(|c| c.from.clone())
                .collect();
            input_sources.insert(port.name.clone(), sources);
            input_values.insert(
                port.name.clone(),
                port.default.as_ref().map(TaggedValue::unstamped).unwrap_or_default(),
            );
        }

        // Defaults enter the caches with the stamp cleared; an unwritten
        // default output must never win a freshness comparison.
        let mut output_values = IndexMap::new();
        for port in ports.iter().filter(|p| p.is_output() && p.port_type.is_data()) {
            output_values.insert(
                port.name.clone(),
                port.default.as_ref().map(TaggedValue::unstamped).unwrap_or_default(),
            );
        }

        let mut action_children: IndexMap<String, Vec<NodeId>> = IndexMap::new();
        let mut event_children: Vec<NodeId> = Vec::new();
        for port in ports.iter().filter(|p| p.is_output() && p.port_type.is_exec()) {
            let children: Vec<NodeId> = self
                .connections
                .iter()
                .filter(|c| c.from.node == id && c.from.port == port.name)
                .filter(|c| {
                    self.nodes
                        .get(&c.to.node)
                        .and_then(|n| n.input_port(&c.to.port))
                        .is_some_and(|p| p.port_type.is_exec())
                })
                .map(|c| c.to.node)
                .collect();
            for child in &children {
                if !event_children.contains(child) {
                    event_children.push(*child);
                }
            }
            action_children.insert(port.name.clone(), children);
        }

        let node = self.nodes.get_mut(&id).ok_or(RuntimeError::NodeNotFound(id))?;
        node.input_values = input_values;
        node.input_sources = input_sources;
        node.output_values = output_values;
        node.action_children = action_children;
        node.event_children = event_children;
        node.dirty = false;
        tracing::debug!(node_id = %id, "node caches rebuilt");
        Ok(())
    }

    fn ensure_clean(&mut self, id: NodeId) -> RuntimeResult<()> {
        match self.nodes.get(&id) {
            Some(node) if node.is_dirty() => self.update_caches(id),
            Some(_) => Ok(()),
            None => Err(RuntimeError::NodeNotFound(id)),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Value Resolution
    // ─────────────────────────────────────────────────────────────────────

    /// Resolve an input to the freshest connected source and copy it into
    /// the input cache. Ties on the tick go to the earliest-connected
    /// source; the comparison is strictly-greater so declaration order is
    /// the deterministic tie-break.
    fn resolve_input(&mut self, id: NodeId, port: &str) -> Option<TaggedValue> {
        if self.ensure_clean(id).is_err() {
            return None;
        }
        let sources = self.nodes.get(&id)?.input_sources.get(port)?.clone();

        let mut best: Option<(u64, TaggedValue)> = None;
        for source in &sources {
            // A dirty upstream still needs its output map built
            let _ = self.ensure_clean(source.node);
            let Some(output) = self
                .nodes
                .get(&source.node)
                .and_then(|n| n.output_values.get(&source.port))
            else {
                continue;
            };
            let tick = output.last_update_tick();
            if best.as_ref().is_none_or(|(t, _)| tick > *t) {
                best = Some((tick, output.clone()));
            }
        }

        let (_, value) = best?;
        let node = self.nodes.get_mut(&id)?;
        if let Some(slot) = node.input_values.get_mut(port) {
            *slot = value.clone();
        }
        Some(value)
    }

    /// Pull an input value, coerced to `T`
    ///
    /// Never fails past this boundary: a missing connection, unknown port,
    /// or conversion miss returns the caller-supplied default.
    pub fn input_value<T: ScriptValue>(&mut self, id: NodeId, port: &str, default: T) -> T {
        self.resolve_input(id, port)
            .and_then(|v| v.try_get::<T>())
            .unwrap_or(default)
    }

    /// Pull every connected source for a fan-in port, in declaration order
    pub fn input_values<T: ScriptValue>(&mut self, id: NodeId, port: &str) -> Vec<T> {
        if self.ensure_clean(id).is_err() {
            return Vec::new();
        }
        let Some(sources) = self.nodes.get(&id).and_then(|n| n.input_sources.get(port)) else {
            return Vec::new();
        };
        let sources = sources.clone();
        let mut values = Vec::with_capacity(sources.len());
        for source in &sources {
            let _ = self.ensure_clean(source.node);
            if let Some(v) = self
                .nodes
                .get(&source.node)
                .and_then(|n| n.output_values.get(&source.port))
            {
                values.push(v.get::<T>());
            }
        }
        values
    }

    /// Write an output value, advancing the global tick
    ///
    /// The new tick is what makes this output eligible to win downstream
    /// freshest-wins resolutions.
    pub fn set_output<T: ScriptValue>(
        &mut self,
        id: NodeId,
        port: &str,
        value: T,
    ) -> RuntimeResult<()> {
        self.ensure_clean(id)?;
        let node = self.nodes.get_mut(&id).ok_or(RuntimeError::NodeNotFound(id))?;
        let slot = node
            .output_values
            .get_mut(port)
            .ok_or_else(|| RuntimeError::PortNotFound {
                node: id,
                port: port.to_string(),
            })?;
        slot.set(value);
        Ok(())
    }

    /// Read a node's cached output value
    pub fn output(&self, id: NodeId, port: &str) -> Option<&TaggedValue> {
        self.nodes.get(&id).and_then(|n| n.output(port))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Traversal
    // ─────────────────────────────────────────────────────────────────────

    /// Trigger a node and let the traversal cascade
    ///
    /// Action nodes chain through the exec port their behavior selects;
    /// event nodes fan out to every connected child unconditionally.
    pub fn trigger(&mut self, id: NodeId) {
        self.run_traversal(vec![id]);
    }

    /// Trigger an event node with positional arguments
    ///
    /// Arguments bind to the node's declared data outputs in declaration
    /// order before the node runs; extra arguments are ignored.
    pub fn trigger_event(&mut self, id: NodeId, args: &[TaggedValue]) {
        if self.ensure_clean(id).is_err() {
            tracing::warn!(node_id = %id, "trigger_event on unknown node");
            return;
        }
        let outputs: Vec<String> = match self.nodes.get(&id) {
            Some(node) => node.data_outputs().map(|p| p.name.clone()).collect(),
            None => return,
        };
        if let Some(node) = self.nodes.get_mut(&id) {
            for (name, arg) in outputs.iter().zip(args) {
                if let Some(slot) = node.output_values.get_mut(name) {
                    slot.assign(arg);
                }
            }
        }
        self.run_traversal(vec![id]);
    }

    /// Trigger every node declared under a category, in insertion order
    pub fn trigger_category(&mut self, category: &str) {
        let roots = self.in_category(category).to_vec();
        self.run_traversal(roots);
    }

    /// Iterative worklist traversal over a growable stack
    ///
    /// A visited set bounds each node to one run per traversal, so cyclic
    /// wiring terminates instead of recursing without limit.
    fn run_traversal(&mut self, roots: Vec<NodeId>) {
        let mut stack: Vec<NodeId> = roots.into_iter().rev().collect();
        let mut visited: HashSet<NodeId> = HashSet::new();

        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            let children = self.run_node(id);
            for child in children.into_iter().rev() {
                stack.push(child);
            }
        }
    }

    /// Run one node and return the children to visit next
    ///
    /// Behavior failures are logged and stop only this chain link; sibling
    /// entries already on the worklist still run.
    fn run_node(&mut self, id: NodeId) -> Vec<NodeId> {
        if let Err(e) = self.ensure_clean(id) {
            tracing::warn!(node_id = %id, error = %e, "skipping unknown node in traversal");
            return Vec::new();
        }

        let (config, input_ports) = match self.nodes.get(&id) {
            Some(node) => (
                node.config_json().clone(),
                node.input_ports()
                    .filter(|p| p.port_type.is_data())
                    .map(|p| (p.name.clone(), p.default.clone()))
                    .collect::<Vec<_>>(),
            ),
            None => return Vec::new(),
        };

        let mut inputs = IndexMap::new();
        let mut all_inputs = IndexMap::new();
        for (name, default) in &input_ports {
            let resolved = self
                .resolve_input(id, name)
                .or_else(|| default.clone())
                .unwrap_or_default();
            inputs.insert(name.clone(), resolved);
            all_inputs.insert(name.clone(), self.input_values::<TaggedValue>(id, name));
        }
        let mut ctx = NodeContext {
            node_id: id,
            config,
            inputs,
            all_inputs,
        };

        // The behavior is swapped out for the duration of the run so it can
        // take &mut self without aliasing the graph.
        let Some(node) = self.nodes.get_mut(&id) else {
            return Vec::new();
        };
        let mut behavior = std::mem::replace(&mut node.behavior, Box::new(PassThrough));
        let result = behavior.run(&mut ctx);
        let Some(node) = self.nodes.get_mut(&id) else {
            return Vec::new();
        };
        node.behavior = behavior;

        let output: NodeOutput = match result {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!(
                    node_id = %id,
                    node = %node.name(),
                    error = %e,
                    "node behavior failed"
                );
                return Vec::new();
            }
        };

        for (name, value) in &output.values {
            if let Some(slot) = node.output_values.get_mut(name) {
                slot.assign(value);
            } else {
                tracing::debug!(node_id = %id, port = %name, "behavior produced undeclared output");
            }
        }

        match node.kind() {
            NodeKind::Event => node.event_children.clone(),
            NodeKind::Action => {
                if !node.propagates() {
                    return Vec::new();
                }
                match &output.flow {
                    Flow::Continue(port) => {
                        node.action_children.get(port).cloned().unwrap_or_default()
                    }
                    Flow::End => Vec::new(),
                }
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Channel Bridging
    // ─────────────────────────────────────────────────────────────────────

    /// Build a channel subscription that forwards each payload into an
    /// event node: the value binds to the node's first data output, then
    /// the node fans out to its children
    pub fn event_subscription(
        graph: Rc<RefCell<Graph>>,
        owner: SubscriberId,
        node: NodeId,
    ) -> Subscription {
        Subscription::new(owner, move |value: &TaggedValue| {
            graph
                .borrow_mut()
                .trigger_event(node, std::slice::from_ref(value));
            Ok(())
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::EventChannel;
    use crate::context::DEFAULT_EXEC;
    use skein_types::{PortDef, ValueTag};

    fn init_logging() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("skein_runtime=debug")
            .with_test_writer()
            .try_init();
    }

    fn source_node(name: &str) -> Node {
        Node::event(name, "sources").port(PortDef::data_out("value", ValueTag::Float))
    }

    fn sink_node() -> Node {
        Node::action("Sink", "sinks").port(PortDef::data_in("value", ValueTag::Float))
    }

    #[test]
    fn test_freshest_source_wins() {
        let mut graph = Graph::new();
        let a = graph.add_node(source_node("A"));
        let b = graph.add_node(source_node("B"));
        let sink = graph.add_node(sink_node());
        graph.connect(a, "value", sink, "value").unwrap();
        graph.connect(b, "value", sink, "value").unwrap();

        graph.set_output(a, "value", 1.0f32).unwrap();
        graph.set_output(b, "value", 2.0f32).unwrap();
        assert_eq!(graph.input_value(sink, "value", 0.0f32), 2.0);

        // A written again is now the freshest
        graph.set_output(a, "value", 3.0f32).unwrap();
        assert_eq!(graph.input_value(sink, "value", 0.0f32), 3.0);
    }

    #[test]
    fn test_unwritten_tie_resolves_deterministically() {
        let mut graph = Graph::new();
        let a = graph.add_node(source_node("A"));
        let b = graph.add_node(source_node("B"));
        let sink = graph.add_node(sink_node());
        graph.connect(a, "value", sink, "value").unwrap();
        graph.connect(b, "value", sink, "value").unwrap();

        // Neither source has run: both outputs carry tick 0, the
        // strictly-greater comparison keeps the earliest-connected one, and
        // its Null output degrades to the caller default.
        assert_eq!(graph.input_value(sink, "value", 9.0f32), 9.0);

        // A single write breaks the tie
        graph.set_output(b, "value", 2.0f32).unwrap();
        assert_eq!(graph.input_value(sink, "value", 9.0f32), 2.0);
    }

    #[test]
    fn test_unwritten_default_output_does_not_outrank_real_write() {
        let mut graph = Graph::new();
        let a = graph.add_node(source_node("A"));
        let sink = graph.add_node(sink_node());
        graph.connect(a, "value", sink, "value").unwrap();
        graph.set_output(a, "value", 1.0f32).unwrap();

        // This port default is built after A's write, so its declaration
        // carries a later stamp; the cache rebuild must clear it.
        let lazy = graph.add_node(
            Node::event("Lazy", "sources")
                .port(PortDef::data_out("value", ValueTag::Float).with_default(99.0f32)),
        );
        graph.connect(lazy, "value", sink, "value").unwrap();

        assert_eq!(graph.input_value(sink, "value", 0.0f32), 1.0);
    }

    #[test]
    fn test_unconnected_input_returns_caller_default() {
        let mut graph = Graph::new();
        let sink = graph.add_node(sink_node());
        assert_eq!(graph.input_value(sink, "value", 9.5f32), 9.5);
        assert_eq!(graph.input_value(sink, "missing", 1.5f32), 1.5);
    }

    #[test]
    fn test_coercion_miss_returns_caller_default() {
        let mut graph = Graph::new();
        let src = graph
            .add_node(Node::event("S", "sources").port(PortDef::data_out("value", ValueTag::String)));
        let sink = graph.add_node(
            Node::action("Sink", "sinks").port(PortDef::data_in("value", ValueTag::Null)),
        );
        graph.connect(src, "value", sink, "value").unwrap();
        graph.set_output(src, "value", "text".to_string()).unwrap();

        // A string source feeding a numeric read degrades to the default
        assert_eq!(graph.input_value(sink, "value", 5.0f32), 5.0);
    }

    #[test]
    fn test_fan_in_resolves_all_sources_in_order() {
        let mut graph = Graph::new();
        let a = graph.add_node(source_node("A"));
        let b = graph.add_node(source_node("B"));
        let sink = graph.add_node(sink_node());
        graph.connect(a, "value", sink, "value").unwrap();
        graph.connect(b, "value", sink, "value").unwrap();

        graph.set_output(b, "value", 2.0f32).unwrap();
        graph.set_output(a, "value", 1.0f32).unwrap();

        // Declaration order, not freshness order
        assert_eq!(graph.input_values::<f32>(sink, "value"), vec![1.0, 2.0]);
    }

    #[test]
    fn test_structural_edit_marks_dirty_and_rebuilds() {
        let mut graph = Graph::new();
        let a = graph.add_node(source_node("A"));
        let sink = graph.add_node(sink_node());
        graph.connect(a, "value", sink, "value").unwrap();

        graph.set_output(a, "value", 4.0f32).unwrap();
        assert_eq!(graph.input_value(sink, "value", 0.0f32), 4.0);
        assert!(!graph.node(sink).unwrap().is_dirty());

        graph.disconnect(a, "value", sink, "value");
        assert!(graph.node(sink).unwrap().is_dirty());
        // Rebuild happens lazily on the next read
        assert_eq!(graph.input_value(sink, "value", 0.0f32), 0.0);
        assert!(!graph.node(sink).unwrap().is_dirty());
    }

    #[test]
    fn test_connect_validation() {
        let mut graph = Graph::new();
        let a = graph.add_node(source_node("A"));
        let sink = graph.add_node(sink_node());
        let exec = graph.add_node(Node::action("E", "x").port(PortDef::exec_in("exec")));

        // Input-to-input is a direction error
        assert!(matches!(
            graph.connect(sink, "value", sink, "value"),
            Err(RuntimeError::DirectionMismatch(_))
        ));
        // Data into exec is a type error
        assert!(matches!(
            graph.connect(a, "value", exec, "exec"),
            Err(RuntimeError::TypeMismatch { .. })
        ));
        // Unknown ports and nodes are errors
        assert!(matches!(
            graph.connect(a, "nope", sink, "value"),
            Err(RuntimeError::PortNotFound { .. })
        ));
        assert!(matches!(
            graph.connect(NodeId::new(), "value", sink, "value"),
            Err(RuntimeError::NodeNotFound(_))
        ));
    }

    #[test]
    fn test_action_chain_follows_selected_port() {
        let mut graph = Graph::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let branch_log = Rc::clone(&log);
        let branch = graph.add_node(
            Node::action("Branch", "flow")
                .port(PortDef::exec_in("exec"))
                .port(PortDef::exec_out("true"))
                .port(PortDef::exec_out("false"))
                .behavior(move |_ctx: &mut NodeContext| {
                    branch_log.borrow_mut().push("branch");
                    Ok(NodeOutput::continue_to("true", IndexMap::new()))
                }),
        );

        let leaf = |label: &'static str, graph: &mut Graph| {
            let leaf_log = Rc::clone(&log);
            graph.add_node(
                Node::action(label, "flow")
                    .port(PortDef::exec_in("exec"))
                    .behavior(move |_ctx: &mut NodeContext| {
                        leaf_log.borrow_mut().push(label);
                        Ok(NodeOutput::empty())
                    }),
            )
        };
        let taken = leaf("taken", &mut graph);
        let skipped = leaf("skipped", &mut graph);
        graph.connect(branch, "true", taken, "exec").unwrap();
        graph.connect(branch, "false", skipped, "exec").unwrap();

        graph.trigger(branch);
        assert_eq!(*log.borrow(), vec!["branch", "taken"]);
    }

    #[test]
    fn test_event_fans_out_to_all_children_despite_failure() {
        init_logging();
        let mut graph = Graph::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let event = graph.add_node(
            Node::event("OnHit", "combat")
                .port(PortDef::data_out("damage", ValueTag::Float))
                .port(PortDef::exec_out("fired")),
        );

        let broken = graph.add_node(
            Node::action("Broken", "combat")
                .port(PortDef::exec_in("exec"))
                .behavior(|_ctx: &mut NodeContext| -> Result<NodeOutput, RuntimeError> {
                    Err(RuntimeError::behavior("misconfigured node"))
                }),
        );
        let ok_log = Rc::clone(&log);
        let healthy = graph.add_node(
            Node::action("Healthy", "combat")
                .port(PortDef::exec_in("exec"))
                .port(PortDef::data_in("damage", ValueTag::Float))
                .behavior(move |ctx: &mut NodeContext| {
                    ok_log.borrow_mut().push(ctx.input("damage", 0.0f32));
                    Ok(NodeOutput::empty())
                }),
        );
        graph.connect(event, "fired", broken, "exec").unwrap();
        graph.connect(event, "fired", healthy, "exec").unwrap();
        graph.connect(event, "damage", healthy, "damage").unwrap();

        graph.trigger_event(event, &[TaggedValue::of(12.5f32)]);

        // The broken sibling did not stop the healthy one, and the
        // positional argument reached it through the output cache.
        assert_eq!(*log.borrow(), vec![12.5]);
    }

    #[test]
    fn test_event_args_bind_positionally() {
        let mut graph = Graph::new();
        let event = graph.add_node(
            Node::event("OnSpawn", "lifecycle")
                .port(PortDef::data_out("position", ValueTag::Vector3))
                .port(PortDef::data_out("team", ValueTag::Int)),
        );

        graph.trigger_event(
            event,
            &[TaggedValue::of([1.0f32, 2.0, 3.0]), TaggedValue::of(7i32)],
        );

        assert_eq!(
            graph.output(event, "position").map(|v| v.get::<[f32; 3]>()),
            Some([1.0, 2.0, 3.0])
        );
        assert_eq!(graph.output(event, "team").map(|v| v.get::<i32>()), Some(7));
    }

    #[test]
    fn test_cyclic_wiring_terminates() {
        let mut graph = Graph::new();
        let count = Rc::new(RefCell::new(0usize));

        let looper = |graph: &mut Graph| {
            let count = Rc::clone(&count);
            graph.add_node(
                Node::action("Loop", "flow")
                    .port(PortDef::exec_in("exec"))
                    .port(PortDef::exec_out(DEFAULT_EXEC))
                    .behavior(move |_ctx: &mut NodeContext| {
                        *count.borrow_mut() += 1;
                        Ok(NodeOutput::empty())
                    }),
            )
        };
        let a = looper(&mut graph);
        let b = looper(&mut graph);
        graph.connect(a, DEFAULT_EXEC, b, "exec").unwrap();
        graph.connect(b, DEFAULT_EXEC, a, "exec").unwrap();

        graph.trigger(a);
        // Each node runs once per traversal
        assert_eq!(*count.borrow(), 2);
    }

    #[test]
    fn test_category_bulk_trigger() {
        let mut graph = Graph::new();
        let count = Rc::new(RefCell::new(0usize));

        for _ in 0..3 {
            let count = Rc::clone(&count);
            graph.add_node(Node::event("Tick", "on_update").behavior(
                move |_ctx: &mut NodeContext| {
                    *count.borrow_mut() += 1;
                    Ok(NodeOutput::empty())
                },
            ));
        }
        graph.add_node(Node::event("Other", "on_fixed"));

        assert_eq!(graph.in_category("on_update").len(), 3);
        graph.trigger_category("on_update");
        assert_eq!(*count.borrow(), 3);
    }

    #[test]
    fn test_remove_node_drops_connections() {
        let mut graph = Graph::new();
        let a = graph.add_node(source_node("A"));
        let sink = graph.add_node(sink_node());
        graph.connect(a, "value", sink, "value").unwrap();
        graph.set_output(a, "value", 2.0f32).unwrap();

        graph.remove_node(a).unwrap();
        assert!(matches!(
            graph.remove_node(a),
            Err(RuntimeError::NodeNotFound(_))
        ));
        assert_eq!(graph.input_value(sink, "value", 0.0f32), 0.0);
        assert!(graph.in_category("sources").is_empty());
    }

    #[test]
    fn test_channel_drives_event_node() {
        let graph = Rc::new(RefCell::new(Graph::new()));
        let received = Rc::new(RefCell::new(Vec::new()));

        let (event, _listener) = {
            let mut g = graph.borrow_mut();
            let event = g.add_node(
                Node::event("OnMove", "movement")
                    .port(PortDef::data_out("position", ValueTag::Vector3))
                    .port(PortDef::exec_out("fired")),
            );
            let sink = Rc::clone(&received);
            let listener = g.add_node(
                Node::action("Listener", "movement")
                    .port(PortDef::exec_in("exec"))
                    .port(PortDef::data_in("position", ValueTag::Vector3))
                    .behavior(move |ctx: &mut NodeContext| {
                        sink.borrow_mut().push(ctx.input("position", [0.0f32; 3]));
                        Ok(NodeOutput::empty())
                    }),
            );
            g.connect(event, "fired", listener, "exec").unwrap();
            g.connect(event, "position", listener, "position").unwrap();
            (event, listener)
        };

        let mut channel = EventChannel::typed("move", ValueTag::Vector3);
        let owner = SubscriberId::new();
        channel.subscribe(Graph::event_subscription(Rc::clone(&graph), owner, event));

        channel.invoke(&TaggedValue::of([1.0f32, 2.0, 3.0]));
        assert_eq!(*received.borrow(), vec![[1.0, 2.0, 3.0]]);
    }
}
