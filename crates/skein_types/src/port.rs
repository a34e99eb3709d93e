//! Port declarations for graph nodes
//!
//! Ports are declared up front on each node; the runtime splits them into
//! inputs and outputs at cache-build time. Exec ports carry control flow,
//! data ports carry tagged values. All declaration types serialize so that
//! external asset code has a stable identity scheme to rebuild structure
//! from; the storage format itself lives outside this crate.

use serde::{Deserialize, Serialize};

use crate::value::{TaggedValue, ValueTag};

// ─────────────────────────────────────────────────────────────────────────────
// Port Types
// ─────────────────────────────────────────────────────────────────────────────

/// Direction of a port on a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortDirection {
    Input,
    Output,
}

/// What can flow through a port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "PascalCase")]
pub enum PortType {
    /// Control flow (no data); what chains action nodes together
    Exec,
    /// A tagged value; `ValueTag::Null` declares an accept-anything port
    Data { tag: ValueTag },
}

impl PortType {
    /// Data port carrying a specific tag
    pub fn data(tag: ValueTag) -> Self {
        PortType::Data { tag }
    }

    /// Data port accepting any tag
    pub fn any() -> Self {
        PortType::Data { tag: ValueTag::Null }
    }

    /// Check if this is an execution port
    pub fn is_exec(&self) -> bool {
        matches!(self, PortType::Exec)
    }

    /// Check if this is a data port
    pub fn is_data(&self) -> bool {
        !self.is_exec()
    }

    /// Check if this type can connect to another (for connection validation)
    ///
    /// Mirrors the value conversion table: pairs the table can coerce are
    /// connectable.
    pub fn is_compatible_with(&self, other: &PortType) -> bool {
        let (a, b) = match (self, other) {
            (PortType::Exec, PortType::Exec) => return true,
            (PortType::Exec, _) | (_, PortType::Exec) => return false,
            (PortType::Data { tag: a }, PortType::Data { tag: b }) => (*a, *b),
        };

        if a == b {
            return true;
        }
        // A Null-tagged declaration accepts anything
        if a == ValueTag::Null || b == ValueTag::Null {
            return true;
        }

        use ValueTag::*;
        let numeric = |t: ValueTag| matches!(t, Bool | Int | Float);
        let vector = |t: ValueTag| matches!(t, Vector2 | Vector3 | Vector4);

        match (a, b) {
            _ if numeric(a) && numeric(b) => true,
            _ if vector(a) && vector(b) => true,
            (Float, t) | (t, Float) if vector(t) => true,
            (Color, Vector4) | (Vector4, Color) => true,
            (Color, Vector3) | (Vector3, Color) => true,
            (Color, Color32) | (Color32, Color) => true,
            (Quaternion, Vector4) | (Vector4, Quaternion) => true,
            (Int, LayerMask) | (LayerMask, Int) => true,
            _ => false,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Port Definitions
// ─────────────────────────────────────────────────────────────────────────────

/// Declaration of a single port on a node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortDef {
    /// Port name (the key used by connections and caches)
    pub name: String,
    /// Port direction
    pub direction: PortDirection,
    /// Port type
    #[serde(rename = "type")]
    pub port_type: PortType,
    /// Default value for unconnected inputs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<TaggedValue>,
}

impl PortDef {
    /// Create an execution input port
    pub fn exec_in(name: &str) -> Self {
        Self {
            name: name.to_string(),
            direction: PortDirection::Input,
            port_type: PortType::Exec,
            default: None,
        }
    }

    /// Create an execution output port
    pub fn exec_out(name: &str) -> Self {
        Self {
            name: name.to_string(),
            direction: PortDirection::Output,
            port_type: PortType::Exec,
            default: None,
        }
    }

    /// Create a data input port
    pub fn data_in(name: &str, tag: ValueTag) -> Self {
        Self {
            name: name.to_string(),
            direction: PortDirection::Input,
            port_type: PortType::data(tag),
            default: None,
        }
    }

    /// Create a data output port
    pub fn data_out(name: &str, tag: ValueTag) -> Self {
        Self {
            name: name.to_string(),
            direction: PortDirection::Output,
            port_type: PortType::data(tag),
            default: None,
        }
    }

    /// Attach a default value (for input ports)
    pub fn with_default(mut self, value: impl Into<TaggedValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Check if this is an input port
    pub fn is_input(&self) -> bool {
        self.direction == PortDirection::Input
    }

    /// Check if this is an output port
    pub fn is_output(&self) -> bool {
        self.direction == PortDirection::Output
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compatibility() {
        let float = PortType::data(ValueTag::Float);
        let int = PortType::data(ValueTag::Int);
        let v3 = PortType::data(ValueTag::Vector3);
        let string = PortType::data(ValueTag::String);

        assert!(float.is_compatible_with(&float));
        assert!(float.is_compatible_with(&int));
        assert!(float.is_compatible_with(&v3));
        assert!(v3.is_compatible_with(&PortType::data(ValueTag::Vector4)));
        assert!(!string.is_compatible_with(&float));

        assert!(PortType::any().is_compatible_with(&string));
        assert!(PortType::Exec.is_compatible_with(&PortType::Exec));
        assert!(!PortType::Exec.is_compatible_with(&float));
    }

    #[test]
    fn test_builders() {
        let p = PortDef::data_in("speed", ValueTag::Float).with_default(1.5f32);
        assert!(p.is_input());
        assert_eq!(p.default.as_ref().map(|v| v.get::<f32>()), Some(1.5));

        let e = PortDef::exec_out("then");
        assert!(e.is_output());
        assert!(e.port_type.is_exec());
    }
}
