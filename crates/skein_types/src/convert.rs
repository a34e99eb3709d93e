//! The tag × native-type conversion table
//!
//! `ScriptValue` is implemented once per native type the runtime can read or
//! write. Each `load` is one row group of the table: it enumerates exactly
//! which tags convert into that type, including the widening rules
//! (Int↔Float↔Bool, Vector2⊂Vector3⊂Vector4, Float promoting into the x
//! channel). Everything not listed is unsupported and degrades to the
//! target's default at the `TaggedValue::get` call site.
//!
//! Monomorphizing over this trait replaces the per-type delegate cache the
//! runtime would otherwise need for dynamic dispatch.

use crate::value::{
    Color, Color32, Handle, LayerMask, ObjectSlot, Quaternion, SceneRef, TaggedValue, ValueTag,
};

// ─────────────────────────────────────────────────────────────────────────────
// ScriptValue Trait
// ─────────────────────────────────────────────────────────────────────────────

/// A native type that can be read from and written into a `TaggedValue`
pub trait ScriptValue: Default {
    /// Convert from a tagged value, or `None` if the table has no row
    fn load(value: &TaggedValue) -> Option<Self>;

    /// Write into a tagged value, retagging it (tick handling is the
    /// caller's job; use `TaggedValue::set`)
    fn store(self, value: &mut TaggedValue);
}

/// Follow Union wrappers down to the innermost concrete value
fn unwrap_union(value: &TaggedValue) -> &TaggedValue {
    let mut current = value;
    loop {
        match (current.tag(), current.object()) {
            (ValueTag::Union, ObjectSlot::Union(inner)) => current = inner,
            _ => return current,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Scalar Rows
// ─────────────────────────────────────────────────────────────────────────────

impl ScriptValue for bool {
    fn load(value: &TaggedValue) -> Option<Self> {
        let v = unwrap_union(value);
        let p = v.payload();
        match v.tag() {
            ValueTag::Bool => Some(p[0] != 0.0),
            ValueTag::Int => Some(p[0] as i32 != 0),
            ValueTag::Float => Some(p[0] != 0.0),
            _ => None,
        }
    }

    fn store(self, value: &mut TaggedValue) {
        value.write_inline(ValueTag::Bool, [if self { 1.0 } else { 0.0 }, 0.0, 0.0, 0.0]);
    }
}

impl ScriptValue for i32 {
    fn load(value: &TaggedValue) -> Option<Self> {
        let v = unwrap_union(value);
        let p = v.payload();
        match v.tag() {
            ValueTag::Int => Some(p[0] as i32),
            ValueTag::Float => Some(p[0] as i32),
            ValueTag::Bool => Some(if p[0] != 0.0 { 1 } else { 0 }),
            ValueTag::LayerMask => Some(p[0].to_bits() as i32),
            _ => None,
        }
    }

    fn store(self, value: &mut TaggedValue) {
        value.write_inline(ValueTag::Int, [self as f32, 0.0, 0.0, 0.0]);
    }
}

impl ScriptValue for f32 {
    fn load(value: &TaggedValue) -> Option<Self> {
        let v = unwrap_union(value);
        let p = v.payload();
        match v.tag() {
            ValueTag::Float | ValueTag::Int => Some(p[0]),
            ValueTag::Bool => Some(if p[0] != 0.0 { 1.0 } else { 0.0 }),
            // Narrowing a vector reads its x channel
            ValueTag::Vector2 | ValueTag::Vector3 | ValueTag::Vector4 => Some(p[0]),
            _ => None,
        }
    }

    fn store(self, value: &mut TaggedValue) {
        value.write_inline(ValueTag::Float, [self, 0.0, 0.0, 0.0]);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Vector Rows
// ─────────────────────────────────────────────────────────────────────────────

impl ScriptValue for [f32; 2] {
    fn load(value: &TaggedValue) -> Option<Self> {
        let v = unwrap_union(value);
        let p = v.payload();
        match v.tag() {
            ValueTag::Vector2 | ValueTag::Vector3 | ValueTag::Vector4 => Some([p[0], p[1]]),
            ValueTag::Float => Some([p[0], 0.0]),
            _ => None,
        }
    }

    fn store(self, value: &mut TaggedValue) {
        value.write_inline(ValueTag::Vector2, [self[0], self[1], 0.0, 0.0]);
    }
}

impl ScriptValue for [f32; 3] {
    fn load(value: &TaggedValue) -> Option<Self> {
        let v = unwrap_union(value);
        let p = v.payload();
        match v.tag() {
            ValueTag::Vector3 | ValueTag::Vector4 => Some([p[0], p[1], p[2]]),
            // Widening pads with zeros
            ValueTag::Vector2 => Some([p[0], p[1], 0.0]),
            // A scalar promotes into the x channel only
            ValueTag::Float => Some([p[0], 0.0, 0.0]),
            ValueTag::Color => Some([p[0], p[1], p[2]]),
            _ => None,
        }
    }

    fn store(self, value: &mut TaggedValue) {
        value.write_inline(ValueTag::Vector3, [self[0], self[1], self[2], 0.0]);
    }
}

impl ScriptValue for [f32; 4] {
    fn load(value: &TaggedValue) -> Option<Self> {
        let v = unwrap_union(value);
        let p = v.payload();
        match v.tag() {
            ValueTag::Vector4 | ValueTag::Color | ValueTag::Quaternion => Some(*p),
            ValueTag::Vector3 => Some([p[0], p[1], p[2], 0.0]),
            ValueTag::Vector2 => Some([p[0], p[1], 0.0, 0.0]),
            ValueTag::Float => Some([p[0], 0.0, 0.0, 0.0]),
            _ => None,
        }
    }

    fn store(self, value: &mut TaggedValue) {
        value.write_inline(ValueTag::Vector4, self);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Color / Rotation / Mask Rows
// ─────────────────────────────────────────────────────────────────────────────

impl ScriptValue for Color {
    fn load(value: &TaggedValue) -> Option<Self> {
        let v = unwrap_union(value);
        let p = v.payload();
        match v.tag() {
            ValueTag::Color => Some(Color::new(p[0], p[1], p[2], p[3])),
            ValueTag::Color32 => Some(Color::new(
                p[0] / 255.0,
                p[1] / 255.0,
                p[2] / 255.0,
                p[3] / 255.0,
            )),
            ValueTag::Vector4 => Some(Color::new(p[0], p[1], p[2], p[3])),
            ValueTag::Vector3 => Some(Color::new(p[0], p[1], p[2], 1.0)),
            _ => None,
        }
    }

    fn store(self, value: &mut TaggedValue) {
        value.write_inline(ValueTag::Color, [self.r, self.g, self.b, self.a]);
    }
}

impl ScriptValue for Color32 {
    fn load(value: &TaggedValue) -> Option<Self> {
        let v = unwrap_union(value);
        let p = v.payload();
        let byte = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        match v.tag() {
            ValueTag::Color32 => Some(Color32::new(
                p[0] as u8, p[1] as u8, p[2] as u8, p[3] as u8,
            )),
            ValueTag::Color => Some(Color32::new(byte(p[0]), byte(p[1]), byte(p[2]), byte(p[3]))),
            _ => None,
        }
    }

    fn store(self, value: &mut TaggedValue) {
        value.write_inline(
            ValueTag::Color32,
            [self.r as f32, self.g as f32, self.b as f32, self.a as f32],
        );
    }
}

impl ScriptValue for Quaternion {
    fn load(value: &TaggedValue) -> Option<Self> {
        let v = unwrap_union(value);
        let p = v.payload();
        match v.tag() {
            ValueTag::Quaternion | ValueTag::Vector4 => {
                Some(Quaternion::new(p[0], p[1], p[2], p[3]))
            }
            _ => None,
        }
    }

    fn store(self, value: &mut TaggedValue) {
        value.write_inline(ValueTag::Quaternion, [self.x, self.y, self.z, self.w]);
    }
}

impl ScriptValue for LayerMask {
    fn load(value: &TaggedValue) -> Option<Self> {
        let v = unwrap_union(value);
        let p = v.payload();
        match v.tag() {
            // Mask bits ride in the x lane's bit pattern, not its numeric value
            ValueTag::LayerMask => Some(LayerMask(p[0].to_bits())),
            ValueTag::Int => Some(LayerMask(p[0] as i32 as u32)),
            _ => None,
        }
    }

    fn store(self, value: &mut TaggedValue) {
        value.write_inline(ValueTag::LayerMask, [f32::from_bits(self.0), 0.0, 0.0, 0.0]);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Reference Rows
// ─────────────────────────────────────────────────────────────────────────────

impl ScriptValue for String {
    fn load(value: &TaggedValue) -> Option<Self> {
        match unwrap_union(value).object() {
            ObjectSlot::Str(s) => Some(s.clone()),
            _ => None,
        }
    }

    fn store(self, value: &mut TaggedValue) {
        value.write_reference(ValueTag::String, ObjectSlot::Str(self));
    }
}

impl ScriptValue for Vec<TaggedValue> {
    fn load(value: &TaggedValue) -> Option<Self> {
        match unwrap_union(value).object() {
            ObjectSlot::List(items) => Some(items.clone()),
            _ => None,
        }
    }

    fn store(self, value: &mut TaggedValue) {
        value.write_reference(ValueTag::List, ObjectSlot::List(self));
    }
}

impl ScriptValue for Handle {
    fn load(value: &TaggedValue) -> Option<Self> {
        match unwrap_union(value).object() {
            ObjectSlot::Object(h) => Some(h.clone()),
            _ => None,
        }
    }

    fn store(self, value: &mut TaggedValue) {
        value.write_reference(ValueTag::ObjectRef, ObjectSlot::Object(self));
    }
}

impl ScriptValue for SceneRef {
    fn load(value: &TaggedValue) -> Option<Self> {
        match unwrap_union(value).object() {
            ObjectSlot::Scene(s) => Some(s.clone()),
            _ => None,
        }
    }

    fn store(self, value: &mut TaggedValue) {
        value.write_reference(ValueTag::Scene, ObjectSlot::Scene(self));
    }
}

// Reading a TaggedValue out of a TaggedValue unwraps Union nesting; writing
// one in wraps it under the Union tag.
impl ScriptValue for TaggedValue {
    fn load(value: &TaggedValue) -> Option<Self> {
        Some(unwrap_union(value).clone())
    }

    fn store(self, value: &mut TaggedValue) {
        value.write_reference(ValueTag::Union, ObjectSlot::Union(Box::new(self)));
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
