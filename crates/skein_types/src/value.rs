//! Tagged value representation for the scripting runtime
//!
//! Every value that flows through channels and graph ports is a `TaggedValue`:
//! a type tag, a fixed inline payload for scalar/vector data, a single heap
//! slot for reference data, and the global tick stamped on the last write.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::convert::ScriptValue;

// ─────────────────────────────────────────────────────────────────────────────
// Global Tick
// ─────────────────────────────────────────────────────────────────────────────

static TICK: AtomicU64 = AtomicU64::new(0);

/// Advance and return the process-wide write counter.
///
/// Every `TaggedValue::set` stamps its value with a fresh tick; downstream
/// graph inputs use the tick to pick the most recent of several producers.
pub fn next_tick() -> u64 {
    TICK.fetch_add(1, Ordering::Relaxed) + 1
}

/// The most recently issued tick, without advancing it.
pub fn current_tick() -> u64 {
    TICK.load(Ordering::Relaxed)
}

// ─────────────────────────────────────────────────────────────────────────────
// Handle Types
// ─────────────────────────────────────────────────────────────────────────────

/// Unique identifier for opaque handles to host objects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HandleId(pub uuid::Uuid);

impl HandleId {
    /// Create a new unique handle ID
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for HandleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference to an opaque host object (the ObjectRef payload)
///
/// The `type_id` string carries the reference variant ("Transform",
/// "AudioSource", ...); the runtime itself never looks inside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Handle {
    /// Unique handle ID
    pub id: HandleId,
    /// Type identifier of the referenced object
    pub type_id: String,
}

impl Handle {
    /// Create a new handle
    pub fn new(type_id: impl Into<String>) -> Self {
        Self {
            id: HandleId::new(),
            type_id: type_id.into(),
        }
    }

    /// Create a handle with a specific ID
    pub fn with_id(id: HandleId, type_id: impl Into<String>) -> Self {
        Self {
            id,
            type_id: type_id.into(),
        }
    }
}

// The default handle is the null reference, not a freshly minted ID.
impl Default for Handle {
    fn default() -> Self {
        Self {
            id: HandleId(uuid::Uuid::nil()),
            type_id: String::new(),
        }
    }
}

/// Named reference to a scene
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SceneRef(pub String);

impl SceneRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Inline Math Types
// ─────────────────────────────────────────────────────────────────────────────

/// RGBA color with float channels in [0, 1]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }
}

/// RGBA color with byte channels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color32 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color32 {
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

/// Rotation quaternion (xyzw)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Quaternion {
    pub fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    /// The identity rotation
    pub fn identity() -> Self {
        Self::new(0.0, 0.0, 0.0, 1.0)
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::identity()
    }
}

/// Physics/render layer bitmask
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LayerMask(pub u32);

// ─────────────────────────────────────────────────────────────────────────────
// Value Tag
// ─────────────────────────────────────────────────────────────────────────────

/// Type discriminant for `TaggedValue`
///
/// A closed set: every operation on values (conversion, arithmetic,
/// formatting) matches exhaustively over these tags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueTag {
    #[default]
    Null,
    Bool,
    Int,
    Float,
    Vector2,
    Vector3,
    Vector4,
    Color,
    Color32,
    Quaternion,
    LayerMask,
    String,
    ObjectRef,
    List,
    Scene,
    Union,
}

impl ValueTag {
    /// Tags whose data lives in the inline payload
    pub fn is_inline(&self) -> bool {
        matches!(
            self,
            ValueTag::Bool
                | ValueTag::Int
                | ValueTag::Float
                | ValueTag::Vector2
                | ValueTag::Vector3
                | ValueTag::Vector4
                | ValueTag::Color
                | ValueTag::Color32
                | ValueTag::Quaternion
                | ValueTag::LayerMask
        )
    }

    /// Tags whose data lives in the heap slot
    pub fn is_reference(&self) -> bool {
        matches!(
            self,
            ValueTag::String
                | ValueTag::ObjectRef
                | ValueTag::List
                | ValueTag::Scene
                | ValueTag::Union
        )
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Heap Slot
// ─────────────────────────────────────────────────────────────────────────────

/// The single heap-reference slot of a `TaggedValue`
///
/// Exactly one of the inline payload or this slot is meaningful for a given
/// tag; writes through `TaggedValue::set` keep the other zeroed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum ObjectSlot {
    #[default]
    Empty,
    Str(String),
    List(Vec<TaggedValue>),
    Object(Handle),
    Scene(SceneRef),
    Union(Box<TaggedValue>),
}

// ─────────────────────────────────────────────────────────────────────────────
// Tagged Value
// ─────────────────────────────────────────────────────────────────────────────

/// A dynamically typed, fixed-shape scripting value
///
/// Reads go through `get::<T>()` and never fail: an unsupported tag/type
/// combination yields `T::default()`. Writes go through `set::<T>()`, always
/// succeed, and stamp the value with a fresh global tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaggedValue {
    tag: ValueTag,
    payload: [f32; 4],
    object: ObjectSlot,
    /// Runtime-only freshness stamp, not part of the value's identity
    #[serde(skip)]
    tick: u64,
}

impl Default for TaggedValue {
    fn default() -> Self {
        Self::null()
    }
}

impl TaggedValue {
    /// Create a Null-tagged value
    pub fn null() -> Self {
        Self {
            tag: ValueTag::Null,
            payload: [0.0; 4],
            object: ObjectSlot::Empty,
            tick: 0,
        }
    }

    /// Create a value from any convertible native type
    pub fn of<T: ScriptValue>(value: T) -> Self {
        let mut v = Self::null();
        v.set(value);
        v
    }

    /// The value's type tag
    pub fn tag(&self) -> ValueTag {
        self.tag
    }

    /// The global tick stamped by the last write (0 if never written)
    pub fn last_update_tick(&self) -> u64 {
        self.tick
    }

    /// Check if the value is Null-tagged
    pub fn is_null(&self) -> bool {
        self.tag == ValueTag::Null
    }

    /// Read the value as `T` via the conversion table
    ///
    /// Missing rows degrade to `T::default()`; this accessor never fails.
    pub fn get<T: ScriptValue>(&self) -> T {
        T::load(self).unwrap_or_default()
    }

    /// Read the value as `T`, or `None` if the conversion table has no row
    pub fn try_get<T: ScriptValue>(&self) -> Option<T> {
        T::load(self)
    }

    /// Overwrite the value with `T`, retagging it and advancing the tick
    pub fn set<T: ScriptValue>(&mut self, value: T) {
        value.store(self);
        self.tick = next_tick();
    }

    /// Copy of this value with the freshness stamp cleared
    ///
    /// Declaration-time defaults go through this before entering any cache,
    /// so they never outrank a genuine runtime write.
    pub fn unstamped(&self) -> TaggedValue {
        let mut v = self.clone();
        v.tick = 0;
        v
    }

    /// Copy another value in wholesale, advancing the tick
    pub fn assign(&mut self, other: &TaggedValue) {
        self.tag = other.tag;
        self.payload = other.payload;
        self.object = other.object.clone();
        self.tick = next_tick();
    }

    pub(crate) fn payload(&self) -> &[f32; 4] {
        &self.payload
    }

    pub(crate) fn object(&self) -> &ObjectSlot {
        &self.object
    }

    pub(crate) fn write_inline(&mut self, tag: ValueTag, payload: [f32; 4]) {
        self.tag = tag;
        self.payload = payload;
        self.object = ObjectSlot::Empty;
    }

    pub(crate) fn write_reference(&mut self, tag: ValueTag, object: ObjectSlot) {
        self.tag = tag;
        self.payload = [0.0; 4];
        self.object = object;
    }
}

// Equality is tag-driven and ignores the tick: two values are equal when
// their tags match and the slot that tag makes meaningful matches.
impl PartialEq for TaggedValue {
    fn eq(&self, other: &Self) -> bool {
        if self.tag != other.tag {
            return false;
        }
        match self.tag {
            // Mask bits ride in the x lane's bit pattern; NaN patterns are
            // legal masks, so compare bits rather than floats
            ValueTag::LayerMask => self.payload[0].to_bits() == other.payload[0].to_bits(),
            t if t.is_reference() => self.object == other.object,
            _ => self.payload == other.payload,
        }
    }
}

impl fmt::Display for TaggedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = &self.payload;
        match self.tag {
            ValueTag::Null => write!(f, "null"),
            ValueTag::Bool => write!(f, "{}", p[0] != 0.0),
            ValueTag::Int => write!(f, "{}", p[0] as i32),
            ValueTag::Float => write!(f, "{}", p[0]),
            ValueTag::Vector2 => write!(f, "({}, {})", p[0], p[1]),
            ValueTag::Vector3 => write!(f, "({}, {}, {})", p[0], p[1], p[2]),
            ValueTag::Vector4 | ValueTag::Quaternion => {
                write!(f, "({}, {}, {}, {})", p[0], p[1], p[2], p[3])
            }
            ValueTag::Color => write!(f, "RGBA({}, {}, {}, {})", p[0], p[1], p[2], p[3]),
            ValueTag::Color32 => write!(
                f,
                "RGBA({}, {}, {}, {})",
                p[0] as u8, p[1] as u8, p[2] as u8, p[3] as u8
            ),
            ValueTag::LayerMask => write!(f, "mask:{:#010x}", p[0].to_bits()),
            ValueTag::String => match &self.object {
                ObjectSlot::Str(s) => write!(f, "{s}"),
                _ => write!(f, ""),
            },
            ValueTag::ObjectRef => match &self.object {
                ObjectSlot::Object(h) => write!(f, "{}#{}", h.type_id, h.id),
                _ => write!(f, "null"),
            },
            ValueTag::List => match &self.object {
                ObjectSlot::List(items) => {
                    write!(f, "[")?;
                    for (i, item) in items.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{item}")?;
                    }
                    write!(f, "]")
                }
                _ => write!(f, "[]"),
            },
            ValueTag::Scene => match &self.object {
                ObjectSlot::Scene(s) => write!(f, "scene:{}", s.0),
                _ => write!(f, "scene:"),
            },
            ValueTag::Union => match &self.object {
                ObjectSlot::Union(inner) => write!(f, "{inner}"),
                _ => write!(f, "null"),
            },
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// From Implementations
// ─────────────────────────────────────────────────────────────────────────────

impl From<()> for TaggedValue {
    fn from(_: ()) -> Self {
        TaggedValue::null()
    }
}

impl From<bool> for TaggedValue {
    fn from(v: bool) -> Self {
        TaggedValue::of(v)
    }
}

impl From<i32> for TaggedValue {
    fn from(v: i32) -> Self {
        TaggedValue::of(v)
    }
}

impl From<f32> for TaggedValue {
    fn from(v: f32) -> Self {
        TaggedValue::of(v)
    }
}

impl From<[f32; 2]> for TaggedValue {
    fn from(v: [f32; 2]) -> Self {
        TaggedValue::of(v)
    }
}

impl From<[f32; 3]> for TaggedValue {
    fn from(v: [f32; 3]) -> Self {
        TaggedValue::of(v)
    }
}

impl From<[f32; 4]> for TaggedValue {
    fn from(v: [f32; 4]) -> Self {
        TaggedValue::of(v)
    }
}

impl From<Color> for TaggedValue {
    fn from(v: Color) -> Self {
        TaggedValue::of(v)
    }
}

impl From<Color32> for TaggedValue {
    fn from(v: Color32) -> Self {
        TaggedValue::of(v)
    }
}

impl From<Quaternion> for TaggedValue {
    fn from(v: Quaternion) -> Self {
        TaggedValue::of(v)
    }
}

impl From<LayerMask> for TaggedValue {
    fn from(v: LayerMask) -> Self {
        TaggedValue::of(v)
    }
}

impl From<&str> for TaggedValue {
    fn from(v: &str) -> Self {
        TaggedValue::of(v.to_string())
    }
}

impl From<String> for TaggedValue {
    fn from(v: String) -> Self {
        TaggedValue::of(v)
    }
}

impl From<Vec<TaggedValue>> for TaggedValue {
    fn from(v: Vec<TaggedValue>) -> Self {
        TaggedValue::of(v)
    }
}

impl From<Handle> for TaggedValue {
    fn from(v: Handle) -> Self {
        TaggedValue::of(v)
    }
}

impl From<SceneRef> for TaggedValue {
    fn from(v: SceneRef) -> Self {
        TaggedValue::of(v)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_default() {
        let v = TaggedValue::default();
        assert!(v.is_null());
        assert_eq!(v.last_update_tick(), 0);
    }

    #[test]
    fn test_set_advances_tick() {
        let mut a = TaggedValue::null();
        let mut b = TaggedValue::null();

        a.set(1.0f32);
        let t1 = a.last_update_tick();
        b.set(2.0f32);
        let t2 = b.last_update_tick();
        a.set(3.0f32);
        let t3 = a.last_update_tick();

        // Strictly increasing across all values in the process
        assert!(t1 < t2);
        assert!(t2 < t3);
    }

    #[test]
    fn test_set_clears_other_slot() {
        let mut v = TaggedValue::of("hello".to_string());
        assert_eq!(v.tag(), ValueTag::String);

        v.set(5.0f32);
        assert_eq!(v.tag(), ValueTag::Float);
        assert_eq!(*v.object(), ObjectSlot::Empty);

        v.set("again".to_string());
        assert_eq!(*v.payload(), [0.0; 4]);
    }

    #[test]
    fn test_display_is_tag_driven() {
        assert_eq!(TaggedValue::of([1.0f32, 2.0, 3.0]).to_string(), "(1, 2, 3)");
        assert_eq!(TaggedValue::of(true).to_string(), "true");
        assert_eq!(TaggedValue::null().to_string(), "null");
        assert_eq!(TaggedValue::of("hi".to_string()).to_string(), "hi");

        let list = TaggedValue::of(vec![TaggedValue::of(1i32), TaggedValue::of(2i32)]);
        assert_eq!(list.to_string(), "[1, 2]");
    }

    #[test]
    fn test_equality_ignores_tick() {
        let a = TaggedValue::of(7i32);
        let b = TaggedValue::of(7i32);
        assert_ne!(a.last_update_tick(), b.last_update_tick());
        assert_eq!(a, b);

        assert_ne!(TaggedValue::of(7i32), TaggedValue::of(7.0f32));
    }

    #[test]
    fn test_layer_mask_equality_compares_bits() {
        // This bit pattern is a NaN when read as f32
        let a = TaggedValue::of(LayerMask(0x7FC0_0001));
        let b = TaggedValue::of(LayerMask(0x7FC0_0001));
        assert_eq!(a, b);
        assert_ne!(a, TaggedValue::of(LayerMask(0x7FC0_0002)));
    }

    #[test]
    fn test_serde_round_trip_drops_tick() {
        let v = TaggedValue::of(Color::new(0.5, 0.25, 0.0, 1.0));
        let json = serde_json::to_string(&v).unwrap();
        let back: TaggedValue = serde_json::from_str(&json).unwrap();

        assert_eq!(back, v);
        // Freshness is runtime-only state, never persisted
        assert_eq!(back.last_update_tick(), 0);
    }

    #[test]
    fn test_assign_copies_and_restamps() {
        let src = TaggedValue::of([4.0f32, 5.0]);
        let mut dst = TaggedValue::of(false);
        dst.assign(&src);

        assert_eq!(dst.tag(), ValueTag::Vector2);
        assert_eq!(dst, src);
        assert!(dst.last_update_tick() > src.last_update_tick());
    }
}
