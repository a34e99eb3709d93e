//! Core value and port types for the skein scripting runtime
//!
//! This crate is the leaf of the workspace: the tagged value representation
//! every channel and graph port trades in, the conversion table between tags
//! and native types, tag-pair arithmetic, and the port declaration
//! vocabulary. The runtime crate builds channels and graphs on top of it.

mod convert;
mod ops;
mod port;
mod value;

pub use convert::ScriptValue;
pub use port::{PortDef, PortDirection, PortType};
pub use value::{
    current_tick, next_tick, Color, Color32, Handle, HandleId, LayerMask, ObjectSlot, Quaternion,
    SceneRef, TaggedValue, ValueTag,
};
