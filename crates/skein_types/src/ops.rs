//! Tag-pair arithmetic for tagged values
//!
//! Operators are defined only for the enumerated tag pairs below; every other
//! pairing produces a Null-tagged result rather than panicking, so a
//! misconfigured graph degrades to "nothing happened".

use std::ops::{Add, Div, Mul, Sub};

use crate::value::{Color, TaggedValue, ValueTag};

#[derive(Clone, Copy, PartialEq)]
enum Op {
    Add,
    Sub,
    Mul,
    Div,
}

impl Op {
    fn scalar(self, a: f32, b: f32) -> f32 {
        match self {
            Op::Add => a + b,
            Op::Sub => a - b,
            Op::Mul => a * b,
            Op::Div => a / b,
        }
    }
}

fn vector_len(tag: ValueTag) -> Option<usize> {
    match tag {
        ValueTag::Vector2 => Some(2),
        ValueTag::Vector3 => Some(3),
        ValueTag::Vector4 => Some(4),
        _ => None,
    }
}

fn vector_of(len: usize, p: [f32; 4]) -> TaggedValue {
    match len {
        2 => TaggedValue::of([p[0], p[1]]),
        3 => TaggedValue::of([p[0], p[1], p[2]]),
        _ => TaggedValue::of(p),
    }
}

fn apply(lhs: &TaggedValue, rhs: &TaggedValue, op: Op) -> TaggedValue {
    // Union operands participate as their inner value
    let a = lhs.get::<TaggedValue>();
    let b = rhs.get::<TaggedValue>();

    match (a.tag(), b.tag()) {
        // Integer arithmetic stays integral; overflow and division by zero
        // are undefined, not panics
        (ValueTag::Int, ValueTag::Int) => {
            let (x, y) = (a.get::<i32>(), b.get::<i32>());
            let result = match op {
                Op::Add => x.checked_add(y),
                Op::Sub => x.checked_sub(y),
                Op::Mul => x.checked_mul(y),
                Op::Div => x.checked_div(y),
            };
            match result {
                Some(r) => TaggedValue::of(r),
                None => TaggedValue::null(),
            }
        }

        // Mixed numeric widens to Float
        (ValueTag::Int | ValueTag::Float, ValueTag::Int | ValueTag::Float) => {
            TaggedValue::of(op.scalar(a.get::<f32>(), b.get::<f32>()))
        }

        // Same-arity vectors combine componentwise
        (ta, tb) if vector_len(ta).is_some() && vector_len(ta) == vector_len(tb) => {
            let len = vector_len(ta).unwrap_or(4);
            let (x, y) = (a.get::<[f32; 4]>(), b.get::<[f32; 4]>());
            let mut out = [0.0; 4];
            for i in 0..len {
                out[i] = op.scalar(x[i], y[i]);
            }
            vector_of(len, out)
        }

        // Vector scaled by a scalar
        (ta, ValueTag::Float | ValueTag::Int)
            if vector_len(ta).is_some() && matches!(op, Op::Mul | Op::Div) =>
        {
            let len = vector_len(ta).unwrap_or(4);
            let x = a.get::<[f32; 4]>();
            let s = b.get::<f32>();
            let mut out = [0.0; 4];
            for i in 0..len {
                out[i] = op.scalar(x[i], s);
            }
            vector_of(len, out)
        }
        (ValueTag::Float | ValueTag::Int, tb) if vector_len(tb).is_some() && op == Op::Mul => {
            let len = vector_len(tb).unwrap_or(4);
            let y = b.get::<[f32; 4]>();
            let s = a.get::<f32>();
            let mut out = [0.0; 4];
            for i in 0..len {
                out[i] = s * y[i];
            }
            vector_of(len, out)
        }

        // A Vector3 shifts a color's RGB channels; alpha is untouched
        (ValueTag::Color, ValueTag::Vector3) if matches!(op, Op::Add | Op::Sub) => {
            let c = a.get::<Color>();
            let d = b.get::<[f32; 3]>();
            TaggedValue::of(Color::new(
                op.scalar(c.r, d[0]).clamp(0.0, 1.0),
                op.scalar(c.g, d[1]).clamp(0.0, 1.0),
                op.scalar(c.b, d[2]).clamp(0.0, 1.0),
                c.a,
            ))
        }

        (ValueTag::Color, ValueTag::Color) if matches!(op, Op::Add | Op::Sub) => {
            let (x, y) = (a.get::<Color>(), b.get::<Color>());
            TaggedValue::of(Color::new(
                op.scalar(x.r, y.r).clamp(0.0, 1.0),
                op.scalar(x.g, y.g).clamp(0.0, 1.0),
                op.scalar(x.b, y.b).clamp(0.0, 1.0),
                op.scalar(x.a, y.a).clamp(0.0, 1.0),
            ))
        }

        // A string swallows anything appended to it
        (ValueTag::String, _) if op == Op::Add => {
            TaggedValue::of(format!("{a}{b}"))
        }

        // A list appends the right operand as one item
        (ValueTag::List, _) if op == Op::Add => {
            let mut items = a.get::<Vec<TaggedValue>>();
            items.push(b);
            TaggedValue::of(items)
        }

        _ => TaggedValue::null(),
    }
}

macro_rules! impl_value_op {
    ($trait:ident, $method:ident, $op:expr) => {
        impl $trait for &TaggedValue {
            type Output = TaggedValue;
            fn $method(self, rhs: &TaggedValue) -> TaggedValue {
                apply(self, rhs, $op)
            }
        }

        impl $trait for TaggedValue {
            type Output = TaggedValue;
            fn $method(self, rhs: TaggedValue) -> TaggedValue {
                apply(&self, &rhs, $op)
            }
        }
    };
}

impl_value_op!(Add, add, Op::Add);
impl_value_op!(Sub, sub, Op::Sub);
impl_value_op!(Mul, mul, Op::Mul);
impl_value_op!(Div, div, Op::Div);

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
