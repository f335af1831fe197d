//! # Value Type System
//!
//! The untyped sum type records are built from, and the insertion-ordered
//! record map itself. Grounded on the teacher's `value/mod.rs` (an untyped,
//! `Serialize`-able value enum feeding a typed store) but simplified to the
//! sum spec.md names: `{null, boolean, integer, number, string, ordered
//! sequence, record, reference handle}`.
//!
//! Cross-references are handles (collection name + index), not owning
//! pointers (§9) — serialization follows the handle to embed the pointed-to
//! record, matching "serialization follows the handles to embed values".

use indexmap::IndexMap;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::fmt;

/// An insertion-ordered mapping from field name to value.
pub type Record = IndexMap<String, Value>;

/// A pointer to another record, resolved by the dataset map on read.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordHandle {
    pub collection: String,
    pub index: usize,
}

/// The untyped value every field ultimately produces.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Number(f64),
    Str(String),
    Seq(Vec<Value>),
    Record(Record),
    Ref(RecordHandle),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Number(n) => Some(*n as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<&[Value]> {
        match self {
            Value::Seq(s) => Some(s),
            _ => None,
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Number(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Seq(s) => !s.is_empty(),
            Value::Record(_) | Value::Ref(_) => true,
        }
    }

    /// Structural equality for `==`/`match`, independent of `PartialEq`'s
    /// float handling so `NaN`-free comparisons behave as users expect.
    pub fn structural_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Int(a), Value::Number(b)) | (Value::Number(b), Value::Int(a)) => {
                *a as f64 == *b
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Seq(a), Value::Seq(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.structural_eq(y))
            }
            (Value::Ref(a), Value::Ref(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Seq(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Record(_) => write!(f, "<record>"),
            Value::Ref(h) => write!(f, "<ref {}[{}]>", h.collection, h.index),
        }
    }
}

/// A resolver that lets serialization follow reference handles to embed the
/// target record, as described in §9's "Cyclic graphs" design note.
pub trait HandleResolver {
    fn resolve(&self, handle: &RecordHandle) -> Option<&Record>;
}

/// A `Value` paired with the resolver used to expand `Ref` handles when
/// serialized to JSON/etc.
pub struct ResolvingValue<'a, R: HandleResolver> {
    pub value: &'a Value,
    pub resolver: &'a R,
}

impl<'a, R: HandleResolver> Serialize for ResolvingValue<'a, R> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serialize_value(self.value, self.resolver, serializer)
    }
}

pub(crate) fn serialize_value<S, R>(value: &Value, resolver: &R, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    R: HandleResolver,
{
    match value {
        Value::Null => serializer.serialize_none(),
        Value::Bool(b) => serializer.serialize_bool(*b),
        Value::Int(i) => serializer.serialize_i64(*i),
        Value::Number(n) => serializer.serialize_f64(*n),
        Value::Str(s) => serializer.serialize_str(s),
        Value::Seq(items) => {
            use serde::ser::SerializeSeq;
            let mut seq = serializer.serialize_seq(Some(items.len()))?;
            for item in items {
                seq.serialize_element(&ResolvingValue {
                    value: item,
                    resolver,
                })?;
            }
            seq.end()
        }
        Value::Record(record) => {
            let mut map = serializer.serialize_map(Some(record.len()))?;
            for (k, v) in record {
                map.serialize_entry(
                    k,
                    &ResolvingValue {
                        value: v,
                        resolver,
                    },
                )?;
            }
            map.end()
        }
        Value::Ref(handle) => match resolver.resolve(handle) {
            Some(record) => {
                let mut map = serializer.serialize_map(Some(record.len()))?;
                for (k, v) in record {
                    map.serialize_entry(
                        k,
                        &ResolvingValue {
                            value: v,
                            resolver,
                        },
                    )?;
                }
                map.end()
            }
            None => serializer.serialize_none(),
        },
    }
}

/// A value that never contains unresolved handles (plain records, literals)
/// can be serialized directly without a resolver.
impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        struct NullResolver;
        impl HandleResolver for NullResolver {
            fn resolve(&self, _handle: &RecordHandle) -> Option<&Record> {
                None
            }
        }
        serialize_value(self, &NullResolver, serializer)
    }
}

/// A hashable projection of `Value` used by the unique-value pool, where
/// floats are compared by bit pattern rather than structurally. `Value::Null`
/// has no projection: the uniqueness invariant is scoped to non-null emitted
/// values, so null is never tracked as "used" and never counts as a
/// collision, matching how `Record`/`Ref` already opt out below.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueKey {
    Bool(bool),
    Int(i64),
    Bits(u64),
    Str(String),
    Seq(Vec<ValueKey>),
}

impl ValueKey {
    pub fn from_value(value: &Value) -> Option<ValueKey> {
        match value {
            Value::Null => None,
            Value::Bool(b) => Some(ValueKey::Bool(*b)),
            Value::Int(i) => Some(ValueKey::Int(*i)),
            Value::Number(n) => Some(ValueKey::Bits(n.to_bits())),
            Value::Str(s) => Some(ValueKey::Str(s.clone())),
            Value::Seq(items) => items
                .iter()
                .map(ValueKey::from_value)
                .collect::<Option<Vec<_>>>()
                .map(ValueKey::Seq),
            Value::Record(_) | Value::Ref(_) => None,
        }
    }
}
