// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Dynamic values and records bound by the codec engine.
//!
//! Decoded fields land in a [`Record`]: an ordered field map tied to its
//! schema. Records compare and hash structurally over the named field set,
//! so decode/encode round-trips and test assertions work on whole records.

use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use super::schema::Schema;
use super::{CodecError, CodecResult};

/// A single dynamic field value.
#[derive(Debug, Clone)]
pub enum Value {
    UInt(u64),
    Int(i64),
    Float(f64),
    Bytes(Vec<u8>),
    Str(String),
    Record(Record),
    List(Vec<Value>),
    /// Presence-vector representation: the set of optional field names
    /// selected by the vector.
    Names(BTreeSet<&'static str>),
    /// An optional field absent from its presence vector.
    Null,
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::UInt(a), Value::UInt(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            // Bit-exact comparison keeps records hashable and makes
            // round-trip equality well-defined.
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Record(a), Value::Record(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Names(a), Value::Names(b)) => a == b,
            (Value::Null, Value::Null) => true,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Value::UInt(v) => {
                0u8.hash(state);
                v.hash(state);
            }
            Value::Int(v) => {
                1u8.hash(state);
                v.hash(state);
            }
            Value::Float(v) => {
                2u8.hash(state);
                v.to_bits().hash(state);
            }
            Value::Bytes(v) => {
                3u8.hash(state);
                v.hash(state);
            }
            Value::Str(v) => {
                4u8.hash(state);
                v.hash(state);
            }
            Value::Record(v) => {
                5u8.hash(state);
                v.hash(state);
            }
            Value::List(v) => {
                6u8.hash(state);
                v.hash(state);
            }
            Value::Names(v) => {
                7u8.hash(state);
                v.hash(state);
            }
            Value::Null => 8u8.hash(state),
        }
    }
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_uint(&self) -> Option<u64> {
        match self {
            Value::UInt(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::UInt(v) => Some(*v as f64),
            Value::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_names(&self) -> Option<&BTreeSet<&'static str>> {
        match self {
            Value::Names(v) => Some(v),
            _ => None,
        }
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::UInt(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_owned())
    }
}

/// Ordered field map backing records, instantiation arguments, and the
/// engine's scratch bindings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FieldMap {
    entries: Vec<(&'static str, Value)>,
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Insert or overwrite a binding, preserving first-bound order.
    pub fn insert(&mut self, name: &'static str, value: Value) {
        if let Some(slot) = self.entries.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = value;
        } else {
            self.entries.push((name, value));
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Value)> {
        self.entries.iter().map(|(n, v)| (*n, v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(&'static str, Value)> for FieldMap {
    fn from_iter<T: IntoIterator<Item = (&'static str, Value)>>(iter: T) -> Self {
        let mut map = FieldMap::new();
        for (name, value) in iter {
            map.insert(name, value);
        }
        map
    }
}

/// A decoded or instantiated record: a schema plus its bound named fields.
#[derive(Clone)]
pub struct Record {
    schema: &'static Schema,
    fields: FieldMap,
}

impl Record {
    pub(crate) fn from_parts(schema: &'static Schema, fields: FieldMap) -> Self {
        Self { schema, fields }
    }

    pub fn schema(&self) -> &'static Schema {
        self.schema
    }

    pub fn schema_name(&self) -> &'static str {
        self.schema.name
    }

    pub fn fields(&self) -> &FieldMap {
        &self.fields
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    fn require(&self, name: &'static str) -> CodecResult<&Value> {
        self.fields
            .get(name)
            .ok_or(CodecError::MissingParameter { field: name })
    }

    pub fn uint(&self, name: &'static str) -> CodecResult<u64> {
        self.require(name)?
            .as_uint()
            .ok_or(CodecError::InvariantViolation {
                field: name,
                reason: "field is not an unsigned integer".into(),
            })
    }

    pub fn u8(&self, name: &'static str) -> CodecResult<u8> {
        Ok(self.uint(name)? as u8)
    }

    pub fn u16(&self, name: &'static str) -> CodecResult<u16> {
        Ok(self.uint(name)? as u16)
    }

    pub fn float(&self, name: &'static str) -> CodecResult<f64> {
        self.require(name)?
            .as_float()
            .ok_or(CodecError::InvariantViolation {
                field: name,
                reason: "field is not numeric".into(),
            })
    }

    pub fn bytes(&self, name: &'static str) -> CodecResult<&[u8]> {
        self.require(name)?
            .as_bytes()
            .ok_or(CodecError::InvariantViolation {
                field: name,
                reason: "field is not a byte string".into(),
            })
    }

    pub fn str_(&self, name: &'static str) -> CodecResult<&str> {
        self.require(name)?
            .as_str()
            .ok_or(CodecError::InvariantViolation {
                field: name,
                reason: "field is not a string".into(),
            })
    }

    pub fn record(&self, name: &'static str) -> CodecResult<&Record> {
        self.require(name)?
            .as_record()
            .ok_or(CodecError::InvariantViolation {
                field: name,
                reason: "field is not a nested record".into(),
            })
    }

    pub fn list(&self, name: &'static str) -> CodecResult<&[Value]> {
        self.require(name)?
            .as_list()
            .ok_or(CodecError::InvariantViolation {
                field: name,
                reason: "field is not a list".into(),
            })
    }

    /// Optional-field accessor: `Ok(None)` when the field is a null
    /// placeholder (absent from its presence vector).
    pub fn opt_float(&self, name: &'static str) -> CodecResult<Option<f64>> {
        match self.value(name) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => v.as_float().map(Some).ok_or(CodecError::InvariantViolation {
                field: name,
                reason: "field is not numeric".into(),
            }),
        }
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.schema.name == other.schema.name && self.fields == other.fields
    }
}

impl Eq for Record {}

impl Hash for Record {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.schema.name.hash(state);
        self.fields.hash(state);
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut dbg = f.debug_struct(self.schema.name);
        for (name, value) in self.fields.iter() {
            dbg.field(name, value);
        }
        dbg.finish()
    }
}

/// Lookup context the engine threads through one decode/encode/instantiate
/// pass. Freshly bound fields shadow the base map (the record being encoded,
/// or the caller's instantiation arguments).
pub struct Ctx<'a> {
    bound: FieldMap,
    base: Option<&'a FieldMap>,
}

impl<'a> Ctx<'a> {
    pub fn new() -> Self {
        Self {
            bound: FieldMap::new(),
            base: None,
        }
    }

    pub fn over(base: &'a FieldMap) -> Self {
        Self {
            bound: FieldMap::new(),
            base: Some(base),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bound.get(name).or_else(|| self.base.and_then(|b| b.get(name)))
    }

    pub fn bind(&mut self, name: &'static str, value: Value) {
        self.bound.insert(name, value);
    }

    pub fn uint(&self, name: &'static str) -> CodecResult<u64> {
        self.get(name)
            .and_then(Value::as_uint)
            .ok_or(CodecError::MissingParameter { field: name })
    }

    /// Length of a bytes/string/list field, if bound.
    pub fn len_of(&self, name: &str) -> Option<u64> {
        match self.get(name)? {
            Value::Bytes(b) => Some(b.len() as u64),
            Value::Str(s) => Some(s.len() as u64),
            Value::List(l) => Some(l.len() as u64),
            _ => None,
        }
    }
}

impl Default for Ctx<'_> {
    fn default() -> Self {
        Self::new()
    }
}
