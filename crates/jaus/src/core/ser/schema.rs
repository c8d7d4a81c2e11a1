// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Field descriptors and the schema engine.
//!
//! A [`Schema`] names a record type and supplies its descriptor run as a
//! plain function; the engine drives that run against a [`BitReader`] or
//! [`BitWriter`] for decode and encode, or against a caller argument map for
//! instantiation. Descriptors that depend on earlier fields (length prefixes,
//! presence bits, header-compression flags) read them back out of the pass
//! context instead of holding parser state.
//!
//! Variant schemas designate one field as the dispatch key: decode reads the
//! preamble, resolves the concrete schema for the key value, rewinds, and
//! re-decodes, so the key is consumed exactly once by the concrete schema
//! (whose key field defaults to its own discriminator).

use super::cursor::{BitReader, BitWriter, Endian};
use super::value::{Ctx, FieldMap, Record, Value};
use super::{CodecError, CodecResult};
use std::collections::BTreeSet;

/// Width and byte order of an integer field.
#[derive(Debug, Clone, Copy)]
pub struct IntSpec {
    pub bits: u16,
    pub endian: Endian,
}

impl IntSpec {
    pub const fn bits(bits: u16) -> Self {
        Self {
            bits,
            endian: Endian::Big,
        }
    }

    pub const fn u8() -> Self {
        Self {
            bits: 8,
            endian: Endian::Big,
        }
    }

    pub const fn u16_le() -> Self {
        Self {
            bits: 16,
            endian: Endian::Little,
        }
    }

    pub const fn u32_le() -> Self {
        Self {
            bits: 32,
            endian: Endian::Little,
        }
    }

    pub fn max(&self) -> u64 {
        if self.bits >= 64 {
            u64::MAX
        } else {
            (1u64 << self.bits) - 1
        }
    }
}

/// Length or count of a variable-size field.
pub enum Len {
    Fixed(usize),
    /// Read a previously bound integer field.
    Field(&'static str),
    /// Arbitrary expression over previously bound fields.
    Expr(Box<dyn Fn(&Ctx) -> CodecResult<u64> + Send + Sync>),
}

impl Len {
    fn eval(&self, ctx: &Ctx) -> CodecResult<u64> {
        match self {
            Len::Fixed(n) => Ok(*n as u64),
            Len::Field(name) => ctx.uint(*name),
            Len::Expr(f) => f(ctx),
        }
    }
}

type DefaultFn = Box<dyn Fn(&Ctx) -> Option<Value> + Send + Sync>;

/// Fallback value for a field absent from the source map.
pub enum DefaultSpec {
    None,
    Value(Value),
    /// Derived from earlier fields - the Query mechanism.
    Expr(DefaultFn),
}

/// The wire behavior of one field.
pub enum Codec {
    UInt(IntSpec),
    Int(IntSpec),
    /// Raw bit field, LSB-first.
    Bits(u16),
    Bytes(Len),
    Str(Len),
    /// Integer constrained to an enumeration's value set.
    Enum {
        spec: IntSpec,
        check: fn(u64) -> bool,
    },
    /// Fixed-point real over `[lower, upper]`, round-half-away-from-zero.
    ScaledFloat {
        spec: IntSpec,
        lower: f64,
        upper: f64,
    },
    /// Nested record.
    Record(&'static Schema),
    /// Fixed-count repetition of a record.
    Repeat {
        schema: &'static Schema,
        count: Len,
    },
    /// Repeat until the stream is exhausted.
    Consume(&'static Schema),
    /// Bitfield selecting which of `fields` are encoded; bit `i` (LSB-first)
    /// gates `fields[i]`. Represented as the set of selected names.
    PresenceVector {
        bits: u16,
        fields: Vec<&'static str>,
    },
    /// A field present only when named by an earlier presence vector;
    /// otherwise bound as a null placeholder.
    Optional {
        vector: &'static str,
        inner: Box<Field>,
    },
    /// A field present only when the condition over earlier fields holds.
    When {
        cond: fn(&Ctx) -> bool,
        inner: Box<Field>,
    },
    /// A constant that occupies no wire space but binds into the record.
    Computed(Value),
}

/// One descriptor in a schema's run.
pub struct Field {
    pub name: Option<&'static str>,
    pub codec: Codec,
    pub default: DefaultSpec,
    /// Bound in the pass context (so later lengths can read it) but excluded
    /// from the record and never taken from instantiation arguments.
    pub hidden: bool,
    /// Decoded or supplied values must equal the default (reserved fields,
    /// variant discriminators).
    pub pinned: bool,
}

impl Field {
    pub fn new(name: Option<&'static str>, codec: Codec) -> Self {
        Self {
            name,
            codec,
            default: DefaultSpec::None,
            hidden: false,
            pinned: false,
        }
    }

    pub fn uint(name: &'static str, spec: IntSpec) -> Self {
        Self::new(Some(name), Codec::UInt(spec))
    }

    pub fn u8(name: &'static str) -> Self {
        Self::uint(name, IntSpec::u8())
    }

    pub fn u16_le(name: &'static str) -> Self {
        Self::uint(name, IntSpec::u16_le())
    }

    pub fn enum_(name: &'static str, spec: IntSpec, check: fn(u64) -> bool) -> Self {
        Self::new(Some(name), Codec::Enum { spec, check })
    }

    pub fn bytes(name: &'static str, len: Len) -> Self {
        Self::new(Some(name), Codec::Bytes(len))
    }

    pub fn string(name: &'static str, len: Len) -> Self {
        Self::new(Some(name), Codec::Str(len))
    }

    pub fn scaled_float(name: &'static str, spec: IntSpec, lower: f64, upper: f64) -> Self {
        Self::new(Some(name), Codec::ScaledFloat { spec, lower, upper })
    }

    pub fn record(name: &'static str, schema: &'static Schema) -> Self {
        Self::new(Some(name), Codec::Record(schema))
    }

    pub fn repeat(name: &'static str, schema: &'static Schema, count: Len) -> Self {
        Self::new(Some(name), Codec::Repeat { schema, count })
    }

    pub fn consume(name: &'static str, schema: &'static Schema) -> Self {
        Self::new(Some(name), Codec::Consume(schema))
    }

    pub fn presence_vector(name: &'static str, bits: u16, fields: Vec<&'static str>) -> Self {
        Self::new(Some(name), Codec::PresenceVector { bits, fields })
    }

    pub fn optional(vector: &'static str, inner: Field) -> Self {
        let name = inner.name;
        Self::new(
            name,
            Codec::Optional {
                vector,
                inner: Box::new(inner),
            },
        )
    }

    pub fn when(cond: fn(&Ctx) -> bool, inner: Field) -> Self {
        let name = inner.name;
        Self::new(
            name,
            Codec::When {
                cond,
                inner: Box::new(inner),
            },
        )
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = DefaultSpec::Value(value);
        self
    }

    pub fn default_expr(
        mut self,
        f: impl Fn(&Ctx) -> Option<Value> + Send + Sync + 'static,
    ) -> Self {
        self.default = DefaultSpec::Expr(Box::new(f));
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn pinned(mut self) -> Self {
        self.pinned = true;
        self
    }
}

/// Dispatch table of a variant schema.
pub struct VariantDispatch {
    pub key: &'static str,
    pub resolve: fn(u64) -> Option<&'static Schema>,
}

/// A record type: name, descriptor run, and optional variant dispatch.
pub struct Schema {
    pub name: &'static str,
    pub fields: fn() -> Vec<Field>,
    pub variant: Option<VariantDispatch>,
}

impl Schema {
    pub fn decode(&'static self, bytes: &[u8]) -> CodecResult<Record> {
        let mut reader = BitReader::new(bytes);
        decode_from(self, &mut reader)
    }

    pub fn instantiate(&'static self, args: FieldMap) -> CodecResult<Record> {
        instantiate(self, args)
    }
}

// ===== Decode =====

pub fn decode(schema: &'static Schema, bytes: &[u8]) -> CodecResult<Record> {
    schema.decode(bytes)
}

pub fn decode_from(schema: &'static Schema, reader: &mut BitReader<'_>) -> CodecResult<Record> {
    if let Some(variant) = &schema.variant {
        let start = reader.bit_pos();
        let mut ctx = Ctx::new();
        let mut scratch = FieldMap::new();
        for field in (schema.fields)() {
            decode_field(&field, reader, &mut ctx, &mut scratch)?;
        }
        let key = ctx.uint(variant.key)?;
        let concrete = (variant.resolve)(key).ok_or(CodecError::UnknownVariant {
            schema: schema.name,
            key,
        })?;
        reader.seek(start);
        return decode_from(concrete, reader);
    }

    let mut ctx = Ctx::new();
    let mut out = FieldMap::new();
    for field in (schema.fields)() {
        decode_field(&field, reader, &mut ctx, &mut out)?;
    }
    Ok(Record::from_parts(schema, out))
}

fn decode_field(
    field: &Field,
    reader: &mut BitReader<'_>,
    ctx: &mut Ctx<'_>,
    out: &mut FieldMap,
) -> CodecResult<()> {
    let label = field.name.unwrap_or("<anon>");
    let value = match &field.codec {
        Codec::UInt(spec) => Value::UInt(reader.read_uint(spec.bits, spec.endian, label)?),
        Codec::Int(spec) => {
            let raw = reader.read_uint(spec.bits, spec.endian, label)?;
            Value::Int(sign_extend(raw, spec.bits))
        }
        Codec::Bits(bits) => Value::UInt(reader.read_bits(*bits, label)?),
        Codec::Bytes(len) => {
            let n = len.eval(ctx)? as usize;
            Value::Bytes(reader.read_bytes(n, label)?.to_vec())
        }
        Codec::Str(len) => {
            let n = len.eval(ctx)? as usize;
            let bytes = reader.read_bytes(n, label)?;
            let s = std::str::from_utf8(bytes).map_err(|_| CodecError::InvariantViolation {
                field: field.name.unwrap_or("<anon>"),
                reason: "string field is not valid UTF-8".into(),
            })?;
            Value::Str(s.to_owned())
        }
        Codec::Enum { spec, check } => {
            let raw = reader.read_uint(spec.bits, spec.endian, label)?;
            if !check(raw) {
                return Err(CodecError::InvalidEnumValue {
                    field: field.name.unwrap_or("<anon>"),
                    value: raw,
                });
            }
            Value::UInt(raw)
        }
        Codec::ScaledFloat { spec, lower, upper } => {
            let raw = reader.read_uint(spec.bits, spec.endian, label)?;
            let ratio = raw as f64 / spec.max() as f64;
            Value::Float(lower + ratio * (upper - lower))
        }
        Codec::Record(schema) => Value::Record(decode_from(schema, reader)?),
        Codec::Repeat { schema, count } => {
            let n = count.eval(ctx)? as usize;
            let mut items = Vec::with_capacity(n);
            for _ in 0..n {
                items.push(Value::Record(decode_from(schema, reader)?));
            }
            Value::List(items)
        }
        Codec::Consume(schema) => {
            let mut items = Vec::new();
            while !reader.is_empty() {
                items.push(Value::Record(decode_from(schema, reader)?));
            }
            Value::List(items)
        }
        Codec::PresenceVector { bits, fields } => {
            let mask = reader.read_uint(*bits, Endian::Little, label)?;
            Value::Names(names_from_mask(mask, fields))
        }
        Codec::Optional { vector, inner } => {
            let present = ctx
                .get(vector)
                .and_then(Value::as_names)
                .map(|names| inner.name.map(|n| names.contains(n)).unwrap_or(false))
                .ok_or(CodecError::InvariantViolation {
                    field: field.name.unwrap_or("<anon>"),
                    reason: "optional field precedes its presence vector".into(),
                })?;
            if present {
                return decode_field(inner, reader, ctx, out);
            }
            Value::Null
        }
        Codec::When { cond, inner } => {
            if cond(ctx) {
                return decode_field(inner, reader, ctx, out);
            }
            return Ok(());
        }
        Codec::Computed(value) => value.clone(),
    };

    if field.pinned {
        if let DefaultSpec::Value(expected) = &field.default {
            if &value != expected {
                return Err(CodecError::InvariantViolation {
                    field: field.name.unwrap_or("<anon>"),
                    reason: format!("expected {:?}, decoded {:?}", expected, value),
                });
            }
        }
    }

    if let Some(name) = field.name {
        ctx.bind(name, value.clone());
        if !field.hidden {
            out.insert(name, value);
        }
    }
    Ok(())
}

// ===== Encode =====

pub fn encode(record: &Record) -> CodecResult<Vec<u8>> {
    let mut writer = BitWriter::new();
    encode_into(record, &mut writer)?;
    writer.into_bytes()
}

pub fn encode_into(record: &Record, writer: &mut BitWriter) -> CodecResult<()> {
    let mut ctx = Ctx::over(record.fields());
    for field in (record.schema().fields)() {
        encode_field(&field, writer, &mut ctx)?;
    }
    Ok(())
}

fn encode_field(field: &Field, writer: &mut BitWriter, ctx: &mut Ctx<'_>) -> CodecResult<()> {
    match &field.codec {
        Codec::Optional { vector, inner } => {
            let present = ctx
                .get(vector)
                .and_then(Value::as_names)
                .map(|names| inner.name.map(|n| names.contains(n)).unwrap_or(false))
                .ok_or(CodecError::InvariantViolation {
                    field: field.name.unwrap_or("<anon>"),
                    reason: "optional field precedes its presence vector".into(),
                })?;
            if present {
                return encode_field(inner, writer, ctx);
            }
            return Ok(());
        }
        Codec::When { cond, inner } => {
            if cond(ctx) {
                return encode_field(inner, writer, ctx);
            }
            return Ok(());
        }
        Codec::Computed(expected) => {
            if let Some(name) = field.name {
                if let Some(found) = ctx.get(name) {
                    if found != expected {
                        return Err(CodecError::InvariantViolation {
                            field: name,
                            reason: "computed field does not match its constant".into(),
                        });
                    }
                }
            }
            return Ok(());
        }
        _ => {}
    }

    let value = resolve_source_value(field, ctx)?;
    if let Some(name) = field.name {
        ctx.bind(name, value.clone());
    }
    write_value(field, &value, writer, ctx)
}

/// Fetch the field's value from the record (or caller bindings), falling back
/// to the default when absent or null.
fn resolve_source_value(field: &Field, ctx: &Ctx<'_>) -> CodecResult<Value> {
    let mut value = field.name.and_then(|n| ctx.get(n).cloned());
    if matches!(value, None | Some(Value::Null)) {
        if let Some(fallback) = default_value(field, ctx)? {
            value = Some(fallback);
        }
    }
    match value {
        Some(v) => normalize(v, &field.codec),
        None => Err(match field.name {
            Some(name) => CodecError::MissingParameter { field: name },
            None => CodecError::NoDefaultForAnonymous { schema: "<anon>" },
        }),
    }
}

fn write_value(
    field: &Field,
    value: &Value,
    writer: &mut BitWriter,
    ctx: &Ctx<'_>,
) -> CodecResult<()> {
    let label = field.name.unwrap_or("<anon>");
    match &field.codec {
        Codec::UInt(spec) | Codec::Enum { spec, .. } => {
            let raw = value.as_uint().ok_or(type_error(label))?;
            writer.write_uint(raw, spec.bits, spec.endian);
        }
        Codec::Int(spec) => {
            let raw = match value {
                Value::Int(v) => *v as u64,
                Value::UInt(v) => *v,
                _ => return Err(type_error(label)),
            };
            writer.write_uint(raw & mask_for(spec.bits), spec.bits, spec.endian);
        }
        Codec::Bits(bits) => {
            let raw = value.as_uint().ok_or(type_error(label))?;
            writer.write_bits(raw, *bits);
        }
        Codec::Bytes(len) => {
            let bytes = value.as_bytes().ok_or(type_error(label))?;
            check_len(label, bytes.len(), len, ctx)?;
            writer.write_bytes(bytes, label)?;
        }
        Codec::Str(len) => {
            let s = value.as_str().ok_or(type_error(label))?;
            check_len(label, s.len(), len, ctx)?;
            writer.write_bytes(s.as_bytes(), label)?;
        }
        Codec::ScaledFloat { spec, lower, upper } => {
            let v = value.as_float().ok_or(type_error(label))?;
            let max = spec.max() as f64;
            let scaled = ((v - lower) / (upper - lower) * max).round();
            let raw = scaled.clamp(0.0, max) as u64;
            writer.write_uint(raw, spec.bits, spec.endian);
        }
        Codec::Record(_) => {
            let rec = value.as_record().ok_or(type_error(label))?;
            encode_into(rec, writer)?;
        }
        Codec::Repeat { .. } | Codec::Consume(_) => {
            let items = value.as_list().ok_or(type_error(label))?;
            for item in items {
                let rec = item.as_record().ok_or(type_error(label))?;
                encode_into(rec, writer)?;
            }
        }
        Codec::PresenceVector { bits, fields } => {
            let names = value.as_names().ok_or(type_error(label))?;
            let mut mask = 0u64;
            for (i, name) in fields.iter().enumerate() {
                if names.contains(name) {
                    mask |= 1 << i;
                }
            }
            writer.write_uint(mask, *bits, Endian::Little);
        }
        Codec::Optional { .. } | Codec::When { .. } | Codec::Computed(_) => {
            unreachable!("handled before value resolution")
        }
    }
    Ok(())
}

// ===== Instantiate =====

pub fn instantiate(schema: &'static Schema, args: FieldMap) -> CodecResult<Record> {
    if let Some(variant) = &schema.variant {
        let key = args
            .get(variant.key)
            .and_then(Value::as_uint)
            .ok_or(CodecError::MissingParameter { field: variant.key })?;
        let concrete = (variant.resolve)(key).ok_or(CodecError::UnknownVariant {
            schema: schema.name,
            key,
        })?;
        return instantiate(concrete, args);
    }

    let mut ctx = Ctx::over(&args);
    let mut out = FieldMap::new();
    let mut used: BTreeSet<&'static str> = BTreeSet::new();
    for field in (schema.fields)() {
        instantiate_field(schema, &field, &args, &mut ctx, &mut out, &mut used)?;
    }
    for (name, _) in args.iter() {
        if !used.contains(name) {
            return Err(CodecError::UnusedParameter { field: name.into() });
        }
    }
    drop(ctx);
    Ok(Record::from_parts(schema, out))
}

fn instantiate_field(
    schema: &'static Schema,
    field: &Field,
    args: &FieldMap,
    ctx: &mut Ctx<'_>,
    out: &mut FieldMap,
    used: &mut BTreeSet<&'static str>,
) -> CodecResult<()> {
    match &field.codec {
        Codec::When { cond, inner } => {
            if cond(ctx) {
                return instantiate_field(schema, inner, args, ctx, out, used);
            }
            return Ok(());
        }
        Codec::Optional { vector, inner } => {
            let present = ctx
                .get(vector)
                .and_then(Value::as_names)
                .map(|names| inner.name.map(|n| names.contains(n)).unwrap_or(false))
                .ok_or(CodecError::InvariantViolation {
                    field: field.name.unwrap_or("<anon>"),
                    reason: "optional field precedes its presence vector".into(),
                })?;
            if present {
                return instantiate_field(schema, inner, args, ctx, out, used);
            }
            if let Some(name) = inner.name {
                used.insert(name);
                ctx.bind(name, Value::Null);
                out.insert(name, Value::Null);
            }
            return Ok(());
        }
        Codec::Computed(expected) => {
            if let Some(name) = field.name {
                if let Some(arg) = args.get(name) {
                    used.insert(name);
                    if arg != expected {
                        return Err(CodecError::InvariantViolation {
                            field: name,
                            reason: "computed field does not match its constant".into(),
                        });
                    }
                }
                ctx.bind(name, expected.clone());
                if !field.hidden {
                    out.insert(name, expected.clone());
                }
            }
            return Ok(());
        }
        _ => {}
    }

    let supplied = if field.hidden {
        None
    } else {
        field.name.and_then(|n| args.get(n))
    };
    let value = match supplied {
        Some(arg) => {
            let name = field.name.expect("supplied implies named");
            used.insert(name);
            if field.pinned {
                if let DefaultSpec::Value(expected) = &field.default {
                    let normalized = normalize(arg.clone(), &field.codec)?;
                    let expected = normalize(expected.clone(), &field.codec)?;
                    if normalized != expected {
                        return Err(CodecError::InvariantViolation {
                            field: name,
                            reason: "argument conflicts with the field's fixed value".into(),
                        });
                    }
                    normalized
                } else {
                    normalize(arg.clone(), &field.codec)?
                }
            } else {
                normalize(arg.clone(), &field.codec)?
            }
        }
        None => match default_value(field, ctx)? {
            Some(fallback) => normalize(fallback, &field.codec)?,
            None => {
                return Err(match field.name {
                    Some(name) => CodecError::MissingParameter { field: name },
                    None => CodecError::NoDefaultForAnonymous {
                        schema: schema.name,
                    },
                })
            }
        },
    };

    if let Some(name) = field.name {
        ctx.bind(name, value.clone());
        if !field.hidden {
            out.insert(name, value);
        }
    }
    Ok(())
}

// ===== Shared helpers =====

fn default_value(field: &Field, ctx: &Ctx<'_>) -> CodecResult<Option<Value>> {
    match &field.default {
        DefaultSpec::Value(v) => Ok(Some(v.clone())),
        DefaultSpec::Expr(f) => Ok(f(ctx)),
        DefaultSpec::None => {
            // A presence vector with no explicit value derives itself from
            // which of its optional fields are supplied and non-null.
            if let Codec::PresenceVector { fields, .. } = &field.codec {
                let mut names = BTreeSet::new();
                for name in fields {
                    if let Some(v) = ctx.get(name) {
                        if !v.is_null() {
                            names.insert(*name);
                        }
                    }
                }
                return Ok(Some(Value::Names(names)));
            }
            Ok(None)
        }
    }
}

/// Coerce caller-supplied representations to the codec's canonical `Value`.
fn normalize(value: Value, codec: &Codec) -> CodecResult<Value> {
    match codec {
        Codec::PresenceVector { fields, .. } => match value {
            Value::UInt(mask) => Ok(Value::Names(names_from_mask(mask, fields))),
            v @ Value::Names(_) => Ok(v),
            _ => Err(CodecError::InvariantViolation {
                field: "presence_vector",
                reason: "expected a bitmask or a name set".into(),
            }),
        },
        Codec::ScaledFloat { .. } => match value {
            Value::UInt(v) => Ok(Value::Float(v as f64)),
            Value::Int(v) => Ok(Value::Float(v as f64)),
            v => Ok(v),
        },
        _ => Ok(value),
    }
}

fn names_from_mask(mask: u64, fields: &[&'static str]) -> BTreeSet<&'static str> {
    fields
        .iter()
        .enumerate()
        .filter(|(i, _)| mask & (1 << i) != 0)
        .map(|(_, name)| *name)
        .collect()
}

fn check_len(label: &'static str, actual: usize, len: &Len, ctx: &Ctx<'_>) -> CodecResult<()> {
    let expected = len.eval(ctx)? as usize;
    if actual != expected {
        return Err(CodecError::InvariantViolation {
            field: label,
            reason: format!("length {} does not match declared {}", actual, expected),
        });
    }
    Ok(())
}

fn sign_extend(raw: u64, bits: u16) -> i64 {
    if bits >= 64 {
        return raw as i64;
    }
    let shift = 64 - bits as u32;
    ((raw << shift) as i64) >> shift
}

fn mask_for(bits: u16) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

fn type_error(field: &'static str) -> CodecError {
    CodecError::InvariantViolation {
        field,
        reason: "value does not match the field codec".into(),
    }
}
