// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Record schemas for every message in the catalog, one module per service
//! area, plus the compound descriptor generators they share.

pub mod access_control;
pub mod discovery;
pub mod events;
pub mod list_manager;
pub mod liveness;
pub mod management;
pub mod mobility;

use crate::core::ser::{Field, IntSpec, Len, Schema, Value};

/// Length-prefixed byte string: a named count field (kept in the record, its
/// default derived from the byte string's length) followed by the bytes.
pub(crate) fn counted_bytes(
    out: &mut Vec<Field>,
    name: &'static str,
    count_name: &'static str,
    spec: IntSpec,
) {
    out.push(
        Field::uint(count_name, spec)
            .default_expr(move |ctx| ctx.len_of(name).map(Value::UInt)),
    );
    out.push(Field::bytes(name, Len::Field(count_name)));
}

/// Length-prefixed string; the count is engine-internal and never lands in
/// the record.
pub(crate) fn counted_string(
    out: &mut Vec<Field>,
    name: &'static str,
    count_name: &'static str,
    spec: IntSpec,
) {
    out.push(
        Field::uint(count_name, spec)
            .hidden()
            .default_expr(move |ctx| ctx.len_of(name).map(Value::UInt)),
    );
    out.push(Field::string(name, Len::Field(count_name)));
}

/// Length-prefixed record list; the count is engine-internal.
pub(crate) fn counted_list(
    out: &mut Vec<Field>,
    name: &'static str,
    count_name: &'static str,
    spec: IntSpec,
    schema: &'static Schema,
) {
    out.push(
        Field::uint(count_name, spec)
            .hidden()
            .default_expr(move |ctx| ctx.len_of(name).map(Value::UInt)),
    );
    out.push(Field::repeat(name, schema, Len::Field(count_name)));
}

/// Presence-vector region: the vector itself (derived from which optional
/// fields are supplied when not given explicitly), the required fields, then
/// each optional field gated by its bit.
pub(crate) fn with_presence_vector(
    out: &mut Vec<Field>,
    bits: u16,
    required: Vec<Field>,
    optional: Vec<Field>,
) {
    let names: Vec<&'static str> = optional
        .iter()
        .filter_map(|f| f.name)
        .collect();
    out.push(Field::presence_vector("presence_vector", bits, names));
    for field in required {
        out.push(field);
    }
    for field in optional {
        out.push(Field::optional("presence_vector", field));
    }
}
