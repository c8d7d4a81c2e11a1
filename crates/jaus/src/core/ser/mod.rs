// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Declarative bit-level serialization for JAUS-shaped records.
//!
//! Record types expose a schema - an ordered run of field descriptors - and
//! the engine drives those descriptors against a bit stream for decode,
//! encode, and keyword instantiation. See [`schema`] for the descriptor
//! model and [`cursor`] for the underlying LSB-first bit cursors.

pub mod cursor;
pub mod schema;
pub mod value;

pub use cursor::{BitReader, BitWriter, Endian};
pub use schema::{
    decode, decode_from, encode, instantiate, Codec, Field, IntSpec, Len, Schema, VariantDispatch,
};
pub use value::{Ctx, FieldMap, Record, Value};

use std::fmt;

/// Codec error taxonomy.
///
/// Decode failures (`TruncatedInput` through `InvariantViolation`) cause the
/// containing packet or message to be logged and dropped; instantiation
/// failures (`MissingParameter` through `NoDefaultForAnonymous`) are
/// programming errors surfaced to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The stream ended before the descriptor's bits could be read.
    TruncatedInput { field: &'static str, offset: usize },
    /// An integer on the wire is not a member of the field's enumeration.
    InvalidEnumValue { field: &'static str, value: u64 },
    /// A variant key resolved to no registered subclass schema.
    UnknownVariant { schema: &'static str, key: u64 },
    /// The transport version prefix was not the supported version.
    UnsupportedVersion { found: u8 },
    /// A reserved or computed field did not hold its mandated value.
    InvariantViolation { field: &'static str, reason: String },
    /// A required field was not supplied on instantiation.
    MissingParameter { field: &'static str },
    /// Instantiation arguments named a field the schema never consumed.
    UnusedParameter { field: String },
    /// An anonymous descriptor has no default to fall back to.
    NoDefaultForAnonymous { schema: &'static str },
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::TruncatedInput { field, offset } => {
                write!(f, "truncated input at bit {} reading {}", offset, field)
            }
            CodecError::InvalidEnumValue { field, value } => {
                write!(f, "invalid enum value {} for {}", value, field)
            }
            CodecError::UnknownVariant { schema, key } => {
                write!(f, "unknown variant key {:#x} for {}", key, schema)
            }
            CodecError::UnsupportedVersion { found } => {
                write!(f, "unsupported transport version {}", found)
            }
            CodecError::InvariantViolation { field, reason } => {
                write!(f, "invariant violation on {}: {}", field, reason)
            }
            CodecError::MissingParameter { field } => {
                write!(f, "missing parameter {}", field)
            }
            CodecError::UnusedParameter { field } => {
                write!(f, "unused parameter {}", field)
            }
            CodecError::NoDefaultForAnonymous { schema } => {
                write!(f, "anonymous field without default in {}", schema)
            }
        }
    }
}

impl std::error::Error for CodecError {}

pub type CodecResult<T> = std::result::Result<T, CodecError>;
