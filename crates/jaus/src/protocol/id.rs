// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Component addresses.
//!
//! A JAUS address is the triple `(subsystem, node, component)`, encoded on
//! the wire in the order component, node, subsystem with the subsystem
//! little-endian (4 bytes total).

use crate::core::ser::{self, CodecResult, Field, FieldMap, Record, Schema, Value};
use std::fmt;

fn id_fields() -> Vec<Field> {
    vec![
        Field::u8("component"),
        Field::u8("node"),
        Field::u16_le("subsystem"),
    ]
}

/// Wire schema of a component address.
pub static ID: Schema = Schema {
    name: "Id",
    fields: id_fields,
    variant: None,
};

/// A component address within a node within a subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id {
    pub subsystem: u16,
    pub node: u8,
    pub component: u8,
}

impl Id {
    pub const ZERO: Id = Id {
        subsystem: 0,
        node: 0,
        component: 0,
    };

    /// The all-ones broadcast destination.
    pub const BROADCAST: Id = Id {
        subsystem: 0xFFFF,
        node: 0xFF,
        component: 0xFF,
    };

    pub const fn new(subsystem: u16, node: u8, component: u8) -> Self {
        Self {
            subsystem,
            node,
            component,
        }
    }

    pub fn decode(bytes: &[u8]) -> CodecResult<Self> {
        Self::from_record(&ID.decode(bytes)?)
    }

    pub fn encode(&self) -> CodecResult<Vec<u8>> {
        ser::encode(&self.to_record())
    }

    pub fn from_record(record: &Record) -> CodecResult<Self> {
        Ok(Self {
            subsystem: record.u16("subsystem")?,
            node: record.u8("node")?,
            component: record.u8("component")?,
        })
    }

    pub fn to_record(self) -> Record {
        let fields: FieldMap = [
            ("component", Value::UInt(u64::from(self.component))),
            ("node", Value::UInt(u64::from(self.node))),
            ("subsystem", Value::UInt(u64::from(self.subsystem))),
        ]
        .into_iter()
        .collect();
        Record::from_parts(&ID, fields)
    }

    pub fn to_value(self) -> Value {
        Value::Record(self.to_record())
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.subsystem, self.node, self.component)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_decode_known_vector() {
        let id = Id::decode(&[0x02, 0x01, 0xE8, 0x03]).expect("decode");
        assert_eq!(id, Id::new(1000, 1, 2));
    }

    #[test]
    fn test_id_roundtrip() {
        let id = Id::new(0xBEEF, 0x12, 0x34);
        let bytes = id.encode().expect("encode");
        assert_eq!(bytes, vec![0x34, 0x12, 0xEF, 0xBE]);
        assert_eq!(Id::decode(&bytes).expect("decode"), id);
    }

    #[test]
    fn test_broadcast_id_is_all_ones() {
        assert_eq!(
            Id::BROADCAST.encode().expect("encode"),
            vec![0xFF, 0xFF, 0xFF, 0xFF]
        );
    }

    #[test]
    fn test_record_conversion_roundtrip() {
        let id = Id::new(7, 8, 9);
        let rec = id.to_record();
        assert_eq!(Id::from_record(&rec).expect("convert"), id);
    }
}
