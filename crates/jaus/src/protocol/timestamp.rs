// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Packed 32-bit timestamp: ms 10 bits, sec 6, min 6, hr 5, day 5.

use crate::core::ser::{CodecResult, Field, FieldMap, IntSpec, Record, Schema, Value};

fn timestamp_fields() -> Vec<Field> {
    vec![
        Field::uint("ms", IntSpec::bits(10)),
        Field::uint("sec", IntSpec::bits(6)),
        Field::uint("min", IntSpec::bits(6)),
        Field::uint("hr", IntSpec::bits(5)),
        Field::uint("day", IntSpec::bits(5)),
    ]
}

pub static TIMESTAMP: Schema = Schema {
    name: "Timestamp",
    fields: timestamp_fields,
    variant: None,
};

/// Convenience view over a decoded timestamp record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp {
    pub ms: u16,
    pub sec: u8,
    pub min: u8,
    pub hr: u8,
    pub day: u8,
}

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp {
        ms: 0,
        sec: 0,
        min: 0,
        hr: 0,
        day: 0,
    };

    pub fn from_record(record: &Record) -> CodecResult<Self> {
        Ok(Self {
            ms: record.u16("ms")?,
            sec: record.u8("sec")?,
            min: record.u8("min")?,
            hr: record.u8("hr")?,
            day: record.u8("day")?,
        })
    }

    pub fn to_record(self) -> Record {
        let fields: FieldMap = [
            ("ms", Value::UInt(u64::from(self.ms))),
            ("sec", Value::UInt(u64::from(self.sec))),
            ("min", Value::UInt(u64::from(self.min))),
            ("hr", Value::UInt(u64::from(self.hr))),
            ("day", Value::UInt(u64::from(self.day))),
        ]
        .into_iter()
        .collect();
        Record::from_parts(&TIMESTAMP, fields)
    }

    pub fn to_value(self) -> Value {
        Value::Record(self.to_record())
    }
}
