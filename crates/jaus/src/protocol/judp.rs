// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! JUDP framing: the packet header and the versioned payload wrapper.
//!
//! Packet layout (uncompressed, 14 bytes of overhead):
//! - `message_type` 6 bits (always 0), `HC_flags` 2 bits
//! - `data_size` u16 LE = total packet length in bytes
//! - (`HC_number`, `HC_length` - only when HC_flags != NONE)
//! - `priority` 2b, `broadcast` 2b, `ack_nack` 2b, `data_flags` 2b
//! - destination id (4), source id (4)
//! - contents (`data_size` - overhead bytes)
//! - `sequence_number` u16 LE
//!
//! A payload is the one-byte transport version (2) followed by back-to-back
//! packets; the whole datagram stays within 512 bytes.

use crate::config::{MAX_PAYLOAD_SIZE, PACKET_OVERHEAD, PACKET_OVERHEAD_HC, TRANSPORT_VERSION};
use crate::core::ser::{
    self, CodecError, CodecResult, Ctx, Field, FieldMap, IntSpec, Len, Record, Schema, Value,
};
use crate::protocol::id::{self, Id};

/// Fragmentation role of a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DataFlags {
    SinglePacket = 0,
    FirstPacket = 1,
    NormalPacket = 2,
    LastPacket = 3,
}

impl DataFlags {
    fn check(v: u64) -> bool {
        v <= 3
    }
}

impl TryFrom<u64> for DataFlags {
    type Error = CodecError;

    fn try_from(v: u64) -> CodecResult<Self> {
        match v {
            0 => Ok(Self::SinglePacket),
            1 => Ok(Self::FirstPacket),
            2 => Ok(Self::NormalPacket),
            3 => Ok(Self::LastPacket),
            other => Err(CodecError::InvalidEnumValue {
                field: "data_flags",
                value: other,
            }),
        }
    }
}

/// Header-compression flags; only NONE is produced, the rest are parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum HcFlags {
    None = 0,
    Requested = 1,
    HcLength = 2,
    Compressed = 3,
}

impl HcFlags {
    fn check(v: u64) -> bool {
        v <= 3
    }
}

/// Packet priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Priority {
    Low = 0,
    Standard = 1,
    High = 2,
    Safety = 3,
}

impl Priority {
    fn check(v: u64) -> bool {
        v <= 3
    }
}

impl TryFrom<u64> for Priority {
    type Error = CodecError;

    fn try_from(v: u64) -> CodecResult<Self> {
        match v {
            0 => Ok(Self::Low),
            1 => Ok(Self::Standard),
            2 => Ok(Self::High),
            3 => Ok(Self::Safety),
            other => Err(CodecError::InvalidEnumValue {
                field: "priority",
                value: other,
            }),
        }
    }
}

/// Broadcast scope of a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Broadcast {
    None = 0,
    Local = 1,
    Global = 2,
}

impl Broadcast {
    fn check(v: u64) -> bool {
        v <= 2
    }
}

impl TryFrom<u64> for Broadcast {
    type Error = CodecError;

    fn try_from(v: u64) -> CodecResult<Self> {
        match v {
            0 => Ok(Self::None),
            1 => Ok(Self::Local),
            2 => Ok(Self::Global),
            other => Err(CodecError::InvalidEnumValue {
                field: "broadcast",
                value: other,
            }),
        }
    }
}

/// Acknowledgement handshake flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AckNack {
    NoResponseRequired = 0,
    ResponseRequired = 1,
    Nack = 2,
    Ack = 3,
}

impl AckNack {
    fn check(v: u64) -> bool {
        v <= 3
    }
}

impl TryFrom<u64> for AckNack {
    type Error = CodecError;

    fn try_from(v: u64) -> CodecResult<Self> {
        match v {
            0 => Ok(Self::NoResponseRequired),
            1 => Ok(Self::ResponseRequired),
            2 => Ok(Self::Nack),
            3 => Ok(Self::Ack),
            other => Err(CodecError::InvalidEnumValue {
                field: "ack_nack",
                value: other,
            }),
        }
    }
}

fn hc_present(ctx: &Ctx) -> bool {
    ctx.get("HC_flags")
        .and_then(Value::as_uint)
        .map(|v| v != HcFlags::None as u64)
        .unwrap_or(false)
}

fn packet_overhead(ctx: &Ctx) -> u64 {
    if hc_present(ctx) {
        PACKET_OVERHEAD_HC as u64
    } else {
        PACKET_OVERHEAD as u64
    }
}

fn packet_fields() -> Vec<Field> {
    vec![
        Field::uint("message_type", IntSpec::bits(6))
            .with_default(Value::UInt(0))
            .pinned(),
        Field::enum_("HC_flags", IntSpec::bits(2), HcFlags::check)
            .with_default(Value::UInt(HcFlags::None as u64)),
        Field::u16_le("data_size").default_expr(|ctx| {
            let overhead = packet_overhead(ctx);
            ctx.len_of("contents").map(|n| Value::UInt(n + overhead))
        }),
        Field::when(hc_present, Field::u8("HC_number")),
        Field::when(hc_present, Field::u8("HC_length")),
        Field::enum_("priority", IntSpec::bits(2), Priority::check)
            .with_default(Value::UInt(Priority::Standard as u64)),
        Field::enum_("broadcast", IntSpec::bits(2), Broadcast::check)
            .with_default(Value::UInt(Broadcast::Local as u64)),
        Field::enum_("ack_nack", IntSpec::bits(2), AckNack::check)
            .with_default(Value::UInt(AckNack::NoResponseRequired as u64)),
        Field::enum_("data_flags", IntSpec::bits(2), DataFlags::check),
        Field::record("destination_id", &id::ID),
        Field::record("source_id", &id::ID),
        Field::bytes(
            "contents",
            Len::Expr(Box::new(|ctx| {
                let data_size = ctx.uint("data_size")?;
                let overhead = packet_overhead(ctx);
                data_size
                    .checked_sub(overhead)
                    .ok_or(CodecError::InvariantViolation {
                        field: "data_size",
                        reason: "smaller than the packet overhead".into(),
                    })
            })),
        ),
        Field::u16_le("sequence_number"),
    ]
}

pub static PACKET: Schema = Schema {
    name: "Packet",
    fields: packet_fields,
    variant: None,
};

fn payload_fields() -> Vec<Field> {
    vec![
        Field::u8("transport_version")
            .with_default(Value::UInt(u64::from(TRANSPORT_VERSION)))
            .pinned(),
        Field::consume("packets", &PACKET),
    ]
}

pub static PAYLOAD: Schema = Schema {
    name: "Payload",
    fields: payload_fields,
    variant: None,
};

/// A JUDP packet, as the transport engine manipulates it.
///
/// Header-compression fields are parsed off the wire but not retained; the
/// engine only ever emits uncompressed packets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub priority: Priority,
    pub broadcast: Broadcast,
    pub ack_nack: AckNack,
    pub data_flags: DataFlags,
    pub destination_id: Id,
    pub source_id: Id,
    pub contents: Vec<u8>,
    pub sequence_number: u16,
}

impl Packet {
    /// Total wire length of this packet in bytes.
    pub fn data_size(&self) -> usize {
        self.contents.len() + PACKET_OVERHEAD
    }

    pub fn to_record(&self) -> CodecResult<Record> {
        let args: FieldMap = [
            ("priority", Value::UInt(self.priority as u64)),
            ("broadcast", Value::UInt(self.broadcast as u64)),
            ("ack_nack", Value::UInt(self.ack_nack as u64)),
            ("data_flags", Value::UInt(self.data_flags as u64)),
            ("destination_id", self.destination_id.to_value()),
            ("source_id", self.source_id.to_value()),
            ("contents", Value::Bytes(self.contents.clone())),
            (
                "sequence_number",
                Value::UInt(u64::from(self.sequence_number)),
            ),
        ]
        .into_iter()
        .collect();
        PACKET.instantiate(args)
    }

    pub fn from_record(record: &Record) -> CodecResult<Self> {
        Ok(Self {
            priority: Priority::try_from(record.uint("priority")?)?,
            broadcast: Broadcast::try_from(record.uint("broadcast")?)?,
            ack_nack: AckNack::try_from(record.uint("ack_nack")?)?,
            data_flags: DataFlags::try_from(record.uint("data_flags")?)?,
            destination_id: Id::from_record(record.record("destination_id")?)?,
            source_id: Id::from_record(record.record("source_id")?)?,
            contents: record.bytes("contents")?.to_vec(),
            sequence_number: record.u16("sequence_number")?,
        })
    }
}

/// A transport-version-2 datagram: back-to-back packets.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Payload {
    pub packets: Vec<Packet>,
}

impl Payload {
    pub fn new(packets: Vec<Packet>) -> Self {
        Self { packets }
    }

    /// Wire size including the version prefix.
    pub fn wire_size(&self) -> usize {
        1 + self.packets.iter().map(Packet::data_size).sum::<usize>()
    }

    pub fn encode(&self) -> CodecResult<Vec<u8>> {
        let mut packets = Vec::with_capacity(self.packets.len());
        for packet in &self.packets {
            packets.push(Value::Record(packet.to_record()?));
        }
        let args: FieldMap = [("packets", Value::List(packets))].into_iter().collect();
        ser::encode(&PAYLOAD.instantiate(args)?)
    }

    pub fn decode(bytes: &[u8]) -> CodecResult<Self> {
        // The version byte gets its own error so the transport can tell a
        // foreign speaker from a garbled packet.
        match bytes.first() {
            Some(&v) if v == TRANSPORT_VERSION => {}
            Some(&v) => return Err(CodecError::UnsupportedVersion { found: v }),
            None => {
                return Err(CodecError::TruncatedInput {
                    field: "transport_version",
                    offset: 0,
                })
            }
        }
        let record = PAYLOAD.decode(bytes)?;
        let mut packets = Vec::new();
        for item in record.list("packets")? {
            let rec = item.as_record().ok_or(CodecError::InvariantViolation {
                field: "packets",
                reason: "list entry is not a packet record".into(),
            })?;
            packets.push(Packet::from_record(rec)?);
        }
        Ok(Self { packets })
    }
}
