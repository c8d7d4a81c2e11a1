// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Management message schemas.

use crate::core::ser::{CodecError, CodecResult, Field, IntSpec, Schema, Value};
use crate::protocol::message::{message_preamble, MessageCode};

/// Component lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ManagementStatus {
    Init = 0,
    Ready = 1,
    Standby = 2,
    Shutdown = 3,
    Failure = 4,
    Emergency = 5,
}

impl ManagementStatus {
    pub(crate) fn check(v: u64) -> bool {
        v <= 5
    }
}

impl TryFrom<u64> for ManagementStatus {
    type Error = CodecError;

    fn try_from(v: u64) -> CodecResult<Self> {
        match v {
            0 => Ok(Self::Init),
            1 => Ok(Self::Ready),
            2 => Ok(Self::Standby),
            3 => Ok(Self::Shutdown),
            4 => Ok(Self::Failure),
            5 => Ok(Self::Emergency),
            other => Err(CodecError::InvalidEnumValue {
                field: "status",
                value: other,
            }),
        }
    }
}

/// Emergency codes; STOP is the only one defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EmergencyCode {
    Stop = 1,
}

impl EmergencyCode {
    pub(crate) fn check(v: u64) -> bool {
        v == 1
    }
}

fn shutdown_fields() -> Vec<Field> {
    message_preamble(MessageCode::Shutdown)
}

pub static SHUTDOWN: Schema = Schema {
    name: "Shutdown",
    fields: shutdown_fields,
    variant: None,
};

fn standby_fields() -> Vec<Field> {
    message_preamble(MessageCode::Standby)
}

pub static STANDBY: Schema = Schema {
    name: "Standby",
    fields: standby_fields,
    variant: None,
};

fn resume_fields() -> Vec<Field> {
    message_preamble(MessageCode::Resume)
}

pub static RESUME: Schema = Schema {
    name: "Resume",
    fields: resume_fields,
    variant: None,
};

fn reset_fields() -> Vec<Field> {
    message_preamble(MessageCode::Reset)
}

pub static RESET: Schema = Schema {
    name: "Reset",
    fields: reset_fields,
    variant: None,
};

fn set_emergency_fields() -> Vec<Field> {
    let mut f = message_preamble(MessageCode::SetEmergency);
    f.push(Field::enum_(
        "emergency_code",
        IntSpec::u8(),
        EmergencyCode::check,
    ));
    f
}

pub static SET_EMERGENCY: Schema = Schema {
    name: "SetEmergency",
    fields: set_emergency_fields,
    variant: None,
};

fn clear_emergency_fields() -> Vec<Field> {
    let mut f = message_preamble(MessageCode::ClearEmergency);
    f.push(Field::enum_(
        "emergency_code",
        IntSpec::u8(),
        EmergencyCode::check,
    ));
    f
}

pub static CLEAR_EMERGENCY: Schema = Schema {
    name: "ClearEmergency",
    fields: clear_emergency_fields,
    variant: None,
};

fn query_status_fields() -> Vec<Field> {
    message_preamble(MessageCode::QueryStatus)
}

pub static QUERY_STATUS: Schema = Schema {
    name: "QueryStatus",
    fields: query_status_fields,
    variant: None,
};

fn report_status_fields() -> Vec<Field> {
    let mut f = message_preamble(MessageCode::ReportStatus);
    f.push(Field::enum_(
        "status",
        IntSpec::u8(),
        ManagementStatus::check,
    ));
    f.push(Field::uint("reserved", IntSpec::u32_le()).with_default(Value::UInt(0)));
    f
}

pub static REPORT_STATUS: Schema = Schema {
    name: "ReportStatus",
    fields: report_status_fields,
    variant: None,
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::message::Message;

    #[test]
    fn test_report_status_reserved_defaults_to_zero() {
        let msg = Message::build(MessageCode::ReportStatus)
            .uint("status", ManagementStatus::Standby as u64)
            .finish()
            .expect("build");
        let bytes = Message::encode(&msg).unwrap();
        assert_eq!(bytes, vec![0x02, 0x40, 0x02, 0x00, 0x00, 0x00, 0x00]);
        assert_eq!(Message::decode(&bytes).expect("decode"), msg);
    }

    #[test]
    fn test_set_emergency_only_accepts_stop() {
        assert!(Message::decode(&[0x06, 0x00, 0x01]).is_ok());
        assert!(Message::decode(&[0x06, 0x00, 0x02]).is_err());
    }
}
