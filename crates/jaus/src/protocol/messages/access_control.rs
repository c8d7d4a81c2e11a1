// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Access-control message schemas.

use crate::core::ser::{CodecError, CodecResult, Field, Schema};
use crate::protocol::id;
use crate::protocol::message::{message_preamble, MessageCode};

/// `RejectControl` response codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RejectControlCode {
    ControlReleased = 0,
    NotAvailable = 1,
}

impl RejectControlCode {
    pub(crate) fn check(v: u64) -> bool {
        v <= 1
    }
}

impl TryFrom<u64> for RejectControlCode {
    type Error = CodecError;

    fn try_from(v: u64) -> CodecResult<Self> {
        match v {
            0 => Ok(Self::ControlReleased),
            1 => Ok(Self::NotAvailable),
            other => Err(CodecError::InvalidEnumValue {
                field: "response_code",
                value: other,
            }),
        }
    }
}

/// `ConfirmControl` response codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConfirmControlCode {
    ControlAccepted = 0,
    NotAvailable = 1,
    InsufficientAuthority = 2,
}

impl ConfirmControlCode {
    pub(crate) fn check(v: u64) -> bool {
        v <= 2
    }
}

impl TryFrom<u64> for ConfirmControlCode {
    type Error = CodecError;

    fn try_from(v: u64) -> CodecResult<Self> {
        match v {
            0 => Ok(Self::ControlAccepted),
            1 => Ok(Self::NotAvailable),
            2 => Ok(Self::InsufficientAuthority),
            other => Err(CodecError::InvalidEnumValue {
                field: "response_code",
                value: other,
            }),
        }
    }
}

fn request_control_fields() -> Vec<Field> {
    let mut f = message_preamble(MessageCode::RequestControl);
    f.push(Field::u8("authority_code"));
    f
}

pub static REQUEST_CONTROL: Schema = Schema {
    name: "RequestControl",
    fields: request_control_fields,
    variant: None,
};

fn release_control_fields() -> Vec<Field> {
    message_preamble(MessageCode::ReleaseControl)
}

pub static RELEASE_CONTROL: Schema = Schema {
    name: "ReleaseControl",
    fields: release_control_fields,
    variant: None,
};

fn query_control_fields() -> Vec<Field> {
    message_preamble(MessageCode::QueryControl)
}

pub static QUERY_CONTROL: Schema = Schema {
    name: "QueryControl",
    fields: query_control_fields,
    variant: None,
};

fn query_authority_fields() -> Vec<Field> {
    message_preamble(MessageCode::QueryAuthority)
}

pub static QUERY_AUTHORITY: Schema = Schema {
    name: "QueryAuthority",
    fields: query_authority_fields,
    variant: None,
};

fn set_authority_fields() -> Vec<Field> {
    let mut f = message_preamble(MessageCode::SetAuthority);
    f.push(Field::u8("authority_code"));
    f
}

pub static SET_AUTHORITY: Schema = Schema {
    name: "SetAuthority",
    fields: set_authority_fields,
    variant: None,
};

fn query_timeout_fields() -> Vec<Field> {
    message_preamble(MessageCode::QueryTimeout)
}

pub static QUERY_TIMEOUT: Schema = Schema {
    name: "QueryTimeout",
    fields: query_timeout_fields,
    variant: None,
};

fn report_control_fields() -> Vec<Field> {
    let mut f = message_preamble(MessageCode::ReportControl);
    f.push(Field::record("id", &id::ID));
    f.push(Field::u8("authority_code"));
    f
}

pub static REPORT_CONTROL: Schema = Schema {
    name: "ReportControl",
    fields: report_control_fields,
    variant: None,
};

fn reject_control_fields() -> Vec<Field> {
    let mut f = message_preamble(MessageCode::RejectControl);
    f.push(Field::enum_(
        "response_code",
        crate::core::ser::IntSpec::u8(),
        RejectControlCode::check,
    ));
    f
}

pub static REJECT_CONTROL: Schema = Schema {
    name: "RejectControl",
    fields: reject_control_fields,
    variant: None,
};

fn confirm_control_fields() -> Vec<Field> {
    let mut f = message_preamble(MessageCode::ConfirmControl);
    f.push(Field::enum_(
        "response_code",
        crate::core::ser::IntSpec::u8(),
        ConfirmControlCode::check,
    ));
    f
}

pub static CONFIRM_CONTROL: Schema = Schema {
    name: "ConfirmControl",
    fields: confirm_control_fields,
    variant: None,
};

fn report_authority_fields() -> Vec<Field> {
    let mut f = message_preamble(MessageCode::ReportAuthority);
    f.push(Field::u8("authority_code"));
    f
}

pub static REPORT_AUTHORITY: Schema = Schema {
    name: "ReportAuthority",
    fields: report_authority_fields,
    variant: None,
};

fn report_timeout_fields() -> Vec<Field> {
    let mut f = message_preamble(MessageCode::ReportTimeout);
    f.push(Field::u8("timeout"));
    f
}

pub static REPORT_TIMEOUT: Schema = Schema {
    name: "ReportTimeout",
    fields: report_timeout_fields,
    variant: None,
};
