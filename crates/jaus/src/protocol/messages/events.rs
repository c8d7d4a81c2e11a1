// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Events-service message schemas.
//!
//! `QueryEvents` is itself a variant record: a one-byte selector picks one of
//! four query shapes (by message id, by type, by event id, all).

use super::{counted_bytes, counted_list, with_presence_vector};
use crate::core::ser::{CodecError, CodecResult, Field, IntSpec, Len, Schema, Value, VariantDispatch};
use crate::protocol::message::{is_message_code, message_preamble, MessageCode};

/// Event subscription kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EventType {
    Periodic = 0,
    EveryChange = 1,
}

impl EventType {
    pub(crate) fn check(v: u64) -> bool {
        v <= 1
    }
}

impl TryFrom<u64> for EventType {
    type Error = CodecError;

    fn try_from(v: u64) -> CodecResult<Self> {
        match v {
            0 => Ok(Self::Periodic),
            1 => Ok(Self::EveryChange),
            other => Err(CodecError::InvalidEnumValue {
                field: "event_type",
                value: other,
            }),
        }
    }
}

/// `RejectEventRequest` response codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RejectEventCode {
    PeriodicEventsNotSupported = 1,
    ChangeBasedEventsNotSupported = 2,
    ConnectionRefused = 3,
    InvalidEventSetup = 4,
    MessageNotSupported = 5,
    InvalidEventIdForUpdate = 6,
}

impl RejectEventCode {
    pub(crate) fn check(v: u64) -> bool {
        (1..=6).contains(&v)
    }
}

impl TryFrom<u64> for RejectEventCode {
    type Error = CodecError;

    fn try_from(v: u64) -> CodecResult<Self> {
        match v {
            1 => Ok(Self::PeriodicEventsNotSupported),
            2 => Ok(Self::ChangeBasedEventsNotSupported),
            3 => Ok(Self::ConnectionRefused),
            4 => Ok(Self::InvalidEventSetup),
            5 => Ok(Self::MessageNotSupported),
            6 => Ok(Self::InvalidEventIdForUpdate),
            other => Err(CodecError::InvalidEnumValue {
                field: "response_code",
                value: other,
            }),
        }
    }
}

/// Scaled periodic rate range in hertz.
pub const PERIODIC_RATE_RANGE: (f64, f64) = (0.0, 1092.0);

fn periodic_rate(name: &'static str) -> Field {
    Field::scaled_float(
        name,
        IntSpec::u16_le(),
        PERIODIC_RATE_RANGE.0,
        PERIODIC_RATE_RANGE.1,
    )
}

fn create_event_fields() -> Vec<Field> {
    let mut f = message_preamble(MessageCode::CreateEvent);
    f.push(Field::u8("request_id"));
    f.push(Field::enum_("event_type", IntSpec::u8(), EventType::check));
    f.push(periodic_rate("requested_periodic_rate"));
    counted_bytes(&mut f, "query_message", "query_message_count", IntSpec::u32_le());
    f
}

pub static CREATE_EVENT: Schema = Schema {
    name: "CreateEvent",
    fields: create_event_fields,
    variant: None,
};

fn update_event_fields() -> Vec<Field> {
    let mut f = message_preamble(MessageCode::UpdateEvent);
    f.push(Field::u8("request_id"));
    f.push(Field::enum_("event_type", IntSpec::u8(), EventType::check));
    f.push(periodic_rate("requested_periodic_rate"));
    f.push(Field::u8("event_id"));
    counted_bytes(&mut f, "query_message", "query_message_count", IntSpec::u32_le());
    f
}

pub static UPDATE_EVENT: Schema = Schema {
    name: "UpdateEvent",
    fields: update_event_fields,
    variant: None,
};

fn cancel_event_fields() -> Vec<Field> {
    let mut f = message_preamble(MessageCode::CancelEvent);
    f.push(Field::u8("request_id"));
    f.push(Field::u8("event_id"));
    f
}

pub static CANCEL_EVENT: Schema = Schema {
    name: "CancelEvent",
    fields: cancel_event_fields,
    variant: None,
};

fn create_command_event_fields() -> Vec<Field> {
    let mut f = message_preamble(MessageCode::CreateCommandEvent);
    f.push(Field::u8("request_id"));
    f.push(Field::uint("maximum_allowed_duration", IntSpec::u32_le()));
    counted_bytes(
        &mut f,
        "command_message",
        "command_message_count",
        IntSpec::u32_le(),
    );
    f
}

pub static CREATE_COMMAND_EVENT: Schema = Schema {
    name: "CreateCommandEvent",
    fields: create_command_event_fields,
    variant: None,
};

// ===== QueryEvents and its variants =====

/// Selector of the `QueryEvents` shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum QueryEventsVariant {
    MessageId = 0,
    EventType = 1,
    EventId = 2,
    AllEvents = 3,
}

impl QueryEventsVariant {
    pub(crate) fn check(v: u64) -> bool {
        v <= 3
    }
}

impl TryFrom<u64> for QueryEventsVariant {
    type Error = CodecError;

    fn try_from(v: u64) -> CodecResult<Self> {
        match v {
            0 => Ok(Self::MessageId),
            1 => Ok(Self::EventType),
            2 => Ok(Self::EventId),
            3 => Ok(Self::AllEvents),
            other => Err(CodecError::InvalidEnumValue {
                field: "variant",
                value: other,
            }),
        }
    }
}

fn query_events_preamble(variant: Option<QueryEventsVariant>) -> Vec<Field> {
    let mut f = message_preamble(MessageCode::QueryEvents);
    let field = Field::enum_("variant", IntSpec::u8(), QueryEventsVariant::check);
    match variant {
        Some(v) => f.push(field.with_default(Value::UInt(v as u64)).pinned()),
        None => f.push(field),
    }
    f
}

fn query_events_key_fields() -> Vec<Field> {
    query_events_preamble(None)
}

fn resolve_query_events(key: u64) -> Option<&'static Schema> {
    match key {
        0 => Some(&QUERY_EVENTS_BY_MESSAGE_ID),
        1 => Some(&QUERY_EVENTS_BY_TYPE),
        2 => Some(&QUERY_EVENTS_BY_ID),
        3 => Some(&QUERY_EVENTS_ALL),
        _ => None,
    }
}

pub static QUERY_EVENTS: Schema = Schema {
    name: "QueryEvents",
    fields: query_events_key_fields,
    variant: Some(VariantDispatch {
        key: "variant",
        resolve: resolve_query_events,
    }),
};

fn query_events_by_message_id_fields() -> Vec<Field> {
    let mut f = query_events_preamble(Some(QueryEventsVariant::MessageId));
    // Not named `message_code`: that slot holds this message's own code.
    f.push(Field::enum_(
        "query_message_code",
        IntSpec::u16_le(),
        is_message_code,
    ));
    f
}

pub static QUERY_EVENTS_BY_MESSAGE_ID: Schema = Schema {
    name: "QueryEventsByMessageId",
    fields: query_events_by_message_id_fields,
    variant: None,
};

fn query_events_by_type_fields() -> Vec<Field> {
    let mut f = query_events_preamble(Some(QueryEventsVariant::EventType));
    f.push(Field::enum_("event_type", IntSpec::u8(), EventType::check));
    f
}

pub static QUERY_EVENTS_BY_TYPE: Schema = Schema {
    name: "QueryEventsByType",
    fields: query_events_by_type_fields,
    variant: None,
};

fn query_events_by_id_fields() -> Vec<Field> {
    let mut f = query_events_preamble(Some(QueryEventsVariant::EventId));
    f.push(Field::u8("event_id"));
    f
}

pub static QUERY_EVENTS_BY_ID: Schema = Schema {
    name: "QueryEventsById",
    fields: query_events_by_id_fields,
    variant: None,
};

fn query_events_all_fields() -> Vec<Field> {
    let mut f = query_events_preamble(Some(QueryEventsVariant::AllEvents));
    f.push(Field::u8("all_events").with_default(Value::UInt(0)));
    f
}

pub static QUERY_EVENTS_ALL: Schema = Schema {
    name: "QueryEventsAll",
    fields: query_events_all_fields,
    variant: None,
};

// ===== Replies =====

fn query_event_timeout_fields() -> Vec<Field> {
    message_preamble(MessageCode::QueryEventTimeout)
}

pub static QUERY_EVENT_TIMEOUT: Schema = Schema {
    name: "QueryEventTimeout",
    fields: query_event_timeout_fields,
    variant: None,
};

fn confirm_event_request_fields() -> Vec<Field> {
    let mut f = message_preamble(MessageCode::ConfirmEventRequest);
    f.push(Field::u8("request_id"));
    f.push(Field::u8("event_id"));
    f.push(periodic_rate("confirmed_periodic_rate"));
    f
}

pub static CONFIRM_EVENT_REQUEST: Schema = Schema {
    name: "ConfirmEventRequest",
    fields: confirm_event_request_fields,
    variant: None,
};

fn reject_event_request_fields() -> Vec<Field> {
    let mut f = message_preamble(MessageCode::RejectEventRequest);
    with_presence_vector(
        &mut f,
        8,
        vec![
            Field::u8("request_id"),
            Field::enum_("response_code", IntSpec::u8(), RejectEventCode::check),
        ],
        vec![Field::bytes("error_message", Len::Fixed(80))],
    );
    f
}

pub static REJECT_EVENT_REQUEST: Schema = Schema {
    name: "RejectEventRequest",
    fields: reject_event_request_fields,
    variant: None,
};

fn event_entry_fields() -> Vec<Field> {
    let mut f = vec![
        Field::enum_("type", IntSpec::u8(), EventType::check),
        Field::u8("id"),
    ];
    counted_bytes(&mut f, "query_message", "query_message_count", IntSpec::u32_le());
    f
}

/// One entry of a `ReportEvents` list.
pub static EVENT_ENTRY: Schema = Schema {
    name: "ReportEventsEntry",
    fields: event_entry_fields,
    variant: None,
};

fn report_events_fields() -> Vec<Field> {
    let mut f = message_preamble(MessageCode::ReportEvents);
    counted_list(&mut f, "events", "events_count", IntSpec::u8(), &EVENT_ENTRY);
    f
}

pub static REPORT_EVENTS: Schema = Schema {
    name: "ReportEvents",
    fields: report_events_fields,
    variant: None,
};

fn event_fields() -> Vec<Field> {
    let mut f = message_preamble(MessageCode::Event);
    f.push(Field::u8("event_id"));
    f.push(Field::u8("sequence_number"));
    counted_bytes(&mut f, "report_message", "report_message_count", IntSpec::u32_le());
    f
}

pub static EVENT: Schema = Schema {
    name: "Event",
    fields: event_fields,
    variant: None,
};

fn report_event_timeout_fields() -> Vec<Field> {
    let mut f = message_preamble(MessageCode::ReportEventTimeout);
    f.push(Field::u8("timeout"));
    f
}

pub static REPORT_EVENT_TIMEOUT: Schema = Schema {
    name: "ReportEventTimeout",
    fields: report_event_timeout_fields,
    variant: None,
};

/// `CommandEvent` outcome codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandResult {
    Successful = 0,
    Unsuccessful = 1,
}

impl CommandResult {
    pub(crate) fn check(v: u64) -> bool {
        v <= 1
    }
}

fn command_event_fields() -> Vec<Field> {
    let mut f = message_preamble(MessageCode::CommandEvent);
    f.push(Field::u8("event_id"));
    f.push(Field::enum_(
        "command_result",
        IntSpec::u8(),
        CommandResult::check,
    ));
    f
}

pub static COMMAND_EVENT: Schema = Schema {
    name: "CommandEvent",
    fields: command_event_fields,
    variant: None,
};
