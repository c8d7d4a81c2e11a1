// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The message catalog: the closed enumeration of JAUS message codes and the
//! variant dispatch from a code to its record schema.
//!
//! Every message starts with its two-byte little-endian code; decoding the
//! generic [`Message`] peeks the code and re-dispatches to the concrete
//! schema. Unknown codes fail decode with `UnknownVariant`.

use crate::core::ser::{
    self, CodecError, CodecResult, Field, FieldMap, IntSpec, Record, Schema, Value, VariantDispatch,
};
use crate::protocol::messages;
use std::fmt;

/// All JAUS message codes spoken by this node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u16)]
pub enum MessageCode {
    // Access control
    SetAuthority = 0x0001,
    RequestControl = 0x000D,
    ReleaseControl = 0x000E,
    ConfirmControl = 0x000F,
    RejectControl = 0x0010,
    QueryAuthority = 0x2001,
    QueryTimeout = 0x2003,
    QueryControl = 0x200D,
    ReportAuthority = 0x4001,
    ReportTimeout = 0x4003,
    ReportControl = 0x400D,

    // Management
    Shutdown = 0x0002,
    Standby = 0x0003,
    Resume = 0x0004,
    Reset = 0x0005,
    SetEmergency = 0x0006,
    ClearEmergency = 0x0007,
    QueryStatus = 0x2002,
    ReportStatus = 0x4002,

    // Events
    CreateEvent = 0x01F0,
    UpdateEvent = 0x01F1,
    CancelEvent = 0x01F2,
    ConfirmEventRequest = 0x01F3,
    RejectEventRequest = 0x01F4,
    CreateCommandEvent = 0x01F6,
    QueryEvents = 0x21F0,
    QueryEventTimeout = 0x21F2,
    ReportEvents = 0x41F0,
    Event = 0x41F1,
    ReportEventTimeout = 0x41F2,
    CommandEvent = 0x41F6,

    // Liveness
    QueryHeartbeatPulse = 0x2202,
    ReportHeartbeatPulse = 0x4202,

    // List manager
    SetElement = 0x041A,
    DeleteElement = 0x041B,
    ConfirmElementRequest = 0x041C,
    RejectElementRequest = 0x041D,
    QueryElement = 0x241A,
    QueryElementList = 0x241B,
    QueryElementCount = 0x241C,
    ReportElement = 0x441A,
    ReportElementList = 0x441B,
    ReportElementCount = 0x441C,

    // Discovery
    RegisterServices = 0x0B00,
    QueryIdentification = 0x2B00,
    QueryConfiguration = 0x2B01,
    QuerySubsystemList = 0x2B02,
    QueryServices = 0x2B03,
    QueryServiceList = 0x2B04,
    ReportIdentification = 0x4B00,
    ReportConfiguration = 0x4B01,
    ReportSubsystemList = 0x4B02,
    ReportServices = 0x4B03,
    ReportServiceList = 0x4B04,

    // Mobility
    SetTravelSpeed = 0x040A,
    SetLocalWaypoint = 0x040D,
    QueryLocalPose = 0x2403,
    QueryVelocityState = 0x2404,
    QueryTravelSpeed = 0x240A,
    QueryLocalWaypoint = 0x240D,
    QueryActiveElement = 0x241E,
    ReportLocalPose = 0x4403,
    ReportVelocityState = 0x4404,
    ReportTravelSpeed = 0x440A,
    ReportLocalWaypoint = 0x440D,
    ReportActiveElement = 0x441E,
}

impl MessageCode {
    pub const fn value(self) -> u16 {
        self as u16
    }
}

impl fmt::Display for MessageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({:#06x})", self, *self as u16)
    }
}

impl TryFrom<u16> for MessageCode {
    type Error = CodecError;

    fn try_from(value: u16) -> CodecResult<Self> {
        use MessageCode::*;
        Ok(match value {
            0x0001 => SetAuthority,
            0x000D => RequestControl,
            0x000E => ReleaseControl,
            0x000F => ConfirmControl,
            0x0010 => RejectControl,
            0x2001 => QueryAuthority,
            0x2003 => QueryTimeout,
            0x200D => QueryControl,
            0x4001 => ReportAuthority,
            0x4003 => ReportTimeout,
            0x400D => ReportControl,
            0x0002 => Shutdown,
            0x0003 => Standby,
            0x0004 => Resume,
            0x0005 => Reset,
            0x0006 => SetEmergency,
            0x0007 => ClearEmergency,
            0x2002 => QueryStatus,
            0x4002 => ReportStatus,
            0x01F0 => CreateEvent,
            0x01F1 => UpdateEvent,
            0x01F2 => CancelEvent,
            0x01F3 => ConfirmEventRequest,
            0x01F4 => RejectEventRequest,
            0x01F6 => CreateCommandEvent,
            0x21F0 => QueryEvents,
            0x21F2 => QueryEventTimeout,
            0x41F0 => ReportEvents,
            0x41F1 => Event,
            0x41F2 => ReportEventTimeout,
            0x41F6 => CommandEvent,
            0x2202 => QueryHeartbeatPulse,
            0x4202 => ReportHeartbeatPulse,
            0x041A => SetElement,
            0x041B => DeleteElement,
            0x041C => ConfirmElementRequest,
            0x041D => RejectElementRequest,
            0x241A => QueryElement,
            0x241B => QueryElementList,
            0x241C => QueryElementCount,
            0x441A => ReportElement,
            0x441B => ReportElementList,
            0x441C => ReportElementCount,
            0x0B00 => RegisterServices,
            0x2B00 => QueryIdentification,
            0x2B01 => QueryConfiguration,
            0x2B02 => QuerySubsystemList,
            0x2B03 => QueryServices,
            0x2B04 => QueryServiceList,
            0x4B00 => ReportIdentification,
            0x4B01 => ReportConfiguration,
            0x4B02 => ReportSubsystemList,
            0x4B03 => ReportServices,
            0x4B04 => ReportServiceList,
            0x040A => SetTravelSpeed,
            0x040D => SetLocalWaypoint,
            0x2403 => QueryLocalPose,
            0x2404 => QueryVelocityState,
            0x240A => QueryTravelSpeed,
            0x240D => QueryLocalWaypoint,
            0x241E => QueryActiveElement,
            0x4403 => ReportLocalPose,
            0x4404 => ReportVelocityState,
            0x440A => ReportTravelSpeed,
            0x440D => ReportLocalWaypoint,
            0x441E => ReportActiveElement,
            other => {
                return Err(CodecError::InvalidEnumValue {
                    field: "message_code",
                    value: u64::from(other),
                })
            }
        })
    }
}

pub(crate) fn is_message_code(value: u64) -> bool {
    u16::try_from(value)
        .ok()
        .and_then(|v| MessageCode::try_from(v).ok())
        .is_some()
}

/// The common message preamble: the two-byte code pinned to the concrete
/// schema's discriminator.
pub(crate) fn message_preamble(code: MessageCode) -> Vec<Field> {
    vec![Field::enum_("message_code", IntSpec::u16_le(), is_message_code)
        .with_default(Value::UInt(u64::from(code.value())))
        .pinned()]
}

fn message_key_fields() -> Vec<Field> {
    vec![Field::enum_(
        "message_code",
        IntSpec::u16_le(),
        is_message_code,
    )]
}

fn resolve_message(key: u64) -> Option<&'static Schema> {
    let code = u16::try_from(key).ok()?;
    let code = MessageCode::try_from(code).ok()?;
    Some(schema_for(code))
}

/// The variant root all inbound message bytes decode through.
pub static MESSAGE: Schema = Schema {
    name: "Message",
    fields: message_key_fields,
    variant: Some(VariantDispatch {
        key: "message_code",
        resolve: resolve_message,
    }),
};

/// Map a message code to its concrete record schema.
pub fn schema_for(code: MessageCode) -> &'static Schema {
    use MessageCode::*;
    match code {
        SetAuthority => &messages::access_control::SET_AUTHORITY,
        RequestControl => &messages::access_control::REQUEST_CONTROL,
        ReleaseControl => &messages::access_control::RELEASE_CONTROL,
        ConfirmControl => &messages::access_control::CONFIRM_CONTROL,
        RejectControl => &messages::access_control::REJECT_CONTROL,
        QueryAuthority => &messages::access_control::QUERY_AUTHORITY,
        QueryTimeout => &messages::access_control::QUERY_TIMEOUT,
        QueryControl => &messages::access_control::QUERY_CONTROL,
        ReportAuthority => &messages::access_control::REPORT_AUTHORITY,
        ReportTimeout => &messages::access_control::REPORT_TIMEOUT,
        ReportControl => &messages::access_control::REPORT_CONTROL,
        Shutdown => &messages::management::SHUTDOWN,
        Standby => &messages::management::STANDBY,
        Resume => &messages::management::RESUME,
        Reset => &messages::management::RESET,
        SetEmergency => &messages::management::SET_EMERGENCY,
        ClearEmergency => &messages::management::CLEAR_EMERGENCY,
        QueryStatus => &messages::management::QUERY_STATUS,
        ReportStatus => &messages::management::REPORT_STATUS,
        CreateEvent => &messages::events::CREATE_EVENT,
        UpdateEvent => &messages::events::UPDATE_EVENT,
        CancelEvent => &messages::events::CANCEL_EVENT,
        ConfirmEventRequest => &messages::events::CONFIRM_EVENT_REQUEST,
        RejectEventRequest => &messages::events::REJECT_EVENT_REQUEST,
        CreateCommandEvent => &messages::events::CREATE_COMMAND_EVENT,
        QueryEvents => &messages::events::QUERY_EVENTS,
        QueryEventTimeout => &messages::events::QUERY_EVENT_TIMEOUT,
        ReportEvents => &messages::events::REPORT_EVENTS,
        Event => &messages::events::EVENT,
        ReportEventTimeout => &messages::events::REPORT_EVENT_TIMEOUT,
        CommandEvent => &messages::events::COMMAND_EVENT,
        QueryHeartbeatPulse => &messages::liveness::QUERY_HEARTBEAT_PULSE,
        ReportHeartbeatPulse => &messages::liveness::REPORT_HEARTBEAT_PULSE,
        SetElement => &messages::list_manager::SET_ELEMENT,
        DeleteElement => &messages::list_manager::DELETE_ELEMENT,
        ConfirmElementRequest => &messages::list_manager::CONFIRM_ELEMENT_REQUEST,
        RejectElementRequest => &messages::list_manager::REJECT_ELEMENT_REQUEST,
        QueryElement => &messages::list_manager::QUERY_ELEMENT,
        QueryElementList => &messages::list_manager::QUERY_ELEMENT_LIST,
        QueryElementCount => &messages::list_manager::QUERY_ELEMENT_COUNT,
        ReportElement => &messages::list_manager::REPORT_ELEMENT,
        ReportElementList => &messages::list_manager::REPORT_ELEMENT_LIST,
        ReportElementCount => &messages::list_manager::REPORT_ELEMENT_COUNT,
        RegisterServices => &messages::discovery::REGISTER_SERVICES,
        QueryIdentification => &messages::discovery::QUERY_IDENTIFICATION,
        QueryConfiguration => &messages::discovery::QUERY_CONFIGURATION,
        QuerySubsystemList => &messages::discovery::QUERY_SUBSYSTEM_LIST,
        QueryServices => &messages::discovery::QUERY_SERVICES,
        QueryServiceList => &messages::discovery::QUERY_SERVICE_LIST,
        ReportIdentification => &messages::discovery::REPORT_IDENTIFICATION,
        ReportConfiguration => &messages::discovery::REPORT_CONFIGURATION,
        ReportSubsystemList => &messages::discovery::REPORT_SUBSYSTEM_LIST,
        ReportServices => &messages::discovery::REPORT_SERVICES,
        ReportServiceList => &messages::discovery::REPORT_SERVICE_LIST,
        SetTravelSpeed => &messages::mobility::SET_TRAVEL_SPEED,
        SetLocalWaypoint => &messages::mobility::SET_LOCAL_WAYPOINT,
        QueryLocalPose => &messages::mobility::QUERY_LOCAL_POSE,
        QueryVelocityState => &messages::mobility::QUERY_VELOCITY_STATE,
        QueryTravelSpeed => &messages::mobility::QUERY_TRAVEL_SPEED,
        QueryLocalWaypoint => &messages::mobility::QUERY_LOCAL_WAYPOINT,
        QueryActiveElement => &messages::mobility::QUERY_ACTIVE_ELEMENT,
        ReportLocalPose => &messages::mobility::REPORT_LOCAL_POSE,
        ReportVelocityState => &messages::mobility::REPORT_VELOCITY_STATE,
        ReportTravelSpeed => &messages::mobility::REPORT_TRAVEL_SPEED,
        ReportLocalWaypoint => &messages::mobility::REPORT_LOCAL_WAYPOINT,
        ReportActiveElement => &messages::mobility::REPORT_ACTIVE_ELEMENT,
    }
}

/// Entry points for whole-message decode/encode/instantiate.
pub struct Message;

impl Message {
    /// Decode message bytes into the concrete record for their code.
    pub fn decode(bytes: &[u8]) -> CodecResult<Record> {
        MESSAGE.decode(bytes)
    }

    pub fn encode(record: &Record) -> CodecResult<Vec<u8>> {
        ser::encode(record)
    }

    /// Instantiate the record for `code` from an argument map.
    pub fn instantiate(code: MessageCode, args: FieldMap) -> CodecResult<Record> {
        schema_for(code).instantiate(args)
    }

    /// Start a keyword-style builder for `code`.
    pub fn build(code: MessageCode) -> MessageBuilder {
        MessageBuilder {
            code,
            args: FieldMap::new(),
        }
    }

    /// The code of a decoded or instantiated message record.
    pub fn code_of(record: &Record) -> CodecResult<MessageCode> {
        MessageCode::try_from(record.u16("message_code")?)
    }
}

/// Builder collecting instantiation arguments for one message.
pub struct MessageBuilder {
    code: MessageCode,
    args: FieldMap,
}

impl MessageBuilder {
    pub fn value(mut self, name: &'static str, value: Value) -> Self {
        self.args.insert(name, value);
        self
    }

    pub fn uint(self, name: &'static str, value: u64) -> Self {
        self.value(name, Value::UInt(value))
    }

    pub fn float(self, name: &'static str, value: f64) -> Self {
        self.value(name, Value::Float(value))
    }

    pub fn bytes(self, name: &'static str, value: Vec<u8>) -> Self {
        self.value(name, Value::Bytes(value))
    }

    pub fn str_(self, name: &'static str, value: &str) -> Self {
        self.value(name, Value::Str(value.to_owned()))
    }

    pub fn list(self, name: &'static str, value: Vec<Value>) -> Self {
        self.value(name, Value::List(value))
    }

    pub fn finish(self) -> CodecResult<Record> {
        Message::instantiate(self.code, self.args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_roundtrip() {
        for code in [
            MessageCode::RequestControl,
            MessageCode::Event,
            MessageCode::ReportServiceList,
            MessageCode::SetLocalWaypoint,
        ] {
            assert_eq!(MessageCode::try_from(code.value()).unwrap(), code);
        }
    }

    #[test]
    fn test_unknown_code_rejected() {
        assert!(MessageCode::try_from(0x1234u16).is_err());
        assert!(!is_message_code(0x1234));
    }

    #[test]
    fn test_decode_dispatches_to_concrete_schema() {
        // QueryHeartbeatPulse is the whole message: just its code.
        let rec = Message::decode(&[0x02, 0x22]).expect("decode");
        assert_eq!(rec.schema_name(), "QueryHeartbeatPulse");
        assert_eq!(Message::code_of(&rec).unwrap(), MessageCode::QueryHeartbeatPulse);
    }

    #[test]
    fn test_decode_unknown_code_fails() {
        let err = Message::decode(&[0x34, 0x12]).unwrap_err();
        assert!(matches!(err, CodecError::InvalidEnumValue { .. }));
    }

    #[test]
    fn test_builder_roundtrip() {
        let msg = Message::build(MessageCode::RequestControl)
            .uint("authority_code", 5)
            .finish()
            .expect("build");
        let bytes = Message::encode(&msg).expect("encode");
        assert_eq!(bytes, vec![0x0D, 0x00, 0x05]);
        assert_eq!(Message::decode(&bytes).expect("decode"), msg);
    }
}
