// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! List-manager message schemas.
//!
//! Elements are doubly-linked-list nodes addressed by UID; UID 0 is the
//! list terminator and never a real element.

use super::{counted_bytes, counted_list};
use crate::core::ser::{CodecError, CodecResult, Field, IntSpec, Schema, Value};
use crate::protocol::message::{message_preamble, MessageCode};

/// Payload format tag of a list element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ListElementFormat {
    JausMessage = 0,
    UserData = 1,
}

impl ListElementFormat {
    pub(crate) fn check(v: u64) -> bool {
        v <= 1
    }
}

/// `RejectElementRequest` response codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RejectElementCode {
    InvalidElementId = 1,
    InvalidPreviousElement = 2,
    InvalidNextElement = 3,
    UnsupportedElementType = 4,
    ElementIdNotFound = 5,
    OutOfMemory = 6,
    UnspecifiedError = 7,
}

impl RejectElementCode {
    pub(crate) fn check(v: u64) -> bool {
        (1..=7).contains(&v)
    }
}

impl TryFrom<u64> for RejectElementCode {
    type Error = CodecError;

    fn try_from(v: u64) -> CodecResult<Self> {
        match v {
            1 => Ok(Self::InvalidElementId),
            2 => Ok(Self::InvalidPreviousElement),
            3 => Ok(Self::InvalidNextElement),
            4 => Ok(Self::UnsupportedElementType),
            5 => Ok(Self::ElementIdNotFound),
            6 => Ok(Self::OutOfMemory),
            7 => Ok(Self::UnspecifiedError),
            other => Err(CodecError::InvalidEnumValue {
                field: "response_code",
                value: other,
            }),
        }
    }
}

fn element_body(out: &mut Vec<Field>) {
    out.push(Field::u16_le("uid"));
    out.push(Field::u16_le("prev"));
    out.push(Field::u16_le("next"));
    out.push(
        Field::enum_("format", IntSpec::u8(), ListElementFormat::check)
            .with_default(Value::UInt(ListElementFormat::UserData as u64)),
    );
    counted_bytes(out, "data", "data_count", IntSpec::u16_le());
}

fn list_element_fields() -> Vec<Field> {
    let mut f = Vec::new();
    element_body(&mut f);
    f
}

pub static LIST_ELEMENT: Schema = Schema {
    name: "ListElement",
    fields: list_element_fields,
    variant: None,
};

fn list_element_id_fields() -> Vec<Field> {
    vec![Field::u16_le("uid")]
}

pub static LIST_ELEMENT_ID: Schema = Schema {
    name: "ListElementId",
    fields: list_element_id_fields,
    variant: None,
};

fn set_element_fields() -> Vec<Field> {
    let mut f = message_preamble(MessageCode::SetElement);
    f.push(Field::u8("request_id"));
    counted_list(&mut f, "elements", "elements_count", IntSpec::u8(), &LIST_ELEMENT);
    f
}

pub static SET_ELEMENT: Schema = Schema {
    name: "SetElement",
    fields: set_element_fields,
    variant: None,
};

fn delete_element_fields() -> Vec<Field> {
    let mut f = message_preamble(MessageCode::DeleteElement);
    f.push(Field::u8("request_id"));
    counted_list(
        &mut f,
        "element_ids",
        "element_ids_count",
        IntSpec::u8(),
        &LIST_ELEMENT_ID,
    );
    f
}

pub static DELETE_ELEMENT: Schema = Schema {
    name: "DeleteElement",
    fields: delete_element_fields,
    variant: None,
};

fn query_element_fields() -> Vec<Field> {
    let mut f = message_preamble(MessageCode::QueryElement);
    f.push(Field::u16_le("element_uid"));
    f
}

pub static QUERY_ELEMENT: Schema = Schema {
    name: "QueryElement",
    fields: query_element_fields,
    variant: None,
};

fn query_element_list_fields() -> Vec<Field> {
    message_preamble(MessageCode::QueryElementList)
}

pub static QUERY_ELEMENT_LIST: Schema = Schema {
    name: "QueryElementList",
    fields: query_element_list_fields,
    variant: None,
};

fn query_element_count_fields() -> Vec<Field> {
    message_preamble(MessageCode::QueryElementCount)
}

pub static QUERY_ELEMENT_COUNT: Schema = Schema {
    name: "QueryElementCount",
    fields: query_element_count_fields,
    variant: None,
};

fn confirm_element_request_fields() -> Vec<Field> {
    let mut f = message_preamble(MessageCode::ConfirmElementRequest);
    f.push(Field::u8("request_id"));
    f
}

pub static CONFIRM_ELEMENT_REQUEST: Schema = Schema {
    name: "ConfirmElementRequest",
    fields: confirm_element_request_fields,
    variant: None,
};

fn reject_element_request_fields() -> Vec<Field> {
    let mut f = message_preamble(MessageCode::RejectElementRequest);
    f.push(Field::u8("request_id"));
    f.push(Field::enum_(
        "response_code",
        IntSpec::u8(),
        RejectElementCode::check,
    ));
    f
}

pub static REJECT_ELEMENT_REQUEST: Schema = Schema {
    name: "RejectElementRequest",
    fields: reject_element_request_fields,
    variant: None,
};

fn report_element_fields() -> Vec<Field> {
    let mut f = message_preamble(MessageCode::ReportElement);
    element_body(&mut f);
    f
}

pub static REPORT_ELEMENT: Schema = Schema {
    name: "ReportElement",
    fields: report_element_fields,
    variant: None,
};

fn report_element_list_fields() -> Vec<Field> {
    let mut f = message_preamble(MessageCode::ReportElementList);
    counted_list(
        &mut f,
        "elements",
        "elements_count",
        IntSpec::u16_le(),
        &LIST_ELEMENT_ID,
    );
    f
}

pub static REPORT_ELEMENT_LIST: Schema = Schema {
    name: "ReportElementList",
    fields: report_element_list_fields,
    variant: None,
};

fn report_element_count_fields() -> Vec<Field> {
    let mut f = message_preamble(MessageCode::ReportElementCount);
    f.push(Field::u16_le("element_count"));
    f
}

pub static REPORT_ELEMENT_COUNT: Schema = Schema {
    name: "ReportElementCount",
    fields: report_element_count_fields,
    variant: None,
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ser::FieldMap;
    use crate::protocol::message::Message;

    pub(crate) fn element(uid: u16, prev: u16, next: u16, data: &[u8]) -> Value {
        let args: FieldMap = [
            ("uid", Value::UInt(u64::from(uid))),
            ("prev", Value::UInt(u64::from(prev))),
            ("next", Value::UInt(u64::from(next))),
            ("data", Value::Bytes(data.to_vec())),
        ]
        .into_iter()
        .collect();
        Value::Record(LIST_ELEMENT.instantiate(args).expect("element"))
    }

    #[test]
    fn test_set_element_roundtrip() {
        let msg = Message::build(MessageCode::SetElement)
            .uint("request_id", 1)
            .list(
                "elements",
                vec![element(1, 0, 2, b"ab"), element(2, 1, 0, b"cd")],
            )
            .finish()
            .expect("build");
        let bytes = Message::encode(&msg).unwrap();
        // code(2) + request_id(1) + count(1) + 2 * (uid+prev+next(6) + format(1) + count(2) + data(2))
        assert_eq!(bytes.len(), 2 + 1 + 1 + 2 * 11);
        assert_eq!(Message::decode(&bytes).expect("decode"), msg);
    }

    #[test]
    fn test_element_format_defaults_to_user_data() {
        let rec = match element(1, 0, 0, b"x") {
            Value::Record(r) => r,
            _ => unreachable!(),
        };
        assert_eq!(rec.uint("format").unwrap(), ListElementFormat::UserData as u64);
    }

    #[test]
    fn test_report_element_count_layout() {
        let msg = Message::build(MessageCode::ReportElementCount)
            .uint("element_count", 3)
            .finish()
            .unwrap();
        assert_eq!(
            Message::encode(&msg).unwrap(),
            vec![0x1C, 0x44, 0x03, 0x00]
        );
    }
}
