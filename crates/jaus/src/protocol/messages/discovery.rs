// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Discovery message schemas: service registration and the four
//! query/report traversal pairs.

use super::{counted_list, counted_string, with_presence_vector};
use crate::core::ser::{CodecError, CodecResult, Field, IntSpec, Schema, Value};
use crate::protocol::id;
use crate::protocol::message::{message_preamble, MessageCode};

/// What a `QueryIdentification` asks about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum IdentificationQueryType {
    System = 1,
    Subsystem = 2,
    Node = 3,
    Component = 4,
}

impl IdentificationQueryType {
    pub(crate) fn check(v: u64) -> bool {
        (1..=4).contains(&v)
    }
}

impl TryFrom<u64> for IdentificationQueryType {
    type Error = CodecError;

    fn try_from(v: u64) -> CodecResult<Self> {
        match v {
            1 => Ok(Self::System),
            2 => Ok(Self::Subsystem),
            3 => Ok(Self::Node),
            4 => Ok(Self::Component),
            other => Err(CodecError::InvalidEnumValue {
                field: "type",
                value: other,
            }),
        }
    }
}

/// What a `QueryConfiguration` asks about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConfigurationQueryType {
    Subsystem = 2,
    Node = 3,
}

impl ConfigurationQueryType {
    pub(crate) fn check(v: u64) -> bool {
        v == 2 || v == 3
    }
}

impl TryFrom<u64> for ConfigurationQueryType {
    type Error = CodecError;

    fn try_from(v: u64) -> CodecResult<Self> {
        match v {
            2 => Ok(Self::Subsystem),
            3 => Ok(Self::Node),
            other => Err(CodecError::InvalidEnumValue {
                field: "type",
                value: other,
            }),
        }
    }
}

/// Identification categories reported by `ReportIdentification`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum IdentificationType {
    Vehicle = 10001,
    Ocu = 20001,
    OtherSubsystem = 30001,
    Node = 40001,
    Payload = 50001,
    Component = 60001,
}

impl IdentificationType {
    pub(crate) fn check(v: u64) -> bool {
        matches!(v, 10001 | 20001 | 30001 | 40001 | 50001 | 60001)
    }
}

fn service_record_fields() -> Vec<Field> {
    let mut f = Vec::new();
    counted_string(&mut f, "uri", "uri_count", IntSpec::u8());
    f.push(Field::u8("major_version"));
    f.push(Field::u8("minor_version"));
    f
}

/// One registered service: URI plus version pair.
pub static SERVICE_RECORD: Schema = Schema {
    name: "ServiceRecord",
    fields: service_record_fields,
    variant: None,
};

fn register_services_fields() -> Vec<Field> {
    let mut f = message_preamble(MessageCode::RegisterServices);
    counted_list(&mut f, "services", "services_count", IntSpec::u8(), &SERVICE_RECORD);
    f
}

pub static REGISTER_SERVICES: Schema = Schema {
    name: "RegisterServices",
    fields: register_services_fields,
    variant: None,
};

fn query_identification_fields() -> Vec<Field> {
    let mut f = message_preamble(MessageCode::QueryIdentification);
    f.push(Field::enum_(
        "type",
        IntSpec::u8(),
        IdentificationQueryType::check,
    ));
    f
}

pub static QUERY_IDENTIFICATION: Schema = Schema {
    name: "QueryIdentification",
    fields: query_identification_fields,
    variant: None,
};

fn query_configuration_fields() -> Vec<Field> {
    let mut f = message_preamble(MessageCode::QueryConfiguration);
    f.push(Field::enum_(
        "type",
        IntSpec::u8(),
        ConfigurationQueryType::check,
    ));
    f
}

pub static QUERY_CONFIGURATION: Schema = Schema {
    name: "QueryConfiguration",
    fields: query_configuration_fields,
    variant: None,
};

fn query_subsystem_list_fields() -> Vec<Field> {
    message_preamble(MessageCode::QuerySubsystemList)
}

pub static QUERY_SUBSYSTEM_LIST: Schema = Schema {
    name: "QuerySubsystemList",
    fields: query_subsystem_list_fields,
    variant: None,
};

fn component_request_fields() -> Vec<Field> {
    vec![Field::u8("id")]
}

pub static COMPONENT_REQUEST: Schema = Schema {
    name: "ComponentRequest",
    fields: component_request_fields,
    variant: None,
};

fn node_request_fields() -> Vec<Field> {
    let mut f = vec![Field::u8("id")];
    counted_list(
        &mut f,
        "components",
        "components_count",
        IntSpec::u8(),
        &COMPONENT_REQUEST,
    );
    f
}

pub static NODE_REQUEST: Schema = Schema {
    name: "NodeRequest",
    fields: node_request_fields,
    variant: None,
};

fn query_services_fields() -> Vec<Field> {
    let mut f = message_preamble(MessageCode::QueryServices);
    counted_list(&mut f, "nodes", "nodes_count", IntSpec::u8(), &NODE_REQUEST);
    f
}

pub static QUERY_SERVICES: Schema = Schema {
    name: "QueryServices",
    fields: query_services_fields,
    variant: None,
};

fn search_filter_fields() -> Vec<Field> {
    let mut f = Vec::new();
    counted_string(&mut f, "value", "value_count", IntSpec::u8());
    f
}

/// Presence-gated counted search string of a `ComponentListRequest`.
pub static SEARCH_FILTER: Schema = Schema {
    name: "SearchFilter",
    fields: search_filter_fields,
    variant: None,
};

fn component_list_request_fields() -> Vec<Field> {
    let mut f = Vec::new();
    with_presence_vector(
        &mut f,
        8,
        vec![Field::u8("id")],
        vec![Field::record("search_filter", &SEARCH_FILTER)],
    );
    f
}

pub static COMPONENT_LIST_REQUEST: Schema = Schema {
    name: "ComponentListRequest",
    fields: component_list_request_fields,
    variant: None,
};

fn node_list_request_fields() -> Vec<Field> {
    let mut f = vec![Field::u8("id")];
    counted_list(
        &mut f,
        "components",
        "components_count",
        IntSpec::u8(),
        &COMPONENT_LIST_REQUEST,
    );
    f
}

pub static NODE_LIST_REQUEST: Schema = Schema {
    name: "NodeListRequest",
    fields: node_list_request_fields,
    variant: None,
};

fn subsystem_list_request_fields() -> Vec<Field> {
    let mut f = vec![Field::u16_le("id")];
    counted_list(
        &mut f,
        "nodes",
        "nodes_count",
        IntSpec::u8(),
        &NODE_LIST_REQUEST,
    );
    f
}

pub static SUBSYSTEM_LIST_REQUEST: Schema = Schema {
    name: "SubsystemListRequest",
    fields: subsystem_list_request_fields,
    variant: None,
};

fn query_service_list_fields() -> Vec<Field> {
    let mut f = message_preamble(MessageCode::QueryServiceList);
    counted_list(
        &mut f,
        "subsystems",
        "subsystems_count",
        IntSpec::u16_le(),
        &SUBSYSTEM_LIST_REQUEST,
    );
    f
}

pub static QUERY_SERVICE_LIST: Schema = Schema {
    name: "QueryServiceList",
    fields: query_service_list_fields,
    variant: None,
};

fn report_identification_fields() -> Vec<Field> {
    let mut f = message_preamble(MessageCode::ReportIdentification);
    f.push(Field::enum_(
        "query_type",
        IntSpec::u8(),
        IdentificationQueryType::check,
    ));
    f.push(Field::enum_(
        "type",
        IntSpec::u16_le(),
        IdentificationType::check,
    ));
    counted_string(
        &mut f,
        "identification",
        "identification_count",
        IntSpec::u16_le(),
    );
    f
}

pub static REPORT_IDENTIFICATION: Schema = Schema {
    name: "ReportIdentification",
    fields: report_identification_fields,
    variant: None,
};

fn component_configuration_report_fields() -> Vec<Field> {
    vec![
        Field::u8("id"),
        Field::u8("instance_id").with_default(Value::UInt(0)),
    ]
}

pub static COMPONENT_CONFIGURATION_REPORT: Schema = Schema {
    name: "ComponentConfigurationReport",
    fields: component_configuration_report_fields,
    variant: None,
};

fn node_configuration_report_fields() -> Vec<Field> {
    let mut f = vec![Field::u8("id")];
    counted_list(
        &mut f,
        "components",
        "components_count",
        IntSpec::u8(),
        &COMPONENT_CONFIGURATION_REPORT,
    );
    f
}

pub static NODE_CONFIGURATION_REPORT: Schema = Schema {
    name: "NodeConfigurationReport",
    fields: node_configuration_report_fields,
    variant: None,
};

fn report_configuration_fields() -> Vec<Field> {
    let mut f = message_preamble(MessageCode::ReportConfiguration);
    counted_list(
        &mut f,
        "nodes",
        "nodes_count",
        IntSpec::u8(),
        &NODE_CONFIGURATION_REPORT,
    );
    f
}

pub static REPORT_CONFIGURATION: Schema = Schema {
    name: "ReportConfiguration",
    fields: report_configuration_fields,
    variant: None,
};

fn report_subsystem_list_fields() -> Vec<Field> {
    let mut f = message_preamble(MessageCode::ReportSubsystemList);
    counted_list(&mut f, "subsystems", "subsystems_count", IntSpec::u8(), &id::ID);
    f
}

pub static REPORT_SUBSYSTEM_LIST: Schema = Schema {
    name: "ReportSubsystemList",
    fields: report_subsystem_list_fields,
    variant: None,
};

fn component_service_list_report_fields() -> Vec<Field> {
    let mut f = vec![
        Field::u8("id"),
        Field::u8("instance_id").with_default(Value::UInt(0)),
    ];
    counted_list(&mut f, "services", "services_count", IntSpec::u8(), &SERVICE_RECORD);
    f
}

pub static COMPONENT_SERVICE_LIST_REPORT: Schema = Schema {
    name: "ComponentServiceListReport",
    fields: component_service_list_report_fields,
    variant: None,
};

fn node_service_list_report_fields() -> Vec<Field> {
    let mut f = vec![Field::u8("id")];
    counted_list(
        &mut f,
        "components",
        "components_count",
        IntSpec::u8(),
        &COMPONENT_SERVICE_LIST_REPORT,
    );
    f
}

pub static NODE_SERVICE_LIST_REPORT: Schema = Schema {
    name: "NodeServiceListReport",
    fields: node_service_list_report_fields,
    variant: None,
};

fn report_services_fields() -> Vec<Field> {
    let mut f = message_preamble(MessageCode::ReportServices);
    counted_list(
        &mut f,
        "nodes",
        "nodes_count",
        IntSpec::u8(),
        &NODE_SERVICE_LIST_REPORT,
    );
    f
}

pub static REPORT_SERVICES: Schema = Schema {
    name: "ReportServices",
    fields: report_services_fields,
    variant: None,
};

fn subsystem_service_list_report_fields() -> Vec<Field> {
    let mut f = vec![Field::u16_le("id")];
    counted_list(
        &mut f,
        "nodes",
        "nodes_count",
        IntSpec::u8(),
        &NODE_SERVICE_LIST_REPORT,
    );
    f
}

pub static SUBSYSTEM_SERVICE_LIST_REPORT: Schema = Schema {
    name: "SubsystemServiceListReport",
    fields: subsystem_service_list_report_fields,
    variant: None,
};

fn report_service_list_fields() -> Vec<Field> {
    let mut f = message_preamble(MessageCode::ReportServiceList);
    counted_list(
        &mut f,
        "subsystems",
        "subsystems_count",
        IntSpec::u16_le(),
        &SUBSYSTEM_SERVICE_LIST_REPORT,
    );
    f
}

pub static REPORT_SERVICE_LIST: Schema = Schema {
    name: "ReportServiceList",
    fields: report_service_list_fields,
    variant: None,
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ser::{self, FieldMap};
    use crate::protocol::message::Message;

    #[test]
    fn test_query_identification_known_vector() {
        let decoded = Message::decode(&[0x00, 0x2B, 0x02]).expect("decode");
        assert_eq!(decoded.schema_name(), "QueryIdentification");
        assert_eq!(
            decoded.uint("type").unwrap(),
            IdentificationQueryType::Subsystem as u64
        );
    }

    #[test]
    fn test_service_record_counted_uri() {
        let args: FieldMap = [
            ("uri", Value::Str("urn:jaus:jss:core:Events".into())),
            ("major_version", Value::UInt(1)),
            ("minor_version", Value::UInt(0)),
        ]
        .into_iter()
        .collect();
        let rec = SERVICE_RECORD.instantiate(args).expect("instantiate");
        let bytes = ser::encode(&rec).expect("encode");
        assert_eq!(bytes[0] as usize, "urn:jaus:jss:core:Events".len());
        assert_eq!(bytes.len(), 1 + 24 + 2);

        let decoded = SERVICE_RECORD.decode(&bytes).expect("decode");
        assert_eq!(decoded, rec);
        assert_eq!(decoded.str_("uri").unwrap(), "urn:jaus:jss:core:Events");
    }

    #[test]
    fn test_report_identification_roundtrip() {
        let msg = Message::build(MessageCode::ReportIdentification)
            .uint("query_type", IdentificationQueryType::Subsystem as u64)
            .uint("type", IdentificationType::Vehicle as u64)
            .str_("identification", "TestSubsystem")
            .finish()
            .expect("build");
        let bytes = Message::encode(&msg).unwrap();
        let decoded = Message::decode(&bytes).expect("decode");
        assert_eq!(decoded, msg);
        assert_eq!(decoded.str_("identification").unwrap(), "TestSubsystem");
    }

    #[test]
    fn test_component_list_request_optional_filter() {
        // Without a filter the presence vector is empty.
        let rec = COMPONENT_LIST_REQUEST
            .instantiate([("id", Value::UInt(7))].into_iter().collect())
            .expect("instantiate");
        let bytes = ser::encode(&rec).expect("encode");
        assert_eq!(bytes, vec![0x00, 0x07]);

        // With a filter the nested counted string follows.
        let filter = SEARCH_FILTER
            .instantiate([("value", Value::Str("nav".into()))].into_iter().collect())
            .expect("filter");
        let rec = COMPONENT_LIST_REQUEST
            .instantiate(
                [
                    ("id", Value::UInt(7)),
                    ("search_filter", Value::Record(filter)),
                ]
                .into_iter()
                .collect(),
            )
            .expect("instantiate");
        let bytes = ser::encode(&rec).expect("encode");
        assert_eq!(bytes, vec![0x01, 0x07, 0x03, b'n', b'a', b'v']);
    }
}
