// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Mobility message schemas: local pose, velocity state, waypoint driver,
//! and waypoint list driver.
//!
//! All real-valued fields are scaled fixed-point over the SAE AS6009
//! parameter ranges.

use super::with_presence_vector;
use crate::core::ser::{Field, IntSpec, Schema};
use crate::protocol::message::{message_preamble, MessageCode};
use crate::protocol::timestamp::TIMESTAMP;
use std::f64::consts::PI;

/// Position range in meters for local-frame coordinates.
const POSITION_RANGE: (f64, f64) = (-100_000.0, 100_000.0);

fn position(name: &'static str) -> Field {
    Field::scaled_float(name, IntSpec::u32_le(), POSITION_RANGE.0, POSITION_RANGE.1)
}

fn angle(name: &'static str) -> Field {
    Field::scaled_float(name, IntSpec::u16_le(), -PI, PI)
}

// ===== Local pose sensor =====

const POSE_FIELDS: [&str; 9] = [
    "x",
    "y",
    "z",
    "position_rms",
    "roll",
    "pitch",
    "yaw",
    "attitude_rms",
    "timestamp",
];

fn query_local_pose_fields() -> Vec<Field> {
    let mut f = message_preamble(MessageCode::QueryLocalPose);
    f.push(Field::presence_vector(
        "presence_vector",
        16,
        POSE_FIELDS.to_vec(),
    ));
    f
}

pub static QUERY_LOCAL_POSE: Schema = Schema {
    name: "QueryLocalPose",
    fields: query_local_pose_fields,
    variant: None,
};

fn report_local_pose_fields() -> Vec<Field> {
    let mut f = message_preamble(MessageCode::ReportLocalPose);
    with_presence_vector(
        &mut f,
        16,
        vec![],
        vec![
            position("x"),
            position("y"),
            position("z"),
            Field::scaled_float("position_rms", IntSpec::u32_le(), 0.0, 100.0),
            angle("roll"),
            angle("pitch"),
            angle("yaw"),
            Field::scaled_float("attitude_rms", IntSpec::u16_le(), 0.0, PI),
            Field::record("timestamp", &TIMESTAMP),
        ],
    );
    f
}

pub static REPORT_LOCAL_POSE: Schema = Schema {
    name: "ReportLocalPose",
    fields: report_local_pose_fields,
    variant: None,
};

// ===== Velocity state sensor =====

const VELOCITY_FIELDS: [&str; 9] = [
    "x",
    "y",
    "z",
    "velocity_rms",
    "roll",
    "pitch",
    "yaw_rate",
    "angular_rms",
    "timestamp",
];

fn query_velocity_state_fields() -> Vec<Field> {
    let mut f = message_preamble(MessageCode::QueryVelocityState);
    f.push(Field::presence_vector(
        "presence_vector",
        16,
        VELOCITY_FIELDS.to_vec(),
    ));
    f
}

pub static QUERY_VELOCITY_STATE: Schema = Schema {
    name: "QueryVelocityState",
    fields: query_velocity_state_fields,
    variant: None,
};

fn report_velocity_state_fields() -> Vec<Field> {
    let mut f = message_preamble(MessageCode::ReportVelocityState);
    with_presence_vector(
        &mut f,
        16,
        vec![],
        vec![
            Field::scaled_float("x", IntSpec::u32_le(), -327.68, 327.67),
            Field::scaled_float("y", IntSpec::u32_le(), -327.68, 327.67),
            Field::scaled_float("z", IntSpec::u32_le(), -327.68, 327.67),
            Field::scaled_float("velocity_rms", IntSpec::u32_le(), 0.0, 100.0),
            Field::scaled_float("roll", IntSpec::u16_le(), -32.768, 32.767),
            Field::scaled_float("pitch", IntSpec::u16_le(), -32.768, 32.767),
            Field::scaled_float("yaw_rate", IntSpec::u16_le(), -32.768, 32.767),
            Field::scaled_float("angular_rms", IntSpec::u16_le(), 0.0, PI),
            Field::record("timestamp", &TIMESTAMP),
        ],
    );
    f
}

pub static REPORT_VELOCITY_STATE: Schema = Schema {
    name: "ReportVelocityState",
    fields: report_velocity_state_fields,
    variant: None,
};

// ===== Local waypoint driver =====

fn local_waypoint(out: &mut Vec<Field>) {
    with_presence_vector(
        out,
        8,
        vec![position("x"), position("y")],
        vec![
            position("z"),
            angle("roll"),
            angle("pitch"),
            angle("yaw"),
            Field::scaled_float("waypoint_tolerance", IntSpec::u16_le(), 0.0, 100.0),
            Field::scaled_float("path_tolerance", IntSpec::u32_le(), 0.0, 100_000.0),
        ],
    );
}

fn set_local_waypoint_fields() -> Vec<Field> {
    let mut f = message_preamble(MessageCode::SetLocalWaypoint);
    local_waypoint(&mut f);
    f
}

pub static SET_LOCAL_WAYPOINT: Schema = Schema {
    name: "SetLocalWaypoint",
    fields: set_local_waypoint_fields,
    variant: None,
};

fn report_local_waypoint_fields() -> Vec<Field> {
    let mut f = message_preamble(MessageCode::ReportLocalWaypoint);
    local_waypoint(&mut f);
    f
}

pub static REPORT_LOCAL_WAYPOINT: Schema = Schema {
    name: "ReportLocalWaypoint",
    fields: report_local_waypoint_fields,
    variant: None,
};

const WAYPOINT_FIELDS: [&str; 8] = [
    "x",
    "y",
    "z",
    "roll",
    "pitch",
    "yaw",
    "waypoint_tolerance",
    "path_tolerance",
];

fn query_local_waypoint_fields() -> Vec<Field> {
    let mut f = message_preamble(MessageCode::QueryLocalWaypoint);
    f.push(Field::presence_vector(
        "presence_vector",
        8,
        WAYPOINT_FIELDS.to_vec(),
    ));
    f
}

pub static QUERY_LOCAL_WAYPOINT: Schema = Schema {
    name: "QueryLocalWaypoint",
    fields: query_local_waypoint_fields,
    variant: None,
};

/// Travel speed range in meters per second.
pub const TRAVEL_SPEED_RANGE: (f64, f64) = (0.0, 327.67);

fn travel_speed(name: &'static str) -> Field {
    Field::scaled_float(
        name,
        IntSpec::u32_le(),
        TRAVEL_SPEED_RANGE.0,
        TRAVEL_SPEED_RANGE.1,
    )
}

fn set_travel_speed_fields() -> Vec<Field> {
    let mut f = message_preamble(MessageCode::SetTravelSpeed);
    f.push(travel_speed("speed"));
    f
}

pub static SET_TRAVEL_SPEED: Schema = Schema {
    name: "SetTravelSpeed",
    fields: set_travel_speed_fields,
    variant: None,
};

fn query_travel_speed_fields() -> Vec<Field> {
    message_preamble(MessageCode::QueryTravelSpeed)
}

pub static QUERY_TRAVEL_SPEED: Schema = Schema {
    name: "QueryTravelSpeed",
    fields: query_travel_speed_fields,
    variant: None,
};

fn report_travel_speed_fields() -> Vec<Field> {
    let mut f = message_preamble(MessageCode::ReportTravelSpeed);
    f.push(travel_speed("speed"));
    f
}

pub static REPORT_TRAVEL_SPEED: Schema = Schema {
    name: "ReportTravelSpeed",
    fields: report_travel_speed_fields,
    variant: None,
};

// ===== Local waypoint list driver =====

fn query_active_element_fields() -> Vec<Field> {
    message_preamble(MessageCode::QueryActiveElement)
}

pub static QUERY_ACTIVE_ELEMENT: Schema = Schema {
    name: "QueryActiveElement",
    fields: query_active_element_fields,
    variant: None,
};

fn report_active_element_fields() -> Vec<Field> {
    let mut f = message_preamble(MessageCode::ReportActiveElement);
    f.push(Field::u16_le("uid"));
    f
}

pub static REPORT_ACTIVE_ELEMENT: Schema = Schema {
    name: "ReportActiveElement",
    fields: report_active_element_fields,
    variant: None,
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::message::Message;

    #[test]
    fn test_set_local_waypoint_known_vector() {
        let bytes = [
            0x0D, 0x04, 0x00, 0xDC, 0x46, 0x03, 0x80, 0x00, 0x00, 0x00, 0x80,
        ];
        let decoded = Message::decode(&bytes).expect("decode");
        assert_eq!(decoded.schema_name(), "SetLocalWaypoint");

        let x = decoded.float("x").unwrap();
        let y = decoded.float("y").unwrap();
        assert!((x - 10.000_006_298_068_91).abs() < 1e-9, "x was {}", x);
        assert!((y - 2.328_306_436_538_696_3e-5).abs() < 1e-12, "y was {}", y);
        assert!(decoded.value("z").unwrap().is_null());

        let reencoded = Message::encode(&decoded).expect("encode");
        assert_eq!(reencoded, bytes.to_vec());
    }

    #[test]
    fn test_report_velocity_state_partial_presence() {
        let msg = Message::build(MessageCode::ReportVelocityState)
            .float("x", 1.5)
            .float("yaw_rate", -0.25)
            .finish()
            .expect("build");
        let bytes = Message::encode(&msg).unwrap();
        // code(2) + vector(2) + x(4) + yaw_rate(2)
        assert_eq!(bytes.len(), 10);
        // Bit 0 is x, bit 6 is yaw_rate.
        assert_eq!(bytes[2], 0b0100_0001);
        assert_eq!(bytes[3], 0);

        let decoded = Message::decode(&bytes).expect("decode");
        assert!(decoded.value("roll").unwrap().is_null());
        let x = decoded.float("x").unwrap();
        assert!((x - 1.5).abs() < 1e-3);
    }

    #[test]
    fn test_travel_speed_roundtrip() {
        let msg = Message::build(MessageCode::SetTravelSpeed)
            .float("speed", 12.25)
            .finish()
            .expect("build");
        let bytes = Message::encode(&msg).unwrap();
        assert_eq!(bytes.len(), 6);
        let decoded = Message::decode(&bytes).expect("decode");
        let speed = decoded.float("speed").unwrap();
        assert!((speed - 12.25).abs() < 1e-4);
    }

    #[test]
    fn test_report_active_element_layout() {
        let msg = Message::build(MessageCode::ReportActiveElement)
            .uint("uid", 0)
            .finish()
            .unwrap();
        assert_eq!(Message::encode(&msg).unwrap(), vec![0x1E, 0x44, 0x00, 0x00]);
    }
}
