// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Liveness message schemas: the heartbeat query/report pair.

use crate::core::ser::{Field, Schema};
use crate::protocol::message::{message_preamble, MessageCode};

fn query_heartbeat_fields() -> Vec<Field> {
    message_preamble(MessageCode::QueryHeartbeatPulse)
}

pub static QUERY_HEARTBEAT_PULSE: Schema = Schema {
    name: "QueryHeartbeatPulse",
    fields: query_heartbeat_fields,
    variant: None,
};

fn report_heartbeat_fields() -> Vec<Field> {
    message_preamble(MessageCode::ReportHeartbeatPulse)
}

pub static REPORT_HEARTBEAT_PULSE: Schema = Schema {
    name: "ReportHeartbeatPulse",
    fields: report_heartbeat_fields,
    variant: None,
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::message::Message;

    #[test]
    fn test_heartbeat_pair_is_code_only() {
        let query = Message::build(MessageCode::QueryHeartbeatPulse)
            .finish()
            .unwrap();
        assert_eq!(Message::encode(&query).unwrap(), vec![0x02, 0x22]);

        let report = Message::build(MessageCode::ReportHeartbeatPulse)
            .finish()
            .unwrap();
        assert_eq!(Message::encode(&report).unwrap(), vec![0x02, 0x42]);
    }
}
