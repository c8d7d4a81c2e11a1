// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Velocity state sensor: a stateless shell reporting zero motion for
//! whichever fields the query selects.

use crate::core::ser::{Record, Value};
use crate::protocol::id::Id;
use crate::protocol::message::{Message, MessageCode};
use crate::protocol::timestamp::Timestamp;
use crate::service::component::ComponentCore;
use crate::service::{HandlerResult, HandlerSpec, Service};
use std::any::Any;
use std::sync::Arc;

pub struct VelocityStateSensorService;

impl VelocityStateSensorService {
    pub fn create(_core: &Arc<ComponentCore>) -> Arc<dyn Service> {
        Arc::new(Self)
    }

    fn on_query_velocity_state(&self, message: &Record) -> HandlerResult {
        let requested = message
            .value("presence_vector")
            .and_then(Value::as_names)
            .cloned()
            .unwrap_or_default();

        let mut builder = Message::build(MessageCode::ReportVelocityState);
        for key in [
            "x",
            "y",
            "z",
            "velocity_rms",
            "roll",
            "pitch",
            "yaw_rate",
            "angular_rms",
        ] {
            if requested.contains(key) {
                builder = builder.float(key, 0.0);
            }
        }
        if requested.contains("timestamp") {
            builder = builder.value("timestamp", Timestamp::ZERO.to_value());
        }
        Ok(Some(builder.finish()?))
    }
}

impl Service for VelocityStateSensorService {
    fn name(&self) -> &'static str {
        "velocity_state_sensor"
    }

    fn uri(&self) -> &'static str {
        "urn:jaus:jss:mobility:VelocityStateSensor"
    }

    fn version(&self) -> (u8, u8) {
        (1, 0)
    }

    fn handlers(&self) -> Vec<HandlerSpec> {
        vec![HandlerSpec::new(MessageCode::QueryVelocityState)]
    }

    fn handle(&self, message: &Record, _source_id: Id) -> HandlerResult {
        match Message::code_of(message)? {
            MessageCode::QueryVelocityState => self.on_query_velocity_state(message),
            _ => Ok(None),
        }
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
