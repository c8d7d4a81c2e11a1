// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Local pose sensor: reports position/orientation in the local frame.
//!
//! The report carries exactly the fields the query's presence vector asked
//! for; unsensed axes read as zero.

use crate::core::ser::{FieldMap, Record, Value};
use crate::protocol::id::Id;
use crate::protocol::message::{Message, MessageCode};
use crate::protocol::timestamp::Timestamp;
use crate::service::component::ComponentCore;
use crate::service::events::{change_watcher, EventsService};
use crate::service::{HandlerResult, HandlerSpec, Service, ServiceState};
use std::any::Any;
use std::sync::{Arc, Weak};

pub struct LocalPoseSensorService {
    core: Weak<ComponentCore>,
    state: ServiceState,
}

impl LocalPoseSensorService {
    pub fn create(core: &Arc<ComponentCore>) -> Arc<dyn Service> {
        let initial: FieldMap = [
            ("x", Value::Float(0.0)),
            ("y", Value::Float(0.0)),
            ("yaw", Value::Float(0.0)),
        ]
        .into_iter()
        .collect();
        Arc::new(Self {
            core: Arc::downgrade(core),
            state: ServiceState::new(initial),
        })
    }

    /// Feed a new pose estimate (the platform side of the sensor).
    pub fn set_pose(&self, x: f64, y: f64, yaw: f64) {
        self.state.set("x", Value::Float(x));
        self.state.set("y", Value::Float(y));
        self.state.set("yaw", Value::Float(yaw));
    }

    fn on_query_local_pose(&self, message: &Record) -> HandlerResult {
        let requested = message
            .value("presence_vector")
            .and_then(Value::as_names)
            .cloned()
            .unwrap_or_default();

        let mut builder = Message::build(MessageCode::ReportLocalPose);
        for key in ["x", "y", "yaw"] {
            if requested.contains(key) {
                let value = self.state.float(key).unwrap_or(0.0);
                builder = builder.float(key, value);
            }
        }
        if requested.contains("timestamp") {
            builder = builder.value("timestamp", Timestamp::ZERO.to_value());
        }
        Ok(Some(builder.finish()?))
    }
}

impl Service for LocalPoseSensorService {
    fn name(&self) -> &'static str {
        "local_pose_sensor"
    }

    fn uri(&self) -> &'static str {
        "urn:jaus:jss:mobility:LocalPoseSensor"
    }

    fn version(&self) -> (u8, u8) {
        (1, 0)
    }

    fn handlers(&self) -> Vec<HandlerSpec> {
        vec![HandlerSpec::new(MessageCode::QueryLocalPose)]
    }

    fn handle(&self, message: &Record, _source_id: Id) -> HandlerResult {
        match Message::code_of(message)? {
            MessageCode::QueryLocalPose => self.on_query_local_pose(message),
            _ => Ok(None),
        }
    }

    fn bootstrap(&self) {
        let Some(core) = self.core.upgrade() else {
            return;
        };
        if core.find::<EventsService>().is_some() {
            self.state.watch(
                &["x", "y", "yaw"],
                change_watcher(self.core.clone(), &[MessageCode::QueryLocalPose]),
            );
        }
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
