// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Local waypoint driver: holds the current target waypoint and travel
//! speed. Setting either is a command; the waypoint persists until the next
//! `SetLocalWaypoint`.

use crate::core::ser::{FieldMap, Record, Value};
use crate::protocol::id::Id;
use crate::protocol::message::{Message, MessageCode};
use crate::service::component::ComponentCore;
use crate::service::events::{change_watcher, EventsService};
use crate::service::{HandlerResult, HandlerSpec, Service, ServiceState};
use std::any::Any;
use std::sync::{Arc, Weak};

pub struct LocalWaypointDriverService {
    core: Weak<ComponentCore>,
    state: ServiceState,
}

impl LocalWaypointDriverService {
    pub fn create(core: &Arc<ComponentCore>) -> Arc<dyn Service> {
        let initial: FieldMap = [
            ("x", Value::Float(0.0)),
            ("y", Value::Float(0.0)),
            ("travel_speed", Value::Float(0.0)),
        ]
        .into_iter()
        .collect();
        Arc::new(Self {
            core: Arc::downgrade(core),
            state: ServiceState::new(initial),
        })
    }

    pub fn waypoint(&self) -> (f64, f64) {
        (
            self.state.float("x").unwrap_or(0.0),
            self.state.float("y").unwrap_or(0.0),
        )
    }

    pub fn travel_speed(&self) -> f64 {
        self.state.float("travel_speed").unwrap_or(0.0)
    }

    fn on_set_local_waypoint(&self, message: &Record) -> HandlerResult {
        if let Some(x) = message.opt_float("x")? {
            self.state.set("x", Value::Float(x));
        }
        if let Some(y) = message.opt_float("y")? {
            self.state.set("y", Value::Float(y));
        }
        Ok(None)
    }

    fn on_query_local_waypoint(&self) -> HandlerResult {
        let (x, y) = self.waypoint();
        Ok(Some(
            Message::build(MessageCode::ReportLocalWaypoint)
                .float("x", x)
                .float("y", y)
                .finish()?,
        ))
    }

    fn on_set_travel_speed(&self, message: &Record) -> HandlerResult {
        self.state
            .set("travel_speed", Value::Float(message.float("speed")?));
        Ok(None)
    }

    fn on_query_travel_speed(&self) -> HandlerResult {
        Ok(Some(
            Message::build(MessageCode::ReportTravelSpeed)
                .float("speed", self.travel_speed())
                .finish()?,
        ))
    }
}

impl Service for LocalWaypointDriverService {
    fn name(&self) -> &'static str {
        "local_waypoint_driver"
    }

    fn uri(&self) -> &'static str {
        "urn:jaus:jss:mobility:LocalWaypointDriver"
    }

    fn version(&self) -> (u8, u8) {
        (1, 0)
    }

    fn handlers(&self) -> Vec<HandlerSpec> {
        vec![
            HandlerSpec::command(MessageCode::SetLocalWaypoint),
            HandlerSpec::command(MessageCode::SetTravelSpeed),
            HandlerSpec::new(MessageCode::QueryLocalWaypoint),
            HandlerSpec::new(MessageCode::QueryTravelSpeed),
        ]
    }

    fn handle(&self, message: &Record, _source_id: Id) -> HandlerResult {
        match Message::code_of(message)? {
            MessageCode::SetLocalWaypoint => self.on_set_local_waypoint(message),
            MessageCode::QueryLocalWaypoint => self.on_query_local_waypoint(),
            MessageCode::SetTravelSpeed => self.on_set_travel_speed(message),
            MessageCode::QueryTravelSpeed => self.on_query_travel_speed(),
            _ => Ok(None),
        }
    }

    fn bootstrap(&self) {
        let Some(core) = self.core.upgrade() else {
            return;
        };
        if core.find::<EventsService>().is_some() {
            self.state.watch(
                &["x", "y"],
                change_watcher(self.core.clone(), &[MessageCode::QueryLocalWaypoint]),
            );
            self.state.watch(
                &["travel_speed"],
                change_watcher(self.core.clone(), &[MessageCode::QueryTravelSpeed]),
            );
        }
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
