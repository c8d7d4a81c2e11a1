// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Local waypoint list driver: exposes the active element of the waypoint
//! list. No list execution yet, so the active element is always none.

use crate::core::ser::Record;
use crate::protocol::id::Id;
use crate::protocol::message::{Message, MessageCode};
use crate::service::component::ComponentCore;
use crate::service::{HandlerResult, HandlerSpec, Service};
use std::any::Any;
use std::sync::Arc;

pub struct LocalWaypointListDriverService;

impl LocalWaypointListDriverService {
    pub fn create(_core: &Arc<ComponentCore>) -> Arc<dyn Service> {
        Arc::new(Self)
    }
}

impl Service for LocalWaypointListDriverService {
    fn name(&self) -> &'static str {
        "local_waypoint_list_driver"
    }

    fn uri(&self) -> &'static str {
        "urn:jaus:jss:mobility:LocalWaypointListDriver"
    }

    fn version(&self) -> (u8, u8) {
        (1, 0)
    }

    fn handlers(&self) -> Vec<HandlerSpec> {
        vec![HandlerSpec::new(MessageCode::QueryActiveElement)]
    }

    fn handle(&self, message: &Record, _source_id: Id) -> HandlerResult {
        match Message::code_of(message)? {
            MessageCode::QueryActiveElement => Ok(Some(
                Message::build(MessageCode::ReportActiveElement)
                    .uint("uid", 0)
                    .finish()?,
            )),
            _ => Ok(None),
        }
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
