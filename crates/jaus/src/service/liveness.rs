// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Liveness service: answers heartbeat queries.

use super::component::ComponentCore;
use super::{HandlerResult, HandlerSpec, Service};
use crate::core::ser::Record;
use crate::protocol::id::Id;
use crate::protocol::message::{Message, MessageCode};
use std::any::Any;
use std::sync::Arc;

pub struct LivenessService;

impl LivenessService {
    pub fn create(_core: &Arc<ComponentCore>) -> Arc<dyn Service> {
        Arc::new(Self)
    }
}

impl Service for LivenessService {
    fn name(&self) -> &'static str {
        "liveness"
    }

    fn uri(&self) -> &'static str {
        "urn:jaus:jss:core:Liveness"
    }

    fn version(&self) -> (u8, u8) {
        (1, 0)
    }

    fn handlers(&self) -> Vec<HandlerSpec> {
        vec![HandlerSpec::new(MessageCode::QueryHeartbeatPulse)]
    }

    fn handle(&self, message: &Record, _source_id: Id) -> HandlerResult {
        match Message::code_of(message)? {
            MessageCode::QueryHeartbeatPulse => Ok(Some(
                Message::build(MessageCode::ReportHeartbeatPulse).finish()?,
            )),
            _ => Ok(None),
        }
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
