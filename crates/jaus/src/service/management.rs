// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Management service: the component lifecycle state machine.
//!
//! STANDBY <-> READY transitions are commands; Shutdown and Reset release
//! control first. Any source can raise an emergency; the status stays
//! EMERGENCY until every raiser has cleared it, then the prior status is
//! restored.

use super::access_control::AccessControlService;
use super::component::ComponentCore;
use super::events::{change_watcher, EventsService};
use super::{HandlerResult, HandlerSpec, Service, ServiceState};
use crate::core::ser::{FieldMap, Record, Value};
use crate::protocol::id::Id;
use crate::protocol::message::{Message, MessageCode};
use crate::protocol::messages::management::ManagementStatus;
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashSet;
use std::sync::{Arc, Weak};

pub struct ManagementService {
    core: Weak<ComponentCore>,
    state: ServiceState,
    old_status: Mutex<Option<ManagementStatus>>,
    emergency_ids: Mutex<HashSet<Id>>,
}

impl ManagementService {
    pub fn create(core: &Arc<ComponentCore>) -> Arc<dyn Service> {
        let initial: FieldMap = [(
            "status",
            Value::UInt(ManagementStatus::Standby as u64),
        )]
        .into_iter()
        .collect();
        Arc::new(Self {
            core: Arc::downgrade(core),
            state: ServiceState::new(initial),
            old_status: Mutex::new(None),
            emergency_ids: Mutex::new(HashSet::new()),
        })
    }

    pub fn status(&self) -> ManagementStatus {
        self.state
            .uint("status")
            .and_then(|v| ManagementStatus::try_from(v).ok())
            .unwrap_or(ManagementStatus::Failure)
    }

    fn set_status(&self, status: ManagementStatus) {
        log::info!("[svc/management] status -> {:?}", status);
        self.state.set("status", Value::UInt(status as u64));
    }

    fn release_control(&self) {
        if let Some(core) = self.core.upgrade() {
            if let Some(access_control) = core.find::<AccessControlService>() {
                access_control.reject_control(None);
            }
        }
    }

    fn on_shutdown(&self) -> HandlerResult {
        self.release_control();
        self.set_status(ManagementStatus::Shutdown);
        Ok(None)
    }

    fn on_standby(&self) -> HandlerResult {
        if self.status() == ManagementStatus::Ready {
            self.set_status(ManagementStatus::Standby);
        }
        Ok(None)
    }

    fn on_resume(&self) -> HandlerResult {
        if self.status() == ManagementStatus::Standby {
            self.set_status(ManagementStatus::Ready);
        }
        Ok(None)
    }

    fn on_reset(&self) -> HandlerResult {
        if matches!(
            self.status(),
            ManagementStatus::Ready | ManagementStatus::Standby
        ) {
            self.release_control();
            self.set_status(ManagementStatus::Standby);
        }
        Ok(None)
    }

    fn on_set_emergency(&self, source_id: Id) -> HandlerResult {
        self.emergency_ids.lock().insert(source_id);
        if self.status() != ManagementStatus::Emergency {
            *self.old_status.lock() = Some(self.status());
            self.set_status(ManagementStatus::Emergency);
        }
        Ok(None)
    }

    fn on_clear_emergency(&self, source_id: Id) -> HandlerResult {
        let empty = {
            let mut ids = self.emergency_ids.lock();
            ids.remove(&source_id);
            ids.is_empty()
        };
        if empty && self.status() == ManagementStatus::Emergency {
            if let Some(previous) = self.old_status.lock().take() {
                self.set_status(previous);
            }
        }
        Ok(None)
    }

    fn on_query_status(&self) -> HandlerResult {
        Ok(Some(
            Message::build(MessageCode::ReportStatus)
                .uint("status", self.status() as u64)
                .finish()?,
        ))
    }
}

impl Service for ManagementService {
    fn name(&self) -> &'static str {
        "management"
    }

    fn uri(&self) -> &'static str {
        "urn:jaus:jss:core:Management"
    }

    fn version(&self) -> (u8, u8) {
        (1, 0)
    }

    fn handlers(&self) -> Vec<HandlerSpec> {
        vec![
            HandlerSpec::command(MessageCode::Shutdown),
            HandlerSpec::command(MessageCode::Standby),
            HandlerSpec::command(MessageCode::Resume),
            HandlerSpec::command(MessageCode::Reset),
            HandlerSpec::new(MessageCode::SetEmergency),
            HandlerSpec::new(MessageCode::ClearEmergency),
            HandlerSpec::new(MessageCode::QueryStatus),
        ]
    }

    fn handle(&self, message: &Record, source_id: Id) -> HandlerResult {
        match Message::code_of(message)? {
            MessageCode::Shutdown => self.on_shutdown(),
            MessageCode::Standby => self.on_standby(),
            MessageCode::Resume => self.on_resume(),
            MessageCode::Reset => self.on_reset(),
            MessageCode::SetEmergency => self.on_set_emergency(source_id),
            MessageCode::ClearEmergency => self.on_clear_emergency(source_id),
            MessageCode::QueryStatus => self.on_query_status(),
            _ => Ok(None),
        }
    }

    fn bootstrap(&self) {
        let Some(core) = self.core.upgrade() else {
            return;
        };
        if core.find::<EventsService>().is_some() {
            self.state.watch(
                &["status"],
                change_watcher(self.core.clone(), &[MessageCode::QueryStatus]),
            );
        }
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
