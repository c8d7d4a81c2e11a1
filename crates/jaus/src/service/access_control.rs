// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Access-control service: arbitrates exclusive command authority.
//!
//! One client at a time holds control, won by `RequestControl` with enough
//! authority, kept alive by refreshing before the timeout, and lost to
//! release, timeout, or pre-emption by a higher authority. The departing
//! controller is always told with `RejectControl(CONTROL_RELEASED)`.

use super::component::ComponentCore;
use super::events::{change_watcher, EventsService};
use super::management::ManagementService;
use super::{HandlerResult, HandlerSpec, Service, ServiceState};
use crate::config::CONTROL_TIMEOUT;
use crate::core::ser::{FieldMap, Record, Value};
use crate::protocol::id::Id;
use crate::protocol::message::{Message, MessageCode};
use crate::protocol::messages::access_control::{ConfirmControlCode, RejectControlCode};
use crate::protocol::messages::management::ManagementStatus;
use parking_lot::Mutex;
use std::any::Any;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;

pub struct AccessControlService {
    core: Weak<ComponentCore>,
    weak_self: Weak<AccessControlService>,
    state: ServiceState,
    timeout: Mutex<Duration>,
    timeout_task: Mutex<Option<JoinHandle<()>>>,
}

impl AccessControlService {
    pub fn create(core: &Arc<ComponentCore>) -> Arc<dyn Service> {
        let service = Arc::new_cyclic(|weak_self| {
            let initial: FieldMap = [
                ("controlling_component", Value::Null),
                (
                    "authority",
                    Value::UInt(u64::from(core.default_authority)),
                ),
            ]
            .into_iter()
            .collect();
            Self {
                core: Arc::downgrade(core),
                weak_self: weak_self.clone(),
                state: ServiceState::new(initial),
                timeout: Mutex::new(CONTROL_TIMEOUT),
                timeout_task: Mutex::new(None),
            }
        });
        service.reset_timeout();
        service
    }

    /// Shrink the timeout (tests drive this).
    pub fn set_timeout(&self, timeout: Duration) {
        *self.timeout.lock() = timeout;
    }

    pub fn controlling_component(&self) -> Option<Id> {
        match self.state.get("controlling_component") {
            Some(Value::Record(rec)) => Id::from_record(&rec).ok(),
            _ => None,
        }
    }

    pub fn is_controlled(&self) -> bool {
        self.controlling_component().is_some()
    }

    pub fn has_control(&self, component_id: Id) -> bool {
        self.controlling_component() == Some(component_id)
    }

    pub fn authority(&self) -> u8 {
        self.state.uint("authority").unwrap_or(0) as u8
    }

    fn default_authority(&self) -> u8 {
        self.core
            .upgrade()
            .map(|core| core.default_authority)
            .unwrap_or(0)
    }

    fn set_controlling(&self, id: Option<Id>) {
        let value = match id {
            Some(id) => id.to_value(),
            None => Value::Null,
        };
        self.state.set("controlling_component", value);
    }

    fn set_authority(&self, authority: u8) {
        self.state.set("authority", Value::UInt(u64::from(authority)));
    }

    /// Control is only grantable while management reports READY or STANDBY.
    /// Without a management service, control is always available.
    fn control_available(&self) -> bool {
        let Some(core) = self.core.upgrade() else {
            return false;
        };
        match core.find::<ManagementService>() {
            Some(management) => matches!(
                management.status(),
                ManagementStatus::Ready | ManagementStatus::Standby
            ),
            None => true,
        }
    }

    /// Restart the control timeout from now.
    fn reset_timeout(&self) {
        let timeout = *self.timeout.lock();
        let mut slot = self.timeout_task.lock();
        if let Some(task) = slot.take() {
            task.abort();
        }
        if timeout.is_zero() {
            return;
        }
        let weak = self.weak_self.clone();
        *slot = Some(tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let Some(service) = weak.upgrade() else {
                return;
            };
            service.on_timeout_expired();
        }));
    }

    fn on_timeout_expired(&self) {
        if !self.is_controlled() {
            return;
        }
        if !self.control_available() {
            self.reset_timeout();
            return;
        }
        let Some(controller) = self.controlling_component() else {
            return;
        };
        log::info!("[svc/access_control] control by {} timed out", controller);
        self.set_controlling(None);
        self.notify_released(controller);
    }

    fn notify_released(&self, old_controller: Id) {
        let Some(core) = self.core.upgrade() else {
            return;
        };
        match Message::build(MessageCode::RejectControl)
            .uint("response_code", RejectControlCode::ControlReleased as u64)
            .finish()
        {
            Ok(reject) => core.post_message(&reject, old_controller),
            Err(err) => log::error!("[svc/access_control] reject encode failed: {}", err),
        }
    }

    /// Take control away from the current holder (pre-emption, shutdown,
    /// reset), notifying them, and hand it to `new_controller` if any.
    pub fn reject_control(&self, new_controller: Option<Id>) {
        if let Some(old) = self.controlling_component() {
            self.reset_timeout();
            self.set_controlling(new_controller);
            self.notify_released(old);
        }
    }

    fn confirm(&self, code: ConfirmControlCode) -> HandlerResult {
        Ok(Some(
            Message::build(MessageCode::ConfirmControl)
                .uint("response_code", code as u64)
                .finish()?,
        ))
    }

    fn reject(&self, code: RejectControlCode) -> HandlerResult {
        Ok(Some(
            Message::build(MessageCode::RejectControl)
                .uint("response_code", code as u64)
                .finish()?,
        ))
    }

    fn on_request_control(&self, message: &Record, source_id: Id) -> HandlerResult {
        let requested = message.u8("authority_code")?;

        if !self.control_available() {
            return self.confirm(ConfirmControlCode::NotAvailable);
        }

        match self.controlling_component() {
            None => {
                if self.default_authority() > requested {
                    self.confirm(ConfirmControlCode::InsufficientAuthority)
                } else {
                    self.set_controlling(Some(source_id));
                    self.set_authority(requested);
                    self.reset_timeout();
                    self.confirm(ConfirmControlCode::ControlAccepted)
                }
            }
            Some(controller) if controller == source_id => {
                if self.default_authority() > requested {
                    // The controller's authority fell below ours; let go.
                    self.reset_timeout();
                    self.set_controlling(None);
                    self.reject(RejectControlCode::ControlReleased)
                } else {
                    self.set_authority(requested);
                    self.reset_timeout();
                    self.confirm(ConfirmControlCode::ControlAccepted)
                }
            }
            Some(_) => {
                if self.authority() < requested {
                    self.set_authority(requested);
                    self.reject_control(Some(source_id));
                    self.reset_timeout();
                    self.confirm(ConfirmControlCode::ControlAccepted)
                } else {
                    self.confirm(ConfirmControlCode::InsufficientAuthority)
                }
            }
        }
    }

    fn on_release_control(&self, source_id: Id) -> HandlerResult {
        match self.controlling_component() {
            None => self.reject(RejectControlCode::ControlReleased),
            Some(controller) => {
                if !self.control_available() {
                    return self.reject(RejectControlCode::NotAvailable);
                }
                if controller == source_id {
                    self.reset_timeout();
                    self.set_controlling(None);
                    self.reject(RejectControlCode::ControlReleased)
                } else {
                    // Only the controlling client may release.
                    Ok(None)
                }
            }
        }
    }

    fn on_set_authority(&self, message: &Record, source_id: Id) -> HandlerResult {
        // Gated by hand: the gate itself lives in this service.
        if !self.has_control(source_id) {
            return Ok(None);
        }
        let authority = message.u8("authority_code")?;
        if authority <= self.authority() && authority >= self.default_authority() {
            self.set_authority(authority);
        }
        Ok(None)
    }

    fn on_query_control(&self) -> HandlerResult {
        let controller = self.controlling_component().unwrap_or(Id::ZERO);
        Ok(Some(
            Message::build(MessageCode::ReportControl)
                .value("id", controller.to_value())
                .uint("authority_code", u64::from(self.authority()))
                .finish()?,
        ))
    }

    fn on_query_authority(&self) -> HandlerResult {
        Ok(Some(
            Message::build(MessageCode::ReportAuthority)
                .uint("authority_code", u64::from(self.authority()))
                .finish()?,
        ))
    }

    fn on_query_timeout(&self) -> HandlerResult {
        Ok(Some(
            Message::build(MessageCode::ReportTimeout)
                .uint("timeout", self.timeout.lock().as_secs())
                .finish()?,
        ))
    }
}

impl Service for AccessControlService {
    fn name(&self) -> &'static str {
        "access_control"
    }

    fn uri(&self) -> &'static str {
        "urn:jaus:jss:core:AccessControl"
    }

    fn version(&self) -> (u8, u8) {
        (1, 0)
    }

    fn handlers(&self) -> Vec<HandlerSpec> {
        vec![
            HandlerSpec::no_events(MessageCode::RequestControl),
            HandlerSpec::no_events(MessageCode::ReleaseControl),
            HandlerSpec::no_events(MessageCode::SetAuthority),
            HandlerSpec::new(MessageCode::QueryControl),
            HandlerSpec::new(MessageCode::QueryAuthority),
            HandlerSpec::new(MessageCode::QueryTimeout),
        ]
    }

    fn handle(&self, message: &Record, source_id: Id) -> HandlerResult {
        match Message::code_of(message)? {
            MessageCode::RequestControl => self.on_request_control(message, source_id),
            MessageCode::ReleaseControl => self.on_release_control(source_id),
            MessageCode::SetAuthority => self.on_set_authority(message, source_id),
            MessageCode::QueryControl => self.on_query_control(),
            MessageCode::QueryAuthority => self.on_query_authority(),
            MessageCode::QueryTimeout => self.on_query_timeout(),
            _ => Ok(None),
        }
    }

    fn bootstrap(&self) {
        let Some(core) = self.core.upgrade() else {
            return;
        };
        if core.find::<EventsService>().is_some() {
            self.state.watch(
                &["controlling_component"],
                change_watcher(self.core.clone(), &[MessageCode::QueryControl]),
            );
            self.state.watch(
                &["authority"],
                change_watcher(self.core.clone(), &[MessageCode::QueryAuthority]),
            );
        }
    }

    fn close(&self) {
        if let Some(task) = self.timeout_task.lock().take() {
            task.abort();
        }
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
