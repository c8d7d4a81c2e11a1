// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Events service: periodic and on-change event subscriptions.
//!
//! A subscriber registers a query message; the service re-dispatches that
//! query locally to produce a report and wraps it in an `Event` message,
//! either on a timer (PERIODIC) or whenever a watched state key changes
//! (EVERY_CHANGE). Every subscription expires after the event timeout with a
//! final `ConfirmEventRequest`.

use super::component::ComponentCore;
use super::{HandlerResult, HandlerSpec, Service, ServiceError};
use crate::config::EVENT_TIMEOUT;
use crate::core::ser::{Record, Value};
use crate::protocol::id::Id;
use crate::protocol::message::{Message, MessageCode};
use crate::protocol::messages::events::{
    EventType, QueryEventsVariant, RejectEventCode, EVENT_ENTRY,
};
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Build a state watcher that re-fires EVERY_CHANGE subscriptions for the
/// given query codes.
pub fn change_watcher(
    core: Weak<ComponentCore>,
    query_codes: &'static [MessageCode],
) -> impl Fn() + Send + Sync {
    move || {
        let Some(core) = core.upgrade() else {
            return;
        };
        if let Some(events) = core.find::<EventsService>() {
            events.post_change(query_codes);
        }
    }
}

struct EventRecord {
    id: u8,
    destination_id: Id,
    query: Record,
    event_type: EventType,
    periodic_rate: f64,
    request_id: u8,
    sequence_number: u8,
    timeout_task: JoinHandle<()>,
    periodic_task: Option<JoinHandle<()>>,
}

impl EventRecord {
    fn stop(&self) {
        self.timeout_task.abort();
        if let Some(task) = &self.periodic_task {
            task.abort();
        }
    }
}

pub struct EventsService {
    core: Weak<ComponentCore>,
    weak_self: Weak<EventsService>,
    events: Mutex<HashMap<u8, EventRecord>>,
    next_event_id: Mutex<u8>,
    event_timeout: Mutex<Duration>,
}

impl EventsService {
    pub fn create(core: &Arc<ComponentCore>) -> Arc<dyn Service> {
        Arc::new_cyclic(|weak_self| Self {
            core: Arc::downgrade(core),
            weak_self: weak_self.clone(),
            events: Mutex::new(HashMap::new()),
            next_event_id: Mutex::new(0),
            event_timeout: Mutex::new(EVENT_TIMEOUT),
        })
    }

    /// Shrink the subscription timeout (tests drive this).
    pub fn set_event_timeout(&self, timeout: Duration) {
        *self.event_timeout.lock() = timeout;
    }

    fn next_event_id(&self) -> u8 {
        let mut next = self.next_event_id.lock();
        let id = *next;
        *next = next.wrapping_add(1);
        id
    }

    /// Periodic subscriptions are served at a fixed 5 Hz regardless of the
    /// requested rate; on-change subscriptions have no rate.
    fn normalise_periodic_rate(&self, _requested: f64, event_type: EventType) -> f64 {
        match event_type {
            EventType::EveryChange => 0.0,
            EventType::Periodic => 5.0,
        }
    }

    /// Dispatch the event's query locally and send the produced report.
    fn fire_event(&self, event_id: u8) {
        let Some(core) = self.core.upgrade() else {
            return;
        };
        let (query, destination, sequence_number) = {
            let events = self.events.lock();
            let Some(event) = events.get(&event_id) else {
                return;
            };
            (
                event.query.clone(),
                event.destination_id,
                event.sequence_number,
            )
        };

        let report = match core.dispatch(&query, destination) {
            Ok(Some(report)) => report,
            Ok(None) => {
                log::debug!(
                    "[svc/events] query {} produced no report for event {}",
                    query.schema_name(),
                    event_id
                );
                return;
            }
            Err(err) => {
                log::warn!(
                    "[svc/events] query dispatch failed for event {}: {}",
                    event_id,
                    err
                );
                return;
            }
        };

        let report_bytes = match Message::encode(&report) {
            Ok(bytes) => bytes,
            Err(err) => {
                log::error!("[svc/events] report encode failed: {}", err);
                return;
            }
        };
        match Message::build(MessageCode::Event)
            .uint("event_id", u64::from(event_id))
            .uint("sequence_number", u64::from(sequence_number))
            .bytes("report_message", report_bytes)
            .finish()
        {
            Ok(event_message) => core.post_message(&event_message, destination),
            Err(err) => log::error!("[svc/events] event encode failed: {}", err),
        }

        if let Some(event) = self.events.lock().get_mut(&event_id) {
            event.sequence_number = event.sequence_number.wrapping_add(1);
        }
    }

    fn spawn_timeout_task(&self, event_id: u8) -> JoinHandle<()> {
        let weak = self.weak_self.clone();
        let timeout = *self.event_timeout.lock();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let Some(service) = weak.upgrade() else {
                return;
            };
            service.expire_event(event_id);
        })
    }

    fn spawn_periodic_task(&self, event_id: u8, rate: f64) -> Option<JoinHandle<()>> {
        if rate <= 0.0 {
            return None;
        }
        let weak = self.weak_self.clone();
        let period = Duration::from_secs_f64(1.0 / rate);
        Some(tokio::spawn(async move {
            loop {
                let Some(service) = weak.upgrade() else {
                    return;
                };
                service.fire_event(event_id);
                drop(service);
                tokio::time::sleep(period).await;
            }
        }))
    }

    /// Timeout expiry: drop the record and send the closing confirmation.
    fn expire_event(&self, event_id: u8) {
        let removed = {
            let mut events = self.events.lock();
            events.remove(&event_id)
        };
        let Some(event) = removed else {
            return;
        };
        if let Some(task) = &event.periodic_task {
            task.abort();
        }
        log::debug!("[svc/events] event {} timed out", event_id);

        let Some(core) = self.core.upgrade() else {
            return;
        };
        match Message::build(MessageCode::ConfirmEventRequest)
            .uint("request_id", u64::from(event.request_id))
            .uint("event_id", u64::from(event.id))
            .float("confirmed_periodic_rate", event.periodic_rate)
            .finish()
        {
            Ok(confirm) => core.post_message(&confirm, event.destination_id),
            Err(err) => log::error!("[svc/events] confirm encode failed: {}", err),
        }
    }

    /// State-change hook: fire every EVERY_CHANGE event whose query message
    /// code is in `codes`, once.
    pub fn post_change(&self, codes: &[MessageCode]) {
        let matching: Vec<u8> = {
            let events = self.events.lock();
            events
                .values()
                .filter(|event| {
                    event.event_type == EventType::EveryChange
                        && Message::code_of(&event.query)
                            .map(|code| codes.contains(&code))
                            .unwrap_or(false)
                })
                .map(|event| event.id)
                .collect()
        };
        for event_id in matching {
            self.fire_event(event_id);
        }
    }

    /// Number of live subscriptions (introspection and tests).
    pub fn active_events(&self) -> usize {
        self.events.lock().len()
    }

    fn install_event(
        &self,
        event_id: u8,
        message: &Record,
        source_id: Id,
    ) -> Result<f64, ServiceError> {
        let event_type = EventType::try_from(message.uint("event_type")?)?;
        let requested = message.float("requested_periodic_rate")?;
        let request_id = message.u8("request_id")?;
        let query_bytes = message.bytes("query_message")?;
        let query = Message::decode(query_bytes).map_err(|err| {
            log::warn!(
                "[svc/events] undecodable query message from {}: {}",
                source_id,
                err
            );
            err
        })?;

        let periodic_rate = self.normalise_periodic_rate(requested, event_type);
        let record = EventRecord {
            id: event_id,
            destination_id: source_id,
            query,
            event_type,
            periodic_rate,
            request_id,
            sequence_number: 0,
            timeout_task: self.spawn_timeout_task(event_id),
            periodic_task: self.spawn_periodic_task(event_id, periodic_rate),
        };

        let mut events = self.events.lock();
        if let Some(previous) = events.insert(event_id, record) {
            previous.stop();
        }
        Ok(periodic_rate)
    }

    fn confirm_request(&self, request_id: u8, event_id: u8, rate: f64) -> HandlerResult {
        Ok(Some(
            Message::build(MessageCode::ConfirmEventRequest)
                .uint("request_id", u64::from(request_id))
                .uint("event_id", u64::from(event_id))
                .float("confirmed_periodic_rate", rate)
                .finish()?,
        ))
    }

    fn reject_request(&self, request_id: u8, code: RejectEventCode) -> HandlerResult {
        Ok(Some(
            Message::build(MessageCode::RejectEventRequest)
                .uint("presence_vector", 0)
                .uint("request_id", u64::from(request_id))
                .uint("response_code", code as u64)
                .finish()?,
        ))
    }

    fn on_create_event(&self, message: &Record, source_id: Id) -> HandlerResult {
        let event_id = self.next_event_id();
        let rate = self.install_event(event_id, message, source_id)?;
        self.confirm_request(message.u8("request_id")?, event_id, rate)
    }

    fn on_update_event(&self, message: &Record, source_id: Id) -> HandlerResult {
        let event_id = message.u8("event_id")?;
        let request_id = message.u8("request_id")?;
        if !self.events.lock().contains_key(&event_id) {
            return self.reject_request(request_id, RejectEventCode::InvalidEventIdForUpdate);
        }
        let rate = self.install_event(event_id, message, source_id)?;
        self.confirm_request(request_id, event_id, rate)
    }

    fn on_cancel_event(&self, message: &Record) -> HandlerResult {
        let event_id = message.u8("event_id")?;
        let request_id = message.u8("request_id")?;
        let removed = self.events.lock().remove(&event_id);
        match removed {
            Some(event) => {
                event.stop();
                self.confirm_request(request_id, event_id, event.periodic_rate)
            }
            None => self.reject_request(request_id, RejectEventCode::InvalidEventIdForUpdate),
        }
    }

    fn on_query_events(&self, message: &Record) -> HandlerResult {
        let variant = QueryEventsVariant::try_from(message.uint("variant")?)?;
        let events = self.events.lock();
        let mut entries = Vec::new();
        for event in events.values() {
            let keep = match variant {
                QueryEventsVariant::MessageId => {
                    let wanted = message.u16("query_message_code")?;
                    Message::code_of(&event.query)
                        .map(|code| code.value() == wanted)
                        .unwrap_or(false)
                }
                QueryEventsVariant::EventType => {
                    event.event_type as u64 == message.uint("event_type")?
                }
                QueryEventsVariant::EventId => event.id == message.u8("event_id")?,
                QueryEventsVariant::AllEvents => true,
            };
            if !keep {
                continue;
            }
            let entry = EVENT_ENTRY.instantiate(
                [
                    ("type", Value::UInt(event.event_type as u64)),
                    ("id", Value::UInt(u64::from(event.id))),
                    (
                        "query_message",
                        Value::Bytes(Message::encode(&event.query)?),
                    ),
                ]
                .into_iter()
                .collect(),
            )?;
            entries.push(Value::Record(entry));
        }
        drop(events);
        Ok(Some(
            Message::build(MessageCode::ReportEvents)
                .list("events", entries)
                .finish()?,
        ))
    }

    fn on_query_event_timeout(&self) -> HandlerResult {
        let minutes = self.event_timeout.lock().as_secs() / 60;
        Ok(Some(
            Message::build(MessageCode::ReportEventTimeout)
                .uint("timeout", minutes)
                .finish()?,
        ))
    }
}

impl Service for EventsService {
    fn name(&self) -> &'static str {
        "events"
    }

    fn uri(&self) -> &'static str {
        "urn:jaus:jss:core:Events"
    }

    fn version(&self) -> (u8, u8) {
        (1, 0)
    }

    fn handlers(&self) -> Vec<HandlerSpec> {
        vec![
            HandlerSpec::no_events(MessageCode::CreateEvent),
            HandlerSpec::no_events(MessageCode::UpdateEvent),
            HandlerSpec::no_events(MessageCode::CancelEvent),
            HandlerSpec::no_events(MessageCode::QueryEvents),
            HandlerSpec::no_events(MessageCode::QueryEventTimeout),
        ]
    }

    fn handle(&self, message: &Record, source_id: Id) -> HandlerResult {
        match Message::code_of(message)? {
            MessageCode::CreateEvent => self.on_create_event(message, source_id),
            MessageCode::UpdateEvent => self.on_update_event(message, source_id),
            MessageCode::CancelEvent => self.on_cancel_event(message),
            MessageCode::QueryEvents => self.on_query_events(message),
            MessageCode::QueryEventTimeout => self.on_query_event_timeout(),
            _ => Ok(None),
        }
    }

    fn close(&self) {
        let mut events = self.events.lock();
        for event in events.values() {
            event.stop();
        }
        events.clear();
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
