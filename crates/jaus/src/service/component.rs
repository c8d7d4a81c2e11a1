// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Components: the unit of addressing, dispatch, and service ownership.
//!
//! A component owns a set of services, flattens their handler tables (a
//! duplicate code is fatal at construction), and runs one background task
//! that decodes inbound messages, dispatches them, and sends any reply back
//! to the source. Decode and handler failures are logged and the loop
//! continues.

use super::access_control::AccessControlService;
use super::{Service, ServiceError};
use crate::core::ser::Record;
use crate::protocol::id::Id;
use crate::protocol::message::{Message, MessageCode};
use crate::transport::{Connection, SendOptions};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tokio::task::JoinHandle;

/// Fatal component construction failures.
#[derive(Debug)]
pub enum ComponentError {
    /// Two services registered a handler for the same message code.
    DuplicateHandler {
        code: MessageCode,
        first: &'static str,
        second: &'static str,
    },
}

impl fmt::Display for ComponentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentError::DuplicateHandler {
                code,
                first,
                second,
            } => write!(
                f,
                "services {} and {} both handle {}",
                first, second, code
            ),
        }
    }
}

impl std::error::Error for ComponentError {}

#[derive(Clone, Copy)]
struct DispatchEntry {
    service: usize,
    is_command: bool,
}

/// Builds a service instance wired to its owning component.
pub type ServiceFactory = fn(&Arc<ComponentCore>) -> Arc<dyn Service>;

/// The shared heart of a component, handed to its services at construction.
pub struct ComponentCore {
    pub id: Id,
    pub name: String,
    pub node_name: String,
    pub subsystem_name: String,
    pub default_authority: u8,
    connection: Connection,
    services: OnceLock<Vec<Arc<dyn Service>>>,
    dispatch: OnceLock<HashMap<MessageCode, DispatchEntry>>,
}

impl ComponentCore {
    pub fn services(&self) -> &[Arc<dyn Service>] {
        self.services.get().map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Look up a sibling service by concrete type.
    pub fn find<T: Service>(&self) -> Option<Arc<T>> {
        self.services()
            .iter()
            .find_map(|s| Arc::clone(s).as_any().downcast::<T>().ok())
    }

    /// Route a message to its handler, applying command gating.
    ///
    /// Messages with no registered handler are logged and swallowed; a
    /// command from a source without control is silently ignored.
    pub fn dispatch(
        &self,
        message: &Record,
        source_id: Id,
    ) -> Result<Option<Record>, ServiceError> {
        let code = Message::code_of(message)?;
        let entry = match self.dispatch.get().and_then(|map| map.get(&code)) {
            Some(entry) => *entry,
            None => {
                log::debug!("[component {}] no handler for {}", self.id, code);
                return Ok(None);
            }
        };

        if entry.is_command {
            let in_control = self
                .find::<AccessControlService>()
                .map(|ac| ac.has_control(source_id))
                .unwrap_or(false);
            if !in_control {
                log::debug!(
                    "[component {}] ignoring command {} from {} without control",
                    self.id,
                    code,
                    source_id
                );
                return Ok(None);
            }
        }

        log::debug!(
            "[component {}] dispatch {} from {}",
            self.id,
            code,
            source_id
        );
        self.services()[entry.service].handle(message, source_id)
    }

    /// Encode and enqueue a message to `destination_id` (fire-and-forget).
    pub fn post_message(&self, message: &Record, destination_id: Id) {
        match Message::encode(message) {
            Ok(bytes) => {
                log::debug!(
                    "[component {}] send {} -> {}",
                    self.id,
                    message.schema_name(),
                    destination_id
                );
                self.connection
                    .post(&bytes, destination_id, SendOptions::default());
            }
            Err(err) => {
                log::error!(
                    "[component {}] failed to encode {}: {}",
                    self.id,
                    message.schema_name(),
                    err
                );
            }
        }
    }
}

/// A JAUS component bound to one connection.
pub struct Component {
    core: Arc<ComponentCore>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Component").finish_non_exhaustive()
    }
}

impl Component {
    /// Build a component and instantiate its services.
    ///
    /// Must run inside the async runtime: services spawn their background
    /// tasks during construction.
    pub fn new(
        id: Id,
        name: &str,
        node_name: &str,
        subsystem_name: &str,
        default_authority: u8,
        connection: Connection,
        factories: &[ServiceFactory],
    ) -> Result<Self, ComponentError> {
        let core = Arc::new(ComponentCore {
            id,
            name: name.to_owned(),
            node_name: node_name.to_owned(),
            subsystem_name: subsystem_name.to_owned(),
            default_authority,
            connection,
            services: OnceLock::new(),
            dispatch: OnceLock::new(),
        });

        let services: Vec<Arc<dyn Service>> = factories.iter().map(|f| f(&core)).collect();

        let mut dispatch: HashMap<MessageCode, DispatchEntry> = HashMap::new();
        let mut owner: HashMap<MessageCode, &'static str> = HashMap::new();
        for (index, service) in services.iter().enumerate() {
            for spec in service.handlers() {
                if let Some(first) = owner.insert(spec.code, service.name()) {
                    return Err(ComponentError::DuplicateHandler {
                        code: spec.code,
                        first,
                        second: service.name(),
                    });
                }
                dispatch.insert(
                    spec.code,
                    DispatchEntry {
                        service: index,
                        is_command: spec.is_command,
                    },
                );
            }
        }

        let _ = core.services.set(services);
        let _ = core.dispatch.set(dispatch);
        for service in core.services() {
            service.bootstrap();
        }

        Ok(Self {
            core,
            listener: Mutex::new(None),
        })
    }

    pub fn id(&self) -> Id {
        self.core.id
    }

    pub fn core(&self) -> &Arc<ComponentCore> {
        &self.core
    }

    /// Start the receive/dispatch loop.
    pub fn listen(&self) {
        let core = Arc::clone(&self.core);
        let task = tokio::spawn(async move {
            loop {
                let (bytes, source_id) = core.connection.recv().await;
                let message = match Message::decode(&bytes) {
                    Ok(message) => message,
                    Err(err) => {
                        log::warn!(
                            "[component {}] undecodable message from {}: {} ({} bytes)",
                            core.id,
                            source_id,
                            err,
                            bytes.len()
                        );
                        continue;
                    }
                };
                match core.dispatch(&message, source_id) {
                    Ok(Some(reply)) => core.post_message(&reply, source_id),
                    Ok(None) => {}
                    Err(err) => {
                        log::warn!(
                            "[component {}] handler for message from {} failed: {}",
                            core.id,
                            source_id,
                            err
                        );
                    }
                }
            }
        });
        let previous = self.listener.lock().replace(task);
        debug_assert!(previous.is_none(), "listen called twice");
    }

    /// Stop the dispatch loop and every service's background tasks.
    pub async fn close(&self) {
        if let Some(task) = self.listener.lock().take() {
            task.abort();
        }
        for service in self.core.services() {
            service.close();
        }
    }
}
