// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The component/service framework.
//!
//! A [`Service`](crate::service::Service) contributes message handlers to its
//! owning component and may keep reactive state; the component flattens all
//! handler tables, runs the dispatch loop, and applies command gating through
//! the access-control service.

pub mod access_control;
pub mod component;
pub mod discovery;
pub mod events;
pub mod list_manager;
pub mod liveness;
pub mod management;
pub mod mobility;

use crate::core::ser::{CodecError, FieldMap, Record, Value};
use crate::protocol::id::Id;
use crate::protocol::message::MessageCode;
use parking_lot::Mutex;
use std::any::Any;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Dispatch-level failures: logged with the source id, never fatal to the
/// receive loop, and never answered on the wire.
#[derive(Debug)]
pub enum ServiceError {
    Codec(CodecError),
    /// A sibling service the handler depends on is not configured.
    MissingService { name: &'static str },
    /// The owning component is already gone.
    ComponentGone,
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::Codec(err) => write!(f, "codec failure: {}", err),
            ServiceError::MissingService { name } => {
                write!(f, "required service {} not configured", name)
            }
            ServiceError::ComponentGone => write!(f, "component has been dropped"),
        }
    }
}

impl std::error::Error for ServiceError {}

impl From<CodecError> for ServiceError {
    fn from(err: CodecError) -> Self {
        ServiceError::Codec(err)
    }
}

/// What a handler returns: an optional reply message for the source.
pub type HandlerResult = Result<Option<Record>, ServiceError>;

/// One handler row a service contributes to the component's table.
#[derive(Debug, Clone, Copy)]
pub struct HandlerSpec {
    pub code: MessageCode,
    /// Runs only while the source holds control.
    pub is_command: bool,
    /// Eligible as an event query message.
    pub supports_events: bool,
}

impl HandlerSpec {
    pub const fn new(code: MessageCode) -> Self {
        Self {
            code,
            is_command: false,
            supports_events: true,
        }
    }

    pub const fn command(code: MessageCode) -> Self {
        Self {
            code,
            is_command: true,
            supports_events: false,
        }
    }

    pub const fn no_events(code: MessageCode) -> Self {
        Self {
            code,
            is_command: false,
            supports_events: false,
        }
    }
}

/// A pluggable JAUS service.
pub trait Service: Any + Send + Sync {
    fn name(&self) -> &'static str;
    fn uri(&self) -> &'static str;
    fn version(&self) -> (u8, u8);
    fn handlers(&self) -> Vec<HandlerSpec>;

    /// Handle one inbound message addressed to this service.
    fn handle(&self, message: &Record, source_id: Id) -> HandlerResult;

    /// Called once all sibling services exist.
    fn bootstrap(&self) {}

    /// Cancel background tasks; the component is closing.
    fn close(&self) {}

    /// Downcast support for sibling lookup.
    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

type WatcherFn = Box<dyn Fn() + Send + Sync>;

struct Watcher {
    keys: Vec<&'static str>,
    callback: WatcherFn,
}

struct Pending {
    changed: BTreeSet<&'static str>,
    scheduled: bool,
}

struct StateInner {
    map: Mutex<FieldMap>,
    watchers: Mutex<Vec<Watcher>>,
    pending: Mutex<Pending>,
}

/// Reactive keyed state with coalesced watchers.
///
/// Mutations mark keys changed and schedule a single flush at the next
/// scheduler turn; the flush invokes each watcher whose subscribed keys
/// intersect the changed set exactly once, in registration order.
#[derive(Clone)]
pub struct ServiceState {
    inner: Arc<StateInner>,
}

impl ServiceState {
    pub fn new(initial: FieldMap) -> Self {
        Self {
            inner: Arc::new(StateInner {
                map: Mutex::new(initial),
                watchers: Mutex::new(Vec::new()),
                pending: Mutex::new(Pending {
                    changed: BTreeSet::new(),
                    scheduled: false,
                }),
            }),
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.map.lock().get(key).cloned()
    }

    pub fn uint(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(|v| v.as_uint())
    }

    pub fn float(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(|v| v.as_float())
    }

    pub fn set(&self, key: &'static str, value: Value) {
        self.inner.map.lock().insert(key, value);
        self.defer(key);
    }

    /// Subscribe `callback` to changes of any of `keys`.
    pub fn watch(&self, keys: &[&'static str], callback: impl Fn() + Send + Sync + 'static) {
        self.inner.watchers.lock().push(Watcher {
            keys: keys.to_vec(),
            callback: Box::new(callback),
        });
    }

    fn defer(&self, key: &'static str) {
        let mut pending = self.inner.pending.lock();
        pending.changed.insert(key);
        if pending.scheduled {
            return;
        }
        pending.scheduled = true;
        drop(pending);

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            // One yield so same-turn mutations coalesce into one pass.
            tokio::task::yield_now().await;
            let changed = {
                let mut pending = inner.pending.lock();
                pending.scheduled = false;
                std::mem::take(&mut pending.changed)
            };
            let watchers = inner.watchers.lock();
            for watcher in watchers.iter() {
                if watcher.keys.iter().any(|k| changed.contains(k)) {
                    (watcher.callback)();
                }
            }
        });
    }
}
