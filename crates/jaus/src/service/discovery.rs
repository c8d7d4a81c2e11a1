// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Discovery service: the subsystem/node/component service registry.
//!
//! Seeded at bootstrap with the owning component's own services; remote
//! components append through `RegisterServices`. The four query/report pairs
//! traverse the registry at different depths.

use super::component::ComponentCore;
use super::{HandlerResult, HandlerSpec, Service, ServiceError};
use crate::core::ser::{CodecResult, Record, Value};
use crate::protocol::id::Id;
use crate::protocol::message::{Message, MessageCode};
use crate::protocol::messages::discovery::{
    ConfigurationQueryType, IdentificationQueryType, IdentificationType,
    COMPONENT_CONFIGURATION_REPORT, COMPONENT_SERVICE_LIST_REPORT, NODE_CONFIGURATION_REPORT,
    NODE_SERVICE_LIST_REPORT, SERVICE_RECORD, SUBSYSTEM_SERVICE_LIST_REPORT,
};
use parking_lot::Mutex;
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

/// A registered service: URI and version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEntry {
    pub uri: String,
    pub major_version: u8,
    pub minor_version: u8,
}

impl ServiceEntry {
    fn to_record(&self) -> CodecResult<Record> {
        SERVICE_RECORD.instantiate(
            [
                ("uri", Value::Str(self.uri.clone())),
                ("major_version", Value::UInt(u64::from(self.major_version))),
                ("minor_version", Value::UInt(u64::from(self.minor_version))),
            ]
            .into_iter()
            .collect(),
        )
    }
}

type Registry = BTreeMap<u16, BTreeMap<u8, BTreeMap<u8, Vec<ServiceEntry>>>>;

pub struct DiscoveryService {
    core: Weak<ComponentCore>,
    registry: Mutex<Registry>,
}

impl DiscoveryService {
    pub fn create(core: &Arc<ComponentCore>) -> Arc<dyn Service> {
        Arc::new(Self {
            core: Arc::downgrade(core),
            registry: Mutex::new(Registry::new()),
        })
    }

    fn core(&self) -> Result<Arc<ComponentCore>, ServiceError> {
        self.core.upgrade().ok_or(ServiceError::ComponentGone)
    }

    fn append(&self, id: Id, entries: Vec<ServiceEntry>) {
        let mut registry = self.registry.lock();
        registry
            .entry(id.subsystem)
            .or_default()
            .entry(id.node)
            .or_default()
            .entry(id.component)
            .or_default()
            .extend(entries);
    }

    fn entries_for(&self, id: Id) -> Vec<ServiceEntry> {
        self.registry
            .lock()
            .get(&id.subsystem)
            .and_then(|nodes| nodes.get(&id.node))
            .and_then(|components| components.get(&id.component))
            .cloned()
            .unwrap_or_default()
    }

    fn on_register_services(&self, message: &Record, source_id: Id) -> HandlerResult {
        let mut entries = Vec::new();
        for item in message.list("services")? {
            let Some(record) = item.as_record() else {
                continue;
            };
            entries.push(ServiceEntry {
                uri: record.str_("uri")?.to_owned(),
                major_version: record.u8("major_version")?,
                minor_version: record.u8("minor_version")?,
            });
        }
        log::debug!(
            "[svc/discovery] {} registered {} service(s)",
            source_id,
            entries.len()
        );
        self.append(source_id, entries);
        Ok(None)
    }

    fn on_query_identification(&self, message: &Record) -> HandlerResult {
        let core = self.core()?;
        let query_type = IdentificationQueryType::try_from(message.uint("type")?)?;
        let (kind, identification) = match query_type {
            IdentificationQueryType::Subsystem => {
                (IdentificationType::Vehicle, core.subsystem_name.clone())
            }
            IdentificationQueryType::Node => (IdentificationType::Node, core.node_name.clone()),
            IdentificationQueryType::Component => {
                (IdentificationType::Component, core.name.clone())
            }
            IdentificationQueryType::System => return Ok(None),
        };
        Ok(Some(
            Message::build(MessageCode::ReportIdentification)
                .uint("query_type", query_type as u64)
                .uint("type", kind as u64)
                .str_("identification", &identification)
                .finish()?,
        ))
    }

    fn on_query_configuration(&self, message: &Record) -> HandlerResult {
        let core = self.core()?;
        let query_type = ConfigurationQueryType::try_from(message.uint("type")?)?;
        let registry = self.registry.lock();
        let mut nodes = Vec::new();
        if let Some(node_map) = registry.get(&core.id.subsystem) {
            for (node_id, components) in node_map {
                if query_type == ConfigurationQueryType::Node && *node_id != core.id.node {
                    continue;
                }
                let mut component_reports = Vec::new();
                for component_id in components.keys() {
                    let report = COMPONENT_CONFIGURATION_REPORT.instantiate(
                        [("id", Value::UInt(u64::from(*component_id)))]
                            .into_iter()
                            .collect(),
                    )?;
                    component_reports.push(Value::Record(report));
                }
                let node_report = NODE_CONFIGURATION_REPORT.instantiate(
                    [
                        ("id", Value::UInt(u64::from(*node_id))),
                        ("components", Value::List(component_reports)),
                    ]
                    .into_iter()
                    .collect(),
                )?;
                nodes.push(Value::Record(node_report));
            }
        }
        drop(registry);
        Ok(Some(
            Message::build(MessageCode::ReportConfiguration)
                .list("nodes", nodes)
                .finish()?,
        ))
    }

    fn on_query_subsystem_list(&self) -> HandlerResult {
        let registry = self.registry.lock();
        let mut ids = Vec::new();
        for (subsystem, nodes) in registry.iter() {
            for (node, components) in nodes {
                for component in components.keys() {
                    ids.push(Id::new(*subsystem, *node, *component).to_value());
                }
            }
        }
        drop(registry);
        Ok(Some(
            Message::build(MessageCode::ReportSubsystemList)
                .list("subsystems", ids)
                .finish()?,
        ))
    }

    fn component_service_report(&self, id: Id) -> Result<Value, ServiceError> {
        let mut services = Vec::new();
        for entry in self.entries_for(id) {
            services.push(Value::Record(entry.to_record()?));
        }
        let report = COMPONENT_SERVICE_LIST_REPORT.instantiate(
            [
                ("id", Value::UInt(u64::from(id.component))),
                ("services", Value::List(services)),
            ]
            .into_iter()
            .collect(),
        )?;
        Ok(Value::Record(report))
    }

    fn on_query_services(&self, message: &Record) -> HandlerResult {
        let core = self.core()?;
        let mut node_reports = Vec::new();
        for node_item in message.list("nodes")? {
            let Some(node) = node_item.as_record() else {
                continue;
            };
            let node_id = node.u8("id")?;
            let mut component_reports = Vec::new();
            for component_item in node.list("components")? {
                let Some(component) = component_item.as_record() else {
                    continue;
                };
                let component_id = component.u8("id")?;
                component_reports.push(self.component_service_report(Id::new(
                    core.id.subsystem,
                    node_id,
                    component_id,
                ))?);
            }
            let report = NODE_SERVICE_LIST_REPORT.instantiate(
                [
                    ("id", Value::UInt(u64::from(node_id))),
                    ("components", Value::List(component_reports)),
                ]
                .into_iter()
                .collect(),
            )?;
            node_reports.push(Value::Record(report));
        }
        Ok(Some(
            Message::build(MessageCode::ReportServices)
                .list("nodes", node_reports)
                .finish()?,
        ))
    }

    fn on_query_service_list(&self, message: &Record) -> HandlerResult {
        let mut subsystem_reports = Vec::new();
        for subsystem_item in message.list("subsystems")? {
            let Some(subsystem) = subsystem_item.as_record() else {
                continue;
            };
            let subsystem_id = subsystem.u16("id")?;
            let mut node_reports = Vec::new();
            for node_item in subsystem.list("nodes")? {
                let Some(node) = node_item.as_record() else {
                    continue;
                };
                let node_id = node.u8("id")?;
                let mut component_reports = Vec::new();
                for component_item in node.list("components")? {
                    let Some(component) = component_item.as_record() else {
                        continue;
                    };
                    let component_id = component.u8("id")?;
                    component_reports.push(self.component_service_report(Id::new(
                        subsystem_id,
                        node_id,
                        component_id,
                    ))?);
                }
                let report = NODE_SERVICE_LIST_REPORT.instantiate(
                    [
                        ("id", Value::UInt(u64::from(node_id))),
                        ("components", Value::List(component_reports)),
                    ]
                    .into_iter()
                    .collect(),
                )?;
                node_reports.push(Value::Record(report));
            }
            let report = SUBSYSTEM_SERVICE_LIST_REPORT.instantiate(
                [
                    ("id", Value::UInt(u64::from(subsystem_id))),
                    ("nodes", Value::List(node_reports)),
                ]
                .into_iter()
                .collect(),
            )?;
            subsystem_reports.push(Value::Record(report));
        }
        Ok(Some(
            Message::build(MessageCode::ReportServiceList)
                .list("subsystems", subsystem_reports)
                .finish()?,
        ))
    }
}

impl Service for DiscoveryService {
    fn name(&self) -> &'static str {
        "discovery"
    }

    fn uri(&self) -> &'static str {
        "urn:jaus:jss:core:Discovery"
    }

    fn version(&self) -> (u8, u8) {
        (1, 0)
    }

    fn handlers(&self) -> Vec<HandlerSpec> {
        vec![
            HandlerSpec::no_events(MessageCode::RegisterServices),
            HandlerSpec::new(MessageCode::QueryIdentification),
            HandlerSpec::new(MessageCode::QueryConfiguration),
            HandlerSpec::new(MessageCode::QuerySubsystemList),
            HandlerSpec::new(MessageCode::QueryServices),
            HandlerSpec::new(MessageCode::QueryServiceList),
        ]
    }

    fn handle(&self, message: &Record, source_id: Id) -> HandlerResult {
        match Message::code_of(message)? {
            MessageCode::RegisterServices => self.on_register_services(message, source_id),
            MessageCode::QueryIdentification => self.on_query_identification(message),
            MessageCode::QueryConfiguration => self.on_query_configuration(message),
            MessageCode::QuerySubsystemList => self.on_query_subsystem_list(),
            MessageCode::QueryServices => self.on_query_services(message),
            MessageCode::QueryServiceList => self.on_query_service_list(message),
            _ => Ok(None),
        }
    }

    /// Seed the registry with the owning component's own services.
    fn bootstrap(&self) {
        let Some(core) = self.core.upgrade() else {
            return;
        };
        let entries: Vec<ServiceEntry> = core
            .services()
            .iter()
            .map(|service| ServiceEntry {
                uri: service.uri().to_owned(),
                major_version: service.version().0,
                minor_version: service.version().1,
            })
            .collect();
        self.append(core.id, entries);
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
