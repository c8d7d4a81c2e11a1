// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! List-manager service: a UID-keyed doubly-linked element store.
//!
//! Batch set/delete operations are transactional - they validate against a
//! staged copy and commit only if every reference stays intact. UID 0 means
//! "none" and terminates the list at either end.

use super::component::ComponentCore;
use super::{HandlerResult, HandlerSpec, Service};
use crate::core::ser::{CodecResult, Record, Value};
use crate::protocol::id::Id;
use crate::protocol::message::{Message, MessageCode};
use crate::protocol::messages::list_manager::{RejectElementCode, LIST_ELEMENT_ID, REPORT_ELEMENT};
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

/// One stored list node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub uid: u16,
    pub prev: u16,
    pub next: u16,
    pub format: u8,
    pub data: Vec<u8>,
}

/// Why a batch was rejected; maps onto the protocol rejection codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListError {
    InvalidUid,
    AlreadyExists,
    NoSuchElement,
    BrokenPrev,
    BrokenNext,
}

impl ListError {
    fn response_code(self) -> RejectElementCode {
        match self {
            ListError::InvalidUid | ListError::AlreadyExists | ListError::NoSuchElement => {
                RejectElementCode::InvalidElementId
            }
            ListError::BrokenPrev => RejectElementCode::InvalidPreviousElement,
            ListError::BrokenNext => RejectElementCode::InvalidNextElement,
        }
    }
}

/// The in-memory store. Kept separate from the service so the integrity
/// rules are testable without a component.
#[derive(Default)]
struct ElementStore {
    elements: HashMap<u16, Element>,
}

impl ElementStore {
    fn len(&self) -> usize {
        self.elements.len()
    }

    fn get(&self, uid: u16) -> Option<&Element> {
        self.elements.get(&uid)
    }

    /// Every non-zero prev/next must name an existing element.
    fn validate(elements: &HashMap<u16, Element>) -> Result<(), ListError> {
        for element in elements.values() {
            if element.prev != 0 && !elements.contains_key(&element.prev) {
                return Err(ListError::BrokenPrev);
            }
            if element.next != 0 && !elements.contains_key(&element.next) {
                return Err(ListError::BrokenNext);
            }
        }
        Ok(())
    }

    /// All-or-nothing insert of a batch of new elements.
    fn insert_batch(&mut self, batch: Vec<Element>) -> Result<(), ListError> {
        let mut staged = self.elements.clone();
        for element in batch {
            if element.uid == 0 {
                return Err(ListError::InvalidUid);
            }
            if staged.contains_key(&element.uid) {
                return Err(ListError::AlreadyExists);
            }
            staged.insert(element.uid, element);
        }
        Self::validate(&staged)?;
        self.elements = staged;
        Ok(())
    }

    /// All-or-nothing delete; neighbors of each removed element are spliced
    /// back together before the integrity check.
    fn delete_batch(&mut self, uids: Vec<u16>) -> Result<(), ListError> {
        let mut staged = self.elements.clone();
        for uid in uids {
            let removed = staged.remove(&uid).ok_or(ListError::NoSuchElement)?;
            if removed.prev != 0 {
                if let Some(prev) = staged.get_mut(&removed.prev) {
                    prev.next = removed.next;
                }
            }
            if removed.next != 0 {
                if let Some(next) = staged.get_mut(&removed.next) {
                    next.prev = removed.prev;
                }
            }
        }
        Self::validate(&staged)?;
        self.elements = staged;
        Ok(())
    }

    /// Elements in list order: walk next-links from the head. Orphans (when
    /// the store holds multiple chains) follow in uid order.
    fn ordered(&self) -> Vec<&Element> {
        let mut out = Vec::with_capacity(self.elements.len());
        let mut visited = std::collections::HashSet::new();
        let head = self.elements.values().find(|e| e.prev == 0);
        let mut cursor = head.map(|e| e.uid);
        while let Some(uid) = cursor {
            if !visited.insert(uid) {
                break;
            }
            let Some(element) = self.elements.get(&uid) else {
                break;
            };
            out.push(element);
            cursor = (element.next != 0).then_some(element.next);
        }
        let mut rest: Vec<&Element> = self
            .elements
            .values()
            .filter(|e| !visited.contains(&e.uid))
            .collect();
        rest.sort_by_key(|e| e.uid);
        out.extend(rest);
        out
    }
}

pub struct ListManagerService {
    store: Mutex<ElementStore>,
}

impl ListManagerService {
    pub fn create(_core: &Arc<ComponentCore>) -> Arc<dyn Service> {
        Arc::new(Self {
            store: Mutex::new(ElementStore::default()),
        })
    }

    pub fn element_count(&self) -> usize {
        self.store.lock().len()
    }

    fn element_from_record(record: &Record) -> CodecResult<Element> {
        Ok(Element {
            uid: record.u16("uid")?,
            prev: record.u16("prev")?,
            next: record.u16("next")?,
            format: record.u8("format")?,
            data: record.bytes("data")?.to_vec(),
        })
    }

    fn confirm(&self, request_id: u8) -> HandlerResult {
        Ok(Some(
            Message::build(MessageCode::ConfirmElementRequest)
                .uint("request_id", u64::from(request_id))
                .finish()?,
        ))
    }

    fn reject(&self, request_id: u8, code: RejectElementCode) -> HandlerResult {
        Ok(Some(
            Message::build(MessageCode::RejectElementRequest)
                .uint("request_id", u64::from(request_id))
                .uint("response_code", code as u64)
                .finish()?,
        ))
    }

    fn on_set_element(&self, message: &Record) -> HandlerResult {
        let request_id = message.u8("request_id")?;
        let mut batch = Vec::new();
        for item in message.list("elements")? {
            let Some(record) = item.as_record() else {
                return self.reject(request_id, RejectElementCode::UnspecifiedError);
            };
            batch.push(Self::element_from_record(record)?);
        }
        match self.store.lock().insert_batch(batch) {
            Ok(()) => self.confirm(request_id),
            Err(err) => self.reject(request_id, err.response_code()),
        }
    }

    fn on_delete_element(&self, message: &Record) -> HandlerResult {
        let request_id = message.u8("request_id")?;
        let mut uids = Vec::new();
        for item in message.list("element_ids")? {
            let Some(record) = item.as_record() else {
                return self.reject(request_id, RejectElementCode::UnspecifiedError);
            };
            uids.push(record.u16("uid")?);
        }
        match self.store.lock().delete_batch(uids) {
            Ok(()) => self.confirm(request_id),
            Err(err) => self.reject(request_id, err.response_code()),
        }
    }

    fn on_query_element(&self, message: &Record) -> HandlerResult {
        let uid = message.u16("element_uid")?;
        let store = self.store.lock();
        let Some(element) = store.get(uid) else {
            return Ok(None);
        };
        Ok(Some(
            REPORT_ELEMENT.instantiate(
                [
                    ("uid", Value::UInt(u64::from(element.uid))),
                    ("prev", Value::UInt(u64::from(element.prev))),
                    ("next", Value::UInt(u64::from(element.next))),
                    ("format", Value::UInt(u64::from(element.format))),
                    ("data", Value::Bytes(element.data.clone())),
                ]
                .into_iter()
                .collect(),
            )?,
        ))
    }

    fn on_query_element_list(&self) -> HandlerResult {
        let store = self.store.lock();
        let mut ids = Vec::new();
        for element in store.ordered() {
            let record = LIST_ELEMENT_ID.instantiate(
                [("uid", Value::UInt(u64::from(element.uid)))]
                    .into_iter()
                    .collect(),
            )?;
            ids.push(Value::Record(record));
        }
        drop(store);
        Ok(Some(
            Message::build(MessageCode::ReportElementList)
                .list("elements", ids)
                .finish()?,
        ))
    }

    fn on_query_element_count(&self) -> HandlerResult {
        Ok(Some(
            Message::build(MessageCode::ReportElementCount)
                .uint("element_count", self.element_count() as u64)
                .finish()?,
        ))
    }
}

impl Service for ListManagerService {
    fn name(&self) -> &'static str {
        "list_manager"
    }

    fn uri(&self) -> &'static str {
        "urn:jaus:jss:core:ListManager"
    }

    fn version(&self) -> (u8, u8) {
        (1, 0)
    }

    fn handlers(&self) -> Vec<HandlerSpec> {
        vec![
            HandlerSpec::command(MessageCode::SetElement),
            HandlerSpec::command(MessageCode::DeleteElement),
            HandlerSpec::new(MessageCode::QueryElement),
            HandlerSpec::new(MessageCode::QueryElementList),
            HandlerSpec::new(MessageCode::QueryElementCount),
        ]
    }

    fn handle(&self, message: &Record, _source_id: Id) -> HandlerResult {
        match Message::code_of(message)? {
            MessageCode::SetElement => self.on_set_element(message),
            MessageCode::DeleteElement => self.on_delete_element(message),
            MessageCode::QueryElement => self.on_query_element(message),
            MessageCode::QueryElementList => self.on_query_element_list(),
            MessageCode::QueryElementCount => self.on_query_element_count(),
            _ => Ok(None),
        }
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(uid: u16, prev: u16, next: u16) -> Element {
        Element {
            uid,
            prev,
            next,
            format: 1,
            data: vec![uid as u8],
        }
    }

    #[test]
    fn test_insert_batch_valid_chain() {
        let mut store = ElementStore::default();
        store
            .insert_batch(vec![element(1, 0, 2), element(2, 1, 0)])
            .expect("valid chain");
        assert_eq!(store.len(), 2);
        let ordered: Vec<u16> = store.ordered().iter().map(|e| e.uid).collect();
        assert_eq!(ordered, vec![1, 2]);
    }

    #[test]
    fn test_insert_batch_broken_reference_rolls_back() {
        let mut store = ElementStore::default();
        let err = store
            .insert_batch(vec![element(1, 0, 99)])
            .expect_err("dangling next");
        assert_eq!(err, ListError::BrokenNext);
        assert_eq!(store.len(), 0, "nothing committed");

        let err = store
            .insert_batch(vec![element(1, 42, 0)])
            .expect_err("dangling prev");
        assert_eq!(err, ListError::BrokenPrev);
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_insert_duplicate_uid_rejected() {
        let mut store = ElementStore::default();
        store.insert_batch(vec![element(1, 0, 0)]).expect("first");
        let err = store
            .insert_batch(vec![element(1, 0, 0)])
            .expect_err("duplicate");
        assert_eq!(err, ListError::AlreadyExists);
    }

    #[test]
    fn test_uid_zero_rejected() {
        let mut store = ElementStore::default();
        let err = store
            .insert_batch(vec![element(0, 0, 0)])
            .expect_err("uid zero is the terminator");
        assert_eq!(err, ListError::InvalidUid);
    }

    #[test]
    fn test_delete_splices_neighbors() {
        let mut store = ElementStore::default();
        store
            .insert_batch(vec![element(1, 0, 2), element(2, 1, 3), element(3, 2, 0)])
            .expect("chain");
        store.delete_batch(vec![2]).expect("delete middle");

        assert_eq!(store.get(1).expect("kept").next, 3);
        assert_eq!(store.get(3).expect("kept").prev, 1);
        let ordered: Vec<u16> = store.ordered().iter().map(|e| e.uid).collect();
        assert_eq!(ordered, vec![1, 3]);
    }

    #[test]
    fn test_delete_missing_uid_rolls_back() {
        let mut store = ElementStore::default();
        store
            .insert_batch(vec![element(1, 0, 2), element(2, 1, 0)])
            .expect("chain");
        let err = store
            .delete_batch(vec![1, 99])
            .expect_err("99 does not exist");
        assert_eq!(err, ListError::NoSuchElement);
        assert_eq!(store.len(), 2, "delete of 1 rolled back");
    }
}
