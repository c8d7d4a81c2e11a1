// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! List-manager service: transactional element batches, integrity
//! rejections, and the query/report handlers.

use jaus::core::ser::Value;
use jaus::protocol::messages::access_control::ConfirmControlCode;
use jaus::protocol::messages::list_manager::{RejectElementCode, LIST_ELEMENT, LIST_ELEMENT_ID};
use jaus::service::access_control::AccessControlService;
use jaus::service::events::EventsService;
use jaus::service::list_manager::ListManagerService;
use jaus::service::management::ManagementService;
use jaus::transport::JudpTransport;
use jaus::{Component, Id, Message, MessageCode};

const CONTROLLER: Id = Id::new(2, 2, 2);

struct Fixture {
    transport: JudpTransport,
    component: Component,
}

impl Fixture {
    fn new() -> Self {
        let transport =
            JudpTransport::bind_local("127.0.0.1:0".parse().expect("addr")).expect("bind");
        let id = Id::new(1, 1, 1);
        let component = Component::new(
            id,
            "TestCore",
            "TestNode",
            "TestSubsystem",
            0,
            transport.connect(id),
            &[
                ListManagerService::create,
                AccessControlService::create,
                ManagementService::create,
                EventsService::create,
            ],
        )
        .expect("component");

        let fixture = Self { transport, component };
        fixture.take_control();
        fixture
    }

    fn take_control(&self) {
        let request = Message::build(MessageCode::RequestControl)
            .uint("authority_code", 5)
            .finish()
            .expect("build");
        let reply = self
            .dispatch(&request, CONTROLLER)
            .expect("confirm control");
        assert_eq!(
            reply.uint("response_code").unwrap(),
            ConfirmControlCode::ControlAccepted as u64
        );
    }

    fn dispatch(
        &self,
        message: &jaus::core::ser::Record,
        source: Id,
    ) -> Option<jaus::core::ser::Record> {
        self.component
            .core()
            .dispatch(message, source)
            .expect("dispatch")
    }

    fn set_elements(&self, request_id: u8, elements: Vec<Value>) -> jaus::core::ser::Record {
        let message = Message::build(MessageCode::SetElement)
            .uint("request_id", u64::from(request_id))
            .list("elements", elements)
            .finish()
            .expect("build");
        self.dispatch(&message, CONTROLLER).expect("reply")
    }

    fn delete_elements(&self, request_id: u8, uids: &[u16]) -> jaus::core::ser::Record {
        let ids: Vec<Value> = uids
            .iter()
            .map(|uid| {
                Value::Record(
                    LIST_ELEMENT_ID
                        .instantiate(
                            [("uid", Value::UInt(u64::from(*uid)))].into_iter().collect(),
                        )
                        .expect("element id"),
                )
            })
            .collect();
        let message = Message::build(MessageCode::DeleteElement)
            .uint("request_id", u64::from(request_id))
            .list("element_ids", ids)
            .finish()
            .expect("build");
        self.dispatch(&message, CONTROLLER).expect("reply")
    }

    fn count(&self) -> u16 {
        let query = Message::build(MessageCode::QueryElementCount)
            .finish()
            .expect("build");
        let report = self.dispatch(&query, CONTROLLER).expect("report");
        report.u16("element_count").unwrap()
    }

    async fn close(self) {
        self.component.close().await;
        self.transport.close().await;
    }
}

fn element(uid: u16, prev: u16, next: u16, data: &[u8]) -> Value {
    Value::Record(
        LIST_ELEMENT
            .instantiate(
                [
                    ("uid", Value::UInt(u64::from(uid))),
                    ("prev", Value::UInt(u64::from(prev))),
                    ("next", Value::UInt(u64::from(next))),
                    ("data", Value::Bytes(data.to_vec())),
                ]
                .into_iter()
                .collect(),
            )
            .expect("element"),
    )
}

#[tokio::test]
async fn test_set_and_query_elements() {
    let fixture = Fixture::new();

    let reply = fixture.set_elements(
        1,
        vec![
            element(1, 0, 2, b"first"),
            element(2, 1, 3, b"second"),
            element(3, 2, 0, b"third"),
        ],
    );
    assert_eq!(
        Message::code_of(&reply).unwrap(),
        MessageCode::ConfirmElementRequest
    );
    assert_eq!(fixture.count(), 3);

    // Single element query.
    let query = Message::build(MessageCode::QueryElement)
        .uint("element_uid", 2)
        .finish()
        .expect("build");
    let report = fixture.dispatch(&query, CONTROLLER).expect("report");
    assert_eq!(Message::code_of(&report).unwrap(), MessageCode::ReportElement);
    assert_eq!(report.u16("prev").unwrap(), 1);
    assert_eq!(report.u16("next").unwrap(), 3);
    assert_eq!(report.bytes("data").unwrap(), b"second");

    // Whole list, in chain order.
    let query = Message::build(MessageCode::QueryElementList)
        .finish()
        .expect("build");
    let report = fixture.dispatch(&query, CONTROLLER).expect("report");
    let uids: Vec<u64> = report
        .list("elements")
        .unwrap()
        .iter()
        .map(|e| e.as_record().unwrap().uint("uid").unwrap())
        .collect();
    assert_eq!(uids, vec![1, 2, 3]);
    fixture.close().await;
}

#[tokio::test]
async fn test_set_element_requires_control() {
    let fixture = Fixture::new();
    let stranger = Id::new(9, 9, 9);

    let message = Message::build(MessageCode::SetElement)
        .uint("request_id", 1)
        .list("elements", vec![element(1, 0, 0, b"x")])
        .finish()
        .expect("build");
    assert!(fixture.dispatch(&message, stranger).is_none());
    assert_eq!(fixture.count(), 0);
    fixture.close().await;
}

#[tokio::test]
async fn test_broken_references_rejected_atomically() {
    let fixture = Fixture::new();

    // Dangling next.
    let reply = fixture.set_elements(1, vec![element(1, 0, 99, b"x")]);
    assert_eq!(
        reply.uint("response_code").unwrap(),
        RejectElementCode::InvalidNextElement as u64
    );

    // Dangling prev.
    let reply = fixture.set_elements(2, vec![element(1, 99, 0, b"x")]);
    assert_eq!(
        reply.uint("response_code").unwrap(),
        RejectElementCode::InvalidPreviousElement as u64
    );

    // A batch with one bad element commits nothing.
    let reply = fixture.set_elements(3, vec![element(1, 0, 2, b"a"), element(2, 1, 77, b"b")]);
    assert_eq!(
        Message::code_of(&reply).unwrap(),
        MessageCode::RejectElementRequest
    );
    assert_eq!(fixture.count(), 0);
    fixture.close().await;
}

#[tokio::test]
async fn test_duplicate_uid_rejected() {
    let fixture = Fixture::new();

    let reply = fixture.set_elements(1, vec![element(1, 0, 0, b"x")]);
    assert_eq!(
        Message::code_of(&reply).unwrap(),
        MessageCode::ConfirmElementRequest
    );

    let reply = fixture.set_elements(2, vec![element(1, 0, 0, b"y")]);
    assert_eq!(
        reply.uint("response_code").unwrap(),
        RejectElementCode::InvalidElementId as u64
    );
    fixture.close().await;
}

#[tokio::test]
async fn test_delete_splices_and_rejects_unknown() {
    let fixture = Fixture::new();

    fixture.set_elements(
        1,
        vec![
            element(1, 0, 2, b"a"),
            element(2, 1, 3, b"b"),
            element(3, 2, 0, b"c"),
        ],
    );

    // Unknown uid rejects and rolls the whole batch back.
    let reply = fixture.delete_elements(2, &[1, 42]);
    assert_eq!(
        reply.uint("response_code").unwrap(),
        RejectElementCode::InvalidElementId as u64
    );
    assert_eq!(fixture.count(), 3);

    // Deleting the middle splices 1 <-> 3.
    let reply = fixture.delete_elements(3, &[2]);
    assert_eq!(
        Message::code_of(&reply).unwrap(),
        MessageCode::ConfirmElementRequest
    );
    assert_eq!(fixture.count(), 2);

    let query = Message::build(MessageCode::QueryElement)
        .uint("element_uid", 1)
        .finish()
        .expect("build");
    let report = fixture.dispatch(&query, CONTROLLER).expect("report");
    assert_eq!(report.u16("next").unwrap(), 3);
    fixture.close().await;
}

#[tokio::test]
async fn test_query_unknown_element_has_no_reply() {
    let fixture = Fixture::new();
    let query = Message::build(MessageCode::QueryElement)
        .uint("element_uid", 5)
        .finish()
        .expect("build");
    assert!(fixture.dispatch(&query, CONTROLLER).is_none());
    fixture.close().await;
}

#[tokio::test]
async fn test_service_count_accessor() {
    let fixture = Fixture::new();
    let service = fixture
        .component
        .core()
        .find::<ListManagerService>()
        .expect("list manager configured");
    assert_eq!(service.element_count(), 0);
    fixture.set_elements(1, vec![element(7, 0, 0, b"only")]);
    assert_eq!(service.element_count(), 1);
    fixture.close().await;
}
