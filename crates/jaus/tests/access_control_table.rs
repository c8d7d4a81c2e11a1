// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The access-control decision table, driven over the wire against a full
//! component: grants, refreshes, rejections, pre-emption, release, and the
//! control timeout.

use jaus::protocol::messages::access_control::{ConfirmControlCode, RejectControlCode};
use jaus::service::access_control::AccessControlService;
use jaus::service::events::EventsService;
use jaus::service::liveness::LivenessService;
use jaus::service::management::ManagementService;
use jaus::transport::{Connection, JudpTransport, SendOptions};
use jaus::{Component, Id, Message, MessageCode};
use std::time::Duration;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_AUTHORITY: u8 = 3;

struct Fixture {
    node_transport: JudpTransport,
    client_transport: JudpTransport,
    component: Component,
    core_id: Id,
}

impl Fixture {
    fn new() -> Self {
        let node_transport =
            JudpTransport::bind_local("127.0.0.1:0".parse().expect("addr")).expect("bind");
        let client_transport =
            JudpTransport::bind_local("127.0.0.1:0".parse().expect("addr")).expect("bind");

        let core_id = Id::new(1, 1, 1);
        client_transport.add_route(core_id, node_transport.local_addr().expect("addr"));

        let component = Component::new(
            core_id,
            "TestCore",
            "TestNode",
            "TestSubsystem",
            DEFAULT_AUTHORITY,
            node_transport.connect(core_id),
            &[
                AccessControlService::create,
                ManagementService::create,
                EventsService::create,
                LivenessService::create,
            ],
        )
        .expect("component");
        component.listen();

        Self {
            node_transport,
            client_transport,
            component,
            core_id,
        }
    }

    fn client(&self, id: Id) -> Connection {
        self.client_transport.connect(id)
    }

    fn access_control(&self) -> std::sync::Arc<AccessControlService> {
        self.component
            .core()
            .find::<AccessControlService>()
            .expect("access control configured")
    }

    async fn close(self) {
        self.component.close().await;
        self.node_transport.close().await;
        self.client_transport.close().await;
    }
}

async fn send(connection: &Connection, fixture: &Fixture, message: &jaus::core::ser::Record) {
    let bytes = Message::encode(message).expect("encode");
    connection
        .send_message(&bytes, fixture.core_id, SendOptions::default())
        .await
        .expect("send");
}

async fn recv(connection: &Connection, expected_source: Id) -> jaus::core::ser::Record {
    let (bytes, source) = connection.listen(RECV_TIMEOUT).await.expect("reply");
    assert_eq!(source, expected_source);
    Message::decode(&bytes).expect("decode reply")
}

async fn request_control(connection: &Connection, fixture: &Fixture, authority: u8) -> u64 {
    let request = Message::build(MessageCode::RequestControl)
        .uint("authority_code", u64::from(authority))
        .finish()
        .expect("build");
    send(connection, fixture, &request).await;
    let reply = recv(connection, fixture.core_id).await;
    reply.uint("response_code").expect("response code")
}

// ---------------------------------------------------------------------------
// Decision table rows
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_uncontrolled_insufficient_authority() {
    let fixture = Fixture::new();
    let a = fixture.client(Id::new(2, 2, 2));

    let code = request_control(&a, &fixture, DEFAULT_AUTHORITY - 1).await;
    assert_eq!(code, ConfirmControlCode::InsufficientAuthority as u64);
    assert!(!fixture.access_control().is_controlled());
    fixture.close().await;
}

#[tokio::test]
async fn test_uncontrolled_grant() {
    let fixture = Fixture::new();
    let a_id = Id::new(2, 2, 2);
    let a = fixture.client(a_id);

    let code = request_control(&a, &fixture, 5).await;
    assert_eq!(code, ConfirmControlCode::ControlAccepted as u64);
    assert!(fixture.access_control().has_control(a_id));
    assert_eq!(fixture.access_control().authority(), 5);
    fixture.close().await;
}

#[tokio::test]
async fn test_not_available_while_in_emergency() {
    let fixture = Fixture::new();
    let a = fixture.client(Id::new(2, 2, 2));

    let emergency = Message::build(MessageCode::SetEmergency)
        .uint("emergency_code", 1)
        .finish()
        .expect("build");
    send(&a, &fixture, &emergency).await;

    // Wait until the status change lands before requesting.
    tokio::time::sleep(Duration::from_millis(200)).await;
    let code = request_control(&a, &fixture, 5).await;
    assert_eq!(code, ConfirmControlCode::NotAvailable as u64);
    fixture.close().await;
}

#[tokio::test]
async fn test_same_client_below_default_releases() {
    let fixture = Fixture::new();
    let a_id = Id::new(2, 2, 2);
    let a = fixture.client(a_id);

    assert_eq!(
        request_control(&a, &fixture, 5).await,
        ConfirmControlCode::ControlAccepted as u64
    );

    // The same client coming back under the default authority gets released.
    let request = Message::build(MessageCode::RequestControl)
        .uint("authority_code", u64::from(DEFAULT_AUTHORITY - 1))
        .finish()
        .expect("build");
    send(&a, &fixture, &request).await;
    let reply = recv(&a, fixture.core_id).await;
    assert_eq!(
        Message::code_of(&reply).unwrap(),
        MessageCode::RejectControl
    );
    assert_eq!(
        reply.uint("response_code").unwrap(),
        RejectControlCode::ControlReleased as u64
    );
    assert!(!fixture.access_control().is_controlled());
    fixture.close().await;
}

#[tokio::test]
async fn test_same_client_refresh() {
    let fixture = Fixture::new();
    let a_id = Id::new(2, 2, 2);
    let a = fixture.client(a_id);

    assert_eq!(
        request_control(&a, &fixture, 5).await,
        ConfirmControlCode::ControlAccepted as u64
    );
    assert_eq!(
        request_control(&a, &fixture, 6).await,
        ConfirmControlCode::ControlAccepted as u64
    );
    assert!(fixture.access_control().has_control(a_id));
    assert_eq!(fixture.access_control().authority(), 6);
    fixture.close().await;
}

#[tokio::test]
async fn test_different_client_insufficient() {
    let fixture = Fixture::new();
    let a = fixture.client(Id::new(2, 2, 2));
    let b = fixture.client(Id::new(3, 3, 3));

    assert_eq!(
        request_control(&a, &fixture, 5).await,
        ConfirmControlCode::ControlAccepted as u64
    );
    // Equal authority does not pre-empt.
    assert_eq!(
        request_control(&b, &fixture, 5).await,
        ConfirmControlCode::InsufficientAuthority as u64
    );
    assert!(fixture.access_control().has_control(Id::new(2, 2, 2)));
    fixture.close().await;
}

#[tokio::test]
async fn test_preemption_notifies_old_controller() {
    let fixture = Fixture::new();
    let a_id = Id::new(2, 2, 2);
    let b_id = Id::new(3, 3, 3);
    let a = fixture.client(a_id);
    let b = fixture.client(b_id);

    assert_eq!(
        request_control(&a, &fixture, 5).await,
        ConfirmControlCode::ControlAccepted as u64
    );
    assert_eq!(
        request_control(&b, &fixture, 6).await,
        ConfirmControlCode::ControlAccepted as u64
    );
    assert!(fixture.access_control().has_control(b_id));

    // The displaced controller hears about it.
    let notice = recv(&a, fixture.core_id).await;
    assert_eq!(
        Message::code_of(&notice).unwrap(),
        MessageCode::RejectControl
    );
    assert_eq!(
        notice.uint("response_code").unwrap(),
        RejectControlCode::ControlReleased as u64
    );
    fixture.close().await;
}

// ---------------------------------------------------------------------------
// Release and timeout
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_request_then_release_roundtrip() {
    let fixture = Fixture::new();
    let a_id = Id::new(2, 2, 2);
    let a = fixture.client(a_id);

    assert_eq!(
        request_control(&a, &fixture, 5).await,
        ConfirmControlCode::ControlAccepted as u64
    );

    let release = Message::build(MessageCode::ReleaseControl)
        .finish()
        .expect("build");
    send(&a, &fixture, &release).await;
    let reply = recv(&a, fixture.core_id).await;
    assert_eq!(
        Message::code_of(&reply).unwrap(),
        MessageCode::RejectControl
    );
    assert_eq!(
        reply.uint("response_code").unwrap(),
        RejectControlCode::ControlReleased as u64
    );
    assert!(!fixture.access_control().is_controlled());
    fixture.close().await;
}

#[tokio::test]
async fn test_release_by_non_controller_is_ignored() {
    let fixture = Fixture::new();
    let a_id = Id::new(2, 2, 2);
    let b = fixture.client(Id::new(3, 3, 3));
    let a = fixture.client(a_id);

    assert_eq!(
        request_control(&a, &fixture, 5).await,
        ConfirmControlCode::ControlAccepted as u64
    );

    let release = Message::build(MessageCode::ReleaseControl)
        .finish()
        .expect("build");
    send(&b, &fixture, &release).await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    // No reply for B, and A still holds control.
    assert!(b.listen(Duration::from_millis(100)).await.is_err());
    assert!(fixture.access_control().has_control(a_id));
    fixture.close().await;
}

#[tokio::test]
async fn test_control_timeout_releases_and_notifies() {
    let fixture = Fixture::new();
    let a_id = Id::new(2, 2, 2);
    let a = fixture.client(a_id);

    fixture
        .access_control()
        .set_timeout(Duration::from_millis(300));
    assert_eq!(
        request_control(&a, &fixture, 5).await,
        ConfirmControlCode::ControlAccepted as u64
    );

    // No refresh: control lapses and the holder is notified.
    let notice = recv(&a, fixture.core_id).await;
    assert_eq!(
        Message::code_of(&notice).unwrap(),
        MessageCode::RejectControl
    );
    assert_eq!(
        notice.uint("response_code").unwrap(),
        RejectControlCode::ControlReleased as u64
    );
    assert!(!fixture.access_control().is_controlled());
    fixture.close().await;
}

#[tokio::test]
async fn test_query_control_reports_zero_when_uncontrolled() {
    let fixture = Fixture::new();
    let a = fixture.client(Id::new(2, 2, 2));

    let query = Message::build(MessageCode::QueryControl)
        .finish()
        .expect("build");
    send(&a, &fixture, &query).await;
    let report = recv(&a, fixture.core_id).await;
    assert_eq!(
        Message::code_of(&report).unwrap(),
        MessageCode::ReportControl
    );
    let id = Id::from_record(report.record("id").unwrap()).unwrap();
    assert_eq!(id, Id::ZERO);
    assert_eq!(
        report.uint("authority_code").unwrap(),
        u64::from(DEFAULT_AUTHORITY)
    );
    fixture.close().await;
}
