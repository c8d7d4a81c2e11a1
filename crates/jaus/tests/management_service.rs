// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Management state machine: lifecycle commands, command gating, and the
//! emergency requester set.

use jaus::protocol::messages::access_control::ConfirmControlCode;
use jaus::protocol::messages::management::ManagementStatus;
use jaus::service::access_control::AccessControlService;
use jaus::service::events::EventsService;
use jaus::service::liveness::LivenessService;
use jaus::service::management::ManagementService;
use jaus::transport::JudpTransport;
use jaus::{Component, Id, Message, MessageCode};
use std::sync::Arc;

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
                ManagementService::create,
                AccessControlService::create,
                EventsService::create,
                LivenessService::create,
            ],
        )
        .expect("component");
        Self { transport, component }
    }

    fn management(&self) -> Arc<ManagementService> {
        self.component
            .core()
            .find::<ManagementService>()
            .expect("management configured")
    }

    fn access_control(&self) -> Arc<AccessControlService> {
        self.component
            .core()
            .find::<AccessControlService>()
            .expect("access control configured")
    }

    fn dispatch(&self, message: &jaus::core::ser::Record, source: Id) -> Option<jaus::core::ser::Record> {
        self.component
            .core()
            .dispatch(message, source)
            .expect("dispatch")
    }

    fn send_simple(&self, code: MessageCode, source: Id) -> Option<jaus::core::ser::Record> {
        let message = Message::build(code).finish().expect("build");
        self.dispatch(&message, source)
    }

    fn take_control(&self, source: Id) {
        let request = Message::build(MessageCode::RequestControl)
            .uint("authority_code", 5)
            .finish()
            .expect("build");
        let reply = self.dispatch(&request, source).expect("confirm");
        assert_eq!(
            reply.uint("response_code").unwrap(),
            ConfirmControlCode::ControlAccepted as u64
        );
    }

    async fn close(self) {
        self.component.close().await;
        self.transport.close().await;
    }
}

#[tokio::test]
async fn test_initial_status_is_standby() {
    let fixture = Fixture::new();
    assert_eq!(fixture.management().status(), ManagementStatus::Standby);

    let report = fixture
        .send_simple(MessageCode::QueryStatus, Id::new(2, 2, 2))
        .expect("report");
    assert_eq!(
        report.uint("status").unwrap(),
        ManagementStatus::Standby as u64
    );
    fixture.close().await;
}

#[tokio::test]
async fn test_lifecycle_commands_require_control() {
    let fixture = Fixture::new();
    let stranger = Id::new(9, 9, 9);

    // No control: Resume is silently ignored.
    assert!(fixture.send_simple(MessageCode::Resume, stranger).is_none());
    assert_eq!(fixture.management().status(), ManagementStatus::Standby);
    fixture.close().await;
}

#[tokio::test]
async fn test_standby_ready_transitions() {
    let fixture = Fixture::new();
    let controller = Id::new(2, 2, 2);
    fixture.take_control(controller);

    fixture.send_simple(MessageCode::Resume, controller);
    assert_eq!(fixture.management().status(), ManagementStatus::Ready);

    fixture.send_simple(MessageCode::Standby, controller);
    assert_eq!(fixture.management().status(), ManagementStatus::Standby);
    fixture.close().await;
}

#[tokio::test]
async fn test_reset_releases_control() {
    let fixture = Fixture::new();
    let controller = Id::new(2, 2, 2);
    fixture.take_control(controller);

    fixture.send_simple(MessageCode::Resume, controller);
    fixture.send_simple(MessageCode::Reset, controller);

    assert_eq!(fixture.management().status(), ManagementStatus::Standby);
    assert!(!fixture.access_control().is_controlled());
    fixture.close().await;
}

#[tokio::test]
async fn test_shutdown_releases_control_and_halts() {
    let fixture = Fixture::new();
    let controller = Id::new(2, 2, 2);
    fixture.take_control(controller);

    fixture.send_simple(MessageCode::Shutdown, controller);
    assert_eq!(fixture.management().status(), ManagementStatus::Shutdown);
    assert!(!fixture.access_control().is_controlled());
    fixture.close().await;
}

#[tokio::test]
async fn test_emergency_set_is_not_gated() {
    let fixture = Fixture::new();
    let stranger = Id::new(9, 9, 9);

    let emergency = Message::build(MessageCode::SetEmergency)
        .uint("emergency_code", 1)
        .finish()
        .expect("build");
    fixture.dispatch(&emergency, stranger);
    assert_eq!(fixture.management().status(), ManagementStatus::Emergency);
    fixture.close().await;
}

#[tokio::test]
async fn test_emergency_clears_when_all_raisers_clear() {
    let fixture = Fixture::new();
    let first = Id::new(2, 2, 2);
    let second = Id::new(3, 3, 3);

    let emergency = Message::build(MessageCode::SetEmergency)
        .uint("emergency_code", 1)
        .finish()
        .expect("build");
    let clear = Message::build(MessageCode::ClearEmergency)
        .uint("emergency_code", 1)
        .finish()
        .expect("build");

    fixture.dispatch(&emergency, first);
    fixture.dispatch(&emergency, second);
    assert_eq!(fixture.management().status(), ManagementStatus::Emergency);

    // One of two raisers clears: still in emergency.
    fixture.dispatch(&clear, first);
    assert_eq!(fixture.management().status(), ManagementStatus::Emergency);

    // Last raiser clears: prior status restored.
    fixture.dispatch(&clear, second);
    assert_eq!(fixture.management().status(), ManagementStatus::Standby);
    fixture.close().await;
}

#[tokio::test]
async fn test_emergency_restores_ready_status() {
    let fixture = Fixture::new();
    let controller = Id::new(2, 2, 2);
    fixture.take_control(controller);
    fixture.send_simple(MessageCode::Resume, controller);
    assert_eq!(fixture.management().status(), ManagementStatus::Ready);

    let emergency = Message::build(MessageCode::SetEmergency)
        .uint("emergency_code", 1)
        .finish()
        .expect("build");
    let clear = Message::build(MessageCode::ClearEmergency)
        .uint("emergency_code", 1)
        .finish()
        .expect("build");

    fixture.dispatch(&emergency, controller);
    assert_eq!(fixture.management().status(), ManagementStatus::Emergency);
    fixture.dispatch(&clear, controller);
    assert_eq!(fixture.management().status(), ManagementStatus::Ready);
    fixture.close().await;
}
