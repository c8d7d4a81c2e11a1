// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Events service end-to-end: periodic emission, on-change emission,
//! subscription timeout, cancel/update, and query traversal.

use jaus::protocol::messages::events::{EventType, QueryEventsVariant, RejectEventCode};
use jaus::protocol::messages::management::ManagementStatus;
use jaus::service::access_control::AccessControlService;
use jaus::service::events::EventsService;
use jaus::service::liveness::LivenessService;
use jaus::service::management::ManagementService;
use jaus::transport::{Connection, JudpTransport, SendOptions};
use jaus::{Component, Id, Message, MessageCode};
use std::sync::Arc;
use std::time::{Duration, Instant};

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

struct Fixture {
    node_transport: JudpTransport,
    client_transport: JudpTransport,
    component: Component,
    core_id: Id,
    subscriber: Connection,
    subscriber_id: Id,
}

impl Fixture {
    fn new() -> Self {
        let node_transport =
            JudpTransport::bind_local("127.0.0.1:0".parse().expect("addr")).expect("bind");
        let client_transport =
            JudpTransport::bind_local("127.0.0.1:0".parse().expect("addr")).expect("bind");

        let core_id = Id::new(1, 1, 1);
        let subscriber_id = Id::new(2, 2, 2);
        client_transport.add_route(core_id, node_transport.local_addr().expect("addr"));

        let component = Component::new(
            core_id,
            "TestCore",
            "TestNode",
            "TestSubsystem",
            0,
            node_transport.connect(core_id),
            &[
                EventsService::create,
                AccessControlService::create,
                ManagementService::create,
                LivenessService::create,
            ],
        )
        .expect("component");
        component.listen();

        let subscriber = client_transport.connect(subscriber_id);
        Self {
            node_transport,
            client_transport,
            component,
            core_id,
            subscriber,
            subscriber_id,
        }
    }

    fn events(&self) -> Arc<EventsService> {
        self.component
            .core()
            .find::<EventsService>()
            .expect("events configured")
    }

    async fn send(&self, message: &jaus::core::ser::Record) {
        let bytes = Message::encode(message).expect("encode");
        self.subscriber
            .send_message(&bytes, self.core_id, SendOptions::default())
            .await
            .expect("send");
    }

    async fn recv(&self) -> jaus::core::ser::Record {
        let (bytes, source) = self.subscriber.listen(RECV_TIMEOUT).await.expect("reply");
        assert_eq!(source, self.core_id);
        Message::decode(&bytes).expect("decode")
    }

    /// Receive until a message with `code` arrives (skipping others).
    async fn recv_code(&self, code: MessageCode) -> jaus::core::ser::Record {
        loop {
            let message = self.recv().await;
            if Message::code_of(&message).unwrap() == code {
                return message;
            }
        }
    }

    async fn create_event(&self, event_type: EventType, query: &[u8]) -> jaus::core::ser::Record {
        let create = Message::build(MessageCode::CreateEvent)
            .uint("request_id", 1)
            .uint("event_type", event_type as u64)
            .float("requested_periodic_rate", 0.0)
            .bytes("query_message", query.to_vec())
            .finish()
            .expect("build");
        self.send(&create).await;
        self.recv_code(MessageCode::ConfirmEventRequest).await
    }

    async fn close(self) {
        self.component.close().await;
        self.node_transport.close().await;
        self.client_transport.close().await;
    }
}

fn heartbeat_query() -> Vec<u8> {
    let query = Message::build(MessageCode::QueryHeartbeatPulse)
        .finish()
        .expect("build");
    Message::encode(&query).expect("encode")
}

fn status_query() -> Vec<u8> {
    let query = Message::build(MessageCode::QueryStatus).finish().expect("build");
    Message::encode(&query).expect("encode")
}

// ---------------------------------------------------------------------------
// Periodic events
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_periodic_event_rate() {
    let fixture = Fixture::new();

    let confirm = fixture
        .create_event(EventType::Periodic, &heartbeat_query())
        .await;
    let confirmed_rate = confirm.float("confirmed_periodic_rate").unwrap();
    assert!(
        (confirmed_rate - 5.0).abs() < 0.1,
        "confirmed rate was {}",
        confirmed_rate
    );
    let event_id = confirm.u8("event_id").unwrap();

    // Collect events for about a second; at 5 Hz that is ~5 firings.
    let started = Instant::now();
    let mut arrivals = Vec::new();
    let mut sequences = Vec::new();
    while started.elapsed() < Duration::from_millis(1050) {
        let remaining = Duration::from_millis(1100).saturating_sub(started.elapsed());
        match fixture.subscriber.listen(remaining.max(Duration::from_millis(1))).await {
            Ok((bytes, _)) => {
                let message = Message::decode(&bytes).expect("decode");
                if Message::code_of(&message).unwrap() != MessageCode::Event {
                    continue;
                }
                assert_eq!(message.u8("event_id").unwrap(), event_id);
                let report = Message::decode(message.bytes("report_message").unwrap())
                    .expect("report decode");
                assert_eq!(
                    Message::code_of(&report).unwrap(),
                    MessageCode::ReportHeartbeatPulse
                );
                sequences.push(message.u8("sequence_number").unwrap());
                arrivals.push(Instant::now());
            }
            Err(_) => break,
        }
    }

    assert!(
        (3..=8).contains(&arrivals.len()),
        "expected ~5 events in a second, got {}",
        arrivals.len()
    );
    for pair in sequences.windows(2) {
        assert_eq!(pair[1], pair[0].wrapping_add(1), "sequence increments");
    }
    fixture.close().await;
}

// ---------------------------------------------------------------------------
// On-change events
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_every_change_event_fires_on_state_change() {
    let fixture = Fixture::new();

    let confirm = fixture
        .create_event(EventType::EveryChange, &status_query())
        .await;
    assert_eq!(confirm.float("confirmed_periodic_rate").unwrap(), 0.0);

    // Raising an emergency changes the watched status key.
    let emergency = Message::build(MessageCode::SetEmergency)
        .uint("emergency_code", 1)
        .finish()
        .expect("build");
    fixture.send(&emergency).await;

    let event = fixture.recv_code(MessageCode::Event).await;
    let report =
        Message::decode(event.bytes("report_message").unwrap()).expect("report decode");
    assert_eq!(
        report.uint("status").unwrap(),
        ManagementStatus::Emergency as u64
    );

    // Clearing restores the prior status and fires again.
    let clear = Message::build(MessageCode::ClearEmergency)
        .uint("emergency_code", 1)
        .finish()
        .expect("build");
    fixture.send(&clear).await;

    let event = fixture.recv_code(MessageCode::Event).await;
    let report =
        Message::decode(event.bytes("report_message").unwrap()).expect("report decode");
    assert_eq!(
        report.uint("status").unwrap(),
        ManagementStatus::Standby as u64
    );
    fixture.close().await;
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_event_timeout_sends_final_confirm() {
    let fixture = Fixture::new();
    fixture.events().set_event_timeout(Duration::from_millis(400));

    let confirm = fixture
        .create_event(EventType::EveryChange, &status_query())
        .await;
    let event_id = confirm.u8("event_id").unwrap();
    assert_eq!(fixture.events().active_events(), 1);

    // The closing confirmation arrives on its own after the timeout.
    let closing = fixture.recv_code(MessageCode::ConfirmEventRequest).await;
    assert_eq!(closing.u8("event_id").unwrap(), event_id);
    assert_eq!(fixture.events().active_events(), 0);
    fixture.close().await;
}

#[tokio::test]
async fn test_cancel_event() {
    let fixture = Fixture::new();

    let confirm = fixture
        .create_event(EventType::EveryChange, &status_query())
        .await;
    let event_id = confirm.u8("event_id").unwrap();

    let cancel = Message::build(MessageCode::CancelEvent)
        .uint("request_id", 2)
        .uint("event_id", u64::from(event_id))
        .finish()
        .expect("build");
    fixture.send(&cancel).await;
    let reply = fixture.recv_code(MessageCode::ConfirmEventRequest).await;
    assert_eq!(reply.u8("request_id").unwrap(), 2);
    assert_eq!(fixture.events().active_events(), 0);

    // Cancelling again rejects.
    fixture.send(&cancel).await;
    let reply = fixture.recv_code(MessageCode::RejectEventRequest).await;
    assert_eq!(
        reply.uint("response_code").unwrap(),
        RejectEventCode::InvalidEventIdForUpdate as u64
    );
    fixture.close().await;
}

#[tokio::test]
async fn test_update_unknown_event_rejected() {
    let fixture = Fixture::new();

    let update = Message::build(MessageCode::UpdateEvent)
        .uint("request_id", 7)
        .uint("event_type", EventType::EveryChange as u64)
        .float("requested_periodic_rate", 0.0)
        .uint("event_id", 42)
        .bytes("query_message", status_query())
        .finish()
        .expect("build");
    fixture.send(&update).await;
    let reply = fixture.recv_code(MessageCode::RejectEventRequest).await;
    assert_eq!(reply.u8("request_id").unwrap(), 7);
    assert_eq!(
        reply.uint("response_code").unwrap(),
        RejectEventCode::InvalidEventIdForUpdate as u64
    );
    fixture.close().await;
}

#[tokio::test]
async fn test_query_events_filters() {
    let fixture = Fixture::new();

    let confirm = fixture
        .create_event(EventType::EveryChange, &status_query())
        .await;
    let event_id = confirm.u8("event_id").unwrap();

    // By id: one hit.
    let query = Message::build(MessageCode::QueryEvents)
        .uint("variant", QueryEventsVariant::EventId as u64)
        .uint("event_id", u64::from(event_id))
        .finish()
        .expect("build");
    fixture.send(&query).await;
    let report = fixture.recv_code(MessageCode::ReportEvents).await;
    assert_eq!(report.list("events").unwrap().len(), 1);

    // By type PERIODIC: no hits.
    let query = Message::build(MessageCode::QueryEvents)
        .uint("variant", QueryEventsVariant::EventType as u64)
        .uint("event_type", EventType::Periodic as u64)
        .finish()
        .expect("build");
    fixture.send(&query).await;
    let report = fixture.recv_code(MessageCode::ReportEvents).await;
    assert!(report.list("events").unwrap().is_empty());

    // All: one hit again.
    let query = Message::build(MessageCode::QueryEvents)
        .uint("variant", QueryEventsVariant::AllEvents as u64)
        .finish()
        .expect("build");
    fixture.send(&query).await;
    let report = fixture.recv_code(MessageCode::ReportEvents).await;
    assert_eq!(report.list("events").unwrap().len(), 1);
    fixture.close().await;
}
