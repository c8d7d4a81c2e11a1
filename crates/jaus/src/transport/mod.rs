// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The JUDP transport engine.
//!
//! Owns the UDP socket and everything that lives between raw datagrams and
//! per-component message queues: payload framing, fragmentation and
//! reassembly, per-(source, destination) sequence numbering, ACK tracking
//! with retry, a routing table learned from inbound packets, and a batched
//! send loop at a fixed cadence.
//!
//! Interior state is guarded by a mutex shared between the receive task, the
//! send loop, and callers; the lock is never held across an await.

pub mod multicast;

use crate::config::{
    ACK_MAX_RETRIES, ACK_TIMEOUT, JUDP_PORT, MAX_FRAGMENT_CONTENTS, MAX_PAYLOAD_SIZE,
    MULTICAST_ADDR, RECV_QUEUE_CAPACITY, SEND_INTERVAL,
};
use crate::protocol::id::Id;
use crate::protocol::judp::{AckNack, Broadcast, DataFlags, Packet, Payload, Priority};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;

/// Transport-level failures.
#[derive(Debug)]
pub enum TransportError {
    /// Socket creation or bind failed; fatal at startup.
    Bind(io::Error),
    /// A reliable send exhausted its retry budget without an ACK.
    SendFailed {
        destination: Id,
        sequence_number: u16,
    },
    /// A destination with broadcast NONE has no learned route.
    NoRoute { destination: Id },
    /// `listen` gave up waiting for an inbound message.
    ListenTimeout,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Bind(err) => write!(f, "socket bind failed: {}", err),
            TransportError::SendFailed {
                destination,
                sequence_number,
            } => write!(
                f,
                "send to {} not acknowledged (seq {})",
                destination, sequence_number
            ),
            TransportError::NoRoute { destination } => {
                write!(f, "no route to {}", destination)
            }
            TransportError::ListenTimeout => write!(f, "listen timed out"),
        }
    }
}

impl std::error::Error for TransportError {}

/// Per-send knobs; the defaults match an ordinary unicast message.
#[derive(Debug, Clone, Copy)]
pub struct SendOptions {
    pub broadcast: Broadcast,
    pub priority: Priority,
    pub require_ack: bool,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            broadcast: Broadcast::None,
            priority: Priority::Standard,
            require_ack: false,
        }
    }
}

impl SendOptions {
    pub fn reliable() -> Self {
        Self {
            require_ack: true,
            ..Self::default()
        }
    }

    pub fn broadcast(scope: Broadcast) -> Self {
        Self {
            broadcast: scope,
            ..Self::default()
        }
    }
}

/// Bounded drop-oldest inbound queue of one connection.
struct RecvQueue {
    items: Mutex<VecDeque<(Vec<u8>, Id)>>,
    notify: Notify,
    capacity: usize,
}

impl RecvQueue {
    fn new(capacity: usize) -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            capacity,
        }
    }

    fn push(&self, message: Vec<u8>, source: Id) {
        let mut items = self.items.lock();
        if items.len() >= self.capacity {
            items.pop_front();
            log::warn!("[judp] receive queue full, dropping oldest message");
        }
        items.push_back((message, source));
        drop(items);
        self.notify.notify_one();
    }

    async fn pop(&self) -> (Vec<u8>, Id) {
        loop {
            if let Some(item) = self.items.lock().pop_front() {
                return item;
            }
            self.notify.notified().await;
        }
    }
}

struct State {
    /// Last seen address per source id; overwritten on every inbound packet.
    routings: HashMap<Id, SocketAddr>,
    /// Per-destination reassembly buffers keyed by sequence number.
    accumulators: HashMap<Id, HashMap<u16, Packet>>,
    /// Pending reliable sends keyed by (remote id, sequence number).
    resolvers: HashMap<(Id, u16), oneshot::Sender<AckNack>>,
    /// Fresh sequence numbers per (source, destination) pair.
    sequence_numbers: HashMap<(Id, Id), u16>,
    /// Outbound packets waiting for the next send-loop tick.
    send_queue: Vec<Packet>,
    /// Registered local components.
    connections: HashMap<Id, Arc<RecvQueue>>,
}

struct Inner {
    socket: UdpSocket,
    multicast: SocketAddr,
    state: Mutex<State>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    ack_timeout: Mutex<Duration>,
    ack_retries: Mutex<u32>,
}

/// The JUDP transport engine; cheap to clone, one per socket.
#[derive(Clone)]
pub struct JudpTransport {
    inner: Arc<Inner>,
}

impl JudpTransport {
    /// Bind on `0.0.0.0:port` and join the JAUS multicast group.
    ///
    /// Bind or group-join failure is fatal at startup.
    pub fn bind(port: u16) -> Result<Self, TransportError> {
        let socket = multicast::bind_multicast(port).map_err(TransportError::Bind)?;
        Self::start(socket)
    }

    /// Bind on the default JAUS port.
    pub fn bind_default() -> Result<Self, TransportError> {
        Self::bind(JUDP_PORT)
    }

    /// Bind on an explicit address without joining the multicast group.
    ///
    /// Unicast-only operation; broadcast packets still target the group
    /// address and rely on the network to route them.
    pub fn bind_local(addr: SocketAddr) -> Result<Self, TransportError> {
        let socket = multicast::bind_socket(addr).map_err(TransportError::Bind)?;
        Self::start(socket)
    }

    fn start(socket: std::net::UdpSocket) -> Result<Self, TransportError> {
        let socket = UdpSocket::from_std(socket).map_err(TransportError::Bind)?;
        let inner = Arc::new(Inner {
            socket,
            multicast: SocketAddr::new(MULTICAST_ADDR.into(), JUDP_PORT),
            state: Mutex::new(State {
                routings: HashMap::new(),
                accumulators: HashMap::new(),
                resolvers: HashMap::new(),
                sequence_numbers: HashMap::new(),
                send_queue: Vec::new(),
                connections: HashMap::new(),
            }),
            tasks: Mutex::new(Vec::new()),
            ack_timeout: Mutex::new(ACK_TIMEOUT),
            ack_retries: Mutex::new(ACK_MAX_RETRIES),
        });

        let recv_task = tokio::spawn(Self::receive_loop(Arc::clone(&inner)));
        let send_task = tokio::spawn(Self::send_loop(Arc::clone(&inner)));
        inner.tasks.lock().extend([recv_task, send_task]);

        Ok(Self { inner })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.socket.local_addr()
    }

    /// Register a local component id and hand back its connection.
    pub fn connect(&self, own_id: Id) -> Connection {
        let queue = Arc::new(RecvQueue::new(RECV_QUEUE_CAPACITY));
        self.inner
            .state
            .lock()
            .connections
            .insert(own_id, Arc::clone(&queue));
        Connection {
            transport: self.clone(),
            queue,
            own_id,
        }
    }

    /// Override the reliable-send retry budget and per-attempt timeout.
    pub fn set_ack_timing(&self, timeout: Duration, retries: u32) {
        *self.inner.ack_timeout.lock() = timeout;
        *self.inner.ack_retries.lock() = retries;
    }

    /// Seed or overwrite a route (otherwise learned from inbound packets).
    pub fn add_route(&self, id: Id, addr: SocketAddr) {
        self.inner.state.lock().routings.insert(id, addr);
    }

    pub fn route_for(&self, id: Id) -> Option<SocketAddr> {
        self.inner.state.lock().routings.get(&id).copied()
    }

    /// Fire-and-forget send: fragment, stamp, and enqueue for the next
    /// send-loop tick. Never blocks.
    pub fn post(
        &self,
        contents: &[u8],
        source_id: Id,
        destination_id: Id,
        options: SendOptions,
    ) {
        let packets = self.split_into_packets(contents, source_id, destination_id, &options, false);
        let mut state = self.inner.state.lock();
        state.send_queue.extend(packets);
    }

    /// Send a message, optionally reliably.
    ///
    /// With `require_ack`, resolves once every fragment is ACKed; each
    /// fragment is retried up to the retry budget on a fixed timeout, and
    /// exhaustion surfaces as `SendFailed`.
    pub async fn send_message(
        &self,
        contents: &[u8],
        source_id: Id,
        destination_id: Id,
        options: SendOptions,
    ) -> Result<(), TransportError> {
        let packets =
            self.split_into_packets(contents, source_id, destination_id, &options, options.require_ack);
        if !options.require_ack {
            self.inner.state.lock().send_queue.extend(packets);
            return Ok(());
        }

        let mut waiters = Vec::with_capacity(packets.len());
        for packet in packets {
            let transport = self.clone();
            waiters.push(tokio::spawn(async move {
                transport.send_reliable(packet).await
            }));
        }
        for waiter in waiters {
            match waiter.await {
                Ok(result) => result?,
                Err(err) => {
                    log::error!("[judp] ack waiter task failed: {}", err);
                    return Err(TransportError::SendFailed {
                        destination: destination_id,
                        sequence_number: 0,
                    });
                }
            }
        }
        Ok(())
    }

    /// Retry loop of one reliable fragment.
    async fn send_reliable(&self, packet: Packet) -> Result<(), TransportError> {
        let key = (packet.destination_id, packet.sequence_number);
        let (ack_timeout, retries) = (
            *self.inner.ack_timeout.lock(),
            *self.inner.ack_retries.lock(),
        );
        for attempt in 0..=retries {
            let rx = {
                let mut state = self.inner.state.lock();
                let (tx, rx) = oneshot::channel();
                state.resolvers.insert(key, tx);
                state.send_queue.push(packet.clone());
                rx
            };
            match tokio::time::timeout(ack_timeout, rx).await {
                Ok(Ok(AckNack::Ack)) => return Ok(()),
                Ok(Ok(other)) => {
                    log::debug!(
                        "[judp] seq {} answered {:?}, attempt {}",
                        packet.sequence_number,
                        other,
                        attempt
                    );
                }
                Ok(Err(_)) | Err(_) => {
                    log::debug!(
                        "[judp] seq {} to {} unacknowledged, attempt {}",
                        packet.sequence_number,
                        packet.destination_id,
                        attempt
                    );
                    self.inner.state.lock().resolvers.remove(&key);
                }
            }
        }
        Err(TransportError::SendFailed {
            destination: packet.destination_id,
            sequence_number: packet.sequence_number,
        })
    }

    fn next_sequence_number(state: &mut State, source_id: Id, destination_id: Id) -> u16 {
        let counter = state
            .sequence_numbers
            .entry((source_id, destination_id))
            .or_insert(0);
        let n = *counter;
        *counter = counter.wrapping_add(1);
        n
    }

    /// Fragment message contents into stamped packets.
    ///
    /// One fragment fits -> SINGLE; otherwise FIRST, NORMAL..., LAST, each
    /// with a fresh sequence number from the per-pair counter.
    fn split_into_packets(
        &self,
        contents: &[u8],
        source_id: Id,
        destination_id: Id,
        options: &SendOptions,
        require_ack: bool,
    ) -> Vec<Packet> {
        let ack_nack = if require_ack {
            AckNack::ResponseRequired
        } else {
            AckNack::NoResponseRequired
        };
        let mut state = self.inner.state.lock();
        let make = |state: &mut State, part: &[u8], flags: DataFlags| Packet {
            priority: options.priority,
            broadcast: options.broadcast,
            ack_nack,
            data_flags: flags,
            destination_id,
            source_id,
            contents: part.to_vec(),
            sequence_number: Self::next_sequence_number(state, source_id, destination_id),
        };

        if contents.len() <= MAX_FRAGMENT_CONTENTS {
            return vec![make(&mut state, contents, DataFlags::SinglePacket)];
        }

        let chunks: Vec<&[u8]> = contents.chunks(MAX_FRAGMENT_CONTENTS).collect();
        let last = chunks.len() - 1;
        chunks
            .iter()
            .enumerate()
            .map(|(i, part)| {
                let flags = if i == 0 {
                    DataFlags::FirstPacket
                } else if i == last {
                    DataFlags::LastPacket
                } else {
                    DataFlags::NormalPacket
                };
                make(&mut state, part, flags)
            })
            .collect()
    }

    // ===== Send loop =====

    async fn send_loop(inner: Arc<Inner>) {
        loop {
            let packets: Vec<Packet> = {
                let mut state = inner.state.lock();
                std::mem::take(&mut state.send_queue)
            };
            if !packets.is_empty() {
                Self::send_packets(&inner, packets).await;
            }
            tokio::time::sleep(SEND_INTERVAL).await;
        }
    }

    /// Group queued packets into per-destination payloads and emit them.
    ///
    /// Enqueue order is preserved within a destination; a payload is flushed
    /// once the next packet would push it past the datagram budget.
    async fn send_packets(inner: &Arc<Inner>, packets: Vec<Packet>) {
        let mut ready: Vec<(SocketAddr, Payload)> = Vec::new();
        let mut open: HashMap<SocketAddr, Payload> = HashMap::new();
        {
            let state = inner.state.lock();
            for packet in packets {
                let addr = match Self::destination_addr(inner, &state, &packet) {
                    Some(addr) => addr,
                    None => {
                        log::warn!(
                            "[judp] no route to {}, dropping packet seq {}",
                            packet.destination_id,
                            packet.sequence_number
                        );
                        continue;
                    }
                };
                let payload = open.entry(addr).or_default();
                if payload.wire_size() + packet.data_size() > MAX_PAYLOAD_SIZE {
                    ready.push((addr, std::mem::take(payload)));
                }
                open.get_mut(&addr)
                    .expect("entry just inserted")
                    .packets
                    .push(packet);
            }
        }
        ready.extend(open.into_iter().filter(|(_, p)| !p.packets.is_empty()));

        for (addr, payload) in ready {
            let bytes = match payload.encode() {
                Ok(bytes) => bytes,
                Err(err) => {
                    log::error!("[judp] payload encode failed: {}", err);
                    continue;
                }
            };
            log::debug!(
                "[judp] send {} packet(s) {} bytes -> {}",
                payload.packets.len(),
                bytes.len(),
                addr
            );
            if let Err(err) = inner.socket.send_to(&bytes, addr).await {
                log::warn!("[judp] send to {} failed: {}", addr, err);
            }
        }
    }

    fn destination_addr(inner: &Arc<Inner>, state: &State, packet: &Packet) -> Option<SocketAddr> {
        match packet.broadcast {
            Broadcast::Local | Broadcast::Global => Some(inner.multicast),
            Broadcast::None => state.routings.get(&packet.destination_id).copied(),
        }
    }

    // ===== Receive path =====

    async fn receive_loop(inner: Arc<Inner>) {
        let mut buf = vec![0u8; 2048];
        loop {
            let (len, addr) = match inner.socket.recv_from(&mut buf).await {
                Ok(received) => received,
                Err(err) => {
                    log::warn!("[judp] recv failed: {}", err);
                    continue;
                }
            };
            match Payload::decode(&buf[..len]) {
                Ok(payload) => {
                    for packet in payload.packets {
                        Self::handle_packet(&inner, packet, addr);
                    }
                }
                Err(err) => {
                    log::debug!("[judp] dropping undecodable datagram from {}: {}", addr, err);
                }
            }
        }
    }

    fn handle_packet(inner: &Arc<Inner>, packet: Packet, addr: SocketAddr) {
        let mut state = inner.state.lock();
        state.routings.insert(packet.source_id, addr);

        match packet.ack_nack {
            AckNack::Ack | AckNack::Nack => {
                // The reply swapped src/dst, so the resolver sits under the
                // replier's id.
                let key = (packet.source_id, packet.sequence_number);
                if let Some(tx) = state.resolvers.remove(&key) {
                    let _ = tx.send(packet.ack_nack);
                } else {
                    log::debug!(
                        "[judp] unexpected {:?} from {} seq {}",
                        packet.ack_nack,
                        packet.source_id,
                        packet.sequence_number
                    );
                }
            }
            flags => {
                if flags == AckNack::ResponseRequired {
                    let ack = Packet {
                        priority: packet.priority,
                        broadcast: Broadcast::None,
                        ack_nack: AckNack::Ack,
                        data_flags: packet.data_flags,
                        destination_id: packet.source_id,
                        source_id: packet.destination_id,
                        contents: Vec::new(),
                        sequence_number: packet.sequence_number,
                    };
                    state.send_queue.push(ack);
                }

                let destination_id = packet.destination_id;
                let source_id = packet.source_id;
                state
                    .accumulators
                    .entry(destination_id)
                    .or_default()
                    .insert(packet.sequence_number, packet.clone());
                if let Some(message) = Self::try_reconstruct(&mut state, &packet) {
                    match state.connections.get(&destination_id) {
                        Some(queue) => queue.push(message, source_id),
                        None => {
                            log::warn!(
                                "[judp] message for unregistered destination {}, dropping",
                                destination_id
                            );
                        }
                    }
                }
            }
        }
    }

    /// Look for a contiguous FIRST..LAST run around `packet` and splice it.
    fn try_reconstruct(state: &mut State, packet: &Packet) -> Option<Vec<u8>> {
        let accumulator = state.accumulators.entry(packet.destination_id).or_default();
        if packet.data_flags == DataFlags::SinglePacket {
            // A stale single left behind could get spliced into a later
            // FIRST..LAST run, so take it back out.
            accumulator.remove(&packet.sequence_number);
            return Some(packet.contents.clone());
        }

        // Walk backward to the FIRST fragment...
        let mut seq = packet.sequence_number;
        loop {
            let current = accumulator.get(&seq)?;
            if current.data_flags == DataFlags::FirstPacket {
                break;
            }
            seq = seq.wrapping_sub(1);
        }

        // ...then forward to the LAST, collecting the run.
        let first_seq = seq;
        let mut run = Vec::new();
        loop {
            let current = accumulator.get(&seq)?;
            run.push(seq);
            if current.data_flags == DataFlags::LastPacket {
                break;
            }
            seq = seq.wrapping_add(1);
        }

        let mut message = Vec::new();
        for seq in &run {
            let fragment = accumulator
                .remove(seq)
                .expect("fragment present in the run just walked");
            message.extend_from_slice(&fragment.contents);
        }
        log::debug!(
            "[judp] reassembled {} fragment(s) (seq {}..={}) into {} bytes",
            run.len(),
            first_seq,
            run.last().copied().unwrap_or(first_seq),
            message.len()
        );
        Some(message)
    }

    /// Stop the send and receive tasks. Pending reliable sends resolve with
    /// `SendFailed` once their retry budget runs out.
    pub async fn close(&self) {
        let tasks: Vec<JoinHandle<()>> = std::mem::take(&mut *self.inner.tasks.lock());
        for task in &tasks {
            task.abort();
        }
        for task in tasks {
            let _ = task.await;
        }
    }
}

/// A component-facing facade bound to one local id.
#[derive(Clone)]
pub struct Connection {
    transport: JudpTransport,
    queue: Arc<RecvQueue>,
    own_id: Id,
}

impl Connection {
    pub fn own_id(&self) -> Id {
        self.own_id
    }

    pub fn transport(&self) -> &JudpTransport {
        &self.transport
    }

    /// Await the next fully reassembled message addressed to this id.
    pub async fn recv(&self) -> (Vec<u8>, Id) {
        self.queue.pop().await
    }

    /// Like [`recv`](Self::recv), but gives up after `timeout`.
    pub async fn listen(&self, timeout: Duration) -> Result<(Vec<u8>, Id), TransportError> {
        tokio::time::timeout(timeout, self.queue.pop())
            .await
            .map_err(|_| TransportError::ListenTimeout)
    }

    /// Reliable-capable send from this connection's id.
    pub async fn send_message(
        &self,
        contents: &[u8],
        destination_id: Id,
        options: SendOptions,
    ) -> Result<(), TransportError> {
        self.transport
            .send_message(contents, self.own_id, destination_id, options)
            .await
    }

    /// Fire-and-forget enqueue from this connection's id.
    pub fn post(&self, contents: &[u8], destination_id: Id, options: SendOptions) {
        self.transport
            .post(contents, self.own_id, destination_id, options);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SINGLE_PACKET_OVERHEAD;

    fn test_transport() -> JudpTransport {
        JudpTransport::bind_local("127.0.0.1:0".parse().expect("addr")).expect("bind")
    }

    #[tokio::test]
    async fn test_fragment_counts() {
        let transport = test_transport();
        let src = Id::new(1, 1, 1);
        let dst = Id::new(2, 2, 2);

        for len in [0usize, 1, 500, 512, 513, 1024, 2000] {
            let contents = vec![0xAB; len];
            let packets = transport.split_into_packets(
                &contents,
                src,
                dst,
                &SendOptions::default(),
                false,
            );
            let expected = ((len + 1) as f64 / (MAX_PAYLOAD_SIZE - SINGLE_PACKET_OVERHEAD) as f64)
                .ceil()
                .max(1.0) as usize;
            assert_eq!(packets.len(), expected, "len={}", len);

            let total: usize = packets.iter().map(|p| p.contents.len()).sum();
            assert_eq!(total, len);

            if packets.len() == 1 {
                assert_eq!(packets[0].data_flags, DataFlags::SinglePacket);
            } else {
                assert_eq!(packets[0].data_flags, DataFlags::FirstPacket);
                assert_eq!(
                    packets[packets.len() - 1].data_flags,
                    DataFlags::LastPacket
                );
                for middle in &packets[1..packets.len() - 1] {
                    assert_eq!(middle.data_flags, DataFlags::NormalPacket);
                }
            }
        }
        transport.close().await;
    }

    #[tokio::test]
    async fn test_sequence_numbers_are_unique_per_pair() {
        let transport = test_transport();
        let src = Id::new(1, 1, 1);
        let dst = Id::new(2, 2, 2);
        let other = Id::new(3, 3, 3);

        let packets = transport.split_into_packets(
            &vec![0u8; 2000],
            src,
            dst,
            &SendOptions::default(),
            false,
        );
        let seqs: Vec<u16> = packets.iter().map(|p| p.sequence_number).collect();
        assert_eq!(seqs, vec![0, 1, 2, 3, 4]);

        // A different pair starts its own counter.
        let packets =
            transport.split_into_packets(b"hi", src, other, &SendOptions::default(), false);
        assert_eq!(packets[0].sequence_number, 0);
        transport.close().await;
    }

    #[test]
    fn test_recv_queue_drop_oldest() {
        let queue = RecvQueue::new(2);
        let src = Id::new(1, 1, 1);
        queue.push(vec![1], src);
        queue.push(vec![2], src);
        queue.push(vec![3], src);
        let items = queue.items.lock();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].0, vec![2]);
        assert_eq!(items[1].0, vec![3]);
    }
}
