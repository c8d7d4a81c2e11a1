// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Global wire and timing constants - single source of truth.
//!
//! Centralizes the JUDP transport constants (SAE AS5669A) and the runtime
//! timing defaults. **Never hardcode these elsewhere!**

use std::net::Ipv4Addr;
use std::time::Duration;

// =======================================================================
// JUDP wire constants (SAE AS5669A)
// =======================================================================

/// JAUS multicast group used for discovery and broadcast destinations.
pub const MULTICAST_ADDR: Ipv4Addr = Ipv4Addr::new(224, 3, 29, 71);

/// IANA-registered JAUS over UDP port.
pub const JUDP_PORT: u16 = 3794;

/// Only transport version 2 is spoken; anything else fails payload decode.
pub const TRANSPORT_VERSION: u8 = 2;

/// Maximum datagram size, including the one-byte transport version prefix.
pub const MAX_PAYLOAD_SIZE: usize = 512;

/// Uncompressed packet overhead: header (12 bytes) plus trailing sequence
/// number (2 bytes).
pub const PACKET_OVERHEAD: usize = 14;

/// Overhead of a header-compressed packet (adds `HC_number` + `HC_length`).
pub const PACKET_OVERHEAD_HC: usize = 16;

/// Per-fragment overhead used when splitting message contents: uncompressed
/// packet overhead plus the payload version byte.
pub const SINGLE_PACKET_OVERHEAD: usize = PACKET_OVERHEAD + 1;

/// Largest contents slice a single fragment can carry.
pub const MAX_FRAGMENT_CONTENTS: usize = MAX_PAYLOAD_SIZE - SINGLE_PACKET_OVERHEAD;

// =======================================================================
// Multicast socket options
// =======================================================================

/// Multicast TTL; >= 32 so broadcasts survive site-local routing.
pub const MULTICAST_TTL: u32 = 32;

// =======================================================================
// Timing defaults
// =======================================================================

/// Cadence of the batched send loop (~50 Hz).
pub const SEND_INTERVAL: Duration = Duration::from_millis(20);

/// How long a reliable send waits for an ACK before retrying.
pub const ACK_TIMEOUT: Duration = Duration::from_secs(5);

/// Retry budget for a reliable send, after the initial attempt.
pub const ACK_MAX_RETRIES: u32 = 5;

/// Bounded per-component receive queue depth (drop-oldest beyond this).
pub const RECV_QUEUE_CAPACITY: usize = 1024;

/// Default access-control timeout.
pub const CONTROL_TIMEOUT: Duration = Duration::from_secs(5);

/// Default event subscription timeout.
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(60);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragment_budget_is_consistent() {
        assert_eq!(SINGLE_PACKET_OVERHEAD, 15);
        assert_eq!(MAX_FRAGMENT_CONTENTS, 497);
        assert!(MAX_FRAGMENT_CONTENTS + SINGLE_PACKET_OVERHEAD <= MAX_PAYLOAD_SIZE);
    }

    #[test]
    fn test_multicast_group_is_jaus_group() {
        assert_eq!(MULTICAST_ADDR.to_string(), "224.3.29.71");
        assert!(MULTICAST_ADDR.is_multicast());
    }
}
