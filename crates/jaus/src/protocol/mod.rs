// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The JAUS wire protocol: component addresses, the message catalog, and
//! JUDP packet/payload framing.

pub mod id;
pub mod judp;
pub mod message;
pub mod messages;
pub mod timestamp;

pub use id::Id;
pub use judp::{AckNack, Broadcast, DataFlags, HcFlags, Packet, Payload, Priority};
pub use message::{Message, MessageCode};
