// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # satlink - Satellite radio link engine for the climate hub
//!
//! Turns an unreliable, MTU-limited (250 byte), broadcast-capable datagram radio into a
//! channel for JSON messages of arbitrary size, remembers which satellite lives behind which
//! radio address, and routes decoded messages to the rest of the hub.
//!
//! ## Architecture
//!
//! ```text
//!  radio datagram (src, dest, bytes)
//!        |
//!        v
//! +------------------+      +--------------------+
//! |      Router      | ---> |  ReassemblyTable   |  <-- header + CRC-16 per message
//! +------------------+      +--------------------+
//!        |  complete JSON envelope
//!        v
//! +------------------+      +--------------------+
//! |  dispatch by "t" | ---> | SatelliteRegistry  |  <-- deviceId -> peer address
//! +------------------+      +--------------------+
//!        |                          ^
//!        v                          |
//!  SatelliteHandler          +--------------------+
//!  (hello/state/target)      |      Outbound      |  <-- get / set / replies
//!                            +--------------------+
//!                                   |
//!                                   v
//!                            +--------------------+
//!                            |     Fragmenter     |  --> Radio::send
//!                            +--------------------+
//! ```
//!
//! ## Wire Protocol
//!
//! ```text
//! Fragment = magic(0xA7) | version(1) | frame_type | total | index | msg_id(le16)
//!          | full_len(le16) | crc16(le16) | chunk
//! ```
//!
//! A datagram that does not start with the magic/version pair is a bare JSON envelope.
//!
//! ## Usage
//!
//! ```ignore
//! let radio = Arc::new(MyRadio::new());
//! let mut link = SatLink::new(LinkConfig::default(), radio.clone())?;
//! link.set_handler(Box::new(MyBridge::default()));
//! link.start()?;
//!
//! // From the radio stack's receive task (one datagram at a time)
//! link.handle_datagram(src, dest, &bytes);
//!
//! // From any other thread
//! let outbound = link.outbound();
//! outbound.send_set_json(Some("dev1"), br#"{"t":"set","power":true}"#)?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod addr;
pub mod config;
pub mod envelope;
pub mod error;
pub mod fragment;
pub mod link;
pub mod outbound;
pub mod poller;
pub mod radio;
pub mod reassembly;
pub mod registry;
pub mod router;
pub mod stats;
pub mod wire;

pub use addr::{DestMode, PeerAddr};
pub use config::LinkConfig;
pub use envelope::{Envelope, MessageKind};
pub use error::{
    ConfigError, EnvelopeError, LinkError, ReassemblyError, RegistryError, SendError,
};
pub use fragment::{Delivery, Fragmenter};
pub use link::SatLink;
pub use outbound::Outbound;
pub use radio::{Clock, ManualClock, MemoryRadio, Radio, SentFrame, SystemClock};
pub use reassembly::{ApplyResult, ReassemblyKey, ReassemblyTable, SlotHandle};
pub use registry::{SatelliteEntry, SatelliteRegistry, Upsert};
pub use router::{DropReason, Router, RxOutcome, SatelliteHandler};
pub use stats::{OutboundStats, RouterStats};
pub use wire::{crc16_ccitt, FragmentHeader, FrameType, HEADER_SIZE, MAX_DATAGRAM};
