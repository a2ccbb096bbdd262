// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Frame codec: fragment header and message checksum.
//!
//! - `crc` - CRC-16/CCITT-FALSE over the full message payload
//! - `header` - fixed 11-byte fragment header

pub mod crc;
pub mod header;

pub use crc::{crc16_ccitt, crc16_ccitt_bitwise, crc16_ccitt_update};
pub use header::{decode_header, FragmentHeader, FrameType, FRAG_MAGIC, FRAG_VERSION, HEADER_SIZE};

/// Largest datagram the radio accepts.
pub const MAX_DATAGRAM: usize = 250;

/// Largest chunk carried by one fragment at the default MTU.
pub const MAX_CHUNK: usize = MAX_DATAGRAM - HEADER_SIZE;
