// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fixed-size (11 byte) fragment header.
//!
//! ```text
//! +-------+---------+------+-------+-------+----------+----------+----------+
//! | magic | version | type | total | index | msg_id   | full_len | crc16    |
//! | 0xA7  | 0x01    | 1B   | 1B    | 1B    | 2B (le)  | 2B (le)  | 2B (le)  |
//! +-------+---------+------+-------+-------+----------+----------+----------+
//! ```
//!
//! Fields are written one by one in a fixed order; nothing depends on host struct
//! layout. Little-endian matches the satellites already deployed.

/// First byte of every fragment.
pub const FRAG_MAGIC: u8 = 0xA7;

/// Second byte of every fragment.
pub const FRAG_VERSION: u8 = 1;

/// Encoded header size in bytes.
pub const HEADER_SIZE: usize = 11;

/// Kind of message carried by a framed payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameType {
    /// Satellite state report.
    State,
    /// Target (setpoint) document.
    Target,
    /// Unknown type byte, kept so reassembly keys stay exact.
    Other(u8),
}

impl FrameType {
    /// Wire value.
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::State => 1,
            Self::Target => 2,
            Self::Other(v) => v,
        }
    }

    /// Short name for logs.
    pub const fn name(self) -> &'static str {
        match self {
            Self::State => "STATE",
            Self::Target => "TARGET",
            Self::Other(_) => "UNKNOWN",
        }
    }
}

impl From<u8> for FrameType {
    fn from(v: u8) -> Self {
        match v {
            1 => Self::State,
            2 => Self::Target,
            other => Self::Other(other),
        }
    }
}

/// Decoded fragment header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentHeader {
    /// Message kind.
    pub frame_type: FrameType,
    /// Number of fragments in the message (>= 1).
    pub total: u8,
    /// This fragment's 0-based index.
    pub index: u8,
    /// Random id shared by every fragment of one message.
    pub msg_id: u16,
    /// Length of the full reassembled payload.
    pub full_len: u16,
    /// CRC-16/CCITT-FALSE of the full payload.
    pub checksum: u16,
}

impl FragmentHeader {
    /// Serialize to the 11-byte wire form.
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let id = self.msg_id.to_le_bytes();
        let len = self.full_len.to_le_bytes();
        let crc = self.checksum.to_le_bytes();
        [
            FRAG_MAGIC,
            FRAG_VERSION,
            self.frame_type.as_u8(),
            self.total,
            self.index,
            id[0],
            id[1],
            len[0],
            len[1],
            crc[0],
            crc[1],
        ]
    }

    /// Parse the leading header of a datagram.
    ///
    /// Returns `None` when the datagram is not a fragment: shorter than
    /// [`HEADER_SIZE`], wrong magic/version, or a zero fragment count. Such datagrams
    /// are bare JSON envelopes.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_SIZE || buf[0] != FRAG_MAGIC || buf[1] != FRAG_VERSION {
            return None;
        }
        let total = buf[3];
        if total == 0 {
            return None;
        }

        Some(Self {
            frame_type: FrameType::from(buf[2]),
            total,
            index: buf[4],
            msg_id: u16::from_le_bytes([buf[5], buf[6]]),
            full_len: u16::from_le_bytes([buf[7], buf[8]]),
            checksum: u16::from_le_bytes([buf[9], buf[10]]),
        })
    }
}

/// Split a datagram into header and chunk, if it is a fragment.
pub fn decode_header(datagram: &[u8]) -> Option<(FragmentHeader, &[u8])> {
    FragmentHeader::decode(datagram).map(|h| (h, &datagram[HEADER_SIZE..]))
}
