// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Radio peer addressing.

use std::fmt;
use std::str::FromStr;

/// Six-byte hardware address of a radio peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PeerAddr(pub [u8; 6]);

impl PeerAddr {
    /// Reserved broadcast address (all bits set).
    pub const BROADCAST: Self = Self([0xFF; 6]);

    /// Create an address from raw bytes.
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    /// Raw address bytes.
    pub const fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// Check if this is the broadcast address.
    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }
}

impl fmt::Display for PeerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

/// Error parsing a `aa:bb:cc:dd:ee:ff` address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsePeerAddrError;

impl fmt::Display for ParsePeerAddrError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid peer address (expected aa:bb:cc:dd:ee:ff)")
    }
}

impl std::error::Error for ParsePeerAddrError {}

impl FromStr for PeerAddr {
    type Err = ParsePeerAddrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut out = [0u8; 6];
        let mut parts = s.split(':');
        for byte in &mut out {
            let part = parts.next().ok_or(ParsePeerAddrError)?;
            if part.len() != 2 || !part.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(ParsePeerAddrError);
            }
            *byte = u8::from_str_radix(part, 16).map_err(|_| ParsePeerAddrError)?;
        }
        if parts.next().is_some() {
            return Err(ParsePeerAddrError);
        }
        Ok(Self(out))
    }
}

/// How a received datagram was addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestMode {
    /// Sent to this hub's own address.
    Unicast,
    /// Sent to [`PeerAddr::BROADCAST`].
    Broadcast,
}

impl DestMode {
    /// Classify a destination address.
    pub fn of(dest: &PeerAddr) -> Self {
        if dest.is_broadcast() {
            Self::Broadcast
        } else {
            Self::Unicast
        }
    }
}
