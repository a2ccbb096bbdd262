// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fragmentation (sender side).
//!
//! A payload goes out one of two ways:
//!
//! - **Legacy**: it fits one chunk and starts with `{`. Sent as-is, no header, so
//!   satellites that only understand bare JSON keep working.
//! - **Framed**: everything else, including single-fragment messages. One random
//!   `msg_id` and one CRC over the whole payload, then `ceil(len / chunk)` datagrams
//!   of `header | chunk`, paced by a short sleep.
//!
//! ```text
//! payload (500 B, chunk 239)
//!   [0..239)   -> hdr(total=3, index=0) | 239 B
//!   [239..478) -> hdr(total=3, index=1) | 239 B
//!   [478..500) -> hdr(total=3, index=2) |  22 B
//! ```
//!
//! The first failed send aborts the rest of the message. Nothing is retried here.

use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::addr::PeerAddr;
use crate::error::SendError;
use crate::radio::Radio;
use crate::wire::{crc16_ccitt, FragmentHeader, FrameType, HEADER_SIZE};

/// Most fragments one message may span (`total` is a single byte).
pub const MAX_FRAGMENTS: usize = u8::MAX as usize;

/// How a payload was put on the air.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Sent as one bare datagram.
    Legacy,
    /// Sent as header-prefixed fragments.
    Framed {
        /// Message id shared by the fragments.
        msg_id: u16,
        /// Number of datagrams sent.
        fragments: usize,
    },
}

/// Splits payloads into MTU-sized fragments and sends them.
#[derive(Debug)]
pub struct Fragmenter {
    chunk: usize,
    pacing: Duration,
    ids: Mutex<fastrand::Rng>,
}

impl Fragmenter {
    /// Create a fragmenter for datagrams of at most `mtu` bytes.
    ///
    /// `seed` makes message ids reproducible; `None` seeds from the OS.
    pub fn new(mtu: usize, pacing: Duration, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => fastrand::Rng::with_seed(seed),
            None => fastrand::Rng::new(),
        };
        Self {
            chunk: mtu.saturating_sub(HEADER_SIZE).max(1),
            pacing,
            ids: Mutex::new(rng),
        }
    }

    /// Payload bytes carried per fragment.
    pub fn chunk_size(&self) -> usize {
        self.chunk
    }

    /// Check if `payload` goes out unframed.
    pub fn uses_legacy_path(&self, payload: &[u8]) -> bool {
        payload.len() <= self.chunk && payload.first() == Some(&b'{')
    }

    /// Number of fragments needed for `len` bytes (at least one).
    pub fn fragment_count(&self, len: usize) -> usize {
        len.div_ceil(self.chunk).max(1)
    }

    /// Fresh random message id.
    pub fn next_msg_id(&self) -> u16 {
        self.ids.lock().u16(..)
    }

    /// Build every datagram of a framed message, in index order.
    pub fn plan(
        &self,
        payload: &[u8],
        frame_type: FrameType,
        msg_id: u16,
    ) -> Result<Vec<Vec<u8>>, SendError> {
        let full_len =
            u16::try_from(payload.len()).map_err(|_| SendError::PayloadTooLarge(payload.len()))?;
        let total = self.fragment_count(payload.len());
        let total = u8::try_from(total).map_err(|_| SendError::PayloadTooLarge(payload.len()))?;

        let checksum = crc16_ccitt(payload);
        let mut chunks = payload.chunks(self.chunk);

        let mut datagrams = Vec::with_capacity(total as usize);
        for index in 0..total {
            let chunk = chunks.next().unwrap_or(&[]);
            let header = FragmentHeader {
                frame_type,
                total,
                index,
                msg_id,
                full_len,
                checksum,
            };
            let mut datagram = Vec::with_capacity(HEADER_SIZE + chunk.len());
            datagram.extend_from_slice(&header.encode());
            datagram.extend_from_slice(chunk);
            datagrams.push(datagram);
        }

        Ok(datagrams)
    }

    /// Send `payload` to `dest`, picking the legacy or framed path.
    ///
    /// A framed message that needs more than one fragment is refused for the
    /// broadcast address.
    pub fn send(
        &self,
        radio: &dyn Radio,
        dest: &PeerAddr,
        frame_type: FrameType,
        payload: &[u8],
    ) -> Result<Delivery, SendError> {
        if self.uses_legacy_path(payload) {
            radio.send(dest, payload)?;
            log::debug!("[fragment] {} B bare to {}", payload.len(), dest);
            return Ok(Delivery::Legacy);
        }

        if dest.is_broadcast() && self.fragment_count(payload.len()) > 1 {
            return Err(SendError::MultiFragmentBroadcast);
        }

        let msg_id = self.next_msg_id();
        let datagrams = self.plan(payload, frame_type, msg_id)?;
        let total = datagrams.len();

        for (index, datagram) in datagrams.iter().enumerate() {
            if index > 0 && !self.pacing.is_zero() {
                thread::sleep(self.pacing);
            }
            if let Err(e) = radio.send(dest, datagram) {
                log::debug!(
                    "[fragment] msg {:#06x} aborted at {}/{}: {}",
                    msg_id,
                    index,
                    total,
                    e
                );
                return Err(SendError::Io(e));
            }
        }

        log::debug!(
            "[fragment] {} {} B to {} as msg {:#06x} ({} fragments)",
            frame_type.name(),
            payload.len(),
            dest,
            msg_id,
            total
        );
        Ok(Delivery::Framed {
            msg_id,
            fragments: total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::radio::MemoryRadio;
    use crate::wire::{decode_header, MAX_CHUNK, MAX_DATAGRAM};
    use std::time::Instant;

    fn fragmenter() -> Fragmenter {
        Fragmenter::new(MAX_DATAGRAM, Duration::ZERO, Some(7))
    }

    fn json_of_len(len: usize) -> Vec<u8> {
        let mut v = b"{\"pad\":\"".to_vec();
        v.resize(len - 2, b'x');
        v.extend_from_slice(b"\"}");
        v
    }

    #[test]
    fn test_chunk_size_follows_mtu() {
        assert_eq!(fragmenter().chunk_size(), MAX_CHUNK);
        assert_eq!(Fragmenter::new(64, Duration::ZERO, None).chunk_size(), 64 - HEADER_SIZE);
    }

    #[test]
    fn test_legacy_path_heuristic() {
        let f = fragmenter();
        assert!(f.uses_legacy_path(b"{\"t\":\"get\"}"));
        assert!(f.uses_legacy_path(&json_of_len(MAX_CHUNK)));
        assert!(!f.uses_legacy_path(&json_of_len(MAX_CHUNK + 1)));
        assert!(!f.uses_legacy_path(b"[1,2]"));
        assert!(!f.uses_legacy_path(b""));
    }

    #[test]
    fn test_fragment_count() {
        let f = fragmenter();
        assert_eq!(f.fragment_count(0), 1);
        assert_eq!(f.fragment_count(1), 1);
        assert_eq!(f.fragment_count(MAX_CHUNK), 1);
        assert_eq!(f.fragment_count(MAX_CHUNK + 1), 2);
        assert_eq!(f.fragment_count(500), 3);
    }

    #[test]
    fn test_plan_500_bytes() {
        let f = fragmenter();
        let payload: Vec<u8> = (0..500u32).map(|i| (i % 251) as u8).collect();
        let datagrams = f.plan(&payload, FrameType::Target, 0x1234).expect("plan");
        assert_eq!(datagrams.len(), 3);

        let mut rebuilt = Vec::new();
        for (i, datagram) in datagrams.iter().enumerate() {
            assert!(datagram.len() <= MAX_DATAGRAM);
            let (header, chunk) = decode_header(datagram).expect("fragment");
            assert_eq!(header.index as usize, i);
            assert_eq!(header.total, 3);
            assert_eq!(header.msg_id, 0x1234);
            assert_eq!(header.full_len, 500);
            assert_eq!(header.checksum, crc16_ccitt(&payload));
            assert_eq!(header.frame_type, FrameType::Target);
            rebuilt.extend_from_slice(chunk);
        }
        assert_eq!(datagrams[2].len() - HEADER_SIZE, 500 - 2 * MAX_CHUNK);
        assert_eq!(rebuilt, payload);
    }

    #[test]
    fn test_plan_too_large() {
        let f = fragmenter();
        let payload = vec![0u8; MAX_FRAGMENTS * MAX_CHUNK + 1];
        assert!(matches!(
            f.plan(&payload, FrameType::State, 1),
            Err(SendError::PayloadTooLarge(_))
        ));
        let payload = vec![0u8; usize::from(u16::MAX) + 1];
        assert!(matches!(
            Fragmenter::new(MAX_DATAGRAM, Duration::ZERO, None).plan(&payload, FrameType::State, 1),
            Err(SendError::PayloadTooLarge(_))
        ));
    }

    #[test]
    fn test_send_legacy_is_bare() {
        let f = fragmenter();
        let radio = MemoryRadio::default();
        let peer = PeerAddr::new([1; 6]);
        let payload = br#"{"t":"set","power":true}"#;

        assert_eq!(
            f.send(&radio, &peer, FrameType::Target, payload).expect("send"),
            Delivery::Legacy
        );
        let sent = radio.take_sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].bytes, payload.to_vec());
        assert_eq!(sent[0].dest, peer);
    }

    #[test]
    fn test_send_small_non_json_is_framed() {
        let f = fragmenter();
        let radio = MemoryRadio::default();
        let peer = PeerAddr::new([1; 6]);

        let delivery = f.send(&radio, &peer, FrameType::State, b"raw").expect("send");
        assert!(matches!(delivery, Delivery::Framed { fragments: 1, .. }));
        let sent = radio.take_sent();
        let (header, chunk) = decode_header(&sent[0].bytes).expect("fragment");
        assert_eq!(header.total, 1);
        assert_eq!(chunk, b"raw");
    }

    #[test]
    fn test_send_refuses_multi_fragment_broadcast() {
        let f = fragmenter();
        let radio = MemoryRadio::default();
        let payload = json_of_len(400);

        assert!(matches!(
            f.send(&radio, &PeerAddr::BROADCAST, FrameType::Target, &payload),
            Err(SendError::MultiFragmentBroadcast)
        ));
        assert_eq!(radio.sent_count(), 0);
    }

    #[test]
    fn test_send_failure_aborts_remaining() {
        let f = fragmenter();
        let radio = MemoryRadio::default();
        let peer = PeerAddr::new([2; 6]);
        radio.fail_after(1);

        let result = f.send(&radio, &peer, FrameType::Target, &json_of_len(700));
        assert!(matches!(result, Err(SendError::Io(_))));
        assert_eq!(radio.sent_count(), 1);
    }

    #[test]
    fn test_pacing_between_fragments() {
        let pacing = Duration::from_millis(20);
        let f = Fragmenter::new(MAX_DATAGRAM, pacing, Some(7));
        let radio = MemoryRadio::default();
        let peer = PeerAddr::new([3; 6]);

        let start = Instant::now();
        let delivery = f
            .send(&radio, &peer, FrameType::State, &json_of_len(600))
            .expect("send");
        let elapsed = start.elapsed();

        assert!(matches!(delivery, Delivery::Framed { fragments: 3, .. }));
        assert_eq!(radio.sent_count(), 3);
        // Two gaps for three fragments; none before the first.
        assert!(elapsed >= pacing * 2, "elapsed {:?}", elapsed);
    }

    #[test]
    fn test_single_datagram_sends_are_not_paced() {
        let pacing = Duration::from_millis(200);
        let f = Fragmenter::new(MAX_DATAGRAM, pacing, Some(7));
        let radio = MemoryRadio::default();
        let peer = PeerAddr::new([3; 6]);

        let start = Instant::now();
        f.send(&radio, &peer, FrameType::Target, br#"{"t":"set"}"#)
            .expect("legacy");
        f.send(&radio, &peer, FrameType::State, b"raw")
            .expect("framed");
        let elapsed = start.elapsed();

        assert_eq!(radio.sent_count(), 2);
        assert!(elapsed < pacing, "elapsed {:?}", elapsed);
    }

    #[test]
    fn test_seeded_ids_are_reproducible() {
        let a = Fragmenter::new(MAX_DATAGRAM, Duration::ZERO, Some(42));
        let b = Fragmenter::new(MAX_DATAGRAM, Duration::ZERO, Some(42));
        let ids_a: Vec<u16> = (0..4).map(|_| a.next_msg_id()).collect();
        let ids_b: Vec<u16> = (0..4).map(|_| b.next_msg_id()).collect();
        assert_eq!(ids_a, ids_b);
    }
}
