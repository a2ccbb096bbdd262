// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Radio and clock abstractions.
//!
//! The engine never touches the radio stack directly. It sends through a [`Radio`]
//! and reads time through a [`Clock`], so tests and the simulator can swap in
//! [`MemoryRadio`] and [`ManualClock`].
//!
//! # Radio Trait
//!
//! ```ignore
//! pub trait Radio: Send + Sync {
//!     fn send(&self, dest: &PeerAddr, frame: &[u8]) -> io::Result<()>;
//!     fn current_channel(&self) -> u8;
//! }
//! ```
//!
//! Receive is push-based: the radio stack calls [`crate::SatLink::handle_datagram`]
//! from its own task, one datagram at a time.

use std::io;
use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::addr::PeerAddr;

/// Datagram radio used by the engine.
pub trait Radio: Send + Sync {
    /// Bring the radio up. Called by [`crate::SatLink::start`].
    fn start(&self) -> io::Result<()> {
        Ok(())
    }

    /// Shut the radio down. Called by [`crate::SatLink::stop`].
    fn stop(&self) {}

    /// Make sure `peer` is registered with the radio stack before a unicast send.
    fn ensure_peer(&self, peer: &PeerAddr) -> io::Result<()> {
        let _ = peer;
        Ok(())
    }

    /// Send one datagram (at most one MTU).
    fn send(&self, dest: &PeerAddr, frame: &[u8]) -> io::Result<()>;

    /// Radio channel currently in use.
    fn current_channel(&self) -> u8;
}

/// Monotonic time source.
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> Instant;
}

/// Wall clock backed by [`Instant::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    offset_us: AtomicU64,
}

impl ManualClock {
    /// Create a clock frozen at the current instant.
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset_us: AtomicU64::new(0),
        }
    }

    /// Move time forward.
    pub fn advance(&self, by: Duration) {
        let us = u64::try_from(by.as_micros()).unwrap_or(u64::MAX);
        self.offset_us.fetch_add(us, Ordering::SeqCst);
    }

    /// Time elapsed since creation.
    pub fn elapsed(&self) -> Duration {
        Duration::from_micros(self.offset_us.load(Ordering::SeqCst))
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + self.elapsed()
    }
}

// ============================================================================
// MemoryRadio - records frames for tests and simulation
// ============================================================================

/// One datagram handed to [`MemoryRadio::send`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentFrame {
    /// Destination address.
    pub dest: PeerAddr,
    /// Datagram bytes.
    pub bytes: Vec<u8>,
}

impl SentFrame {
    /// Frame bytes as UTF-8, for asserting on bare JSON.
    pub fn text(&self) -> &str {
        std::str::from_utf8(&self.bytes).unwrap_or("")
    }
}

/// In-memory radio that records every frame it is asked to send.
///
/// Failure injection: [`MemoryRadio::fail_after`] makes every send past the given count
/// return an error.
#[derive(Debug)]
pub struct MemoryRadio {
    sent: Mutex<Vec<SentFrame>>,
    peers: Mutex<Vec<PeerAddr>>,
    channel: AtomicU8,
    fail_after: AtomicUsize,
    attempts: AtomicUsize,
    running: Mutex<bool>,
}

impl MemoryRadio {
    /// Create a radio on `channel`.
    pub fn new(channel: u8) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            peers: Mutex::new(Vec::new()),
            channel: AtomicU8::new(channel),
            fail_after: AtomicUsize::new(usize::MAX),
            attempts: AtomicUsize::new(0),
            running: Mutex::new(false),
        }
    }

    /// Change the reported channel.
    pub fn set_channel(&self, channel: u8) {
        self.channel.store(channel, Ordering::SeqCst);
    }

    /// Let `n` more sends succeed, then fail every send.
    pub fn fail_after(&self, n: usize) {
        let done = self.attempts.load(Ordering::SeqCst);
        self.fail_after.store(done.saturating_add(n), Ordering::SeqCst);
    }

    /// Stop injecting failures.
    pub fn heal(&self) {
        self.fail_after.store(usize::MAX, Ordering::SeqCst);
    }

    /// Drain the recorded frames.
    pub fn take_sent(&self) -> Vec<SentFrame> {
        std::mem::take(&mut *self.sent.lock())
    }

    /// Number of recorded frames.
    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }

    /// Peers registered through [`Radio::ensure_peer`].
    pub fn peers(&self) -> Vec<PeerAddr> {
        self.peers.lock().clone()
    }

    /// Whether [`Radio::start`] was called without a matching stop.
    pub fn is_running(&self) -> bool {
        *self.running.lock()
    }
}

impl Default for MemoryRadio {
    fn default() -> Self {
        Self::new(1)
    }
}

impl Radio for MemoryRadio {
    fn start(&self) -> io::Result<()> {
        *self.running.lock() = true;
        Ok(())
    }

    fn stop(&self) {
        *self.running.lock() = false;
    }

    fn ensure_peer(&self, peer: &PeerAddr) -> io::Result<()> {
        let mut peers = self.peers.lock();
        if !peers.contains(peer) {
            peers.push(*peer);
        }
        Ok(())
    }

    fn send(&self, dest: &PeerAddr, frame: &[u8]) -> io::Result<()> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt >= self.fail_after.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::Other, "injected send failure"));
        }
        self.sent.lock().push(SentFrame {
            dest: *dest,
            bytes: frame.to_vec(),
        });
        Ok(())
    }

    fn current_channel(&self) -> u8 {
        self.channel.load(Ordering::SeqCst)
    }
}
