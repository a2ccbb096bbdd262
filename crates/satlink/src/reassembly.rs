// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Reassembly (receiver side).
//!
//! A fixed arena of slots, one in-flight message per slot, keyed by
//! `(peer, frame_type, msg_id)`. Lookup is a linear scan; capacity is small.
//!
//! ```text
//!   Empty --first fragment--> Collecting --all bits set--> complete() --+
//!     ^                           |                                      |
//!     |                           +-- deadline passed, slot reused ------+
//!     +------------------------------------------------------------------+
//! ```
//!
//! Expiry is lazy: an expired slot keeps its contents until [`ReassemblyTable::try_allocate`]
//! needs it for another key. There is no sweeper.
//!
//! The table is single-writer. The router owns it and takes `&mut self` per datagram,
//! so no lock is needed.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::addr::PeerAddr;
use crate::error::ReassemblyError;
use crate::radio::Clock;
use crate::wire::{crc16_ccitt, FrameType};

/// Default deadline window, refreshed by every accepted fragment.
pub const DEFAULT_WINDOW: Duration = Duration::from_millis(800);

/// Identity of one in-flight message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReassemblyKey {
    /// Sending radio.
    pub peer: PeerAddr,
    /// Frame type from the header.
    pub frame_type: FrameType,
    /// Message id from the header.
    pub msg_id: u16,
}

/// Reference to a live slot.
///
/// Handles carry the slot's generation, so a handle kept past `free` or reuse is
/// detected instead of touching another message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotHandle {
    index: usize,
    generation: u32,
}

/// Outcome of [`ReassemblyTable::apply_fragment`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyResult {
    /// Every fragment is present.
    Complete,
    /// Waiting for more fragments.
    Pending,
    /// Index out of range or chunk past `full_len`. The context is untouched.
    Rejected,
}

/// Received-fragment bitmap (`total` is at most 255).
#[derive(Debug, Clone, Copy, Default)]
struct Bitmap([u64; 4]);

impl Bitmap {
    fn get(&self, bit: u8) -> bool {
        self.0[usize::from(bit / 64)] & (1 << (bit % 64)) != 0
    }

    fn set(&mut self, bit: u8) {
        self.0[usize::from(bit / 64)] |= 1 << (bit % 64);
    }
}

#[derive(Debug)]
struct Slot {
    used: bool,
    generation: u32,
    key: ReassemblyKey,
    total: u8,
    full_len: u16,
    checksum: u16,
    received: Bitmap,
    received_count: u8,
    buffer: Vec<u8>,
    deadline: Instant,
}

impl Slot {
    fn empty(now: Instant) -> Self {
        Self {
            used: false,
            generation: 0,
            key: ReassemblyKey {
                peer: PeerAddr::default(),
                frame_type: FrameType::Other(0),
                msg_id: 0,
            },
            total: 0,
            full_len: 0,
            checksum: 0,
            received: Bitmap::default(),
            received_count: 0,
            buffer: Vec::new(),
            deadline: now,
        }
    }

    fn reset(&mut self) {
        self.used = false;
        self.received = Bitmap::default();
        self.received_count = 0;
        self.buffer = Vec::new();
    }

    fn is_complete(&self) -> bool {
        self.received_count == self.total
    }
}

/// Bounded pool of reassembly contexts.
pub struct ReassemblyTable {
    slots: Vec<Slot>,
    window: Duration,
    chunk: usize,
    clock: Arc<dyn Clock>,
}

impl ReassemblyTable {
    /// Create a table of `capacity` slots.
    ///
    /// `chunk` is the sender's per-fragment payload size (`mtu - HEADER_SIZE`); fragment
    /// `i` lands at offset `i * chunk`.
    pub fn new(capacity: usize, window: Duration, chunk: usize, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        Self {
            slots: (0..capacity).map(|_| Slot::empty(now)).collect(),
            window,
            chunk,
            clock,
        }
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of slots holding a context, expired or not.
    pub fn in_use(&self) -> usize {
        self.slots.iter().filter(|s| s.used).count()
    }

    /// Find the live context for `key`.
    pub fn find(&self, key: &ReassemblyKey) -> Option<SlotHandle> {
        self.slots
            .iter()
            .enumerate()
            .find(|(_, s)| s.used && s.key == *key)
            .map(|(index, s)| SlotHandle {
                index,
                generation: s.generation,
            })
    }

    /// Open a context for `key`.
    ///
    /// Takes the first unused slot, or else the first slot whose deadline has passed
    /// (its partial message is discarded).
    pub fn try_allocate(
        &mut self,
        key: ReassemblyKey,
        total: u8,
        full_len: u16,
        checksum: u16,
    ) -> Result<SlotHandle, ReassemblyError> {
        let now = self.clock.now();
        let index = self
            .slots
            .iter()
            .position(|s| !s.used || now > s.deadline)
            .ok_or(ReassemblyError::TableFull)?;

        let slot = &mut self.slots[index];
        if slot.used {
            log::debug!(
                "[reassembly] reclaiming expired msg {:#06x} from {} ({}/{} fragments)",
                slot.key.msg_id,
                slot.key.peer,
                slot.received_count,
                slot.total
            );
        }

        slot.reset();
        slot.used = true;
        slot.generation = slot.generation.wrapping_add(1);
        slot.key = key;
        slot.total = total;
        slot.full_len = full_len;
        slot.checksum = checksum;
        slot.buffer = vec![0u8; usize::from(full_len)];
        slot.deadline = now + self.window;

        Ok(SlotHandle {
            index,
            generation: slot.generation,
        })
    }

    /// Copy one fragment into its context.
    ///
    /// Re-delivery of an index already seen leaves the buffer alone but still
    /// refreshes the deadline.
    pub fn apply_fragment(&mut self, handle: SlotHandle, index: u8, chunk: &[u8]) -> ApplyResult {
        let now = self.clock.now();
        let window = self.window;
        let chunk_size = self.chunk;
        let Some(slot) = self.slot_mut(handle) else {
            return ApplyResult::Rejected;
        };

        if index >= slot.total {
            return ApplyResult::Rejected;
        }
        let offset = usize::from(index) * chunk_size;
        let end = offset + chunk.len();
        if end > usize::from(slot.full_len) {
            return ApplyResult::Rejected;
        }

        if !slot.received.get(index) {
            slot.buffer[offset..end].copy_from_slice(chunk);
            slot.received.set(index);
            slot.received_count += 1;
        }
        slot.deadline = now + window;

        if slot.is_complete() {
            ApplyResult::Complete
        } else {
            ApplyResult::Pending
        }
    }

    /// Verify and release a complete context.
    ///
    /// The slot is freed whether or not the checksum matches. An incomplete context is
    /// left in place.
    pub fn complete(&mut self, handle: SlotHandle) -> Result<Vec<u8>, ReassemblyError> {
        let slot = self.slot_mut(handle).ok_or(ReassemblyError::StaleHandle)?;
        if !slot.is_complete() {
            return Err(ReassemblyError::Incomplete);
        }

        let buffer = std::mem::take(&mut slot.buffer);
        let expected = slot.checksum;
        slot.reset();

        let actual = crc16_ccitt(&buffer);
        if actual != expected {
            return Err(ReassemblyError::ChecksumMismatch { expected, actual });
        }
        Ok(buffer)
    }

    /// Drop a context.
    pub fn free(&mut self, handle: SlotHandle) {
        if let Some(slot) = self.slot_mut(handle) {
            slot.reset();
        }
    }

    /// Forget every context.
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            slot.reset();
        }
    }

    /// Fragments received so far.
    pub fn received_count(&self, handle: SlotHandle) -> Option<usize> {
        self.slot(handle).map(|s| usize::from(s.received_count))
    }

    /// Current deadline.
    pub fn deadline(&self, handle: SlotHandle) -> Option<Instant> {
        self.slot(handle).map(|s| s.deadline)
    }

    /// Partially assembled buffer.
    pub fn buffer(&self, handle: SlotHandle) -> Option<&[u8]> {
        self.slot(handle).map(|s| s.buffer.as_slice())
    }

    fn slot(&self, handle: SlotHandle) -> Option<&Slot> {
        self.slots
            .get(handle.index)
            .filter(|s| s.used && s.generation == handle.generation)
    }

    fn slot_mut(&mut self, handle: SlotHandle) -> Option<&mut Slot> {
        self.slots
            .get_mut(handle.index)
            .filter(|s| s.used && s.generation == handle.generation)
    }
}

impl std::fmt::Debug for ReassemblyTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReassemblyTable")
            .field("capacity", &self.capacity())
            .field("in_use", &self.in_use())
            .field("window", &self.window)
            .field("chunk", &self.chunk)
            .finish()
    }
}
