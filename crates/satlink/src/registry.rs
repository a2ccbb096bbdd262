// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Satellite table: device id -> current radio address.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::addr::PeerAddr;
use crate::error::RegistryError;
use crate::radio::Clock;

/// Longest stored device id, in bytes.
pub const MAX_DEVICE_ID_LEN: usize = 63;

/// Default number of satellites remembered.
pub const DEFAULT_CAPACITY: usize = 16;

/// One known satellite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SatelliteEntry {
    /// Logical device id (at most [`MAX_DEVICE_ID_LEN`] bytes).
    pub device_id: String,
    /// Radio address the device was last heard from.
    pub peer: PeerAddr,
    /// Last time the device was heard from.
    pub last_seen: Instant,
}

/// How [`SatelliteRegistry::upsert`] resolved the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// New entry in a free slot.
    Inserted,
    /// Existing entry found by id.
    Updated,
    /// Existing entry found by address; its id was replaced.
    Rebound,
}

/// Cut `id` to [`MAX_DEVICE_ID_LEN`] bytes without splitting a character.
pub fn truncate_device_id(id: &str) -> &str {
    if id.len() <= MAX_DEVICE_ID_LEN {
        return id;
    }
    let mut end = MAX_DEVICE_ID_LEN;
    while !id.is_char_boundary(end) {
        end -= 1;
    }
    &id[..end]
}

/// Bounded, lock-guarded satellite table.
///
/// Shared between the receive path and outbound callers on other threads. Every
/// operation takes the lock for its whole duration. When full, new devices are
/// refused; nothing is evicted.
pub struct SatelliteRegistry {
    slots: Mutex<Vec<Option<SatelliteEntry>>>,
    clock: Arc<dyn Clock>,
}

impl SatelliteRegistry {
    /// Create a table with room for `capacity` devices.
    pub fn new(capacity: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            slots: Mutex::new(vec![None; capacity]),
            clock,
        }
    }

    /// Record that `device_id` was heard from `peer`.
    ///
    /// Resolution order: same id, then same address, then a free slot. The resolved
    /// entry always takes the new address, id and timestamp.
    pub fn upsert(&self, device_id: &str, peer: PeerAddr) -> Result<Upsert, RegistryError> {
        if device_id.is_empty() {
            return Err(RegistryError::EmptyDeviceId);
        }
        let device_id = truncate_device_id(device_id);
        let now = self.clock.now();
        let mut slots = self.slots.lock();

        let by_id = slots
            .iter()
            .position(|s| s.as_ref().is_some_and(|e| e.device_id == device_id));
        let (index, how) = match by_id {
            Some(i) => (i, Upsert::Updated),
            None => {
                let by_peer = slots
                    .iter()
                    .position(|s| s.as_ref().is_some_and(|e| e.peer == peer));
                match by_peer {
                    Some(i) => (i, Upsert::Rebound),
                    None => match slots.iter().position(Option::is_none) {
                        Some(i) => (i, Upsert::Inserted),
                        None => {
                            log::warn!("[registry] table full, can't register {}", device_id);
                            return Err(RegistryError::Full);
                        }
                    },
                }
            }
        };

        if how == Upsert::Rebound {
            if let Some(old) = &slots[index] {
                log::debug!(
                    "[registry] {} now answers as {} (was {})",
                    peer,
                    device_id,
                    old.device_id
                );
            }
        }

        slots[index] = Some(SatelliteEntry {
            device_id: device_id.to_owned(),
            peer,
            last_seen: now,
        });
        Ok(how)
    }

    /// Address of `device_id`, if known.
    pub fn lookup(&self, device_id: &str) -> Option<PeerAddr> {
        if device_id.is_empty() {
            return None;
        }
        let device_id = truncate_device_id(device_id);
        self.slots
            .lock()
            .iter()
            .flatten()
            .find(|e| e.device_id == device_id)
            .map(|e| e.peer)
    }

    /// Number of known devices.
    pub fn count(&self) -> usize {
        self.slots.lock().iter().flatten().count()
    }

    /// Table size.
    pub fn capacity(&self) -> usize {
        self.slots.lock().len()
    }

    /// Snapshot of every known device, in slot order.
    pub fn entries(&self) -> Vec<SatelliteEntry> {
        self.slots.lock().iter().flatten().cloned().collect()
    }

    /// Forget every device.
    pub fn clear(&self) {
        self.slots.lock().iter_mut().for_each(|s| *s = None);
    }
}

impl std::fmt::Debug for SatelliteRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SatelliteRegistry")
            .field("count", &self.count())
            .field("capacity", &self.capacity())
            .finish()
    }
}
