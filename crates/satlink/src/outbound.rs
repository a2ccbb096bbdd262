// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Outbound commands toward satellites.
//!
//! [`Outbound`] is a cheap, cloneable handle. The router uses it for replies; the rest
//! of the hub uses it from any thread to push `get` and `set` commands. Every call is
//! synchronous and may sleep for fragment pacing, so keep it off latency-critical
//! contexts.
//!
//! Addressing policy:
//!
//! | operation | device known | device unknown |
//! |---|---|---|
//! | `request_state` | unicast `{"t":"get"}` | broadcast `{"t":"get","deviceId":..}` |
//! | `send_set_json` | unicast, framed as TARGET when needed | broadcast, single bare frame only |
//!
//! Bare sends (replies, gets, broadcasts) must fit one chunk.

use std::sync::Arc;

use crate::addr::PeerAddr;
use crate::envelope;
use crate::error::SendError;
use crate::fragment::{Delivery, Fragmenter};
use crate::radio::Radio;
use crate::registry::SatelliteRegistry;
use crate::stats::{OutboundCounters, OutboundStats};
use crate::wire::FrameType;

struct Inner {
    radio: Arc<dyn Radio>,
    registry: Arc<SatelliteRegistry>,
    fragmenter: Fragmenter,
    counters: OutboundCounters,
}

/// Send-side handle.
#[derive(Clone)]
pub struct Outbound {
    inner: Arc<Inner>,
}

impl Outbound {
    /// Create a handle over `radio`, resolving device ids through `registry`.
    pub fn new(
        radio: Arc<dyn Radio>,
        registry: Arc<SatelliteRegistry>,
        fragmenter: Fragmenter,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                radio,
                registry,
                fragmenter,
                counters: OutboundCounters::default(),
            }),
        }
    }

    /// Largest bare payload.
    pub fn chunk_size(&self) -> usize {
        self.inner.fragmenter.chunk_size()
    }

    /// Shared satellite table.
    pub fn registry(&self) -> &Arc<SatelliteRegistry> {
        &self.inner.registry
    }

    /// Address of `device_id`, if registered.
    pub fn lookup_peer(&self, device_id: &str) -> Option<PeerAddr> {
        self.inner.registry.lookup(device_id)
    }

    /// Radio channel in use.
    pub fn current_channel(&self) -> u8 {
        self.inner.radio.current_channel()
    }

    /// Broadcast `{"t":"get"}`.
    pub fn broadcast_get(&self) -> Result<(), SendError> {
        let msg = envelope::get(None)?;
        self.send_bare(&PeerAddr::BROADCAST, &msg)
    }

    /// Ask one device for a state report.
    pub fn request_state(&self, device_id: &str) -> Result<(), SendError> {
        if device_id.is_empty() {
            return Err(SendError::InvalidArgument("empty device id"));
        }
        match self.lookup_peer(device_id) {
            Some(peer) => {
                let msg = envelope::get(None)?;
                self.send_bare(&peer, &msg)
            }
            None => {
                log::debug!("[outbound] {} unknown, broadcasting get", device_id);
                let msg = envelope::get(Some(device_id))?;
                self.send_bare(&PeerAddr::BROADCAST, &msg)
            }
        }
    }

    /// Push a set command.
    ///
    /// Known device: unicast, fragmented as a TARGET frame when the payload does not go
    /// out bare. Unknown or missing id: one bare broadcast datagram; anything larger is
    /// refused with [`SendError::MultiFragmentBroadcast`].
    pub fn send_set_json(&self, device_id: Option<&str>, json: &[u8]) -> Result<Delivery, SendError> {
        if json.is_empty() {
            return Err(SendError::InvalidArgument("empty payload"));
        }

        let peer = device_id
            .filter(|id| !id.is_empty())
            .and_then(|id| self.lookup_peer(id));

        match peer {
            Some(peer) => self.send_framed(&peer, FrameType::Target, json),
            None => {
                if json.len() > self.chunk_size() {
                    log::warn!(
                        "[outbound] set for {} is {} B, too large to broadcast",
                        device_id.unwrap_or("(none)"),
                        json.len()
                    );
                    self.inner.counters.on_error();
                    return Err(SendError::MultiFragmentBroadcast);
                }
                log::debug!(
                    "[outbound] set for {} has no known peer, broadcasting",
                    device_id.unwrap_or("(none)")
                );
                self.send_bare(&PeerAddr::BROADCAST, json)?;
                Ok(Delivery::Legacy)
            }
        }
    }

    /// Turn a target document into a set command and send it.
    ///
    /// See [`envelope::normalize_set`]; the lifted `deviceId` picks the destination.
    pub fn forward_target(&self, document: &[u8]) -> Result<Delivery, SendError> {
        let cmd = envelope::normalize_set(document).inspect_err(|e| {
            log::debug!("[outbound] bad target document: {}", e);
        })?;
        if cmd.device_id.is_none() {
            log::warn!("[outbound] target without deviceId, broadcasting");
        }
        self.send_set_json(cmd.device_id.as_deref(), &cmd.payload)
    }

    /// Send one bare datagram (at most one chunk).
    pub fn send_bare(&self, dest: &PeerAddr, payload: &[u8]) -> Result<(), SendError> {
        if payload.is_empty() || payload.len() > self.chunk_size() {
            self.inner.counters.on_error();
            return Err(SendError::InvalidSize(payload.len()));
        }

        let result = self
            .inner
            .radio
            .ensure_peer(dest)
            .and_then(|()| self.inner.radio.send(dest, payload));
        match result {
            Ok(()) => {
                self.inner.counters.on_bare();
                Ok(())
            }
            Err(e) => {
                log::debug!("[outbound] send to {} failed: {}", dest, e);
                self.inner.counters.on_error();
                Err(SendError::Io(e))
            }
        }
    }

    /// Send through the fragmenter (legacy or framed path).
    pub fn send_framed(
        &self,
        dest: &PeerAddr,
        frame_type: FrameType,
        payload: &[u8],
    ) -> Result<Delivery, SendError> {
        if payload.is_empty() {
            return Err(SendError::InvalidArgument("empty payload"));
        }
        if let Err(e) = self.inner.radio.ensure_peer(dest) {
            self.inner.counters.on_error();
            return Err(SendError::Io(e));
        }

        match self
            .inner
            .fragmenter
            .send(self.inner.radio.as_ref(), dest, frame_type, payload)
        {
            Ok(delivery) => {
                match delivery {
                    Delivery::Legacy => self.inner.counters.on_bare(),
                    Delivery::Framed { fragments, .. } => self.inner.counters.on_framed(fragments),
                }
                Ok(delivery)
            }
            Err(e) => {
                log::debug!("[outbound] {} to {} failed: {}", frame_type.name(), dest, e);
                self.inner.counters.on_error();
                Err(e)
            }
        }
    }

    /// Counter snapshot.
    pub fn stats(&self) -> OutboundStats {
        self.inner.counters.snapshot()
    }

    /// Zero the counters.
    pub fn reset_stats(&self) {
        self.inner.counters.reset();
    }
}

impl std::fmt::Debug for Outbound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Outbound")
            .field("chunk", &self.chunk_size())
            .field("stats", &self.stats())
            .finish()
    }
}
