// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Receive path.
//!
//! [`Router::handle_datagram`] is the single entry point for received datagrams:
//!
//! ```text
//! datagram --decode_header--> fragment? --yes--> broadcast && total > 1 ? drop
//!    |                                           find / try_allocate      (full? drop)
//!    | no (bare JSON)                            apply_fragment           (pending? wait)
//!    |                                           complete + CRC           (mismatch? drop)
//!    v                                                  |
//! payload <---------------------------------------------+
//!    |
//! Envelope::parse -> "t" -> hello | state | target | (ignored)
//! ```
//!
//! The router takes `&mut self`: the radio stack delivers one datagram at a time and
//! each one is fully processed before the next. Callers that share a router across
//! threads must serialize access themselves. Nothing here is an error for the caller;
//! every drop is logged, counted and reported as [`RxOutcome::Dropped`].

use std::borrow::Cow;

use crate::addr::{DestMode, PeerAddr};
use crate::envelope::{self, Envelope, MessageKind};
use crate::error::{EnvelopeError, ReassemblyError, RegistryError, SendError};
use crate::outbound::Outbound;
use crate::reassembly::{ApplyResult, ReassemblyKey, ReassemblyTable};
use crate::stats::RouterStats;
use crate::wire::{decode_header, FragmentHeader};

/// Hooks for decoded satellite messages.
///
/// Every method has an empty default, so implementors only override what they need.
/// Payloads are the raw JSON bytes of the whole message.
pub trait SatelliteHandler: Send {
    /// A satellite announced itself (after the `hello_ack` went out).
    fn on_hello(&mut self, device_id: &str, peer: PeerAddr) {
        let _ = (device_id, peer);
    }

    /// A satellite reported its state (before any `ack` goes out).
    fn on_state(&mut self, device_id: &str, payload: &[u8]) {
        let _ = (device_id, payload);
    }

    /// A satellite reported its target setpoints.
    fn on_target(&mut self, device_id: &str, payload: &[u8]) {
        let _ = (device_id, payload);
    }
}

/// Why a datagram was discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DropReason {
    /// Engine is stopped.
    NotStarted,
    /// Fragment of a multi-fragment message sent to broadcast.
    MultiFragmentBroadcast,
    /// No free or expired reassembly slot.
    ReassemblyTableFull,
    /// Fragment index or length out of range for its context.
    FragmentRejected,
    /// Reassembled message failed its CRC.
    ChecksumMismatch,
    /// Payload is not a JSON object.
    EnvelopeParse,
    /// `hello`, `state` or `target` without a usable `deviceId`.
    MissingDeviceId,
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::NotStarted => "not started",
            Self::MultiFragmentBroadcast => "multi-fragment broadcast",
            Self::ReassemblyTableFull => "reassembly table full",
            Self::FragmentRejected => "fragment rejected",
            Self::ChecksumMismatch => "checksum mismatch",
            Self::EnvelopeParse => "unparsable envelope",
            Self::MissingDeviceId => "missing deviceId",
        };
        f.write_str(text)
    }
}

/// What happened to one datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxOutcome {
    /// Fragment stored; message not complete yet.
    Pending,
    /// Message handled (registry updated, handler called, reply sent).
    Dispatched(MessageKind),
    /// Valid envelope the hub does not act on.
    Ignored(MessageKind),
    /// Discarded.
    Dropped(DropReason),
}

/// Reassembles, parses and dispatches received datagrams.
pub struct Router {
    reassembly: ReassemblyTable,
    outbound: Outbound,
    handler: Option<Box<dyn SatelliteHandler>>,
    stats: RouterStats,
}

impl Router {
    /// Create a router that replies through `outbound` and records devices in its
    /// registry.
    pub fn new(reassembly: ReassemblyTable, outbound: Outbound) -> Self {
        Self {
            reassembly,
            outbound,
            handler: None,
            stats: RouterStats::default(),
        }
    }

    /// Install the message hooks, replacing any previous ones.
    pub fn set_handler(&mut self, handler: Box<dyn SatelliteHandler>) {
        self.handler = Some(handler);
    }

    /// Remove the message hooks.
    pub fn take_handler(&mut self) -> Option<Box<dyn SatelliteHandler>> {
        self.handler.take()
    }

    /// Send-side handle used for replies.
    pub fn outbound(&self) -> &Outbound {
        &self.outbound
    }

    /// Reassembly state.
    pub fn reassembly(&self) -> &ReassemblyTable {
        &self.reassembly
    }

    /// Counter snapshot.
    pub fn stats(&self) -> RouterStats {
        self.stats.clone()
    }

    /// Zero the counters.
    pub fn reset_stats(&mut self) {
        self.stats = RouterStats::default();
    }

    /// Drop every in-flight reassembly.
    pub fn clear(&mut self) {
        self.reassembly.clear();
    }

    /// Count a datagram that arrived while the engine was stopped.
    pub(crate) fn reject_not_started(&mut self) -> RxOutcome {
        self.stats.datagrams += 1;
        self.drop_with(DropReason::NotStarted)
    }

    /// Process one received datagram from `src`.
    pub fn handle_datagram(&mut self, src: PeerAddr, dest: DestMode, data: &[u8]) -> RxOutcome {
        self.stats.datagrams += 1;

        let payload = match decode_header(data) {
            Some((header, chunk)) => {
                self.stats.fragments += 1;
                match self.reassemble(src, dest, &header, chunk) {
                    Ok(Some(buffer)) => Cow::Owned(buffer),
                    Ok(None) => return RxOutcome::Pending,
                    Err(reason) => return self.drop_with(reason),
                }
            }
            None => {
                self.stats.bare += 1;
                Cow::Borrowed(data)
            }
        };

        self.dispatch(src, &payload)
    }

    fn reassemble(
        &mut self,
        src: PeerAddr,
        dest: DestMode,
        header: &FragmentHeader,
        chunk: &[u8],
    ) -> Result<Option<Vec<u8>>, DropReason> {
        if dest == DestMode::Broadcast && header.total > 1 {
            log::warn!(
                "[router] drop multi-fragment broadcast from {} (msg {:#06x}, {} fragments)",
                src,
                header.msg_id,
                header.total
            );
            return Err(DropReason::MultiFragmentBroadcast);
        }

        let key = ReassemblyKey {
            peer: src,
            frame_type: header.frame_type,
            msg_id: header.msg_id,
        };
        let handle = match self.reassembly.find(&key) {
            Some(handle) => handle,
            None => self
                .reassembly
                .try_allocate(key, header.total, header.full_len, header.checksum)
                .map_err(|_| {
                    log::warn!(
                        "[router] no reassembly slot for msg {:#06x} from {}",
                        header.msg_id,
                        src
                    );
                    DropReason::ReassemblyTableFull
                })?,
        };

        match self.reassembly.apply_fragment(handle, header.index, chunk) {
            ApplyResult::Pending => {
                log::trace!(
                    "[router] {} msg {:#06x} fragment {}/{} from {}",
                    header.frame_type.name(),
                    header.msg_id,
                    header.index,
                    header.total,
                    src
                );
                Ok(None)
            }
            ApplyResult::Rejected => {
                log::debug!(
                    "[router] fragment {}/{} ({} B) out of range for msg {:#06x} from {}",
                    header.index,
                    header.total,
                    chunk.len(),
                    header.msg_id,
                    src
                );
                Err(DropReason::FragmentRejected)
            }
            ApplyResult::Complete => match self.reassembly.complete(handle) {
                Ok(buffer) => {
                    self.stats.reassembled += 1;
                    Ok(Some(buffer))
                }
                Err(ReassemblyError::ChecksumMismatch { expected, actual }) => {
                    log::warn!(
                        "[router] CRC mismatch on msg {:#06x} from {} ({:#06x} != {:#06x}), drop",
                        header.msg_id,
                        src,
                        actual,
                        expected
                    );
                    Err(DropReason::ChecksumMismatch)
                }
                Err(e) => {
                    log::debug!("[router] reassembly of msg {:#06x} failed: {}", header.msg_id, e);
                    Err(DropReason::FragmentRejected)
                }
            },
        }
    }

    fn dispatch(&mut self, src: PeerAddr, payload: &[u8]) -> RxOutcome {
        let env = match Envelope::parse(payload) {
            Ok(env) => env,
            Err(e) => {
                log::debug!("[router] unparsable {} B payload from {}: {}", payload.len(), src, e);
                return self.drop_with(DropReason::EnvelopeParse);
            }
        };

        let Some(kind) = env.kind() else {
            log::debug!("[router] envelope without \"t\" from {}", src);
            self.stats.ignored += 1;
            return RxOutcome::Ignored(MessageKind::Other);
        };

        if !matches!(
            kind,
            MessageKind::Hello | MessageKind::State | MessageKind::Target
        ) {
            log::debug!("[router] ignoring \"{}\" from {}", env.tag().unwrap_or(""), src);
            self.stats.record_dispatch(kind);
            return RxOutcome::Ignored(kind);
        }

        let Some(device_id) = env.device_id() else {
            log::debug!("[router] {} from {} without deviceId", kind, src);
            return self.drop_with(DropReason::MissingDeviceId);
        };

        self.remember(device_id, src);

        match kind {
            MessageKind::Hello => {
                log::debug!("[router] HELLO from {} ({})", device_id, src);
                let channel = self.outbound.current_channel();
                self.reply(&src, envelope::hello_ack(channel));
                if let Some(handler) = self.handler.as_mut() {
                    handler.on_hello(device_id, src);
                }
            }
            MessageKind::State => {
                log::debug!("[router] STATE from {} ({} B)", device_id, payload.len());
                if let Some(handler) = self.handler.as_mut() {
                    handler.on_state(device_id, payload);
                }
                if let Some(seq) = env.seq() {
                    self.reply(&src, envelope::ack(device_id, seq));
                }
            }
            _ => {
                log::debug!("[router] TARGET from {} ({} B)", device_id, payload.len());
                match self.handler.as_mut() {
                    Some(handler) => handler.on_target(device_id, payload),
                    None => log::debug!("[router] no handler, target from {} ignored", device_id),
                }
            }
        }

        self.stats.record_dispatch(kind);
        RxOutcome::Dispatched(kind)
    }

    fn remember(&mut self, device_id: &str, peer: PeerAddr) {
        match self.outbound.registry().upsert(device_id, peer) {
            Ok(_) => {}
            Err(RegistryError::Full) => self.stats.registry_full += 1,
            Err(RegistryError::EmptyDeviceId) => {}
        }
    }

    fn reply(&mut self, peer: &PeerAddr, body: Result<Vec<u8>, EnvelopeError>) {
        let result = body
            .map_err(SendError::from)
            .and_then(|bytes| self.outbound.send_bare(peer, &bytes));
        match result {
            Ok(()) => self.stats.replies_sent += 1,
            Err(e) => {
                log::warn!("[router] reply to {} failed: {}", peer, e);
                self.stats.reply_errors += 1;
            }
        }
    }

    fn drop_with(&mut self, reason: DropReason) -> RxOutcome {
        self.stats.record_drop(reason);
        RxOutcome::Dropped(reason)
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("reassembly", &self.reassembly)
            .field("handler", &self.handler.is_some())
            .field("stats", &self.stats)
            .finish()
    }
}
