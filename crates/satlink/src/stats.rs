// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Diagnostic counters.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::envelope::MessageKind;
use crate::router::DropReason;

/// Receive-path statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouterStats {
    /// Datagrams handed to the router.
    pub datagrams: u64,
    /// Datagrams carrying a fragment header.
    pub fragments: u64,
    /// Framed messages reassembled and verified.
    pub reassembled: u64,
    /// Bare (unframed) payloads.
    pub bare: u64,

    /// `hello` envelopes dispatched.
    pub hello: u64,
    /// `state` envelopes dispatched.
    pub state: u64,
    /// `target` envelopes dispatched.
    pub target: u64,
    /// Envelopes with a missing, unknown or outbound-only `"t"`.
    pub ignored: u64,
    /// `hello_ack` and `ack` replies sent.
    pub replies_sent: u64,
    /// Replies the radio refused.
    pub reply_errors: u64,
    /// Known devices the registry had no room for.
    pub registry_full: u64,

    /// Datagrams received while the engine was stopped.
    pub dropped_not_started: u64,
    /// Multi-fragment frames addressed to broadcast.
    pub dropped_broadcast: u64,
    /// Fragments with no reassembly slot available.
    pub dropped_table_full: u64,
    /// Fragments out of range for their context.
    pub dropped_rejected: u64,
    /// Reassembled messages failing the CRC check.
    pub dropped_checksum: u64,
    /// Payloads that are not a JSON object.
    pub dropped_parse: u64,
    /// `hello`/`state`/`target` without a `deviceId`.
    pub dropped_no_device_id: u64,
}

impl RouterStats {
    pub(crate) fn record_drop(&mut self, reason: DropReason) {
        let counter = match reason {
            DropReason::NotStarted => &mut self.dropped_not_started,
            DropReason::MultiFragmentBroadcast => &mut self.dropped_broadcast,
            DropReason::ReassemblyTableFull => &mut self.dropped_table_full,
            DropReason::FragmentRejected => &mut self.dropped_rejected,
            DropReason::ChecksumMismatch => &mut self.dropped_checksum,
            DropReason::EnvelopeParse => &mut self.dropped_parse,
            DropReason::MissingDeviceId => &mut self.dropped_no_device_id,
        };
        *counter += 1;
    }

    pub(crate) fn record_dispatch(&mut self, kind: MessageKind) {
        match kind {
            MessageKind::Hello => self.hello += 1,
            MessageKind::State => self.state += 1,
            MessageKind::Target => self.target += 1,
            _ => self.ignored += 1,
        }
    }

    /// Sum of every drop counter.
    pub fn dropped(&self) -> u64 {
        self.dropped_not_started
            + self.dropped_broadcast
            + self.dropped_table_full
            + self.dropped_rejected
            + self.dropped_checksum
            + self.dropped_parse
            + self.dropped_no_device_id
    }
}

/// Send-path statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutboundStats {
    /// Datagrams accepted by the radio.
    pub frames_sent: u64,
    /// Payloads sent bare.
    pub bare_sent: u64,
    /// Payloads sent through the framed path.
    pub framed_sent: u64,
    /// Framed payloads that needed more than one fragment.
    pub fragmented: u64,
    /// Operations that failed (radio error or refused payload).
    pub send_errors: u64,
}

/// Lock-free counters behind [`OutboundStats`], shared by every outbound handle.
#[derive(Debug, Default)]
pub(crate) struct OutboundCounters {
    frames_sent: AtomicU64,
    bare_sent: AtomicU64,
    framed_sent: AtomicU64,
    fragmented: AtomicU64,
    send_errors: AtomicU64,
}

impl OutboundCounters {
    pub(crate) fn on_bare(&self) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
        self.bare_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn on_framed(&self, fragments: usize) {
        self.frames_sent
            .fetch_add(fragments as u64, Ordering::Relaxed);
        self.framed_sent.fetch_add(1, Ordering::Relaxed);
        if fragments > 1 {
            self.fragmented.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn on_error(&self) {
        self.send_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> OutboundStats {
        OutboundStats {
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            bare_sent: self.bare_sent.load(Ordering::Relaxed),
            framed_sent: self.framed_sent.load(Ordering::Relaxed),
            fragmented: self.fragmented.load(Ordering::Relaxed),
            send_errors: self.send_errors.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn reset(&self) {
        for counter in [
            &self.frames_sent,
            &self.bare_sent,
            &self.framed_sent,
            &self.fragmented,
            &self.send_errors,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}
