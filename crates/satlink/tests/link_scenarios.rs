// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::uninlined_format_args)] // Test code readability over pedantic
#![allow(clippy::too_many_lines)] // Scenario tests

//! End-to-end scenarios through the engine object.
//!
//! Two engines talk over `MemoryRadio`: frames one engine sends are taken from its
//! radio and fed to the other's `handle_datagram`, in whatever order the test wants.
//!
//! Scenarios:
//! - hello -> registry entry + hello_ack with the radio channel
//! - state with and without seq
//! - framed state delivered out of order, exactly once
//! - multi-fragment broadcast rejected on receive and on send
//! - reassembly expiry with a manual clock
//! - set commands addressed by registry lookup
//! - target forwarding

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use satlink::{
    DestMode, DropReason, FrameType, LinkConfig, ManualClock, MemoryRadio, MessageKind, PeerAddr,
    RxOutcome, SatLink, SatelliteHandler, SendError, SentFrame,
};

const HUB: PeerAddr = PeerAddr::new([0x24, 0x6F, 0x28, 0x00, 0x00, 0x01]);
const SAT_A: PeerAddr = PeerAddr::new([0x24, 0x6F, 0x28, 0x00, 0x00, 0xA0]);
const SAT_B: PeerAddr = PeerAddr::new([0x24, 0x6F, 0x28, 0x00, 0x00, 0xB0]);

#[derive(Debug, Clone, PartialEq, Eq)]
enum Seen {
    Hello(String, PeerAddr),
    State(String, Vec<u8>),
    Target(String, Vec<u8>),
}

#[derive(Clone, Default)]
struct Log(Arc<Mutex<Vec<Seen>>>);

impl Log {
    fn take(&self) -> Vec<Seen> {
        std::mem::take(&mut *self.0.lock())
    }
}

impl SatelliteHandler for Log {
    fn on_hello(&mut self, device_id: &str, peer: PeerAddr) {
        self.0.lock().push(Seen::Hello(device_id.to_string(), peer));
    }

    fn on_state(&mut self, device_id: &str, payload: &[u8]) {
        self.0
            .lock()
            .push(Seen::State(device_id.to_string(), payload.to_vec()));
    }

    fn on_target(&mut self, device_id: &str, payload: &[u8]) {
        self.0
            .lock()
            .push(Seen::Target(device_id.to_string(), payload.to_vec()));
    }
}

struct Node {
    link: SatLink,
    radio: Arc<MemoryRadio>,
    clock: Arc<ManualClock>,
    log: Log,
}

/// Helper: started engine on channel `channel` with a recording handler.
fn node(channel: u8) -> Node {
    let radio = Arc::new(MemoryRadio::new(channel));
    let clock = Arc::new(ManualClock::new());
    let mut link =
        SatLink::with_clock(LinkConfig::local_test(), radio.clone(), clock.clone()).expect("link");
    let log = Log::default();
    link.set_handler(Box::new(log.clone()));
    link.start().expect("start");
    Node {
        link,
        radio,
        clock,
        log,
    }
}

/// Helper: deliver frames from `from` to `to`, classifying each destination.
fn deliver(to: &mut Node, from: PeerAddr, frames: &[SentFrame]) -> Vec<RxOutcome> {
    frames
        .iter()
        .map(|f| to.link.handle_datagram(from, DestMode::of(&f.dest), &f.bytes))
        .collect()
}

/// Helper: JSON document of exactly `len` bytes.
fn doc(kind: &str, device: &str, len: usize) -> Vec<u8> {
    let mut v = format!(r#"{{"t":"{}","deviceId":"{}","pad":""#, kind, device).into_bytes();
    assert!(v.len() + 2 <= len);
    v.resize(len - 2, b'.');
    v.extend_from_slice(b"\"}");
    v
}

// ---------------------------------------------------------------------------
// hello / state / target
// ---------------------------------------------------------------------------

#[test]
fn test_hello_yields_registry_entry_and_ack_on_channel() {
    let mut hub = node(6);

    let out = hub.link.handle_datagram(
        SAT_A,
        DestMode::Broadcast,
        br#"{"t":"hello","deviceId":"dev1"}"#,
    );

    assert_eq!(out, RxOutcome::Dispatched(MessageKind::Hello));
    assert_eq!(hub.link.lookup_peer("dev1"), Some(SAT_A));
    let sent = hub.radio.take_sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].dest, SAT_A);
    assert_eq!(sent[0].text(), r#"{"t":"hello_ack","ch":6}"#);
    assert_eq!(hub.log.take(), vec![Seen::Hello("dev1".into(), SAT_A)]);
}

#[test]
fn test_state_seq_controls_ack() {
    let mut hub = node(1);

    hub.link.handle_datagram(
        SAT_A,
        DestMode::Unicast,
        br#"{"t":"state","deviceId":"dev1","seq":7}"#,
    );
    let sent = hub.radio.take_sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].dest, SAT_A);
    assert_eq!(sent[0].text(), r#"{"t":"ack","deviceId":"dev1","seq":7}"#);

    hub.link.handle_datagram(
        SAT_A,
        DestMode::Unicast,
        br#"{"t":"state","deviceId":"dev1"}"#,
    );
    assert!(hub.radio.take_sent().is_empty());
    assert_eq!(hub.log.take().len(), 2);
}

#[test]
fn test_device_moves_to_new_address() {
    let mut hub = node(1);
    hub.link.handle_datagram(
        SAT_A,
        DestMode::Unicast,
        br#"{"t":"target","deviceId":"dev1"}"#,
    );
    hub.link.handle_datagram(
        SAT_B,
        DestMode::Unicast,
        br#"{"t":"target","deviceId":"dev1"}"#,
    );

    assert_eq!(hub.link.lookup_peer("dev1"), Some(SAT_B));
    assert_eq!(hub.link.satellites().len(), 1);
    assert!(hub.radio.take_sent().is_empty());
}

// ---------------------------------------------------------------------------
// Framed delivery between two engines
// ---------------------------------------------------------------------------

#[test]
fn test_small_json_goes_bare_and_arrives_intact() {
    let hub = node(1);
    let mut sat = node(1);
    hub.link.registry().upsert("sat", SAT_A).expect("upsert");

    let payload = br#"{"t":"target","deviceId":"hub","temp":21.5}"#;
    hub.link.send_set_json(Some("sat"), payload).expect("send");
    let frames = hub.radio.take_sent();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].bytes, payload.to_vec());

    deliver(&mut sat, HUB, &frames);
    assert_eq!(
        sat.log.take(),
        vec![Seen::Target("hub".into(), payload.to_vec())]
    );
}

#[test]
fn test_500_byte_state_out_of_order_delivered_once() {
    let mut hub = node(1);
    let sat = node(1);
    let payload = doc("state", "dev1", 500);

    sat.link
        .outbound()
        .send_framed(&HUB, FrameType::State, &payload)
        .expect("send");
    let frames = sat.radio.take_sent();
    assert_eq!(frames.len(), 3);

    let order = [1, 0, 2];
    let reordered: Vec<SentFrame> = order.iter().map(|&i| frames[i].clone()).collect();
    let outcomes = deliver(&mut hub, SAT_A, &reordered);

    assert_eq!(
        outcomes,
        vec![
            RxOutcome::Pending,
            RxOutcome::Pending,
            RxOutcome::Dispatched(MessageKind::State)
        ]
    );
    assert_eq!(hub.log.take(), vec![Seen::State("dev1".into(), payload)]);

    // A late duplicate opens a fresh context; it never re-delivers
    assert_eq!(
        hub.link
            .handle_datagram(SAT_A, DestMode::Unicast, &frames[0].bytes),
        RxOutcome::Pending
    );
    assert!(hub.log.take().is_empty());
    assert_eq!(hub.link.router_stats().reassembled, 1);
}

#[test]
fn test_any_delivery_order_reassembles() {
    let mut rng = fastrand::Rng::with_seed(0xC0FFEE);

    for len in [240, 700, 1500, 4000] {
        let mut hub = node(1);
        let sat = node(1);
        let payload = doc("state", "dev9", len);

        sat.link
            .outbound()
            .send_framed(&HUB, FrameType::State, &payload)
            .expect("send");
        let mut frames = sat.radio.take_sent();
        rng.shuffle(&mut frames);

        let outcomes = deliver(&mut hub, SAT_A, &frames);
        let dispatched = outcomes
            .iter()
            .filter(|o| **o == RxOutcome::Dispatched(MessageKind::State))
            .count();
        assert_eq!(dispatched, 1, "len {}", len);
        assert_eq!(
            outcomes.last(),
            Some(&RxOutcome::Dispatched(MessageKind::State)),
            "len {}",
            len
        );
        assert_eq!(
            hub.log.take(),
            vec![Seen::State("dev9".into(), payload)],
            "len {}",
            len
        );
    }
}

#[test]
fn test_duplicated_fragments_are_harmless() {
    let mut hub = node(1);
    let sat = node(1);
    let payload = doc("target", "dev2", 800);

    sat.link
        .outbound()
        .send_framed(&HUB, FrameType::Target, &payload)
        .expect("send");
    let frames = sat.radio.take_sent();
    let mut noisy = Vec::new();
    for frame in &frames[..frames.len() - 1] {
        noisy.push(frame.clone());
        noisy.push(frame.clone());
    }
    noisy.push(frames[frames.len() - 1].clone());

    deliver(&mut hub, SAT_A, &noisy);
    assert_eq!(hub.log.take(), vec![Seen::Target("dev2".into(), payload)]);
}

#[test]
fn test_interleaved_messages_from_two_satellites() {
    let mut hub = node(1);
    let sat_a = node(1);
    let sat_b = node(1);
    let doc_a = doc("state", "a", 600);
    let doc_b = doc("state", "b", 600);

    sat_a
        .link
        .outbound()
        .send_framed(&HUB, FrameType::State, &doc_a)
        .expect("send");
    sat_b
        .link
        .outbound()
        .send_framed(&HUB, FrameType::State, &doc_b)
        .expect("send");
    let frames_a = sat_a.radio.take_sent();
    let frames_b = sat_b.radio.take_sent();

    for (fa, fb) in frames_a.iter().zip(&frames_b) {
        hub.link.handle_datagram(SAT_A, DestMode::Unicast, &fa.bytes);
        hub.link.handle_datagram(SAT_B, DestMode::Unicast, &fb.bytes);
    }

    let seen = hub.log.take();
    assert_eq!(seen.len(), 2);
    assert!(seen.contains(&Seen::State("a".into(), doc_a)));
    assert!(seen.contains(&Seen::State("b".into(), doc_b)));
    assert_eq!(hub.link.lookup_peer("a"), Some(SAT_A));
    assert_eq!(hub.link.lookup_peer("b"), Some(SAT_B));
}

// ---------------------------------------------------------------------------
// Broadcast policy
// ---------------------------------------------------------------------------

#[test]
fn test_multi_fragment_broadcast_never_delivered() {
    let mut hub = node(1);
    let sat = node(1);
    let payload = doc("state", "dev1", 500);

    sat.link
        .outbound()
        .send_framed(&HUB, FrameType::State, &payload)
        .expect("send");
    let frames = sat.radio.take_sent();

    for frame in &frames {
        assert_eq!(
            hub.link
                .handle_datagram(SAT_A, DestMode::Broadcast, &frame.bytes),
            RxOutcome::Dropped(DropReason::MultiFragmentBroadcast)
        );
    }
    assert!(hub.log.take().is_empty());
    assert_eq!(hub.link.lookup_peer("dev1"), None);
}

#[test]
fn test_multi_fragment_broadcast_never_sent() {
    let hub = node(1);
    let payload = doc("set", "ghost", 600);

    assert!(matches!(
        hub.link.send_set_json(Some("ghost"), &payload),
        Err(SendError::MultiFragmentBroadcast)
    ));
    assert!(matches!(
        hub.link
            .outbound()
            .send_framed(&PeerAddr::BROADCAST, FrameType::Target, &payload),
        Err(SendError::MultiFragmentBroadcast)
    ));
    assert_eq!(hub.radio.sent_count(), 0);
}

// ---------------------------------------------------------------------------
// Expiry
// ---------------------------------------------------------------------------

#[test]
fn test_stale_partial_message_is_reclaimed_not_delivered() {
    let radio = Arc::new(MemoryRadio::new(1));
    let clock = Arc::new(ManualClock::new());
    let config = LinkConfig {
        reassembly_slots: 1,
        ..LinkConfig::local_test()
    };
    let mut hub = SatLink::with_clock(config, radio, clock.clone()).expect("link");
    let log = Log::default();
    hub.set_handler(Box::new(log.clone()));
    hub.start().expect("start");

    let sat = node(1);
    let stale = doc("state", "old", 500);
    let fresh = doc("state", "new", 500);
    let out = sat.link.outbound();
    out.send_framed(&HUB, FrameType::State, &stale).expect("send");
    let stale_frames = sat.radio.take_sent();
    out.send_framed(&HUB, FrameType::State, &fresh).expect("send");
    let fresh_frames = sat.radio.take_sent();

    hub.handle_datagram(SAT_A, DestMode::Unicast, &stale_frames[0].bytes);

    // Within the window the only slot is taken
    clock.advance(Duration::from_millis(799));
    assert_eq!(
        hub.handle_datagram(SAT_A, DestMode::Unicast, &fresh_frames[0].bytes),
        RxOutcome::Dropped(DropReason::ReassemblyTableFull)
    );

    // Past the window it is reclaimed by the next allocation
    clock.advance(Duration::from_millis(2));
    for frame in &fresh_frames {
        hub.handle_datagram(SAT_A, DestMode::Unicast, &frame.bytes);
    }
    for frame in &stale_frames[1..] {
        hub.handle_datagram(SAT_A, DestMode::Unicast, &frame.bytes);
    }

    assert_eq!(log.take(), vec![Seen::State("new".into(), fresh)]);
}

#[test]
fn test_fragments_keep_context_alive() {
    let mut hub = node(1);
    let sat = node(1);
    let payload = doc("state", "slow", 1000);

    sat.link
        .outbound()
        .send_framed(&HUB, FrameType::State, &payload)
        .expect("send");
    let frames = sat.radio.take_sent();

    // Each gap is under the window even though the total is not
    for frame in &frames {
        hub.clock.advance(Duration::from_millis(600));
        hub.link.handle_datagram(SAT_A, DestMode::Unicast, &frame.bytes);
    }
    assert_eq!(hub.log.take(), vec![Seen::State("slow".into(), payload)]);
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

#[test]
fn test_request_state_follows_registry() {
    let mut hub = node(1);
    hub.link.request_state("dev1").expect("get");
    hub.link.handle_datagram(
        SAT_A,
        DestMode::Unicast,
        br#"{"t":"hello","deviceId":"dev1"}"#,
    );
    hub.radio.take_sent();
    hub.link.request_state("dev1").expect("get");

    let sent = hub.radio.take_sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].dest, SAT_A);
    assert_eq!(sent[0].text(), r#"{"t":"get"}"#);
}

#[test]
fn test_forward_target_to_known_satellite() {
    let mut hub = node(1);
    let mut sat = node(1);
    hub.link.handle_datagram(
        SAT_A,
        DestMode::Unicast,
        br#"{"t":"hello","deviceId":"dev1"}"#,
    );
    hub.radio.take_sent();

    hub.link
        .forward_target(br#"{"deviceId":"dev1","t":"target","setpoint":21.456,"mode":"heat"}"#)
        .expect("forward");
    let sent = hub.radio.take_sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].dest, SAT_A);
    assert_eq!(sent[0].text(), r#"{"t":"set","setpoint":21.46,"mode":"heat"}"#);

    // A satellite-side engine does not act on "set"
    assert_eq!(
        deliver(&mut sat, HUB, &sent),
        vec![RxOutcome::Ignored(MessageKind::Set)]
    );
}

#[test]
fn test_large_set_to_known_satellite_is_framed() {
    let hub = node(1);
    let mut sat = node(1);
    hub.link.registry().upsert("dev1", SAT_A).expect("upsert");

    let payload = doc("target", "hub", 900);
    hub.link.send_set_json(Some("dev1"), &payload).expect("send");
    let frames = hub.radio.take_sent();
    assert_eq!(frames.len(), 4);
    assert!(frames.iter().all(|f| f.dest == SAT_A));

    deliver(&mut sat, HUB, &frames);
    assert_eq!(sat.log.take(), vec![Seen::Target("hub".into(), payload)]);
    assert_eq!(hub.link.outbound_stats().fragmented, 1);
}
