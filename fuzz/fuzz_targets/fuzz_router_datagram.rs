// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![no_main]

use std::sync::Arc;

use libfuzzer_sys::fuzz_target;
use satlink::{DestMode, LinkConfig, ManualClock, MemoryRadio, PeerAddr, SatLink};

fuzz_target!(|data: &[u8]| {
    let radio = Arc::new(MemoryRadio::new(1));
    let config = LinkConfig {
        reassembly_slots: 2,
        registry_capacity: 2,
        ..LinkConfig::local_test()
    };
    let Ok(mut link) = SatLink::with_clock(config, radio, Arc::new(ManualClock::new())) else {
        return;
    };
    if link.start().is_err() {
        return;
    }

    // First byte picks source and destination, the rest is split into datagrams on 0x00
    let Some((&selector, rest)) = data.split_first() else {
        return;
    };
    let src = PeerAddr::new([0x02, 0, 0, 0, 0, selector & 0x03]);
    let dest = if selector & 0x80 != 0 {
        DestMode::Broadcast
    } else {
        DestMode::Unicast
    };
    for datagram in rest.split(|&b| b == 0) {
        let _ = link.handle_datagram(src, dest, datagram);
    }
});
