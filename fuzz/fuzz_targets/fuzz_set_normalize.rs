// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![no_main]

use libfuzzer_sys::fuzz_target;
use satlink::envelope::{normalize_set, Envelope, MessageKind};

fuzz_target!(|data: &[u8]| {
    if let Ok(cmd) = normalize_set(data) {
        let env = Envelope::parse(&cmd.payload).expect("normalized output is an object");
        assert_eq!(env.kind(), Some(MessageKind::Set));
        assert!(env.get("deviceId").is_none() || cmd.device_id.is_none());
    }
});
