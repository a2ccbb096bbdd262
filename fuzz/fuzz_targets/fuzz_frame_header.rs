// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![no_main]

use libfuzzer_sys::fuzz_target;
use satlink::wire::{decode_header, FragmentHeader, HEADER_SIZE};

fuzz_target!(|data: &[u8]| {
    if let Some((header, chunk)) = decode_header(data) {
        assert!(header.total > 0);
        assert_eq!(chunk.len(), data.len() - HEADER_SIZE);

        // Decoded headers re-encode to the same bytes
        assert_eq!(&header.encode()[..], &data[..HEADER_SIZE]);
        assert_eq!(FragmentHeader::decode(&header.encode()), Some(header));
    }
});
