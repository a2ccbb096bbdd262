// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! CRC-16/CCITT-FALSE checksum over reassembled messages.
//!
//! The checksum covers the *whole* message payload, not individual fragments, so a
//! receiver can only verify it once every fragment has arrived.
//!
//! # Parameters (CRC-16/CCITT-FALSE)
//!
//! | Parameter | Value |
//! |-----------|-------|
//! | Polynomial | 0x1021 |
//! | Init | 0xFFFF |
//! | RefIn | false |
//! | RefOut | false |
//! | XorOut | 0x0000 |
//!
//! # Test Vector
//!
//! ```
//! use satlink::wire::crc::crc16_ccitt;
//!
//! // Standard test vector: "123456789" -> 0x29B1
//! assert_eq!(crc16_ccitt(b"123456789"), 0x29B1);
//! ```

/// CRC-16/CCITT-FALSE polynomial.
const POLY: u16 = 0x1021;

/// Initial register value.
const INIT: u16 = 0xFFFF;

/// Lookup table, one entry per leading byte value.
const CRC_TABLE: [u16; 256] = {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u16) << 8;
        let mut j = 0;
        while j < 8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ POLY;
            } else {
                crc <<= 1;
            }
            j += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
};

/// Calculate CRC-16/CCITT-FALSE checksum.
#[inline]
#[must_use]
pub fn crc16_ccitt(data: &[u8]) -> u16 {
    crc16_ccitt_update(INIT, data)
}

/// Continue a running CRC with more data.
#[inline]
#[must_use]
pub fn crc16_ccitt_update(crc: u16, data: &[u8]) -> u16 {
    let mut crc = crc;
    for &byte in data {
        let index = ((crc >> 8) ^ u16::from(byte)) as usize;
        crc = (crc << 8) ^ CRC_TABLE[index];
    }
    crc
}

/// Byte-at-a-time, bit-serial CRC, as the satellites compute it.
///
/// Kept as the reference the table-driven version must reproduce.
#[must_use]
pub fn crc16_ccitt_bitwise(data: &[u8]) -> u16 {
    let mut crc = INIT;
    for &byte in data {
        crc ^= u16::from(byte) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ POLY
            } else {
                crc << 1
            };
        }
    }
    crc
}
