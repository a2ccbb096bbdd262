// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types for the satellite link engine.
//!
//! Receive-side problems (bad header, full table, checksum mismatch...) are never errors
//! for the caller: they are drops, reported through [`crate::router::RxOutcome`] and the
//! log. The types here cover the outbound API, the building blocks, and configuration.

use std::fmt;
use std::io;

/// Outbound send error.
#[derive(Debug)]
pub enum SendError {
    /// Missing device id or empty payload.
    InvalidArgument(&'static str),
    /// Payload does not fit in a single unframed datagram.
    InvalidSize(usize),
    /// Payload exceeds what the fragment header can describe.
    PayloadTooLarge(usize),
    /// Multi-fragment frames may never be broadcast.
    MultiFragmentBroadcast,
    /// Command document could not be normalised.
    Envelope(EnvelopeError),
    /// Radio rejected the frame; remaining fragments were abandoned.
    Io(io::Error),
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument(what) => write!(f, "invalid argument: {}", what),
            Self::InvalidSize(len) => write!(f, "payload of {} bytes does not fit one frame", len),
            Self::PayloadTooLarge(len) => write!(f, "payload of {} bytes is too large", len),
            Self::MultiFragmentBroadcast => write!(f, "multi-fragment broadcast is not allowed"),
            Self::Envelope(e) => write!(f, "bad command document: {}", e),
            Self::Io(e) => write!(f, "radio send failed: {}", e),
        }
    }
}

impl std::error::Error for SendError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Envelope(e) => Some(e),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for SendError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<EnvelopeError> for SendError {
    fn from(e: EnvelopeError) -> Self {
        Self::Envelope(e)
    }
}

/// Reassembly table error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReassemblyError {
    /// No free or expired slot.
    TableFull,
    /// Assembled buffer does not match the declared checksum.
    ChecksumMismatch {
        /// Checksum carried by the header.
        expected: u16,
        /// Checksum computed over the assembled buffer.
        actual: u16,
    },
    /// Context has missing fragments.
    Incomplete,
    /// Handle does not refer to a live context.
    StaleHandle,
}

impl fmt::Display for ReassemblyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TableFull => write!(f, "reassembly table full"),
            Self::ChecksumMismatch { expected, actual } => write!(
                f,
                "checksum mismatch (expected {:#06x}, got {:#06x})",
                expected, actual
            ),
            Self::Incomplete => write!(f, "reassembly incomplete"),
            Self::StaleHandle => write!(f, "stale reassembly handle"),
        }
    }
}

impl std::error::Error for ReassemblyError {}

/// Satellite registry error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    /// Every slot is in use; the device cannot be remembered.
    Full,
    /// Device ids must be non-empty.
    EmptyDeviceId,
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => write!(f, "satellite table full"),
            Self::EmptyDeviceId => write!(f, "empty device id"),
        }
    }
}

impl std::error::Error for RegistryError {}

/// JSON envelope error.
#[derive(Debug)]
pub enum EnvelopeError {
    /// Bytes are not valid JSON.
    Json(serde_json::Error),
    /// Valid JSON, but not an object.
    NotAnObject,
    /// No JSON value at all (empty or whitespace only).
    Empty,
}

impl fmt::Display for EnvelopeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json(e) => write!(f, "invalid JSON: {}", e),
            Self::NotAnObject => write!(f, "envelope is not a JSON object"),
            Self::Empty => write!(f, "empty envelope"),
        }
    }
}

impl std::error::Error for EnvelopeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Json(e) => Some(e),
            Self::NotAnObject | Self::Empty => None,
        }
    }
}

impl From<serde_json::Error> for EnvelopeError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

/// Configuration error.
#[derive(Debug)]
pub enum ConfigError {
    /// Config file could not be read.
    Io(io::Error),
    /// Config file is not valid YAML for [`crate::LinkConfig`].
    Yaml(serde_yaml::Error),
    /// Environment override could not be parsed.
    Env {
        /// Variable name.
        var: &'static str,
        /// Offending value.
        value: String,
    },
    /// A field is out of range.
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "config read failed: {}", e),
            Self::Yaml(e) => write!(f, "config parse failed: {}", e),
            Self::Env { var, value } => write!(f, "invalid value {:?} for {}", value, var),
            Self::Invalid(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Yaml(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ConfigError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Yaml(e)
    }
}

/// Engine lifecycle error.
#[derive(Debug)]
pub enum LinkError {
    /// Configuration rejected.
    Config(ConfigError),
    /// Radio start or poller thread spawn failed.
    Io(io::Error),
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "{}", e),
            Self::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for LinkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Io(e) => Some(e),
        }
    }
}

impl From<ConfigError> for LinkError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<io::Error> for LinkError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}
