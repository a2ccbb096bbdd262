// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Engine configuration.
//!
//! Defaults match the deployed hub. Every field can come from YAML (missing fields keep
//! their default) and be overridden from the environment:
//!
//! ```yaml
//! mtu: 250
//! reassembly_slots: 8
//! reassembly_window_ms: 800
//! registry_capacity: 16
//! fragment_pacing_us: 1000
//! poll_enabled: false
//! poll_interval_ms: 2000
//! ```
//!
//! | variable | field |
//! |---|---|
//! | `SATLINK_MTU` | `mtu` |
//! | `SATLINK_REASSEMBLY_SLOTS` | `reassembly_slots` |
//! | `SATLINK_REASSEMBLY_WINDOW_MS` | `reassembly_window_ms` |
//! | `SATLINK_REGISTRY_CAPACITY` | `registry_capacity` |
//! | `SATLINK_FRAGMENT_PACING_US` | `fragment_pacing_us` |
//! | `SATLINK_POLL_ENABLED` | `poll_enabled` |
//! | `SATLINK_POLL_INTERVAL_MS` | `poll_interval_ms` |
//! | `SATLINK_RNG_SEED` | `rng_seed` |

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::poller::MIN_POLL_INTERVAL;
use crate::wire::{HEADER_SIZE, MAX_DATAGRAM};

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LinkConfig {
    /// Largest datagram, header included. Both ends must agree.
    pub mtu: usize,
    /// Messages that can be reassembled at once.
    pub reassembly_slots: usize,
    /// Reassembly deadline, refreshed by each fragment.
    pub reassembly_window_ms: u64,
    /// Satellites remembered by id.
    pub registry_capacity: usize,
    /// Sleep between consecutive fragments of one message.
    pub fragment_pacing_us: u64,
    /// Start the diagnostic poller with the engine.
    pub poll_enabled: bool,
    /// Diagnostic poll period.
    pub poll_interval_ms: u64,
    /// Fixed seed for message ids.
    pub rng_seed: Option<u64>,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            mtu: MAX_DATAGRAM,
            reassembly_slots: 8,
            reassembly_window_ms: 800,
            registry_capacity: 16,
            fragment_pacing_us: 1000,
            poll_enabled: false,
            poll_interval_ms: 2000,
            rng_seed: None,
        }
    }
}

impl LinkConfig {
    /// Preset for tests and simulation: no pacing, fixed ids.
    pub fn local_test() -> Self {
        Self {
            fragment_pacing_us: 0,
            rng_seed: Some(0x5A7),
            ..Default::default()
        }
    }

    /// Parse YAML.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Override fields from `SATLINK_*` environment variables.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|var| std::env::var(var).ok())
    }

    /// Override fields from `lookup`, which maps a variable name to its value.
    pub fn apply_env_from(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        override_field(&lookup, "SATLINK_MTU", &mut self.mtu)?;
        override_field(&lookup, "SATLINK_REASSEMBLY_SLOTS", &mut self.reassembly_slots)?;
        override_field(
            &lookup,
            "SATLINK_REASSEMBLY_WINDOW_MS",
            &mut self.reassembly_window_ms,
        )?;
        override_field(&lookup, "SATLINK_REGISTRY_CAPACITY", &mut self.registry_capacity)?;
        override_field(&lookup, "SATLINK_FRAGMENT_PACING_US", &mut self.fragment_pacing_us)?;
        override_field(&lookup, "SATLINK_POLL_INTERVAL_MS", &mut self.poll_interval_ms)?;

        if let Some(value) = lookup("SATLINK_POLL_ENABLED") {
            self.poll_enabled = parse_bool(&value).ok_or(ConfigError::Env {
                var: "SATLINK_POLL_ENABLED",
                value,
            })?;
        }
        if let Some(value) = lookup("SATLINK_RNG_SEED") {
            let seed = value.trim().parse().map_err(|_| ConfigError::Env {
                var: "SATLINK_RNG_SEED",
                value: value.clone(),
            })?;
            self.rng_seed = Some(seed);
        }

        self.validate()
    }

    /// Reject out-of-range values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mtu <= HEADER_SIZE || self.mtu > MAX_DATAGRAM {
            return Err(ConfigError::Invalid(format!(
                "mtu must be in {}..={} (got {})",
                HEADER_SIZE + 1,
                MAX_DATAGRAM,
                self.mtu
            )));
        }
        if self.reassembly_slots == 0 {
            return Err(ConfigError::Invalid(
                "reassembly_slots must be at least 1".into(),
            ));
        }
        if self.registry_capacity == 0 {
            return Err(ConfigError::Invalid(
                "registry_capacity must be at least 1".into(),
            ));
        }
        if self.reassembly_window_ms == 0 {
            return Err(ConfigError::Invalid(
                "reassembly_window_ms must be positive".into(),
            ));
        }
        if self.poll_interval() < MIN_POLL_INTERVAL {
            return Err(ConfigError::Invalid(format!(
                "poll_interval_ms must be at least {}",
                MIN_POLL_INTERVAL.as_millis()
            )));
        }
        Ok(())
    }

    /// Payload bytes per fragment.
    pub fn chunk_size(&self) -> usize {
        self.mtu.saturating_sub(HEADER_SIZE)
    }

    /// Reassembly window as a duration.
    pub fn reassembly_window(&self) -> Duration {
        Duration::from_millis(self.reassembly_window_ms)
    }

    /// Fragment pacing as a duration.
    pub fn fragment_pacing(&self) -> Duration {
        Duration::from_micros(self.fragment_pacing_us)
    }

    /// Poll interval as a duration.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn override_field<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    field: &mut T,
) -> Result<(), ConfigError> {
    if let Some(value) = lookup(var) {
        *field = value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Env { var, value: value.clone() })?;
    }
    Ok(())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
