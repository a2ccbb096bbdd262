// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Engine object.
//!
//! [`SatLink`] owns every table and wires the parts together:
//!
//! ```text
//!            +------------------------- SatLink --------------------------+
//! radio rx ->| Router (&mut) -> ReassemblyTable                          |
//!            |    |                                                       |
//!            |    +-> Outbound (Arc) -> Fragmenter -> Radio::send         |
//!            |             ^    \-> SatelliteRegistry (Mutex)             |
//!            |   Poller ---+                                              |
//!            +------------------------------------------------------------+
//! ```
//!
//! Lifecycle: `new` -> `start` (clears the tables, brings the radio up, optionally
//! starts the poller) -> `handle_datagram` per received datagram -> `stop`.

use std::sync::Arc;
use std::time::Duration;

use crate::addr::{DestMode, PeerAddr};
use crate::config::LinkConfig;
use crate::error::{LinkError, SendError};
use crate::fragment::{Delivery, Fragmenter};
use crate::outbound::Outbound;
use crate::poller::{Poller, MIN_POLL_INTERVAL};
use crate::radio::{Clock, Radio, SystemClock};
use crate::reassembly::ReassemblyTable;
use crate::registry::{SatelliteEntry, SatelliteRegistry};
use crate::router::{Router, RxOutcome, SatelliteHandler};
use crate::stats::{OutboundStats, RouterStats};

/// Satellite link engine.
pub struct SatLink {
    config: LinkConfig,
    radio: Arc<dyn Radio>,
    router: Router,
    outbound: Outbound,
    poller: Option<Poller>,
    poll_enabled: bool,
    poll_interval: Duration,
    started: bool,
}

impl SatLink {
    /// Create an engine on `radio` using the system clock.
    pub fn new(config: LinkConfig, radio: Arc<dyn Radio>) -> Result<Self, LinkError> {
        Self::with_clock(config, radio, Arc::new(SystemClock))
    }

    /// Create an engine with an explicit time source.
    pub fn with_clock(
        config: LinkConfig,
        radio: Arc<dyn Radio>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, LinkError> {
        config.validate()?;

        let registry = Arc::new(SatelliteRegistry::new(
            config.registry_capacity,
            Arc::clone(&clock),
        ));
        let fragmenter = Fragmenter::new(config.mtu, config.fragment_pacing(), config.rng_seed);
        let outbound = Outbound::new(Arc::clone(&radio), registry, fragmenter);
        let reassembly = ReassemblyTable::new(
            config.reassembly_slots,
            config.reassembly_window(),
            config.chunk_size(),
            clock,
        );
        let router = Router::new(reassembly, outbound.clone());

        Ok(Self {
            poll_enabled: config.poll_enabled,
            poll_interval: config.poll_interval(),
            config,
            radio,
            router,
            outbound,
            poller: None,
            started: false,
        })
    }

    /// Bring the link up. Forgets every known satellite and in-flight message.
    pub fn start(&mut self) -> Result<(), LinkError> {
        if self.started {
            return Ok(());
        }

        self.outbound.registry().clear();
        self.router.clear();
        self.radio.start()?;
        self.started = true;

        if self.poll_enabled {
            if let Err(e) = self.spawn_poller() {
                self.stop();
                return Err(e);
            }
        }

        log::info!(
            "[satlink] started (ch={}, mtu={}, polling={})",
            self.radio.current_channel(),
            self.config.mtu,
            if self.poll_enabled { "on" } else { "off" }
        );
        Ok(())
    }

    /// Take the link down. Stops the poller and the radio.
    pub fn stop(&mut self) {
        if !self.started {
            return;
        }
        if let Some(mut poller) = self.poller.take() {
            poller.stop();
        }
        self.radio.stop();
        self.router.clear();
        self.started = false;
        log::info!("[satlink] stopped");
    }

    /// Check if the link is up.
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Install the message hooks.
    pub fn set_handler(&mut self, handler: Box<dyn SatelliteHandler>) {
        self.router.set_handler(handler);
    }

    /// Enable or disable the diagnostic poller.
    ///
    /// The interval only changes when enabling with at least [`MIN_POLL_INTERVAL`]; a
    /// shorter one keeps the previous interval. While stopped, the setting applies at the
    /// next `start`.
    pub fn set_polling(&mut self, enable: bool, interval: Duration) -> Result<(), LinkError> {
        self.poll_enabled = enable;
        if enable && interval >= MIN_POLL_INTERVAL {
            self.poll_interval = interval;
        }

        if !enable {
            if let Some(mut poller) = self.poller.take() {
                poller.stop();
            }
        } else if let Some(poller) = &self.poller {
            poller.set_interval(self.poll_interval);
        } else if self.started {
            self.spawn_poller()?;
        }
        Ok(())
    }

    /// Whether the poller thread is running.
    pub fn is_polling(&self) -> bool {
        self.poller.is_some()
    }

    /// Feed one received datagram. Call from a single task, one datagram at a time.
    pub fn handle_datagram(&mut self, src: PeerAddr, dest: DestMode, data: &[u8]) -> RxOutcome {
        if !self.started {
            return self.router.reject_not_started();
        }
        self.router.handle_datagram(src, dest, data)
    }

    /// Cloneable send handle for other threads.
    pub fn outbound(&self) -> Outbound {
        self.outbound.clone()
    }

    /// Broadcast `{"t":"get"}`.
    pub fn broadcast_get(&self) -> Result<(), SendError> {
        self.outbound.broadcast_get()
    }

    /// Ask one device for its state.
    pub fn request_state(&self, device_id: &str) -> Result<(), SendError> {
        self.outbound.request_state(device_id)
    }

    /// Push a set command.
    pub fn send_set_json(&self, device_id: Option<&str>, json: &[u8]) -> Result<Delivery, SendError> {
        self.outbound.send_set_json(device_id, json)
    }

    /// Turn a target document into a set command and push it.
    pub fn forward_target(&self, document: &[u8]) -> Result<Delivery, SendError> {
        self.outbound.forward_target(document)
    }

    /// Address of a registered device.
    pub fn lookup_peer(&self, device_id: &str) -> Option<PeerAddr> {
        self.outbound.lookup_peer(device_id)
    }

    /// Radio channel in use.
    pub fn current_channel(&self) -> u8 {
        self.outbound.current_channel()
    }

    /// Known satellites.
    pub fn satellites(&self) -> Vec<SatelliteEntry> {
        self.outbound.registry().entries()
    }

    /// Shared satellite table.
    pub fn registry(&self) -> Arc<SatelliteRegistry> {
        Arc::clone(self.outbound.registry())
    }

    /// Receive counters.
    pub fn router_stats(&self) -> RouterStats {
        self.router.stats()
    }

    /// Send counters.
    pub fn outbound_stats(&self) -> OutboundStats {
        self.outbound.stats()
    }

    /// Active configuration.
    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    fn spawn_poller(&mut self) -> Result<(), LinkError> {
        let poller = Poller::spawn(self.outbound.clone(), self.poll_interval)?;
        log::debug!("[satlink] polling every {:?}", self.poll_interval);
        self.poller = Some(poller);
        Ok(())
    }
}

impl Drop for SatLink {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for SatLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SatLink")
            .field("started", &self.started)
            .field("config", &self.config)
            .field("router", &self.router)
            .field("poller", &self.poller)
            .finish()
    }
}
