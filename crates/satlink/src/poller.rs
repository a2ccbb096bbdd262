// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Diagnostic poll thread.
//!
//! Satellites push their state on their own; this thread is an optional extra that
//! broadcasts `{"t":"get"}` every interval. Disabled by default.
//!
//! ```text
//! loop {
//!     broadcast_get()
//!     wait(interval) or stop signal
//! }
//! ```

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, RecvTimeoutError, Sender};

use crate::outbound::Outbound;

/// Shortest accepted poll interval.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Poll interval used when none is configured.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// Background broadcast-get thread. Stops on [`Poller::stop`] or drop.
pub struct Poller {
    stop_tx: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
    interval_ms: Arc<AtomicU64>,
}

impl Poller {
    /// Start polling through `outbound` every `interval` (raised to
    /// [`MIN_POLL_INTERVAL`]). The first poll goes out immediately.
    pub fn spawn(outbound: Outbound, interval: Duration) -> io::Result<Self> {
        let interval_ms = Arc::new(AtomicU64::new(clamp_ms(interval)));
        let (stop_tx, stop_rx) = channel::bounded::<()>(1);

        let shared = Arc::clone(&interval_ms);
        let thread = thread::Builder::new()
            .name("satlink-poll".to_string())
            .spawn(move || {
                log::debug!("[poller] started");
                loop {
                    if let Err(e) = outbound.broadcast_get() {
                        log::debug!("[poller] broadcast get failed: {}", e);
                    }
                    let wait = Duration::from_millis(shared.load(Ordering::Relaxed));
                    match stop_rx.recv_timeout(wait) {
                        Err(RecvTimeoutError::Timeout) => continue,
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                log::debug!("[poller] stopped");
            })?;

        Ok(Self {
            stop_tx: Some(stop_tx),
            thread: Some(thread),
            interval_ms,
        })
    }

    /// Change the interval; applies from the next wait.
    pub fn set_interval(&self, interval: Duration) {
        self.interval_ms
            .store(clamp_ms(interval), Ordering::Relaxed);
    }

    /// Current interval.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.load(Ordering::Relaxed))
    }

    /// Check if the thread is still running.
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Signal the thread and wait for it to exit.
    pub fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.try_send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::warn!("[poller] thread panicked");
            }
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Poller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller")
            .field("interval", &self.interval())
            .field("running", &self.is_running())
            .finish()
    }
}

fn clamp_ms(interval: Duration) -> u64 {
    let ms = interval.max(MIN_POLL_INTERVAL).as_millis();
    u64::try_from(ms).unwrap_or(u64::MAX)
}
