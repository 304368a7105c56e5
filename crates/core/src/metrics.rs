// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-device poller metrics (C6).
//!
//! Written only by the owning poller task, so plain fields are enough — no
//! atomics, no locking. Readers (the realtime/health surface, external) are
//! expected to tolerate a torn read of a `Copy` struct snapshot.

use crate::clock::Clock;
use std::time::{Duration, Instant};

/// Counters and latency gauges for one device's poll loop.
#[derive(Debug, Clone)]
pub struct DeviceMetrics {
    pub reads_total: u64,
    pub reads_success: u64,
    pub reads_error: u64,
    pub reads_timeout: u64,
    pub reconnects_total: u64,
    pub last_latency: Duration,
    pub latency: Duration,
    pub connected: bool,
    pub started_at: Instant,
}

impl DeviceMetrics {
    pub fn new(clock: &impl Clock) -> Self {
        Self {
            reads_total: 0,
            reads_success: 0,
            reads_error: 0,
            reads_timeout: 0,
            reconnects_total: 0,
            last_latency: Duration::ZERO,
            latency: Duration::ZERO,
            connected: false,
            started_at: clock.now(),
        }
    }

    pub fn record_read_attempt(&mut self) {
        self.reads_total += 1;
    }

    pub fn record_success(&mut self, latency: Duration) {
        self.reads_success += 1;
        self.connected = true;
        self.latency = latency;
        self.last_latency = latency;
    }

    pub fn record_timeout(&mut self) {
        self.reads_timeout += 1;
        self.connected = false;
    }

    pub fn record_error(&mut self) {
        self.reads_error += 1;
        self.connected = false;
    }

    pub fn record_reconnect_attempt(&mut self) {
        self.reconnects_total += 1;
    }

    /// Seconds since this poller's metrics were created, evaluated at read time.
    pub fn uptime(&self, clock: &impl Clock) -> Duration {
        clock.now().saturating_duration_since(self.started_at)
    }
}
