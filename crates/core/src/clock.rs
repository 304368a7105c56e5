// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Clock abstraction for testable time handling.
//!
//! The poller, the reconnect backoff, and the supervisor monitor all reason
//! about durations and staleness. Injecting a `Clock` lets tests drive those
//! without real sleeps.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

/// A source of the current time.
pub trait Clock: Clone + Send + Sync + 'static {
    fn now(&self) -> Instant;
    fn system_now(&self) -> SystemTime;
}

/// Real system clock.
#[derive(Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn system_now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Fake clock for deterministic tests: advances only when told to.
#[derive(Clone)]
pub struct FakeClock {
    current: Arc<Mutex<Instant>>,
    system_current: Arc<Mutex<SystemTime>>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            current: Arc::new(Mutex::new(Instant::now())),
            system_current: Arc::new(Mutex::new(SystemTime::now())),
        }
    }

    /// Advances the clock by `duration`.
    pub fn advance(&self, duration: Duration) {
        *self.current.lock() += duration;
        *self.system_current.lock() += duration;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        *self.current.lock()
    }

    fn system_now(&self) -> SystemTime {
        *self.system_current.lock()
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
