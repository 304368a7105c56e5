// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Domain types shared across the collector: device identity, configuration,
//! and the two record kinds a poller emits.

use std::fmt;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

/// Opaque configured identifier for a device (`cw_id` in the config file).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceId(pub String);

impl DeviceId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for DeviceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One configured device, as read from `observer.checkweighers[]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub cw_id: DeviceId,
    pub name: String,
    pub ip_address: String,
    pub port: u16,
    #[serde(default = "DeviceConfig::default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub poll_interval: Option<f64>,
    #[serde(default)]
    pub timeout: Option<f64>,
}

impl DeviceConfig {
    fn default_enabled() -> bool {
        true
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs_f64(self.poll_interval.unwrap_or(0.1))
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout.unwrap_or(5.0))
    }
}

/// Macro-state of a device, decoded straight from the `operation_type` register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateEventKind {
    Run,
    Stop,
}

impl StateEventKind {
    pub fn from_operation_type(operation_type: i32) -> Self {
        if operation_type == 1 {
            StateEventKind::Run
        } else {
            StateEventKind::Stop
        }
    }

    pub fn as_db_code(self) -> i32 {
        match self {
            StateEventKind::Run => 1,
            StateEventKind::Stop => 0,
        }
    }
}

/// A single completed weighing transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub device_id: DeviceId,
    pub weight: i32,
    pub operation_type: i32,
    pub classification: i32,
    pub ppm: i32,
    pub reason: i32,
    pub operation_id: u32,
    pub timestamp: SystemTime,
}

/// A RUN/STOP interval, open until the next transition closes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateEvent {
    pub device_id: DeviceId,
    pub event_kind: StateEventKind,
    pub reason: i32,
    pub started_at: SystemTime,
    pub ended_at: Option<SystemTime>,
    pub duration: Option<Duration>,
}

impl StateEvent {
    pub fn open(
        device_id: DeviceId,
        event_kind: StateEventKind,
        reason: i32,
        started_at: SystemTime,
    ) -> Self {
        Self {
            device_id,
            event_kind,
            reason,
            started_at,
            ended_at: None,
            duration: None,
        }
    }

    /// Closes this event at `ended_at`, stamping its final reason and duration.
    ///
    /// `reason` is the reason code of the *incoming* sample that caused the
    /// transition, matching the original's `event_change` (it overwrites the
    /// reason the event was opened with).
    pub fn close(&mut self, ended_at: SystemTime, reason: i32) {
        self.reason = reason;
        let duration = ended_at.duration_since(self.started_at).unwrap_or_default();
        self.ended_at = Some(ended_at);
        self.duration = Some(duration);
    }

    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod tests;
