// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Supervisor monitor (C10): process-wide component liveness, read by the
//! (external) query surface's `/hhh` handler.
//!
//! Fixed component keys, not derived from a display name — see §9 Open
//! Questions / REDESIGN FLAGS in the spec this crate implements.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use cw_core::Clock;
use parking_lot::Mutex;
use serde::Serialize;

/// Heartbeat key for the measurements persister.
pub const WORKER_PESAGENS: &str = "worker_pesagens";
/// Heartbeat key for the events persister.
pub const WORKER_EVENTOS: &str = "worker_eventos";
/// Heartbeat key for the aggregate poller liveness signal.
pub const MODBUS_COLLECTOR: &str = "modbus_collector";

/// A component whose last heartbeat is older than this is reported `warning`
/// at read time, regardless of its recorded status.
const STALE_AFTER: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Online,
    Offline,
    Error,
    /// Derived at read time only; never stored.
    Warning,
}

#[derive(Debug, Clone)]
struct ComponentEntry {
    status: ComponentStatus,
    last_heartbeat: Instant,
    buffer_usage: usize,
    total_processed: u64,
    error_count: u64,
}

impl ComponentEntry {
    fn new(now: Instant) -> Self {
        Self {
            status: ComponentStatus::Offline,
            last_heartbeat: now,
            buffer_usage: 0,
            total_processed: 0,
            error_count: 0,
        }
    }
}

/// A point-in-time view of one component, ready to serialize for `/hhh`.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentSnapshot {
    pub name: String,
    pub status: ComponentStatus,
    pub buffer_usage: usize,
    pub total_processed: u64,
    pub error_count: u64,
    pub seconds_since_heartbeat: f64,
}

/// Aggregate view returned by `snapshot()`, mirroring the `/hhh` payload shape.
#[derive(Debug, Clone, Serialize)]
pub struct MonitorSnapshot {
    pub ok: bool,
    pub components: Vec<ComponentSnapshot>,
}

pub struct SupervisorMonitor<C: Clock> {
    clock: C,
    entries: Mutex<HashMap<String, ComponentEntry>>,
}

impl<C: Clock> SupervisorMonitor<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Marks `name` online and stamps the current time. `buffer_size`, when
    /// given, replaces the recorded buffer usage; `increment_processed`, when
    /// given, adds to the running total.
    pub fn update_heartbeat(
        &self,
        name: &str,
        buffer_size: Option<usize>,
        increment_processed: Option<u64>,
    ) {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        let entry = entries
            .entry(name.to_string())
            .or_insert_with(|| ComponentEntry::new(now));
        entry.status = ComponentStatus::Online;
        entry.last_heartbeat = now;
        if let Some(size) = buffer_size {
            entry.buffer_usage = size;
        }
        if let Some(increment) = increment_processed {
            entry.total_processed += increment;
        }
    }

    /// Marks `name` as `error` and increments its error count.
    pub fn report_error(&self, name: &str) {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        let entry = entries
            .entry(name.to_string())
            .or_insert_with(|| ComponentEntry::new(now));
        entry.status = ComponentStatus::Error;
        entry.error_count += 1;
    }

    /// Renders every registered component, downgrading a stale heartbeat to
    /// `warning` regardless of its recorded status. `ok` is false if any
    /// component is `error`.
    pub fn snapshot(&self) -> MonitorSnapshot {
        let now = self.clock.now();
        let entries = self.entries.lock();
        let mut components: Vec<ComponentSnapshot> = entries
            .iter()
            .map(|(name, entry)| {
                let age = now.saturating_duration_since(entry.last_heartbeat);
                let status = if age > STALE_AFTER && entry.status != ComponentStatus::Error {
                    ComponentStatus::Warning
                } else {
                    entry.status
                };
                ComponentSnapshot {
                    name: name.clone(),
                    status,
                    buffer_usage: entry.buffer_usage,
                    total_processed: entry.total_processed,
                    error_count: entry.error_count,
                    seconds_since_heartbeat: age.as_secs_f64(),
                }
            })
            .collect();
        components.sort_by(|a, b| a.name.cmp(&b.name));

        let ok = components
            .iter()
            .all(|c| c.status != ComponentStatus::Error);

        MonitorSnapshot { ok, components }
    }
}
