// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! cw-core: shared domain types for the checkweigher collector.
//!
//! Everything here is pure — no I/O, no tokio tasks. `collector` and
//! `storage` depend on these types but never the other way around.

pub mod clock;
pub mod date;
pub mod event;
pub mod metrics;
pub mod queue;
pub mod types;

pub use clock::{Clock, FakeClock, SystemClock};
pub use date::range_date;
pub use event::{CollectorEvent, EventDispatcher, EventKind, EventSink, SinkError};
pub use metrics::DeviceMetrics;
pub use queue::{BoundedQueue, DEFAULT_CAPACITY};
pub use types::{DeviceConfig, DeviceId, Measurement, StateEvent, StateEventKind};
