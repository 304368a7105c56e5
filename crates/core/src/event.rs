// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event dispatcher (C2): a per-device registry mapping an event kind to an
//! ordered list of async sinks.
//!
//! Flattened from the original's duck-typed `EventManager` (`on`/`dispatch`/
//! `has` over arbitrary callables) into a closed `EventKind` enumeration and
//! a `EventSink` trait object, per §9 "Duck-typed callback registry".

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{Measurement, StateEvent};

/// Event kinds the poller can dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    WeightRead,
    EventChanged,
    Run,
    Stop,
    Error,
    TimeoutError,
}

/// The payload carried by a dispatch, already tagged with its kind.
#[derive(Debug, Clone)]
pub enum CollectorEvent {
    WeightRead(Measurement),
    EventChanged(StateEvent),
    Run(StateEvent),
    Stop(StateEvent),
    Error(String),
    TimeoutError(String),
}

impl CollectorEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            CollectorEvent::WeightRead(_) => EventKind::WeightRead,
            CollectorEvent::EventChanged(_) => EventKind::EventChanged,
            CollectorEvent::Run(_) => EventKind::Run,
            CollectorEvent::Stop(_) => EventKind::Stop,
            CollectorEvent::Error(_) => EventKind::Error,
            CollectorEvent::TimeoutError(_) => EventKind::TimeoutError,
        }
    }
}

#[derive(Debug, Error)]
#[error("event sink failed: {0}")]
pub struct SinkError(pub String);

/// A registered handler for one event kind.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn handle(&self, event: CollectorEvent) -> Result<(), SinkError>;
}

/// Maps event kinds to an ordered list of sinks, one registry per device.
#[derive(Default)]
pub struct EventDispatcher {
    sinks: HashMap<EventKind, Vec<Arc<dyn EventSink>>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a sink for `kind`; returns `self` for chaining, mirroring the
    /// original's fluent `.on(...).on(...)` builder.
    pub fn on(mut self, kind: EventKind, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.entry(kind).or_default().push(sink);
        self
    }

    pub fn has(&self, kind: EventKind) -> bool {
        self.sinks.contains_key(&kind)
    }

    /// Awaits every sink registered for this event's kind, in registration
    /// order. A failing sink does not stop the rest from running — the
    /// first error encountered is returned to the caller once all sinks
    /// have been attempted, so a broken logger sink never blocks a queue
    /// sink from receiving the payload.
    pub async fn dispatch(&self, event: CollectorEvent) -> Result<(), SinkError> {
        let Some(sinks) = self.sinks.get(&event.kind()) else {
            return Ok(());
        };

        let mut first_err = None;
        for sink in sinks {
            if let Err(e) = sink.handle(event.clone()).await {
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DeviceId, StateEventKind};
    use parking_lot::Mutex;
    use std::time::SystemTime;

    struct RecordingSink {
        calls: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    #[async_trait]
    impl EventSink for RecordingSink {
        async fn handle(&self, event: CollectorEvent) -> Result<(), SinkError> {
            self.calls.lock().push(format!("{:?}", event.kind()));
            if self.fail {
                return Err(SinkError("boom".into()));
            }
            Ok(())
        }
    }

    fn sample_event() -> CollectorEvent {
        CollectorEvent::EventChanged(StateEvent::open(
            DeviceId::from("cw-1"),
            StateEventKind::Run,
            0,
            SystemTime::now(),
        ))
    }

    #[tokio::test]
    async fn dispatch_runs_sinks_in_registration_order() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let first = Arc::new(RecordingSink { calls: calls.clone(), fail: false });
        let second = Arc::new(RecordingSink { calls: calls.clone(), fail: false });

        let dispatcher = EventDispatcher::new()
            .on(EventKind::EventChanged, first)
            .on(EventKind::EventChanged, second);

        dispatcher.dispatch(sample_event()).await.unwrap();
        assert_eq!(calls.lock().len(), 2);
    }

    #[tokio::test]
    async fn a_failing_sink_does_not_stop_later_sinks() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let failing = Arc::new(RecordingSink { calls: calls.clone(), fail: true });
        let healthy = Arc::new(RecordingSink { calls: calls.clone(), fail: false });

        let dispatcher = EventDispatcher::new()
            .on(EventKind::EventChanged, failing)
            .on(EventKind::EventChanged, healthy);

        let result = dispatcher.dispatch(sample_event()).await;
        assert!(result.is_err());
        assert_eq!(calls.lock().len(), 2, "both sinks should have run");
    }

    #[tokio::test]
    async fn dispatch_to_an_unregistered_kind_is_a_no_op() {
        let dispatcher = EventDispatcher::new();
        assert!(!dispatcher.has(EventKind::Error));
        dispatcher.dispatch(sample_event()).await.unwrap();
    }
}
