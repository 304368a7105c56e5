// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Concrete `EventSink` implementations wiring poller events to the two
//! downstream queues and to the logger (§4.11 orchestrator wiring).

use std::sync::Arc;

use async_trait::async_trait;
use cw_core::{BoundedQueue, CollectorEvent, EventSink, Measurement, SinkError, StateEvent};

/// Forwards `WEIGHT_READ` payloads into the measurements queue.
pub struct WeightQueueSink {
    queue: Arc<BoundedQueue<Measurement>>,
}

impl WeightQueueSink {
    pub fn new(queue: Arc<BoundedQueue<Measurement>>) -> Self {
        Self { queue }
    }
}

#[async_trait]
impl EventSink for WeightQueueSink {
    async fn handle(&self, event: CollectorEvent) -> Result<(), SinkError> {
        if let CollectorEvent::WeightRead(measurement) = event {
            self.queue.put(measurement).await;
        }
        Ok(())
    }
}

/// Forwards `EVENT_CHANGED` payloads into the events queue.
pub struct EventQueueSink {
    queue: Arc<BoundedQueue<StateEvent>>,
}

impl EventQueueSink {
    pub fn new(queue: Arc<BoundedQueue<StateEvent>>) -> Self {
        Self { queue }
    }
}

#[async_trait]
impl EventSink for EventQueueSink {
    async fn handle(&self, event: CollectorEvent) -> Result<(), SinkError> {
        if let CollectorEvent::EventChanged(state_event) = event {
            self.queue.put(state_event).await;
        }
        Ok(())
    }
}

/// Routes `ERROR` payloads to the structured logger.
pub struct LoggerSink {
    device_id: String,
}

impl LoggerSink {
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
        }
    }
}

#[async_trait]
impl EventSink for LoggerSink {
    async fn handle(&self, event: CollectorEvent) -> Result<(), SinkError> {
        match event {
            CollectorEvent::Error(message) => {
                tracing::error!(device_id = %self.device_id, %message, "device error");
            }
            CollectorEvent::TimeoutError(message) => {
                tracing::warn!(device_id = %self.device_id, %message, "device timeout");
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cw_core::{DeviceId, StateEventKind};
    use std::time::SystemTime;

    #[tokio::test]
    async fn weight_queue_sink_forwards_only_weight_read() {
        let queue = Arc::new(BoundedQueue::new(10));
        let sink = WeightQueueSink::new(queue.clone());

        sink.handle(CollectorEvent::Error("ignored".into()))
            .await
            .unwrap();
        assert_eq!(queue.size(), 0);

        let measurement = Measurement {
            device_id: DeviceId::from("cw-1"),
            weight: 100,
            operation_type: 1,
            classification: 0,
            ppm: 0,
            reason: 0,
            operation_id: 1,
            timestamp: SystemTime::now(),
        };
        sink.handle(CollectorEvent::WeightRead(measurement))
            .await
            .unwrap();
        assert_eq!(queue.size(), 1);
    }

    #[tokio::test]
    async fn event_queue_sink_forwards_only_event_changed() {
        let queue = Arc::new(BoundedQueue::new(10));
        let sink = EventQueueSink::new(queue.clone());

        let event = StateEvent::open(
            DeviceId::from("cw-1"),
            StateEventKind::Run,
            0,
            SystemTime::now(),
        );
        sink.handle(CollectorEvent::EventChanged(event))
            .await
            .unwrap();
        assert_eq!(queue.size(), 1);
    }

    #[tokio::test]
    async fn logger_sink_never_errors() {
        let sink = LoggerSink::new("cw-1");
        sink.handle(CollectorEvent::Error("boom".into()))
            .await
            .unwrap();
        sink.handle(CollectorEvent::TimeoutError("slow".into()))
            .await
            .unwrap();
    }
}
