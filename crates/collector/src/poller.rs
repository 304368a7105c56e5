// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Device poller & state machine (C4): the per-device task that reads a
//! Modbus sample every cycle, decodes it, and detects transaction/operation
//! transitions.
//!
//! The original's `Disconnected` → `Connected` → `Decoding` states collapse
//! here into a single `read_sample` call per cycle (see the REDESIGN FLAG on
//! `ModbusSession::read_sample` in `modbus.rs`): ensure-connected and read
//! happen together, so there is no separate connect phase to model as async
//! state. `Backoff` remains a real sleep between failed cycles.

use std::sync::Arc;
use std::time::Duration;

use cw_core::{
    Clock, CollectorEvent, DeviceConfig, DeviceId, EventDispatcher, Measurement, StateEvent,
    StateEventKind,
};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::decode::decode;
use crate::modbus::ModbusSession;
use crate::monitor::{SupervisorMonitor, MODBUS_COLLECTOR};
use crate::reconnect::Backoff;
use cw_core::DeviceMetrics;

/// Shared, externally-readable view of one poller's live state — the
/// realtime/health surface (external) reads these fields; the owning poller
/// task is the sole writer.
pub struct DeviceHandle {
    pub device_id: DeviceId,
    pub latest_snapshot: Arc<Mutex<Option<Measurement>>>,
    pub metrics: Arc<Mutex<DeviceMetrics>>,
}

impl DeviceHandle {
    fn new(device_id: DeviceId, metrics: DeviceMetrics) -> Self {
        Self {
            device_id,
            latest_snapshot: Arc::new(Mutex::new(None)),
            metrics: Arc::new(Mutex::new(metrics)),
        }
    }
}

/// Reports the current size of the two downstream queues, so the poller can
/// forward them in its heartbeat without owning the queues itself.
pub trait QueueSizes: Send + Sync {
    fn weights_queue_size(&self) -> usize;
    fn events_queue_size(&self) -> usize;
}

pub struct DevicePoller<C: Clock> {
    device_id: DeviceId,
    poll_interval: Duration,
    session: ModbusSession,
    backoff: Backoff,
    dispatcher: EventDispatcher,
    monitor: Arc<SupervisorMonitor<C>>,
    queue_sizes: Arc<dyn QueueSizes>,
    clock: C,
    handle: Arc<DeviceHandle>,
    last_operation_id: u32,
    last_operation_type: i32,
    open_event: Option<StateEvent>,
}

impl<C: Clock> DevicePoller<C> {
    pub fn new(
        config: &DeviceConfig,
        dispatcher: EventDispatcher,
        monitor: Arc<SupervisorMonitor<C>>,
        queue_sizes: Arc<dyn QueueSizes>,
        clock: C,
    ) -> Self {
        let metrics = DeviceMetrics::new(&clock);
        let handle = Arc::new(DeviceHandle::new(config.cw_id.clone(), metrics));
        Self {
            device_id: config.cw_id.clone(),
            poll_interval: config.poll_interval(),
            session: ModbusSession::new(
                config.ip_address.clone(),
                config.port,
                config.read_timeout(),
            ),
            backoff: Backoff::default(),
            dispatcher,
            monitor,
            queue_sizes,
            clock,
            handle,
            last_operation_id: 0,
            last_operation_type: 0,
            open_event: None,
        }
    }

    pub fn handle(&self) -> Arc<DeviceHandle> {
        self.handle.clone()
    }

    /// Runs the poll loop until `cancellation` fires. Exits without
    /// attempting further I/O once cancelled; never returns an error — all
    /// failure modes are handled locally per §7.
    pub async fn run(mut self, cancellation: CancellationToken) {
        loop {
            if cancellation.is_cancelled() {
                return;
            }

            match self.cycle().await {
                CycleOutcome::Continue => {
                    tokio::select! {
                        _ = cancellation.cancelled() => return,
                        _ = tokio::time::sleep(self.poll_interval) => {}
                    }
                }
                CycleOutcome::Backoff => {
                    let delay = self.backoff.next_delay();
                    tokio::select! {
                        _ = cancellation.cancelled() => return,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    async fn cycle(&mut self) -> CycleOutcome {
        let started = self.clock.now();
        let result = self.session.read_sample().await;
        let latency = self.clock.now().saturating_duration_since(started);

        {
            let mut metrics = self.handle.metrics.lock();
            metrics.record_read_attempt();
        }

        let registers = match result {
            Ok(registers) => registers,
            Err(e) => {
                self.session.close().await;
                let mut metrics = self.handle.metrics.lock();
                if matches!(e, crate::modbus::ModbusError::Timeout) {
                    metrics.record_timeout();
                } else {
                    metrics.record_error();
                }
                metrics.record_reconnect_attempt();
                return CycleOutcome::Backoff;
            }
        };

        let outcome = match decode(&registers) {
            Ok(sample) => {
                self.handle.metrics.lock().record_success(latency);
                self.handle_sample(sample).await;
                CycleOutcome::Continue
            }
            Err(e) => {
                let _ = self
                    .dispatcher
                    .dispatch(CollectorEvent::Error(e.to_string()))
                    .await;
                self.session.close().await;
                self.handle.metrics.lock().record_error();
                CycleOutcome::Backoff
            }
        };

        self.backoff.reset();
        self.monitor.update_heartbeat(
            MODBUS_COLLECTOR,
            Some(self.queue_sizes.weights_queue_size() + self.queue_sizes.events_queue_size()),
            None,
        );
        outcome
    }

    /// Implements the invariants in the spec's data-model section:
    /// a Measurement is emitted only on a transaction boundary with
    /// `operation_type == RUN`; an `EVENT_CHANGED` fires only when the
    /// boundary also changes `operation_type`.
    async fn handle_sample(&mut self, sample: crate::decode::RawSample) {
        let now = self.clock.system_now();

        let measurement = Measurement {
            device_id: self.device_id.clone(),
            weight: sample.weight,
            operation_type: sample.operation_type,
            classification: sample.classification,
            ppm: sample.ppm,
            reason: sample.reason,
            operation_id: sample.operation_id,
            timestamp: now,
        };
        *self.handle.latest_snapshot.lock() = Some(measurement.clone());

        if sample.operation_id == self.last_operation_id {
            return;
        }

        if sample.operation_type == 1 {
            let _ = self
                .dispatcher
                .dispatch(CollectorEvent::WeightRead(measurement))
                .await;
        }

        if sample.operation_type != self.last_operation_type {
            if let Some(mut closing) = self.open_event.take() {
                closing.close(now, sample.reason);
                let _ = self
                    .dispatcher
                    .dispatch(CollectorEvent::EventChanged(closing))
                    .await;
            }
            let kind = StateEventKind::from_operation_type(sample.operation_type);
            self.open_event = Some(StateEvent::open(
                self.device_id.clone(),
                kind,
                sample.reason,
                now,
            ));
        }

        self.last_operation_id = sample.operation_id;
        self.last_operation_type = sample.operation_type;
    }
}

enum CycleOutcome {
    Continue,
    Backoff,
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cw_core::{EventKind, EventSink, SinkError};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NullQueueSizes;
    impl QueueSizes for NullQueueSizes {
        fn weights_queue_size(&self) -> usize {
            0
        }
        fn events_queue_size(&self) -> usize {
            0
        }
    }

    struct RecordingSink {
        weight_reads: Arc<AtomicUsize>,
        event_changes: Arc<Mutex<Vec<StateEvent>>>,
    }

    #[async_trait]
    impl EventSink for RecordingSink {
        async fn handle(&self, event: CollectorEvent) -> Result<(), SinkError> {
            match event {
                CollectorEvent::WeightRead(_) => {
                    self.weight_reads.fetch_add(1, Ordering::SeqCst);
                }
                CollectorEvent::EventChanged(e) => {
                    self.event_changes.lock().push(e);
                }
                _ => {}
            }
            Ok(())
        }
    }

    fn test_poller(
        weight_reads: Arc<AtomicUsize>,
        event_changes: Arc<Mutex<Vec<StateEvent>>>,
        clock: cw_core::FakeClock,
    ) -> DevicePoller<cw_core::FakeClock> {
        let config = DeviceConfig {
            cw_id: DeviceId::from("cw-1"),
            name: "Line 1".into(),
            ip_address: "127.0.0.1".into(),
            port: 1,
            enabled: true,
            poll_interval: Some(0.1),
            timeout: Some(0.05),
        };
        let sink = Arc::new(RecordingSink {
            weight_reads,
            event_changes,
        });
        let dispatcher = EventDispatcher::new()
            .on(EventKind::WeightRead, sink.clone())
            .on(EventKind::EventChanged, sink);
        let monitor = Arc::new(SupervisorMonitor::new(clock.clone()));
        DevicePoller::new(&config, dispatcher, monitor, Arc::new(NullQueueSizes), clock)
    }

    #[tokio::test]
    async fn first_sample_with_zero_operation_id_skips_synthetic_transition() {
        let weight_reads = Arc::new(AtomicUsize::new(0));
        let event_changes = Arc::new(Mutex::new(Vec::new()));
        let clock = cw_core::FakeClock::new();
        let mut poller = test_poller(weight_reads.clone(), event_changes.clone(), clock);

        let sample = decode(&vec![0u16; 11]).unwrap();
        poller.handle_sample(sample).await;

        assert_eq!(weight_reads.load(Ordering::SeqCst), 0);
        assert!(event_changes.lock().is_empty());
        // operation_id == last_operation_id (both 0): the sample is a no-op
        // duplicate per the tie-break rule, so no event is ever opened.
        assert!(poller.open_event.is_none());
    }

    #[tokio::test]
    async fn run_sample_emits_weight_read_and_opens_event() {
        let weight_reads = Arc::new(AtomicUsize::new(0));
        let event_changes = Arc::new(Mutex::new(Vec::new()));
        let clock = cw_core::FakeClock::new();
        let mut poller = test_poller(weight_reads.clone(), event_changes.clone(), clock);

        let mut regs = vec![0u16; 11];
        regs[0] = 1; // RUN
        regs[10] = 1; // operation_id
        let sample = decode(&regs).unwrap();
        poller.handle_sample(sample).await;

        assert_eq!(weight_reads.load(Ordering::SeqCst), 1);
        // a fresh poller has no open_event to close, so the transition only
        // opens RUN — there is no synthetic initial event to close.
        assert_eq!(event_changes.lock().len(), 0);
        assert!(poller.open_event.as_ref().unwrap().is_open());
        assert_eq!(
            poller.open_event.as_ref().unwrap().event_kind,
            StateEventKind::Run
        );
    }

    #[tokio::test]
    async fn duplicate_operation_id_suppresses_second_emission() {
        let weight_reads = Arc::new(AtomicUsize::new(0));
        let event_changes = Arc::new(Mutex::new(Vec::new()));
        let clock = cw_core::FakeClock::new();
        let mut poller = test_poller(weight_reads.clone(), event_changes.clone(), clock);

        let mut regs = vec![0u16; 11];
        regs[0] = 1;
        regs[10] = 5;
        let sample = decode(&regs).unwrap();
        poller.handle_sample(sample).await;
        poller.handle_sample(sample).await;

        assert_eq!(weight_reads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn run_to_stop_transition_closes_and_reopens_with_no_weight_read() {
        let weight_reads = Arc::new(AtomicUsize::new(0));
        let event_changes = Arc::new(Mutex::new(Vec::new()));
        let clock = cw_core::FakeClock::new();
        let mut poller = test_poller(weight_reads.clone(), event_changes.clone(), clock);

        let mut regs = vec![0u16; 11];
        regs[0] = 1;
        regs[10] = 1;
        poller.handle_sample(decode(&regs).unwrap()).await;

        clock_advance(&mut poller, Duration::from_secs(30));

        let mut stop_regs = vec![0u16; 11];
        stop_regs[0] = 0;
        stop_regs[7] = 7;
        stop_regs[10] = 2;
        weight_reads.store(0, Ordering::SeqCst);
        poller.handle_sample(decode(&stop_regs).unwrap()).await;

        assert_eq!(weight_reads.load(Ordering::SeqCst), 0);
        // the first (RUN) sample had no prior open_event to close, so only
        // this transition's close is dispatched.
        assert_eq!(event_changes.lock().len(), 1);
        let closed = &event_changes.lock()[0];
        assert_eq!(closed.event_kind, StateEventKind::Run);
        assert_eq!(closed.reason, 7);
        assert_eq!(closed.duration, Some(Duration::from_secs(30)));
        assert_eq!(
            poller.open_event.as_ref().unwrap().event_kind,
            StateEventKind::Stop
        );
    }

    fn clock_advance(poller: &mut DevicePoller<cw_core::FakeClock>, d: Duration) {
        poller.clock.advance(d);
    }
}
