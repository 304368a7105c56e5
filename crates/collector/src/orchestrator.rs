// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Orchestrator (C11): builds devices from config, wires sinks to queues,
//! launches pollers and persisters, and drives graceful shutdown.

use std::sync::Arc;

use cw_core::{
    BoundedQueue, DeviceId, EventDispatcher, EventKind, Measurement, StateEvent, SystemClock,
    DEFAULT_CAPACITY,
};
use cw_storage::{ConnectionPool, EventRepository, MeasurementRepository};
use tokio_util::sync::CancellationToken;

use crate::monitor::{SupervisorMonitor, WORKER_EVENTOS, WORKER_PESAGENS};
use crate::persister::BatchPersister;
use crate::poller::{DeviceHandle, DevicePoller, QueueSizes};
use crate::repo_sinks::{EventRepoSink, MeasurementSink};
use crate::sinks::{EventQueueSink, LoggerSink, WeightQueueSink};
use crate::AppConfig;

/// Everything the running collector needs to be told to shut down and
/// awaited to completion. Returned by `run` once shutdown signals fire and
/// every task has drained.
pub struct RunningCollector {
    pub monitor: Arc<SupervisorMonitor<SystemClock>>,
    pub devices: Vec<Arc<DeviceHandle>>,
}

struct SharedQueueSizes {
    weights: Arc<BoundedQueue<Measurement>>,
    events: Arc<BoundedQueue<StateEvent>>,
}

impl QueueSizes for SharedQueueSizes {
    fn weights_queue_size(&self) -> usize {
        self.weights.size()
    }

    fn events_queue_size(&self) -> usize {
        self.events.size()
    }
}

/// Runs the full collector until `shutdown` fires, then drains gracefully
/// and returns. `shutdown` is expected to be cancelled by the caller's
/// SIGINT/SIGTERM handlers (see `main.rs`).
pub async fn run(config: AppConfig, shutdown: CancellationToken) -> Result<(), OrchestratorError> {
    let clock = SystemClock;
    let monitor = Arc::new(SupervisorMonitor::new(clock));

    let pool = Arc::new(ConnectionPool::new(config.global.database_url.clone()));
    let measurement_repo = Arc::new(MeasurementRepository::new(pool.clone()));
    let event_repo = Arc::new(EventRepository::new(pool.clone()));
    measurement_repo.initialize().await?;
    event_repo.initialize().await?;

    let weights_queue = Arc::new(BoundedQueue::new(DEFAULT_CAPACITY));
    let events_queue = Arc::new(BoundedQueue::new(DEFAULT_CAPACITY));
    let queue_sizes: Arc<dyn QueueSizes> = Arc::new(SharedQueueSizes {
        weights: weights_queue.clone(),
        events: events_queue.clone(),
    });

    let poller_token = CancellationToken::new();
    let persister_token = CancellationToken::new();

    let mut device_handles = Vec::new();
    let mut poller_tasks = Vec::new();

    for device in config.enabled_devices() {
        let dispatcher = EventDispatcher::new()
            .on(
                EventKind::WeightRead,
                Arc::new(WeightQueueSink::new(weights_queue.clone())),
            )
            .on(
                EventKind::EventChanged,
                Arc::new(EventQueueSink::new(events_queue.clone())),
            )
            .on(
                EventKind::Error,
                Arc::new(LoggerSink::new(device.cw_id.as_str())),
            );

        let poller = DevicePoller::new(device, dispatcher, monitor.clone(), queue_sizes.clone(), clock);
        device_handles.push(poller.handle());

        let token = poller_token.clone();
        poller_tasks.push(tokio::spawn(poller.run(token)));

        tracing::info!(device_id = %device.cw_id, name = %device.name, "device poller started");
    }

    let measurements_persister = BatchPersister::new(
        weights_queue.clone(),
        MeasurementSink::new(measurement_repo.clone()),
        monitor.clone(),
        WORKER_PESAGENS,
    );
    let events_persister = BatchPersister::new(
        events_queue.clone(),
        EventRepoSink::new(event_repo.clone()),
        monitor.clone(),
        WORKER_EVENTOS,
    );

    let persister_tasks = vec![
        tokio::spawn(measurements_persister.run(persister_token.clone())),
        tokio::spawn(events_persister.run(persister_token.clone())),
    ];

    shutdown.cancelled().await;
    tracing::info!("shutdown signal received, draining pollers");

    poller_token.cancel();
    for task in poller_tasks {
        let _ = task.await;
    }

    tracing::info!("pollers drained, flushing persisters");
    persister_token.cancel();
    for task in persister_tasks {
        let _ = task.await;
    }

    pool.close().await;
    tracing::info!("shutdown complete");

    Ok(())
}

/// Returns the set of device ids this orchestrator would start, without
/// running anything — used by tests that only need the wiring logic.
pub fn device_ids(config: &AppConfig) -> Vec<DeviceId> {
    config.enabled_devices().map(|d| d.cw_id.clone()).collect()
}

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Repository(#[from] cw_storage::RepositoryError),
}
