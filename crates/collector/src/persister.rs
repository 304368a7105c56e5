// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Batch persister worker (C7): drains one queue, writes batched inserts
//! through a repository, and flushes the remainder on graceful shutdown.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cw_core::{BoundedQueue, Clock};
use cw_storage::RepositoryError;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::monitor::SupervisorMonitor;

/// Maximum items drained per batch (§4.7).
const MAX_BATCH: usize = 500;
/// Deadline for an in-loop insert.
const INSERT_DEADLINE: Duration = Duration::from_secs(10);
/// Deadline for each flush insert during graceful shutdown.
const FLUSH_DEADLINE: Duration = Duration::from_secs(5);
/// Backoff after a non-cancellation error in the main loop.
const ERROR_SLEEP: Duration = Duration::from_secs(1);
/// Emit a `CRITICAL` log once queue occupancy crosses this fraction of capacity.
const CRITICAL_OCCUPANCY: f64 = 0.8;

/// The repository call the persister drives; implemented once per record
/// kind so the worker loop itself stays generic.
#[async_trait]
pub trait BatchSink: Send + Sync {
    type Item: Send + Sync;

    async fn insert_many(&self, batch: &[Self::Item]) -> Result<(), RepositoryError>;
}

pub struct BatchPersister<S: BatchSink, C: Clock> {
    queue: Arc<BoundedQueue<S::Item>>,
    sink: S,
    monitor: Arc<SupervisorMonitor<C>>,
    component_key: &'static str,
}

impl<S: BatchSink, C: Clock> BatchPersister<S, C> {
    pub fn new(
        queue: Arc<BoundedQueue<S::Item>>,
        sink: S,
        monitor: Arc<SupervisorMonitor<C>>,
        component_key: &'static str,
    ) -> Self {
        Self {
            queue,
            sink,
            monitor,
            component_key,
        }
    }

    /// Runs the drain/insert loop until `cancellation` fires, then flushes
    /// the remaining backlog to completion before returning.
    pub async fn run(self, cancellation: CancellationToken) {
        loop {
            self.monitor
                .update_heartbeat(self.component_key, Some(self.queue.size()), None);

            let batch = tokio::select! {
                _ = cancellation.cancelled() => break,
                batch = self.queue.get_batch(MAX_BATCH) => batch,
            };
            if batch.is_empty() {
                break;
            }

            self.warn_if_near_capacity();

            match timeout(INSERT_DEADLINE, self.sink.insert_many(&batch)).await {
                Ok(Ok(())) => {
                    self.monitor.update_heartbeat(
                        self.component_key,
                        None,
                        Some(batch.len() as u64),
                    );
                }
                Ok(Err(e)) => {
                    tracing::error!(component = self.component_key, error = %e, "batch insert failed");
                    self.monitor.report_error(self.component_key);
                    tokio::time::sleep(ERROR_SLEEP).await;
                }
                Err(_) => {
                    tracing::error!(component = self.component_key, "batch insert timed out");
                    self.monitor.report_error(self.component_key);
                    tokio::time::sleep(ERROR_SLEEP).await;
                }
            }
        }

        self.flush().await;
    }

    fn warn_if_near_capacity(&self) {
        let occupancy = self.queue.size() as f64 / self.queue.capacity() as f64;
        if occupancy > CRITICAL_OCCUPANCY {
            tracing::error!(
                component = self.component_key,
                occupancy,
                "CRITICAL: queue over 80% capacity"
            );
        }
    }

    /// Drains until empty, swallowing per-batch errors — best-effort, since
    /// there is nowhere left to retry once the process is exiting.
    async fn flush(&self) {
        while self.queue.size() > 0 {
            let batch = self.queue.get_batch(MAX_BATCH).await;
            if batch.is_empty() {
                break;
            }
            match timeout(FLUSH_DEADLINE, self.sink.insert_many(&batch)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::error!(component = self.component_key, error = %e, "flush insert failed, dropping batch");
                }
                Err(_) => {
                    tracing::error!(component = self.component_key, "flush insert timed out, dropping batch");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cw_core::FakeClock;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct RecordingSink {
        inserted: Arc<Mutex<Vec<i32>>>,
        calls: Arc<AtomicUsize>,
        fail_first: Arc<std::sync::atomic::AtomicBool>,
    }

    #[async_trait]
    impl BatchSink for RecordingSink {
        type Item = i32;

        async fn insert_many(&self, batch: &[i32]) -> Result<(), RepositoryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_first.swap(false, Ordering::SeqCst) {
                return Err(RepositoryError::Timeout);
            }
            self.inserted.lock().extend_from_slice(batch);
            Ok(())
        }
    }

    #[tokio::test]
    async fn drains_and_inserts_then_flushes_remainder_on_cancellation() {
        let queue = Arc::new(BoundedQueue::<i32>::new(100));
        for i in 0..5 {
            queue.put(i).await;
        }
        let inserted = Arc::new(Mutex::new(Vec::new()));
        let sink = RecordingSink {
            inserted: inserted.clone(),
            calls: Arc::new(AtomicUsize::new(0)),
            fail_first: Arc::new(std::sync::atomic::AtomicBool::new(false)),
        };
        let monitor = Arc::new(SupervisorMonitor::new(FakeClock::new()));
        let persister = BatchPersister::new(queue.clone(), sink, monitor, "worker_test");

        let token = CancellationToken::new();
        let handle = tokio::spawn(persister.run(token.clone()));
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();
        handle.await.unwrap();

        let mut got = inserted.lock().clone();
        got.sort_unstable();
        assert_eq!(got, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn flush_drains_full_backlog_in_batches() {
        let queue = Arc::new(BoundedQueue::<i32>::new(2000));
        for i in 0..1200 {
            queue.put(i).await;
        }
        let inserted = Arc::new(Mutex::new(Vec::new()));
        let sink = RecordingSink {
            inserted: inserted.clone(),
            calls: Arc::new(AtomicUsize::new(0)),
            fail_first: Arc::new(std::sync::atomic::AtomicBool::new(false)),
        };
        let monitor = Arc::new(SupervisorMonitor::new(FakeClock::new()));
        let persister = BatchPersister::new(queue.clone(), sink, monitor, "worker_test");

        let token = CancellationToken::new();
        let handle = tokio::spawn(persister.run(token.clone()));
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();
        handle.await.unwrap();

        assert_eq!(inserted.lock().len(), 1200);
        assert_eq!(queue.size(), 0);
    }

    #[tokio::test]
    async fn an_error_is_reported_to_the_monitor_and_does_not_panic() {
        let queue = Arc::new(BoundedQueue::<i32>::new(10));
        queue.put(1).await;
        let inserted = Arc::new(Mutex::new(Vec::new()));
        let sink = RecordingSink {
            inserted: inserted.clone(),
            calls: Arc::new(AtomicUsize::new(0)),
            fail_first: Arc::new(std::sync::atomic::AtomicBool::new(true)),
        };
        let monitor = Arc::new(SupervisorMonitor::new(FakeClock::new()));
        let persister = BatchPersister::new(queue.clone(), sink, monitor, "worker_test");

        let token = CancellationToken::new();
        let handle = tokio::spawn(persister.run(token.clone()));
        tokio::time::sleep(Duration::from_millis(1100)).await;
        token.cancel();
        handle.await.unwrap();

        let snapshot = monitor.snapshot();
        assert_eq!(snapshot.components[0].error_count, 1);
        assert_eq!(*inserted.lock(), vec![1]);
    }
}
