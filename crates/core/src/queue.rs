// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded FIFO queue between producers (device pollers) and one consumer
//! (a batch persister worker) — C1.
//!
//! Backed by a bounded `tokio::sync::mpsc` channel: `put` gets backpressure
//! for free, and `get_batch`'s "block for the first item, then drain
//! non-blockingly" contract is exactly `recv().await` followed by repeated
//! `try_recv()`. `size()` is tracked with a side counter since callers are
//! told up front that it may be stale.

use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{mpsc, Mutex};

/// Default capacity for the weights and events queues (§4.1).
pub const DEFAULT_CAPACITY: usize = 10_000;

pub struct BoundedQueue<T> {
    sender: mpsc::Sender<T>,
    receiver: Mutex<mpsc::Receiver<T>>,
    size: AtomicUsize,
    capacity: usize,
}

impl<T> BoundedQueue<T> {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        Self {
            sender,
            receiver: Mutex::new(receiver),
            size: AtomicUsize::new(0),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Suspends the caller while the queue is full; returns once accepted.
    /// Never drops an item — the channel itself only ever closes when this
    /// `BoundedQueue` (and its retained `sender`) is dropped.
    pub async fn put(&self, item: T) {
        if self.sender.send(item).await.is_ok() {
            self.size.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Blocks until at least one item is available, then drains up to
    /// `max - 1` further items without blocking. Returns a non-empty FIFO
    /// batch, or an empty one only if the channel is closed (which cannot
    /// happen while this queue holds its own sender).
    pub async fn get_batch(&self, max: usize) -> Vec<T> {
        let max = max.max(1);
        let mut receiver = self.receiver.lock().await;

        let Some(first) = receiver.recv().await else {
            return Vec::new();
        };
        self.size.fetch_sub(1, Ordering::Relaxed);

        let mut batch = Vec::with_capacity(max);
        batch.push(first);

        while batch.len() < max {
            match receiver.try_recv() {
                Ok(item) => {
                    self.size.fetch_sub(1, Ordering::Relaxed);
                    batch.push(item);
                }
                Err(_) => break,
            }
        }

        batch
    }

    /// Current count. Observational only — may be stale the instant it returns.
    pub fn size(&self) -> usize {
        self.size.load(Ordering::Relaxed)
    }
}
