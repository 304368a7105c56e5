// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Thin `BatchSink` adapters over the two storage repositories, so
//! `BatchPersister<S, C>` stays generic over record kind.

use std::sync::Arc;

use async_trait::async_trait;
use cw_core::{Measurement, StateEvent};
use cw_storage::{EventRepository, MeasurementRepository, RepositoryError};

use crate::persister::BatchSink;

pub struct MeasurementSink {
    repository: Arc<MeasurementRepository>,
}

impl MeasurementSink {
    pub fn new(repository: Arc<MeasurementRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl BatchSink for MeasurementSink {
    type Item = Measurement;

    async fn insert_many(&self, batch: &[Measurement]) -> Result<(), RepositoryError> {
        self.repository.insert_many(batch).await
    }
}

pub struct EventRepoSink {
    repository: Arc<EventRepository>,
}

impl EventRepoSink {
    pub fn new(repository: Arc<EventRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl BatchSink for EventRepoSink {
    type Item = StateEvent;

    async fn insert_many(&self, batch: &[StateEvent]) -> Result<(), RepositoryError> {
        self.repository.insert_many(batch).await
    }
}
