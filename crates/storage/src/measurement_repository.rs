// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Measurement repository (`pesagens`), one half of C8.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use cw_core::Measurement;
use serde_json::json;
use sqlx::{QueryBuilder, Row as _};

use crate::error::{swallow_unique_violation, RepositoryError};
use crate::pool::ConnectionPool;
use crate::row::Row;

/// Deadline the batch persister worker invokes `insert_many` under (§4.7).
pub const INSERT_DEADLINE: Duration = Duration::from_secs(10);
/// Deadline used during graceful-shutdown flush (§4.7).
pub const FLUSH_DEADLINE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Default)]
pub struct MeasurementFilters {
    pub device_id: Option<String>,
    pub date: Option<NaiveDate>,
    /// Wins over `date` when both are present (§4.8).
    pub period: Option<(NaiveDate, NaiveDate)>,
    pub classification: Option<i32>,
}

pub struct MeasurementRepository {
    pool: Arc<ConnectionPool>,
}

impl MeasurementRepository {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }

    /// Creates the `measurements` table and its descending timestamp index
    /// if absent. Idempotent across restarts; concurrent creation races are
    /// swallowed as benign unique-violations.
    pub async fn initialize(&self) -> Result<(), RepositoryError> {
        let pool = self.pool.get().await?;
        let result = sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS measurements (
                id BIGSERIAL PRIMARY KEY,
                device_id TEXT NOT NULL,
                weight INTEGER NOT NULL,
                classification INTEGER NOT NULL DEFAULT 0,
                timestamp TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
        )
        .execute(pool)
        .await
        .map(|_| ());
        swallow_unique_violation(result)?;

        let result = sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_measurements_timestamp ON measurements (timestamp DESC)",
        )
        .execute(pool)
        .await
        .map(|_| ());
        swallow_unique_violation(result)?;

        Ok(())
    }

    /// Emits a single multi-row insert. Empty batch is a no-op.
    pub async fn insert_many(&self, batch: &[Measurement]) -> Result<(), RepositoryError> {
        if batch.is_empty() {
            return Ok(());
        }
        let pool = self.pool.get().await?;

        let mut builder: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new("INSERT INTO measurements (device_id, weight, classification, timestamp) ");
        builder.push_values(batch, |mut row, m| {
            let timestamp: DateTime<Utc> = m.timestamp.into();
            row.push_bind(m.device_id.as_str().to_string())
                .push_bind(m.weight)
                .push_bind(m.classification)
                .push_bind(timestamp);
        });

        builder.build().execute(pool).await?;
        tracing::info!(count = batch.len(), "measurements batch stored");
        Ok(())
    }

    /// Dynamic WHERE assembly over the filters above. Ordering:
    /// `timestamp DESC`. Always prefixes `AND` (the original's filter
    /// assembly omitted it before the period branch — see DESIGN.md).
    pub async fn find(
        &self,
        filters: MeasurementFilters,
        limit: i64,
    ) -> Result<Vec<Row>, RepositoryError> {
        let pool = self.pool.get().await?;

        let mut builder: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(
            "SELECT device_id, weight, classification, timestamp FROM measurements WHERE 1=1",
        );

        if let Some((start, stop)) = filters.period {
            builder
                .push(" AND timestamp::date BETWEEN ")
                .push_bind(start)
                .push(" AND ")
                .push_bind(stop);
        } else if let Some(day) = filters.date {
            builder.push(" AND timestamp::date = ").push_bind(day);
        }

        if let Some(device_id) = filters.device_id {
            builder.push(" AND device_id = ").push_bind(device_id);
        }

        if let Some(classification) = filters.classification {
            builder.push(" AND classification = ").push_bind(classification);
        }

        builder
            .push(" ORDER BY timestamp DESC LIMIT ")
            .push_bind(limit);

        let rows = builder.build().fetch_all(pool).await?;
        Ok(rows.into_iter().map(row_to_map).collect())
    }
}

fn row_to_map(row: sqlx::postgres::PgRow) -> Row {
    let mut map = Row::new();
    map.insert(
        "device_id".to_string(),
        json!(row.try_get::<String, _>("device_id").unwrap_or_default()),
    );
    map.insert(
        "weight".to_string(),
        json!(row.try_get::<i32, _>("weight").unwrap_or_default()),
    );
    map.insert(
        "classification".to_string(),
        json!(row.try_get::<i32, _>("classification").unwrap_or_default()),
    );
    map.insert(
        "timestamp".to_string(),
        json!(row
            .try_get::<DateTime<Utc>, _>("timestamp")
            .map(|t| t.to_rfc3339())
            .unwrap_or_default()),
    );
    map
}
