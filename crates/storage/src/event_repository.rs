// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event repository (`eventos`), the other half of C8.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use cw_core::{StateEvent, StateEventKind};
use serde_json::json;
use sqlx::postgres::types::PgInterval;
use sqlx::{QueryBuilder, Row as _};

use crate::error::{swallow_unique_violation, RepositoryError};
use crate::pool::ConnectionPool;
use crate::row::Row;

#[derive(Debug, Clone, Default)]
pub struct EventFilters {
    pub device_id: Option<String>,
    pub reason: Option<i32>,
    pub date: Option<NaiveDate>,
    /// Wins over `date` when both are present (§4.8).
    pub period: Option<(NaiveDate, NaiveDate)>,
}

pub struct EventRepository {
    pool: Arc<ConnectionPool>,
}

impl EventRepository {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }

    pub async fn initialize(&self) -> Result<(), RepositoryError> {
        let pool = self.pool.get().await?;
        let result = sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS events (
                id BIGSERIAL PRIMARY KEY,
                device_id TEXT NOT NULL,
                event_kind INTEGER NOT NULL,
                reason INTEGER NOT NULL,
                started_at TIMESTAMP NOT NULL,
                ended_at TIMESTAMP,
                duration INTERVAL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
        )
        .execute(pool)
        .await
        .map(|_| ());
        swallow_unique_violation(result)?;

        let result = sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_events_created_at ON events (created_at DESC)",
        )
        .execute(pool)
        .await
        .map(|_| ());
        swallow_unique_violation(result)?;

        Ok(())
    }

    /// Only closed events (those with `ended_at`/`duration` set) are ever
    /// persisted: an open `StateEvent` has nothing final to record yet.
    pub async fn insert_many(&self, batch: &[StateEvent]) -> Result<(), RepositoryError> {
        if batch.is_empty() {
            return Ok(());
        }
        let pool = self.pool.get().await?;

        let mut builder: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(
            "INSERT INTO events (device_id, event_kind, reason, started_at, ended_at, duration) ",
        );
        builder.push_values(batch, |mut row, e| {
            let started_at: DateTime<Utc> = e.started_at.into();
            let ended_at: Option<DateTime<Utc>> = e.ended_at.map(Into::into);
            let duration = e.duration.map(duration_to_pg_interval);
            row.push_bind(e.device_id.as_str().to_string())
                .push_bind(e.event_kind.as_db_code())
                .push_bind(e.reason)
                .push_bind(started_at.naive_utc())
                .push_bind(ended_at.map(|t| t.naive_utc()))
                .push_bind(duration);
        });

        builder.build().execute(pool).await?;
        tracing::info!(count = batch.len(), "events batch stored");
        Ok(())
    }

    pub async fn find(
        &self,
        filters: EventFilters,
        limit: i64,
    ) -> Result<Vec<Row>, RepositoryError> {
        let pool = self.pool.get().await?;

        let mut builder: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(
            "SELECT device_id, event_kind, reason, started_at, ended_at, \
             EXTRACT(EPOCH FROM duration) AS duration_seconds, created_at \
             FROM events WHERE 1=1",
        );

        if let Some((start, stop)) = filters.period {
            builder
                .push(" AND created_at::date BETWEEN ")
                .push_bind(start)
                .push(" AND ")
                .push_bind(stop);
        } else if let Some(day) = filters.date {
            builder.push(" AND created_at::date = ").push_bind(day);
        }

        if let Some(device_id) = filters.device_id {
            builder.push(" AND device_id = ").push_bind(device_id);
        }

        if let Some(reason) = filters.reason {
            builder.push(" AND reason = ").push_bind(reason);
        }

        builder
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(limit);

        let rows = builder.build().fetch_all(pool).await?;
        Ok(rows.into_iter().map(row_to_map).collect())
    }
}

fn duration_to_pg_interval(duration: std::time::Duration) -> PgInterval {
    PgInterval {
        months: 0,
        days: 0,
        microseconds: duration.as_micros() as i64,
    }
}

fn row_to_map(row: sqlx::postgres::PgRow) -> Row {
    let mut map = Row::new();
    map.insert(
        "device_id".to_string(),
        json!(row.try_get::<String, _>("device_id").unwrap_or_default()),
    );
    let kind_code = row.try_get::<i32, _>("event_kind").unwrap_or_default();
    map.insert(
        "event_kind".to_string(),
        json!(if kind_code == StateEventKind::Run.as_db_code() {
            "RUN"
        } else {
            "STOP"
        }),
    );
    map.insert(
        "reason".to_string(),
        json!(row.try_get::<i32, _>("reason").unwrap_or_default()),
    );
    map.insert(
        "started_at".to_string(),
        json!(row
            .try_get::<chrono::NaiveDateTime, _>("started_at")
            .map(|t| t.and_utc().to_rfc3339())
            .unwrap_or_default()),
    );
    map.insert(
        "ended_at".to_string(),
        json!(row
            .try_get::<Option<chrono::NaiveDateTime>, _>("ended_at")
            .ok()
            .flatten()
            .map(|t| t.and_utc().to_rfc3339())),
    );
    map.insert(
        "duration_seconds".to_string(),
        json!(row
            .try_get::<Option<f64>, _>("duration_seconds")
            .ok()
            .flatten()),
    );
    map.insert(
        "created_at".to_string(),
        json!(row
            .try_get::<DateTime<Utc>, _>("created_at")
            .map(|t| t.to_rfc3339())
            .unwrap_or_default()),
    );
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_converts_to_microseconds_only() {
        let interval = duration_to_pg_interval(std::time::Duration::from_secs(90));
        assert_eq!(interval.months, 0);
        assert_eq!(interval.days, 0);
        assert_eq!(interval.microseconds, 90_000_000);
    }
}
