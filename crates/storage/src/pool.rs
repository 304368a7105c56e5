// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connection pool (C9): lazily created on first use, shared across both
//! repositories.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tokio::sync::OnceCell;

use crate::error::PoolError;

const MIN_CONNECTIONS: u32 = 5;
const MAX_CONNECTIONS: u32 = 20;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);
/// Closest portable analogue to the original asyncpg pool's
/// `max_queries=1000` connection-recycle policy: sqlx's pool doesn't count
/// queries per connection, so a connection is recycled on a fixed lifetime
/// instead (see DESIGN.md).
const MAX_CONNECTION_LIFETIME: Duration = Duration::from_secs(30 * 60);

pub struct ConnectionPool {
    dsn: String,
    pool: OnceCell<PgPool>,
}

impl ConnectionPool {
    pub fn new(dsn: impl Into<String>) -> Self {
        Self {
            dsn: dsn.into(),
            pool: OnceCell::new(),
        }
    }

    /// Returns the shared pool, creating it on the first call.
    pub async fn get(&self) -> Result<&PgPool, PoolError> {
        self.pool
            .get_or_try_init(|| async {
                PgPoolOptions::new()
                    .min_connections(MIN_CONNECTIONS)
                    .max_connections(MAX_CONNECTIONS)
                    .max_lifetime(Some(MAX_CONNECTION_LIFETIME))
                    .acquire_timeout(ACQUIRE_TIMEOUT)
                    .connect(&self.dsn)
                    .await
                    .map_err(PoolError::Connect)
            })
            .await
    }

    /// Closes the pool if it was ever created. A no-op on an unused pool.
    pub async fn close(&self) {
        if let Some(pool) = self.pool.get() {
            pool.close().await;
        }
    }
}
