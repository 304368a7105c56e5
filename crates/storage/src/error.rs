// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy for the storage crate (§7): a pool-acquisition boundary
//! and a repository-query boundary, matching the teacher's per-module
//! `Error` pattern rather than one crate-wide catch-all.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("failed to connect to the database: {0}")]
    Connect(#[source] sqlx::Error),

    #[error("timed out acquiring a connection from the pool")]
    AcquireTimeout,
}

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("operation timed out")]
    Timeout,
}

/// Postgres SQLSTATE for `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";

/// Swallows a unique-violation `sqlx::Error` (a benign race between two
/// processes both creating the same table/index at startup); everything
/// else is propagated.
pub fn swallow_unique_violation(result: Result<(), sqlx::Error>) -> Result<(), RepositoryError> {
    match result {
        Ok(()) => Ok(()),
        Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) => {
            tracing::debug!("schema object already exists (concurrent bootstrap race)");
            Ok(())
        }
        Err(e) => Err(RepositoryError::Database(e)),
    }
}
