// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `cw-collector`: the concurrent data-acquisition pipeline for networked
//! CheckWeigher devices (C1–C11). The sibling HTTP query surface and process
//! supervisor are external collaborators (§6), not built by this binary.

mod config;
mod decode;
mod modbus;
mod monitor;
mod orchestrator;
mod persister;
mod poller;
mod reconnect;
mod repo_sinks;
mod sinks;

pub use config::AppConfig;

use std::path::PathBuf;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let _log_guard = init_logging();

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(config::DEFAULT_CONFIG_PATH));

    let config = match AppConfig::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, path = %config_path.display(), "fatal configuration error");
            std::process::exit(1);
        }
    };

    let shutdown = CancellationToken::new();
    install_signal_handlers(shutdown.clone());

    if let Err(e) = orchestrator::run(config, shutdown).await {
        tracing::error!(error = %e, "collector exited with error");
        std::process::exit(1);
    }
}

/// Sets up a daily-rolling file appender alongside stderr, level-filtered by
/// `RUST_LOG` (default `info`). The returned guard must be held for the
/// process lifetime — dropping it stops the non-blocking writer.
fn init_logging() -> tracing_appender::non_blocking::WorkerGuard {
    let log_dir = std::env::var("CW_LOG_DIR").unwrap_or_else(|_| "./logs".to_string());
    let file_appender = tracing_appender::rolling::daily(log_dir, "cw-collector.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(non_blocking)
        .with_ansi(false)
        .init();

    guard
}

/// Installs SIGINT/SIGTERM handlers that cancel `shutdown`, triggering the
/// orchestrator's graceful drain (§4.11, §5 Cancellation).
fn install_signal_handlers(shutdown: CancellationToken) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut sigterm = match signal(SignalKind::terminate()) {
                Ok(s) => s,
                Err(e) => {
                    tracing::error!(error = %e, "failed to install SIGTERM handler");
                    return;
                }
            };
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
        }
        tracing::info!("shutdown signal received");
        shutdown.cancel();
    });
}
