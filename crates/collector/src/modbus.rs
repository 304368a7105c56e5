// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Modbus session (C3): connect/read/close a single device's TCP session
//! under a mutex so at most one connect attempt is ever in flight.

use std::time::Duration;

use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time;
use tokio_modbus::client::{tcp, Context};
use tokio_modbus::prelude::Reader;

/// Holding-register range read once per poll cycle (§4.3).
pub const START_ADDRESS: u16 = 30720;
pub const REGISTER_COUNT: u16 = 11;

#[derive(Debug, Error)]
pub enum ModbusError {
    #[error("invalid device address: {0}")]
    InvalidAddress(#[from] std::net::AddrParseError),

    #[error("connect or read timed out")]
    Timeout,

    #[error("modbus io error: {0}")]
    Io(#[source] std::io::Error),

    #[error("modbus exception: {0}")]
    Exception(tokio_modbus::ExceptionCode),
}

pub struct ModbusSession {
    ip_address: String,
    port: u16,
    read_timeout: Duration,
    ctx: Mutex<Option<Context>>,
}

impl ModbusSession {
    pub fn new(ip_address: String, port: u16, read_timeout: Duration) -> Self {
        Self {
            ip_address,
            port,
            read_timeout,
            ctx: Mutex::new(None),
        }
    }

    async fn connect(&self) -> Result<Context, ModbusError> {
        let addr = format!("{}:{}", self.ip_address, self.port).parse()?;
        match time::timeout(self.read_timeout, tcp::connect(addr)).await {
            Err(_) => Err(ModbusError::Timeout),
            Ok(Err(e)) => Err(ModbusError::Io(e)),
            Ok(Ok(ctx)) => Ok(ctx),
        }
    }

    /// Ensures the session is connected, then reads the register range, in
    /// the same call. A prior revision of this reader connected on one
    /// cycle and only read on the next; that left the very first cycle
    /// after a reconnect silently yielding nothing.
    pub async fn read_sample(&self) -> Result<Vec<u16>, ModbusError> {
        let mut guard = self.ctx.lock().await;
        if guard.is_none() {
            let fresh = self.connect().await?;
            *guard = Some(fresh);
        }

        let Some(ctx) = guard.as_mut() else {
            return Err(ModbusError::Io(std::io::Error::other(
                "session unexpectedly empty after connect",
            )));
        };

        let outcome = time::timeout(
            self.read_timeout,
            ctx.read_holding_registers(START_ADDRESS, REGISTER_COUNT),
        )
        .await;

        match outcome {
            Err(_) => {
                *guard = None;
                Err(ModbusError::Timeout)
            }
            Ok(Err(e)) => {
                *guard = None;
                Err(ModbusError::Io(e))
            }
            Ok(Ok(Err(exc))) => {
                *guard = None;
                Err(ModbusError::Exception(exc))
            }
            Ok(Ok(Ok(registers))) => Ok(registers),
        }
    }

    /// Drops the connection so the next call re-enters the connect path.
    pub async fn close(&self) {
        let mut guard = self.ctx.lock().await;
        *guard = None;
    }

    pub async fn is_connected(&self) -> bool {
        self.ctx.lock().await.is_some()
    }
}
