// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-inrush project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Field device transports
//!
//! This module provides the register-level link to the transducer:
//! - [`ModbusTransport`]: Modbus RTU over a serial port, or Modbus TCP
//! - [`MockTransport`]: scripted transport for tests and development
//! - [`ChannelControl`]: channel enable sequence built on any transport
//!
//! A transport has two users that never overlap: the control side during
//! connect, handshake and channel configuration, and the sampling task during
//! a run. Ownership moves between them, so no locking is done here.

pub mod channel_control;
pub mod mock;
pub mod modbus;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{TransportConfig, TransportKind};

pub use channel_control::ChannelControl;
pub use mock::{MockHandle, MockTransport};
pub use modbus::ModbusTransport;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Transport is not connected")]
    NotConnected,

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serial port error: {0}")]
    Serial(String),

    #[error("Invalid device address '{0}'")]
    InvalidAddress(String),

    #[error("Modbus protocol error: {0}")]
    Modbus(String),

    #[error("Device answered with exception {0}")]
    Exception(String),

    #[error("Device returned no registers")]
    EmptyResponse,
}

/// Register access to the field device.
#[async_trait]
pub trait Transport: Send {
    /// Open the link.
    async fn connect(&mut self) -> Result<(), TransportError>;

    /// Read `count` input registers starting at `address`.
    async fn read(&mut self, address: u16, count: u16) -> Result<Vec<u16>, TransportError>;

    /// Write one holding register.
    async fn write(&mut self, register: u16, value: u16) -> Result<(), TransportError>;

    /// Close the link. Never fails; a broken link is simply dropped.
    async fn disconnect(&mut self);

    fn is_connected(&self) -> bool;

    /// Short description for status messages (`COM3 @ 115200, Unit 2`).
    fn describe(&self) -> String;
}

/// Read a single register, the common case for the sampling loop.
pub async fn read_one(
    transport: &mut dyn Transport,
    address: u16,
) -> Result<u16, TransportError> {
    transport
        .read(address, 1)
        .await?
        .first()
        .copied()
        .ok_or(TransportError::EmptyResponse)
}

/// Create the transport described by the configuration.
pub fn create_transport(config: &TransportConfig) -> Box<dyn Transport> {
    match config.kind {
        TransportKind::Rtu | TransportKind::Tcp => Box::new(ModbusTransport::new(config.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_one_takes_first_register() {
        let mut transport = MockTransport::with_codes([Some(1234), None]);
        transport.connect().await.unwrap();
        assert_eq!(read_one(&mut transport, 0).await.unwrap(), 1234);
        assert!(read_one(&mut transport, 0).await.is_err());
    }
}
