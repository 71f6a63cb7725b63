// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-inrush project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus client transport
//!
//! For avoiding confusion with the Modbus master/slave terminology, the
//! analyzer is the client and the transducer is the server. The transducer is
//! normally wired over RS-485 (Modbus RTU, 8N1); Modbus TCP is used with the
//! device simulator or behind a serial gateway.

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info};
use tokio::net::lookup_host;
use tokio_modbus::client::{rtu, tcp, Context};
use tokio_modbus::prelude::*;
use tokio_serial::{DataBits, Parity, SerialStream, StopBits};

use super::{Transport, TransportError};
use crate::config::{TransportConfig, TransportKind};

pub struct ModbusTransport {
    config: TransportConfig,
    context: Option<Context>,
}

impl ModbusTransport {
    pub fn new(config: TransportConfig) -> Self {
        Self {
            config,
            context: None,
        }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    fn timeout(&self) -> Duration {
        self.config.timeout()
    }

    fn context(&mut self) -> Result<&mut Context, TransportError> {
        self.context.as_mut().ok_or(TransportError::NotConnected)
    }
}

#[async_trait]
impl Transport for ModbusTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        if self.context.is_some() {
            return Ok(());
        }
        let context = match self.config.kind {
            TransportKind::Rtu => open_rtu(&self.config)?,
            TransportKind::Tcp => open_tcp(&self.config).await?,
        };
        info!("Opened Modbus link {}", self.config);
        self.context = Some(context);
        Ok(())
    }

    async fn read(&mut self, address: u16, count: u16) -> Result<Vec<u16>, TransportError> {
        let timeout = self.timeout();
        let context = self.context()?;
        let response = with_timeout(timeout, context.read_input_registers(address, count)).await?;
        match response {
            Ok(Ok(values)) => Ok(values),
            Ok(Err(exception)) => Err(TransportError::Exception(format!("{exception:?}"))),
            Err(e) => Err(TransportError::Modbus(e.to_string())),
        }
    }

    async fn write(&mut self, register: u16, value: u16) -> Result<(), TransportError> {
        let timeout = self.timeout();
        let context = self.context()?;
        let response = with_timeout(timeout, context.write_single_register(register, value)).await?;
        match response {
            Ok(Ok(())) => Ok(()),
            Ok(Err(exception)) => Err(TransportError::Exception(format!("{exception:?}"))),
            Err(e) => Err(TransportError::Modbus(e.to_string())),
        }
    }

    async fn disconnect(&mut self) {
        if let Some(mut context) = self.context.take() {
            if let Err(e) = context.disconnect().await {
                debug!("Error while closing Modbus link: {}", e);
            }
            info!("Closed Modbus link {}", self.config);
        }
    }

    fn is_connected(&self) -> bool {
        self.context.is_some()
    }

    fn describe(&self) -> String {
        self.config.to_string()
    }
}

fn open_rtu(config: &TransportConfig) -> Result<Context, TransportError> {
    let builder = tokio_serial::new(&config.port, config.baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .timeout(config.timeout());
    let port = SerialStream::open(&builder)
        .map_err(|e| TransportError::Serial(format!("{}: {}", config.port, e)))?;
    Ok(rtu::attach_slave(port, Slave(config.unit_id)))
}

async fn open_tcp(config: &TransportConfig) -> Result<Context, TransportError> {
    let address = resolve(&config.tcp_address).await?;
    let context = with_timeout(
        config.timeout(),
        tcp::connect_slave(address, Slave(config.unit_id)),
    )
    .await??;
    Ok(context)
}

async fn with_timeout<F: Future>(timeout: Duration, future: F) -> Result<F::Output, TransportError> {
    tokio::time::timeout(timeout, future)
        .await
        .map_err(|_| TransportError::Timeout(timeout))
}

async fn resolve(address: &str) -> Result<SocketAddr, TransportError> {
    if let Ok(address) = address.parse::<SocketAddr>() {
        return Ok(address);
    }
    lookup_host(address)
        .await
        .ok()
        .and_then(|mut addresses| addresses.next())
        .ok_or_else(|| TransportError::InvalidAddress(address.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_requests_fail_when_not_connected() {
        let mut transport = ModbusTransport::new(TransportConfig::default());
        assert!(!transport.is_connected());
        assert!(matches!(
            transport.read(0, 1).await,
            Err(TransportError::NotConnected)
        ));
        assert!(matches!(
            transport.write(49, 1).await,
            Err(TransportError::NotConnected)
        ));
        // Disconnecting an idle link is a no-op
        transport.disconnect().await;
    }

    #[tokio::test]
    async fn test_resolve_rejects_garbage() {
        assert!(resolve("127.0.0.1:5020").await.is_ok());
        assert!(matches!(
            resolve("not an address").await,
            Err(TransportError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_describe_uses_config() {
        let transport = ModbusTransport::new(TransportConfig::default());
        assert_eq!(transport.describe(), "COM3 @ 115200, Unit 2");
    }

    #[tokio::test]
    async fn test_connect_runs_on_spawned_task() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap();
        drop(listener);

        let config = TransportConfig {
            kind: TransportKind::Tcp,
            tcp_address: address.to_string(),
            timeout_ms: 500,
            ..Default::default()
        };
        let handle = tokio::spawn(async move {
            let mut transport = ModbusTransport::new(config);
            let result = transport.connect().await;
            (transport.is_connected(), result.is_err())
        });
        assert_eq!(handle.await.unwrap(), (false, true));
    }

    #[test]
    fn test_open_rtu_reports_missing_port() {
        let config = TransportConfig {
            port: "/dev/no-such-serial-port".to_string(),
            ..Default::default()
        };
        assert!(matches!(open_rtu(&config), Err(TransportError::Serial(_))));
    }
}
