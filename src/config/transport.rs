// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-inrush project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Field device link configuration
//!
//! The transducer is normally reached through an RS-485 adapter speaking
//! Modbus RTU (8 data bits, no parity, 1 stop bit). Modbus TCP is supported
//! for gateways and for the bundled device simulator.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Physical link used to reach the field device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Modbus RTU on a serial port
    #[default]
    Rtu,
    /// Modbus TCP
    Tcp,
}

/// Configuration for the Modbus link to the transducer.
///
/// # Example
///
/// ```
/// use rust_inrush::config::{TransportConfig, TransportKind};
///
/// let transport = TransportConfig {
///     kind: TransportKind::Rtu,
///     port: "/dev/ttyUSB0".to_string(),
///     ..Default::default()
/// };
/// assert_eq!(transport.unit_id, 2);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Link type.
    pub kind: TransportKind,

    /// Serial port name (`COM3`, `/dev/ttyUSB0`), RTU only.
    pub port: String,

    /// Serial line speed, RTU only.
    pub baud_rate: u32,

    /// Modbus unit (slave) id of the transducer.
    pub unit_id: u8,

    /// Timeout applied to every request, in milliseconds.
    pub timeout_ms: u64,

    /// `host:port` of the Modbus TCP endpoint, TCP only.
    pub tcp_address: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            kind: TransportKind::Rtu,
            port: "COM3".to_string(),
            baud_rate: 115_200,
            unit_id: 2,
            timeout_ms: 100,
            tcp_address: "127.0.0.1:5020".to_string(),
        }
    }
}

impl TransportConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl fmt::Display for TransportConfig {
    /// Short description used in status messages and export metadata.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TransportKind::Rtu => write!(
                f,
                "{} @ {}, Unit {}",
                self.port, self.baud_rate, self.unit_id
            ),
            TransportKind::Tcp => write!(f, "tcp://{}, Unit {}", self.tcp_address, self.unit_id),
        }
    }
}
