// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-inrush project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration utilities
//!
//! This module provides utility functions for working with configuration
//! settings, including validation and schema management.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use log::debug;

use super::{Config, TransportKind, CONFIG_SCHEMA};

/// Output the embedded JSON schema to the console.
///
/// This function is called when the `--show-config-schema` flag is provided
/// on the command line.
///
/// ### Example
///
/// ```bash
/// ./rust_inrush --show-config-schema > config_schema.json
/// ```
pub fn output_config_schema() -> Result<()> {
    let schema: serde_json::Value =
        serde_json::from_str(CONFIG_SCHEMA).context("Failed to parse JSON schema")?;

    let formatted_schema =
        serde_json::to_string_pretty(&schema).context("Failed to format JSON schema")?;

    println!("{}", formatted_schema);

    Ok(())
}

/// Validates the configuration against rules the JSON schema cannot express.
///
/// ### Validation Rules
///
/// - **Channel**: must be between 1 and 8
/// - **Timing**: sample period and join timeout must be non zero, the
///   notification coalescing interval cannot be shorter than one sample period
/// - **Transport**: RTU needs a port name, TCP needs a `host:port` address
/// - **Register map**: the unlock register must sit outside the enable block
pub fn validate_specific_rules(config: &Config) -> Result<()> {
    debug!("Performing additional validation checks");

    let acquisition = &config.acquisition;
    acquisition
        .channel()
        .context("Invalid acquisition channel")?;

    if acquisition.sample_period_ms == 0 {
        anyhow::bail!("Sample period must be greater than zero");
    }
    if acquisition.ui_coalesce_ms < acquisition.sample_period_ms {
        anyhow::bail!(
            "Notification interval ({} ms) is shorter than the sample period ({} ms)",
            acquisition.ui_coalesce_ms,
            acquisition.sample_period_ms
        );
    }
    if acquisition.stop_join_timeout_ms == 0 {
        anyhow::bail!("Stop join timeout must be greater than zero");
    }
    if acquisition.spike_threshold_amps < 0 {
        anyhow::bail!("Spike threshold cannot be negative");
    }
    if acquisition.notification_capacity == 0 {
        anyhow::bail!("Notification capacity must be greater than zero");
    }

    let transport = &config.transport;
    match transport.kind {
        TransportKind::Rtu => {
            if transport.port.trim().is_empty() {
                anyhow::bail!("Modbus RTU transport requires a serial port");
            }
            if transport.baud_rate == 0 {
                anyhow::bail!("Baud rate must be greater than zero");
            }
        }
        TransportKind::Tcp => {
            if !is_valid_socket_address(&transport.tcp_address) {
                anyhow::bail!(
                    "Invalid Modbus TCP address '{}', expected host:port",
                    transport.tcp_address
                );
            }
        }
    }

    let device = &config.device;
    if device.enable_registers().contains(&device.unlock_register) {
        anyhow::bail!(
            "Unlock register {} overlaps the channel enable block {:?}",
            device.unlock_register,
            device.enable_registers()
        );
    }

    Ok(())
}

/// Check if a string is a `host:port` pair usable for Modbus TCP
///
/// Accepts literal socket addresses (`192.168.0.10:502`, `[::1]:502`) and
/// `localhost:<port>`.
pub fn is_valid_socket_address(addr: &str) -> bool {
    if addr.parse::<SocketAddr>().is_ok() {
        return true;
    }

    match addr.rsplit_once(':') {
        Some(("localhost", port)) => port.parse::<u16>().is_ok(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_specific_rules(&Config::default()).is_ok());
    }

    #[test]
    fn test_rejects_out_of_range_channel() {
        let mut config = Config::default();
        config.acquisition.channel = 9;
        assert!(validate_specific_rules(&config).is_err());
        config.acquisition.channel = 0;
        assert!(validate_specific_rules(&config).is_err());
    }

    #[test]
    fn test_rejects_unlock_register_inside_enable_block() {
        let mut config = Config::default();
        config.device.unlock_register = 10;
        assert!(validate_specific_rules(&config).is_err());
    }

    #[test]
    fn test_tcp_address_validation() {
        assert!(is_valid_socket_address("127.0.0.1:502"));
        assert!(is_valid_socket_address("[::1]:5020"));
        assert!(is_valid_socket_address("localhost:5020"));
        assert!(!is_valid_socket_address("127.0.0.1"));
        assert!(!is_valid_socket_address("localhost:http"));

        let mut config = Config::default();
        config.transport.kind = TransportKind::Tcp;
        config.transport.tcp_address = "nowhere".to_string();
        assert!(validate_specific_rules(&config).is_err());
    }
}
