// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-inrush project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration management for the inrush current analyzer
//!
//! This module provides functionality for loading, validating, and applying
//! configuration settings. The configuration is backed by a YAML file and
//! validated against a JSON schema before it is deserialized.
//!
//! ## Configuration Structure
//!
//! The application's configuration is organized as a nested structure with sections:
//! - `transport`: How to reach the field device (Modbus RTU serial line or Modbus TCP)
//! - `acquisition`: Sampling loop, filtering and trend window settings
//! - `device`: Register map of the channel enable block
//! - `export`: Output format for saved runs
//!
//! ## Usage
//!
//! ```no_run
//! use rust_inrush::config::Config;
//!
//! // Load config from file, creates a default if not found
//! let mut config = Config::from_file("config.yaml").unwrap();
//!
//! // Apply command line overrides if needed
//! config.apply_args(
//!     Some("/dev/ttyUSB0".to_string()), // Serial port
//!     Some(57600),                      // Baud rate
//!     Some(3),                          // Unit id
//!     None,                             // Timeout
//!     Some(4),                          // Channel
//!     None,                             // Trend window
//!     None,                             // TCP address
//! );
//!
//! println!("Sampling channel {}", config.acquisition.channel);
//! ```

pub mod acquisition;
pub mod device;
pub mod export;
pub mod transport;
pub mod utils;

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, error};
use serde::{Deserialize, Serialize};

pub use acquisition::{AcquisitionConfig, TrendWindow};
pub use device::DeviceConfig;
pub use export::{ExportConfig, ExportFormat};
pub use transport::{TransportConfig, TransportKind};
pub use utils::{output_config_schema, validate_specific_rules};

/// Embedded JSON schema used to validate configuration files.
pub(crate) const CONFIG_SCHEMA: &str = include_str!("../../resources/config.schema.json");

/// Root configuration structure for the inrush current analyzer.
///
/// # Default Values
///
/// Each section uses default values when not explicitly specified in the configuration
/// file, allowing for minimal configuration when custom settings are not required.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Settings for the link to the field device.
    #[serde(default)]
    pub transport: TransportConfig,

    /// Sampling loop, filter and retention settings.
    #[serde(default)]
    pub acquisition: AcquisitionConfig,

    /// Register layout used to mute and restore channels.
    #[serde(default)]
    pub device: DeviceConfig,

    /// Export settings for saved runs.
    #[serde(default)]
    pub export: ExportConfig,
}

impl Config {
    /// Helper method to create a sample config file when validation fails
    fn create_sample_config<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        let sample_path = path.with_extension("sample.yaml");
        debug!("Original path: {:?}, Sample path: {:?}", path, sample_path);

        if let Some(parent) = sample_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                debug!("Creating parent directory: {:?}", parent);
                fs::create_dir_all(parent).with_context(|| {
                    format!(
                        "Failed to create parent directory for sample config at {:?}",
                        parent
                    )
                })?;
            }
        }

        Self::default()
            .save_to_file(&sample_path)
            .with_context(|| format!("Failed to save sample config to {:?}", sample_path))?;

        error!(
            "Sample configuration file created at {:?}\nPlease edit and rename it",
            sample_path
        );
        Ok(())
    }

    /// Load configuration from a file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(
                "Configuration file not found at {:?}, creating default",
                path
            );
            let default_config = Self::default();
            default_config.save_to_file(path)?;
            return Ok(default_config);
        }

        debug!("Loading configuration from {:?}", path);
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file at {:?}", path))?;

        match Self::from_yaml_str(&contents) {
            Ok(config) => Ok(config),
            Err(err) => {
                error!("Configuration error in {}: {:#}", path.display(), err);
                if let Err(e) = Self::create_sample_config(path) {
                    error!("Failed to create sample config: {}", e);
                }
                Err(err.context(format!("Invalid configuration file {}", path.display())))
            }
        }
    }

    /// Parse and validate a configuration held in memory.
    ///
    /// The YAML document is first checked against the embedded JSON schema, then
    /// deserialized, then checked with [`validate_specific_rules`].
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        let yaml_value: serde_yml::Value =
            serde_yml::from_str(contents).context("Failed to parse YAML configuration")?;

        // The schema validator works on JSON values
        let json_value = serde_json::to_value(&yaml_value)
            .context("Failed to convert YAML to JSON for validation")?;

        let schema: serde_json::Value =
            serde_json::from_str(CONFIG_SCHEMA).context("Failed to parse JSON schema")?;

        let validator = jsonschema::draft202012::options()
            .should_validate_formats(true)
            .build(&schema)
            .context("Failed to build JSON schema validator")?;

        if let Err(error) = validator.validate(&json_value) {
            anyhow::bail!("Configuration validation failed: {}", error);
        }

        debug!("Schema validation passed, deserializing into Config structure");
        let config: Config =
            serde_yml::from_str(contents).context("Failed to deserialize configuration")?;

        validate_specific_rules(&config)?;
        Ok(config)
    }

    /// Save the configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml =
            serde_yml::to_string(self).context("Failed to serialize configuration to YAML")?;

        let mut file = File::create(path.as_ref())
            .with_context(|| format!("Failed to create config file at {:?}", path.as_ref()))?;

        file.write_all(yaml.as_bytes())
            .with_context(|| format!("Failed to write configuration to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Apply command line arguments to override configuration values.
    ///
    /// Only values that are explicitly provided override the loaded configuration.
    ///
    /// # Parameters
    ///
    /// * `port` - Serial port of the RS-485 adapter
    /// * `baud_rate` - Serial line speed
    /// * `unit_id` - Modbus unit (slave) id of the transducer
    /// * `timeout_ms` - Per-request timeout in milliseconds
    /// * `channel` - Channel to sample (1-8)
    /// * `trend_window` - Trend window duration
    /// * `tcp_address` - Switches the transport to Modbus TCP at this address
    #[allow(clippy::too_many_arguments)]
    pub fn apply_args(
        &mut self,
        port: Option<String>,
        baud_rate: Option<u32>,
        unit_id: Option<u8>,
        timeout_ms: Option<u64>,
        channel: Option<u8>,
        trend_window: Option<TrendWindow>,
        tcp_address: Option<String>,
    ) {
        if let Some(port) = port {
            debug!("Overriding serial port from command line: {}", port);
            self.transport.port = port;
        }
        if let Some(baud_rate) = baud_rate {
            debug!("Overriding baud rate from command line: {}", baud_rate);
            self.transport.baud_rate = baud_rate;
        }
        if let Some(unit_id) = unit_id {
            debug!("Overriding unit id from command line: {}", unit_id);
            self.transport.unit_id = unit_id;
        }
        if let Some(timeout_ms) = timeout_ms {
            debug!("Overriding timeout from command line: {} ms", timeout_ms);
            self.transport.timeout_ms = timeout_ms;
        }
        if let Some(address) = tcp_address {
            debug!("Switching to Modbus TCP at {}", address);
            self.transport.kind = TransportKind::Tcp;
            self.transport.tcp_address = address;
        }

        if let Some(channel) = channel {
            debug!("Overriding channel from command line: {}", channel);
            self.acquisition.channel = channel;
        }
        if let Some(window) = trend_window {
            debug!("Overriding trend window from command line: {}", window);
            self.acquisition.trend_window = window;
        }
    }
}
