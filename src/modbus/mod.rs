// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-inrush project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus device simulation
//!
//! This module provides a Modbus TCP server reproducing the register map of
//! the 8-channel 4-20 mA transducer, so the analyzer can be exercised without
//! hardware.
//!
//! ## Key Components
//!
//! - `SimulatedTransducer`: register image and Modbus service
//! - `InrushProfile`: start-up current shape used to animate a channel
//!
//! ## Usage
//!
//! ```no_run
//! use rust_inrush::acquisition::Channel;
//! use rust_inrush::config::DeviceConfig;
//! use rust_inrush::modbus::{InrushProfile, SimulatedTransducer};
//! use std::time::Duration;
//!
//! # async fn run() -> std::io::Result<()> {
//! let transducer = SimulatedTransducer::new(DeviceConfig::default());
//! let (address, _server) = transducer.spawn_tcp("127.0.0.1:5020".parse().unwrap()).await?;
//! transducer.spawn_profile(Channel::clamped(1), InrushProfile::default(), Duration::from_millis(5));
//! println!("listening on {address}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Register Map
//!
//! ### Input Registers (Read-Only)
//!
//! - Registers 0-7: raw code of channels 1-8 (0.000610 mA per unit),
//!   `0x0000` while the channel is disabled
//!
//! ### Holding Registers (Read/Write)
//!
//! - Registers 8-15: enable flag of channels 1-8 (0 or 1), default: 1
//! - Register 49: configuration unlock (0 or 1), default: 0. Writes to the
//!   enable registers are rejected with `IllegalDataValue` while it holds 0.

pub mod modbus_server;
pub use modbus_server::{InrushProfile, SimulatedTransducer, DISABLED_CHANNEL_CODE};
