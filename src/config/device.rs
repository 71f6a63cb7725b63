// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-inrush project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Field device register map

use serde::{Deserialize, Serialize};

/// Number of analog input channels on the transducer.
pub const CHANNEL_COUNT: usize = 8;

/// Holding registers used to enable and disable channels.
///
/// Channel `n` (1-based) is controlled by holding register
/// `enable_base_register + n - 1`. Writes to that block are only honoured
/// while `unlock_register` holds 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Write-enable register.
    pub unlock_register: u16,

    /// First channel enable register.
    pub enable_base_register: u16,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            unlock_register: 49,
            enable_base_register: 8,
        }
    }
}

impl DeviceConfig {
    /// Holding registers covered by the enable block.
    pub fn enable_registers(&self) -> std::ops::Range<u16> {
        self.enable_base_register..self.enable_base_register + CHANNEL_COUNT as u16
    }
}
