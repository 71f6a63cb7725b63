// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-inrush project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Channel enable sequence
//!
//! During a run only the selected channel is left enabled so the transducer
//! spends its conversion time on it. The enable block is write protected:
//!
//! ```text
//! unlock = 1
//! enable[1..=8] = 0
//! enable[selected] = 1
//! unlock = 0            always attempted, even after a failed write
//! ```
//!
//! Restoring writes 1 to every enable register with the same unlock framing.

use log::{debug, warn};

use super::{Transport, TransportError};
use crate::acquisition::Channel;
use crate::config::DeviceConfig;

#[derive(Debug, Clone, Default)]
pub struct ChannelControl {
    device: DeviceConfig,
    muted: bool,
}

impl ChannelControl {
    pub fn new(device: DeviceConfig) -> Self {
        Self {
            device,
            muted: false,
        }
    }

    /// Whether other channels are currently disabled by [`Self::mute_others`].
    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Treat the device as muted, so the next [`Self::restore_all`] writes
    /// the enables even though this instance never muted it.
    pub fn assume_muted(&mut self) {
        self.muted = true;
    }

    pub fn enable_register(&self, channel: Channel) -> u16 {
        self.device.enable_base_register + channel.address()
    }

    /// Disable every channel except `selected`.
    ///
    /// Returns the first write error. The device is considered muted as soon
    /// as the sequence was attempted, so a later [`Self::restore_all`] always
    /// runs.
    pub async fn mute_others(
        &mut self,
        transport: &mut dyn Transport,
        selected: Channel,
    ) -> Result<(), TransportError> {
        if !transport.is_connected() {
            return Err(TransportError::NotConnected);
        }
        let mut writes = Vec::with_capacity(Channel::all().count() + 1);
        writes.extend(Channel::all().map(|c| (self.enable_register(c), 0)));
        writes.push((self.enable_register(selected), 1));

        self.muted = true;
        let result = self.unlocked_writes(transport, &writes).await;
        debug!("Muted all channels except {}", selected);
        result
    }

    /// Re-enable every channel if they were muted. No-op otherwise.
    pub async fn restore_all(&mut self, transport: &mut dyn Transport) -> Result<(), TransportError> {
        if !self.muted {
            return Ok(());
        }
        if !transport.is_connected() {
            return Err(TransportError::NotConnected);
        }
        self.muted = false;
        let writes: Vec<(u16, u16)> = Channel::all()
            .map(|c| (self.enable_register(c), 1))
            .collect();
        let result = self.unlocked_writes(transport, &writes).await;
        debug!("Restored all channels");
        result
    }

    async fn unlocked_writes(
        &self,
        transport: &mut dyn Transport,
        writes: &[(u16, u16)],
    ) -> Result<(), TransportError> {
        let unlock = self.device.unlock_register;
        let mut first_error = transport.write(unlock, 1).await.err();

        for &(register, value) in writes {
            if let Err(e) = transport.write(register, value).await {
                warn!("Write of {} to register {} failed: {}", value, register, e);
                first_error.get_or_insert(e);
            }
        }

        if let Err(e) = transport.write(unlock, 0).await {
            warn!("Failed to re-lock channel configuration: {}", e);
            first_error.get_or_insert(e);
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
