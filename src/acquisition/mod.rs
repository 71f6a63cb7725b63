// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-inrush project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Current acquisition module
//!
//! This module turns raw transducer codes polled from the field device into
//! calibrated integer-ampere readings and drives the periodic sampling loop.
//!
//! ## Pipeline
//!
//! ```text
//! Transport -> converter -> spike_filter -> warmup -> (retention stores, notifications)
//! ```
//!
//! - [`converter`]: raw 16-bit code to amperes, with sentinel and band rejection
//! - [`spike_filter`]: rejects jumps larger than a threshold from the last accepted value
//! - [`warmup`]: discards the first readings of a run
//! - [`pipeline`]: the three stages above chained for one tick
//! - [`sampler`]: the fixed-period loop running in its own task
//! - [`session`]: control side (connect, start, stop, clear, export)

pub mod converter;
pub mod notification;
pub mod pipeline;
pub mod sampler;
pub mod session;
pub mod spike_filter;
pub mod warmup;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::device::CHANNEL_COUNT;

pub use converter::{amps_to_code, convert, milliamps_to_amps};
pub use notification::{notification_channel, Notification, Notifier};
pub use pipeline::ReadingPipeline;
pub use sampler::{RunStats, Sampler, SamplerCommand, SamplerOutput, SamplerSettings};
pub use session::{format_elapsed, AcquisitionSession, SessionError, StopOutcome};
pub use spike_filter::SpikeFilter;
pub use warmup::WarmupGate;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    #[error("Channel {0} is out of range (1-{max})", max = CHANNEL_COUNT)]
    OutOfRange(u8),
}

/// One of the eight analog inputs of the transducer, numbered from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Channel(u8);

impl Channel {
    pub fn new(number: u8) -> Result<Self, ChannelError> {
        if (1..=CHANNEL_COUNT as u8).contains(&number) {
            Ok(Self(number))
        } else {
            Err(ChannelError::OutOfRange(number))
        }
    }

    /// Build a channel, clamping the number into 1..=8.
    pub fn clamped(number: u8) -> Self {
        Self(number.clamp(1, CHANNEL_COUNT as u8))
    }

    pub fn number(self) -> u8 {
        self.0
    }

    /// Input register holding this channel's raw code.
    pub fn address(self) -> u16 {
        u16::from(self.0 - 1)
    }

    /// Position of this channel in per-channel arrays.
    pub fn slot(self) -> usize {
        usize::from(self.0 - 1)
    }

    pub fn all() -> impl Iterator<Item = Channel> {
        (1..=CHANNEL_COUNT as u8).map(Channel)
    }
}

impl TryFrom<u8> for Channel {
    type Error = ChannelError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Channel::new(value)
    }
}

impl From<Channel> for u8 {
    fn from(channel: Channel) -> Self {
        channel.0
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Raw transport read for one tick.
///
/// `raw_code` is `None` when the read failed or timed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub raw_code: Option<u16>,
}

/// Pipeline output for one tick, `value` is `None` when nothing usable came out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reading {
    pub timestamp: DateTime<Utc>,
    pub value: Option<i32>,
}
