// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-inrush project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Data acquisition configuration
//!
//! This module defines the structures for configuring the sampling loop: the
//! polled channel, the tick period, the filters applied to each reading and
//! the rolling trend window.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::acquisition::{Channel, ChannelError};

/// Duration of the rolling trend window shown on the live display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TrendWindow {
    #[serde(rename = "10s")]
    TenSeconds,
    #[serde(rename = "30s")]
    ThirtySeconds,
    #[default]
    #[serde(rename = "60s")]
    OneMinute,
    #[serde(rename = "5min")]
    FiveMinutes,
}

impl TrendWindow {
    /// All selectable windows, shortest first.
    pub const ALL: [TrendWindow; 4] = [
        TrendWindow::TenSeconds,
        TrendWindow::ThirtySeconds,
        TrendWindow::OneMinute,
        TrendWindow::FiveMinutes,
    ];

    pub fn seconds(self) -> u32 {
        match self {
            TrendWindow::TenSeconds => 10,
            TrendWindow::ThirtySeconds => 30,
            TrendWindow::OneMinute => 60,
            TrendWindow::FiveMinutes => 300,
        }
    }

    /// Label used by selection controls ("10 s", "30 s", "60 s", "5 min").
    pub fn label(self) -> &'static str {
        match self {
            TrendWindow::TenSeconds => "10 s",
            TrendWindow::ThirtySeconds => "30 s",
            TrendWindow::OneMinute => "60 s",
            TrendWindow::FiveMinutes => "5 min",
        }
    }

    /// Resolve a selection control label back to a window.
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|w| w.label() == label.trim())
    }
}

impl fmt::Display for TrendWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TrendWindow {
    type Err = String;

    /// Accepts both configuration tokens (`10s`, `5min`) and display labels (`10 s`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "10s" => Ok(TrendWindow::TenSeconds),
            "30s" => Ok(TrendWindow::ThirtySeconds),
            "60s" => Ok(TrendWindow::OneMinute),
            "5min" => Ok(TrendWindow::FiveMinutes),
            other => Self::from_label(other)
                .ok_or_else(|| format!("unknown trend window '{other}' (10s, 30s, 60s, 5min)")),
        }
    }
}

/// Configuration for the acquisition loop.
///
/// Defaults match a 100 Hz poll of channel 1 with a one minute trend.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Channel to sample, 1 to 8.
    pub channel: u8,

    /// Nominal period between two reads, in milliseconds.
    pub sample_period_ms: u64,

    /// Number of accepted readings discarded at the start of each run.
    pub warmup_samples: u32,

    /// Maximum jump, in amperes, accepted from the last accepted reading.
    pub spike_threshold_amps: i32,

    /// Minimum interval between two live value notifications, in milliseconds.
    pub ui_coalesce_ms: u64,

    /// Span of the rolling trend buffer.
    pub trend_window: TrendWindow,

    /// How long a stop request waits for the worker before abandoning it.
    pub stop_join_timeout_ms: u64,

    /// Capacity of the notification channel towards the display.
    pub notification_capacity: usize,

    /// Number of reads attempted during the connection handshake.
    pub handshake_attempts: u32,

    /// Pause between two handshake reads, in milliseconds.
    pub handshake_retry_ms: u64,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            channel: 1,
            sample_period_ms: 10,
            warmup_samples: 10,
            spike_threshold_amps: 10,
            ui_coalesce_ms: 80,
            trend_window: TrendWindow::default(),
            stop_join_timeout_ms: 2000,
            notification_capacity: 256,
            handshake_attempts: 3,
            handshake_retry_ms: 50,
        }
    }
}

impl AcquisitionConfig {
    pub fn channel(&self) -> Result<Channel, ChannelError> {
        Channel::new(self.channel)
    }

    pub fn sample_period(&self) -> Duration {
        Duration::from_millis(self.sample_period_ms)
    }

    pub fn ui_coalesce_interval(&self) -> Duration {
        Duration::from_millis(self.ui_coalesce_ms)
    }

    pub fn stop_join_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_join_timeout_ms)
    }

    pub fn handshake_retry(&self) -> Duration {
        Duration::from_millis(self.handshake_retry_ms)
    }

    /// Samples per second implied by the sample period (`1000 / period_ms`).
    ///
    /// Integer division: a period that does not divide 1000 rounds the rate
    /// down (30 ms gives 33), and any period above 500 ms gives 1.
    pub fn samples_per_second(&self) -> u32 {
        (1000 / self.sample_period_ms.max(1)).max(1) as u32
    }

    /// Capacity of the trend buffer for the given window.
    ///
    /// Derived from [`Self::samples_per_second`], so it inherits its
    /// truncation: with a 30 ms period a 10 s window holds 330 points,
    /// slightly fewer than the 333 ticks that fit in it.
    pub fn trend_capacity(&self, window: TrendWindow) -> usize {
        window.seconds() as usize * self.samples_per_second() as usize
    }
}
