// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-inrush project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Fixed-period sampling loop
//!
//! The [`Sampler`] runs in its own task for the duration of a run. Each tick:
//!
//! 1. checks the stop flag and applies pending [`SamplerCommand`]s
//! 2. reads the selected channel once (a failed read is a tick without value)
//! 3. runs the [`ReadingPipeline`]
//! 4. records an accepted value in the retention stores, and notifies the
//!    display when the coalescing interval has elapsed since the last value
//!    notification
//! 5. sleeps for what is left of the period; an overrun starts the next tick
//!    immediately without catching up
//!
//! On exit the sampler restores the channel enable state, sends a final status
//! notification and hands the transport back through [`SamplerOutput`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::{sleep, Instant};

use super::notification::Notifier;
use super::pipeline::ReadingPipeline;
use super::{Channel, ChannelError, Reading, Sample};
use crate::config::{AcquisitionConfig, TrendWindow};
use crate::retention::SharedRetention;
use crate::transport::{read_one, ChannelControl, Transport};

/// Parameters of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerSettings {
    pub channel: Channel,
    pub sample_period: Duration,
    pub ui_coalesce: Duration,
    pub spike_threshold: i32,
    pub warmup_samples: u32,
}

impl SamplerSettings {
    pub fn from_config(config: &AcquisitionConfig) -> Result<Self, ChannelError> {
        Ok(Self {
            channel: config.channel()?,
            sample_period: config.sample_period(),
            ui_coalesce: config.ui_coalesce_interval(),
            spike_threshold: config.spike_threshold_amps,
            warmup_samples: config.warmup_samples,
        })
    }

    pub fn with_channel(mut self, channel: Channel) -> Self {
        self.channel = channel;
        self
    }
}

/// Requests from the control side, applied at the next tick boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerCommand {
    /// Empty both stores and forget the spike baseline.
    Clear,
    /// Switch the trend buffer to another window, emptying it.
    ResizeWindow(TrendWindow),
}

/// Counters gathered during a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub ticks: u64,
    pub failed_reads: u64,
    pub values: u64,
    pub notifications: u64,
    pub overruns: u64,
}

/// What the worker hands back when it stops.
pub struct SamplerOutput {
    pub transport: Box<dyn Transport>,
    pub channels: ChannelControl,
    pub stats: RunStats,
}

pub struct Sampler {
    settings: SamplerSettings,
    pipeline: ReadingPipeline,
    transport: Box<dyn Transport>,
    channels: ChannelControl,
    retention: SharedRetention,
    notifier: Notifier,
    commands: mpsc::UnboundedReceiver<SamplerCommand>,
    running: Arc<AtomicBool>,
    last_notification: Option<Instant>,
    stats: RunStats,
}

impl Sampler {
    pub fn new(
        settings: SamplerSettings,
        transport: Box<dyn Transport>,
        channels: ChannelControl,
        retention: SharedRetention,
        notifier: Notifier,
        commands: mpsc::UnboundedReceiver<SamplerCommand>,
        running: Arc<AtomicBool>,
    ) -> Self {
        let pipeline = ReadingPipeline::new(settings.spike_threshold, settings.warmup_samples);
        Self {
            settings,
            pipeline,
            transport,
            channels,
            retention,
            notifier,
            commands,
            running,
            last_notification: None,
            stats: RunStats::default(),
        }
    }

    /// Run until the stop flag is cleared.
    pub async fn run(mut self) -> SamplerOutput {
        debug!(
            "Sampler started on channel {} every {:?}",
            self.settings.channel, self.settings.sample_period
        );

        while self.running.load(Ordering::Acquire) {
            let tick_start = Instant::now();
            self.tick().await;

            let elapsed = tick_start.elapsed();
            match self.settings.sample_period.checked_sub(elapsed) {
                Some(remaining) if !remaining.is_zero() => sleep(remaining).await,
                _ => self.stats.overruns += 1,
            }
        }

        if let Err(e) = self.channels.restore_all(self.transport.as_mut()).await {
            warn!("Failed to restore channel configuration: {}", e);
        }
        self.notifier.status("Stopped");
        debug!("Sampler stopped: {:?}", self.stats);

        SamplerOutput {
            transport: self.transport,
            channels: self.channels,
            stats: self.stats,
        }
    }

    async fn tick(&mut self) {
        self.stats.ticks += 1;
        self.apply_commands().await;

        let raw_code = match read_one(self.transport.as_mut(), self.settings.channel.address()).await {
            Ok(code) => Some(code),
            Err(e) => {
                trace!("Read failed: {}", e);
                self.stats.failed_reads += 1;
                None
            }
        };
        let sample = Sample {
            timestamp: Utc::now(),
            raw_code,
        };

        let Reading {
            timestamp,
            value: Some(value),
        } = self.pipeline.process_sample(sample)
        else {
            return;
        };
        self.stats.values += 1;
        self.retention
            .write()
            .await
            .record(timestamp, self.settings.channel, value);

        let due = self
            .last_notification
            .map_or(true, |last| last.elapsed() > self.settings.ui_coalesce);
        if due {
            self.last_notification = Some(Instant::now());
            if self.notifier.value(timestamp, Some(value)) {
                self.stats.notifications += 1;
            }
        }
    }

    async fn apply_commands(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            debug!("Applying {:?}", command);
            match command {
                SamplerCommand::Clear => {
                    self.retention.write().await.clear();
                    self.pipeline.clear_baseline();
                }
                SamplerCommand::ResizeWindow(window) => {
                    self.retention.write().await.trend.resize(window);
                }
            }
        }
    }
}
