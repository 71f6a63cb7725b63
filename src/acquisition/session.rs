// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-inrush project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Acquisition session
//!
//! [`AcquisitionSession`] is the control side of the analyzer. It owns the
//! transport between runs, performs the connection handshake and the channel
//! configuration, spawns the [`Sampler`] task for a run and takes the
//! transport back when the run stops.
//!
//! Only setup operations ([`AcquisitionSession::connect`],
//! [`AcquisitionSession::start_run`]) report errors. Everything that happens
//! inside a run is absorbed by the sampler.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};

use super::notification::Notifier;
use super::sampler::{RunStats, Sampler, SamplerCommand, SamplerOutput, SamplerSettings};
use super::{Channel, ChannelError};
use crate::config::{Config, ExportFormat, TrendWindow};
use crate::export::{ExportBundle, ExportError, RunMetadata};
use crate::retention::{HistoryPoint, PlotPoint, RetentionStores, SharedRetention, TrendPoint};
use crate::transport::{create_transport, read_one, ChannelControl, Transport};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Not connected to the device")]
    NotConnected,

    #[error("An acquisition run is already active")]
    AlreadyRunning,

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("No response from device after {attempts} attempts (check unit id / wiring)")]
    NoResponse { attempts: u32 },

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error("Unknown trend window '{0}'")]
    UnknownTrendWindow(String),
}

/// How a stop request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The sampler exited and returned the transport.
    Joined(RunStats),
    /// The sampler did not exit in time and was aborted; the transport is
    /// lost and a new connection is required.
    Abandoned,
    /// No run was active.
    NotRunning,
}

struct Worker {
    handle: JoinHandle<SamplerOutput>,
    running: Arc<AtomicBool>,
    commands: mpsc::UnboundedSender<SamplerCommand>,
    muted: bool,
}

/// Render a run duration as `HH:MM:SS`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let seconds = elapsed.as_secs();
    format!(
        "{:02}:{:02}:{:02}",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}

pub struct AcquisitionSession {
    config: Config,
    transport: Option<Box<dyn Transport>>,
    description: String,
    channels: ChannelControl,
    channel: Channel,
    trend_window: TrendWindow,
    retention: SharedRetention,
    notifier: Notifier,
    worker: Option<Worker>,
    started: Option<(Instant, DateTime<Utc>)>,
    stopped_after: Option<Duration>,
}

impl AcquisitionSession {
    /// Create a session over `transport`. Nothing is opened yet.
    pub fn new(
        config: Config,
        transport: Box<dyn Transport>,
        notifier: Notifier,
    ) -> Result<Self, SessionError> {
        let channel = config.acquisition.channel()?;
        let trend_window = config.acquisition.trend_window;
        let retention =
            RetentionStores::shared(trend_window, config.acquisition.samples_per_second());
        Ok(Self {
            description: transport.describe(),
            channels: ChannelControl::new(config.device.clone()),
            transport: Some(transport),
            channel,
            trend_window,
            retention,
            notifier,
            worker: None,
            started: None,
            stopped_after: None,
            config,
        })
    }

    /// Create a session using the Modbus transport described by `config`.
    pub fn from_config(config: Config, notifier: Notifier) -> Result<Self, SessionError> {
        let transport = create_transport(&config.transport);
        Self::new(config, transport, notifier)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn trend_window(&self) -> TrendWindow {
        self.trend_window
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    pub fn is_connected(&self) -> bool {
        self.is_running()
            || self
                .transport
                .as_ref()
                .is_some_and(|transport| transport.is_connected())
    }

    /// Open the link and check that the device answers on the selected channel.
    pub async fn connect(&mut self) -> Result<(), SessionError> {
        if self.is_running() {
            return Err(SessionError::AlreadyRunning);
        }
        let transport = self
            .transport
            .get_or_insert_with(|| create_transport(&self.config.transport));

        transport.connect().await.map_err(|e| {
            error!("Failed to connect to {}: {}", self.description, e);
            SessionError::Connect(e.to_string())
        })?;

        let attempts = self.config.acquisition.handshake_attempts.max(1);
        let retry = self.config.acquisition.handshake_retry();
        let mut answered = false;
        for attempt in 1..=attempts {
            match read_one(transport.as_mut(), self.channel.address()).await {
                Ok(code) => {
                    debug!("Handshake read {} returned {:#06X}", attempt, code);
                    answered = true;
                    break;
                }
                Err(e) => {
                    debug!("Handshake read {} failed: {}", attempt, e);
                    if attempt < attempts {
                        sleep(retry).await;
                    }
                }
            }
        }

        if !answered {
            transport.disconnect().await;
            error!("No response from {}", self.description);
            return Err(SessionError::NoResponse { attempts });
        }

        info!("Connected to {}", self.description);
        self.notifier
            .status(format!("Connected: {}", self.description));
        Ok(())
    }

    /// Stop any run, re-enable all channels and close the link.
    pub async fn disconnect(&mut self) {
        self.stop_run().await;
        if let Some(transport) = self.transport.as_mut() {
            if transport.is_connected() {
                if let Err(e) = self.channels.restore_all(transport.as_mut()).await {
                    warn!("Failed to restore channel configuration: {}", e);
                }
            }
            transport.disconnect().await;
        }
        self.notifier.status("Disconnected");
    }

    /// Select the channel for the next run.
    pub fn set_channel(&mut self, channel: Channel) -> Result<(), SessionError> {
        if self.is_running() {
            return Err(SessionError::AlreadyRunning);
        }
        self.channel = channel;
        Ok(())
    }

    /// Start a run: empty the stores, mute the other channels, spawn the sampler.
    pub async fn start_run(&mut self) -> Result<(), SessionError> {
        if self.is_running() {
            return Err(SessionError::AlreadyRunning);
        }
        let mut transport = match self.transport.take() {
            Some(transport) if transport.is_connected() => transport,
            other => {
                self.transport = other;
                return Err(SessionError::NotConnected);
            }
        };
        let settings = SamplerSettings::from_config(&self.config.acquisition)?
            .with_channel(self.channel);

        {
            let mut stores = self.retention.write().await;
            stores.clear();
            if stores.trend.window() != self.trend_window {
                stores.trend.resize(self.trend_window);
            }
        }

        if let Err(e) = self
            .channels
            .mute_others(transport.as_mut(), self.channel)
            .await
        {
            warn!("Channel configuration failed: {}", e);
        }

        let muted = self.channels.is_muted();
        let running = Arc::new(AtomicBool::new(true));
        let (commands, receiver) = mpsc::unbounded_channel();
        let sampler = Sampler::new(
            settings,
            transport,
            std::mem::take(&mut self.channels),
            Arc::clone(&self.retention),
            self.notifier.clone(),
            receiver,
            Arc::clone(&running),
        );
        self.worker = Some(Worker {
            handle: tokio::spawn(sampler.run()),
            running,
            commands,
            muted,
        });
        self.started = Some((Instant::now(), Utc::now()));
        self.stopped_after = None;

        info!("Run started on channel {}", self.channel);
        self.notifier
            .status(format!("Running: channel {}", self.channel));
        Ok(())
    }

    /// Ask the sampler to stop and wait for it, at most the configured join timeout.
    pub async fn stop_run(&mut self) -> StopOutcome {
        let Some(worker) = self.worker.take() else {
            return StopOutcome::NotRunning;
        };
        worker.running.store(false, Ordering::Release);
        self.stopped_after = self.started.map(|(start, _)| start.elapsed());

        let join_timeout = self.config.acquisition.stop_join_timeout();
        let mut handle = worker.handle;
        match tokio::time::timeout(join_timeout, &mut handle).await {
            Ok(Ok(output)) => {
                self.transport = Some(output.transport);
                self.channels = output.channels;
                info!(
                    "Run stopped after {}: {} values from {} ticks",
                    format_elapsed(self.elapsed()),
                    output.stats.values,
                    output.stats.ticks
                );
                StopOutcome::Joined(output.stats)
            }
            Ok(Err(e)) => {
                error!("Sampling task failed: {}", e);
                self.lose_transport(worker.muted);
                StopOutcome::Abandoned
            }
            Err(_) => {
                handle.abort();
                warn!(
                    "Sampling task did not stop within {:?}, abandoning it",
                    join_timeout
                );
                self.lose_transport(worker.muted);
                self.notifier
                    .status("Stopped (worker abandoned, reconnect required)");
                StopOutcome::Abandoned
            }
        }
    }

    /// Forget the transport held by a dead worker. Channels it muted stay
    /// flagged so the next connected disconnect or run restores them.
    fn lose_transport(&mut self, muted: bool) {
        self.transport = None;
        self.channels = ChannelControl::new(self.config.device.clone());
        if muted {
            self.channels.assume_muted();
        }
    }

    /// Time since the run started, frozen once it stopped.
    pub fn elapsed(&self) -> Duration {
        match (self.started, self.stopped_after) {
            (_, Some(frozen)) => frozen,
            (Some((start, _)), None) => start.elapsed(),
            (None, None) => Duration::ZERO,
        }
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started.map(|(_, at)| at)
    }

    /// Empty both stores and forget the spike baseline.
    pub async fn clear_buffers(&mut self) {
        match &self.worker {
            Some(worker) => {
                if worker.commands.send(SamplerCommand::Clear).is_err() {
                    warn!("Sampling task is gone, clear request dropped");
                }
            }
            None => self.retention.write().await.clear(),
        }
        self.notifier.status("Buffer cleared");
    }

    /// Change the trend window. The trend buffer is emptied.
    pub async fn set_trend_window(&mut self, window: TrendWindow) {
        self.trend_window = window;
        match &self.worker {
            Some(worker) => {
                if worker
                    .commands
                    .send(SamplerCommand::ResizeWindow(window))
                    .is_err()
                {
                    warn!("Sampling task is gone, window change dropped");
                }
            }
            None => self.retention.write().await.trend.resize(window),
        }
        debug!("Trend window set to {}", window.label());
    }

    /// Change the trend window from its display label (`"30 s"`) or config token (`"30s"`).
    pub async fn set_trend_window_label(&mut self, label: &str) -> Result<(), SessionError> {
        let window = label
            .parse::<TrendWindow>()
            .map_err(|_| SessionError::UnknownTrendWindow(label.to_string()))?;
        self.set_trend_window(window).await;
        Ok(())
    }

    pub fn retention(&self) -> SharedRetention {
        Arc::clone(&self.retention)
    }

    pub async fn history_snapshot(&self) -> Vec<HistoryPoint> {
        self.retention.read().await.history.snapshot()
    }

    pub async fn trend_snapshot(&self) -> Vec<TrendPoint> {
        self.retention.read().await.trend.snapshot()
    }

    /// Decimated trend ready to draw `width` pixels wide, with its value range.
    pub async fn trend_plot(&self, width: usize) -> (Vec<Vec<PlotPoint>>, Option<(i32, i32)>) {
        let stores = self.retention.read().await;
        (stores.trend.plot_segments(width), stores.trend.value_range())
    }

    /// Assemble the export of the current history.
    pub async fn export_bundle(&self) -> Result<ExportBundle, ExportError> {
        let history = self.history_snapshot().await;
        let metadata = RunMetadata::new(
            self.description.clone(),
            self.channel,
            self.config.acquisition.sample_period_ms,
            self.trend_window.seconds(),
        )
        .with_start(self.started_at());
        ExportBundle::build(metadata, &history)
    }

    /// Write the export of the current history to `path`.
    ///
    /// The format follows the file extension, falling back to the configured one.
    pub async fn export_to<P: AsRef<Path>>(&self, path: P) -> Result<ExportFormat, ExportError> {
        let path = path.as_ref();
        let format = self.config.export.format_for(path);
        self.export_bundle().await?.save(path, format)?;
        Ok(format)
    }
}

impl Drop for AcquisitionSession {
    fn drop(&mut self) {
        if let Some(worker) = &self.worker {
            worker.running.store(false, Ordering::Release);
        }
    }
}
