// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-inrush project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

// Main entry point for the inrush current analyzer
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use tokio::signal;
use tokio::sync::mpsc::Receiver;
use tokio::time::Instant;

use rust_inrush::acquisition::{
    format_elapsed, notification_channel, AcquisitionSession, Notification, StopOutcome,
};
use rust_inrush::config::{self, Config, TrendWindow};

/// Inrush current analyzer for 4-20 mA Modbus transducers
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file (YAML format)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to a configuration to validate and exit
    #[arg(long)]
    validate_config: Option<PathBuf>,

    /// Output the configuration schema as JSON and exit
    #[arg(long)]
    show_config_schema: bool,

    /// Serial port of the RS-485 adapter (COM3, /dev/ttyUSB0)
    #[arg(long)]
    port: Option<String>,

    /// Serial line speed
    #[arg(long)]
    baud_rate: Option<u32>,

    /// Modbus unit id of the transducer
    #[arg(long)]
    unit_id: Option<u8>,

    /// Per-request timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Use Modbus TCP at this address instead of the serial line (host:port)
    #[arg(long)]
    tcp_address: Option<String>,

    /// Channel to sample (1-8)
    #[arg(short, long)]
    channel: Option<u8>,

    /// Trend window (10s, 30s, 60s, 5min)
    #[arg(long)]
    trend_window: Option<TrendWindow>,

    /// Stop the run after this many seconds instead of waiting for Ctrl-C
    #[arg(short, long)]
    duration: Option<u64>,

    /// Export the run to this file when it stops (.json or .yaml)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Enable verbose logging (debug level)
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// Disable all logging output
    #[arg(short = 'q', long = "quiet")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.quiet {
        log::LevelFilter::Off
    } else if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    if args.show_config_schema {
        return config::output_config_schema();
    }

    if let Some(validate_path) = args.validate_config {
        if !validate_path.exists() {
            return Err(anyhow::anyhow!(
                "Configuration file does not exist: {}",
                validate_path.display()
            ));
        }
        Config::from_file(&validate_path)
            .map_err(|err| anyhow::anyhow!("Configuration validation failed: {:#}", err))?;
        println!("Configuration file is valid: {}", validate_path.display());
        return Ok(());
    }

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from("config.yaml"));
    let mut config = Config::from_file(&config_path)?;

    config.apply_args(
        args.port.clone(),
        args.baud_rate,
        args.unit_id,
        args.timeout_ms,
        args.channel,
        args.trend_window,
        args.tcp_address.clone(),
    );
    config::validate_specific_rules(&config).context("Invalid command line override")?;

    let (notifier, notifications) = notification_channel(config.acquisition.notification_capacity);
    let display = tokio::spawn(display_loop(notifications));

    let mut session = AcquisitionSession::from_config(config, notifier)?;
    session.connect().await?;
    session.start_run().await?;

    match args.duration {
        Some(seconds) => {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(seconds)) => {}
                _ = signal::ctrl_c() => info!("Interrupted"),
            }
        }
        None => {
            signal::ctrl_c()
                .await
                .context("Failed to listen for Ctrl-C")?;
        }
    }

    match session.stop_run().await {
        StopOutcome::Joined(stats) => info!(
            "Run of {} finished: {} values, {} failed reads, {} overruns",
            format_elapsed(session.elapsed()),
            stats.values,
            stats.failed_reads,
            stats.overruns
        ),
        StopOutcome::Abandoned => warn!("Sampling task abandoned, the device link was dropped"),
        StopOutcome::NotRunning => {}
    }

    let export = match &args.output {
        Some(path) => session
            .export_to(path)
            .await
            .map(|format| println!("\nRun saved to {} ({:?})", path.display(), format))
            .with_context(|| format!("Failed to export run to {}", path.display())),
        None => Ok(()),
    };

    session.disconnect().await;
    drop(session);
    if let Err(e) = display.await {
        warn!("Display task failed: {}", e);
    }
    export
}

/// Print live values on one line and status changes on their own line.
async fn display_loop(mut notifications: Receiver<Notification>) {
    let mut run_start = None;
    let mut stdout = std::io::stdout();
    while let Some(notification) = notifications.recv().await {
        match notification {
            Notification::Value { value, .. } => {
                let elapsed = run_start.map(|start: Instant| start.elapsed()).unwrap_or_default();
                let value = value.map_or_else(|| "---".to_string(), |v| v.to_string());
                print!("\r{}  {:>3} A", format_elapsed(elapsed), value);
                let _ = stdout.flush();
            }
            Notification::Status { text } => {
                if text.starts_with("Running") {
                    run_start = Some(Instant::now());
                }
                println!("\n{}", text);
            }
        }
    }
}
