// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-inrush project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use tokio::signal;

use rust_inrush::acquisition::Channel;
use rust_inrush::config::DeviceConfig;
use rust_inrush::modbus::{InrushProfile, SimulatedTransducer};

/// Simulated 8-channel 4-20 mA transducer served over Modbus TCP
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Listen address
    #[clap(long, default_value = "127.0.0.1:5020")]
    address: SocketAddr,

    /// Channel animated with the inrush profile
    #[clap(long, default_value_t = 1)]
    channel: u8,

    /// Peak current in amperes
    #[clap(long, default_value_t = 55.0)]
    peak: f64,

    /// Steady running current in amperes
    #[clap(long, default_value_t = 12.0)]
    steady: f64,

    /// Decay time constant of the inrush in milliseconds
    #[clap(long, default_value_t = 400)]
    decay_ms: u64,

    /// Length of one start-up cycle in seconds
    #[clap(long, default_value_t = 10)]
    cycle_s: u64,

    /// Noise half width in amperes
    #[clap(long, default_value_t = 0.4)]
    noise: f64,

    /// Register update period in milliseconds
    #[clap(long, default_value_t = 5)]
    update_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init_from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );

    let args = Args::parse();
    let channel = Channel::new(args.channel)?;
    let profile = InrushProfile {
        peak_amps: args.peak,
        steady_amps: args.steady,
        decay: Duration::from_millis(args.decay_ms),
        cycle: Duration::from_secs(args.cycle_s),
        noise_amps: args.noise,
        ..InrushProfile::default()
    };

    let transducer = SimulatedTransducer::new(DeviceConfig::default());
    let (address, server) = transducer
        .spawn_tcp(args.address)
        .await
        .with_context(|| format!("Failed to listen on {}", args.address))?;
    let animation = transducer.spawn_profile(channel, profile, Duration::from_millis(args.update_ms));

    println!("Simulated transducer on {} (channel {} animated)", address, channel);
    signal::ctrl_c().await.context("Failed to listen for Ctrl-C")?;

    info!("Shutting down simulator");
    animation.abort();
    server.abort();
    Ok(())
}
