// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-inrush project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! End-to-end runs against the simulated transducer over Modbus TCP

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Result;
use tempfile::tempdir;
use tokio::time::sleep;
use tokio_modbus::prelude::*;

use rust_inrush::acquisition::{
    notification_channel, AcquisitionSession, Channel, Notification, SessionError, StopOutcome,
};
use rust_inrush::config::{Config, DeviceConfig, ExportFormat, TransportKind, TrendWindow};
use rust_inrush::export::ExportBundle;
use rust_inrush::modbus::SimulatedTransducer;

async fn simulator() -> Result<(SimulatedTransducer, SocketAddr)> {
    let transducer = SimulatedTransducer::new(DeviceConfig::default());
    let (address, _handle) = transducer.spawn_tcp("127.0.0.1:0".parse()?).await?;
    Ok((transducer, address))
}

fn config(address: SocketAddr, channel: u8) -> Config {
    let mut config = Config::default();
    config.transport.kind = TransportKind::Tcp;
    config.transport.tcp_address = address.to_string();
    config.transport.timeout_ms = 500;
    config.acquisition.channel = channel;
    config.acquisition.warmup_samples = 2;
    config.acquisition.trend_window = TrendWindow::TenSeconds;
    config
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_run_against_simulator() -> Result<()> {
    let (transducer, address) = simulator().await?;
    let channel = Channel::new(3)?;
    transducer.set_amps(channel, 20.0);

    let (notifier, mut notifications) = notification_channel(256);
    let mut session = AcquisitionSession::from_config(config(address, 3), notifier)?;
    session.connect().await?;
    session.start_run().await?;

    sleep(Duration::from_millis(100)).await;
    // Only the sampled channel stays enabled during the run
    for other in Channel::all() {
        assert_eq!(transducer.is_enabled(other), other == channel);
    }

    sleep(Duration::from_millis(300)).await;
    let outcome = session.stop_run().await;
    let StopOutcome::Joined(stats) = outcome else {
        panic!("unexpected outcome {outcome:?}");
    };
    assert!(stats.values >= 5, "only {} values recorded", stats.values);
    assert!(Channel::all().all(|c| transducer.is_enabled(c)));

    let history = session.history_snapshot().await;
    assert_eq!(history.len() as u64, stats.values);
    assert!(history.iter().all(|p| p.value == 20));
    assert!(history.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));

    let mut received_value = false;
    while let Ok(notification) = notifications.try_recv() {
        if let Notification::Value { value, .. } = notification {
            assert_eq!(value, Some(20));
            received_value = true;
        }
    }
    assert!(received_value);

    session.disconnect().await;
    assert!(!session.is_connected());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_export_run_to_files() -> Result<()> {
    let (transducer, address) = simulator().await?;
    let channel = Channel::new(1)?;
    transducer.set_amps(channel, 8.0);

    let (notifier, _notifications) = notification_channel(16);
    let mut session = AcquisitionSession::from_config(config(address, 1), notifier)?;
    session.connect().await?;
    session.start_run().await?;
    sleep(Duration::from_millis(150)).await;
    transducer.set_amps(channel, 14.0);
    sleep(Duration::from_millis(150)).await;
    session.stop_run().await;

    let dir = tempdir()?;
    let json_path = dir.path().join("run.json");
    assert_eq!(session.export_to(&json_path).await?, ExportFormat::Json);
    let bundle: ExportBundle = serde_json::from_str(&std::fs::read_to_string(&json_path)?)?;

    assert_eq!(bundle.metadata.channel, channel);
    assert_eq!(bundle.metadata.sample_period_ms, 10);
    assert_eq!(bundle.metadata.window_seconds, 10);
    assert!(bundle.metadata.transport.starts_with("tcp://"));

    let first = bundle.changes.first().map(|r| r.amps);
    let last = bundle.changes.last().map(|r| r.amps);
    assert_eq!(first, Some(8));
    assert_eq!(last, Some(14));
    assert_eq!(
        bundle.changes.last().map(|r| r.timestamp),
        bundle.data.last().map(|r| r.timestamp)
    );
    assert!(bundle.data.windows(2).all(|w| w[0].t_s <= w[1].t_s));
    let chart = bundle.chart.expect("chart scale");
    assert!(chart.y_min < 8.0 && chart.y_max > 14.0);

    let yaml_path = dir.path().join("run.yaml");
    assert_eq!(session.export_to(&yaml_path).await?, ExportFormat::Yaml);
    let yaml = std::fs::read_to_string(&yaml_path)?;
    assert!(yaml.contains("units: amperes (integer)"));

    session.disconnect().await;
    Ok(())
}

#[tokio::test]
async fn test_connect_failure_is_reported() -> Result<()> {
    // Nothing listens on this port: the connection itself fails
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    let address = listener.local_addr()?;
    drop(listener);

    let (notifier, _notifications) = notification_channel(16);
    let mut session = AcquisitionSession::from_config(config(address, 1), notifier)?;
    assert!(matches!(
        session.connect().await,
        Err(SessionError::Connect(_))
    ));
    assert!(matches!(
        session.start_run().await,
        Err(SessionError::NotConnected)
    ));
    Ok(())
}

#[tokio::test]
async fn test_run_reenables_sampled_channel() -> Result<()> {
    let (transducer, address) = simulator().await?;
    let (notifier, _notifications) = notification_channel(16);
    let mut session = AcquisitionSession::from_config(config(address, 2), notifier)?;
    session.connect().await?;

    // Channel 2 disabled behind the analyzer's back reads 0x0000, a sentinel code
    let mut ctx = tcp::connect(address).await?;
    ctx.write_single_register(49, 1).await??;
    ctx.write_single_register(9, 0).await??;
    ctx.write_single_register(49, 0).await??;
    ctx.disconnect().await?;

    // Muting at run start re-enables the sampled channel
    session.start_run().await?;
    sleep(Duration::from_millis(150)).await;
    session.stop_run().await;
    assert!(transducer.is_enabled(Channel::new(2)?));
    assert!(!session.history_snapshot().await.is_empty());

    session.disconnect().await;
    Ok(())
}
