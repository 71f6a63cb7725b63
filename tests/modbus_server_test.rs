// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-inrush project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Tests for the SimulatedTransducer Modbus server
//!
//! These tests start a simulator instance and talk to it with a plain
//! tokio-modbus client and with the analyzer's own transport.

use std::net::SocketAddr;
use std::str::FromStr;

use tokio::task::JoinHandle;
use tokio_modbus::prelude::*;

use rust_inrush::acquisition::{convert, Channel};
use rust_inrush::config::{DeviceConfig, TransportConfig, TransportKind};
use rust_inrush::modbus::{SimulatedTransducer, DISABLED_CHANNEL_CODE};
use rust_inrush::transport::{ChannelControl, ModbusTransport, Transport, TransportError};

/// Start a simulator on a port chosen by the OS
async fn start_test_server(
) -> Result<(SimulatedTransducer, SocketAddr, JoinHandle<()>), Box<dyn std::error::Error>> {
    let transducer = SimulatedTransducer::new(DeviceConfig::default());
    let (socket_addr, handle) = transducer
        .spawn_tcp(SocketAddr::from_str("127.0.0.1:0")?)
        .await?;
    Ok((transducer, socket_addr, handle))
}

fn tcp_config(address: SocketAddr) -> TransportConfig {
    TransportConfig {
        kind: TransportKind::Tcp,
        tcp_address: address.to_string(),
        timeout_ms: 1000,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_read_input_registers() -> Result<(), Box<dyn std::error::Error>> {
    let (transducer, socket_addr, _server_handle) = start_test_server().await?;
    transducer.set_amps(Channel::new(1)?, 63.0);
    transducer.set_code(Channel::new(2)?, 0x7FFF);

    let mut ctx = tcp::connect(socket_addr).await?;
    let data = ctx.read_input_registers(0, 8).await??;

    assert_eq!(data.len(), 8);
    assert_eq!(convert(data[0]), Some(63));
    assert_eq!(data[1], 0x7FFF);
    assert_eq!(convert(data[1]), None);
    // Untouched channels sit at 4 mA
    assert_eq!(convert(data[7]), Some(0));

    ctx.disconnect().await?;
    Ok(())
}

#[tokio::test]
async fn test_enable_block_is_write_protected() -> Result<(), Box<dyn std::error::Error>> {
    let (transducer, socket_addr, _server_handle) = start_test_server().await?;
    let mut ctx = tcp::connect(socket_addr).await?;

    let locked = ctx.write_single_register(8, 0).await?;
    assert_eq!(locked, Err(ExceptionCode::IllegalDataValue));

    ctx.write_single_register(49, 1).await??;
    ctx.write_single_register(8, 0).await??;
    ctx.write_single_register(49, 0).await??;
    assert!(!transducer.is_enabled(Channel::new(1)?));

    let data = ctx.read_input_registers(0, 1).await??;
    assert_eq!(data, vec![DISABLED_CHANNEL_CODE]);

    let holding = ctx.read_holding_registers(8, 8).await??;
    assert_eq!(holding, vec![0, 1, 1, 1, 1, 1, 1, 1]);

    ctx.disconnect().await?;
    Ok(())
}

#[tokio::test]
async fn test_invalid_register_address() -> Result<(), Box<dyn std::error::Error>> {
    let (_transducer, socket_addr, _server_handle) = start_test_server().await?;
    let mut ctx = tcp::connect(socket_addr).await?;

    let result = ctx.read_input_registers(100, 1).await?;
    assert_eq!(result, Err(ExceptionCode::IllegalDataAddress));

    let result = ctx.read_coils(0, 1).await?;
    assert_eq!(result, Err(ExceptionCode::IllegalFunction));

    ctx.disconnect().await?;
    Ok(())
}

#[tokio::test]
async fn test_modbus_transport_round_trip() -> Result<(), Box<dyn std::error::Error>> {
    let (transducer, socket_addr, _server_handle) = start_test_server().await?;
    transducer.set_amps(Channel::new(4)?, 30.0);

    let mut transport = ModbusTransport::new(tcp_config(socket_addr));
    transport.connect().await?;
    assert!(transport.is_connected());

    let codes = transport.read(Channel::new(4)?.address(), 1).await?;
    assert_eq!(convert(codes[0]), Some(30));

    // Device exceptions surface as transport errors
    assert!(matches!(
        transport.write(12, 0).await,
        Err(TransportError::Exception(_))
    ));

    transport.disconnect().await;
    assert!(!transport.is_connected());
    Ok(())
}

#[tokio::test]
async fn test_channel_control_against_device() -> Result<(), Box<dyn std::error::Error>> {
    let (transducer, socket_addr, _server_handle) = start_test_server().await?;
    let mut transport = ModbusTransport::new(tcp_config(socket_addr));
    transport.connect().await?;

    let selected = Channel::new(6)?;
    let mut control = ChannelControl::new(DeviceConfig::default());
    control.mute_others(&mut transport, selected).await?;

    for channel in Channel::all() {
        assert_eq!(transducer.is_enabled(channel), channel == selected);
    }
    assert!(!transducer.is_unlocked());

    control.restore_all(&mut transport).await?;
    assert!(Channel::all().all(|c| transducer.is_enabled(c)));
    assert!(!transducer.is_unlocked());

    transport.disconnect().await;
    Ok(())
}

#[tokio::test]
async fn test_connect_to_closed_port_fails() {
    // Bind then drop to get a port nobody listens on
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let address = listener.local_addr().unwrap();
    drop(listener);

    let mut transport = ModbusTransport::new(tcp_config(address));
    assert!(transport.connect().await.is_err());
    assert!(!transport.is_connected());
}
