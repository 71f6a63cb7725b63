// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-inrush project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use anyhow::Result;
use clap::Parser;

use rust_inrush::acquisition::converter::{code_to_milliamps, convert};
use rust_inrush::config::{TransportConfig, TransportKind};
use rust_inrush::transport::{ModbusTransport, Transport};

/// Modbus client dumping the input registers of an inrush current transducer
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Modbus TCP server address (host:port); the serial port is used when absent
    #[clap(long)]
    address: Option<String>,

    /// Serial port of the RS-485 adapter
    #[clap(long, default_value = "COM3")]
    port: String,

    /// Serial line speed
    #[clap(long, default_value_t = 115_200)]
    baud_rate: u32,

    /// Modbus unit id
    #[clap(long, default_value_t = 2)]
    unit_id: u8,

    /// Starting input register address
    #[clap(long, default_value = "0")]
    input_register: u16,

    /// Number of registers to read
    #[clap(long, default_value = "8")]
    quantity: u16,

    /// Request timeout in milliseconds
    #[clap(long, default_value_t = 1000)]
    timeout_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::init_from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );

    let args = Args::parse();
    let config = TransportConfig {
        kind: if args.address.is_some() {
            TransportKind::Tcp
        } else {
            TransportKind::Rtu
        },
        port: args.port,
        baud_rate: args.baud_rate,
        unit_id: args.unit_id,
        timeout_ms: args.timeout_ms,
        tcp_address: args.address.unwrap_or_default(),
    };

    println!("Connecting to {}", config);
    let mut transport = ModbusTransport::new(config);
    transport.connect().await?;

    println!(
        "Reading {} input registers starting at address {}",
        args.quantity, args.input_register
    );
    let response = transport.read(args.input_register, args.quantity).await;
    transport.disconnect().await;
    let response = response?;

    println!("Raw register values: {:?}", response);
    for (i, code) in response.iter().enumerate() {
        let register = args.input_register + i as u16;
        let amps = convert(*code).map_or_else(|| "invalid".to_string(), |a| format!("{a} A"));
        println!(
            "Register {}: code {:#06X} = {:.3} mA -> {}",
            register,
            code,
            code_to_milliamps(*code),
            amps
        );
    }

    Ok(())
}
