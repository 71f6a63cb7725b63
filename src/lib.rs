// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-inrush project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Rust inrush current analyzer library
//!
//! This library polls a 4-20 mA current transducer over Modbus, turns the raw
//! codes into filtered ampere readings at 100 Hz, keeps the full run plus a
//! rolling trend window, and exports runs with a change-only series.

pub mod acquisition;
pub mod config;
pub mod export;
pub mod modbus;
pub mod retention;
pub mod transport;
