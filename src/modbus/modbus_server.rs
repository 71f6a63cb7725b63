// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-inrush project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Simulated 8-channel current transducer served over Modbus TCP
//!
//! For avoiding confusion with the Modbus master/slave terminology, this module uses
//! the terms "server" and "client" instead. The simulated transducer is the server,
//! the analyzer is the client.

use std::{
    collections::HashMap,
    future,
    io,
    net::SocketAddr,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use log::{debug, error, info};
use rand::Rng;
use tokio::{net::TcpListener, task::JoinHandle};
use tokio_modbus::{
    prelude::*,
    server::tcp::{accept_tcp_connection, Server},
};

use crate::acquisition::{amps_to_code, Channel};
use crate::config::device::CHANNEL_COUNT;
use crate::config::DeviceConfig;

/// Code reported by a disabled channel.
pub const DISABLED_CHANNEL_CODE: u16 = 0x0000;

#[derive(Debug)]
struct DeviceState {
    codes: [u16; CHANNEL_COUNT],
    holding_registers: HashMap<u16, u16>,
}

/// Register image of the transducer, shared by every client connection and
/// by the profile task.
#[derive(Debug, Clone)]
pub struct SimulatedTransducer {
    device: DeviceConfig,
    state: Arc<Mutex<DeviceState>>,
}

impl tokio_modbus::server::Service for SimulatedTransducer {
    type Request = Request<'static>;
    type Response = Response;
    type Exception = ExceptionCode;
    type Future = future::Ready<Result<Self::Response, Self::Exception>>;

    fn call(&self, req: Self::Request) -> Self::Future {
        let res = match req {
            Request::ReadInputRegisters(addr, cnt) => {
                self.read_inputs(addr, cnt).map(Response::ReadInputRegisters)
            }
            Request::ReadHoldingRegisters(addr, cnt) => {
                register_read(&self.lock().holding_registers, addr, cnt)
                    .map(Response::ReadHoldingRegisters)
            }
            Request::WriteSingleRegister(addr, value) => self
                .write_holding(addr, std::slice::from_ref(&value))
                .map(|_| Response::WriteSingleRegister(addr, value)),
            Request::WriteMultipleRegisters(addr, values) => self
                .write_holding(addr, &values)
                .map(|_| Response::WriteMultipleRegisters(addr, values.len() as u16)),
            _ => {
                error!("SERVER: Exception::IllegalFunction - Unimplemented function code in request: {req:?}");
                Err(ExceptionCode::IllegalFunction)
            }
        };
        future::ready(res)
    }
}

impl SimulatedTransducer {
    /// All channels enabled, configuration locked, every channel at 0 A.
    pub fn new(device: DeviceConfig) -> Self {
        let mut holding_registers = HashMap::new();
        for register in device.enable_registers() {
            holding_registers.insert(register, 1);
        }
        holding_registers.insert(device.unlock_register, 0);

        Self {
            state: Arc::new(Mutex::new(DeviceState {
                codes: [amps_to_code(0.0); CHANNEL_COUNT],
                holding_registers,
            })),
            device,
        }
    }

    fn lock(&self) -> MutexGuard<'_, DeviceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Set the raw code measured on `channel`.
    pub fn set_code(&self, channel: Channel, code: u16) {
        self.lock().codes[channel.slot()] = code;
    }

    /// Set the current measured on `channel`.
    pub fn set_amps(&self, channel: Channel, amps: f64) {
        self.set_code(channel, amps_to_code(amps));
    }

    pub fn code(&self, channel: Channel) -> u16 {
        self.lock().codes[channel.slot()]
    }

    pub fn is_enabled(&self, channel: Channel) -> bool {
        let register = self.device.enable_base_register + channel.address();
        self.lock().holding_registers.get(&register) == Some(&1)
    }

    pub fn is_unlocked(&self) -> bool {
        self.lock().holding_registers.get(&self.device.unlock_register) == Some(&1)
    }

    fn read_inputs(&self, addr: u16, cnt: u16) -> Result<Vec<u16>, ExceptionCode> {
        let state = self.lock();
        (addr..addr.saturating_add(cnt))
            .map(|register| {
                let slot = usize::from(register);
                if slot >= CHANNEL_COUNT {
                    error!("SERVER: Exception::IllegalDataAddress");
                    return Err(ExceptionCode::IllegalDataAddress);
                }
                let enable = self.device.enable_base_register + register;
                Ok(match state.holding_registers.get(&enable) {
                    Some(1) => state.codes[slot],
                    _ => DISABLED_CHANNEL_CODE,
                })
            })
            .collect()
    }

    /// Honour the write protection of the enable block.
    fn write_holding(&self, addr: u16, values: &[u16]) -> Result<(), ExceptionCode> {
        let mut state = self.lock();
        for (i, value) in values.iter().enumerate() {
            let register = addr + i as u16;
            if *value > 1 {
                error!("SERVER: Exception::IllegalDataValue - {value} written to {register}");
                return Err(ExceptionCode::IllegalDataValue);
            }
            if register == self.device.unlock_register {
                state.holding_registers.insert(register, *value);
                continue;
            }
            if !self.device.enable_registers().contains(&register) {
                error!("SERVER: Exception::IllegalDataAddress");
                return Err(ExceptionCode::IllegalDataAddress);
            }
            if state.holding_registers.get(&self.device.unlock_register) != Some(&1) {
                error!("SERVER: Exception::IllegalDataValue - configuration is locked");
                return Err(ExceptionCode::IllegalDataValue);
            }
            state.holding_registers.insert(register, *value);
        }
        Ok(())
    }

    /// Serve Modbus TCP clients on `listener` until the task is dropped.
    pub async fn serve(&self, listener: TcpListener) -> io::Result<()> {
        let server = Server::new(listener);
        let new_service = |_socket_addr| Ok(Some(self.clone()));
        let on_connected = move |stream, socket_addr| async move {
            accept_tcp_connection(stream, socket_addr, new_service)
        };
        let on_process_error = |err: io::Error| {
            error!("Simulator connection error: {}", err);
        };
        server.serve(&on_connected, on_process_error).await?;
        Ok(())
    }

    /// Bind `address` and serve in a background task.
    ///
    /// Returns the bound address, useful with port 0.
    pub async fn spawn_tcp(&self, address: SocketAddr) -> io::Result<(SocketAddr, JoinHandle<()>)> {
        let listener = TcpListener::bind(address).await?;
        let local = listener.local_addr()?;
        info!("Simulated transducer listening on {}", local);

        let transducer = self.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = transducer.serve(listener).await {
                error!("Simulator server error: {}", e);
            }
        });
        Ok((local, handle))
    }

    /// Drive `channel` with `profile`, updating the register every `period`.
    pub fn spawn_profile(
        &self,
        channel: Channel,
        profile: InrushProfile,
        period: Duration,
    ) -> JoinHandle<()> {
        let transducer = self.clone();
        debug!("Simulating {:?} on channel {}", profile, channel);
        tokio::spawn(async move {
            let origin = tokio::time::Instant::now();
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let amps = profile.sample(origin.elapsed());
                transducer.set_amps(channel, amps);
            }
        })
    }
}

/// Repeating start-up current: idle, a peak, then exponential decay to the
/// steady running current.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InrushProfile {
    pub idle_amps: f64,
    pub peak_amps: f64,
    pub steady_amps: f64,
    pub idle: Duration,
    pub decay: Duration,
    pub cycle: Duration,
    /// Half width of the uniform noise added to every sample
    pub noise_amps: f64,
}

impl Default for InrushProfile {
    fn default() -> Self {
        Self {
            idle_amps: 0.0,
            peak_amps: 55.0,
            steady_amps: 12.0,
            idle: Duration::from_secs(2),
            decay: Duration::from_millis(400),
            cycle: Duration::from_secs(10),
            noise_amps: 0.4,
        }
    }
}

impl InrushProfile {
    /// Noise-free current `elapsed` after the simulation started.
    pub fn amps_at(&self, elapsed: Duration) -> f64 {
        let cycle = self.cycle.as_secs_f64().max(f64::EPSILON);
        let t = elapsed.as_secs_f64() % cycle;
        let idle = self.idle.as_secs_f64();
        if t < idle {
            return self.idle_amps;
        }
        let tau = self.decay.as_secs_f64().max(f64::EPSILON);
        self.steady_amps + (self.peak_amps - self.steady_amps) * (-(t - idle) / tau).exp()
    }

    /// Current with noise.
    pub fn sample(&self, elapsed: Duration) -> f64 {
        let clean = self.amps_at(elapsed);
        if self.noise_amps <= 0.0 {
            return clean;
        }
        clean + rand::rng().random_range(-self.noise_amps..=self.noise_amps)
    }
}

/// Helper function implementing reading registers from a HashMap.
fn register_read(
    registers: &HashMap<u16, u16>,
    addr: u16,
    cnt: u16,
) -> Result<Vec<u16>, ExceptionCode> {
    (addr..addr.saturating_add(cnt))
        .map(|register| {
            registers.get(&register).copied().ok_or_else(|| {
                error!("SERVER: Exception::IllegalDataAddress");
                ExceptionCode::IllegalDataAddress
            })
        })
        .collect()
}
