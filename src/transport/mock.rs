// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-inrush project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Scripted transport
//!
//! Reads are answered from a queue of codes; `None` entries and an exhausted
//! queue answer with a timeout. Writes are recorded. A [`MockHandle`] keeps
//! access to the script and the recorded traffic after the transport has been
//! moved into a sampling task.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use super::{Transport, TransportError};

const SCRIPTED_TIMEOUT: Duration = Duration::from_millis(100);

#[derive(Debug, Default)]
struct MockState {
    script: VecDeque<Option<u16>>,
    read_addresses: Vec<u16>,
    writes: Vec<(u16, u16)>,
    failing_registers: HashSet<u16>,
    refuse_connect: bool,
    read_delay: Duration,
}

#[derive(Debug)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
    connected: bool,
}

/// Shared view on a [`MockTransport`].
#[derive(Debug, Clone)]
pub struct MockHandle {
    state: Arc<Mutex<MockState>>,
}

fn lock(state: &Mutex<MockState>) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
            connected: false,
        }
    }

    /// Transport answering reads with `codes`, in order.
    pub fn with_codes<I: IntoIterator<Item = Option<u16>>>(codes: I) -> Self {
        let transport = Self::new();
        transport.handle().push_codes(codes);
        transport
    }

    pub fn handle(&self) -> MockHandle {
        MockHandle {
            state: Arc::clone(&self.state),
        }
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockHandle {
    pub fn push_codes<I: IntoIterator<Item = Option<u16>>>(&self, codes: I) {
        lock(&self.state).script.extend(codes);
    }

    /// Scripted answers not consumed yet.
    pub fn remaining(&self) -> usize {
        lock(&self.state).script.len()
    }

    /// Number of read requests served so far.
    pub fn read_count(&self) -> usize {
        lock(&self.state).read_addresses.len()
    }

    pub fn read_addresses(&self) -> Vec<u16> {
        lock(&self.state).read_addresses.clone()
    }

    /// Every write attempted so far, failed ones included.
    pub fn writes(&self) -> Vec<(u16, u16)> {
        lock(&self.state).writes.clone()
    }

    pub fn clear_writes(&self) {
        lock(&self.state).writes.clear();
    }

    /// Make every write to `register` fail with a device exception.
    pub fn fail_writes_to(&self, register: u16) {
        lock(&self.state).failing_registers.insert(register);
    }

    pub fn refuse_connect(&self, refuse: bool) {
        lock(&self.state).refuse_connect = refuse;
    }

    /// Delay applied before answering each read.
    pub fn set_read_delay(&self, delay: Duration) {
        lock(&self.state).read_delay = delay;
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        if lock(&self.state).refuse_connect {
            return Err(TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "mock transport refused the connection",
            )));
        }
        self.connected = true;
        Ok(())
    }

    async fn read(&mut self, address: u16, count: u16) -> Result<Vec<u16>, TransportError> {
        if !self.connected {
            return Err(TransportError::NotConnected);
        }
        let delay = lock(&self.state).read_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut state = lock(&self.state);
        state.read_addresses.push(address);
        match state.script.pop_front() {
            Some(Some(code)) => Ok(vec![code; usize::from(count)]),
            Some(None) | None => Err(TransportError::Timeout(SCRIPTED_TIMEOUT)),
        }
    }

    async fn write(&mut self, register: u16, value: u16) -> Result<(), TransportError> {
        if !self.connected {
            return Err(TransportError::NotConnected);
        }
        let mut state = lock(&self.state);
        state.writes.push((register, value));
        if state.failing_registers.contains(&register) {
            return Err(TransportError::Exception("IllegalDataValue".to_string()));
        }
        Ok(())
    }

    async fn disconnect(&mut self) {
        self.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn describe(&self) -> String {
        "mock transport".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_script_then_timeouts() {
        let mut transport = MockTransport::with_codes([Some(10), None, Some(30)]);
        let handle = transport.handle();
        assert!(matches!(
            transport.read(0, 1).await,
            Err(TransportError::NotConnected)
        ));

        transport.connect().await.unwrap();
        assert_eq!(transport.read(2, 1).await.unwrap(), vec![10]);
        assert!(transport.read(2, 1).await.is_err());
        assert_eq!(transport.read(2, 2).await.unwrap(), vec![30, 30]);
        assert!(matches!(
            transport.read(2, 1).await,
            Err(TransportError::Timeout(_))
        ));
        assert_eq!(handle.read_count(), 4);
        assert_eq!(handle.remaining(), 0);
    }

    #[tokio::test]
    async fn test_refused_connection() {
        let mut transport = MockTransport::new();
        transport.handle().refuse_connect(true);
        assert!(transport.connect().await.is_err());
        assert!(!transport.is_connected());
    }
}
