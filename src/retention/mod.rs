// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-inrush project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Retention stores
//!
//! Two containers are fed by the sampling loop:
//! - [`HistoryLog`]: every accepted reading of the run, kept for export
//! - [`TrendBuffer`]: the last trend window of readings, kept for display
//!
//! The sampling task is the only writer while a run is active. The control
//! side reads snapshots through the shared lock.

pub mod history;
pub mod trend;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::acquisition::Channel;
use crate::config::TrendWindow;

pub use history::{HistoryLog, HistoryPoint};
pub use trend::{PlotPoint, TrendBuffer, TrendPoint};

/// Retention stores shared between the sampling task and the control side.
pub type SharedRetention = Arc<RwLock<RetentionStores>>;

#[derive(Debug, Clone)]
pub struct RetentionStores {
    pub history: HistoryLog,
    pub trend: TrendBuffer,
}

impl RetentionStores {
    pub fn new(window: TrendWindow, samples_per_second: u32) -> Self {
        Self {
            history: HistoryLog::new(),
            trend: TrendBuffer::new(window, samples_per_second),
        }
    }

    pub fn shared(window: TrendWindow, samples_per_second: u32) -> SharedRetention {
        Arc::new(RwLock::new(Self::new(window, samples_per_second)))
    }

    /// Store one accepted reading in both containers.
    pub fn record(&mut self, timestamp: DateTime<Utc>, channel: Channel, value: i32) {
        self.history.push(timestamp, value);
        self.trend
            .push(TrendPoint::for_channel(timestamp, channel, Some(value)));
    }

    pub fn clear(&mut self) {
        self.history.clear();
        self.trend.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_feeds_both_stores() {
        let mut stores = RetentionStores::new(TrendWindow::TenSeconds, 100);
        let channel = Channel::clamped(2);
        stores.record(Utc::now(), channel, 17);

        assert_eq!(stores.history.len(), 1);
        assert_eq!(stores.history.points()[0].value, 17);
        assert_eq!(stores.trend.latest().unwrap().values[1], Some(17));

        stores.clear();
        assert!(stores.history.is_empty());
        assert!(stores.trend.is_empty());
    }
}
