// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-inrush project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Full-history log of accepted readings, the source of every export.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One accepted reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub timestamp: DateTime<Utc>,
    pub value: i32,
}

impl HistoryPoint {
    pub fn new(timestamp: DateTime<Utc>, value: i32) -> Self {
        Self { timestamp, value }
    }
}

/// Append-only log, timestamps non-decreasing in log order.
#[derive(Debug, Clone, Default)]
pub struct HistoryLog {
    points: Vec<HistoryPoint>,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a reading.
    ///
    /// A timestamp older than the previous point (wall clock stepped back) is
    /// raised to the previous timestamp.
    pub fn push(&mut self, timestamp: DateTime<Utc>, value: i32) {
        let timestamp = match self.points.last() {
            Some(last) if timestamp < last.timestamp => last.timestamp,
            _ => timestamp,
        };
        self.points.push(HistoryPoint { timestamp, value });
    }

    pub fn points(&self) -> &[HistoryPoint] {
        &self.points
    }

    pub fn last(&self) -> Option<&HistoryPoint> {
        self.points.last()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    pub fn snapshot(&self) -> Vec<HistoryPoint> {
        self.points.clone()
    }
}
