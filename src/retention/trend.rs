// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-inrush project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Rolling trend buffer
//!
//! Holds the most recent `window_seconds * samples_per_second` points for the
//! live trend. Each point carries one slot per physical channel; only the
//! sampled channel's slot is filled.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::acquisition::Channel;
use crate::config::device::CHANNEL_COUNT;
use crate::config::TrendWindow;

/// One trend sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub timestamp: DateTime<Utc>,
    pub values: [Option<i32>; CHANNEL_COUNT],
}

impl TrendPoint {
    /// Point with only `channel`'s slot populated.
    pub fn for_channel(timestamp: DateTime<Utc>, channel: Channel, value: Option<i32>) -> Self {
        let mut values = [None; CHANNEL_COUNT];
        values[channel.slot()] = value;
        Self { timestamp, values }
    }

    /// First populated slot.
    pub fn active_value(&self) -> Option<i32> {
        self.values.iter().find_map(|v| *v)
    }
}

/// A point projected for drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlotPoint {
    /// Position in the buffer, oldest is 0.
    pub index: usize,
    pub timestamp: DateTime<Utc>,
    pub value: i32,
}

#[derive(Debug, Clone)]
pub struct TrendBuffer {
    window: TrendWindow,
    samples_per_second: u32,
    capacity: usize,
    points: VecDeque<TrendPoint>,
}

impl TrendBuffer {
    pub fn new(window: TrendWindow, samples_per_second: u32) -> Self {
        let capacity = Self::capacity_for(window, samples_per_second);
        Self {
            window,
            samples_per_second,
            capacity,
            points: VecDeque::with_capacity(capacity),
        }
    }

    fn capacity_for(window: TrendWindow, samples_per_second: u32) -> usize {
        window.seconds() as usize * samples_per_second as usize
    }

    /// Append one point, evicting the oldest ones beyond capacity.
    pub fn push(&mut self, point: TrendPoint) {
        self.points.push_back(point);
        self.evict();
    }

    pub fn extend<I: IntoIterator<Item = TrendPoint>>(&mut self, points: I) {
        self.points.extend(points);
        self.evict();
    }

    fn evict(&mut self) {
        if self.points.len() > self.capacity {
            let overflow = self.points.len() - self.capacity;
            self.points.drain(..overflow);
        }
    }

    /// Switch to another window. The buffer restarts empty.
    pub fn resize(&mut self, window: TrendWindow) {
        self.window = window;
        self.capacity = Self::capacity_for(window, self.samples_per_second);
        self.points = VecDeque::with_capacity(self.capacity);
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    pub fn window(&self) -> TrendWindow {
        self.window
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrendPoint> {
        self.points.iter()
    }

    pub fn snapshot(&self) -> Vec<TrendPoint> {
        self.points.iter().copied().collect()
    }

    pub fn latest(&self) -> Option<&TrendPoint> {
        self.points.back()
    }

    /// Value range for the vertical axis, padded by 5 % (at least 1 A).
    ///
    /// A flat series is widened by 1 A on each side.
    pub fn value_range(&self) -> Option<(i32, i32)> {
        let mut values = self.points.iter().filter_map(TrendPoint::active_value);
        let first = values.next()?;
        let (min, max) = values.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v)));
        if min == max {
            return Some((min - 1, max + 1));
        }
        let pad = (f64::from(max - min) * 0.05).round().max(1.0) as i32;
        Some((min - pad, max + pad))
    }

    /// Decimate the buffer to at most `width` points per segment set.
    ///
    /// Every `ceil(len / width)`-th point is kept. A point without a value ends
    /// the current segment; segments shorter than two points are dropped since
    /// they cannot be drawn as a line.
    pub fn plot_segments(&self, width: usize) -> Vec<Vec<PlotPoint>> {
        let width = width.max(1);
        let step = self.points.len().div_ceil(width).max(1);

        let mut segments = Vec::new();
        let mut current = Vec::new();
        for (index, point) in self.points.iter().enumerate().step_by(step) {
            match point.active_value() {
                Some(value) => current.push(PlotPoint {
                    index,
                    timestamp: point.timestamp,
                    value,
                }),
                None => {
                    if current.len() >= 2 {
                        segments.push(std::mem::take(&mut current));
                    } else {
                        current.clear();
                    }
                }
            }
        }
        if current.len() >= 2 {
            segments.push(current);
        }
        segments
    }
}
