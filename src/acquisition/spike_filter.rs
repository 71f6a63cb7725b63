// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-inrush project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Anti-spike filter
//!
//! A candidate that jumps more than `threshold` amperes away from the last
//! accepted reading is replaced by that last accepted reading. The baseline is
//! not moved by a rejected candidate, so a sustained step larger than the
//! threshold keeps being rejected until a reading lands back within range of
//! the baseline.

/// Default maximum jump, in amperes.
pub const DEFAULT_SPIKE_THRESHOLD: i32 = 10;

/// Outcome of [`filter_spike`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpikeDecision {
    /// Value to pass downstream.
    pub value: i32,
    /// Baseline after this candidate.
    pub last_accepted: Option<i32>,
    /// `true` when the candidate was replaced by the baseline.
    pub rejected: bool,
}

/// Stateless form of the filter.
pub fn filter_spike(candidate: i32, last_accepted: Option<i32>, threshold: i32) -> SpikeDecision {
    match last_accepted {
        Some(last) if (candidate - last).abs() > threshold => SpikeDecision {
            value: last,
            last_accepted: Some(last),
            rejected: true,
        },
        _ => SpikeDecision {
            value: candidate,
            last_accepted: Some(candidate),
            rejected: false,
        },
    }
}

/// Stateful anti-spike filter, owned by one run.
#[derive(Debug, Clone)]
pub struct SpikeFilter {
    threshold: i32,
    last_accepted: Option<i32>,
    rejected: u64,
}

impl SpikeFilter {
    pub fn new(threshold: i32) -> Self {
        Self {
            threshold,
            last_accepted: None,
            rejected: 0,
        }
    }

    /// Filter one candidate and return the value to pass downstream.
    pub fn accept(&mut self, candidate: i32) -> i32 {
        let decision = filter_spike(candidate, self.last_accepted, self.threshold);
        self.last_accepted = decision.last_accepted;
        if decision.rejected {
            self.rejected += 1;
        }
        decision.value
    }

    pub fn last_accepted(&self) -> Option<i32> {
        self.last_accepted
    }

    /// Number of candidates replaced since the last reset.
    pub fn rejected_count(&self) -> u64 {
        self.rejected
    }

    pub fn threshold(&self) -> i32 {
        self.threshold
    }

    /// Forget the baseline, used at run start and on buffer clear.
    pub fn reset(&mut self) {
        self.last_accepted = None;
        self.rejected = 0;
    }
}

impl Default for SpikeFilter {
    fn default() -> Self {
        Self::new(DEFAULT_SPIKE_THRESHOLD)
    }
}
