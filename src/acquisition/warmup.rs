// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-inrush project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Warm-up gate
//!
//! The transducer reports a short false-start transient right after its
//! channels are reconfigured. The gate swallows the first `threshold` readings
//! that reach it in each run.

/// Default number of readings discarded at run start.
pub const DEFAULT_WARMUP_SAMPLES: u32 = 10;

#[derive(Debug, Clone)]
pub struct WarmupGate {
    threshold: u32,
    remaining: u32,
}

impl WarmupGate {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            remaining: threshold,
        }
    }

    /// Pass `value` through once the warm-up count is exhausted.
    pub fn admit(&mut self, value: i32) -> Option<i32> {
        if self.remaining > 0 {
            self.remaining -= 1;
            None
        } else {
            Some(value)
        }
    }

    pub fn is_warming_up(&self) -> bool {
        self.remaining > 0
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Re-arm the gate for a new run.
    pub fn reset(&mut self) {
        self.remaining = self.threshold;
    }
}

impl Default for WarmupGate {
    fn default() -> Self {
        Self::new(DEFAULT_WARMUP_SAMPLES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discards_first_readings() {
        let mut gate = WarmupGate::new(3);
        assert_eq!(gate.admit(1), None);
        assert_eq!(gate.admit(2), None);
        assert_eq!(gate.admit(3), None);
        assert!(!gate.is_warming_up());
        assert_eq!(gate.admit(4), Some(4));
        assert_eq!(gate.admit(5), Some(5));
    }

    #[test]
    fn test_zero_threshold_passes_everything() {
        let mut gate = WarmupGate::new(0);
        assert_eq!(gate.admit(7), Some(7));
    }

    #[test]
    fn test_reset_rearms() {
        let mut gate = WarmupGate::new(1);
        gate.admit(1);
        assert_eq!(gate.admit(2), Some(2));
        gate.reset();
        assert_eq!(gate.remaining(), 1);
        assert_eq!(gate.admit(3), None);
    }
}
