// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-inrush project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Per-tick reading pipeline: converter, then spike filter, then warm-up gate.

use super::converter::convert;
use super::spike_filter::SpikeFilter;
use super::warmup::WarmupGate;
use super::{Reading, Sample};

/// Run state of the three reading stages.
#[derive(Debug, Clone)]
pub struct ReadingPipeline {
    spike_filter: SpikeFilter,
    warmup: WarmupGate,
}

impl ReadingPipeline {
    pub fn new(spike_threshold: i32, warmup_samples: u32) -> Self {
        Self {
            spike_filter: SpikeFilter::new(spike_threshold),
            warmup: WarmupGate::new(warmup_samples),
        }
    }

    /// Turn one raw code into a final value, `None` when nothing is usable.
    pub fn process(&mut self, raw_code: Option<u16>) -> Option<i32> {
        let amps = convert(raw_code?)?;
        let filtered = self.spike_filter.accept(amps);
        self.warmup.admit(filtered)
    }

    pub fn process_sample(&mut self, sample: Sample) -> Reading {
        Reading {
            timestamp: sample.timestamp,
            value: self.process(sample.raw_code),
        }
    }

    /// Forget the spike baseline only; the warm-up count is kept.
    pub fn clear_baseline(&mut self) {
        self.spike_filter.reset();
    }

    /// Reset all stages for a new run.
    pub fn reset(&mut self) {
        self.spike_filter.reset();
        self.warmup.reset();
    }

    pub fn spike_filter(&self) -> &SpikeFilter {
        &self.spike_filter
    }

    pub fn warmup(&self) -> &WarmupGate {
        &self.warmup
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::converter::amps_to_code;
    use chrono::Utc;

    fn feed(pipeline: &mut ReadingPipeline, amps: &[i32]) -> Vec<i32> {
        amps.iter()
            .filter_map(|a| pipeline.process(Some(amps_to_code(f64::from(*a)))))
            .collect()
    }

    #[test]
    fn test_warmup_then_spike_rejection() {
        let mut pipeline = ReadingPipeline::new(10, 2);
        let kept = feed(&mut pipeline, &[5, 5, 5, 40, 6, 7]);
        assert_eq!(kept, vec![5, 5, 6, 7]);
        assert_eq!(pipeline.spike_filter().last_accepted(), Some(7));
    }

    #[test]
    fn test_absent_and_rejected_codes_do_not_consume_warmup() {
        let mut pipeline = ReadingPipeline::new(10, 1);
        assert_eq!(pipeline.process(None), None);
        assert_eq!(pipeline.process(Some(0xFFFF)), None);
        assert_eq!(pipeline.process(Some(100)), None);
        assert_eq!(pipeline.warmup().remaining(), 1);

        assert_eq!(pipeline.process(Some(amps_to_code(12.0))), None);
        assert_eq!(pipeline.process(Some(amps_to_code(12.0))), Some(12));
    }

    #[test]
    fn test_process_sample_keeps_timestamp() {
        let mut pipeline = ReadingPipeline::new(10, 0);
        let now = Utc::now();
        let reading = pipeline.process_sample(Sample {
            timestamp: now,
            raw_code: Some(amps_to_code(3.0)),
        });
        assert_eq!(reading.timestamp, now);
        assert_eq!(reading.value, Some(3));
    }

    #[test]
    fn test_reset_rearms_warmup_and_baseline() {
        let mut pipeline = ReadingPipeline::new(10, 1);
        feed(&mut pipeline, &[5, 5]);
        pipeline.reset();
        assert_eq!(pipeline.spike_filter().last_accepted(), None);
        assert!(pipeline.warmup().is_warming_up());
        assert_eq!(feed(&mut pipeline, &[50, 50]), vec![50]);
    }
}
