// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-inrush project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Change-only compression of the full history
//!
//! Keeps the first point, every point whose value differs from the previously
//! kept one, and the final point so the compressed series spans the whole run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::retention::HistoryPoint;

/// A history point kept by [`compress`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRun {
    pub timestamp: DateTime<Utc>,
    pub value: i32,
}

impl From<HistoryPoint> for ChangeRun {
    fn from(point: HistoryPoint) -> Self {
        Self {
            timestamp: point.timestamp,
            value: point.value,
        }
    }
}

impl From<ChangeRun> for HistoryPoint {
    fn from(run: ChangeRun) -> Self {
        HistoryPoint::new(run.timestamp, run.value)
    }
}

/// Reduce `history` to its value transitions plus the final point.
///
/// Empty only when `history` is empty.
pub fn compress(history: &[HistoryPoint]) -> Vec<ChangeRun> {
    let mut runs: Vec<ChangeRun> = Vec::new();
    for point in history {
        match runs.last() {
            Some(last) if last.value == point.value => {}
            _ => runs.push((*point).into()),
        }
    }

    if let (Some(last_kept), Some(final_point)) = (runs.last(), history.last()) {
        if last_kept.timestamp != final_point.timestamp {
            runs.push((*final_point).into());
        }
    }
    runs
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn series(values: &[i32]) -> Vec<HistoryPoint> {
        let t0 = Utc::now();
        values
            .iter()
            .enumerate()
            .map(|(i, v)| HistoryPoint::new(t0 + Duration::milliseconds(10 * i as i64), *v))
            .collect()
    }

    #[test]
    fn test_transitions_and_final_point() {
        let history = series(&[5, 5, 7, 7, 7]);
        let runs = compress(&history);
        let expected: Vec<ChangeRun> = [history[0], history[2], history[4]]
            .into_iter()
            .map(ChangeRun::from)
            .collect();
        assert_eq!(runs, expected);
    }

    #[test]
    fn test_constant_series_keeps_both_ends() {
        let history = series(&[9, 9, 9]);
        let runs = compress(&history);
        assert_eq!(runs, vec![ChangeRun::from(history[0]), ChangeRun::from(history[2])]);
    }

    #[test]
    fn test_final_transition_not_duplicated() {
        let history = series(&[1, 2]);
        assert_eq!(compress(&history).len(), 2);
    }

    #[test]
    fn test_empty_and_single() {
        assert!(compress(&[]).is_empty());
        let history = series(&[4]);
        assert_eq!(compress(&history), vec![ChangeRun::from(history[0])]);
    }

    #[test]
    fn test_compression_is_idempotent() {
        let history = series(&[3, 3, 8, 8, 2, 2, 2, 9, 9]);
        let once = compress(&history);
        let reinterpreted: Vec<HistoryPoint> = once.iter().copied().map(Into::into).collect();
        assert_eq!(compress(&reinterpreted), once);
    }

    #[test]
    fn test_bounds_match_input() {
        let history = series(&[1, 4, 4, 4, 6, 6]);
        let runs = compress(&history);
        assert_eq!(runs.first().unwrap().timestamp, history[0].timestamp);
        assert_eq!(runs.last().unwrap().timestamp, history[5].timestamp);
    }
}
