// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-inrush project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Run export
//!
//! An [`ExportBundle`] gathers everything needed to analyse a run offline:
//!
//! - run metadata (transport, channel, sample period, trend window)
//! - the full series, sorted by time, with the offset from the first point
//! - the change-only series produced by [`compress`]
//! - vertical scaling for a chart of the change-only series
//!
//! Bundles are written as JSON or YAML.

pub mod compressor;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::acquisition::Channel;
use crate::config::ExportFormat;
use crate::retention::HistoryPoint;

pub use compressor::{compress, ChangeRun};

/// Unit label written in the metadata.
pub const UNITS: &str = "amperes (integer)";

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("No data has been recorded yet")]
    NoData,

    #[error("Failed to write export file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write export: {0}")]
    Stream(#[source] std::io::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML serialization failed: {0}")]
    Yaml(#[from] serde_yml::Error),
}

/// Describes the run an export comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub saved_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    /// Human readable link description (`COM3 @ 115200, Unit 2`)
    pub transport: String,
    pub channel: Channel,
    pub sample_period_ms: u64,
    pub window_seconds: u32,
    pub units: String,
}

impl RunMetadata {
    pub fn new(
        transport: impl Into<String>,
        channel: Channel,
        sample_period_ms: u64,
        window_seconds: u32,
    ) -> Self {
        Self {
            saved_at: Utc::now(),
            started_at: None,
            transport: transport.into(),
            channel,
            sample_period_ms,
            window_seconds,
            units: UNITS.to_string(),
        }
    }

    pub fn with_start(mut self, started_at: Option<DateTime<Utc>>) -> Self {
        self.started_at = started_at;
        self
    }
}

/// One exported point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRow {
    pub timestamp: DateTime<Utc>,
    pub amps: i32,
    /// Seconds since the first point of the run
    pub t_s: f64,
}

/// Axis set-up for a chart of the change-only series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartScale {
    pub title: String,
    pub x_title: String,
    pub y_title: String,
    pub y_min: f64,
    pub y_max: f64,
}

impl ChartScale {
    /// Scale for `values`; `None` when there is nothing to draw.
    ///
    /// A flat series is first widened by 1 A on each side, then the range is
    /// padded by 5 % with a minimum of 1 A.
    pub fn for_values(channel: Channel, values: &[i32]) -> Option<Self> {
        let mut min = *values.iter().min()?;
        let mut max = *values.iter().max()?;
        if min == max {
            min -= 1;
            max += 1;
        }
        let pad = (f64::from(max - min) * 0.05).round().max(1.0);
        Some(Self {
            title: format!("Channel {} - only changes (A)", channel),
            x_title: "Time, s".to_string(),
            y_title: "Current, A".to_string(),
            y_min: f64::from(min) - pad,
            y_max: f64::from(max) + pad,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportBundle {
    pub metadata: RunMetadata,
    pub data: Vec<ExportRow>,
    pub changes: Vec<ExportRow>,
    pub chart: Option<ChartScale>,
}

impl ExportBundle {
    /// Build a bundle from a history snapshot.
    pub fn build(metadata: RunMetadata, history: &[HistoryPoint]) -> Result<Self, ExportError> {
        let mut rows = history.to_vec();
        rows.sort_by_key(|p| p.timestamp);
        let origin = rows.first().ok_or(ExportError::NoData)?.timestamp;

        let to_row = |timestamp: DateTime<Utc>, amps: i32| ExportRow {
            timestamp,
            amps,
            t_s: (timestamp - origin).num_microseconds().unwrap_or(i64::MAX) as f64 / 1e6,
        };

        let changes = compress(&rows);
        let change_values: Vec<i32> = changes.iter().map(|c| c.value).collect();
        let chart = ChartScale::for_values(metadata.channel, &change_values);

        Ok(Self {
            data: rows.iter().map(|p| to_row(p.timestamp, p.value)).collect(),
            changes: changes.iter().map(|c| to_row(c.timestamp, c.value)).collect(),
            chart,
            metadata,
        })
    }

    /// Serialize the bundle into `writer`.
    pub fn write<W: Write>(&self, mut writer: W, format: ExportFormat) -> Result<(), ExportError> {
        match format {
            ExportFormat::Json => serde_json::to_writer_pretty(&mut writer, self)?,
            ExportFormat::Yaml => {
                let yaml = serde_yml::to_string(self)?;
                writer
                    .write_all(yaml.as_bytes())
                    .map_err(ExportError::Stream)?;
            }
        }
        Ok(())
    }

    /// Write the bundle to `path`, replacing any existing file.
    pub fn save<P: AsRef<Path>>(&self, path: P, format: ExportFormat) -> Result<(), ExportError> {
        let path = path.as_ref();
        let io_error = |source| ExportError::Io {
            path: path.to_path_buf(),
            source,
        };

        let file = File::create(path).map_err(io_error)?;
        let mut writer = BufWriter::new(file);
        self.write(&mut writer, format)?;
        writer.flush().map_err(io_error)?;

        info!(
            "Exported {} points ({} changes) to {}",
            self.data.len(),
            self.changes.len(),
            path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::Duration;

    fn metadata() -> RunMetadata {
        RunMetadata::new("COM3 @ 115200, Unit 2", Channel::clamped(1), 10, 60)
    }

    #[test]
    fn test_build_requires_data() {
        assert!(matches!(
            ExportBundle::build(metadata(), &[]),
            Err(ExportError::NoData)
        ));
    }

    #[test]
    fn test_build_sorts_and_offsets() {
        let t0 = Utc::now();
        let history = vec![
            HistoryPoint::new(t0 + Duration::milliseconds(20), 7),
            HistoryPoint::new(t0, 5),
            HistoryPoint::new(t0 + Duration::milliseconds(10), 5),
        ];
        let bundle = ExportBundle::build(metadata(), &history).unwrap();

        let amps: Vec<i32> = bundle.data.iter().map(|r| r.amps).collect();
        assert_eq!(amps, vec![5, 5, 7]);
        assert_relative_eq!(bundle.data[2].t_s, 0.02, epsilon = 1e-9);

        let changes: Vec<i32> = bundle.changes.iter().map(|r| r.amps).collect();
        assert_eq!(changes, vec![5, 7]);
    }

    #[test]
    fn test_chart_scale() {
        let channel = Channel::clamped(4);
        let flat = ChartScale::for_values(channel, &[10, 10]).unwrap();
        assert_relative_eq!(flat.y_min, 8.0);
        assert_relative_eq!(flat.y_max, 12.0);

        let wide = ChartScale::for_values(channel, &[0, 60]).unwrap();
        assert_relative_eq!(wide.y_min, -3.0);
        assert_relative_eq!(wide.y_max, 63.0);
        assert!(wide.title.contains("Channel 4"));

        assert!(ChartScale::for_values(channel, &[]).is_none());
    }

    #[test]
    fn test_write_json_and_yaml() {
        let history = vec![HistoryPoint::new(Utc::now(), 12)];
        let bundle = ExportBundle::build(metadata(), &history).unwrap();

        let mut json = Vec::new();
        bundle.write(&mut json, ExportFormat::Json).unwrap();
        let parsed: ExportBundle = serde_json::from_slice(&json).unwrap();
        assert_eq!(parsed.data.len(), 1);
        assert_eq!(parsed.metadata.units, UNITS);

        let mut yaml = Vec::new();
        bundle.write(&mut yaml, ExportFormat::Yaml).unwrap();
        assert!(String::from_utf8(yaml).unwrap().contains("amps: 12"));
    }
}
