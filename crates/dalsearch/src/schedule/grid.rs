//! Fixed day/time coordinate system for the weekly schedule grid.
//!
//! The grid starts at `start_hour:00` and is divided into `quantum_minutes`
//! rows for `num_hours` hours. Times map to the first row at or after them.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::types::ClockTime;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    #[error("quantum must be a non-zero divisor of 60 minutes, got {0}")]
    InvalidQuantum(u32),

    #[error("grid of {num_hours} hours starting at {start_hour}:00 runs past midnight")]
    PastMidnight { start_hour: u32, num_hours: u32 },
}

/// Grid dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub quantum_minutes: u32,
    pub start_hour: u32,
    pub num_hours: u32,
    /// Height of one row, in pixels
    pub cell_height: u32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            quantum_minutes: 30,
            start_hour: 8,
            num_hours: 14,
            cell_height: 60,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TimeGrid {
    config: GridConfig,
    labels: Vec<ClockTime>,
}

impl TimeGrid {
    pub fn new(config: GridConfig) -> Result<Self, GridError> {
        let quantum = config.quantum_minutes;
        if quantum == 0 || 60 % quantum != 0 {
            return Err(GridError::InvalidQuantum(quantum));
        }
        if config.start_hour + config.num_hours > 24 {
            return Err(GridError::PastMidnight {
                start_hour: config.start_hour,
                num_hours: config.num_hours,
            });
        }

        Ok(Self {
            labels: build_labels(&config),
            config,
        })
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    /// Row labels, strictly increasing.
    pub fn labels(&self) -> &[ClockTime] {
        &self.labels
    }

    pub fn num_rows(&self) -> usize {
        self.labels.len()
    }

    /// Index of the first row whose label is at or after `time`.
    ///
    /// Returns `None` when `time` is past the last row label.
    pub fn row_for(&self, time: ClockTime) -> Option<usize> {
        let minutes = time.minutes_since_midnight();
        // labels are sorted, so the first match is the partition point
        let row = self
            .labels
            .partition_point(|label| label.minutes_since_midnight() < minutes);
        (row < self.labels.len()).then_some(row)
    }

    /// Same as [`TimeGrid::row_for`] on a raw `"HHMM"` string.
    pub fn time_to_row(&self, raw: &str) -> Option<usize> {
        raw.parse().ok().and_then(|t| self.row_for(t))
    }
}

impl Default for TimeGrid {
    fn default() -> Self {
        let config = GridConfig::default();
        Self {
            labels: build_labels(&config),
            config,
        }
    }
}

/// Expects a config already checked by [`TimeGrid::new`].
fn build_labels(config: &GridConfig) -> Vec<ClockTime> {
    let slots_per_hour = 60 / config.quantum_minutes;
    (0..config.num_hours * slots_per_hour)
        .filter_map(|i| {
            let hour = config.start_hour + i / slots_per_hour;
            let minute = (i % slots_per_hour) * config.quantum_minutes;
            ClockTime::new(hour as u8, minute as u8)
        })
        .collect()
}

/// Converts `"HHMM"` to `"h:mm AM/PM"`. Malformed input yields `None`.
pub fn format_time(raw: &str) -> Option<String> {
    raw.parse::<ClockTime>().ok().map(ClockTime::to_12_hour)
}
