//! Trend indicators derived from a [`PriceSeries`].
//!
//! - `IndicatorPoint`: one date-aligned value, undefined during warmup
//! - `WindowMode`: how the warmup region is treated
//! - `IndicatorSeries`: a moving-average series aligned with its source

pub mod sma;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::error::ChartError;
use crate::domain::ohlcv::PriceSeries;

pub use sma::moving_average;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorPoint {
    pub date: NaiveDate,
    pub value: Option<f64>,
}

/// Treatment of the first `window - 1` observations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowMode {
    /// Undefined until a full window of history exists.
    #[default]
    Strict,
    /// Mean of whatever prefix is available until the window fills.
    Partial,
}

impl FromStr for WindowMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Ok(WindowMode::Strict),
            "partial" => Ok(WindowMode::Partial),
            other => Err(format!("unknown window mode '{other}' (expected strict or partial)")),
        }
    }
}

impl fmt::Display for WindowMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WindowMode::Strict => write!(f, "strict"),
            WindowMode::Partial => write!(f, "partial"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSeries {
    pub window: usize,
    pub mode: WindowMode,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    /// Display label, e.g. `50-Day MA`.
    pub fn label(&self) -> String {
        format!("{}-Day MA", self.window)
    }

    pub fn defined_count(&self) -> usize {
        self.values.iter().filter(|p| p.value.is_some()).count()
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.values.iter().map(|p| p.date)
    }

    pub fn value_at(&self, date: NaiveDate) -> Option<f64> {
        self.values
            .binary_search_by_key(&date, |p| p.date)
            .ok()
            .and_then(|i| self.values[i].value)
    }
}

/// Computes one moving average per window, keeping the caller's order.
pub fn moving_averages(
    series: &PriceSeries,
    windows: &[usize],
    mode: WindowMode,
) -> Result<Vec<IndicatorSeries>, ChartError> {
    windows
        .iter()
        .map(|&window| moving_average(series, window, mode))
        .collect()
}

/// Parses a comma-separated window list such as `50,200`.
///
/// Every token must be a positive integer; order is preserved.
pub fn parse_windows(input: &str) -> Result<Vec<usize>, ChartError> {
    let mut windows = Vec::new();
    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(ChartError::Computation {
                reason: "empty entry in window list".to_string(),
            });
        }
        let window: usize = trimmed.parse().map_err(|_| ChartError::Computation {
            reason: format!("window '{trimmed}' is not a positive integer"),
        })?;
        if window == 0 {
            return Err(ChartError::Computation {
                reason: "window must be at least 1".to_string(),
            });
        }
        windows.push(window);
    }
    Ok(windows)
}
