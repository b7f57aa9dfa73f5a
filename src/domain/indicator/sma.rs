//! Simple Moving Average over closing prices.
//!
//! O(n) sliding window: each step adds the entering close and subtracts the
//! one leaving the window.
//! Strict warmup: first (window-1) points undefined.
//! Partial warmup: first (window-1) points are prefix means.

use crate::domain::error::ChartError;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, WindowMode};
use crate::domain::ohlcv::PriceSeries;

pub fn moving_average(
    series: &PriceSeries,
    window: usize,
    mode: WindowMode,
) -> Result<IndicatorSeries, ChartError> {
    if window == 0 {
        return Err(ChartError::Computation {
            reason: "moving average window must be at least 1".to_string(),
        });
    }

    let records = series.records();
    let mut values = Vec::with_capacity(records.len());
    let mut window_sum: f64 = 0.0;

    for (i, record) in records.iter().enumerate() {
        window_sum += record.close;
        if i >= window {
            window_sum -= records[i - window].close;
        }

        let filled = i + 1 >= window;
        let value = match (filled, mode) {
            (true, _) => Some(window_sum / window as f64),
            (false, WindowMode::Partial) => Some(window_sum / (i + 1) as f64),
            (false, WindowMode::Strict) => None,
        };

        values.push(IndicatorPoint {
            date: record.date,
            value,
        });
    }

    Ok(IndicatorSeries {
        window,
        mode,
        values,
    })
}
