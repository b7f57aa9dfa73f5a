//! OHLCV representations: raw provider rows and the validated price series.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::error::ChartError;

/// A row as delivered by a market-data provider. Any numeric field may be
/// missing; the cleaner decides what survives.
#[derive(Debug, Clone, PartialEq)]
pub struct RawBar {
    pub date: NaiveDate,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<u64>,
}

impl RawBar {
    /// A fully populated row.
    pub fn complete(
        date: NaiveDate,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: u64,
    ) -> Self {
        Self {
            date,
            open: Some(open),
            high: Some(high),
            low: Some(low),
            close: Some(close),
            volume: Some(volume),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OhlcvRecord {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl OhlcvRecord {
    /// Checks high >= max(open, close, low) and low <= min(open, close, high).
    pub fn ordering_violation(&self) -> Option<String> {
        let body_high = self.open.max(self.close);
        let body_low = self.open.min(self.close);
        if self.high < body_high.max(self.low) {
            return Some(format!(
                "high {} is below max(open, close, low) {}",
                self.high,
                body_high.max(self.low)
            ));
        }
        if self.low > body_low.min(self.high) {
            return Some(format!(
                "low {} is above min(open, close, high) {}",
                self.low,
                body_low.min(self.high)
            ));
        }
        None
    }
}

/// Chronologically ordered daily records for one instrument.
///
/// Immutable once built; derivations produce new values.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    symbol: String,
    records: Vec<OhlcvRecord>,
}

impl PriceSeries {
    /// Builds a series, enforcing strictly increasing dates.
    pub fn new(symbol: impl Into<String>, records: Vec<OhlcvRecord>) -> Result<Self, ChartError> {
        for pair in records.windows(2) {
            if pair[1].date <= pair[0].date {
                return Err(ChartError::InvalidRecord {
                    date: pair[1].date,
                    reason: format!(
                        "date is not after the preceding record ({})",
                        pair[0].date
                    ),
                });
            }
        }
        Ok(Self {
            symbol: symbol.into(),
            records,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn records(&self) -> &[OhlcvRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.records.iter().map(|r| r.date).collect()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.close).collect()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.records.first().map(|r| r.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.records.last().map(|r| r.date)
    }
}
