//! Validation and cleaning of raw provider rows into a [`PriceSeries`].

use std::fmt;
use std::str::FromStr;

use tracing::{debug, warn};

use crate::domain::error::ChartError;
use crate::domain::ohlcv::{OhlcvRecord, PriceSeries, RawBar};

/// What to do with a row that carries close and volume but breaks the
/// OHLC invariants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InvalidRecordPolicy {
    #[default]
    Reject,
    Warn,
}

impl FromStr for InvalidRecordPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "reject" => Ok(InvalidRecordPolicy::Reject),
            "warn" => Ok(InvalidRecordPolicy::Warn),
            other => Err(format!(
                "unknown invalid-record policy '{other}' (expected reject or warn)"
            )),
        }
    }
}

impl fmt::Display for InvalidRecordPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidRecordPolicy::Reject => write!(f, "reject"),
            InvalidRecordPolicy::Warn => write!(f, "warn"),
        }
    }
}

/// Outcome of inspecting one raw row.
enum RowCheck {
    Keep(OhlcvRecord),
    Skip,
    Invalid { record: Option<OhlcvRecord>, reason: String },
}

fn check_row(row: &RawBar) -> RowCheck {
    let (Some(close), Some(volume)) = (row.close, row.volume) else {
        return RowCheck::Skip;
    };
    let (Some(open), Some(high), Some(low)) = (row.open, row.high, row.low) else {
        return RowCheck::Invalid {
            record: None,
            reason: "missing open, high or low".to_string(),
        };
    };

    for (name, value) in [("open", open), ("high", high), ("low", low), ("close", close)] {
        if !value.is_finite() || value <= 0.0 {
            return RowCheck::Invalid {
                record: None,
                reason: format!("{name} must be a positive number, got {value}"),
            };
        }
    }

    let record = OhlcvRecord {
        date: row.date,
        open,
        high,
        low,
        close,
        volume,
    };
    match record.ordering_violation() {
        Some(reason) => RowCheck::Invalid {
            record: Some(record),
            reason,
        },
        None => RowCheck::Keep(record),
    }
}

/// Normalizes raw rows into a validated series.
///
/// Rows missing close or volume are dropped. Nothing is forward-filled.
/// Dates must already be strictly increasing.
pub fn clean(
    symbol: &str,
    rows: &[RawBar],
    policy: InvalidRecordPolicy,
) -> Result<PriceSeries, ChartError> {
    let mut records = Vec::with_capacity(rows.len());
    let mut dropped = 0usize;

    for row in rows {
        match check_row(row) {
            RowCheck::Keep(record) => records.push(record),
            RowCheck::Skip => {
                dropped += 1;
                debug!(symbol, date = %row.date, "dropping row without close or volume");
            }
            RowCheck::Invalid { record, reason } => match policy {
                InvalidRecordPolicy::Reject => {
                    return Err(ChartError::InvalidRecord {
                        date: row.date,
                        reason,
                    });
                }
                InvalidRecordPolicy::Warn => match record {
                    Some(record) => {
                        warn!(
                            symbol,
                            date = %row.date,
                            %reason,
                            "keeping record that violates OHLC ordering"
                        );
                        records.push(record);
                    }
                    None => {
                        dropped += 1;
                        warn!(symbol, date = %row.date, %reason, "dropping unrepresentable record");
                    }
                },
            },
        }
    }

    if records.is_empty() {
        return Err(ChartError::EmptySeries {
            symbol: symbol.to_string(),
        });
    }
    if dropped > 0 {
        debug!(symbol, dropped, kept = records.len(), "cleaned price rows");
    }

    PriceSeries::new(symbol, records)
}
