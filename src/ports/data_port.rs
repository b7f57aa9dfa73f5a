//! Market-data provider port.

use crate::domain::error::ChartError;
use crate::domain::ohlcv::RawBar;
use chrono::NaiveDate;

/// A source of daily OHLCV rows.
///
/// Implementations return `NotFound` when the instrument is unknown,
/// `Provider` for transient failures, and an empty vector when the
/// instrument exists but has no rows in the inclusive range.
pub trait MarketDataPort {
    fn fetch_ohlcv(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<RawBar>, ChartError>;

    fn list_symbols(&self) -> Result<Vec<String>, ChartError>;
}
