//! Request-scoped data-to-chart pipeline: fetch, clean, compute indicators,
//! compose.

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::domain::chart::{compose, ChartSpec};
use crate::domain::cleaner::{clean, InvalidRecordPolicy};
use crate::domain::error::ChartError;
use crate::domain::fetcher::{check_range, normalize_symbol, DataFetcher};
use crate::domain::indicator::{moving_averages, IndicatorSeries, WindowMode};
use crate::domain::layout::RenderPolicy;
use crate::domain::ohlcv::PriceSeries;

pub const DEFAULT_WINDOWS: [usize; 2] = [50, 200];

/// Caller input: which instrument and which inclusive date range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartRequest {
    pub symbol: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl ChartRequest {
    /// Validates the inputs and canonicalizes the symbol.
    pub fn new(symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<Self, ChartError> {
        check_range(start, end)?;
        let symbol = normalize_symbol(symbol)?;
        if end > chrono::Local::now().date_naive() {
            warn!(%symbol, %end, "end date is in the future; data will stop at the latest session");
        }
        Ok(Self { symbol, start, end })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartOptions {
    /// Moving-average windows, in display order.
    pub windows: Vec<usize>,
    pub mode: WindowMode,
    pub record_policy: InvalidRecordPolicy,
    pub layout: RenderPolicy,
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            windows: DEFAULT_WINDOWS.to_vec(),
            mode: WindowMode::Strict,
            record_policy: InvalidRecordPolicy::Reject,
            layout: RenderPolicy::default(),
        }
    }
}

/// A cleaned series together with its indicators, before composition.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedSeries {
    pub series: PriceSeries,
    pub indicators: Vec<IndicatorSeries>,
}

pub fn prepare(
    fetcher: &DataFetcher,
    request: &ChartRequest,
    options: &ChartOptions,
) -> Result<PreparedSeries, ChartError> {
    let rows = fetcher.fetch(&request.symbol, request.start, request.end)?;
    info!(symbol = %request.symbol, rows = rows.len(), "fetched rows");

    let series = clean(&request.symbol, &rows, options.record_policy)?;
    info!(
        symbol = %request.symbol,
        records = series.len(),
        dropped = rows.len() - series.len(),
        "cleaned series"
    );

    let indicators = moving_averages(&series, &options.windows, options.mode)?;
    Ok(PreparedSeries { series, indicators })
}

/// Runs the whole pipeline. Any failure is returned as a typed error; no
/// partial chart is produced.
pub fn build_chart(
    fetcher: &DataFetcher,
    request: &ChartRequest,
    options: &ChartOptions,
) -> Result<ChartSpec, ChartError> {
    let prepared = prepare(fetcher, request, options)?;
    let chart = compose(&prepared.series, &prepared.indicators, &options.layout)?;
    info!(
        symbol = %request.symbol,
        traces = chart.trace_count(),
        "composed chart"
    );
    Ok(chart)
}
