#![allow(dead_code)]

use chrono::NaiveDate;
use pricechart::domain::error::ChartError;
pub use pricechart::domain::ohlcv::RawBar;
use pricechart::ports::data_port::MarketDataPort;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// In-memory provider. Honors the requested date range and counts calls.
pub struct MockDataPort {
    pub data: HashMap<String, Vec<RawBar>>,
    pub errors: HashMap<String, ChartError>,
    pub calls: AtomicUsize,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<RawBar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(
            symbol.to_string(),
            ChartError::Provider {
                reason: reason.to_string(),
            },
        );
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

impl MarketDataPort for MockDataPort {
    fn fetch_ohlcv(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<RawBar>, ChartError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.errors.get(symbol) {
            return Err(err.clone());
        }
        match self.data.get(symbol) {
            Some(bars) => Ok(bars
                .iter()
                .filter(|b| b.date >= start_date && b.date <= end_date)
                .cloned()
                .collect()),
            None => Err(ChartError::NotFound {
                symbol: symbol.to_string(),
            }),
        }
    }

    fn list_symbols(&self) -> Result<Vec<String>, ChartError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn make_bar(date: &str, close: f64) -> RawBar {
    RawBar::complete(
        NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
        close - 1.0,
        close + 1.0,
        close - 2.0,
        close,
        1000,
    )
}

/// `count` consecutive calendar days from `start` with closes from `closes`
/// (cycled). High and low sit 1% either side, so every positive close gives a
/// valid bar.
pub fn generate_bars(start: NaiveDate, count: usize, closes: &[f64]) -> Vec<RawBar> {
    (0..count)
        .map(|i| {
            let close = closes[i % closes.len()];
            RawBar::complete(
                start + chrono::Duration::days(i as i64),
                close,
                close * 1.01,
                close * 0.99,
                close,
                1_000 + i as u64,
            )
        })
        .collect()
}

/// Writes bars in the CSV layout the file adapter reads.
pub fn bars_to_csv(bars: &[RawBar]) -> String {
    let cell = |v: Option<f64>| v.map(|x| x.to_string()).unwrap_or_default();
    let mut out = String::from("date,open,high,low,close,volume\n");
    for b in bars {
        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            b.date,
            cell(b.open),
            cell(b.high),
            cell(b.low),
            cell(b.close),
            b.volume.map(|v| v.to_string()).unwrap_or_default()
        ));
    }
    out
}
