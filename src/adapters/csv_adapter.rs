//! CSV file market-data adapter.
//!
//! One file per instrument, `{SYMBOL}.csv`, with a header row naming at least
//! `date`, `open`, `high`, `low`, `close` and `volume` (case-insensitive, any
//! order, extra columns ignored). Empty cells are read as missing values.

use crate::domain::error::ChartError;
use crate::domain::ohlcv::RawBar;
use crate::ports::data_port::MarketDataPort;
use chrono::NaiveDate;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct CsvAdapter {
    base_path: PathBuf,
}

struct Columns {
    date: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: usize,
}

impl Columns {
    fn from_headers(headers: &csv::StringRecord, path: &str) -> Result<Self, ChartError> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
                .ok_or_else(|| ChartError::Provider {
                    reason: format!("{path}: missing {name} column"),
                })
        };
        Ok(Self {
            date: find("date")?,
            open: find("open")?,
            high: find("high")?,
            low: find("low")?,
            close: find("close")?,
            volume: find("volume")?,
        })
    }
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    /// Finds `{symbol}.csv`, matching the file stem case-insensitively so that
    /// every symbol `list_symbols` reports can be fetched.
    fn csv_path(&self, symbol: &str) -> Result<PathBuf, ChartError> {
        let exact = self.base_path.join(format!("{}.csv", symbol));
        if exact.is_file() {
            return Ok(exact);
        }

        let not_found = || ChartError::NotFound {
            symbol: symbol.to_string(),
        };
        let entries = match fs::read_dir(&self.base_path) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(not_found()),
            Err(e) => {
                return Err(ChartError::Provider {
                    reason: format!(
                        "failed to read directory {}: {}",
                        self.base_path.display(),
                        e
                    ),
                });
            }
        };

        entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .find(|path| {
                path.extension().is_some_and(|ext| ext == "csv")
                    && path
                        .file_stem()
                        .and_then(|stem| stem.to_str())
                        .is_some_and(|stem| stem.eq_ignore_ascii_case(symbol))
            })
            .ok_or_else(not_found)
    }
}

fn cell<'a>(record: &'a csv::StringRecord, index: usize) -> Option<&'a str> {
    record.get(index).map(str::trim).filter(|s| !s.is_empty())
}

fn parse_price(
    record: &csv::StringRecord,
    index: usize,
    name: &str,
    date: NaiveDate,
) -> Result<Option<f64>, ChartError> {
    cell(record, index)
        .map(|raw| {
            raw.parse::<f64>().map_err(|e| ChartError::InvalidRecord {
                date,
                reason: format!("invalid {name} value {raw:?}: {e}"),
            })
        })
        .transpose()
}

fn parse_volume(
    record: &csv::StringRecord,
    index: usize,
    date: NaiveDate,
) -> Result<Option<u64>, ChartError> {
    let Some(raw) = cell(record, index) else {
        return Ok(None);
    };
    if let Ok(volume) = raw.parse::<u64>() {
        return Ok(Some(volume));
    }
    // Some exports write volume as a float, e.g. "1200.0".
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 && v.fract() == 0.0 => Ok(Some(v as u64)),
        _ => Err(ChartError::InvalidRecord {
            date,
            reason: format!("invalid volume value {raw:?}"),
        }),
    }
}

impl MarketDataPort for CsvAdapter {
    fn fetch_ohlcv(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<RawBar>, ChartError> {
        let path = self.csv_path(symbol)?;
        let display = path.display().to_string();
        let content = fs::read_to_string(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => ChartError::NotFound {
                symbol: symbol.to_string(),
            },
            _ => ChartError::Provider {
                reason: format!("failed to read {}: {}", display, e),
            },
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let headers = rdr.headers().map_err(|e| ChartError::Provider {
            reason: format!("{display}: CSV header error: {e}"),
        })?;
        let columns = Columns::from_headers(headers, &display)?;
        let mut bars = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(|e| ChartError::Provider {
                reason: format!("{display}: CSV parse error: {e}"),
            })?;

            let date_str = cell(&record, columns.date).ok_or_else(|| ChartError::Provider {
                reason: format!("{display}: row without a date"),
            })?;
            let date = NaiveDate::parse_from_str(date_str, DATE_FORMAT).map_err(|e| {
                ChartError::Provider {
                    reason: format!("{display}: invalid date {date_str:?}: {e}"),
                }
            })?;

            if date < start_date || date > end_date {
                continue;
            }

            bars.push(RawBar {
                date,
                open: parse_price(&record, columns.open, "open", date)?,
                high: parse_price(&record, columns.high, "high", date)?,
                low: parse_price(&record, columns.low, "low", date)?,
                close: parse_price(&record, columns.close, "close", date)?,
                volume: parse_volume(&record, columns.volume, date)?,
            });
        }

        bars.sort_by_key(|b| b.date);
        Ok(bars)
    }

    fn list_symbols(&self) -> Result<Vec<String>, ChartError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| ChartError::Provider {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut symbols = Vec::new();

        for entry in entries {
            let entry = entry.map_err(|e| ChartError::Provider {
                reason: format!("directory entry error: {}", e),
            })?;

            let name = entry.file_name();
            let name_str = name.to_string_lossy();

            if let Some(symbol) = name_str.strip_suffix(".csv") {
                symbols.push(symbol.to_uppercase());
            }
        }

        symbols.sort();
        Ok(symbols)
    }
}
