//! SQLite market-data adapter.
//!
//! Stores one row per (symbol, date). Price and volume columns are nullable so
//! that gaps coming from the upstream feed survive until the cleaner sees them.

use crate::domain::error::ChartError;
use crate::domain::ohlcv::RawBar;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::MarketDataPort;
use chrono::NaiveDate;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection};

const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn provider_error(e: impl std::fmt::Display) -> ChartError {
    ChartError::Provider {
        reason: format!("sqlite: {e}"),
    }
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, ChartError> {
        let db_path = config
            .get_string("sqlite", "path")
            .ok_or_else(|| ChartError::ConfigMissing {
                section: "sqlite".into(),
                key: "path".into(),
            })?;

        let pool_size = config.get_int("sqlite", "pool_size", 4);
        let pool_size = u32::try_from(pool_size)
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| {
                ChartError::config_invalid("sqlite", "pool_size", "pool_size must be positive")
            })?;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(provider_error)?;

        Ok(Self { pool })
    }

    /// Single-connection in-memory database; the pool size of one keeps every
    /// caller on the same database.
    pub fn in_memory() -> Result<Self, ChartError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(provider_error)?;

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, ChartError> {
        self.pool.get().map_err(provider_error)
    }

    pub fn initialize_schema(&self) -> Result<(), ChartError> {
        self.conn()?
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS ohlcv (
                    symbol TEXT NOT NULL,
                    date TEXT NOT NULL,
                    open REAL,
                    high REAL,
                    low REAL,
                    close REAL,
                    volume INTEGER,
                    PRIMARY KEY (symbol, date)
                );
                CREATE INDEX IF NOT EXISTS idx_ohlcv_date ON ohlcv(date);",
            )
            .map_err(provider_error)
    }

    /// Upserts rows for `symbol` in a single transaction.
    pub fn insert_bars(&self, symbol: &str, bars: &[RawBar]) -> Result<(), ChartError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(provider_error)?;

        for bar in bars {
            let volume = bar
                .volume
                .map(i64::try_from)
                .transpose()
                .map_err(|_| ChartError::InvalidRecord {
                    date: bar.date,
                    reason: "volume does not fit in a 64-bit signed column".to_string(),
                })?;
            tx.execute(
                "INSERT OR REPLACE INTO ohlcv (symbol, date, open, high, low, close, volume)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    symbol,
                    bar.date.format(DATE_FORMAT).to_string(),
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close,
                    volume
                ],
            )
            .map_err(provider_error)?;
        }

        tx.commit().map_err(provider_error)
    }

}

/// Runs on the caller's connection; a second checkout would block a
/// single-connection pool.
fn symbol_exists(conn: &Connection, symbol: &str) -> Result<bool, ChartError> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM ohlcv WHERE symbol = ?1)",
        params![symbol],
        |row| row.get(0),
    )
    .map_err(provider_error)
}

impl MarketDataPort for SqliteAdapter {
    fn fetch_ohlcv(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<RawBar>, ChartError> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare(
                "SELECT date, open, high, low, close, volume
                 FROM ohlcv
                 WHERE symbol = ?1 AND date >= ?2 AND date <= ?3
                 ORDER BY date ASC",
            )
            .map_err(provider_error)?;

        let rows = stmt
            .query_map(
                params![
                    symbol,
                    start_date.format(DATE_FORMAT).to_string(),
                    end_date.format(DATE_FORMAT).to_string()
                ],
                |row| {
                    let date_str: String = row.get(0)?;
                    let date = NaiveDate::parse_from_str(&date_str, DATE_FORMAT).map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(
                            0,
                            rusqlite::types::Type::Text,
                            Box::new(e),
                        )
                    })?;
                    let volume: Option<i64> = row.get(5)?;
                    Ok(RawBar {
                        date,
                        open: row.get(1)?,
                        high: row.get(2)?,
                        low: row.get(3)?,
                        close: row.get(4)?,
                        // Negative volumes are treated as missing.
                        volume: volume.and_then(|v| u64::try_from(v).ok()),
                    })
                },
            )
            .map_err(provider_error)?;

        let bars = rows
            .collect::<Result<Vec<_>, _>>()
            .map_err(provider_error)?;

        if bars.is_empty() && !symbol_exists(&conn, symbol)? {
            return Err(ChartError::NotFound {
                symbol: symbol.to_string(),
            });
        }
        Ok(bars)
    }

    fn list_symbols(&self) -> Result<Vec<String>, ChartError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT DISTINCT symbol FROM ohlcv ORDER BY symbol")
            .map_err(provider_error)?;
        let rows = stmt
            .query_map([], |row| row.get(0))
            .map_err(provider_error)?;
        rows.collect::<Result<Vec<String>, _>>()
            .map_err(provider_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn seeded() -> SqliteAdapter {
        let adapter = SqliteAdapter::in_memory().unwrap();
        adapter.initialize_schema().unwrap();
        adapter
            .insert_bars(
                "BHP",
                &[
                    RawBar::complete(date(2024, 1, 1), 100.0, 101.0, 99.0, 100.5, 1000),
                    RawBar::complete(date(2024, 1, 2), 100.5, 102.0, 100.0, 101.5, 1500),
                    RawBar {
                        date: date(2024, 1, 3),
                        open: Some(101.5),
                        high: Some(102.5),
                        low: Some(101.0),
                        close: None,
                        volume: None,
                    },
                ],
            )
            .unwrap();
        adapter
            .insert_bars(
                "CBA",
                &[RawBar::complete(date(2024, 1, 1), 150.0, 151.0, 149.0, 150.5, 2000)],
            )
            .unwrap();
        adapter
    }

    #[test]
    fn from_config_missing_path() {
        let config = FileConfigAdapter::from_string("[sqlite]\npool_size = 2\n").unwrap();
        match SqliteAdapter::from_config(&config) {
            Err(ChartError::ConfigMissing { section, key }) => {
                assert_eq!(section, "sqlite");
                assert_eq!(key, "path");
            }
            Err(other) => panic!("expected ConfigMissing, got: {other}"),
            Ok(_) => panic!("expected error, got Ok"),
        }
    }

    #[test]
    fn from_config_rejects_zero_pool() {
        let config =
            FileConfigAdapter::from_string("[sqlite]\npath = x.db\npool_size = 0\n").unwrap();
        assert!(matches!(
            SqliteAdapter::from_config(&config),
            Err(ChartError::ConfigInvalid { .. })
        ));
    }

    #[test]
    fn from_config_opens_file_database() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("prices.db");
        let ini = format!("[sqlite]\npath = {}\n", path.display());
        let config = FileConfigAdapter::from_string(&ini).unwrap();
        let adapter = SqliteAdapter::from_config(&config).unwrap();
        adapter.initialize_schema().unwrap();
        assert!(adapter.list_symbols().unwrap().is_empty());
    }

    #[test]
    fn fetch_returns_rows_in_range_with_gaps_preserved() {
        let adapter = seeded();
        let fetched = adapter
            .fetch_ohlcv("BHP", date(2024, 1, 1), date(2024, 1, 3))
            .unwrap();

        assert_eq!(fetched.len(), 3);
        assert_eq!(fetched[1].close, Some(101.5));
        assert_eq!(fetched[1].volume, Some(1500));
        assert_eq!(fetched[2].close, None);
        assert_eq!(fetched[2].volume, None);
    }

    #[test]
    fn fetch_range_is_inclusive() {
        let adapter = seeded();
        let fetched = adapter
            .fetch_ohlcv("BHP", date(2024, 1, 2), date(2024, 1, 2))
            .unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].date, date(2024, 1, 2));
    }

    #[test]
    fn known_symbol_outside_range_is_empty() {
        let adapter = seeded();
        let fetched = adapter
            .fetch_ohlcv("CBA", date(2023, 1, 1), date(2023, 12, 31))
            .unwrap();
        assert!(fetched.is_empty());
    }

    #[test]
    fn unknown_symbol_is_not_found() {
        let adapter = seeded();
        let err = adapter
            .fetch_ohlcv("XYZ", date(2024, 1, 1), date(2024, 1, 31))
            .unwrap_err();
        assert_eq!(
            err,
            ChartError::NotFound {
                symbol: "XYZ".into()
            }
        );
    }

    #[test]
    fn single_connection_pool_reports_missing_symbols() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("prices.db");
        let ini = format!("[sqlite]\npath = {}\npool_size = 1\n", path.display());
        let config = FileConfigAdapter::from_string(&ini).unwrap();
        let adapter = SqliteAdapter::from_config(&config).unwrap();
        adapter.initialize_schema().unwrap();
        adapter
            .insert_bars(
                "BHP",
                &[RawBar::complete(date(2024, 1, 1), 100.0, 101.0, 99.0, 100.5, 1000)],
            )
            .unwrap();

        assert_eq!(
            adapter
                .fetch_ohlcv("XYZ", date(2024, 1, 1), date(2024, 1, 31))
                .unwrap_err(),
            ChartError::NotFound {
                symbol: "XYZ".into()
            }
        );
        assert!(adapter
            .fetch_ohlcv("BHP", date(2023, 1, 1), date(2023, 1, 31))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn insert_replaces_existing_rows() {
        let adapter = seeded();
        adapter
            .insert_bars(
                "CBA",
                &[RawBar::complete(date(2024, 1, 1), 1.0, 2.0, 0.5, 1.5, 10)],
            )
            .unwrap();
        let fetched = adapter
            .fetch_ohlcv("CBA", date(2024, 1, 1), date(2024, 1, 1))
            .unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].close, Some(1.5));
    }

    #[test]
    fn list_symbols_is_sorted_and_distinct() {
        let adapter = seeded();
        assert_eq!(adapter.list_symbols().unwrap(), vec!["BHP", "CBA"]);
    }
}
