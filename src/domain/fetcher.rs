//! Boundary between the pipeline and a market-data provider.
//!
//! Validates inputs before the provider is touched, canonicalizes the
//! symbol, bounds each provider call by a timeout and applies an explicit,
//! bounded retry policy to transient failures.

use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::domain::error::ChartError;
use crate::domain::ohlcv::RawBar;
use crate::ports::data_port::MarketDataPort;

pub type SharedDataPort = Arc<dyn MarketDataPort + Send + Sync>;

const MAX_SYMBOL_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchPolicy {
    pub timeout: Duration,
    /// Extra attempts after the first one; only retryable errors are retried.
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_retries: 0,
            retry_delay: Duration::from_millis(500),
        }
    }
}

/// Trims and uppercases a ticker, rejecting empty or malformed input.
pub fn normalize_symbol(raw: &str) -> Result<String, ChartError> {
    let symbol = raw.trim().to_uppercase();
    if symbol.is_empty() {
        return Err(ChartError::InvalidSymbol {
            symbol: raw.to_string(),
            reason: "symbol is empty".to_string(),
        });
    }
    if symbol.len() > MAX_SYMBOL_LEN {
        return Err(ChartError::InvalidSymbol {
            symbol: raw.to_string(),
            reason: format!("symbol is longer than {MAX_SYMBOL_LEN} characters"),
        });
    }
    if let Some(bad) = symbol
        .chars()
        .find(|&c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '=')))
    {
        return Err(ChartError::InvalidSymbol {
            symbol: raw.to_string(),
            reason: format!("unexpected character {bad:?}"),
        });
    }
    Ok(symbol)
}

pub fn check_range(start: NaiveDate, end: NaiveDate) -> Result<(), ChartError> {
    if start > end {
        return Err(ChartError::InvalidRange { start, end });
    }
    Ok(())
}

pub struct DataFetcher {
    port: SharedDataPort,
    policy: FetchPolicy,
}

impl DataFetcher {
    pub fn new(port: SharedDataPort, policy: FetchPolicy) -> Self {
        Self { port, policy }
    }

    pub fn policy(&self) -> FetchPolicy {
        self.policy
    }

    /// Fetches rows for the inclusive range `[start, end]`.
    pub fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawBar>, ChartError> {
        check_range(start, end)?;
        let symbol = normalize_symbol(symbol)?;

        let mut attempt: u32 = 0;
        loop {
            match self.fetch_once(&symbol, start, end) {
                Err(e) if e.is_retryable() && attempt < self.policy.max_retries => {
                    attempt += 1;
                    warn!(
                        %symbol,
                        attempt,
                        max_retries = self.policy.max_retries,
                        error = %e,
                        "retrying market data fetch"
                    );
                    thread::sleep(self.policy.retry_delay);
                }
                result => {
                    if let Ok(rows) = &result {
                        debug!(%symbol, rows = rows.len(), "fetched market data");
                    }
                    return result;
                }
            }
        }
    }

    pub fn list_symbols(&self) -> Result<Vec<String>, ChartError> {
        self.port.list_symbols()
    }

    /// Runs the provider call on a worker thread and waits at most
    /// `policy.timeout` for it. A call that overruns is abandoned; its
    /// result is discarded when it eventually arrives.
    fn fetch_once(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawBar>, ChartError> {
        let (tx, rx) = mpsc::channel();
        let port = Arc::clone(&self.port);
        let owned = symbol.to_string();

        thread::Builder::new()
            .name(format!("fetch-{symbol}"))
            .spawn(move || {
                let _ = tx.send(port.fetch_ohlcv(&owned, start, end));
            })
            .map_err(|e| ChartError::Provider {
                reason: format!("failed to start fetch worker: {e}"),
            })?;

        match rx.recv_timeout(self.policy.timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(ChartError::Provider {
                reason: format!(
                    "fetch for {symbol} timed out after {} ms",
                    self.policy.timeout.as_millis()
                ),
            }),
            Err(RecvTimeoutError::Disconnected) => Err(ChartError::Provider {
                reason: format!("fetch worker for {symbol} exited without a result"),
            }),
        }
    }
}
