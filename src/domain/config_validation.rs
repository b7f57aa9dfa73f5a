//! Configuration validation and option building.
//!
//! Every value is checked before a request runs; missing keys fall back to
//! the documented defaults.

use std::str::FromStr;
use std::time::Duration;

use crate::domain::cleaner::InvalidRecordPolicy;
use crate::domain::error::ChartError;
use crate::domain::fetcher::FetchPolicy;
use crate::domain::indicator::{parse_windows, WindowMode};
use crate::domain::layout::RenderPolicy;
use crate::domain::pipeline::{ChartOptions, DEFAULT_WINDOWS};
use crate::ports::config_port::ConfigPort;

pub const MAX_RETRIES_LIMIT: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataSource {
    #[default]
    Csv,
    Sqlite,
}

impl FromStr for DataSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(DataSource::Csv),
            "sqlite" => Ok(DataSource::Sqlite),
            other => Err(format!("unknown data source '{other}' (expected csv or sqlite)")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSettings {
    pub enabled: bool,
    pub ttl: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: Duration::from_secs(300),
        }
    }
}

pub fn validate_config(config: &dyn ConfigPort) -> Result<(), ChartError> {
    validate_data_config(config)?;
    validate_cache_config(config)?;
    validate_chart_config(config)?;
    RenderPolicy::from_config(config)?;
    Ok(())
}

pub fn validate_data_config(config: &dyn ConfigPort) -> Result<(), ChartError> {
    let source = data_source(config)?;
    if source == DataSource::Sqlite {
        match config.get_string("sqlite", "path") {
            Some(p) if !p.trim().is_empty() => {}
            _ => {
                return Err(ChartError::ConfigMissing {
                    section: "sqlite".to_string(),
                    key: "path".to_string(),
                })
            }
        }
    }

    let timeout = config.get_int("data", "timeout_secs", 10);
    if timeout <= 0 {
        return Err(ChartError::config_invalid(
            "data",
            "timeout_secs",
            "timeout_secs must be positive",
        ));
    }
    let retries = config.get_int("data", "max_retries", 0);
    if !(0..=MAX_RETRIES_LIMIT).contains(&retries) {
        return Err(ChartError::config_invalid(
            "data",
            "max_retries",
            format!("max_retries must be between 0 and {MAX_RETRIES_LIMIT}"),
        ));
    }
    let delay = config.get_int("data", "retry_delay_ms", 500);
    if delay < 0 {
        return Err(ChartError::config_invalid(
            "data",
            "retry_delay_ms",
            "retry_delay_ms must be non-negative",
        ));
    }
    Ok(())
}

pub fn validate_cache_config(config: &dyn ConfigPort) -> Result<(), ChartError> {
    if config.get_bool("cache", "enabled", true) && config.get_int("cache", "ttl_secs", 300) <= 0 {
        return Err(ChartError::config_invalid(
            "cache",
            "ttl_secs",
            "ttl_secs must be positive",
        ));
    }
    Ok(())
}

pub fn validate_chart_config(config: &dyn ConfigPort) -> Result<(), ChartError> {
    chart_windows(config)?;
    parse_key::<WindowMode>(config, "chart", "mode")?;
    parse_key::<InvalidRecordPolicy>(config, "chart", "invalid_records")?;
    Ok(())
}

pub fn data_source(config: &dyn ConfigPort) -> Result<DataSource, ChartError> {
    Ok(parse_key::<DataSource>(config, "data", "source")?.unwrap_or_default())
}

pub fn build_fetch_policy(config: &dyn ConfigPort) -> Result<FetchPolicy, ChartError> {
    validate_data_config(config)?;
    let defaults = FetchPolicy::default();
    Ok(FetchPolicy {
        timeout: Duration::from_secs(
            config.get_int("data", "timeout_secs", defaults.timeout.as_secs() as i64) as u64,
        ),
        max_retries: config.get_int("data", "max_retries", defaults.max_retries as i64) as u32,
        retry_delay: Duration::from_millis(
            config.get_int("data", "retry_delay_ms", defaults.retry_delay.as_millis() as i64)
                as u64,
        ),
    })
}

pub fn build_cache_settings(config: &dyn ConfigPort) -> Result<CacheSettings, ChartError> {
    validate_cache_config(config)?;
    let defaults = CacheSettings::default();
    Ok(CacheSettings {
        enabled: config.get_bool("cache", "enabled", defaults.enabled),
        ttl: Duration::from_secs(
            config.get_int("cache", "ttl_secs", defaults.ttl.as_secs() as i64) as u64,
        ),
    })
}

pub fn build_chart_options(config: &dyn ConfigPort) -> Result<ChartOptions, ChartError> {
    Ok(ChartOptions {
        windows: chart_windows(config)?,
        mode: parse_key(config, "chart", "mode")?.unwrap_or_default(),
        record_policy: parse_key(config, "chart", "invalid_records")?.unwrap_or_default(),
        layout: RenderPolicy::from_config(config)?,
    })
}

fn chart_windows(config: &dyn ConfigPort) -> Result<Vec<usize>, ChartError> {
    match config.get_string("chart", "windows") {
        Some(text) => parse_windows(&text).map_err(|e| match e {
            ChartError::Computation { reason } => {
                ChartError::config_invalid("chart", "windows", reason)
            }
            other => other,
        }),
        None => Ok(DEFAULT_WINDOWS.to_vec()),
    }
}

fn parse_key<T>(config: &dyn ConfigPort, section: &str, key: &str) -> Result<Option<T>, ChartError>
where
    T: FromStr<Err = String>,
{
    match config.get_string(section, key) {
        Some(text) => text
            .parse::<T>()
            .map(Some)
            .map_err(|reason| ChartError::config_invalid(section, key, reason)),
        None => Ok(None),
    }
}
