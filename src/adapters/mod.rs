//! Concrete adapter implementations for ports.

pub mod cache_adapter;
pub mod csv_adapter;
pub mod file_config_adapter;
pub mod html_chart_adapter;
pub mod json_chart_adapter;
pub mod output;
pub mod plotly_figure;
#[cfg(feature = "sqlite")]
pub mod sqlite_adapter;
