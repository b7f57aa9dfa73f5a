//! Core domain types and logic.

pub mod ohlcv;
pub mod cleaner;
pub mod indicator;
pub mod layout;
pub mod chart;
pub mod fetcher;
pub mod pipeline;
pub mod config_validation;
pub mod error;
