//! Writes the composed chart as pretty-printed JSON.
//!
//! The document is the serde form of [`ChartSpec`] and can be read back with
//! `serde_json::from_str::<ChartSpec>`.

use std::path::Path;

use crate::adapters::output::{output_error, write_output};
use crate::domain::chart::ChartSpec;
use crate::domain::error::ChartError;
use crate::ports::render_port::RenderPort;

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonChartAdapter;

impl JsonChartAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl RenderPort for JsonChartAdapter {
    fn render(&self, chart: &ChartSpec, output_path: &Path) -> Result<(), ChartError> {
        let json =
            serde_json::to_string_pretty(chart).map_err(|e| output_error(output_path, e))?;
        write_output(output_path, &json)
    }

    fn extension(&self) -> &'static str {
        "json"
    }
}
