//! Chart output port.

use std::path::Path;

use crate::domain::chart::ChartSpec;
use crate::domain::error::ChartError;

/// Port for handing a composed chart to a renderer.
pub trait RenderPort {
    fn render(&self, chart: &ChartSpec, output_path: &Path) -> Result<(), ChartError>;

    /// File extension the renderer writes, without the dot.
    fn extension(&self) -> &'static str;
}
