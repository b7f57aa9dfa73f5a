//! Standalone HTML chart page rendered with Askama.
//!
//! The page loads plotly.js and draws the figure built by
//! [`plotly_figure::figure`](crate::adapters::plotly_figure::figure).

use std::path::Path;

use askama::Template;
use chrono::NaiveDate;

use crate::adapters::output::{output_error, write_output};
use crate::adapters::plotly_figure::{figure, to_script_json};
use crate::domain::chart::ChartSpec;
use crate::domain::error::ChartError;
use crate::ports::render_port::RenderPort;

pub const DEFAULT_PLOTLY_SRC: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";

#[derive(Template)]
#[template(path = "chart.html")]
struct ChartPage<'a> {
    title: &'a str,
    symbol: &'a str,
    plotly_src: &'a str,
    first_date: NaiveDate,
    last_date: NaiveDate,
    sessions: usize,
    figure_json: String,
}

#[derive(Debug, Clone)]
pub struct HtmlChartAdapter {
    plotly_src: String,
}

impl HtmlChartAdapter {
    pub fn new() -> Self {
        Self {
            plotly_src: DEFAULT_PLOTLY_SRC.to_string(),
        }
    }

    /// Loads plotly.js from `src` instead of the public CDN.
    pub fn with_plotly_src(mut self, src: impl Into<String>) -> Self {
        self.plotly_src = src.into();
        self
    }

    pub fn render_to_string(&self, chart: &ChartSpec) -> Result<String, ChartError> {
        let candles = chart.candlestick().ok_or_else(|| ChartError::EmptyComposition {
            symbol: chart.symbol.clone(),
        })?;
        let (Some(&first_date), Some(&last_date)) = (candles.dates.first(), candles.dates.last())
        else {
            return Err(ChartError::EmptyComposition {
                symbol: chart.symbol.clone(),
            });
        };

        let figure_json = to_script_json(&figure(chart)).map_err(|e| ChartError::Output {
            path: "<html>".to_string(),
            reason: e.to_string(),
        })?;

        let page = ChartPage {
            title: &chart.title,
            symbol: &chart.symbol,
            plotly_src: &self.plotly_src,
            first_date,
            last_date,
            sessions: candles.dates.len(),
            figure_json,
        };
        page.render().map_err(|e| ChartError::Output {
            path: "<html>".to_string(),
            reason: e.to_string(),
        })
    }
}

impl Default for HtmlChartAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderPort for HtmlChartAdapter {
    fn render(&self, chart: &ChartSpec, output_path: &Path) -> Result<(), ChartError> {
        let html = self.render_to_string(chart).map_err(|e| match e {
            ChartError::Output { reason, .. } => output_error(output_path, reason),
            other => other,
        })?;
        write_output(output_path, &html)
    }

    fn extension(&self) -> &'static str {
        "html"
    }
}
