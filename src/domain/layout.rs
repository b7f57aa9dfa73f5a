//! Chart styling policy. Pure presentation metadata: nothing here changes a
//! computed value.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::domain::error::ChartError;
use crate::ports::config_port::ConfigPort;

/// Colors handed out to moving averages that have no explicit mapping.
const FALLBACK_MA_COLORS: [&str; 6] = ["orange", "purple", "teal", "brown", "olive", "navy"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LegendPosition {
    #[default]
    TopRight,
    TopLeft,
    BottomRight,
    BottomLeft,
    Hidden,
}

impl FromStr for LegendPosition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "top-right" => Ok(LegendPosition::TopRight),
            "top-left" => Ok(LegendPosition::TopLeft),
            "bottom-right" => Ok(LegendPosition::BottomRight),
            "bottom-left" => Ok(LegendPosition::BottomLeft),
            "hidden" | "none" => Ok(LegendPosition::Hidden),
            other => Err(format!("unknown legend position '{other}'")),
        }
    }
}

impl fmt::Display for LegendPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LegendPosition::TopRight => "top-right",
            LegendPosition::TopLeft => "top-left",
            LegendPosition::BottomRight => "bottom-right",
            LegendPosition::BottomLeft => "bottom-left",
            LegendPosition::Hidden => "hidden",
        };
        write!(f, "{s}")
    }
}

/// Figure margins in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarginSpec {
    pub left: u32,
    pub right: u32,
    pub bottom: u32,
    pub top: u32,
    pub pad: u32,
}

impl Default for MarginSpec {
    fn default() -> Self {
        Self {
            left: 50,
            right: 50,
            bottom: 100,
            top: 100,
            pad: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderPolicy {
    pub background_color: String,
    pub candle_up_color: String,
    pub candle_down_color: String,
    pub ma_colors: BTreeMap<usize, String>,
    pub volume_bar_color: String,
    pub legend_position: LegendPosition,
    /// Share of the figure height given to the price panel; the volume panel
    /// takes the remainder.
    pub price_panel_ratio: f64,
    pub margin: MarginSpec,
    pub height: u32,
    pub price_axis_title: String,
    pub range_slider: bool,
}

impl Default for RenderPolicy {
    fn default() -> Self {
        let mut ma_colors = BTreeMap::new();
        ma_colors.insert(50, "gray".to_string());
        ma_colors.insert(200, "lightgray".to_string());
        Self {
            background_color: "lightsteelblue".to_string(),
            candle_up_color: "green".to_string(),
            candle_down_color: "red".to_string(),
            ma_colors,
            volume_bar_color: "red".to_string(),
            legend_position: LegendPosition::TopRight,
            price_panel_ratio: 0.7,
            margin: MarginSpec::default(),
            height: 600,
            price_axis_title: "Price (USD $/share)".to_string(),
            range_slider: false,
        }
    }
}

impl RenderPolicy {
    /// Height shares for the (price, volume) panels.
    pub fn panel_height_ratio(&self) -> (f64, f64) {
        (self.price_panel_ratio, 1.0 - self.price_panel_ratio)
    }

    /// Color for the moving average of `window`; `position` is its index in
    /// the supplied indicator list and picks a fallback color when unmapped.
    pub fn ma_color(&self, window: usize, position: usize) -> String {
        self.ma_colors
            .get(&window)
            .cloned()
            .unwrap_or_else(|| FALLBACK_MA_COLORS[position % FALLBACK_MA_COLORS.len()].to_string())
    }

    pub fn validate(&self) -> Result<(), ChartError> {
        if !(self.price_panel_ratio > 0.0 && self.price_panel_ratio < 1.0) {
            return Err(ChartError::config_invalid(
                "layout",
                "price_panel_ratio",
                "price_panel_ratio must be between 0 and 1 (exclusive)",
            ));
        }
        if self.height == 0 {
            return Err(ChartError::config_invalid(
                "layout",
                "height",
                "height must be positive",
            ));
        }
        Ok(())
    }

    /// Reads the `[layout]` section, falling back to defaults per key.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, ChartError> {
        let defaults = Self::default();
        let string = |key: &str, default: &str| {
            config
                .get_string("layout", key)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let ma_colors = match config.get_string("layout", "ma_colors") {
            Some(text) => parse_ma_colors(&text)?,
            None => defaults.ma_colors.clone(),
        };

        let legend_position = match config.get_string("layout", "legend_position") {
            Some(text) => text.parse().map_err(|reason: String| {
                ChartError::config_invalid("layout", "legend_position", reason)
            })?,
            None => defaults.legend_position,
        };

        let margin = MarginSpec {
            left: read_u32(config, "margin_left", defaults.margin.left)?,
            right: read_u32(config, "margin_right", defaults.margin.right)?,
            bottom: read_u32(config, "margin_bottom", defaults.margin.bottom)?,
            top: read_u32(config, "margin_top", defaults.margin.top)?,
            pad: read_u32(config, "margin_pad", defaults.margin.pad)?,
        };

        let policy = Self {
            background_color: string("background_color", &defaults.background_color),
            candle_up_color: string("candle_up_color", &defaults.candle_up_color),
            candle_down_color: string("candle_down_color", &defaults.candle_down_color),
            ma_colors,
            volume_bar_color: string("volume_bar_color", &defaults.volume_bar_color),
            legend_position,
            price_panel_ratio: config.get_double(
                "layout",
                "price_panel_ratio",
                defaults.price_panel_ratio,
            ),
            margin,
            height: read_u32(config, "height", defaults.height)?,
            price_axis_title: string("price_axis_title", &defaults.price_axis_title),
            range_slider: config.get_bool("layout", "range_slider", defaults.range_slider),
        };
        policy.validate()?;
        Ok(policy)
    }
}

fn read_u32(config: &dyn ConfigPort, key: &str, default: u32) -> Result<u32, ChartError> {
    let value = config.get_int("layout", key, default as i64);
    u32::try_from(value).map_err(|_| {
        ChartError::config_invalid("layout", key, format!("{key} must be a non-negative integer"))
    })
}

/// Parses `50:gray, 200:lightgray`.
pub fn parse_ma_colors(input: &str) -> Result<BTreeMap<usize, String>, ChartError> {
    let mut colors = BTreeMap::new();
    for entry in input.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (window, color) = entry.split_once(':').ok_or_else(|| {
            ChartError::config_invalid(
                "layout",
                "ma_colors",
                format!("entry '{entry}' is not window:color"),
            )
        })?;
        let window: usize = window.trim().parse().map_err(|_| {
            ChartError::config_invalid(
                "layout",
                "ma_colors",
                format!("window '{}' is not an integer", window.trim()),
            )
        })?;
        let color = color.trim();
        if color.is_empty() {
            return Err(ChartError::config_invalid(
                "layout",
                "ma_colors",
                format!("no color given for window {window}"),
            ));
        }
        colors.insert(window, color.to_string());
    }
    Ok(colors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    #[test]
    fn defaults_match_classic_chart() {
        let policy = RenderPolicy::default();
        assert_eq!(policy.background_color, "lightsteelblue");
        assert_eq!(policy.ma_color(50, 0), "gray");
        assert_eq!(policy.ma_color(200, 1), "lightgray");
        assert_eq!(policy.volume_bar_color, "red");
        assert_eq!(policy.panel_height_ratio(), (0.7, 1.0 - 0.7));
        assert_eq!(
            policy.margin,
            MarginSpec {
                left: 50,
                right: 50,
                bottom: 100,
                top: 100,
                pad: 4
            }
        );
        assert!(!policy.range_slider);
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn unmapped_window_uses_fallback_palette() {
        let policy = RenderPolicy::default();
        assert_eq!(policy.ma_color(20, 0), "orange");
        assert_eq!(policy.ma_color(20, 1), "purple");
        assert_eq!(policy.ma_color(20, 6), "orange");
    }

    #[test]
    fn validate_rejects_degenerate_ratio() {
        for ratio in [0.0, 1.0, -0.2, 1.5, f64::NAN] {
            let policy = RenderPolicy {
                price_panel_ratio: ratio,
                ..RenderPolicy::default()
            };
            assert!(policy.validate().is_err(), "ratio {ratio} accepted");
        }
    }

    #[test]
    fn parse_ma_colors_reads_pairs() {
        let colors = parse_ma_colors("20: blue, 50:gray").unwrap();
        assert_eq!(colors.get(&20).map(String::as_str), Some("blue"));
        assert_eq!(colors.get(&50).map(String::as_str), Some("gray"));
    }

    #[test]
    fn parse_ma_colors_rejects_garbage() {
        assert!(parse_ma_colors("fifty:gray").is_err());
        assert!(parse_ma_colors("50-gray").is_err());
        assert!(parse_ma_colors("50:").is_err());
    }

    #[test]
    fn from_config_overrides_selected_keys() {
        let ini = "[layout]\n\
            background_color = white\n\
            ma_colors = 10:black\n\
            price_panel_ratio = 0.6\n\
            legend_position = bottom-left\n\
            margin_top = 40\n";
        let adapter = FileConfigAdapter::from_string(ini).unwrap();
        let policy = RenderPolicy::from_config(&adapter).unwrap();

        assert_eq!(policy.background_color, "white");
        assert_eq!(policy.ma_color(10, 0), "black");
        assert_eq!(policy.price_panel_ratio, 0.6);
        assert_eq!(policy.legend_position, LegendPosition::BottomLeft);
        assert_eq!(policy.margin.top, 40);
        assert_eq!(policy.margin.left, 50);
        assert_eq!(policy.volume_bar_color, "red");
    }

    #[test]
    fn from_config_without_section_is_default() {
        let adapter = FileConfigAdapter::from_string("[chart]\nmode = strict\n").unwrap();
        assert_eq!(RenderPolicy::from_config(&adapter).unwrap(), RenderPolicy::default());
    }

    #[test]
    fn from_config_rejects_bad_ratio() {
        let adapter =
            FileConfigAdapter::from_string("[layout]\nprice_panel_ratio = 1.2\n").unwrap();
        let err = RenderPolicy::from_config(&adapter).unwrap_err();
        assert!(matches!(err, ChartError::ConfigInvalid { key, .. } if key == "price_panel_ratio"));
    }

    #[test]
    fn legend_position_parses() {
        assert_eq!("TOP-LEFT".parse::<LegendPosition>(), Ok(LegendPosition::TopLeft));
        assert_eq!("none".parse::<LegendPosition>(), Ok(LegendPosition::Hidden));
        assert!("middle".parse::<LegendPosition>().is_err());
    }
}
