//! Chart model and its composition from a price series plus
//! indicators.
//!
//! The composer emits two panels sharing the date axis: price (candles
//! followed by trend lines, in the order supplied) and volume.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::error::ChartError;
use crate::domain::indicator::IndicatorSeries;
use crate::domain::layout::RenderPolicy;
use crate::domain::ohlcv::PriceSeries;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceRole {
    Price,
    MovingAverage,
    Volume,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandlestickTrace {
    pub name: String,
    pub role: TraceRole,
    pub dates: Vec<NaiveDate>,
    pub open: Vec<f64>,
    pub high: Vec<f64>,
    pub low: Vec<f64>,
    pub close: Vec<f64>,
    pub up_color: String,
    pub down_color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineTrace {
    pub name: String,
    pub role: TraceRole,
    pub window: usize,
    pub dates: Vec<NaiveDate>,
    pub values: Vec<Option<f64>>,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarTrace {
    pub name: String,
    pub role: TraceRole,
    pub dates: Vec<NaiveDate>,
    pub values: Vec<u64>,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Trace {
    Candlestick(CandlestickTrace),
    Line(LineTrace),
    Bar(BarTrace),
}

impl Trace {
    pub fn name(&self) -> &str {
        match self {
            Trace::Candlestick(t) => &t.name,
            Trace::Line(t) => &t.name,
            Trace::Bar(t) => &t.name,
        }
    }

    pub fn role(&self) -> TraceRole {
        match self {
            Trace::Candlestick(t) => t.role,
            Trace::Line(t) => t.role,
            Trace::Bar(t) => t.role,
        }
    }

    pub fn dates(&self) -> &[NaiveDate] {
        match self {
            Trace::Candlestick(t) => &t.dates,
            Trace::Line(t) => &t.dates,
            Trace::Bar(t) => &t.dates,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Panel {
    pub title: String,
    pub y_axis_title: String,
    pub height_ratio: f64,
    pub traces: Vec<Trace>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    pub symbol: String,
    pub title: String,
    pub x_axis_title: String,
    pub layout: RenderPolicy,
    pub panels: Vec<Panel>,
}

impl ChartSpec {
    pub fn price_panel(&self) -> Option<&Panel> {
        self.panels.first()
    }

    pub fn volume_panel(&self) -> Option<&Panel> {
        self.panels.get(1)
    }

    /// The candlestick trace of the price panel.
    pub fn candlestick(&self) -> Option<&CandlestickTrace> {
        self.price_panel()?.traces.iter().find_map(|t| match t {
            Trace::Candlestick(c) => Some(c),
            _ => None,
        })
    }

    pub fn trace_count(&self) -> usize {
        self.panels.iter().map(|p| p.traces.len()).sum()
    }
}

/// Assembles the two-panel chart. Indicators are drawn in the order given;
/// each must be aligned date-for-date with `series`.
pub fn compose(
    series: &PriceSeries,
    indicators: &[IndicatorSeries],
    layout: &RenderPolicy,
) -> Result<ChartSpec, ChartError> {
    if series.is_empty() {
        return Err(ChartError::EmptyComposition {
            symbol: series.symbol().to_string(),
        });
    }

    let dates = series.dates();
    let records = series.records();

    let candles = CandlestickTrace {
        name: "Candlestick".to_string(),
        role: TraceRole::Price,
        dates: dates.clone(),
        open: records.iter().map(|r| r.open).collect(),
        high: records.iter().map(|r| r.high).collect(),
        low: records.iter().map(|r| r.low).collect(),
        close: records.iter().map(|r| r.close).collect(),
        up_color: layout.candle_up_color.clone(),
        down_color: layout.candle_down_color.clone(),
    };

    let mut price_traces = Vec::with_capacity(indicators.len() + 1);
    price_traces.push(Trace::Candlestick(candles));

    for (position, indicator) in indicators.iter().enumerate() {
        if !indicator.dates().eq(dates.iter().copied()) {
            return Err(ChartError::Computation {
                reason: format!(
                    "{} is not aligned with the {} price series",
                    indicator.label(),
                    series.symbol()
                ),
            });
        }
        price_traces.push(Trace::Line(LineTrace {
            name: indicator.label(),
            role: TraceRole::MovingAverage,
            window: indicator.window,
            dates: dates.clone(),
            values: indicator.values.iter().map(|p| p.value).collect(),
            color: layout.ma_color(indicator.window, position),
        }));
    }

    let volume = BarTrace {
        name: "Volume".to_string(),
        role: TraceRole::Volume,
        dates,
        values: records.iter().map(|r| r.volume).collect(),
        color: layout.volume_bar_color.clone(),
    };

    let (price_ratio, volume_ratio) = layout.panel_height_ratio();
    let symbol = series.symbol();

    Ok(ChartSpec {
        symbol: symbol.to_string(),
        title: format!("{symbol} Historical Price Chart"),
        x_axis_title: "Date".to_string(),
        layout: layout.clone(),
        panels: vec![
            Panel {
                title: format!("{symbol} Price"),
                y_axis_title: layout.price_axis_title.clone(),
                height_ratio: price_ratio,
                traces: price_traces,
            },
            Panel {
                title: "Volume".to_string(),
                y_axis_title: "Volume".to_string(),
                height_ratio: volume_ratio,
                traces: vec![Trace::Bar(volume)],
            },
        ],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::{moving_average, WindowMode};
    use crate::domain::ohlcv::OhlcvRecord;

    fn make_series(closes: &[f64]) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let records = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| OhlcvRecord {
                date: start + chrono::Duration::days(i as i64),
                open: close - 1.0,
                high: close + 1.0,
                low: close - 2.0,
                close,
                volume: 1000 + i as u64,
            })
            .collect();
        PriceSeries::new("BHP", records).unwrap()
    }

    #[test]
    fn produces_two_panels_with_default_ratio() {
        let series = make_series(&[100.0, 101.0, 102.0]);
        let chart = compose(&series, &[], &RenderPolicy::default()).unwrap();

        assert_eq!(chart.panels.len(), 2);
        assert_eq!(chart.panels[0].title, "BHP Price");
        assert_eq!(chart.panels[1].title, "Volume");
        assert!((chart.panels[0].height_ratio - 0.7).abs() < 1e-12);
        assert!((chart.panels[1].height_ratio - 0.3).abs() < 1e-12);
        assert_eq!(chart.title, "BHP Historical Price Chart");
    }

    #[test]
    fn price_panel_order_follows_supplied_indicators() {
        let series = make_series(&[100.0, 101.0, 102.0, 103.0]);
        let long = moving_average(&series, 3, WindowMode::Strict).unwrap();
        let short = moving_average(&series, 2, WindowMode::Partial).unwrap();

        let chart = compose(&series, &[long, short], &RenderPolicy::default()).unwrap();
        let names: Vec<&str> = chart.panels[0].traces.iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["Candlestick", "3-Day MA", "2-Day MA"]);
    }

    #[test]
    fn volume_panel_has_single_bar_trace() {
        let series = make_series(&[100.0, 101.0]);
        let chart = compose(&series, &[], &RenderPolicy::default()).unwrap();
        match &chart.panels[1].traces[..] {
            [Trace::Bar(bar)] => {
                assert_eq!(bar.values, vec![1000, 1001]);
                assert_eq!(bar.color, "red");
            }
            other => panic!("unexpected volume traces: {other:?}"),
        }
    }

    #[test]
    fn candlestick_round_trips_ohlc() {
        let series = make_series(&[100.0, 101.5, 99.25]);
        let chart = compose(&series, &[], &RenderPolicy::default()).unwrap();
        let candles = chart.candlestick().unwrap();

        for (i, record) in series.records().iter().enumerate() {
            assert_eq!(candles.dates[i], record.date);
            assert_eq!(candles.open[i], record.open);
            assert_eq!(candles.high[i], record.high);
            assert_eq!(candles.low[i], record.low);
            assert_eq!(candles.close[i], record.close);
        }
    }

    #[test]
    fn empty_series_is_empty_composition() {
        let series = PriceSeries::new("AAPL", vec![]).unwrap();
        let err = compose(&series, &[], &RenderPolicy::default()).unwrap_err();
        assert_eq!(
            err,
            ChartError::EmptyComposition {
                symbol: "AAPL".into()
            }
        );
    }

    #[test]
    fn misaligned_indicator_is_rejected() {
        let series = make_series(&[100.0, 101.0, 102.0]);
        let shorter = make_series(&[100.0, 101.0]);
        let ma = moving_average(&shorter, 2, WindowMode::Strict).unwrap();
        let err = compose(&series, &[ma], &RenderPolicy::default()).unwrap_err();
        assert!(matches!(err, ChartError::Computation { .. }));
    }

    #[test]
    fn layout_changes_styling_only() {
        let series = make_series(&[100.0, 101.0, 102.0]);
        let ma = moving_average(&series, 2, WindowMode::Strict).unwrap();
        let plain = compose(&series, std::slice::from_ref(&ma), &RenderPolicy::default()).unwrap();

        let styled_policy = RenderPolicy {
            background_color: "white".into(),
            volume_bar_color: "blue".into(),
            price_panel_ratio: 0.5,
            ..RenderPolicy::default()
        };
        let styled = compose(&series, &[ma], &styled_policy).unwrap();

        assert_eq!(plain.candlestick(), styled.candlestick());
        let line_values = |chart: &ChartSpec| match &chart.panels[0].traces[1] {
            Trace::Line(l) => l.values.clone(),
            _ => panic!("expected line"),
        };
        assert_eq!(line_values(&plain), line_values(&styled));
        assert!((styled.panels[0].height_ratio - 0.5).abs() < 1e-12);
    }

    #[test]
    fn undefined_points_survive_as_none() {
        let series = make_series(&[100.0, 101.0, 102.0]);
        let ma = moving_average(&series, 3, WindowMode::Strict).unwrap();
        let chart = compose(&series, &[ma], &RenderPolicy::default()).unwrap();
        match &chart.panels[0].traces[1] {
            Trace::Line(line) => {
                assert_eq!(line.values, vec![None, None, Some(101.0)]);
                assert_eq!(line.role, TraceRole::MovingAverage);
            }
            other => panic!("expected line trace, got {other:?}"),
        }
    }

    #[test]
    fn chart_spec_serializes_with_trace_tags() {
        let series = make_series(&[100.0]);
        let chart = compose(&series, &[], &RenderPolicy::default()).unwrap();
        let json = serde_json::to_value(&chart).unwrap();
        assert_eq!(json["panels"][0]["traces"][0]["type"], "candlestick");
        assert_eq!(json["panels"][1]["traces"][0]["type"], "bar");
        let back: ChartSpec = serde_json::from_value(json).unwrap();
        assert_eq!(back, chart);
    }
}
