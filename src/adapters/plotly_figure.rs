//! Translation of a [`ChartSpec`] into a Plotly figure (`data` + `layout`).
//!
//! Panels are stacked top to bottom on the paper, sharing one date axis. Each
//! panel gets its own `xN`/`yN` axis pair; only the bottom x axis carries tick
//! labels and the axis title.

use serde_json::{json, Map, Value};

use crate::domain::chart::{ChartSpec, Trace};
use crate::domain::layout::LegendPosition;

/// Paper fraction left between two stacked panels.
const PANEL_SPACING: f64 = 0.15;

fn axis_suffix(panel: usize) -> String {
    if panel == 0 {
        String::new()
    } else {
        (panel + 1).to_string()
    }
}

/// Vertical `[bottom, top]` domains for each panel, topmost first.
fn panel_domains(ratios: &[f64]) -> Vec<(f64, f64)> {
    let n = ratios.len();
    if n == 0 {
        return Vec::new();
    }
    let spacing = if n > 1 { PANEL_SPACING / (n - 1) as f64 } else { 0.0 };
    let usable = 1.0 - spacing * (n - 1) as f64;
    let total: f64 = ratios.iter().sum();

    let mut top = 1.0;
    ratios
        .iter()
        .map(|r| {
            let height = usable * r / total;
            let bottom = (top - height).max(0.0);
            let domain = (bottom, top);
            top = bottom - spacing;
            domain
        })
        .collect()
}

fn legend(position: LegendPosition) -> Option<Value> {
    let (x, y, xanchor, yanchor) = match position {
        LegendPosition::TopRight => (1.02, 1.0, "left", "top"),
        LegendPosition::TopLeft => (0.0, 1.0, "left", "top"),
        LegendPosition::BottomRight => (1.02, 0.0, "left", "bottom"),
        LegendPosition::BottomLeft => (0.0, 0.0, "left", "bottom"),
        LegendPosition::Hidden => return None,
    };
    Some(json!({ "x": x, "y": y, "xanchor": xanchor, "yanchor": yanchor }))
}

fn trace_json(trace: &Trace, xaxis: &str, yaxis: &str) -> Value {
    match trace {
        Trace::Candlestick(c) => json!({
            "type": "candlestick",
            "name": c.name,
            "x": c.dates,
            "open": c.open,
            "high": c.high,
            "low": c.low,
            "close": c.close,
            "increasing": { "line": { "color": c.up_color } },
            "decreasing": { "line": { "color": c.down_color } },
            "xaxis": xaxis,
            "yaxis": yaxis,
        }),
        // Undefined points serialize as null and show as gaps.
        Trace::Line(l) => json!({
            "type": "scatter",
            "mode": "lines",
            "name": l.name,
            "x": l.dates,
            "y": l.values,
            "line": { "color": l.color },
            "connectgaps": false,
            "hovertemplate": "%{y:.2f}",
            "xaxis": xaxis,
            "yaxis": yaxis,
        }),
        Trace::Bar(b) => json!({
            "type": "bar",
            "name": b.name,
            "x": b.dates,
            "y": b.values,
            "marker": { "color": b.color },
            "xaxis": xaxis,
            "yaxis": yaxis,
        }),
    }
}

/// Builds the full Plotly figure for `chart`.
pub fn figure(chart: &ChartSpec) -> Value {
    let policy = &chart.layout;
    let ratios: Vec<f64> = chart.panels.iter().map(|p| p.height_ratio).collect();
    let domains = panel_domains(&ratios);
    let bottom_axis = format!("x{}", axis_suffix(chart.panels.len().saturating_sub(1)));

    let mut data = Vec::new();
    let mut layout = Map::new();
    let mut annotations = Vec::new();

    for (i, (panel, (bottom, top))) in chart.panels.iter().zip(&domains).enumerate() {
        let suffix = axis_suffix(i);
        let x_ref = format!("x{suffix}");
        let y_ref = format!("y{suffix}");
        let is_bottom = i + 1 == chart.panels.len();

        data.extend(panel.traces.iter().map(|t| trace_json(t, &x_ref, &y_ref)));

        let mut xaxis = json!({
            "domain": [0.0, 1.0],
            "anchor": y_ref,
            "type": "date",
            "rangeslider": { "visible": policy.range_slider && i == 0 },
        });
        if is_bottom {
            xaxis["title"] = json!({ "text": chart.x_axis_title });
        } else {
            xaxis["matches"] = json!(bottom_axis);
            xaxis["showticklabels"] = json!(false);
        }
        layout.insert(format!("xaxis{suffix}"), xaxis);
        let hoverformat = if i == 0 { ".2f" } else { ",d" };
        layout.insert(
            format!("yaxis{suffix}"),
            json!({
                "domain": [bottom, top],
                "anchor": x_ref,
                "title": { "text": panel.y_axis_title },
                "hoverformat": hoverformat,
            }),
        );

        annotations.push(json!({
            "text": panel.title,
            "x": 0.5,
            "y": top,
            "xref": "paper",
            "yref": "paper",
            "xanchor": "center",
            "yanchor": "bottom",
            "showarrow": false,
        }));
    }

    layout.insert("title".into(), json!({ "text": chart.title }));
    layout.insert("height".into(), json!(policy.height));
    layout.insert("plot_bgcolor".into(), json!(policy.background_color));
    layout.insert(
        "margin".into(),
        json!({
            "l": policy.margin.left,
            "r": policy.margin.right,
            "b": policy.margin.bottom,
            "t": policy.margin.top,
            "pad": policy.margin.pad,
        }),
    );
    let legend = legend(policy.legend_position);
    layout.insert("showlegend".into(), json!(legend.is_some()));
    if let Some(legend) = legend {
        layout.insert("legend".into(), legend);
    }
    layout.insert("hovermode".into(), json!("x unified"));
    layout.insert("annotations".into(), Value::Array(annotations));

    json!({ "data": data, "layout": layout })
}

/// Serializes `value` for embedding inside an HTML `<script>` element.
pub fn to_script_json(value: &Value) -> Result<String, serde_json::Error> {
    Ok(serde_json::to_string(value)?.replace("</", "<\\/"))
}
