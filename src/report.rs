//! Capital curve rendering.
//!
//! `SvgChartReporter` writes a line chart of capital over effective date and
//! the ledger behind it. `NoopReporter` renders nothing.

use std::fs;
use std::path::PathBuf;

use thiserror::Error;
use tracing::info;

use crate::backtest::{Aggregate, CapitalPoint};

const WIDTH: f64 = 1200.0;
const HEIGHT: f64 = 600.0;
const MARGIN_LEFT: f64 = 80.0;
const MARGIN_RIGHT: f64 = 30.0;
const MARGIN_TOP: f64 = 50.0;
const MARGIN_BOTTOM: f64 = 110.0;
const Y_TICKS: usize = 5;

/// Errors writing report artifacts.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Renders one pipeline's capital curve.
pub trait CurveReporter {
    fn render(&self, name: &str, aggregate: &Aggregate) -> Result<(), ReportError>;
}

/// Reporter that renders nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopReporter;

impl CurveReporter for NoopReporter {
    fn render(&self, _name: &str, _aggregate: &Aggregate) -> Result<(), ReportError> {
        Ok(())
    }
}

/// Writes `<name>.svg` and `<name>_trades.json` into an output directory.
#[derive(Debug, Clone)]
pub struct SvgChartReporter {
    output_dir: PathBuf,
}

impl SvgChartReporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn chart_path(&self, name: &str) -> PathBuf {
        self.output_dir.join(format!("{}.svg", name))
    }

    pub fn ledger_path(&self, name: &str) -> PathBuf {
        self.output_dir.join(format!("{}_trades.json", name))
    }
}

impl CurveReporter for SvgChartReporter {
    fn render(&self, name: &str, aggregate: &Aggregate) -> Result<(), ReportError> {
        fs::create_dir_all(&self.output_dir)?;

        let chart_path = self.chart_path(name);
        fs::write(&chart_path, render_svg(name, &aggregate.capital_curve()))?;

        let ledger_path = self.ledger_path(name);
        fs::write(&ledger_path, serde_json::to_string_pretty(&aggregate.rows)?)?;

        info!(
            chart = %chart_path.display(),
            ledger = %ledger_path.display(),
            trades = aggregate.rows.len(),
            "wrote capital curve"
        );
        Ok(())
    }
}

fn to_f64(value: rust_decimal::Decimal) -> f64 {
    value.try_into().unwrap_or(0.0)
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// SVG line chart of `curve`, x = effective date, y = capital.
pub fn render_svg(title: &str, curve: &[CapitalPoint]) -> String {
    let mut svg = String::new();
    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\">\n",
        w = WIDTH,
        h = HEIGHT
    ));
    svg.push_str(&format!(
        "<rect width=\"{}\" height=\"{}\" fill=\"white\"/>\n",
        WIDTH, HEIGHT
    ));
    svg.push_str(&format!(
        "<text x=\"{}\" y=\"30\" text-anchor=\"middle\" font-family=\"sans-serif\" font-size=\"18\">{}</text>\n",
        WIDTH / 2.0,
        escape(title)
    ));

    let plot_left = MARGIN_LEFT;
    let plot_right = WIDTH - MARGIN_RIGHT;
    let plot_top = MARGIN_TOP;
    let plot_bottom = HEIGHT - MARGIN_BOTTOM;

    svg.push_str(&format!(
        "<line x1=\"{l}\" y1=\"{b}\" x2=\"{r}\" y2=\"{b}\" stroke=\"black\"/>\n\
         <line x1=\"{l}\" y1=\"{t}\" x2=\"{l}\" y2=\"{b}\" stroke=\"black\"/>\n",
        l = plot_left,
        r = plot_right,
        t = plot_top,
        b = plot_bottom
    ));

    let (first, last) = match (curve.first(), curve.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => {
            svg.push_str(&format!(
                "<text x=\"{}\" y=\"{}\" text-anchor=\"middle\" font-family=\"sans-serif\" font-size=\"14\">no trades</text>\n",
                WIDTH / 2.0,
                HEIGHT / 2.0
            ));
            svg.push_str("</svg>\n");
            return svg;
        }
    };

    let capitals: Vec<f64> = curve.iter().map(|p| to_f64(p.capital)).collect();
    let mut y_min = capitals.iter().copied().fold(f64::INFINITY, f64::min);
    let mut y_max = capitals.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if (y_max - y_min).abs() < f64::EPSILON {
        y_min -= 1.0;
        y_max += 1.0;
    }
    let pad = (y_max - y_min) * 0.05;
    y_min -= pad;
    y_max += pad;

    let span_days = (last.effective_date - first.effective_date).num_days() as f64;
    let x_of = |point: &CapitalPoint| -> f64 {
        if span_days <= 0.0 {
            return (plot_left + plot_right) / 2.0;
        }
        let offset = (point.effective_date - first.effective_date).num_days() as f64;
        plot_left + offset / span_days * (plot_right - plot_left)
    };
    let y_of = |capital: f64| -> f64 { plot_bottom - (capital - y_min) / (y_max - y_min) * (plot_bottom - plot_top) };

    // Y axis ticks
    for i in 0..=Y_TICKS {
        let value = y_min + (y_max - y_min) * i as f64 / Y_TICKS as f64;
        let y = y_of(value);
        svg.push_str(&format!(
            "<line x1=\"{}\" y1=\"{y:.1}\" x2=\"{}\" y2=\"{y:.1}\" stroke=\"#dddddd\"/>\n\
             <text x=\"{}\" y=\"{:.1}\" text-anchor=\"end\" font-family=\"sans-serif\" font-size=\"11\">{:.0}</text>\n",
            plot_left,
            plot_right,
            plot_left - 8.0,
            y + 4.0,
            value,
            y = y
        ));
    }

    // X axis labels, one per distinct date
    let mut last_label = None;
    for point in curve {
        if last_label == Some(point.effective_date) {
            continue;
        }
        last_label = Some(point.effective_date);
        let x = x_of(point);
        svg.push_str(&format!(
            "<text x=\"{x:.1}\" y=\"{y:.1}\" text-anchor=\"end\" font-family=\"sans-serif\" font-size=\"10\" transform=\"rotate(-45 {x:.1} {y:.1})\">{date}</text>\n",
            x = x,
            y = plot_bottom + 16.0,
            date = point.effective_date
        ));
    }

    let points: Vec<String> = curve
        .iter()
        .zip(&capitals)
        .map(|(point, capital)| format!("{:.1},{:.1}", x_of(point), y_of(*capital)))
        .collect();
    svg.push_str(&format!(
        "<polyline fill=\"none\" stroke=\"steelblue\" stroke-width=\"2\" points=\"{}\"/>\n",
        points.join(" ")
    ));

    svg.push_str("</svg>\n");
    svg
}
