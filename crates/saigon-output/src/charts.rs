//! Standalone SVG charts.
//!
//! Charts are rendered to SVG text; [`write_svg`] stores them atomically.
//! Line charts place points by calendar date so series with different
//! date ranges (history and forecast) share one axis.

use crate::export::{ExportError, write_file};
use chrono::{Datelike, NaiveDate};
use ndarray::Array2;
use std::fmt::Write as _;
use std::path::Path;

const WIDTH: f64 = 960.0;
const HEIGHT: f64 = 520.0;
const PADDING: f64 = 56.0;

/// Default line colors, cycled in series order.
pub const PALETTE: [&str; 10] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
    "#bcbd22", "#17becf",
];

/// Store a rendered chart.
pub fn write_svg(path: &Path, svg: &str) -> Result<(), ExportError> {
    write_file(path, svg.as_bytes())
}

/// One dated line.
#[derive(Debug, Clone, PartialEq)]
pub struct LineSeries {
    /// Legend label; unlabelled lines are left out of the legend
    pub label: Option<String>,
    /// Stroke color
    pub color: String,
    /// Stroke width
    pub stroke_width: f64,
    /// Dashed stroke
    pub dash: bool,
    /// Points; non-finite values break nothing and are skipped
    pub points: Vec<(NaiveDate, f64)>,
}

impl LineSeries {
    /// Solid, unlabelled line.
    pub fn new(color: impl Into<String>, points: Vec<(NaiveDate, f64)>) -> Self {
        Self {
            label: None,
            color: color.into(),
            stroke_width: 1.2,
            dash: false,
            points,
        }
    }

    /// Set the legend label.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Draw dashed.
    pub const fn dashed(mut self) -> Self {
        self.dash = true;
        self
    }

    /// Set the stroke width.
    pub const fn width(mut self, width: f64) -> Self {
        self.stroke_width = width;
        self
    }
}

/// Shaded interval between a lower and an upper bound.
#[derive(Debug, Clone, PartialEq)]
pub struct Band {
    /// Fill color
    pub color: String,
    /// `(date, lower, upper)` triples
    pub points: Vec<(NaiveDate, f64, f64)>,
}

/// Multi-series line chart on a date axis.
#[derive(Debug, Clone, PartialEq)]
pub struct LineChart {
    title: String,
    series: Vec<LineSeries>,
    bands: Vec<Band>,
    legend: bool,
    grid: bool,
}

impl LineChart {
    /// Empty chart with a title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            series: Vec::new(),
            bands: Vec::new(),
            legend: true,
            grid: false,
        }
    }

    /// Add a line.
    pub fn series(mut self, series: LineSeries) -> Self {
        self.series.push(series);
        self
    }

    /// Add a shaded band, drawn beneath the lines.
    pub fn band(mut self, band: Band) -> Self {
        self.bands.push(band);
        self
    }

    /// Show or hide the legend.
    pub const fn legend(mut self, legend: bool) -> Self {
        self.legend = legend;
        self
    }

    /// Draw horizontal grid lines.
    pub const fn grid(mut self, grid: bool) -> Self {
        self.grid = grid;
        self
    }

    fn extent(&self) -> Option<((i32, i32), (f64, f64))> {
        let dates = self
            .series
            .iter()
            .flat_map(|s| s.points.iter().map(|(d, _)| *d))
            .chain(self.bands.iter().flat_map(|b| b.points.iter().map(|(d, _, _)| *d)));
        let values = self
            .series
            .iter()
            .flat_map(|s| s.points.iter().map(|(_, v)| *v))
            .chain(self.bands.iter().flat_map(|b| b.points.iter().flat_map(|(_, l, u)| [*l, *u])))
            .filter(|v| v.is_finite());

        let (min_d, max_d) = dates.fold((i32::MAX, i32::MIN), |(lo, hi), d| {
            let day = d.num_days_from_ce();
            (lo.min(day), hi.max(day))
        });
        let (mut min_v, mut max_v) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
        if min_d > max_d || !min_v.is_finite() {
            return None;
        }
        if min_v == max_v {
            let adjust = if min_v == 0.0 { 1.0 } else { min_v.abs() * 0.1 };
            min_v -= adjust;
            max_v += adjust;
        }
        Some(((min_d, max_d), (min_v, max_v)))
    }

    /// Render to SVG; an empty string when nothing is drawable.
    pub fn render(&self) -> String {
        let Some(((min_d, max_d), (min_v, max_v))) = self.extent() else {
            return String::new();
        };
        let x = |d: NaiveDate| scale_x(d.num_days_from_ce(), min_d, max_d);
        let y = |v: f64| scale_y(v, min_v, max_v);

        let mut svg = svg_header(&self.title);
        draw_value_axis(&mut svg, min_v, max_v, self.grid);
        draw_date_axis(&mut svg, min_d, max_d);

        for band in &self.bands {
            let finite: Vec<&(NaiveDate, f64, f64)> = band
                .points
                .iter()
                .filter(|(_, l, u)| l.is_finite() && u.is_finite())
                .collect();
            if finite.is_empty() {
                continue;
            }
            let upper = finite.iter().map(|(d, _, u)| format!("{:.2},{:.2}", x(*d), y(*u)));
            let lower = finite
                .iter()
                .rev()
                .map(|(d, l, _)| format!("{:.2},{:.2}", x(*d), y(*l)));
            let points: Vec<String> = upper.chain(lower).collect();
            let _ = write!(
                svg,
                r#"<polygon points="{}" fill="{}" fill-opacity="0.2" stroke="none" />"#,
                points.join(" "),
                band.color
            );
        }

        for series in &self.series {
            let coords: Vec<String> = series
                .points
                .iter()
                .filter(|(_, v)| v.is_finite())
                .map(|(d, v)| format!("{:.2},{:.2}", x(*d), y(*v)))
                .collect();
            if coords.is_empty() {
                continue;
            }
            let _ = write!(
                svg,
                r#"<polyline fill="none" stroke="{}" stroke-width="{}" stroke-dasharray="{}" points="{}" />"#,
                series.color,
                series.stroke_width,
                if series.dash { "6 4" } else { "0" },
                coords.join(" ")
            );
        }

        if self.legend {
            draw_legend(&mut svg, &self.series);
        }
        svg.push_str("</svg>\n");
        svg
    }
}

/// Diverging blue-white-red color for a value in `[-1, 1]`.
pub fn coolwarm(value: f64) -> (u8, u8, u8) {
    const COLD: (f64, f64, f64) = (59.0, 76.0, 192.0);
    const MID: (f64, f64, f64) = (221.0, 221.0, 221.0);
    const WARM: (f64, f64, f64) = (180.0, 4.0, 38.0);

    if !value.is_finite() {
        return (255, 255, 255);
    }
    let t = value.clamp(-1.0, 1.0);
    let (from, to, w) = if t < 0.0 { (MID, COLD, -t) } else { (MID, WARM, t) };
    let mix = |a: f64, b: f64| (a + (b - a) * w).round() as u8;
    (mix(from.0, to.0), mix(from.1, to.1), mix(from.2, to.2))
}

/// Square heatmap of a correlation matrix labelled on both axes.
pub fn correlation_heatmap(title: &str, labels: &[String], matrix: &Array2<f64>) -> String {
    let n = labels.len();
    if n == 0 || matrix.nrows() != n || matrix.ncols() != n {
        return String::new();
    }

    let left = 70.0;
    let top = 50.0;
    let scale_width = 60.0;
    let side = (WIDTH - left - scale_width - PADDING).min(HEIGHT - top - PADDING);
    let cell = side / n as f64;
    let font = (cell * 0.6).clamp(6.0, 11.0);

    let mut svg = svg_header(title);
    for (i, row_label) in labels.iter().enumerate() {
        let cy = top + (i as f64 + 0.5) * cell;
        let _ = write!(
            svg,
            r#"<text x="{:.2}" y="{:.2}" text-anchor="end" font-size="{font:.1}">{}</text>"#,
            left - 4.0,
            cy + font / 3.0,
            escape(row_label)
        );
        for j in 0..n {
            let (r, g, b) = coolwarm(matrix[[i, j]]);
            let _ = write!(
                svg,
                r#"<rect x="{:.2}" y="{:.2}" width="{cell:.2}" height="{cell:.2}" fill="rgb({r},{g},{b})" stroke="white" stroke-width="0.5" />"#,
                left + j as f64 * cell,
                top + i as f64 * cell,
            );
        }
    }
    for (j, col_label) in labels.iter().enumerate() {
        let cx = left + (j as f64 + 0.5) * cell;
        let cy = top + side + 6.0;
        let _ = write!(
            svg,
            r#"<text x="{cx:.2}" y="{cy:.2}" text-anchor="end" font-size="{font:.1}" transform="rotate(-90 {cx:.2} {cy:.2})">{}</text>"#,
            escape(col_label)
        );
    }

    // color scale
    let scale_x = left + side + 16.0;
    let steps = 20;
    let step_h = side / steps as f64;
    for k in 0..steps {
        let value = 1.0 - 2.0 * (k as f64 + 0.5) / steps as f64;
        let (r, g, b) = coolwarm(value);
        let _ = write!(
            svg,
            r#"<rect x="{scale_x:.2}" y="{:.2}" width="14" height="{:.2}" fill="rgb({r},{g},{b})" />"#,
            top + k as f64 * step_h,
            step_h + 0.5
        );
    }
    for (value, y) in [(1.0, top), (0.0, top + side / 2.0), (-1.0, top + side)] {
        let _ = write!(
            svg,
            r#"<text x="{:.2}" y="{:.2}" text-anchor="start">{value:.1}</text>"#,
            scale_x + 18.0,
            y + 4.0
        );
    }

    svg.push_str("</svg>\n");
    svg
}

fn svg_header(title: &str) -> String {
    format!(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}"><style>text{{font-family:Arial,sans-serif;font-size:11px;fill:#444}}</style><rect width="100%" height="100%" fill="white" /><text x="{cx:.2}" y="28" text-anchor="middle" font-size="17" fill="#222">{title}</text>"##,
        w = WIDTH,
        h = HEIGHT,
        cx = WIDTH / 2.0,
        title = escape(title)
    )
}

fn scale_x(day: i32, min_d: i32, max_d: i32) -> f64 {
    if max_d == min_d {
        return WIDTH / 2.0;
    }
    let norm = f64::from(day - min_d) / f64::from(max_d - min_d);
    PADDING + norm * (WIDTH - 2.0 * PADDING)
}

fn scale_y(value: f64, min_v: f64, max_v: f64) -> f64 {
    let norm = (value - min_v) / (max_v - min_v);
    PADDING + (1.0 - norm) * (HEIGHT - 2.0 * PADDING)
}

fn draw_value_axis(svg: &mut String, min_v: f64, max_v: f64, grid: bool) {
    let ticks = 5;
    let _ = write!(
        svg,
        r##"<line x1="{p:.2}" y1="{p:.2}" x2="{p:.2}" y2="{b:.2}" stroke="#000" stroke-width="1" />"##,
        p = PADDING,
        b = HEIGHT - PADDING
    );
    for k in 0..=ticks {
        let value = min_v + (max_v - min_v) * k as f64 / ticks as f64;
        let y = scale_y(value, min_v, max_v);
        if grid {
            let _ = write!(
                svg,
                r##"<line x1="{:.2}" y1="{y:.2}" x2="{:.2}" y2="{y:.2}" stroke="#e0e0e0" stroke-width="0.7" />"##,
                PADDING,
                WIDTH - PADDING
            );
        }
        let _ = write!(
            svg,
            r#"<text x="{:.2}" y="{:.2}" text-anchor="end">{}</text>"#,
            PADDING - 6.0,
            y + 4.0,
            tick_label(value, max_v - min_v)
        );
    }
}

fn tick_label(value: f64, span: f64) -> String {
    if span < 0.05 {
        format!("{value:.4}")
    } else if span < 5.0 {
        format!("{value:.2}")
    } else {
        format!("{value:.0}")
    }
}

fn draw_date_axis(svg: &mut String, min_d: i32, max_d: i32) {
    let axis_y = HEIGHT - PADDING;
    let _ = write!(
        svg,
        r##"<line x1="{:.2}" y1="{axis_y:.2}" x2="{:.2}" y2="{axis_y:.2}" stroke="#000" stroke-width="1" />"##,
        PADDING,
        WIDTH - PADDING
    );

    let (Some(first), Some(last)) = (
        NaiveDate::from_num_days_from_ce_opt(min_d),
        NaiveDate::from_num_days_from_ce_opt(max_d),
    ) else {
        return;
    };
    // about eight labels, on month boundaries
    let months = (last.year() - first.year()) * 12 + last.month() as i32 - first.month() as i32;
    let every = (months / 8).max(1);
    let mut step = 0;
    let mut cursor = NaiveDate::from_ymd_opt(first.year(), first.month(), 1);
    while let Some(date) = cursor.filter(|d| *d <= last) {
        if date >= first && step % every == 0 {
            let x = scale_x(date.num_days_from_ce(), min_d, max_d);
            let _ = write!(
                svg,
                r##"<line x1="{x:.2}" y1="{axis_y:.2}" x2="{x:.2}" y2="{:.2}" stroke="#999" stroke-width="1" /><text x="{x:.2}" y="{:.2}" text-anchor="middle">{}</text>"##,
                axis_y + 4.0,
                axis_y + 18.0,
                date.format("%Y-%m")
            );
        }
        if date >= first {
            step += 1;
        }
        cursor = date.checked_add_months(chrono::Months::new(1));
    }
}

fn draw_legend(svg: &mut String, series: &[LineSeries]) {
    let x = PADDING + 12.0;
    let mut y = PADDING + 14.0;
    for entry in series {
        let Some(label) = &entry.label else {
            continue;
        };
        let _ = write!(
            svg,
            r#"<line x1="{x:.2}" y1="{:.2}" x2="{:.2}" y2="{:.2}" stroke="{}" stroke-width="2" stroke-dasharray="{}" /><text x="{:.2}" y="{y:.2}" text-anchor="start">{}</text>"#,
            y - 4.0,
            x + 22.0,
            y - 4.0,
            entry.color,
            if entry.dash { "6 4" } else { "0" },
            x + 28.0,
            escape(label)
        );
        y += 16.0;
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
