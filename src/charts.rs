use std::collections::HashMap;
use std::f32::consts::PI;
use std::sync::OnceLock;

use async_trait::async_trait;
use tiny_skia::{FillRule, Paint, PathBuilder, Pixmap, Rect as SkRect, Stroke, Transform};

use crate::block::Bitmap;
use crate::render::ChartRenderer;
use crate::types::Color;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChartKind {
    Bar,
    Line,
    Doughnut,
    Radar,
}

impl ChartKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChartKind::Bar => "bar",
            ChartKind::Line => "line",
            ChartKind::Doughnut => "doughnut",
            ChartKind::Radar => "radar",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartSeries {
    pub label: String,
    /// `None` marks a missing data point; it keeps its slot on the axis.
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub title: String,
    pub labels: Vec<String>,
    pub series: Vec<ChartSeries>,
    pub width_px: u32,
    pub height_px: u32,
    /// Fixed axis ceiling (radar scores); derived from the data when absent.
    pub max_value: Option<f64>,
}

impl ChartSpec {
    pub fn new(kind: ChartKind, title: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            labels: Vec::new(),
            series: Vec::new(),
            width_px: 640,
            height_px: 320,
            max_value: None,
        }
    }

    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_series(self, label: impl Into<String>, values: Vec<f64>) -> Self {
        self.with_sparse_series(label, values.into_iter().map(Some).collect())
    }

    /// Series with gaps. Non-finite values are stored as gaps too.
    pub fn with_sparse_series(
        mut self,
        label: impl Into<String>,
        values: Vec<Option<f64>>,
    ) -> Self {
        self.series.push(ChartSeries {
            label: label.into(),
            values: values
                .into_iter()
                .map(|value| value.filter(|v| v.is_finite()))
                .collect(),
        });
        self
    }

    pub fn with_size(mut self, width_px: u32, height_px: u32) -> Self {
        self.width_px = width_px;
        self.height_px = height_px;
        self
    }

    pub fn with_max_value(mut self, max_value: f64) -> Self {
        self.max_value = Some(max_value);
        self
    }

    fn finite_values(&self) -> impl Iterator<Item = f64> + '_ {
        self.series
            .iter()
            .flat_map(|series| series.values.iter().flatten().copied())
    }

    pub fn has_data(&self) -> bool {
        self.finite_values().next().is_some()
    }
}

type ChartPainter = fn(&mut Pixmap, &ChartSpec) -> bool;

/// Painters for the built-in chart kinds. Installed once per process.
pub struct ChartRegistry {
    painters: HashMap<ChartKind, ChartPainter>,
}

impl ChartRegistry {
    fn with_defaults() -> Self {
        let mut painters: HashMap<ChartKind, ChartPainter> = HashMap::new();
        painters.insert(ChartKind::Bar, paint_bar);
        painters.insert(ChartKind::Line, paint_line);
        painters.insert(ChartKind::Doughnut, paint_doughnut);
        painters.insert(ChartKind::Radar, paint_radar);
        Self { painters }
    }

    pub fn painter(&self, kind: ChartKind) -> Option<ChartPainter> {
        self.painters.get(&kind).copied()
    }

    pub fn kinds(&self) -> usize {
        self.painters.len()
    }
}

static CHART_REGISTRY: OnceLock<ChartRegistry> = OnceLock::new();

/// Installs the built-in chart painters. Safe to call any number of times;
/// only the first call does work.
pub fn register_default_charts() -> &'static ChartRegistry {
    CHART_REGISTRY.get_or_init(|| {
        tracing::debug!("registering built-in chart painters");
        ChartRegistry::with_defaults()
    })
}

pub fn charts_registered() -> bool {
    CHART_REGISTRY.get().is_some()
}

/// Chart renderer backed by tiny-skia. Returns `None` for specs without
/// drawable data.
#[derive(Debug, Clone, Copy, Default)]
pub struct RasterChartRenderer;

impl RasterChartRenderer {
    pub fn render_sync(&self, spec: &ChartSpec) -> Option<Bitmap> {
        if !spec.has_data() {
            return None;
        }
        let painter = register_default_charts().painter(spec.kind)?;
        let mut pixmap = Pixmap::new(spec.width_px.max(1), spec.height_px.max(1))?;
        pixmap.fill(tiny_skia::Color::WHITE);
        if !painter(&mut pixmap, spec) {
            return None;
        }
        match Bitmap::from_pixmap(&pixmap) {
            Ok(bitmap) => Some(bitmap),
            Err(err) => {
                tracing::warn!(chart = %spec.title, error = %err, "chart encoding failed");
                None
            }
        }
    }
}

#[async_trait]
impl ChartRenderer for RasterChartRenderer {
    async fn render_chart(&self, spec: &ChartSpec) -> Option<Bitmap> {
        self.render_sync(spec)
    }
}

const PALETTE: [(u8, u8, u8); 6] = [
    (30, 64, 124),
    (196, 154, 60),
    (46, 139, 87),
    (178, 34, 52),
    (112, 128, 144),
    (106, 90, 205),
];

const PLOT_MARGIN: f32 = 24.0;

fn series_color(index: usize) -> Color {
    let (r, g, b) = PALETTE[index % PALETTE.len()];
    Color::from_rgb8(r, g, b)
}

fn paint(color: Color, alpha: u8) -> Paint<'static> {
    let [r, g, b, a] = color.to_rgba8(alpha);
    let mut paint = Paint::default();
    paint.set_color_rgba8(r, g, b, a);
    paint.anti_alias = true;
    paint
}

fn plot_area(pixmap: &Pixmap) -> Option<(f32, f32, f32, f32)> {
    let w = pixmap.width() as f32 - PLOT_MARGIN * 2.0;
    let h = pixmap.height() as f32 - PLOT_MARGIN * 2.0;
    if w <= 1.0 || h <= 1.0 {
        return None;
    }
    Some((PLOT_MARGIN, PLOT_MARGIN, w, h))
}

fn draw_axes(pixmap: &mut Pixmap, x: f32, y: f32, w: f32, h: f32) {
    let mut pb = PathBuilder::new();
    pb.move_to(x, y);
    pb.line_to(x, y + h);
    pb.line_to(x + w, y + h);
    if let Some(path) = pb.finish() {
        let stroke = Stroke {
            width: 1.5,
            ..Stroke::default()
        };
        pixmap.stroke_path(
            &path,
            &paint(Color::from_rgb8(90, 90, 90), 255),
            &stroke,
            Transform::identity(),
            None,
        );
    }
}

fn paint_bar(pixmap: &mut Pixmap, spec: &ChartSpec) -> bool {
    let Some((x, y, w, h)) = plot_area(pixmap) else {
        return false;
    };
    let max = spec
        .max_value
        .unwrap_or_else(|| spec.finite_values().fold(0.0, f64::max));
    if max <= 0.0 {
        return false;
    }
    let groups = spec
        .series
        .iter()
        .map(|s| s.values.len())
        .max()
        .unwrap_or(0)
        .max(spec.labels.len());
    if groups == 0 {
        return false;
    }
    let group_w = w / groups as f32;
    let bar_w = group_w / (spec.series.len() as f32 + 1.0);
    let mut drawn = false;
    for (series_index, series) in spec.series.iter().enumerate() {
        let fill = paint(series_color(series_index), 255);
        for (group, value) in series.values.iter().enumerate() {
            let Some(value) = *value else {
                continue;
            };
            if value <= 0.0 {
                continue;
            }
            let bar_h = (value / max).min(1.0) as f32 * h;
            let bx = x + group as f32 * group_w + bar_w * (series_index as f32 + 0.5);
            if let Some(rect) = SkRect::from_xywh(bx, y + h - bar_h, bar_w, bar_h) {
                pixmap.fill_rect(rect, &fill, Transform::identity(), None);
                drawn = true;
            }
        }
    }
    draw_axes(pixmap, x, y, w, h);
    drawn
}

fn paint_line(pixmap: &mut Pixmap, spec: &ChartSpec) -> bool {
    let Some((x, y, w, h)) = plot_area(pixmap) else {
        return false;
    };
    let (mut min, mut max) = (f64::MAX, f64::MIN);
    for value in spec.finite_values() {
        min = min.min(value);
        max = max.max(value);
    }
    if min > max {
        return false;
    }
    if (max - min).abs() < f64::EPSILON {
        min -= 1.0;
        max += 1.0;
    }
    let mut drawn = false;
    for (series_index, series) in spec.series.iter().enumerate() {
        let points: Vec<(f32, f32)> = series
            .values
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.map(|v| (i, v)))
            .map(|(i, v)| {
                let steps = (series.values.len().max(2) - 1) as f32;
                let px = x + w * i as f32 / steps;
                let py = y + h - ((v - min) / (max - min)) as f32 * h;
                (px, py)
            })
            .collect();
        let color = series_color(series_index);
        if points.len() >= 2 {
            let mut pb = PathBuilder::new();
            pb.move_to(points[0].0, points[0].1);
            for (px, py) in &points[1..] {
                pb.line_to(*px, *py);
            }
            if let Some(path) = pb.finish() {
                let stroke = Stroke {
                    width: 3.0,
                    ..Stroke::default()
                };
                pixmap.stroke_path(&path, &paint(color, 255), &stroke, Transform::identity(), None);
                drawn = true;
            }
        }
        for (px, py) in &points {
            if let Some(dot) = PathBuilder::from_circle(*px, *py, 4.0) {
                pixmap.fill_path(
                    &dot,
                    &paint(color, 255),
                    FillRule::Winding,
                    Transform::identity(),
                    None,
                );
                drawn = true;
            }
        }
    }
    draw_axes(pixmap, x, y, w, h);
    drawn
}

fn paint_doughnut(pixmap: &mut Pixmap, spec: &ChartSpec) -> bool {
    let Some(series) = spec.series.first() else {
        return false;
    };
    let total: f64 = series
        .values
        .iter()
        .flatten()
        .filter(|v| **v > 0.0)
        .sum();
    if total <= 0.0 {
        return false;
    }
    let cx = pixmap.width() as f32 / 2.0;
    let cy = pixmap.height() as f32 / 2.0;
    let outer = (cx.min(cy) - PLOT_MARGIN / 2.0).max(4.0);
    let inner = outer * 0.55;
    let mut start = -PI / 2.0;
    let mut drawn = false;
    for (index, value) in series.values.iter().enumerate() {
        let Some(value) = *value else {
            continue;
        };
        if value <= 0.0 {
            continue;
        }
        let sweep = (value / total) as f32 * 2.0 * PI;
        let steps = ((sweep / (2.0 * PI)) * 96.0).ceil().max(2.0) as usize;
        let mut pb = PathBuilder::new();
        for step in 0..=steps {
            let angle = start + sweep * step as f32 / steps as f32;
            let (px, py) = (cx + outer * libm::cosf(angle), cy + outer * libm::sinf(angle));
            if step == 0 {
                pb.move_to(px, py);
            } else {
                pb.line_to(px, py);
            }
        }
        for step in (0..=steps).rev() {
            let angle = start + sweep * step as f32 / steps as f32;
            pb.line_to(cx + inner * libm::cosf(angle), cy + inner * libm::sinf(angle));
        }
        pb.close();
        if let Some(path) = pb.finish() {
            pixmap.fill_path(
                &path,
                &paint(series_color(index), 255),
                FillRule::Winding,
                Transform::identity(),
                None,
            );
            drawn = true;
        }
        start += sweep;
    }
    drawn
}

fn paint_radar(pixmap: &mut Pixmap, spec: &ChartSpec) -> bool {
    let axes = spec.labels.len();
    if axes < 3 {
        return false;
    }
    let max = spec
        .max_value
        .unwrap_or_else(|| spec.finite_values().fold(0.0, f64::max));
    if max <= 0.0 {
        return false;
    }
    let cx = pixmap.width() as f32 / 2.0;
    let cy = pixmap.height() as f32 / 2.0;
    let radius = (cx.min(cy) - PLOT_MARGIN).max(4.0);
    let vertex = |axis: usize, fraction: f32| {
        let angle = -PI / 2.0 + 2.0 * PI * axis as f32 / axes as f32;
        (
            cx + radius * fraction * libm::cosf(angle),
            cy + radius * fraction * libm::sinf(angle),
        )
    };

    let grid = paint(Color::from_rgb8(200, 200, 200), 255);
    let grid_stroke = Stroke {
        width: 1.0,
        ..Stroke::default()
    };
    for ring in 1..=5 {
        let fraction = ring as f32 / 5.0;
        let mut pb = PathBuilder::new();
        for axis in 0..axes {
            let (px, py) = vertex(axis, fraction);
            if axis == 0 {
                pb.move_to(px, py);
            } else {
                pb.line_to(px, py);
            }
        }
        pb.close();
        if let Some(path) = pb.finish() {
            pixmap.stroke_path(&path, &grid, &grid_stroke, Transform::identity(), None);
        }
    }

    let mut drawn = false;
    for (series_index, series) in spec.series.iter().enumerate() {
        let mut pb = PathBuilder::new();
        for axis in 0..axes {
            let value = series
                .values
                .get(axis)
                .copied()
                .flatten()
                .unwrap_or(0.0);
            let (px, py) = vertex(axis, (value / max).clamp(0.0, 1.0) as f32);
            if axis == 0 {
                pb.move_to(px, py);
            } else {
                pb.line_to(px, py);
            }
        }
        pb.close();
        if let Some(path) = pb.finish() {
            let color = series_color(series_index);
            pixmap.fill_path(
                &path,
                &paint(color, 96),
                FillRule::Winding,
                Transform::identity(),
                None,
            );
            let stroke = Stroke {
                width: 2.0,
                ..Stroke::default()
            };
            pixmap.stroke_path(&path, &paint(color, 255), &stroke, Transform::identity(), None);
            drawn = true;
        }
    }
    drawn
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_is_idempotent() {
        let first = register_default_charts() as *const ChartRegistry;
        let second = register_default_charts() as *const ChartRegistry;
        assert_eq!(first, second);
        assert!(charts_registered());
        assert_eq!(register_default_charts().kinds(), 4);
    }

    #[test]
    fn renders_each_kind_with_data() {
        let renderer = RasterChartRenderer;
        let specs = [
            ChartSpec::new(ChartKind::Bar, "prices")
                .with_labels(["a", "b"])
                .with_series("price", vec![900_000.0, 1_100_000.0]),
            ChartSpec::new(ChartKind::Line, "trend")
                .with_labels(["Q1", "Q2", "Q3"])
                .with_series("sqm", vec![4200.0, 4350.0, 4400.0]),
            ChartSpec::new(ChartKind::Doughnut, "breakdown")
                .with_series("share", vec![60.0, 25.0, 15.0])
                .with_size(320, 320),
            ChartSpec::new(ChartKind::Radar, "quality")
                .with_labels(["l", "c", "f", "m", "a"])
                .with_series("score", vec![8.0, 7.0, 6.5, 9.0, 5.0])
                .with_max_value(10.0)
                .with_size(320, 320),
        ];
        for spec in &specs {
            let bitmap = renderer.render_sync(spec).expect("chart should render");
            assert_eq!(bitmap.width_px, spec.width_px);
            assert_eq!(bitmap.height_px, spec.height_px);
            assert_eq!(bitmap.mime_type(), "image/png");
        }
    }

    #[test]
    fn empty_or_degenerate_data_yields_nothing() {
        let renderer = RasterChartRenderer;
        assert!(renderer.render_sync(&ChartSpec::new(ChartKind::Bar, "empty")).is_none());
        let zeros = ChartSpec::new(ChartKind::Doughnut, "zeros").with_series("s", vec![0.0, 0.0]);
        assert!(renderer.render_sync(&zeros).is_none());
        let two_axes = ChartSpec::new(ChartKind::Radar, "flat")
            .with_labels(["a", "b"])
            .with_series("s", vec![1.0, 2.0]);
        assert!(renderer.render_sync(&two_axes).is_none());
        let nan = ChartSpec::new(ChartKind::Line, "nan").with_series("s", vec![f64::NAN]);
        assert!(renderer.render_sync(&nan).is_none());
        let gaps = ChartSpec::new(ChartKind::Bar, "gaps").with_sparse_series("s", vec![None, None]);
        assert!(renderer.render_sync(&gaps).is_none());
    }

    #[test]
    fn gaps_keep_their_slot_and_compare_equal() {
        let build = || {
            ChartSpec::new(ChartKind::Radar, "quality")
                .with_labels(["a", "b", "c"])
                .with_sparse_series("score", vec![Some(7.0), None, Some(f64::NAN)])
                .with_max_value(10.0)
        };
        let spec = build();
        assert_eq!(spec.series[0].values, vec![Some(7.0), None, None]);
        assert_eq!(spec, build());
        assert!(RasterChartRenderer.render_sync(&spec).is_some());
    }
}
