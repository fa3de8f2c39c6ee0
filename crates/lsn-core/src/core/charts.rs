use plotters::coord::Shift;
use plotters::prelude::*;
use std::path::Path;
use thiserror::Error;
use tracing::warn;

const DEFAULT_PANEL_SIZE: (u32, u32) = (640, 480);
/// Axis ranges of a panel with nothing finite to draw.
const EMPTY_BOUNDS: ((f64, f64), (f64, f64)) = ((0.0, 1.0), (0.0, 1.0));

#[derive(Debug, Error)]
pub enum ChartError {
    #[error("Figure has no panel")]
    NoPanels,
    #[error("Drawing error: {0}")]
    Drawing(String),
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

impl<E: std::error::Error + Send + Sync> From<DrawingAreaErrorKind<E>> for ChartError {
    fn from(e: DrawingAreaErrorKind<E>) -> Self {
        ChartError::Drawing(e.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SeriesKind {
    Line,
    Points,
    /// Points with symmetric vertical error bars; one error per point.
    ErrorBars(Vec<f64>),
    /// Histogram bars of the given width, centered on each x.
    Bars(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub label: Option<String>,
    pub kind: SeriesKind,
    pub points: Vec<(f64, f64)>,
}

fn finite_pairs(xs: &[f64], ys: &[f64]) -> Vec<(f64, f64)> {
    xs.iter()
        .zip(ys)
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .map(|(&x, &y)| (x, y))
        .collect()
}

impl Series {
    pub fn line(label: impl Into<String>, xs: &[f64], ys: &[f64]) -> Self {
        Self {
            label: Some(label.into()),
            kind: SeriesKind::Line,
            points: finite_pairs(xs, ys),
        }
    }

    pub fn points(label: impl Into<String>, xs: &[f64], ys: &[f64]) -> Self {
        Self {
            label: Some(label.into()),
            kind: SeriesKind::Points,
            points: finite_pairs(xs, ys),
        }
    }

    pub fn error_bars(label: impl Into<String>, xs: &[f64], ys: &[f64], errors: &[f64]) -> Self {
        let (points, errors): (Vec<(f64, f64)>, Vec<f64>) = xs
            .iter()
            .zip(ys)
            .zip(errors)
            .filter(|((x, y), e)| x.is_finite() && y.is_finite() && e.is_finite())
            .map(|((&x, &y), &e)| ((x, y), e.abs()))
            .unzip();
        Self {
            label: Some(label.into()),
            kind: SeriesKind::ErrorBars(errors),
            points,
        }
    }

    pub fn bars(label: impl Into<String>, centers: &[f64], heights: &[f64], width: f64) -> Self {
        Self {
            label: Some(label.into()),
            kind: SeriesKind::Bars(width),
            points: finite_pairs(centers, heights),
        }
    }

    pub fn unlabeled(mut self) -> Self {
        self.label = None;
        self
    }

    fn extents(&self) -> Vec<(f64, f64)> {
        match &self.kind {
            SeriesKind::Line | SeriesKind::Points => self.points.clone(),
            SeriesKind::ErrorBars(errors) => self
                .points
                .iter()
                .zip(errors)
                .flat_map(|(&(x, y), e)| [(x, y - e), (x, y + e)])
                .collect(),
            SeriesKind::Bars(width) => self
                .points
                .iter()
                .flat_map(|&(x, y)| [(x - width / 2.0, 0.0), (x + width / 2.0, y)])
                .collect(),
        }
    }
}

/// One chart: a set of series sharing axes, plus horizontal reference lines.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Panel {
    pub title: String,
    pub x_desc: String,
    pub y_desc: String,
    pub series: Vec<Series>,
    pub hlines: Vec<f64>,
}

impl Panel {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn x_desc(mut self, desc: impl Into<String>) -> Self {
        self.x_desc = desc.into();
        self
    }

    pub fn y_desc(mut self, desc: impl Into<String>) -> Self {
        self.y_desc = desc.into();
        self
    }

    pub fn with_series(mut self, series: Series) -> Self {
        self.series.push(series);
        self
    }

    pub fn hline(mut self, y: f64) -> Self {
        if y.is_finite() {
            self.hlines.push(y);
        }
        self
    }

    /// Axis ranges covering every series and reference line, padded by 5%.
    pub fn bounds(&self) -> Option<((f64, f64), (f64, f64))> {
        let points: Vec<(f64, f64)> = self.series.iter().flat_map(Series::extents).collect();
        if points.is_empty() {
            return None;
        }
        let x = span(points.iter().map(|p| p.0));
        let y = span(points.iter().map(|p| p.1).chain(self.hlines.iter().copied()));
        Some((pad(x), pad(y)))
    }
}

fn span(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    })
}

fn pad((lo, hi): (f64, f64)) -> (f64, f64) {
    let span = hi - lo;
    if span <= f64::EPSILON * lo.abs().max(1.0) {
        let delta = (lo.abs() * 0.1).max(0.5);
        (lo - delta, hi + delta)
    } else {
        (lo - 0.05 * span, hi + 0.05 * span)
    }
}

/// Panels laid out on a grid, filled row by row.
#[derive(Debug, Clone, PartialEq)]
pub struct Figure {
    pub panels: Vec<Panel>,
    pub columns: usize,
    pub panel_size: (u32, u32),
}

impl Figure {
    pub fn new(columns: usize) -> Self {
        Self {
            panels: Vec::new(),
            columns: columns.max(1),
            panel_size: DEFAULT_PANEL_SIZE,
        }
    }

    pub fn single(panel: Panel) -> Self {
        Self::new(1).with_panel(panel)
    }

    pub fn with_panel(mut self, panel: Panel) -> Self {
        self.panels.push(panel);
        self
    }

    pub fn panel_size(mut self, size: (u32, u32)) -> Self {
        self.panel_size = size;
        self
    }

    pub fn grid(&self) -> (usize, usize) {
        let columns = self.columns.min(self.panels.len()).max(1);
        (self.panels.len().div_ceil(columns), columns)
    }

    pub fn render_svg(&self, path: &Path) -> Result<(), ChartError> {
        if self.panels.is_empty() {
            return Err(ChartError::NoPanels);
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ChartError::Io {
                path: parent.to_string_lossy().to_string(),
                source: e,
            })?;
        }
        let (rows, columns) = self.grid();
        let size = (
            self.panel_size.0 * columns as u32,
            self.panel_size.1 * rows as u32,
        );
        let root = SVGBackend::new(path, size).into_drawing_area();
        root.fill(&WHITE)?;
        let areas = root.split_evenly((rows, columns));
        for (area, panel) in areas.iter().zip(&self.panels) {
            draw_panel(area, panel)?;
        }
        root.present()?;
        Ok(())
    }
}

fn draw_panel<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    panel: &Panel,
) -> Result<(), ChartError> {
    let ((x0, x1), (y0, y1)) = panel.bounds().unwrap_or_else(|| {
        warn!(panel = %panel.title, "No finite point to draw, leaving the axes empty");
        EMPTY_BOUNDS
    });

    let mut chart = ChartBuilder::on(area)
        .caption(&panel.title, ("sans-serif", 18))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x0..x1, y0..y1)?;

    chart
        .configure_mesh()
        .x_desc(panel.x_desc.as_str())
        .y_desc(panel.y_desc.as_str())
        .draw()?;

    for &y in &panel.hlines {
        chart.draw_series(std::iter::once(PathElement::new(
            vec![(x0, y), (x1, y)],
            BLACK.mix(0.6),
        )))?;
    }

    let mut labeled = false;
    for (i, series) in panel.series.iter().enumerate() {
        let color = Palette99::pick(i).mix(0.9);
        let anno = match &series.kind {
            SeriesKind::Line => chart.draw_series(LineSeries::new(
                series.points.iter().copied(),
                color.stroke_width(2),
            ))?,
            SeriesKind::Points => chart.draw_series(
                series
                    .points
                    .iter()
                    .map(|&p| Circle::new(p, 3, color.filled())),
            )?,
            SeriesKind::ErrorBars(errors) => {
                chart.draw_series(series.points.iter().zip(errors).map(|(&(x, y), e)| {
                    PathElement::new(vec![(x, y - e), (x, y + e)], color.mix(0.65))
                }))?;
                chart.draw_series(
                    series
                        .points
                        .iter()
                        .map(|&p| Circle::new(p, 2, color.filled())),
                )?
            }
            SeriesKind::Bars(width) => chart.draw_series(series.points.iter().map(|&(x, y)| {
                Rectangle::new(
                    [(x - width / 2.0, 0.0), (x + width / 2.0, y)],
                    color.mix(0.5).filled(),
                )
            }))?,
        };
        if let Some(label) = &series.label {
            labeled = true;
            anno.label(label.as_str())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
        }
    }

    if labeled {
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;
    }
    Ok(())
}

/// A closed route drawn over the scatter of all cities.
pub fn route_panel(title: impl Into<String>, cities: &[(f64, f64)], route: &[(f64, f64)]) -> Panel {
    let (cx, cy): (Vec<f64>, Vec<f64>) = cities.iter().copied().unzip();
    let (mut rx, mut ry): (Vec<f64>, Vec<f64>) = route.iter().copied().unzip();
    if let Some(&(x, y)) = route.first() {
        rx.push(x);
        ry.push(y);
    }
    Panel::new(title)
        .x_desc("x")
        .y_desc("y")
        .with_series(Series::line("route", &rx, &ry))
        .with_series(Series::points("cities", &cx, &cy))
}

/// Density histogram given the left bin edges, with an optional reference curve.
pub fn histogram_panel(
    title: impl Into<String>,
    left_edges: &[f64],
    density: &[f64],
    reference: Option<(&str, &[f64], &[f64])>,
) -> Panel {
    let width = match left_edges {
        [a, b, ..] => b - a,
        _ => 1.0,
    };
    let centers: Vec<f64> = left_edges.iter().map(|l| l + width / 2.0).collect();
    let mut panel = Panel::new(title)
        .x_desc("x")
        .y_desc("density")
        .with_series(Series::bars("histogram", &centers, density, width));
    if let Some((label, xs, ys)) = reference {
        panel = panel.with_series(Series::line(label, xs, ys));
    }
    panel
}
