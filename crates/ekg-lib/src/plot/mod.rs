//! Plain data describing a chart. Builders here never draw; a renderer (the
//! CLI's plotters backend, a GUI) consumes the [`Figure`] as-is.

use crate::{
    detectors::ecg::QrsDetection,
    signal::{Beat, TimeSeries},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Axis {
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Style {
    pub width: f32,
    pub color: Color,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color(pub u32);

impl Color {
    pub const TRACE: Color = Color(0x2E8B57);
    pub const R_PEAK: Color = Color(0xD62728);
    pub const Q_POINT: Color = Color(0x1F77B4);
    pub const S_POINT: Color = Color(0x2CA02C);

    pub fn rgb(self) -> (u8, u8, u8) {
        (
            ((self.0 >> 16) & 0xFF) as u8,
            ((self.0 >> 8) & 0xFF) as u8,
            (self.0 & 0xFF) as u8,
        )
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarkerShape {
    Circle,
    TriangleLeft,
    TriangleRight,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineSeries {
    pub name: String,
    pub points: Vec<[f64; 2]>,
    pub style: Style,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkerSeries {
    pub name: String,
    pub points: Vec<[f64; 2]>,
    pub shape: MarkerShape,
    pub color: Color,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Series {
    Line(LineSeries),
    Markers(MarkerSeries),
}

impl Series {
    pub fn name(&self) -> &str {
        match self {
            Series::Line(line) => &line.name,
            Series::Markers(markers) => &markers.name,
        }
    }

    pub fn points(&self) -> &[[f64; 2]] {
        match self {
            Series::Line(line) => &line.points,
            Series::Markers(markers) => &markers.points,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Figure {
    pub title: Option<String>,
    pub x: Axis,
    pub y: Axis,
    pub series: Vec<Series>,
}

impl Figure {
    pub fn new(title: impl Into<Option<String>>) -> Self {
        Self {
            title: title.into(),
            x: Axis { label: None },
            y: Axis { label: None },
            series: Vec::new(),
        }
    }

    pub fn add_series(&mut self, series: Series) {
        self.series.push(series);
    }

    /// `(x_min, x_max, y_min, y_max)` over every series, `None` when empty.
    pub fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
        let mut points = self.series.iter().flat_map(|s| s.points().iter());
        let first = points.next()?;
        Some(points.fold(
            (first[0], first[0], first[1], first[1]),
            |(x0, x1, y0, y1), p| (x0.min(p[0]), x1.max(p[0]), y0.min(p[1]), y1.max(p[1])),
        ))
    }
}

/// Keep at most `max_points` evenly strided points.
pub fn decimate_points(points: &[[f64; 2]], max_points: usize) -> Vec<[f64; 2]> {
    if points.len() <= max_points || max_points == 0 {
        return points.to_vec();
    }
    let bucket_size = points.len() as f64 / max_points as f64;
    (0..max_points)
        .map(|i| (i as f64 * bucket_size).floor() as usize)
        .take_while(|&start| start < points.len())
        .map(|start| points[start])
        .collect()
}

pub fn figure_from_timeseries(
    title: &str,
    series: &TimeSeries,
    max_points: usize,
    color: Color,
) -> Figure {
    let points: Vec<[f64; 2]> = series
        .data
        .iter()
        .enumerate()
        .map(|(i, value)| [series.time_of(i), *value])
        .collect();
    let mut fig = Figure::new(Some(title.into()));
    fig.x.label = Some("Time (s)".into());
    fig.y.label = Some("Amplitude".into());
    fig.add_series(Series::Line(LineSeries {
        name: title.into(),
        points: decimate_points(&points, max_points),
        style: Style { width: 1.4, color },
    }));
    fig
}

/// ECG trace with R, Q and S markers placed on the trace's own samples.
///
/// Markers are never decimated, so every detected beat stays visible.
pub fn figure_from_detection(
    ecg: &TimeSeries,
    detection: &QrsDetection,
    max_points: usize,
) -> Figure {
    let mut fig = figure_from_timeseries("ECG", ecg, max_points, Color::TRACE);
    fig.title = Some(format!("ECG - {}", detection.summary()));
    let marker = |index: usize| ecg.data.get(index).map(|&v| [ecg.time_of(index), v]);

    let layers: [(&str, MarkerShape, Color, fn(&Beat) -> usize); 3] = [
        ("R-peaks", MarkerShape::Circle, Color::R_PEAK, |b| b.r),
        ("Q-points", MarkerShape::TriangleLeft, Color::Q_POINT, |b| b.q),
        ("S-points", MarkerShape::TriangleRight, Color::S_POINT, |b| b.s),
    ];
    for (name, shape, color, pick) in layers {
        let points = detection
            .beats
            .iter()
            .filter_map(|b| marker(pick(b)))
            .collect();
        fig.add_series(Series::Markers(MarkerSeries {
            name: name.into(),
            points,
            shape,
            color,
        }));
    }
    fig
}
