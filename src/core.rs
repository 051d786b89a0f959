use serde::{Deserialize, Serialize};

use crate::curve::Curve;
use crate::histogram::Histogram;

/// Common metadata for a figure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PlotMeta {
    /// Title displayed at the top of the figure
    pub title: Option<String>,
    /// Optional description displayed below the title
    pub description: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub const WHITE: Self = Self::rgb(1.0, 1.0, 1.0);
    pub const LIGHT_GREY: Self = Self::rgb(0.827, 0.827, 0.827);
    pub const STEEL_BLUE: Self = Self::rgb(0.122, 0.467, 0.706); // #1f77b4
    pub const ORANGE: Self = Self::rgb(1.0, 0.647, 0.0);
    pub const PAPER: Self = Self::rgb(0.98, 0.98, 0.98); // #fafafa
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Style {
    pub color: Color,
    /// Outline colour for filled glyphs
    pub line_color: Color,
    pub size: f32, // line width
    pub opacity: f32,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            color: Color::STEEL_BLUE,
            line_color: Color::STEEL_BLUE,
            size: 2.0,
            opacity: 1.0,
        }
    }
}

impl Style {
    #[inline]
    pub const fn color(mut self, c: Color) -> Self {
        self.color = c;
        self.line_color = c;
        self
    }

    #[inline]
    pub const fn line_color(mut self, c: Color) -> Self {
        self.line_color = c;
        self
    }

    #[inline]
    pub const fn size(mut self, size: f32) -> Self {
        self.size = size;
        self
    }

    #[inline]
    pub const fn opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity;
        self
    }
}

/// Column data backing the histogram quads.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QuadSource {
    pub top: Vec<f64>,
    pub left: Vec<f64>,
    pub right: Vec<f64>,
}

impl QuadSource {
    pub fn len(&self) -> usize {
        self.top.len()
    }

    pub fn is_empty(&self) -> bool {
        self.top.is_empty()
    }
}

impl From<&Histogram> for QuadSource {
    fn from(h: &Histogram) -> Self {
        let n = h.heights.len();
        Self {
            top: h.heights.clone(),
            left: h.edges[..n].to_vec(),
            right: h.edges[1..].to_vec(),
        }
    }
}

/// Column data backing a line glyph.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LineSource {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

impl From<Curve> for LineSource {
    fn from(c: Curve) -> Self {
        Self { x: c.xs, y: c.ys }
    }
}

/// A renderable element: its data source plus how it is drawn.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Glyph<S> {
    pub source: S,
    pub style: Style,
    pub visible: bool,
    pub legend: String,
}

impl<S: Default> Glyph<S> {
    pub fn new(legend: impl Into<String>, style: Style) -> Self {
        Self {
            source: S::default(),
            style,
            visible: true,
            legend: legend.into(),
        }
    }
}

/// Displayed x-axis interval. Independent of the data's natural range.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Range1d {
    pub start: f64,
    pub end: f64,
}

impl Range1d {
    pub const fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn span(&self) -> f64 {
        self.end - self.start
    }
}

impl From<(f64, f64)> for Range1d {
    fn from((start, end): (f64, f64)) -> Self {
        Self { start, end }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegendLocation {
    #[default]
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

/// The display surface of one distribution dashboard: a histogram of
/// samples plus the analytic PDF and CDF lines over `x_range`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Figure {
    pub meta: PlotMeta,
    pub x_range: Range1d,
    pub hist: Glyph<QuadSource>,
    pub pdf: Glyph<LineSource>,
    pub cdf: Glyph<LineSource>,
    pub background: Color,
    pub legend_location: LegendLocation,
}

impl Figure {
    pub fn new(title: impl Into<String>, x_range: Range1d) -> Self {
        Self {
            meta: PlotMeta {
                title: Some(title.into()),
                description: None,
            },
            x_range,
            hist: Glyph::new(
                "samples",
                Style::default()
                    .color(Color::LIGHT_GREY)
                    .line_color(Color::WHITE)
                    .size(1.0)
                    .opacity(0.5),
            ),
            pdf: Glyph::new("PDF", Style::default().color(Color::STEEL_BLUE)),
            cdf: Glyph::new("CDF", Style::default().color(Color::ORANGE)),
            background: Color::PAPER,
            legend_location: LegendLocation::TopLeft,
        }
    }
}
