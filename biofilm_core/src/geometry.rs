//! Surface geometry - strip regions, convex hulls and the separating-axis test.
//!
//! The surface is a rectangle cut into horizontal strips by a sorted list of
//! boundary y-values. Regions are numbered by how many boundaries lie strictly
//! below a point: even regions are coated, odd regions are uncoated.

use crate::error::SimError;
use geo::{ConvexHull, MultiPoint, Point};
use nalgebra::Vector2;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

/// Position of an agent or food unit on the surface.
pub type Position = Vector2<f64>;

/// The rectangular playground `[x_low, x_high] × [y_low, y_high]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Surface {
    pub x_low: f64,
    pub x_high: f64,
    pub y_low: f64,
    pub y_high: f64,
}

impl Default for Surface {
    fn default() -> Self {
        Self::new(0.0, 10.0, 0.0, 10.0)
    }
}

impl Surface {
    pub fn new(x_low: f64, x_high: f64, y_low: f64, y_high: f64) -> Self {
        Self { x_low, x_high, y_low, y_high }
    }

    pub fn width(&self) -> f64 {
        self.x_high - self.x_low
    }

    pub fn height(&self) -> f64 {
        self.y_high - self.y_low
    }

    /// Returns true if `p` lies inside the rectangle (edges included).
    pub fn contains(&self, p: &Position) -> bool {
        p.x >= self.x_low && p.x <= self.x_high && p.y >= self.y_low && p.y <= self.y_high
    }

    /// Samples a point uniformly over the rectangle.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> Position {
        Vector2::new(
            rng.gen_range(self.x_low..=self.x_high),
            rng.gen_range(self.y_low..=self.y_high),
        )
    }

    pub fn validate(&self) -> Result<(), SimError> {
        let finite = [self.x_low, self.x_high, self.y_low, self.y_high]
            .iter()
            .all(|v| v.is_finite());
        if !finite || self.width() <= 0.0 || self.height() <= 0.0 {
            return Err(SimError::config(format!("degenerate surface {:?}", self)));
        }
        Ok(())
    }
}

/// Sorted strip boundaries along the y axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StripLayout {
    boundaries: Vec<f64>,
}

impl StripLayout {
    /// Creates a layout from ascending boundary values.
    pub fn new(boundaries: Vec<f64>) -> Result<Self, SimError> {
        if boundaries.iter().any(|b| !b.is_finite()) {
            return Err(SimError::config("strip boundaries must be finite"));
        }
        if boundaries.windows(2).any(|w| w[1] < w[0]) {
            return Err(SimError::config(format!("strip boundaries must be ascending: {:?}", boundaries)));
        }
        Ok(Self { boundaries })
    }

    /// Builds `n_coated` coated strips of width `coated_width` separated by
    /// equal uncoated strips, spanning `[0, height]`.
    ///
    /// The layout starts and ends with an uncoated strip of width
    /// `(height - n_coated * coated_width) / (n_coated + 1)`.
    pub fn alternating(n_coated: usize, coated_width: f64, height: f64) -> Result<Self, SimError> {
        if !coated_width.is_finite() || coated_width < 0.0 || !height.is_finite() || height <= 0.0 {
            return Err(SimError::config(format!(
                "invalid strip geometry: width {coated_width}, height {height}"
            )));
        }
        let n = n_coated as f64;
        let mut uncoated_width = (height - n * coated_width) / (n + 1.0);
        if uncoated_width < -1e-9 * height {
            return Err(SimError::config(format!(
                "{n_coated} coated strips of width {coated_width} do not fit in height {height}"
            )));
        }
        uncoated_width = uncoated_width.max(0.0);

        let mut boundaries = Vec::with_capacity(2 * n_coated + 2);
        let mut y = 0.0;
        boundaries.push(y);
        for strip in 0..(2 * n_coated + 1) {
            y += if strip % 2 == 0 { uncoated_width } else { coated_width };
            boundaries.push(y);
        }
        // accumulated rounding must not shift the top edge
        if let Some(last) = boundaries.last_mut() {
            *last = height;
        }
        Self::new(boundaries)
    }

    pub fn boundaries(&self) -> &[f64] {
        &self.boundaries
    }

    /// Region index of height `y`: the number of boundaries strictly below it.
    pub fn classify(&self, y: f64) -> usize {
        self.boundaries.partition_point(|&b| b < y)
    }

    /// Number of distinct region indices a point can receive.
    pub fn region_count(&self) -> usize {
        self.boundaries.len() + 1
    }
}

/// Even regions are coated.
pub fn is_coated(region: usize) -> bool {
    region % 2 == 0
}

/// Whether an agent may go from `from` to `to` in one displacement.
///
/// At most one boundary may be crossed, and a coated region is never left.
pub fn transition_allowed(from: usize, to: usize) -> bool {
    let jump = from.abs_diff(to);
    jump <= 1 && !(is_coated(from) && jump != 0)
}

/// Surface plus strip layout: everything a placement is checked against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Habitat {
    pub surface: Surface,
    pub strips: StripLayout,
}

impl Habitat {
    pub fn new(surface: Surface, strips: StripLayout) -> Self {
        Self { surface, strips }
    }

    pub fn region_of(&self, p: &Position) -> usize {
        self.strips.classify(p.y)
    }

    /// Returns the region of `p` if an agent currently in `from` may land there.
    pub fn admit(&self, from: usize, p: &Position) -> Option<usize> {
        if !self.surface.contains(p) {
            return None;
        }
        let region = self.region_of(p);
        transition_allowed(from, region).then_some(region)
    }
}

/// Samples a point uniformly over the disk of `radius` around `center`.
pub fn sample_in_disk<R: Rng>(center: &Position, radius: f64, rng: &mut R) -> Position {
    let angle = rng.gen_range(0.0..TAU);
    let r = radius * rng.gen::<f64>().sqrt();
    center + Vector2::new(r * angle.cos(), r * angle.sin())
}

/// A convex polygon given by its vertices in boundary order.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvexPolygon {
    vertices: Vec<Position>,
}

impl ConvexPolygon {
    /// Wraps `vertices`, which must already be convex and ordered.
    ///
    /// Returns `None` for fewer than three vertices.
    pub fn new(vertices: Vec<Position>) -> Option<Self> {
        (vertices.len() >= 3).then_some(Self { vertices })
    }

    /// Convex hull of a point cloud, `None` if it has fewer than three corners.
    pub fn hull_of(points: &[Position]) -> Option<Self> {
        let cloud: MultiPoint<f64> = points.iter().map(|p| Point::new(p.x, p.y)).collect();
        let hull = cloud.convex_hull();

        let mut vertices: Vec<Position> = hull
            .exterior()
            .coords()
            .map(|c| Vector2::new(c.x, c.y))
            .collect();
        // geo rings are closed
        if vertices.len() > 1 && vertices.first() == vertices.last() {
            vertices.pop();
        }
        vertices.dedup();

        Self::new(vertices)
    }

    pub fn vertices(&self) -> &[Position] {
        &self.vertices
    }

    /// Unit normals of every non-degenerate edge.
    fn axes(&self) -> impl Iterator<Item = Position> + '_ {
        let n = self.vertices.len();
        (0..n).filter_map(move |i| {
            let edge = self.vertices[(i + 1) % n] - self.vertices[i];
            let normal = Vector2::new(edge.y, -edge.x);
            let length = normal.norm();
            (length > 0.0).then(|| normal / length)
        })
    }

    /// Projection interval of the polygon onto `axis`.
    fn project(&self, axis: &Position) -> (f64, f64) {
        self.vertices
            .iter()
            .map(|v| v.dot(axis))
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), d| (lo.min(d), hi.max(d)))
    }

    /// Separating-axis test.
    ///
    /// Returns false as soon as one edge normal of either polygon shows a
    /// strict gap between the projections; touching intervals count as overlap.
    pub fn overlaps(&self, other: &ConvexPolygon) -> bool {
        self.axes().chain(other.axes()).all(|axis| {
            let (a_min, a_max) = self.project(&axis);
            let (b_min, b_max) = other.project(&axis);
            a_min <= b_max && b_min <= a_max
        })
    }
}
