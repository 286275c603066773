//! Generate acquisition geometries and compute survey boundaries.
//!
//! # Overview
//!
//! * [hull]: convex hulls of scattered points (gift wrapping, Graham scan, monotone chain and
//!   quickhull). Every method returns the same canonical [Polygon].
//! * [grid]: synthetic stack and prestack acquisition layouts over regular grids, returned as
//!   trace header columns ready to be written to a dataset.
//!
//! # Canonical polygons
//!
//! A [Polygon] lists its vertices counter-clockwise, starting at the lowest vertex (ties broken by
//! the smallest `x`), without repeating the first vertex at the end and without collinear
//! vertices. Degenerate inputs collapse: no points yield an empty polygon, a single distinct point
//! yields that point and collinear points yield their two extreme endpoints.

use thiserror::Error;

pub mod grid;
pub mod hull;

pub use grid::{prestack, stack, Geometry, Grid};
pub use hull::{convex_hull, HullMethod};

/// Errors that can occur when generating geometries.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("{0} grid is empty")]
    EmptyGrid(&'static str),
    #[error("{0} grid parameter {1} is not finite")]
    NonFinite(&'static str, &'static str),
}

/// A point in the plane.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

impl From<Point> for (f64, f64) {
    fn from(p: Point) -> Self {
        (p.x, p.y)
    }
}

/// Vertices of a closed polygon (the closing edge is implicit).
pub type Polygon = Vec<Point>;

/// Signed area of a polygon (positive when counter-clockwise).
pub fn signed_area(polygon: &[Point]) -> f64 {
    let n = polygon.len();
    if n < 3 {
        return 0.0;
    }
    let twice: f64 = (0..n)
        .map(|i| {
            let a = polygon[i];
            let b = polygon[(i + 1) % n];
            a.x * b.y - b.x * a.y
        })
        .sum();
    twice / 2.0
}

/// Order trace coordinates along a 2-D line by their key (usually `CDP`).
///
/// Ties are broken by `x` and then `y`. Rows with a NaN key sort last.
pub fn line_boundary(keys: &[f64], xs: &[f64], ys: &[f64]) -> Vec<Point> {
    let n = keys.len().min(xs.len()).min(ys.len());
    let mut rows: Vec<usize> = (0..n).collect();
    rows.sort_by(|&a, &b| {
        keys[a]
            .total_cmp(&keys[b])
            .then(xs[a].total_cmp(&xs[b]))
            .then(ys[a].total_cmp(&ys[b]))
    });
    rows.into_iter().map(|i| Point::new(xs[i], ys[i])).collect()
}
