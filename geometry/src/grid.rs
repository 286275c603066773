//! Synthetic acquisition layouts over regular grids.
//!
//! Grid nodes are enumerated row by row: `y` is the outer index and `x` the inner one, so node
//! `k` sits at column `k % nx` and row `k / nx`.

use crate::Error;
use std::cmp::Ordering;
use tracing::debug;

/// A regular grid of nodes at constant elevation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Grid {
    pub x0: f64,
    pub dx: f64,
    pub nx: usize,
    pub y0: f64,
    pub dy: f64,
    pub ny: usize,
    pub z: f64,
}

impl Grid {
    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nx * self.ny
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Coordinates of node `k`.
    pub fn node(&self, k: usize) -> (f64, f64) {
        let col = k % self.nx;
        let row = k / self.nx;
        (
            self.x0 + self.dx * col as f64,
            self.y0 + self.dy * row as f64,
        )
    }

    /// Smallest node `x`.
    pub fn x_min(&self) -> f64 {
        self.x0.min(self.x0 + self.dx * self.nx.saturating_sub(1) as f64)
    }

    /// Smallest node `y`.
    pub fn y_min(&self) -> f64 {
        self.y0.min(self.y0 + self.dy * self.ny.saturating_sub(1) as f64)
    }

    /// Scale every length (origin, steps and elevation) by `factor`.
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            x0: self.x0 * factor,
            dx: self.dx * factor,
            y0: self.y0 * factor,
            dy: self.dy * factor,
            z: self.z * factor,
            ..*self
        }
    }

    fn check(&self, what: &'static str) -> Result<(), Error> {
        if self.is_empty() {
            return Err(Error::EmptyGrid(what));
        }
        for (name, value) in [
            ("x0", self.x0),
            ("dx", self.dx),
            ("y0", self.y0),
            ("dy", self.dy),
            ("z", self.z),
        ] {
            if !value.is_finite() {
                return Err(Error::NonFinite(what, name));
            }
        }
        Ok(())
    }
}

/// Trace header columns describing a generated layout.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Geometry {
    /// Number of traces (the length of every column).
    pub traces: usize,
    /// Header columns keyed by standard trace header name.
    pub columns: Vec<(&'static str, Vec<f64>)>,
}

impl Geometry {
    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, values)| values.as_slice())
    }

    fn push(&mut self, name: &'static str, values: Vec<f64>) {
        debug_assert_eq!(values.len(), self.traces);
        self.columns.push((name, values));
    }
}

fn sequence(n: usize) -> Vec<f64> {
    (1..=n).map(|i| i as f64).collect()
}

/// Line number of `value` on a grid starting at `min` with step `step` (1-based).
fn line(value: f64, min: f64, step: f64) -> f64 {
    ((value - min) / step.abs()).round_ties_even() + 1.0
}

/// Dense 1-based rank of each `(y, x)` pair. Equal pairs share a rank.
fn rank(ys: &[f64], xs: &[f64]) -> Vec<f64> {
    let cmp = |a: usize, b: usize| -> Ordering {
        ys[a].total_cmp(&ys[b]).then(xs[a].total_cmp(&xs[b]))
    };
    let mut order: Vec<usize> = (0..ys.len()).collect();
    order.sort_by(|&a, &b| cmp(a, b));

    let mut ranks = vec![0.0; ys.len()];
    let mut current = 0.0;
    for (i, &trace) in order.iter().enumerate() {
        if i == 0 || cmp(order[i - 1], trace) != Ordering::Equal {
            current += 1.0;
        }
        ranks[trace] = current;
    }
    ranks
}

/// Generate a post-stack layout with one trace per grid node.
pub fn stack(grid: &Grid) -> Result<Geometry, Error> {
    grid.check("stack")?;
    let traces = grid.len();
    let (xs, ys): (Vec<f64>, Vec<f64>) = (0..traces).map(|k| grid.node(k)).unzip();
    let inlines = (0..traces).map(|k| (k / grid.nx + 1) as f64).collect();
    let xlines = (0..traces).map(|k| (k % grid.nx + 1) as f64).collect();
    let seq = sequence(traces);
    let ones = vec![1.0; traces];
    let elevation = vec![grid.z; traces];

    let mut geometry = Geometry {
        traces,
        columns: Vec::with_capacity(14),
    };
    geometry.push("SEQWL", seq.clone());
    geometry.push("SEQWR", seq.clone());
    geometry.push("TRCFLD", seq.clone());
    geometry.push("CDP", seq);
    geometry.push("TRCID", ones.clone());
    geometry.push("DU", ones.clone());
    geometry.push("SAED", ones.clone());
    geometry.push("SAC", ones);
    geometry.push("RGE", elevation.clone());
    geometry.push("SES", elevation);
    geometry.push("CDP_X", xs);
    geometry.push("CDP_Y", ys);
    geometry.push("INLINE", inlines);
    geometry.push("XLINE", xlines);
    debug!(traces, nx = grid.nx, ny = grid.ny, "generated stack geometry");
    Ok(geometry)
}

/// Generate a pre-stack layout: every receiver records every shot.
///
/// Traces are ordered shot by shot. When `move_receivers` is set, the receiver spread follows
/// each shot, offset by the shot's displacement from the source origin.
pub fn prestack(sources: &Grid, receivers: &Grid, move_receivers: bool) -> Result<Geometry, Error> {
    sources.check("source")?;
    receivers.check("receiver")?;
    let shots = sources.len();
    let per_shot = receivers.len();
    let traces = shots * per_shot;

    let mut rec_x_min = receivers.x_min();
    let mut rec_y_min = receivers.y_min();
    if move_receivers {
        rec_x_min += sources.x_min() - sources.x0;
        rec_y_min += sources.y_min() - sources.y0;
    }

    // Line numbering steps, falling back to the source step when receivers move along a
    // degenerate receiver axis
    let il_step = match (receivers.dy, sources.dy) {
        (r, _) if r != 0.0 => Some(r),
        (_, s) if move_receivers && s != 0.0 => Some(s),
        _ => None,
    };
    let xl_step = match (receivers.dx, sources.dx) {
        (r, _) if r != 0.0 => Some(r),
        (_, s) if move_receivers && s != 0.0 => Some(s),
        _ => None,
    };

    let mut columns: [Vec<f64>; 12] = Default::default();
    for column in columns.iter_mut() {
        column.reserve_exact(traces);
    }
    let [sp, srcx, srcy, grpx, grpy, rge, ses, cdp_x, cdp_y, inline, xline, offset] =
        &mut columns;
    for shot in 0..shots {
        let (sx, sy) = sources.node(shot);
        let (shift_x, shift_y) = if move_receivers {
            (sx - sources.x0, sy - sources.y0)
        } else {
            (0.0, 0.0)
        };
        for r in 0..per_shot {
            let (rx, ry) = receivers.node(r);
            let (rx, ry) = (rx + shift_x, ry + shift_y);
            sp.push((shot + 1) as f64);
            srcx.push(sx);
            srcy.push(sy);
            grpx.push(rx);
            grpy.push(ry);
            rge.push(receivers.z);
            ses.push(sources.z);
            cdp_x.push((sx + rx) / 2.0);
            cdp_y.push((sy + ry) / 2.0);
            inline.push(il_step.map_or(1.0, |step| line(ry, rec_y_min, step)));
            xline.push(xl_step.map_or(1.0, |step| line(rx, rec_x_min, step)));
            offset.push(((rx - sx).powi(2) + (ry - sy).powi(2)).sqrt());
        }
    }
    let [sp, srcx, srcy, grpx, grpy, rge, ses, cdp_x, cdp_y, inline, xline, offset] =
        columns;
    let cdp = rank(&cdp_y, &cdp_x);
    let seq = sequence(traces);
    let ones = vec![1.0; traces];

    let mut geometry = Geometry {
        traces,
        columns: Vec::with_capacity(21),
    };
    geometry.push("SEQWL", seq.clone());
    geometry.push("SEQWR", seq.clone());
    geometry.push("TRCFLD", seq);
    geometry.push("TRCID", ones.clone());
    geometry.push("DU", ones.clone());
    geometry.push("SAED", ones.clone());
    geometry.push("SAC", ones);
    geometry.push("SP", sp.clone());
    geometry.push("FFID", sp);
    geometry.push("SRCX", srcx);
    geometry.push("SRCY", srcy);
    geometry.push("GRPX", grpx);
    geometry.push("GRPY", grpy);
    geometry.push("RGE", rge);
    geometry.push("SES", ses);
    geometry.push("CDP_X", cdp_x);
    geometry.push("CDP_Y", cdp_y);
    geometry.push("INLINE", inline);
    geometry.push("XLINE", xline);
    geometry.push("DSREG", offset);
    geometry.push("CDP", cdp);
    debug!(traces, shots, receivers = per_shot, move_receivers, "generated prestack geometry");
    Ok(geometry)
}
