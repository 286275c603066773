//! Convex hulls of scattered points.
//!
//! All methods share the same preparation (non-finite points are dropped and duplicates are
//! collapsed) and the same normalization, so they return identical polygons for the same input.

use crate::{signed_area, Point, Polygon};
use std::cmp::Ordering;
use tracing::debug;

/// Algorithm used to compute a convex hull.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum HullMethod {
    /// Jarvis march, `O(n·h)`.
    GiftWrap,
    /// Graham scan, `O(n log n)`.
    #[default]
    Graham,
    /// Andrew's monotone chain, `O(n log n)`.
    MonotoneChain,
    /// Recursive quickhull, `O(n log n)` expected.
    QuickHull,
}

impl HullMethod {
    pub const ALL: [HullMethod; 4] = [
        HullMethod::GiftWrap,
        HullMethod::Graham,
        HullMethod::MonotoneChain,
        HullMethod::QuickHull,
    ];
}

/// Twice the signed area of the triangle `(o, a, b)`. Positive for a left turn.
fn cross(o: Point, a: Point, b: Point) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

fn dist2(a: Point, b: Point) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    dx * dx + dy * dy
}

/// Order by `y`, then `x`.
fn lowest(a: &Point, b: &Point) -> Ordering {
    a.y.total_cmp(&b.y).then(a.x.total_cmp(&b.x))
}

/// Drop non-finite points and duplicates. The result is sorted by `(y, x)`.
fn prepare(points: &[Point]) -> Vec<Point> {
    let mut pts: Vec<Point> = points
        .iter()
        .copied()
        .filter(|p| p.x.is_finite() && p.y.is_finite())
        .collect();
    pts.sort_by(lowest);
    pts.dedup();
    pts
}

/// Handle inputs with fewer than three non-collinear points.
fn degenerate(pts: &[Point]) -> Option<Polygon> {
    match pts.len() {
        0 => return Some(Vec::new()),
        1 => return Some(vec![pts[0]]),
        _ => {}
    }
    let (first, last) = (pts[0], pts[pts.len() - 1]);
    if pts.iter().all(|&p| cross(first, last, p) == 0.0) {
        return Some(vec![first, last]);
    }
    None
}

/// Rewrite a hull into canonical form: counter-clockwise, no repeated or collinear vertices and
/// starting at the lowest (then leftmost) vertex.
pub fn normalize(mut hull: Polygon) -> Polygon {
    hull.dedup();
    while hull.len() > 1 && hull.first() == hull.last() {
        hull.pop();
    }
    if hull.len() < 3 {
        return hull;
    }
    if signed_area(&hull) < 0.0 {
        hull.reverse();
    }

    // Drop vertices that do not turn (repeat until stable since removals expose new ones)
    loop {
        let n = hull.len();
        if n < 3 {
            break;
        }
        let keep: Vec<Point> = (0..n)
            .filter(|&i| {
                let prev = hull[(i + n - 1) % n];
                let next = hull[(i + 1) % n];
                cross(prev, hull[i], next) != 0.0
            })
            .map(|i| hull[i])
            .collect();
        if keep.len() == n {
            break;
        }
        hull = keep;
    }

    if let Some(start) = hull
        .iter()
        .enumerate()
        .min_by(|a, b| lowest(a.1, b.1))
        .map(|(i, _)| i)
    {
        hull.rotate_left(start);
    }
    hull
}

/// Compute the convex hull of `points` with the given method.
pub fn convex_hull(points: &[Point], method: HullMethod) -> Polygon {
    let pts = prepare(points);
    let hull = match degenerate(&pts) {
        Some(hull) => hull,
        None => match method {
            HullMethod::GiftWrap => normalize(gift_wrap(&pts)),
            HullMethod::Graham => normalize(graham(&pts)),
            HullMethod::MonotoneChain => normalize(monotone_chain(&pts)),
            HullMethod::QuickHull => normalize(quick_hull(&pts)),
        },
    };
    debug!(
        points = points.len(),
        vertices = hull.len(),
        ?method,
        "computed convex hull"
    );
    hull
}

/// Jarvis march over prepared points.
fn gift_wrap(pts: &[Point]) -> Polygon {
    let start = 0;
    let mut hull = Vec::new();
    let mut current = start;
    loop {
        hull.push(pts[current]);
        let mut next = (current + 1) % pts.len();
        for (i, &p) in pts.iter().enumerate() {
            if i == current {
                continue;
            }
            let turn = cross(pts[current], pts[next], p);
            // Prefer the most clockwise candidate, and the farthest one when collinear
            if turn < 0.0
                || (turn == 0.0
                    && dist2(pts[current], p) > dist2(pts[current], pts[next]))
            {
                next = i;
            }
        }
        current = next;
        if current == start || hull.len() > pts.len() {
            break;
        }
    }
    hull
}

/// Graham scan over prepared points (the first point is the pivot).
fn graham(pts: &[Point]) -> Polygon {
    let pivot = pts[0];
    let mut rest: Vec<Point> = pts[1..].to_vec();
    rest.sort_by(|&a, &b| {
        let turn = cross(pivot, a, b);
        if turn > 0.0 {
            Ordering::Less
        } else if turn < 0.0 {
            Ordering::Greater
        } else {
            dist2(pivot, a).total_cmp(&dist2(pivot, b))
        }
    });

    // Points on the closing ray must be visited farthest first
    if let Some(&last) = rest.last() {
        let tail = rest
            .iter()
            .rev()
            .take_while(|&&p| cross(pivot, last, p) == 0.0)
            .count();
        let len = rest.len();
        if tail < len {
            rest[len - tail..].reverse();
        }
    }

    let mut stack: Vec<Point> = vec![pivot];
    for p in rest {
        while stack.len() > 1 && cross(stack[stack.len() - 2], stack[stack.len() - 1], p) <= 0.0
        {
            stack.pop();
        }
        stack.push(p);
    }
    stack
}

/// Andrew's monotone chain over prepared points.
fn monotone_chain(pts: &[Point]) -> Polygon {
    let mut sorted = pts.to_vec();
    sorted.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));

    let mut lower: Vec<Point> = Vec::with_capacity(sorted.len());
    for &p in &sorted {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0.0
        {
            lower.pop();
        }
        lower.push(p);
    }
    let mut upper: Vec<Point> = Vec::with_capacity(sorted.len());
    for &p in sorted.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0.0
        {
            upper.pop();
        }
        upper.push(p);
    }
    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

/// Quickhull over prepared points.
fn quick_hull(pts: &[Point]) -> Polygon {
    let by_x = |a: &&Point, b: &&Point| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y));
    let (Some(&left), Some(&right)) = (pts.iter().min_by(by_x), pts.iter().max_by(by_x)) else {
        return Vec::new();
    };
    let below: Vec<Point> = pts
        .iter()
        .copied()
        .filter(|&p| cross(left, right, p) < 0.0)
        .collect();
    let above: Vec<Point> = pts
        .iter()
        .copied()
        .filter(|&p| cross(right, left, p) < 0.0)
        .collect();

    // Walk left -> right along the bottom, then right -> left along the top
    let mut hull = vec![left];
    expand(left, right, &below, &mut hull);
    hull.push(right);
    expand(right, left, &above, &mut hull);
    hull
}

/// Append the hull vertices strictly to the right of `a -> b` (in order from `a` to `b`).
fn expand(a: Point, b: Point, candidates: &[Point], hull: &mut Polygon) {
    let Some(&far) = candidates
        .iter()
        .max_by(|&&p, &&q| (-cross(a, b, p)).total_cmp(&(-cross(a, b, q))))
    else {
        return;
    };
    let first: Vec<Point> = candidates
        .iter()
        .copied()
        .filter(|&p| cross(a, far, p) < 0.0)
        .collect();
    let second: Vec<Point> = candidates
        .iter()
        .copied()
        .filter(|&p| cross(far, b, p) < 0.0)
        .collect();
    expand(a, far, &first, hull);
    hull.push(far);
    expand(far, b, &second, hull);
}
