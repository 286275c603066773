//! Transform coordinates between spatial reference systems.
//!
//! Only the narrow interface needed by geometry generation and boundary export is provided:
//! a [Transform] that rewrites `(x, y)` pairs in place. [Identity] leaves coordinates untouched
//! and [Affine] covers local grids that are shifted, rotated or scaled relative to the dataset's
//! reference system.

/// Rewrite coordinates from one spatial reference system into another.
pub trait Transform: Send + Sync {
    fn transform(&self, xy: &mut [(f64, f64)]);
}

/// The identity transform.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Identity;

impl Transform for Identity {
    fn transform(&self, _xy: &mut [(f64, f64)]) {}
}

/// A 2-D affine transform:
///
/// ```text
/// x' = a * x + b * y + c
/// y' = d * x + e * y + f
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Affine {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Default for Affine {
    fn default() -> Self {
        Self::translation(0.0, 0.0)
    }
}

impl Affine {
    pub const fn translation(dx: f64, dy: f64) -> Self {
        Self {
            a: 1.0,
            b: 0.0,
            c: dx,
            d: 0.0,
            e: 1.0,
            f: dy,
        }
    }

    /// Counter-clockwise rotation by `angle` radians around the origin.
    pub fn rotation(angle: f64) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self {
            a: cos,
            b: -sin,
            c: 0.0,
            d: sin,
            e: cos,
            f: 0.0,
        }
    }

    pub const fn scale(sx: f64, sy: f64) -> Self {
        Self {
            a: sx,
            b: 0.0,
            c: 0.0,
            d: 0.0,
            e: sy,
            f: 0.0,
        }
    }

    /// Compose two transforms: the result applies `self` first and then `next`.
    pub fn then(&self, next: &Affine) -> Self {
        Self {
            a: next.a * self.a + next.b * self.d,
            b: next.a * self.b + next.b * self.e,
            c: next.a * self.c + next.b * self.f + next.c,
            d: next.d * self.a + next.e * self.d,
            e: next.d * self.b + next.e * self.e,
            f: next.d * self.c + next.e * self.f + next.f,
        }
    }

    /// Return the inverse transform, or `None` if the linear part is singular.
    pub fn inverse(&self) -> Option<Self> {
        let det = self.a * self.e - self.b * self.d;
        if det == 0.0 || !det.is_finite() {
            return None;
        }
        let a = self.e / det;
        let b = -self.b / det;
        let d = -self.d / det;
        let e = self.a / det;
        Some(Self {
            a,
            b,
            c: -(a * self.c + b * self.f),
            d,
            e,
            f: -(d * self.c + e * self.f),
        })
    }

    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.a * x + self.b * y + self.c,
            self.d * x + self.e * y + self.f,
        )
    }
}

impl Transform for Affine {
    fn transform(&self, xy: &mut [(f64, f64)]) {
        for p in xy.iter_mut() {
            *p = self.apply(p.0, p.1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geoseis_macros::test_traced;

    fn close(a: (f64, f64), b: (f64, f64)) -> bool {
        (a.0 - b.0).abs() < 1e-9 && (a.1 - b.1).abs() < 1e-9
    }

    #[test_traced]
    fn test_identity() {
        let mut xy = vec![(1.0, 2.0), (-3.5, 4.0)];
        Identity.transform(&mut xy);
        assert_eq!(xy, vec![(1.0, 2.0), (-3.5, 4.0)]);
    }

    #[test_traced]
    fn test_affine_compose_and_invert() {
        // Rotate a quarter turn, then shift
        let t = Affine::rotation(std::f64::consts::FRAC_PI_2).then(&Affine::translation(10.0, 0.0));
        let mut xy = vec![(1.0, 0.0), (0.0, 1.0)];
        t.transform(&mut xy);
        assert!(close(xy[0], (10.0, 1.0)));
        assert!(close(xy[1], (9.0, 0.0)));

        // The inverse undoes it
        let inv = t.inverse().expect("transform should be invertible");
        inv.transform(&mut xy);
        assert!(close(xy[0], (1.0, 0.0)));
        assert!(close(xy[1], (0.0, 1.0)));
    }

    #[test_traced]
    fn test_singular_has_no_inverse() {
        assert!(Affine::scale(0.0, 1.0).inverse().is_none());
    }
}
