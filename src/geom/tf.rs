use std::f64::consts::PI;
use std::ops::Mul;

use nalgebra::{vector, Matrix3};

use super::{Point, Rect};

/// Affine transform backed by a 3x3 homogeneous matrix, matching the
/// teacher's `Tf` (src/model/transform.rs) in spirit: compose with `*`,
/// apply with `.pt()`.
#[derive(Debug, Copy, Clone)]
pub struct Tf {
    m: Matrix3<f64>,
}

impl Tf {
    pub fn identity() -> Self {
        Self { m: Matrix3::identity() }
    }

    pub fn translate(p: Point) -> Self {
        Self { m: Matrix3::new_translation(&vector![p.x, p.y]) }
    }

    pub fn rotate_deg(deg: f64) -> Self {
        Self { m: Matrix3::new_rotation(deg / 180.0 * PI) }
    }

    /// Mirror across the local Y axis (negate x), used for back-side pads.
    pub fn mirror_x() -> Self {
        Self { m: Matrix3::new_nonuniform_scaling(&vector![-1.0, 1.0]) }
    }

    pub fn pt(&self, p: Point) -> Point {
        let v = self.m * vector![p.x, p.y, 1.0];
        Point::new(v.x, v.y)
    }

    pub fn rt(&self, r: Rect) -> Rect {
        let pts = [
            Point::new(r.l, r.b),
            Point::new(r.r, r.b),
            Point::new(r.r, r.t),
            Point::new(r.l, r.t),
        ];
        let transformed: Vec<Point> = pts.iter().map(|&p| self.pt(p)).collect();
        let mut out = Rect::enclosing(transformed[0], transformed[1]);
        for p in &transformed[2..] {
            out = out.united(&Rect::enclosing(*p, *p));
        }
        out
    }
}

impl Mul<Tf> for Tf {
    type Output = Tf;

    fn mul(self, rhs: Tf) -> Tf {
        Tf { m: self.m * rhs.m }
    }
}
