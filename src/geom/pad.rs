use super::{Point, Rect};

/// A pad's shape in local component coordinates, independent of placement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PadShape {
    pub local: Point,
    pub size_x: f64,
    pub size_y: f64,
}

/// A pad transformed into absolute board coordinates after placement
/// (spec.md §3, pad transform invariant).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformedPad {
    pub pos: Point,
    pub size_x: f64,
    pub size_y: f64,
}

impl TransformedPad {
    pub fn bounds(&self) -> Rect {
        Rect::centered(self.pos, self.size_x, self.size_y)
    }
}

/// Transform a pad from local component coordinates to absolute board
/// coordinates: mirror across the local Y axis if `side == 1` (back), then
/// rotate by `rot_idx * 90` degrees about the origin, then translate by
/// `comp_pos`. At 90/270 degrees, pad width and height swap.
///
/// Grounded on `_transform_pad` in the original placement vector module;
/// `rot_idx` is taken mod 4 so callers can pass an unnormalized index.
pub fn transform_pad(pad: PadShape, comp_pos: Point, rot_idx: i64, side: u8) -> TransformedPad {
    let mut lx = pad.local.x;
    let ly = pad.local.y;

    if side == 1 {
        lx = -lx;
    }

    let idx = rot_idx.rem_euclid(4);
    let (rx, ry, out_sx, out_sy) = match idx {
        0 => (lx, ly, pad.size_x, pad.size_y),
        1 => (-ly, lx, pad.size_y, pad.size_x),
        2 => (-lx, -ly, pad.size_x, pad.size_y),
        _ => (ly, -lx, pad.size_y, pad.size_x),
    };

    TransformedPad {
        pos: Point::new(comp_pos.x + rx, comp_pos.y + ry),
        size_x: out_sx,
        size_y: out_sy,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ninety_degrees_swaps_size_and_rotates() {
        let pad = PadShape { local: Point::new(1.0, 0.0), size_x: 2.0, size_y: 1.0 };
        let t = transform_pad(pad, Point::zero(), 1, 0);
        assert!((t.pos.x - 0.0).abs() < 1e-9);
        assert!((t.pos.y - 1.0).abs() < 1e-9);
        assert_eq!(t.size_x, 1.0);
        assert_eq!(t.size_y, 2.0);
    }

    #[test]
    fn back_side_mirrors_before_rotating() {
        let pad = PadShape { local: Point::new(1.0, 0.0), size_x: 2.0, size_y: 1.0 };
        let t = transform_pad(pad, Point::zero(), 0, 1);
        assert!((t.pos.x + 1.0).abs() < 1e-9);
        assert_eq!(t.size_x, 2.0);
    }

    #[test]
    fn translate_offsets_position() {
        let pad = PadShape { local: Point::zero(), size_x: 1.0, size_y: 1.0 };
        let t = transform_pad(pad, Point::new(5.0, 5.0), 0, 0);
        assert_eq!(t.pos, Point::new(5.0, 5.0));
    }

    #[test]
    fn rot_idx_wraps_negative() {
        let pad = PadShape { local: Point::new(1.0, 0.0), size_x: 2.0, size_y: 1.0 };
        let a = transform_pad(pad, Point::zero(), -1, 0);
        let b = transform_pad(pad, Point::zero(), 3, 0);
        assert_eq!(a, b);
    }
}
