use crate::geom::{transform_pad, PadShape, Point, TransformedPad};
use crate::model::{BoardOutline, NetId};

pub const FIELDS_PER_COMPONENT: usize = 4;
pub const ROTATION_STEPS: [f64; 4] = [0.0, 90.0, 180.0, 270.0];

/// Static geometry of one component to be placed, independent of position
/// (spec.md §4.4 "Encode/decode").
#[derive(Debug, Clone)]
pub struct ComponentDef {
    pub reference: String,
    pub pads: Vec<(String, PadShape, NetId)>,
    pub width: f64,
    pub height: f64,
}

/// A component with its resolved position and transformed pads.
#[derive(Debug, Clone)]
pub struct PlacedComponent {
    pub reference: String,
    pub pos: Point,
    pub rotation_deg: f64,
    pub side: u8,
    pub pads: Vec<(String, TransformedPad, NetId)>,
}

/// Flat `[x, y, rot, side] x N` encoding of a complete placement
/// (spec.md §3 "Placement vector").
#[derive(Debug, Clone, PartialEq)]
pub struct PlacementVector {
    pub data: Vec<f64>,
}

impl PlacementVector {
    pub fn num_components(&self) -> usize {
        self.data.len() / FIELDS_PER_COMPONENT
    }

    pub fn component_slice(&self, index: usize) -> &[f64] {
        let base = index * FIELDS_PER_COMPONENT;
        &self.data[base..base + FIELDS_PER_COMPONENT]
    }
}

pub fn encode(placements: &[PlacedComponent]) -> PlacementVector {
    let mut data = Vec::with_capacity(placements.len() * FIELDS_PER_COMPONENT);
    for p in placements {
        let rot_idx = (p.rotation_deg / 90.0).round().rem_euclid(4.0);
        data.push(p.pos.x);
        data.push(p.pos.y);
        data.push(rot_idx);
        data.push(p.side as f64);
    }
    PlacementVector { data }
}

pub fn decode(vector: &PlacementVector, defs: &[ComponentDef]) -> Vec<PlacedComponent> {
    assert_eq!(vector.num_components(), defs.len(), "vector/component-def length mismatch");
    defs.iter()
        .enumerate()
        .map(|(i, def)| {
            let s = vector.component_slice(i);
            let pos = Point::new(s[0], s[1]);
            let rot_idx = (s[2].round() as i64).rem_euclid(4);
            let side = s[3].round() as u8;
            let rotation_deg = ROTATION_STEPS[rot_idx as usize];
            let pads = def
                .pads
                .iter()
                .map(|(name, shape, net)| {
                    (name.clone(), transform_pad(*shape, pos, rot_idx, side), *net)
                })
                .collect();
            PlacedComponent { reference: def.reference.clone(), pos, rotation_deg, side, pads }
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct PlacementBounds {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
    pub discrete_mask: Vec<bool>,
}

/// Per-dimension optimizer bounds (spec.md §4.4 "Encode/decode").
pub fn bounds(board: &BoardOutline, defs: &[ComponentDef]) -> PlacementBounds {
    let total = defs.len() * FIELDS_PER_COMPONENT;
    let mut lower = vec![0.0; total];
    let mut upper = vec![0.0; total];
    let mut discrete_mask = vec![false; total];

    for (i, def) in defs.iter().enumerate() {
        let base = i * FIELDS_PER_COMPONENT;
        let half_w = def.width / 2.0;
        let half_h = def.height / 2.0;
        lower[base] = board.min_x() + half_w;
        upper[base] = board.max_x() - half_w;
        lower[base + 1] = board.min_y() + half_h;
        upper[base + 1] = board.max_y() - half_h;
        lower[base + 2] = 0.0;
        upper[base + 2] = 3.0;
        discrete_mask[base + 2] = true;
        lower[base + 3] = 0.0;
        upper[base + 3] = 1.0;
        discrete_mask[base + 3] = true;
    }

    PlacementBounds { lower, upper, discrete_mask }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Rect;

    fn sample_def(reference: &str) -> ComponentDef {
        ComponentDef {
            reference: reference.to_string(),
            pads: vec![("1".to_string(), PadShape { local: Point::zero(), size_x: 0.5, size_y: 0.5 }, 1)],
            width: 2.0,
            height: 1.0,
        }
    }

    #[test]
    fn encode_decode_round_trip_snaps_discrete() {
        let defs = vec![sample_def("U1"), sample_def("U2")];
        let placed = vec![
            PlacedComponent {
                reference: "U1".into(),
                pos: Point::new(5.0, 5.0),
                rotation_deg: 90.0,
                side: 0,
                pads: vec![],
            },
            PlacedComponent {
                reference: "U2".into(),
                pos: Point::new(10.0, 2.0),
                rotation_deg: 180.0,
                side: 1,
                pads: vec![],
            },
        ];
        let v = encode(&placed);
        let decoded = decode(&v, &defs);
        let v2 = encode(&decoded);
        assert_eq!(v, v2);
    }

    #[test]
    fn bounds_account_for_half_extent() {
        let outline = BoardOutline { rect: Rect::new(0.0, 0.0, 100.0, 50.0) };
        let defs = vec![sample_def("U1")];
        let b = bounds(&outline, &defs);
        assert_eq!(b.lower[0], 1.0); // half width 1.0
        assert_eq!(b.upper[0], 99.0);
        assert!(b.discrete_mask[2]);
        assert!(b.discrete_mask[3]);
        assert!(!b.discrete_mask[0]);
    }
}
