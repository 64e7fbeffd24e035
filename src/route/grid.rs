use crate::geom::{point_in_polygon, Point, Rect};
use crate::model::{DesignModel, Layer, NetId};

/// A single cell of the routing grid (spec.md §3 "Routing grid cell").
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cell {
    pub blocked: bool,
    pub net: NetId,
    pub cost: u16,
    pub congestion: u8,
}

impl Default for Cell {
    fn default() -> Self {
        Self { blocked: false, net: 0, cost: 1, congestion: 0 }
    }
}

/// Preferred traversal direction per copper layer, alternating per layer
/// index (spec.md §4.3 "Cost").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreferredDirection {
    Horizontal,
    Vertical,
}

/// 3-D uniform grid indexed `(layer, row, col)` (spec.md §4.3 "Grid").
pub struct RoutingGrid {
    pub layers: Vec<Layer>,
    pub rows: usize,
    pub cols: usize,
    pub pitch: f64,
    pub origin: Point,
    cells: Vec<Cell>,
    pub via_penalty: u16,
    pub wrong_way_factor: f64,
    /// Radius, in grid cells, that must be clear of other nets on both
    /// layers before a via move is allowed there (spec.md §4.3 "Via site
    /// clearance"). Defaults to one cell; `route_board` tightens it to the
    /// board's via diameter.
    pub via_radius_cells: usize,
}

impl RoutingGrid {
    pub fn new(layers: Vec<Layer>, outline: Rect, pitch: f64) -> Self {
        let cols = ((outline.w() / pitch).ceil() as usize).max(1);
        let rows = ((outline.h() / pitch).ceil() as usize).max(1);
        let n = layers.len() * rows * cols;
        Self {
            layers,
            rows,
            cols,
            pitch,
            origin: Point::new(outline.l, outline.b),
            cells: vec![Cell::default(); n],
            via_penalty: 100,
            wrong_way_factor: 1.5,
            via_radius_cells: 1,
        }
    }

    /// Set the via clearance radius from a board's via diameter, rounding
    /// up to the nearest whole cell (spec.md §4.3 "Via site clearance").
    pub fn set_via_radius_from_diameter(&mut self, via_diameter: f64) {
        self.via_radius_cells = ((via_diameter / 2.0) / self.pitch).ceil().max(1.0) as usize;
    }

    pub fn preferred_direction(&self, layer: usize) -> PreferredDirection {
        if layer % 2 == 0 {
            PreferredDirection::Horizontal
        } else {
            PreferredDirection::Vertical
        }
    }

    fn index(&self, layer: usize, row: usize, col: usize) -> usize {
        (layer * self.rows + row) * self.cols + col
    }

    pub fn in_bounds(&self, layer: usize, row: i64, col: i64) -> bool {
        layer < self.layers.len()
            && row >= 0
            && col >= 0
            && (row as usize) < self.rows
            && (col as usize) < self.cols
    }

    pub fn cell(&self, layer: usize, row: usize, col: usize) -> Cell {
        self.cells[self.index(layer, row, col)]
    }

    pub fn cell_mut(&mut self, layer: usize, row: usize, col: usize) -> &mut Cell {
        let idx = self.index(layer, row, col);
        &mut self.cells[idx]
    }

    pub fn to_point(&self, row: usize, col: usize) -> Point {
        Point::new(self.origin.x + col as f64 * self.pitch, self.origin.y + row as f64 * self.pitch)
    }

    pub fn to_cell(&self, p: Point) -> (usize, usize) {
        let col = ((p.x - self.origin.x) / self.pitch).round().max(0.0) as usize;
        let row = ((p.y - self.origin.y) / self.pitch).round().max(0.0) as usize;
        (row.min(self.rows.saturating_sub(1)), col.min(self.cols.saturating_sub(1)))
    }

    pub fn layer_index(&self, layer: Layer) -> Option<usize> {
        self.layers.iter().position(|&l| l == layer)
    }

    /// Mark a dilated rectangle blocked on `layer` for `net` (0 = hard
    /// obstacle). Cells already owned by the same net are left alone so
    /// overlapping same-net geometry doesn't corrupt ownership.
    pub fn rasterize_rect(&mut self, layer: usize, rect: Rect, net: NetId) {
        let (r0, c0) = self.to_cell(Point::new(rect.l, rect.b));
        let (r1, c1) = self.to_cell(Point::new(rect.r, rect.t));
        let (rlo, rhi) = (r0.min(r1), r0.max(r1));
        let (clo, chi) = (c0.min(c1), c0.max(c1));
        for row in rlo..=rhi {
            for col in clo..=chi {
                let cell = self.cell_mut(layer, row, col);
                cell.blocked = true;
                cell.net = net;
            }
        }
    }

    /// Mark a polygon blocked on `layer` for `net`, testing each candidate
    /// cell's center for containment rather than just its bounding box
    /// (spec.md §3 "Zone" — polygon is the primary geometry, `bounds` is
    /// only a cheap reject test). Falls back to `rasterize_rect` over the
    /// polygon's AABB if it has fewer than 3 vertices.
    pub fn rasterize_polygon(&mut self, layer: usize, polygon: &[Point], net: NetId) {
        if polygon.len() < 3 {
            return;
        }
        let bounds = polygon.iter().fold(Rect::empty(), |acc, &p| acc.united(&Rect::enclosing(p, p)));
        let (r0, c0) = self.to_cell(Point::new(bounds.l, bounds.b));
        let (r1, c1) = self.to_cell(Point::new(bounds.r, bounds.t));
        let (rlo, rhi) = (r0.min(r1), r0.max(r1));
        let (clo, chi) = (c0.min(c1), c0.max(c1));
        for row in rlo..=rhi {
            for col in clo..=chi {
                let center = self.to_point(row, col);
                if !point_in_polygon(center, polygon) {
                    continue;
                }
                let cell = self.cell_mut(layer, row, col);
                cell.blocked = true;
                cell.net = net;
            }
        }
    }

    /// Rasterize obstacles from a [`DesignModel`] snapshot: pads, traces,
    /// zones, keepouts (spec.md §4.3 "Obstacle population").
    pub fn populate_obstacles(&mut self, dm: &DesignModel<'_>) {
        let clearance = dm.rules.trace_clearance;
        for comp in &dm.components {
            let transformed = comp.transformed_pads();
            for (pad, t) in comp.pads.iter().zip(transformed.iter()) {
                let dilated =
                    Rect::centered(t.pos, t.size_x + 2.0 * clearance, t.size_y + 2.0 * clearance);
                let pad_layers: Vec<Layer> = if pad.is_through_hole() {
                    vec![Layer::FrontCopper, Layer::BackCopper]
                } else if comp.side == 1 {
                    vec![Layer::BackCopper]
                } else {
                    vec![Layer::FrontCopper]
                };
                for layer in pad_layers {
                    if let Some(idx) = self.layer_index(layer) {
                        self.rasterize_rect(idx, dilated, pad.net);
                    }
                }
            }
        }
        for trace in &dm.traces {
            if let Some(idx) = self.layer_index(trace.layer) {
                let half = trace.width / 2.0 + clearance;
                let rect = Rect::enclosing(trace.start, trace.end).inset(-half, -half);
                self.rasterize_rect(idx, rect, trace.net);
            }
        }
        for zone in &dm.zones {
            if let Some(idx) = self.layer_index(zone.layer) {
                if zone.polygon.len() >= 3 {
                    self.rasterize_polygon(idx, &zone.polygon, zone.net);
                } else {
                    self.rasterize_rect(idx, zone.bounds, zone.net);
                }
            }
        }
        for keepout in &dm.keepouts {
            // Keepouts block every net, same as `mark_blocked` treats every
            // `Keepout` kind as a hard obstacle.
            let layers: Vec<Layer> = if keepout.layer == Layer::Other {
                vec![Layer::FrontCopper, Layer::BackCopper]
            } else {
                vec![keepout.layer]
            };
            for layer in layers {
                if let Some(idx) = self.layer_index(layer) {
                    if keepout.polygon.len() >= 3 {
                        self.rasterize_polygon(idx, &keepout.polygon, 0);
                    } else {
                        self.rasterize_rect(idx, keepout.bounds, 0);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rasterize_marks_blocked() {
        let mut grid = RoutingGrid::new(vec![Layer::FrontCopper], Rect::new(0.0, 0.0, 10.0, 10.0), 1.0);
        grid.rasterize_rect(0, Rect::new(1.0, 1.0, 2.0, 2.0), 5);
        let (row, col) = grid.to_cell(Point::new(1.5, 1.5));
        assert!(grid.cell(0, row, col).blocked);
        assert_eq!(grid.cell(0, row, col).net, 5);
    }

    #[test]
    fn rasterize_polygon_only_blocks_cells_inside_the_ring() {
        let mut grid = RoutingGrid::new(vec![Layer::FrontCopper], Rect::new(0.0, 0.0, 10.0, 10.0), 1.0);
        // A diamond inscribed in the 4..6 x 4..6 box: corners at the
        // box's edge midpoints, so the box's own corners fall outside it.
        let diamond =
            vec![Point::new(5.0, 4.0), Point::new(6.0, 5.0), Point::new(5.0, 6.0), Point::new(4.0, 5.0)];
        grid.rasterize_polygon(0, &diamond, 9);
        let (r_center, c_center) = grid.to_cell(Point::new(5.0, 5.0));
        assert!(grid.cell(0, r_center, c_center).blocked);
        let (r_corner, c_corner) = grid.to_cell(Point::new(4.0, 4.0));
        assert!(!grid.cell(0, r_corner, c_corner).blocked);
    }

    #[test]
    fn populate_obstacles_blocks_keepout_regardless_of_net() {
        let doc = crate::sexp::Document::parse(
            r#"(kicad_pcb
                 (net 0 "")
                 (gr_line (start 0 0) (end 20 0) (layer "Edge.Cuts"))
                 (gr_line (start 20 0) (end 20 20) (layer "Edge.Cuts"))
                 (gr_line (start 20 20) (end 0 20) (layer "Edge.Cuts"))
                 (gr_line (start 0 20) (end 0 0) (layer "Edge.Cuts"))
                 (zone (layer "F.Cu") (keepout (tracks not_allowed))
                   (polygon (pts (xy 5 5) (xy 15 5) (xy 15 15) (xy 5 15)))))"#,
            "kicad_pcb",
        )
        .unwrap();
        let dm = DesignModel::from_document(&doc).unwrap();
        assert!(dm.zones.is_empty());
        assert_eq!(dm.keepouts.len(), 1);

        let mut grid = RoutingGrid::new(vec![Layer::FrontCopper], dm.outline.rect, 1.0);
        grid.populate_obstacles(&dm);
        let (row, col) = grid.to_cell(Point::new(10.0, 10.0));
        let cell = grid.cell(0, row, col);
        assert!(cell.blocked);
        assert_eq!(cell.net, 0);
    }
}
