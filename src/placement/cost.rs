use super::vector::PlacedComponent;
use crate::model::{BoardOutline, DesignRules, NetTable, RuleOverrides};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CostMode {
    WeightedSum,
    Lexicographic,
}

/// Weights and mode for the composite placement score (spec.md §4.4
/// "Composite scoring"), grounded on the original cost module's defaults.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacementCostConfig {
    pub overlap_weight: f64,
    pub drc_weight: f64,
    pub boundary_weight: f64,
    pub wirelength_weight: f64,
    pub area_weight: f64,
    pub mode: CostMode,
}

impl Default for PlacementCostConfig {
    fn default() -> Self {
        Self {
            overlap_weight: 1e6,
            drc_weight: 1e4,
            boundary_weight: 1e5,
            wirelength_weight: 1.0,
            area_weight: 0.1,
            mode: CostMode::WeightedSum,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CostBreakdown {
    pub wirelength: f64,
    pub overlap: f64,
    pub boundary: f64,
    pub drc: f64,
    pub area: f64,
    /// Set only at fidelity >= 2, `routability_weight * (1 - routed/total)`.
    pub routability: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacementScore {
    pub total: f64,
    pub breakdown: CostBreakdown,
    pub is_feasible: bool,
}

const INFEASIBILITY_OFFSET: f64 = 1e12;

/// Half-perimeter wirelength over every net with >= 2 placed pins
/// (spec.md §4.4 "HPWL").
pub fn compute_wirelength(placements: &[PlacedComponent], nets: &NetTable) -> f64 {
    let mut total = 0.0;
    for net in nets.iter() {
        let mut xs = Vec::new();
        let mut ys = Vec::new();
        for p in placements {
            for (_, t, pad_net) in &p.pads {
                if *pad_net == net.id {
                    xs.push(t.pos.x);
                    ys.push(t.pos.y);
                }
            }
        }
        if xs.len() >= 2 {
            let (xmin, xmax) = min_max(&xs);
            let (ymin, ymax) = min_max(&ys);
            total += (xmax - xmin) + (ymax - ymin);
        }
    }
    total
}

fn min_max(v: &[f64]) -> (f64, f64) {
    (v.iter().cloned().fold(f64::INFINITY, f64::min), v.iter().cloned().fold(f64::NEG_INFINITY, f64::max))
}

/// Pairwise AABB overlap area. Components on different sides never
/// overlap each other (spec.md §4.4 "Overlap").
pub fn compute_overlap(placements: &[PlacedComponent], extents: &[(f64, f64)]) -> f64 {
    let mut total = 0.0;
    for i in 0..placements.len() {
        for j in (i + 1)..placements.len() {
            if placements[i].side != placements[j].side {
                continue;
            }
            let bi = component_bounds(&placements[i], extents[i]);
            let bj = component_bounds(&placements[j], extents[j]);
            total += bi.overlap_area(&bj);
        }
    }
    total
}

fn component_bounds(p: &PlacedComponent, (w, h): (f64, f64)) -> crate::geom::Rect {
    let swap = (p.rotation_deg / 90.0).round() as i64 % 2 == 1;
    let (w, h) = if swap { (h, w) } else { (w, h) };
    crate::geom::Rect::centered(p.pos, w, h)
}

/// Sum of the area outside the board outline, per component
/// (spec.md §4.4 "Boundary violation").
pub fn compute_boundary_violation(
    placements: &[PlacedComponent],
    outline: &BoardOutline,
    extents: &[(f64, f64)],
) -> f64 {
    let mut total = 0.0;
    for (p, &ext) in placements.iter().zip(extents) {
        let b = component_bounds(p, ext);
        total += (outline.min_x() - b.l).max(0.0);
        total += (b.r - outline.max_x()).max(0.0);
        total += (outline.min_y() - b.b).max(0.0);
        total += (b.t - outline.max_y()).max(0.0);
    }
    total
}

/// Sum of clearance shortfall across pairwise box/pad checks
/// (spec.md §4.4 "DRC (level >= 1)").
pub fn compute_drc_violations(
    placements: &[PlacedComponent],
    rules: &DesignRules,
    overrides: &RuleOverrides,
    net_names: &NetTable,
    extents: &[(f64, f64)],
) -> f64 {
    let mut shortfall = 0.0;

    for i in 0..placements.len() {
        for j in (i + 1)..placements.len() {
            let bi = component_bounds(&placements[i], extents[i]);
            let bj = component_bounds(&placements[j], extents[j]);
            let gap = bi.gap(&bj);
            if gap < rules.trace_clearance {
                shortfall += rules.trace_clearance - gap;
            }
        }
    }

    for i in 0..placements.len() {
        for j in (i + 1)..placements.len() {
            for (_, ti, ni) in &placements[i].pads {
                for (_, tj, nj) in &placements[j].pads {
                    if ni == nj {
                        continue;
                    }
                    let name_i = net_names.name(*ni).unwrap_or("");
                    let name_j = net_names.name(*nj).unwrap_or("");
                    let clearance = overrides.effective_clearance(rules, name_i, name_j);
                    let gap = ti.bounds().gap(&tj.bounds());
                    if gap < clearance {
                        shortfall += clearance - gap;
                    }
                }
            }
        }
    }

    shortfall
}

/// Components placed closer to the board edge than `rules.min_copper_to_edge`
/// (spec.md §3 "DesignRules.min_copper_to_edge"). Uses the same
/// component-bounds proxy `compute_drc_violations` uses for pairwise
/// clearance, rather than per-pad copper geometry.
pub fn count_edge_clearance_violations(
    placements: &[PlacedComponent],
    rules: &DesignRules,
    outline: &BoardOutline,
    extents: &[(f64, f64)],
) -> usize {
    placements
        .iter()
        .zip(extents)
        .filter(|(p, &ext)| {
            let b = component_bounds(p, ext);
            let dist_to_edge = (b.l - outline.min_x())
                .min(outline.max_x() - b.r)
                .min(b.b - outline.min_y())
                .min(outline.max_y() - b.t);
            dist_to_edge < rules.min_copper_to_edge
        })
        .count()
}

/// Pairwise pad-clearance violation *count*, distinct from the shortfall
/// sum `compute_drc_violations` feeds into the composite score (spec.md §8
/// scenario S3: "DRC reports exactly N pad-pair violations"). Courtyard
/// overlap and hole-to-hole spacing aren't modeled here: `PlacedComponent`
/// carries pad footprint (position, copper size) but no drill diameter or
/// courtyard outline, so both counts are always 0 — see DESIGN.md for why
/// that stays out of scope at this layer.
pub fn count_pad_clearance_violations(
    placements: &[PlacedComponent],
    rules: &DesignRules,
    overrides: &RuleOverrides,
    net_names: &NetTable,
) -> (usize, usize) {
    let mut clearance_violations = 0;
    for i in 0..placements.len() {
        for j in (i + 1)..placements.len() {
            for (_, ti, ni) in &placements[i].pads {
                for (_, tj, nj) in &placements[j].pads {
                    if ni == nj {
                        continue;
                    }
                    let name_i = net_names.name(*ni).unwrap_or("");
                    let name_j = net_names.name(*nj).unwrap_or("");
                    let clearance = overrides.effective_clearance(rules, name_i, name_j);
                    if ti.bounds().gap(&tj.bounds()) < clearance {
                        clearance_violations += 1;
                    }
                }
            }
        }
    }
    (clearance_violations, 0)
}

/// Bounding-box area enclosing all component centers, a compactness proxy
/// (spec.md §4.4 "Composite scoring" area term).
pub fn compute_area(placements: &[PlacedComponent]) -> f64 {
    if placements.is_empty() {
        return 0.0;
    }
    let xs: Vec<f64> = placements.iter().map(|p| p.pos.x).collect();
    let ys: Vec<f64> = placements.iter().map(|p| p.pos.y).collect();
    let (xmin, xmax) = min_max(&xs);
    let (ymin, ymax) = min_max(&ys);
    (xmax - xmin) * (ymax - ymin)
}

pub fn evaluate(
    placements: &[PlacedComponent],
    nets: &NetTable,
    rules: &DesignRules,
    overrides: &RuleOverrides,
    outline: &BoardOutline,
    extents: &[(f64, f64)],
    config: &PlacementCostConfig,
    include_drc: bool,
) -> PlacementScore {
    let wirelength = compute_wirelength(placements, nets);
    let overlap = compute_overlap(placements, extents);
    let boundary = compute_boundary_violation(placements, outline, extents);
    let drc = if include_drc {
        compute_drc_violations(placements, rules, overrides, nets, extents)
    } else {
        0.0
    };
    let area = compute_area(placements);

    let breakdown = CostBreakdown { wirelength, overlap, boundary, drc, area, routability: 0.0 };
    let is_feasible = overlap == 0.0 && drc == 0.0 && boundary == 0.0;

    let total = match config.mode {
        CostMode::WeightedSum => weighted_sum(&breakdown, config),
        CostMode::Lexicographic => lexicographic(&breakdown, config, is_feasible),
    };

    PlacementScore { total, breakdown, is_feasible }
}

fn weighted_sum(b: &CostBreakdown, c: &PlacementCostConfig) -> f64 {
    c.overlap_weight * b.overlap
        + c.drc_weight * b.drc
        + c.boundary_weight * b.boundary
        + c.wirelength_weight * b.wirelength
        + c.area_weight * b.area
        + b.routability
}

fn lexicographic(b: &CostBreakdown, c: &PlacementCostConfig, feasible: bool) -> f64 {
    let infeasible_offset = if feasible { 0.0 } else { INFEASIBILITY_OFFSET };
    infeasible_offset + c.wirelength_weight * b.wirelength + c.area_weight * b.area + b.routability
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::{PadShape, Point, TransformedPad};

    fn placed_at(reference: &str, x: f64, y: f64) -> PlacedComponent {
        PlacedComponent {
            reference: reference.into(),
            pos: Point::new(x, y),
            rotation_deg: 0.0,
            side: 0,
            pads: vec![],
        }
    }

    #[test]
    fn overlapping_boxes_score_nonzero_separated_boxes_score_zero() {
        let extents = vec![(10.0, 10.0), (10.0, 10.0)];
        let a = vec![placed_at("A", 20.0, 20.0), placed_at("B", 30.0, 20.0)];
        assert_eq!(compute_overlap(&a, &extents), 0.0);
        let b = vec![placed_at("A", 20.0, 20.0), placed_at("B", 25.0, 20.0)];
        assert_eq!(compute_overlap(&b, &extents), 50.0);
    }

    #[test]
    fn hpwl_sums_half_perimeter_per_net_and_ignores_extra_pins_inside_the_box() {
        let nets = {
            let root = crate::sexp::Document::parse(
                r#"(kicad_pcb (net 1 "NET1"))"#,
                "kicad_pcb",
            )
            .unwrap();
            crate::model::NetTable::parse(root.root())
        };
        let pad = |x: f64, y: f64| {
            (
                "1".to_string(),
                TransformedPad { pos: Point::new(x, y), size_x: 0.1, size_y: 0.1 },
                1u32,
            )
        };
        let mut p1 = placed_at("A", 0.0, 0.0);
        p1.pads.push(pad(0.0, 0.0));
        let mut p2 = placed_at("B", 10.0, 0.0);
        p2.pads.push(pad(10.0, 0.0));
        let mut p3 = placed_at("C", 10.0, 10.0);
        p3.pads.push(pad(10.0, 10.0));
        let three = vec![p1.clone(), p2.clone(), p3.clone()];
        assert_eq!(compute_wirelength(&three, &nets), 20.0);

        let mut p4 = placed_at("D", 0.0, 10.0);
        p4.pads.push(pad(0.0, 10.0));
        let four = vec![p1, p2, p3, p4];
        assert_eq!(compute_wirelength(&four, &nets), 20.0);
    }

    #[test]
    fn single_pad_net_contributes_zero() {
        let nets = {
            let root = crate::sexp::Document::parse(r#"(kicad_pcb (net 1 "N"))"#, "kicad_pcb").unwrap();
            crate::model::NetTable::parse(root.root())
        };
        let mut p1 = placed_at("A", 0.0, 0.0);
        p1.pads.push((
            "1".to_string(),
            TransformedPad { pos: Point::zero(), size_x: 0.1, size_y: 0.1 },
            1u32,
        ));
        assert_eq!(compute_wirelength(&[p1], &nets), 0.0);
    }

    #[test]
    fn drc_counts_one_violation_per_cross_net_pad_pair_below_clearance() {
        let nets = {
            let root = crate::sexp::Document::parse(
                r#"(kicad_pcb (net 1 "N1") (net 2 "N2"))"#,
                "kicad_pcb",
            )
            .unwrap();
            crate::model::NetTable::parse(root.root())
        };
        let rules = DesignRules { trace_clearance: 0.5, ..DesignRules::default() };
        let overrides = RuleOverrides::default();

        // Pads sized so the N1/N2 pairs' edge-to-edge gap is below the 0.5mm
        // clearance, while the N1-N1 pair is never compared (same component).
        let pad = |x: f64, y: f64, net: u32| {
            (format!("{net}"), TransformedPad { pos: Point::new(x, y), size_x: 4.0, size_y: 4.0 }, net)
        };
        let mut n1_component = placed_at("N1H", 0.0, 0.0);
        n1_component.pads.push(pad(0.0, 0.0, 1));
        n1_component.pads.push(pad(5.0, 5.0, 1));
        let mut n2_component = placed_at("N2H", 2.5, 2.5);
        n2_component.pads.push(pad(2.5, 2.5, 2));

        let placements = vec![n1_component, n2_component];
        let (clearance_violations, courtyard_violations) =
            count_pad_clearance_violations(&placements, &rules, &overrides, &nets);
        assert_eq!(clearance_violations, 2);
        assert_eq!(courtyard_violations, 0);
    }

    #[test]
    fn edge_clearance_flags_components_hugging_the_board_edge() {
        let outline = BoardOutline { rect: crate::geom::Rect::new(0.0, 0.0, 50.0, 50.0) };
        let rules = DesignRules { min_copper_to_edge: 1.0, ..DesignRules::default() };
        let extents = vec![(4.0, 4.0), (4.0, 4.0)];
        // A's left edge sits 0.5mm inside the board, under the 1mm rule. B
        // sits centered with 10mm clearance on every side.
        let placements = vec![placed_at("A", 2.5, 25.0), placed_at("B", 25.0, 25.0)];
        assert_eq!(count_edge_clearance_violations(&placements, &rules, &outline, &extents), 1);
    }

    #[test]
    fn lexicographic_infeasible_always_worse() {
        let cfg = PlacementCostConfig { mode: CostMode::Lexicographic, ..Default::default() };
        let feasible = CostBreakdown { wirelength: 1000.0, area: 1000.0, ..Default::default() };
        let infeasible = CostBreakdown { overlap: 0.0001, wirelength: 0.0, area: 0.0, ..Default::default() };
        let feasible_score = weighted_sum(&feasible, &cfg); // reuse helper just for arithmetic sanity
        let _ = feasible_score;
        let a = lexicographic(&feasible, &cfg, true);
        let b = lexicographic(&infeasible, &cfg, false);
        assert!(a < b);
    }
}
