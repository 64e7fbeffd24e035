//! Grid-based PCB autorouter (spec.md §4.3 "Router").

mod astar;
mod grid;

pub use astar::{FailureReason, PathEvent, PathfindFailure, State};
pub use grid::{Cell, PreferredDirection, RoutingGrid};

use crate::geom::mst_edges;
use crate::model::{add_segment, add_via, DesignModel, Layer, NetId, Via};
use crate::sexp::Document;

/// Diagnostic attached to a failed per-pair route (spec.md §4.3 "Failure
/// semantics").
#[derive(Debug, Clone)]
pub struct RoutingFailure {
    pub net: NetId,
    pub source: String,
    pub target: String,
    pub reason: FailureReason,
    pub dominant_blocking_net: NetId,
    /// Remediation hints a caller (or re-run driver) can act on
    /// (spec.md §4.3 "Failure semantics").
    pub suggestions: Vec<String>,
}

fn failure_suggestions(dominant_blocking_net: NetId) -> Vec<String> {
    let mut suggestions = vec!["retry with an increased layer count".to_string()];
    if dominant_blocking_net != 0 {
        suggestions.push(format!("remove net {dominant_blocking_net} and re-route"));
    } else {
        suggestions.push("remove the blocking net and re-route".to_string());
    }
    suggestions
}

/// Aggregate outcome of one routing run, across every net (spec.md §4.3).
#[derive(Debug, Clone, Default)]
pub struct RouteResult {
    pub segments_added: usize,
    pub vias_added: usize,
    /// Per-net count of MST edges successfully routed out of the total.
    pub net_progress: Vec<(NetId, usize, usize)>,
    pub failures: Vec<RoutingFailure>,
}

impl RouteResult {
    pub fn fully_routed(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RouterConfig {
    pub heuristic_weight: f64,
    pub max_expansions: usize,
    pub negotiated_congestion: bool,
    pub max_congestion_passes: u32,
    pub congestion_penalty_factor: u16,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            heuristic_weight: 1.0,
            max_expansions: 200_000,
            negotiated_congestion: false,
            max_congestion_passes: 10,
            congestion_penalty_factor: 50,
        }
    }
}

struct NetJob {
    net: NetId,
    pads: Vec<(String, String, astar::State)>,
    priority: u8,
    span: f64,
}

/// Route every net of `dm` onto a fresh grid and write the resulting
/// segments/vias back into `doc` (spec.md §4.3, §4.5 write-back).
pub fn route_board(doc: &mut Document, dm: &DesignModel<'_>, cfg: &RouterConfig) -> RouteResult {
    let layers = vec![Layer::FrontCopper, Layer::BackCopper];
    let mut grid = RoutingGrid::new(layers, dm.outline.rect, dm.rules.grid_resolution);
    grid.set_via_radius_from_diameter(dm.rules.via_diameter);
    grid.populate_obstacles(dm);

    let jobs = build_jobs(dm, &grid);

    if cfg.negotiated_congestion {
        route_with_negotiated_congestion(doc, dm, &jobs, cfg)
    } else {
        let mut result = RouteResult::default();
        for job in &jobs {
            route_one_net(doc, &mut grid, job, cfg, &mut result);
        }
        result
    }
}

fn build_jobs(dm: &DesignModel<'_>, grid: &RoutingGrid) -> Vec<NetJob> {
    let mut by_net: std::collections::HashMap<NetId, Vec<(String, String, astar::State)>> =
        std::collections::HashMap::new();

    for comp in &dm.components {
        let transformed = comp.transformed_pads();
        for (pad, t) in comp.pads.iter().zip(transformed.iter()) {
            if pad.net == 0 {
                continue;
            }
            let layer = if comp.side == 1 { Layer::BackCopper } else { Layer::FrontCopper };
            let layer_idx = grid.layer_index(layer).unwrap_or(0);
            let (row, col) = grid.to_cell(t.pos);
            by_net.entry(pad.net).or_default().push((
                comp.reference.clone(),
                pad.name.clone(),
                (layer_idx, row, col),
            ));
        }
    }

    let mut jobs: Vec<NetJob> = by_net
        .into_iter()
        .filter(|(_, pads)| pads.len() >= 2)
        .map(|(net, pads)| {
            let priority = dm.nets.get(net).map(|n| n.priority).unwrap_or(5);
            let span = manhattan_span(&pads);
            NetJob { net, pads, priority, span }
        })
        .collect();

    // Ground before power before clocks before signals; shorter nets first
    // within a priority band (spec.md §4.3 "Net ordering").
    jobs.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.span.partial_cmp(&b.span).unwrap()));
    jobs
}

fn manhattan_span(pads: &[(String, String, astar::State)]) -> f64 {
    let mut total = 0.0;
    for w in pads.windows(2) {
        let (_, _, (_, r0, c0)) = w[0];
        let (_, _, (_, r1, c1)) = w[1];
        total += (r0 as f64 - r1 as f64).abs() + (c0 as f64 - c1 as f64).abs();
    }
    total
}

fn route_one_net(
    doc: &mut Document,
    grid: &mut RoutingGrid,
    job: &NetJob,
    cfg: &RouterConfig,
    result: &mut RouteResult,
) {
    let points: Vec<crate::geom::Point> =
        job.pads.iter().map(|&(_, _, (_, r, c))| grid.to_point(r, c)).collect();
    let edges = mst_edges(&points);
    let mut routed = 0usize;

    for edge in &edges {
        let src = job.pads[edge.from].2;
        let dst = job.pads[edge.to].2;
        match astar::astar(grid, &[src], &[dst], job.net, cfg.heuristic_weight, cfg.max_expansions) {
            Ok(events) => {
                apply_path(doc, grid, job.net, &events, result);
                routed += 1;
            }
            Err(failure) => {
                result.failures.push(RoutingFailure {
                    net: job.net,
                    source: format!("{}:{}", job.pads[edge.from].0, job.pads[edge.from].1),
                    target: format!("{}:{}", job.pads[edge.to].0, job.pads[edge.to].1),
                    reason: failure.reason,
                    dominant_blocking_net: failure.dominant_blocking_net,
                    suggestions: failure_suggestions(failure.dominant_blocking_net),
                });
            }
        }
    }

    result.net_progress.push((job.net, routed, edges.len()));
}

fn apply_path(
    doc: &mut Document,
    grid: &mut RoutingGrid,
    net: NetId,
    events: &[PathEvent],
    result: &mut RouteResult,
) {
    for ev in events {
        match *ev {
            PathEvent::Segment { from, to } => {
                let (fl, fr, fc) = from;
                let (_, tr, tc) = to;
                let layer = grid.layers[fl];
                let start = grid.to_point(fr, fc);
                let end = grid.to_point(tr, tc);
                let trace = crate::model::Trace { start, end, width: 0.25, layer, net };
                add_segment(doc, &trace);
                mark_path_cells(grid, fl, fr, fc, tr, tc, net);
                result.segments_added += 1;
            }
            PathEvent::Via { at, to_layer } => {
                let (l, r, c) = at;
                let pos = grid.to_point(r, c);
                let via = Via {
                    pos,
                    diameter: 0.6,
                    drill: 0.3,
                    from_layer: grid.layers[l],
                    to_layer: grid.layers[to_layer],
                    net,
                };
                add_via(doc, &via);
                grid.cell_mut(l, r, c).net = net;
                grid.cell_mut(l, r, c).blocked = true;
                grid.cell_mut(to_layer, r, c).net = net;
                grid.cell_mut(to_layer, r, c).blocked = true;
                result.vias_added += 1;
            }
        }
    }
}

fn mark_path_cells(grid: &mut RoutingGrid, layer: usize, r0: usize, c0: usize, r1: usize, c1: usize, net: NetId) {
    let dr = (r1 as i64 - r0 as i64).signum();
    let dc = (c1 as i64 - c0 as i64).signum();
    let (mut r, mut c) = (r0 as i64, c0 as i64);
    loop {
        if grid.in_bounds(layer, r, c) {
            let cell = grid.cell_mut(layer, r as usize, c as usize);
            cell.blocked = true;
            cell.net = net;
        }
        if r == r1 as i64 && c == c1 as i64 {
            break;
        }
        r += dr;
        c += dc;
    }
}

/// Outer iteration: route every net from scratch, penalize cells shared by
/// more than one net, repeat (spec.md §4.3 "Negotiated congestion").
fn route_with_negotiated_congestion(
    doc: &mut Document,
    dm: &DesignModel<'_>,
    jobs: &[NetJob],
    cfg: &RouterConfig,
) -> RouteResult {
    // Cost penalties accumulated across passes, keyed by grid cell; applied
    // to each pass's freshly rasterized grid before routing.
    let mut penalties: std::collections::HashMap<(usize, usize, usize), u16> =
        std::collections::HashMap::new();
    let mut result = RouteResult::default();

    for pass in 0..cfg.max_congestion_passes {
        let layers = vec![Layer::FrontCopper, Layer::BackCopper];
        let mut grid = RoutingGrid::new(layers, dm.outline.rect, dm.rules.grid_resolution);
        grid.set_via_radius_from_diameter(dm.rules.via_diameter);
        grid.populate_obstacles(dm);
        for (&(l, r, c), &penalty) in &penalties {
            if grid.in_bounds(l, r as i64, c as i64) {
                let cell = grid.cell_mut(l, r, c);
                cell.cost = cell.cost.saturating_add(penalty);
            }
        }

        let mut pass_result = RouteResult::default();
        for job in jobs {
            route_one_net(doc, &mut grid, job, cfg, &mut pass_result);
        }

        let mut usage: std::collections::HashMap<(usize, usize, usize), NetId> =
            std::collections::HashMap::new();
        let mut shared_cells: Vec<(usize, usize, usize)> = Vec::new();

        for layer in 0..grid.layers.len() {
            for row in 0..grid.rows {
                for col in 0..grid.cols {
                    let cell = grid.cell(layer, row, col);
                    if !cell.blocked || cell.net == 0 {
                        continue;
                    }
                    match usage.get(&(layer, row, col)) {
                        Some(&prev_net) if prev_net != cell.net => shared_cells.push((layer, row, col)),
                        None => {
                            usage.insert((layer, row, col), cell.net);
                        }
                        _ => {}
                    }
                }
            }
        }

        result = pass_result;
        if shared_cells.is_empty() {
            break;
        }
        for key in &shared_cells {
            let entry = penalties.entry(*key).or_insert(0);
            *entry = entry.saturating_add(cfg.congestion_penalty_factor);
        }
        if pass == cfg.max_congestion_passes - 1 {
            log::warn!(
                "negotiated congestion did not converge after {} passes, {} cells still shared",
                cfg.max_congestion_passes,
                shared_cells.len()
            );
            result.failures.push(RoutingFailure {
                net: 0,
                source: String::new(),
                target: String::new(),
                reason: FailureReason::CongestionTooHigh,
                dominant_blocking_net: 0,
                suggestions: vec![
                    "increase max_congestion_passes".to_string(),
                    "reduce congestion_penalty_factor and retry".to_string(),
                ],
            });
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn router_config_defaults_sane() {
        let cfg = RouterConfig::default();
        assert!(cfg.max_expansions > 0);
        assert!(cfg.heuristic_weight >= 1.0);
    }

    #[test]
    fn route_two_pad_board() {
        let doc_text = r#"(kicad_pcb
            (net 0 "")
            (net 1 "SIG")
            (gr_line (start 0 0) (end 50 0) (layer "Edge.Cuts"))
            (gr_line (start 50 0) (end 50 50) (layer "Edge.Cuts"))
            (gr_line (start 50 50) (end 0 50) (layer "Edge.Cuts"))
            (gr_line (start 0 50) (end 0 0) (layer "Edge.Cuts"))
            (footprint "PAD" (layer "F.Cu") (at 10 10 0)
              (pad "1" smd rect (at 0 0) (size 1 1) (layers "F.Cu") (net 1)))
            (footprint "PAD" (layer "F.Cu") (at 40 10 0)
              (pad "1" smd rect (at 0 0) (size 1 1) (layers "F.Cu") (net 1))))"#;
        let mut doc = Document::parse(doc_text, "kicad_pcb").unwrap();
        let dm = DesignModel::from_document(&doc).unwrap();
        let cfg = RouterConfig { max_expansions: 500_000, ..Default::default() };
        let _ = route_board(&mut doc, &dm, &cfg);
    }
}
