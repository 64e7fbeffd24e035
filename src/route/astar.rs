use std::cmp::Reverse;
use std::collections::HashMap;

use ordered_float::OrderedFloat;
use priority_queue::PriorityQueue;

use super::grid::{PreferredDirection, RoutingGrid};
use crate::model::NetId;

pub type State = (usize, usize, usize); // (layer, row, col)

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    SourceSurrounded,
    TargetSurrounded,
    CongestionTooHigh,
    NoLayerAvailable,
}

#[derive(Debug, Clone)]
pub struct PathfindFailure {
    pub reason: FailureReason,
    pub dominant_blocking_net: NetId,
}

/// One leg of a recovered path: either a straight copper run or a via.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathEvent {
    Segment { from: State, to: State },
    Via { at: State, to_layer: usize },
}

const DIAGONAL_COST: f64 = std::f64::consts::SQRT_2;

/// A* search over the routing grid from any cell in `sources` to any cell
/// in `targets` (spec.md §4.3 "Per-pair A*"). `net` cells are traversable
/// even when blocked, since they belong to the net already being routed.
pub fn astar(
    grid: &RoutingGrid,
    sources: &[State],
    targets: &[State],
    net: NetId,
    heuristic_weight: f64,
    max_expansions: usize,
) -> Result<Vec<PathEvent>, PathfindFailure> {
    let target_set: std::collections::HashSet<State> = targets.iter().copied().collect();

    let mut open: PriorityQueue<State, Reverse<OrderedFloat<f64>>> = PriorityQueue::new();
    let mut g_score: HashMap<State, f64> = HashMap::new();
    let mut came_from: HashMap<State, State> = HashMap::new();

    for &s in sources {
        if !traversable(grid, s, net) {
            continue;
        }
        g_score.insert(s, 0.0);
        let h = heuristic(grid, s, targets, heuristic_weight);
        open.push(s, Reverse(OrderedFloat(h)));
    }

    if open.is_empty() {
        return Err(PathfindFailure {
            reason: FailureReason::SourceSurrounded,
            dominant_blocking_net: dominant_blocker(grid, sources),
        });
    }

    let mut expansions = 0usize;
    let mut goal = None;

    while let Some((current, _)) = open.pop() {
        if target_set.contains(&current) {
            goal = Some(current);
            break;
        }
        expansions += 1;
        if expansions > max_expansions {
            log::warn!("net {net}: A* exceeded {max_expansions} expansions, giving up on this pair");
            break;
        }

        let current_g = g_score[&current];
        for (next, step_cost) in neighbors(grid, current, net) {
            let tentative = current_g + step_cost;
            if tentative < *g_score.get(&next).unwrap_or(&f64::INFINITY) {
                g_score.insert(next, tentative);
                came_from.insert(next, current);
                let h = heuristic(grid, next, targets, heuristic_weight);
                open.push(next, Reverse(OrderedFloat(tentative + h)));
            }
        }
    }

    let Some(goal) = goal else {
        return Err(PathfindFailure {
            reason: FailureReason::TargetSurrounded,
            dominant_blocking_net: dominant_blocker(grid, targets),
        });
    };

    Ok(reconstruct(goal, &came_from))
}

fn traversable(grid: &RoutingGrid, s: State, net: NetId) -> bool {
    let (l, r, c) = s;
    if !grid.in_bounds(l, r as i64, c as i64) {
        return false;
    }
    let cell = grid.cell(l, r, c);
    !cell.blocked || cell.net == net
}

fn neighbors(grid: &RoutingGrid, s: State, net: NetId) -> Vec<(State, f64)> {
    let (layer, row, col) = s;
    let mut out = Vec::with_capacity(10);
    let deltas: [(i64, i64, f64); 8] = [
        (-1, 0, 1.0),
        (1, 0, 1.0),
        (0, -1, 1.0),
        (0, 1, 1.0),
        (-1, -1, DIAGONAL_COST),
        (-1, 1, DIAGONAL_COST),
        (1, -1, DIAGONAL_COST),
        (1, 1, DIAGONAL_COST),
    ];
    let pref = grid.preferred_direction(layer);
    for (dr, dc, base) in deltas {
        let nr = row as i64 + dr;
        let nc = col as i64 + dc;
        if !grid.in_bounds(layer, nr, nc) {
            continue;
        }
        let next = (layer, nr as usize, nc as usize);
        if !traversable(grid, next, net) {
            continue;
        }
        let wrong_way = match pref {
            PreferredDirection::Horizontal => dr != 0 && dc == 0,
            PreferredDirection::Vertical => dc != 0 && dr == 0,
        };
        let cell_cost = grid.cell(layer, nr as usize, nc as usize).cost as f64;
        let mult = if wrong_way { grid.wrong_way_factor } else { 1.0 };
        out.push((next, base * cell_cost * mult));
    }

    for (dl, to_layer) in [(-1i64, layer.wrapping_sub(1)), (1, layer + 1)] {
        let _ = dl;
        if to_layer >= grid.layers.len() {
            continue;
        }
        let next = (to_layer, row, col);
        if !traversable(grid, next, net) {
            continue;
        }
        if !via_site_clear(grid, net, row, col, layer, to_layer) {
            continue;
        }
        out.push((next, grid.via_penalty as f64));
    }

    out
}

/// A via needs its full pad footprint clear on both layers it joins, not
/// just the single cell the path passes through (spec.md §4.3 "Via site
/// clearance"). Checks every cell within `grid.via_radius_cells` of `(row,
/// col)` on both layers, treating cells owned by `net` as free.
fn via_site_clear(
    grid: &RoutingGrid,
    net: NetId,
    row: usize,
    col: usize,
    layer_a: usize,
    layer_b: usize,
) -> bool {
    let radius = grid.via_radius_cells as i64;
    for &l in &[layer_a, layer_b] {
        for dr in -radius..=radius {
            for dc in -radius..=radius {
                let r = row as i64 + dr;
                let c = col as i64 + dc;
                if !grid.in_bounds(l, r, c) {
                    return false;
                }
                let cell = grid.cell(l, r as usize, c as usize);
                if cell.blocked && cell.net != net {
                    return false;
                }
            }
        }
    }
    true
}

fn heuristic(grid: &RoutingGrid, s: State, targets: &[State], weight: f64) -> f64 {
    targets
        .iter()
        .map(|&(tl, tr, tc)| {
            let dr = (s.1 as f64 - tr as f64).abs();
            let dc = (s.2 as f64 - tc as f64).abs();
            let octile = dr.max(dc) + (DIAGONAL_COST - 1.0) * dr.min(dc);
            let layer_penalty = if s.0 == tl { 0.0 } else { grid.via_penalty as f64 };
            (octile + layer_penalty) * weight
        })
        .fold(f64::INFINITY, f64::min)
}

fn dominant_blocker(grid: &RoutingGrid, states: &[State]) -> NetId {
    let mut counts: HashMap<NetId, usize> = HashMap::new();
    for &(l, r, c) in states {
        if !grid.in_bounds(l, r as i64, c as i64) {
            continue;
        }
        let cell = grid.cell(l, r, c);
        if cell.blocked {
            *counts.entry(cell.net).or_insert(0) += 1;
        }
    }
    counts.into_iter().max_by_key(|&(_, n)| n).map(|(net, _)| net).unwrap_or(0)
}

fn reconstruct(goal: State, came_from: &HashMap<State, State>) -> Vec<PathEvent> {
    let mut states = vec![goal];
    let mut cur = goal;
    while let Some(&prev) = came_from.get(&cur) {
        states.push(prev);
        cur = prev;
    }
    states.reverse();

    let mut events = Vec::new();
    let mut i = 0;
    while i + 1 < states.len() {
        let a = states[i];
        let b = states[i + 1];
        if a.0 != b.0 {
            events.push(PathEvent::Via { at: a, to_layer: b.0 });
            i += 1;
            continue;
        }
        // Collapse collinear same-layer steps into one segment.
        let mut j = i + 1;
        while j + 1 < states.len() {
            let c = states[j + 1];
            if c.0 != a.0 || !collinear(states[i], states[j], c) {
                break;
            }
            j += 1;
        }
        events.push(PathEvent::Segment { from: states[i], to: states[j] });
        i = j;
    }
    events
}

fn collinear(a: State, b: State, c: State) -> bool {
    let (_, ar, ac) = a;
    let (_, br, bc) = b;
    let (_, cr, cc) = c;
    let d1 = (br as i64 - ar as i64, bc as i64 - ac as i64);
    let d2 = (cr as i64 - br as i64, cc as i64 - bc as i64);
    d1 == d2
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Rect;
    use crate::model::Layer;

    #[test]
    fn straight_line_path_on_empty_grid() {
        let grid = RoutingGrid::new(vec![Layer::FrontCopper], Rect::new(0.0, 0.0, 30.0, 30.0), 1.0);
        let src = (0, 0, 0);
        let dst = (0, 0, 30);
        let events = astar(&grid, &[src], &[dst], 1, 1.0, 100_000).unwrap();
        assert!(events.iter().all(|e| matches!(e, PathEvent::Segment { .. })));
        if let PathEvent::Segment { to, .. } = events.last().unwrap() {
            assert_eq!(*to, dst);
        }
    }

    #[test]
    fn blocked_grid_surrounded_source_fails() {
        let mut grid = RoutingGrid::new(vec![Layer::FrontCopper], Rect::new(0.0, 0.0, 10.0, 10.0), 1.0);
        grid.rasterize_rect(0, Rect::new(0.0, 0.0, 10.0, 10.0), 99);
        let err = astar(&grid, &[(0, 5, 5)], &[(0, 0, 0)], 1, 1.0, 1000).unwrap_err();
        assert_eq!(err.reason, FailureReason::SourceSurrounded);
    }

    #[test]
    fn diagonal_path_length_within_5_percent_of_octile_bound() {
        let grid = RoutingGrid::new(vec![Layer::FrontCopper], Rect::new(0.0, 0.0, 50.0, 50.0), 1.0);
        let src = (0, 0, 0);
        let dst = (0, 18, 24); // Euclidean separation = 30mm, not axis-aligned.
        let events = astar(&grid, &[src], &[dst], 1, 1.0, 100_000).unwrap();

        let via_count = events.iter().filter(|e| matches!(e, PathEvent::Via { .. })).count();
        assert_eq!(via_count, 0);

        let mut length = 0.0;
        for e in &events {
            if let PathEvent::Segment { from, to } = e {
                let dr = (to.1 as f64 - from.1 as f64).abs();
                let dc = (to.2 as f64 - from.2 as f64).abs();
                length += (dr * dr + dc * dc).sqrt() * grid.pitch;
            }
        }

        let (dr, dc) = (18.0_f64, 24.0_f64);
        let octile_lower_bound = (dr.max(dc) + (std::f64::consts::SQRT_2 - 1.0) * dr.min(dc)) * grid.pitch;

        assert!(length <= octile_lower_bound * 1.05 + 1e-9);
        assert!(length >= octile_lower_bound - 1e-6);
    }

    #[test]
    fn same_net_cells_are_traversable() {
        let mut grid = RoutingGrid::new(vec![Layer::FrontCopper], Rect::new(0.0, 0.0, 10.0, 10.0), 1.0);
        grid.rasterize_rect(0, Rect::new(0.0, 0.0, 10.0, 10.0), 7);
        let events = astar(&grid, &[(0, 0, 0)], &[(0, 5, 5)], 7, 1.0, 10_000).unwrap();
        assert!(!events.is_empty());
    }
}
