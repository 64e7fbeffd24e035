use rand::{Rng, SeedableRng};
use rand::rngs::SmallRng;

use super::vector::{ComponentDef, PlacementVector, FIELDS_PER_COMPONENT};
use crate::model::BoardOutline;

const FD_MAX_ITERATIONS: usize = 500;
const FD_DT: f64 = 0.05;
const FD_DAMPING: f64 = 0.95;
const FD_ATTRACTIVE_STRENGTH: f64 = 1.0;
const FD_REPULSIVE_STRENGTH: f64 = 5.0;
const FD_BOUNDARY_STRENGTH: f64 = 10.0;
const FD_MIN_SEPARATION: f64 = 0.1;
const FD_EQUILIBRIUM_THRESHOLD: f64 = 1e-4;

const OR_MAX_ITERATIONS: usize = 200;
const OR_PUSH_FACTOR: f64 = 1.1;

/// Number of nets shared between each ordered pair of components.
fn build_net_adjacency(components: &[ComponentDef]) -> Vec<f64> {
    let n = components.len();
    let mut adj = vec![0.0; n * n];
    let mut by_net: std::collections::HashMap<u32, Vec<usize>> = std::collections::HashMap::new();
    for (i, c) in components.iter().enumerate() {
        for (_, _, net) in &c.pads {
            by_net.entry(*net).or_default().push(i);
        }
    }
    for indices in by_net.values() {
        let mut uniq: Vec<usize> = indices.clone();
        uniq.sort_unstable();
        uniq.dedup();
        for a in 0..uniq.len() {
            for b in (a + 1)..uniq.len() {
                adj[uniq[a] * n + uniq[b]] += 1.0;
                adj[uniq[b] * n + uniq[a]] += 1.0;
            }
        }
    }
    adj
}

/// Iterative force simulation seeding an initial placement before
/// optimization (spec.md §4.4 "Seeding — force-directed").
pub fn force_directed_placement(components: &[ComponentDef], board: &BoardOutline) -> PlacementVector {
    let n = components.len();
    if n == 0 {
        return PlacementVector { data: Vec::new() };
    }

    let cx = (board.min_x() + board.max_x()) / 2.0;
    let cy = (board.min_y() + board.max_y()) / 2.0;
    let hw = board.rect.w() / 2.0;
    let hh = board.rect.h() / 2.0;

    let mut rng = SmallRng::seed_from_u64(42);
    let mut pos: Vec<(f64, f64)> = (0..n)
        .map(|_| (cx + rng.gen_range(-hw * 0.3..hw * 0.3), cy + rng.gen_range(-hh * 0.3..hh * 0.3)))
        .collect();

    let half_sizes: Vec<(f64, f64)> = components.iter().map(|c| (c.width / 2.0, c.height / 2.0)).collect();
    let adj = build_net_adjacency(components);
    let mut vel = vec![(0.0, 0.0); n];

    let x_lo: Vec<f64> = half_sizes.iter().map(|hs| board.min_x() + hs.0).collect();
    let x_hi: Vec<f64> = half_sizes.iter().map(|hs| board.max_x() - hs.0).collect();
    let y_lo: Vec<f64> = half_sizes.iter().map(|hs| board.min_y() + hs.1).collect();
    let y_hi: Vec<f64> = half_sizes.iter().map(|hs| board.max_y() - hs.1).collect();

    for _ in 0..FD_MAX_ITERATIONS {
        let mut forces = vec![(0.0, 0.0); n];

        for i in 0..n {
            for j in (i + 1)..n {
                let mut dx = pos[j].0 - pos[i].0;
                let mut dy = pos[j].1 - pos[i].1;
                let mut dist = (dx * dx + dy * dy).sqrt();
                if dist < FD_MIN_SEPARATION {
                    dist = FD_MIN_SEPARATION;
                    dx = FD_MIN_SEPARATION;
                    dy = 0.0;
                }
                let ux = dx / dist;
                let uy = dy / dist;

                let size_scale = half_sizes[i].0 + half_sizes[i].1 + half_sizes[j].0 + half_sizes[j].1;
                let f_repel = FD_REPULSIVE_STRENGTH * size_scale / (dist * dist);
                forces[i].0 -= f_repel * ux;
                forces[i].1 -= f_repel * uy;
                forces[j].0 += f_repel * ux;
                forces[j].1 += f_repel * uy;

                let net_count = adj[i * n + j];
                if net_count > 0.0 {
                    let f_attract = FD_ATTRACTIVE_STRENGTH * net_count * dist;
                    forces[i].0 += f_attract * ux;
                    forces[i].1 += f_attract * uy;
                    forces[j].0 -= f_attract * ux;
                    forces[j].1 -= f_attract * uy;
                }
            }
        }

        for i in 0..n {
            let (px, py) = pos[i];
            if px < x_lo[i] {
                forces[i].0 += FD_BOUNDARY_STRENGTH * (x_lo[i] - px);
            } else if px > x_hi[i] {
                forces[i].0 += FD_BOUNDARY_STRENGTH * (x_hi[i] - px);
            }
            if py < y_lo[i] {
                forces[i].1 += FD_BOUNDARY_STRENGTH * (y_lo[i] - py);
            } else if py > y_hi[i] {
                forces[i].1 += FD_BOUNDARY_STRENGTH * (y_hi[i] - py);
            }
        }

        let mut max_disp: f64 = 0.0;
        for i in 0..n {
            vel[i].0 = FD_DAMPING * vel[i].0 + FD_DT * forces[i].0;
            vel[i].1 = FD_DAMPING * vel[i].1 + FD_DT * forces[i].1;
            pos[i].0 += FD_DT * vel[i].0;
            pos[i].1 += FD_DT * vel[i].1;
            pos[i].0 = pos[i].0.clamp(x_lo[i], x_hi[i]);
            pos[i].1 = pos[i].1.clamp(y_lo[i], y_hi[i]);
            max_disp = max_disp.max((FD_DT * vel[i].0).abs()).max((FD_DT * vel[i].1).abs());
        }

        if max_disp < FD_EQUILIBRIUM_THRESHOLD {
            break;
        }
    }

    let mut data = vec![0.0; n * FIELDS_PER_COMPONENT];
    for i in 0..n {
        data[i * FIELDS_PER_COMPONENT] = pos[i].0;
        data[i * FIELDS_PER_COMPONENT + 1] = pos[i].1;
    }
    PlacementVector { data }
}

/// Uniform-random placement with iterative overlap resolution, used as a
/// fallback when no net connectivity is available (spec.md §9 supplement;
/// grounded on `random_placement` in the original seeding module).
pub fn random_placement(components: &[ComponentDef], board: &BoardOutline, seed: u64) -> PlacementVector {
    let n = components.len();
    if n == 0 {
        return PlacementVector { data: Vec::new() };
    }
    let mut rng = SmallRng::seed_from_u64(seed);
    let half_sizes: Vec<(f64, f64)> = components.iter().map(|c| (c.width / 2.0, c.height / 2.0)).collect();

    let mut pos: Vec<(f64, f64)> = (0..n)
        .map(|i| {
            let (hw, hh) = half_sizes[i];
            (
                rng.gen_range(board.min_x() + hw..=board.max_x() - hw),
                rng.gen_range(board.min_y() + hh..=board.max_y() - hh),
            )
        })
        .collect();

    for _ in 0..OR_MAX_ITERATIONS {
        let mut moved = false;
        for i in 0..n {
            for j in (i + 1)..n {
                let (wi, hi) = half_sizes[i];
                let (wj, hj) = half_sizes[j];
                let dx = pos[j].0 - pos[i].0;
                let dy = pos[j].1 - pos[i].1;
                let overlap_x = (wi + wj) - dx.abs();
                let overlap_y = (hi + hj) - dy.abs();
                if overlap_x > 0.0 && overlap_y > 0.0 {
                    moved = true;
                    let push = overlap_x.min(overlap_y) * OR_PUSH_FACTOR / 2.0;
                    let (ux, uy) = if dx.abs() > 1e-9 || dy.abs() > 1e-9 {
                        let d = (dx * dx + dy * dy).sqrt().max(1e-9);
                        (dx / d, dy / d)
                    } else {
                        (1.0, 0.0)
                    };
                    pos[i].0 -= push * ux;
                    pos[i].1 -= push * uy;
                    pos[j].0 += push * ux;
                    pos[j].1 += push * uy;
                }
            }
        }
        for i in 0..n {
            let (hw, hh) = half_sizes[i];
            pos[i].0 = pos[i].0.clamp(board.min_x() + hw, board.max_x() - hw);
            pos[i].1 = pos[i].1.clamp(board.min_y() + hh, board.max_y() - hh);
        }
        if !moved {
            break;
        }
    }

    let mut data = vec![0.0; n * FIELDS_PER_COMPONENT];
    for i in 0..n {
        data[i * FIELDS_PER_COMPONENT] = pos[i].0;
        data[i * FIELDS_PER_COMPONENT + 1] = pos[i].1;
    }
    PlacementVector { data }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::{Point, Rect};

    fn def(reference: &str) -> ComponentDef {
        ComponentDef { reference: reference.into(), pads: vec![], width: 2.0, height: 2.0 }
    }

    #[test]
    fn force_directed_keeps_components_in_bounds() {
        let board = BoardOutline { rect: Rect::new(0.0, 0.0, 50.0, 50.0) };
        let comps = vec![def("A"), def("B"), def("C")];
        let v = force_directed_placement(&comps, &board);
        for i in 0..3 {
            let s = v.component_slice(i);
            assert!(s[0] >= board.min_x() && s[0] <= board.max_x());
            assert!(s[1] >= board.min_y() && s[1] <= board.max_y());
            assert_eq!(s[2], 0.0);
            assert_eq!(s[3], 0.0);
        }
    }

    #[test]
    fn random_placement_resolves_overlaps_when_feasible() {
        let board = BoardOutline { rect: Rect::new(0.0, 0.0, 100.0, 100.0) };
        let comps = vec![def("A"), def("B"), def("C"), def("D")];
        let v = random_placement(&comps, &board, 7);
        let pts: Vec<Point> = (0..4)
            .map(|i| {
                let s = v.component_slice(i);
                Point::new(s[0], s[1])
            })
            .collect();
        for i in 0..4 {
            for j in (i + 1)..4 {
                assert!(pts[i].dist(pts[j]) > 0.0);
            }
        }
    }

    #[test]
    fn empty_components_yield_empty_vector() {
        let board = BoardOutline { rect: Rect::new(0.0, 0.0, 10.0, 10.0) };
        assert!(force_directed_placement(&[], &board).data.is_empty());
    }
}
