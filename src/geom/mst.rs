use super::Point;

/// An edge in the minimum spanning tree over a point set, referencing the
/// input indices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MstEdge {
    pub from: usize,
    pub to: usize,
    pub dist: f64,
}

/// Decompose a multi-pin net into a minimum spanning tree of two-terminal
/// edges, using Prim's algorithm with Manhattan distance (spec.md §4.2,
/// net decomposition). Ties are broken deterministically by preferring the
/// lower pad index, so results are reproducible across runs.
///
/// Returns `points.len() - 1` edges for a connected point set of size >= 2,
/// or an empty vec for 0 or 1 points.
pub fn mst_edges(points: &[Point]) -> Vec<MstEdge> {
    let n = points.len();
    if n < 2 {
        return Vec::new();
    }

    let mut in_tree = vec![false; n];
    let mut best_dist = vec![f64::INFINITY; n];
    let mut best_from = vec![usize::MAX; n];

    in_tree[0] = true;
    for j in 1..n {
        best_dist[j] = points[0].manhattan_dist(points[j]);
        best_from[j] = 0;
    }

    let mut edges = Vec::with_capacity(n - 1);

    for _ in 1..n {
        // Pick the lowest-index candidate achieving the minimum distance.
        let mut chosen = usize::MAX;
        for j in 0..n {
            if in_tree[j] {
                continue;
            }
            if chosen == usize::MAX || best_dist[j] < best_dist[chosen] {
                chosen = j;
            }
        }

        in_tree[chosen] = true;
        edges.push(MstEdge {
            from: best_from[chosen].min(chosen),
            to: best_from[chosen].max(chosen),
            dist: best_dist[chosen],
        });

        for j in 0..n {
            if in_tree[j] {
                continue;
            }
            let d = points[chosen].manhattan_dist(points[j]);
            if d < best_dist[j] {
                best_dist[j] = d;
                best_from[j] = chosen;
            }
        }
    }

    edges
}
