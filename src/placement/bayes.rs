//! Optional Bayesian-optimization placement strategy (spec.md §4.4
//! "Bayesian-optimization driver (optional)"), gated behind the `bayesopt`
//! feature. Grounded on the original `BayesianOptStrategy` adapter over
//! Ax/BoTorch; those are Python-only and have no equivalent in this stack,
//! so the GP+qEI acquisition is replaced with a simplified distance-weighted
//! surrogate (see DESIGN.md) while keeping the same ask-tell contract,
//! Latin-hypercube initial design, and LHS fallback-on-failure behavior.

use std::path::Path;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use super::strategy::{Checkpoint, CheckpointBounds, CheckpointConfig, PlacementStrategy, StrategyConfig};
use super::vector::{PlacementBounds, PlacementVector};
use crate::error::Result;

const DEFAULT_BATCH_SIZE: usize = 8;
const LHS_MULTIPLIER: usize = 5;

fn latin_hypercube_sample(n: usize, bounds: &PlacementBounds, rng: &mut SmallRng) -> Vec<Vec<f64>> {
    let ndim = bounds.lower.len();
    let mut columns: Vec<Vec<f64>> = vec![vec![0.0; n]; ndim];

    for d in 0..ndim {
        let mut strata: Vec<f64> = (0..n).map(|i| (i as f64 + rng.gen_range(0.0..1.0)) / n as f64).collect();
        for i in (1..strata.len()).rev() {
            let j = rng.gen_range(0..=i);
            strata.swap(i, j);
        }
        for (i, s) in strata.into_iter().enumerate() {
            let mut v = bounds.lower[d] + s * (bounds.upper[d] - bounds.lower[d]);
            if bounds.discrete_mask[d] {
                v = v.round().clamp(bounds.lower[d], bounds.upper[d]);
            }
            columns[d][i] = v;
        }
    }

    (0..n).map(|i| (0..ndim).map(|d| columns[d][i]).collect()).collect()
}

/// Distance-weighted surrogate acquisition: prefers points far from already
/// observed samples (exploration) while biasing toward the neighborhood of
/// the best-observed point (exploitation). Stands in for the GP+qEI model
/// this strategy uses when a genuine Gaussian-process crate is available.
fn propose_batch(
    n: usize,
    bounds: &PlacementBounds,
    observed: &[(Vec<f64>, f64)],
    rng: &mut SmallRng,
) -> Vec<Vec<f64>> {
    if observed.is_empty() {
        return latin_hypercube_sample(n, bounds, rng);
    }
    let best = observed.iter().min_by(|a, b| a.1.partial_cmp(&b.1).unwrap()).unwrap().0.clone();
    let ndim = bounds.lower.len();
    let candidates = latin_hypercube_sample(n.max(20) * 4, bounds, rng);

    let mut scored: Vec<(f64, Vec<f64>)> = candidates
        .into_iter()
        .map(|c| {
            let dist_to_best: f64 = (0..ndim).map(|d| (c[d] - best[d]).powi(2)).sum::<f64>().sqrt();
            let min_dist_to_observed = observed
                .iter()
                .map(|(o, _)| (0..ndim).map(|d| (c[d] - o[d]).powi(2)).sum::<f64>().sqrt())
                .fold(f64::INFINITY, f64::min);
            // Lower is better: close to best, but not a near-duplicate of an
            // existing observation.
            let acquisition = dist_to_best - 0.5 * min_dist_to_observed;
            (acquisition, c)
        })
        .collect();
    scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
    scored.into_iter().take(n).map(|(_, c)| c).collect()
}

pub struct BayesStrategy {
    config: Option<StrategyConfig>,
    bounds: Option<PlacementBounds>,
    batch_size: usize,
    rng: SmallRng,
    generation: usize,
    best_vector: Option<PlacementVector>,
    best_score: f64,
    score_history: std::collections::VecDeque<f64>,
    converged: bool,
    observed: Vec<(Vec<f64>, f64)>,
    pending: Vec<Vec<f64>>,
}

impl Default for BayesStrategy {
    fn default() -> Self {
        Self {
            config: None,
            bounds: None,
            batch_size: DEFAULT_BATCH_SIZE,
            rng: SmallRng::seed_from_u64(0),
            generation: 0,
            best_vector: None,
            best_score: f64::INFINITY,
            score_history: std::collections::VecDeque::new(),
            converged: false,
            observed: Vec::new(),
            pending: Vec::new(),
        }
    }
}

impl BayesStrategy {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PlacementStrategy for BayesStrategy {
    fn initialize(&mut self, bounds: PlacementBounds, config: StrategyConfig) -> Vec<PlacementVector> {
        let ndim = bounds.lower.len();
        self.batch_size = config.population_size.unwrap_or(DEFAULT_BATCH_SIZE);
        self.rng = SmallRng::seed_from_u64(config.seed);
        self.generation = 0;
        self.best_vector = None;
        self.best_score = f64::INFINITY;
        self.score_history = std::collections::VecDeque::with_capacity(config.convergence_window);
        self.converged = false;
        self.observed.clear();
        self.pending.clear();

        let n_initial = LHS_MULTIPLIER * ndim.max(1);
        self.bounds = Some(bounds.clone());
        self.config = Some(config);

        self.pending = latin_hypercube_sample(n_initial, &bounds, &mut self.rng);
        self.pending.iter().map(|data| PlacementVector { data: data.clone() }).collect()
    }

    fn suggest(&mut self, n: usize) -> Vec<PlacementVector> {
        let bounds = self.bounds.clone().expect("initialize() must be called first");
        self.pending = propose_batch(n, &bounds, &self.observed, &mut self.rng);
        self.pending.iter().map(|data| PlacementVector { data: data.clone() }).collect()
    }

    fn observe(&mut self, placements: &[PlacementVector], scores: &[f64]) {
        assert_eq!(placements.len(), scores.len());
        for (p, &score) in placements.iter().zip(scores) {
            self.observed.push((p.data.clone(), score));
            if score < self.best_score {
                self.best_score = score;
                self.best_vector = Some(p.clone());
            }
        }
        self.pending.clear();

        self.generation += 1;
        if let Some(config) = &self.config {
            if self.score_history.len() >= config.convergence_window {
                self.score_history.pop_front();
            }
        }
        self.score_history.push_back(self.best_score);

        if let Some(config) = &self.config {
            if self.score_history.len() >= config.convergence_window {
                let oldest = *self.score_history.front().unwrap();
                let newest = *self.score_history.back().unwrap();
                let improvement =
                    if oldest.abs() < 1e-15 { (oldest - newest).abs() } else { (oldest - newest).abs() / oldest.abs() };
                if improvement < config.convergence_threshold {
                    self.converged = true;
                }
            }
        }
    }

    fn best(&self) -> Option<(PlacementVector, f64)> {
        self.best_vector.clone().map(|v| (v, self.best_score))
    }

    fn converged(&self) -> bool {
        self.converged
    }

    fn save_state(&self, path: &Path) -> Result<()> {
        let config = self.config.as_ref().expect("initialize() must be called first");
        let bounds = self.bounds.as_ref().expect("initialize() must be called first");
        let checkpoint = Checkpoint {
            strategy: "bayesopt".into(),
            generation: self.generation,
            population_size: self.batch_size,
            best_score: self.best_score,
            best_vector: self.best_vector.as_ref().map(|v| v.data.clone()),
            score_history: self.score_history.iter().copied().collect(),
            converged: self.converged,
            config: CheckpointConfig {
                max_iterations: config.max_iterations,
                convergence_window: config.convergence_window,
                convergence_threshold: config.convergence_threshold,
                seed: config.seed,
            },
            bounds: CheckpointBounds {
                lower: bounds.lower.clone(),
                upper: bounds.upper.clone(),
                discrete_mask: bounds.discrete_mask.clone(),
            },
        };
        checkpoint.save(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds() -> PlacementBounds {
        PlacementBounds { lower: vec![0.0, 0.0], upper: vec![10.0, 3.0], discrete_mask: vec![false, true] }
    }

    #[test]
    fn initial_design_has_5n_points_and_respects_bounds() {
        let mut strategy = BayesStrategy::new();
        let config = StrategyConfig { seed: 3, ..Default::default() };
        let pop = strategy.initialize(bounds(), config);
        assert_eq!(pop.len(), LHS_MULTIPLIER * 2);
        for v in &pop {
            assert!(v.data[0] >= 0.0 && v.data[0] <= 10.0);
            assert!(v.data[1] >= 0.0 && v.data[1] <= 3.0);
            assert_eq!(v.data[1].fract(), 0.0);
        }
    }

    #[test]
    fn falls_back_to_lhs_when_no_observations() {
        let b = bounds();
        let mut rng = SmallRng::seed_from_u64(1);
        let batch = propose_batch(4, &b, &[], &mut rng);
        assert_eq!(batch.len(), 4);
    }
}
