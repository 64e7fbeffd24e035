//! Ask-tell optimizer strategy interface (spec.md §6 "Persisted optimizer
//! state"), grounded on the original `PlacementStrategy` abstract base.

use serde::{Deserialize, Serialize};

use super::vector::{PlacementBounds, PlacementVector};
use crate::error::Result;

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyConfig {
    pub max_iterations: usize,
    pub convergence_window: usize,
    pub convergence_threshold: f64,
    pub seed: u64,
    pub population_size: Option<usize>,
    pub sigma: Option<f64>,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            convergence_window: 50,
            convergence_threshold: 1e-8,
            seed: 42,
            population_size: None,
            sigma: None,
        }
    }
}

/// Lifecycle: `initialize` then repeated `suggest`/`observe` until
/// `converged()`, then `best()` (spec.md §4.4 "Ask-tell interface").
pub trait PlacementStrategy {
    fn initialize(&mut self, bounds: PlacementBounds, config: StrategyConfig) -> Vec<PlacementVector>;
    fn suggest(&mut self, n: usize) -> Vec<PlacementVector>;
    fn observe(&mut self, placements: &[PlacementVector], scores: &[f64]);
    fn best(&self) -> Option<(PlacementVector, f64)>;
    fn converged(&self) -> bool;
    fn save_state(&self, path: &std::path::Path) -> Result<()>;
}

/// On-disk optimizer checkpoint (spec.md §6 "Persisted optimizer state").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub strategy: String,
    pub generation: usize,
    pub population_size: usize,
    pub best_score: f64,
    pub best_vector: Option<Vec<f64>>,
    pub score_history: Vec<f64>,
    pub converged: bool,
    pub config: CheckpointConfig,
    pub bounds: CheckpointBounds,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointConfig {
    pub max_iterations: usize,
    pub convergence_window: usize,
    pub convergence_threshold: f64,
    pub seed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointBounds {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
    pub discrete_mask: Vec<bool>,
}

impl Checkpoint {
    pub fn load(path: &std::path::Path, expected_strategy: &str) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| crate::error::Error::Checkpoint(e.to_string()))?;
        let checkpoint: Checkpoint =
            serde_json::from_str(&text).map_err(|e| crate::error::Error::Checkpoint(e.to_string()))?;
        if checkpoint.strategy != expected_strategy {
            return Err(crate::error::Error::Checkpoint(format!(
                "expected strategy '{}', got '{}'",
                expected_strategy, checkpoint.strategy
            )));
        }
        Ok(checkpoint)
    }

    pub fn save(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| crate::error::Error::Checkpoint(e.to_string()))?;
        }
        let text =
            serde_json::to_string_pretty(self).map_err(|e| crate::error::Error::Checkpoint(e.to_string()))?;
        std::fs::write(path, text).map_err(|e| crate::error::Error::Checkpoint(e.to_string()))
    }
}
