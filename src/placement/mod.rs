//! Placement vector encoding, composite cost, seeding, multi-fidelity
//! evaluation, and ask-tell search strategies (spec.md §4.4 "PlacementOpt").

pub mod cmaes;
pub mod cost;
pub mod fidelity;
pub mod seed;
pub mod strategy;
pub mod vector;

#[cfg(feature = "bayesopt")]
pub mod bayes;

pub use cmaes::CmaesStrategy;
pub use cost::{
    count_edge_clearance_violations, count_pad_clearance_violations, CostBreakdown, CostMode,
    PlacementCostConfig, PlacementScore,
};
pub use fidelity::{
    evaluate_batch_cheap, evaluate_placement, select_fidelity, FidelityConfig, FidelityLevel, FidelityResult,
};
pub use seed::{force_directed_placement, random_placement};
pub use strategy::{PlacementStrategy, StrategyConfig};
pub use vector::{bounds, decode, encode, ComponentDef, PlacedComponent, PlacementBounds, PlacementVector};

#[cfg(feature = "bayesopt")]
pub use bayes::BayesStrategy;
