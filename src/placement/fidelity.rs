//! Multi-fidelity placement evaluation (spec.md §4.4 "Multi-fidelity
//! evaluator"), grounded on the original `multi_fidelity` module's level
//! ladder and adaptive budget-threshold selector.

use rayon::prelude::*;

use super::cost::{self, PlacementCostConfig, PlacementScore};
use super::vector::PlacedComponent;
use crate::model::{BoardOutline, DesignRules, NetTable, RuleOverrides};
use crate::route::{self, RouterConfig};
use crate::sexp::Document;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum FidelityLevel {
    Hpwl = 0,
    Drc = 1,
    GlobalRoute = 2,
    FullRoute = 3,
}

/// Relative cost weight per level, used by the adaptive selector to budget
/// evaluation effort (spec.md §4.4 "cost weights 1/10/100/1000 per level").
pub fn fidelity_cost(level: FidelityLevel) -> u32 {
    match level {
        FidelityLevel::Hpwl => 1,
        FidelityLevel::Drc => 10,
        FidelityLevel::GlobalRoute => 100,
        FidelityLevel::FullRoute => 1000,
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RoutabilityResult {
    pub routed_nets: usize,
    pub failed_nets: usize,
    pub routability_ratio: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct FidelityResult {
    pub score: PlacementScore,
    pub fidelity: FidelityLevel,
    pub cost: u32,
    pub routability: Option<RoutabilityResult>,
}

#[derive(Debug, Clone, Copy)]
pub struct FidelityConfig {
    pub cost_config: PlacementCostConfig,
    pub routability_weight: f64,
}

impl Default for FidelityConfig {
    fn default() -> Self {
        Self { cost_config: PlacementCostConfig::default(), routability_weight: 1e3 }
    }
}

/// Evaluate a placement at the given fidelity level. Level 0-1 never touch
/// the router; level 2 routes a coarse grid; level 3 runs the full router
/// (spec.md §4.4 fidelity table).
#[allow(clippy::too_many_arguments)]
pub fn evaluate_placement(
    placements: &[PlacedComponent],
    nets: &NetTable,
    rules: &DesignRules,
    overrides: &RuleOverrides,
    outline: &BoardOutline,
    extents: &[(f64, f64)],
    fidelity: FidelityLevel,
    config: &FidelityConfig,
    doc_and_dm: Option<(&mut Document, &crate::model::DesignModel<'_>)>,
) -> FidelityResult {
    let include_drc = fidelity >= FidelityLevel::Drc;
    let mut score =
        cost::evaluate(placements, nets, rules, overrides, outline, extents, &config.cost_config, include_drc);

    let mut routability = None;

    if fidelity >= FidelityLevel::GlobalRoute {
        if let Some((doc, dm)) = doc_and_dm {
            let router_cfg = if fidelity == FidelityLevel::GlobalRoute {
                RouterConfig { max_expansions: 20_000, ..RouterConfig::default() }
            } else {
                RouterConfig::default()
            };
            let result = route::route_board(doc, dm, &router_cfg);
            let total_nets = result.net_progress.len().max(1);
            let failed = result.failures.len();
            let routed = total_nets.saturating_sub(failed);
            let ratio = routed as f64 / total_nets as f64;
            routability = Some(RoutabilityResult { routed_nets: routed, failed_nets: failed, routability_ratio: ratio });
            if ratio < 1.0 {
                log::debug!(
                    "candidate failed routability at fidelity {fidelity:?}: {failed}/{total_nets} nets unrouted"
                );
                score.is_feasible = false;
                score.total += config.routability_weight * (1.0 - ratio);
            }
        }
    }

    FidelityResult { score, fidelity, cost: fidelity_cost(fidelity), routability }
}

/// Evaluate a batch of candidate placements concurrently at `Hpwl` or `Drc`
/// fidelity, where evaluation never touches the router or the underlying
/// document and candidates are independent (spec.md §5 "candidate batches
/// at the cheaper fidelity levels are embarrassingly parallel"). Levels that
/// need router access mutate a shared `Document` and are evaluated one at a
/// time via `evaluate_placement` instead.
#[allow(clippy::too_many_arguments)]
pub fn evaluate_batch_cheap(
    candidates: &[Vec<PlacedComponent>],
    nets: &NetTable,
    rules: &DesignRules,
    overrides: &RuleOverrides,
    outline: &BoardOutline,
    extents: &[(f64, f64)],
    fidelity: FidelityLevel,
    config: &FidelityConfig,
) -> Vec<FidelityResult> {
    debug_assert!(fidelity <= FidelityLevel::Drc, "evaluate_batch_cheap does not route; use evaluate_placement");
    candidates
        .par_iter()
        .map(|placements| evaluate_placement(placements, nets, rules, overrides, outline, extents, fidelity, config, None))
        .collect()
}

/// Maps remaining budget fraction to a fidelity level
/// (spec.md §4.4 "Adaptive fidelity selector").
pub fn select_fidelity(budget_remaining: f64) -> FidelityLevel {
    if budget_remaining > 0.75 {
        FidelityLevel::Hpwl
    } else if budget_remaining > 0.50 {
        FidelityLevel::Drc
    } else if budget_remaining > 0.20 {
        FidelityLevel::GlobalRoute
    } else {
        FidelityLevel::FullRoute
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_matches_spec_thresholds() {
        assert_eq!(select_fidelity(0.9), FidelityLevel::Hpwl);
        assert_eq!(select_fidelity(0.6), FidelityLevel::Drc);
        assert_eq!(select_fidelity(0.3), FidelityLevel::GlobalRoute);
        assert_eq!(select_fidelity(0.1), FidelityLevel::FullRoute);
    }

    #[test]
    fn cost_weights_match_spec() {
        assert_eq!(fidelity_cost(FidelityLevel::Hpwl), 1);
        assert_eq!(fidelity_cost(FidelityLevel::Drc), 10);
        assert_eq!(fidelity_cost(FidelityLevel::GlobalRoute), 100);
        assert_eq!(fidelity_cost(FidelityLevel::FullRoute), 1000);
    }

    #[test]
    fn level_0_skips_drc() {
        let nets = {
            let root = Document::parse(r#"(kicad_pcb (net 1 "N"))"#, "kicad_pcb").unwrap();
            NetTable::parse(root.root())
        };
        let rules = DesignRules::default();
        let overrides = RuleOverrides::default();
        let outline = BoardOutline { rect: crate::geom::Rect::new(0.0, 0.0, 50.0, 50.0) };
        let placements: Vec<PlacedComponent> = vec![];
        let cfg = FidelityConfig::default();
        let result = evaluate_placement(
            &placements,
            &nets,
            &rules,
            &overrides,
            &outline,
            &[],
            FidelityLevel::Hpwl,
            &cfg,
            None,
        );
        assert_eq!(result.score.breakdown.drc, 0.0);
        assert!(result.routability.is_none());
    }

    #[test]
    fn batch_evaluation_preserves_candidate_order() {
        let nets = {
            let root = Document::parse(r#"(kicad_pcb (net 1 "N"))"#, "kicad_pcb").unwrap();
            NetTable::parse(root.root())
        };
        let rules = DesignRules::default();
        let overrides = RuleOverrides::default();
        let outline = BoardOutline { rect: crate::geom::Rect::new(0.0, 0.0, 50.0, 50.0) };
        let cfg = FidelityConfig::default();
        let candidates: Vec<Vec<PlacedComponent>> = vec![vec![], vec![], vec![]];
        let results = evaluate_batch_cheap(
            &candidates,
            &nets,
            &rules,
            &overrides,
            &outline,
            &[],
            FidelityLevel::Hpwl,
            &cfg,
        );
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.fidelity == FidelityLevel::Hpwl));
    }
}
