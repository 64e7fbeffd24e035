use std::collections::HashMap;

use crate::sexp::List;

/// Board-wide design rules (spec.md §3 "DesignRules").
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DesignRules {
    pub trace_width: f64,
    pub trace_clearance: f64,
    pub via_drill: f64,
    pub via_diameter: f64,
    pub grid_resolution: f64,
    pub min_copper_to_edge: f64,
    pub min_hole_to_hole: f64,
    pub min_annular_ring: f64,
}

impl Default for DesignRules {
    fn default() -> Self {
        Self {
            trace_width: 0.25,
            trace_clearance: 0.2,
            via_drill: 0.3,
            via_diameter: 0.6,
            grid_resolution: 0.1,
            min_copper_to_edge: 0.25,
            min_hole_to_hole: 0.25,
            min_annular_ring: 0.15,
        }
    }
}

impl DesignRules {
    pub fn from_root(root: &List) -> Self {
        let mut rules = Self::default();
        let Some(setup) = root.find("setup") else { return rules };
        if let Some(v) = setup.find("trace_width").and_then(|l| l.floats().first().copied()) {
            rules.trace_width = v;
        }
        if let Some(v) = setup.find("trace_clearance").and_then(|l| l.floats().first().copied()) {
            rules.trace_clearance = v;
        }
        if let Some(v) = setup.find("via_drill").and_then(|l| l.floats().first().copied()) {
            rules.via_drill = v;
        }
        if let Some(v) = setup.find("via_diameter").and_then(|l| l.floats().first().copied()) {
            rules.via_diameter = v;
        }
        if let Some(v) = setup.find("grid_resolution").and_then(|l| l.floats().first().copied()) {
            rules.grid_resolution = v;
        }
        rules
    }
}

/// Per-net-class clearance/width overrides (spec.md §6 "Design-rule
/// overrides"). When present, pairwise checks use the stricter of the
/// override and the board default.
#[derive(Debug, Clone, Default)]
pub struct RuleOverrides {
    by_net_name: HashMap<String, NetClassRule>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NetClassRule {
    pub clearance: Option<f64>,
    pub trace_width: Option<f64>,
    pub via_drill: Option<f64>,
    pub via_diameter: Option<f64>,
}

impl RuleOverrides {
    pub fn insert(&mut self, net_name: impl Into<String>, rule: NetClassRule) {
        self.by_net_name.insert(net_name.into(), rule);
    }

    /// Resolve the effective clearance between two nets against the board
    /// default, taking the stricter (larger) of any override present.
    pub fn effective_clearance(&self, default: &DesignRules, a: &str, b: &str) -> f64 {
        let mut clearance = default.trace_clearance;
        for name in [a, b] {
            if let Some(rule) = self.by_net_name.get(name) {
                if let Some(c) = rule.clearance {
                    clearance = clearance.max(c);
                }
            }
        }
        clearance
    }

    pub fn effective_trace_width(&self, default: &DesignRules, net_name: &str) -> f64 {
        self.by_net_name
            .get(net_name)
            .and_then(|r| r.trace_width)
            .map(|w| w.max(default.trace_width))
            .unwrap_or(default.trace_width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_takes_stricter_clearance() {
        let mut overrides = RuleOverrides::default();
        overrides.insert("HV_NET", NetClassRule { clearance: Some(0.5), ..Default::default() });
        let rules = DesignRules::default();
        let eff = overrides.effective_clearance(&rules, "HV_NET", "GND");
        assert_eq!(eff, 0.5);
        let eff2 = overrides.effective_clearance(&rules, "GND", "VCC");
        assert_eq!(eff2, rules.trace_clearance);
    }
}
