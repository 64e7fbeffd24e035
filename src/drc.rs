//! Parser for external DRC report JSON (spec.md §6 "DRC report formats
//! (consumed, not produced by core)"), grounded on the original `drc.report`
//! module's JSON branch and its `ViolationType` taxonomy. Scoped to the JSON
//! shape named in spec.md §6; the plain-text `.rpt` format is out of scope.

use serde::Deserialize;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumString, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ViolationType {
    Clearance,
    CopperEdgeClearance,
    CourtyardOverlap,
    UnconnectedItems,
    ShortingItems,
    ViaHoleLargerThanPad,
    ViaAnnularWidth,
    MicroViaHoleTooSmall,
    TrackWidth,
    TrackAngle,
    DrillHoleTooSmall,
    NpthHoleTooSmall,
    HoleNearHole,
    SilkOverCopper,
    SilkOverlap,
    SolderMaskBridge,
    Footprint,
    MalformedOutline,
    DuplicateFootprint,
    ExtraFootprint,
    MissingFootprint,
    Unknown,
}

impl ViolationType {
    /// Falls back to substring matching, then `Unknown`, mirroring the
    /// original parser's tolerance for report-generator spelling drift.
    pub fn from_loose_str(s: &str) -> Self {
        use std::str::FromStr;
        if let Ok(v) = Self::from_str(&s.to_lowercase()) {
            return v;
        }
        let lower = s.to_lowercase();
        if lower.contains("clearance") {
            return if lower.contains("edge") { Self::CopperEdgeClearance } else { Self::Clearance };
        }
        if lower.contains("unconnected") {
            return Self::UnconnectedItems;
        }
        if lower.contains("short") {
            return Self::ShortingItems;
        }
        if lower.contains("courtyard") {
            return Self::CourtyardOverlap;
        }
        if lower.contains("track") && lower.contains("width") {
            return Self::TrackWidth;
        }
        if lower.contains("via") {
            if lower.contains("annular") {
                return Self::ViaAnnularWidth;
            }
            if lower.contains("hole") && lower.contains("larger") {
                return Self::ViaHoleLargerThanPad;
            }
            if lower.contains("micro") {
                return Self::MicroViaHoleTooSmall;
            }
        }
        if lower.contains("drill") {
            return Self::DrillHoleTooSmall;
        }
        if lower.contains("silk") {
            return if lower.contains("copper") { Self::SilkOverCopper } else { Self::SilkOverlap };
        }
        if lower.contains("solder") && lower.contains("mask") {
            return Self::SolderMaskBridge;
        }
        if lower.contains("footprint") {
            if lower.contains("duplicate") {
                return Self::DuplicateFootprint;
            }
            if lower.contains("extra") {
                return Self::ExtraFootprint;
            }
            if lower.contains("missing") {
                return Self::MissingFootprint;
            }
            return Self::Footprint;
        }
        if lower.contains("outline") {
            return Self::MalformedOutline;
        }
        Self::Unknown
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumString, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    pub fn from_loose_str(s: &str) -> Self {
        use std::str::FromStr;
        Self::from_str(&s.to_lowercase()).unwrap_or(Severity::Error)
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct RawItem {
    #[serde(default)]
    description: String,
    #[serde(default)]
    net: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawViolation {
    #[serde(rename = "type")]
    type_str: String,
    #[serde(default = "default_severity")]
    severity: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    pos: Option<Position>,
    #[serde(default)]
    items: Vec<RawItem>,
    #[serde(default)]
    nets: Vec<String>,
    #[serde(default)]
    rule: String,
}

fn default_severity() -> String {
    "error".to_string()
}

#[derive(Debug, Clone, Deserialize)]
struct RawReport {
    #[serde(default)]
    violations: Vec<RawViolation>,
}

#[derive(Debug, Clone)]
pub struct DrcViolation {
    pub violation_type: ViolationType,
    pub type_str: String,
    pub severity: Severity,
    pub description: String,
    pub pos: Option<Position>,
    pub items: Vec<String>,
    pub nets: Vec<String>,
    pub rule: String,
}

impl DrcViolation {
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

#[derive(Debug, Clone, Default)]
pub struct DrcReport {
    pub violations: Vec<DrcViolation>,
}

impl DrcReport {
    pub fn error_count(&self) -> usize {
        self.violations.iter().filter(|v| v.is_error()).count()
    }

    pub fn by_type(&self, t: ViolationType) -> Vec<&DrcViolation> {
        self.violations.iter().filter(|v| v.violation_type == t).collect()
    }

    pub fn by_net<'a>(&'a self, net_name: &str) -> Vec<&'a DrcViolation> {
        self.violations.iter().filter(|v| v.nets.iter().any(|n| n == net_name)).collect()
    }
}

/// Parse the JSON DRC report shape named by spec.md §6.
pub fn parse_json_report(text: &str) -> Result<DrcReport> {
    let raw: RawReport = serde_json::from_str(text).map_err(|e| Error::schema(e.to_string()))?;

    let violations = raw
        .violations
        .into_iter()
        .map(|v| {
            let mut nets = v.nets;
            let mut items = Vec::with_capacity(v.items.len());
            for item in v.items {
                items.push(item.description);
                if let Some(net) = item.net {
                    if !net.is_empty() && !nets.contains(&net) {
                        nets.push(net);
                    }
                }
            }
            DrcViolation {
                violation_type: ViolationType::from_loose_str(&v.type_str),
                type_str: v.type_str,
                severity: Severity::from_loose_str(&v.severity),
                description: v.description,
                pos: v.pos,
                items,
                nets,
                rule: v.rule,
            }
        })
        .collect();

    Ok(DrcReport { violations })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_clearance_violation() {
        let text = r#"{
            "violations": [
                {
                    "type": "clearance",
                    "severity": "error",
                    "description": "Clearance violation",
                    "pos": {"x": 1.5, "y": 2.5},
                    "items": [{"description": "Pad 1 of U1", "net": "GND"}],
                    "nets": [],
                    "rule": "netclass 'Default'"
                }
            ]
        }"#;
        let report = parse_json_report(text).unwrap();
        assert_eq!(report.violations.len(), 1);
        assert_eq!(report.violations[0].violation_type, ViolationType::Clearance);
        assert_eq!(report.violations[0].nets, vec!["GND".to_string()]);
        assert_eq!(report.error_count(), 1);
    }

    #[test]
    fn loose_type_matching_handles_unknown_spelling() {
        assert_eq!(ViolationType::from_loose_str("edge clearance issue"), ViolationType::CopperEdgeClearance);
        assert_eq!(ViolationType::from_loose_str("totally-unrecognized"), ViolationType::Unknown);
    }

    #[test]
    fn empty_report_parses_with_no_violations() {
        let report = parse_json_report(r#"{"violations": []}"#).unwrap();
        assert!(report.violations.is_empty());
    }
}
