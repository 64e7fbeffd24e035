use std::collections::HashMap;

use crate::sexp::List;

pub type NetId = u32;

/// Routing priority: lower routes first (spec.md §3 "Net").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Priority(pub u8);

pub const PRIORITY_GROUND: u8 = 1;
pub const PRIORITY_POWER: u8 = 2;
pub const PRIORITY_CLOCK: u8 = 3;
pub const PRIORITY_ANALOG: u8 = 4;
pub const PRIORITY_SIGNAL: u8 = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct Net {
    pub id: NetId,
    pub name: String,
    pub is_power: bool,
    pub is_ground: bool,
    pub is_clock: bool,
    pub priority: u8,
    /// (component reference, pad name) pairs belonging to this net
    /// (spec.md §3 "Net"), populated once a document's components are
    /// parsed since the net table itself has no footprint knowledge.
    pub pad_refs: Vec<(String, String)>,
}

impl Net {
    pub fn new(id: NetId, name: impl Into<String>) -> Self {
        let name = name.into();
        let upper = name.to_uppercase();
        let is_ground = upper.contains("GND") || upper.contains("GROUND") || upper.contains("VSS");
        let is_power = !is_ground
            && (upper.starts_with('V')
                || upper.starts_with('+')
                || upper.contains("VCC")
                || upper.contains("VDD")
                || upper.contains("VBUS")
                || upper.contains("PWR")
                || upper.contains("POWER"));
        let is_clock = upper.contains("CLK") || upper.contains("CLOCK");
        let priority = if is_ground {
            PRIORITY_GROUND
        } else if is_power {
            PRIORITY_POWER
        } else if is_clock {
            PRIORITY_CLOCK
        } else if upper.contains("ANALOG") || upper.contains("ADC") || upper.contains("DAC") {
            PRIORITY_ANALOG
        } else {
            PRIORITY_SIGNAL
        };
        Self { id, name, is_power, is_ground, is_clock, priority, pad_refs: Vec::new() }
    }
}

/// Parsed `{id -> name}` net table with its inverse (spec.md §4.5).
#[derive(Debug, Clone, Default)]
pub struct NetTable {
    by_id: HashMap<NetId, Net>,
    by_name: HashMap<String, NetId>,
}

impl NetTable {
    pub fn parse(root: &List) -> Self {
        let mut table = Self::default();
        for entry in root.find_all("net") {
            let id = entry.get_atom(0).and_then(|a| a.as_i64()).unwrap_or(0) as NetId;
            let name = entry.get_atom(1).and_then(|a| a.as_str()).unwrap_or("").to_string();
            table.by_name.insert(name.clone(), id);
            table.by_id.insert(id, Net::new(id, name));
        }
        table
    }

    pub fn get(&self, id: NetId) -> Option<&Net> {
        self.by_id.get(&id)
    }

    pub fn get_mut(&mut self, id: NetId) -> Option<&mut Net> {
        self.by_id.get_mut(&id)
    }

    /// Fill in each net's `pad_refs` from a document's parsed components
    /// (spec.md §3 "Net.pad_refs"). Pads on net 0 (unconnected) are skipped.
    pub fn populate_pad_refs(&mut self, components: &[super::Component]) {
        for comp in components {
            for pad in &comp.pads {
                if pad.net == 0 {
                    continue;
                }
                if let Some(net) = self.by_id.get_mut(&pad.net) {
                    net.pad_refs.push((comp.reference.clone(), pad.name.clone()));
                }
            }
        }
    }

    pub fn name(&self, id: NetId) -> Option<&str> {
        self.by_id.get(&id).map(|n| n.name.as_str())
    }

    pub fn id_of(&self, name: &str) -> Option<NetId> {
        self.by_name.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Net> {
        self.by_id.values()
    }
}
