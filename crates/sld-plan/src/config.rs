//! Heuristic knobs for bus identification and feeder walking.

use crate::graph::EquipmentKind;

/// Tunable heuristics, defaulted to values that work on common SCL exports.
#[derive(Debug, Clone)]
pub struct Heuristics {
    /// A CN with at least this many incident terminals is bus-like.
    pub bus_degree_threshold: usize,
    /// Upper-cased substrings of a CN path/name that mark it bus-like.
    pub bus_name_hints: Vec<String>,
    /// Maximum number of steps in a feeder walk.
    pub feeder_max_depth: usize,
    /// Kinds treated as transitive mid-chain (informational for consumers;
    /// they do not alter walk termination).
    pub series_pass_kinds: Vec<EquipmentKind>,
    /// Kinds that terminate a feeder chain.
    pub endpoint_kinds: Vec<EquipmentKind>,
}

impl Default for Heuristics {
    fn default() -> Self {
        Self {
            bus_degree_threshold: 3,
            bus_name_hints: ["BUS", "BUSBAR", "BB", "BARRE", "BAR"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            feeder_max_depth: 16,
            series_pass_kinds: vec![
                EquipmentKind::DS,
                EquipmentKind::CB,
                EquipmentKind::CT,
                EquipmentKind::VT,
            ],
            endpoint_kinds: vec![
                EquipmentKind::Line,
                EquipmentKind::Cable,
                EquipmentKind::Transformer,
            ],
        }
    }
}

impl Heuristics {
    /// Whether an upper-cased CN path/name carries a bus hint.
    pub fn has_bus_hint(&self, upper: &str) -> bool {
        self.bus_name_hints.iter().any(|hint| upper.contains(hint))
    }

    pub fn is_endpoint(&self, kind: EquipmentKind) -> bool {
        self.endpoint_kinds.contains(&kind)
    }

    pub fn is_series_pass(&self, kind: EquipmentKind) -> bool {
        self.series_pass_kinds.contains(&kind)
    }
}
