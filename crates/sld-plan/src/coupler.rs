//! Bus-coupler detection: a breaker or disconnector touching two buses of
//! the same voltage level.

use std::sync::Arc;

use sld_core::Diagnostics;

use crate::graph::{EquipmentKind, NodeKind, SldGraph};

/// A switching element joining two buses of one `(ss, vl)`.
#[derive(Debug, Clone)]
pub struct BusCoupler {
    pub equipment_id: String,
    pub bus_a: String,
    pub bus_b: String,
    pub is_breaker: bool,
    pub ss: Arc<str>,
    pub vl: Arc<str>,
}

/// Detect couplers on the condensed graph. Candidate bus IDs are sorted
/// lexicographically before the pair is picked, keeping output stable; a
/// switch touching three or more buses is flagged.
pub fn detect_couplers(condensed: &SldGraph, diag: &mut Diagnostics) -> Vec<BusCoupler> {
    let mut couplers = Vec::new();

    for idx in condensed.node_indices() {
        let node = &condensed.graph[idx];
        if node.kind != NodeKind::Equipment || !node.equipment_kind.is_switching() {
            continue;
        }

        let buses = condensed.neighbor_ids_of_kind(idx, NodeKind::Bus);
        if buses.len() < 2 {
            continue;
        }
        let same_vl = buses.iter().all(|id| {
            condensed
                .node(id)
                .map(|b| b.ss == node.ss && b.vl == node.vl)
                .unwrap_or(false)
        });
        if !same_vl {
            continue;
        }

        if buses.len() > 2 {
            diag.warn_at(
                "coupler",
                format!(
                    "{} touches {} buses; only {} and {} are recorded",
                    node.id,
                    buses.len(),
                    buses[0],
                    buses[1]
                ),
                "Bay.ConductingEquipment",
            );
        }

        couplers.push(BusCoupler {
            equipment_id: node.id.clone(),
            bus_a: buses[0].clone(),
            bus_b: buses[1].clone(),
            is_breaker: node.equipment_kind == EquipmentKind::CB,
            ss: Arc::clone(&node.ss),
            vl: Arc::clone(&node.vl),
        });
    }

    couplers
}
