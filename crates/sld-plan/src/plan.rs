//! The synthesized plan: condensed graph plus detected structures, ordered
//! deterministically.

use std::collections::BTreeMap;

use crate::cluster::BusCluster;
use crate::coupler::BusCoupler;
use crate::feeder::Feeder;
use crate::graph::{ids, NodeKind, SldGraph};
use crate::transformer::{PlanTransformer, TransformerLink};

/// Result of a build: everything a renderer needs, minus geometry.
#[derive(Debug, Default)]
pub struct SldPlan {
    /// Equipment↔bus graph (including synthetic transformer nodes).
    pub condensed: SldGraph,
    /// Bus clusters, sorted by `(vl, label)`.
    pub buses: Vec<BusCluster>,
    pub feeders: Vec<Feeder>,
    pub couplers: Vec<BusCoupler>,
    pub transformers: Vec<TransformerLink>,
    pub plan_transformers: Vec<PlanTransformer>,
    /// `"ss:vl"` → bus node IDs in sorted-bus order.
    pub rank_top_bus: BTreeMap<String, Vec<String>>,
    /// `"ss:vl"` → equipment node IDs in condensed insertion order.
    pub rank_middle_eq: BTreeMap<String, Vec<String>>,
}

impl SldPlan {
    /// Deterministic ordering pass: sort buses, fill rank maps, assign
    /// feeder lanes per `(ss:vl|bus)` in feeder emission order.
    pub fn order(&mut self) {
        self.buses
            .sort_by(|a, b| (&*a.vl, &a.label).cmp(&(&*b.vl, &b.label)));

        self.rank_top_bus.clear();
        for bus in &self.buses {
            self.rank_top_bus
                .entry(ids::vl_key(&bus.ss, &bus.vl))
                .or_default()
                .push(bus.bus_node_id.clone());
        }

        self.rank_middle_eq.clear();
        for idx in self.condensed.node_indices() {
            let node = &self.condensed.graph[idx];
            if node.kind == NodeKind::Equipment {
                self.rank_middle_eq
                    .entry(ids::vl_key(&node.ss, &node.vl))
                    .or_default()
                    .push(node.id.clone());
            }
        }

        let mut lanes: BTreeMap<String, usize> = BTreeMap::new();
        for feeder in &mut self.feeders {
            let key = format!(
                "{}|{}",
                ids::vl_key(&feeder.ss, &feeder.vl),
                feeder.bus_id
            );
            let lane = lanes.entry(key).or_insert(0);
            feeder.lane_index = *lane;
            *lane += 1;
        }
    }

    /// Size statistics.
    pub fn stats(&self) -> PlanStats {
        PlanStats {
            buses: self.buses.len(),
            feeders: self.feeders.len(),
            couplers: self.couplers.len(),
            transformer_links: self.transformers.len(),
            plan_transformers: self.plan_transformers.len(),
        }
    }
}

/// Counts of detected structures.
#[derive(Debug, Clone, Default)]
pub struct PlanStats {
    pub buses: usize,
    pub feeders: usize,
    pub couplers: usize,
    pub transformer_links: usize,
    pub plan_transformers: usize,
}

impl std::fmt::Display for PlanStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} buses, {} feeders, {} couplers, {} transformer links",
            self.buses, self.feeders, self.couplers, self.transformer_links
        )
    }
}
