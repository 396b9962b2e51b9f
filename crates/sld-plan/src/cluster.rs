//! Bus identification and clustering.
//!
//! A CN is bus-like when its terminal degree reaches the threshold, when its
//! path or name carries a bus hint, or when a busbar-section equipment sits
//! next to it. Bus CNs connected through busbar sections or disconnectors
//! within one voltage level merge into a single cluster (an isolator between
//! two bus sections is intra-bus, not a coupler). Merges that would span
//! voltage levels are rejected with a diagnostic.

use std::collections::HashMap;
use std::sync::Arc;

use petgraph::unionfind::UnionFind;
use sld_core::Diagnostics;
use tracing::debug;

use crate::config::Heuristics;
use crate::graph::{ids, EquipmentKind, NodeKind, SldGraph};

/// A merged set of bus CNs within one voltage level.
#[derive(Debug, Clone)]
pub struct BusCluster {
    pub ss: Arc<str>,
    pub vl: Arc<str>,
    /// CN node IDs, in raw-graph insertion order.
    pub cn_members: Vec<String>,
    /// ID of the bus node materialized in the condensed graph.
    pub bus_node_id: String,
    pub label: String,
}

/// All clusters of a build, plus the CN-to-cluster membership map.
#[derive(Debug, Default)]
pub struct BusClusters {
    pub clusters: Vec<BusCluster>,
    membership: HashMap<String, usize>,
}

impl BusClusters {
    /// Cluster position for a CN node ID, if the CN is part of a bus.
    pub fn cluster_of(&self, cn_id: &str) -> Option<usize> {
        self.membership.get(cn_id).copied()
    }

    /// Cluster behind a bus node ID.
    pub fn cluster_by_bus_id(&self, bus_id: &str) -> Option<&BusCluster> {
        self.clusters.iter().find(|c| c.bus_node_id == bus_id)
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }
}

/// Identify bus-like CNs and merge them into clusters.
pub fn find_clusters(
    raw: &SldGraph,
    cfg: &Heuristics,
    diag: &mut Diagnostics,
) -> BusClusters {
    // 1. Mark bus-like CNs.
    let mut is_bus = vec![false; raw.graph.node_count()];
    for idx in raw.node_indices() {
        let node = &raw.graph[idx];
        if node.kind != NodeKind::ConnectivityNode {
            continue;
        }
        let path_upper = node.id["CN:".len()..].to_ascii_uppercase();
        let bus_like = raw.degree(idx) >= cfg.bus_degree_threshold
            || cfg.has_bus_hint(&path_upper)
            || raw
                .graph
                .neighbors(idx)
                .any(|n| raw.graph[n].equipment_kind == EquipmentKind::BusbarSection);
        is_bus[idx.index()] = bus_like;
    }

    // 2. Union bus CNs bridged by busbar sections or disconnectors.
    let mut uf = UnionFind::<usize>::new(raw.graph.node_count());
    for idx in raw.node_indices() {
        let node = &raw.graph[idx];
        if node.kind != NodeKind::Equipment
            || !matches!(
                node.equipment_kind,
                EquipmentKind::BusbarSection | EquipmentKind::DS
            )
        {
            continue;
        }
        let mut bus_neighbors: Vec<_> = raw
            .graph
            .neighbors(idx)
            .filter(|&n| is_bus[n.index()])
            .collect();
        bus_neighbors.sort();
        bus_neighbors.dedup();
        let Some((&first, rest)) = bus_neighbors.split_first() else {
            continue;
        };
        for &other in rest {
            let a = &raw.graph[first];
            let b = &raw.graph[other];
            if a.ss != b.ss || a.vl != b.vl {
                diag.warn_at(
                    "cluster",
                    format!(
                        "Refusing to merge bus CNs across voltage levels: {} and {} (via {})",
                        a.id, b.id, node.id
                    ),
                    "Bay.ConductingEquipment",
                );
                continue;
            }
            uf.union(first.index(), other.index());
        }
    }

    // 3. Materialize one cluster per disjoint set, numbering from 1 in
    //    insertion order of the first member seen.
    let mut result = BusClusters::default();
    let mut cluster_of_root: HashMap<usize, usize> = HashMap::new();
    for idx in raw.node_indices() {
        if !is_bus[idx.index()] {
            continue;
        }
        let node = &raw.graph[idx];
        let root = uf.find(idx.index());
        let cluster_pos = match cluster_of_root.get(&root) {
            Some(&pos) => pos,
            None => {
                let k = result.clusters.len() + 1;
                let suffix = node.id.rsplit('/').next().unwrap_or(&node.id);
                result.clusters.push(BusCluster {
                    ss: Arc::clone(&node.ss),
                    vl: Arc::clone(&node.vl),
                    cn_members: Vec::new(),
                    bus_node_id: ids::bus(&node.ss, &node.vl, k),
                    label: format!("{}-{}", node.vl, suffix),
                });
                cluster_of_root.insert(root, result.clusters.len() - 1);
                result.clusters.len() - 1
            }
        };
        result.clusters[cluster_pos].cn_members.push(node.id.clone());
        result.membership.insert(node.id.clone(), cluster_pos);
    }

    debug!(clusters = result.len(), "bus clusters identified");
    result
}
