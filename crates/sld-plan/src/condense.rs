//! Condensation: equipment nodes carried forward, bus nodes materialized,
//! CE→CN edges into clustered CNs rewritten as equipment→bus edges.
//!
//! Edges to non-bus CNs are dropped here; the feeder walker reads them from
//! the raw graph instead.

use std::sync::Arc;

use crate::cluster::BusClusters;
use crate::graph::{
    ids, EdgeKind, EquipmentKind, NodeKind, NodeOrigin, SldEdge, SldGraph, SldNode,
};

/// Produce the condensed equipment↔bus graph.
pub fn condense(raw: &SldGraph, clusters: &BusClusters) -> SldGraph {
    let mut condensed = SldGraph::new();

    for idx in raw.node_indices() {
        let node = &raw.graph[idx];
        if node.kind == NodeKind::Equipment {
            condensed.add_node(node.clone());
        }
    }

    for cluster in &clusters.clusters {
        condensed.add_node(SldNode {
            id: cluster.bus_node_id.clone(),
            kind: NodeKind::Bus,
            equipment_kind: EquipmentKind::Unknown,
            ss: Arc::clone(&cluster.ss),
            vl: Arc::clone(&cluster.vl),
            bay: Arc::from(""),
            label: cluster.label.clone(),
            lnodes: vec![],
            origin: NodeOrigin::BusCluster,
        });
    }

    for edge in raw.edges() {
        if edge.kind != EdgeKind::CeToCn {
            continue;
        }
        let Some(cluster_pos) = clusters.cluster_of(&edge.to) else {
            continue;
        };
        let bus_id = clusters.clusters[cluster_pos].bus_node_id.clone();
        let seq = condensed.edge_count();
        condensed.add_edge(SldEdge {
            id: ids::edge(seq, &edge.from, &bus_id),
            from: edge.from.clone(),
            to: bus_id,
            kind: EdgeKind::EquipToBus,
            terminal: edge.terminal.clone(),
            cn_path: edge.cn_path.clone(),
        });
    }

    condensed
}
