//! Transformer handling: links between buses, and integration of declared
//! power transformers as synthetic feeders.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use sld_core::SclModel;
use tracing::debug;

use crate::cluster::BusClusters;
use crate::feeder::Feeder;
use crate::graph::{
    ids, EdgeKind, EquipmentKind, NodeKind, NodeOrigin, SldEdge, SldGraph, SldNode,
};

/// A transformer equipment bridging two buses, possibly across voltage
/// levels.
#[derive(Debug, Clone)]
pub struct TransformerLink {
    pub transformer_id: String,
    pub bus_a: String,
    pub bus_b: String,
    pub ss_a: Arc<str>,
    pub vl_a: Arc<str>,
    pub ss_b: Arc<str>,
    pub vl_b: Arc<str>,
}

/// Summary of a declared power transformer in the plan.
#[derive(Debug, Clone)]
pub struct PlanTransformer {
    /// `TR:<ss>/<name>`
    pub id: String,
    pub ss: String,
    pub label: String,
    pub has_tap_changer: bool,
    /// Every bus a winding terminal resolved to, in discovery order.
    pub buses: Vec<String>,
}

/// Detect transformer equipment whose CNs fall into two or more clusters.
/// Bus IDs are sorted lexicographically before the pair is picked.
pub fn detect_transformer_links(raw: &SldGraph, clusters: &BusClusters) -> Vec<TransformerLink> {
    let mut links = Vec::new();

    for idx in raw.node_indices() {
        let node = &raw.graph[idx];
        if node.kind != NodeKind::Equipment || node.equipment_kind != EquipmentKind::Transformer {
            continue;
        }

        let mut buses: Vec<String> = raw
            .graph
            .neighbors(idx)
            .filter(|&n| raw.graph[n].kind == NodeKind::ConnectivityNode)
            .filter_map(|n| clusters.cluster_of(&raw.graph[n].id))
            .map(|pos| clusters.clusters[pos].bus_node_id.clone())
            .collect();
        buses.sort();
        buses.dedup();
        if buses.len() < 2 {
            continue;
        }

        let a = clusters.cluster_by_bus_id(&buses[0]);
        let b = clusters.cluster_by_bus_id(&buses[1]);
        let (Some(a), Some(b)) = (a, b) else { continue };
        links.push(TransformerLink {
            transformer_id: node.id.clone(),
            bus_a: buses[0].clone(),
            bus_b: buses[1].clone(),
            ss_a: Arc::clone(&a.ss),
            vl_a: Arc::clone(&a.vl),
            ss_b: Arc::clone(&b.ss),
            vl_b: Arc::clone(&b.vl),
        });
    }

    links
}

/// Integrate declared power transformers: locate the bus behind each winding
/// terminal (exact resolved-end match first, then CN suffix fallback scoped
/// to the substation), emit one synthetic `Transformer`-endpoint feeder per
/// hit, and summarize each transformer. Transformer nodes and their bus
/// edges are added to the condensed graph so feeder-chain adjacency holds
/// for synthetics too.
pub fn integrate_power_transformers(
    model: &SclModel,
    clusters: &BusClusters,
    condensed: &mut SldGraph,
    feeders: &mut Vec<Feeder>,
) -> Vec<PlanTransformer> {
    let mut plan_transformers = Vec::new();
    let mut emitted_ids: HashSet<String> = feeders.iter().map(|f| f.id.clone()).collect();

    for (si, ss) in model.substations.iter().enumerate() {
        for (ti, transformer) in ss.power_transformers.iter().enumerate() {
            let tr_id = ids::tr(&ss.name, &transformer.name);
            let mut buses_touched: Vec<String> = Vec::new();
            let mut per_bus_k: HashMap<String, usize> = HashMap::new();

            for winding in &transformer.windings {
                for end in &winding.resolved_ends {
                    let Some(cluster_pos) = locate_bus(clusters, end) else {
                        continue;
                    };
                    let cluster = &clusters.clusters[cluster_pos];
                    let bus_id = cluster.bus_node_id.clone();

                    let k = per_bus_k.entry(bus_id.clone()).or_insert(0);
                    let feeder_id = ids::feeder_tr(&bus_id, &transformer.name, *k);
                    *k += 1;

                    if emitted_ids.insert(feeder_id.clone()) {
                        feeders.push(Feeder {
                            id: feeder_id,
                            ss: Arc::clone(&cluster.ss),
                            vl: Arc::clone(&cluster.vl),
                            bus_id: bus_id.clone(),
                            chain: vec![tr_id.clone()],
                            endpoint_type: EquipmentKind::Transformer,
                            lane_index: 0,
                        });
                    }
                    if !buses_touched.contains(&bus_id) {
                        buses_touched.push(bus_id);
                    }
                }
            }

            if !buses_touched.is_empty() {
                attach_transformer_node(
                    condensed,
                    clusters,
                    &tr_id,
                    &transformer.name,
                    (si, ti),
                    &buses_touched,
                );
            }

            plan_transformers.push(PlanTransformer {
                id: tr_id,
                ss: ss.name.clone(),
                label: transformer.name.clone(),
                has_tap_changer: transformer.has_tap_changer(),
                buses: buses_touched,
            });
        }
    }

    debug!(
        transformers = plan_transformers.len(),
        "power transformers integrated"
    );
    plan_transformers
}

/// Bus cluster for a resolved winding end: exact CN-id match first, then
/// suffix equality scoped to the substation.
fn locate_bus(clusters: &BusClusters, end: &sld_core::ResolvedEnd) -> Option<usize> {
    if !end.vl.is_empty() && !end.bay.is_empty() {
        let exact = ids::cn(&format!("{}/{}/{}/{}", end.ss, end.vl, end.bay, end.cn));
        if let Some(pos) = clusters.cluster_of(&exact) {
            return Some(pos);
        }
    }
    if end.cn.is_empty() {
        return None;
    }
    clusters.clusters.iter().position(|cluster| {
        cluster.ss.as_ref() == end.ss
            && cluster
                .cn_members
                .iter()
                .any(|member| member.rsplit('/').next() == Some(end.cn.as_str()))
    })
}

fn attach_transformer_node(
    condensed: &mut SldGraph,
    clusters: &BusClusters,
    tr_id: &str,
    label: &str,
    origin: (usize, usize),
    buses: &[String],
) {
    let ss = clusters
        .cluster_by_bus_id(&buses[0])
        .map(|c| Arc::clone(&c.ss))
        .unwrap_or_else(|| Arc::from(""));
    condensed.add_node(SldNode {
        id: tr_id.to_string(),
        kind: NodeKind::Equipment,
        equipment_kind: EquipmentKind::Transformer,
        ss,
        vl: Arc::from(""),
        bay: Arc::from(""),
        label: label.to_string(),
        lnodes: vec![],
        origin: NodeOrigin::PowerTransformer(origin.0, origin.1),
    });
    for bus in buses {
        let seq = condensed.edge_count();
        condensed.add_edge(SldEdge {
            id: ids::edge(seq, tr_id, bus),
            from: tr_id.to_string(),
            to: bus.clone(),
            kind: EdgeKind::EquipToBus,
            terminal: String::new(),
            cn_path: String::new(),
        });
    }
}
