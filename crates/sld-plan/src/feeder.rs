//! Feeder walking: outward radial chains from bus-attached equipment.
//!
//! From each bus-attached equipment that is not a coupler, the walk leaves
//! the bus through a non-bus CN and follows the unique continuation until an
//! endpoint kind (line, cable, transformer), a junction, a dead end, or the
//! depth limit. Candidate starts and every "first of several" pick are
//! sorted by ID so chains and lane order are reproducible.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use crate::cluster::BusClusters;
use crate::config::Heuristics;
use crate::graph::{ids, EquipmentKind, NodeKind, SldGraph};

/// An outward chain of equipment from a bus.
#[derive(Debug, Clone)]
pub struct Feeder {
    pub id: String,
    pub ss: Arc<str>,
    pub vl: Arc<str>,
    pub bus_id: String,
    /// Equipment node IDs; the first is bus-adjacent.
    pub chain: Vec<String>,
    /// `Line`, `Cable` or `Transformer` when the chain terminates on one.
    pub endpoint_type: EquipmentKind,
    /// Position among the feeders of the same `(ss, vl, bus)`.
    pub lane_index: usize,
}

/// Walk all feeders. Lane indexes are assigned later, over walked and
/// synthetic feeders together.
pub fn walk_feeders(
    raw: &SldGraph,
    condensed: &SldGraph,
    clusters: &BusClusters,
    cfg: &Heuristics,
) -> Vec<Feeder> {
    let mut starts: Vec<String> = condensed
        .node_indices()
        .filter(|&idx| {
            let node = &condensed.graph[idx];
            node.kind == NodeKind::Equipment
                && !condensed.neighbor_ids_of_kind(idx, NodeKind::Bus).is_empty()
        })
        .map(|idx| condensed.graph[idx].id.clone())
        .collect();
    starts.sort();

    let mut feeders = Vec::new();
    let mut per_bus: std::collections::HashMap<String, usize> = std::collections::HashMap::new();

    for start_id in starts {
        let Some(cond_idx) = condensed.node_index(&start_id) else {
            continue;
        };
        let start = &condensed.graph[cond_idx];
        let buses = condensed.neighbor_ids_of_kind(cond_idx, NodeKind::Bus);

        // Couplers are not feeder heads.
        if start.equipment_kind.is_switching() && buses.len() >= 2 {
            continue;
        }
        let entry_bus = buses[0].clone();

        let Some(raw_idx) = raw.node_index(&start_id) else {
            continue;
        };
        let Some(outward) = first_outward_cn(raw, clusters, raw_idx, &HashSet::new()) else {
            continue;
        };

        let mut chain = vec![start_id.clone()];
        let mut visited_ce: HashSet<String> = HashSet::from([start_id.clone()]);
        let mut visited_cn: HashSet<String> = HashSet::from([outward.clone()]);
        let mut current_cn = outward;
        let mut endpoint = EquipmentKind::Unknown;

        for _ in 0..cfg.feeder_max_depth {
            let Some(next_id) =
                unique_continuation(raw, condensed, &current_cn, &visited_ce, &entry_bus)
            else {
                break;
            };
            chain.push(next_id.clone());
            visited_ce.insert(next_id.clone());

            let kind = raw
                .node(&next_id)
                .map(|n| n.equipment_kind)
                .unwrap_or_default();
            if cfg.is_endpoint(kind) {
                endpoint = kind;
                break;
            }

            let Some(next_idx) = raw.node_index(&next_id) else {
                break;
            };
            let Some(next_cn) = first_outward_cn(raw, clusters, next_idx, &visited_cn) else {
                break;
            };
            visited_cn.insert(next_cn.clone());
            current_cn = next_cn;
        }

        if chain.len() == 1 && cfg.is_endpoint(start.equipment_kind) {
            endpoint = start.equipment_kind;
        }

        let n = per_bus.entry(entry_bus.clone()).or_insert(0);
        let feeder_id = ids::feeder(&entry_bus, *n);
        *n += 1;

        feeders.push(Feeder {
            id: feeder_id,
            ss: Arc::clone(&start.ss),
            vl: Arc::clone(&start.vl),
            bus_id: entry_bus,
            chain,
            endpoint_type: endpoint,
            lane_index: 0,
        });
    }

    debug!(feeders = feeders.len(), "feeder walk complete");
    feeders
}

/// First (by ID) CN neighbor of `idx` that is neither visited nor part of a
/// bus cluster.
fn first_outward_cn(
    raw: &SldGraph,
    clusters: &BusClusters,
    idx: petgraph::graph::NodeIndex,
    visited: &HashSet<String>,
) -> Option<String> {
    let mut candidates: Vec<String> = raw
        .graph
        .neighbors(idx)
        .filter(|&n| raw.graph[n].kind == NodeKind::ConnectivityNode)
        .map(|n| raw.graph[n].id.clone())
        .filter(|id| !visited.contains(id) && clusters.cluster_of(id).is_none())
        .collect();
    candidates.sort();
    candidates.dedup();
    candidates.into_iter().next()
}

/// The unique unvisited equipment on `cn_id` whose bus adjacency stays
/// within the entry bus. Zero or several candidates end the chain.
fn unique_continuation(
    raw: &SldGraph,
    condensed: &SldGraph,
    cn_id: &str,
    visited_ce: &HashSet<String>,
    entry_bus: &str,
) -> Option<String> {
    let cn_idx = raw.node_index(cn_id)?;
    let mut candidates: Vec<String> = raw
        .graph
        .neighbors(cn_idx)
        .filter(|&n| raw.graph[n].kind == NodeKind::Equipment)
        .map(|n| raw.graph[n].id.clone())
        .filter(|id| !visited_ce.contains(id))
        .filter(|id| {
            condensed
                .node_index(id)
                .map(|idx| {
                    condensed
                        .neighbor_ids_of_kind(idx, NodeKind::Bus)
                        .iter()
                        .all(|bus| bus == entry_bus)
                })
                .unwrap_or(true)
        })
        .collect();
    candidates.sort();
    candidates.dedup();
    if candidates.len() == 1 {
        candidates.pop()
    } else {
        None
    }
}
