//! Raw bipartite graph: one node per connectivity node, one per conducting
//! equipment, one edge per wired terminal.
//!
//! Terminal references resolve through the [`SclIndex`] in priority order:
//! an absolute path (exact node, logical key of the path tail, then the
//! scoped CN match), a local name within the bay or voltage level, otherwise
//! the terminal is skipped. A reference that resolves to no declared CN
//! synthesizes one; synthesized CNs carry no backing declaration but are
//! first-class nodes from then on.

use std::sync::Arc;

use sld_core::{CeLocation, CnLocation, Interner, SclModel};
use sld_scl::index::{cn_full_path, suffix_of};
use sld_scl::SclIndex;
use tracing::debug;

use crate::graph::{
    ids, EdgeKind, EquipmentKind, NodeKind, NodeOrigin, SldEdge, SldGraph, SldNode,
};

/// Build the raw CE↔CN graph for the whole model.
pub fn build_raw_graph(model: &SclModel, index: &SclIndex, interner: &mut Interner) -> SldGraph {
    let mut graph = SldGraph::new();

    // First pass: declared connectivity nodes, under the same full-path
    // keys the index uses.
    for (si, ss) in model.substations.iter().enumerate() {
        let ss_name = interner.intern(&ss.name);
        for (vi, vl) in ss.voltage_levels.iter().enumerate() {
            let vl_name = interner.intern(&vl.name);
            for (bi, bay) in vl.bays.iter().enumerate() {
                let bay_name = interner.intern(&bay.name);
                for (ci, cn) in bay.connectivity_nodes.iter().enumerate() {
                    let path = cn_full_path(&ss.name, &vl.name, &bay.name, &cn.name, &cn.path_name);
                    graph.add_node(SldNode {
                        id: ids::cn(&path),
                        kind: NodeKind::ConnectivityNode,
                        equipment_kind: EquipmentKind::Unknown,
                        ss: Arc::clone(&ss_name),
                        vl: Arc::clone(&vl_name),
                        bay: Arc::clone(&bay_name),
                        label: cn.name.clone(),
                        lnodes: vec![],
                        origin: NodeOrigin::DeclaredCn(CnLocation {
                            substation: si,
                            voltage_level: vi,
                            bay: bi,
                            cn: ci,
                        }),
                    });
                }
            }
        }
    }

    // Second pass: equipment nodes and terminal edges.
    for (si, ss) in model.substations.iter().enumerate() {
        let ss_name = interner.intern(&ss.name);
        for (vi, vl) in ss.voltage_levels.iter().enumerate() {
            let vl_name = interner.intern(&vl.name);
            for (bi, bay) in vl.bays.iter().enumerate() {
                let bay_name = interner.intern(&bay.name);
                for (ei, ce) in bay.equipments.iter().enumerate() {
                    let ce_id = ids::ce(&ss.name, &vl.name, &bay.name, &ce.name);
                    graph.add_node(SldNode {
                        id: ce_id.clone(),
                        kind: NodeKind::Equipment,
                        equipment_kind: EquipmentKind::from_scl_type(&ce.element_type),
                        ss: Arc::clone(&ss_name),
                        vl: Arc::clone(&vl_name),
                        bay: Arc::clone(&bay_name),
                        label: ce.name.clone(),
                        lnodes: ce.lnodes.clone(),
                        origin: NodeOrigin::Equipment(CeLocation {
                            substation: si,
                            voltage_level: vi,
                            bay: bi,
                            equipment: ei,
                        }),
                    });

                    for terminal in &ce.terminals {
                        let cn_path = if !terminal.connectivity_node_ref.is_empty() {
                            resolve_by_path(
                                &mut graph,
                                index,
                                interner,
                                &terminal.connectivity_node_ref,
                                (&ss_name, &vl_name, &bay_name),
                            )
                        } else if !terminal.c_node_name.is_empty() {
                            Some(resolve_by_name(
                                &mut graph,
                                index,
                                &terminal.c_node_name,
                                (&ss_name, &vl_name, &bay_name),
                            ))
                        } else {
                            None // legitimately unwired
                        };

                        if let Some(path) = cn_path {
                            let cn_id = ids::cn(&path);
                            let seq = graph.edge_count();
                            graph.add_edge(SldEdge {
                                id: ids::edge(seq, &ce_id, &cn_id),
                                from: ce_id.clone(),
                                to: cn_id,
                                kind: EdgeKind::CeToCn,
                                terminal: terminal.name.clone(),
                                cn_path: path,
                            });
                        }
                    }
                }
            }
        }
    }

    debug!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        "raw graph built"
    );
    graph
}

/// Priority 1: absolute reference. Known spellings hit the graph directly;
/// other spellings of a declared CN resolve through the index (logical key
/// of the path tail, then the scoped CN match). A full miss synthesizes a
/// CN from the path segments, falling back to the current bay context for
/// short paths.
fn resolve_by_path(
    graph: &mut SldGraph,
    index: &SclIndex,
    interner: &mut Interner,
    reference: &str,
    context: (&Arc<str>, &Arc<str>, &Arc<str>),
) -> Option<String> {
    if graph.contains(&ids::cn(reference)) {
        return Some(reference.to_string());
    }
    if let Some(path) = declared_path_for(index, reference) {
        return Some(path.to_string());
    }

    let segments: Vec<&str> = reference.split('/').filter(|s| !s.is_empty()).collect();
    let name = (*segments.last()?).to_string();
    let (ss, vl, bay) = if segments.len() >= 4 {
        let n = segments.len();
        (
            interner.intern(segments[n - 4]),
            interner.intern(segments[n - 3]),
            interner.intern(segments[n - 2]),
        )
    } else {
        (
            Arc::clone(context.0),
            Arc::clone(context.1),
            Arc::clone(context.2),
        )
    };

    graph.add_node(SldNode {
        id: ids::cn(reference),
        kind: NodeKind::ConnectivityNode,
        equipment_kind: EquipmentKind::Unknown,
        ss,
        vl,
        bay,
        label: name,
        lnodes: vec![],
        origin: NodeOrigin::SynthesizedCn,
    });
    Some(reference.to_string())
}

/// Declared full path behind an arbitrary path spelling.
fn declared_path_for<'a>(index: &'a SclIndex, reference: &str) -> Option<&'a str> {
    if let Some(location) = index.location_of(reference) {
        return index.declared_path(location);
    }
    index
        .cn_by_suffix
        .get(suffix_of(reference))?
        .iter()
        .find(|candidate| index.cn_matches(reference, candidate))
        .map(String::as_str)
}

/// Priority 2: local name. The composed path finds a declaration in the
/// current bay through the index; the scoped CN match widens the search to
/// the rest of the voltage level. A miss synthesizes a CN in the current
/// bay (re-mentions of the same name dedupe on the node ID).
fn resolve_by_name(
    graph: &mut SldGraph,
    index: &SclIndex,
    name: &str,
    context: (&Arc<str>, &Arc<str>, &Arc<str>),
) -> String {
    let (ss, vl, bay) = context;
    let composed = format!("{ss}/{vl}/{bay}/{name}");
    if let Some(path) = declared_path_for(index, &composed) {
        return path.to_string();
    }

    graph.add_node(SldNode {
        id: ids::cn(&composed),
        kind: NodeKind::ConnectivityNode,
        equipment_kind: EquipmentKind::Unknown,
        ss: Arc::clone(ss),
        vl: Arc::clone(vl),
        bay: Arc::clone(bay),
        label: name.to_string(),
        lnodes: vec![],
        origin: NodeOrigin::SynthesizedCn,
    });
    composed
}
