//! Graph container shared by the raw and condensed stages.
//!
//! Nodes and edges live in a petgraph `Undirected` graph; a side map from
//! stable string IDs to node indices makes the IDs the public-facing
//! references (graph nodes address their originating domain entity through
//! arena index paths, never through borrows). Edge iteration follows
//! insertion order, which downstream stages rely on for determinism.

use std::collections::HashMap;
use std::sync::Arc;

use petgraph::graph::{EdgeIndex, Graph, NodeIndex};
use petgraph::Undirected;
use sld_core::{CeLocation, CnLocation, LNodeRef};

/// Node category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    ConnectivityNode,
    Bus,
    Equipment,
    Junction,
}

impl NodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::ConnectivityNode => "ConnectivityNode",
            NodeKind::Bus => "Bus",
            NodeKind::Equipment => "Equipment",
            NodeKind::Junction => "Junction",
        }
    }
}

/// Semantic class of a conducting equipment, derived from its SCL `type`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum EquipmentKind {
    #[default]
    Unknown,
    CB,
    DS,
    ES,
    CT,
    VT,
    PT,
    Transformer,
    Line,
    Cable,
    BusbarSection,
}

impl EquipmentKind {
    /// Map a free-text SCL `type` attribute to a kind. Matching is on the
    /// trimmed, upper-cased string.
    pub fn from_scl_type(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "CBR" | "CB" | "BREAKER" | "XCBR" => EquipmentKind::CB,
            "DIS" | "DS" | "DISCONNECTOR" | "XSWI" | "SWITCH" => EquipmentKind::DS,
            "ES" | "EARTHSWITCH" | "EGND" => EquipmentKind::ES,
            "CTR" | "CT" | "TCTR" | "CURRENTTRANSFORMER" => EquipmentKind::CT,
            "VTR" | "VT" | "PT" | "TVTR" | "VOLTAGETRANSFORMER" => EquipmentKind::VT,
            "PTR" | "POWERTRANSFORMER" | "TRF" | "TRANSFORMER" => EquipmentKind::Transformer,
            "LINE" | "FEEDER" => EquipmentKind::Line,
            "CABLE" => EquipmentKind::Cable,
            "BUSBAR" | "BUSBARSECTION" | "BBS" => EquipmentKind::BusbarSection,
            _ => EquipmentKind::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EquipmentKind::Unknown => "Unknown",
            EquipmentKind::CB => "CB",
            EquipmentKind::DS => "DS",
            EquipmentKind::ES => "ES",
            EquipmentKind::CT => "CT",
            EquipmentKind::VT => "VT",
            EquipmentKind::PT => "PT",
            EquipmentKind::Transformer => "Transformer",
            EquipmentKind::Line => "Line",
            EquipmentKind::Cable => "Cable",
            EquipmentKind::BusbarSection => "BusbarSection",
        }
    }

    /// Breakers and disconnectors, the candidates for bus couplers.
    pub fn is_switching(self) -> bool {
        matches!(self, EquipmentKind::CB | EquipmentKind::DS)
    }
}

/// Edge category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    CeToCn,
    EquipToBus,
    CnMerge,
}

impl EdgeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EdgeKind::CeToCn => "CE_to_CN",
            EdgeKind::EquipToBus => "Equip_to_Bus",
            EdgeKind::CnMerge => "CN_Merge",
        }
    }
}

/// Where a graph node came from in the domain model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeOrigin {
    /// A connectivity node declared in a bay.
    DeclaredCn(CnLocation),
    /// A connectivity node synthesized from a terminal reference with no
    /// matching declaration.
    SynthesizedCn,
    /// A conducting equipment.
    Equipment(CeLocation),
    /// A bus cluster (no single backing entity).
    BusCluster,
    /// A declared power transformer (substation, transformer indices).
    PowerTransformer(usize, usize),
}

/// A graph node. `ss`/`vl`/`bay` are interned handles into the session pool.
#[derive(Debug, Clone)]
pub struct SldNode {
    pub id: String,
    pub kind: NodeKind,
    pub equipment_kind: EquipmentKind,
    pub ss: Arc<str>,
    pub vl: Arc<str>,
    pub bay: Arc<str>,
    pub label: String,
    pub lnodes: Vec<LNodeRef>,
    pub origin: NodeOrigin,
}

/// A graph edge. `from`/`to` repeat the endpoint IDs for serialization.
#[derive(Debug, Clone)]
pub struct SldEdge {
    pub id: String,
    pub from: String,
    pub to: String,
    pub kind: EdgeKind,
    pub terminal: String,
    pub cn_path: String,
}

/// Undirected graph with stable string node IDs.
#[derive(Debug, Default)]
pub struct SldGraph {
    pub graph: Graph<SldNode, SldEdge, Undirected>,
    by_id: HashMap<String, NodeIndex>,
}

impl SldGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node, or return the existing index when the ID is taken.
    pub fn add_node(&mut self, node: SldNode) -> NodeIndex {
        if let Some(&existing) = self.by_id.get(&node.id) {
            return existing;
        }
        let id = node.id.clone();
        let idx = self.graph.add_node(node);
        self.by_id.insert(id, idx);
        idx
    }

    /// Insert an edge between two existing nodes; unknown endpoints are
    /// refused (the caller resolved them first).
    pub fn add_edge(&mut self, edge: SldEdge) -> Option<EdgeIndex> {
        let from = *self.by_id.get(&edge.from)?;
        let to = *self.by_id.get(&edge.to)?;
        Some(self.graph.add_edge(from, to, edge))
    }

    pub fn node_index(&self, id: &str) -> Option<NodeIndex> {
        self.by_id.get(id).copied()
    }

    pub fn node(&self, id: &str) -> Option<&SldNode> {
        self.node_index(id).map(|idx| &self.graph[idx])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    /// Number of incident edges (parallel edges counted individually).
    pub fn degree(&self, idx: NodeIndex) -> usize {
        self.graph.edges(idx).count()
    }

    /// Distinct neighbor IDs of `idx` with the given node kind, sorted.
    pub fn neighbor_ids_of_kind(&self, idx: NodeIndex, kind: NodeKind) -> Vec<String> {
        let mut ids: Vec<String> = self
            .graph
            .neighbors(idx)
            .filter(|&n| self.graph[n].kind == kind)
            .map(|n| self.graph[n].id.clone())
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    /// Node indices in insertion order.
    pub fn node_indices(&self) -> impl Iterator<Item = NodeIndex> {
        self.graph.node_indices()
    }

    /// Edges in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = &SldEdge> {
        self.graph.edge_weights()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}

/// Stable-ID factory for graph entities.
pub mod ids {
    /// `CN:<abs-path>`
    pub fn cn(path: &str) -> String {
        format!("CN:{path}")
    }

    /// `CE:<ss>/<vl>/<bay>/<name>`
    pub fn ce(ss: &str, vl: &str, bay: &str, name: &str) -> String {
        format!("CE:{ss}/{vl}/{bay}/{name}")
    }

    /// `TR:<ss>/<name>`
    pub fn tr(ss: &str, name: &str) -> String {
        format!("TR:{ss}/{name}")
    }

    /// `BUS:<ss>/<vl>/cluster#<k>`
    pub fn bus(ss: &str, vl: &str, k: usize) -> String {
        format!("BUS:{ss}/{vl}/cluster#{k}")
    }

    /// `FEED:<bus-id>#<n>`
    pub fn feeder(bus_id: &str, n: usize) -> String {
        format!("FEED:{bus_id}#{n}")
    }

    /// `FEED:<bus-id>#TR#<tname>#<k>` for synthetic transformer feeders.
    pub fn feeder_tr(bus_id: &str, transformer: &str, k: usize) -> String {
        format!("FEED:{bus_id}#TR#{transformer}#{k}")
    }

    /// Rank/lane key `"<ss>:<vl>"`.
    pub fn vl_key(ss: &str, vl: &str) -> String {
        format!("{ss}:{vl}")
    }

    /// Sequenced edge ID.
    pub fn edge(seq: usize, from: &str, to: &str) -> String {
        format!("E{seq}:{from}->{to}")
    }
}
