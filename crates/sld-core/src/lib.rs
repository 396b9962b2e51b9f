//! # sld-core: SCL Domain Model
//!
//! Strongly-typed in-memory representation of an IEC 61850 SCL document,
//! shared by the ingestion crate (`sld-scl`) and the diagram-synthesis crate
//! (`sld-plan`).
//!
//! ## Design Philosophy
//!
//! The model is a plain owned tree: substations contain voltage levels,
//! voltage levels contain bays, bays contain connectivity nodes and
//! conducting equipment. IEDs and the communication section sit beside the
//! physical topology. Nothing here borrows from the XML document — the
//! parser copies what it needs and drops the DOM.
//!
//! Downstream graph structures never hold references into this tree either;
//! they address entities through index paths (see [`CnLocation`] and
//! [`ResolvedLNode`]), which keeps lifetimes out of the public API while the
//! model plays the role of the owning arena.
//!
//! ## Modules
//!
//! - [`diagnostics`] - Non-fatal issue collection
//! - [`error`] - Unified coded error type
//! - [`intern`] - Session-scoped string interner
//! - [`units`] - Scalars with IEC 61850 SI multipliers
//!
//! ## Conventions
//!
//! String maps (SCL `<Address>/<P>` blocks, sub-network properties) are
//! `BTreeMap` so every serialization of the model is deterministic.

use std::collections::BTreeMap;

use serde::Serialize;

pub mod diagnostics;
pub mod error;
pub mod intern;
pub mod units;

pub use diagnostics::{DiagnosticIssue, Diagnostics, Severity};
pub use error::{SldError, SldResult};
pub use intern::Interner;
pub use units::{ScalarWithUnit, SiMultiplier};

// ============================================================================
// Physical topology (Substation section)
// ============================================================================

/// A terminal of a conducting equipment.
///
/// A wired terminal names its connectivity node either by absolute path
/// (`connectivity_node_ref`) or by local name within the bay (`c_node_name`).
/// Both empty means the terminal is unwired and is ignored downstream.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Terminal {
    pub name: String,
    pub connectivity_node_ref: String,
    pub c_node_name: String,
}

impl Terminal {
    /// At least one of the two connectivity references is present.
    pub fn is_wired(&self) -> bool {
        !self.connectivity_node_ref.is_empty() || !self.c_node_name.is_empty()
    }
}

/// A connectivity node declared inside a bay.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConnectivityNode {
    pub name: String,
    /// Absolute path of form `"<SS>/<VL>/<BAY>/<name>"` when the document
    /// provides a `pathName` attribute.
    pub path_name: String,
}

/// Reference to an IED's logical node, attached to a primary entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LNodeRef {
    pub ied_name: String,
    pub ld_inst: String,
    pub prefix: String,
    pub ln_class: String,
    pub ln_inst: String,
}

/// A primary-process element (breaker, disconnector, transformer, ...).
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConductingEquipment {
    pub name: String,
    /// Free-text SCL `type` attribute ("CBR", "DIS", "VTR", ...).
    pub element_type: String,
    pub terminals: Vec<Terminal>,
    pub lnodes: Vec<LNodeRef>,
}

/// Named group of equipment within a voltage level.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Bay {
    pub name: String,
    pub connectivity_nodes: Vec<ConnectivityNode>,
    pub equipments: Vec<ConductingEquipment>,
    pub lnodes: Vec<LNodeRef>,
}

/// A voltage level and its bays.
#[derive(Debug, Clone, Default, Serialize)]
pub struct VoltageLevel {
    pub name: String,
    pub nom_freq: String,
    pub voltage: Option<ScalarWithUnit>,
    pub bays: Vec<Bay>,
    pub lnodes: Vec<LNodeRef>,
}

/// A terminal of a transformer winding, as written in the document.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WindingTerminal {
    pub name: String,
    pub c_node_name: String,
    /// Absolute connectivity path when present.
    pub connectivity_path: String,
    pub substation_name: String,
}

/// Tap changer attached to a winding.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TapChanger {
    pub name: String,
    pub changer_type: String,
}

/// Post-parse resolution of a winding terminal to a logical CN address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolvedEnd {
    pub ss: String,
    pub vl: String,
    pub bay: String,
    pub cn: String,
}

/// One winding of a power transformer.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TransformerWinding {
    pub name: String,
    pub winding_type: String,
    pub terminals: Vec<WindingTerminal>,
    pub tap_changer: Option<TapChanger>,
    /// One entry per terminal, filled during parsing.
    pub resolved_ends: Vec<ResolvedEnd>,
}

/// A multi-winding power transformer declared under a substation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PowerTransformer {
    pub name: String,
    pub desc: String,
    pub transformer_type: String,
    pub windings: Vec<TransformerWinding>,
}

impl PowerTransformer {
    /// Whether any winding carries a tap changer.
    pub fn has_tap_changer(&self) -> bool {
        self.windings.iter().any(|w| w.tap_changer.is_some())
    }
}

/// A substation: voltage levels plus declared power transformers.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Substation {
    pub name: String,
    pub voltage_levels: Vec<VoltageLevel>,
    pub power_transformers: Vec<PowerTransformer>,
    pub lnodes: Vec<LNodeRef>,
}

// ============================================================================
// IED section
// ============================================================================

/// A logical node inside a logical device. LN0 has an empty `inst`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LogicalNode {
    pub prefix: String,
    pub ln_class: String,
    pub inst: String,
}

/// Functionally Constrained Data Attribute reference (data set member).
#[derive(Debug, Clone, Default, Serialize)]
pub struct Fcda {
    pub ld_inst: String,
    pub ln_class: String,
    pub ln_inst: String,
    pub do_name: String,
    pub da_name: String,
    pub fc: String,
}

/// A data set declared on LN0.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DataSet {
    pub name: String,
    pub members: Vec<Fcda>,
}

/// GOOSE control block metadata on LN0.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GseControl {
    pub name: String,
    pub dataset: String,
    pub app_id: String,
}

/// Sampled-Values control block metadata on LN0.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SvControl {
    pub name: String,
    pub dataset: String,
    pub app_id: String,
    pub smp_rate: String,
}

/// Data sets and control blocks carried by a logical device's LN0.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Ln0Info {
    pub datasets: Vec<DataSet>,
    pub gse_controls: Vec<GseControl>,
    pub sv_controls: Vec<SvControl>,
}

/// A logical device.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LogicalDevice {
    pub inst: String,
    pub logical_nodes: Vec<LogicalNode>,
    pub ln0: Ln0Info,
}

impl LogicalDevice {
    /// The LN0 logical node, when declared.
    pub fn ln0_node(&self) -> Option<&LogicalNode> {
        self.logical_nodes.iter().find(|ln| ln.inst.is_empty())
    }
}

/// An access point of an IED.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AccessPoint {
    pub name: String,
    pub address: BTreeMap<String, String>,
    pub logical_devices: Vec<LogicalDevice>,
}

/// An intelligent electronic device.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Ied {
    pub name: String,
    pub manufacturer: String,
    pub ied_type: String,
    pub access_points: Vec<AccessPoint>,
    /// Logical devices found directly under `<IED>` rather than under
    /// `AccessPoint/Server` (tolerated, non-canonical placement).
    pub direct_logical_devices: Vec<LogicalDevice>,
}

impl Ied {
    /// All logical devices, canonical placement first.
    pub fn logical_devices(&self) -> impl Iterator<Item = &LogicalDevice> {
        self.access_points
            .iter()
            .flat_map(|ap| ap.logical_devices.iter())
            .chain(self.direct_logical_devices.iter())
    }

    /// Find a logical device by its `inst`.
    pub fn find_logical_device(&self, ld_inst: &str) -> Option<&LogicalDevice> {
        self.logical_devices().find(|ld| ld.inst == ld_inst)
    }
}

// ============================================================================
// Communication section
// ============================================================================

/// A GOOSE or Sampled-Values binding on a connected access point.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ControlBinding {
    pub ld_inst: String,
    pub cb_name: String,
    pub address: BTreeMap<String, String>,
}

/// A connected access point inside a sub-network.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConnectedAp {
    pub ied_name: String,
    pub ap_name: String,
    pub address: BTreeMap<String, String>,
    pub gse_bindings: Vec<ControlBinding>,
    pub sv_bindings: Vec<ControlBinding>,
}

/// A communication sub-network.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SubNetwork {
    pub name: String,
    pub network_type: String,
    pub props: BTreeMap<String, String>,
    pub connected_aps: Vec<ConnectedAp>,
}

/// The communication section of the document.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Communication {
    pub sub_networks: Vec<SubNetwork>,
}

// ============================================================================
// Model root, addressing, statistics
// ============================================================================

/// Arena path of a connectivity node: indices into the model tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct CnLocation {
    pub substation: usize,
    pub voltage_level: usize,
    pub bay: usize,
    pub cn: usize,
}

/// Arena path of a conducting equipment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct CeLocation {
    pub substation: usize,
    pub voltage_level: usize,
    pub bay: usize,
    pub equipment: usize,
}

/// Resolution of an [`LNodeRef`] into the IED tree, as arena indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedLNode {
    pub ied: usize,
    /// Position in [`Ied::logical_devices`] iteration order.
    pub logical_device: usize,
    pub logical_node: usize,
}

/// The parsed SCL document.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SclModel {
    pub version: String,
    pub revision: String,
    pub substations: Vec<Substation>,
    pub ieds: Vec<Ied>,
    pub communication: Communication,
}

impl SclModel {
    /// Fetch a connectivity node by arena path.
    pub fn cn_at(&self, loc: CnLocation) -> Option<&ConnectivityNode> {
        self.substations
            .get(loc.substation)?
            .voltage_levels
            .get(loc.voltage_level)?
            .bays
            .get(loc.bay)?
            .connectivity_nodes
            .get(loc.cn)
    }

    /// Fetch a conducting equipment by arena path.
    pub fn equipment_at(&self, loc: CeLocation) -> Option<&ConductingEquipment> {
        self.substations
            .get(loc.substation)?
            .voltage_levels
            .get(loc.voltage_level)?
            .bays
            .get(loc.bay)?
            .equipments
            .get(loc.equipment)
    }

    /// Compute basic size statistics about the model.
    pub fn stats(&self) -> ModelStats {
        let mut stats = ModelStats::default();
        stats.substations = self.substations.len();
        for ss in &self.substations {
            stats.power_transformers += ss.power_transformers.len();
            stats.voltage_levels += ss.voltage_levels.len();
            for vl in &ss.voltage_levels {
                stats.bays += vl.bays.len();
                for bay in &vl.bays {
                    stats.connectivity_nodes += bay.connectivity_nodes.len();
                    stats.equipments += bay.equipments.len();
                }
            }
        }
        stats.ieds = self.ieds.len();
        stats.sub_networks = self.communication.sub_networks.len();
        stats
    }

    /// Validate the model for structural oddities that usually indicate a
    /// truncated or hand-edited document. Populates `diag`; never fails.
    pub fn validate_into(&self, diag: &mut Diagnostics) {
        if self.substations.is_empty() && self.ieds.is_empty() {
            diag.warn("structure", "Document has no substations and no IEDs");
            return;
        }

        let mut seen_paths = std::collections::HashSet::new();
        for ss in &self.substations {
            if ss.voltage_levels.is_empty() {
                diag.warn_at(
                    "structure",
                    format!("Substation '{}' has no voltage levels", ss.name),
                    "Substation",
                );
            }
            for vl in &ss.voltage_levels {
                for bay in &vl.bays {
                    for cn in &bay.connectivity_nodes {
                        if !cn.path_name.is_empty() && !seen_paths.insert(cn.path_name.clone()) {
                            diag.warn_at(
                                "structure",
                                format!("Duplicate connectivity node path '{}'", cn.path_name),
                                "Bay.ConnectivityNode",
                            );
                        }
                    }
                    for ce in &bay.equipments {
                        if !ce.terminals.iter().any(Terminal::is_wired) {
                            diag.warn_at(
                                "structure",
                                format!(
                                    "Equipment '{}/{}/{}/{}' has no wired terminals",
                                    ss.name, vl.name, bay.name, ce.name
                                ),
                                "Bay.ConductingEquipment",
                            );
                        }
                    }
                }
            }
        }
    }
}

/// Size statistics for a parsed model.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ModelStats {
    pub substations: usize,
    pub voltage_levels: usize,
    pub bays: usize,
    pub connectivity_nodes: usize,
    pub equipments: usize,
    pub power_transformers: usize,
    pub ieds: usize,
    pub sub_networks: usize,
}

impl std::fmt::Display for ModelStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} substations, {} voltage levels, {} bays, {} CNs, {} equipments, {} transformers, {} IEDs, {} sub-networks",
            self.substations,
            self.voltage_levels,
            self.bays,
            self.connectivity_nodes,
            self.equipments,
            self.power_transformers,
            self.ieds,
            self.sub_networks
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_model() -> SclModel {
        SclModel {
            version: "2007".into(),
            revision: "B".into(),
            substations: vec![Substation {
                name: "SS1".into(),
                voltage_levels: vec![VoltageLevel {
                    name: "E1".into(),
                    bays: vec![Bay {
                        name: "B1".into(),
                        connectivity_nodes: vec![ConnectivityNode {
                            name: "N1".into(),
                            path_name: "SS1/E1/B1/N1".into(),
                        }],
                        equipments: vec![ConductingEquipment {
                            name: "Q0".into(),
                            element_type: "CBR".into(),
                            terminals: vec![Terminal {
                                name: "T1".into(),
                                connectivity_node_ref: "SS1/E1/B1/N1".into(),
                                c_node_name: String::new(),
                            }],
                            lnodes: vec![],
                        }],
                        lnodes: vec![],
                    }],
                    ..VoltageLevel::default()
                }],
                ..Substation::default()
            }],
            ..SclModel::default()
        }
    }

    #[test]
    fn test_arena_paths() {
        let model = small_model();
        let cn = model
            .cn_at(CnLocation {
                substation: 0,
                voltage_level: 0,
                bay: 0,
                cn: 0,
            })
            .unwrap();
        assert_eq!(cn.name, "N1");

        let ce = model
            .equipment_at(CeLocation {
                substation: 0,
                voltage_level: 0,
                bay: 0,
                equipment: 0,
            })
            .unwrap();
        assert_eq!(ce.name, "Q0");

        assert!(model
            .cn_at(CnLocation {
                substation: 0,
                voltage_level: 0,
                bay: 0,
                cn: 7,
            })
            .is_none());
    }

    #[test]
    fn test_stats() {
        let model = small_model();
        let stats = model.stats();
        assert_eq!(stats.substations, 1);
        assert_eq!(stats.voltage_levels, 1);
        assert_eq!(stats.bays, 1);
        assert_eq!(stats.connectivity_nodes, 1);
        assert_eq!(stats.equipments, 1);
        assert!(stats.to_string().contains("1 substations"));
    }

    #[test]
    fn test_validate_flags_unwired_equipment() {
        let mut model = small_model();
        model.substations[0].voltage_levels[0].bays[0].equipments[0].terminals.clear();

        let mut diag = Diagnostics::new();
        model.validate_into(&mut diag);
        assert!(diag
            .with_severity(Severity::Warning)
            .any(|i| i.message.contains("no wired terminals")));
    }

    #[test]
    fn test_validate_flags_duplicate_cn_path() {
        let mut model = small_model();
        let dup = model.substations[0].voltage_levels[0].bays[0].connectivity_nodes[0].clone();
        model.substations[0].voltage_levels[0].bays[0]
            .connectivity_nodes
            .push(dup);

        let mut diag = Diagnostics::new();
        model.validate_into(&mut diag);
        assert!(diag.iter().any(|i| i.message.contains("Duplicate")));
    }

    #[test]
    fn test_ied_logical_device_fallback() {
        let ied = Ied {
            name: "IED1".into(),
            access_points: vec![AccessPoint {
                name: "AP1".into(),
                logical_devices: vec![LogicalDevice {
                    inst: "LD1".into(),
                    ..LogicalDevice::default()
                }],
                ..AccessPoint::default()
            }],
            direct_logical_devices: vec![LogicalDevice {
                inst: "LD2".into(),
                ..LogicalDevice::default()
            }],
            ..Ied::default()
        };

        let insts: Vec<_> = ied.logical_devices().map(|ld| ld.inst.clone()).collect();
        assert_eq!(insts, vec!["LD1", "LD2"]);
        assert!(ied.find_logical_device("LD2").is_some());
        assert!(ied.find_logical_device("LD9").is_none());
    }

    #[test]
    fn test_terminal_wired() {
        let unwired = Terminal::default();
        assert!(!unwired.is_wired());

        let by_path = Terminal {
            connectivity_node_ref: "SS1/E1/B1/N1".into(),
            ..Terminal::default()
        };
        assert!(by_path.is_wired());

        let by_name = Terminal {
            c_node_name: "N1".into(),
            ..Terminal::default()
        };
        assert!(by_name.is_wired());
    }
}
