//! SCL document → domain model.
//!
//! The walk follows the document order: substations (power transformers,
//! voltage levels, bays, equipment), then IEDs, then the communication
//! section. Unknown elements and attributes are ignored throughout; the
//! parser only fails on structural problems (no `<SCL>` root, missing
//! mandatory `name` attributes on numbered elements).
//!
//! Two placements of logical devices are tolerated: directly under `<IED>`
//! and under `AccessPoint/Server` (the canonical one). Transformer winding
//! terminals are resolved to `(ss, vl, bay, cn)` tuples immediately after
//! the substation subtree is read.

use std::collections::BTreeMap;
use std::path::Path;

use sld_core::{
    AccessPoint, Bay, Communication, ConductingEquipment, ConnectedAp, ConnectivityNode,
    ControlBinding, DataSet, Fcda, GseControl, Ied, LNodeRef, Ln0Info, LogicalDevice, LogicalNode,
    PowerTransformer, ResolvedEnd, ScalarWithUnit, SclModel, SiMultiplier, SldError, SldResult,
    SubNetwork, Substation, SvControl, TapChanger, Terminal, TransformerWinding, VoltageLevel,
    WindingTerminal,
};
use tracing::debug;

use crate::xml::{self, Element};

/// Parse an SCL file from a filesystem path.
pub fn parse_path(path: impl AsRef<Path>) -> SldResult<SclModel> {
    let document = xml::read_path(path)?;
    parse_document(&document)
}

/// Parse an SCL document from an in-memory buffer.
pub fn parse_bytes(bytes: &[u8]) -> SldResult<SclModel> {
    let document = xml::read_bytes(bytes)?;
    parse_document(&document)
}

fn parse_document(document: &Element) -> SldResult<SclModel> {
    let root = document
        .child("SCL")
        .ok_or_else(|| SldError::XmlParse("Missing <SCL> root".to_string()))?;

    let mut model = SclModel {
        version: root.attr_or_empty("version").to_string(),
        revision: root.attr_or_empty("revision").to_string(),
        ..SclModel::default()
    };

    for ss in root.children_named("Substation") {
        model.substations.push(read_substation(ss)?);
    }
    for substation in &mut model.substations {
        resolve_winding_ends(substation);
    }

    for ied in root.children_named("IED") {
        model.ieds.push(read_ied(ied)?);
    }

    model.communication = read_communication(root);

    let stats = model.stats();
    debug!(%stats, version = %model.version, revision = %model.revision, "SCL document parsed");
    Ok(model)
}

// ----------------------------------------------------------------------------
// Substation section
// ----------------------------------------------------------------------------

fn read_substation(node: &Element) -> SldResult<Substation> {
    let mut substation = Substation {
        name: required_name(node, "Substation")?,
        ..Substation::default()
    };
    read_lnodes(node, &mut substation.lnodes);

    for pt in node.children_named("PowerTransformer") {
        substation.power_transformers.push(read_power_transformer(pt));
    }

    for vl in node.children_named("VoltageLevel") {
        substation.voltage_levels.push(read_voltage_level(vl)?);
    }

    Ok(substation)
}

fn read_voltage_level(node: &Element) -> SldResult<VoltageLevel> {
    let mut level = VoltageLevel {
        name: required_name(node, "VoltageLevel")?,
        nom_freq: node.attr_or_empty("nomFreq").to_string(),
        voltage: node.child("Voltage").map(read_voltage),
        ..VoltageLevel::default()
    };
    read_lnodes(node, &mut level.lnodes);

    for bay in node.children_named("Bay") {
        level.bays.push(read_bay(bay)?);
    }
    Ok(level)
}

fn read_bay(node: &Element) -> SldResult<Bay> {
    let mut bay = Bay {
        name: required_name(node, "Bay")?,
        ..Bay::default()
    };

    for cn in node.children_named("ConnectivityNode") {
        bay.connectivity_nodes.push(ConnectivityNode {
            name: cn.attr_or_empty("name").to_string(),
            path_name: cn.attr_or_empty("pathName").to_string(),
        });
    }

    for ce in node.children_named("ConductingEquipment") {
        let mut equipment = ConductingEquipment {
            name: required_name(ce, "ConductingEquipment")?,
            element_type: ce.attr_or_empty("type").to_string(),
            ..ConductingEquipment::default()
        };
        for terminal in ce.children_named("Terminal") {
            equipment.terminals.push(Terminal {
                name: terminal.attr_or_empty("name").to_string(),
                connectivity_node_ref: terminal.attr_or_empty("connectivityNode").to_string(),
                c_node_name: terminal.attr_or_empty("cNodeName").to_string(),
            });
        }
        read_lnodes(ce, &mut equipment.lnodes);
        bay.equipments.push(equipment);
    }

    read_lnodes(node, &mut bay.lnodes);
    Ok(bay)
}

/// Voltage text parses with the SI multiplier; a non-numeric value defaults
/// silently to 0 with the raw text preserved.
fn read_voltage(node: &Element) -> ScalarWithUnit {
    let text = node.text.clone();
    ScalarWithUnit {
        value: text.trim().parse().unwrap_or(0.0),
        unit: node.attr_or_empty("unit").to_string(),
        multiplier: SiMultiplier::parse(node.attr_or_empty("multiplier"))
            .unwrap_or(SiMultiplier::Unit),
        text,
    }
}

fn read_power_transformer(node: &Element) -> PowerTransformer {
    let mut transformer = PowerTransformer {
        name: node.attr_or_empty("name").to_string(),
        desc: node.attr_or_empty("desc").to_string(),
        transformer_type: node.attr_or_empty("type").to_string(),
        ..PowerTransformer::default()
    };

    for winding in node.children_named("TransformerWinding") {
        let mut w = TransformerWinding {
            name: winding.attr_or_empty("name").to_string(),
            winding_type: winding.attr_or_empty("type").to_string(),
            ..TransformerWinding::default()
        };
        if let Some(tc) = winding.child("TapChanger") {
            w.tap_changer = Some(TapChanger {
                name: tc.attr_or_empty("name").to_string(),
                changer_type: tc.attr_or_empty("type").to_string(),
            });
        }
        for terminal in winding.children_named("Terminal") {
            w.terminals.push(WindingTerminal {
                name: terminal.attr_or_empty("name").to_string(),
                c_node_name: terminal.attr_or_empty("cNodeName").to_string(),
                connectivity_path: terminal.attr_or_empty("connectivityNode").to_string(),
                substation_name: terminal.attr_or_empty("substationName").to_string(),
            });
        }
        transformer.windings.push(w);
    }

    transformer
}

/// Fill `resolved_ends` on every winding: the last three segments of a
/// non-empty connectivity path become (vl, bay, cn); otherwise only the
/// local node name is known. The substation falls back to the enclosing one.
fn resolve_winding_ends(substation: &mut Substation) {
    let enclosing = substation.name.clone();
    for transformer in &mut substation.power_transformers {
        for winding in &mut transformer.windings {
            winding.resolved_ends.clear();
            for terminal in &winding.terminals {
                let mut end = ResolvedEnd {
                    ss: if terminal.substation_name.is_empty() {
                        enclosing.clone()
                    } else {
                        terminal.substation_name.clone()
                    },
                    ..ResolvedEnd::default()
                };

                if !terminal.connectivity_path.is_empty() {
                    if let Some((vl, bay, cn)) = split_connectivity_path(&terminal.connectivity_path)
                    {
                        end.vl = vl;
                        end.bay = bay;
                        end.cn = cn;
                    } else {
                        end.cn = terminal.c_node_name.clone();
                    }
                } else {
                    end.cn = terminal.c_node_name.clone();
                }
                winding.resolved_ends.push(end);
            }
        }
    }
}

/// Take the last three non-empty `/`-separated segments of a connectivity
/// path as (vl, bay, cn). Shorter paths cannot be interpreted.
fn split_connectivity_path(path: &str) -> Option<(String, String, String)> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.len() < 3 {
        return None;
    }
    let n = segments.len();
    Some((
        segments[n - 3].to_string(),
        segments[n - 2].to_string(),
        segments[n - 1].to_string(),
    ))
}

fn read_lnodes(node: &Element, out: &mut Vec<LNodeRef>) {
    for lnode in node.children_named("LNode") {
        out.push(LNodeRef {
            ied_name: lnode.attr_or_empty("iedName").to_string(),
            ld_inst: lnode.attr_or_empty("ldInst").to_string(),
            prefix: lnode.attr_or_empty("prefix").to_string(),
            ln_class: lnode.attr_or_empty("lnClass").to_string(),
            ln_inst: lnode.attr_or_empty("lnInst").to_string(),
        });
    }
}

// ----------------------------------------------------------------------------
// IED section
// ----------------------------------------------------------------------------

fn read_ied(node: &Element) -> SldResult<Ied> {
    let mut ied = Ied {
        name: required_name(node, "IED")?,
        manufacturer: node.attr_or_empty("manufacturer").to_string(),
        ied_type: node.attr_or_empty("type").to_string(),
        ..Ied::default()
    };

    // Non-canonical placement first: LDevice directly under IED.
    read_logical_devices(node, &mut ied.direct_logical_devices);

    for ap in node.children_named("AccessPoint") {
        let mut access_point = AccessPoint {
            name: ap.attr_or_empty("name").to_string(),
            address: read_address(ap),
            ..AccessPoint::default()
        };
        if let Some(server) = ap.child("Server") {
            read_logical_devices(server, &mut access_point.logical_devices);
        }
        ied.access_points.push(access_point);
    }

    Ok(ied)
}

fn read_logical_devices(parent: &Element, out: &mut Vec<LogicalDevice>) {
    for ld in parent.children_named("LDevice") {
        let mut device = LogicalDevice {
            inst: ld.attr_or_empty("inst").to_string(),
            ..LogicalDevice::default()
        };

        if let Some(ln0) = ld.child("LN0") {
            device.logical_nodes.push(LogicalNode {
                prefix: ln0.attr_or_empty("prefix").to_string(),
                ln_class: ln0.attr_or_empty("lnClass").to_string(),
                inst: String::new(),
            });
            device.ln0 = read_ln0_info(ln0);
        }
        for ln in ld.children_named("LN") {
            device.logical_nodes.push(LogicalNode {
                prefix: ln.attr_or_empty("prefix").to_string(),
                ln_class: ln.attr_or_empty("lnClass").to_string(),
                inst: ln.attr_or_empty("inst").to_string(),
            });
        }

        out.push(device);
    }
}

fn read_ln0_info(ln0: &Element) -> Ln0Info {
    let mut info = Ln0Info::default();

    for ds in ln0.children_named("DataSet") {
        let mut dataset = DataSet {
            name: ds.attr_or_empty("name").to_string(),
            ..DataSet::default()
        };
        for fcda in ds.children_named("FCDA") {
            dataset.members.push(Fcda {
                ld_inst: fcda.attr_or_empty("ldInst").to_string(),
                ln_class: fcda.attr_or_empty("lnClass").to_string(),
                ln_inst: fcda.attr_or_empty("lnInst").to_string(),
                do_name: fcda.attr_or_empty("doName").to_string(),
                da_name: fcda.attr_or_empty("daName").to_string(),
                fc: fcda.attr_or_empty("fc").to_string(),
            });
        }
        info.datasets.push(dataset);
    }

    for gse in ln0.children_named("GSEControl") {
        info.gse_controls.push(GseControl {
            name: gse.attr_or_empty("name").to_string(),
            dataset: gse.attr_or_empty("datSet").to_string(),
            app_id: gse.attr_or_empty("appID").to_string(),
        });
    }

    for sv in ln0.children_named("SampledValueControl") {
        info.sv_controls.push(SvControl {
            name: sv.attr_or_empty("name").to_string(),
            dataset: sv.attr_or_empty("datSet").to_string(),
            app_id: sv.attr_or_empty("appID").to_string(),
            smp_rate: sv.attr_or_empty("smpRate").to_string(),
        });
    }

    info
}

// ----------------------------------------------------------------------------
// Communication section
// ----------------------------------------------------------------------------

fn read_communication(root: &Element) -> Communication {
    let mut communication = Communication::default();
    let Some(comm) = root.child("Communication") else {
        return communication;
    };

    for sn in comm.children_named("SubNetwork") {
        let mut sub_network = SubNetwork {
            name: sn.attr_or_empty("name").to_string(),
            network_type: sn.attr_or_empty("type").to_string(),
            ..SubNetwork::default()
        };
        // Loose P properties directly under SubNetwork (BitRate, ...).
        for p in sn.children_named("P") {
            let key = p.attr_or_empty("type");
            if !key.is_empty() {
                sub_network.props.insert(key.to_string(), p.text.clone());
            }
        }

        for cap in sn.children_named("ConnectedAP") {
            let mut connected = ConnectedAp {
                ied_name: cap.attr_or_empty("iedName").to_string(),
                ap_name: cap.attr_or_empty("apName").to_string(),
                address: read_address(cap),
                ..ConnectedAp::default()
            };
            for gse in cap.children_named("GSE") {
                connected.gse_bindings.push(read_binding(gse));
            }
            for smv in cap.children_named("SMV") {
                connected.sv_bindings.push(read_binding(smv));
            }
            sub_network.connected_aps.push(connected);
        }

        communication.sub_networks.push(sub_network);
    }

    communication
}

fn read_binding(node: &Element) -> ControlBinding {
    ControlBinding {
        ld_inst: node.attr_or_empty("ldInst").to_string(),
        cb_name: node.attr_or_empty("cbName").to_string(),
        address: read_address(node),
    }
}

/// `<Address>/<P type="...">value</P>` to a map; P elements without a type
/// are dropped.
fn read_address(parent: &Element) -> BTreeMap<String, String> {
    let mut address = BTreeMap::new();
    if let Some(addr) = parent.child("Address") {
        for p in addr.children_named("P") {
            let key = p.attr_or_empty("type");
            if !key.is_empty() {
                address.insert(key.to_string(), p.text.clone());
            }
        }
    }
    address
}

fn required_name(node: &Element, element: &str) -> SldResult<String> {
    match node.attr("name") {
        Some(name) if !name.is_empty() => Ok(name.to_string()),
        _ => Err(SldError::MissingMandatoryField(format!(
            "{element} name"
        ))),
    }
}
