//! JSON serialization of graphs, plans and the model debug surfaces.
//!
//! Field names are a stable contract for renderers; optional fields are
//! omitted rather than emitted empty. All maps serialize with sorted keys
//! and locale-independent numbers, so equal inputs produce byte-identical
//! output.

use serde_json::{json, Map, Value};
use sld_core::SclModel;
use sld_scl::index::{endpoint_key, topology_edges};
use sld_scl::SclIndex;

use crate::graph::{EquipmentKind, NodeKind, SldGraph};
use crate::plan::SldPlan;

fn set(obj: &mut Map<String, Value>, key: &str, value: &str) {
    if !value.is_empty() {
        obj.insert(key.to_string(), Value::String(value.to_string()));
    }
}

/// Raw or condensed graph per the `{"nodes":[...],"edges":[...]}` contract.
pub fn graph_json(graph: &SldGraph) -> String {
    let mut nodes = Vec::new();
    for idx in graph.node_indices() {
        let node = &graph.graph[idx];
        let mut obj = Map::new();
        obj.insert("id".into(), Value::String(node.id.clone()));
        obj.insert("kind".into(), Value::String(node.kind.as_str().into()));
        set(&mut obj, "label", &node.label);
        set(&mut obj, "ss", &node.ss);
        set(&mut obj, "vl", &node.vl);
        set(&mut obj, "bay", &node.bay);
        if node.kind == NodeKind::Equipment {
            obj.insert(
                "eKind".into(),
                Value::String(node.equipment_kind.as_str().into()),
            );
        }
        nodes.push(Value::Object(obj));
    }

    let mut edges = Vec::new();
    for edge in graph.edges() {
        let mut obj = Map::new();
        obj.insert("id".into(), Value::String(edge.id.clone()));
        obj.insert("from".into(), Value::String(edge.from.clone()));
        obj.insert("to".into(), Value::String(edge.to.clone()));
        obj.insert("kind".into(), Value::String(edge.kind.as_str().into()));
        set(&mut obj, "terminal", &edge.terminal);
        set(&mut obj, "cn", &edge.cn_path);
        edges.push(Value::Object(obj));
    }

    stringify(json!({ "nodes": nodes, "edges": edges }))
}

/// Plan JSON per the buses/couplers/transformers/feeders contract.
pub fn plan_json(plan: &SldPlan) -> String {
    let mut buses = Vec::new();
    for bus in &plan.buses {
        let mut obj = Map::new();
        obj.insert("id".into(), Value::String(bus.bus_node_id.clone()));
        set(&mut obj, "ss", &bus.ss);
        set(&mut obj, "vl", &bus.vl);
        set(&mut obj, "label", &bus.label);
        obj.insert(
            "members".into(),
            Value::Array(
                bus.cn_members
                    .iter()
                    .map(|m| Value::String(m.clone()))
                    .collect(),
            ),
        );
        buses.push(Value::Object(obj));
    }

    let mut couplers = Vec::new();
    for coupler in &plan.couplers {
        let mut obj = Map::new();
        obj.insert("equip".into(), Value::String(coupler.equipment_id.clone()));
        obj.insert("busA".into(), Value::String(coupler.bus_a.clone()));
        obj.insert("busB".into(), Value::String(coupler.bus_b.clone()));
        obj.insert(
            "type".into(),
            Value::String(if coupler.is_breaker { "CB" } else { "DS" }.into()),
        );
        set(&mut obj, "ss", &coupler.ss);
        set(&mut obj, "vl", &coupler.vl);
        couplers.push(Value::Object(obj));
    }

    let mut transformers = Vec::new();
    for link in &plan.transformers {
        let mut obj = Map::new();
        obj.insert("tr".into(), Value::String(link.transformer_id.clone()));
        set(&mut obj, "busA", &link.bus_a);
        set(&mut obj, "busB", &link.bus_b);
        set(&mut obj, "vlA", &link.vl_a);
        set(&mut obj, "vlB", &link.vl_b);
        transformers.push(Value::Object(obj));
    }

    let mut feeders = Vec::new();
    for feeder in &plan.feeders {
        let mut obj = Map::new();
        obj.insert("id".into(), Value::String(feeder.id.clone()));
        set(&mut obj, "bus", &feeder.bus_id);
        set(&mut obj, "ss", &feeder.ss);
        set(&mut obj, "vl", &feeder.vl);
        obj.insert("lane".into(), json!(feeder.lane_index));
        if feeder.endpoint_type != EquipmentKind::Unknown {
            obj.insert(
                "endpoint".into(),
                Value::String(feeder.endpoint_type.as_str().into()),
            );
        }
        obj.insert(
            "chain".into(),
            Value::Array(
                feeder
                    .chain
                    .iter()
                    .map(|c| Value::String(c.clone()))
                    .collect(),
            ),
        );
        feeders.push(Value::Object(obj));
    }

    stringify(json!({
        "buses": buses,
        "couplers": couplers,
        "transformers": transformers,
        "feeders": feeders,
    }))
}

/// Hierarchical model dump plus the CE↔CN topology rows (debug surface).
pub fn substations_json(model: &SclModel) -> String {
    let substations: Vec<Value> = model
        .substations
        .iter()
        .map(|ss| {
            json!({
                "name": ss.name,
                "voltageLevels": ss.voltage_levels.iter().map(|vl| {
                    let mut obj = Map::new();
                    obj.insert("name".into(), Value::String(vl.name.clone()));
                    set(&mut obj, "nomFreq", &vl.nom_freq);
                    if let Some(voltage) = &vl.voltage {
                        obj.insert("voltage".into(), json!({
                            "value": voltage.value,
                            "unit": voltage.unit,
                            "multiplier": voltage.multiplier.symbol(),
                            "si": voltage.si_value(),
                        }));
                    }
                    obj.insert("bays".into(), vl.bays.iter().map(|bay| json!({
                        "name": bay.name,
                        "connectivityNodes": bay.connectivity_nodes.iter().map(|cn| {
                            let mut o = Map::new();
                            o.insert("name".into(), Value::String(cn.name.clone()));
                            set(&mut o, "pathName", &cn.path_name);
                            Value::Object(o)
                        }).collect::<Vec<_>>(),
                        "equipments": bay.equipments.iter().map(|ce| json!({
                            "name": ce.name,
                            "type": ce.element_type,
                            "terminals": ce.terminals.iter().map(|t| {
                                let mut o = Map::new();
                                set(&mut o, "name", &t.name);
                                set(&mut o, "connectivityNode", &t.connectivity_node_ref);
                                set(&mut o, "cNodeName", &t.c_node_name);
                                Value::Object(o)
                            }).collect::<Vec<_>>(),
                        })).collect::<Vec<_>>(),
                    })).collect::<Vec<_>>().into());
                    Value::Object(obj)
                }).collect::<Vec<_>>(),
                "powerTransformers": ss.power_transformers.iter().map(|pt| json!({
                    "name": pt.name,
                    "type": pt.transformer_type,
                    "windings": pt.windings.iter().map(|w| json!({
                        "name": w.name,
                        "hasTapChanger": w.tap_changer.is_some(),
                        "ends": w.resolved_ends.iter().map(|e| json!({
                            "ss": e.ss, "vl": e.vl, "bay": e.bay, "cn": e.cn,
                        })).collect::<Vec<_>>(),
                    })).collect::<Vec<_>>(),
                })).collect::<Vec<_>>(),
            })
        })
        .collect();

    let topology: Vec<Value> = topology_edges(model)
        .iter()
        .map(|edge| {
            json!({
                "ss": edge.ss,
                "vl": edge.vl,
                "bay": edge.bay,
                "equipment": edge.equipment,
                "terminal": edge.terminal,
                "cn": edge.cn_path,
            })
        })
        .collect();

    stringify(json!({
        "version": model.version,
        "revision": model.revision,
        "substations": substations,
        "topology": topology,
    }))
}

/// Communication dump with derived endpoints grafted under each binding.
pub fn communication_json(model: &SclModel, index: &SclIndex) -> String {
    let sub_networks: Vec<Value> = model
        .communication
        .sub_networks
        .iter()
        .map(|sn| {
            json!({
                "name": sn.name,
                "type": sn.network_type,
                "props": sn.props,
                "connectedAPs": sn.connected_aps.iter().map(|cap| {
                    json!({
                        "iedName": cap.ied_name,
                        "apName": cap.ap_name,
                        "address": cap.address,
                        "gse": cap.gse_bindings.iter().map(|b| {
                            let mut obj = Map::new();
                            obj.insert("ldInst".into(), Value::String(b.ld_inst.clone()));
                            obj.insert("cbName".into(), Value::String(b.cb_name.clone()));
                            obj.insert("address".into(), json!(b.address));
                            let key = endpoint_key(&cap.ied_name, &b.ld_inst, &b.cb_name);
                            if let Some(ep) = index.gse_endpoints.get(&key) {
                                obj.insert("endpoint".into(), json!({
                                    "mac": ep.mac,
                                    "appId": ep.app_id,
                                    "vlanId": ep.vlan_id,
                                    "vlanPrio": ep.vlan_prio,
                                    "datasetRef": ep.dataset_ref,
                                }));
                            }
                            Value::Object(obj)
                        }).collect::<Vec<_>>(),
                        "smv": cap.sv_bindings.iter().map(|b| {
                            let mut obj = Map::new();
                            obj.insert("ldInst".into(), Value::String(b.ld_inst.clone()));
                            obj.insert("cbName".into(), Value::String(b.cb_name.clone()));
                            obj.insert("address".into(), json!(b.address));
                            let key = endpoint_key(&cap.ied_name, &b.ld_inst, &b.cb_name);
                            if let Some(ep) = index.sv_endpoints.get(&key) {
                                obj.insert("endpoint".into(), json!({
                                    "mac": ep.mac,
                                    "appId": ep.app_id,
                                    "vlanId": ep.vlan_id,
                                    "vlanPrio": ep.vlan_prio,
                                    "smpRate": ep.smp_rate,
                                    "datasetRef": ep.dataset_ref,
                                }));
                            }
                            Value::Object(obj)
                        }).collect::<Vec<_>>(),
                    })
                }).collect::<Vec<_>>(),
            })
        })
        .collect();

    stringify(json!({ "subNetworks": sub_networks }))
}

fn stringify(value: Value) -> String {
    serde_json::to_string(&value).unwrap_or_else(|_| String::from("{}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{ids, EdgeKind, NodeOrigin, SldEdge, SldNode};
    use std::sync::Arc;

    #[test]
    fn test_graph_json_shape() {
        let mut g = SldGraph::new();
        g.add_node(SldNode {
            id: "CN:SS1/E1/B1/N1".into(),
            kind: NodeKind::ConnectivityNode,
            equipment_kind: EquipmentKind::Unknown,
            ss: Arc::from("SS1"),
            vl: Arc::from("E1"),
            bay: Arc::from("B1"),
            label: "N1".into(),
            lnodes: vec![],
            origin: NodeOrigin::SynthesizedCn,
        });
        g.add_node(SldNode {
            id: "CE:SS1/E1/B1/Q0".into(),
            kind: NodeKind::Equipment,
            equipment_kind: EquipmentKind::CB,
            ss: Arc::from("SS1"),
            vl: Arc::from("E1"),
            bay: Arc::from("B1"),
            label: "Q0".into(),
            lnodes: vec![],
            origin: NodeOrigin::SynthesizedCn,
        });
        g.add_edge(SldEdge {
            id: ids::edge(0, "CE:SS1/E1/B1/Q0", "CN:SS1/E1/B1/N1"),
            from: "CE:SS1/E1/B1/Q0".into(),
            to: "CN:SS1/E1/B1/N1".into(),
            kind: EdgeKind::CeToCn,
            terminal: "T1".into(),
            cn_path: "SS1/E1/B1/N1".into(),
        });

        let text = graph_json(&g);
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["nodes"].as_array().unwrap().len(), 2);
        assert_eq!(value["nodes"][0]["kind"], "ConnectivityNode");
        // CN nodes carry no eKind; equipment nodes do.
        assert!(value["nodes"][0].get("eKind").is_none());
        assert_eq!(value["nodes"][1]["eKind"], "CB");
        assert_eq!(value["edges"][0]["kind"], "CE_to_CN");
        assert_eq!(value["edges"][0]["terminal"], "T1");
        assert_eq!(value["edges"][0]["cn"], "SS1/E1/B1/N1");
    }

    #[test]
    fn test_plan_json_skeleton() {
        let plan = SldPlan::default();
        let value: Value = serde_json::from_str(&plan_json(&plan)).unwrap();
        assert!(value["buses"].as_array().unwrap().is_empty());
        assert!(value["couplers"].as_array().unwrap().is_empty());
        assert!(value["transformers"].as_array().unwrap().is_empty());
        assert!(value["feeders"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_communication_endpoint_grafting() {
        let doc: &[u8] = br#"
<SCL version="2007">
  <IED name="IED1">
    <AccessPoint name="AP1">
      <Server>
        <LDevice inst="LD1">
          <LN0 lnClass="LLN0">
            <GSEControl name="GoCB1" datSet="DS1" appID="0x1"/>
          </LN0>
        </LDevice>
      </Server>
    </AccessPoint>
  </IED>
  <Communication>
    <SubNetwork name="W1" type="8-1">
      <ConnectedAP iedName="IED1" apName="AP1">
        <GSE ldInst="LD1" cbName="GoCB1">
          <Address><P type="MAC-Address">01-0C-CD-01-00-01</P><P type="APPID">0x1</P></Address>
        </GSE>
      </ConnectedAP>
    </SubNetwork>
  </Communication>
</SCL>
"#;
        let model = sld_scl::parser::parse_bytes(doc).unwrap();
        let mut interner = sld_core::Interner::new();
        let mut diag = sld_core::Diagnostics::new();
        let index = SclIndex::build(&model, &mut interner, &mut diag);

        let value: Value = serde_json::from_str(&communication_json(&model, &index)).unwrap();
        let gse = &value["subNetworks"][0]["connectedAPs"][0]["gse"][0];
        assert_eq!(gse["cbName"], "GoCB1");
        assert_eq!(gse["endpoint"]["mac"], "01-0C-CD-01-00-01");
        assert_eq!(gse["endpoint"]["datasetRef"], "DS1");
    }

    #[test]
    fn test_substations_json_hierarchy() {
        let doc: &[u8] = br#"
<SCL version="2007" revision="B">
  <Substation name="SS1">
    <VoltageLevel name="E1" nomFreq="50">
      <Voltage unit="V" multiplier="k">20</Voltage>
      <Bay name="B1">
        <ConnectivityNode name="N1" pathName="SS1/E1/B1/N1"/>
        <ConductingEquipment name="Q0" type="CBR">
          <Terminal name="T1" connectivityNode="SS1/E1/B1/N1"/>
        </ConductingEquipment>
      </Bay>
    </VoltageLevel>
  </Substation>
</SCL>
"#;
        let model = sld_scl::parser::parse_bytes(doc).unwrap();
        let value: Value = serde_json::from_str(&substations_json(&model)).unwrap();
        assert_eq!(value["version"], "2007");
        let vl = &value["substations"][0]["voltageLevels"][0];
        assert_eq!(vl["voltage"]["si"], 20000.0);
        assert_eq!(
            vl["bays"][0]["equipments"][0]["terminals"][0]["connectivityNode"],
            "SS1/E1/B1/N1"
        );
        assert_eq!(value["topology"][0]["equipment"], "Q0");
    }

    #[test]
    fn test_string_escaping_through_serde() {
        let mut g = SldGraph::new();
        g.add_node(SldNode {
            id: "CN:SS\"1/E1/B1/N\u{1}".into(),
            kind: NodeKind::ConnectivityNode,
            equipment_kind: EquipmentKind::Unknown,
            ss: Arc::from(""),
            vl: Arc::from(""),
            bay: Arc::from(""),
            label: String::new(),
            lnodes: vec![],
            origin: NodeOrigin::SynthesizedCn,
        });
        let text = graph_json(&g);
        assert!(text.contains("\\\""));
        assert!(text.contains("\\u0001"));
        // Round-trips cleanly.
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["nodes"][0]["id"], "CN:SS\"1/E1/B1/N\u{1}");
    }
}
