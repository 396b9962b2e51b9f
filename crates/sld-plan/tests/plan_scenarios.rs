//! End-to-end scenarios over the full load → build pipeline, plus the
//! structural invariants every plan must satisfy.

use std::collections::BTreeSet;

use sld_plan::{EdgeKind, EquipmentKind, NodeKind, SldSession};

/// Check the structural invariants of a ready session: edge endpoint kinds,
/// cluster homogeneity, feeder chain adjacency, coupler well-formedness.
fn assert_plan_invariants(session: &SldSession) {
    let raw = session.raw_graph().unwrap();
    let plan = session.plan().unwrap();
    let condensed = &plan.condensed;

    for edge in raw.edges() {
        assert_eq!(edge.kind, EdgeKind::CeToCn);
        assert_eq!(raw.node(&edge.from).unwrap().kind, NodeKind::Equipment);
        assert_eq!(
            raw.node(&edge.to).unwrap().kind,
            NodeKind::ConnectivityNode
        );
    }

    for edge in condensed.edges() {
        assert_eq!(edge.kind, EdgeKind::EquipToBus);
        assert_eq!(condensed.node(&edge.to).unwrap().kind, NodeKind::Bus);
    }

    for cluster in &plan.buses {
        assert!(!cluster.cn_members.is_empty());
        for member in &cluster.cn_members {
            let cn = raw.node(member).unwrap();
            assert_eq!(cn.ss, cluster.ss);
            assert_eq!(cn.vl, cluster.vl);
        }
    }
    let bus_ids: BTreeSet<_> = plan.buses.iter().map(|b| b.bus_node_id.clone()).collect();
    assert_eq!(bus_ids.len(), plan.buses.len(), "bus IDs must be unique");

    let cluster_member = |cn_id: &str| {
        plan.buses
            .iter()
            .any(|c| c.cn_members.iter().any(|m| m == cn_id))
    };

    for feeder in &plan.feeders {
        assert!(!feeder.chain.is_empty());
        let head_idx = condensed.node_index(&feeder.chain[0]).unwrap();
        assert!(
            condensed
                .neighbor_ids_of_kind(head_idx, NodeKind::Bus)
                .contains(&feeder.bus_id),
            "feeder head {} must touch {}",
            feeder.chain[0],
            feeder.bus_id
        );
        for pair in feeder.chain.windows(2) {
            let a = raw.node_index(&pair[0]).unwrap();
            let b = raw.node_index(&pair[1]).unwrap();
            let cns_a: BTreeSet<String> = raw
                .graph
                .neighbors(a)
                .filter(|&n| raw.graph[n].kind == NodeKind::ConnectivityNode)
                .map(|n| raw.graph[n].id.clone())
                .filter(|id| !cluster_member(id))
                .collect();
            let cns_b: BTreeSet<String> = raw
                .graph
                .neighbors(b)
                .filter(|&n| raw.graph[n].kind == NodeKind::ConnectivityNode)
                .map(|n| raw.graph[n].id.clone())
                .filter(|id| !cluster_member(id))
                .collect();
            let shared: Vec<_> = cns_a.intersection(&cns_b).collect();
            assert_eq!(
                shared.len(),
                1,
                "consecutive chain elements {pair:?} must share exactly one non-bus CN"
            );
        }
    }

    for coupler in &plan.couplers {
        assert_ne!(coupler.bus_a, coupler.bus_b);
        let a = condensed.node(&coupler.bus_a).unwrap();
        let b = condensed.node(&coupler.bus_b).unwrap();
        assert_eq!(a.ss, b.ss);
        assert_eq!(a.vl, b.vl);
    }
}

fn ready_session(doc: &[u8]) -> SldSession {
    let mut session = SldSession::new();
    session.load_buffer(doc).unwrap();
    session.build().unwrap();
    session
}

/// S1: minimal two-bay voltage level — one breaker, no buses.
#[test]
fn minimal_two_bay_level_has_no_buses() {
    let session = ready_session(
        br#"
<SCL version="2007">
  <Substation name="SS1">
    <VoltageLevel name="E1" nomFreq="50">
      <Voltage unit="V" multiplier="k">20</Voltage>
      <Bay name="B1">
        <ConnectivityNode name="N1" pathName="SS1/E1/B1/N1"/>
        <ConductingEquipment name="Q0" type="CBR">
          <Terminal name="T1" connectivityNode="SS1/E1/B1/N1"/>
          <Terminal name="T2" connectivityNode="SS1/E1/B2/N2"/>
        </ConductingEquipment>
      </Bay>
      <Bay name="B2">
        <ConnectivityNode name="N2" pathName="SS1/E1/B2/N2"/>
      </Bay>
    </VoltageLevel>
  </Substation>
</SCL>
"#,
    );

    let raw = session.raw_graph().unwrap();
    assert_eq!(raw.node_count(), 3); // 2 CN + 1 CE
    assert_eq!(raw.edge_count(), 2);

    let plan = session.plan().unwrap();
    assert!(plan.buses.is_empty());
    assert!(plan.feeders.is_empty());
    assert!(plan.couplers.is_empty());
    assert_plan_invariants(&session);
}

/// S2: a hinted busbar with a DS → CB → Line chain hanging off it.
#[test]
fn busbar_with_linear_feeder_chain() {
    let session = ready_session(
        br#"
<SCL version="2007">
  <Substation name="SS1">
    <VoltageLevel name="E1">
      <Bay name="B1">
        <ConnectivityNode name="BB1" pathName="SS1/E1/B1/BB1"/>
        <ConductingEquipment name="QS1" type="DIS">
          <Terminal name="T1" connectivityNode="SS1/E1/B1/BB1"/>
          <Terminal name="T2" cNodeName="M"/>
        </ConductingEquipment>
        <ConductingEquipment name="Q0" type="CBR">
          <Terminal name="T1" cNodeName="M"/>
          <Terminal name="T2" cNodeName="K"/>
        </ConductingEquipment>
        <ConductingEquipment name="LN1" type="LINE">
          <Terminal name="T1" cNodeName="K"/>
        </ConductingEquipment>
      </Bay>
    </VoltageLevel>
  </Substation>
</SCL>
"#,
    );

    let plan = session.plan().unwrap();
    assert_eq!(plan.buses.len(), 1);
    assert_eq!(plan.buses[0].bus_node_id, "BUS:SS1/E1/cluster#1");

    assert_eq!(plan.feeders.len(), 1);
    let feeder = &plan.feeders[0];
    assert_eq!(feeder.chain.len(), 3);
    assert_eq!(
        feeder.chain,
        vec![
            "CE:SS1/E1/B1/QS1".to_string(),
            "CE:SS1/E1/B1/Q0".to_string(),
            "CE:SS1/E1/B1/LN1".to_string(),
        ]
    );
    assert_eq!(feeder.endpoint_type, EquipmentKind::Line);
    assert_eq!(feeder.lane_index, 0);
    assert!(plan.couplers.is_empty());
    assert_plan_invariants(&session);
}

/// S3: two buses joined by a single breaker — one coupler, no feeders.
#[test]
fn breaker_between_two_buses_is_a_coupler() {
    let session = ready_session(
        br#"
<SCL version="2007">
  <Substation name="SS1">
    <VoltageLevel name="E1">
      <Bay name="B1">
        <ConnectivityNode name="BB1" pathName="SS1/E1/B1/BB1"/>
        <ConnectivityNode name="BB2" pathName="SS1/E1/B1/BB2"/>
        <ConductingEquipment name="Q0" type="CBR">
          <Terminal name="T1" connectivityNode="SS1/E1/B1/BB1"/>
          <Terminal name="T2" connectivityNode="SS1/E1/B1/BB2"/>
        </ConductingEquipment>
      </Bay>
    </VoltageLevel>
  </Substation>
</SCL>
"#,
    );

    let plan = session.plan().unwrap();
    assert_eq!(plan.buses.len(), 2);
    assert_eq!(plan.couplers.len(), 1);
    let coupler = &plan.couplers[0];
    assert!(coupler.is_breaker);
    assert_ne!(coupler.bus_a, coupler.bus_b);
    assert!(plan.feeders.is_empty());
    assert_plan_invariants(&session);

    let json: serde_json::Value = serde_json::from_str(&session.plan_json()).unwrap();
    assert_eq!(json["couplers"][0]["type"], "CB");
}

/// S4: two voltage levels bridged by a transformer; the declared power
/// transformer lands a synthetic feeder on each bus.
#[test]
fn transformer_bridges_two_voltage_levels() {
    let session = ready_session(
        br#"
<SCL version="2007">
  <Substation name="SS1">
    <PowerTransformer name="T1" type="PTR">
      <TransformerWinding name="W1" type="PTW">
        <TapChanger name="LTC1" type="LTC"/>
        <Terminal name="T1" connectivityNode="SS1/HV/B1/BB_H"/>
      </TransformerWinding>
      <TransformerWinding name="W2" type="PTW">
        <Terminal name="T1" connectivityNode="SS1/MV/B1/BB_M"/>
      </TransformerWinding>
    </PowerTransformer>
    <VoltageLevel name="HV">
      <Bay name="B1">
        <ConnectivityNode name="BB_H" pathName="SS1/HV/B1/BB_H"/>
        <ConductingEquipment name="T1" type="PTR">
          <Terminal name="T1" connectivityNode="SS1/HV/B1/BB_H"/>
          <Terminal name="T2" connectivityNode="SS1/MV/B1/BB_M"/>
        </ConductingEquipment>
      </Bay>
    </VoltageLevel>
    <VoltageLevel name="MV">
      <Bay name="B1">
        <ConnectivityNode name="BB_M" pathName="SS1/MV/B1/BB_M"/>
      </Bay>
    </VoltageLevel>
  </Substation>
</SCL>
"#,
    );

    let plan = session.plan().unwrap();
    assert_eq!(plan.buses.len(), 2);

    // Transformer link across the levels.
    assert_eq!(plan.transformers.len(), 1);
    let link = &plan.transformers[0];
    assert_eq!(link.vl_a.as_ref(), "HV");
    assert_eq!(link.vl_b.as_ref(), "MV");

    // One synthetic Transformer-endpoint feeder per bus.
    assert_eq!(plan.feeders.len(), 2);
    let buses: BTreeSet<_> = plan.feeders.iter().map(|f| f.bus_id.clone()).collect();
    assert_eq!(buses.len(), 2);
    for feeder in &plan.feeders {
        assert_eq!(feeder.endpoint_type, EquipmentKind::Transformer);
        assert_eq!(feeder.chain, vec!["TR:SS1/T1".to_string()]);
        assert!(feeder.id.contains("#TR#T1#"));
    }

    // Transformer summary: both buses, tap changer seen.
    assert_eq!(plan.plan_transformers.len(), 1);
    let summary = &plan.plan_transformers[0];
    assert_eq!(summary.buses.len(), 2);
    assert!(summary.has_tap_changer);

    assert_plan_invariants(&session);
}

/// S5: one terminal wired by absolute path, the other by local name — a
/// single CN node with two incoming edges.
#[test]
fn mixed_reference_styles_canonicalize_to_one_cn() {
    let session = ready_session(
        br#"
<SCL version="2007">
  <Substation name="SS1">
    <VoltageLevel name="E1">
      <Bay name="B1">
        <ConnectivityNode name="N1" pathName="SS1/E1/B1/N1"/>
        <ConductingEquipment name="A" type="CBR">
          <Terminal name="T1" connectivityNode="SS1/E1/B1/N1"/>
        </ConductingEquipment>
        <ConductingEquipment name="B" type="DIS">
          <Terminal name="T1" cNodeName="N1"/>
        </ConductingEquipment>
      </Bay>
    </VoltageLevel>
  </Substation>
</SCL>
"#,
    );

    let raw = session.raw_graph().unwrap();
    let cn_count = raw
        .node_indices()
        .filter(|&i| raw.graph[i].kind == NodeKind::ConnectivityNode)
        .count();
    assert_eq!(cn_count, 1);
    assert!(raw.node("CN:SS1/E1/B1/N1").is_some());
    assert_eq!(raw.edge_count(), 2);
    assert_plan_invariants(&session);
}

/// S6: a GSE binding naming a control block that does not exist — the load
/// still succeeds, with a diagnostic pointing at LN0.GSEControl.
#[test]
fn dangling_gse_binding_yields_diagnostic() {
    let mut session = SldSession::new();
    session
        .load_buffer(
            br#"
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
        <GSE ldInst="LD1" cbName="CB_X">
          <Address><P type="MAC-Address">01-0C-CD-01-00-02</P></Address>
        </GSE>
      </ConnectedAP>
    </SubNetwork>
  </Communication>
</SCL>
"#,
        )
        .unwrap();

    let matching: Vec<_> = session
        .diagnostics()
        .iter()
        .filter(|i| {
            i.location.as_deref() == Some("LN0.GSEControl") && i.message.contains("CB_X")
        })
        .collect();
    assert_eq!(matching.len(), 1);

    // The session still reaches ready.
    session.build().unwrap();
}

/// Determinism: two sessions over the same bytes emit identical JSON;
/// reset + reload reproduces the plan.
#[test]
fn plan_json_is_deterministic_and_idempotent() {
    let doc = br#"
<SCL version="2007">
  <Substation name="SS1">
    <VoltageLevel name="E1">
      <Bay name="B1">
        <ConnectivityNode name="BB1" pathName="SS1/E1/B1/BB1"/>
        <ConnectivityNode name="BB2" pathName="SS1/E1/B1/BB2"/>
        <ConductingEquipment name="Q0" type="CBR">
          <Terminal name="T1" connectivityNode="SS1/E1/B1/BB1"/>
          <Terminal name="T2" connectivityNode="SS1/E1/B1/BB2"/>
        </ConductingEquipment>
        <ConductingEquipment name="QS1" type="DIS">
          <Terminal name="T1" connectivityNode="SS1/E1/B1/BB1"/>
          <Terminal name="T2" cNodeName="M"/>
        </ConductingEquipment>
        <ConductingEquipment name="LN1" type="LINE">
          <Terminal name="T1" cNodeName="M"/>
        </ConductingEquipment>
      </Bay>
    </VoltageLevel>
  </Substation>
</SCL>
"#;

    let first = ready_session(doc);
    let second = ready_session(doc);
    assert_eq!(first.plan_json(), second.plan_json());
    assert_eq!(first.raw_json(), second.raw_json());
    assert_eq!(first.condensed_json(), second.condensed_json());

    let mut session = SldSession::new();
    session.load_buffer(doc).unwrap();
    session.build().unwrap();
    let before = session.plan_json();
    session.reset();
    session.load_buffer(doc).unwrap();
    session.build().unwrap();
    assert_eq!(session.plan_json(), before);

    assert_plan_invariants(&first);
}

/// Plan ordering: buses sorted by (vl, label) and lanes per bus key.
#[test]
fn buses_sort_by_level_then_label() {
    let session = ready_session(
        br#"
<SCL version="2007">
  <Substation name="SS1">
    <VoltageLevel name="MV">
      <Bay name="B1">
        <ConnectivityNode name="BB_Z" pathName="SS1/MV/B1/BB_Z"/>
      </Bay>
    </VoltageLevel>
    <VoltageLevel name="HV">
      <Bay name="B1">
        <ConnectivityNode name="BB_A" pathName="SS1/HV/B1/BB_A"/>
      </Bay>
    </VoltageLevel>
  </Substation>
</SCL>
"#,
    );

    let plan = session.plan().unwrap();
    let labels: Vec<_> = plan.buses.iter().map(|b| b.label.clone()).collect();
    assert_eq!(labels, vec!["HV-BB_A", "MV-BB_Z"]);
    assert_eq!(
        plan.rank_top_bus.get("SS1:HV").map(Vec::len),
        Some(1)
    );
    assert_eq!(
        plan.rank_top_bus.get("SS1:MV").map(Vec::len),
        Some(1)
    );
}
