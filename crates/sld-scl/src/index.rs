//! Cross-reference indexes over a parsed SCL model.
//!
//! Connectivity-node references appear in three styles in real documents:
//! absolute `pathName`s, composed `"<SS>/<VL>/<BAY>/<name>"` paths, and bare
//! local names. The index therefore keeps three key flavors per CN — the
//! full path, the colon-separated logical key, and the suffix (local name)
//! — so a reference written in any style resolves.
//!
//! The builder also derives the communication endpoints (GOOSE, Sampled
//! Values, MMS) by cross-joining `ConnectedAP` bindings with the LN0 control
//! blocks of the referenced logical devices. Gaps in those cross-references
//! are diagnostics, never fatal.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use sld_core::{
    CnLocation, Diagnostics, Interner, LNodeRef, ResolvedLNode, SclModel, SldError, SldResult,
};
use tracing::debug;

/// Derived GOOSE publication endpoint, keyed by `"<ied>|<ld>|<cb>"`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GseEndpoint {
    pub ied_name: String,
    pub ld_inst: String,
    pub cb_name: String,
    pub mac: String,
    pub app_id: String,
    pub vlan_id: String,
    pub vlan_prio: String,
    pub dataset_ref: String,
}

/// Derived Sampled-Values endpoint, keyed by `"<ied>|<ld>|<cb>"`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SvEndpoint {
    pub ied_name: String,
    pub ld_inst: String,
    pub cb_name: String,
    pub mac: String,
    pub app_id: String,
    pub vlan_id: String,
    pub vlan_prio: String,
    pub smp_rate: String,
    pub dataset_ref: String,
}

/// Derived MMS endpoint, keyed by `"<ied>|<ap>"`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MmsEndpoint {
    pub ied_name: String,
    pub ap_name: String,
    pub ip: String,
    pub port: String,
}

/// One CE↔CN adjacency row for the topology debug surface.
#[derive(Debug, Clone, Serialize)]
pub struct TopologyEdge {
    pub ss: String,
    pub vl: String,
    pub bay: String,
    pub equipment: String,
    pub terminal: String,
    pub cn_path: String,
}

/// Indexes and derived endpoints over one [`SclModel`].
#[derive(Debug, Default)]
pub struct SclIndex {
    /// IED name → position in `model.ieds`.
    pub ied_by_name: BTreeMap<String, usize>,
    /// Full path (pathName or composed) → CN arena location.
    pub cn_by_path: BTreeMap<String, CnLocation>,
    /// Logical key `"SS:VL:BAY:CN"` → CN arena location.
    pub cn_by_key: BTreeMap<String, CnLocation>,
    /// Last path segment → all full paths ending in it.
    pub cn_by_suffix: BTreeMap<String, Vec<String>>,
    /// Primary-entity path ("SS", "SS/VL", "SS/VL/BAY", "SS/VL/BAY/CE") →
    /// attached logical-node references.
    pub lnodes_by_primary: BTreeMap<String, Vec<LNodeRef>>,
    /// Logical-node key `"ied|ld|prefix|class|inst"` → primary paths.
    pub primary_by_lnode: BTreeMap<String, Vec<String>>,
    pub gse_endpoints: BTreeMap<String, GseEndpoint>,
    pub sv_endpoints: BTreeMap<String, SvEndpoint>,
    pub mms_endpoints: BTreeMap<String, MmsEndpoint>,
    /// Reverse of `cn_by_path`: arena location → canonical full path.
    path_by_location: HashMap<CnLocation, String>,
}

/// Full path of a declared CN: the `pathName` attribute when present, else
/// the composed `"<ss>/<vl>/<bay>/<name>"`.
pub fn cn_full_path(ss: &str, vl: &str, bay: &str, name: &str, path_name: &str) -> String {
    if path_name.is_empty() {
        format!("{ss}/{vl}/{bay}/{name}")
    } else {
        path_name.to_string()
    }
}

/// Colon-separated logical key, independent of `pathName` spelling.
pub fn logical_key(ss: &str, vl: &str, bay: &str, name: &str) -> String {
    format!("{ss}:{vl}:{bay}:{name}")
}

/// Last `/`-delimited segment of a path.
pub fn suffix_of(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Endpoint key `"<ied>|<ld>|<cb>"`.
pub fn endpoint_key(ied: &str, ld: &str, cb: &str) -> String {
    format!("{ied}|{ld}|{cb}")
}

fn lnode_key(r: &LNodeRef) -> String {
    format!(
        "{}|{}|{}|{}|{}",
        r.ied_name, r.ld_inst, r.prefix, r.ln_class, r.ln_inst
    )
}

impl SclIndex {
    /// Build all indexes for `model`, interning repeated names into `interner`
    /// and accumulating cross-reference gaps into `diag`.
    pub fn build(model: &SclModel, interner: &mut Interner, diag: &mut Diagnostics) -> Self {
        let mut index = SclIndex::default();

        for (si, ss) in model.substations.iter().enumerate() {
            interner.intern(&ss.name);
            index.record_lnodes(ss.name.clone(), &ss.lnodes);

            for (vi, vl) in ss.voltage_levels.iter().enumerate() {
                interner.intern(&vl.name);
                index.record_lnodes(format!("{}/{}", ss.name, vl.name), &vl.lnodes);

                for (bi, bay) in vl.bays.iter().enumerate() {
                    interner.intern(&bay.name);
                    let bay_path = format!("{}/{}/{}", ss.name, vl.name, bay.name);
                    index.record_lnodes(bay_path.clone(), &bay.lnodes);

                    for (ci, cn) in bay.connectivity_nodes.iter().enumerate() {
                        let location = CnLocation {
                            substation: si,
                            voltage_level: vi,
                            bay: bi,
                            cn: ci,
                        };
                        let path =
                            cn_full_path(&ss.name, &vl.name, &bay.name, &cn.name, &cn.path_name);
                        index.cn_by_path.entry(path.clone()).or_insert(location);
                        index
                            .cn_by_key
                            .entry(logical_key(&ss.name, &vl.name, &bay.name, &cn.name))
                            .or_insert(location);
                        index
                            .path_by_location
                            .entry(location)
                            .or_insert_with(|| path.clone());
                        index
                            .cn_by_suffix
                            .entry(suffix_of(&path).to_string())
                            .or_default()
                            .push(path);
                    }

                    for ce in &bay.equipments {
                        index.record_lnodes(format!("{}/{}", bay_path, ce.name), &ce.lnodes);
                    }
                }
            }
        }

        for (ii, ied) in model.ieds.iter().enumerate() {
            index.ied_by_name.entry(ied.name.clone()).or_insert(ii);
        }

        index.derive_endpoints(model, diag);

        debug!(
            cns = index.cn_by_path.len(),
            ieds = index.ied_by_name.len(),
            gse = index.gse_endpoints.len(),
            sv = index.sv_endpoints.len(),
            mms = index.mms_endpoints.len(),
            "SCL indexes built"
        );
        index
    }

    fn record_lnodes(&mut self, primary: String, refs: &[LNodeRef]) {
        if refs.is_empty() {
            return;
        }
        for r in refs {
            self.primary_by_lnode
                .entry(lnode_key(r))
                .or_default()
                .push(primary.clone());
        }
        self.lnodes_by_primary
            .entry(primary)
            .or_default()
            .extend(refs.iter().cloned());
    }

    fn derive_endpoints(&mut self, model: &SclModel, diag: &mut Diagnostics) {
        for sn in &model.communication.sub_networks {
            for cap in &sn.connected_aps {
                if let Some(ip) = cap.address.get("IP") {
                    self.mms_endpoints.insert(
                        format!("{}|{}", cap.ied_name, cap.ap_name),
                        MmsEndpoint {
                            ied_name: cap.ied_name.clone(),
                            ap_name: cap.ap_name.clone(),
                            ip: ip.clone(),
                            port: cap
                                .address
                                .get("Port")
                                .cloned()
                                .unwrap_or_else(|| "102".to_string()),
                        },
                    );
                }

                for binding in &cap.gse_bindings {
                    let mut endpoint = GseEndpoint {
                        ied_name: cap.ied_name.clone(),
                        ld_inst: binding.ld_inst.clone(),
                        cb_name: binding.cb_name.clone(),
                        mac: addr(&binding.address, "MAC-Address"),
                        app_id: addr(&binding.address, "APPID"),
                        vlan_id: addr(&binding.address, "VLAN-ID"),
                        vlan_prio: addr(&binding.address, "VLAN-PRIORITY"),
                        dataset_ref: String::new(),
                    };
                    if let Some((dataset, _)) = self.find_control(
                        model,
                        &cap.ied_name,
                        &binding.ld_inst,
                        &binding.cb_name,
                        ControlKind::Gse,
                        diag,
                    ) {
                        endpoint.dataset_ref = dataset;
                    }
                    self.gse_endpoints.insert(
                        endpoint_key(&cap.ied_name, &binding.ld_inst, &binding.cb_name),
                        endpoint,
                    );
                }

                for binding in &cap.sv_bindings {
                    let mut endpoint = SvEndpoint {
                        ied_name: cap.ied_name.clone(),
                        ld_inst: binding.ld_inst.clone(),
                        cb_name: binding.cb_name.clone(),
                        mac: addr(&binding.address, "MAC-Address"),
                        app_id: addr(&binding.address, "APPID"),
                        vlan_id: addr(&binding.address, "VLAN-ID"),
                        vlan_prio: addr(&binding.address, "VLAN-PRIORITY"),
                        smp_rate: String::new(),
                        dataset_ref: String::new(),
                    };
                    if let Some((dataset, smp_rate)) = self.find_control(
                        model,
                        &cap.ied_name,
                        &binding.ld_inst,
                        &binding.cb_name,
                        ControlKind::Sv,
                        diag,
                    ) {
                        endpoint.dataset_ref = dataset;
                        endpoint.smp_rate = smp_rate;
                    }
                    self.sv_endpoints.insert(
                        endpoint_key(&cap.ied_name, &binding.ld_inst, &binding.cb_name),
                        endpoint,
                    );
                }
            }
        }
    }

    /// Dataset reference (and sample rate, for SV) of a bound control block.
    fn find_control(
        &self,
        model: &SclModel,
        ied_name: &str,
        ld_inst: &str,
        cb_name: &str,
        kind: ControlKind,
        diag: &mut Diagnostics,
    ) -> Option<(String, String)> {
        let Some(ied_pos) = self.ied_by_name.get(ied_name) else {
            diag.warn_at(
                "reference",
                format!("LDevice not found: {ied_name}/{ld_inst}"),
                kind.binding_location(),
            );
            return None;
        };
        let Some(ld) = model.ieds[*ied_pos].find_logical_device(ld_inst) else {
            diag.warn_at(
                "reference",
                format!("LDevice not found: {ied_name}/{ld_inst}"),
                kind.binding_location(),
            );
            return None;
        };
        let control = match kind {
            ControlKind::Gse => ld
                .ln0
                .gse_controls
                .iter()
                .find(|ctl| ctl.name == cb_name)
                .map(|ctl| (ctl.dataset.clone(), String::new())),
            ControlKind::Sv => ld
                .ln0
                .sv_controls
                .iter()
                .find(|ctl| ctl.name == cb_name)
                .map(|ctl| (ctl.dataset.clone(), ctl.smp_rate.clone())),
        };
        if control.is_none() {
            diag.warn_at(
                "reference",
                format!("Dataset not found for GSE/SMV control {cb_name}"),
                kind.control_location(),
            );
        }
        control
    }

    /// Substation position by name.
    pub fn find_substation(&self, model: &SclModel, name: &str) -> Option<usize> {
        model.substations.iter().position(|ss| ss.name == name)
    }

    /// IED position by name.
    pub fn find_ied(&self, name: &str) -> Option<usize> {
        self.ied_by_name.get(name).copied()
    }

    /// Resolve a logical-node reference into arena indices.
    pub fn resolve_lnode_ref(&self, model: &SclModel, r: &LNodeRef) -> SldResult<ResolvedLNode> {
        let ied_pos = self
            .find_ied(&r.ied_name)
            .ok_or_else(|| SldError::InvalidPath(format!("IED '{}' not found", r.ied_name)))?;
        let ied = &model.ieds[ied_pos];

        let (ld_pos, ld) = ied
            .logical_devices()
            .enumerate()
            .find(|(_, ld)| ld.inst == r.ld_inst)
            .ok_or_else(|| {
                SldError::InvalidPath(format!(
                    "LDevice '{}' not found in IED '{}'",
                    r.ld_inst, r.ied_name
                ))
            })?;

        let ln_pos = ld
            .logical_nodes
            .iter()
            .position(|ln| {
                ln.ln_class == r.ln_class
                    && ln.inst == r.ln_inst
                    && (r.prefix.is_empty() || ln.prefix == r.prefix)
            })
            .ok_or_else(|| {
                SldError::InvalidPath(format!(
                    "LN '{}{}{}' not found in {}/{}",
                    r.prefix, r.ln_class, r.ln_inst, r.ied_name, r.ld_inst
                ))
            })?;

        Ok(ResolvedLNode {
            ied: ied_pos,
            logical_device: ld_pos,
            logical_node: ln_pos,
        })
    }

    /// Declared CN behind a path reference: the exact `cn_by_path` key
    /// first, else the logical key of the path's last four segments (which
    /// resolves composed-style references against `pathName`-declared CNs
    /// and vice versa).
    pub fn location_of(&self, path: &str) -> Option<CnLocation> {
        if let Some(location) = self.cn_by_path.get(path) {
            return Some(*location);
        }
        let (ss, vl, bay, cn) = tail4(path)?;
        self.cn_by_key.get(&logical_key(ss, vl, bay, cn)).copied()
    }

    /// Canonical full path of a declared CN (its `cn_by_path` key).
    pub fn declared_path(&self, location: CnLocation) -> Option<&str> {
        self.path_by_location.get(&location).map(String::as_str)
    }

    /// Whether two CN path references denote the same node, used by the raw
    /// graph builder when a terminal reference misses the exact indexes.
    ///
    /// Identical strings always match. When both references resolve to
    /// declared CNs, the arena locations decide. Otherwise the local names
    /// must agree AND both paths must sit under the same substation and
    /// voltage level; a shared local name in an unrelated part of the plant
    /// never unifies.
    pub fn cn_matches(&self, a: &str, b: &str) -> bool {
        if a == b {
            return true;
        }
        if let (Some(la), Some(lb)) = (self.location_of(a), self.location_of(b)) {
            return la == lb;
        }
        suffix_of(a) == suffix_of(b)
            && matches!(
                (path_scope(a), path_scope(b)),
                (Some(sa), Some(sb)) if sa == sb
            )
    }
}

/// Last four non-empty segments of a path, as `(ss, vl, bay, cn)`.
fn tail4(path: &str) -> Option<(&str, &str, &str, &str)> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.len() < 4 {
        return None;
    }
    let n = segments.len();
    Some((
        segments[n - 4],
        segments[n - 3],
        segments[n - 2],
        segments[n - 1],
    ))
}

/// `(ss, vl)` context of an absolute CN path. Paths with fewer than four
/// segments have no derivable scope.
fn path_scope(path: &str) -> Option<(&str, &str)> {
    tail4(path).map(|(ss, vl, _, _)| (ss, vl))
}

enum ControlKind {
    Gse,
    Sv,
}

impl ControlKind {
    fn binding_location(&self) -> &'static str {
        match self {
            ControlKind::Gse => "Communication.GSE",
            ControlKind::Sv => "Communication.SMV",
        }
    }

    fn control_location(&self) -> &'static str {
        match self {
            ControlKind::Gse => "LN0.GSEControl",
            ControlKind::Sv => "LN0.SMVControl",
        }
    }
}

fn addr(map: &BTreeMap<String, String>, key: &str) -> String {
    map.get(key).cloned().unwrap_or_default()
}

/// Every CE↔CN adjacency implied by wired terminals, in document order.
pub fn topology_edges(model: &SclModel) -> Vec<TopologyEdge> {
    let mut edges = Vec::new();
    for ss in &model.substations {
        for vl in &ss.voltage_levels {
            for bay in &vl.bays {
                for ce in &bay.equipments {
                    for terminal in &ce.terminals {
                        if !terminal.is_wired() {
                            continue;
                        }
                        let cn_path = if terminal.connectivity_node_ref.is_empty() {
                            format!(
                                "{}/{}/{}/{}",
                                ss.name, vl.name, bay.name, terminal.c_node_name
                            )
                        } else {
                            terminal.connectivity_node_ref.clone()
                        };
                        edges.push(TopologyEdge {
                            ss: ss.name.clone(),
                            vl: vl.name.clone(),
                            bay: bay.name.clone(),
                            equipment: ce.name.clone(),
                            terminal: terminal.name.clone(),
                            cn_path,
                        });
                    }
                }
            }
        }
    }
    edges
}
