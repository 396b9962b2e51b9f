//! Session: owns one loaded document, its indexes, graphs and plan.
//!
//! State machine: `Empty → Indexed → Ready`. `load` parses and indexes in
//! one step (a failed load leaves the session empty — no partial model is
//! ever exposed); `build` synthesizes the plan; `reset` drops everything.
//! Rebuilding discards the prior graphs but leaves the model intact.
//!
//! JSON accessors never fail: before the matching state is reached they
//! return the empty skeleton of their contract, mirroring what a renderer
//! expects while a document is still loading.

use std::path::Path;

use sld_core::{Diagnostics, Interner, SclModel, SldError, SldResult};
use sld_scl::{parser, SclIndex};
use tracing::info;

use crate::cluster::find_clusters;
use crate::condense::condense;
use crate::config::Heuristics;
use crate::coupler::detect_couplers;
use crate::feeder::walk_feeders;
use crate::graph::SldGraph;
use crate::json;
use crate::plan::SldPlan;
use crate::raw::build_raw_graph;
use crate::transformer::{detect_transformer_links, integrate_power_transformers};

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing loaded.
    Empty,
    /// Model parsed but not yet indexed (transient inside `load`).
    Loaded,
    /// Model parsed and indexed; ready to build.
    Indexed,
    /// Plan available.
    Ready,
}

/// One engine session.
pub struct SldSession {
    heuristics: Heuristics,
    state: SessionState,
    interner: Interner,
    diagnostics: Diagnostics,
    model: Option<SclModel>,
    index: Option<SclIndex>,
    raw: Option<SldGraph>,
    plan: Option<SldPlan>,
}

impl Default for SldSession {
    fn default() -> Self {
        Self::new()
    }
}

impl SldSession {
    pub fn new() -> Self {
        Self::with_heuristics(Heuristics::default())
    }

    pub fn with_heuristics(heuristics: Heuristics) -> Self {
        Self {
            heuristics,
            state: SessionState::Empty,
            interner: Interner::new(),
            diagnostics: Diagnostics::new(),
            model: None,
            index: None,
            raw: None,
            plan: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Load and index an SCL file. Any prior content is discarded first.
    pub fn load(&mut self, path: impl AsRef<Path>) -> SldResult<()> {
        self.reset();
        let model = parser::parse_path(path)?;
        self.adopt(model);
        Ok(())
    }

    /// Load and index an SCL document from memory.
    pub fn load_buffer(&mut self, bytes: &[u8]) -> SldResult<()> {
        self.reset();
        let model = parser::parse_bytes(bytes)?;
        self.adopt(model);
        Ok(())
    }

    fn adopt(&mut self, model: SclModel) {
        self.state = SessionState::Loaded;
        model.validate_into(&mut self.diagnostics);
        let index = SclIndex::build(&model, &mut self.interner, &mut self.diagnostics);
        self.model = Some(model);
        self.index = Some(index);
        self.state = SessionState::Indexed;
    }

    /// Build (or rebuild) the plan. Prior graphs are discarded.
    pub fn build(&mut self) -> SldResult<()> {
        let (Some(model), Some(index)) = (self.model.as_ref(), self.index.as_ref()) else {
            return Err(SldError::LogicError("SCL not loaded".to_string()));
        };

        self.raw = None;
        self.plan = None;

        let raw = build_raw_graph(model, index, &mut self.interner);
        let clusters = find_clusters(&raw, &self.heuristics, &mut self.diagnostics);
        let mut condensed = condense(&raw, &clusters);
        let couplers = detect_couplers(&condensed, &mut self.diagnostics);
        let mut feeders = walk_feeders(&raw, &condensed, &clusters, &self.heuristics);
        let transformers = detect_transformer_links(&raw, &clusters);
        let plan_transformers =
            integrate_power_transformers(model, &clusters, &mut condensed, &mut feeders);

        let mut plan = SldPlan {
            condensed,
            buses: clusters.clusters,
            feeders,
            couplers,
            transformers,
            plan_transformers,
            ..SldPlan::default()
        };
        plan.order();

        info!(stats = %plan.stats(), "SLD plan built");
        self.raw = Some(raw);
        self.plan = Some(plan);
        self.state = SessionState::Ready;
        Ok(())
    }

    /// Drop everything and return to `Empty`. Never fails.
    pub fn reset(&mut self) {
        self.model = None;
        self.index = None;
        self.raw = None;
        self.plan = None;
        self.diagnostics.clear();
        self.interner = Interner::new();
        self.state = SessionState::Empty;
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn model(&self) -> SldResult<&SclModel> {
        self.model
            .as_ref()
            .ok_or_else(|| SldError::LogicError("SCL not loaded".to_string()))
    }

    pub fn index(&self) -> SldResult<&SclIndex> {
        self.index
            .as_ref()
            .ok_or_else(|| SldError::LogicError("SCL not loaded".to_string()))
    }

    pub fn raw_graph(&self) -> SldResult<&SldGraph> {
        self.raw
            .as_ref()
            .ok_or_else(|| SldError::LogicError("plan not built".to_string()))
    }

    pub fn condensed_graph(&self) -> SldResult<&SldGraph> {
        self.plan().map(|plan| &plan.condensed)
    }

    pub fn plan(&self) -> SldResult<&SldPlan> {
        self.plan
            .as_ref()
            .ok_or_else(|| SldError::LogicError("plan not built".to_string()))
    }

    /// Accumulated non-fatal issues; available in every state.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    // ------------------------------------------------------------------
    // JSON surfaces (never fail)
    // ------------------------------------------------------------------

    pub fn raw_json(&self) -> String {
        match &self.raw {
            Some(raw) => json::graph_json(raw),
            None => "{}".to_string(),
        }
    }

    pub fn condensed_json(&self) -> String {
        match &self.plan {
            Some(plan) => json::graph_json(&plan.condensed),
            None => json::graph_json(&SldGraph::new()),
        }
    }

    pub fn plan_json(&self) -> String {
        match &self.plan {
            Some(plan) => json::plan_json(plan),
            None => json::plan_json(&SldPlan::default()),
        }
    }

    pub fn substations_json(&self) -> String {
        match &self.model {
            Some(model) => json::substations_json(model),
            None => "{}".to_string(),
        }
    }

    pub fn communication_json(&self) -> String {
        match (&self.model, &self.index) {
            (Some(model), Some(index)) => json::communication_json(model, index),
            _ => "{}".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &[u8] = br#"
<SCL version="2007">
  <Substation name="SS1">
    <VoltageLevel name="E1">
      <Bay name="B1">
        <ConnectivityNode name="BB1" pathName="SS1/E1/B1/BB1"/>
        <ConnectivityNode name="M" pathName="SS1/E1/B1/M"/>
        <ConductingEquipment name="QS1" type="DIS">
          <Terminal name="T1" connectivityNode="SS1/E1/B1/BB1"/>
          <Terminal name="T2" connectivityNode="SS1/E1/B1/M"/>
        </ConductingEquipment>
        <ConductingEquipment name="LN1" type="LINE">
          <Terminal name="T1" connectivityNode="SS1/E1/B1/M"/>
        </ConductingEquipment>
      </Bay>
    </VoltageLevel>
  </Substation>
</SCL>
"#;

    #[test]
    fn test_state_machine() {
        let mut session = SldSession::new();
        assert_eq!(session.state(), SessionState::Empty);

        // build before load is a logic error and does not change state.
        let err = session.build().unwrap_err();
        assert!(matches!(err, SldError::LogicError(_)));
        assert!(err.to_string().contains("SCL not loaded"));
        assert_eq!(session.state(), SessionState::Empty);

        session.load_buffer(DOC).unwrap();
        assert_eq!(session.state(), SessionState::Indexed);
        assert!(session.model().is_ok());
        assert!(session.plan().is_err());

        session.build().unwrap();
        assert_eq!(session.state(), SessionState::Ready);
        assert!(session.plan().is_ok());
        assert!(session.raw_graph().is_ok());
        assert!(session.condensed_graph().is_ok());

        session.reset();
        assert_eq!(session.state(), SessionState::Empty);
        assert!(session.model().is_err());
    }

    #[test]
    fn test_json_defaults_before_ready() {
        let session = SldSession::new();
        assert_eq!(session.raw_json(), "{}");
        let condensed: serde_json::Value =
            serde_json::from_str(&session.condensed_json()).unwrap();
        assert!(condensed["nodes"].as_array().unwrap().is_empty());
        let plan: serde_json::Value = serde_json::from_str(&session.plan_json()).unwrap();
        assert!(plan["buses"].as_array().unwrap().is_empty());
        assert_eq!(session.substations_json(), "{}");
    }

    #[test]
    fn test_failed_load_leaves_session_empty() {
        let mut session = SldSession::new();
        session.load_buffer(DOC).unwrap();
        assert_eq!(session.state(), SessionState::Indexed);

        let err = session.load_buffer(b"<Broken").unwrap_err();
        assert!(matches!(err, SldError::XmlParse(_)));
        assert_eq!(session.state(), SessionState::Empty);
        assert!(session.model().is_err());
    }

    #[test]
    fn test_rebuild_discards_prior_plan() {
        let mut session = SldSession::new();
        session.load_buffer(DOC).unwrap();
        session.build().unwrap();
        let first = session.plan_json();
        session.build().unwrap();
        assert_eq!(session.plan_json(), first);
    }

    #[test]
    fn test_load_from_tempfile() {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(DOC).unwrap();

        let mut session = SldSession::new();
        session.load(file.path()).unwrap();
        session.build().unwrap();
        assert_eq!(session.plan().unwrap().buses.len(), 1);

        let missing = SldSession::new().load("/no/such/file.scd");
        assert!(matches!(missing.unwrap_err(), SldError::FileNotFound(_)));
    }
}
