//! Non-fatal issue collection.
//!
//! Real SCL exports are full of small inconsistencies: a GOOSE binding
//! naming a control block nobody declared, a winding terminal pointing at a
//! connectivity node that does not exist, a disconnector bridging two
//! voltage levels. None of these may abort a load — the session records
//! them here and still reaches `ready`. Structural failures that do abort
//! live in [`crate::error`] instead.
//!
//! Every issue carries the fields collaborators see in the diagnostics
//! array: a severity, a short grouping `code` (`"parse"`, `"reference"`,
//! `"structure"`, `"cluster"`, `"coupler"`), the message, and optionally a
//! document `location` such as `"LN0.GSEControl"` and a repair `hint`.
//!
//! ```
//! use sld_core::diagnostics::{DiagnosticIssue, Diagnostics, Severity};
//!
//! let mut diag = Diagnostics::new();
//! diag.warn_at("reference", "Dataset not found for GSE/SMV control GoCB1", "LN0.GSEControl");
//! diag.report(
//!     DiagnosticIssue::error("parse", "Voltage value is not numeric")
//!         .at("VoltageLevel.Voltage")
//!         .suggest("check the Voltage element text"),
//! );
//!
//! assert_eq!(diag.count(Severity::Warning), 1);
//! assert!(diag.has_errors());
//! ```

use serde::Serialize;

/// How bad an issue is. Errors mean an element or cross-reference could not
/// be resolved; warnings mean something was defaulted or skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

impl Severity {
    pub fn label(self) -> &'static str {
        match self {
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

/// One recorded issue.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticIssue {
    pub severity: Severity,
    /// Short grouping code, e.g. `"reference"` or `"cluster"`.
    pub code: String,
    pub message: String,
    /// Place in the document the issue points at, e.g. `"LN0.GSEControl"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Suggestion for repairing the input.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl DiagnosticIssue {
    pub fn warning(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::tagged(Severity::Warning, code, message)
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::tagged(Severity::Error, code, message)
    }

    fn tagged(severity: Severity, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity,
            code: code.into(),
            message: message.into(),
            location: None,
            hint: None,
        }
    }

    /// Pin the issue to a place in the document.
    pub fn at(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Attach a repair suggestion.
    pub fn suggest(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl std::fmt::Display for DiagnosticIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}[{}] {}",
            self.severity.label(),
            self.code,
            self.message
        )?;
        if let Some(location) = &self.location {
            write!(f, " @ {location}")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " (hint: {hint})")?;
        }
        Ok(())
    }
}

/// Issues accumulated over one session, in discovery order.
///
/// Serializes as a plain array, which is the shape collaborators receive
/// next to an error object after a load.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Diagnostics {
    issues: Vec<DiagnosticIssue>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a fully-built issue.
    pub fn report(&mut self, issue: DiagnosticIssue) {
        self.issues.push(issue);
    }

    pub fn warn(&mut self, code: &str, message: impl Into<String>) {
        self.report(DiagnosticIssue::warning(code, message));
    }

    pub fn warn_at(&mut self, code: &str, message: impl Into<String>, location: &str) {
        self.report(DiagnosticIssue::warning(code, message).at(location));
    }

    pub fn error(&mut self, code: &str, message: impl Into<String>) {
        self.report(DiagnosticIssue::error(code, message));
    }

    pub fn error_at(&mut self, code: &str, message: impl Into<String>, location: &str) {
        self.report(DiagnosticIssue::error(code, message).at(location));
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DiagnosticIssue> {
        self.issues.iter()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// Number of issues at the given severity.
    pub fn count(&self, severity: Severity) -> usize {
        self.with_severity(severity).count()
    }

    pub fn has_errors(&self) -> bool {
        self.with_severity(Severity::Error).next().is_some()
    }

    /// Issues sharing a grouping code.
    pub fn with_code<'a>(&'a self, code: &'a str) -> impl Iterator<Item = &'a DiagnosticIssue> {
        self.iter().filter(move |issue| issue.code == code)
    }

    /// Issues at one severity.
    pub fn with_severity(&self, severity: Severity) -> impl Iterator<Item = &DiagnosticIssue> {
        self.iter().filter(move |issue| issue.severity == severity)
    }

    /// Drop everything (session reset).
    pub fn clear(&mut self) {
        self.issues.clear();
    }
}

impl std::fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.issues.is_empty() {
            return write!(f, "no issues");
        }
        write!(
            f,
            "{} error(s), {} warning(s)",
            self.count(Severity::Error),
            self.count(Severity::Warning)
        )?;
        for issue in &self.issues {
            write!(f, "\n  {issue}")?;
        }
        Ok(())
    }
}
