//! Unified error type for the SLD engine.
//!
//! Every fallible operation across the workspace returns [`SldResult`]; the
//! variants mirror the coded failure modes surfaced to collaborators
//! (file access, XML structure, mandatory fields, session misuse).
//!
//! # Example
//!
//! ```ignore
//! use sld_core::{SldError, SldResult};
//!
//! fn load(path: &str) -> SldResult<()> {
//!     let model = parse_scl(path)?;
//!     build_indexes(&model)?;
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// Unified error type for SCL loading and SLD synthesis.
#[derive(Error, Debug)]
pub enum SldError {
    /// The given path does not exist or is unreadable
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// Malformed XML or missing `<SCL>` root
    #[error("XML parse error: {0}")]
    XmlParse(String),

    /// SCL schema revision outside the supported range
    #[error("Schema not supported: {0}")]
    SchemaNotSupported(String),

    /// A numbered element is missing a required attribute
    #[error("Missing mandatory field: {0}")]
    MissingMandatoryField(String),

    /// A connectivity or object path could not be interpreted
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Operation invoked in the wrong session state
    #[error("Logic error: {0}")]
    LogicError(String),

    /// I/O errors other than a missing file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for Results using SldError.
pub type SldResult<T> = Result<T, SldError>;

impl SldError {
    /// Stable machine-readable code for collaborators (JSON error objects).
    pub fn code(&self) -> &'static str {
        match self {
            SldError::FileNotFound(_) => "file-not-found",
            SldError::XmlParse(_) => "xml-parse-error",
            SldError::SchemaNotSupported(_) => "schema-not-supported",
            SldError::MissingMandatoryField(_) => "missing-mandatory-field",
            SldError::InvalidPath(_) => "invalid-path",
            SldError::LogicError(_) => "logic-error",
            SldError::Io(_) => "io-error",
        }
    }
}
