//! Collector configuration documents.
//!
//! The shared collector configuration lives either as a flat YAML text blob ([TextDocument]) or
//! as an already parsed object inside a custom resource ([StructuredDocument]). Both expose the
//! same [DocumentStore] operations, which is all the [mutator](crate::mutator) and the
//! [wiring] reconciler need.
pub mod structured;
pub mod text;
pub mod wiring;

pub use structured::StructuredDocument;
pub use text::TextDocument;

use serde_json::Value;
use std::fmt::{Display, Formatter};

const PIPELINES_ANCHOR: &str = "service.pipelines";

/// Top-level sections holding named component blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    Receivers,
    Processors,
    Exporters,
}

impl Section {
    pub fn key(&self) -> &'static str {
        match self {
            Section::Receivers => "receivers",
            Section::Processors => "processors",
            Section::Exporters => "exporters",
        }
    }
}

impl Display for Section {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum DocumentError {
    #[error("missing anchor `{0}`")]
    MissingAnchor(String),
    #[error("could not render block `{name}`: {reason}")]
    Render { name: String, reason: String },
    #[error("invalid document: {0}")]
    Invalid(String),
}

/// Storage binding for a collector configuration document.
///
/// Block lookups are exact name matches. Pipeline accessors only deal with the `receivers`
/// reference list of each pipeline, which is the only wiring a fragment owns.
pub trait DocumentStore {
    /// Fails with [DocumentError::MissingAnchor] naming the first of `sections` (or the
    /// pipelines map) that is not present.
    fn check_anchors(&self, sections: &[Section]) -> Result<(), DocumentError>;

    fn list_blocks(&self, section: Section) -> Vec<String>;

    fn has_block(&self, section: Section, name: &str) -> bool {
        self.list_blocks(section).iter().any(|block| block == name)
    }

    /// Appends a block after the existing ones in `section`.
    fn insert_block(&mut self, section: Section, name: &str, spec: &Value)
    -> Result<(), DocumentError>;

    /// Returns whether a block was removed.
    fn remove_block(&mut self, section: Section, name: &str) -> bool;

    /// Names of the pipelines whose receivers list can be read and written.
    fn pipeline_names(&self) -> Vec<String>;

    /// Receiver references of `pipeline`, `None` when the pipeline does not exist.
    fn pipeline_refs(&self, pipeline: &str) -> Option<Vec<String>>;

    /// Overwrites the receiver references of `pipeline`. Unknown pipelines are ignored.
    fn set_pipeline_refs(&mut self, pipeline: &str, refs: &[String]);

    /// Anchors of the pipeline entries mentioning `reference` somewhere this binding cannot
    /// rewrite. Removing a fragment while any remain would leave a dangling reference.
    fn unreadable_references(&self, reference: &str) -> Vec<String>;
}
