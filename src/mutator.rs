//! Merges service fragments into, and removes them from, a collector configuration document.
//!
//! The same algorithm runs against every [DocumentStore] binding. Bindings only differ in how they
//! treat a fragment that is already present, which is expressed with a [DuplicatePolicy].
use crate::document::wiring::{add_reference, remove_reference};
use crate::document::{DocumentError, DocumentStore, Section};
use crate::fragment::{Fragment, FragmentNames};
use tracing::debug;

pub const DEFAULT_TARGET_PIPELINE: &str = "logs";

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum MutationError {
    #[error("malformed document: `{anchor}` is missing or cannot be edited")]
    MalformedDocument { anchor: String },
    #[error("fragment `{0}` already exists")]
    DuplicateFragment(String),
    #[error("none of the target pipelines exist: {0:?}")]
    NoTargetPipeline(Vec<String>),
    #[error("{0}")]
    Document(DocumentError),
}

impl From<DocumentError> for MutationError {
    fn from(err: DocumentError) -> Self {
        match err {
            DocumentError::MissingAnchor(anchor) => MutationError::MalformedDocument { anchor },
            other => MutationError::Document(other),
        }
    }
}

/// What to do when the receiver of the fragment being applied is already in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// Leave existing blocks untouched, add whatever is missing and make sure it is wired.
    #[default]
    Skip,
    /// Fail with [MutationError::DuplicateFragment].
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ApplyOutcome {
    /// Blocks added to the document, `section/name`.
    pub inserted: Vec<String>,
    /// Pipeline the receiver reference was appended to.
    pub wired: Option<String>,
}

impl ApplyOutcome {
    pub fn changed(&self) -> bool {
        !self.inserted.is_empty() || self.wired.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RemoveOutcome {
    pub removed: Vec<String>,
    /// Pipelines that no longer reference the receiver.
    pub unwired: Vec<String>,
}

impl RemoveOutcome {
    pub fn changed(&self) -> bool {
        !self.removed.is_empty() || !self.unwired.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FragmentMutator {
    target_pipelines: Vec<String>,
    duplicates: DuplicatePolicy,
}

impl Default for FragmentMutator {
    fn default() -> Self {
        Self::new(vec![DEFAULT_TARGET_PIPELINE.to_string()], DuplicatePolicy::default())
    }
}

impl FragmentMutator {
    /// `target_pipelines` is an ordered preference list: the reference is added to the first one
    /// present in the document.
    pub fn new(target_pipelines: Vec<String>, duplicates: DuplicatePolicy) -> Self {
        Self {
            target_pipelines,
            duplicates,
        }
    }

    pub fn with_duplicates(self, duplicates: DuplicatePolicy) -> Self {
        Self { duplicates, ..self }
    }

    pub fn apply<D: DocumentStore + ?Sized>(
        &self,
        document: &mut D,
        fragment: &Fragment,
    ) -> Result<ApplyOutcome, MutationError> {
        document.check_anchors(&[Section::Receivers, Section::Processors])?;
        let target = self.target_pipeline(document)?;

        if document.has_block(Section::Receivers, &fragment.receiver_name)
            && self.duplicates == DuplicatePolicy::Reject
        {
            return Err(MutationError::DuplicateFragment(
                fragment.receiver_name.clone(),
            ));
        }

        let mut outcome = ApplyOutcome::default();
        let blocks = std::iter::once((
            Section::Receivers,
            fragment.receiver_name.as_str(),
            &fragment.receiver_spec,
        ))
        .chain(
            fragment
                .processor_blocks()
                .into_iter()
                .map(|(name, spec)| (Section::Processors, name, spec)),
        );
        for (section, name, spec) in blocks {
            if document.has_block(section, name) {
                debug!(%section, name, "block already present, skipping");
                continue;
            }
            document.insert_block(section, name, spec)?;
            outcome.inserted.push(format!("{section}/{name}"));
        }

        if add_reference(document, &target, &fragment.receiver_name) {
            outcome.wired = Some(target);
        }
        Ok(outcome)
    }

    /// Removes every block and reference owned by `service_name`. Removing an absent service
    /// leaves the document untouched.
    ///
    /// Fails without mutating when a pipeline mentions the receiver in a form that cannot be
    /// rewritten, as the reference would outlive its block.
    pub fn remove<D: DocumentStore + ?Sized>(
        &self,
        document: &mut D,
        service_name: &str,
    ) -> Result<RemoveOutcome, MutationError> {
        let names = FragmentNames::for_service(service_name);
        if let Some(anchor) = document
            .unreadable_references(&names.receiver)
            .into_iter()
            .next()
        {
            return Err(MutationError::MalformedDocument { anchor });
        }
        let owned = std::iter::once((Section::Receivers, names.receiver.as_str())).chain(
            names
                .processors()
                .into_iter()
                .map(|name| (Section::Processors, name)),
        );

        let mut outcome = RemoveOutcome::default();
        for (section, name) in owned {
            if document.remove_block(section, name) {
                outcome.removed.push(format!("{section}/{name}"));
            }
        }
        outcome.unwired = remove_reference(document, &names.receiver);
        Ok(outcome)
    }

    fn target_pipeline<D: DocumentStore + ?Sized>(
        &self,
        document: &D,
    ) -> Result<String, MutationError> {
        let existing = document.pipeline_names();
        self.target_pipelines
            .iter()
            .find(|target| existing.contains(target))
            .cloned()
            .ok_or_else(|| MutationError::NoTargetPipeline(self.target_pipelines.clone()))
    }
}
