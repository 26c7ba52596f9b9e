//! Reconciles the receiver references of the `service.pipelines` entries.
use super::DocumentStore;

/// Appends `reference` to the receivers of `pipeline` unless it is already there.
///
/// Returns whether the document changed. Unknown pipelines are left untouched.
pub fn add_reference<D: DocumentStore + ?Sized>(
    document: &mut D,
    pipeline: &str,
    reference: &str,
) -> bool {
    let Some(mut refs) = document.pipeline_refs(pipeline) else {
        return false;
    };
    if refs.iter().any(|r| r == reference) {
        return false;
    }
    refs.push(reference.to_string());
    document.set_pipeline_refs(pipeline, &refs);
    true
}

/// Removes every occurrence of `reference` from all pipelines.
///
/// Returns the names of the pipelines that were rewritten. Pipelines that did not reference it
/// are not touched.
pub fn remove_reference<D: DocumentStore + ?Sized>(document: &mut D, reference: &str) -> Vec<String> {
    let mut changed = Vec::new();
    for pipeline in document.pipeline_names() {
        let Some(refs) = document.pipeline_refs(&pipeline) else {
            continue;
        };
        if !refs.iter().any(|r| r == reference) {
            continue;
        }
        let kept: Vec<String> = refs.into_iter().filter(|r| r != reference).collect();
        document.set_pipeline_refs(&pipeline, &kept);
        changed.push(pipeline);
    }
    changed
}
