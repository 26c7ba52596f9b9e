//! Per-service pipeline fragments.
//!
//! A [Fragment] is everything a single service contributes to the shared collector configuration:
//! a `filelog` receiver tailing its pod logs, a `resource` processor labeling its records and,
//! optionally, a `routing` processor. Fragments are never stored on their own, they are derived
//! from an [OnboardingRequest] every time they are needed.
pub mod collector_resource;
pub mod generator;
pub mod request;

pub use request::OnboardingRequest;

use serde_json::Value;
use std::collections::BTreeMap;

const RECEIVER_PREFIX: &str = "filelog";
const PROCESSOR_PREFIX: &str = "resource";
const ROUTING_PREFIX: &str = "routing";
const LABEL_MAX_LENGTH: usize = 63;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum FragmentError {
    #[error("invalid onboarding request: {0}")]
    InvalidRequest(String),
}

/// Checks that `value` is a [DNS-1123 label](https://kubernetes.io/docs/concepts/overview/working-with-objects/names/#dns-label-names):
/// 63 characters at most, lowercase alphanumeric characters or dashes only, starting and ending
/// with an alphanumeric character. Names are spliced into block keys and reference lists, so
/// anything else could inject structure into the shared document.
pub fn validate_identifier(field: &str, value: &str) -> Result<(), FragmentError> {
    if value.trim().is_empty() {
        return Err(FragmentError::InvalidRequest(format!(
            "{field} must not be empty"
        )));
    }
    let is_valid = value.len() <= LABEL_MAX_LENGTH
        && value.starts_with(|c: char| c.is_ascii_alphanumeric())
        && value.ends_with(|c: char| c.is_ascii_alphanumeric())
        && value
            .chars()
            .all(|c| c == '-' || c.is_ascii_digit() || c.is_ascii_lowercase());
    if !is_valid {
        return Err(FragmentError::InvalidRequest(format!(
            "{field} `{}` must contain {LABEL_MAX_LENGTH} characters at most, lowercase alphanumeric characters or dashes only, and start and end with an alphanumeric character",
            value.escape_debug()
        )));
    }
    Ok(())
}

/// Names of the blocks owned by a service.
///
/// Every code path that locates a service's blocks (insertion, removal, wiring) must build them
/// through [FragmentNames::for_service] so the derivation can never drift.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentNames {
    pub receiver: String,
    pub processor: String,
    pub routing: String,
}

impl FragmentNames {
    pub fn for_service(service_name: &str) -> Self {
        Self {
            receiver: format!("{RECEIVER_PREFIX}/{service_name}"),
            processor: format!("{PROCESSOR_PREFIX}/{service_name}"),
            routing: format!("{ROUTING_PREFIX}/{service_name}"),
        }
    }

    /// All processor names a service may own, whether or not routing was enabled when it was added.
    pub fn processors(&self) -> [&str; 2] {
        [self.processor.as_str(), self.routing.as_str()]
    }
}

/// Routing rules sending a service's records to level specific pipelines.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingSpec {
    pub name: String,
    pub spec: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub service_name: String,
    pub receiver_name: String,
    pub receiver_spec: Value,
    pub processor_name: String,
    pub processor_spec: Value,
    pub routing: Option<RoutingSpec>,
    /// Labels the exporter must promote for this service's records, `label -> attribute`.
    pub exporter_labels: BTreeMap<String, String>,
}

impl Fragment {
    pub fn names(&self) -> FragmentNames {
        FragmentNames::for_service(&self.service_name)
    }

    /// Processor blocks of the fragment in insertion order.
    pub fn processor_blocks(&self) -> Vec<(&str, &Value)> {
        let mut blocks = vec![(self.processor_name.as_str(), &self.processor_spec)];
        if let Some(routing) = &self.routing {
            blocks.push((routing.name.as_str(), &routing.spec));
        }
        blocks
    }
}
