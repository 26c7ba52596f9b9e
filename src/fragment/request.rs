use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Declarative onboarding request for a single service.
///
/// `service_name` is the identity of the request: at most one fragment per service name exists in
/// the shared configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct OnboardingRequest {
    pub service_name: String,
    pub namespace: String,
    #[serde(default)]
    pub team: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub custom_labels: HashMap<String, String>,
}

impl OnboardingRequest {
    pub fn new(service_name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            namespace: namespace.into(),
            ..Default::default()
        }
    }

    pub fn with_team(self, team: impl Into<String>) -> Self {
        Self {
            team: team.into(),
            ..self
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_labels.insert(key.into(), value.into());
        self
    }

    /// Custom labels sorted by key, so rendered output does not depend on hash ordering.
    pub fn sorted_labels(&self) -> Vec<(&String, &String)> {
        let mut labels: Vec<_> = self.custom_labels.iter().collect();
        labels.sort();
        labels
    }
}
