//! Collector configuration held as a parsed object, such as the `spec.config` field of an
//! `OpenTelemetryCollector` resource.
use super::{DocumentError, DocumentStore, PIPELINES_ANCHOR, Section};
use serde_json::{Map, Value};

const SERVICE_KEY: &str = "service";
const PIPELINES_KEY: &str = "pipelines";
const RECEIVERS_KEY: &str = "receivers";

#[derive(Debug, Clone, PartialEq, Default)]
pub struct StructuredDocument {
    root: Map<String, Value>,
}

impl StructuredDocument {
    pub fn new(root: Map<String, Value>) -> Self {
        Self { root }
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.root
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.root
    }

    fn section(&self, section: Section) -> Option<&Map<String, Value>> {
        self.root.get(section.key())?.as_object()
    }

    /// A section written with no entries (`processors:`) is held as `null`.
    fn has_section(&self, section: Section) -> bool {
        self.root
            .get(section.key())
            .is_some_and(|value| value.is_object() || value.is_null())
    }

    fn section_mut(&mut self, section: Section) -> Option<&mut Map<String, Value>> {
        self.root.get_mut(section.key())?.as_object_mut()
    }

    fn pipelines(&self) -> Option<&Map<String, Value>> {
        self.root
            .get(SERVICE_KEY)?
            .get(PIPELINES_KEY)?
            .as_object()
    }

    fn pipelines_mut(&mut self) -> Option<&mut Map<String, Value>> {
        self.root
            .get_mut(SERVICE_KEY)?
            .get_mut(PIPELINES_KEY)?
            .as_object_mut()
    }
}

impl TryFrom<Value> for StructuredDocument {
    type Error = DocumentError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(root) => Ok(Self::new(root)),
            Value::Null => Ok(Self::default()),
            other => Err(DocumentError::Invalid(format!(
                "expected an object, found `{other}`"
            ))),
        }
    }
}

impl From<StructuredDocument> for Value {
    fn from(document: StructuredDocument) -> Self {
        Value::Object(document.root)
    }
}

impl DocumentStore for StructuredDocument {
    fn check_anchors(&self, sections: &[Section]) -> Result<(), DocumentError> {
        if let Some(missing) = sections.iter().find(|s| !self.has_section(**s)) {
            return Err(DocumentError::MissingAnchor(missing.key().to_string()));
        }
        if self.pipelines().is_none() {
            return Err(DocumentError::MissingAnchor(PIPELINES_ANCHOR.to_string()));
        }
        Ok(())
    }

    fn list_blocks(&self, section: Section) -> Vec<String> {
        self.section(section)
            .map(|blocks| blocks.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn insert_block(
        &mut self,
        section: Section,
        name: &str,
        spec: &Value,
    ) -> Result<(), DocumentError> {
        let blocks = self
            .root
            .get_mut(section.key())
            .filter(|value| value.is_object() || value.is_null())
            .ok_or_else(|| DocumentError::MissingAnchor(section.key().to_string()))?;
        if blocks.is_null() {
            *blocks = Value::Object(Map::new());
        }
        if let Value::Object(blocks) = blocks {
            blocks.insert(name.to_string(), spec.clone());
        }
        Ok(())
    }

    fn remove_block(&mut self, section: Section, name: &str) -> bool {
        self.section_mut(section)
            .and_then(|blocks| blocks.shift_remove(name))
            .is_some()
    }

    fn pipeline_names(&self) -> Vec<String> {
        self.pipelines()
            .map(|pipelines| {
                pipelines
                    .iter()
                    .filter(|(_, pipeline)| pipeline.is_object())
                    .map(|(name, _)| name.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn pipeline_refs(&self, pipeline: &str) -> Option<Vec<String>> {
        let pipeline = self.pipelines()?.get(pipeline)?.as_object()?;
        let refs = match pipeline.get(RECEIVERS_KEY) {
            Some(Value::Array(refs)) => refs
                .iter()
                .filter_map(|r| r.as_str().map(str::to_string))
                .collect(),
            Some(Value::String(single)) => vec![single.clone()],
            _ => Vec::new(),
        };
        Some(refs)
    }

    fn set_pipeline_refs(&mut self, pipeline: &str, refs: &[String]) {
        if let Some(pipeline) = self
            .pipelines_mut()
            .and_then(|pipelines| pipelines.get_mut(pipeline))
            .and_then(Value::as_object_mut)
        {
            pipeline.insert(
                RECEIVERS_KEY.to_string(),
                Value::Array(refs.iter().cloned().map(Value::String).collect()),
            );
        }
    }

    fn unreadable_references(&self, reference: &str) -> Vec<String> {
        let Some(pipelines) = self.pipelines() else {
            return Vec::new();
        };
        pipelines
            .iter()
            .filter(|(_, pipeline)| match pipeline {
                Value::Object(pipeline) => pipeline.get(RECEIVERS_KEY).is_some_and(|receivers| {
                    !is_reference_list(receivers) && mentions(receivers, reference)
                }),
                other => mentions(other, reference),
            })
            .map(|(name, _)| format!("{PIPELINES_ANCHOR}.{name}"))
            .collect()
    }
}

fn is_reference_list(value: &Value) -> bool {
    match value {
        Value::String(_) | Value::Null => true,
        Value::Array(items) => items.iter().all(Value::is_string),
        _ => false,
    }
}

fn mentions(value: &Value, reference: &str) -> bool {
    match value {
        Value::String(s) => s == reference,
        Value::Array(items) => items.iter().any(|item| mentions(item, reference)),
        Value::Object(map) => map.values().any(|item| mentions(item, reference)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn document() -> StructuredDocument {
        StructuredDocument::try_from(json!({
            "receivers": {"otlp": {}, "filelog/a": {"start_at": "end"}},
            "processors": {"batch": {}},
            "exporters": {"loki": {"endpoint": "http://loki:3100"}},
            "service": {
                "pipelines": {
                    "logs": {"receivers": ["otlp", "filelog/a"], "exporters": ["loki"]},
                    "metrics": {"receivers": "otlp"},
                    "broken": "not a pipeline",
                },
            },
        }))
        .unwrap()
    }

    #[test]
    fn test_try_from_value() {
        assert_eq!(
            StructuredDocument::try_from(Value::Null).unwrap(),
            StructuredDocument::default()
        );
        assert_matches!(
            StructuredDocument::try_from(json!("receivers: {}")),
            Err(DocumentError::Invalid(_))
        );
    }

    #[test]
    fn test_check_anchors() {
        assert!(document().check_anchors(&[Section::Receivers, Section::Processors]).is_ok());

        let doc = StructuredDocument::try_from(json!({
            "receivers": "not a map",
            "processors": {},
            "service": {"pipelines": {}},
        }))
        .unwrap();
        assert_eq!(
            doc.check_anchors(&[Section::Receivers]),
            Err(DocumentError::MissingAnchor("receivers".to_string()))
        );

        let doc = StructuredDocument::try_from(json!({"receivers": {}, "service": {}})).unwrap();
        assert_eq!(
            doc.check_anchors(&[Section::Receivers]),
            Err(DocumentError::MissingAnchor("service.pipelines".to_string()))
        );
    }

    #[test]
    fn test_blocks_keep_insertion_order() {
        let mut doc = document();
        doc.insert_block(Section::Receivers, "filelog/b", &json!({"start_at": "end"}))
            .unwrap();
        assert_eq!(
            doc.list_blocks(Section::Receivers),
            vec!["otlp", "filelog/a", "filelog/b"]
        );

        assert!(doc.remove_block(Section::Receivers, "filelog/a"));
        assert!(!doc.remove_block(Section::Receivers, "filelog/a"));
        assert_eq!(doc.list_blocks(Section::Receivers), vec!["otlp", "filelog/b"]);
    }

    #[test]
    fn test_unreadable_references() {
        let doc = StructuredDocument::try_from(json!({
            "service": {"pipelines": {
                "logs": {"receivers": ["otlp", "filelog/a"]},
                "logs/single": {"receivers": "filelog/a"},
                "logs/nested": {"receivers": [{"name": "filelog/a"}]},
                "broken": ["filelog/a"],
                "other": "filelog/b",
            }},
        }))
        .unwrap();

        assert_eq!(
            doc.unreadable_references("filelog/a"),
            vec!["service.pipelines.logs/nested", "service.pipelines.broken"]
        );
        assert!(doc.unreadable_references("filelog/c").is_empty());
    }

    #[test]
    fn test_empty_sections_are_valid_anchors() {
        let mut doc = StructuredDocument::try_from(json!({
            "receivers": {"otlp": {}},
            "processors": null,
            "service": {"pipelines": {"logs": {"receivers": ["otlp"]}}},
        }))
        .unwrap();

        assert!(doc.check_anchors(&[Section::Receivers, Section::Processors]).is_ok());
        assert!(doc.list_blocks(Section::Processors).is_empty());
        assert!(!doc.remove_block(Section::Processors, "resource/a"));
        assert_eq!(Value::from(doc.clone())["processors"], Value::Null);

        doc.insert_block(Section::Processors, "resource/a", &json!({"attributes": []}))
            .unwrap();
        assert_eq!(doc.list_blocks(Section::Processors), vec!["resource/a"]);
        assert_eq!(
            Value::from(doc)["processors"],
            json!({"resource/a": {"attributes": []}})
        );
    }

    #[test]
    fn test_insert_block_in_missing_section() {
        let mut doc = StructuredDocument::default();
        assert_eq!(
            doc.insert_block(Section::Processors, "batch", &json!({})),
            Err(DocumentError::MissingAnchor("processors".to_string()))
        );
    }

    #[test]
    fn test_pipelines() {
        let mut doc = document();
        assert_eq!(doc.pipeline_names(), vec!["logs", "metrics"]);
        assert_eq!(
            doc.pipeline_refs("logs"),
            Some(vec!["otlp".to_string(), "filelog/a".to_string()])
        );
        assert_eq!(doc.pipeline_refs("metrics"), Some(vec!["otlp".to_string()]));
        assert_eq!(doc.pipeline_refs("broken"), None);

        doc.set_pipeline_refs("logs", &["otlp".to_string()]);
        assert_eq!(
            Value::from(doc.clone())["service"]["pipelines"]["logs"],
            json!({"receivers": ["otlp"], "exporters": ["loki"]})
        );

        doc.set_pipeline_refs("traces", &["otlp".to_string()]);
        assert_eq!(doc.pipeline_names(), vec!["logs", "metrics"]);
    }
}
