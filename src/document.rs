//! The persisted diagram document and the presentation state around the graph.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::graph::{Graph, GraphError};

pub const DOCUMENT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Corrupt snapshot: {0}")]
    CorruptSnapshot(String),
}

impl From<serde_json::Error> for SnapshotError {
    fn from(err: serde_json::Error) -> Self {
        Self::CorruptSnapshot(err.to_string())
    }
}

impl From<GraphError> for SnapshotError {
    fn from(err: GraphError) -> Self {
        Self::CorruptSnapshot(err.to_string())
    }
}

/// Per-element UI state that undo/redo restores alongside the graph.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Presentation {
    #[serde(default)]
    pub node_colors: BTreeMap<String, Value>,
    #[serde(default)]
    pub edge_colors: BTreeMap<String, Value>,
    #[serde(default)]
    pub comment_colors: BTreeMap<String, Value>,
    #[serde(default)]
    pub hidden_entities: Vec<String>,
}

impl Presentation {
    pub fn is_hidden(&self, entity_id: &str) -> bool {
        self.hidden_entities.iter().any(|id| id == entity_id)
    }

    /// Returns false when the entity was already hidden.
    pub fn hide(&mut self, entity_id: &str) -> bool {
        if self.is_hidden(entity_id) {
            return false;
        }
        self.hidden_entities.push(entity_id.to_string());
        true
    }

    pub fn show(&mut self, entity_id: &str) -> bool {
        let before = self.hidden_entities.len();
        self.hidden_entities.retain(|id| id != entity_id);
        self.hidden_entities.len() != before
    }

    /// Drops every entry keyed by an entity or relationship that no longer exists.
    pub fn prune(&mut self, graph: &Graph) {
        let entity_alive = |id: &String| graph.entity(id).is_some();
        self.node_colors.retain(|id, _| entity_alive(id));
        self.comment_colors.retain(|id, _| entity_alive(id));
        self.hidden_entities.retain(|id| entity_alive(id));
        self.edge_colors.retain(|id, _| graph.relationship(id).is_some());
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default = "Viewport::default_zoom")]
    pub zoom: f64,
}

impl Viewport {
    fn default_zoom() -> f64 {
        1.0
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            zoom: Self::default_zoom(),
        }
    }
}

fn default_version() -> u32 {
    DOCUMENT_VERSION
}

/// `{ entities, relationships, nodeColors, edgeColors, commentColors, hiddenEntities, viewport, version }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(flatten)]
    pub graph: Graph,
    #[serde(flatten)]
    pub presentation: Presentation,
    #[serde(default)]
    pub viewport: Viewport,
    #[serde(default = "default_version")]
    pub version: u32,
}

impl Document {
    pub fn new(graph: Graph, presentation: Presentation, viewport: Viewport) -> Self {
        Self {
            graph,
            presentation,
            viewport,
            version: DOCUMENT_VERSION,
        }
    }

    /// Parses and checks a document. Anything malformed or structurally
    /// inconsistent is reported as `CorruptSnapshot`.
    pub fn from_json(input: &str) -> Result<Self, SnapshotError> {
        let document: Document = serde_json::from_str(input)?;
        if document.version > DOCUMENT_VERSION {
            return Err(SnapshotError::CorruptSnapshot(format!(
                "document version {} is newer than supported version {}",
                document.version, DOCUMENT_VERSION
            )));
        }
        document.graph.validate()?;
        Ok(document)
    }

    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r##"{
        "entities": [
            {
                "id": "user",
                "physicalName": "user",
                "logicalName": "User",
                "comment": "",
                "position": {"x": 120, "y": 40},
                "columns": [
                    {"id": "u1", "name": "id", "logicalName": "", "dataType": "INT",
                     "pk": true, "fk": false, "nn": true, "uq": false, "ai": true,
                     "comment": "", "defaultValue": ""}
                ]
            },
            {
                "id": "order",
                "physicalName": "order",
                "logicalName": "",
                "comment": "",
                "columns": [
                    {"id": "o1", "name": "user_id", "logicalName": "", "dataType": "INT",
                     "pk": true, "fk": true, "nn": true, "uq": false, "ai": false,
                     "comment": "", "defaultValue": "",
                     "parentEntityId": "user", "parentColumnId": "u1",
                     "onDelete": "CASCADE", "onUpdate": "NO ACTION"}
                ]
            }
        ],
        "relationships": [
            {"id": "r1", "source": "user", "target": "order", "kind": "one-to-many-identifying",
             "sourceHandle": "right"}
        ],
        "nodeColors": {"user": "#ffcc00"},
        "edgeColors": {"r1": {"stroke": "#333"}},
        "commentColors": {},
        "hiddenEntities": ["order"],
        "viewport": {"x": 10.5, "y": -3.25, "zoom": 0.8},
        "version": 1
    }"##;

    #[test]
    fn test_round_trip_is_lossless() {
        let document = Document::from_json(SAMPLE).unwrap();
        let written: Value = serde_json::from_str(&document.to_json().unwrap()).unwrap();
        let original: Value = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(written, original);
    }

    #[test]
    fn test_missing_sections_default() {
        let document = Document::from_json(r#"{"entities": [], "relationships": []}"#).unwrap();
        assert_eq!(document.viewport, Viewport::default());
        assert_eq!(document.version, DOCUMENT_VERSION);
        assert!(document.presentation.hidden_entities.is_empty());
    }

    #[test]
    fn test_corrupt_documents_rejected() {
        assert!(matches!(
            Document::from_json("{\"entities\": 3}"),
            Err(SnapshotError::CorruptSnapshot(_))
        ));

        let dangling = r#"{"entities": [], "relationships": [
            {"id": "r1", "source": "a", "target": "b", "kind": "one-to-one-identifying"}
        ]}"#;
        let err = Document::from_json(dangling).unwrap_err();
        assert_eq!(err.to_string(), "Corrupt snapshot: Relationship r1 references a missing entity");

        assert!(Document::from_json(r#"{"version": 99}"#).is_err());
    }

    #[test]
    fn test_presentation_hide_show_prune() {
        let mut presentation = Presentation::default();
        assert!(presentation.hide("a"));
        assert!(!presentation.hide("a"));
        assert!(presentation.show("a"));
        assert!(!presentation.show("a"));

        presentation.node_colors.insert("gone".to_string(), Value::from("#fff"));
        presentation.hide("gone");
        presentation.prune(&Graph::new());
        assert_eq!(presentation, Presentation::default());
    }
}
