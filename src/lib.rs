pub mod config;
pub mod connect;
pub mod document;
pub mod edit;
pub mod graph;
pub mod history;
pub mod matching;
pub mod model;
pub mod notification;
pub mod propagate;
pub mod sql;
pub mod store;

use std::fmt::Display;

use serde::Serialize;
use serde_json::Value;
use wasm_bindgen::prelude::*;

pub use config::{FkDefaults, StoreConfig};
pub use connect::ConnectionError;
pub use document::{Document, Presentation, SnapshotError, Viewport};
pub use graph::{ColumnField, Graph, GraphError};
pub use history::{ActionType, HistoryManager};
pub use model::{Column, Entity, ForeignKey, ReferentialAction, Relationship, RelationshipKind};
pub use notification::Notification;
pub use sql::Dialect;
pub use store::{Applied, DiagramStore, StoreError};

/// Initialize panic hook for better error messages in WASM
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();
}

fn js_error(err: impl Display) -> JsValue {
    js_sys::Error::new(&err.to_string()).into()
}

fn to_json<T: Serialize>(value: &T) -> Result<String, JsValue> {
    serde_json::to_string(value).map_err(js_error)
}

fn from_json<'a, T: serde::Deserialize<'a>>(input: &'a str) -> Result<T, JsValue> {
    serde_json::from_str(input).map_err(js_error)
}

fn applied(result: Result<Applied, StoreError>) -> Result<String, JsValue> {
    to_json(&result.map_err(js_error)?)
}

fn parse_kind(kind: &str) -> Result<RelationshipKind, JsValue> {
    RelationshipKind::from_str(kind).ok_or_else(|| js_error(format!("Unknown relationship kind: {}", kind)))
}

fn parse_color(color: Option<String>) -> Result<Option<Value>, JsValue> {
    color.as_deref().map(from_json).transpose()
}

/// Diagram store for the web editor. Inputs and outputs are JSON strings;
/// mutating calls return `{ id, notifications }`.
#[wasm_bindgen(js_name = "ErdStore")]
pub struct ErdStore {
    inner: DiagramStore,
}

#[wasm_bindgen(js_class = "ErdStore")]
impl ErdStore {
    #[wasm_bindgen(constructor)]
    pub fn new(config: Option<String>) -> Result<ErdStore, JsValue> {
        let config = match config.as_deref() {
            Some(json) => StoreConfig::from_json(json).map_err(js_error)?,
            None => StoreConfig::default(),
        };
        Ok(Self {
            inner: DiagramStore::with_config(config),
        })
    }

    #[wasm_bindgen(js_name = "addEntity")]
    pub fn add_entity(&mut self, entity: &str) -> Result<String, JsValue> {
        let entity: Entity = from_json(entity)?;
        applied(self.inner.add_entity(entity))
    }

    #[wasm_bindgen(js_name = "removeEntity")]
    pub fn remove_entity(&mut self, entity_id: &str) -> Result<String, JsValue> {
        applied(self.inner.remove_entity(entity_id))
    }

    #[wasm_bindgen(js_name = "addColumn")]
    pub fn add_column(&mut self, entity_id: &str, column: &str) -> Result<String, JsValue> {
        let column: Column = from_json(column)?;
        applied(self.inner.add_column(entity_id, column))
    }

    #[wasm_bindgen(js_name = "removeColumn")]
    pub fn remove_column(&mut self, entity_id: &str, column_id: &str) -> Result<String, JsValue> {
        applied(self.inner.remove_column(entity_id, column_id))
    }

    /// `edit` is `{ "field": "dataType", "value": "BIGINT" }`.
    #[wasm_bindgen(js_name = "setColumnField")]
    pub fn set_column_field(&mut self, entity_id: &str, column_id: &str, edit: &str) -> Result<String, JsValue> {
        let field: ColumnField = from_json(edit)?;
        applied(self.inner.set_column_field(entity_id, column_id, field))
    }

    pub fn connect(&mut self, source_id: &str, target_id: &str, kind: &str) -> Result<String, JsValue> {
        let kind = parse_kind(kind)?;
        applied(self.inner.connect(source_id, target_id, kind))
    }

    pub fn reconnect(&mut self, relationship_id: &str, kind: &str) -> Result<String, JsValue> {
        let kind = parse_kind(kind)?;
        applied(self.inner.reconnect(relationship_id, kind))
    }

    pub fn disconnect(&mut self, relationship_id: &str) -> Result<String, JsValue> {
        applied(self.inner.disconnect(relationship_id))
    }

    #[wasm_bindgen(js_name = "setNodeColor")]
    pub fn set_node_color(&mut self, entity_id: &str, color: Option<String>) -> Result<String, JsValue> {
        let color = parse_color(color)?;
        applied(self.inner.set_node_color(entity_id, color))
    }

    #[wasm_bindgen(js_name = "setEdgeColor")]
    pub fn set_edge_color(&mut self, relationship_id: &str, color: Option<String>) -> Result<String, JsValue> {
        let color = parse_color(color)?;
        applied(self.inner.set_edge_color(relationship_id, color))
    }

    #[wasm_bindgen(js_name = "setCommentColor")]
    pub fn set_comment_color(&mut self, entity_id: &str, color: Option<String>) -> Result<String, JsValue> {
        let color = parse_color(color)?;
        applied(self.inner.set_comment_color(entity_id, color))
    }

    #[wasm_bindgen(js_name = "hideEntity")]
    pub fn hide_entity(&mut self, entity_id: &str) -> Result<String, JsValue> {
        applied(self.inner.hide_entity(entity_id))
    }

    #[wasm_bindgen(js_name = "showEntity")]
    pub fn show_entity(&mut self, entity_id: &str) -> Result<String, JsValue> {
        applied(self.inner.show_entity(entity_id))
    }

    #[wasm_bindgen(js_name = "setViewport")]
    pub fn set_viewport(&mut self, x: f64, y: f64, zoom: f64) {
        self.inner.set_viewport(Viewport { x, y, zoom });
    }

    /// Returns false when there was nothing to undo.
    pub fn undo(&mut self) -> bool {
        self.inner.undo().is_some()
    }

    pub fn redo(&mut self) -> bool {
        self.inner.redo().is_some()
    }

    #[wasm_bindgen(js_name = "canUndo")]
    pub fn can_undo(&self) -> bool {
        self.inner.can_undo()
    }

    #[wasm_bindgen(js_name = "canRedo")]
    pub fn can_redo(&self) -> bool {
        self.inner.can_redo()
    }

    #[wasm_bindgen(js_name = "loadDocument")]
    pub fn load_document(&mut self, document: &str) -> Result<(), JsValue> {
        self.inner.load_document(document).map_err(js_error)
    }

    #[wasm_bindgen(js_name = "toDocument")]
    pub fn to_document(&self) -> Result<String, JsValue> {
        self.inner.to_document_json().map_err(js_error)
    }

    /// Replaces the diagram with the tables of a SQL dump.
    #[wasm_bindgen(js_name = "importSql")]
    pub fn import_sql(&mut self, sql: &str, dialect: Option<String>) -> Result<String, JsValue> {
        let dialect = match dialect.as_deref() {
            Some(name) => Dialect::from_str(name).ok_or_else(|| js_error(format!("Unknown dialect: {}", name)))?,
            None => Dialect::Auto,
        };
        applied(self.inner.import_sql(sql, dialect))
    }
}
