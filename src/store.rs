//! The single live diagram plus its undo/redo history.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{ConfigError, StoreConfig};
use crate::connect::{self, ConnectionError};
use crate::document::{Document, Presentation, SnapshotError, Viewport};
use crate::edit;
use crate::graph::{ColumnField, Graph, GraphError};
use crate::history::{ActionType, HistoryManager, HistoryMetadata, Snapshot};
use crate::model::{Column, Entity, RelationshipKind};
use crate::notification::Notification;
use crate::propagate::Propagated;
use crate::sql::{self, Dialect, SqlParseError};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error("SQL import failed: {0}")]
    Import(#[from] SqlParseError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// What a successful store operation produced.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Applied {
    /// Id of the element created or addressed, when there is one.
    pub id: Option<String>,
    pub notifications: Vec<Notification>,
}

impl Applied {
    fn new(id: Option<String>, notifications: Vec<Notification>) -> Self {
        Self { id, notifications }
    }
}

#[derive(Debug, Clone)]
pub struct DiagramStore {
    graph: Graph,
    presentation: Presentation,
    viewport: Viewport,
    history: HistoryManager,
    config: StoreConfig,
}

impl Default for DiagramStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DiagramStore {
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Starts from an empty diagram whose history holds one `Initial` entry.
    pub fn with_config(config: StoreConfig) -> Self {
        let mut store = Self {
            graph: Graph::new(),
            presentation: Presentation::default(),
            viewport: Viewport::default(),
            history: HistoryManager::new(config.history_capacity),
            config,
        };
        store.commit(ActionType::Initial, HistoryMetadata::new("Initial state"));
        store
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn presentation(&self) -> &Presentation {
        &self.presentation
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    /// Pan and zoom are not part of the undo history.
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    // Entities and columns

    /// Adds an entity; empty entity or column ids are minted.
    pub fn add_entity(&mut self, mut entity: Entity) -> Result<Applied, StoreError> {
        let mut next = self.graph.clone();
        if entity.id.is_empty() {
            entity.id = next.mint_id("entity");
        }
        let id = entity.id.clone();
        let label = entity.label().to_string();
        let columns = std::mem::take(&mut entity.columns);

        next = next.add_entity(entity)?;
        for mut column in columns {
            if column.id.is_empty() {
                column.id = next.mint_id("col");
            }
            next.add_column_mut(&id, column)?;
        }

        self.apply(
            next,
            ActionType::AddEntity,
            HistoryMetadata::new(format!("Add entity {}", label)).on(&id),
        );
        Ok(Applied::new(Some(id), Vec::new()))
    }

    /// Removes an entity, its relationships and every FK that referenced it.
    pub fn remove_entity(&mut self, entity_id: &str) -> Result<Applied, StoreError> {
        let (Propagated { graph, notifications }, label) = connect::detach_entity(&self.graph, entity_id)?;
        self.apply(
            graph,
            ActionType::RemoveEntity,
            HistoryMetadata::new(format!("Remove entity {}", label)).on(entity_id),
        );
        Ok(Applied::new(Some(entity_id.to_string()), notifications))
    }

    /// Adds a column; a key column is propagated to every child.
    pub fn add_column(&mut self, entity_id: &str, mut column: Column) -> Result<Applied, StoreError> {
        if column.id.is_empty() {
            column.id = self.graph.mint_id("col");
        }
        let id = column.id.clone();
        let description = format!("Add column {}", column.name);
        let Propagated { graph, notifications } =
            edit::add_column(&self.graph, entity_id, column, self.config.fk_defaults)?;

        self.apply(graph, ActionType::AddColumn, HistoryMetadata::new(description).on(&id));
        Ok(Applied::new(Some(id), notifications))
    }

    pub fn remove_column(&mut self, entity_id: &str, column_id: &str) -> Result<Applied, StoreError> {
        let (Propagated { graph, notifications }, removed) = edit::remove_column(&self.graph, entity_id, column_id)?;
        self.apply(
            graph,
            ActionType::RemoveColumn,
            HistoryMetadata::new(format!("Remove column {}", removed.name)).on(column_id),
        );
        Ok(Applied::new(Some(column_id.to_string()), notifications))
    }

    pub fn set_column_field(
        &mut self,
        entity_id: &str,
        column_id: &str,
        field: ColumnField,
    ) -> Result<Applied, StoreError> {
        let description = format!("Update column {}", field_name(&field));
        let Propagated { graph, notifications } =
            edit::set_column_field(&self.graph, entity_id, column_id, field, self.config.fk_defaults)?;

        self.apply(graph, ActionType::UpdateColumn, HistoryMetadata::new(description).on(column_id));
        Ok(Applied::new(Some(column_id.to_string()), notifications))
    }

    // Relationships

    /// Relates `source_id` (parent) to `target_id` (child). The returned id is the relationship's.
    pub fn connect(
        &mut self,
        source_id: &str,
        target_id: &str,
        kind: RelationshipKind,
    ) -> Result<Applied, StoreError> {
        let connected = connect::connect(&self.graph, source_id, target_id, kind, self.config.fk_defaults)?;
        let description = format!("Connect {} to {} ({})", source_id, target_id, kind.as_str());
        self.apply(
            connected.graph,
            ActionType::Connect,
            HistoryMetadata::new(description).on(&connected.relationship_id),
        );
        Ok(Applied::new(Some(connected.relationship_id), connected.notifications))
    }

    pub fn reconnect(&mut self, relationship_id: &str, kind: RelationshipKind) -> Result<Applied, StoreError> {
        let Propagated { graph, notifications } =
            connect::reconnect(&self.graph, relationship_id, kind, self.config.fk_defaults)?;
        self.apply(
            graph,
            ActionType::Reconnect,
            HistoryMetadata::new(format!("Change relationship to {}", kind.as_str())).on(relationship_id),
        );
        Ok(Applied::new(Some(relationship_id.to_string()), notifications))
    }

    pub fn disconnect(&mut self, relationship_id: &str) -> Result<Applied, StoreError> {
        let Propagated { graph, notifications } = connect::disconnect(&self.graph, relationship_id)?;
        self.apply(
            graph,
            ActionType::Disconnect,
            HistoryMetadata::new("Remove relationship").on(relationship_id),
        );
        Ok(Applied::new(Some(relationship_id.to_string()), notifications))
    }

    // Presentation

    /// Sets or, with `None`, clears the color of an entity node.
    pub fn set_node_color(&mut self, entity_id: &str, color: Option<Value>) -> Result<Applied, StoreError> {
        self.require_entity(entity_id)?;
        let mut presentation = self.presentation.clone();
        set_or_clear(&mut presentation.node_colors, entity_id, color);
        Ok(self.apply_presentation(presentation, ActionType::ChangeColor, "Change node color", entity_id))
    }

    pub fn set_edge_color(&mut self, relationship_id: &str, color: Option<Value>) -> Result<Applied, StoreError> {
        if self.graph.relationship(relationship_id).is_none() {
            return Err(GraphError::UnknownRelationship(relationship_id.to_string()).into());
        }
        let mut presentation = self.presentation.clone();
        set_or_clear(&mut presentation.edge_colors, relationship_id, color);
        Ok(self.apply_presentation(presentation, ActionType::ChangeColor, "Change edge color", relationship_id))
    }

    pub fn set_comment_color(&mut self, entity_id: &str, color: Option<Value>) -> Result<Applied, StoreError> {
        self.require_entity(entity_id)?;
        let mut presentation = self.presentation.clone();
        set_or_clear(&mut presentation.comment_colors, entity_id, color);
        Ok(self.apply_presentation(presentation, ActionType::ChangeColor, "Change comment color", entity_id))
    }

    /// Hides an entity; hiding a hidden entity records nothing.
    pub fn hide_entity(&mut self, entity_id: &str) -> Result<Applied, StoreError> {
        self.require_entity(entity_id)?;
        let mut presentation = self.presentation.clone();
        if !presentation.hide(entity_id) {
            return Ok(Applied::new(Some(entity_id.to_string()), Vec::new()));
        }
        Ok(self.apply_presentation(presentation, ActionType::ToggleVisibility, "Hide entity", entity_id))
    }

    pub fn show_entity(&mut self, entity_id: &str) -> Result<Applied, StoreError> {
        self.require_entity(entity_id)?;
        let mut presentation = self.presentation.clone();
        if !presentation.show(entity_id) {
            return Ok(Applied::new(Some(entity_id.to_string()), Vec::new()));
        }
        Ok(self.apply_presentation(presentation, ActionType::ToggleVisibility, "Show entity", entity_id))
    }

    // History

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Restores the previous snapshot and returns its graph, or `None` when
    /// there is nothing to undo.
    pub fn undo(&mut self) -> Option<&Graph> {
        let snapshot = self.history.undo()?;
        self.restore(&snapshot);
        info!(cursor = self.history.cursor(), "undo");
        Some(&self.graph)
    }

    pub fn redo(&mut self) -> Option<&Graph> {
        let snapshot = self.history.redo()?;
        self.restore(&snapshot);
        info!(cursor = self.history.cursor(), "redo");
        Some(&self.graph)
    }

    // Documents and import

    /// Replaces the diagram with a saved document and restarts the history
    /// from it. A corrupt document changes nothing.
    pub fn load_document(&mut self, input: &str) -> Result<(), StoreError> {
        let document = match Document::from_json(input) {
            Ok(document) => document,
            Err(err) => {
                warn!(error = %err, "rejected document");
                return Err(err.into());
            }
        };

        self.graph = document.graph;
        self.presentation = document.presentation;
        self.viewport = document.viewport;
        let snapshot = self.snapshot();
        self.history
            .reset(ActionType::LoadDocument, snapshot, HistoryMetadata::new("Load document"));
        info!(entities = self.graph.entities.len(), "loaded document");
        Ok(())
    }

    pub fn to_document(&self) -> Document {
        Document::new(self.graph.clone(), self.presentation.clone(), self.viewport.clone())
    }

    pub fn to_document_json(&self) -> Result<String, StoreError> {
        Ok(self.to_document().to_json()?)
    }

    /// Replaces the diagram with the tables of a SQL dump, as one undoable step.
    pub fn import_sql(&mut self, input: &str, dialect: Dialect) -> Result<Applied, StoreError> {
        let imported = sql::parse_sql(input, dialect)?;
        self.presentation = Presentation::default();
        self.apply(
            imported.graph,
            ActionType::Import,
            HistoryMetadata::new(format!("Import SQL ({})", dialect.as_str())),
        );
        Ok(Applied::new(None, imported.notifications))
    }

    fn require_entity(&self, entity_id: &str) -> Result<(), GraphError> {
        match self.graph.entity(entity_id) {
            Some(_) => Ok(()),
            None => Err(GraphError::UnknownEntity(entity_id.to_string())),
        }
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            graph: self.graph.clone(),
            presentation: self.presentation.clone(),
        }
    }

    fn restore(&mut self, snapshot: &Snapshot) {
        self.graph = snapshot.graph.clone();
        self.presentation = snapshot.presentation.clone();
    }

    fn apply(&mut self, graph: Graph, action: ActionType, metadata: HistoryMetadata) {
        self.graph = graph;
        self.presentation.prune(&self.graph);
        self.commit(action, metadata);
    }

    fn apply_presentation(
        &mut self,
        presentation: Presentation,
        action: ActionType,
        description: &str,
        target: &str,
    ) -> Applied {
        self.presentation = presentation;
        self.commit(action, HistoryMetadata::new(description).on(target));
        Applied::new(Some(target.to_string()), Vec::new())
    }

    fn commit(&mut self, action: ActionType, metadata: HistoryMetadata) {
        info!(?action, description = %metadata.description, "committed");
        let snapshot = self.snapshot();
        self.history.save_state(action, snapshot, metadata);
    }
}

fn set_or_clear(map: &mut BTreeMap<String, Value>, id: &str, color: Option<Value>) {
    match color {
        Some(color) => {
            map.insert(id.to_string(), color);
        }
        None => {
            map.remove(id);
        }
    }
}

fn field_name(field: &ColumnField) -> &'static str {
    match field {
        ColumnField::Name(_) => "name",
        ColumnField::LogicalName(_) => "logical name",
        ColumnField::DataType(_) => "data type",
        ColumnField::Pk(_) => "primary key",
        ColumnField::Nn(_) => "not null",
        ColumnField::Uq(_) => "unique",
        ColumnField::Ai(_) => "auto increment",
        ColumnField::Comment(_) => "comment",
        ColumnField::DefaultValue(_) => "default",
        ColumnField::OnDelete(_) => "on delete",
        ColumnField::OnUpdate(_) => "on update",
    }
}
