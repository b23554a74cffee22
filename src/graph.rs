//! The diagram graph value and its structural operations.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{Column, Entity, ReferentialAction, Relationship};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    #[error("Unknown entity: {0}")]
    UnknownEntity(String),
    #[error("Unknown column {column} on entity {entity}")]
    UnknownColumn { entity: String, column: String },
    #[error("Unknown relationship: {0}")]
    UnknownRelationship(String),
    #[error("Duplicate id: {0}")]
    DuplicateId(String),
    #[error("Relationship {0} references a missing entity")]
    DanglingRelationship(String),
    #[error("Entities {0} and {1} are already related in the opposite direction")]
    OppositeDirection(String, String),
    #[error("Self relationship {0} cannot be identifying")]
    IdentifyingSelfRelationship(String),
    #[error("Column {0} is not a foreign key")]
    NotForeignKey(String),
}

/// A single column field edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "camelCase")]
pub enum ColumnField {
    Name(String),
    LogicalName(String),
    DataType(String),
    Pk(bool),
    Nn(bool),
    Uq(bool),
    Ai(bool),
    Comment(String),
    DefaultValue(String),
    OnDelete(ReferentialAction),
    OnUpdate(ReferentialAction),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Graph {
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entity(&self, id: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.id == id)
    }

    pub fn relationship(&self, id: &str) -> Option<&Relationship> {
        self.relationships.iter().find(|r| r.id == id)
    }

    /// The relationship running exactly `source -> target`, if any.
    pub fn find_relationship(&self, source: &str, target: &str) -> Option<&Relationship> {
        self.relationships
            .iter()
            .find(|r| r.source == source && r.target == target)
    }

    /// Relationships whose parent is `parent_id`.
    pub fn children_of<'a>(&'a self, parent_id: &'a str) -> impl Iterator<Item = &'a Relationship> + 'a {
        self.relationships.iter().filter(move |r| r.source == parent_id)
    }

    pub fn add_entity(&self, entity: Entity) -> Result<Graph, GraphError> {
        if self.entity(&entity.id).is_some() {
            return Err(GraphError::DuplicateId(entity.id));
        }
        check_column_ids(&entity)?;

        let mut next = self.clone();
        next.entities.push(entity);
        Ok(next)
    }

    /// Removes the entity and every relationship touching it.
    pub fn remove_entity(&self, entity_id: &str) -> Result<(Graph, Entity), GraphError> {
        let mut next = self.clone();
        let entity = next.remove_entity_mut(entity_id)?;
        Ok((next, entity))
    }

    pub fn add_column(&self, entity_id: &str, column: Column) -> Result<Graph, GraphError> {
        let mut next = self.clone();
        next.add_column_mut(entity_id, column)?;
        Ok(next)
    }

    pub fn remove_column(&self, entity_id: &str, column_id: &str) -> Result<(Graph, Column), GraphError> {
        let mut next = self.clone();
        let column = next.remove_column_mut(entity_id, column_id)?;
        Ok((next, column))
    }

    pub fn set_column_field(
        &self,
        entity_id: &str,
        column_id: &str,
        field: ColumnField,
    ) -> Result<Graph, GraphError> {
        let mut next = self.clone();
        next.set_column_field_mut(entity_id, column_id, field)?;
        Ok(next)
    }

    pub fn add_relationship(&self, relationship: Relationship) -> Result<Graph, GraphError> {
        let mut next = self.clone();
        next.add_relationship_mut(relationship)?;
        Ok(next)
    }

    pub fn remove_relationship(&self, id: &str) -> Result<(Graph, Relationship), GraphError> {
        let mut next = self.clone();
        let relationship = next.remove_relationship_mut(id)?;
        Ok((next, relationship))
    }

    /// Checks every structural invariant over the whole graph.
    pub fn validate(&self) -> Result<(), GraphError> {
        let mut entity_ids = HashSet::new();
        for entity in &self.entities {
            if !entity_ids.insert(entity.id.as_str()) {
                return Err(GraphError::DuplicateId(entity.id.clone()));
            }
            check_column_ids(entity)?;
        }

        let mut relationship_ids = HashSet::new();
        for rel in &self.relationships {
            if !relationship_ids.insert(rel.id.as_str()) {
                return Err(GraphError::DuplicateId(rel.id.clone()));
            }
            check_relationship(self, rel)?;
        }
        Ok(())
    }

    /// Mints an id with `prefix` that no entity, column, relationship or group uses yet.
    pub(crate) fn mint_id(&self, prefix: &str) -> String {
        let mut taken: HashSet<&str> = HashSet::new();
        for entity in &self.entities {
            taken.insert(&entity.id);
            for column in &entity.columns {
                taken.insert(&column.id);
                if let Some(group) = column.foreign_key().and_then(|fk| fk.relationship_group_id.as_deref()) {
                    taken.insert(group);
                }
            }
        }
        for rel in &self.relationships {
            taken.insert(&rel.id);
        }

        let mut n = taken.len() + 1;
        loop {
            let candidate = format!("{}-{}", prefix, n);
            if !taken.contains(candidate.as_str()) {
                return candidate;
            }
            n += 1;
        }
    }

    pub(crate) fn entity_mut(&mut self, id: &str) -> Result<&mut Entity, GraphError> {
        self.entities
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| GraphError::UnknownEntity(id.to_string()))
    }

    pub(crate) fn relationship_mut(&mut self, id: &str) -> Result<&mut Relationship, GraphError> {
        self.relationships
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| GraphError::UnknownRelationship(id.to_string()))
    }

    pub(crate) fn column_mut(&mut self, entity_id: &str, column_id: &str) -> Result<&mut Column, GraphError> {
        let entity = self.entity_mut(entity_id)?;
        entity
            .column_mut(column_id)
            .ok_or_else(|| GraphError::UnknownColumn {
                entity: entity_id.to_string(),
                column: column_id.to_string(),
            })
    }

    pub(crate) fn remove_entity_mut(&mut self, entity_id: &str) -> Result<Entity, GraphError> {
        let index = self
            .entities
            .iter()
            .position(|e| e.id == entity_id)
            .ok_or_else(|| GraphError::UnknownEntity(entity_id.to_string()))?;
        self.relationships.retain(|r| !r.touches(entity_id));
        Ok(self.entities.remove(index))
    }

    pub(crate) fn add_column_mut(&mut self, entity_id: &str, column: Column) -> Result<(), GraphError> {
        let entity = self.entity_mut(entity_id)?;
        if entity.column(&column.id).is_some() {
            return Err(GraphError::DuplicateId(column.id));
        }
        entity.columns.push(column);
        Ok(())
    }

    pub(crate) fn remove_column_mut(&mut self, entity_id: &str, column_id: &str) -> Result<Column, GraphError> {
        let entity = self.entity_mut(entity_id)?;
        let index = entity
            .column_index(column_id)
            .ok_or_else(|| GraphError::UnknownColumn {
                entity: entity_id.to_string(),
                column: column_id.to_string(),
            })?;
        Ok(entity.columns.remove(index))
    }

    pub(crate) fn set_column_field_mut(
        &mut self,
        entity_id: &str,
        column_id: &str,
        field: ColumnField,
    ) -> Result<(), GraphError> {
        let column = self.column_mut(entity_id, column_id)?;
        match field {
            ColumnField::Name(v) => column.name = v,
            ColumnField::LogicalName(v) => column.logical_name = v,
            ColumnField::DataType(v) => column.data_type = v,
            ColumnField::Pk(v) => column.pk = v,
            ColumnField::Nn(v) => column.nn = v,
            ColumnField::Uq(v) => column.uq = v,
            ColumnField::Ai(v) => column.ai = v,
            ColumnField::Comment(v) => column.comment = v,
            ColumnField::DefaultValue(v) => column.default_value = v,
            ColumnField::OnDelete(action) => {
                column
                    .foreign_key_mut()
                    .ok_or_else(|| GraphError::NotForeignKey(column_id.to_string()))?
                    .on_delete = action;
            }
            ColumnField::OnUpdate(action) => {
                column
                    .foreign_key_mut()
                    .ok_or_else(|| GraphError::NotForeignKey(column_id.to_string()))?
                    .on_update = action;
            }
        }
        Ok(())
    }

    pub(crate) fn add_relationship_mut(&mut self, relationship: Relationship) -> Result<(), GraphError> {
        if self.relationship(&relationship.id).is_some() {
            return Err(GraphError::DuplicateId(relationship.id));
        }
        check_relationship(self, &relationship)?;
        self.relationships.push(relationship);
        Ok(())
    }

    pub(crate) fn remove_relationship_mut(&mut self, id: &str) -> Result<Relationship, GraphError> {
        let index = self
            .relationships
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| GraphError::UnknownRelationship(id.to_string()))?;
        Ok(self.relationships.remove(index))
    }
}

fn check_column_ids(entity: &Entity) -> Result<(), GraphError> {
    let mut seen = HashSet::new();
    for column in &entity.columns {
        if !seen.insert(column.id.as_str()) {
            return Err(GraphError::DuplicateId(column.id.clone()));
        }
    }
    Ok(())
}

fn check_relationship(graph: &Graph, rel: &Relationship) -> Result<(), GraphError> {
    if graph.entity(&rel.source).is_none() || graph.entity(&rel.target).is_none() {
        return Err(GraphError::DanglingRelationship(rel.id.clone()));
    }
    if rel.is_self() && rel.is_identifying() {
        return Err(GraphError::IdentifyingSelfRelationship(rel.id.clone()));
    }
    if !rel.is_self() && graph.find_relationship(&rel.target, &rel.source).is_some() {
        return Err(GraphError::OppositeDirection(rel.source.clone(), rel.target.clone()));
    }
    Ok(())
}
