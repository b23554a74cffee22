//! Connection resolver: validates relationships and materializes their FK columns.

use std::collections::HashSet;

use thiserror::Error;
use tracing::debug;

use crate::config::FkDefaults;
use crate::graph::{Graph, GraphError};
use crate::matching::{ColumnTrace, find_existing_fk_column};
use crate::model::{Column, Relationship, RelationshipKind};
use crate::notification::Notification;
use crate::propagate::{Cascade, Propagated, Visited};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConnectionError {
    #[error("{parent} already references {child}; two entities can only be related in one direction")]
    CyclicRelationship { parent: String, child: String },
    #[error("{0} has no primary key to reference")]
    MissingPrimaryKey(String),
    #[error("A relationship from {0} to itself cannot be identifying")]
    InvalidSelfIdentifying(String),
    #[error(transparent)]
    Graph(#[from] GraphError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Connected {
    pub graph: Graph,
    pub relationship_id: String,
    pub notifications: Vec<Notification>,
}

/// Relates `source_id` (parent) to `target_id` (child) and creates the FK
/// columns on the child. An existing relationship between the pair is
/// retyped instead when `kind` differs.
pub fn connect(
    graph: &Graph,
    source_id: &str,
    target_id: &str,
    kind: RelationshipKind,
    defaults: FkDefaults,
) -> Result<Connected, ConnectionError> {
    let source = graph
        .entity(source_id)
        .ok_or_else(|| GraphError::UnknownEntity(source_id.to_string()))?;
    let target = graph
        .entity(target_id)
        .ok_or_else(|| GraphError::UnknownEntity(target_id.to_string()))?;

    if source_id != target_id && graph.find_relationship(target_id, source_id).is_some() {
        return Err(ConnectionError::CyclicRelationship {
            parent: source.label().to_string(),
            child: target.label().to_string(),
        });
    }
    if source.pk_columns().next().is_none() {
        return Err(ConnectionError::MissingPrimaryKey(source.label().to_string()));
    }
    if source_id == target_id && kind.is_identifying() {
        return Err(ConnectionError::InvalidSelfIdentifying(source.label().to_string()));
    }

    if let Some(existing) = graph.find_relationship(source_id, target_id) {
        if existing.kind != kind {
            let id = existing.id.clone();
            let Propagated { graph, notifications } = reconnect(graph, &id, kind, defaults)?;
            return Ok(Connected {
                graph,
                relationship_id: id,
                notifications,
            });
        }
    }

    let mut next = graph.clone();
    let mut cascade = Cascade::new(&mut next, defaults);
    let existing = cascade.graph.find_relationship(source_id, target_id).cloned();
    let rel = match existing {
        Some(existing) => existing,
        None => {
            let rel = Relationship::new(cascade.graph.mint_id("rel"), source_id, target_id, kind);
            cascade.graph.add_relationship_mut(rel.clone())?;
            debug!(relationship = %rel.id, kind = kind.as_str(), "created relationship");
            rel
        }
    };
    cascade.materialize(&rel)?;

    let notifications = cascade.finish();
    Ok(Connected {
        graph: next,
        relationship_id: rel.id,
        notifications,
    })
}

/// Changes the kind of an existing relationship, promoting or demoting its
/// FK columns when identifying-ness flips.
pub fn reconnect(
    graph: &Graph,
    relationship_id: &str,
    kind: RelationshipKind,
    defaults: FkDefaults,
) -> Result<Propagated, ConnectionError> {
    let rel = graph
        .relationship(relationship_id)
        .ok_or_else(|| GraphError::UnknownRelationship(relationship_id.to_string()))?;
    if rel.is_self() && kind.is_identifying() {
        let label = graph.entity(&rel.source).map_or(rel.source.as_str(), |e| e.label());
        return Err(ConnectionError::InvalidSelfIdentifying(label.to_string()));
    }

    let mut next = graph.clone();
    let mut cascade = Cascade::new(&mut next, defaults);
    if rel.kind != kind {
        cascade.retype(relationship_id, kind)?;
    }
    let notifications = cascade.finish();
    Ok(Propagated {
        graph: next,
        notifications,
    })
}

/// Removes a relationship together with the FK columns it put on the child.
pub fn disconnect(graph: &Graph, relationship_id: &str) -> Result<Propagated, ConnectionError> {
    let mut next = graph.clone();
    let mut cascade = Cascade::new(&mut next, FkDefaults::default());
    let rel = cascade.graph.remove_relationship_mut(relationship_id)?;
    cascade.detach(&rel)?;

    let notifications = cascade.finish();
    Ok(Propagated {
        graph: next,
        notifications,
    })
}

/// Sets `pk` on an FK column and its group, moving the owning relationship
/// between its identifying and non-identifying kind.
pub fn toggle_foreign_key_pk(
    graph: &Graph,
    entity_id: &str,
    column_id: &str,
    pk: bool,
    defaults: FkDefaults,
) -> Result<Propagated, ConnectionError> {
    let entity = graph
        .entity(entity_id)
        .ok_or_else(|| GraphError::UnknownEntity(entity_id.to_string()))?;
    let fk = entity
        .column(column_id)
        .ok_or_else(|| GraphError::UnknownColumn {
            entity: entity_id.to_string(),
            column: column_id.to_string(),
        })?
        .foreign_key()
        .ok_or_else(|| GraphError::NotForeignKey(column_id.to_string()))?;

    let rel = graph.find_relationship(&fk.parent_entity_id, entity_id).cloned();
    if pk && rel.as_ref().is_some_and(|r| r.is_self()) {
        return Err(ConnectionError::InvalidSelfIdentifying(entity.label().to_string()));
    }
    let members: Vec<String> = entity
        .columns
        .iter()
        .filter(|c| c.foreign_key().is_some_and(|other| other.same_group(fk)))
        .map(|c| c.id.clone())
        .collect();

    let mut next = graph.clone();
    let mut cascade = Cascade::new(&mut next, defaults);
    if let Some(rel) = rel.filter(|r| r.is_identifying() != pk) {
        cascade.set_kind(&rel.id, rel.kind.with_identifying(pk))?;
    }
    cascade.rekey(entity_id, &members, pk)?;

    let notifications = cascade.finish();
    Ok(Propagated {
        graph: next,
        notifications,
    })
}

/// Removes an entity after disconnecting every relationship where it is the parent.
pub fn detach_entity(graph: &Graph, entity_id: &str) -> Result<(Propagated, String), ConnectionError> {
    let mut next = graph.clone();
    let mut cascade = Cascade::new(&mut next, FkDefaults::default());
    let label = cascade
        .graph
        .entity(entity_id)
        .map(|e| e.label().to_string())
        .ok_or_else(|| GraphError::UnknownEntity(entity_id.to_string()))?;

    let children: Vec<String> = cascade
        .graph
        .children_of(entity_id)
        .filter(|r| !r.is_self())
        .map(|r| r.id.clone())
        .collect();
    for id in children {
        let rel = cascade.graph.remove_relationship_mut(&id)?;
        cascade.detach(&rel)?;
    }
    cascade.graph.remove_entity_mut(entity_id)?;

    let notifications = cascade.finish();
    Ok((
        Propagated {
            graph: next,
            notifications,
        },
        label,
    ))
}

impl Cascade<'_> {
    /// Creates or updates one FK column on the child per parent PK column.
    fn materialize(&mut self, rel: &Relationship) -> Result<(), GraphError> {
        let source = self
            .graph
            .entity(&rel.source)
            .cloned()
            .ok_or_else(|| GraphError::UnknownEntity(rel.source.clone()))?;
        let identifying = rel.is_identifying();
        let mut claimed = HashSet::new();
        let mut new_keys: Vec<Column> = Vec::new();

        for pk in source.pk_columns() {
            let found = match self.graph.entity(&rel.target) {
                Some(target) => find_existing_fk_column(&target.columns, &source, pk, &claimed),
                None => return Err(GraphError::UnknownEntity(rel.target.clone())),
            };

            match found {
                Some(m) => {
                    let target = self.graph.entity_mut(&rel.target)?;
                    let column = &mut target.columns[m.index];
                    let was_pk = column.pk;
                    column.pk = identifying;
                    column.nn = identifying || column.nn;
                    column.data_type = pk.data_type.clone();
                    if let Some(fk) = column.foreign_key_mut() {
                        fk.parent_entity_id = source.id.clone();
                        fk.parent_column_id = pk.id.clone();
                    }
                    debug!(column = %column.name, quality = ?m.quality, "reusing existing foreign key");
                    claimed.insert(column.id.clone());
                    if column.pk && !was_pk {
                        new_keys.push(column.clone());
                    }
                }
                None => {
                    let actions = self.sibling_actions(&rel.target, &rel.source);
                    let column = self.build_fk_column(rel, source.label(), pk, None, actions);
                    self.graph.add_column_mut(&rel.target, column.clone())?;
                    let notification = Notification::ForeignKeyAdded {
                        entity: self.label(&rel.target),
                        column: column.name.clone(),
                    };
                    self.note(notification);
                    claimed.insert(column.id.clone());
                    if column.pk {
                        new_keys.push(column);
                    }
                }
            }
        }
        self.ensure_group(&rel.target, &rel.source);

        for column in &new_keys {
            self.column_added(&rel.target, column, &mut Visited::default());
        }
        Ok(())
    }

    fn set_kind(&mut self, relationship_id: &str, kind: RelationshipKind) -> Result<Relationship, GraphError> {
        let rel = self.graph.relationship_mut(relationship_id)?;
        rel.kind = kind;
        let rel = rel.clone();
        let notification = Notification::RelationshipRetyped {
            source: self.label(&rel.source),
            target: self.label(&rel.target),
            to: kind,
        };
        self.note(notification);
        Ok(rel)
    }

    fn retype(&mut self, relationship_id: &str, kind: RelationshipKind) -> Result<(), GraphError> {
        let was_identifying = self
            .graph
            .relationship(relationship_id)
            .map(|r| r.is_identifying())
            .ok_or_else(|| GraphError::UnknownRelationship(relationship_id.to_string()))?;
        let rel = self.set_kind(relationship_id, kind)?;
        if was_identifying == kind.is_identifying() {
            return Ok(());
        }

        let members: Vec<String> = self
            .graph
            .entity(&rel.target)
            .map(|child| child.fk_columns_from(&rel.source).map(|c| c.id.clone()).collect())
            .unwrap_or_default();
        self.rekey(&rel.target, &members, kind.is_identifying())
    }

    /// Promotes (`pk = nn = true`) or demotes (`pk = nn = false`) the given
    /// columns and cascades the key change to the entity's children.
    fn rekey(&mut self, entity_id: &str, members: &[String], pk: bool) -> Result<(), GraphError> {
        let mut changed = Vec::new();
        let entity = self.graph.entity_mut(entity_id)?;
        for column in entity.columns.iter_mut().filter(|c| members.contains(&c.id)) {
            if column.pk == pk {
                continue;
            }
            column.pk = pk;
            column.nn = pk;
            changed.push(column.clone());
        }

        let label = self.label(entity_id);
        for column in &changed {
            let (entity, column) = (label.clone(), column.name.clone());
            self.note(if pk {
                Notification::ForeignKeyPromoted { entity, column }
            } else {
                Notification::ForeignKeyDemoted { entity, column }
            });
        }

        if pk {
            for column in &changed {
                self.column_added(entity_id, column, &mut Visited::default());
            }
        } else if !changed.is_empty() {
            let lost: Vec<ColumnTrace> = changed
                .iter()
                .map(|c| ColumnTrace {
                    pk: true,
                    ..ColumnTrace::from(c)
                })
                .collect();
            self.relationship_type_changed(entity_id, &lost, &mut Visited::default());
        }
        Ok(())
    }

    /// Strips the FK columns `rel` put on its child, cascading lost key columns.
    fn detach(&mut self, rel: &Relationship) -> Result<(), GraphError> {
        let child = self.graph.entity_mut(&rel.target)?;
        let mut removed = Vec::new();
        let mut i = 0;
        while i < child.columns.len() {
            if child.columns[i]
                .foreign_key()
                .is_some_and(|fk| fk.parent_entity_id == rel.source)
            {
                removed.push(child.columns.remove(i));
            } else {
                i += 1;
            }
        }

        let label = self.label(&rel.target);
        for column in &removed {
            self.note(Notification::ForeignKeyRemoved {
                entity: label.clone(),
                column: column.name.clone(),
            });
        }
        for column in removed.iter().filter(|c| c.pk) {
            self.column_removed(&rel.target, &ColumnTrace::from(column), &mut Visited::default());
        }
        debug!(relationship = %rel.id, removed = removed.len(), "detached relationship");
        Ok(())
    }
}
