//! Column edits that carry their foreign-key consequences with them.

use crate::config::FkDefaults;
use crate::connect::{ConnectionError, toggle_foreign_key_pk};
use crate::graph::{ColumnField, Graph, GraphError};
use crate::matching::ColumnTrace;
use crate::model::Column;
use crate::propagate::{Cascade, Propagated, Visited};

/// Adds `column` to an entity. A key column is forced `NOT NULL` and copied
/// onto every child.
pub fn add_column(
    graph: &Graph,
    entity_id: &str,
    mut column: Column,
    defaults: FkDefaults,
) -> Result<Propagated, GraphError> {
    if column.pk {
        column.nn = true;
    }
    let mut next = graph.clone();
    let mut cascade = Cascade::new(&mut next, defaults);
    cascade.graph.add_column_mut(entity_id, column.clone())?;
    if column.pk {
        cascade.column_added(entity_id, &column, &mut Visited::default());
    }

    let notifications = cascade.finish();
    Ok(Propagated {
        graph: next,
        notifications,
    })
}

/// Removes a column, cascading if it was a key column. Removing the last FK
/// column of a relationship removes the relationship too.
pub fn remove_column(graph: &Graph, entity_id: &str, column_id: &str) -> Result<(Propagated, Column), GraphError> {
    let mut next = graph.clone();
    let mut cascade = Cascade::new(&mut next, FkDefaults::default());
    let removed = cascade.graph.remove_column_mut(entity_id, column_id)?;

    if removed.pk {
        cascade.column_removed(entity_id, &ColumnTrace::from(&removed), &mut Visited::default());
    }
    if let Some(fk) = removed.foreign_key() {
        let rel_id = cascade
            .graph
            .find_relationship(&fk.parent_entity_id, entity_id)
            .map(|r| r.id.clone());
        if let Some(rel_id) = rel_id {
            cascade.settle_relationship(&rel_id);
        }
    }

    let notifications = cascade.finish();
    Ok((
        Propagated {
            graph: next,
            notifications,
        },
        removed,
    ))
}

/// Sets one field of a column and applies whatever cascade the edit implies.
pub fn set_column_field(
    graph: &Graph,
    entity_id: &str,
    column_id: &str,
    field: ColumnField,
    defaults: FkDefaults,
) -> Result<Propagated, ConnectionError> {
    let before = graph
        .entity(entity_id)
        .ok_or_else(|| GraphError::UnknownEntity(entity_id.to_string()))?
        .column(column_id)
        .cloned()
        .ok_or_else(|| GraphError::UnknownColumn {
            entity: entity_id.to_string(),
            column: column_id.to_string(),
        })?;

    if let ColumnField::Pk(pk) = field {
        if before.is_fk() {
            return toggle_foreign_key_pk(graph, entity_id, column_id, pk, defaults);
        }
    }

    let mut next = graph.clone();
    let mut cascade = Cascade::new(&mut next, defaults);
    match field {
        ColumnField::DataType(data_type) => {
            cascade
                .graph
                .set_column_field_mut(entity_id, column_id, ColumnField::DataType(data_type.clone()))?;
            if before.pk && before.data_type != data_type {
                cascade.data_type_changed(entity_id, &ColumnTrace::from(&before), &data_type, &mut Visited::default());
            }
        }
        ColumnField::Name(name) => {
            let column = cascade.graph.column_mut(entity_id, column_id)?;
            column.name = name;
            let renamed = ColumnTrace::renamed(column, before.name.clone());
            if before.pk && renamed.name != before.name {
                cascade.column_renamed(entity_id, &renamed, &mut Visited::default());
            }
        }
        ColumnField::Pk(pk) => {
            if pk != before.pk {
                let column = cascade.graph.column_mut(entity_id, column_id)?;
                column.pk = pk;
                if pk {
                    column.nn = true;
                    let column = column.clone();
                    cascade.column_added(entity_id, &column, &mut Visited::default());
                } else {
                    cascade.column_removed(entity_id, &ColumnTrace::from(&before), &mut Visited::default());
                }
            }
        }
        // A key column stays NOT NULL.
        ColumnField::Nn(false) if before.pk => {}
        field @ (ColumnField::Nn(_) | ColumnField::OnDelete(_) | ColumnField::OnUpdate(_)) if before.is_fk() => {
            for id in group_members(cascade.graph, entity_id, &before) {
                cascade.graph.set_column_field_mut(entity_id, &id, field.clone())?;
            }
        }
        field => cascade.graph.set_column_field_mut(entity_id, column_id, field)?,
    }

    let notifications = cascade.finish();
    Ok(Propagated {
        graph: next,
        notifications,
    })
}

/// Ids of the FK columns in `entity_id` that share `column`'s composite group.
fn group_members(graph: &Graph, entity_id: &str, column: &Column) -> Vec<String> {
    let Some(fk) = column.foreign_key() else {
        return Vec::new();
    };
    graph
        .entity(entity_id)
        .map(|entity| {
            entity
                .columns
                .iter()
                .filter(|c| c.foreign_key().is_some_and(|other| other.same_group(fk)))
                .map(|c| c.id.clone())
                .collect()
        })
        .unwrap_or_default()
}
