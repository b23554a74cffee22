//! Builds a diagram graph from parsed DDL.

use std::collections::{BTreeSet, HashMap};

use tracing::{info, warn};

use super::dialect::Dialect;
use super::parser::{parse_ddl, ColumnDef, ForeignKeyDef, SqlParseError, TableDef};
use crate::graph::Graph;
use crate::model::{Cardinality, Column, ColumnRole, Entity, ForeignKey, Relationship, RelationshipKind};
use crate::notification::Notification;

#[derive(Debug, Clone)]
pub struct SqlImport {
    pub graph: Graph,
    /// One `ImportSkipped` per table or foreign key that was dropped.
    pub notifications: Vec<Notification>,
}

/// Parses a SQL dump into a fresh graph.
pub fn parse_sql(input: &str, dialect: Dialect) -> Result<SqlImport, SqlParseError> {
    let ddl = parse_ddl(input, dialect)?;

    let mut importer = Importer::default();
    let mut links = Vec::new();
    for table in &ddl.tables {
        if importer.add_table(table) {
            links.extend(table.foreign_keys.iter().map(|fk| (table.name.as_str(), fk)));
        }
    }
    links.extend(ddl.altered.iter().map(|(table, fk)| (table.as_str(), fk)));

    for (table, fk) in links {
        if let Err(reason) = importer.link(table, fk) {
            importer.skip(table, reason);
        }
    }

    info!(
        entities = importer.graph.entities.len(),
        relationships = importer.graph.relationships.len(),
        skipped = importer.notifications.len(),
        "imported SQL dump"
    );
    Ok(SqlImport {
        graph: importer.graph,
        notifications: importer.notifications,
    })
}

#[derive(Default)]
struct Importer {
    graph: Graph,
    next_id: usize,
    /// Table name to entity id.
    tables: HashMap<String, String>,
    unique_sets: HashMap<String, Vec<BTreeSet<String>>>,
    notifications: Vec<Notification>,
}

impl Importer {
    fn mint(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    fn skip(&mut self, table: &str, reason: String) {
        warn!(table, %reason, "skipped during import");
        self.notifications.push(Notification::ImportSkipped {
            table: table.to_string(),
            reason,
        });
    }

    /// Returns false when the table name was already taken.
    fn add_table(&mut self, table: &TableDef) -> bool {
        if self.tables.contains_key(&table.name) {
            self.skip(&table.name, "table is defined more than once".to_string());
            return false;
        }

        let entity_id = self.mint("entity");
        let mut entity = Entity::new(entity_id.clone(), table.name.clone());
        entity.comment = table.comment.clone();
        for def in &table.columns {
            let column = self.column(def);
            entity.columns.push(column);
        }

        self.unique_sets.insert(
            entity_id.clone(),
            table.unique_sets.iter().map(|set| set.iter().cloned().collect()).collect(),
        );
        self.tables.insert(table.name.clone(), entity_id);
        self.graph.entities.push(entity);
        true
    }

    fn column(&mut self, def: &ColumnDef) -> Column {
        let mut column = Column::new(self.mint("col"), def.name.clone(), def.data_type.clone());
        column.pk = def.pk;
        column.nn = def.nn || def.pk;
        column.uq = def.uq;
        column.ai = def.ai;
        column.default_value = def.default_value.clone();
        column.comment = def.comment.clone();
        column
    }

    /// Turns `fk` on `table` into FK columns and a relationship, or explains why not.
    fn link(&mut self, table: &str, fk: &ForeignKeyDef) -> Result<(), String> {
        let child_id = self
            .tables
            .get(table)
            .cloned()
            .ok_or_else(|| "table is not defined".to_string())?;
        let parent_id = self
            .tables
            .get(&fk.table)
            .cloned()
            .ok_or_else(|| format!("references unknown table {}", fk.table))?;

        let parent_columns = self.parent_key(&parent_id, fk)?;
        if parent_columns.len() != fk.columns.len() {
            return Err(format!(
                "{} columns reference a key of {} columns in {}",
                fk.columns.len(),
                parent_columns.len(),
                fk.table
            ));
        }

        let child = self
            .graph
            .entity(&child_id)
            .ok_or_else(|| "table is not defined".to_string())?;
        let mut child_columns = Vec::new();
        for name in &fk.columns {
            let column = child
                .column_named(name)
                .ok_or_else(|| format!("column {} does not exist", name))?;
            if column.is_fk() {
                return Err(format!("column {} already references another table", name));
            }
            child_columns.push(column);
        }

        let identifying = match child_columns.iter().filter(|c| c.pk).count() {
            0 => false,
            n if n == child_columns.len() => true,
            _ => return Err(format!("foreign key to {} is only partly in the primary key", fk.table)),
        };
        if parent_id == child_id && identifying {
            return Err("self reference through primary key columns".to_string());
        }
        if self.graph.find_relationship(&parent_id, &child_id).is_some() {
            return Err(format!("{} is already linked to {}", table, fk.table));
        }
        if self.graph.find_relationship(&child_id, &parent_id).is_some() {
            return Err(format!("{} already references {} in the other direction", fk.table, table));
        }

        let fk_names: BTreeSet<String> = fk.columns.iter().cloned().collect();
        let pk_names: BTreeSet<String> = child.pk_columns().map(|c| c.name.clone()).collect();
        let one_to_one = fk_names == pk_names
            || matches!(child_columns.as_slice(), [only] if only.uq)
            || self
                .unique_sets
                .get(&child_id)
                .is_some_and(|sets| sets.contains(&fk_names));
        let cardinality = if one_to_one {
            Cardinality::OneToOne
        } else {
            Cardinality::OneToMany
        };
        let column_ids: Vec<String> = child_columns.iter().map(|c| c.id.clone()).collect();

        let relationship_id = self.mint("rel");
        let group = (column_ids.len() > 1).then(|| self.mint("group"));
        self.graph
            .add_relationship_mut(Relationship::new(
                relationship_id,
                parent_id.clone(),
                child_id.clone(),
                RelationshipKind::new(cardinality, identifying),
            ))
            .map_err(|e| e.to_string())?;

        for (column_id, parent_column_id) in column_ids.iter().zip(parent_columns) {
            let column = self.graph.column_mut(&child_id, column_id).map_err(|e| e.to_string())?;
            column.role = ColumnRole::ForeignKey(ForeignKey {
                parent_entity_id: parent_id.clone(),
                parent_column_id,
                relationship_group_id: group.clone(),
                on_delete: fk.on_delete,
                on_update: fk.on_update,
            });
        }
        Ok(())
    }

    /// Ids of the parent columns `fk` points at, which must all be primary key columns.
    fn parent_key(&self, parent_id: &str, fk: &ForeignKeyDef) -> Result<Vec<String>, String> {
        let parent = self
            .graph
            .entity(parent_id)
            .ok_or_else(|| format!("references unknown table {}", fk.table))?;

        if fk.referenced.is_empty() {
            let key: Vec<String> = parent.pk_columns().map(|c| c.id.clone()).collect();
            if key.is_empty() {
                return Err(format!("{} has no primary key", fk.table));
            }
            return Ok(key);
        }

        fk.referenced
            .iter()
            .map(|name| match parent.column_named(name) {
                Some(column) if column.pk => Ok(column.id.clone()),
                Some(_) => Err(format!("{}.{} is not a primary key column", fk.table, name)),
                None => Err(format!("{}.{} does not exist", fk.table, name)),
            })
            .collect()
    }
}
