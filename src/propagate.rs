//! Foreign-key propagation across descendant entities.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::config::FkDefaults;
use crate::graph::Graph;
use crate::matching::{ColumnTrace, Lookup, find_descendant_fk, fk_column_name};
use crate::model::{Column, ColumnRole, ForeignKey, ReferentialAction, Relationship};
use crate::notification::Notification;

/// Result of a cascading edit: the new graph plus what happened along the way.
#[derive(Debug, Clone, PartialEq)]
pub struct Propagated {
    pub graph: Graph,
    pub notifications: Vec<Notification>,
}

/// Creates the FK column for `added` on every child of `parent_id`, recursing
/// through children where the new FK becomes part of the key.
pub fn propagate_column_addition(
    graph: &Graph,
    parent_id: &str,
    added: &Column,
    defaults: FkDefaults,
) -> Propagated {
    run(graph, defaults, |cascade| {
        cascade.column_added(parent_id, added, &mut Visited::default())
    })
}

/// Removes the FK columns derived from a deleted parent column, transitively.
pub fn propagate_column_deletion(graph: &Graph, parent_id: &str, deleted: &ColumnTrace) -> Propagated {
    run(graph, FkDefaults::default(), |cascade| {
        cascade.column_removed(parent_id, deleted, &mut Visited::default())
    })
}

pub fn propagate_data_type_change(
    graph: &Graph,
    parent_id: &str,
    changed: &ColumnTrace,
    new_type: &str,
) -> Propagated {
    run(graph, FkDefaults::default(), |cascade| {
        cascade.data_type_changed(parent_id, changed, new_type, &mut Visited::default())
    })
}

/// Ripple for key columns of `child_id` that stopped being key columns.
pub fn propagate_relationship_type_change(
    graph: &Graph,
    child_id: &str,
    removed_pk_columns: &[ColumnTrace],
) -> Propagated {
    run(graph, FkDefaults::default(), |cascade| {
        cascade.relationship_type_changed(child_id, removed_pk_columns, &mut Visited::default())
    })
}

/// Renames FK columns that still carry the generated name of a renamed parent column.
pub fn propagate_column_rename(graph: &Graph, parent_id: &str, renamed: &ColumnTrace) -> Propagated {
    run(graph, FkDefaults::default(), |cascade| {
        cascade.column_renamed(parent_id, renamed, &mut Visited::default())
    })
}

fn run(graph: &Graph, defaults: FkDefaults, apply: impl FnOnce(&mut Cascade<'_>)) -> Propagated {
    let mut next = graph.clone();
    let mut cascade = Cascade::new(&mut next, defaults);
    apply(&mut cascade);
    let notifications = cascade.finish();
    Propagated {
        graph: next,
        notifications,
    }
}

/// Where a cascade has been: the `(entity, column)` pairs it already handled
/// and the entities on the current descent path. An ancestor on the path is
/// never re-entered.
#[derive(Debug, Default)]
pub(crate) struct Visited {
    seen: HashSet<(String, String)>,
    path: Vec<String>,
}

impl Visited {
    /// Enters `entity_id` unless it is an ancestor on the current path or none
    /// of `column_ids` is new for it. Every `true` must be paired with `leave`.
    fn enter<'a>(&mut self, entity_id: &str, column_ids: impl IntoIterator<Item = &'a str>) -> bool {
        if self.path.iter().any(|e| e == entity_id) {
            return false;
        }
        let fresh = column_ids.into_iter().fold(false, |fresh, column_id| {
            self.seen.insert((entity_id.to_string(), column_id.to_string())) || fresh
        });
        if fresh {
            self.path.push(entity_id.to_string());
        }
        fresh
    }

    fn leave(&mut self) {
        self.path.pop();
    }
}

/// A mutable walk over one working copy of the graph.
pub(crate) struct Cascade<'g> {
    pub(crate) graph: &'g mut Graph,
    defaults: FkDefaults,
    notifications: Vec<Notification>,
}

impl<'g> Cascade<'g> {
    pub(crate) fn new(graph: &'g mut Graph, defaults: FkDefaults) -> Self {
        Self {
            graph,
            defaults,
            notifications: Vec::new(),
        }
    }

    pub(crate) fn note(&mut self, notification: Notification) {
        self.notifications.push(notification);
    }

    pub(crate) fn finish(self) -> Vec<Notification> {
        self.notifications
    }

    pub(crate) fn label(&self, entity_id: &str) -> String {
        self.graph
            .entity(entity_id)
            .map(|e| e.label().to_string())
            .unwrap_or_else(|| entity_id.to_string())
    }

    /// Builds the FK column that `rel`'s child gets for parent column `source`.
    pub(crate) fn build_fk_column(
        &self,
        rel: &Relationship,
        parent_label: &str,
        source: &Column,
        group: Option<String>,
        actions: (ReferentialAction, ReferentialAction),
    ) -> Column {
        let identifying = rel.is_identifying();
        let logical_name = if source.logical_name.is_empty() {
            format!("{} {}", parent_label, source.name)
        } else {
            source.logical_name.clone()
        };
        let comment = if source.comment.is_empty() {
            format!("References {}.{}", parent_label, source.name)
        } else {
            source.comment.clone()
        };

        let mut column = Column::new(
            self.graph.mint_id("col"),
            fk_column_name(parent_label, &source.name),
            source.data_type.clone(),
        );
        column.logical_name = logical_name;
        column.comment = comment;
        column.pk = identifying;
        column.nn = identifying;
        column.role = ColumnRole::ForeignKey(ForeignKey {
            parent_entity_id: rel.source.clone(),
            parent_column_id: source.id.clone(),
            relationship_group_id: group,
            on_delete: actions.0,
            on_update: actions.1,
        });
        column
    }

    /// Referential actions of an existing FK from the same parent, else the defaults.
    pub(crate) fn sibling_actions(&self, child_id: &str, parent_id: &str) -> (ReferentialAction, ReferentialAction) {
        self.graph
            .entity(child_id)
            .and_then(|child| child.fk_columns_from(parent_id).find_map(|c| c.foreign_key()))
            .map(|fk| (fk.on_delete, fk.on_update))
            .unwrap_or((self.defaults.on_delete, self.defaults.on_update))
    }

    /// Gives every FK column from `parent_id` in `child_id` one shared group id
    /// once there are at least two of them, reusing an existing id if any.
    pub(crate) fn ensure_group(&mut self, child_id: &str, parent_id: &str) {
        let (count, existing) = match self.graph.entity(child_id) {
            Some(child) => (
                child.fk_columns_from(parent_id).count(),
                child
                    .fk_columns_from(parent_id)
                    .find_map(|c| c.foreign_key().and_then(|fk| fk.relationship_group_id.clone())),
            ),
            None => return,
        };
        if count < 2 {
            return;
        }

        let group = existing.unwrap_or_else(|| self.graph.mint_id("group"));
        if let Ok(child) = self.graph.entity_mut(child_id) {
            for fk in child.columns.iter_mut().filter_map(|c| c.foreign_key_mut()) {
                if fk.parent_entity_id == parent_id {
                    fk.relationship_group_id = Some(group.clone());
                }
            }
        }
    }

    /// Drops `rel_id` when its child has no FK columns left from the parent;
    /// a lone remaining FK column loses its composite group id.
    pub(crate) fn settle_relationship(&mut self, rel_id: &str) {
        let Some(rel) = self.graph.relationship(rel_id).cloned() else {
            return;
        };
        let remaining = self
            .graph
            .entity(&rel.target)
            .map(|child| child.fk_columns_from(&rel.source).count())
            .unwrap_or(0);

        if remaining == 0 {
            if self.graph.remove_relationship_mut(rel_id).is_ok() {
                debug!(relationship = rel_id, "relationship lost its last foreign key");
                let notification = Notification::RelationshipRemoved {
                    source: self.label(&rel.source),
                    target: self.label(&rel.target),
                };
                self.note(notification);
            }
        } else if remaining == 1 {
            if let Ok(child) = self.graph.entity_mut(&rel.target) {
                for fk in child.columns.iter_mut().filter_map(|c| c.foreign_key_mut()) {
                    if fk.parent_entity_id == rel.source {
                        fk.relationship_group_id = None;
                    }
                }
            }
        }
    }

    fn match_not_found(&mut self, child_id: &str, column: &str) {
        let entity = self.label(child_id);
        warn!(entity = %entity, column = %column, "no matching foreign key, skipping branch");
        self.note(Notification::FkMatchNotFound {
            entity,
            column: column.to_string(),
        });
    }

    pub(crate) fn column_added(&mut self, parent_id: &str, added: &Column, visited: &mut Visited) {
        if !visited.enter(parent_id, [added.id.as_str()]) {
            debug!(entity = parent_id, column = %added.name, "already visited, stopping addition cascade");
            return;
        }
        let parent_label = self.label(parent_id);
        let pattern = fk_column_name(&parent_label, &added.name);
        let children: Vec<Relationship> = self.graph.children_of(parent_id).cloned().collect();

        for rel in children {
            let child_id = rel.target.clone();
            let Some(child) = self.graph.entity(&child_id) else {
                continue;
            };
            let exists = child.columns.iter().any(|c| {
                c.foreign_key().is_some_and(|fk| {
                    fk.references(parent_id, added) || (fk.parent_entity_id == parent_id && c.name == pattern)
                })
            });
            if exists {
                debug!(entity = %child_id, column = %added.name, "foreign key already present");
                continue;
            }

            let actions = self.sibling_actions(&child_id, parent_id);
            let column = self.build_fk_column(&rel, &parent_label, added, None, actions);
            if self.graph.add_column_mut(&child_id, column.clone()).is_err() {
                continue;
            }
            self.ensure_group(&child_id, parent_id);
            debug!(entity = %child_id, column = %column.name, pk = column.pk, "added foreign key");
            let notification = Notification::ForeignKeyAdded {
                entity: self.label(&child_id),
                column: column.name.clone(),
            };
            self.note(notification);

            if column.pk {
                self.column_added(&child_id, &column, visited);
            }
        }
        visited.leave();
    }

    pub(crate) fn column_removed(&mut self, parent_id: &str, deleted: &ColumnTrace, visited: &mut Visited) {
        if !visited.enter(parent_id, [deleted.id.as_str()]) {
            debug!(entity = parent_id, column = %deleted.name, "already visited, stopping deletion cascade");
            return;
        }
        let children: Vec<Relationship> = self.graph.children_of(parent_id).cloned().collect();

        for rel in children {
            let found = match (self.graph.entity(parent_id), self.graph.entity(&rel.target)) {
                (Some(parent), Some(child)) => find_descendant_fk(&child.columns, parent, deleted, Lookup::Full),
                _ => continue,
            };
            let Some(m) = found else {
                self.match_not_found(&rel.target, &deleted.name);
                continue;
            };

            let removed = match self.graph.entity_mut(&rel.target) {
                Ok(child) => child.columns.remove(m.index),
                Err(_) => continue,
            };
            debug!(entity = %rel.target, column = %removed.name, quality = ?m.quality, "removed foreign key");
            let notification = Notification::ForeignKeyRemoved {
                entity: self.label(&rel.target),
                column: removed.name.clone(),
            };
            self.note(notification);

            if removed.pk {
                self.column_removed(&rel.target, &ColumnTrace::from(&removed), visited);
            }
            self.settle_relationship(&rel.id);
        }
        visited.leave();
    }

    pub(crate) fn data_type_changed(
        &mut self,
        parent_id: &str,
        changed: &ColumnTrace,
        new_type: &str,
        visited: &mut Visited,
    ) {
        if !visited.enter(parent_id, [changed.id.as_str()]) {
            debug!(entity = parent_id, column = %changed.name, "already visited, stopping type cascade");
            return;
        }
        let children: Vec<Relationship> = self.graph.children_of(parent_id).cloned().collect();

        for rel in children {
            let found = match (self.graph.entity(parent_id), self.graph.entity(&rel.target)) {
                (Some(parent), Some(child)) => find_descendant_fk(&child.columns, parent, changed, Lookup::Strict),
                _ => continue,
            };
            let Some(m) = found else {
                self.match_not_found(&rel.target, &changed.name);
                continue;
            };

            let retyped = match self.graph.entity_mut(&rel.target) {
                Ok(child) => {
                    let column = &mut child.columns[m.index];
                    column.data_type = new_type.to_string();
                    column.clone()
                }
                Err(_) => continue,
            };
            let notification = Notification::ForeignKeyRetyped {
                entity: self.label(&rel.target),
                column: retyped.name.clone(),
                data_type: new_type.to_string(),
            };
            self.note(notification);

            if retyped.pk {
                self.data_type_changed(&rel.target, &ColumnTrace::from(&retyped), new_type, visited);
            }
        }
        visited.leave();
    }

    pub(crate) fn relationship_type_changed(
        &mut self,
        child_id: &str,
        removed_keys: &[ColumnTrace],
        visited: &mut Visited,
    ) {
        if !visited.enter(child_id, removed_keys.iter().map(|k| k.id.as_str())) {
            debug!(entity = child_id, "already visited, stopping key cascade");
            return;
        }
        let children: Vec<Relationship> = self.graph.children_of(child_id).cloned().collect();

        for rel in children {
            let affected: Vec<usize> = match self.graph.entity(&rel.target) {
                Some(grandchild) => grandchild
                    .columns
                    .iter()
                    .enumerate()
                    .filter(|&(_, c)| {
                        c.foreign_key().is_some_and(|fk| {
                            fk.parent_entity_id == child_id
                                && removed_keys
                                    .iter()
                                    .any(|k| fk.parent_column_id == k.id || fk.parent_column_id == k.name)
                        })
                    })
                    .map(|(i, _)| i)
                    .collect(),
                None => continue,
            };
            if affected.is_empty() {
                continue;
            }

            let mut removed = Vec::with_capacity(affected.len());
            if let Ok(grandchild) = self.graph.entity_mut(&rel.target) {
                for &i in affected.iter().rev() {
                    removed.push(grandchild.columns.remove(i));
                }
            }
            removed.reverse();

            for column in &removed {
                let notification = Notification::ForeignKeyRemoved {
                    entity: self.label(&rel.target),
                    column: column.name.clone(),
                };
                self.note(notification);
            }
            self.settle_relationship(&rel.id);

            let lost_keys: Vec<ColumnTrace> = removed.iter().filter(|c| c.pk).map(ColumnTrace::from).collect();
            if !lost_keys.is_empty() {
                self.relationship_type_changed(&rel.target, &lost_keys, visited);
            }
        }
        visited.leave();
    }

    pub(crate) fn column_renamed(&mut self, parent_id: &str, renamed: &ColumnTrace, visited: &mut Visited) {
        let Some(previous) = renamed.previous_name.as_deref() else {
            return;
        };
        if !visited.enter(parent_id, [renamed.id.as_str()]) {
            debug!(entity = parent_id, column = %renamed.name, "already visited, stopping rename cascade");
            return;
        }
        let parent_label = self.label(parent_id);
        let old_name = fk_column_name(&parent_label, previous);
        let new_name = fk_column_name(&parent_label, &renamed.name);
        let children: Vec<Relationship> = self.graph.children_of(parent_id).cloned().collect();

        for rel in children {
            let found = match (self.graph.entity(parent_id), self.graph.entity(&rel.target)) {
                (Some(parent), Some(child)) => find_descendant_fk(&child.columns, parent, renamed, Lookup::Full),
                _ => continue,
            };
            let Some(m) = found else {
                self.match_not_found(&rel.target, &renamed.name);
                continue;
            };

            let outcome = match self.graph.entity_mut(&rel.target) {
                Ok(child) => {
                    let column = &mut child.columns[m.index];
                    if let Some(fk) = column.foreign_key_mut() {
                        fk.parent_column_id = renamed.id.clone();
                    }
                    if column.name == old_name {
                        let before = std::mem::replace(&mut column.name, new_name.clone());
                        Some((ColumnTrace::renamed(column, before.clone()), before))
                    } else {
                        None
                    }
                }
                Err(_) => continue,
            };

            if let Some((trace, before)) = outcome {
                let notification = Notification::ForeignKeyRenamed {
                    entity: self.label(&rel.target),
                    from: before,
                    to: trace.name.clone(),
                };
                self.note(notification);
                if trace.pk {
                    self.column_renamed(&rel.target, &trace, visited);
                }
            }
        }
        visited.leave();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Entity, RelationshipKind};
    use pretty_assertions::assert_eq;

    fn fk_col(id: &str, name: &str, parent: &str, parent_column: &str, pk: bool) -> Column {
        let mut column = Column::new(id, name, "INT").referencing(ForeignKey::new(parent, parent_column));
        column.pk = pk;
        column.nn = pk;
        column
    }

    /// user -> order -> order_item, both identifying.
    fn chain() -> Graph {
        let mut graph = Graph::new();
        graph
            .entities
            .push(Entity::new("user", "user").with_column(Column::new("u_id", "id", "INT").primary_key()));
        graph.entities.push(
            Entity::new("order", "order")
                .with_column(Column::new("o_id", "id", "INT").primary_key())
                .with_column(fk_col("o_user", "user_id", "user", "u_id", true)),
        );

        let mut item_order = fk_col("i_order", "order_id", "order", "o_id", true);
        let mut item_user = fk_col("i_user", "order_user_id", "order", "o_user", true);
        for column in [&mut item_order, &mut item_user] {
            if let Some(fk) = column.foreign_key_mut() {
                fk.relationship_group_id = Some("g1".to_string());
            }
        }
        graph.entities.push(
            Entity::new("item", "order_item")
                .with_column(Column::new("i_id", "id", "INT").primary_key())
                .with_column(item_order)
                .with_column(item_user),
        );
        graph.relationships.push(Relationship::new(
            "r1",
            "user",
            "order",
            RelationshipKind::OneToManyIdentifying,
        ));
        graph.relationships.push(Relationship::new(
            "r2",
            "order",
            "item",
            RelationshipKind::OneToManyIdentifying,
        ));
        graph
    }

    fn column_names(graph: &Graph, entity: &str) -> Vec<String> {
        graph
            .entity(entity)
            .unwrap()
            .columns
            .iter()
            .map(|c| c.name.clone())
            .collect()
    }

    #[test]
    fn test_addition_cascades_through_identifying_children() {
        let graph = chain();
        let added = Column::new("u_tenant", "tenant", "UUID").primary_key();
        let graph = graph.add_column("user", added.clone()).unwrap();

        let result = propagate_column_addition(&graph, "user", &added, FkDefaults::default());
        let order = result.graph.entity("order").unwrap();
        let fk = order.column_named("user_tenant").unwrap();
        assert!(fk.pk && fk.nn);
        assert_eq!(fk.data_type, "UUID");
        assert_eq!(fk.foreign_key().unwrap().parent_column_id, "u_tenant");

        // user -> order is now composite, so both FKs share a group.
        let group = fk.foreign_key().unwrap().relationship_group_id.clone();
        assert!(group.is_some());
        assert_eq!(
            order.column("o_user").unwrap().foreign_key().unwrap().relationship_group_id,
            group
        );

        let item = result.graph.entity("item").unwrap();
        let derived = item.column_named("order_user_tenant").unwrap();
        assert!(derived.pk);
        assert_eq!(derived.foreign_key().unwrap().relationship_group_id.as_deref(), Some("g1"));
        assert_eq!(result.notifications.len(), 2);
    }

    #[test]
    fn test_addition_skips_existing_reference() {
        let graph = chain();
        let existing = graph.entity("user").unwrap().columns[0].clone();
        let result = propagate_column_addition(&graph, "user", &existing, FkDefaults::default());
        assert_eq!(result.graph, graph);
        assert!(result.notifications.is_empty());
    }

    #[test]
    fn test_non_identifying_child_stops_recursion() {
        let mut graph = chain();
        graph.relationships[0].kind = RelationshipKind::OneToManyNonIdentifying;
        let added = Column::new("u_code", "code", "TEXT").primary_key();
        let graph = graph.add_column("user", added.clone()).unwrap();

        let result = propagate_column_addition(&graph, "user", &added, FkDefaults::default());
        let fk = result.graph.entity("order").unwrap().column_named("user_code").unwrap().clone();
        assert!(!fk.pk && !fk.nn);
        assert!(result.graph.entity("item").unwrap().column_named("order_user_code").is_none());
    }

    #[test]
    fn test_deletion_cascades_and_drops_empty_relationship() {
        let (graph, removed) = chain().remove_column("user", "u_id").unwrap();
        let result = propagate_column_deletion(&graph, "user", &ColumnTrace::from(&removed));

        assert_eq!(column_names(&result.graph, "order"), vec!["id"]);
        assert_eq!(column_names(&result.graph, "item"), vec!["id", "order_id"]);
        assert!(result.graph.relationship("r1").is_none());
        assert!(result.graph.relationship("r2").is_some());

        // The single remaining FK from order is no longer a composite group.
        let fk = result.graph.entity("item").unwrap().column("i_order").unwrap();
        assert_eq!(fk.foreign_key().unwrap().relationship_group_id, None);
        assert!(result.notifications.contains(&Notification::RelationshipRemoved {
            source: "user".to_string(),
            target: "order".to_string(),
        }));
    }

    #[test]
    fn test_deletion_removes_relationship_when_only_fk_derived() {
        let mut graph = chain();
        let item = graph.entities.iter_mut().find(|e| e.id == "item").unwrap();
        item.columns.retain(|c| c.id != "i_order");

        let (graph, removed) = graph.remove_column("user", "u_id").unwrap();
        let result = propagate_column_deletion(&graph, "user", &ColumnTrace::from(&removed));

        assert!(result.graph.relationship("r1").is_none());
        assert!(result.graph.relationship("r2").is_none());
        assert_eq!(column_names(&result.graph, "item"), vec!["id"]);
    }

    #[test]
    fn test_missing_fk_is_reported_not_fatal() {
        let mut graph = chain();
        let order = graph.entities.iter_mut().find(|e| e.id == "order").unwrap();
        order.columns.retain(|c| c.id != "o_user");

        let (graph, removed) = graph.remove_column("user", "u_id").unwrap();
        let result = propagate_column_deletion(&graph, "user", &ColumnTrace::from(&removed));

        assert_eq!(
            result.notifications,
            vec![Notification::FkMatchNotFound {
                entity: "order".to_string(),
                column: "id".to_string(),
            }]
        );
        assert!(result.notifications[0].is_warning());
        assert_eq!(result.graph, graph);
    }

    #[test]
    fn test_data_type_follows_transitive_copies() {
        let graph = chain()
            .set_column_field("user", "u_id", crate::graph::ColumnField::DataType("BIGINT".to_string()))
            .unwrap();
        let changed = ColumnTrace::from(graph.entity("user").unwrap().column("u_id").unwrap());
        let result = propagate_data_type_change(&graph, "user", &changed, "BIGINT");

        let order = result.graph.entity("order").unwrap();
        assert_eq!(order.column("o_user").unwrap().data_type, "BIGINT");
        let item = result.graph.entity("item").unwrap();
        assert_eq!(item.column("i_user").unwrap().data_type, "BIGINT");
        assert_eq!(item.column("i_order").unwrap().data_type, "INT");
    }

    #[test]
    fn test_demoted_key_partial_removal_keeps_relationship() {
        let graph = chain()
            .set_column_field("order", "o_user", crate::graph::ColumnField::Pk(false))
            .unwrap();
        let demoted = ColumnTrace::from(graph.entity("order").unwrap().column("o_user").unwrap());
        let result = propagate_relationship_type_change(&graph, "order", &[demoted]);

        assert_eq!(column_names(&result.graph, "item"), vec!["id", "order_id"]);
        assert!(result.graph.relationship("r2").is_some());
    }

    #[test]
    fn test_demoted_key_full_removal_drops_relationship() {
        let graph = chain();
        let keys: Vec<ColumnTrace> = graph
            .entity("order")
            .unwrap()
            .pk_columns()
            .map(ColumnTrace::from)
            .collect();
        let result = propagate_relationship_type_change(&graph, "order", &keys);

        assert!(result.graph.relationship("r2").is_none());
        assert_eq!(column_names(&result.graph, "item"), vec!["id"]);
    }

    #[test]
    fn test_cycle_terminates() {
        let mut graph = Graph::new();
        graph
            .entities
            .push(Entity::new("a", "a").with_column(Column::new("a1", "id", "INT").primary_key()));
        graph
            .entities
            .push(Entity::new("b", "b").with_column(Column::new("b1", "id", "INT").primary_key()));
        graph
            .relationships
            .push(Relationship::new("ab", "a", "b", RelationshipKind::OneToOneIdentifying));
        graph
            .relationships
            .push(Relationship::new("ba", "b", "a", RelationshipKind::OneToOneIdentifying));

        let added = Column::new("a2", "code", "INT").primary_key();
        graph.entities[0].columns.push(added.clone());
        let result = propagate_column_addition(&graph, "a", &added, FkDefaults::default());

        assert!(result.graph.entity("b").unwrap().column_named("a_code").is_some());
        assert!(result.graph.entity("a").unwrap().column_named("b_a_code").is_some());
        assert_eq!(result.notifications.len(), 2);
    }

    /// a <-> b, both identifying, each carrying the other's key and the
    /// other's copy of its own key.
    fn cycle() -> Graph {
        let mut graph = Graph::new();
        graph.entities.push(
            Entity::new("a", "a")
                .with_column(Column::new("a1", "id", "INT").primary_key())
                .with_column(fk_col("a_b", "b_id", "b", "b1", true))
                .with_column(fk_col("a_ba", "b_a_id", "b", "b_a", true)),
        );
        graph.entities.push(
            Entity::new("b", "b")
                .with_column(Column::new("b1", "id", "INT").primary_key())
                .with_column(fk_col("b_a", "a_id", "a", "a1", true))
                .with_column(fk_col("b_ab", "a_b_id", "a", "a_b", true)),
        );
        graph
            .relationships
            .push(Relationship::new("ab", "a", "b", RelationshipKind::OneToManyIdentifying));
        graph
            .relationships
            .push(Relationship::new("ba", "b", "a", RelationshipKind::OneToManyIdentifying));
        graph
    }

    #[test]
    fn test_deletion_stops_at_cycle() {
        let (graph, removed) = cycle().remove_column("a", "a1").unwrap();
        let result = propagate_column_deletion(&graph, "a", &ColumnTrace::from(&removed));

        assert_eq!(column_names(&result.graph, "a"), vec!["b_id"]);
        assert_eq!(column_names(&result.graph, "b"), vec!["id", "a_b_id"]);
        assert_eq!(result.graph.relationships.len(), 2);
        assert_eq!(result.notifications.len(), 2);
        assert!(result.notifications.iter().all(|n| !n.is_warning()));
    }

    #[test]
    fn test_data_type_stops_at_cycle() {
        let graph = cycle()
            .set_column_field("a", "a1", crate::graph::ColumnField::DataType("BIGINT".to_string()))
            .unwrap();
        let changed = ColumnTrace::from(graph.entity("a").unwrap().column("a1").unwrap());
        let result = propagate_data_type_change(&graph, "a", &changed, "BIGINT");

        let a = result.graph.entity("a").unwrap();
        let b = result.graph.entity("b").unwrap();
        assert_eq!(b.column("b_a").unwrap().data_type, "BIGINT");
        assert_eq!(a.column("a_ba").unwrap().data_type, "BIGINT");
        assert_eq!(a.column("a_b").unwrap().data_type, "INT");
        assert_eq!(b.column("b_ab").unwrap().data_type, "INT");
        assert_eq!(result.notifications.len(), 2);
    }

    #[test]
    fn test_demotion_stops_at_cycle() {
        let graph = cycle();
        let key = ColumnTrace::from(graph.entity("b").unwrap().column("b1").unwrap());
        let result = propagate_relationship_type_change(&graph, "b", &[key]);

        assert_eq!(column_names(&result.graph, "a"), vec!["id", "b_a_id"]);
        assert_eq!(column_names(&result.graph, "b"), vec!["id", "a_id"]);
        assert_eq!(result.graph.relationships.len(), 2);
    }

    #[test]
    fn test_diamond_addition_reaches_both_paths() {
        // a -> b -> d and a -> c -> d, d -> e.
        let mut graph = Graph::new();
        for id in ["a", "b", "c", "d", "e"] {
            graph.entities.push(Entity::new(id, id));
        }
        for (id, source, target) in [("ab", "a", "b"), ("ac", "a", "c"), ("bd", "b", "d"), ("cd", "c", "d"), ("de", "d", "e")] {
            graph
                .relationships
                .push(Relationship::new(id, source, target, RelationshipKind::OneToManyIdentifying));
        }
        let added = Column::new("a_x", "x", "INT").primary_key();
        let graph = graph.add_column("a", added.clone()).unwrap();

        let result = propagate_column_addition(&graph, "a", &added, FkDefaults::default());
        assert_eq!(column_names(&result.graph, "d"), vec!["b_a_x", "c_a_x"]);
        assert_eq!(column_names(&result.graph, "e"), vec!["d_b_a_x", "d_c_a_x"]);
    }

    #[test]
    fn test_rename_follows_generated_names_only() {
        let mut graph = chain();
        let order = graph.entities.iter_mut().find(|e| e.id == "order").unwrap();
        order.columns.push(fk_col("o_custom", "buyer", "user", "legacy", false));

        let graph = graph
            .set_column_field("user", "u_id", crate::graph::ColumnField::Name("uid".to_string()))
            .unwrap();
        let renamed = ColumnTrace::renamed(graph.entity("user").unwrap().column("u_id").unwrap(), "id");
        let result = propagate_column_rename(&graph, "user", &renamed);

        assert_eq!(column_names(&result.graph, "order"), vec!["id", "user_uid", "buyer"]);
        assert_eq!(
            column_names(&result.graph, "item"),
            vec!["id", "order_id", "order_user_uid"]
        );
    }
}
