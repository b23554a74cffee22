//! Locating the FK column in a child entity that corresponds to a parent PK column.

use std::collections::HashSet;

use crate::model::{Column, Entity, ForeignKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchQuality {
    /// `parentColumnId` equals the parent column id.
    ExactId,
    /// Matched the parent column's current or previous name.
    PriorName,
    /// The only unbound same-parent FK with the same data type.
    UniqueType,
    /// Unbound same-parent FK whose `parentColumnId` contains the column name.
    Substring,
    /// Legacy `<parentLabel>_<columnName>` naming.
    NamePattern,
    /// Latest of several unbound same-parent FKs with the same data type.
    MostRecent,
    /// First unbound same-parent FK.
    AnySameParent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FkMatch {
    pub index: usize,
    pub quality: MatchQuality,
}

/// Which deletion tiers to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// All five tiers.
    Full,
    /// Exact id and name pattern only.
    Strict,
}

/// Generated name of an FK column: `<parentLabel>_<columnName>`.
pub fn fk_column_name(parent_label: &str, column_name: &str) -> String {
    format!("{}_{}", parent_label, column_name)
}

/// A parent column as it was when a cascade started.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnTrace {
    pub id: String,
    pub name: String,
    pub previous_name: Option<String>,
    pub data_type: String,
    pub pk: bool,
}

impl ColumnTrace {
    pub fn renamed(column: &Column, previous_name: impl Into<String>) -> Self {
        Self {
            previous_name: Some(previous_name.into()),
            ..Self::from(column)
        }
    }

    fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.previous_name.as_deref())
    }
}

impl From<&Column> for ColumnTrace {
    fn from(column: &Column) -> Self {
        Self {
            id: column.id.clone(),
            name: column.name.clone(),
            previous_name: None,
            data_type: column.data_type.clone(),
            pk: column.pk,
        }
    }
}

/// True when `fk` already points at a live column of `parent` other than `own_id`.
fn bound_elsewhere(fk: &ForeignKey, parent: &Entity, own_id: &str) -> bool {
    parent
        .columns
        .iter()
        .any(|c| c.id != own_id && (fk.parent_column_id == c.id || fk.parent_column_id == c.name))
}

fn same_type(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

/// Finds the FK column in `target_columns` that already stands for `source_pk`.
///
/// Columns whose ids are in `claimed` are skipped, so a composite key never
/// maps two parent columns onto one FK column.
pub fn find_existing_fk_column(
    target_columns: &[Column],
    source: &Entity,
    source_pk: &Column,
    claimed: &HashSet<String>,
) -> Option<FkMatch> {
    let open = |c: &Column| !claimed.contains(&c.id);
    let found = |index, quality| Some(FkMatch { index, quality });

    if let Some(i) = target_columns.iter().position(|c| {
        open(c)
            && c.foreign_key()
                .is_some_and(|fk| fk.parent_entity_id == source.id && fk.parent_column_id == source_pk.id)
    }) {
        return found(i, MatchQuality::ExactId);
    }

    let candidates: Vec<usize> = target_columns
        .iter()
        .enumerate()
        .filter(|&(_, c)| {
            open(c)
                && c.foreign_key().is_some_and(|fk| {
                    fk.parent_entity_id == source.id && !bound_elsewhere(fk, source, &source_pk.id)
                })
        })
        .map(|(i, _)| i)
        .collect();
    let typed: Vec<usize> = candidates
        .iter()
        .copied()
        .filter(|&i| same_type(&target_columns[i].data_type, &source_pk.data_type))
        .collect();

    if typed.len() == 1 {
        return found(typed[0], MatchQuality::UniqueType);
    }

    let pattern = fk_column_name(source.label(), &source_pk.name);
    if let Some(i) = target_columns.iter().position(|c| {
        open(c)
            && c.foreign_key().is_some_and(|fk| {
                let parent_ok = fk.parent_entity_id.is_empty()
                    || (fk.parent_entity_id == source.id && !bound_elsewhere(fk, source, &source_pk.id));
                parent_ok && (c.name == pattern || fk.parent_column_id == source_pk.name)
            })
    }) {
        return found(i, MatchQuality::NamePattern);
    }

    if let Some(&last) = typed.last() {
        return found(last, MatchQuality::MostRecent);
    }

    candidates.first().and_then(|&i| found(i, MatchQuality::AnySameParent))
}

/// Finds the FK column in `child_columns` derived from the traced column of `parent`.
///
/// `parent` is the parent entity in its current state: for a deletion the
/// traced column is already gone from it.
pub fn find_descendant_fk(
    child_columns: &[Column],
    parent: &Entity,
    trace: &ColumnTrace,
    lookup: Lookup,
) -> Option<FkMatch> {
    let found = |index, quality| Some(FkMatch { index, quality });
    let from_parent = |c: &Column| {
        c.foreign_key()
            .filter(|fk| fk.parent_entity_id == parent.id)
            .cloned()
    };

    if let Some(i) = child_columns
        .iter()
        .position(|c| from_parent(c).is_some_and(|fk| fk.parent_column_id == trace.id))
    {
        return found(i, MatchQuality::ExactId);
    }

    if lookup == Lookup::Full {
        if let Some(i) = child_columns.iter().position(|c| {
            from_parent(c).is_some_and(|fk| {
                !bound_elsewhere(&fk, parent, &trace.id)
                    && trace.names().any(|n| fk.parent_column_id == n || c.name == n)
            })
        }) {
            return found(i, MatchQuality::PriorName);
        }

        let candidates: Vec<usize> = child_columns
            .iter()
            .enumerate()
            .filter(|&(_, c)| from_parent(c).is_some_and(|fk| !bound_elsewhere(&fk, parent, &trace.id)))
            .map(|(i, _)| i)
            .collect();

        let typed: Vec<usize> = candidates
            .iter()
            .copied()
            .filter(|&i| same_type(&child_columns[i].data_type, &trace.data_type))
            .collect();
        if typed.len() == 1 {
            return found(typed[0], MatchQuality::UniqueType);
        }

        if !trace.name.is_empty() {
            if let Some(&i) = candidates.iter().find(|&&i| {
                child_columns[i]
                    .foreign_key()
                    .is_some_and(|fk| fk.parent_column_id.contains(trace.name.as_str()))
            }) {
                return found(i, MatchQuality::Substring);
            }
        }
    }

    let patterns: Vec<String> = trace
        .names()
        .map(|n| fk_column_name(parent.label(), n))
        .collect();
    child_columns
        .iter()
        .position(|c| {
            c.foreign_key().is_some_and(|fk| {
                let parent_ok = fk.parent_entity_id.is_empty()
                    || (fk.parent_entity_id == parent.id && !bound_elsewhere(fk, parent, &trace.id));
                parent_ok && patterns.iter().any(|p| *p == c.name)
            })
        })
        .and_then(|i| found(i, MatchQuality::NamePattern))
}
