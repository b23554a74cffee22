//! Human-readable notes produced by cascading edits, for the UI to surface.

use std::fmt;

use serde::Serialize;

use crate::model::RelationshipKind;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Notification {
    ForeignKeyAdded { entity: String, column: String },
    ForeignKeyRemoved { entity: String, column: String },
    ForeignKeyRetyped { entity: String, column: String, data_type: String },
    ForeignKeyRenamed { entity: String, from: String, to: String },
    ForeignKeyPromoted { entity: String, column: String },
    ForeignKeyDemoted { entity: String, column: String },
    RelationshipRemoved { source: String, target: String },
    RelationshipRetyped { source: String, target: String, to: RelationshipKind },
    /// A cascade could not locate the descendant FK it expected; that branch was skipped.
    FkMatchNotFound { entity: String, column: String },
    ImportSkipped { table: String, reason: String },
}

impl Notification {
    pub fn is_warning(&self) -> bool {
        matches!(self, Self::FkMatchNotFound { .. } | Self::ImportSkipped { .. })
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ForeignKeyAdded { entity, column } => {
                write!(f, "Added foreign key {} to {}", column, entity)
            }
            Self::ForeignKeyRemoved { entity, column } => {
                write!(f, "Removed foreign key {} from {}", column, entity)
            }
            Self::ForeignKeyRetyped { entity, column, data_type } => {
                write!(f, "Changed {}.{} to {}", entity, column, data_type)
            }
            Self::ForeignKeyRenamed { entity, from, to } => {
                write!(f, "Renamed {}.{} to {}", entity, from, to)
            }
            Self::ForeignKeyPromoted { entity, column } => {
                write!(f, "{}.{} is now part of the primary key", entity, column)
            }
            Self::ForeignKeyDemoted { entity, column } => {
                write!(f, "{}.{} is no longer part of the primary key", entity, column)
            }
            Self::RelationshipRemoved { source, target } => {
                write!(f, "Removed relationship {} -> {}", source, target)
            }
            Self::RelationshipRetyped { source, target, to } => {
                write!(f, "Relationship {} -> {} is now {}", source, target, to.as_str())
            }
            Self::FkMatchNotFound { entity, column } => {
                write!(f, "Could not find the foreign key for {} in {}; skipped", column, entity)
            }
            Self::ImportSkipped { table, reason } => write!(f, "Skipped {}: {}", table, reason),
        }
    }
}
