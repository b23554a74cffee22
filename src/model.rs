//! Diagram data model: entities, typed columns and relationships.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Unknown JSON members carried through load/save untouched.
pub type Passthrough = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub id: String,
    pub physical_name: String,
    #[serde(default)]
    pub logical_name: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub columns: Vec<Column>,
    #[serde(flatten)]
    pub extra: Passthrough,
}

impl Entity {
    pub fn new(id: impl Into<String>, physical_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            physical_name: physical_name.into(),
            logical_name: String::new(),
            comment: String::new(),
            columns: Vec::new(),
            extra: Passthrough::new(),
        }
    }

    pub fn with_column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    /// Name used when deriving FK column names (`<label>_<column>`).
    pub fn label(&self) -> &str {
        &self.physical_name
    }

    pub fn column(&self, column_id: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.id == column_id)
    }

    pub fn column_mut(&mut self, column_id: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.id == column_id)
    }

    pub fn column_index(&self, column_id: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.id == column_id)
    }

    pub fn column_named(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn pk_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.pk)
    }

    /// FK columns of this entity that point at `parent_id`.
    pub fn fk_columns_from<'a>(&'a self, parent_id: &'a str) -> impl Iterator<Item = &'a Column> + 'a {
        self.columns
            .iter()
            .filter(move |c| c.foreign_key().is_some_and(|fk| fk.parent_entity_id == parent_id))
    }
}

/// Referential action attached to an FK column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReferentialAction {
    #[serde(rename = "CASCADE")]
    Cascade,
    #[serde(rename = "RESTRICT")]
    Restrict,
    #[serde(rename = "SET NULL")]
    SetNull,
    #[serde(rename = "SET DEFAULT")]
    SetDefault,
    #[default]
    #[serde(rename = "NO ACTION")]
    NoAction,
}

impl ReferentialAction {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "CASCADE" => Some(Self::Cascade),
            "RESTRICT" => Some(Self::Restrict),
            "SET NULL" => Some(Self::SetNull),
            "SET DEFAULT" => Some(Self::SetDefault),
            "NO ACTION" => Some(Self::NoAction),
            _ => None,
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Cascade => "CASCADE",
            Self::Restrict => "RESTRICT",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
            Self::NoAction => "NO ACTION",
        }
    }
}

/// Reference from an FK column to the parent PK column it was derived from.
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKey {
    pub parent_entity_id: String,
    /// Column id of the parent PK; older documents store the column name here.
    pub parent_column_id: String,
    /// Shared by every FK column created by one composite relationship.
    pub relationship_group_id: Option<String>,
    pub on_delete: ReferentialAction,
    pub on_update: ReferentialAction,
}

impl ForeignKey {
    pub fn new(parent_entity_id: impl Into<String>, parent_column_id: impl Into<String>) -> Self {
        Self {
            parent_entity_id: parent_entity_id.into(),
            parent_column_id: parent_column_id.into(),
            relationship_group_id: None,
            on_delete: ReferentialAction::default(),
            on_update: ReferentialAction::default(),
        }
    }

    /// Whether this reference names `column` of `parent_id`, by id or legacy name.
    pub fn references(&self, parent_id: &str, column: &Column) -> bool {
        self.parent_entity_id == parent_id
            && (self.parent_column_id == column.id || self.parent_column_id == column.name)
    }

    /// Same composite group: equal group ids, or both ungrouped.
    pub fn same_group(&self, other: &ForeignKey) -> bool {
        self.parent_entity_id == other.parent_entity_id
            && self.relationship_group_id == other.relationship_group_id
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum ColumnRole {
    #[default]
    Plain,
    ForeignKey(ForeignKey),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ColumnRecord", into = "ColumnRecord")]
pub struct Column {
    pub id: String,
    pub name: String,
    pub logical_name: String,
    pub data_type: String,
    pub pk: bool,
    pub nn: bool,
    pub uq: bool,
    pub ai: bool,
    pub comment: String,
    pub default_value: String,
    pub role: ColumnRole,
    pub extra: Passthrough,
}

impl Column {
    pub fn new(id: impl Into<String>, name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            logical_name: String::new(),
            data_type: data_type.into(),
            pk: false,
            nn: false,
            uq: false,
            ai: false,
            comment: String::new(),
            default_value: String::new(),
            role: ColumnRole::Plain,
            extra: Passthrough::new(),
        }
    }

    /// Marks the column as primary key (which implies not null).
    pub fn primary_key(mut self) -> Self {
        self.pk = true;
        self.nn = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nn = true;
        self
    }

    pub fn referencing(mut self, fk: ForeignKey) -> Self {
        self.role = ColumnRole::ForeignKey(fk);
        self
    }

    pub fn is_fk(&self) -> bool {
        matches!(self.role, ColumnRole::ForeignKey(_))
    }

    pub fn foreign_key(&self) -> Option<&ForeignKey> {
        match &self.role {
            ColumnRole::ForeignKey(fk) => Some(fk),
            ColumnRole::Plain => None,
        }
    }

    pub fn foreign_key_mut(&mut self) -> Option<&mut ForeignKey> {
        match &mut self.role {
            ColumnRole::ForeignKey(fk) => Some(fk),
            ColumnRole::Plain => None,
        }
    }
}

/// Flat wire form of [`Column`]: `fk` flag plus optional reference fields.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ColumnRecord {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    logical_name: String,
    #[serde(default)]
    data_type: String,
    #[serde(default)]
    pk: bool,
    #[serde(default)]
    fk: bool,
    #[serde(default)]
    nn: bool,
    #[serde(default)]
    uq: bool,
    #[serde(default)]
    ai: bool,
    #[serde(default)]
    comment: String,
    #[serde(default)]
    default_value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parent_entity_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parent_column_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    relationship_group_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    on_delete: Option<ReferentialAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    on_update: Option<ReferentialAction>,
    #[serde(flatten)]
    extra: Passthrough,
}

impl From<ColumnRecord> for Column {
    fn from(r: ColumnRecord) -> Self {
        let role = if r.fk {
            ColumnRole::ForeignKey(ForeignKey {
                parent_entity_id: r.parent_entity_id.unwrap_or_default(),
                parent_column_id: r.parent_column_id.unwrap_or_default(),
                relationship_group_id: r.relationship_group_id,
                on_delete: r.on_delete.unwrap_or_default(),
                on_update: r.on_update.unwrap_or_default(),
            })
        } else {
            ColumnRole::Plain
        };

        Column {
            id: r.id,
            name: r.name,
            logical_name: r.logical_name,
            data_type: r.data_type,
            pk: r.pk,
            nn: r.nn,
            uq: r.uq,
            ai: r.ai,
            comment: r.comment,
            default_value: r.default_value,
            role,
            extra: r.extra,
        }
    }
}

impl From<Column> for ColumnRecord {
    fn from(c: Column) -> Self {
        let (fk, parent_entity_id, parent_column_id, relationship_group_id, on_delete, on_update) =
            match c.role {
                ColumnRole::ForeignKey(fk) => (
                    true,
                    Some(fk.parent_entity_id),
                    Some(fk.parent_column_id),
                    fk.relationship_group_id,
                    Some(fk.on_delete),
                    Some(fk.on_update),
                ),
                ColumnRole::Plain => (false, None, None, None, None, None),
            };

        ColumnRecord {
            id: c.id,
            name: c.name,
            logical_name: c.logical_name,
            data_type: c.data_type,
            pk: c.pk,
            fk,
            nn: c.nn,
            uq: c.uq,
            ai: c.ai,
            comment: c.comment,
            default_value: c.default_value,
            parent_entity_id,
            parent_column_id,
            relationship_group_id,
            on_delete,
            on_update,
            extra: c.extra,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    OneToOne,
    OneToMany,
}

/// Relationship kind: cardinality and identifying-ness are independent axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelationshipKind {
    OneToOneIdentifying,
    OneToOneNonIdentifying,
    OneToManyIdentifying,
    OneToManyNonIdentifying,
}

impl RelationshipKind {
    pub fn new(cardinality: Cardinality, identifying: bool) -> Self {
        match (cardinality, identifying) {
            (Cardinality::OneToOne, true) => Self::OneToOneIdentifying,
            (Cardinality::OneToOne, false) => Self::OneToOneNonIdentifying,
            (Cardinality::OneToMany, true) => Self::OneToManyIdentifying,
            (Cardinality::OneToMany, false) => Self::OneToManyNonIdentifying,
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "one-to-one-identifying" => Some(Self::OneToOneIdentifying),
            "one-to-one-non-identifying" => Some(Self::OneToOneNonIdentifying),
            "one-to-many-identifying" => Some(Self::OneToManyIdentifying),
            "one-to-many-non-identifying" => Some(Self::OneToManyNonIdentifying),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneToOneIdentifying => "one-to-one-identifying",
            Self::OneToOneNonIdentifying => "one-to-one-non-identifying",
            Self::OneToManyIdentifying => "one-to-many-identifying",
            Self::OneToManyNonIdentifying => "one-to-many-non-identifying",
        }
    }

    pub fn is_identifying(&self) -> bool {
        matches!(self, Self::OneToOneIdentifying | Self::OneToManyIdentifying)
    }

    pub fn cardinality(&self) -> Cardinality {
        match self {
            Self::OneToOneIdentifying | Self::OneToOneNonIdentifying => Cardinality::OneToOne,
            Self::OneToManyIdentifying | Self::OneToManyNonIdentifying => Cardinality::OneToMany,
        }
    }

    /// Same cardinality, identifying-ness replaced.
    pub fn with_identifying(&self, identifying: bool) -> Self {
        Self::new(self.cardinality(), identifying)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub id: String,
    /// Parent entity id.
    pub source: String,
    /// Child entity id, which holds the FK columns.
    pub target: String,
    pub kind: RelationshipKind,
    #[serde(flatten)]
    pub extra: Passthrough,
}

impl Relationship {
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
        kind: RelationshipKind,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            kind,
            extra: Passthrough::new(),
        }
    }

    pub fn is_self(&self) -> bool {
        self.source == self.target
    }

    pub fn is_identifying(&self) -> bool {
        self.kind.is_identifying()
    }

    pub fn touches(&self, entity_id: &str) -> bool {
        self.source == entity_id || self.target == entity_id
    }
}
