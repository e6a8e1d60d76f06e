//! Schema representation types.
//!
//! These types describe the desired (or last recorded) structure of a database:
//! tables with ordered fields, indexes and references. They are produced by a
//! schema parser, consumed by the differ and the SQL generators, and never
//! mutated once constructed.

use serde::{Deserialize, Serialize};

/// The complete database schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    /// Optional schema name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// All tables. Declaration order is kept for deterministic output.
    #[serde(default)]
    pub tables: Vec<Table>,
    /// Schema-level indexes (each names its owning table).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indexes: Vec<Index>,
    /// Foreign key references.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<Reference>,
}

impl Schema {
    /// Creates a new empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the schema name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Adds a table to the schema.
    #[must_use]
    pub fn table(mut self, table: Table) -> Self {
        self.tables.push(table);
        self
    }

    /// Adds a schema-level index.
    #[must_use]
    pub fn index(mut self, index: Index) -> Self {
        self.indexes.push(index);
        self
    }

    /// Adds a reference.
    #[must_use]
    pub fn reference(mut self, reference: Reference) -> Self {
        self.references.push(reference);
        self
    }

    /// Gets a table by name.
    #[must_use]
    pub fn get_table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Gets a mutable table by name.
    #[must_use]
    pub fn get_table_mut(&mut self, name: &str) -> Option<&mut Table> {
        self.tables.iter_mut().find(|t| t.name == name)
    }

    /// Returns table names in declaration order.
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(|t| t.name.as_str())
    }

    /// Returns every index of the schema with its owning table filled in.
    ///
    /// Table-level indexes come first (in table order), followed by
    /// schema-level indexes.
    #[must_use]
    pub fn all_indexes(&self) -> Vec<Index> {
        let mut indexes: Vec<Index> = self
            .tables
            .iter()
            .flat_map(|t| t.indexes.iter().map(move |i| i.clone().on_table(&t.name)))
            .collect();
        indexes.extend(self.indexes.iter().cloned());
        indexes
    }

    /// Returns `true` if the schema has no tables.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// A table definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    /// Table name, unique within a schema.
    pub name: String,
    /// Fields in declaration order (the `CREATE TABLE` column order).
    #[serde(default)]
    pub fields: Vec<Field>,
    /// Table-level indexes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indexes: Vec<Index>,
    /// Free-text note.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl Table {
    /// Creates a new table with no fields.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            indexes: Vec::new(),
            note: None,
        }
    }

    /// Adds a field.
    #[must_use]
    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Adds a table-level index. The owning table is set to this table.
    #[must_use]
    pub fn index(mut self, index: Index) -> Self {
        let index = index.on_table(&self.name);
        self.indexes.push(index);
        self
    }

    /// Sets the note.
    #[must_use]
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Gets a field by name.
    #[must_use]
    pub fn get_field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Gets a mutable field by name.
    #[must_use]
    pub fn get_field_mut(&mut self, name: &str) -> Option<&mut Field> {
        self.fields.iter_mut().find(|f| f.name == name)
    }

    /// Returns the fields flagged as primary key.
    pub fn primary_key_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| f.primary_key)
    }

    /// Returns `true` if more than one field is flagged as primary key.
    #[must_use]
    pub fn has_composite_primary_key(&self) -> bool {
        self.primary_key_fields().count() > 1
    }
}

/// A field (column) definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    /// Field name, unique within its table.
    pub name: String,
    /// SQL type as written in the schema, e.g. `varchar(255)`.
    #[serde(rename = "type")]
    pub field_type: String,
    /// Part of the primary key.
    #[serde(default)]
    pub primary_key: bool,
    /// Carries a UNIQUE constraint.
    #[serde(default)]
    pub unique: bool,
    /// Carries a NOT NULL constraint.
    #[serde(default)]
    pub not_null: bool,
    /// Default value as a raw SQL fragment or literal, e.g. `now()`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    /// Free-text note.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl Field {
    /// Creates a new nullable field.
    #[must_use]
    pub fn new(name: impl Into<String>, field_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: field_type.into(),
            primary_key: false,
            unique: false,
            not_null: false,
            default: None,
            note: None,
        }
    }

    /// Marks the field as primary key.
    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Marks the field as unique.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Marks the field as NOT NULL.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn default(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Sets the note.
    #[must_use]
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// An index definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Index {
    /// Explicit name. When absent the name is derived from table and columns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Owning table. May be left empty for indexes declared inside a table.
    #[serde(default)]
    pub table: String,
    /// Indexed columns; order matters.
    pub columns: Vec<String>,
    /// Index method, e.g. `GIST`.
    #[serde(default, alias = "type", skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// Unique index.
    #[serde(default)]
    pub unique: bool,
    /// Primary key index.
    #[serde(default)]
    pub primary_key: bool,
}

impl Index {
    /// Creates a new index on the given table and columns.
    #[must_use]
    pub fn new<I, S>(table: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: None,
            table: table.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            method: None,
            unique: false,
            primary_key: false,
        }
    }

    /// Sets an explicit name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Makes this a unique index.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Makes this a primary key index.
    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Sets the index method.
    #[must_use]
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Sets the owning table if none is set yet.
    #[must_use]
    pub fn on_table(mut self, table: &str) -> Self {
        if self.table.is_empty() {
            self.table = table.to_string();
        }
        self
    }

    /// Returns the explicit name, or `idx_<table>_<col1>_<col2>...`.
    #[must_use]
    pub fn resolved_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("idx_{}_{}", self.table, self.columns.join("_")),
        }
    }

    /// Returns the diff identity `<table>.<name>`.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}.{}", self.table, self.resolved_name())
    }
}

/// One side of a reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    /// Table name.
    pub table: String,
    /// Column name.
    pub column: String,
}

impl Endpoint {
    /// Creates a new endpoint.
    #[must_use]
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }
}

/// Relationship cardinality. Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelationKind {
    /// One-to-one.
    OneToOne,
    /// One-to-many.
    OneToMany,
    /// Many-to-one.
    #[default]
    ManyToOne,
    /// Many-to-many.
    ManyToMany,
}

impl RelationKind {
    /// Returns the DBML-style symbol for this relation.
    #[must_use]
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::OneToOne => "-",
            Self::OneToMany => "<",
            Self::ManyToOne => ">",
            Self::ManyToMany => "<>",
        }
    }
}

/// Referential action (ON DELETE, ON UPDATE).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReferentialAction {
    /// Cascade the delete/update to referencing rows.
    Cascade,
    /// Refuse the delete/update.
    Restrict,
    /// Set the referencing column to NULL.
    SetNull,
    /// Set the referencing column to its default.
    SetDefault,
    /// Error at the end of the statement.
    NoAction,
}

impl ReferentialAction {
    /// Returns the SQL representation of this action.
    #[must_use]
    pub fn to_sql(&self) -> &'static str {
        match self {
            Self::Cascade => "CASCADE",
            Self::Restrict => "RESTRICT",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
            Self::NoAction => "NO ACTION",
        }
    }
}

/// A foreign key reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reference {
    /// Explicit constraint name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Referencing side.
    pub from: Endpoint,
    /// Referenced side.
    pub to: Endpoint,
    /// Relationship kind.
    #[serde(default)]
    pub kind: RelationKind,
    /// ON DELETE action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_delete: Option<ReferentialAction>,
    /// ON UPDATE action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_update: Option<ReferentialAction>,
}

impl Reference {
    /// Creates a many-to-one reference `from_table.from_column -> to_table.to_column`.
    #[must_use]
    pub fn new(
        from_table: impl Into<String>,
        from_column: impl Into<String>,
        to_table: impl Into<String>,
        to_column: impl Into<String>,
    ) -> Self {
        Self {
            name: None,
            from: Endpoint::new(from_table, from_column),
            to: Endpoint::new(to_table, to_column),
            kind: RelationKind::default(),
            on_delete: None,
            on_update: None,
        }
    }

    /// Sets an explicit constraint name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the relationship kind.
    #[must_use]
    pub fn kind(mut self, kind: RelationKind) -> Self {
        self.kind = kind;
        self
    }

    /// Sets the ON DELETE action.
    #[must_use]
    pub fn on_delete(mut self, action: ReferentialAction) -> Self {
        self.on_delete = Some(action);
        self
    }

    /// Sets the ON UPDATE action.
    #[must_use]
    pub fn on_update(mut self, action: ReferentialAction) -> Self {
        self.on_update = Some(action);
        self
    }

    /// Returns the explicit name, or `fk_<fromTable>_<fromColumn>`.
    #[must_use]
    pub fn resolved_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("fk_{}_{}", self.from.table, self.from.column),
        }
    }

    /// Returns the diff identity `fromTable.fromColumn->toTable.toColumn`.
    ///
    /// Actions are not part of the key.
    #[must_use]
    pub fn key(&self) -> String {
        format!(
            "{}.{}->{}.{}",
            self.from.table, self.from.column, self.to.table, self.to.column
        )
    }
}

/// Returns the constraint name used for a field's UNIQUE flag.
#[must_use]
pub fn unique_constraint_name(table: &str, field: &str) -> String {
    format!("uk_{table}_{field}")
}
