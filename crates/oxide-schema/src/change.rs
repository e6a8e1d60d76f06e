//! Structural changes between two schemas.
//!
//! A [`Change`] is one atomic delta detected by the differ. Its kind is a
//! closed sum type, so every consumer (SQL rendering, ordering, replay) has
//! to handle each variant explicitly.

use serde::Serialize;

use crate::schema::{Field, Index, Reference, Table};

/// Execution phase of a change.
///
/// The derived ordering is the order in which changes must be executed to
/// avoid constraint violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangePhase {
    /// Foreign keys go first so dropped tables and columns are unreferenced.
    DropForeignKey,
    /// Index drops.
    DropIndex,
    /// Table drops.
    DropTable,
    /// Table creations.
    CreateTable,
    /// Column and column-constraint changes.
    AlterTable,
    /// Index creations, once every column exists.
    CreateIndex,
    /// Foreign keys last, once every referenced table and column exists.
    AddForeignKey,
}

/// A change to a single column of an existing table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AlterAction {
    /// Add a new column.
    AddColumn(Field),
    /// Drop a column (tolerant of already-dropped columns).
    DropColumn {
        /// Column name.
        column: String,
    },
    /// Change the column type.
    AlterType {
        /// Column name.
        column: String,
        /// Previous type as written in the schema.
        from: String,
        /// New type as written in the schema.
        to: String,
    },
    /// Add a NOT NULL constraint.
    SetNotNull {
        /// Column name.
        column: String,
    },
    /// Drop the NOT NULL constraint.
    DropNotNull {
        /// Column name.
        column: String,
    },
    /// Set or change the default value.
    SetDefault {
        /// Column name.
        column: String,
        /// Raw default value.
        value: String,
        /// Column type, used to decide how the value is formatted.
        field_type: String,
    },
    /// Drop the default value.
    DropDefault {
        /// Column name.
        column: String,
    },
    /// Add a named unique constraint.
    AddUnique {
        /// Column name.
        column: String,
        /// Constraint name (`uk_<table>_<field>`).
        constraint: String,
    },
    /// Drop a named unique constraint.
    DropUnique {
        /// Column name.
        column: String,
        /// Constraint name (`uk_<table>_<field>`).
        constraint: String,
    },
}

impl AlterAction {
    /// Returns the column this action touches.
    #[must_use]
    pub fn column(&self) -> &str {
        match self {
            Self::AddColumn(field) => &field.name,
            Self::DropColumn { column }
            | Self::AlterType { column, .. }
            | Self::SetNotNull { column }
            | Self::DropNotNull { column }
            | Self::SetDefault { column, .. }
            | Self::DropDefault { column }
            | Self::AddUnique { column, .. }
            | Self::DropUnique { column, .. } => column,
        }
    }
}

/// The kind of a change, carrying only what that kind needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChangeKind {
    /// Create a table.
    CreateTable(Table),
    /// Drop a table.
    DropTable {
        /// Table name.
        name: String,
    },
    /// Alter one column of an existing table.
    AlterTable {
        /// Table name.
        table: String,
        /// The column change.
        action: AlterAction,
    },
    /// Create an index.
    CreateIndex(Index),
    /// Drop an index.
    DropIndex(Index),
    /// Add a foreign key constraint.
    AddForeignKey(Reference),
    /// Drop a foreign key constraint.
    DropForeignKey(Reference),
}

impl ChangeKind {
    /// Returns the execution phase.
    #[must_use]
    pub fn phase(&self) -> ChangePhase {
        match self {
            Self::DropForeignKey(_) => ChangePhase::DropForeignKey,
            Self::DropIndex(_) => ChangePhase::DropIndex,
            Self::DropTable { .. } => ChangePhase::DropTable,
            Self::CreateTable(_) => ChangePhase::CreateTable,
            Self::AlterTable { .. } => ChangePhase::AlterTable,
            Self::CreateIndex(_) => ChangePhase::CreateIndex,
            Self::AddForeignKey(_) => ChangePhase::AddForeignKey,
        }
    }

    /// Returns the owning table name.
    #[must_use]
    pub fn table(&self) -> &str {
        match self {
            Self::CreateTable(table) => &table.name,
            Self::DropTable { name } => name,
            Self::AlterTable { table, .. } => table,
            Self::CreateIndex(index) | Self::DropIndex(index) => &index.table,
            Self::AddForeignKey(reference) | Self::DropForeignKey(reference) => {
                &reference.from.table
            }
        }
    }

    /// Returns a human-readable description.
    #[must_use]
    pub fn description(&self) -> String {
        match self {
            Self::CreateTable(table) => format!("Create table '{}'", table.name),
            Self::DropTable { name } => format!("Drop table '{}'", name),
            Self::AlterTable { table, action } => describe_alter(table, action),
            Self::CreateIndex(index) => format!(
                "Create index '{}' on table '{}'",
                index.resolved_name(),
                index.table
            ),
            Self::DropIndex(index) => format!(
                "Drop index '{}' from table '{}'",
                index.resolved_name(),
                index.table
            ),
            Self::AddForeignKey(reference) => format!(
                "Add foreign key '{}' to table '{}'",
                reference.resolved_name(),
                reference.from.table
            ),
            Self::DropForeignKey(reference) => format!(
                "Drop foreign key '{}' from table '{}'",
                reference.resolved_name(),
                reference.from.table
            ),
        }
    }
}

fn describe_alter(table: &str, action: &AlterAction) -> String {
    match action {
        AlterAction::AddColumn(field) => {
            format!("Add column '{}' to table '{}'", field.name, table)
        }
        AlterAction::DropColumn { column } => {
            format!("Drop column '{}' from table '{}'", column, table)
        }
        AlterAction::AlterType { column, from, to } => format!(
            "Change type of column '{}' in table '{}' from '{}' to '{}'",
            column, table, from, to
        ),
        AlterAction::SetNotNull { column } => {
            format!("Set NOT NULL on column '{}' in table '{}'", column, table)
        }
        AlterAction::DropNotNull { column } => {
            format!("Drop NOT NULL on column '{}' in table '{}'", column, table)
        }
        AlterAction::SetDefault { column, value, .. } => format!(
            "Set default of column '{}' in table '{}' to {}",
            column, table, value
        ),
        AlterAction::DropDefault { column } => {
            format!("Drop default of column '{}' in table '{}'", column, table)
        }
        AlterAction::AddUnique { constraint, .. } => {
            format!("Add unique constraint '{}' to table '{}'", constraint, table)
        }
        AlterAction::DropUnique { constraint, .. } => format!(
            "Drop unique constraint '{}' from table '{}'",
            constraint, table
        ),
    }
}

/// A detected structural delta with its rendered SQL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Change {
    /// What changes.
    pub kind: ChangeKind,
    /// Owning table name.
    pub table: String,
    /// One-line description, used as the SQL comment above the statements.
    pub description: String,
    /// Rendered statements, without terminators.
    pub sql: Vec<String>,
}

impl Change {
    /// Creates a change from its kind and rendered statements.
    #[must_use]
    pub fn new(kind: ChangeKind, sql: Vec<String>) -> Self {
        Self {
            table: kind.table().to_string(),
            description: kind.description(),
            kind,
            sql,
        }
    }

    /// Returns the execution phase.
    #[must_use]
    pub fn phase(&self) -> ChangePhase {
        self.kind.phase()
    }
}

/// Stable-sorts changes into execution order, preserving the relative order
/// of changes within one phase.
pub fn sort_changes(changes: &mut [Change]) {
    changes.sort_by_key(Change::phase);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Field;

    #[test]
    fn test_phase_order() {
        assert!(ChangePhase::DropForeignKey < ChangePhase::DropIndex);
        assert!(ChangePhase::DropIndex < ChangePhase::DropTable);
        assert!(ChangePhase::DropTable < ChangePhase::CreateTable);
        assert!(ChangePhase::CreateTable < ChangePhase::AlterTable);
        assert!(ChangePhase::AlterTable < ChangePhase::CreateIndex);
        assert!(ChangePhase::CreateIndex < ChangePhase::AddForeignKey);
    }

    #[test]
    fn test_sort_is_stable() {
        let mut changes = vec![
            Change::new(
                ChangeKind::AddForeignKey(Reference::new("a", "b_id", "b", "id")),
                vec![],
            ),
            Change::new(ChangeKind::DropTable { name: "x".into() }, vec![]),
            Change::new(ChangeKind::DropTable { name: "y".into() }, vec![]),
            Change::new(
                ChangeKind::DropForeignKey(Reference::new("c", "d_id", "d", "id")),
                vec![],
            ),
        ];

        sort_changes(&mut changes);

        let tables: Vec<_> = changes.iter().map(|c| c.table.as_str()).collect();
        assert_eq!(tables, vec!["c", "x", "y", "a"]);
    }

    #[test]
    fn test_descriptions() {
        let change = Change::new(
            ChangeKind::AlterTable {
                table: "users".into(),
                action: AlterAction::AddColumn(Field::new("name", "varchar(100)")),
            },
            vec![],
        );
        assert_eq!(change.table, "users");
        assert_eq!(change.description, "Add column 'name' to table 'users'");

        let index = ChangeKind::CreateIndex(Index::new("users", ["email"]));
        assert_eq!(
            index.description(),
            "Create index 'idx_users_email' on table 'users'"
        );
    }

    #[test]
    fn test_alter_action_column() {
        let action = AlterAction::AddUnique {
            column: "email".into(),
            constraint: "uk_users_email".into(),
        };
        assert_eq!(action.column(), "email");
    }
}
