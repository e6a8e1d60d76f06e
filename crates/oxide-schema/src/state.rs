//! Change replay.
//!
//! [`SchemaState`] applies changes to a schema in memory. Replaying the
//! output of the differ onto the old schema must give a schema that diffs
//! empty against the new one; the migration manager relies on this as a
//! convergence check before writing anything.

use crate::change::{AlterAction, Change, ChangeKind};
use crate::error::{Result, SchemaError};
use crate::schema::{Schema, Table};

/// A schema being rebuilt by replaying changes.
#[derive(Debug, Default)]
pub struct SchemaState {
    schema: Schema,
}

impl SchemaState {
    /// Starts from an empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from an existing schema.
    #[must_use]
    pub fn from_schema(schema: Schema) -> Self {
        Self { schema }
    }

    /// Returns the current schema.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Consumes and returns the schema.
    #[must_use]
    pub fn into_schema(self) -> Schema {
        self.schema
    }

    /// Applies every change in order.
    pub fn apply_all(&mut self, changes: &[Change]) -> Result<()> {
        for change in changes {
            self.apply(&change.kind)?;
        }
        Ok(())
    }

    /// Applies a single change.
    pub fn apply(&mut self, kind: &ChangeKind) -> Result<()> {
        match kind {
            ChangeKind::CreateTable(table) => {
                if self.schema.get_table(&table.name).is_some() {
                    return Err(SchemaError::InvalidState(format!(
                        "Table '{}' already exists",
                        table.name
                    )));
                }
                self.schema.tables.push(table.clone());
            }

            ChangeKind::DropTable { name } => {
                let idx = self
                    .schema
                    .tables
                    .iter()
                    .position(|t| t.name == *name)
                    .ok_or_else(|| missing_table(name))?;
                self.schema.tables.remove(idx);
            }

            ChangeKind::AlterTable { table, action } => {
                let t = self
                    .schema
                    .get_table_mut(table)
                    .ok_or_else(|| missing_table(table))?;
                apply_alter(t, action)?;
            }

            ChangeKind::CreateIndex(index) => {
                let key = index.key();
                if self.schema.all_indexes().iter().any(|i| i.key() == key) {
                    return Err(SchemaError::InvalidState(format!(
                        "Index '{}' already exists",
                        index.resolved_name()
                    )));
                }
                self.schema.indexes.push(index.clone());
            }

            ChangeKind::DropIndex(index) => {
                let key = index.key();
                if let Some(idx) = self.schema.indexes.iter().position(|i| i.key() == key) {
                    self.schema.indexes.remove(idx);
                } else {
                    let table = self
                        .schema
                        .get_table_mut(&index.table)
                        .ok_or_else(|| missing_table(&index.table))?;
                    let idx = table
                        .indexes
                        .iter()
                        .position(|i| i.clone().on_table(&index.table).key() == key)
                        .ok_or_else(|| {
                            SchemaError::InvalidState(format!(
                                "Index '{}' does not exist",
                                index.resolved_name()
                            ))
                        })?;
                    table.indexes.remove(idx);
                }
            }

            ChangeKind::AddForeignKey(reference) => {
                let key = reference.key();
                if self.schema.references.iter().any(|r| r.key() == key) {
                    return Err(SchemaError::InvalidState(format!(
                        "Foreign key '{}' already exists",
                        reference.resolved_name()
                    )));
                }
                self.schema.references.push(reference.clone());
            }

            ChangeKind::DropForeignKey(reference) => {
                let key = reference.key();
                let idx = self
                    .schema
                    .references
                    .iter()
                    .position(|r| r.key() == key)
                    .ok_or_else(|| {
                        SchemaError::InvalidState(format!(
                            "Foreign key '{}' does not exist",
                            reference.resolved_name()
                        ))
                    })?;
                self.schema.references.remove(idx);
            }
        }

        Ok(())
    }
}

fn missing_table(name: &str) -> SchemaError {
    SchemaError::InvalidState(format!("Table '{}' does not exist", name))
}

fn apply_alter(table: &mut Table, action: &AlterAction) -> Result<()> {
    if let AlterAction::AddColumn(field) = action {
        if table.get_field(&field.name).is_some() {
            return Err(SchemaError::InvalidState(format!(
                "Column '{}' already exists in table '{}'",
                field.name, table.name
            )));
        }
        table.fields.push(field.clone());
        return Ok(());
    }

    if let AlterAction::DropColumn { column } = action {
        // DROP COLUMN IF EXISTS: a missing column is not an error.
        table.fields.retain(|f| f.name != *column);
        return Ok(());
    }

    let table_name = table.name.clone();
    let field = table.get_field_mut(action.column()).ok_or_else(|| {
        SchemaError::InvalidState(format!(
            "Column '{}' does not exist in table '{}'",
            action.column(),
            table_name
        ))
    })?;

    match action {
        AlterAction::AlterType { to, .. } => field.field_type = to.clone(),
        AlterAction::SetNotNull { .. } => field.not_null = true,
        AlterAction::DropNotNull { .. } => field.not_null = false,
        AlterAction::SetDefault { value, .. } => field.default = Some(value.clone()),
        AlterAction::DropDefault { .. } => field.default = None,
        AlterAction::AddUnique { .. } => field.unique = true,
        AlterAction::DropUnique { .. } => field.unique = false,
        AlterAction::AddColumn(_) | AlterAction::DropColumn { .. } => {}
    }

    Ok(())
}
