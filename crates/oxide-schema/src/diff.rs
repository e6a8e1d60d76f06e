//! Schema differ.
//!
//! Compares two schemas and returns the changes that turn the first into the
//! second, already sorted into execution order. Maps are used for lookups
//! only; iteration always follows declaration order so that identical inputs
//! produce identical output.

use std::collections::HashMap;

use tracing::debug;

use crate::change::{sort_changes, AlterAction, Change, ChangeKind};
use crate::dialect::SqlGenerator;
use crate::schema::{unique_constraint_name, Field, Index, Reference, Schema, Table};

/// Detects structural changes between two schemas.
///
/// The generator is used to compare types in their dialect form (so `int`
/// and `integer` are the same type) and to pre-render each change's SQL.
pub struct Differ<'a> {
    generator: &'a dyn SqlGenerator,
}

impl<'a> Differ<'a> {
    /// Creates a differ rendering through the given generator.
    #[must_use]
    pub fn new(generator: &'a dyn SqlGenerator) -> Self {
        Self { generator }
    }

    /// Returns the changes needed to transform `old` into `new`.
    #[must_use]
    pub fn compare(&self, old: &Schema, new: &Schema) -> Vec<Change> {
        let mut kinds = Vec::new();

        self.diff_tables(old, new, &mut kinds);
        Self::diff_indexes(old, new, &mut kinds);
        Self::diff_references(old, new, &mut kinds);

        let mut changes: Vec<Change> = kinds
            .into_iter()
            .map(|kind| self.generator.change(kind))
            .collect();
        sort_changes(&mut changes);

        debug!(
            dialect = %self.generator.dialect(),
            changes = changes.len(),
            "Compared schemas"
        );
        changes
    }

    fn diff_tables(&self, old: &Schema, new: &Schema, kinds: &mut Vec<ChangeKind>) {
        let old_tables: HashMap<&str, &Table> =
            old.tables.iter().map(|t| (t.name.as_str(), t)).collect();
        let new_tables: HashMap<&str, &Table> =
            new.tables.iter().map(|t| (t.name.as_str(), t)).collect();

        for table in &new.tables {
            if !old_tables.contains_key(table.name.as_str()) {
                // Table-level indexes are emitted as separate index changes.
                let mut created = table.clone();
                created.indexes.clear();
                kinds.push(ChangeKind::CreateTable(created));
            }
        }

        for table in &old.tables {
            if !new_tables.contains_key(table.name.as_str()) {
                kinds.push(ChangeKind::DropTable {
                    name: table.name.clone(),
                });
            }
        }

        for table in &new.tables {
            if let Some(old_table) = old_tables.get(table.name.as_str()) {
                self.diff_fields(old_table, table, kinds);
            }
        }
    }

    fn diff_fields(&self, old: &Table, new: &Table, kinds: &mut Vec<ChangeKind>) {
        let old_fields: HashMap<&str, &Field> =
            old.fields.iter().map(|f| (f.name.as_str(), f)).collect();
        let new_fields: HashMap<&str, &Field> =
            new.fields.iter().map(|f| (f.name.as_str(), f)).collect();

        let alter = |action: AlterAction| ChangeKind::AlterTable {
            table: new.name.clone(),
            action,
        };

        for field in &new.fields {
            if !old_fields.contains_key(field.name.as_str()) {
                kinds.push(alter(AlterAction::AddColumn(field.clone())));
            }
        }

        for field in &old.fields {
            if !new_fields.contains_key(field.name.as_str()) {
                kinds.push(alter(AlterAction::DropColumn {
                    column: field.name.clone(),
                }));
            }
        }

        for field in &new.fields {
            if let Some(old_field) = old_fields.get(field.name.as_str()) {
                for action in self.diff_field(&new.name, old_field, field) {
                    kinds.push(alter(action));
                }
            }
        }
    }

    /// One action per differing attribute: type, NOT NULL, default, unique.
    fn diff_field(&self, table: &str, old: &Field, new: &Field) -> Vec<AlterAction> {
        let mut actions = Vec::new();
        let column = new.name.clone();

        if self.generator.map_type(&old.field_type) != self.generator.map_type(&new.field_type) {
            actions.push(AlterAction::AlterType {
                column: column.clone(),
                from: old.field_type.clone(),
                to: new.field_type.clone(),
            });
        }

        if old.not_null != new.not_null {
            actions.push(if new.not_null {
                AlterAction::SetNotNull {
                    column: column.clone(),
                }
            } else {
                AlterAction::DropNotNull {
                    column: column.clone(),
                }
            });
        }

        let old_default = old.default.as_deref().map(str::trim);
        let new_default = new.default.as_deref().map(str::trim);
        if old_default != new_default {
            actions.push(match new_default {
                Some(value) => AlterAction::SetDefault {
                    column: column.clone(),
                    value: value.to_string(),
                    field_type: new.field_type.clone(),
                },
                None => AlterAction::DropDefault {
                    column: column.clone(),
                },
            });
        }

        if old.unique != new.unique {
            let constraint = unique_constraint_name(table, &column);
            actions.push(if new.unique {
                AlterAction::AddUnique { column, constraint }
            } else {
                AlterAction::DropUnique { column, constraint }
            });
        }

        actions
    }

    /// Indexes are keyed by `table.name`; a changed index shows up as a
    /// drop and a create.
    fn diff_indexes(old: &Schema, new: &Schema, kinds: &mut Vec<ChangeKind>) {
        let old_indexes = old.all_indexes();
        let new_indexes = new.all_indexes();

        let old_keys: HashMap<String, &Index> =
            old_indexes.iter().map(|i| (i.key(), i)).collect();
        let new_keys: HashMap<String, &Index> =
            new_indexes.iter().map(|i| (i.key(), i)).collect();

        for index in &new_indexes {
            if !old_keys.contains_key(&index.key()) {
                kinds.push(ChangeKind::CreateIndex(index.clone()));
            }
        }

        for index in &old_indexes {
            if !new_keys.contains_key(&index.key()) {
                kinds.push(ChangeKind::DropIndex(index.clone()));
            }
        }
    }

    /// References are keyed by their endpoints only, so an action change
    /// alone produces no diff.
    fn diff_references(old: &Schema, new: &Schema, kinds: &mut Vec<ChangeKind>) {
        let old_keys: HashMap<String, &Reference> =
            old.references.iter().map(|r| (r.key(), r)).collect();
        let new_keys: HashMap<String, &Reference> =
            new.references.iter().map(|r| (r.key(), r)).collect();

        for reference in &new.references {
            if !old_keys.contains_key(&reference.key()) {
                kinds.push(ChangeKind::AddForeignKey(reference.clone()));
            }
        }

        for reference in &old.references {
            if !new_keys.contains_key(&reference.key()) {
                kinds.push(ChangeKind::DropForeignKey(reference.clone()));
            }
        }
    }
}
