//! Structural validation of a schema.
//!
//! Validation is fail-fast: the first problem found is returned and nothing
//! is rendered.

use std::collections::{HashMap, HashSet};

use crate::error::{Result, SchemaError};
use crate::schema::{Schema, Table};

/// Validates a schema before rendering.
///
/// Checks, in order: unique table names, at least one field per table,
/// non-empty and unique field names, reference endpoints, index columns.
pub fn validate(schema: &Schema) -> Result<()> {
    let mut tables: HashMap<&str, &Table> = HashMap::new();

    for table in &schema.tables {
        if tables.insert(table.name.as_str(), table).is_some() {
            return Err(SchemaError::DuplicateTable(table.name.clone()));
        }
        validate_table(table)?;
    }

    let has_column = |table: &str, column: &str| {
        tables
            .get(table)
            .is_some_and(|t| t.get_field(column).is_some())
    };

    for reference in &schema.references {
        for endpoint in [&reference.from, &reference.to] {
            if !has_column(&endpoint.table, &endpoint.column) {
                return Err(SchemaError::DanglingReference {
                    reference: reference.resolved_name(),
                    table: endpoint.table.clone(),
                    column: endpoint.column.clone(),
                });
            }
        }
    }

    for index in schema.all_indexes() {
        if index.columns.is_empty() {
            return Err(SchemaError::EmptyIndex(index.resolved_name()));
        }
        for column in &index.columns {
            if !has_column(&index.table, column) {
                return Err(SchemaError::UnknownIndexColumn {
                    index: index.resolved_name(),
                    table: index.table.clone(),
                    column: column.clone(),
                });
            }
        }
    }

    Ok(())
}

fn validate_table(table: &Table) -> Result<()> {
    if table.fields.is_empty() {
        return Err(SchemaError::EmptyTable(table.name.clone()));
    }

    let mut seen = HashSet::new();
    for field in &table.fields {
        if field.name.trim().is_empty() {
            return Err(SchemaError::EmptyFieldName(table.name.clone()));
        }
        if !seen.insert(field.name.as_str()) {
            return Err(SchemaError::DuplicateField {
                table: table.name.clone(),
                field: field.name.clone(),
            });
        }
    }

    Ok(())
}
