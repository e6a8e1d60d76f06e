//! SQL generation.
//!
//! Each dialect implements [`SqlGenerator`]. The trait's default methods
//! produce PostgreSQL-flavoured standard SQL; dialects override the parts
//! they render differently. Use [`generator_for`] to get the generator for a
//! [`Dialect`].

mod postgres;
mod sqlite;

pub use postgres::PostgresGenerator;
pub use sqlite::SqliteGenerator;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::change::{AlterAction, Change, ChangeKind};
use crate::error::{Result, SchemaError};
use crate::extension::ExtensionRegistry;
use crate::schema::{unique_constraint_name, Field, Index, Reference, Schema, Table};
use crate::validate::validate;

/// Default expressions passed through unquoted by every dialect.
const RAW_DEFAULTS: &[&str] = &[
    "now()",
    "current_timestamp",
    "current_date",
    "current_time",
    "localtimestamp",
    "localtime",
    "gen_random_uuid()",
    "uuid_generate_v4()",
];

const NUMERIC_TYPES: &[&str] = &[
    "int",
    "integer",
    "int2",
    "int4",
    "int8",
    "smallint",
    "bigint",
    "tinyint",
    "serial",
    "smallserial",
    "bigserial",
    "decimal",
    "numeric",
    "real",
    "float",
    "float4",
    "float8",
    "double",
    "double precision",
    "money",
];

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// PostgreSQL, the fully supported dialect.
    #[default]
    Postgres,
    /// SQLite. Column alterations and late foreign keys render as comments.
    Sqlite,
    /// MySQL. Selectable, but no generator exists.
    Mysql,
}

impl Dialect {
    /// Returns the dialect name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::Sqlite => "sqlite",
            Self::Mysql => "mysql",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dialect {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            "sqlite" | "sqlite3" => Ok(Self::Sqlite),
            "mysql" | "mariadb" => Ok(Self::Mysql),
            other => Err(SchemaError::UnsupportedDialect(other.to_string())),
        }
    }
}

/// Returns the generator for a dialect.
///
/// # Errors
///
/// Returns [`SchemaError::UnsupportedDialect`] for dialects without a
/// generator.
pub fn generator_for(
    dialect: Dialect,
    registry: ExtensionRegistry,
) -> Result<Box<dyn SqlGenerator>> {
    match dialect {
        Dialect::Postgres => Ok(Box::new(PostgresGenerator::new(registry))),
        Dialect::Sqlite => Ok(Box::new(SqliteGenerator::new(registry))),
        Dialect::Mysql => Err(SchemaError::UnsupportedDialect(dialect.to_string())),
    }
}

/// Dialect-specific SQL rendering of schemas and changes.
pub trait SqlGenerator: Send + Sync {
    /// Returns the dialect this generator renders.
    fn dialect(&self) -> Dialect;

    /// Returns the extension registry the generator was built with.
    fn registry(&self) -> &ExtensionRegistry;

    /// Returns the reserved words that force identifier quoting (uppercase).
    fn reserved_words(&self) -> &'static [&'static str];

    /// Resolves a lowercase, unparameterized type alias.
    fn builtin_type(&self, name: &str) -> Option<&'static str>;

    /// Returns the dialect's boolean literal.
    fn boolean_literal(&self, value: bool) -> &'static str {
        if value {
            "TRUE"
        } else {
            "FALSE"
        }
    }

    /// Renders a recognized raw default expression.
    fn raw_default(&self, expr: &str) -> String {
        expr.to_string()
    }

    /// Whether unique flags render as inline column constraints. When `false`
    /// they render as separate unique indexes.
    fn inline_unique(&self) -> bool {
        true
    }

    /// Maps a schema type to the dialect type.
    ///
    /// Parameters are kept verbatim, known aliases go through the lookup
    /// table (then the extension registry), anything else is uppercased.
    fn map_type(&self, raw: &str) -> String {
        let raw = raw.trim();
        if let Some(element) = raw.strip_suffix("[]") {
            return format!("{}[]", self.map_type(element));
        }
        if let Some(open) = raw.find('(') {
            let (base, params) = raw.split_at(open);
            return format!("{}{}", self.map_base_type(base.trim()), params);
        }
        self.map_base_type(raw)
    }

    /// Maps an unparameterized type name.
    fn map_base_type(&self, name: &str) -> String {
        let lower = name.to_ascii_lowercase();
        self.builtin_type(&lower)
            .or_else(|| self.registry().type_alias(&lower))
            .map_or_else(|| name.to_uppercase(), str::to_string)
    }

    /// Quotes an identifier when it is reserved, starts with a digit or
    /// contains characters outside `[A-Za-z0-9_]`.
    fn escape_identifier(&self, name: &str) -> String {
        let needs_quotes = name.is_empty()
            || name.starts_with(|c: char| c.is_ascii_digit())
            || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
            || self
                .reserved_words()
                .iter()
                .any(|word| word.eq_ignore_ascii_case(name));

        if needs_quotes {
            format!("\"{}\"", name.replace('"', "\"\""))
        } else {
            name.to_string()
        }
    }

    /// Formats a default value for a column of the given type.
    fn format_default(&self, value: &str, field_type: &str) -> String {
        let value = value.trim();
        let lower = value.to_ascii_lowercase();

        if lower == "null" {
            return "NULL".to_string();
        }
        if is_boolean_type(field_type) && (lower == "true" || lower == "false") {
            return self.boolean_literal(lower == "true").to_string();
        }
        if RAW_DEFAULTS.contains(&lower.as_str()) || self.registry().is_default_function(&lower)
        {
            return self.raw_default(value);
        }
        if is_numeric_type(field_type) && is_numeric_literal(value) {
            return value.to_string();
        }
        if value.len() >= 2 && value.starts_with('\'') && value.ends_with('\'') {
            return value.to_string();
        }
        format!("'{}'", value.replace('\'', "''"))
    }

    /// Renders a comma-separated, escaped column list.
    fn column_list(&self, columns: &[String]) -> String {
        columns
            .iter()
            .map(|c| self.escape_identifier(c))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Renders one column definition.
    fn column_definition(&self, table: &str, field: &Field, inline_primary_key: bool) -> String {
        let mut sql = format!(
            "{} {}",
            self.escape_identifier(&field.name),
            self.map_type(&field.field_type)
        );

        if field.primary_key && inline_primary_key {
            sql.push_str(" PRIMARY KEY");
        }
        if field.not_null {
            sql.push_str(" NOT NULL");
        }
        if let Some(default) = &field.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(&self.format_default(default, &field.field_type));
        }
        if field.unique && self.inline_unique() {
            sql.push_str(&format!(
                " CONSTRAINT {} UNIQUE",
                self.escape_identifier(&unique_constraint_name(table, &field.name))
            ));
        }

        sql
    }

    /// Renders a standalone unique index for a field.
    fn unique_index(&self, table: &str, column: &str) -> String {
        format!(
            "CREATE UNIQUE INDEX {} ON {} ({})",
            self.escape_identifier(&unique_constraint_name(table, column)),
            self.escape_identifier(table),
            self.escape_identifier(column)
        )
    }

    /// Generates CREATE TABLE (plus unique indexes when not inlined).
    fn create_table(&self, table: &Table) -> Vec<String> {
        let composite = table.has_composite_primary_key();

        let mut lines: Vec<String> = table
            .fields
            .iter()
            .map(|f| format!("    {}", self.column_definition(&table.name, f, !composite)))
            .collect();

        if composite {
            let columns: Vec<String> = table
                .primary_key_fields()
                .map(|f| f.name.clone())
                .collect();
            lines.push(format!("    PRIMARY KEY ({})", self.column_list(&columns)));
        }

        let mut statements = vec![format!(
            "CREATE TABLE {} (\n{}\n)",
            self.escape_identifier(&table.name),
            lines.join(",\n")
        )];

        if !self.inline_unique() {
            statements.extend(
                table
                    .fields
                    .iter()
                    .filter(|f| f.unique)
                    .map(|f| self.unique_index(&table.name, &f.name)),
            );
        }

        statements
    }

    /// Generates DROP TABLE.
    fn drop_table(&self, name: &str) -> Vec<String> {
        vec![format!("DROP TABLE IF EXISTS {}", self.escape_identifier(name))]
    }

    /// Generates ADD COLUMN.
    fn add_column(&self, table: &str, field: &Field) -> Vec<String> {
        let mut statements = vec![format!(
            "ALTER TABLE {} ADD COLUMN {}",
            self.escape_identifier(table),
            self.column_definition(table, field, true)
        )];
        if field.unique && !self.inline_unique() {
            statements.push(self.unique_index(table, &field.name));
        }
        statements
    }

    /// Generates DROP COLUMN.
    fn drop_column(&self, table: &str, column: &str) -> Vec<String> {
        vec![format!(
            "ALTER TABLE {} DROP COLUMN IF EXISTS {}",
            self.escape_identifier(table),
            self.escape_identifier(column)
        )]
    }

    /// Generates a column type change.
    fn alter_column_type(&self, table: &str, column: &str, to: &str) -> Vec<String> {
        vec![format!(
            "ALTER TABLE {} ALTER COLUMN {} TYPE {}",
            self.escape_identifier(table),
            self.escape_identifier(column),
            self.map_type(to)
        )]
    }

    /// Generates SET NOT NULL / DROP NOT NULL.
    fn alter_column_not_null(&self, table: &str, column: &str, not_null: bool) -> Vec<String> {
        vec![format!(
            "ALTER TABLE {} ALTER COLUMN {} {} NOT NULL",
            self.escape_identifier(table),
            self.escape_identifier(column),
            if not_null { "SET" } else { "DROP" }
        )]
    }

    /// Generates SET DEFAULT / DROP DEFAULT.
    fn alter_column_default(
        &self,
        table: &str,
        column: &str,
        default: Option<(&str, &str)>,
    ) -> Vec<String> {
        let action = match default {
            Some((value, field_type)) => {
                format!("SET DEFAULT {}", self.format_default(value, field_type))
            }
            None => "DROP DEFAULT".to_string(),
        };
        vec![format!(
            "ALTER TABLE {} ALTER COLUMN {} {}",
            self.escape_identifier(table),
            self.escape_identifier(column),
            action
        )]
    }

    /// Generates an ADD CONSTRAINT ... UNIQUE.
    fn add_unique(&self, table: &str, column: &str, constraint: &str) -> Vec<String> {
        vec![format!(
            "ALTER TABLE {} ADD CONSTRAINT {} UNIQUE ({})",
            self.escape_identifier(table),
            self.escape_identifier(constraint),
            self.escape_identifier(column)
        )]
    }

    /// Generates the removal of a unique constraint.
    fn drop_unique(&self, table: &str, constraint: &str) -> Vec<String> {
        vec![format!(
            "ALTER TABLE {} DROP CONSTRAINT IF EXISTS {}",
            self.escape_identifier(table),
            self.escape_identifier(constraint)
        )]
    }

    /// Generates CREATE INDEX, or ADD CONSTRAINT ... PRIMARY KEY for
    /// primary key indexes.
    fn create_index(&self, index: &Index) -> Vec<String> {
        let name = self.escape_identifier(&index.resolved_name());
        let table = self.escape_identifier(&index.table);
        let columns = self.column_list(&index.columns);

        if index.primary_key {
            return vec![format!(
                "ALTER TABLE {table} ADD CONSTRAINT {name} PRIMARY KEY ({columns})"
            )];
        }

        let mut sql = String::from("CREATE ");
        if index.unique {
            sql.push_str("UNIQUE ");
        }
        sql.push_str(&format!("INDEX {name} ON {table}"));
        if let Some(method) = &index.method {
            sql.push_str(&format!(" USING {}", method.to_uppercase()));
        }
        sql.push_str(&format!(" ({columns})"));
        vec![sql]
    }

    /// Generates DROP INDEX.
    fn drop_index(&self, index: &Index) -> Vec<String> {
        let name = self.escape_identifier(&index.resolved_name());
        if index.primary_key {
            return vec![format!(
                "ALTER TABLE {} DROP CONSTRAINT IF EXISTS {name}",
                self.escape_identifier(&index.table)
            )];
        }
        vec![format!("DROP INDEX IF EXISTS {name}")]
    }

    /// Generates ADD CONSTRAINT ... FOREIGN KEY.
    fn add_foreign_key(&self, reference: &Reference) -> Vec<String> {
        let mut sql = format!(
            "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
            self.escape_identifier(&reference.from.table),
            self.escape_identifier(&reference.resolved_name()),
            self.escape_identifier(&reference.from.column),
            self.escape_identifier(&reference.to.table),
            self.escape_identifier(&reference.to.column)
        );
        if let Some(action) = reference.on_delete {
            sql.push_str(" ON DELETE ");
            sql.push_str(action.to_sql());
        }
        if let Some(action) = reference.on_update {
            sql.push_str(" ON UPDATE ");
            sql.push_str(action.to_sql());
        }
        vec![sql]
    }

    /// Generates DROP CONSTRAINT for a foreign key.
    fn drop_foreign_key(&self, reference: &Reference) -> Vec<String> {
        vec![format!(
            "ALTER TABLE {} DROP CONSTRAINT IF EXISTS {}",
            self.escape_identifier(&reference.from.table),
            self.escape_identifier(&reference.resolved_name())
        )]
    }

    /// Statements emitted before the first table.
    fn preamble(&self) -> Vec<String> {
        self.registry().setup_statements()
    }

    /// Statements attaching table and field notes.
    fn comments(&self, schema: &Schema) -> Vec<String> {
        let mut statements = Vec::new();
        for table in &schema.tables {
            let table_name = self.escape_identifier(&table.name);
            if let Some(note) = &table.note {
                statements.push(format!(
                    "COMMENT ON TABLE {table_name} IS {}",
                    quote_literal(note)
                ));
            }
            for field in &table.fields {
                if let Some(note) = &field.note {
                    statements.push(format!(
                        "COMMENT ON COLUMN {table_name}.{} IS {}",
                        self.escape_identifier(&field.name),
                        quote_literal(note)
                    ));
                }
            }
        }
        statements
    }

    /// Renders the statements for one change kind.
    fn render_change_sql(&self, kind: &ChangeKind) -> Vec<String> {
        match kind {
            ChangeKind::CreateTable(table) => self.create_table(table),
            ChangeKind::DropTable { name } => self.drop_table(name),
            ChangeKind::AlterTable { table, action } => match action {
                AlterAction::AddColumn(field) => self.add_column(table, field),
                AlterAction::DropColumn { column } => self.drop_column(table, column),
                AlterAction::AlterType { column, to, .. } => {
                    self.alter_column_type(table, column, to)
                }
                AlterAction::SetNotNull { column } => {
                    self.alter_column_not_null(table, column, true)
                }
                AlterAction::DropNotNull { column } => {
                    self.alter_column_not_null(table, column, false)
                }
                AlterAction::SetDefault {
                    column,
                    value,
                    field_type,
                } => self.alter_column_default(
                    table,
                    column,
                    Some((value.as_str(), field_type.as_str())),
                ),
                AlterAction::DropDefault { column } => {
                    self.alter_column_default(table, column, None)
                }
                AlterAction::AddUnique { column, constraint } => {
                    self.add_unique(table, column, constraint)
                }
                AlterAction::DropUnique { constraint, .. } => self.drop_unique(table, constraint),
            },
            ChangeKind::CreateIndex(index) => self.create_index(index),
            ChangeKind::DropIndex(index) => self.drop_index(index),
            ChangeKind::AddForeignKey(reference) => self.add_foreign_key(reference),
            ChangeKind::DropForeignKey(reference) => self.drop_foreign_key(reference),
        }
    }

    /// Builds a [`Change`] with its SQL rendered by this generator.
    fn change(&self, kind: ChangeKind) -> Change {
        let sql = self.render_change_sql(&kind);
        Change::new(kind, sql)
    }

    /// Renders a full schema: preamble, tables, indexes, foreign keys,
    /// comments.
    ///
    /// # Errors
    ///
    /// Returns the first validation error; nothing is rendered in that case.
    fn render_schema(&self, schema: &Schema) -> Result<String> {
        validate(schema)?;

        let sections = [
            self.preamble(),
            schema
                .tables
                .iter()
                .flat_map(|t| self.create_table(t))
                .collect(),
            schema
                .all_indexes()
                .iter()
                .flat_map(|i| self.create_index(i))
                .collect(),
            schema
                .references
                .iter()
                .flat_map(|r| self.add_foreign_key(r))
                .collect(),
            self.comments(schema),
        ];

        let rendered: Vec<String> = sections
            .iter()
            .filter(|section| !section.is_empty())
            .map(|section| {
                section
                    .iter()
                    .map(|s| terminate(s))
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .collect();

        let mut sql = rendered.join("\n\n");
        if !sql.is_empty() {
            sql.push('\n');
        }
        Ok(sql)
    }

    /// Renders a change list in the given order, each change preceded by a
    /// descriptive comment.
    fn render_changes(&self, changes: &[Change]) -> String {
        let blocks: Vec<String> = changes
            .iter()
            .map(|change| {
                let mut block = format!("-- {}", change.description);
                for statement in &change.sql {
                    block.push('\n');
                    block.push_str(&terminate(statement));
                }
                block
            })
            .collect();

        let mut sql = blocks.join("\n\n");
        if !sql.is_empty() {
            sql.push('\n');
        }
        sql
    }
}

/// Appends a statement terminator unless the statement is a comment.
fn terminate(statement: &str) -> String {
    if statement.trim_start().starts_with("--") {
        statement.to_string()
    } else {
        format!("{statement};")
    }
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn base_type(field_type: &str) -> String {
    field_type
        .split('(')
        .next()
        .unwrap_or(field_type)
        .trim()
        .to_ascii_lowercase()
}

fn is_boolean_type(field_type: &str) -> bool {
    matches!(base_type(field_type).as_str(), "bool" | "boolean")
}

fn is_numeric_type(field_type: &str) -> bool {
    NUMERIC_TYPES.contains(&base_type(field_type).as_str())
}

fn is_numeric_literal(value: &str) -> bool {
    value.parse::<f64>().is_ok()
        && value
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'))
}
