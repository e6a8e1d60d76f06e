//! SQLite SQL generator.
//!
//! SQLite cannot alter columns or add/drop foreign keys on an existing table.
//! Those changes render as SQL comments, which the executor skips. Unique
//! flags render as named unique indexes so they can be dropped later.

use super::{Dialect, SqlGenerator};
use crate::extension::ExtensionRegistry;
use crate::schema::{unique_constraint_name, Index, Reference, Schema};

const RESERVED_WORDS: &[&str] = &[
    "ABORT",
    "ACTION",
    "ADD",
    "AFTER",
    "ALL",
    "ALTER",
    "ANALYZE",
    "AND",
    "AS",
    "ASC",
    "ATTACH",
    "AUTOINCREMENT",
    "BEFORE",
    "BEGIN",
    "BETWEEN",
    "BY",
    "CASCADE",
    "CASE",
    "CAST",
    "CHECK",
    "COLLATE",
    "COLUMN",
    "COMMIT",
    "CONFLICT",
    "CONSTRAINT",
    "CREATE",
    "CROSS",
    "CURRENT_DATE",
    "CURRENT_TIME",
    "CURRENT_TIMESTAMP",
    "DATABASE",
    "DEFAULT",
    "DEFERRABLE",
    "DEFERRED",
    "DELETE",
    "DESC",
    "DETACH",
    "DISTINCT",
    "DROP",
    "EACH",
    "ELSE",
    "END",
    "ESCAPE",
    "EXCEPT",
    "EXCLUSIVE",
    "EXISTS",
    "EXPLAIN",
    "FAIL",
    "FOR",
    "FOREIGN",
    "FROM",
    "FULL",
    "GLOB",
    "GROUP",
    "HAVING",
    "IF",
    "IGNORE",
    "IMMEDIATE",
    "IN",
    "INDEX",
    "INDEXED",
    "INITIALLY",
    "INNER",
    "INSERT",
    "INSTEAD",
    "INTERSECT",
    "INTO",
    "IS",
    "ISNULL",
    "JOIN",
    "KEY",
    "LEFT",
    "LIKE",
    "LIMIT",
    "MATCH",
    "NATURAL",
    "NO",
    "NOT",
    "NOTNULL",
    "NULL",
    "OF",
    "OFFSET",
    "ON",
    "OR",
    "ORDER",
    "OUTER",
    "PLAN",
    "PRAGMA",
    "PRIMARY",
    "QUERY",
    "RAISE",
    "RECURSIVE",
    "REFERENCES",
    "REGEXP",
    "REINDEX",
    "RELEASE",
    "RENAME",
    "REPLACE",
    "RESTRICT",
    "RIGHT",
    "ROLLBACK",
    "ROW",
    "SAVEPOINT",
    "SELECT",
    "SET",
    "TABLE",
    "TEMP",
    "TEMPORARY",
    "THEN",
    "TO",
    "TRANSACTION",
    "TRIGGER",
    "UNION",
    "UNIQUE",
    "UPDATE",
    "USING",
    "VACUUM",
    "VALUES",
    "VIEW",
    "VIRTUAL",
    "WHEN",
    "WHERE",
    "WITH",
    "WITHOUT",
];

/// SQLite generator.
#[derive(Debug, Clone, Default)]
pub struct SqliteGenerator {
    registry: ExtensionRegistry,
}

impl SqliteGenerator {
    /// Creates a new SQLite generator.
    #[must_use]
    pub fn new(registry: ExtensionRegistry) -> Self {
        Self { registry }
    }

    fn recreation_required(what: &str, target: &str) -> Vec<String> {
        vec![format!(
            "-- {what} is not supported by SQLite. Table recreation required for: {target}"
        )]
    }
}

impl SqlGenerator for SqliteGenerator {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn registry(&self) -> &ExtensionRegistry {
        &self.registry
    }

    fn reserved_words(&self) -> &'static [&'static str] {
        RESERVED_WORDS
    }

    fn builtin_type(&self, name: &str) -> Option<&'static str> {
        let mapped = match name {
            "int" | "integer" | "int2" | "int4" | "int8" | "smallint" | "bigint" | "tinyint"
            | "serial" | "smallserial" | "bigserial" | "bool" | "boolean" => "INTEGER",
            "string" | "text" | "uuid" | "json" | "jsonb" | "citext" | "inet" | "cidr"
            | "interval" => "TEXT",
            "real" | "float" | "float4" | "float8" | "double" | "double precision" => "REAL",
            "decimal" | "numeric" | "money" => "NUMERIC",
            "timestamp" | "timestamptz" => "TIMESTAMP",
            "datetime" => "DATETIME",
            "date" => "DATE",
            "time" => "TIME",
            "bytea" | "blob" | "binary" => "BLOB",
            _ => return None,
        };
        Some(mapped)
    }

    fn boolean_literal(&self, value: bool) -> &'static str {
        if value {
            "1"
        } else {
            "0"
        }
    }

    fn raw_default(&self, expr: &str) -> String {
        match expr.to_ascii_lowercase().as_str() {
            "now()" | "current_timestamp" | "localtimestamp" => "CURRENT_TIMESTAMP".to_string(),
            "current_date" => "CURRENT_DATE".to_string(),
            "current_time" | "localtime" => "CURRENT_TIME".to_string(),
            _ => format!("({expr})"),
        }
    }

    fn inline_unique(&self) -> bool {
        false
    }

    /// Unique fields are backed by a `uk_` index, which SQLite refuses to
    /// keep once its column is gone.
    fn drop_column(&self, table: &str, column: &str) -> Vec<String> {
        vec![
            format!(
                "DROP INDEX IF EXISTS {}",
                self.escape_identifier(&unique_constraint_name(table, column))
            ),
            format!(
                "ALTER TABLE {} DROP COLUMN {}",
                self.escape_identifier(table),
                self.escape_identifier(column)
            ),
        ]
    }

    fn alter_column_type(&self, table: &str, column: &str, _to: &str) -> Vec<String> {
        Self::recreation_required("ALTER COLUMN TYPE", &format!("{table}.{column}"))
    }

    fn alter_column_not_null(&self, table: &str, column: &str, not_null: bool) -> Vec<String> {
        let what = if not_null {
            "SET NOT NULL"
        } else {
            "DROP NOT NULL"
        };
        Self::recreation_required(what, &format!("{table}.{column}"))
    }

    fn alter_column_default(
        &self,
        table: &str,
        column: &str,
        default: Option<(&str, &str)>,
    ) -> Vec<String> {
        let what = if default.is_some() {
            "SET DEFAULT"
        } else {
            "DROP DEFAULT"
        };
        Self::recreation_required(what, &format!("{table}.{column}"))
    }

    fn add_unique(&self, table: &str, column: &str, _constraint: &str) -> Vec<String> {
        vec![self.unique_index(table, column)]
    }

    fn drop_unique(&self, _table: &str, constraint: &str) -> Vec<String> {
        vec![format!(
            "DROP INDEX IF EXISTS {}",
            self.escape_identifier(constraint)
        )]
    }

    fn create_index(&self, index: &Index) -> Vec<String> {
        if index.primary_key {
            return Self::recreation_required(
                "ADD PRIMARY KEY",
                &format!("{}.{}", index.table, index.resolved_name()),
            );
        }

        let mut sql = String::from("CREATE ");
        if index.unique {
            sql.push_str("UNIQUE ");
        }
        sql.push_str(&format!(
            "INDEX {} ON {} ({})",
            self.escape_identifier(&index.resolved_name()),
            self.escape_identifier(&index.table),
            self.column_list(&index.columns)
        ));
        vec![sql]
    }

    fn drop_index(&self, index: &Index) -> Vec<String> {
        if index.primary_key {
            return Self::recreation_required(
                "DROP PRIMARY KEY",
                &format!("{}.{}", index.table, index.resolved_name()),
            );
        }
        vec![format!(
            "DROP INDEX IF EXISTS {}",
            self.escape_identifier(&index.resolved_name())
        )]
    }

    fn add_foreign_key(&self, reference: &Reference) -> Vec<String> {
        Self::recreation_required(
            "ADD FOREIGN KEY",
            &format!("{}.{}", reference.from.table, reference.resolved_name()),
        )
    }

    fn drop_foreign_key(&self, reference: &Reference) -> Vec<String> {
        Self::recreation_required(
            "DROP FOREIGN KEY",
            &format!("{}.{}", reference.from.table, reference.resolved_name()),
        )
    }

    fn preamble(&self) -> Vec<String> {
        Vec::new()
    }

    fn comments(&self, _schema: &Schema) -> Vec<String> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Field, Table};

    #[test]
    fn test_type_mapping() {
        let generator = SqliteGenerator::default();
        assert_eq!(generator.map_type("uuid"), "TEXT");
        assert_eq!(generator.map_type("boolean"), "INTEGER");
        assert_eq!(generator.map_type("varchar(255)"), "VARCHAR(255)");
        assert_eq!(generator.map_type("bytea"), "BLOB");
    }

    #[test]
    fn test_defaults() {
        let generator = SqliteGenerator::default();
        assert_eq!(generator.format_default("true", "bool"), "1");
        assert_eq!(generator.format_default("now()", "timestamp"), "CURRENT_TIMESTAMP");
        assert_eq!(
            generator.format_default("gen_random_uuid()", "uuid"),
            "(gen_random_uuid())"
        );
    }

    #[test]
    fn test_unique_as_index() {
        let generator = SqliteGenerator::default();
        let table = Table::new("users")
            .field(Field::new("id", "integer").primary_key())
            .field(Field::new("email", "text").unique());

        assert_eq!(
            generator.create_table(&table),
            vec![
                "CREATE TABLE users (\n    id INTEGER PRIMARY KEY,\n    email TEXT\n)".to_string(),
                "CREATE UNIQUE INDEX uk_users_email ON users (email)".to_string(),
            ]
        );
        assert_eq!(
            generator.drop_unique("users", "uk_users_email"),
            vec!["DROP INDEX IF EXISTS uk_users_email".to_string()]
        );
    }

    #[test]
    fn test_unsupported_render_as_comments() {
        let generator = SqliteGenerator::default();
        let statements = generator.alter_column_type("users", "age", "bigint");
        assert_eq!(statements.len(), 1);
        assert!(statements[0].starts_with("-- ALTER COLUMN TYPE is not supported by SQLite"));
        assert!(statements[0].ends_with("users.age"));

        let fk = generator.add_foreign_key(&Reference::new("posts", "author_id", "users", "id"));
        assert!(fk[0].starts_with("--"));
        assert!(fk[0].contains("posts.fk_posts_author_id"));
    }

    #[test]
    fn test_drop_column_drops_unique_index_first() {
        assert_eq!(
            SqliteGenerator::default().drop_column("users", "legacy"),
            vec![
                "DROP INDEX IF EXISTS uk_users_legacy".to_string(),
                "ALTER TABLE users DROP COLUMN legacy".to_string(),
            ]
        );
    }

    #[test]
    fn test_index_ignores_method() {
        let index = Index::new("places", ["name"]).method("gin");
        assert_eq!(
            SqliteGenerator::default().create_index(&index),
            vec!["CREATE INDEX idx_places_name ON places (name)".to_string()]
        );
    }
}
