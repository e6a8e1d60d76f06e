//! PostgreSQL SQL generator.

use super::{Dialect, SqlGenerator};
use crate::extension::ExtensionRegistry;

const RESERVED_WORDS: &[&str] = &[
    "ALL",
    "ANALYSE",
    "ANALYZE",
    "AND",
    "ANY",
    "ARRAY",
    "AS",
    "ASC",
    "ASYMMETRIC",
    "BOTH",
    "CASE",
    "CAST",
    "CHECK",
    "COLLATE",
    "COLUMN",
    "CONSTRAINT",
    "CREATE",
    "CURRENT_CATALOG",
    "CURRENT_DATE",
    "CURRENT_ROLE",
    "CURRENT_TIME",
    "CURRENT_TIMESTAMP",
    "CURRENT_USER",
    "DEFAULT",
    "DEFERRABLE",
    "DESC",
    "DISTINCT",
    "DO",
    "ELSE",
    "END",
    "EXCEPT",
    "FALSE",
    "FETCH",
    "FOR",
    "FOREIGN",
    "FROM",
    "GRANT",
    "GROUP",
    "HAVING",
    "IN",
    "INITIALLY",
    "INTERSECT",
    "INTO",
    "LATERAL",
    "LEADING",
    "LIMIT",
    "LOCALTIME",
    "LOCALTIMESTAMP",
    "NOT",
    "NULL",
    "OFFSET",
    "ON",
    "ONLY",
    "OR",
    "ORDER",
    "PLACING",
    "PRIMARY",
    "REFERENCES",
    "RETURNING",
    "SELECT",
    "SESSION_USER",
    "SOME",
    "SYMMETRIC",
    "TABLE",
    "THEN",
    "TO",
    "TRAILING",
    "TRUE",
    "UNION",
    "UNIQUE",
    "USER",
    "USING",
    "VARIADIC",
    "WHEN",
    "WHERE",
    "WINDOW",
    "WITH",
];

/// PostgreSQL generator. Every change kind renders as executable SQL.
#[derive(Debug, Clone, Default)]
pub struct PostgresGenerator {
    registry: ExtensionRegistry,
}

impl PostgresGenerator {
    /// Creates a new PostgreSQL generator.
    #[must_use]
    pub fn new(registry: ExtensionRegistry) -> Self {
        Self { registry }
    }
}

impl SqlGenerator for PostgresGenerator {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn registry(&self) -> &ExtensionRegistry {
        &self.registry
    }

    fn reserved_words(&self) -> &'static [&'static str] {
        RESERVED_WORDS
    }

    fn builtin_type(&self, name: &str) -> Option<&'static str> {
        let mapped = match name {
            "int" | "integer" | "int4" => "INTEGER",
            "bigint" | "int8" => "BIGINT",
            "smallint" | "int2" => "SMALLINT",
            "serial" => "SERIAL",
            "bigserial" => "BIGSERIAL",
            "smallserial" => "SMALLSERIAL",
            "string" | "text" => "TEXT",
            "varchar" => "VARCHAR",
            "char" => "CHAR",
            "bool" | "boolean" => "BOOLEAN",
            "real" | "float4" => "REAL",
            "float" | "double" | "float8" | "double precision" => "DOUBLE PRECISION",
            "decimal" => "DECIMAL",
            "numeric" => "NUMERIC",
            "money" => "MONEY",
            "uuid" => "UUID",
            "json" => "JSON",
            "jsonb" => "JSONB",
            "timestamp" | "datetime" => "TIMESTAMP",
            "timestamptz" => "TIMESTAMPTZ",
            "date" => "DATE",
            "time" => "TIME",
            "interval" => "INTERVAL",
            "bytea" | "blob" | "binary" => "BYTEA",
            "inet" => "INET",
            "cidr" => "CIDR",
            _ => return None,
        };
        Some(mapped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::AlterAction;
    use crate::schema::Field;

    #[test]
    fn test_type_aliases() {
        let generator = PostgresGenerator::default();
        assert_eq!(generator.map_type("datetime"), "TIMESTAMP");
        assert_eq!(generator.map_type("Float"), "DOUBLE PRECISION");
        assert_eq!(generator.map_type("blob"), "BYTEA");
        assert_eq!(generator.map_type("citext"), "CITEXT");
    }

    #[test]
    fn test_alter_statements() {
        let generator = PostgresGenerator::default();

        assert_eq!(
            generator.add_column("users", &Field::new("name", "varchar(100)").not_null()),
            vec!["ALTER TABLE users ADD COLUMN name VARCHAR(100) NOT NULL".to_string()]
        );
        assert_eq!(
            generator.alter_column_type("users", "age", "bigint"),
            vec!["ALTER TABLE users ALTER COLUMN age TYPE BIGINT".to_string()]
        );
        assert_eq!(
            generator.alter_column_not_null("users", "age", false),
            vec!["ALTER TABLE users ALTER COLUMN age DROP NOT NULL".to_string()]
        );
        assert_eq!(
            generator.add_unique("users", "email", "uk_users_email"),
            vec!["ALTER TABLE users ADD CONSTRAINT uk_users_email UNIQUE (email)".to_string()]
        );
        assert_eq!(
            generator.drop_unique("users", "uk_users_email"),
            vec!["ALTER TABLE users DROP CONSTRAINT IF EXISTS uk_users_email".to_string()]
        );

        let kind = crate::change::ChangeKind::AlterTable {
            table: "user".into(),
            action: AlterAction::DropDefault {
                column: "order".into(),
            },
        };
        assert_eq!(
            generator.render_change_sql(&kind),
            vec!["ALTER TABLE \"user\" ALTER COLUMN \"order\" DROP DEFAULT".to_string()]
        );
    }

    #[test]
    fn test_extension_preamble() {
        let registry = ExtensionRegistry::from_names(["uuid-ossp"]).unwrap();
        let generator = PostgresGenerator::new(registry);
        assert_eq!(
            generator.preamble(),
            vec!["CREATE EXTENSION IF NOT EXISTS \"uuid-ossp\"".to_string()]
        );
        assert_eq!(
            generator.format_default("uuid_generate_v1mc()", "uuid"),
            "uuid_generate_v1mc()"
        );
        assert_eq!(
            PostgresGenerator::default().format_default("uuid_generate_v1mc()", "uuid"),
            "'uuid_generate_v1mc()'"
        );
    }
}
