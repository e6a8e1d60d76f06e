//! End-to-end tests of the migration manager against SQLite file databases.

use std::path::{Path, PathBuf};

use oxide_migrate::database::Database;
use oxide_migrate::prelude::*;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

const USERS_V1: &str = r#"{
    "tables": [{
        "name": "users",
        "fields": [
            {"name": "id", "type": "integer", "primaryKey": true},
            {"name": "email", "type": "text", "notNull": true, "unique": true}
        ]
    }]
}"#;

const USERS_V2: &str = r#"{
    "tables": [{
        "name": "users",
        "fields": [
            {"name": "id", "type": "integer", "primaryKey": true},
            {"name": "email", "type": "text", "notNull": true, "unique": true},
            {"name": "name", "type": "text"}
        ]
    }],
    "indexes": [{"table": "users", "columns": ["email"]}]
}"#;

const USERS_ID_ONLY: &str = r#"{
    "tables": [{
        "name": "users",
        "fields": [
            {"name": "id", "type": "integer", "primaryKey": true}
        ]
    }]
}"#;

const USERS_WITH_UNIQUE_EMAIL: &str = r#"{
    "tables": [{
        "name": "users",
        "fields": [
            {"name": "id", "type": "integer", "primaryKey": true},
            {"name": "email", "type": "text", "unique": true}
        ]
    }]
}"#;

struct Project {
    dir: TempDir,
}

impl Project {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn migrations_dir(&self) -> PathBuf {
        self.root().join("migrations")
    }

    fn database_url(&self) -> String {
        format!("sqlite://{}?mode=rwc", self.root().join("app.db").display())
    }

    fn config(&self) -> MigrateConfig {
        MigrateConfig::default()
            .with_database_url(self.database_url())
            .with_schema_path(self.root().join("schema.json"))
            .with_migrations_dir(self.migrations_dir())
            .with_dialect(Dialect::Sqlite)
    }

    fn manager(&self) -> MigrationManager<JsonSchemaParser> {
        MigrationManager::new(self.config(), JsonSchemaParser).unwrap()
    }

    fn write_schema(&self, source: &str) {
        std::fs::write(self.root().join("schema.json"), source).unwrap();
    }

    fn write_migration(&self, name: &str, sql: &str) {
        std::fs::create_dir_all(self.migrations_dir()).unwrap();
        std::fs::write(self.migrations_dir().join(name), sql).unwrap();
    }

    async fn table_exists(&self, table: &str) -> bool {
        let mut db = Database::connect(&self.database_url()).await.unwrap();
        let (count,): (i64,) = sqlx::query_as(
            "SELECT CAST(COUNT(*) AS BIGINT) FROM sqlite_master WHERE type = 'table' AND name = $1",
        )
        .bind(table)
        .fetch_one(db.connection())
        .await
        .unwrap();
        db.disconnect().await;
        count > 0
    }

    async fn column_exists(&self, table: &str, column: &str) -> bool {
        let mut db = Database::connect(&self.database_url()).await.unwrap();
        let (count,): (i64,) = sqlx::query_as(&format!(
            "SELECT CAST(COUNT(*) AS BIGINT) FROM pragma_table_info('{table}') WHERE name = $1"
        ))
        .bind(column)
        .fetch_one(db.connection())
        .await
        .unwrap();
        db.disconnect().await;
        count > 0
    }
}

fn generated(outcome: GenerateOutcome) -> GeneratedMigration {
    match outcome {
        GenerateOutcome::Generated(migration) => migration,
        GenerateOutcome::NoChanges => panic!("expected a generated migration"),
    }
}

fn pending_numbers(report: &StatusReport) -> Vec<u32> {
    report.pending.iter().map(|p| p.number).collect()
}

#[tokio::test]
async fn first_generate_renders_full_schema_and_second_is_a_no_op() {
    let project = Project::new();
    project.write_schema(USERS_V1);
    let manager = project.manager();

    let first = generated(manager.generate(GenerateOptions::default()).await.unwrap());
    assert!(first.initial);
    assert_eq!(first.number, 1);
    assert_eq!(first.filename, "0001.sql");
    assert!(first.sql.starts_with("-- Migration 0001\n-- Generated at "));
    assert!(first.sql.contains("CREATE TABLE users (\n    id INTEGER PRIMARY KEY,\n    email TEXT NOT NULL\n);"));
    assert!(first.sql.contains("CREATE UNIQUE INDEX uk_users_email ON users (email);"));
    assert!(first.down_sql.contains("DROP TABLE IF EXISTS users;"));

    let dir = project.migrations_dir();
    for name in ["0001.sql", "0001.down.sql", "snapshot.json", "snapshot.sql"] {
        assert!(dir.join(name).exists(), "{name} was not written");
    }
    assert_eq!(
        std::fs::read_to_string(dir.join("snapshot.json")).unwrap(),
        USERS_V1
    );

    let second = manager.generate(GenerateOptions::default()).await.unwrap();
    assert!(matches!(second, GenerateOutcome::NoChanges));
    assert!(!dir.join("0002.sql").exists());
}

#[tokio::test]
async fn generate_writes_incremental_migration() {
    let project = Project::new();
    project.write_schema(USERS_V1);
    let manager = project.manager();
    manager.generate(GenerateOptions::default()).await.unwrap();

    project.write_schema(USERS_V2);
    let migration = generated(
        manager
            .generate(GenerateOptions {
                name: Some("add name".into()),
                ..GenerateOptions::default()
            })
            .await
            .unwrap(),
    );

    assert!(!migration.initial);
    assert_eq!(migration.filename, "0002.sql");
    let descriptions: Vec<&str> = migration
        .changes
        .iter()
        .map(|c| c.description.as_str())
        .collect();
    assert_eq!(
        descriptions,
        vec![
            "Add column 'name' to table 'users'",
            "Create index 'idx_users_email' on table 'users'",
        ]
    );
    assert!(migration.sql.starts_with("-- Migration 0002: add name\n"));
    assert!(migration.sql.contains("ALTER TABLE users ADD COLUMN name TEXT;"));
    assert!(migration.down_sql.contains("DROP INDEX IF EXISTS idx_users_email;"));
    assert!(migration.down_sql.contains("ALTER TABLE users DROP COLUMN name;"));
}

#[tokio::test]
async fn generate_dry_run_writes_nothing() {
    let project = Project::new();
    project.write_schema(USERS_V1);
    let manager = project.manager();

    let migration = generated(
        manager
            .generate(GenerateOptions {
                dry_run: true,
                ..GenerateOptions::default()
            })
            .await
            .unwrap(),
    );
    assert!(migration.dry_run);
    assert_eq!(migration.filename, "0001.sql");
    assert!(!project.migrations_dir().exists());
}

#[tokio::test]
async fn generate_force_writes_empty_migration() {
    let project = Project::new();
    project.write_schema(USERS_V1);
    let manager = project.manager();
    manager.generate(GenerateOptions::default()).await.unwrap();

    let migration = generated(
        manager
            .generate(GenerateOptions {
                force: true,
                ..GenerateOptions::default()
            })
            .await
            .unwrap(),
    );
    assert_eq!(migration.filename, "0002.sql");
    assert!(migration.changes.is_empty());
    assert!(project.migrations_dir().join("0002.sql").exists());
}

#[tokio::test]
async fn generate_reports_parse_and_schema_errors() {
    let project = Project::new();
    let manager = project.manager();

    project.write_schema("{ not json");
    assert!(matches!(
        manager.generate(GenerateOptions::default()).await,
        Err(MigrateError::Parse { .. })
    ));

    project.write_schema(
        r#"{
            "tables": [{"name": "posts", "fields": [{"name": "author_id", "type": "integer"}]}],
            "references": [{"from": {"table": "posts", "column": "author_id"},
                            "to": {"table": "users", "column": "id"}}]
        }"#,
    );
    assert!(matches!(
        manager.generate(GenerateOptions::default()).await,
        Err(MigrateError::Schema(_))
    ));
    assert!(!project.migrations_dir().exists());
}

#[tokio::test]
async fn run_applies_up_to_target() {
    let project = Project::new();
    for n in 1..=5 {
        project.write_migration(
            &format!("{n:04}.sql"),
            &format!("CREATE TABLE t{n} (id INTEGER PRIMARY KEY);\n"),
        );
    }
    let manager = project.manager();

    let outcome = manager
        .run(RunOptions {
            target: Some(3),
            ..RunOptions::default()
        })
        .await
        .unwrap();
    assert_eq!(outcome.applied, vec![1, 2, 3]);
    assert_eq!(outcome.current, 3);

    let outcome = manager
        .run(RunOptions {
            target: Some(4),
            ..RunOptions::default()
        })
        .await
        .unwrap();
    assert_eq!(outcome.applied, vec![4]);
    assert_eq!(outcome.current, 4);

    let report = manager.status().await.unwrap();
    assert!(report.connected);
    assert!(report.ledger_exists);
    assert_eq!(report.current, 4);
    assert_eq!(report.applied.len(), 4);
    assert_eq!(pending_numbers(&report), vec![5]);
    assert!(project.table_exists("t4").await);
    assert!(!project.table_exists("t5").await);
}

#[tokio::test]
async fn run_single_applies_one_migration() {
    let project = Project::new();
    project.write_migration("0001.sql", "CREATE TABLE a (id INTEGER);");
    project.write_migration("0002.sql", "CREATE TABLE b (id INTEGER);");
    let manager = project.manager();

    let outcome = manager
        .run(RunOptions {
            single: true,
            ..RunOptions::default()
        })
        .await
        .unwrap();
    assert_eq!(outcome.applied, vec![1]);

    let outcome = manager.run(RunOptions::default()).await.unwrap();
    assert_eq!(outcome.applied, vec![2]);

    let outcome = manager.run(RunOptions::default()).await.unwrap();
    assert!(outcome.applied.is_empty());
    assert_eq!(outcome.current, 2);
}

#[tokio::test]
async fn failing_statement_rolls_back_only_that_migration() {
    let project = Project::new();
    project.write_migration("0001.sql", "CREATE TABLE a (id INTEGER);");
    project.write_migration(
        "0002.sql",
        "CREATE TABLE b (id INTEGER);\nINSERT INTO missing_table VALUES (1);\n",
    );
    project.write_migration("0003.sql", "CREATE TABLE c (id INTEGER);");
    let manager = project.manager();

    let err = manager.run(RunOptions::default()).await.unwrap_err();
    match &err {
        MigrateError::RunFailed {
            applied,
            failed,
            source,
        } => {
            assert_eq!(applied, &vec![1]);
            assert_eq!(failed, "0002.sql");
            assert!(matches!(
                source.as_ref(),
                MigrateError::Statement { index: 2, .. }
            ));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains("database state preserved"));

    assert!(project.table_exists("a").await);
    assert!(!project.table_exists("b").await);
    assert!(!project.table_exists("c").await);

    let report = manager.status().await.unwrap();
    assert_eq!(report.current, 1);
    assert_eq!(pending_numbers(&report), vec![2, 3]);
}

#[tokio::test]
async fn run_dry_run_executes_nothing() {
    let project = Project::new();
    project.write_migration("0001.sql", "CREATE TABLE a (id INTEGER);\nDELETE FROM a;");
    let manager = project.manager();

    let outcome = manager
        .run(RunOptions {
            dry_run: true,
            ..RunOptions::default()
        })
        .await
        .unwrap();
    assert!(outcome.dry_run);
    assert_eq!(outcome.applied, vec![1]);
    assert_eq!(outcome.current, 0);
    assert_eq!(outcome.warnings.len(), 1);
    assert_eq!(outcome.warnings[0].rule, LintRule::DeleteWithoutWhere);

    let report = manager.status().await.unwrap();
    assert!(!report.ledger_exists);
    assert!(!project.table_exists("a").await);
}

#[tokio::test]
async fn modified_migration_is_rejected_unless_forced() {
    let project = Project::new();
    project.write_migration("0001.sql", "CREATE TABLE a (id INTEGER);");
    let manager = project.manager();
    manager.run(RunOptions::default()).await.unwrap();

    project.write_migration("0001.sql", "CREATE TABLE a (id INTEGER, note TEXT);");
    project.write_migration("0002.sql", "CREATE TABLE b (id INTEGER);");

    assert!(matches!(
        manager.run(RunOptions::default()).await,
        Err(MigrateError::ChecksumMismatch { .. })
    ));

    let report = manager.status().await.unwrap();
    assert_eq!(report.checksum_mismatches, vec!["0001.sql".to_string()]);
    assert!(!report.applied[0].checksum_ok);

    let outcome = manager
        .run(RunOptions {
            force: true,
            ..RunOptions::default()
        })
        .await
        .unwrap();
    assert_eq!(outcome.applied, vec![2]);
}

#[tokio::test]
async fn rollback_reverts_with_down_files() {
    let project = Project::new();
    project.write_schema(USERS_V1);
    let manager = project.manager();
    manager.generate(GenerateOptions::default()).await.unwrap();
    project.write_schema(USERS_V2);
    manager.generate(GenerateOptions::default()).await.unwrap();

    let outcome = manager.run(RunOptions::default()).await.unwrap();
    assert_eq!(outcome.applied, vec![1, 2]);
    assert!(project.column_exists("users", "name").await);

    let outcome = manager
        .rollback(RollbackOptions {
            dry_run: true,
            ..RollbackOptions::default()
        })
        .await
        .unwrap();
    assert_eq!(outcome.reverted, vec![2, 1]);
    assert_eq!(outcome.current, 2);

    let outcome = manager
        .rollback(RollbackOptions {
            target: Some(1),
            ..RollbackOptions::default()
        })
        .await
        .unwrap();
    assert_eq!(outcome.reverted, vec![2]);
    assert_eq!(outcome.current, 1);
    assert!(!project.column_exists("users", "name").await);
    assert!(project.table_exists("users").await);

    let outcome = manager.rollback(RollbackOptions::default()).await.unwrap();
    assert_eq!(outcome.reverted, vec![1]);
    assert_eq!(outcome.current, 0);
    assert!(!project.table_exists("users").await);

    // The migrations apply cleanly again.
    let outcome = manager.run(RunOptions::default()).await.unwrap();
    assert_eq!(outcome.applied, vec![1, 2]);
}

#[tokio::test]
async fn dropping_unique_column_runs_cleanly() {
    let project = Project::new();
    project.write_schema(USERS_V1);
    let manager = project.manager();
    manager.generate(GenerateOptions::default()).await.unwrap();
    manager.run(RunOptions::default()).await.unwrap();
    assert!(project.column_exists("users", "email").await);

    project.write_schema(USERS_ID_ONLY);
    let migration = generated(manager.generate(GenerateOptions::default()).await.unwrap());
    assert!(migration.sql.contains("DROP INDEX IF EXISTS uk_users_email;"));
    assert!(migration.sql.contains("ALTER TABLE users DROP COLUMN email;"));

    let outcome = manager.run(RunOptions::default()).await.unwrap();
    assert_eq!(outcome.applied, vec![2]);
    assert_eq!(outcome.current, 2);
    assert!(!project.column_exists("users", "email").await);
    assert!(project.table_exists("users").await);
}

#[tokio::test]
async fn rollback_removes_added_unique_column() {
    let project = Project::new();
    project.write_schema(USERS_ID_ONLY);
    let manager = project.manager();
    manager.generate(GenerateOptions::default()).await.unwrap();
    project.write_schema(USERS_WITH_UNIQUE_EMAIL);
    let migration = generated(manager.generate(GenerateOptions::default()).await.unwrap());
    assert!(migration.sql.contains("CREATE UNIQUE INDEX uk_users_email ON users (email);"));

    manager.run(RunOptions::default()).await.unwrap();
    assert!(project.column_exists("users", "email").await);

    let outcome = manager
        .rollback(RollbackOptions {
            target: Some(1),
            ..RollbackOptions::default()
        })
        .await
        .unwrap();
    assert_eq!(outcome.reverted, vec![2]);
    assert_eq!(outcome.current, 1);
    assert!(!project.column_exists("users", "email").await);
    assert!(project.table_exists("users").await);

    let outcome = manager.run(RunOptions::default()).await.unwrap();
    assert_eq!(outcome.applied, vec![2]);
    assert!(project.column_exists("users", "email").await);
}

#[tokio::test]
async fn rollback_without_down_file_changes_nothing() {
    let project = Project::new();
    project.write_migration("0001.sql", "CREATE TABLE a (id INTEGER);");
    project.write_migration("0001.down.sql", "DROP TABLE a;");
    project.write_migration("0002.sql", "CREATE TABLE b (id INTEGER);");
    let manager = project.manager();
    manager.run(RunOptions::default()).await.unwrap();

    let err = manager
        .rollback(RollbackOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, MigrateError::NotReversible(ref name) if name == "0002.sql"));

    assert!(project.table_exists("a").await);
    assert!(project.table_exists("b").await);
    assert_eq!(manager.status().await.unwrap().current, 2);
}

#[tokio::test]
async fn bootstrap_initializes_from_snapshot() {
    let project = Project::new();
    project.write_schema(USERS_V1);
    let manager = project.manager();
    manager.generate(GenerateOptions::default()).await.unwrap();
    project.write_schema(USERS_V2);
    manager.generate(GenerateOptions::default()).await.unwrap();

    let outcome = manager
        .run(RunOptions {
            bootstrap: true,
            ..RunOptions::default()
        })
        .await
        .unwrap();
    assert!(outcome.bootstrapped);
    assert_eq!(outcome.applied, vec![1, 2]);
    assert_eq!(outcome.current, 2);
    assert!(project.column_exists("users", "name").await);

    let report = manager.status().await.unwrap();
    assert!(report.is_up_to_date());

    assert!(matches!(
        manager
            .run(RunOptions {
                bootstrap: true,
                ..RunOptions::default()
            })
            .await,
        Err(MigrateError::InvalidState(_))
    ));
}

#[tokio::test]
async fn status_reports_unreachable_database() {
    let project = Project::new();
    project.write_migration("0001.sql", "CREATE TABLE a (id INTEGER);");
    let config = project
        .config()
        .with_database_url("sqlite:///nonexistent-dir/sub/app.db");
    let manager = MigrationManager::new(config, JsonSchemaParser).unwrap();

    let report = manager.status().await.unwrap();
    assert!(!report.connected);
    assert!(report.error.is_some());
    assert!(report.pending.is_empty());

    assert!(matches!(
        manager.run(RunOptions::default()).await,
        Err(MigrateError::Connection { .. })
    ));
}

#[tokio::test]
async fn configuration_errors_come_before_io() {
    let project = Project::new();

    let config = project.config().with_dialect(Dialect::Mysql);
    assert!(matches!(
        MigrationManager::new(config, JsonSchemaParser),
        Err(MigrateError::Schema(_))
    ));

    let mut config = project.config();
    config.database_url = None;
    let manager = MigrationManager::new(config, JsonSchemaParser).unwrap();
    assert!(matches!(
        manager.run(RunOptions::default()).await,
        Err(MigrateError::Config(_))
    ));
    assert!(matches!(
        manager.status().await,
        Err(MigrateError::Config(_))
    ));
}
