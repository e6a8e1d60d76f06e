//! Migration executor.
//!
//! Every migration runs in its own transaction together with its ledger
//! write: either all of its statements and the ledger row are committed, or
//! none of them are.

use sqlx::AnyConnection;
use sqlx::{Any, Connection, Transaction};
use tracing::{debug, info, warn};

use crate::error::{MigrateError, Result};
use crate::history::MigrationLedger;
use crate::statements::split_statements;
use crate::storage::MigrationFile;

/// Applies and reverts migration files.
#[derive(Debug, Clone, Copy)]
pub struct MigrationExecutor<'a> {
    ledger: &'a MigrationLedger,
}

impl<'a> MigrationExecutor<'a> {
    /// Creates an executor that records into `ledger`.
    #[must_use]
    pub const fn new(ledger: &'a MigrationLedger) -> Self {
        Self { ledger }
    }

    /// Applies a single migration and records it in the ledger.
    pub async fn apply(&self, conn: &mut AnyConnection, migration: &MigrationFile) -> Result<()> {
        info!(migration = %migration.filename, "Applying migration");

        let statements = split_statements(&migration.content);
        let mut tx = conn.begin().await?;
        let result: Result<()> = async {
            execute_statements(&mut tx, &migration.filename, &statements).await?;
            self.ledger.record_applied(&mut tx, migration).await
        }
        .await;
        finish(tx, &migration.filename, result).await?;

        info!(
            migration = %migration.filename,
            statements = statements.len(),
            "Migration applied successfully"
        );
        Ok(())
    }

    /// Reverts a single migration by running its down SQL and removing its
    /// ledger row.
    pub async fn revert(
        &self,
        conn: &mut AnyConnection,
        number: u32,
        filename: &str,
        down_sql: &str,
    ) -> Result<()> {
        info!(migration = %filename, "Rolling back migration");

        let statements = split_statements(down_sql);
        let mut tx = conn.begin().await?;
        let result: Result<()> = async {
            execute_statements(&mut tx, filename, &statements).await?;
            self.ledger.record_unapplied(&mut tx, number).await
        }
        .await;
        finish(tx, filename, result).await?;

        info!(migration = %filename, "Migration rolled back successfully");
        Ok(())
    }

    /// Initializes an empty database from the snapshot SQL and records every
    /// migration file as applied without executing them.
    pub async fn bootstrap(
        &self,
        conn: &mut AnyConnection,
        snapshot_sql: &str,
        migrations: &[MigrationFile],
    ) -> Result<()> {
        info!(migrations = migrations.len(), "Bootstrapping database from snapshot");

        let statements = split_statements(snapshot_sql);
        let mut tx = conn.begin().await?;
        let result: Result<()> = async {
            execute_statements(&mut tx, crate::storage::SNAPSHOT_SQL, &statements).await?;
            for migration in migrations {
                self.ledger.record_applied(&mut tx, migration).await?;
            }
            Ok(())
        }
        .await;
        finish(tx, crate::storage::SNAPSHOT_SQL, result).await
    }
}

async fn execute_statements(
    conn: &mut AnyConnection,
    migration: &str,
    statements: &[String],
) -> Result<()> {
    for (index, sql) in statements.iter().enumerate() {
        debug!(migration, statement = index + 1, sql = %sql, "Executing SQL");
        sqlx::query(sql)
            .execute(&mut *conn)
            .await
            .map_err(|source| MigrateError::Statement {
                migration: migration.to_string(),
                index: index + 1,
                sql: sql.clone(),
                source,
            })?;
    }
    Ok(())
}

/// Commits on success, rolls back on failure.
async fn finish(tx: Transaction<'_, Any>, migration: &str, result: Result<()>) -> Result<()> {
    match result {
        Ok(()) => {
            tx.commit().await?;
            Ok(())
        }
        Err(e) => {
            warn!(migration, error = %e, "Rolling back transaction");
            if let Err(rollback) = tx.rollback().await {
                warn!(migration, error = %rollback, "Failed to roll back transaction");
            }
            Err(e)
        }
    }
}
