//! Migration ledger.
//!
//! This module manages the ledger table that records which numbered
//! migrations have been applied to the database. The table name is
//! configurable (`oxide_schema_migrations` by default).

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use sqlx::AnyConnection;
use tracing::{debug, warn};

use crate::database::POSTGRES_BACKEND;
use crate::error::{MigrateError, Result};
use crate::storage::MigrationFile;

/// A ledger row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedMigration {
    /// Migration number.
    pub number: u32,
    /// Migration filename.
    pub filename: String,
    /// Checksum of the file when it was applied.
    pub checksum: String,
    /// When the migration was applied.
    pub applied_at: DateTime<Utc>,
}

/// Reads and writes the ledger table.
///
/// Every method takes the connection explicitly so ledger writes can join
/// the transaction that executes the migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationLedger {
    table: String,
}

impl MigrationLedger {
    /// Creates a ledger over `table`. The name must already be validated.
    #[must_use]
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
        }
    }

    /// Returns the ledger table name.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// SQL creating the ledger table. Portable across PostgreSQL and SQLite.
    #[must_use]
    pub fn create_table_sql(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    number INTEGER PRIMARY KEY,\n    filename TEXT NOT NULL,\n    checksum TEXT NOT NULL,\n    applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP\n)",
            self.table
        )
    }

    /// Creates the ledger table if it doesn't exist.
    pub async fn ensure_table(&self, conn: &mut AnyConnection) -> Result<()> {
        sqlx::query(&self.create_table_sql())
            .execute(&mut *conn)
            .await
            .map_err(|source| MigrateError::LedgerBootstrap {
                table: self.table.clone(),
                source,
            })?;
        debug!(table = %self.table, "Ledger table ready");
        Ok(())
    }

    /// Checks whether the ledger table exists.
    pub async fn exists(&self, conn: &mut AnyConnection) -> Result<bool> {
        let sql = if conn.backend_name() == POSTGRES_BACKEND {
            "SELECT CAST(COUNT(*) AS BIGINT) FROM information_schema.tables \
             WHERE table_schema = current_schema() AND table_name = $1"
        } else {
            "SELECT CAST(COUNT(*) AS BIGINT) FROM sqlite_master WHERE type = 'table' AND name = $1"
        };

        let (count,): (i64,) = sqlx::query_as(sql)
            .bind(self.table.as_str())
            .fetch_one(&mut *conn)
            .await?;
        Ok(count > 0)
    }

    /// Returns the highest applied migration number, or 0.
    pub async fn current_version(&self, conn: &mut AnyConnection) -> Result<u32> {
        let sql = format!(
            "SELECT CAST(COALESCE(MAX(number), 0) AS BIGINT) FROM {}",
            self.table
        );
        let (max,): (i64,) = sqlx::query_as(&sql).fetch_one(&mut *conn).await?;
        to_number(max)
    }

    /// Returns every ledger row in ascending number order.
    pub async fn applied(&self, conn: &mut AnyConnection) -> Result<Vec<AppliedMigration>> {
        let sql = format!(
            "SELECT CAST(number AS BIGINT), filename, checksum, CAST(applied_at AS TEXT) \
             FROM {} ORDER BY number",
            self.table
        );
        let rows: Vec<(i64, String, String, String)> =
            sqlx::query_as(&sql).fetch_all(&mut *conn).await?;

        rows.into_iter()
            .map(|(number, filename, checksum, applied_at)| {
                Ok(AppliedMigration {
                    number: to_number(number)?,
                    filename,
                    checksum,
                    applied_at: parse_timestamp(&applied_at),
                })
            })
            .collect()
    }

    /// Records a migration as applied.
    pub async fn record_applied(
        &self,
        conn: &mut AnyConnection,
        migration: &MigrationFile,
    ) -> Result<()> {
        let sql = format!(
            "INSERT INTO {} (number, filename, checksum) VALUES ($1, $2, $3)",
            self.table
        );
        sqlx::query(&sql)
            .bind(i64::from(migration.number))
            .bind(migration.filename.as_str())
            .bind(migration.checksum.as_str())
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    /// Removes a migration record (for rollback).
    pub async fn record_unapplied(&self, conn: &mut AnyConnection, number: u32) -> Result<()> {
        let sql = format!("DELETE FROM {} WHERE number = $1", self.table);
        let result = sqlx::query(&sql)
            .bind(i64::from(number))
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(MigrateError::MigrationNotFound(number));
        }

        Ok(())
    }
}

fn to_number(value: i64) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| MigrateError::InvalidState(format!("ledger holds invalid number {value}")))
}

/// Parses a timestamp as returned by either backend.
fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f").map(|dt| dt.and_utc())
        })
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S").map(|dt| dt.and_utc()))
        .unwrap_or_else(|_| {
            warn!(value, "Unparseable applied_at timestamp, using current time");
            Utc::now()
        })
}
