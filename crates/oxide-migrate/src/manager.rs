//! Migration manager.
//!
//! The manager ties the schema parser, the differ, the SQL generator, the
//! migration file store and the database ledger together. Each operation
//! holds one database connection for its whole duration and always
//! disconnects before returning.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use chrono::{SecondsFormat, Utc};
use oxide_schema::change::Change;
use oxide_schema::dialect::SqlGenerator;
use oxide_schema::diff::Differ;
use oxide_schema::schema::Schema;
use oxide_schema::state::SchemaState;
use oxide_schema::validate::validate;
use oxide_schema::SchemaError;
use sqlx::AnyConnection;
use tracing::{debug, info, warn};

use crate::config::MigrateConfig;
use crate::database::Database;
use crate::error::{MigrateError, Result};
use crate::executor::MigrationExecutor;
use crate::history::{AppliedMigration, MigrationLedger};
use crate::lint::{lint_statements, LintWarning};
use crate::parser::SchemaParser;
use crate::statements::split_statements;
use crate::status::{AppliedEntry, PendingEntry, StatusReport};
use crate::storage::{
    down_filename, is_valid_checksum, migration_filename, MigrationFile, MigrationStore,
    SNAPSHOT_SQL,
};

/// Options for [`MigrationManager::generate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerateOptions {
    /// Optional description written into the migration header.
    pub name: Option<String>,
    /// Compute everything but write nothing.
    pub dry_run: bool,
    /// Write a migration even when there are no changes.
    pub force: bool,
}

/// A generated (or would-be) migration.
#[derive(Debug, Clone)]
pub struct GeneratedMigration {
    /// Migration number.
    pub number: u32,
    /// Migration filename.
    pub filename: String,
    /// Down filename.
    pub down_filename: String,
    /// Full migration file content.
    pub sql: String,
    /// Full down file content.
    pub down_sql: String,
    /// Changes the migration applies.
    pub changes: Vec<Change>,
    /// Whether this is the full-schema first migration.
    pub initial: bool,
    /// Whether files were left unwritten.
    pub dry_run: bool,
}

/// Result of [`MigrationManager::generate`].
#[derive(Debug, Clone)]
pub enum GenerateOutcome {
    /// The schema matches the snapshot; nothing was written.
    NoChanges,
    /// A migration was generated.
    Generated(GeneratedMigration),
}

/// Options for [`MigrationManager::run`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Highest migration number to apply.
    pub target: Option<u32>,
    /// Apply at most one migration.
    pub single: bool,
    /// Continue despite checksum mismatches.
    pub force: bool,
    /// Report what would be applied without executing anything.
    pub dry_run: bool,
    /// Initialize a fresh database from `snapshot.sql`.
    pub bootstrap: bool,
}

/// Result of [`MigrationManager::run`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOutcome {
    /// Migrations applied (or that would be applied), ascending.
    pub applied: Vec<u32>,
    /// Current version after the run.
    pub current: u32,
    /// Whether nothing was executed.
    pub dry_run: bool,
    /// Lint findings in the pending migrations.
    pub warnings: Vec<LintWarning>,
    /// Whether the database was initialized from the snapshot.
    pub bootstrapped: bool,
}

/// Options for [`MigrationManager::rollback`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RollbackOptions {
    /// Version to roll back to; every applied migration above it is
    /// reverted. `None` reverts everything.
    pub target: Option<u32>,
    /// Report what would be reverted without executing anything.
    pub dry_run: bool,
    /// Continue despite checksum mismatches.
    pub force: bool,
}

/// Result of [`MigrationManager::rollback`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RollbackOutcome {
    /// Migrations reverted (or that would be reverted), descending.
    pub reverted: Vec<u32>,
    /// Current version after the rollback.
    pub current: u32,
    /// Whether nothing was executed.
    pub dry_run: bool,
}

/// Generates, applies and reverts migrations.
pub struct MigrationManager<P: SchemaParser> {
    config: MigrateConfig,
    parser: P,
    generator: Box<dyn SqlGenerator>,
    store: MigrationStore,
    ledger: MigrationLedger,
}

impl<P: SchemaParser> std::fmt::Debug for MigrationManager<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationManager")
            .field("config", &self.config)
            .field("dialect", &self.generator.dialect())
            .field("store", &self.store)
            .field("ledger", &self.ledger)
            .finish_non_exhaustive()
    }
}

impl<P: SchemaParser> MigrationManager<P> {
    /// Creates a manager. The configuration is validated here, before any
    /// I/O.
    pub fn new(config: MigrateConfig, parser: P) -> Result<Self> {
        config.validate(parser.extension())?;
        let generator = oxide_schema::dialect::generator_for(
            config.dialect,
            config.extension_registry()?,
        )?;
        let store = MigrationStore::new(&config.migrations_dir, parser.extension())?;
        let ledger = MigrationLedger::new(&config.ledger_table);

        Ok(Self {
            config,
            parser,
            generator,
            store,
            ledger,
        })
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &MigrateConfig {
        &self.config
    }

    /// Returns the SQL generator.
    #[must_use]
    pub fn generator(&self) -> &dyn SqlGenerator {
        self.generator.as_ref()
    }

    /// Returns the migration file store.
    #[must_use]
    pub fn store(&self) -> &MigrationStore {
        &self.store
    }

    // ------------------------------------------------------------------
    // generate
    // ------------------------------------------------------------------

    /// Diffs the desired schema against the last snapshot and writes the next
    /// migration.
    pub async fn generate(&self, options: GenerateOptions) -> Result<GenerateOutcome> {
        let schema_path = &self.config.schema_path;
        let source = tokio::fs::read_to_string(schema_path)
            .await
            .map_err(|source| MigrateError::FileAccess {
                path: schema_path.clone(),
                source,
            })?;
        let desired = self.parse_schema(schema_path, &source)?;
        validate(&desired)?;

        let snapshot = match self.store.read_snapshot_schema().await? {
            Some(snapshot_source) => {
                let path = self.store.path(&self.store.snapshot_schema_name());
                Some(self.parse_schema(&path, &snapshot_source)?)
            }
            None => None,
        };

        let differ = Differ::new(self.generator.as_ref());
        let initial = snapshot.is_none();
        let previous = snapshot.unwrap_or_default();

        let changes = differ.compare(&previous, &desired);
        if changes.is_empty() && !options.force && !initial {
            info!("No changes detected");
            return Ok(GenerateOutcome::NoChanges);
        }
        check_convergence(&differ, &previous, &desired, &changes)?;

        let body = if initial {
            self.generator.render_schema(&desired)?
        } else {
            self.generator.render_changes(&changes)
        };
        let down_body = self
            .generator
            .render_changes(&differ.compare(&desired, &previous));

        let number = self.store.next_number().await?;
        let filename = migration_filename(number);
        let down_name = down_filename(number);
        let generated_at = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let title = options
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map_or_else(String::new, |n| format!(": {n}"));

        let sql = format!("-- Migration {number:04}{title}\n-- Generated at {generated_at}\n\n{body}");
        let down_sql = format!(
            "-- Rollback of migration {number:04}{title}\n-- Generated at {generated_at}\n\n{down_body}"
        );

        if self.store.exists(&filename).await? {
            return Err(MigrateError::MigrationExists(self.store.path(&filename)));
        }

        if options.dry_run {
            info!(migration = %filename, changes = changes.len(), "Dry run, nothing written");
        } else {
            self.store.write(&filename, &sql).await?;
            self.store.write(&down_name, &down_sql).await?;
            self.store
                .write_snapshot(&source, &self.generator.render_schema(&desired)?)
                .await?;
            info!(migration = %filename, changes = changes.len(), initial, "Generated migration");
        }

        Ok(GenerateOutcome::Generated(GeneratedMigration {
            number,
            filename,
            down_filename: down_name,
            sql,
            down_sql,
            changes,
            initial,
            dry_run: options.dry_run,
        }))
    }

    fn parse_schema(&self, path: &Path, source: &str) -> Result<Schema> {
        self.parser
            .parse(source)
            .map_err(|e| MigrateError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })
    }

    // ------------------------------------------------------------------
    // run
    // ------------------------------------------------------------------

    /// Applies pending migrations in ascending order.
    pub async fn run(&self, options: RunOptions) -> Result<RunOutcome> {
        let url = self.config.require_database_url()?;
        let files = self.store.list().await?;

        let mut db = Database::connect(url).await?;
        let result = self.run_on(db.connection(), &files, &options).await;
        db.disconnect().await;
        result
    }

    async fn run_on(
        &self,
        conn: &mut AnyConnection,
        files: &[MigrationFile],
        options: &RunOptions,
    ) -> Result<RunOutcome> {
        let ledger_exists = if options.dry_run {
            self.ledger.exists(conn).await?
        } else {
            self.ledger.ensure_table(conn).await?;
            true
        };

        let (applied, current) = if ledger_exists {
            (
                self.ledger.applied(conn).await?,
                self.ledger.current_version(conn).await?,
            )
        } else {
            (Vec::new(), 0)
        };
        verify_checksums(&applied, files, options.force)?;

        let mut pending: Vec<&MigrationFile> = files
            .iter()
            .filter(|f| f.number > current)
            .filter(|f| options.target.map_or(true, |target| f.number <= target))
            .collect();
        if options.single {
            pending.truncate(1);
        }

        if let Some(target) = options.target {
            if target < current {
                warn!(target, current, "Target is below the current version, use rollback");
            }
        }

        let warnings: Vec<LintWarning> = pending
            .iter()
            .flat_map(|f| lint_statements(&f.filename, &split_statements(&f.content)))
            .collect();

        if options.bootstrap {
            return self
                .bootstrap(conn, files, current, options, warnings)
                .await;
        }

        if options.dry_run {
            for file in &pending {
                info!(migration = %file.filename, "Would apply migration");
            }
            return Ok(RunOutcome {
                applied: pending.iter().map(|f| f.number).collect(),
                current,
                dry_run: true,
                warnings,
                bootstrapped: false,
            });
        }

        if pending.is_empty() {
            info!(current, "No pending migrations");
        }

        let executor = MigrationExecutor::new(&self.ledger);
        let mut done = Vec::with_capacity(pending.len());
        for file in pending {
            if let Err(e) = executor.apply(conn, file).await {
                return Err(MigrateError::RunFailed {
                    applied: done,
                    failed: file.filename.clone(),
                    source: Box::new(e),
                });
            }
            done.push(file.number);
        }

        Ok(RunOutcome {
            applied: done,
            current: self.ledger.current_version(conn).await?,
            dry_run: false,
            warnings,
            bootstrapped: false,
        })
    }

    async fn bootstrap(
        &self,
        conn: &mut AnyConnection,
        files: &[MigrationFile],
        current: u32,
        options: &RunOptions,
        warnings: Vec<LintWarning>,
    ) -> Result<RunOutcome> {
        if current != 0 || options.target.is_some() || options.single {
            return Err(MigrateError::InvalidState(
                "bootstrap requires an empty ledger and no --target or --single".to_string(),
            ));
        }
        let snapshot = self
            .store
            .read_snapshot_sql()
            .await?
            .ok_or_else(|| MigrateError::MissingMigrationFile(SNAPSHOT_SQL.to_string()))?;

        let numbers: Vec<u32> = files.iter().map(|f| f.number).collect();
        let latest = numbers.last().copied().unwrap_or(0);

        if options.dry_run {
            info!(migrations = numbers.len(), "Would bootstrap from snapshot");
            return Ok(RunOutcome {
                applied: numbers,
                current,
                dry_run: true,
                warnings,
                bootstrapped: true,
            });
        }

        MigrationExecutor::new(&self.ledger)
            .bootstrap(conn, &snapshot, files)
            .await?;

        Ok(RunOutcome {
            applied: numbers,
            current: latest,
            dry_run: false,
            warnings,
            bootstrapped: true,
        })
    }

    // ------------------------------------------------------------------
    // status
    // ------------------------------------------------------------------

    /// Reports applied and pending migrations.
    ///
    /// Connection failures produce a disconnected report instead of an
    /// error.
    pub async fn status(&self) -> Result<StatusReport> {
        let url = self.config.require_database_url()?;
        let files = self.store.list().await?;

        let mut db = match Database::connect(url).await {
            Ok(db) => db,
            Err(e) => {
                warn!(error = %e, "Database unreachable");
                return Ok(StatusReport::disconnected(e.to_string()));
            }
        };
        let result = self.status_on(&mut db, &files).await;
        db.disconnect().await;
        result
    }

    async fn status_on(&self, db: &mut Database, files: &[MigrationFile]) -> Result<StatusReport> {
        if let Err(e) = db.ping().await {
            warn!(error = %e, "Database health check failed");
            return Ok(StatusReport::disconnected(e.to_string()));
        }

        let conn = db.connection();
        let ledger_exists = self.ledger.exists(conn).await?;
        let (applied, current) = if ledger_exists {
            (
                self.ledger.applied(conn).await?,
                self.ledger.current_version(conn).await?,
            )
        } else {
            (Vec::new(), 0)
        };

        let by_number: HashMap<u32, &MigrationFile> =
            files.iter().map(|f| (f.number, f)).collect();
        let applied_numbers: BTreeSet<u32> = applied.iter().map(|m| m.number).collect();

        let mut report = StatusReport {
            connected: true,
            error: None,
            ledger_exists,
            current,
            ..StatusReport::default()
        };

        for migration in applied {
            let file = by_number.get(&migration.number);
            let file_present = file.is_some();
            let checksum_ok = file.is_some_and(|f| f.checksum == migration.checksum);
            if !file_present {
                report.missing_files.push(migration.filename.clone());
            } else if !checksum_ok {
                report.checksum_mismatches.push(migration.filename.clone());
            }
            report.applied.push(AppliedEntry {
                number: migration.number,
                filename: migration.filename,
                checksum: migration.checksum,
                applied_at: migration.applied_at,
                checksum_ok,
                file_present,
            });
        }

        report.pending = files
            .iter()
            .filter(|f| !applied_numbers.contains(&f.number))
            .map(|f| PendingEntry {
                number: f.number,
                filename: f.filename.clone(),
            })
            .collect();

        debug!(
            current,
            applied = report.applied.len(),
            pending = report.pending.len(),
            "Collected status"
        );
        Ok(report)
    }

    // ------------------------------------------------------------------
    // rollback
    // ------------------------------------------------------------------

    /// Reverts applied migrations above the target, newest first.
    pub async fn rollback(&self, options: RollbackOptions) -> Result<RollbackOutcome> {
        let url = self.config.require_database_url()?;
        let files = self.store.list().await?;

        let mut db = Database::connect(url).await?;
        let result = self.rollback_on(db.connection(), &files, &options).await;
        db.disconnect().await;
        result
    }

    async fn rollback_on(
        &self,
        conn: &mut AnyConnection,
        files: &[MigrationFile],
        options: &RollbackOptions,
    ) -> Result<RollbackOutcome> {
        if !self.ledger.exists(conn).await? {
            info!("No ledger table, nothing to roll back");
            return Ok(RollbackOutcome {
                dry_run: options.dry_run,
                ..RollbackOutcome::default()
            });
        }

        let applied = self.ledger.applied(conn).await?;
        let current = self.ledger.current_version(conn).await?;
        verify_checksums(&applied, files, options.force)?;

        let target = options.target.unwrap_or(0);
        let mut plan = Vec::new();
        for migration in applied.iter().rev().filter(|m| m.number > target) {
            let down = self
                .store
                .read_down(migration.number)
                .await?
                .ok_or_else(|| MigrateError::NotReversible(migration.filename.clone()))?;
            plan.push((migration, down));
        }

        if plan.is_empty() {
            info!(current, target, "Nothing to roll back");
        }

        if options.dry_run {
            for (migration, _) in &plan {
                info!(migration = %migration.filename, "Would roll back migration");
            }
            return Ok(RollbackOutcome {
                reverted: plan.iter().map(|(m, _)| m.number).collect(),
                current,
                dry_run: true,
            });
        }

        let executor = MigrationExecutor::new(&self.ledger);
        let mut reverted = Vec::with_capacity(plan.len());
        for (migration, down) in plan {
            if let Err(e) = executor
                .revert(conn, migration.number, &migration.filename, &down)
                .await
            {
                return Err(MigrateError::RollbackFailed {
                    reverted,
                    failed: migration.filename.clone(),
                    source: Box::new(e),
                });
            }
            reverted.push(migration.number);
        }

        Ok(RollbackOutcome {
            reverted,
            current: self.ledger.current_version(conn).await?,
            dry_run: false,
        })
    }
}

/// Replays `changes` onto `previous` and requires the result to match
/// `desired`.
fn check_convergence(
    differ: &Differ<'_>,
    previous: &Schema,
    desired: &Schema,
    changes: &[Change],
) -> Result<()> {
    let mut state = SchemaState::from_schema(previous.clone());
    state.apply_all(changes)?;
    let residual = differ.compare(state.schema(), desired);
    if residual.is_empty() {
        return Ok(());
    }

    let descriptions: Vec<&str> = residual.iter().map(|c| c.description.as_str()).collect();
    Err(SchemaError::InvalidState(format!(
        "generated changes do not converge, remaining: {}",
        descriptions.join("; ")
    ))
    .into())
}

/// Compares ledger checksums with the files on disk.
fn verify_checksums(
    applied: &[AppliedMigration],
    files: &[MigrationFile],
    force: bool,
) -> Result<()> {
    for migration in applied {
        if !is_valid_checksum(&migration.checksum) {
            return Err(MigrateError::InvalidChecksum {
                number: migration.number,
                checksum: migration.checksum.clone(),
            });
        }

        let Some(file) = files.iter().find(|f| f.number == migration.number) else {
            warn!(migration = %migration.filename, "Applied migration file is missing");
            continue;
        };

        if file.checksum != migration.checksum {
            if force {
                warn!(migration = %file.filename, "Checksum mismatch ignored (--force)");
            } else {
                return Err(MigrateError::ChecksumMismatch {
                    filename: file.filename.clone(),
                    expected: migration.checksum.clone(),
                    actual: file.checksum.clone(),
                });
            }
        }
    }
    Ok(())
}
