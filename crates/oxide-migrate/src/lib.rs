//! Schema-driven database migrations.
//!
//! `oxide-migrate` keeps a database in step with a declarative schema file.
//! Instead of hand-writing migrations, you edit the schema and let the
//! engine diff it against the last snapshot:
//!
//! - Each `generate` writes the next numbered SQL file (`0001.sql`,
//!   `0002.sql`, ...) plus its reverse (`0001.down.sql`)
//! - Each `run` applies pending files in ascending order, one transaction
//!   per migration, recording them in a ledger table
//! - `status` compares the files with the ledger
//! - `rollback` reverts applied migrations using their down files
//!
//! # Architecture
//!
//! - **Parser** - Reads the desired schema ([`parser::SchemaParser`])
//! - **Storage** - Migration files and snapshots on disk
//! - **Ledger** - The table recording applied migrations
//! - **Executor** - Transactional application of migration files
//! - **Manager** - The generate/run/status/rollback operations
//!
//! Schema modelling, diffing and SQL rendering live in `oxide-schema`.
//!
//! # Example
//!
//! ```rust,no_run
//! use oxide_migrate::prelude::*;
//!
//! # async fn example() -> oxide_migrate::Result<()> {
//! let config = MigrateConfig::default()
//!     .with_database_url("sqlite://app.db?mode=rwc")
//!     .with_dialect(Dialect::Sqlite);
//! let manager = MigrationManager::new(config, JsonSchemaParser)?;
//!
//! manager.generate(GenerateOptions::default()).await?;
//! let outcome = manager.run(RunOptions::default()).await?;
//! println!("now at version {}", outcome.current);
//! # Ok(())
//! # }
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Diff schema.json against the snapshot and write the next migration
//! oxide-migrate generate --name "add users"
//!
//! # Apply pending migrations
//! oxide-migrate run
//!
//! # Show migration status
//! oxide-migrate status --verbose
//!
//! # Revert everything above version 2
//! oxide-migrate rollback --to 2
//! ```

pub mod config;
pub mod database;
pub mod error;
pub mod executor;
pub mod history;
pub mod lint;
pub mod manager;
pub mod parser;
pub mod statements;
pub mod status;
pub mod storage;

pub use error::{MigrateError, Result};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::config::{MigrateConfig, PoolConfig};
    pub use crate::database::Database;
    pub use crate::error::{MigrateError, Result};
    pub use crate::executor::MigrationExecutor;
    pub use crate::history::{AppliedMigration, MigrationLedger};
    pub use crate::lint::{LintRule, LintWarning};
    pub use crate::manager::{
        GenerateOptions, GenerateOutcome, GeneratedMigration, MigrationManager, RollbackOptions,
        RollbackOutcome, RunOptions, RunOutcome,
    };
    pub use crate::parser::{JsonSchemaParser, SchemaParser};
    pub use crate::status::{AppliedEntry, PendingEntry, StatusReport};
    pub use crate::storage::{MigrationFile, MigrationStore};
    pub use oxide_schema::dialect::Dialect;
}
