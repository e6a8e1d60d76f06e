//! Error types for the migration manager.

use std::path::PathBuf;

use oxide_schema::SchemaError;

/// Errors that can occur during migration operations.
#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    /// Malformed or incomplete configuration. Reported before any I/O.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The schema failed validation or could not be rendered.
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// The schema source could not be parsed.
    #[error("Failed to parse schema file '{path}': {message}")]
    Parse {
        /// Path to the schema source.
        path: PathBuf,
        /// Parser message.
        message: String,
    },

    /// A file could not be read or written.
    #[error("Failed to access '{path}': {source}")]
    FileAccess {
        /// Path of the file.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// The database connection could not be established.
    #[error("Failed to connect to '{url}': {source}")]
    Connection {
        /// Connection URL with the password redacted.
        url: String,
        /// Underlying database error.
        source: sqlx::Error,
    },

    /// The ledger table could not be created.
    #[error("Failed to create ledger table '{table}': {source}")]
    LedgerBootstrap {
        /// Ledger table name.
        table: String,
        /// Underlying database error.
        source: sqlx::Error,
    },

    /// A statement of a migration file failed.
    #[error("Statement {index} of '{migration}' failed: {source}\n{sql}")]
    Statement {
        /// Migration filename.
        migration: String,
        /// 1-based statement index within the file.
        index: usize,
        /// The failing SQL.
        sql: String,
        /// Underlying database error.
        source: sqlx::Error,
    },

    /// Database error outside of statement execution.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An applied migration file changed on disk.
    #[error(
        "Checksum mismatch for '{filename}': ledger has {expected}, file has {actual} (use --force to ignore)"
    )]
    ChecksumMismatch {
        /// Migration filename.
        filename: String,
        /// Checksum recorded in the ledger.
        expected: String,
        /// Checksum of the file on disk.
        actual: String,
    },

    /// A ledger checksum is not a SHA-256 hex digest.
    #[error("Invalid checksum '{checksum}' recorded for migration {number:04}")]
    InvalidChecksum {
        /// Migration number.
        number: u32,
        /// The recorded value.
        checksum: String,
    },

    /// A required migration artifact is missing.
    #[error("Migration file not found: {0}")]
    MissingMigrationFile(String),

    /// An applied migration has no down file.
    #[error("Migration '{0}' is not reversible (no down file)")]
    NotReversible(String),

    /// Migration file already exists.
    #[error("Migration file already exists: {0}")]
    MigrationExists(PathBuf),

    /// No migrations directory found.
    #[error("Migrations directory not found: {0}")]
    MigrationsDirNotFound(PathBuf),

    /// A migration number is not recorded in the ledger.
    #[error("Migration {0:04} is not recorded in the ledger")]
    MigrationNotFound(u32),

    /// Invalid migration state.
    #[error("Invalid migration state: {0}")]
    InvalidState(String),

    /// A run stopped part-way. Migrations listed in `applied` stay committed.
    #[error(
        "Migration '{failed}' failed and was rolled back; {} earlier migration(s) remain applied, database state preserved: {source}",
        .applied.len()
    )]
    RunFailed {
        /// Numbers committed by this run before the failure.
        applied: Vec<u32>,
        /// Filename of the failing migration.
        failed: String,
        /// The failure.
        source: Box<MigrateError>,
    },

    /// A rollback stopped part-way. Migrations listed in `reverted` stay reverted.
    #[error(
        "Rollback of '{failed}' failed and was undone; {} migration(s) already reverted, database state preserved: {source}",
        .reverted.len()
    )]
    RollbackFailed {
        /// Numbers reverted by this rollback before the failure.
        reverted: Vec<u32>,
        /// Filename of the migration whose rollback failed.
        failed: String,
        /// The failure.
        source: Box<MigrateError>,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A pattern failed to compile.
    #[error("Invalid pattern: {0}")]
    Regex(#[from] regex::Error),
}

/// Result type for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
