//! Configuration.
//!
//! Settings come from a JSON file (`oxide-migrate.json` by default). Every
//! field is optional; command-line flags and `DATABASE_URL` override file
//! values. [`MigrateConfig::validate`] runs before any I/O.

use std::path::{Path, PathBuf};

use oxide_schema::dialect::Dialect;
use oxide_schema::extension::ExtensionRegistry;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{MigrateError, Result};

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "oxide-migrate.json";

/// Default ledger table name.
pub const DEFAULT_LEDGER_TABLE: &str = "oxide_schema_migrations";

const IDENTIFIER_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_]*$";

/// Connection pool settings.
///
/// Migrations always run over a single connection; these values are accepted
/// and carried but not used by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum number of pooled connections.
    pub max_connections: u32,
    /// Seconds to wait for a pooled connection.
    pub acquire_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 5,
            acquire_timeout_secs: 30,
        }
    }
}

/// Migration engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MigrateConfig {
    /// Database connection URL.
    pub database_url: Option<String>,
    /// Path of the schema source file.
    pub schema_path: PathBuf,
    /// Directory holding migration files and snapshots.
    pub migrations_dir: PathBuf,
    /// Target SQL dialect.
    pub dialect: Dialect,
    /// Name of the ledger table.
    pub ledger_table: String,
    /// Enabled extension packs.
    pub extensions: Vec<String>,
    /// Pool settings (unused).
    pub pool: PoolConfig,
}

impl Default for MigrateConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            schema_path: PathBuf::from("schema.json"),
            migrations_dir: PathBuf::from("migrations"),
            dialect: Dialect::default(),
            ledger_table: DEFAULT_LEDGER_TABLE.to_string(),
            extensions: Vec::new(),
            pool: PoolConfig::default(),
        }
    }
}

impl MigrateConfig {
    /// Loads a configuration file.
    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| MigrateError::FileAccess {
                path: path.to_path_buf(),
                source,
            })?;
        serde_json::from_str(&content)
            .map_err(|e| MigrateError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Loads a configuration file, falling back to defaults when it doesn't
    /// exist.
    pub async fn load_or_default(path: &Path) -> Result<Self> {
        if tokio::fs::try_exists(path).await? {
            Self::load(path).await
        } else {
            Ok(Self::default())
        }
    }

    /// Sets the database URL.
    #[must_use]
    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }

    /// Sets the schema source path.
    #[must_use]
    pub fn with_schema_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.schema_path = path.into();
        self
    }

    /// Sets the migrations directory.
    #[must_use]
    pub fn with_migrations_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.migrations_dir = dir.into();
        self
    }

    /// Sets the dialect.
    #[must_use]
    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Checks the settings that don't depend on the command being run.
    ///
    /// `schema_extension` is the extension the schema parser accepts.
    pub fn validate(&self, schema_extension: &str) -> Result<()> {
        let identifier = Regex::new(IDENTIFIER_PATTERN)?;
        if !identifier.is_match(&self.ledger_table) {
            return Err(MigrateError::Config(format!(
                "ledger table '{}' is not a plain identifier",
                self.ledger_table
            )));
        }

        for name in &self.extensions {
            if ExtensionRegistry::builtin(name).is_none() {
                let known: Vec<_> = ExtensionRegistry::builtin_names().collect();
                return Err(MigrateError::Config(format!(
                    "unknown extension '{}' (known: {})",
                    name,
                    known.join(", ")
                )));
            }
        }

        let extension = self
            .schema_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        if !extension.eq_ignore_ascii_case(schema_extension) {
            return Err(MigrateError::Config(format!(
                "schema file '{}' must have the '.{}' extension",
                self.schema_path.display(),
                schema_extension
            )));
        }

        Ok(())
    }

    /// Returns the database URL, or a configuration error when it is unset
    /// or empty.
    pub fn require_database_url(&self) -> Result<&str> {
        match self.database_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => Ok(url),
            _ => Err(MigrateError::Config(
                "no database URL configured (set database_url, --database or DATABASE_URL)"
                    .to_string(),
            )),
        }
    }

    /// Builds the extension registry for the configured packs.
    pub fn extension_registry(&self) -> Result<ExtensionRegistry> {
        Ok(ExtensionRegistry::from_names(&self.extensions)?)
    }
}
