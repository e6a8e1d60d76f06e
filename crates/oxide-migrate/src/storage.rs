//! Migration file storage.
//!
//! All artifacts live in a single migrations directory:
//!
//! - `NNNN.sql` - numbered migrations (four digits, zero padded)
//! - `NNNN.down.sql` - the reverse of migration `NNNN`
//! - `snapshot.sql` - the full schema rendered as SQL
//! - `snapshot.<ext>` - a copy of the schema source the last migration was
//!   generated from

use std::path::{Path, PathBuf};

use regex::Regex;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::{MigrateError, Result};

const MIGRATION_PATTERN: &str = r"^(\d{4})\.sql$";

/// Highest number a four-digit migration file name can carry.
pub const MAX_MIGRATION_NUMBER: u32 = 9999;

/// Reserved name of the rendered-SQL snapshot.
pub const SNAPSHOT_SQL: &str = "snapshot.sql";

/// A numbered migration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFile {
    /// Migration number.
    pub number: u32,
    /// File name, e.g. `0003.sql`.
    pub filename: String,
    /// Full path.
    pub path: PathBuf,
    /// SQL content.
    pub content: String,
    /// SHA-256 of the content, lowercase hex.
    pub checksum: String,
}

/// Returns the file name of migration `number`.
#[must_use]
pub fn migration_filename(number: u32) -> String {
    format!("{number:04}.sql")
}

/// Returns the file name of the down file of migration `number`.
#[must_use]
pub fn down_filename(number: u32) -> String {
    format!("{number:04}.down.sql")
}

/// Calculates the SHA-256 checksum of migration content.
#[must_use]
pub fn checksum(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Returns `true` for a 64-character lowercase hex digest.
#[must_use]
pub fn is_valid_checksum(value: &str) -> bool {
    value.len() == 64
        && value
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
}

/// Reads and writes migration artifacts in one directory.
#[derive(Debug, Clone)]
pub struct MigrationStore {
    dir: PathBuf,
    schema_extension: String,
    pattern: Regex,
}

impl MigrationStore {
    /// Creates a store over `dir`. `schema_extension` names the schema
    /// snapshot file (`snapshot.<ext>`).
    pub fn new(dir: impl Into<PathBuf>, schema_extension: &str) -> Result<Self> {
        Ok(Self {
            dir: dir.into(),
            schema_extension: schema_extension.to_string(),
            pattern: Regex::new(MIGRATION_PATTERN)?,
        })
    }

    /// Returns the migrations directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the name of the schema snapshot file.
    #[must_use]
    pub fn snapshot_schema_name(&self) -> String {
        format!("snapshot.{}", self.schema_extension)
    }

    /// Returns the full path of a file in the directory.
    #[must_use]
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Returns `true` if the file exists.
    pub async fn exists(&self, name: &str) -> Result<bool> {
        Ok(tokio::fs::try_exists(self.path(name)).await?)
    }

    /// Reads a file.
    pub async fn read(&self, name: &str) -> Result<String> {
        let path = self.path(name);
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| MigrateError::FileAccess { path, source })
    }

    /// Reads a file, returning `None` when it doesn't exist.
    pub async fn read_optional(&self, name: &str) -> Result<Option<String>> {
        if self.exists(name).await? {
            self.read(name).await.map(Some)
        } else {
            Ok(None)
        }
    }

    /// Writes a file, creating the directory if needed.
    pub async fn write(&self, name: &str, content: &str) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| MigrateError::FileAccess {
                path: self.dir.clone(),
                source,
            })?;
        let path = self.path(name);
        debug!(path = %path.display(), bytes = content.len(), "Writing file");
        tokio::fs::write(&path, content)
            .await
            .map_err(|source| MigrateError::FileAccess { path, source })
    }

    /// Parses a migration number from a file name. Down files, snapshots
    /// and anything else return `None`.
    #[must_use]
    pub fn parse_filename(&self, filename: &str) -> Option<u32> {
        self.pattern
            .captures(filename)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
    }

    /// Lists numbered migrations in ascending order.
    ///
    /// A missing directory yields an empty list.
    pub async fn list(&self) -> Result<Vec<MigrationFile>> {
        if !tokio::fs::try_exists(&self.dir).await? {
            return Ok(Vec::new());
        }

        let mut entries =
            tokio::fs::read_dir(&self.dir)
                .await
                .map_err(|source| MigrateError::FileAccess {
                    path: self.dir.clone(),
                    source,
                })?;

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let filename = entry.file_name().to_string_lossy().into_owned();
            let Some(number) = self.parse_filename(&filename) else {
                if filename.ends_with(".sql")
                    && filename != SNAPSHOT_SQL
                    && !filename.ends_with(".down.sql")
                {
                    warn!(filename = %filename, "Skipping malformed migration file name");
                }
                continue;
            };

            let content = self.read(&filename).await?;
            files.push(MigrationFile {
                number,
                checksum: checksum(&content),
                path: entry.path(),
                filename,
                content,
            });
        }

        files.sort_by_key(|f| f.number);
        Ok(files)
    }

    /// Returns the number the next generated migration gets.
    pub async fn next_number(&self) -> Result<u32> {
        let last = self.list().await?.last().map_or(0, |f| f.number);
        if last >= MAX_MIGRATION_NUMBER {
            return Err(MigrateError::InvalidState(format!(
                "migration numbers exhausted: {} is the last available",
                migration_filename(MAX_MIGRATION_NUMBER)
            )));
        }
        Ok(last + 1)
    }

    /// Reads the schema snapshot source, if any.
    pub async fn read_snapshot_schema(&self) -> Result<Option<String>> {
        self.read_optional(&self.snapshot_schema_name()).await
    }

    /// Reads the rendered-SQL snapshot, if any.
    pub async fn read_snapshot_sql(&self) -> Result<Option<String>> {
        self.read_optional(SNAPSHOT_SQL).await
    }

    /// Rewrites both snapshot files.
    pub async fn write_snapshot(&self, schema_source: &str, sql: &str) -> Result<()> {
        self.write(&self.snapshot_schema_name(), schema_source)
            .await?;
        self.write(SNAPSHOT_SQL, sql).await
    }

    /// Reads the down file of a migration, if any.
    pub async fn read_down(&self, number: u32) -> Result<Option<String>> {
        self.read_optional(&down_filename(number)).await
    }
}
