//! Database connection.
//!
//! Migrations run over a single [`AnyConnection`], so one code path serves
//! every supported backend.

use sqlx::AnyConnection;
use sqlx::Connection;
use tracing::{debug, warn};

use crate::error::{MigrateError, Result};

/// Backend name sqlx reports for PostgreSQL.
pub const POSTGRES_BACKEND: &str = "PostgreSQL";

/// Backend name sqlx reports for SQLite.
pub const SQLITE_BACKEND: &str = "SQLite";

/// Hides the password of a connection URL.
#[must_use]
pub fn redact_url(url: &str) -> String {
    let Some(scheme_end) = url.find("://") else {
        return url.to_string();
    };
    let rest = &url[scheme_end + 3..];
    let authority_end = rest.find('/').unwrap_or(rest.len());
    let Some(at) = rest[..authority_end].rfind('@') else {
        return url.to_string();
    };
    let userinfo = &rest[..at];
    match userinfo.find(':') {
        Some(colon) => format!(
            "{}{}:***{}",
            &url[..scheme_end + 3],
            &userinfo[..colon],
            &rest[at..]
        ),
        None => url.to_string(),
    }
}

/// An open database connection.
pub struct Database {
    conn: AnyConnection,
    url: String,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("backend", &self.conn.backend_name())
            .field("url", &self.url)
            .finish()
    }
}

impl Database {
    /// Connects to the database at `url`.
    pub async fn connect(url: &str) -> Result<Self> {
        sqlx::any::install_default_drivers();

        let redacted = redact_url(url);
        debug!(url = %redacted, "Connecting to database");

        let conn = AnyConnection::connect(url)
            .await
            .map_err(|source| MigrateError::Connection {
                url: redacted.clone(),
                source,
            })?;

        Ok(Self {
            conn,
            url: redacted,
        })
    }

    /// Checks that the connection is alive.
    pub async fn ping(&mut self) -> Result<()> {
        self.conn
            .ping()
            .await
            .map_err(|source| MigrateError::Connection {
                url: self.url.clone(),
                source,
            })
    }

    /// Returns the backend name reported by the driver.
    #[must_use]
    pub fn backend_name(&self) -> &str {
        self.conn.backend_name()
    }

    /// Returns the connection URL with the password redacted.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the underlying connection.
    pub fn connection(&mut self) -> &mut AnyConnection {
        &mut self.conn
    }

    /// Closes the connection. A failed close is logged, not returned.
    pub async fn disconnect(self) {
        let url = self.url;
        if let Err(e) = self.conn.close().await {
            warn!(url = %url, error = %e, "Failed to close database connection");
        } else {
            debug!(url = %url, "Disconnected");
        }
    }
}
