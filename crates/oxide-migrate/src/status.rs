//! Migration status report.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// An applied migration as seen in the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedEntry {
    /// Migration number.
    pub number: u32,
    /// Migration filename.
    pub filename: String,
    /// Checksum recorded in the ledger.
    pub checksum: String,
    /// When the migration was applied.
    pub applied_at: DateTime<Utc>,
    /// Whether the file on disk still matches the recorded checksum.
    pub checksum_ok: bool,
    /// Whether the file still exists.
    pub file_present: bool,
}

/// A migration file that hasn't been applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingEntry {
    /// Migration number.
    pub number: u32,
    /// Migration filename.
    pub filename: String,
}

/// Combined view of migration files and the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct StatusReport {
    /// Whether the database could be reached.
    pub connected: bool,
    /// Connection error when `connected` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Whether the ledger table exists.
    pub ledger_exists: bool,
    /// Highest applied migration number, 0 when none.
    pub current: u32,
    /// Applied migrations, ascending.
    pub applied: Vec<AppliedEntry>,
    /// Migration files above the current version, ascending.
    pub pending: Vec<PendingEntry>,
    /// Filenames whose content changed since they were applied.
    pub checksum_mismatches: Vec<String>,
    /// Applied migrations whose file is gone.
    pub missing_files: Vec<String>,
}

impl StatusReport {
    /// Report for a database that could not be reached.
    #[must_use]
    pub fn disconnected(error: impl Into<String>) -> Self {
        Self {
            connected: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Returns `true` when nothing is pending and every applied file is intact.
    #[must_use]
    pub fn is_up_to_date(&self) -> bool {
        self.connected
            && self.pending.is_empty()
            && self.checksum_mismatches.is_empty()
            && self.missing_files.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disconnected() {
        let report = StatusReport::disconnected("connection refused");
        assert!(!report.connected);
        assert!(!report.is_up_to_date());
        assert_eq!(report.current, 0);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["connected"], false);
        assert_eq!(json["error"], "connection refused");
        assert!(json["pending"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_up_to_date() {
        let report = StatusReport {
            connected: true,
            ledger_exists: true,
            current: 1,
            ..StatusReport::default()
        };
        assert!(report.is_up_to_date());
        assert!(serde_json::to_value(&report).unwrap().get("error").is_none());
    }
}
