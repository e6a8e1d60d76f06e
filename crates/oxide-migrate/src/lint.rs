//! Advisory checks for destructive statements in migration files.
//!
//! Lint findings are reported as warnings before a run and never block it.

use std::fmt;

use serde::Serialize;
use tracing::warn;

/// A destructive statement pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LintRule {
    /// `DELETE FROM` without a `WHERE` clause.
    DeleteWithoutWhere,
    /// `UPDATE` without a `WHERE` clause.
    UpdateWithoutWhere,
    /// `DROP DATABASE`.
    DropDatabase,
    /// `DROP SCHEMA`.
    DropSchema,
    /// `TRUNCATE`.
    Truncate,
}

impl LintRule {
    /// Returns a human-readable explanation.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::DeleteWithoutWhere => "DELETE without WHERE removes every row",
            Self::UpdateWithoutWhere => "UPDATE without WHERE rewrites every row",
            Self::DropDatabase => "DROP DATABASE destroys the whole database",
            Self::DropSchema => "DROP SCHEMA destroys every object in the schema",
            Self::Truncate => "TRUNCATE removes every row",
        }
    }
}

impl fmt::Display for LintRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// A lint finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LintWarning {
    /// Migration filename.
    pub migration: String,
    /// 1-based statement index within the file.
    pub statement: usize,
    /// The rule that matched.
    pub rule: LintRule,
    /// Explanation.
    pub message: String,
}

impl fmt::Display for LintWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (statement {}): {}",
            self.migration, self.statement, self.message
        )
    }
}

/// Checks one statement.
#[must_use]
pub fn lint_statement(sql: &str) -> Option<LintRule> {
    let tokens: Vec<String> = sql
        .split(|c: char| c.is_whitespace() || c == '(' || c == ')' || c == ',')
        .filter(|t| !t.is_empty())
        .map(str::to_ascii_uppercase)
        .collect();
    let has_where = tokens.iter().any(|t| t == "WHERE");

    match tokens.first().map(String::as_str) {
        Some("DELETE") if !has_where => Some(LintRule::DeleteWithoutWhere),
        Some("UPDATE") if !has_where => Some(LintRule::UpdateWithoutWhere),
        Some("TRUNCATE") => Some(LintRule::Truncate),
        Some("DROP") => match tokens.get(1).map(String::as_str) {
            Some("DATABASE") => Some(LintRule::DropDatabase),
            Some("SCHEMA") => Some(LintRule::DropSchema),
            _ => None,
        },
        _ => None,
    }
}

/// Checks the statements of one migration file and logs each finding.
#[must_use]
pub fn lint_statements(migration: &str, statements: &[String]) -> Vec<LintWarning> {
    statements
        .iter()
        .enumerate()
        .filter_map(|(index, sql)| {
            lint_statement(sql).map(|rule| {
                warn!(migration, statement = index + 1, rule = ?rule, "{}", rule.message());
                LintWarning {
                    migration: migration.to_string(),
                    statement: index + 1,
                    rule,
                    message: rule.message().to_string(),
                }
            })
        })
        .collect()
}
