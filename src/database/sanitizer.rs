use rusqlite::{params, Transaction};
use serde::Serialize;
use std::path::Path;

use super::connection::open_database;
use super::schema::{self, quote};
use crate::common::config::CleaningOptions;
use crate::common::errors::{ResetError, Result};

/// Column name fragments that hold user or account identity
pub const IDENTITY_COLUMNS: &[&str] = &[
    "user_id",
    "account_id",
    "email",
    "username",
    "userid",
    "accountid",
];

/// What one sanitization pass changed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SanitizeOutcome {
    /// Tables emptied because their name matched a cache pattern
    pub tables_emptied: usize,
    pub rows_deleted: usize,
    /// Rows whose identity columns were blanked
    pub rows_blanked: usize,
    /// Statements that failed and were skipped
    pub statements_failed: usize,
}

impl SanitizeOutcome {
    pub fn rows_affected(&self) -> usize {
        self.rows_deleted + self.rows_blanked
    }
}

/// Remove keyword-matching rows and blank account columns in one transaction.
///
/// A statement that fails on one table is logged and skipped; the rest of
/// the file is still committed.
///
/// Tables whose lowercase name contains a cache-table pattern are emptied
/// outright. Other tables lose every row where any column matches
/// `%keyword%`, then identity columns are set to NULL (or `''` when the
/// column refuses NULL). The file is compacted when anything changed.
pub fn sanitize_database(path: &Path, options: &CleaningOptions) -> Result<SanitizeOutcome> {
    let (mut conn, _strategy) = open_database(path)?;

    let tx = conn.transaction().map_err(|e| ResetError::database(path, e))?;
    let outcome = sanitize_tables(&tx, options).map_err(|e| ResetError::database(path, e))?;
    tx.commit().map_err(|e| ResetError::database(path, e))?;

    if outcome.rows_affected() > 0 {
        if let Err(e) = conn.execute_batch("VACUUM") {
            tracing::warn!(path = %path.display(), error = %e, "VACUUM failed");
        }
    }

    tracing::info!(
        path = %path.display(),
        rows_deleted = outcome.rows_deleted,
        rows_blanked = outcome.rows_blanked,
        tables_emptied = outcome.tables_emptied,
        statements_failed = outcome.statements_failed,
        "Database sanitized"
    );
    Ok(outcome)
}

fn sanitize_tables(tx: &Transaction<'_>, options: &CleaningOptions) -> rusqlite::Result<SanitizeOutcome> {
    let mut outcome = SanitizeOutcome::default();
    let patterns: Vec<String> = options
        .cache_table_patterns
        .iter()
        .map(|p| p.to_lowercase())
        .filter(|p| !p.is_empty())
        .collect();

    for table in schema::user_tables(tx)? {
        let lower = table.to_lowercase();

        if patterns.iter().any(|p| lower.contains(p.as_str())) {
            match tx.execute(&format!("DELETE FROM {}", quote(&table)), []) {
                Ok(removed) => {
                    tracing::debug!(table = %table, rows = removed, "Emptied cache table");
                    outcome.tables_emptied += 1;
                    outcome.rows_deleted += removed;
                }
                Err(e) => {
                    tracing::warn!(table = %table, error = %e, "Failed to empty cache table");
                    outcome.statements_failed += 1;
                }
            }
            continue;
        }

        let columns = match schema::table_columns(tx, &table) {
            Ok(columns) => columns,
            Err(e) => {
                tracing::warn!(table = %table, error = %e, "Cannot read table columns, skipping");
                outcome.statements_failed += 1;
                continue;
            }
        };
        if columns.is_empty() {
            continue;
        }

        let condition = columns
            .iter()
            .map(|c| format!("{} LIKE ?1", quote(c)))
            .collect::<Vec<_>>()
            .join(" OR ");
        let delete_sql = format!("DELETE FROM {} WHERE {}", quote(&table), condition);

        for keyword in options.database_keywords.iter().filter(|k| !k.is_empty()) {
            match tx.execute(&delete_sql, params![format!("%{}%", keyword)]) {
                Ok(removed) => {
                    if removed > 0 {
                        tracing::debug!(table = %table, keyword = %keyword, rows = removed, "Deleted keyword rows");
                    }
                    outcome.rows_deleted += removed;
                }
                Err(e) => {
                    tracing::warn!(table = %table, keyword = %keyword, error = %e, "Keyword delete failed");
                    outcome.statements_failed += 1;
                }
            }
        }

        for column in columns.iter().filter(|c| is_identity_column(c)) {
            match blank_column(tx, &table, column) {
                Ok(rows) => outcome.rows_blanked += rows,
                Err(e) => {
                    tracing::warn!(table = %table, column = %column, error = %e, "Failed to blank column");
                    outcome.statements_failed += 1;
                }
            }
        }
    }

    Ok(outcome)
}

pub fn is_identity_column(column: &str) -> bool {
    let lower = column.to_lowercase();
    IDENTITY_COLUMNS.iter().any(|c| lower == *c || lower.contains(c))
}

/// Set a column to NULL, or to `''` when NULL is rejected
fn blank_column(tx: &Transaction<'_>, table: &str, column: &str) -> rusqlite::Result<usize> {
    let (table_q, column_q) = (quote(table), quote(column));

    let to_null = format!(
        "UPDATE {} SET {} = NULL WHERE {} IS NOT NULL",
        table_q, column_q, column_q
    );
    match tx.execute(&to_null, []) {
        Ok(rows) => Ok(rows),
        Err(e) => {
            tracing::debug!(table, column, error = %e, "NULL rejected, blanking with empty string");
            let to_empty = format!(
                "UPDATE {} SET {} = '' WHERE {} IS NOT NULL AND {} <> ''",
                table_q, column_q, column_q, column_q
            );
            tx.execute(&to_empty, [])
        }
    }
}
