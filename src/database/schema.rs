//! Structural heuristics over an unknown database schema.
//!
//! Table and column names cannot be bound as SQL parameters, so every name
//! is checked with [`is_safe_identifier`] before it is quoted into a query.
//! Names that fail the check are dropped here and never reach SQL text.

use lazy_static::lazy_static;
use regex::Regex;
use rusqlite::Connection;
use serde::Serialize;

lazy_static! {
    static ref SAFE_IDENTIFIER: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
}

/// Tables checked before falling back to every user table
pub const PRIORITY_TABLES: &[&str] = &["ItemTable", "Settings", "Preferences", "Config", "Configuration"];

const KEY_HINTS: &[&str] = &["key", "name", "id", "setting"];
const VALUE_HINTS: &[&str] = &["value", "data", "content"];

/// A table with a recognised key/value column pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableDescriptor {
    pub table: String,
    pub key_column: String,
    pub value_column: String,
}

pub fn is_safe_identifier(name: &str) -> bool {
    SAFE_IDENTIFIER.is_match(name)
}

/// Quote a validated identifier for SQL text
pub fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier)
}

/// User tables with safe names, sorted
pub fn user_tables(conn: &Connection) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;

    Ok(names
        .into_iter()
        .filter(|name| !name.to_lowercase().starts_with("sqlite_"))
        .filter(|name| {
            let safe = is_safe_identifier(name);
            if !safe {
                tracing::warn!(table = %name, "Skipping table with unsafe name");
            }
            safe
        })
        .collect())
}

/// Safe column names of a table, in declaration order.
/// An unsafe table name yields no columns.
pub fn table_columns(conn: &Connection, table: &str) -> rusqlite::Result<Vec<String>> {
    if !is_safe_identifier(table) {
        return Ok(Vec::new());
    }

    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote(table)))?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<rusqlite::Result<Vec<String>>>()?;

    Ok(columns.into_iter().filter(|c| is_safe_identifier(c)).collect())
}

/// Pick the key/value pair of a table from its column names.
///
/// Exact `key` and `value` columns win. Otherwise the first column whose
/// name contains a key hint is the key column, and the first other column
/// containing a value hint is the value column.
pub fn match_columns(table: &str, columns: &[String]) -> Option<TableDescriptor> {
    let columns: Vec<&String> = columns.iter().filter(|c| is_safe_identifier(c)).collect();

    let exact_key = columns.iter().find(|c| c.eq_ignore_ascii_case("key"));
    let exact_value = columns.iter().find(|c| c.eq_ignore_ascii_case("value"));
    if let (Some(key), Some(value)) = (exact_key, exact_value) {
        return Some(TableDescriptor {
            table: table.to_string(),
            key_column: key.to_string(),
            value_column: value.to_string(),
        });
    }

    let contains_any = |name: &str, hints: &[&str]| {
        let lower = name.to_lowercase();
        hints.iter().any(|h| lower.contains(h))
    };

    let key = columns.iter().find(|c| contains_any(c.as_str(), KEY_HINTS))?;
    let value = columns
        .iter()
        .find(|c| *c != key && contains_any(c.as_str(), VALUE_HINTS))?;

    Some(TableDescriptor {
        table: table.to_string(),
        key_column: key.to_string(),
        value_column: value.to_string(),
    })
}

pub fn describe_table(conn: &Connection, table: &str) -> rusqlite::Result<Option<TableDescriptor>> {
    let columns = table_columns(conn, table)?;
    Ok(match_columns(table, &columns))
}

/// Key/value tables eligible for identifier mutation.
///
/// Priority tables are tried first; only when none of them yields a
/// descriptor is every user table inspected.
pub fn relevant_tables(conn: &Connection) -> rusqlite::Result<Vec<TableDescriptor>> {
    let tables = user_tables(conn)?;

    let mut found = Vec::new();
    for priority in PRIORITY_TABLES {
        if let Some(table) = tables.iter().find(|t| t.eq_ignore_ascii_case(priority)) {
            if let Some(descriptor) = describe_table(conn, table)? {
                found.push(descriptor);
            }
        }
    }
    if !found.is_empty() {
        return Ok(found);
    }

    for table in &tables {
        if let Some(descriptor) = describe_table(conn, table)? {
            found.push(descriptor);
        }
    }
    Ok(found)
}
