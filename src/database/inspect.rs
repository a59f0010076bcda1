use rusqlite::types::ValueRef;
use rusqlite::Connection;
use serde::Serialize;
use std::path::{Path, PathBuf};

use super::connection::{open_database, ConnectionStrategy};
use super::schema::{self, quote, TableDescriptor};
use crate::common::errors::{ResetError, Result};

const SAMPLE_ROWS: usize = 10;

/// Read-only view of what the sanitizer and mutator would see in a file
#[derive(Debug, Clone, Serialize)]
pub struct DatabaseInspection {
    pub path: PathBuf,
    pub strategy: ConnectionStrategy,
    pub tables: Vec<String>,
    pub relevant: Vec<TableSample>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableSample {
    pub descriptor: TableDescriptor,
    pub row_count: i64,
    pub rows: Vec<(String, String)>,
}

pub fn inspect_database(path: &Path) -> Result<DatabaseInspection> {
    let (conn, strategy) = open_database(path)?;

    let tables = schema::user_tables(&conn).map_err(|e| ResetError::database(path, e))?;
    let descriptors = schema::relevant_tables(&conn).map_err(|e| ResetError::database(path, e))?;

    let mut relevant = Vec::with_capacity(descriptors.len());
    for descriptor in descriptors {
        let sample = sample_table(&conn, descriptor).map_err(|e| ResetError::database(path, e))?;
        relevant.push(sample);
    }

    Ok(DatabaseInspection {
        path: path.to_path_buf(),
        strategy,
        tables,
        relevant,
    })
}

fn sample_table(conn: &Connection, descriptor: TableDescriptor) -> rusqlite::Result<TableSample> {
    let table = quote(&descriptor.table);

    let row_count: i64 =
        conn.query_row(&format!("SELECT count(*) FROM {}", table), [], |row| row.get(0))?;

    let sql = format!(
        "SELECT {}, {} FROM {} LIMIT {}",
        quote(&descriptor.key_column),
        quote(&descriptor.value_column),
        table,
        SAMPLE_ROWS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| {
            Ok((render(row.get_ref(0)?), render(row.get_ref(1)?)))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(TableSample {
        descriptor,
        row_count,
        rows,
    })
}

fn render(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => "NULL".to_string(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) => String::from_utf8_lossy(t).to_string(),
        ValueRef::Blob(b) => match std::str::from_utf8(b) {
            Ok(text) => text.to_string(),
            Err(_) => format!("<{} bytes>", b.len()),
        },
    }
}
