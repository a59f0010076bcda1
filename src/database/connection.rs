use rusqlite::{Connection, OpenFlags};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

use crate::common::errors::{ResetError, Result};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Ways of opening a database, tried in declaration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStrategy {
    /// Read-write with a busy timeout and write-ahead logging
    Wal,
    /// Read-write, never creates the file
    ReadWrite,
    /// Library defaults
    Plain,
}

impl ConnectionStrategy {
    pub const ALL: [ConnectionStrategy; 3] = [
        ConnectionStrategy::Wal,
        ConnectionStrategy::ReadWrite,
        ConnectionStrategy::Plain,
    ];

    fn open(self, path: &Path) -> rusqlite::Result<Connection> {
        match self {
            ConnectionStrategy::Wal => {
                let conn = Connection::open_with_flags(
                    path,
                    OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
                )?;
                conn.busy_timeout(BUSY_TIMEOUT)?;
                let mode: String =
                    conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
                tracing::trace!(path = %path.display(), journal_mode = %mode, "Journal mode set");
                Ok(conn)
            }
            ConnectionStrategy::ReadWrite => {
                Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_WRITE)
            }
            ConnectionStrategy::Plain => Connection::open(path),
        }
    }
}

impl std::fmt::Display for ConnectionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionStrategy::Wal => write!(f, "wal"),
            ConnectionStrategy::ReadWrite => write!(f, "read-write"),
            ConnectionStrategy::Plain => write!(f, "plain"),
        }
    }
}

/// The query every strategy must answer before it is accepted
fn probe(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row("SELECT count(*) FROM sqlite_master", [], |row| row.get(0))
}

/// Open a database with the first strategy whose connection passes the probe
pub fn open_database(path: &Path) -> Result<(Connection, ConnectionStrategy)> {
    if !path.is_file() {
        return Err(ResetError::io(
            path,
            std::io::Error::new(std::io::ErrorKind::NotFound, "database file not found"),
        ));
    }

    for strategy in ConnectionStrategy::ALL {
        let attempt = strategy.open(path).and_then(|conn| {
            probe(&conn)?;
            Ok(conn)
        });

        match attempt {
            Ok(conn) => {
                tracing::debug!(path = %path.display(), strategy = %strategy, "Database opened");
                return Ok((conn, strategy));
            }
            Err(e) => {
                tracing::debug!(
                    path = %path.display(),
                    strategy = %strategy,
                    error = %e,
                    "Connection strategy failed"
                );
            }
        }
    }

    Err(ResetError::DatabaseUnavailable {
        path: path.to_path_buf(),
    })
}
