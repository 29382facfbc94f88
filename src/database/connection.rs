//! The SQLite file backing the tab info cache and page previews.

use std::path::Path;
use std::time::Duration;

use rusqlite::Connection;

use super::migrations;

/// How long a write waits on a lock held by another process sharing the file.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// A migrated connection to the tab info database.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens or creates the database file at `path`. Pending migrations run
    /// before this returns, so cached rows from older versions stay readable.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Self::migrated(conn)
    }

    /// A private database that lives as long as the value. Used by tests and the demo.
    pub fn open_in_memory() -> Result<Self, rusqlite::Error> {
        Self::migrated(Connection::open_in_memory()?)
    }

    fn migrated(conn: Connection) -> Result<Self, rusqlite::Error> {
        migrations::run_all(&conn)?;
        Ok(Self { conn })
    }

    /// Highest migration applied to this file.
    pub fn schema_version(&self) -> i32 {
        migrations::get_schema_version(&self.conn)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}
