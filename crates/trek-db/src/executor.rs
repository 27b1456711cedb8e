use std::path::Path;

use rusqlite::{Connection, params_from_iter};
use tracing::info;
use trek_common::{Error, Result};

/// Runs SQL against a connection or an open transaction.
pub trait Executor {
    /// Execute a parameterised statement, returning the number of rows changed.
    fn execute(&self, sql: &str, params: &[&str]) -> Result<usize>;

    /// Run a parameterised query whose first column of the first row is an integer.
    fn query_i64(&self, sql: &str, params: &[&str]) -> Result<i64>;

    /// Run a single migration statement verbatim.
    fn run(&self, sql: &str) -> Result<()>;

    /// Collect the first column of every row as text.
    fn query_strings(&self, sql: &str) -> Result<Vec<String>>;
}

/// A transaction handle. Dropping it without committing must roll back.
pub trait Transaction: Executor {
    fn commit(self) -> Result<()>;
    fn rollback(self) -> Result<()>;
}

/// A connection that can open transactions.
pub trait Database: Executor {
    type Tx<'a>: Transaction
    where
        Self: 'a;

    fn begin(&mut self) -> Result<Self::Tx<'_>>;
}

/// Open a SQLite database file.
pub fn open_sqlite(path: &Path) -> Result<Connection> {
    info!("opening sqlite database at {}", path.display());
    let conn = Connection::open(path)
        .map_err(|e| Error::Database(format!("failed to open database: {e}")))?;
    configure(&conn)?;
    Ok(conn)
}

pub fn open_sqlite_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()
        .map_err(|e| Error::Database(format!("failed to open in-memory database: {e}")))?;
    configure(&conn)?;
    Ok(conn)
}

fn configure(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys=ON;")
        .map_err(|e| Error::Database(format!("failed to set pragmas: {e}")))
}

fn db_err(e: rusqlite::Error) -> Error {
    Error::Database(e.to_string())
}

fn sqlite_execute(conn: &Connection, sql: &str, params: &[&str]) -> Result<usize> {
    conn.execute(sql, params_from_iter(params.iter()))
        .map_err(db_err)
}

fn sqlite_query_i64(conn: &Connection, sql: &str, params: &[&str]) -> Result<i64> {
    conn.query_row(sql, params_from_iter(params.iter()), |row| row.get(0))
        .map_err(db_err)
}

fn sqlite_query_strings(conn: &Connection, sql: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(sql).map_err(db_err)?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(db_err)?;
    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(db_err)
}

// `execute_batch` tolerates leading comments and statements that return rows
// (e.g. PRAGMA), which `execute` rejects.
fn sqlite_run(conn: &Connection, sql: &str) -> Result<()> {
    conn.execute_batch(sql).map_err(db_err)
}

impl Executor for Connection {
    fn execute(&self, sql: &str, params: &[&str]) -> Result<usize> {
        sqlite_execute(self, sql, params)
    }

    fn query_i64(&self, sql: &str, params: &[&str]) -> Result<i64> {
        sqlite_query_i64(self, sql, params)
    }

    fn run(&self, sql: &str) -> Result<()> {
        sqlite_run(self, sql)
    }

    fn query_strings(&self, sql: &str) -> Result<Vec<String>> {
        sqlite_query_strings(self, sql)
    }
}

impl Executor for rusqlite::Transaction<'_> {
    fn execute(&self, sql: &str, params: &[&str]) -> Result<usize> {
        sqlite_execute(self, sql, params)
    }

    fn query_i64(&self, sql: &str, params: &[&str]) -> Result<i64> {
        sqlite_query_i64(self, sql, params)
    }

    fn run(&self, sql: &str) -> Result<()> {
        sqlite_run(self, sql)
    }

    fn query_strings(&self, sql: &str) -> Result<Vec<String>> {
        sqlite_query_strings(self, sql)
    }
}

impl Transaction for rusqlite::Transaction<'_> {
    fn commit(self) -> Result<()> {
        rusqlite::Transaction::commit(self).map_err(db_err)
    }

    fn rollback(self) -> Result<()> {
        rusqlite::Transaction::rollback(self).map_err(db_err)
    }
}

impl Database for Connection {
    type Tx<'a>
        = rusqlite::Transaction<'a>
    where
        Self: 'a;

    fn begin(&mut self) -> Result<Self::Tx<'_>> {
        self.transaction().map_err(db_err)
    }
}
