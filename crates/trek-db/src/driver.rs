//! Per-engine bookkeeping of which migration versions have run.
//!
//! A driver only knows its engine's SQL dialect. Everything it does goes
//! through an [`Executor`], so the same driver works on a plain connection
//! and on a transaction opened by the migration traversal. Applied versions
//! live in a single-column `database_versions` table.

use trek_common::{Engine, Error, Result, Version};

use crate::executor::Executor;

pub trait Driver {
    fn name(&self) -> &'static str;

    /// Create the versions table if it does not exist yet.
    fn ensure_tracking_table(&self, conn: &dyn Executor) -> Result<()>;

    fn is_applied(&self, conn: &dyn Executor, version: &Version) -> Result<bool>;

    /// Record `version` as applied. `tx` is the transaction running the
    /// migration's own statements.
    fn record_applied(&self, tx: &dyn Executor, version: &Version) -> Result<()>;

    /// Forget `version`, inside the transaction running its down statements.
    fn record_unapplied(&self, tx: &dyn Executor, version: &Version) -> Result<()>;

    /// All recorded versions, ascending.
    fn applied_versions(&self, conn: &dyn Executor) -> Result<Vec<Version>>;
}

/// Return the driver for `engine`.
pub fn driver_for(engine: Engine) -> Box<dyn Driver> {
    match engine {
        Engine::Sqlite => Box::new(SqliteDriver),
        Engine::Postgres => Box::new(PostgresDriver),
        Engine::Mysql => Box::new(MySqlDriver),
    }
}

/// SQL text for the four tracking operations in one dialect.
struct Dialect {
    create: &'static str,
    count: &'static str,
    insert: &'static str,
    delete: &'static str,
}

const LIST_VERSIONS: &str = "SELECT version FROM database_versions ORDER BY version ASC";

fn driver_err(op: &'static str) -> impl Fn(Error) -> Error {
    move |e| match e {
        Error::Database(message) => Error::Driver { op, message },
        other => other,
    }
}

fn ensure_table(dialect: &Dialect, conn: &dyn Executor) -> Result<()> {
    conn.execute(dialect.create, &[])
        .map(|_| ())
        .map_err(driver_err("create versions table"))
}

fn has_run(dialect: &Dialect, conn: &dyn Executor, version: &Version) -> Result<bool> {
    let count = conn
        .query_i64(dialect.count, &[version.as_str()])
        .map_err(driver_err("version lookup"))?;
    Ok(count > 0)
}

fn list_versions(conn: &dyn Executor) -> Result<Vec<Version>> {
    let rows = conn
        .query_strings(LIST_VERSIONS)
        .map_err(driver_err("list versions"))?;
    Ok(rows.into_iter().map(Version::from_string).collect())
}

// Mark/unmark errors surface as plain database errors: the traversal attaches
// the migration version to them.
fn mark(dialect: &Dialect, tx: &dyn Executor, version: &Version) -> Result<()> {
    tx.execute(dialect.insert, &[version.as_str()]).map(|_| ())
}

fn unmark(dialect: &Dialect, tx: &dyn Executor, version: &Version) -> Result<()> {
    tx.execute(dialect.delete, &[version.as_str()]).map(|_| ())
}

macro_rules! dialect_driver {
    ($ty:ident, $name:literal, $dialect:ident) => {
        impl Driver for $ty {
            fn name(&self) -> &'static str {
                $name
            }

            fn ensure_tracking_table(&self, conn: &dyn Executor) -> Result<()> {
                ensure_table(&$dialect, conn)
            }

            fn is_applied(&self, conn: &dyn Executor, version: &Version) -> Result<bool> {
                has_run(&$dialect, conn, version)
            }

            fn record_applied(&self, tx: &dyn Executor, version: &Version) -> Result<()> {
                mark(&$dialect, tx, version)
            }

            fn record_unapplied(&self, tx: &dyn Executor, version: &Version) -> Result<()> {
                unmark(&$dialect, tx, version)
            }

            fn applied_versions(&self, conn: &dyn Executor) -> Result<Vec<Version>> {
                list_versions(conn)
            }
        }
    };
}

/// SQLite: numbered `?N` placeholders.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDriver;

const SQLITE: Dialect = Dialect {
    create: "CREATE TABLE IF NOT EXISTS database_versions (version TEXT NOT NULL)",
    count: "SELECT COUNT(*) FROM database_versions WHERE version = ?1",
    insert: "INSERT INTO database_versions (version) VALUES (?1)",
    delete: "DELETE FROM database_versions WHERE version = ?1",
};

dialect_driver!(SqliteDriver, "sqlite", SQLITE);

/// PostgreSQL: `$N` placeholders.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDriver;

const POSTGRES: Dialect = Dialect {
    create: "CREATE TABLE IF NOT EXISTS database_versions (version TEXT NOT NULL)",
    count: "SELECT COUNT(*) FROM database_versions WHERE version = $1",
    insert: "INSERT INTO database_versions (version) VALUES ($1)",
    delete: "DELETE FROM database_versions WHERE version = $1",
};

dialect_driver!(PostgresDriver, "postgres", POSTGRES);

/// MySQL: anonymous `?` placeholders, and TEXT columns cannot be compared
/// without a length, so the version is a VARCHAR.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDriver;

const MYSQL: Dialect = Dialect {
    create: "CREATE TABLE IF NOT EXISTS database_versions (version VARCHAR(255) NOT NULL)",
    count: "SELECT COUNT(*) FROM database_versions WHERE version = ?",
    insert: "INSERT INTO database_versions (version) VALUES (?)",
    delete: "DELETE FROM database_versions WHERE version = ?",
};

dialect_driver!(MySqlDriver, "mysql", MYSQL);
