//! Entry points tying a connection, a driver and a loaded migration set together.

use trek_common::Result;

use crate::driver::Driver;
use crate::executor::{Database, Executor};
use crate::migrations::{MigrationReport, MigrationStatus, Migrations};

/// Create the versions table if needed, then apply all pending migrations.
pub fn migrate<D: Database>(
    db: &mut D,
    driver: &dyn Driver,
    migrations: &Migrations,
) -> Result<MigrationReport> {
    driver.ensure_tracking_table(&*db)?;
    migrations.migrate(driver, db)
}

/// Create the versions table if needed, then roll back up to `steps`
/// migrations (`0` for all).
pub fn rollback<D: Database>(
    db: &mut D,
    driver: &dyn Driver,
    migrations: &Migrations,
    steps: usize,
) -> Result<MigrationReport> {
    driver.ensure_tracking_table(&*db)?;
    migrations.rollback(driver, db, steps)
}

pub fn status<E: Executor>(
    conn: &E,
    driver: &dyn Driver,
    migrations: &Migrations,
) -> Result<Vec<MigrationStatus>> {
    driver.ensure_tracking_table(conn)?;
    migrations.status(driver, conn)
}
