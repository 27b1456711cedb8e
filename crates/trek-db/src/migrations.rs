//! An ordered set of migrations and the traversals that apply or revert them.
//!
//! Versions are applied in ascending order and rolled back in descending
//! order. Each migration runs in its own transaction together with the
//! tracking-table update, so a migration and its "applied" record commit or
//! roll back as one unit. A failure stops the run; migrations committed
//! before it stay applied.

use std::collections::HashSet;

use tracing::{debug, info, warn};
use trek_common::{Error, Result, Step, Version};

use crate::driver::Driver;
use crate::executor::{Database, Executor, Transaction};
use crate::migration::Migration;

#[derive(Debug, Clone, Default)]
pub struct Migrations {
    // Kept sorted by version, ascending.
    items: Vec<Migration>,
}

/// What a traversal did, in traversal order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Versions applied by `migrate`, or reverted by `rollback`.
    pub executed: Vec<Version>,
    /// Versions left alone because they were already in the wanted state.
    pub skipped: Vec<Version>,
}

impl MigrationReport {
    pub fn is_noop(&self) -> bool {
        self.executed.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    pub version: Version,
    pub name: String,
    pub applied: bool,
}

impl Migrations {
    /// Build a set, rejecting two migrations with the same version.
    pub fn new(mut migrations: Vec<Migration>) -> Result<Self> {
        migrations.sort_by(|a, b| a.version().cmp(b.version()));

        if let Some(pair) = migrations
            .windows(2)
            .find(|pair| pair[0].version() == pair[1].version())
        {
            return Err(Error::DuplicateVersion {
                version: pair[0].version().clone(),
                first: pair[0].name().to_string(),
                second: pair[1].name().to_string(),
            });
        }

        Ok(Self { items: migrations })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn ascending(&self) -> impl DoubleEndedIterator<Item = &Migration> {
        self.items.iter()
    }

    pub fn descending(&self) -> impl Iterator<Item = &Migration> {
        self.items.iter().rev()
    }

    pub fn get(&self, version: &Version) -> Option<&Migration> {
        self.items
            .binary_search_by(|m| m.version().cmp(version))
            .ok()
            .map(|index| &self.items[index])
    }

    /// Apply every migration that has not run yet, oldest first.
    pub fn migrate<D: Database>(&self, driver: &dyn Driver, db: &mut D) -> Result<MigrationReport> {
        let mut report = MigrationReport::default();

        for migration in self.ascending() {
            let version = migration.version();
            if is_applied(driver, &*db, version)? {
                debug!(%version, name = migration.name(), "already applied, skipping");
                report.skipped.push(version.clone());
                continue;
            }

            run_in_transaction(db, version, migration.up(), |tx| {
                driver.record_applied(tx, version)
            })?;
            info!(%version, name = migration.name(), "applied migration");
            report.executed.push(version.clone());
        }

        info!(
            applied = report.executed.len(),
            skipped = report.skipped.len(),
            "migrate finished"
        );
        Ok(report)
    }

    /// Roll back the `steps` newest migrations of the set, newest first.
    /// Members of that window that were never applied are skipped. `0` means
    /// every migration.
    ///
    /// A migration without down statements is still unmarked.
    pub fn rollback<D: Database>(
        &self,
        driver: &dyn Driver,
        db: &mut D,
        steps: usize,
    ) -> Result<MigrationReport> {
        let window = if steps == 0 { self.len() } else { steps.min(self.len()) };
        let mut report = MigrationReport::default();

        for migration in self.descending().take(window) {
            let version = migration.version();
            if !is_applied(driver, &*db, version)? {
                debug!(%version, name = migration.name(), "not applied, skipping");
                report.skipped.push(version.clone());
                continue;
            }

            run_in_transaction(db, version, migration.down(), |tx| {
                driver.record_unapplied(tx, version)
            })?;
            info!(%version, name = migration.name(), "rolled back migration");
            report.executed.push(version.clone());
        }

        info!(
            rolled_back = report.executed.len(),
            skipped = report.skipped.len(),
            "rollback finished"
        );
        Ok(report)
    }

    /// Applied state of every migration, oldest first.
    pub fn status(&self, driver: &dyn Driver, conn: &dyn Executor) -> Result<Vec<MigrationStatus>> {
        let applied: HashSet<Version> = driver.applied_versions(conn)?.into_iter().collect();

        Ok(self
            .ascending()
            .map(|m| MigrationStatus {
                version: m.version().clone(),
                name: m.name().to_string(),
                applied: applied.contains(m.version()),
            })
            .collect())
    }
}

fn is_applied(driver: &dyn Driver, conn: &dyn Executor, version: &Version) -> Result<bool> {
    driver
        .is_applied(conn, version)
        .map_err(|e| Error::Execution {
            version: version.clone(),
            step: Step::Lookup,
            message: message_of(e),
        })
}

/// Execute `statements` then `record` in one transaction.
fn run_in_transaction<D, F>(db: &mut D, version: &Version, statements: &[String], record: F) -> Result<()>
where
    D: Database,
    F: FnOnce(&dyn Executor) -> Result<()>,
{
    let fail = |step: Step, e: Error| Error::Execution {
        version: version.clone(),
        step,
        message: message_of(e),
    };

    let tx = db.begin().map_err(|e| fail(Step::Begin, e))?;

    for (index, sql) in statements.iter().enumerate() {
        debug!(%version, statement = index + 1, "executing statement");
        if let Err(e) = tx.run(sql) {
            abort(tx, version);
            return Err(fail(Step::Statement(index), e));
        }
    }

    if let Err(e) = record(&tx) {
        abort(tx, version);
        return Err(fail(Step::Record, e));
    }

    tx.commit().map_err(|e| fail(Step::Commit, e))
}

fn abort<T: Transaction>(tx: T, version: &Version) {
    if let Err(e) = tx.rollback() {
        warn!(%version, "rollback after failed migration also failed: {e}");
    }
}

fn message_of(e: Error) -> String {
    match e {
        Error::Database(message) => message,
        other => other.to_string(),
    }
}
