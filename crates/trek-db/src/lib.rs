//! Versioned SQL migrations: parsing, ordering, and per-migration
//! transactional execution through engine-specific drivers.

pub mod driver;
pub mod executor;
pub mod loader;
pub mod migration;
pub mod migrations;
pub mod orchestrator;
pub mod scaffold;

pub use driver::{Driver, MySqlDriver, PostgresDriver, SqliteDriver, driver_for};
pub use executor::{Database, Executor, Transaction, open_sqlite, open_sqlite_in_memory};
pub use loader::load_migrations;
pub use migration::Migration;
pub use migrations::{MigrationReport, MigrationStatus, Migrations};
pub use orchestrator::{migrate, rollback, status};
