use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::info;
use trek_common::Engine;
use trek_config::AppConfig;
use trek_db::{Database, Migrations, driver_for, load_migrations, open_sqlite, scaffold};

use crate::cli::GlobalArgs;

/// Effective settings after command-line flags are laid over the config file.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub engine: Engine,
    pub database_url: String,
    pub migrations_dir: PathBuf,
    pub extension: String,
}

impl Settings {
    pub fn resolve(config: &AppConfig, global: &GlobalArgs) -> Self {
        Self {
            engine: global.engine.unwrap_or(config.database.engine),
            database_url: global
                .database_url
                .clone()
                .unwrap_or_else(|| config.database.url.clone()),
            migrations_dir: global
                .migrations_dir
                .clone()
                .unwrap_or_else(|| config.migrations.dir.clone()),
            extension: config.migrations.extension.clone(),
        }
    }
}

pub fn migrate(settings: &Settings) -> Result<()> {
    ensure_connectable(settings.engine)?;
    let migrations = load(settings)?;
    let driver = driver_for(settings.engine);
    let mut db = connect(settings)?;

    let report = trek_db::migrate(&mut db, driver.as_ref(), &migrations)?;
    if report.is_noop() {
        println!("Nothing to migrate.");
    }
    for version in &report.executed {
        println!("Applied {version}");
    }
    Ok(())
}

pub fn rollback(settings: &Settings, steps: usize) -> Result<()> {
    ensure_connectable(settings.engine)?;
    let migrations = load(settings)?;
    let driver = driver_for(settings.engine);
    let mut db = connect(settings)?;

    let report = trek_db::rollback(&mut db, driver.as_ref(), &migrations, steps)?;
    if report.is_noop() {
        println!("Nothing to roll back.");
    }
    for version in &report.executed {
        println!("Rolled back {version}");
    }
    Ok(())
}

pub fn status(settings: &Settings) -> Result<()> {
    ensure_connectable(settings.engine)?;
    let migrations = load(settings)?;
    let driver = driver_for(settings.engine);
    let db = connect(settings)?;

    let rows = trek_db::status(&db, driver.as_ref(), &migrations)?;
    if rows.is_empty() {
        println!("No migrations in {}", settings.migrations_dir.display());
    }
    for row in rows {
        let state = if row.applied { "applied" } else { "pending" };
        println!("{state:<8} {}  {}", row.version, row.name);
    }
    Ok(())
}

pub fn new(settings: &Settings, name: &str) -> Result<PathBuf> {
    let now = chrono::Utc::now().naive_utc();
    let path = scaffold::new_migration(&settings.migrations_dir, name, &settings.extension, now)?;
    println!("Created {}", path.display());
    Ok(path)
}

fn load(settings: &Settings) -> Result<Migrations> {
    load_migrations(&settings.migrations_dir, &settings.extension)
        .with_context(|| format!("failed to load migrations from {}", settings.migrations_dir.display()))
}

// Drivers exist for every engine, but this binary only links a SQLite client.
fn ensure_connectable(engine: Engine) -> Result<()> {
    if engine != Engine::Sqlite {
        bail!(trek_common::Error::Config(format!(
            "no {engine} connection support in this build; only sqlite databases can be migrated"
        )));
    }
    Ok(())
}

fn connect(settings: &Settings) -> Result<impl Database> {
    info!(engine = %settings.engine, "connecting to {}", settings.database_url);
    let conn = open_sqlite(Path::new(&settings.database_url))?;
    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use trek_db::Executor;

    fn settings(dir: &Path) -> Settings {
        Settings {
            engine: Engine::Sqlite,
            database_url: dir.join("db.sqlite").to_string_lossy().into_owned(),
            migrations_dir: dir.join("migrations"),
            extension: "sql".to_string(),
        }
    }

    fn write(settings: &Settings, filename: &str, sql: &str) {
        std::fs::create_dir_all(&settings.migrations_dir).unwrap();
        std::fs::write(settings.migrations_dir.join(filename), sql).unwrap();
    }

    fn tracked(settings: &Settings) -> i64 {
        open_sqlite(Path::new(&settings.database_url))
            .unwrap()
            .query_i64("SELECT COUNT(*) FROM database_versions", &[])
            .unwrap()
    }

    #[test]
    fn flags_override_config() {
        let mut config = AppConfig::default();
        config.database.url = "from-config.sqlite".into();
        config.migrations.extension = "up.sql".into();

        let global = GlobalArgs {
            database_url: Some("from-flag.sqlite".into()),
            ..Default::default()
        };
        let resolved = Settings::resolve(&config, &global);
        assert_eq!(resolved.database_url, "from-flag.sqlite");
        assert_eq!(resolved.migrations_dir, PathBuf::from("migrations"));
        assert_eq!(resolved.engine, Engine::Sqlite);
        assert_eq!(resolved.extension, "up.sql");
    }

    #[test]
    fn migrate_status_rollback_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(dir.path());
        write(
            &settings,
            "20240101000000_create_users.sql",
            "-- up\nCREATE TABLE users (username TEXT);\n-- down\nDROP TABLE users;\n",
        );
        write(
            &settings,
            "20240101000001_add_user.sql",
            "-- up\nINSERT INTO users VALUES ('a');\n-- down\nDELETE FROM users;\n",
        );

        migrate(&settings).unwrap();
        assert_eq!(tracked(&settings), 2);
        status(&settings).unwrap();

        rollback(&settings, 1).unwrap();
        assert_eq!(tracked(&settings), 1);

        rollback(&settings, 0).unwrap();
        assert_eq!(tracked(&settings), 0);
    }

    #[test]
    fn other_engines_are_refused_before_any_work() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = settings(dir.path());
        settings.engine = Engine::Postgres;

        let err = migrate(&settings).unwrap_err();
        assert!(err.to_string().contains("no postgres connection support"));
        assert!(!dir.path().join("db.sqlite").exists());
    }

    #[test]
    fn missing_migrations_dir_reports_context() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(dir.path());

        let err = migrate(&settings).unwrap_err();
        assert!(err.to_string().contains("failed to load migrations"));
    }

    #[test]
    fn new_creates_a_loadable_file() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(dir.path());

        let path = new(&settings, "create_users").unwrap();
        assert!(path.starts_with(&settings.migrations_dir));

        let set = load(&settings).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.ascending().next().unwrap().name(), "create_users");
    }
}
