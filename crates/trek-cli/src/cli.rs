//! CLI argument definitions using clap derive API

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use trek_common::Engine;

/// trek - apply and roll back versioned SQL migrations
#[derive(Parser, Debug)]
#[command(name = "trek")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command. Flags override the config file.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Config file (default: trek.yml, trek.yaml or trek.toml if present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Database engine: sqlite, postgres or mysql
    #[arg(long, global = true, env = "TREK_ENGINE")]
    pub engine: Option<Engine>,

    /// Database connection target (a file path for SQLite)
    #[arg(long, global = true, env = "TREK_DATABASE_URL")]
    pub database_url: Option<String>,

    /// Directory holding migration files
    #[arg(long, global = true, env = "TREK_MIGRATIONS_DIR")]
    pub migrations_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Apply all pending migrations
    Migrate,

    /// Roll back the most recent migrations
    Rollback(RollbackArgs),

    /// Show which migrations have been applied
    Status,

    /// Create a new, empty migration file
    New(NewArgs),
}

#[derive(Args, Debug)]
pub struct RollbackArgs {
    /// Number of migrations to roll back (0 rolls back everything)
    #[arg(short, long, default_value_t = 1)]
    pub steps: usize,
}

#[derive(Args, Debug)]
pub struct NewArgs {
    /// Migration name, e.g. create_users
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rollback_steps_and_globals() {
        let cli = Cli::try_parse_from([
            "trek",
            "rollback",
            "--steps",
            "3",
            "--engine",
            "sqlite",
            "--migrations-dir",
            "db/migrate",
        ])
        .unwrap();

        match cli.command {
            Commands::Rollback(args) => assert_eq!(args.steps, 3),
            other => panic!("unexpected command {other:?}"),
        }
        assert_eq!(cli.global.engine, Some(Engine::Sqlite));
        assert_eq!(cli.global.migrations_dir, Some(PathBuf::from("db/migrate")));
    }

    #[test]
    fn rollback_defaults_to_one_step() {
        let cli = Cli::try_parse_from(["trek", "rollback"]).unwrap();
        match cli.command {
            Commands::Rollback(args) => assert_eq!(args.steps, 1),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn unknown_engine_is_rejected() {
        assert!(Cli::try_parse_from(["trek", "--engine", "oracle", "migrate"]).is_err());
    }

    #[test]
    fn new_requires_a_name() {
        assert!(Cli::try_parse_from(["trek", "new"]).is_err());
        let cli = Cli::try_parse_from(["trek", "new", "create_users"]).unwrap();
        match cli.command {
            Commands::New(args) => assert_eq!(args.name, "create_users"),
            other => panic!("unexpected command {other:?}"),
        }
    }
}
