//! trek CLI
//!
//! Applies and rolls back versioned SQL migrations.

use clap::Parser;
use trek_config::ConfigLoader;

mod cli;
mod commands;
mod logging;

use cli::{Cli, Commands};
use commands::Settings;

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = ConfigLoader::load(cli.global.config.as_deref())?;
    logging::init(
        cli.global.verbose,
        cli.global.log_json || config.logging.json,
        config.logging.level.as_deref(),
    );

    let settings = Settings::resolve(&config, &cli.global);
    match cli.command {
        Commands::Migrate => commands::migrate(&settings),
        Commands::Rollback(args) => commands::rollback(&settings, args.steps),
        Commands::Status => commands::status(&settings),
        Commands::New(args) => commands::new(&settings, &args.name).map(|_| ()),
    }
}
