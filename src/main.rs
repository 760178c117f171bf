use std::io;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use rbackup::commands::{self, Cli, Commands};
use rbackup::config::{ConfigPaths, ConfigStore};
use rbackup::{Error, logging, sysexits};

/// Entry point for the rbackup CLI application.
/// Parses command-line arguments and dispatches to the appropriate command handler.
fn main() -> Result<()> {
    let cli = Cli::parse();
    let paths = ConfigPaths::locate(cli.config, cli.targets_file);

    match cli.commands.unwrap_or_default() {
        Commands::Run { target, jobs } => {
            let store = load(&paths);
            let targets = store.targets.select(&target).unwrap_or_else(|e| fail(&e));
            let dispatch = logging::init(store.global.log_level, store.global.log_file.as_deref())
                .unwrap_or_else(|e| fail(&e));
            let summary = commands::run(store.global, targets, usize::from(jobs), dispatch)
                .context("Failed to start the backup runtime")?;
            let code = commands::summary_exit_code(&summary);
            if code != 0 {
                process::exit(code);
            }
        }
        Commands::Plan { target } => {
            let store = load(&paths);
            let targets = store.targets.select(&target).unwrap_or_else(|e| fail(&e));
            let failures = commands::plan(&store.global, &targets, &mut io::stdout().lock())
                .context("Failed to write the plan")?;
            if failures > 0 {
                process::exit(sysexits::EX_CONFIG);
            }
        }
        Commands::Config => {
            commands::config(&paths);
        }
    }
    Ok(())
}

/// Loads both configuration files, exiting on failure.
fn load(paths: &ConfigPaths) -> ConfigStore {
    ConfigStore::load(paths).unwrap_or_else(|e| fail(&e))
}

fn fail(err: &Error) -> ! {
    eprintln!("{err}");
    process::exit(commands::exit_code(err));
}
