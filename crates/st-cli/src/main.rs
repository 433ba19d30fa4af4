use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use st_cli::commands::{clear, export, import, report, run, status};
use st_cli::{Cli, Commands, Config};

/// Load config and open database, ensuring the parent directory exists.
fn open_database(config_path: Option<&Path>) -> Result<(st_db::Database, Config)> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    let db = st_db::Database::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))?;
    Ok((db, config))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Logs go to stderr so report and export output stays clean
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let mut stdout = io::stdout().lock();

    match &cli.command {
        Some(Commands::Run) => {
            let (db, config) = open_database(cli.config.as_deref())?;
            let store = Arc::new(st_db::SqliteStore::new(db));
            // Ticks are processed on a single cooperative timeline
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .context("failed to start async runtime")?;
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            runtime.block_on(run::run(store, &config, stdin))?;
        }
        Some(Commands::Report { json }) => {
            let (db, config) = open_database(cli.config.as_deref())?;
            let metrics = config
                .metrics_engine()
                .context("invalid site classification")?;
            report::run(&mut stdout, &db, &metrics, *json)?;
        }
        Some(Commands::Status) => {
            let (db, config) = open_database(cli.config.as_deref())?;
            status::run(&mut stdout, &db, &config)?;
        }
        Some(Commands::Clear) => {
            let (db, _config) = open_database(cli.config.as_deref())?;
            clear::run(&mut stdout, &db)?;
        }
        Some(Commands::Import { path }) => {
            let (mut db, _config) = open_database(cli.config.as_deref())?;
            let summary = match path {
                Some(path) => {
                    let file = File::open(path)
                        .with_context(|| format!("failed to open {}", path.display()))?;
                    import::run(BufReader::new(file), &mut db)?
                }
                None => import::run(io::stdin().lock(), &mut db)?,
            };
            writeln!(
                stdout,
                "Imported {} site(s), skipped {}.",
                summary.imported, summary.skipped
            )?;
        }
        Some(Commands::Export) => {
            let (db, _config) = open_database(cli.config.as_deref())?;
            export::run(&mut stdout, &db)?;
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
