use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Local, Offset};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use mantra_cli::commands::{add, conflicts, list, maintenance, resolve, status, sync, util};
use mantra_cli::{Cli, Commands, Config, Engine};
use mantra_core::ConflictEngine;

/// Load config and open the engine, ensuring the database directory exists.
fn open_engine(config_path: Option<&Path>) -> Result<(Engine, Config)> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    let db = mantra_db::Database::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))?;
    let engine = ConflictEngine::with_system_clock(db, config.retention.policy());
    Ok((engine, config))
}

fn parse_optional(value: Option<&str>) -> Result<Option<chrono::DateTime<chrono::Utc>>> {
    value.map(util::parse_datetime).transpose()
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let Some(command) = &cli.command else {
        use clap::CommandFactory;
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let (engine, config) = open_engine(cli.config.as_deref())?;
    let offset = Local::now().offset().fix();
    let mut stdout = std::io::stdout().lock();

    match command {
        Commands::Add {
            name,
            duration,
            calories,
            at,
        } => {
            let args = add::AddArgs {
                name: name.clone(),
                duration_minutes: *duration,
                calories: *calories,
                start_time: util::parse_datetime(at)?,
            };
            add::run(&mut stdout, &engine, args, offset)?;
        }
        Commands::List { from, to, json } => {
            let window = list::Window {
                from: parse_optional(from.as_deref())?,
                to: parse_optional(to.as_deref())?,
            };
            list::run(&mut stdout, &engine, window, *json, offset)?;
        }
        Commands::Conflicts { json } => conflicts::run(&mut stdout, &engine, *json, offset)?,
        Commands::Resolve { group, keep } => resolve::run(&mut stdout, &engine, group, *keep)?,
        Commands::Delete { id } => resolve::delete(&mut stdout, &engine, *id)?,
        Commands::Sync { file } => {
            let runtime = tokio::runtime::Runtime::new().context("failed to start runtime")?;
            match file {
                Some(path) => {
                    let source = sync::file_source(path, &config.source);
                    runtime.block_on(sync::run(&mut stdout, &engine, &source))?;
                }
                None => {
                    let source = sync::http_source(&config.source)?;
                    runtime.block_on(sync::run(&mut stdout, &engine, &source))?;
                }
            }
        }
        Commands::Cleanup => maintenance::cleanup(&mut stdout, &engine)?,
        Commands::Detect => maintenance::detect(&mut stdout, &engine)?,
        Commands::Status => status::run(&mut stdout, &engine, &config.database_path, offset)?,
    }

    Ok(())
}
