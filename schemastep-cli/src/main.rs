//! Command line runner for schemastep migrations.
//!
//! ```text
//! schemastep --folder db --database-url sqlite://app.db reset --yes
//! schemastep update --target 12
//! schemastep status
//! ```

mod config;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use schemastep::registry::Registry;
use schemastep::{
    Backend, MigrationReport, MigrationTarget, Migrator, Phase, VersionRecord, VersionStore,
};
use tracing_subscriber::EnvFilter;

use crate::config::{FileConfig, Overrides, Settings};

#[derive(Parser)]
#[command(name = "schemastep")]
#[command(about = "Move a SQL database between numbered schema versions")]
#[command(version)]
struct Cli {
    /// Folder holding base.sql and migrations/{up,down}
    #[arg(long, env = "SCHEMASTEP_FOLDER", global = true)]
    folder: Option<PathBuf>,

    /// Database connection URL (sqlite://, postgres://, mysql://)
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// Path to a TOML config file [default: schemastep.toml if present]
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Name of the table holding the version record
    #[arg(long, global = true)]
    version_table: Option<String>,

    /// Log filter, e.g. "info" or "schemastep=debug" (overrides RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply up migrations
    Up {
        /// Stop after this version (default: latest)
        #[arg(long, value_parser = version_arg)]
        target: Option<u32>,
        /// Continue past an interrupted migration
        #[arg(long)]
        force: bool,
    },
    /// Apply down migrations
    Down {
        /// Stop after this version
        #[arg(long, value_parser = version_arg)]
        target: u32,
        /// Continue past an interrupted migration
        #[arg(long)]
        force: bool,
    },
    /// Migrate up or down towards a target
    Update {
        /// Version to reach (default: latest)
        #[arg(long, value_parser = version_arg)]
        target: Option<u32>,
        /// Continue past an interrupted migration
        #[arg(long)]
        force: bool,
    },
    /// Drop the database, rebuild it from base.sql and migrate up
    Reset {
        /// Stop after this version (default: latest)
        #[arg(long, value_parser = version_arg)]
        target: Option<u32>,
        /// Confirm that the database may be dropped
        #[arg(long)]
        yes: bool,
    },
    /// Show the recorded version and status
    Status,
    /// Create the version table if it is missing
    CreateVersion,
    /// Create the database server-side if it does not exist
    Prepare,
}

fn version_arg(value: &str) -> Result<u32, String> {
    schemastep::parse_version(value).map_err(|e| e.to_string())
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref())?;

    let file = FileConfig::load(cli.config.as_deref())?;
    let settings = Settings::resolve(
        Overrides {
            folder: cli.folder,
            database_url: cli.database_url,
            version_table: cli.version_table,
        },
        file,
        |key| std::env::var(key).ok(),
    );
    tracing::debug!(
        folder = %settings.folder.display(),
        version_table = %settings.options.version_table,
        "Resolved settings"
    );
    let database_url = settings.require_database_url()?;
    let registry = Registry::with_defaults();

    let connect = || registry.connect(database_url, &settings.options);
    let open = || -> Result<Migrator<Box<dyn Backend>>, schemastep::Error> {
        let target = MigrationTarget::new(&settings.folder)?;
        Ok(Migrator::new(connect()?, target).on_progress(print_progress))
    };

    match cli.command {
        Commands::Up { target, force } => print_report(&open()?.up(target, force)?),
        Commands::Down { target, force } => print_report(&open()?.down(target, force)?),
        Commands::Update { target, force } => print_report(&open()?.update(target, force)?),
        Commands::Reset { target, yes } => {
            if !yes {
                return Err("reset drops the database; pass --yes to confirm".into());
            }
            print_report(&open()?.reset(target)?);
        }
        Commands::Status => print_status(&connect()?.get_version()?),
        Commands::CreateVersion => {
            connect()?.create_version_table()?;
            println!("Version table '{}' is ready.", settings.options.version_table);
        }
        Commands::Prepare => {
            registry.prepare_environment(database_url)?;
            println!("Database is ready.");
        }
    }
    Ok(())
}

fn init_logging(level: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let filter = match level {
        Some(level) => EnvFilter::try_new(level)
            .map_err(|e| format!("invalid --log-level '{}': {}", level, e))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn print_progress(phase: Phase, version: u32) {
    println!("{:>8} {}", phase, version);
}

fn print_status(record: &VersionRecord) {
    println!("Database is at {}.", record);
    if record.status.is_partial() {
        println!("A migration was interrupted. Repair the schema, then re-run with --force.");
    }
}

fn print_report(report: &MigrationReport) {
    if report.migrations_run.is_empty() {
        println!("Nothing to do; database is at {}.", report.starting_version);
        return;
    }
    let applied = report
        .migrations_run
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    println!(
        "Migrated {} from {} to version {} ({} step{}: {}).",
        report.direction,
        report.starting_version,
        report.final_version(),
        report.migrations_run.len(),
        if report.migrations_run.len() == 1 { "" } else { "s" },
        applied
    );
}
