// ABOUTME: Entry point for the charsheet binary.
// ABOUTME: Initializes tracing, opens the configured store, runs migrations, and handles maintenance commands.

use std::path::PathBuf;

use anyhow::Context;
use charsheet_core::builtin_migrations;
use charsheet_store::{KeyValueStore, Persistence, PersistenceConfig, load_dump, save_dump};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "charsheet")]
#[command(about = "Maintenance tooling for the charsheet store")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Print the store version and the record count of every table.
    Status,
    /// Write every table to a JSON dump file.
    Dump { path: PathBuf },
    /// Replace the store contents with a previously written dump, then
    /// migrate it to the current version.
    Restore { path: PathBuf },
    /// Empty every table, keeping the master index.
    DropAll,
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(
                    "charsheet=debug,charsheet_store=debug,charsheet_core=debug",
                )
            }),
        )
        .init();

    let cli = Cli::parse();

    let config = PersistenceConfig::from_env().context("loading configuration")?;
    tracing::info!("charsheet starting with {:?}", config.backend);

    let mut db = Persistence::open(config).context("opening store")?;
    migrate(&mut db)?;

    match cli.command.unwrap_or(Command::Status) {
        Command::Status => status(&db)?,
        Command::Dump { path } => {
            let dump = db.dump()?;
            save_dump(&path, &dump)
                .with_context(|| format!("writing dump to {}", path.display()))?;
            tracing::info!("wrote {} tables to {}", dump.tables.len(), path.display());
        }
        Command::Restore { path } => {
            let dump = load_dump(&path)
                .with_context(|| format!("reading dump from {}", path.display()))?;
            db.restore_dump(&dump)?;
            // The dump may predate the current record shapes
            migrate(&mut db)?;
            status(&db)?;
        }
        Command::DropAll => {
            db.drop_all()?;
            status(&db)?;
        }
    }

    Ok(())
}

fn migrate<S: KeyValueStore + 'static>(db: &mut Persistence<S>) -> anyhow::Result<()> {
    let report = db.migrate(&builtin_migrations(), env!("CARGO_PKG_VERSION"))?;
    if !report.is_up_to_date() {
        tracing::warn!("store left at {:?} after a failed migration", report.from);
    }
    Ok(())
}

fn status<S: KeyValueStore>(db: &Persistence<S>) -> anyhow::Result<()> {
    tracing::info!(
        "store version {}",
        db.version()?.as_deref().unwrap_or("(none)")
    );
    for table in db.tables()? {
        tracing::info!("table {}: {} records", table, db.count(&table)?);
    }
    Ok(())
}
