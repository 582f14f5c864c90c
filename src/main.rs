use std::path::PathBuf;
use std::process::ExitCode;
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use reconcile::core::config::Config;
use reconcile::core::error::Result;
use reconcile::core::reconciler::Reconciler;

#[derive(Parser)]
#[command(name = "reconcile", about = "Reconcile catalog editions and works with archive items")]
struct Cli {
    /// TOML config file; defaults are used when absent
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load the archive dump and ingest the catalog dump into the staging database
    CreateDb,
    /// Build the redirect and mapping stores and resolve every id column
    ResolveRedirects,
    /// Write every backlink report
    AllReports,
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    let reconciler = Reconciler::new(config)?;

    match cli.command {
        Command::CreateDb => {
            let summary = reconciler.create_db()?;
            info!(
                "create-db: {} chunks, {} malformed lines, {} ia rows back-filled, {} cover isbns",
                summary.ingest.chunks, summary.ingest.malformed, summary.backfilled, summary.covers
            );
        }
        Command::ResolveRedirects => {
            let summary = reconciler.resolve_redirects()?;
            for (table, column, resolution) in &summary.columns {
                info!(
                    "{}.{}: {} ids, {} redirected, {} rows updated, {} cycles",
                    table, column, resolution.ids, resolution.redirected, resolution.rows_updated, resolution.cycles
                );
            }
            info!(
                "resolve-redirects: {} redirects, {} edition -> work pairs ({} conflicts), {} items linked",
                summary.redirects, summary.mapping.pairs, summary.mapping.conflicts, summary.relink.linked
            );
        }
        Command::AllReports => {
            for outcome in reconciler.all_reports()? {
                println!(
                    "{}\t{}\t{}",
                    outcome.path.display(),
                    outcome.count,
                    outcome.dedupe_count
                );
            }
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{}", err);
            eprintln!("reconcile: {}", err);
            ExitCode::from(1)
        }
    }
}
