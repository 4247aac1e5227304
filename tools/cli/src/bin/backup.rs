//! drivekeep-backup - upload today's emoncms backup archive.
//!
//! Meant to run from cron once a day. Every outcome is reported as a
//! single line on stdout and the process exits successfully.

use anyhow::Result;
use chrono::{Local, NaiveDate};
use clap::Parser;
use std::path::PathBuf;
use tracing::{debug, Level};

use drivekeep_cli::backup;
use drivekeep_cli::setup::{init_logging, load_config};
use drivekeep_common::AppConfig;

#[derive(Parser)]
#[command(name = "drivekeep-backup")]
#[command(about = "drivekeep-backup - Upload the daily backup archive to Google Drive")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// JSON config file overriding the built-in defaults.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Archive date (YYYY-MM-DD); defaults to today in local time.
    #[arg(short, long)]
    date: Option<NaiveDate>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_logging(level)?;

    let config = load_config(cli.config.as_deref(), AppConfig::for_backup())?;
    let today = cli.date.unwrap_or_else(|| Local::now().date_naive());
    debug!(%today, root = %config.backup_root.display(), "Starting backup run");

    let outcome = backup::run(&config, today, drivekeep_storage::connect).await;
    println!("{}", backup::report(&outcome));

    Ok(())
}
