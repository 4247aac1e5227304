//! drivekeep - interactive Google Drive file management.
//!
//! Presents a numbered menu for quota details, folder listings, uploads
//! and downloads against the account of a service-account credential.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, Level};

use drivekeep_cli::session::Session;
use drivekeep_cli::setup::{init_logging, load_config};
use drivekeep_common::{AppConfig, Error};

#[derive(Parser)]
#[command(name = "drivekeep")]
#[command(about = "drivekeep - Interactive Google Drive file management")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// JSON config file overriding the built-in defaults.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    init_logging(level)?;

    let config = load_config(cli.config.as_deref(), AppConfig::for_interactive())?;

    let catalog = match drivekeep_storage::connect(&config) {
        Ok(catalog) => catalog,
        Err(Error::CredentialNotFound(path)) => {
            println!(
                "{} not found. Please create a service account and download the json key.",
                path
            );
            return Ok(());
        }
        Err(e) => {
            println!("An error occurred: {}", e);
            return Ok(());
        }
    };
    info!("Connected to Google Drive");

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    Session::new(&catalog).run(stdin.lock(), &mut stdout).await?;

    Ok(())
}
