mod cli;
mod output;

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use dbx_core::{ApiClient, CredentialStore, ReqwestTransport};

use crate::cli::{Cli, Command};

#[tokio::main]
async fn main() {
    let args = Cli::parse();
    init_logging(args.verbose);

    if let Err(e) = run(args).await {
        error!("Command failed: {:#}", e);
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

/// Diagnostics go to stderr so stdout stays machine-parseable.
fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("dbx={0},dbx_core={0}", default_level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn credential_path(cli_path: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = cli_path {
        return Ok(path);
    }
    let config_dir = dirs::config_dir().context("cannot determine the user config directory")?;
    Ok(config_dir.join("dbx").join("credentials.env"))
}

async fn run(args: Cli) -> Result<()> {
    let store = CredentialStore::new(credential_path(args.config)?);
    let transport = Arc::new(ReqwestTransport::new());
    let mut client = ApiClient::new(transport, store);

    match args.command {
        Command::Ls { path } => {
            let entries = client.list_folder(&path).await?;
            for entry in &entries {
                println!("{}", output::entry_line(entry));
            }
        }
        Command::Search { query, path } => {
            let matches = client.search(&query, &path).await?;
            for entry in &matches {
                println!("{}", output::match_line(entry));
            }
        }
        Command::Download { path, output } => {
            let saved = client.download(&path, output).await?;
            println!("✅ Downloaded to: {}", saved.display());
        }
        Command::Upload { local, remote } => {
            let meta = client.upload(&local, &remote).await?;
            println!(
                "✅ Uploaded to: {}",
                meta.path_display.as_deref().unwrap_or(&remote)
            );
        }
        Command::Account => {
            let account = client.get_account().await?;
            println!("Account: {}", account.name.display_name);
            println!("Email: {}", account.email);
        }
        Command::Mkdir { path } => {
            let meta = client.create_folder(&path).await?;
            println!(
                "✅ Created: {}",
                meta.path_display.as_deref().unwrap_or(&path)
            );
        }
    }

    Ok(())
}
