//! Command-line argument definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "dbx", version, about = "Dropbox command-line client")]
pub struct Cli {
    /// Credential file (KEY=value lines). Defaults to
    /// ~/.config/dbx/credentials.env.
    #[arg(long, env = "DBX_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List folder contents
    Ls {
        /// Folder path (root when omitted)
        #[arg(default_value = "")]
        path: String,
    },
    /// Search for files and folders
    Search {
        /// Search query
        query: String,
        /// Limit the search to a path
        #[arg(long, default_value = "")]
        path: String,
    },
    /// Download a file
    Download {
        /// Dropbox path
        path: String,
        /// Local output path (defaults to the remote base name)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Upload a file
    Upload {
        /// Local file path
        local: PathBuf,
        /// Dropbox destination path
        remote: String,
    },
    /// Show account info
    Account,
    /// Create a folder
    Mkdir {
        /// Folder path to create
        path: String,
    },
}
