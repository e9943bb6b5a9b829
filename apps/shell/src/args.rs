//! # CLI Argument Definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// The main CLI structure parsing command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "fhub")]
#[command(author = env!("CARGO_PKG_AUTHORS"))]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(arg_required_else_help = true)]
#[command(about = "Browse and modify the FileHub namespace")]
pub(crate) struct Cli {
    /// Configuration file (defaults to `fhub.*` in the working directory)
    #[arg(short, long, global = true)]
    pub(crate) config: Option<PathBuf>,

    /// Keep going when a mount cannot be created
    #[arg(long, global = true)]
    pub(crate) skip_failed: bool,

    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// List mounts with their storage ids and wrapper layers
    Mounts {},
    /// Show which mount and internal path serve a path
    Resolve { path: String },
    /// List a folder, including mounts below it
    Ls {
        #[arg(default_value = "/")]
        path: String,
    },
    /// Print a file to stdout
    Cat { path: String },
    /// Write a file from a local file or stdin
    Put {
        path: String,
        /// Read content from this local file instead of stdin
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Move a file, folder or mount
    Mv { source: String, target: String },
    /// Refresh the metadata cache below a path
    Scan {
        #[arg(default_value = "/")]
        path: String,
        /// Walk the whole tree instead of one level
        #[arg(short, long)]
        recursive: bool,
    },
}
