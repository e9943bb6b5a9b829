#![allow(clippy::print_stdout)]

mod args;

use crate::args::{Cli, Command};
use anyhow::{Context, Result};
use clap::Parser;
use fhub::domain::config::FilesystemConfig;
use fhub::kernel::config::load_config;
use fhub::storage::{Loader, ScanMode, StorageExt};
use fhub::{Filesystem, MountFailurePolicy};
use fhub_logger::Logger;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config: FilesystemConfig = load_config(cli.config.as_deref())?;
    let _logger = Logger::from_config(&config.logging)?;

    let policy = if cli.skip_failed { MountFailurePolicy::Skip } else { MountFailurePolicy::Abort };
    let mut fs = Filesystem::bootstrap(&config, Loader::with_defaults(), policy).await?;

    match cli.command {
        Command::Mounts {} => {
            for mount in fs.mounts().all() {
                let layers = mount.storage().layers();
                println!("{}\t{}\t{}", mount.mount_point(), mount.storage_id(), layers.join(","));
            }
        },
        Command::Resolve { path } => {
            let resolved = fs.resolve(&path)?;
            println!("mount:    {}", resolved.mount.mount_point());
            println!("storage:  {}", resolved.mount.storage_id());
            println!("internal: /{}", resolved.internal);
        },
        Command::Ls { path } => {
            for name in fs.list(&path).await? {
                println!("{name}");
            }
        },
        Command::Cat { path } => {
            let data = fs.read(&path).await?;
            let mut stdout = tokio::io::stdout();
            stdout.write_all(&data).await?;
            stdout.flush().await?;
        },
        Command::Put { path, file } => {
            let data = match file {
                Some(file) => tokio::fs::read(&file)
                    .await
                    .with_context(|| format!("Failed to read {}", file.display()))?,
                None => {
                    let mut data = Vec::new();
                    tokio::io::stdin().read_to_end(&mut data).await?;
                    data
                },
            };
            let written = fs.write(&path, &data).await?;
            println!("{written} bytes written to {path}");
        },
        Command::Mv { source, target } => {
            fs.rename(&source, &target).await?;
            println!("{source} -> {target}");
        },
        Command::Scan { path, recursive } => {
            let mode = if recursive { ScanMode::Recursive } else { ScanMode::Shallow };
            let summary = fs.scan(&path, mode).await?;
            println!("scanned {}, removed {}", summary.scanned, summary.removed);
            if let Some(size) = summary.size {
                println!("size {size}");
            }
        },
    }

    Ok(())
}
