//! CLI for the bpatch bundle patcher.

mod commands;

use anyhow::Result;
use bpatch_core::config;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::{run_checksum, run_clear_cache, run_status, run_update, run_verify, UpdateArgs};

/// Top-level CLI for the bpatch bundle patcher.
#[derive(Debug, Parser)]
#[command(name = "bpatch")]
#[command(about = "bpatch: resolve, download, and verify content-addressed asset bundles", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Fetch the remote manifest for a resource version and download what is missing.
    Update {
        /// Resource version to update to.
        #[arg(long = "version", value_name = "N")]
        resource_version: u32,

        /// Download bundles with this DLC tag (repeatable). Pure builtin bundles are always included.
        #[arg(long, value_name = "TAG", conflicts_with_all = ["asset", "bundle"])]
        tag: Vec<String>,

        /// Download the bundle of this asset path and its dependencies (repeatable).
        #[arg(long, value_name = "PATH", conflicts_with = "bundle")]
        asset: Vec<String>,

        /// Download this bundle and its dependencies (repeatable).
        #[arg(long, value_name = "NAME")]
        bundle: Vec<String>,

        /// Application version the sandbox is tagged with (cache invalidation).
        #[arg(long, value_name = "VERSION", default_value = env!("CARGO_PKG_VERSION"))]
        app_version: String,
    },

    /// Show the local manifest and cache index.
    Status,

    /// Check a file against an expected size and checksum.
    Verify {
        /// Path to the file.
        path: PathBuf,
        /// Expected size in bytes.
        #[arg(long)]
        size: u64,
        /// Expected checksum (hex, case-insensitive).
        #[arg(long)]
        checksum: String,
    },

    /// Print the configured checksum of a file.
    Checksum {
        /// Path to the file.
        path: PathBuf,
    },

    /// Forget every entry in the cache index.
    ClearCache,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Update {
                resource_version,
                tag,
                asset,
                bundle,
                app_version,
            } => {
                let args = UpdateArgs {
                    resource_version,
                    tags: tag,
                    assets: asset,
                    bundles: bundle,
                    app_version,
                };
                run_update(&cfg, args).await?
            }
            CliCommand::Status => run_status(&cfg).await?,
            CliCommand::Verify {
                path,
                size,
                checksum,
            } => run_verify(&cfg, &path, size, &checksum).await?,
            CliCommand::Checksum { path } => run_checksum(&cfg, &path).await?,
            CliCommand::ClearCache => run_clear_cache(&cfg).await?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
