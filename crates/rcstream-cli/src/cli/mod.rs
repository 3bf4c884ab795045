//! CLI for the rcstream realtime client.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use rcstream_core::config::{self, RealtimeConfig};
use std::path::{Path, PathBuf};

use commands::{run_fingerprint, run_reset, run_status, run_watch};

/// Top-level CLI for the realtime remote-config stream client.
#[derive(Debug, Parser)]
#[command(name = "rcstream")]
#[command(about = "rcstream: realtime remote-config update stream client", long_about = None)]
pub struct Cli {
    /// Config file to use instead of ~/.config/rcstream/config.toml.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Open the realtime stream and print updates until Ctrl-C or a terminal error.
    Watch {
        /// Simulate the app moving to the background after SECS seconds.
        #[arg(long, value_name = "SECS")]
        background_after: Option<u64>,
    },

    /// Show persisted backoff state (failed streams, backoff end).
    Status,

    /// Clear persisted backoff state.
    Reset,

    /// Print the uppercase SHA-256 fingerprint of a certificate file.
    Fingerprint {
        /// Path to the certificate (DER or PEM).
        path: PathBuf,
    },
}

fn load_config(path: Option<&Path>) -> Result<RealtimeConfig> {
    let cfg = match path {
        Some(p) => config::load_from_path(p)?,
        None => config::load_or_init()?,
    };
    tracing::debug!(namespace = %cfg.namespace, "loaded config");
    Ok(cfg)
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let config_path = cli.config.as_deref();

        match cli.command {
            CliCommand::Watch { background_after } => {
                let cfg = load_config(config_path)?;
                run_watch(&cfg, background_after).await?;
            }
            CliCommand::Status => run_status(&load_config(config_path)?)?,
            CliCommand::Reset => run_reset(&load_config(config_path)?)?,
            CliCommand::Fingerprint { path } => run_fingerprint(&path)?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
