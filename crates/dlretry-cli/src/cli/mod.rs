//! CLI for the dlretry downloader.

mod commands;
mod control_socket;
mod job;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use dlretry_core::config;
use std::path::PathBuf;

use commands::{run_config, run_get, run_stop};

/// Top-level CLI for dlretry.
#[derive(Debug, Parser)]
#[command(name = "dlretry")]
#[command(about = "dlretry: resumable single-stream downloads with retry and redirect confirmation", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download a URL, retrying transient failures and resuming partial data.
    Get(GetArgs),

    /// Ask a running `dlretry get` to stop.
    Stop,

    /// Show the config file path and the effective retry policy.
    Config,
}

#[derive(Debug, Args)]
pub struct GetArgs {
    /// Direct HTTP/HTTPS URL to download.
    pub url: String,

    /// Output file (default: last path segment of the URL).
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Seconds to wait between attempts (overrides config).
    #[arg(long, value_name = "SECS")]
    pub delay: Option<u32>,

    /// Maximum retries after transient failures (overrides config).
    #[arg(long, value_name = "N", conflicts_with = "unbounded")]
    pub retries: Option<u32>,

    /// Retry transient failures forever.
    #[arg(long)]
    pub unbounded: bool,

    /// Follow redirects without asking.
    #[arg(short, long)]
    pub yes: bool,

    /// Proxy URL, e.g. http://proxy.local:3128.
    #[arg(long, value_name = "URL")]
    pub proxy: Option<String>,

    /// Proxy credentials as USER:PASS (also read from DLRETRY_PROXY_USER).
    #[arg(long, value_name = "USER:PASS")]
    pub proxy_user: Option<String>,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Get(args) => run_get(&cfg, args).await?,
            CliCommand::Stop => run_stop(&cfg).await?,
            CliCommand::Config => run_config(&cfg)?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
