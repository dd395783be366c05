//! Clap derive structures for the `fbfuse` binary.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// fbfuse -- master controller for the FBFUSE beamformer
#[derive(Debug, Parser)]
#[command(
    name = "fbfuse",
    version,
    about = "Master controller for the FBFUSE beamformer",
    long_about = "Serves the FBFUSE control protocol: configures observing products,\n\
        allocates beamformer worker servers and multicast groups, and follows\n\
        live target updates from the configuration authority.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, short = 'c', env = "FBFUSE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log output format
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per event
    Json,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the master controller and its control server
    Serve(ServeArgs),

    /// Validate the configuration and print the effective values
    CheckConfig(CheckConfigArgs),
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Listen address (overrides [server].host)
    #[arg(long)]
    pub host: Option<String>,

    /// Listen port (overrides [server].port)
    #[arg(long, short = 'p')]
    pub port: Option<u16>,

    /// Skip every worker RPC
    #[arg(long)]
    pub dummy: bool,
}

#[derive(Debug, Args)]
pub struct CheckConfigArgs {
    /// Print as JSON instead of TOML
    #[arg(long)]
    pub json: bool,
}
