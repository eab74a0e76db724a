//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Mocap Capture - record skeletal motion from a scene and bake it into animation assets
#[derive(Parser, Debug)]
#[command(
    name = "mocap-capture",
    author,
    version,
    about = "Mocap capture-and-bake pipeline",
    long_about = "Records skeletal motion of scene actors at a fixed sample rate and bakes \n\
                  every recording into an evenly keyed animation asset.\n\n\
                  The `run` command drives a simulated scene described by the \n\
                  configuration's [scenario] section."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "MOCAP_CAPTURE_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "MOCAP_CAPTURE_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a capture session against the configured scenario
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "capture.toml",
        env = "MOCAP_CAPTURE_CONFIG"
    )]
    pub config: PathBuf,

    /// Override the scenario length in session ticks
    #[arg(long, env = "MOCAP_CAPTURE_TICKS")]
    pub ticks: Option<u64>,

    /// Pace session and bake ticks with wall-clock timers
    #[arg(long)]
    pub realtime: bool,

    /// Validate configuration and exit without running
    #[arg(long)]
    pub dry_run: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "MOCAP_CAPTURE_METRICS_PORT")]
    pub metrics_port: u16,

    /// Override `base_path` of every file / bvh sink
    #[arg(short, long, env = "MOCAP_CAPTURE_OUTPUT")]
    pub output: Option<PathBuf>,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "capture.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "capture.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}
