//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use contracts::DispatchMode;
use std::path::PathBuf;

/// outflow - deliver JSON-lines records to a configured sink
#[derive(Parser, Debug)]
#[command(
    name = "outflow",
    author,
    version,
    about = "Record dispatch pipeline for queue, HTTP, file and console sinks",
    long_about = "Reads JSON-lines records and delivers them through one configured sink.\n\n\
                  Records can be sent one at a time or in batches. Every record that \n\
                  could not be delivered is written to a quarantine file or logged."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "OUTFLOW_VERBOSE")]
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
        env = "OUTFLOW_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Deliver records through a configured sink
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
    #[arg(short, long, default_value = "outflow.toml", env = "OUTFLOW_CONFIG")]
    pub config: PathBuf,

    /// Sink to deliver to (defaults to the first configured sink)
    #[arg(short, long, env = "OUTFLOW_SINK")]
    pub sink: Option<String>,

    /// JSON-lines input file (reads stdin when omitted)
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Override dispatch mode from configuration
    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Override batch size from configuration
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Override quarantine file from configuration
    #[arg(long, env = "OUTFLOW_QUARANTINE")]
    pub quarantine: Option<PathBuf>,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "OUTFLOW_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "outflow.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "outflow.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show sink parameters and headers
    #[arg(long)]
    pub params: bool,
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

/// Dispatch mode
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum ModeArg {
    /// One record per output call, through the dispatch wrapper
    Single,
    /// Groups of records per output_many call
    Batch,
}

impl From<ModeArg> for DispatchMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Single => Self::Single,
            ModeArg::Batch => Self::Batch,
        }
    }
}
