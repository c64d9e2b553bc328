//! CLI argument definitions for `panelkit`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

#[derive(Parser)]
#[command(
    name = "panelkit",
    version,
    about = "Build balanced, gap-filled panels from sparse CSV tables",
    long_about = "Build balanced, gap-filled panels from sparse CSV tables.\n\n\
                  Each dataset in the TOML configuration is read from the input\n\
                  directory, expanded to every unit and period, interpolated, and\n\
                  written to the output directory."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run configured dataset pipelines.
    Run(RunArgs),

    /// Validate a configuration file and list the stages of each dataset.
    Check(CheckArgs),
}

#[derive(Parser)]
pub struct RunArgs {
    /// Pipeline configuration (TOML).
    #[arg(long = "config", value_name = "FILE")]
    pub config: PathBuf,

    /// Directory holding the source tables as `<table>.csv`.
    #[arg(long = "input", value_name = "DIR")]
    pub input: PathBuf,

    /// Directory receiving `<output>.csv` per dataset.
    #[arg(long = "output", value_name = "DIR")]
    pub output: PathBuf,

    /// Run only the named datasets (repeatable; default: all).
    #[arg(long = "dataset", value_name = "NAME")]
    pub datasets: Vec<String>,

    /// Run every stage but write no output tables.
    #[arg(long = "dry-run")]
    pub dry_run: bool,

    /// Write the pipeline reports as JSON.
    #[arg(long = "report-json", value_name = "PATH")]
    pub report_json: Option<PathBuf>,

    /// Interpolate unit groups sequentially instead of in parallel.
    #[arg(long = "sequential")]
    pub sequential: bool,
}

#[derive(Parser)]
pub struct CheckArgs {
    /// Pipeline configuration (TOML).
    #[arg(long = "config", value_name = "FILE")]
    pub config: PathBuf,
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
