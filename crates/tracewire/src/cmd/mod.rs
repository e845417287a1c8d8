use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod record;
pub mod stats;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Record a trace from a tracing service and write it to a file.
    Record(RecordArgs),
    /// Query buffer statistics from a tracing service.
    Stats(StatsArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Record(args) => record::run(args, format),
        Command::Stats(args) => stats::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct RecordArgs {
    /// Socket path of the tracing service.
    pub path: PathBuf,
    /// Output file for the recorded trace.
    #[arg(long, short = 'o')]
    pub out: PathBuf,
    /// Recording duration (e.g. 10s, 500ms). Ctrl-c stops earlier.
    #[arg(long, default_value = "10s")]
    pub duration: String,
    /// Trace buffer size in KiB.
    #[arg(long, default_value = "4096")]
    pub buffer_size_kb: u32,
    /// Trace categories to enable (comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub categories: Option<Vec<String>>,
    /// Maximum time to wait for each service reply (e.g. 5s, 500ms).
    #[arg(long, default_value = "10s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct StatsArgs {
    /// Socket path of the tracing service.
    pub path: PathBuf,
    /// Maximum time to wait for the reply (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
