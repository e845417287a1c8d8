use std::io::IsTerminal;
use std::path::Path;

use clap::ValueEnum;
use serde::Serialize;
use tracewire_client::TraceStatsReply;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct RecordOutput<'a> {
    schema_id: &'a str,
    out_path: String,
    trace_bytes: usize,
}

pub fn print_record_summary(out_path: &Path, trace_bytes: usize, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = RecordOutput {
                schema_id: "https://schemas.tracewire.dev/cli/v1/record-summary.schema.json",
                out_path: out_path.display().to_string(),
                trace_bytes,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Pretty => {
            println!("wrote {} trace bytes to {}", trace_bytes, out_path.display());
        }
    }
}

#[derive(Serialize)]
struct StatsOutput<'a> {
    schema_id: &'a str,
    buffers: &'a [tracewire_client::BufferStats],
}

pub fn print_stats(stats: &TraceStatsReply, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = StatsOutput {
                schema_id: "https://schemas.tracewire.dev/cli/v1/trace-stats.schema.json",
                buffers: &stats.buffer_stats,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Pretty => {
            if stats.buffer_stats.is_empty() {
                println!("no buffers reported");
                return;
            }
            for (index, buffer) in stats.buffer_stats.iter().enumerate() {
                println!(
                    "buffer {}: size={} written={} chunks={}",
                    index, buffer.buffer_size, buffer.bytes_written, buffer.chunks_written
                );
            }
        }
    }
}
