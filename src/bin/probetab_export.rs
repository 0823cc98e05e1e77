//! probetab-export: Convert probe record dumps into one CSV file per probe
//!
//! Usage:
//!   # Read a JSON array of records from a file
//!   probetab-export records.json --output-dir ./csv
//!
//!   # Read newline-delimited records from stdin
//!   cat records.ndjson | probetab-export --output-dir ./csv
//!
//!   # Custom flattening conventions
//!   probetab-export records.json -o ./csv --separator . --exclude PROBE,TIMESTAMP
//!
//! Each record is a JSON object with the fields `id`, `device`, `probe`,
//! `timestamp`, and `value` (the raw payload JSON as a string), matching the
//! data table of a merged sensor database.

// Use MiMalloc allocator for better performance (recommended by simd-json)
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{Context, Result};
use clap::Parser;
use probetab::{export_records, BadRecordPolicy, ExportConfig, ProbeRecord};
use std::fs::File;
use std::io::Read;

#[derive(Parser, Debug)]
#[command(name = "probetab-export")]
#[command(about = "Convert probe record dumps into one CSV file per probe", long_about = None)]
struct Args {
    /// Input record file (use stdin if omitted): a JSON array of records,
    /// or newline-delimited records
    #[arg(value_name = "FILE")]
    input: Option<String>,

    /// Output directory for per-probe .csv files
    #[arg(long, short = 'o', default_value = ".")]
    output_dir: String,

    /// Separator for nested key paths (default: "_")
    #[arg(long)]
    separator: Option<String>,

    /// Comma-separated payload keys to drop from the output
    #[arg(long)]
    exclude: Option<String>,

    /// Payload field marking its same-length array siblings as
    /// index-correlated (default: "EVENT_TIMESTAMP")
    #[arg(long)]
    anchor_key: Option<String>,

    /// Maximum rows a single record may expand to (default: 10000)
    #[arg(long)]
    max_rows: Option<usize>,

    /// Abort on the first bad record instead of logging and skipping it
    #[arg(long)]
    fail_fast: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    // Build config
    let mut config = ExportConfig::default();
    if let Some(sep) = args.separator {
        config.flatten.separator = sep;
    }
    if let Some(keys) = args.exclude {
        config.flatten.excluded_keys = keys
            .split(',')
            .map(|s| s.trim().to_string())
            .collect();
    }
    if let Some(anchor) = args.anchor_key {
        config.flatten.anchor_key = anchor;
    }
    if let Some(max_rows) = args.max_rows {
        config.flatten.max_rows = max_rows;
    }
    if args.fail_fast {
        config.bad_records = BadRecordPolicy::Fail;
    }

    let records = read_records(args.input.as_deref())?;
    let summary = export_records(&records, &args.output_dir, &config)?;

    println!(
        "{} probes, {} records, {} rows written, {} records skipped",
        summary.probes,
        summary.records,
        summary.rows_written,
        summary.failures.len()
    );
    Ok(())
}

/// Read the record dump using SIMD-accelerated JSON parsing when possible
fn read_records(input_file: Option<&str>) -> Result<Vec<ProbeRecord>> {
    let mut content = Vec::new();
    match input_file {
        Some(path) => {
            File::open(path)
                .with_context(|| format!("Failed to open input file: {}", path))?
                .read_to_end(&mut content)
                .context("Failed to read input file")?;
        }
        None => {
            std::io::stdin()
                .read_to_end(&mut content)
                .context("Failed to read stdin")?;
        }
    }

    // Try SIMD parsing first (faster); simd-json mutates its buffer
    let mut simd_buf = content.clone();
    match simd_json::to_owned_value(&mut simd_buf) {
        Ok(value @ simd_json::OwnedValue::Array(_)) => {
            let json_str = simd_json::to_string(&value)?;
            let records: Vec<ProbeRecord> =
                serde_json::from_str(&json_str).context("Record array has unexpected shape")?;
            Ok(records)
        }
        Ok(value) => {
            // Single record object
            let json_str = simd_json::to_string(&value)?;
            let record: ProbeRecord =
                serde_json::from_str(&json_str).context("Record has unexpected shape")?;
            Ok(vec![record])
        }
        Err(_) => {
            // Fallback to serde_json for newline-delimited input
            let content_str = String::from_utf8_lossy(&content);
            let mut records = Vec::new();
            for line in content_str.lines() {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let record: ProbeRecord =
                    serde_json::from_str(line).context("Failed to parse record line")?;
                records.push(record);
            }
            Ok(records)
        }
    }
}
