//! nested-csv: Flatten nested JSON records into CSV
//!
//! Usage:
//!   # Columns given explicitly, JSON array or single object from a file
//!   nested-csv --fields 'id,user.name,posts[].title' data.json
//!
//!   # NDJSON from stdin, numbering records from 1
//!   cat events.jsonl | nested-csv --ndjson --fields 'id,tags[]' --first-id 1
//!
//!   # Let the first record suggest the columns
//!   nested-csv --infer --print-fields data.json

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use nested_csv::{
    generate_field_names, write_json_lines, CsvSink, NestedWriter, WriterConfig,
};
use serde::Deserialize;
use serde_json::Value;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "nested-csv")]
#[command(about = "Flatten nested JSON records into CSV rows", long_about = None)]
struct Args {
    /// Input file (use stdin if omitted)
    #[arg(value_name = "FILE")]
    input: Option<String>,

    /// Process newline-delimited JSON (one record per line)
    #[arg(long)]
    ndjson: bool,

    /// Comma-separated column names, e.g. "id,user.name,posts[].title"
    #[arg(long, short = 'f')]
    fields: Option<String>,

    /// JSON file with "fields", "restval" and "raise_on_missing"
    #[arg(long, short = 'c')]
    config: Option<String>,

    /// Derive the columns from the first record
    #[arg(long, conflicts_with = "fields")]
    infer: bool,

    /// Print the inferred columns, one per line, and exit
    #[arg(long, requires = "infer")]
    print_fields: bool,

    /// Value written when a field cannot be resolved (default: empty)
    #[arg(long)]
    restval: Option<String>,

    /// Fail on missing keys, short lists and non-containers
    #[arg(long)]
    raise_on_missing: bool,

    /// Fill the "id" column with consecutive numbers starting here
    #[arg(long)]
    first_id: Option<u64>,

    /// Don't write the header line
    #[arg(long)]
    no_header: bool,

    /// Field delimiter (default: ",")
    #[arg(long, short = 'd', default_value_t = ',')]
    delimiter: char,
}

/// Contents of a `--config` file
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    fields: Vec<String>,

    #[serde(flatten)]
    writer: WriterConfig,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let file_config = match &args.config {
        Some(path) => load_config(path)?,
        None => FileConfig::default(),
    };

    // Build config
    let mut config = file_config.writer;
    if let Some(restval) = args.restval.clone() {
        config.restval = restval;
    }
    if args.raise_on_missing {
        config.raise_on_missing = true;
    }

    let mut fields = file_config.fields;
    if let Some(fields_str) = &args.fields {
        fields = fields_str.split(',').map(|s| s.trim().to_string()).collect();
    }

    if !args.delimiter.is_ascii() {
        bail!("Delimiter must be a single ASCII character");
    }

    let mut content = Vec::new();
    open_input(args.input.as_deref())?
        .read_to_end(&mut content)
        .context("Failed to read input")?;

    // NDJSON with known columns streams line by line
    if args.ndjson && !args.infer {
        if fields.is_empty() {
            bail!("No columns given: use --fields, --config or --infer");
        }
        let mut writer = build_writer(&fields, config, &args)?;
        let count = write_json_lines(content.as_slice(), &mut writer, args.first_id)?;
        info!(records = count, "done");
        return Ok(());
    }

    let records = read_records(&content, args.ndjson)?;
    debug!(records = records.len(), "parsed input");

    if args.infer {
        let Some(first) = records.first() else {
            bail!("No records to infer columns from");
        };
        fields = generate_field_names(first, "");
        warn!(
            columns = fields.len(),
            "columns inferred from the first record; lists are sampled by their first element only"
        );

        if args.print_fields {
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            for name in &fields {
                writeln!(out, "{}", name)?;
            }
            return Ok(());
        }
    }

    if fields.is_empty() {
        bail!("No columns given: use --fields, --config or --infer");
    }

    let mut writer = build_writer(&fields, config, &args)?;
    writer
        .write_rows(&records, args.first_id)
        .context("Failed to write records")?;
    writer.flush()?;

    info!(records = records.len(), "done");
    Ok(())
}

fn load_config(path: &str) -> Result<FileConfig> {
    let file = File::open(path).with_context(|| format!("Failed to open config: {}", path))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse config: {}", path))
}

fn open_input(path: Option<&str>) -> Result<Box<dyn Read>> {
    let reader = if let Some(file_path) = path {
        let file = File::open(file_path)
            .with_context(|| format!("Failed to open input: {}", file_path))?;
        Box::new(BufReader::new(file)) as Box<dyn Read>
    } else {
        Box::new(std::io::stdin()) as Box<dyn Read>
    };
    Ok(reader)
}

/// Create the CSV writer on stdout and emit the header unless suppressed
fn build_writer(
    fields: &[String],
    config: WriterConfig,
    args: &Args,
) -> Result<NestedWriter<CsvSink<BufWriter<std::io::Stdout>>>> {
    let csv_writer = csv::WriterBuilder::new()
        .delimiter(args.delimiter as u8)
        .from_writer(BufWriter::new(std::io::stdout()));

    let mut writer = NestedWriter::new(CsvSink::from_csv_writer(csv_writer), fields, config)
        .context("Invalid column names")?;

    if !args.no_header {
        writer.write_header()?;
    }
    Ok(writer)
}

/// Parse the whole input, using SIMD-accelerated parsing when possible.
/// A top-level array is a stream of records.
fn read_records(content: &[u8], ndjson: bool) -> Result<Vec<Value>> {
    let mut records = Vec::new();

    if !ndjson {
        let mut scratch = content.to_vec();
        match simd_json::to_owned_value(&mut scratch) {
            Ok(simd_json::OwnedValue::Array(arr)) => {
                for elem in arr.iter() {
                    records.push(to_serde_value(elem)?);
                }
                return Ok(records);
            }
            Ok(elem) => {
                records.push(to_serde_value(&elem)?);
                return Ok(records);
            }
            Err(e) => {
                debug!(error = %e, "input is not a single JSON document, reading lines");
            }
        }
    }

    // Fallback to serde_json for NDJSON or malformed input
    let content_str = String::from_utf8_lossy(content);
    for (line_no, line) in content_str.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(line)
            .with_context(|| format!("Failed to parse JSON on line {}", line_no + 1))?;
        records.push(value);
    }

    Ok(records)
}

fn to_serde_value(value: &simd_json::OwnedValue) -> Result<Value> {
    let json_str = simd_json::to_string(value)?;
    Ok(serde_json::from_str(&json_str)?)
}
