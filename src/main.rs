//! mefts CLI
//!
//! Command-line interface for reading channels:
//! - Read a time range
//! - Read a sample range
//! - Show channel layout
//! - Generate a default config file

use anyhow::{bail, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use mefts::config::{generate_default_config, Config, LoggingConfig};
use mefts::format::Channel;
use mefts::reader::convert::{duration_of, samples_in};
use mefts::reader::{Query, TimeSeriesReader};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "mefts")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Read ranges from segmented time-series channels")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: search the standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table", global = true)]
    pub format: OutputFormat,

    /// Channel password
    #[arg(long, global = true)]
    pub password: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Read samples in a time range [start, end)
    Time {
        /// Channel directory
        channel: PathBuf,
        /// Start time: µs since the Unix epoch or RFC 3339
        start: String,
        /// End time: µs since the Unix epoch or RFC 3339
        end: String,
    },

    /// Read a sample-number range [start, end)
    Samples {
        /// Channel directory
        channel: PathBuf,
        start: i64,
        end: i64,
    },

    /// Show channel segments and extent
    Info {
        /// Channel directory
        channel: PathBuf,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
}

/// One output sample; `value` is `None` where no data is stored
#[derive(Debug, Serialize)]
struct SampleRow {
    sample: i64,
    time_us: i64,
    value: Option<i32>,
}

#[derive(Debug, Serialize)]
struct SegmentInfo {
    index: usize,
    start_sample: i64,
    number_of_samples: i64,
    start_time: String,
    end_time: String,
    blocks: usize,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    init_logging(&config.logging)?;

    let reader = TimeSeriesReader::with_options(config.reader.read_options());
    let password = cli.password.as_deref();

    match cli.command {
        Commands::Time {
            channel,
            start,
            end,
        } => {
            let start = parse_timestamp(&start)?;
            let end = parse_timestamp(&end)?;
            let mut channel = open_channel(&channel, password)?;

            let span = end
                .checked_sub(start)
                .with_context(|| format!("Time range [{}, {}) is too large", start, end))?;
            let count = samples_in(span, channel.sampling_frequency).max(0) as usize;
            let mut out = vec![0i32; count];
            let query = Query::ByTime { start, end };
            let n = reader.read((&mut channel).into(), query, &mut out)?;

            let first_sample = channel.sample_for_time(start);
            let sentinel = config.reader.sentinel;
            let rows = to_rows(&out[..n], first_sample, start, &channel, sentinel);
            print_rows(&rows, cli.format)?;
        }
        Commands::Samples {
            channel,
            start,
            end,
        } => {
            let mut channel = open_channel(&channel, password)?;

            let mut out = vec![0i32; sample_buffer_len(start, end, channel.number_of_samples)];
            let query = Query::BySample { start, end };
            let n = reader.read((&mut channel).into(), query, &mut out)?;

            // Reads past either end are clamped to the stored samples
            let first_sample = start.max(0);
            let first_time = channel.time_for_sample(first_sample);
            let sentinel = config.reader.sentinel;
            let rows = to_rows(&out[..n], first_sample, first_time, &channel, sentinel);
            print_rows(&rows, cli.format)?;
        }
        Commands::Info { channel } => {
            let channel = open_channel(&channel, password)?;
            print_info(&channel, cli.format)?;
        }
        Commands::Config { output } => {
            let content = generate_default_config();
            match output {
                Some(path) => {
                    std::fs::write(&path, content)
                        .with_context(|| format!("Failed to write config to {:?}", path))?;
                    println!("Config written to {:?}", path);
                }
                None => print!("{}", content),
            }
        }
    }

    Ok(())
}

/// Initialize tracing from the logging config; `RUST_LOG` takes precedence over its level
fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("mefts={}", logging.level)));

    let writer = match &logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path))?;
            tracing_subscriber::fmt::writer::BoxMakeWriter::new(std::sync::Mutex::new(file))
        }
        None => tracing_subscriber::fmt::writer::BoxMakeWriter::new(std::io::stderr),
    };

    let registry = tracing_subscriber::registry().with(filter);
    match logging.format.as_str() {
        "json" => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(writer))
            .init(),
        "pretty" => registry
            .with(tracing_subscriber::fmt::layer().with_writer(writer))
            .init(),
        other => bail!("Unknown log format {:?} (expected pretty or json)", other),
    }
    Ok(())
}

/// Output length for a sample read, clamped to the `total` stored samples
fn sample_buffer_len(start: i64, end: i64, total: i64) -> usize {
    let total = total.max(0);
    let first = start.clamp(0, total);
    let last = end.clamp(0, total);
    (last - first).max(0) as usize
}

fn open_channel(path: &Path, password: Option<&str>) -> Result<Channel> {
    Channel::open(path, password).with_context(|| format!("Failed to open channel {:?}", path))
}

/// Parse µs since the Unix epoch, or an RFC 3339 timestamp
fn parse_timestamp(s: &str) -> Result<i64> {
    if let Ok(us) = s.parse::<i64>() {
        return Ok(us);
    }
    match DateTime::parse_from_rfc3339(s) {
        Ok(dt) => Ok(dt.timestamp_micros()),
        Err(_) => bail!("Invalid timestamp {:?}: expected µs since epoch or RFC 3339", s),
    }
}

fn format_timestamp(us: i64) -> String {
    DateTime::<Utc>::from_timestamp_micros(us)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Micros, true))
        .unwrap_or_else(|| us.to_string())
}

fn to_rows(
    samples: &[i32],
    first_sample: i64,
    first_time: i64,
    channel: &Channel,
    sentinel: i32,
) -> Vec<SampleRow> {
    samples
        .iter()
        .enumerate()
        .map(|(i, &value)| SampleRow {
            sample: first_sample + i as i64,
            time_us: first_time + duration_of(i as i64, channel.sampling_frequency),
            value: (value != sentinel).then_some(value),
        })
        .collect()
}

fn value_text(value: Option<i32>) -> String {
    value.map_or_else(|| "NaN".to_string(), |v| v.to_string())
}

fn print_rows(rows: &[SampleRow], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(rows)?);
        }
        OutputFormat::Csv => {
            let mut writer = csv::Writer::from_writer(std::io::stdout());
            writer.write_record(["sample", "time_us", "value"])?;
            for row in rows {
                writer.write_record([
                    row.sample.to_string(),
                    row.time_us.to_string(),
                    value_text(row.value),
                ])?;
            }
            writer.flush()?;
        }
        OutputFormat::Table => {
            if rows.is_empty() {
                println!("No samples in range.");
                return Ok(());
            }
            println!("{:<12} {:<34} {}", "Sample", "Time", "Value");
            println!("{}", "-".repeat(60));
            for row in rows {
                println!(
                    "{:<12} {:<34} {}",
                    row.sample,
                    format_timestamp(row.time_us),
                    value_text(row.value)
                );
            }
            println!();
            println!("{} samples", rows.len());
        }
    }
    Ok(())
}

fn print_info(channel: &Channel, format: OutputFormat) -> Result<()> {
    let segments: Vec<SegmentInfo> = channel
        .segments
        .iter()
        .enumerate()
        .map(|(index, s)| SegmentInfo {
            index,
            start_sample: s.start_sample,
            number_of_samples: s.number_of_samples,
            start_time: format_timestamp(s.start_time),
            end_time: format_timestamp(s.end_time),
            blocks: s.index.len(),
        })
        .collect();

    match format {
        OutputFormat::Json => {
            let info = serde_json::json!({
                "path": channel.path,
                "sampling_frequency": channel.sampling_frequency,
                "number_of_samples": channel.number_of_samples,
                "earliest_start_time": channel.earliest_start_time,
                "latest_end_time": channel.latest_end_time,
                "maximum_block_samples": channel.maximum_block_samples,
                "segments": segments,
            });
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        OutputFormat::Csv => {
            let mut writer = csv::Writer::from_writer(std::io::stdout());
            for segment in &segments {
                writer.serialize(segment)?;
            }
            writer.flush()?;
        }
        OutputFormat::Table => {
            println!("Channel: {}", channel.path.display());
            println!("  Sampling frequency: {} Hz", channel.sampling_frequency);
            println!("  Samples: {}", channel.number_of_samples);
            println!(
                "  Extent: {} .. {}",
                format_timestamp(channel.earliest_start_time),
                format_timestamp(channel.latest_end_time)
            );
            println!("  Blocks: {}", channel.block_count());
            println!();
            println!(
                "{:<6} {:<12} {:<10} {:<34} {:<34} {}",
                "Seg", "Start", "Samples", "Start time", "End time", "Blocks"
            );
            println!("{}", "-".repeat(106));
            for s in &segments {
                println!(
                    "{:<6} {:<12} {:<10} {:<34} {:<34} {}",
                    s.index, s.start_sample, s.number_of_samples, s.start_time, s.end_time, s.blocks
                );
            }
        }
    }
    Ok(())
}
