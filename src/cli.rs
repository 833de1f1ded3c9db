//! Command-line interface components.
//!
//! Diagnostics on finished point observation files: describe a file, print
//! its observations, or rewrite it in the current layout.

use crate::config::{ReaderConfig, WriterConfig};
use crate::header::format_valid_time;
use crate::models::{FormatVersion, Observation, VariableIdMode, WriteSummary};
use crate::point_obs::{PointObsReader, rewrite};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use netcdf::AttributeValue;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(name = "point-obs")]
#[command(about = "Inspect and upgrade dictionary-encoded point observation files")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show layout version, dimensions, table sizes and attributes
    Inspect {
        /// Point observation file
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Print resolved observations as text
    Dump {
        /// Point observation file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// First observation to print
        #[arg(long, default_value_t = 0)]
        offset: usize,

        /// Number of observations to print (default: all remaining)
        #[arg(long)]
        count: Option<usize>,
    },

    /// Rewrite any readable file in the V1.2 layout
    Upgrade {
        /// Source file (V1.0 or V1.2)
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Destination file
        #[arg(value_name = "OUTPUT")]
        output: PathBuf,

        /// Observations buffered between flushes
        #[arg(long)]
        buffer_size: Option<usize>,
    },
}

impl Args {
    pub fn get_log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "warn" }
    }
}

/// Set up tracing output on stderr; `RUST_LOG` overrides the verbosity flag
pub fn setup_logging(args: &Args) {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("point_obs_nc={}", args.get_log_level())));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_level(true)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .init();
}

/// Run the selected subcommand
pub fn run(args: Args) -> Result<()> {
    setup_logging(&args);
    debug!("Command line arguments: {:?}", args);

    match args.command {
        Command::Inspect { file } => inspect(&file),
        Command::Dump {
            file,
            offset,
            count,
        } => dump(&file, offset, count),
        Command::Upgrade {
            input,
            output,
            buffer_size,
        } => upgrade(&input, &output, buffer_size),
    }
}

fn open(path: &Path) -> Result<PointObsReader> {
    PointObsReader::open_with_config(path, ReaderConfig::default())
        .with_context(|| format!("Failed to open {}", path.display()))
}

fn inspect(path: &Path) -> Result<()> {
    let mut reader = open(path)?;

    println!("{}", path.display().to_string().bright_green().bold());
    println!("  {:<18} {}", "Layout:", reader.version().to_string().bright_cyan());
    let mode = match reader.variable_id_mode() {
        VariableIdMode::GribCode => "GRIB code",
        VariableIdMode::VariableIndex => "variable index",
    };
    println!("  {:<18} {}", "Variable ids:", mode);
    println!("  {:<18} {}", "Observations:", reader.obs_count());
    println!("  {:<18} {}", "Headers:", reader.hdr_count());

    let headers = reader.read_headers().context("Failed to read header tables")?;
    let raw_headers = headers.raw_header_count();
    println!("  {:<18} {}", "Message types:", headers.types().len());
    println!("  {:<18} {}", "Stations:", headers.stations().len());
    println!("  {:<18} {}", "Valid times:", headers.valid_times().len());
    if let Some((first, last)) = headers.time_range() {
        println!(
            "  {:<18} {} .. {}",
            "Time range:",
            format_valid_time(first)?,
            format_valid_time(last)?
        );
    }
    if raw_headers > 0 {
        println!("  {:<18} {}", "PrepBufr reports:", raw_headers);
    }

    let quality = reader.quality_table().context("Failed to read quality table")?;
    println!("  {:<18} {}", "Quality flags:", quality.join(", "));

    if let Some(variables) = reader.variable_table()? {
        println!("  {:<18} {}", "Variables:", variables.names().join(", "));
    }

    let nc = reader.container();
    println!();
    println!("{}", "Dimensions:".bright_white().bold());
    for dim in nc.dimensions() {
        if dim.is_unlimited() {
            println!(
                "  {:<18} {} {}",
                dim.name(),
                dim.len(),
                "(unlimited)".bright_black()
            );
        } else {
            println!("  {:<18} {}", dim.name(), dim.len());
        }
    }

    let attributes: Vec<_> = nc.attributes().collect();
    if !attributes.is_empty() {
        println!();
        println!("{}", "Global attributes:".bright_white().bold());
        for attribute in attributes {
            let value = attribute
                .value()
                .with_context(|| format!("Failed to read attribute {}", attribute.name()))?;
            println!("  {:<24} {}", attribute.name(), describe(&value));
        }
    }

    Ok(())
}

fn describe(value: &AttributeValue) -> String {
    fn join<T: ToString>(values: &[T]) -> String {
        values.iter().map(T::to_string).collect::<Vec<_>>().join(", ")
    }
    match value {
        AttributeValue::Str(s) => format!("\"{}\"", s),
        AttributeValue::Strs(v) => join(v),
        AttributeValue::Uchar(x) => x.to_string(),
        AttributeValue::Uchars(v) => join(v),
        AttributeValue::Schar(x) => x.to_string(),
        AttributeValue::Schars(v) => join(v),
        AttributeValue::Ushort(x) => x.to_string(),
        AttributeValue::Ushorts(v) => join(v),
        AttributeValue::Short(x) => x.to_string(),
        AttributeValue::Shorts(v) => join(v),
        AttributeValue::Uint(x) => x.to_string(),
        AttributeValue::Uints(v) => join(v),
        AttributeValue::Int(x) => x.to_string(),
        AttributeValue::Ints(v) => join(v),
        AttributeValue::Ulonglong(x) => x.to_string(),
        AttributeValue::Ulonglongs(v) => join(v),
        AttributeValue::Longlong(x) => x.to_string(),
        AttributeValue::Longlongs(v) => join(v),
        AttributeValue::Float(x) => x.to_string(),
        AttributeValue::Floats(v) => join(v),
        AttributeValue::Double(x) => x.to_string(),
        AttributeValue::Doubles(v) => join(v),
    }
}

fn dump(path: &Path, offset: usize, count: Option<usize>) -> Result<()> {
    let mut reader = open(path)?;
    let count = count.unwrap_or_else(|| reader.obs_count().saturating_sub(offset));
    let observations = reader
        .read_observations(offset, count)
        .with_context(|| format!("Failed to read observations from {}", path.display()))?;

    for obs in &observations {
        println!("{}", format_observation(obs)?);
    }
    info!("Printed {} observations", observations.len());
    Ok(())
}

/// One observation as a whitespace separated line
fn format_observation(obs: &Observation) -> Result<String> {
    let variable = if obs.var_name.is_empty() {
        obs.var_code.to_string()
    } else {
        obs.var_name.clone()
    };
    Ok(format!(
        "{:<8} {:<10} {} {:>9.4} {:>10.4} {:>8.2} {:<8} {:>8.2} {:>8.2} {:<4} {}",
        obs.header_type,
        obs.station_id,
        format_valid_time(obs.valid_time)?,
        obs.latitude,
        obs.longitude,
        obs.elevation,
        variable,
        obs.pressure_level,
        obs.height,
        obs.quality_flag,
        obs.value
    ))
}

fn upgrade(input: &Path, output: &Path, buffer_size: Option<usize>) -> Result<()> {
    let start_time = Instant::now();
    let mut source = open(input)?;
    if source.version() == FormatVersion::V1_2 {
        info!("{} already uses the V1.2 layout, rewriting anyway", input.display());
    }

    let mut config = WriterConfig::default();
    if let Some(size) = buffer_size {
        config = config.with_buffer_size(size);
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .context("Invalid progress template")?,
    );
    spinner.set_message(format!("Rewriting {} observations", source.obs_count()));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let result = rewrite(&mut source, output, config);
    spinner.finish_and_clear();
    let stats = result.with_context(|| format!("Failed to write {}", output.display()))?;

    print_write_summary(output, &stats, start_time.elapsed());
    Ok(())
}

fn print_write_summary(output: &Path, stats: &WriteSummary, elapsed: Duration) {
    println!(
        "{} {}",
        "Wrote".bright_green().bold(),
        output.display().to_string().bright_cyan()
    );
    println!("  {:<18} {}", "Observations:", stats.observations_written);
    println!(
        "  {:<18} {} ({:.1} obs/header)",
        "Headers:",
        stats.headers_written,
        stats.observations_per_header()
    );
    println!(
        "  {:<18} {} types, {} stations, {} times, {} flags",
        "Tables:", stats.message_types, stats.stations, stats.valid_times, stats.quality_flags
    );
    println!("  {:<18} {}", "Flushes:", stats.buffer_flushes);
    println!(
        "  {:<18} {}",
        "Size:",
        WriteSummary::format_bytes(stats.bytes_written)
    );
    println!("  {:<18} {:.2?}", "Elapsed:", elapsed);
}
