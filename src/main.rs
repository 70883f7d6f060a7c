use anyhow::{Context, Result};
use chrono::Utc;
use clap::{ArgAction, Parser};
use is_terminal::IsTerminal;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::time::Duration;

use podlog::{
    Condition, ConfigError, ExportError, ExportFormat, FilterError, OutputFormatter, Query,
    QueryFile, ReaderConfig, StatsSummary,
};

#[derive(Parser)]
#[command(name = "podlog")]
#[command(about = "Filter and summarize Kubernetes JSON container logs")]
#[command(version)]
struct Args {
    /// Log file with one JSON record per line
    #[arg(value_name = "FILE")]
    input_file: PathBuf,

    /// Condition that must hold, e.g. level=ERROR or tenant=company_a (repeatable)
    #[arg(short = 'w', long = "where", value_name = "KEY=VALUE", action = ArgAction::Append)]
    where_all: Vec<String>,

    /// Condition of a single OR group; at least one must hold (repeatable)
    #[arg(short = 'a', long = "any", value_name = "KEY=VALUE", action = ArgAction::Append)]
    where_any: Vec<String>,

    /// Only entries from the last DURATION, e.g. 15m or 2h
    #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration)]
    last: Option<Duration>,

    /// YAML file with saved filter groups, applied before the other filters
    #[arg(short = 'q', long = "query", value_name = "FILE")]
    query_file: Option<PathBuf>,

    /// Print summary statistics as JSON instead of entries
    #[arg(short = 's', long)]
    stats: bool,

    /// Output format for entries
    #[arg(short = 'f', long, value_enum, default_value_t = ExportFormat::Text)]
    format: ExportFormat,

    /// Output file (default: stdout)
    #[arg(short = 'o', long = "output")]
    output_file: Option<PathBuf>,

    /// Force colored text output
    #[arg(long, conflicts_with = "no_color")]
    color: bool,

    /// Disable colored text output
    #[arg(long)]
    no_color: bool,

    /// Longer lines are skipped as undecodable
    #[arg(long, default_value = "1048576")] // 1MB
    max_line_length: usize,

    /// Buffer size for reading input
    #[arg(long, default_value = "65536")] // 64KB
    buffer_size: usize,

    /// More log output on stderr (repeatable)
    #[arg(short = 'v', long, action = ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn use_colors(&self) -> bool {
        if self.format != ExportFormat::Text {
            return false;
        }
        if self.color {
            true
        } else if self.no_color {
            false
        } else {
            self.output_file.is_none() && io::stdout().is_terminal()
        }
    }
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    if let Err(e) = run(args) {
        eprintln!("podlog: {:#}", e);
        std::process::exit(exit_code(&e));
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();
}

/// 2 for bad filters or query files, 1 for everything else (source or output I/O)
fn exit_code(error: &anyhow::Error) -> i32 {
    let usage = error
        .chain()
        .any(|cause| cause.is::<FilterError>() || cause.is::<ConfigError>());
    if usage {
        2
    } else {
        1
    }
}

fn build_query(args: &Args) -> Result<Query> {
    let config = ReaderConfig {
        buffer_size: args.buffer_size,
        max_line_length: args.max_line_length,
    };
    let mut query = Query::from_source_with_config(
        podlog::FileSource::new(&args.input_file),
        config,
    );

    let now = Utc::now();
    if let Some(path) = &args.query_file {
        query = QueryFile::load(path)?.apply(&query, now)?;
    }
    if !args.where_all.is_empty() {
        query = query.where_all(split_pairs(&args.where_all)?)?;
    }
    if !args.where_any.is_empty() {
        query = query.where_any(split_pairs(&args.where_any)?)?;
    }
    if let Some(window) = args.last {
        let minutes = window.as_secs_f64() / 60.0;
        query = query.filter_all([Condition::last_minutes(minutes, now)?]);
    }

    log::debug!("query: {:?}", query);
    Ok(query)
}

fn split_pairs(pairs: &[String]) -> Result<Vec<(&str, &str)>, FilterError> {
    pairs
        .iter()
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) if !key.is_empty() => Ok((key, value)),
            _ => Err(FilterError::MalformedPair(pair.clone())),
        })
        .collect()
}

fn open_output(args: &Args) -> Result<Box<dyn Write>> {
    Ok(match &args.output_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file '{}'", path.display()))?;
            Box::new(BufWriter::with_capacity(args.buffer_size, file))
        }
        None => Box::new(BufWriter::with_capacity(args.buffer_size, io::stdout())),
    })
}

fn write_stats<W: Write>(output: &mut W, summary: &StatsSummary) -> Result<(), ExportError> {
    serde_json::to_writer_pretty(&mut *output, summary)?;
    writeln!(output)?;
    output.flush()?;
    Ok(())
}

fn write_entries<W: Write>(
    output: &mut W,
    formatter: &mut OutputFormatter,
    entries: impl Iterator<Item = podlog::Entry>,
) -> Result<usize, ExportError> {
    let written = formatter.write_all(output, entries)?;
    output.flush()?;
    Ok(written)
}

fn run(args: Args) -> Result<()> {
    let query = build_query(&args)?;

    if args.stats {
        let summary = query.stats()?;
        let mut output = open_output(&args)?;
        return match write_stats(&mut output, &summary) {
            Err(e) if e.is_broken_pipe() => Ok(()),
            other => Ok(other?),
        };
    }

    // Source errors must surface before an output file is created
    let mut entries = query.iter()?;
    let mut output = open_output(&args)?;
    let mut formatter = OutputFormatter::new_with_colors(args.format, args.use_colors());

    let written = match write_entries(&mut output, &mut formatter, entries.by_ref()) {
        Ok(written) => written,
        Err(e) if e.is_broken_pipe() => return Ok(()),
        Err(e) => return Err(e.into()),
    };

    let pass = entries.pass_stats();
    log::info!(
        "{} entries written, {} lines read, {} blank, {} undecodable",
        written,
        pass.lines_read,
        pass.blank_lines,
        pass.decode_failures
    );
    if let Some(e) = entries.read_error() {
        log::warn!("input ended early: {}", e);
    }

    Ok(())
}
