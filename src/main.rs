use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use colored::*;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use quickhealth::config::AppConfig;
use quickhealth::daily::DailySeries;
use quickhealth::export::{self, ExportFormat};
use quickhealth::logging::{init_logging, LogLevel};
use quickhealth::{
    intervals, AggregationOrchestrator, DailyRecord, DayCalendar, MemorySampleSource,
    RequestConfiguration, SampleCategory,
};

/// quickhealth - Health Sample Aggregation CLI
///
/// Groups recorded health samples by calendar day, summarises each metric per day
/// and derives heart-rate-variability indices from beat-to-beat data.
#[derive(Parser)]
#[command(name = "quickhealth")]
#[command(version)]
#[command(about = "Daily health metric aggregation and HRV analysis", long_about = None)]
struct Cli {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase verbosity of output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarise a JSON dataset per calendar day
    Summary {
        /// Dataset file (falls back to the configured dataset)
        #[arg(short, long)]
        dataset: Option<PathBuf>,

        /// First day (YYYY-MM-DD), defaults to the first day with data
        #[arg(short, long)]
        from: Option<NaiveDate>,

        /// Last day (YYYY-MM-DD), defaults to the last day with data
        #[arg(short, long)]
        to: Option<NaiveDate>,

        /// Summarise a single day
        #[arg(long, conflicts_with_all = ["from", "to"])]
        day: Option<NaiveDate>,

        /// Metrics to include (e.g. hrv,hr,steps); defaults to the configured request
        #[arg(short, long, value_delimiter = ',')]
        metrics: Vec<SampleCategory>,

        /// Include every metric and derived HRV
        #[arg(short, long)]
        all: bool,

        /// Derive HRV indices from heartbeat series
        #[arg(long)]
        derived_hrv: bool,

        /// Attach the trailing history window to each day
        #[arg(long)]
        history: bool,

        /// History window in days (overrides the configured value)
        #[arg(long, requires = "history")]
        history_days: Option<u32>,

        /// Newest day first
        #[arg(long)]
        descending: bool,

        /// UTC offset in minutes for day boundaries (defaults to the local offset)
        #[arg(long, allow_hyphen_values = true)]
        utc_offset: Option<i32>,

        /// Output format (table, json, csv)
        #[arg(short = 'F', long, default_value = "table")]
        format: String,

        /// Write output to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Derive HRV indices from a JSON array of beat times in milliseconds
    Hrv {
        /// Timestamp file
        #[arg(short, long)]
        timestamps: PathBuf,
    },

    /// Manage the configuration file
    Config {
        /// Write a default configuration file
        #[arg(long)]
        init: bool,

        /// Overwrite an existing file with --init
        #[arg(long, requires = "init")]
        force: bool,

        /// Print the effective configuration
        #[arg(long)]
        show: bool,
    },
}

struct SummaryArgs {
    dataset: Option<PathBuf>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    day: Option<NaiveDate>,
    metrics: Vec<SampleCategory>,
    all: bool,
    derived_hrv: bool,
    history: bool,
    history_days: Option<u32>,
    descending: bool,
    utc_offset: Option<i32>,
    format: String,
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(AppConfig::default_config_path);
    let config = match &cli.config {
        Some(path) => AppConfig::load_from_file(path)?,
        None => AppConfig::load_or_default(),
    };

    let mut log_config = config.logging.clone();
    log_config.level = match cli.verbose {
        0 => log_config.level,
        1 => LogLevel::Info,
        2 => LogLevel::Debug,
        _ => LogLevel::Trace,
    };
    init_logging(&log_config)?;

    match cli.command {
        Commands::Summary {
            dataset,
            from,
            to,
            day,
            metrics,
            all,
            derived_hrv,
            history,
            history_days,
            descending,
            utc_offset,
            format,
            output,
        } => {
            let args = SummaryArgs {
                dataset,
                from,
                to,
                day,
                metrics,
                all,
                derived_hrv,
                history,
                history_days,
                descending,
                utc_offset,
                format,
                output,
            };
            run_summary(&config, args).await?;
        }

        Commands::Hrv { timestamps } => {
            let content = std::fs::read_to_string(&timestamps)
                .with_context(|| format!("Failed to read {}", timestamps.display()))?;
            let beats: Vec<f64> = serde_json::from_str(&content)
                .with_context(|| "Expected a JSON array of beat times in milliseconds")?;

            match intervals::analyze(&beats) {
                Some(metrics) => println!("{}", metrics),
                None => eprintln!("{}", "Not enough beats to derive HRV (need at least 2)".yellow()),
            }
        }

        Commands::Config { init, force, show } => {
            if init {
                if config_path.exists() && !force {
                    bail!(
                        "{} already exists (use --force to overwrite)",
                        config_path.display()
                    );
                }
                let mut fresh = AppConfig::default();
                fresh.save_to_file(&config_path)?;
                eprintln!(
                    "{}",
                    format!("✓ Wrote default configuration to {}", config_path.display()).green()
                );
            }
            if show || !init {
                println!("{}", toml::to_string_pretty(&config)?);
            }
        }
    }

    Ok(())
}

async fn run_summary(config: &AppConfig, args: SummaryArgs) -> Result<()> {
    let dataset = args
        .dataset
        .or_else(|| config.source.dataset.clone())
        .context("No dataset given; pass --dataset or set source.dataset in the config")?;

    let mut request = if args.all {
        RequestConfiguration::all()
    } else if args.metrics.is_empty() {
        config.request
    } else {
        args.metrics
            .iter()
            .fold(RequestConfiguration::none(), |request, &category| request.with(category))
    };
    if args.derived_hrv {
        request.hrv_derived = true;
    }
    if request.is_empty() {
        bail!("No metrics selected; pass --metrics, --all, or enable categories in the config");
    }

    let calendar = match args.utc_offset {
        Some(minutes) => DayCalendar::from_offset_minutes(minutes)
            .with_context(|| format!("UTC offset out of range: {} minutes", minutes))?,
        None => config.aggregation.calendar()?,
    };

    let source = MemorySampleSource::from_json_file(&dataset)?;
    let span = source.time_span();
    let history_days = args.history_days.unwrap_or(config.aggregation.history_days);
    let ascending = !args.descending && config.aggregation.ascending;

    let orchestrator =
        AggregationOrchestrator::new(Arc::new(source), calendar).with_history_days(history_days);
    if let Err(e) = orchestrator.ensure_available() {
        eprintln!("{}", e.user_message().red());
        return Err(e.into());
    }

    let records: Vec<DailyRecord> = if let Some(day) = args.day {
        vec![orchestrator.aggregate_day(day, &request, ascending).await]
    } else {
        let today = calendar.day_key(Utc::now());
        let first = args
            .from
            .or_else(|| span.map(|(first, _)| calendar.day_key(first)))
            .unwrap_or(today);
        let last = args
            .to
            .or_else(|| span.map(|(_, last)| calendar.day_key(last)))
            .unwrap_or(today);

        let start = calendar.day_start(first).with_timezone(&Utc);
        let end = calendar.day_end(last).with_timezone(&Utc);

        if args.history {
            orchestrator
                .aggregate_with_history(start, end, &request, ascending)
                .await
        } else {
            orchestrator.aggregate(start, end, &request, ascending).await
        }
    };

    let categories = request.enabled_categories();
    let summaries = export::summaries(&records, &categories);
    let format: ExportFormat = args.format.parse()?;

    match &args.output {
        Some(path) => {
            export::export_summaries(&summaries, format, path)?;
            eprintln!(
                "{}",
                format!("✓ {} days written to {}", summaries.len(), path.display()).green()
            );
        }
        None => {
            let stdout = std::io::stdout();
            export::write_summaries(&summaries, format, stdout.lock())?;

            if format == ExportFormat::Text && records.len() > 1 {
                print_range_overview(&records, &categories)?;
            }
        }
    }

    let days_with_data = records.iter().filter(|r| r.has_data()).count();
    if days_with_data == 0 {
        eprintln!("{}", "No samples found in the selected range".yellow());
    }

    Ok(())
}

/// Whole-range aggregates below the daily table
fn print_range_overview(records: &[DailyRecord], categories: &[SampleCategory]) -> Result<()> {
    let mut out = std::io::stdout().lock();
    writeln!(out, "{}", format!("Across {} days", records.len()).bold())?;

    for &category in categories {
        let average = records.average(category);
        let range = records.range(category);
        let sum = records.sum(category);
        if average.is_none() && sum.is_none() {
            continue;
        }

        let mut line = format!("  {}: avg {}", category, export_value(average));
        if let Some(range) = range {
            line.push_str(&format!(", range {} - {}", range.min, range.max));
        }
        if let Some(sum) = sum {
            line.push_str(&format!(", total {}", sum));
        }
        writeln!(out, "{} {}", line, category.unit().dimmed())?;
    }

    if let Some(derived) = records.avg_derived_hrv() {
        writeln!(out, "  Derived HRV: {}", derived)?;
    }

    Ok(())
}

fn export_value(value: Option<rust_decimal::Decimal>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}
