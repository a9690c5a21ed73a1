use std::{path::PathBuf, process::ExitCode};

use anyhow::{Context, Result, bail};
use broker_analyzer::{
    AnalysisError, AnalysisSettings, Progress,
    pipeline::{self, analyze_bars, fetch_bars, fetch_metadata},
    report::{PlotExport, friendly_error, render_table},
    settings::DEFAULT_MIN_POINTS,
};
use clap::{Args, Parser, Subcommand};
use ohlc_source::sources::{
    TimeSeriesSource,
    influx::InfluxSource,
    memory::{InMemorySource, TaggedBars},
};
use shared_utils::env::{MissingEnvVarError, get_env_var, parse_env_var_or};
use tokio::sync::mpsc;
use tracing::{error, info};

#[derive(Parser)]
#[command(version, about = "Cluster brokers by the quality of their OHLC feeds")]
struct Cli {
    /// Load environment variables from this file instead of `./.env`.
    #[arg(long, value_name = "FILE", global = true)]
    env_file: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Args)]
struct SourceArgs {
    /// Read bars from a JSON file (a list of `{symbol, timeframe, bars}`) instead of InfluxDB.
    #[arg(long, value_name = "FILE")]
    input: Option<PathBuf>,

    /// Bucket to query; defaults to INFLUX_BUCKET.
    #[arg(long)]
    bucket: Option<String>,
}

#[derive(Subcommand)]
enum Cmd {
    /// List the brokers, symbols and timeframes available.
    Metadata {
        #[command(flatten)]
        source: SourceArgs,
        #[arg(long)]
        json: bool,
    },
    /// Run the clustering analysis.
    Analyze(AnalyzeArgs),
}

#[derive(Args)]
struct AnalyzeArgs {
    #[command(flatten)]
    source: SourceArgs,
    /// TOML settings file; replaces the selection flags below.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
    #[arg(long)]
    symbol: Option<String>,
    #[arg(long)]
    timeframe: Option<String>,
    /// Broker to include; repeat for several.
    #[arg(long = "broker", value_name = "NAME")]
    brokers: Vec<String>,
    /// Minimum bars per broker (defaults to ANALYZER_MIN_POINTS or 240).
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..=1000))]
    min_points: Option<u16>,
    /// Write the scatter-plot data as JSON.
    #[arg(long, value_name = "FILE")]
    plot_out: Option<PathBuf>,
    /// Print the whole outcome as JSON instead of a table.
    #[arg(long)]
    json: bool,
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::filter::EnvFilter::builder()
                .with_default_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_ansi(cfg!(debug_assertions))
        .with_writer(std::io::stderr)
        .init()
}

fn open_source(args: &SourceArgs) -> Result<Box<dyn TimeSeriesSource>> {
    if let Some(path) = &args.input {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read input file {}", path.display()))?;
        let sets: Vec<TaggedBars> =
            serde_json::from_str(&text).context("failed to parse input JSON")?;
        return Ok(Box::new(InMemorySource::from_tagged(sets)));
    }
    Ok(Box::new(InfluxSource::from_env()?))
}

/// `--bucket`, else INFLUX_BUCKET. Offline input has no buckets, so none is required there.
fn resolve_bucket(
    args: &SourceArgs,
    env_bucket: impl FnOnce() -> Result<String, MissingEnvVarError>,
) -> Result<String, MissingEnvVarError> {
    match (&args.bucket, &args.input) {
        (Some(bucket), _) => Ok(bucket.clone()),
        (None, Some(_)) => Ok(String::new()),
        (None, None) => env_bucket(),
    }
}

/// Builds the run settings from `--config` or from the flags. Validation is
/// left to the caller so both paths report failures the same way.
fn resolve_settings(
    args: &AnalyzeArgs,
    env_bucket: impl FnOnce() -> Result<String, MissingEnvVarError>,
) -> Result<AnalysisSettings> {
    if let Some(path) = &args.config {
        return AnalysisSettings::parse_toml_path(path);
    }

    let (Some(symbol), Some(timeframe)) = (&args.symbol, &args.timeframe) else {
        bail!("--symbol and --timeframe are required without --config");
    };
    let bucket = resolve_bucket(&args.source, env_bucket)?;
    let mut settings =
        AnalysisSettings::new(bucket, symbol.clone(), timeframe.clone(), args.brokers.clone());
    settings.min_points = match args.min_points {
        Some(n) => usize::from(n),
        None => parse_env_var_or("ANALYZER_MIN_POINTS", DEFAULT_MIN_POINTS)?,
    };
    settings.normalize();
    Ok(settings)
}

fn spawn_progress_printer() -> (mpsc::UnboundedSender<Progress>, tokio::task::JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<Progress>();
    let handle = tokio::spawn(async move {
        while let Some(p) = rx.recv().await {
            info!(percent = p.percent, "{}", p.message);
        }
    });
    (tx, handle)
}

fn report_failure(err: &AnalysisError) -> ExitCode {
    error!(kind = err.kind(), "{err}");
    eprintln!("{}", friendly_error(err));
    ExitCode::FAILURE
}

async fn run_metadata(source: SourceArgs, json: bool) -> Result<ExitCode> {
    let bucket = resolve_bucket(&source, || get_env_var("INFLUX_BUCKET"))?;
    let source = open_source(&source)?;
    let (tx, printer) = spawn_progress_printer();

    let result = fetch_metadata(&*source, &bucket, |p| {
        let _ = tx.send(p);
    })
    .await;
    drop(tx);
    printer.await?;

    let meta = match result {
        Ok(meta) => meta,
        Err(err) => return Ok(report_failure(&err)),
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&meta)?);
    } else {
        println!("brokers:    {}", meta.brokers.join(", "));
        println!("symbols:    {}", meta.symbols.join(", "));
        println!("timeframes: {}", meta.timeframes.join(", "));
    }
    Ok(ExitCode::SUCCESS)
}

async fn run_analyze(args: AnalyzeArgs) -> Result<ExitCode> {
    let settings = resolve_settings(&args, || get_env_var("INFLUX_BUCKET"))?;
    if let Err(err) = settings.validate() {
        return Ok(report_failure(&err));
    }
    let source = open_source(&args.source)?;

    let (tx, printer) = spawn_progress_printer();
    let _ = tx.send(pipeline::CONNECTING);
    let bars = match fetch_bars(&*source, &settings).await {
        Ok(bars) => bars,
        Err(err) => return Ok(report_failure(&err)),
    };

    // the analysis is CPU-bound; keep it off the runtime threads
    let thresholds = settings.thresholds();
    let progress = tx.clone();
    let result = tokio::task::spawn_blocking(move || {
        analyze_bars(bars, thresholds, |p| {
            let _ = progress.send(p);
        })
    })
    .await?;
    drop(tx);
    printer.await?;

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(err) => return Ok(report_failure(&err)),
    };

    if let Some(path) = &args.plot_out {
        let plot = PlotExport::from(&outcome.projection);
        std::fs::write(path, serde_json::to_string_pretty(&plot)?)
            .with_context(|| format!("write plot file {}", path.display()))?;
        info!(path = %path.display(), "plot data written");
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        println!("optimal k = {}", outcome.optimal_k);
        print!("{}", render_table(&outcome.report));
    }
    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    match &cli.env_file {
        Some(path) => {
            dotenvy::from_path(path).with_context(|| format!("load env file {}", path.display()))?;
        }
        None => {
            dotenvy::dotenv().ok();
        }
    }
    init_logging();

    match cli.cmd {
        Cmd::Metadata { source, json } => run_metadata(source, json).await,
        Cmd::Analyze(args) => run_analyze(args).await,
    }
}
