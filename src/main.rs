//! CLI entry point for the dv/v curve tool.
//!
//! Provides subcommands for aggregating per-pair dv/v observations into a
//! weighted daily series, and for composing and rendering the dv/v figure
//! from precomputed summary tables.

use anyhow::Result;
use clap::{Parser, Subcommand};
use dvv_curve::{
    composer::{
        CompositionRequest, Curve, SummaryTable, compose, parse_components, resolve_mov_stacks,
        resolve_outfile,
    },
    config::Params,
    output::{print_json, print_pretty, write_summary_table},
    parser::{open_maybe_gz, read_observations},
    render::{FigureRenderer, render},
    stats::{InsufficientPolicy, aggregate},
    store::CsvStore,
};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "dvv_curve")]
#[command(about = "Weighted dv/v aggregation and plotting", long_about = None)]
struct Cli {
    /// Path to the JSON parameter file (defaults to $DVV_CONFIG, then dvv.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the weighted mean and std of observations per date
    Aggregate {
        /// Observation CSV (`date,pair,<fields>`), optionally gzipped
        #[arg(short, long)]
        input: PathBuf,

        /// Measurement column
        #[arg(long, default_value = "M")]
        value: String,

        /// Uncertainty column
        #[arg(long, default_value = "EM")]
        error: String,

        /// Summary table CSV to write
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Keep single-observation dates with a NaN std instead of failing
        #[arg(long, default_value_t = false)]
        allow_singletons: bool,

        /// Log the result as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Compose and render the dv/v figure
    Plot {
        /// Moving window in days (0 = every configured window)
        #[arg(short, long, default_value_t = 0)]
        mov_stack: u32,

        /// Measurement name used in output file names
        #[arg(short, long, default_value = "M")]
        dtt: String,

        /// Component pair(s), comma separated
        #[arg(short = 'C', long, default_value = "ZZ")]
        components: String,

        /// Filter id
        #[arg(short, long, default_value_t = 1)]
        filter: u32,

        /// Curves to overlay, comma separated (default: all)
        #[arg(long)]
        curves: Option<String>,

        /// Log the figure
        #[arg(short, long, default_value_t = false)]
        show: bool,

        /// Output file; a leading `?` is replaced by an automatic name
        #[arg(short, long)]
        outfile: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/dvv_curve.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("dvv_curve.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let config_path = cli
        .config
        .or_else(|| std::env::var("DVV_CONFIG").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("dvv.json"));

    match cli.command {
        Commands::Aggregate {
            input,
            value,
            error,
            output,
            allow_singletons,
            json,
        } => {
            let params = config_path
                .exists()
                .then(|| Params::load(&config_path))
                .transpose()?;
            let policy = if allow_singletons {
                InsufficientPolicy::NotANumber
            } else {
                InsufficientPolicy::Reject
            };
            run_aggregate(&input, &value, &error, output.as_deref(), policy, json, params.as_ref())?;
        }
        Commands::Plot {
            mov_stack,
            dtt,
            components,
            filter,
            curves,
            show,
            outfile,
        } => {
            let params = Params::load(&config_path)?;
            let mut request = CompositionRequest::new(
                resolve_mov_stacks(Some(mov_stack), &params.mov_stack),
                parse_components(&components),
                filter,
            );
            request.dtt_name = dtt;
            if let Some(curves) = curves {
                request = request.with_curves(parse_curves(&curves)?);
            }
            run_plot(&params, &request, show, outfile.as_deref()).await?;
        }
    }

    Ok(())
}

fn parse_curves(arg: &str) -> Result<Vec<Curve>> {
    parse_components(arg)
        .iter()
        .map(|name| name.parse::<Curve>())
        .collect()
}

/// Aggregates an observation file and optionally writes the summary table.
#[tracing::instrument(skip_all, fields(input = %input.display(), value = %value, error = %error))]
fn run_aggregate(
    input: &Path,
    value: &str,
    error: &str,
    output: Option<&Path>,
    policy: InsufficientPolicy,
    json: bool,
    params: Option<&Params>,
) -> Result<()> {
    let mut observations = read_observations(open_maybe_gz(input)?)?;
    info!(count = observations.len(), "Observations loaded");

    if let Some(params) = params {
        let before = observations.len();
        observations.retain(|o| {
            let day = o.date.date();
            day >= params.start_date && day <= params.end_date
        });
        info!(
            kept = observations.len(),
            dropped = before - observations.len(),
            start = %params.start_date,
            end = %params.end_date,
            "Restricted to configured date range"
        );
    }

    let series = aggregate(&observations, value, error, policy)?;
    info!(dates = series.len(), "Aggregation complete");

    if let Some(params) = params {
        let missing = params
            .date_list()
            .into_iter()
            .filter(|d| !series.keys().any(|k| k.date() == *d))
            .count();
        if missing > 0 {
            warn!(missing, "Configured days without any observation");
        }
    }

    print_pretty(&series);
    if json {
        print_json(&series)?;
    }

    if let Some(path) = output {
        write_summary_table(path, &SummaryTable::from_aggregates(&series))?;
        info!(path = %path.display(), "Summary table written");
    }

    Ok(())
}

/// Composes the dv/v panels and renders them to a file or the log.
#[tracing::instrument(skip_all, fields(filter_id = request.filter_id))]
async fn run_plot(
    params: &Params,
    request: &CompositionRequest,
    show: bool,
    outfile: Option<&str>,
) -> Result<()> {
    let store = Arc::new(CsvStore::new(&params.data_dir));
    info!(
        data_dir = %params.data_dir.display(),
        windows = ?request.mov_stacks,
        components = ?request.components,
        "Composing dv/v figure"
    );

    let composition = compose(store, request, &params.fetch_options()).await?;
    if composition.panels.iter().all(|p| p.lines.is_empty()) {
        warn!("No dv/v data found for any window/component combination");
    }

    let mut renderer = FigureRenderer::new();
    render(&composition, &mut renderer);

    if let Some(pattern) = outfile {
        let name = resolve_outfile(
            pattern,
            &request.components,
            request.filter_id,
            &request.mov_stacks,
            &request.dtt_name,
        );
        info!(outfile = %name, "output to");
        renderer.save(Path::new(&name))?;
    }
    if show {
        renderer.show();
    }

    Ok(())
}
