//! gdsr-rb - GDS results browser command line driver
//!
//! Runs the results-browser engine against a results service: loads pages
//! of a stage with optional range filters or a graph selection and prints
//! the resulting view state, or downloads the stage as currently filtered.

use std::fs::File;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gdsr_common::config::{load_config, BrowserConfig, LoggingConfig};
use gdsr_common::events::EventBus;
use gdsr_common::{RangeFilter, Stage};
use gdsr_rb::{
    DownloadOptions, HttpResultsApi, Level1Selection, LoadOutcome, StageView, ViewSynchronizer,
};
use serde_json::json;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for gdsr-rb
#[derive(Parser, Debug)]
#[command(name = "gdsr-rb")]
#[command(about = "GDS results browser engine")]
#[command(version)]
struct Args {
    /// Config file (overrides GDSR_CONFIG and the platform default)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Project id (overrides project_id from the config file)
    #[arg(long, env = "GDSR_PROJECT", global = true)]
    project: Option<String>,

    /// Results service base URL
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load result pages for a stage and print the view state as JSON
    Browse {
        /// Stage id: 1 = Layout Generation, 2 = HyperExpressivity
        #[arg(short, long, default_value = "1", value_parser = parse_stage)]
        stage: Stage,

        /// Number of pages to load
        #[arg(short, long, default_value_t = 1)]
        pages: u32,

        /// Range filter as parameter:operator:value[:value], repeatable
        #[arg(long = "range")]
        ranges: Vec<RangeFilter>,

        /// Graph selection (comma separated file ids)
        #[arg(long, value_delimiter = ',')]
        select: Vec<String>,

        /// Level-1 cell subset (comma separated cell names)
        #[arg(long, value_delimiter = ',')]
        cells: Vec<String>,
    },

    /// Download the filtered stage results to a file
    Download {
        #[arg(short, long, default_value = "1", value_parser = parse_stage)]
        stage: Stage,

        /// File types to include
        #[arg(long, value_delimiter = ',', default_value = "gds")]
        types: Vec<String>,

        /// Only download the summary report
        #[arg(long)]
        summary_only: bool,

        /// File ids to pin in the cart before downloading
        #[arg(long, value_delimiter = ',')]
        cart: Vec<String>,

        #[arg(long = "range")]
        ranges: Vec<RangeFilter>,

        #[arg(long, value_delimiter = ',')]
        select: Vec<String>,

        /// Output file
        #[arg(short, long)]
        out: PathBuf,
    },
}

fn parse_stage(raw: &str) -> std::result::Result<Stage, String> {
    let id: u8 = raw.parse().map_err(|_| format!("not a stage id: {}", raw))?;
    Stage::try_from(id).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = load_config(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(url) = args.api_url.clone() {
        config.api_base_url = url;
    }
    if let Some(project) = args.project.clone() {
        config.project_id = Some(project);
    }

    init_tracing(&config.logging)?;

    // Log build identification immediately after tracing init
    info!(
        "Starting GDS results browser (gdsr-rb) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let sync = build_engine(&config)?;

    match args.command {
        Command::Browse {
            stage,
            pages,
            ranges,
            select,
            cells,
        } => {
            if !cells.is_empty() {
                sync.set_level1_selection(stage, Level1Selection::with_cells(cells));
            }
            prepare_stage(&sync, stage, ranges, &select).await?;

            for _ in 1..pages {
                match sync.load_next_page(stage).await? {
                    LoadOutcome::Appended { .. } => {}
                    _ => break,
                }
            }

            let view = sync.snapshot(stage);
            println!("{}", serde_json::to_string_pretty(&summarize(&view))?);
        }
        Command::Download {
            stage,
            types,
            summary_only,
            cart,
            ranges,
            select,
            out,
        } => {
            for file_id in &cart {
                sync.toggle_cart(stage, file_id);
            }
            prepare_stage(&sync, stage, ranges, &select).await?;

            let options = DownloadOptions {
                file_types: types,
                summary_only,
            };
            let bytes = sync.download(stage, &options).await?;
            std::fs::write(&out, &bytes)
                .with_context(|| format!("Failed to write {}", out.display()))?;
            info!("Wrote {} bytes to {}", bytes.len(), out.display());
        }
    }

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let file_layer = match &logging.file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
    Ok(())
}

fn build_engine(config: &BrowserConfig) -> Result<Arc<ViewSynchronizer>> {
    let project_id = config
        .project_id
        .clone()
        .context("No project id: pass --project or set project_id in the config file")?;

    let api = HttpResultsApi::new(
        &config.api_base_url,
        Duration::from_secs(config.http.timeout_secs),
    )?;
    info!("Results service: {}", config.api_base_url);

    Ok(Arc::new(ViewSynchronizer::new(
        Arc::new(api),
        EventBus::new(config.events.capacity),
        project_id,
    )))
}

/// Stage range filters, apply them, then narrow to the graph selection
async fn prepare_stage(
    sync: &ViewSynchronizer,
    stage: Stage,
    ranges: Vec<RangeFilter>,
    select: &[String],
) -> Result<()> {
    for filter in ranges {
        sync.ranges()
            .upsert_filter(stage, filter)
            .context("Invalid range filter")?;
    }
    sync.apply_filter(stage).await?;

    if !select.is_empty() {
        sync.set_graph_selection(stage, select).await?;
    }
    Ok(())
}

fn summarize(view: &StageView) -> serde_json::Value {
    json!({
        "stage": view.stage,
        "filterState": view.filter_state,
        "level2Applied": view.level2_applied,
        "generation": view.generation,
        "pagination": view.pagination,
        "loaded": view.items.len(),
        "withImages": view.items.iter().filter(|l| l.image.is_some()).count(),
        "filtered": view.filtered_data.iter().map(|i| i.file_id.as_str()).collect::<Vec<_>>(),
        "pexRows": view.pex_consolidated.len(),
        "cart": view.cart,
        "graphSelection": view.graph_selection,
        "metricBounds": view.metric_bounds,
    })
}
