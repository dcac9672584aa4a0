// src/main.rs

use anyhow::{Context, Result};
use clap::Parser;
use statnorm::{
    chart::ChartType, config::PipelineConfig, registry::Registry, transform::SortDirection,
    LoadRequest, Pipeline,
};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about = "Load a statistical dataset and print it normalized, with a chart choice")]
struct Args {
    /// Dataset registry (YAML or JSON)
    #[arg(long)]
    registry: PathBuf,

    /// Pipeline configuration (YAML or JSON); defaults apply when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Dataset id from the registry
    dataset: String,

    #[arg(long)]
    locale: Option<String>,

    /// Requested chart type; validated against the data
    #[arg(long)]
    chart: Option<ChartType>,

    /// Column to sort by
    #[arg(long)]
    sort: Option<String>,

    #[arg(long, default_value_t = false)]
    desc: bool,

    /// 1-based page; 0 returns every row
    #[arg(long, default_value_t = 0)]
    page: usize,

    #[arg(long, default_value_t = 0)]
    page_size: usize,

    /// Print only metadata and the chart decision
    #[arg(long, default_value_t = false)]
    summary: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,statnorm=info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    // ─── 2) config + registry ────────────────────────────────────────
    let config = match &args.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    let registry = Registry::load(&args.registry)
        .with_context(|| format!("loading registry {}", args.registry.display()))?;
    info!(datasets = registry.all().len(), "registry loaded");

    let pipeline = Pipeline::new(config, registry).context("building pipeline")?;

    // ─── 3) load ─────────────────────────────────────────────────────
    let direction = if args.desc {
        SortDirection::Desc
    } else {
        SortDirection::Asc
    };
    let req = LoadRequest {
        dataset_id: args.dataset.clone(),
        locale: args.locale.clone(),
        chart: args.chart,
        sort: args.sort.clone().map(|c| (c, direction)),
        page: args.page,
        page_size: args.page_size,
        ..LoadRequest::default()
    };
    let view = pipeline
        .load(&req)
        .await
        .with_context(|| format!("loading dataset `{}`", args.dataset))?;

    // ─── 4) print ────────────────────────────────────────────────────
    let out = if args.summary {
        serde_json::json!({
            "datasetId": view.dataset_id,
            "locale": view.locale,
            "metadata": view.data.metadata,
            "chart": view.chart,
            "alternatives": view.alternatives,
            "validation": view.validation,
            "cached": view.cached,
            "prebuilt": view.prebuilt,
            "pagination": view.pagination,
        })
    } else {
        serde_json::to_value(&view)?
    };
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
