// src/bin/prebuild.rs

use anyhow::{Context, Result};
use clap::Parser;
use futures::{stream::FuturesUnordered, StreamExt};
use statnorm::{
    config::PipelineConfig,
    registry::{DatasetEntry, Registry},
    Pipeline,
};
use std::{fs, path::PathBuf, time::Instant};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about = "Pre-build every local dataset into <out>/<local_id>.json")]
struct Args {
    #[arg(long)]
    registry: PathBuf,

    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value = "public/data")]
    out: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,statnorm=info"));
    fmt::Subscriber::builder().with_env_filter(env).init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    let registry = Registry::load(&args.registry)
        .with_context(|| format!("loading registry {}", args.registry.display()))?;
    fs::create_dir_all(&args.out)
        .with_context(|| format!("creating {}", args.out.display()))?;

    let pipeline = Pipeline::new(config, registry).context("building pipeline")?;
    let local: Vec<_> = pipeline
        .registry()
        .all()
        .iter()
        .filter(|d| d.local_id.is_some())
        .cloned()
        .collect();
    info!(count = local.len(), "local datasets to pre-build");

    const MAX_CONCURRENCY: usize = 4;

    let build_one = |entry: &DatasetEntry| {
        let pipeline = &pipeline;
        let out_dir = args.out.clone();
        let entry = entry.clone();
        async move {
            let local_id = entry.local_id.clone().unwrap_or_default();
            let out_path = out_dir.join(format!("{}.json", local_id));
            let start = Instant::now();
            let result = async {
                let ds = pipeline.prebuild(&entry).await?;
                let json = serde_json::to_string(&ds)?;
                fs::write(&out_path, json)
                    .with_context(|| format!("writing {}", out_path.display()))?;
                anyhow::Ok(ds.metadata.row_count)
            }
            .await;
            (entry.id, local_id, start.elapsed(), result)
        }
    };

    let mut tasks = FuturesUnordered::new();
    let mut pending = local.iter();
    let mut failures: Vec<(String, String)> = Vec::new();

    // keep at most MAX_CONCURRENCY builds in flight; a failure never stops the run
    loop {
        while tasks.len() < MAX_CONCURRENCY {
            match pending.next() {
                Some(entry) => tasks.push(build_one(entry)),
                None => break,
            }
        }
        let Some((id, local_id, elapsed, result)) = tasks.next().await else {
            break;
        };
        match result {
            Ok(rows) => info!(dataset = %id, %local_id, rows, ?elapsed, "[OK]"),
            Err(e) => {
                error!(dataset = %id, %local_id, error = %e, "[FAIL]");
                failures.push((format!("{} ({})", id, local_id), e.to_string()));
            }
        }
    }

    info!(
        succeeded = local.len() - failures.len(),
        failed = failures.len(),
        total = local.len(),
        "done"
    );
    for (id, err) in &failures {
        error!("  - {}: {}", id, err);
    }
    Ok(())
}
