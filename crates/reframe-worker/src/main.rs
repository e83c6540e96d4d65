//! Reframe worker binary.
//!
//! Usage: `reframe-worker <job.json> [output.json]`

use anyhow::Context;
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::sync::watch;
use tracing::{info, warn};

use reframe_engine::ReframePlanner;
use reframe_worker::{logging, run_job, ReframeJob, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = WorkerConfig::from_env();
    logging::init(config.json_logs)?;

    let mut args = std::env::args().skip(1);
    let job_path = args
        .next()
        .context("usage: reframe-worker <job.json> [output.json]")?;
    let output_path = args.next();

    info!("Starting reframe-worker");
    info!("Worker config: {:?}", config);

    let metrics = if config.metrics_enabled {
        Some(
            PrometheusBuilder::new()
                .install_recorder()
                .context("Failed to install Prometheus recorder")?,
        )
    } else {
        None
    };

    let job = ReframeJob::load(&job_path).with_context(|| format!("loading job {}", job_path))?;

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Received shutdown signal, cancelling in-flight segments");
            cancel_tx.send(true).ok();
        }
    });

    let planner = ReframePlanner::with_ffmpeg(config.to_engine_config())?.with_cancel(cancel_rx);
    let report = run_job(&planner, &job, config.max_segment_parallel).await?;

    let json = serde_json::to_string_pretty(&report)?;
    match output_path {
        Some(path) => {
            std::fs::write(&path, json).with_context(|| format!("writing report {}", path))?;
            info!(path = %path, "Report written");
        }
        None => println!("{}", json),
    }

    if let Some(handle) = metrics {
        info!("Metrics snapshot:\n{}", handle.render());
    }

    info!("Worker shutdown complete");
    Ok(())
}
