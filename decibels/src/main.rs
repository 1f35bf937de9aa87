use anyhow::{Context, Result};
use tracing::{error, info};

use decibels_lib::audio::{CpalCapture, CpalPlayback};
use decibels_lib::config::MeterConfig;
use decibels_lib::meter::{Loopback, Scheduler, StdoutOutput};
use decibels_lib::utils::error::{AppError, AppResult};
use decibels_lib::utils::logging::init_logging;

fn main() -> Result<()> {
    init_logging();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build the async runtime")?;

    runtime.block_on(async {
        run().await.map_err(|e| {
            let ctx = e.context();
            error!("{} ({:?})", ctx.message, ctx.code);
            if let Some(hint) = &ctx.recovery_hint {
                error!("{}", hint);
            }
            anyhow::Error::new(e)
        })
    })
}

async fn run() -> AppResult<()> {
    let config = MeterConfig::default();
    config.validate()?;
    info!(
        "Meter config: {}",
        serde_json::to_string(&config).map_err(|e| AppError::Internal(e.to_string()))?
    );
    info!(
        "Added playback latency is at most {:?}",
        config.max_added_latency()
    );

    let playback = CpalPlayback::open(&config)?;
    let capture = CpalCapture::open(&config)?;
    let loopback = Loopback::start(capture, playback, &config)?;

    let mut scheduler = Scheduler::new(loopback, StdoutOutput::new(), &config)?;
    let stats = scheduler
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await?;

    info!(
        "Stopped: {}",
        serde_json::to_string(&stats).map_err(|e| AppError::Internal(e.to_string()))?
    );
    Ok(())
}
