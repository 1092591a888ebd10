use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use catalog_sync_lib::application::SyncScheduler;
use catalog_sync_lib::build_runtime;
use catalog_sync_lib::infrastructure::{ConfigManager, init_logging_with_config, log_system_info};

/// Mirror the source product catalog into the storefront on a fixed interval
#[derive(Debug, Parser)]
#[command(name = "catalog-sync", version, about)]
struct Args {
    /// Configuration file (defaults to the per-user config directory)
    #[arg(short, long, env = "CATALOG_SYNC_CONFIG")]
    config: Option<PathBuf>,

    /// Run a single sync cycle and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_manager = match args.config {
        Some(path) => ConfigManager::with_path(path),
        None => ConfigManager::new()?,
    };
    let first_run = config_manager.initialize_on_first_run().await?;
    let config = config_manager.load_config()?;

    // Keep the guard alive so buffered file logs are flushed on exit
    let _log_guard = init_logging_with_config(&config.logging)?;
    log_system_info();
    if first_run {
        warn!(
            "📝 Wrote a configuration template to {:?}; fill in the platform credentials",
            config_manager.config_path()
        );
    }
    if let Err(e) = config.validate() {
        error!("❌ Invalid configuration in {:?}: {}", config_manager.config_path(), e);
        return Err(e.into());
    }

    let runtime = build_runtime(&config).await?;
    let scheduler = SyncScheduler::every_minutes(runtime.orchestrator.clone(), config.sync.interval_minutes);

    if args.once {
        let summary = scheduler.run_once().await.summary();
        info!("✅ Single cycle finished: {}", summary);
    } else {
        let shutdown = CancellationToken::new();
        let signal_token = shutdown.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("🛑 Shutdown requested, finishing current cycle"),
                Err(e) => error!("❌ Failed to listen for shutdown signal: {}", e),
            }
            signal_token.cancel();
        });

        let cycles = scheduler.run(shutdown).await;
        info!("👋 Scheduler stopped after {} cycle(s)", cycles);
    }

    runtime.database.close().await;
    Ok(())
}
