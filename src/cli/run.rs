//! Run a single pass or serve the HTTP trigger

use super::{Cli, logging};
use anyhow::Context;
use mergebot::config::load_config;
use mergebot::cycle::Bot;
use mergebot::server;
use std::sync::Arc;
use tracing::{info, warn};

/// Load the configuration and run
pub async fn run(args: Cli) -> anyhow::Result<()> {
    let mut config = load_config(&args.config)
        .with_context(|| format!("failed to load {}", args.config.display()))?;

    if let Some(dry_run) = args.dry_run {
        config.extra.dry_run = dry_run;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    // Dry run logs at debug so that every skipped write is visible
    logging::init(
        &config.extra.log_level,
        config.extra.debug || config.extra.dry_run,
    );

    if config.extra.dry_run {
        warn!("dry-run mode: nothing is written to GitHub; use `--dry-run=false` to disable");
    }

    let port = config.server.port;
    let bot = Bot::new(config)?;

    if args.server {
        return server::serve(Arc::new(bot), port).await;
    }

    let report = bot.run_once().await?;
    info!(
        processed = report.processed.len(),
        skipped = report.skipped.len(),
        failures = report.failures(),
        "cycle finished"
    );
    Ok(())
}
