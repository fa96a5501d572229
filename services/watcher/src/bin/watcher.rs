//! services/watcher/src/bin/watcher.rs

use clap::Parser;
use owl_watcher_core::{ports::ScheduleSource, reducer::reduce_with};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use watcher_lib::{
    adapters::{new_session, HttpScheduleAdapter, SystemClock},
    config::{Cli, Config},
    error::WatcherError,
    scheduler::{RunOutcome, SchedulerSettings, WindowScheduler},
};

#[tokio::main]
async fn main() -> Result<(), WatcherError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Config::load(Cli::parse())?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded.");

    // --- 2. Fetch and Reduce the Schedule ---
    let source = Arc::new(HttpScheduleAdapter::new(
        reqwest::Client::new(),
        config.schedule_url.clone(),
    ));
    let records = source
        .fetch_matches()
        .await
        .inspect_err(|e| error!("Could not load the schedule: {}", e))?;
    let windows = reduce_with(&records, config.close_policy);
    info!("{} matches fetched, {} viewing windows.", records.len(), windows.len());

    if config.list_only {
        for window in &windows {
            println!("{} -> {}", window.open, window.close);
        }
        return Ok(());
    }
    if windows.is_empty() {
        info!("Nothing to watch.");
        return Ok(());
    }

    // --- 3. Wire the Scheduler ---
    let session = new_session(&config);
    let mut scheduler = WindowScheduler::new(
        session,
        Arc::new(SystemClock),
        SchedulerSettings::from(&config),
        windows,
    );
    if config.poll_interval.is_some() {
        scheduler = scheduler.with_refetch(source);
    }

    // --- 4. Close the Stream on Ctrl-C ---
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received, shutting down.");
                on_interrupt.cancel();
            }
            Err(e) => warn!("Could not listen for Ctrl-C: {}", e),
        }
    });

    // --- 5. Run ---
    let outcome = scheduler
        .run(cancel)
        .await
        .inspect_err(|e| error!("Watcher stopped: {}", e))?;
    match outcome {
        RunOutcome::Completed => info!("All viewing windows done."),
        RunOutcome::Cancelled => info!("Stopped before the schedule finished."),
    }
    Ok(())
}
