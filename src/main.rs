//! Dealhound Backend Service
//!
//! Main entry point for the deal detection engine.
//! This service provides:
//! - A periodic scheduler draining product and category tasks
//! - Fee, margin and tier evaluation of every fetched listing
//! - Deal notifications through a webhook or the log

use dealhound_backend::config::AppConfig;
use dealhound_backend::error::{AppError, AppResult};
use dealhound_backend::models::TaskSpec;
use dealhound_backend::services::{DealNotifier, HttpProductSource, LogNotifier, WebhookNotifier};
use dealhound_backend::settings::{self, EngineSettings, SettingsHandle};
use dealhound_backend::{AppState, Scheduler};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> AppResult<()> {
    // Load environment variables first
    dotenv::dotenv().ok();

    // Load configuration
    let config = AppConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        AppError::Config(e)
    })?;

    // Initialize tracing/logging with config
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("dealhound_backend={},reqwest=warn", config.log_level).into());
    if config.json_logs() {
        tracing_subscriber::fmt().json().with_env_filter(env_filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    info!("Dealhound backend starting");
    info!("Environment: {}", config.environment);
    info!("Log level: {}", config.log_level);
    info!("Acquisition service: {}", config.acquisition_url);

    // =========================================================================
    // SETTINGS
    // =========================================================================
    let engine_settings = match &config.settings_path {
        Some(path) => {
            info!("Loading engine settings from {:?}", path);
            EngineSettings::load_from_file(path).map_err(|e| {
                error!("Failed to load settings from {:?}: {}", path, e);
                e
            })?
        }
        None => {
            info!("No SETTINGS_PATH configured, using built-in tier bands and fee tables");
            EngineSettings::default()
        }
    };
    let settings_handle = SettingsHandle::new(engine_settings);

    // =========================================================================
    // CORE SERVICES INITIALIZATION
    // =========================================================================
    let state = AppState::new(settings_handle.clone());

    let source = Arc::new(HttpProductSource::new(
        &config.acquisition_url,
        config.acquisition_max_concurrency,
        config.acquisition_timeout(),
    )?);
    info!(
        "✓ Acquisition client initialized ({} concurrent requests)",
        config.acquisition_max_concurrency
    );

    let notifier: Arc<dyn DealNotifier> = match &config.notify_webhook_url {
        Some(url) => {
            info!("✓ Webhook notifier initialized");
            Arc::new(
                WebhookNotifier::new(url.clone(), state.analyzer.classifier().clone())?
                    .with_batch_delay(config.notify_batch_delay()),
            )
        }
        None => {
            warn!("NOTIFY_WEBHOOK_URL not configured - deals are only logged");
            Arc::new(LogNotifier::new().with_batch_delay(config.notify_batch_delay()))
        }
    };

    if config.scheduler.batch_size > config.acquisition_max_concurrency {
        warn!(
            "SCHEDULER_BATCH_SIZE ({}) exceeds ACQUISITION_MAX_CONCURRENCY ({}); extra requests will wait for a permit",
            config.scheduler.batch_size, config.acquisition_max_concurrency
        );
    }

    let scheduler = Arc::new(
        Scheduler::new(
            state.queue.clone(),
            source,
            state.analyzer.clone(),
            state.tracker.clone(),
            notifier,
        )
        .with_config(config.scheduler.clone()),
    );

    // =========================================================================
    // SEED TASKS
    // =========================================================================
    let max_retries = config.scheduler.task_max_retries;
    let categories = config
        .seed_categories
        .iter()
        .map(|(market, category)| TaskSpec::category(category.clone(), *market).with_max_retries(max_retries));
    let items = config
        .seed_items
        .iter()
        .map(|(market, item_id)| TaskSpec::product(item_id.clone(), *market).with_max_retries(max_retries));
    let seeded = state.queue.enqueue_many(categories.chain(items)).len();
    info!("✓ Seeded {} tasks", seeded);

    // =========================================================================
    // BACKGROUND TASKS
    // =========================================================================
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let scheduler_handle = tokio::spawn({
        let scheduler = scheduler.clone();
        let shutdown = shutdown_rx.clone();
        async move { scheduler.run(shutdown).await }
    });
    info!("✓ Scheduler started ({:?} interval)", config.scheduler.interval());

    let watcher_handle = match (config.settings_path.clone(), config.settings_reload_interval()) {
        (Some(path), Some(interval)) => {
            let handle = settings_handle.clone();
            let shutdown = shutdown_rx.clone();
            info!("✓ Settings watcher started ({:?} interval)", interval);
            Some(tokio::spawn(settings::watch_file(handle, path, interval, shutdown)))
        }
        _ => None,
    };

    info!("Press Ctrl+C to shutdown gracefully");

    // =========================================================================
    // SHUTDOWN HANDLING
    // =========================================================================
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received, waiting for in-flight tasks...");

    if shutdown_tx.send(true).is_err() {
        warn!("Background tasks already stopped");
    }
    if let Err(e) = scheduler_handle.await {
        error!("Scheduler task panicked: {}", e);
    }
    if let Some(handle) = watcher_handle {
        if let Err(e) = handle.await {
            error!("Settings watcher panicked: {}", e);
        }
    }

    let queue_stats = state.queue.stats();
    let scheduler_stats = scheduler.stats();
    info!(
        cycles = scheduler_stats.cycles,
        completed = queue_stats.completed,
        failed = queue_stats.failed,
        pending = queue_stats.pending,
        tracked_deals = state.tracker.len(),
        "Dealhound backend shutdown complete"
    );
    Ok(())
}
