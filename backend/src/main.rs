// =============================================================================
// Indicator Engine — Main Entry Point
// =============================================================================
//
// Wires the bar store, the output sink and the evaluation scheduler together,
// optionally seeds the store from a file and/or starts the synthetic feed,
// then runs until Ctrl+C.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod config;
mod error;
mod indicator_row;
mod indicators;
mod market_data;
mod scheduler;
mod sink;

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::EngineConfig;
use crate::market_data::BarStore;
use crate::scheduler::EvaluationScheduler;
use crate::sink::{JsonlSink, MemorySink, OutputSink};

const DEFAULT_CONFIG_PATH: &str = "engine_config.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Indicator engine starting up");

    let config_path =
        std::env::var("INDICATOR_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
    let mut config = EngineConfig::load(&config_path).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        let defaults = EngineConfig::default();
        if !std::path::Path::new(&config_path).exists() {
            if let Err(e) = defaults.save(&config_path) {
                warn!(error = %e, "Failed to write default config");
            }
        }
        defaults
    });
    config
        .apply_env_overrides()
        .context("invalid environment override")?;
    config.validate().context("invalid engine configuration")?;

    info!(
        symbols = ?config.symbols,
        tick_interval_ms = config.tick_interval_ms,
        ema_seed = %config.indicators.ema_seed,
        required_bars = config.indicators.required_bars(),
        "Configuration ready"
    );

    // ── 2. Store ─────────────────────────────────────────────────────────
    let store = Arc::new(BarStore::new(config.store_retention));
    if let Some(seed_path) = &config.seed_path {
        store
            .load_jsonl(seed_path)
            .with_context(|| format!("failed to seed store from {seed_path}"))?;
    }
    for symbol in &config.symbols {
        match store.last_bar(symbol) {
            Some(last) => info!(
                symbol = %symbol,
                bars = store.count(symbol),
                last_bar = %last.timestamp,
                "Series ready"
            ),
            None => info!(symbol = %symbol, "No bars yet"),
        }
    }

    // ── 3. Sink ──────────────────────────────────────────────────────────
    let mut memory_sink: Option<Arc<MemorySink>> = None;
    let sink: Arc<dyn OutputSink> = match &config.output_path {
        Some(path) => Arc::new(JsonlSink::open(path)?),
        None => {
            warn!("No output_path configured — rows are kept in memory only");
            let memory = Arc::new(MemorySink::new());
            memory_sink = Some(memory.clone());
            memory
        }
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── 4. Synthetic feed (optional) ─────────────────────────────────────
    let feed_handle = if config.synthetic_feed.enabled {
        let feed_store = store.clone();
        let symbols = config.symbols.clone();
        let feed_cfg = config.synthetic_feed.clone();
        let rx = shutdown_rx.clone();
        Some(tokio::spawn(async move {
            if let Err(e) =
                market_data::synthetic::run_synthetic_feed(feed_store, symbols, feed_cfg, rx).await
            {
                error!(error = %e, "Synthetic feed failed");
            }
        }))
    } else {
        None
    };

    // ── 5. Evaluation scheduler ──────────────────────────────────────────
    let scheduler = Arc::new(EvaluationScheduler::new(&config, store.clone(), sink));
    let scheduler_handle = tokio::spawn(scheduler.clone().run(shutdown_rx));

    info!("All subsystems running. Press Ctrl+C to stop.");

    // ── 6. Graceful shutdown ─────────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    warn!("Shutdown signal received — stopping gracefully");

    let _ = shutdown_tx.send(true);
    if let Err(e) = scheduler_handle.await {
        error!(error = %e, "Scheduler task ended abnormally");
    }
    if let Some(handle) = feed_handle {
        if let Err(e) = handle.await {
            error!(error = %e, "Synthetic feed task ended abnormally");
        }
    }

    if let Some(report) = scheduler.last_report() {
        match serde_json::to_string(&report) {
            Ok(json) => info!(report = %json, "Last tick report"),
            Err(e) => warn!(error = %e, "Failed to serialise last tick report"),
        }
        for symbol in &config.symbols {
            if let Some(failure) = report.failure_for(symbol) {
                warn!(symbol = %symbol, kind = failure.kind, "Symbol failed on the last tick");
            }
        }
    }

    if let Some(memory) = memory_sink {
        if memory.is_empty() {
            warn!("No indicator rows were produced");
        }
        for symbol in &config.symbols {
            if let Some(row) = memory.rows_for(symbol).last() {
                info!(symbol = %symbol, close = row.close, rsi = ?row.rsi_14, "Last row in memory");
            }
        }
        info!(rows = memory.len(), "In-memory sink totals");
    }

    info!(
        ticks = scheduler.ticks_completed(),
        state = %scheduler.state(),
        "Indicator engine shut down complete."
    );
    Ok(())
}
