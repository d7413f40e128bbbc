//! hn-syncd: mirrors the upstream item corpus into a local durable store.
//!
//! Wires C1-C7 together: two SSE subscribers discover new and updated IDs,
//! a needed-items manager reconciles them against the known-ID horizon, a
//! worker pool fetches bodies, and a single event-log manager persists them
//! and answers reader queries. See the crate docs of `hn-queue`, `hn-fetch`,
//! and `hn-store` for each component's contract.

use hn_config::SyncConfig;
use std::path::Path;
use std::process::ExitCode;
use tokio::sync::{mpsc, watch};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "hn-syncd starting");

    let cfg = match hn_config::load_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("FATAL: failed to load config: {e}");
            return ExitCode::FAILURE;
        }
    };
    info!(
        base_url = %cfg.http.base_url,
        workers = cfg.workers.count,
        "config loaded"
    );

    run(cfg).await
}

async fn run(cfg: SyncConfig) -> ExitCode {
    let store = match hn_store::Store::open(Path::new(&cfg.database.path)) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("FATAL: failed to open store: {e}");
            return ExitCode::FAILURE;
        }
    };

    let client = match hn_fetch::FetchClient::new(&cfg.http) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("FATAL: failed to build HTTP client: {e}");
            return ExitCode::FAILURE;
        }
    };

    let metrics_handle = hn_metrics::install_recorder();

    let worker_count = cfg.workers.count;
    let (sighting_tx, sighting_rx) = mpsc::channel(worker_count as usize);
    let (work_tx, work_rx) = mpsc::channel(worker_count as usize);
    let (item_tx, item_rx) = mpsc::channel(worker_count as usize);
    let (top_stories_tx, top_stories_rx) = mpsc::channel(4);
    let (query_tx, query_rx) = mpsc::channel(1);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Exposed for readers embedded in the same process; see C6 in the design notes.
    let _store_handle = hn_store::EventStoreHandle::new(query_tx);

    let max_item_url = format!("{}/v0/maxitem.json", cfg.http.base_url);
    let updates_url = format!("{}/v0/updates.json", cfg.http.base_url);

    let mut tasks: tokio::task::JoinSet<Result<(), String>> = tokio::task::JoinSet::new();

    tasks.spawn({
        let sighting_tx = sighting_tx.clone();
        let shutdown_rx = shutdown_rx.clone();
        async move {
            hn_fetch::run_max_item_subscriber(&max_item_url, sighting_tx, shutdown_rx)
                .await
                .map_err(|e| e.to_string())
        }
    });

    tasks.spawn({
        let sighting_tx = sighting_tx.clone();
        let shutdown_rx = shutdown_rx.clone();
        async move {
            hn_fetch::run_updates_subscriber(&updates_url, sighting_tx, shutdown_rx)
                .await
                .map_err(|e| e.to_string())
        }
    });

    // The event-log manager feeds `present=true` sightings back on this same
    // channel as captures land; the subscribers above feed `present=false`.
    let store_sighting_tx = sighting_tx.clone();
    drop(sighting_tx);

    tasks.spawn({
        let shutdown_rx = shutdown_rx.clone();
        async move {
            let _final_state =
                hn_queue::run_needed_items_manager(sighting_rx, work_tx, shutdown_rx).await;
            Ok(())
        }
    });

    tasks.spawn({
        let shutdown_rx = shutdown_rx.clone();
        async move {
            hn_fetch::run_worker_pool(client, work_rx, item_tx, shutdown_rx, worker_count)
                .await
                .map_err(|e| e.to_string())
        }
    });

    tasks.spawn(async move {
        hn_store::run_event_log_manager(
            store,
            store_sighting_tx,
            item_rx,
            top_stories_rx,
            query_rx,
            shutdown_rx,
            cfg.log.batch_write_size as usize,
        )
        .await
        .map_err(|e| e.to_string())
    });

    let metrics_bind = match cfg.metrics.bind.parse() {
        Ok(addr) => addr,
        Err(e) => {
            eprintln!("FATAL: invalid metrics.bind address '{}': {e}", cfg.metrics.bind);
            return ExitCode::FAILURE;
        }
    };
    // Not governed by the shutdown watch: it only reads the metrics registry
    // and is aborted directly once the supervised tasks above have drained.
    let mut metrics_task = tokio::spawn(async move {
        hn_metrics::serve(metrics_bind, metrics_handle).await
    });

    // Top-stories are polled, not pushed, by the reference API; no producer
    // feeds top_stories_tx yet (see Open Question in the design notes).
    drop(top_stories_tx);

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("received Ctrl+C, shutting down");
        }
        Some(result) = tasks.join_next() => {
            metrics_task.abort();
            match result {
                Ok(Ok(())) => error!("a supervised task exited unexpectedly"),
                Ok(Err(e)) => error!(error = %e, "a supervised task failed fatally"),
                Err(join_err) => error!(error = %join_err, "a supervised task panicked"),
            }
            return ExitCode::FAILURE;
        }
        result = &mut metrics_task => {
            match result {
                Ok(Ok(())) => error!("metrics listener exited unexpectedly"),
                Ok(Err(e)) => error!(error = %e, "metrics listener failed"),
                Err(join_err) => error!(error = %join_err, "metrics listener task panicked"),
            }
            return ExitCode::FAILURE;
        }
    }

    let _ = shutdown_tx.send(true);
    drop(shutdown_tx);

    while let Some(result) = tasks.join_next().await {
        if let Err(e) = result {
            error!(error = %e, "task failed during shutdown");
        }
    }
    metrics_task.abort();

    info!("hn-syncd shut down cleanly");
    ExitCode::SUCCESS
}
