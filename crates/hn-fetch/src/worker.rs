//! Fetch worker pool (C4): a fixed population of tasks draining the
//! needed-items handoff channel and writing captured bodies onward to C5.

use crate::client::{FetchClient, FetchTimer, TransientFetchError};
use hn_model::{ItemID, ItemUpdate};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{error, info};

/// Spawn `worker_count` workers sharing one `work_rx` via a mutex-guarded
/// receiver, matching the reference transport's fixed-size goroutine pool.
/// Each captured item is forwarded to `item_tx`. A worker that exhausts its
/// retry budget treats the failure as fatal and returns immediately — the
/// upstream density contract means a sustained fetch failure is not
/// recoverable by retrying forever.
pub async fn run_worker_pool(
    client: FetchClient,
    work_rx: mpsc::Receiver<ItemID>,
    item_tx: mpsc::Sender<ItemUpdate>,
    shutdown: watch::Receiver<bool>,
    worker_count: u32,
) -> Result<(), TransientFetchError> {
    let work_rx = Arc::new(Mutex::new(work_rx));
    let mut handles = Vec::with_capacity(worker_count as usize);

    for worker_id in 0..worker_count {
        let client = client.clone();
        let work_rx = work_rx.clone();
        let item_tx = item_tx.clone();
        let mut shutdown = shutdown.clone();
        handles.push(tokio::spawn(async move {
            loop {
                let next = tokio::select! {
                    biased;
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            return Ok(());
                        }
                        continue;
                    }
                    id = async { work_rx.lock().await.recv().await } => id,
                };
                let Some(id) = next else {
                    info!(worker_id, "work channel closed, worker exiting");
                    return Ok(());
                };

                let timer = FetchTimer::start();
                match client.fetch_item(id).await {
                    Ok(update) => {
                        timer.observe(update.data.len());
                        hn_metrics::inc_items_gotten();
                        hn_metrics::inc_items_get_status("ok");
                        if item_tx.send(update).await.is_err() {
                            info!(worker_id, "event log manager gone, worker exiting");
                            return Ok(());
                        }
                    }
                    Err(e) => {
                        hn_metrics::inc_items_get_status("error");
                        error!(worker_id, item_id = id, error = %e, "fetch retries exhausted");
                        return Err(e);
                    }
                }
            }
        }));
    }

    for handle in handles {
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(join_err) => {
                error!(error = %join_err, "fetch worker task panicked");
            }
        }
    }
    Ok(())
}
