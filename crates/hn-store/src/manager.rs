//! Event-log manager (C5): the single task that owns the [`Store`] connection.
//!
//! Rehydrates [`hn_queue`]'s needed-items set from what's already on disk,
//! then multiplexes three inputs for the rest of the process lifetime: new
//! item/top-stories captures to write, queries from [`EventStoreHandle`], and
//! shutdown.

use crate::bridge::StoreQuery;
use crate::store::{Store, StoreError};
use hn_model::{ItemSighting, ItemUpdate, TopStoriesUpdate};
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

/// Run the manager to completion. Returns once `shutdown` carries `true` and
/// the pending write batch has been flushed, or once `item_rx` closes.
pub async fn run_event_log_manager(
    mut store: Store,
    sighting_tx: mpsc::Sender<ItemSighting>,
    mut item_rx: mpsc::Receiver<ItemUpdate>,
    mut top_stories_rx: mpsc::Receiver<TopStoriesUpdate>,
    mut query_rx: mpsc::Receiver<StoreQuery>,
    mut shutdown: watch::Receiver<bool>,
    batch_write_size: usize,
) -> Result<(), StoreError> {
    rehydrate(&store, &sighting_tx).await?;

    let mut batch: Vec<ItemUpdate> = Vec::with_capacity(batch_write_size);
    let mut queries_open = true;
    let mut top_stories_open = true;

    loop {
        tokio::select! {
            biased;

            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    if !batch.is_empty() {
                        flush(&mut store, &mut batch)?;
                    }
                    info!("event log manager flushed pending writes, shutting down");
                    return Ok(());
                }
            }

            input = item_rx.recv() => {
                match input {
                    Some(update) => {
                        let id = update.id;
                        batch.push(update);
                        if sighting_tx.send(ItemSighting::captured(id)).await.is_err() {
                            warn!(item_id = id, "needed-items manager gone, sighting dropped");
                        }
                        if batch.len() >= batch_write_size {
                            flush(&mut store, &mut batch)?;
                        }
                    }
                    None => {
                        if !batch.is_empty() {
                            flush(&mut store, &mut batch)?;
                        }
                        info!("item channel closed, event log manager exiting");
                        return Ok(());
                    }
                }
            }

            update = top_stories_rx.recv(), if top_stories_open => {
                match update {
                    Some(update) => {
                        let started = Instant::now();
                        store.insert_top_stories(&update)?;
                        hn_metrics::observe_log_write_latency(started.elapsed());
                    }
                    None => top_stories_open = false,
                }
            }

            query = query_rx.recv(), if queries_open => {
                match query {
                    Some(StoreQuery::GetItem(req)) => {
                        let _ = req.reply.send(store.get_latest_item(req.id));
                    }
                    Some(StoreQuery::GetTopStories(req)) => {
                        let _ = req.reply.send(store.get_top_stories());
                    }
                    None => queries_open = false,
                }
            }
        }
    }
}

async fn rehydrate(
    store: &Store,
    sighting_tx: &mpsc::Sender<ItemSighting>,
) -> Result<(), StoreError> {
    let ids = store.distinct_item_ids()?;
    let count = ids.len();
    for id in ids {
        if sighting_tx.send(ItemSighting::captured(id)).await.is_err() {
            warn!("needed-items manager gone during rehydration");
            break;
        }
    }
    info!(count, "event log rehydrated");
    Ok(())
}

fn flush(store: &mut Store, batch: &mut Vec<ItemUpdate>) -> Result<(), StoreError> {
    let started = Instant::now();
    store.insert_item_batch(batch)?;
    hn_metrics::observe_log_write_latency(started.elapsed());
    batch.clear();
    Ok(())
}
