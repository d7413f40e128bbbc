//! Push subscribers (C2): max-item and updates SSE streams.
//!
//! Both subscribers share [`run_subscriber`], which owns the silence
//! watchdog. The library's own reconnect handling is not trusted alone —
//! several historical silence-under-reconnect bugs motivate a wall-clock
//! watchdog independent of it.

use futures_util::StreamExt;
use hn_model::{ItemID, ItemSighting, UserID};
use reqwest_eventsource::{Event, EventSource};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Maximum silence (including `keep-alive` frames) before a subscriber is
/// considered dead and the process exits.
pub const SILENCE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, thiserror::Error)]
pub enum SubscriberError {
    #[error("no frame (including keep-alive) received within {0:?}")]
    SilenceTimeout(Duration),
    #[error("sighting channel closed")]
    ChannelClosed,
}

#[derive(Debug, Deserialize)]
struct MaxItemPutData {
    data: ItemID,
}

#[derive(Debug, Deserialize)]
struct UpdatePutData {
    data: UpdatePutPayload,
}

#[derive(Debug, Deserialize)]
struct UpdatePutPayload {
    items: Vec<ItemID>,
    #[serde(default)]
    profiles: Vec<UserID>,
}

/// Run the max-item subscriber until shutdown or a fatal error.
pub async fn run_max_item_subscriber(
    url: &str,
    sighting_tx: mpsc::Sender<ItemSighting>,
    shutdown: watch::Receiver<bool>,
) -> Result<(), SubscriberError> {
    run_subscriber(url, "max-item", shutdown, SILENCE_TIMEOUT, |data| {
        let sighting_tx = sighting_tx.clone();
        async move {
            match serde_json::from_str::<MaxItemPutData>(&data) {
                Ok(parsed) => {
                    info!(max_item = parsed.data, "sync: new maxitem value");
                    sighting_tx
                        .send(ItemSighting::seen(parsed.data))
                        .await
                        .map_err(|_| SubscriberError::ChannelClosed)?;
                }
                Err(e) => warn!(error = %e, "failed to decode maxitem put frame"),
            }
            Ok(())
        }
    })
    .await
}

/// Run the updates subscriber until shutdown or a fatal error.
pub async fn run_updates_subscriber(
    url: &str,
    sighting_tx: mpsc::Sender<ItemSighting>,
    shutdown: watch::Receiver<bool>,
) -> Result<(), SubscriberError> {
    run_subscriber(url, "updates", shutdown, SILENCE_TIMEOUT, |data| {
        let sighting_tx = sighting_tx.clone();
        async move {
            match serde_json::from_str::<UpdatePutData>(&data) {
                Ok(parsed) => {
                    info!(
                        items = parsed.data.items.len(),
                        profiles = parsed.data.profiles.len(),
                        "sync: update frame"
                    );
                    for id in parsed.data.items {
                        sighting_tx
                            .send(ItemSighting::seen(id))
                            .await
                            .map_err(|_| SubscriberError::ChannelClosed)?;
                    }
                    // Profiles are recognised but unhandled; see ProfileSighting.
                }
                Err(e) => warn!(error = %e, "failed to decode updates put frame"),
            }
            Ok(())
        }
    })
    .await
}

async fn run_subscriber<F, Fut>(
    url: &str,
    name: &str,
    mut shutdown: watch::Receiver<bool>,
    silence_timeout: Duration,
    mut handle_put: F,
) -> Result<(), SubscriberError>
where
    F: FnMut(String) -> Fut,
    Fut: std::future::Future<Output = Result<(), SubscriberError>>,
{
    let mut es = EventSource::get(url);
    let mut silence_deadline = Instant::now() + silence_timeout;

    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!(subscriber = name, "shutting down");
                    return Ok(());
                }
            }
            () = tokio::time::sleep_until(silence_deadline) => {
                error!(subscriber = name, "silence watchdog tripped");
                return Err(SubscriberError::SilenceTimeout(silence_timeout));
            }
            next = es.next() => {
                silence_deadline = Instant::now() + silence_timeout;
                match next {
                    None => {
                        debug!(subscriber = name, "stream ended, library will reconnect");
                    }
                    Some(Ok(Event::Open)) => {
                        info!(subscriber = name, "SSE connected");
                    }
                    Some(Ok(Event::Message(msg))) => match msg.event.as_str() {
                        "put" => handle_put(msg.data).await?,
                        "keep-alive" => {}
                        other => warn!(subscriber = name, event_type = other, "unknown SSE event type"),
                    },
                    Some(Err(e)) => {
                        warn!(subscriber = name, error = %e, "SSE stream error, library will reconnect");
                    }
                }
            }
        }
    }
}
