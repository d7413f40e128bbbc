//! Event store bridge (C6): typed request/response channels to the writer task.

use crate::store::StoreError;
use hn_model::{Item, ItemID, TopStories};
use tokio::sync::{mpsc, oneshot};

pub struct GetItemRequest {
    pub id: ItemID,
    pub reply: oneshot::Sender<Result<Item, StoreError>>,
}

pub struct GetTopStoriesRequest {
    pub reply: oneshot::Sender<Result<TopStories, StoreError>>,
}

/// A query landing on the writer task's select arm. Carries its own reply
/// channel, so the writer never needs to track pending callers.
pub enum StoreQuery {
    GetItem(GetItemRequest),
    GetTopStories(GetTopStoriesRequest),
}

/// Client handle for C6. Cheap to clone; every clone shares the same queue
/// into the single writer task.
#[derive(Clone)]
pub struct EventStoreHandle {
    query_tx: mpsc::Sender<StoreQuery>,
}

impl EventStoreHandle {
    pub fn new(query_tx: mpsc::Sender<StoreQuery>) -> Self {
        EventStoreHandle { query_tx }
    }

    /// Fetch the latest captured body for `id`, decoded as an [`Item`].
    pub async fn get_latest_item(&self, id: ItemID) -> Result<Item, StoreError> {
        let (reply, reply_rx) = oneshot::channel();
        self.query_tx
            .send(StoreQuery::GetItem(GetItemRequest { id, reply }))
            .await
            .map_err(|_| StoreError::NotFound)?;
        reply_rx.await.map_err(|_| StoreError::NotFound)?
    }

    /// Fetch the latest top-stories snapshot.
    pub async fn get_top_stories(&self) -> Result<TopStories, StoreError> {
        let (reply, reply_rx) = oneshot::channel();
        self.query_tx
            .send(StoreQuery::GetTopStories(GetTopStoriesRequest { reply }))
            .await
            .map_err(|_| StoreError::NotFound)?;
        reply_rx.await.map_err(|_| StoreError::NotFound)?
    }
}
