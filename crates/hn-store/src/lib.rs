//! Durable event log (C5) and its query bridge (C6).

mod bridge;
mod manager;
mod store;

pub use bridge::{EventStoreHandle, GetItemRequest, GetTopStoriesRequest, StoreQuery};
pub use manager::run_event_log_manager;
pub use store::{Store, StoreError};
