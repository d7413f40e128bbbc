//! HTTP fetch client (C1) and SSE push subscribers (C2).

mod client;
mod sse;
mod worker;

pub use client::{FetchClient, FetchClientError, FetchTimer, TransientFetchError};
pub use sse::{
    run_max_item_subscriber, run_updates_subscriber, SubscriberError, SILENCE_TIMEOUT,
};
pub use worker::run_worker_pool;
