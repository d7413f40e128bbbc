//! HTTP fetch client (C1): pooled client, custom headers, retry.

use backoff::ExponentialBackoff;
use chrono::Utc;
use hn_config::HttpConfig;
use hn_model::{ItemID, ItemUpdate, TopStoriesUpdate};
use std::time::{Duration, Instant};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Caps the overall retry window; ~10 attempts at the default backoff curve.
const MAX_ELAPSED_TIME: Duration = Duration::from_secs(120);

#[derive(Debug, thiserror::Error)]
pub enum FetchClientError {
    #[error("building HTTP client: {0}")]
    Build(#[source] reqwest::Error),
}

/// Returned when a fetch exhausts its retry budget. The upstream density
/// contract means this is always treated as fatal by the caller (C4).
#[derive(Debug, thiserror::Error)]
#[error("transient fetch failure after exhausting retries: {0}")]
pub struct TransientFetchError(#[source] pub reqwest::Error);

/// Single pooled HTTP client shared across all workers and used for
/// one-shot requests like top-stories polling. Headers are injected per
/// request rather than via `default_headers`, matching the reference
/// transport's per-request header set.
#[derive(Debug, Clone)]
pub struct FetchClient {
    client: reqwest::Client,
    base_url: String,
    user_agent: String,
    from: String,
}

impl FetchClient {
    pub fn new(cfg: &HttpConfig) -> Result<Self, FetchClientError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(FetchClientError::Build)?;
        Ok(FetchClient {
            client,
            base_url: cfg.base_url.trim_end_matches('/').to_owned(),
            user_agent: cfg.user_agent.clone(),
            from: cfg.from.clone(),
        })
    }

    fn backoff_policy() -> ExponentialBackoff {
        ExponentialBackoff {
            max_elapsed_time: Some(MAX_ELAPSED_TIME),
            ..ExponentialBackoff::default()
        }
    }

    /// Fetch the raw body for a single item. A `200 null` body is success,
    /// not an error — it is returned verbatim.
    pub async fn fetch_item(&self, id: ItemID) -> Result<ItemUpdate, TransientFetchError> {
        let url = format!("{}/v0/item/{}.json", self.base_url, id);
        let data = self.get_bytes_with_retry(&url).await?;
        Ok(ItemUpdate {
            rx_time: Utc::now(),
            id,
            data,
        })
    }

    /// Fetch the current top-stories snapshot.
    pub async fn fetch_top_stories(&self) -> Result<TopStoriesUpdate, TransientFetchError> {
        let url = format!("{}/v0/topstories.json", self.base_url);
        let data = self.get_bytes_with_retry(&url).await?;
        Ok(TopStoriesUpdate {
            rx_time: Utc::now(),
            data,
        })
    }

    async fn get_bytes_with_retry(&self, url: &str) -> Result<Vec<u8>, TransientFetchError> {
        backoff::future::retry(Self::backoff_policy(), || async {
            self.get_bytes_once(url).await
        })
        .await
        .map_err(TransientFetchError)
    }

    async fn get_bytes_once(&self, url: &str) -> Result<Vec<u8>, backoff::Error<reqwest::Error>> {
        let record_retry = |e: reqwest::Error| {
            hn_metrics::inc_items_get_status("retry");
            backoff::Error::transient(e)
        };

        let response = self
            .client
            .get(url)
            .header("User-Agent", &self.user_agent)
            .header("From", &self.from)
            .send()
            .await
            .map_err(record_retry)?;

        let response = response.error_for_status().map_err(record_retry)?;

        response.bytes().await.map(|b| b.to_vec()).map_err(record_retry)
    }
}

/// Times a single fetch, recording latency and size metrics on success.
pub struct FetchTimer {
    started: Instant,
}

impl FetchTimer {
    pub fn start() -> Self {
        FetchTimer {
            started: Instant::now(),
        }
    }

    pub fn observe(self, body_len: usize) {
        hn_metrics::observe_items_get_latency(self.started.elapsed());
        hn_metrics::observe_items_get_size(body_len);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hn_test_utils::MockHnServer;

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let cfg = HttpConfig {
            base_url: "https://example.invalid/".to_owned(),
            user_agent: "test".to_owned(),
            from: "test@example.invalid".to_owned(),
        };
        let client = FetchClient::new(&cfg).unwrap();
        assert_eq!(client.base_url, "https://example.invalid");
    }

    fn test_cfg(base_url: String) -> HttpConfig {
        HttpConfig {
            base_url,
            user_agent: "hn-sync-test/0.1".to_owned(),
            from: "test@example.invalid".to_owned(),
        }
    }

    #[tokio::test]
    async fn fetch_item_returns_stored_body() {
        let server = MockHnServer::start().await;
        server.set_item(1, br#"{"id":1,"type":"story","time":1}"#.to_vec());
        let client = FetchClient::new(&test_cfg(server.base_url())).unwrap();

        let update = client.fetch_item(1).await.unwrap();
        assert_eq!(update.id, 1);
        assert_eq!(update.data, br#"{"id":1,"type":"story","time":1}"#);
    }

    #[tokio::test]
    async fn fetch_item_missing_id_returns_null_not_error() {
        let server = MockHnServer::start().await;
        let client = FetchClient::new(&test_cfg(server.base_url())).unwrap();

        let update = client.fetch_item(404).await.unwrap();
        assert_eq!(update.data, b"null");
    }

    #[tokio::test]
    async fn fetch_item_retries_past_a_single_transient_failure() {
        let server = MockHnServer::start().await;
        server.set_item(5, b"5".to_vec());
        server.fail_next_request_for(5);
        let client = FetchClient::new(&test_cfg(server.base_url())).unwrap();

        let update = client.fetch_item(5).await.unwrap();
        assert_eq!(update.data, b"5");
    }

    #[tokio::test]
    async fn fetch_top_stories_returns_stored_snapshot() {
        let server = MockHnServer::start().await;
        server.set_topstories(b"[1,2,3]".to_vec());
        let client = FetchClient::new(&test_cfg(server.base_url())).unwrap();

        let update = client.fetch_top_stories().await.unwrap();
        assert_eq!(update.data, b"[1,2,3]");
    }
}
