//! In-process mock of the upstream item/top-stories HTTP surface.
//!
//! Serves `GET /v0/item/{id}.json` and `GET /v0/topstories.json` from an
//! in-memory map, for exercising [`hn_fetch::FetchClient`] without a real
//! network dependency.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use hn_model::ItemID;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct MockState {
    items: HashMap<ItemID, Vec<u8>>,
    topstories: Vec<u8>,
    /// Item IDs that should 500 on the next request, then succeed.
    flaky_once: HashMap<ItemID, bool>,
}

pub struct MockHnServer {
    addr: SocketAddr,
    state: Arc<Mutex<MockState>>,
    _handle: tokio::task::JoinHandle<()>,
}

impl MockHnServer {
    /// Start the server on a random local port.
    pub async fn start() -> Self {
        let state = Arc::new(Mutex::new(MockState::default()));
        let app = Router::new()
            .route("/v0/item/{id}.json", get(get_item))
            .route("/v0/topstories.json", get(get_topstories))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        MockHnServer {
            addr,
            state,
            _handle: handle,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn set_item(&self, id: ItemID, body: Vec<u8>) {
        self.state.lock().unwrap().items.insert(id, body);
    }

    pub fn set_topstories(&self, body: Vec<u8>) {
        self.state.lock().unwrap().topstories = body;
    }

    /// The next request for `id` returns 500; the one after returns the
    /// stored body. Exercises the client's retry path.
    pub fn fail_next_request_for(&self, id: ItemID) {
        self.state.lock().unwrap().flaky_once.insert(id, true);
    }
}

async fn get_item(
    State(state): State<Arc<Mutex<MockState>>>,
    Path(id): Path<ItemID>,
) -> impl IntoResponse {
    let mut guard = state.lock().unwrap();
    if let Some(pending) = guard.flaky_once.get_mut(&id) {
        if *pending {
            *pending = false;
            return (StatusCode::INTERNAL_SERVER_ERROR, Vec::new()).into_response();
        }
    }
    match guard.items.get(&id) {
        Some(body) => (StatusCode::OK, body.clone()).into_response(),
        None => (StatusCode::OK, b"null".to_vec()).into_response(),
    }
}

async fn get_topstories(State(state): State<Arc<Mutex<MockState>>>) -> impl IntoResponse {
    let body = state.lock().unwrap().topstories.clone();
    (StatusCode::OK, body)
}
